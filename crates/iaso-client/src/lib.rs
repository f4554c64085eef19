pub mod auth;
pub mod error;
pub mod forms;
pub mod http;
pub mod platform;
pub mod upload;
mod workbook;

pub use auth::{Credentials, Session, authenticate, user_id_from_jwt};
pub use error::ClientError;
pub use forms::{load_form_model, sanitize_form_name};
pub use http::IasoClient;
pub use platform::{
    EditSession, InstanceMetadata, InstancePatch, InstanceStatus, Platform, RemoteForm,
};
pub use upload::{CreateUpload, UpdateUpload, push_create, push_delete, push_update};
