pub mod enrich;
pub mod template;

pub use enrich::{
    EnrichOptions, JR_NS, ORX_NS, canonical_instance_id, ensure_namespace_declarations,
    render_document,
};
pub use template::{DocumentSkeleton, TemplateCache, build_skeleton};
