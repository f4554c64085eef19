//! Authentication and session setup.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tracing::info;

use iaso_model::ImportError;

/// Connection parameters for the platform.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Server base URL, without a trailing slash.
    pub server_url: String,
    pub username: String,
    pub password: String,
}

/// An authenticated session: bearer token plus the user id decoded from it.
#[derive(Debug, Clone)]
pub struct Session {
    pub base_url: String,
    pub token: String,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: Option<String>,
}

/// Obtain a bearer token from `/api/token/`.
///
/// A failure here is fatal: no row is processed without a session.
pub fn authenticate(
    http: &reqwest::blocking::Client,
    credentials: &Credentials,
) -> Result<Session, ImportError> {
    let base_url = credentials.server_url.trim_end_matches('/').to_string();
    let response = http
        .post(format!("{base_url}/api/token/"))
        .json(&serde_json::json!({
            "username": credentials.username,
            "password": credentials.password,
        }))
        .send()
        .map_err(|error| ImportError::Authentication(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ImportError::Authentication(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let payload: TokenResponse = response
        .json()
        .map_err(|error| ImportError::Authentication(error.to_string()))?;
    let Some(token) = payload.access.filter(|token| !token.is_empty()) else {
        return Err(ImportError::Authentication(
            "token response carried no access token".to_string(),
        ));
    };

    let user_id = user_id_from_jwt(&token);
    info!(user_id = user_id.as_deref().unwrap_or("unknown"), "authenticated");
    Ok(Session {
        base_url,
        token,
        user_id,
    })
}

/// Decode the user id from a JWT payload, without signature verification.
///
/// The id only feeds the `<editUserID>` document marker, so a best-effort
/// decode is enough.
pub fn user_id_from_jwt(token: &str) -> Option<String> {
    let payload_b64 = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    for key in ["user_id", "id", "sub"] {
        match payload.get(key) {
            Some(serde_json::Value::String(value)) if !value.is_empty() => {
                return Some(value.clone());
            }
            Some(serde_json::Value::Number(value)) => return Some(value.to_string()),
            _ => {}
        }
    }
    None
}
