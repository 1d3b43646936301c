use serde::{Deserialize, Serialize};
use validator::Validate;

/// Whether one client has been admitted to the upload surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionState {
    pub admitted: bool,
    pub identifier: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "admin_id")]
    #[validate(length(min = 1, message = "Identifier must not be empty"))]
    pub identifier: String,

    #[serde(alias = "password")]
    #[validate(length(min = 1, message = "Secret must not be empty"))]
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub admitted: bool,
    pub identifier: Option<String>,
}

impl From<&AdmissionState> for AdmissionResponse {
    fn from(state: &AdmissionState) -> Self {
        Self {
            admitted: state.admitted,
            identifier: state.identifier.clone(),
        }
    }
}
