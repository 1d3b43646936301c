//! Admission gate for the upload surface.
//!
//! The gate compares a submitted identifier/secret pair against a fixed
//! allow-list compiled into the binary, using plain case-sensitive byte
//! equality. There is no hashing, no rate limiting and no lockout.
//!
//! **This is not a security boundary.** The record store and blob store stay
//! reachable by anyone holding the store's public key; the gate only decides
//! whether this service exposes its upload endpoint. Replacing it with a real
//! credential-verification service means swapping [`AdmissionGate`] without
//! touching its callers.
//!
//! Admission is scoped to one client. Each successful login is recorded under
//! an opaque token handed back in the [`ADMISSION_COOKIE`] cookie, and only a
//! request carrying that token sees the admitted state.
//!
//! State is always passed in explicitly: the gate never owns an
//! [`AdmissionState`]. [`AdmissionStateFile`] loads the per-client states at
//! startup and persists them after each transition so they survive restarts
//! on the same host.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PortalError, Result};
use crate::metrics::ADMISSION_ATTEMPTS_TOTAL;
use crate::models::admission::AdmissionState;

/// Cookie carrying the caller's admission token.
pub const ADMISSION_COOKIE: &str = "portal_admission";

/// Admission states keyed by client token.
pub type Admissions = HashMap<String, AdmissionState>;

pub fn new_admission_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Built-in operator credentials. Cleartext by construction; see module docs.
pub const BUILTIN_ALLOW_LIST: &[(&str, &str)] = &[("admin_mu_eng_2024", "MU_Papers_Secure@2024")];

#[derive(Debug, Clone)]
pub struct AdmissionGate {
    allow_list: Vec<(String, String)>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(BUILTIN_ALLOW_LIST.iter().copied())
    }
}

impl AdmissionGate {
    pub fn new<'a>(allow_list: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            allow_list: allow_list
                .into_iter()
                .map(|(id, secret)| (id.to_string(), secret.to_string()))
                .collect(),
        }
    }

    /// Admits the operator if the pair is on the allow-list. A rejected pair
    /// leaves `state` exactly as it was.
    pub fn admit(&self, state: &mut AdmissionState, identifier: &str, secret: &str) -> bool {
        let matched = self
            .allow_list
            .iter()
            .any(|(id, s)| id.as_bytes() == identifier.as_bytes() && s.as_bytes() == secret.as_bytes());

        if matched {
            state.admitted = true;
            state.identifier = Some(identifier.to_string());
            ADMISSION_ATTEMPTS_TOTAL.with_label_values(&["admitted"]).inc();
            tracing::info!(identifier = %identifier, "Operator admitted");
        } else {
            ADMISSION_ATTEMPTS_TOTAL.with_label_values(&["rejected"]).inc();
            tracing::warn!("Admission rejected");
        }

        matched
    }

    /// Closes the gate. Safe to call repeatedly.
    pub fn revoke(&self, state: &mut AdmissionState) {
        if state.admitted {
            tracing::info!(identifier = ?state.identifier, "Admission revoked");
        }
        state.admitted = false;
        state.identifier = None;
    }
}

/// JSON file holding every client's admission state on this host.
#[derive(Debug, Clone)]
pub struct AdmissionStateFile {
    path: PathBuf,
}

impl AdmissionStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file means nobody has been admitted yet.
    pub async fn load(&self) -> Result<Admissions> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortalError::Persistence(format!(
                    "Corrupt admission state at {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Admissions::new()),
            Err(e) => Err(PortalError::Persistence(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    pub async fn save(&self, admissions: &Admissions) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PortalError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let bytes = serde_json::to_vec_pretty(admissions)
            .map_err(|e| PortalError::Persistence(e.to_string()))?;

        // Readers only ever observe a complete file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| {
            PortalError::Persistence(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            PortalError::Persistence(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            clients = admissions.len(),
            "Admission state saved"
        );
        Ok(())
    }
}
