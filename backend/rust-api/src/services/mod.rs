use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;

use crate::config::{BlobStoreBackend, Config, RecordStoreBackend};
use crate::error::Result;
use crate::models::admission::AdmissionState;

use admission::{new_admission_token, AdmissionGate, AdmissionStateFile, Admissions};
use blob_store::{BlobStore, MemoryBlobStore};
use memory_store::MemoryRecordStore;
use object_storage::ObjectStorageClient;
use record_store::RecordStore;
use rest_store::RestRecordStore;

pub struct AppState {
    pub config: Config,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub gate: AdmissionGate,
    admissions: RwLock<Admissions>,
    admission_file: AdmissionStateFile,
}

impl AppState {
    /// Builds the state around already constructed stores and loads the
    /// persisted admission states.
    pub async fn new(
        config: Config,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        let admission_file = AdmissionStateFile::new(&config.admission_state_path);
        let admissions = admission_file.load().await?;

        tracing::info!(
            record_store = records.name(),
            blob_store = blobs.name(),
            admitted_clients = admissions.len(),
            state_path = %admission_file.path().display(),
            "Application state initialised"
        );

        Ok(Self {
            config,
            records,
            blobs,
            gate: AdmissionGate::default(),
            admissions: RwLock::new(admissions),
            admission_file,
        })
    }

    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let records: Arc<dyn RecordStore> = match config.record_store.backend {
            RecordStoreBackend::Rest => Arc::new(
                RestRecordStore::new(&config.record_store)
                    .context("Failed to configure record store")?,
            ),
            RecordStoreBackend::Memory => Arc::new(MemoryRecordStore::new()),
        };

        let blobs: Arc<dyn BlobStore> = match (&config.blob_store.backend, &config.blob_store.storage)
        {
            (BlobStoreBackend::S3, Some(storage)) => Arc::new(
                ObjectStorageClient::new(storage).context("Failed to configure object storage")?,
            ),
            (BlobStoreBackend::S3, None) => {
                anyhow::bail!("Object storage credentials are required for the s3 backend")
            }
            (BlobStoreBackend::Memory, _) => Arc::new(MemoryBlobStore::default()),
        };

        Ok(Self::new(config, records, blobs).await?)
    }

    /// The caller's admission. Unknown or missing tokens are not admitted.
    pub async fn admission_snapshot(&self, token: Option<&str>) -> AdmissionState {
        let admissions = self.admissions.read().await;
        token
            .and_then(|token| admissions.get(token))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_admitted(&self, token: Option<&str>) -> bool {
        self.admission_snapshot(token).await.admitted
    }

    /// Runs the gate for one client and persists the admission under a fresh
    /// token, which replaces the caller's previous one. Rejected pairs change
    /// nothing and are not written back.
    pub async fn admit(
        &self,
        token: Option<&str>,
        identifier: &str,
        secret: &str,
    ) -> Result<Option<(String, AdmissionState)>> {
        let mut admissions = self.admissions.write().await;
        let mut candidate = AdmissionState::default();

        if !self.gate.admit(&mut candidate, identifier, secret) {
            return Ok(None);
        }

        let mut next = admissions.clone();
        if let Some(previous) = token {
            next.remove(previous);
        }
        let token = new_admission_token();
        next.insert(token.clone(), candidate.clone());

        self.admission_file.save(&next).await?;
        *admissions = next;
        Ok(Some((token, candidate)))
    }

    /// Revokes the caller's admission only. Other clients stay admitted.
    pub async fn revoke(&self, token: Option<&str>) -> Result<AdmissionState> {
        let mut admissions = self.admissions.write().await;

        let Some(token) = token.filter(|token| admissions.contains_key(*token)) else {
            return Ok(AdmissionState::default());
        };

        let mut next = admissions.clone();
        if let Some(mut state) = next.remove(token) {
            self.gate.revoke(&mut state);
        }

        self.admission_file.save(&next).await?;
        *admissions = next;
        Ok(AdmissionState::default())
    }
}

pub mod admission;
pub mod aggregation;
pub mod analytics_service;
pub mod blob_store;
pub mod memory_store;
pub mod mock_test_service;
pub mod object_storage;
pub mod paper_service;
pub mod record_store;
pub mod rest_store;
