use serde::Deserialize;
use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_MB: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStoreBackend {
    /// Hosted table store reached over its REST API
    Rest,
    /// In-process tables, for offline development and tests
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobStoreBackend {
    /// S3-compatible object storage
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordStoreSettings {
    pub backend: RecordStoreBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStorageSettings {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base for public object URLs; `{base}/{bucket}/{path}`
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobStoreSettings {
    pub backend: BlobStoreBackend,
    pub bucket: String,
    pub storage: Option<ObjectStorageSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub record_store: RecordStoreSettings,
    pub blob_store: BlobStoreSettings,
    pub admission_state_path: PathBuf,
    /// Marks the admission cookie `Secure`
    pub admission_cookie_secure: bool,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let record_url = settings
            .get_string("record_store.url")
            .or_else(|_| env::var("SUPABASE_URL"))
            .ok();
        let record_key = settings
            .get_string("record_store.api_key")
            .or_else(|_| env::var("SUPABASE_ANON_KEY"))
            .ok();

        let record_backend = match settings.get_string("record_store.backend").ok() {
            Some(name) => parse_record_backend(&name)?,
            None if record_url.is_some() => RecordStoreBackend::Rest,
            None => {
                eprintln!("WARNING: No record store URL configured, using in-memory tables");
                RecordStoreBackend::Memory
            }
        };

        if record_backend == RecordStoreBackend::Rest && (record_url.is_none() || record_key.is_none()) {
            return Err(config::ConfigError::Message(
                "record_store.url and record_store.api_key (or SUPABASE_URL / SUPABASE_ANON_KEY) must be set for the rest backend".to_string(),
            ));
        }

        let timeout_secs = settings
            .get_int("record_store.timeout_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(10);

        let storage = match settings.get_string("blob_store.access_key") {
            Ok(access_key) => Some(ObjectStorageSettings {
                endpoint: settings
                    .get_string("blob_store.endpoint")
                    .or_else(|_| env::var("OBJECT_STORAGE_ENDPOINT"))
                    .ok(),
                region: settings
                    .get_string("blob_store.region")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                access_key,
                secret_key: settings.get_string("blob_store.secret_key")?,
                public_base_url: settings
                    .get_string("blob_store.public_base_url")
                    .ok()
                    .or_else(|| {
                        record_url
                            .as_ref()
                            .map(|url| format!("{}/storage/v1/object/public", url.trim_end_matches('/')))
                    }),
            }),
            Err(_) => None,
        };

        let blob_backend = match settings.get_string("blob_store.backend").ok() {
            Some(name) => parse_blob_backend(&name)?,
            None if storage.is_some() => BlobStoreBackend::S3,
            None => {
                eprintln!("WARNING: No object storage credentials configured, using in-memory blobs");
                BlobStoreBackend::Memory
            }
        };

        if blob_backend == BlobStoreBackend::S3 && storage.is_none() {
            return Err(config::ConfigError::Message(
                "blob_store.access_key and blob_store.secret_key must be set for the s3 backend"
                    .to_string(),
            ));
        }

        let bucket = settings
            .get_string("blob_store.bucket")
            .unwrap_or_else(|_| "papers".to_string());

        let admission_state_path = settings
            .get_string("admission.state_path")
            .or_else(|_| env::var("ADMISSION_STATE_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".papers-portal/admission.json"));

        let admission_cookie_secure = settings
            .get_bool("admission.cookie_secure")
            .unwrap_or(!matches!(app_env.as_str(), "dev" | "test"));

        let max_upload_bytes = match settings.get_int("server.max_upload_mb") {
            Ok(mb) => upload_limit_bytes(mb)?,
            Err(_) => DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        };

        Ok(Config {
            bind_addr,
            record_store: RecordStoreSettings {
                backend: record_backend,
                url: record_url,
                api_key: record_key,
                timeout_secs,
            },
            blob_store: BlobStoreSettings {
                backend: blob_backend,
                bucket,
                storage,
            },
            admission_state_path,
            admission_cookie_secure,
            max_upload_bytes,
        })
    }

    /// Fully in-memory configuration; nothing leaves the process except the
    /// admission state file.
    pub fn in_memory(admission_state_path: impl Into<PathBuf>) -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            record_store: RecordStoreSettings {
                backend: RecordStoreBackend::Memory,
                url: None,
                api_key: None,
                timeout_secs: 10,
            },
            blob_store: BlobStoreSettings {
                backend: BlobStoreBackend::Memory,
                bucket: "papers".to_string(),
                storage: None,
            },
            admission_state_path: admission_state_path.into(),
            admission_cookie_secure: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

fn upload_limit_bytes(mb: i64) -> Result<usize, config::ConfigError> {
    usize::try_from(mb)
        .ok()
        .filter(|mb| *mb > 0)
        .and_then(|mb| mb.checked_mul(1024 * 1024))
        .ok_or_else(|| {
            config::ConfigError::Message(format!(
                "server.max_upload_mb must be a positive size in megabytes, got {}",
                mb
            ))
        })
}

fn parse_record_backend(name: &str) -> Result<RecordStoreBackend, config::ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "rest" => Ok(RecordStoreBackend::Rest),
        "memory" => Ok(RecordStoreBackend::Memory),
        other => Err(config::ConfigError::Message(format!(
            "Unknown record_store.backend '{}', expected rest or memory",
            other
        ))),
    }
}

fn parse_blob_backend(name: &str) -> Result<BlobStoreBackend, config::ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "s3" => Ok(BlobStoreBackend::S3),
        "memory" => Ok(BlobStoreBackend::Memory),
        other => Err(config::ConfigError::Message(format!(
            "Unknown blob_store.backend '{}', expected s3 or memory",
            other
        ))),
    }
}
