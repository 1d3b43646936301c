use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use sha2::{Digest, Sha256};
use url::Url;

use super::blob_store::BlobStore;
use crate::config::ObjectStorageSettings;
use crate::error::{PortalError, Result};

type HmacSha256 = Hmac<Sha256>;

const AWS_URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const CACHE_CONTROL: &str = "max-age=3600";

/// S3-compatible object storage signed with AWS SigV4.
#[derive(Clone, Debug)]
pub struct ObjectStorageClient {
    client: Client,
    region: String,
    endpoint: Url,
    access_key: String,
    secret_key: String,
    public_base_url: Option<String>,
}

impl ObjectStorageClient {
    pub fn new(settings: &ObjectStorageSettings) -> anyhow::Result<Self> {
        let Some(endpoint) = settings.endpoint.as_deref() else {
            bail!("Object storage endpoint is not configured");
        };

        let endpoint = Url::parse(endpoint).context("Invalid object storage endpoint URL")?;
        if endpoint.host_str().is_none() {
            bail!("Object storage endpoint must include a host");
        }

        // Enforce HTTPS in production mode (check APP_ENV at runtime)
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "prod".to_string());
        if app_env == "prod" && endpoint.scheme() != "https" {
            bail!(
                "Object storage endpoint must use HTTPS in production mode. Got: {}",
                endpoint.scheme()
            );
        }

        if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
            bail!(
                "Invalid endpoint scheme: {}. Must be http or https.",
                endpoint.scheme()
            );
        }

        Ok(Self {
            client: Client::new(),
            region: settings.region.clone(),
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.clone(),
            public_base_url: settings.public_base_url.clone(),
            endpoint,
        })
    }

    fn host(&self) -> Result<String> {
        self.endpoint
            .host_str()
            .map(|host| match self.endpoint.port() {
                Some(port) => format!("{}:{}", host.to_lowercase(), port),
                None => host.to_lowercase(),
            })
            .ok_or_else(|| PortalError::upload("Object storage endpoint missing host"))
    }

    /// `/{endpoint path}/{bucket}/{encoded key}`
    fn canonical_uri(&self, bucket: &str, key: &str) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        format!("{}/{}/{}", base, bucket, encode_key(key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let key = key.trim_matches('/');
        let canonical_uri = self.canonical_uri(bucket, key);

        let payload_hash = hex::encode(Sha256::digest(&bytes));
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);

        let host = self.host()?;
        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "PUT\n{}\n\n{}\n{}\n{}",
            canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let hashed_canonical_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date, scope, hashed_canonical_request
        );

        let signing_key = derive_signing_key(&self.secret_key, &date_stamp, &self.region, "s3");
        let signature = hex::encode(hmac_sign(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, signed_headers, signature
        );

        let mut upload_url = self.endpoint.clone();
        upload_url.set_path(&canonical_uri);

        let response = self
            .client
            .put(upload_url)
            .header("Authorization", authorization)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header("content-type", content_type)
            .header("cache-control", CACHE_CONTROL)
            .header("if-none-match", "*")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PortalError::upload(format!("Failed to upload object {}: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::upload(format!(
                "Object storage rejected {}/{} with {}: {}",
                bucket, key, status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl BlobStore for ObjectStorageClient {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        tracing::debug!(bucket, path, size = bytes.len(), "Uploading object");
        self.put_object(bucket, path, bytes, content_type).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let base = match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => self.endpoint.as_str().trim_end_matches('/').to_string(),
        };
        format!("{}/{}/{}", base, bucket, encode_key(path.trim_matches('/')))
    }
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, AWS_URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let mut key = format!("AWS4{}", secret).into_bytes();
    key = hmac_sign(&key, date);
    key = hmac_sign(&key, region);
    key = hmac_sign(&key, service);
    hmac_sign(&key, b"aws4_request")
}

fn hmac_sign(key: &[u8], message: impl AsRef<[u8]>) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message.as_ref());
    mac.finalize().into_bytes().to_vec()
}
