//! S3-compatible object store destination

use super::{artifact_file_name, wrong_destination, DestinationAdapter};
use crate::config::ObjectStoreConfig;
use crate::error::{BackupError, Result};
use crate::jobs::{Destination, DestinationKind};
use crate::utils::runtime;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Connection settings after environment overrides
#[derive(Clone)]
pub struct ObjectStoreSettings {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub key_prefix: String,
}

impl std::fmt::Debug for ObjectStoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreSettings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreSettings {
    /// Config values, each overridable by its `BACKUP_S3_*` variable
    pub fn from_config(config: &ObjectStoreConfig) -> Self {
        let env_or = |name: &str, fallback: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        Self {
            endpoint: env_or("BACKUP_S3_ENDPOINT", &config.endpoint),
            region: env_or("BACKUP_S3_REGION", &config.region),
            bucket: env_or("BACKUP_S3_BUCKET", &config.bucket),
            access_key: env_or("BACKUP_S3_ACCESS_KEY", &config.access_key),
            secret_key: env_or("BACKUP_S3_SECRET_KEY", &config.secret_key),
            key_prefix: config.key_prefix.clone(),
        }
    }

    fn client(&self) -> Client {
        let credentials = Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            None,
            None,
            "backup-orchestrator",
        );

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .endpoint_url(self.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Client::from_conf(config)
    }
}

pub struct ObjectStoreAdapter {
    settings: ObjectStoreSettings,
    timeout: Duration,
}

impl ObjectStoreAdapter {
    pub fn new(settings: ObjectStoreSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    /// Bucket and object key for an artifact
    fn location(&self, bucket: &Option<String>, prefix: &Option<String>, name: &str) -> Result<(String, String)> {
        let bucket = bucket
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| self.settings.bucket.clone());
        if bucket.is_empty() {
            return Err(BackupError::TransferFailed(
                "object store bucket is not configured".to_string(),
            ));
        }

        let prefix = prefix.as_deref().unwrap_or(&self.settings.key_prefix);
        let prefix = prefix.trim_matches('/');
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };
        Ok((bucket, key))
    }
}

impl DestinationAdapter for ObjectStoreAdapter {
    fn kind(&self) -> DestinationKind {
        DestinationKind::ObjectStore
    }

    fn upload(&self, artifact: &Path, destination: &Destination) -> Result<()> {
        let Destination::ObjectStore { bucket, prefix } = destination else {
            return Err(wrong_destination(DestinationKind::ObjectStore, destination));
        };

        let (bucket, key) = self.location(bucket, prefix, &artifact_file_name(artifact)?)?;
        if self.settings.access_key.is_empty() || self.settings.secret_key.is_empty() {
            return Err(BackupError::TransferFailed(
                "object store credentials are not configured".to_string(),
            ));
        }

        let client = self.settings.client();
        let timeout = self.timeout;

        let result = runtime::block_on(async {
            let body = match ByteStream::from_path(artifact).await {
                Ok(body) => body,
                Err(e) => return Err(format!("cannot read {:?}: {}", artifact, e)),
            };

            let request = client.put_object().bucket(&bucket).key(&key).body(body).send();
            match tokio::time::timeout(timeout, request).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(DisplayErrorContext(&e).to_string()),
                Err(_) => Err(format!("timed out after {:?}", timeout)),
            }
        })
        .map_err(|e| BackupError::TransferFailed(format!("{:#}", e)))?;

        result.map_err(|msg| BackupError::TransferFailed(format!("s3://{}/{}: {}", bucket, key, msg)))?;

        info!("Artifact uploaded to s3://{}/{}", bucket, key);
        Ok(())
    }
}
