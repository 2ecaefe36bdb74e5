use std::io::Read;
use std::time::Duration;

use rusty_s3::actions::{CreateBucket, HeadBucket, S3Action};
use rusty_s3::{Bucket, Credentials, UrlStyle};

use crate::config::StorageConfig;
use crate::error::{PalisadeError, Result};
use crate::storage::BlobBackend;

/// Duration for presigned URL validity.
const PRESIGN_DURATION: Duration = Duration::from_secs(3600);

/// S3-compatible blob store. One flat bucket, objects under the same
/// `objects/<kk>/<rest>` key layout as the local backend.
pub struct S3Backend {
    bucket: Bucket,
    credentials: Credentials,
    agent: ureq::Agent,
}

impl S3Backend {
    pub fn from_config(cfg: &StorageConfig) -> Result<Self> {
        let (access_key, secret_key) = cfg.resolved_credentials();
        Self::new(
            &cfg.endpoint,
            &cfg.region,
            &cfg.bucket,
            &access_key,
            &secret_key,
            cfg.use_ssl,
        )
    }

    pub fn new(
        endpoint: &str,
        region: &str,
        bucket_name: &str,
        access_key: &str,
        secret_key: &str,
        use_ssl: bool,
    ) -> Result<Self> {
        let scheme = if use_ssl { "https" } else { "http" };
        let base_url = format!("{scheme}://{endpoint}")
            .parse()
            .map_err(|e| PalisadeError::Config(format!("invalid S3 endpoint '{endpoint}': {e}")))?;

        let bucket = Bucket::new(
            base_url,
            UrlStyle::Path,
            bucket_name.to_string(),
            region.to_string(),
        )
        .map_err(|e| PalisadeError::Config(format!("invalid S3 bucket '{bucket_name}': {e}")))?;

        let credentials = Credentials::new(access_key, secret_key);

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .timeout_write(Duration::from_secs(300))
            .build();

        let backend = S3Backend {
            bucket,
            credentials,
            agent,
        };
        backend.ensure_bucket()?;
        Ok(backend)
    }

    /// Probe the bucket; create it when absent. A bucket that neither
    /// exists nor can be created is fatal to initialization.
    fn ensure_bucket(&self) -> Result<()> {
        let head = HeadBucket::new(&self.bucket, Some(&self.credentials)).sign(PRESIGN_DURATION);
        match self.agent.head(head.as_str()).call() {
            Ok(_) => return Ok(()),
            Err(ureq::Error::Status(404, _)) => {}
            Err(e) => {
                return Err(PalisadeError::Other(format!(
                    "S3 bucket probe for '{}' failed: {e}",
                    self.bucket.name()
                )))
            }
        }

        tracing::info!(bucket = self.bucket.name(), "creating missing S3 bucket");
        let create = CreateBucket::new(&self.bucket, &self.credentials).sign(PRESIGN_DURATION);
        self.agent.put(create.as_str()).call().map_err(|e| {
            PalisadeError::Config(format!(
                "S3 bucket '{}' does not exist and creation failed: {e}",
                self.bucket.name()
            ))
        })?;
        Ok(())
    }

    fn object_key(key: &str) -> String {
        if key.len() < 2 {
            return format!("objects/{key}");
        }
        format!("objects/{}/{}", &key[..2], &key[2..])
    }
}

impl BlobBackend for S3Backend {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let object = Self::object_key(key);
        let url = self
            .bucket
            .put_object(Some(&self.credentials), &object)
            .sign(PRESIGN_DURATION);

        self.agent
            .put(url.as_str())
            .set("Content-Type", "application/octet-stream")
            .send_bytes(data)
            .map_err(|e| PalisadeError::Other(format!("S3 PUT {key}: {e}")))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object = Self::object_key(key);
        let url = self
            .bucket
            .get_object(Some(&self.credentials), &object)
            .sign(PRESIGN_DURATION);

        match self.agent.get(url.as_str()).call() {
            Ok(resp) => {
                let mut buf = Vec::new();
                resp.into_reader()
                    .read_to_end(&mut buf)
                    .map_err(|e| PalisadeError::Other(format!("S3 GET {key}: {e}")))?;
                Ok(Some(buf))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(PalisadeError::Other(format!("S3 GET {key}: {e}"))),
        }
    }

    fn has(&self, key: &str) -> Result<bool> {
        let object = Self::object_key(key);
        let url = self
            .bucket
            .head_object(Some(&self.credentials), &object)
            .sign(PRESIGN_DURATION);

        match self.agent.head(url.as_str()).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(PalisadeError::Other(format!("S3 HEAD {key}: {e}"))),
        }
    }
}
