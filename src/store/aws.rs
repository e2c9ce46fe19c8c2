//! S3 and S3-compatible object storage.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use ::s3::creds::Credentials as S3Credentials;
use ::s3::error::S3Error;
use ::s3::region::Region;
use ::s3::{Bucket, BucketConfiguration};

use super::{CreateOutcome, ObjectPut, ObjectStore, StoreError};
use crate::session::Credentials;

/// Characters left as-is in object keys of public URLs.
const KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// A store backed by S3, or any endpoint speaking the S3 API.
///
/// With a custom endpoint, requests and URLs are path-style; otherwise buckets are addressed
/// virtual-host style on the regional AWS host.
pub struct S3Store {
    region_name: String,
    endpoint: Option<String>,
    region: Region,
    credentials: S3Credentials,
}

impl S3Store {
    pub fn new(
        region: &str,
        endpoint: Option<&str>,
        credentials: &Credentials,
    ) -> Result<Self, StoreError> {
        let endpoint = endpoint.map(|e| e.trim_end_matches('/').to_string());
        let host = endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com"));
        let credentials = S3Credentials::new(
            Some(&credentials.access_key_id),
            Some(&credentials.secret_access_key),
            None,
            credentials.session_token.as_deref(),
            None,
        )
        .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            region_name: region.to_string(),
            endpoint,
            region: Region::Custom {
                region: region.to_string(),
                endpoint: host,
            },
            credentials,
        })
    }

    fn path_style(&self) -> bool {
        self.endpoint.is_some()
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StoreError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(from_s3)?;
        Ok(if self.path_style() {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone())
            .await
            .map_err(from_s3)?;
        Ok(response.bucket_names().collect())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<CreateOutcome, StoreError> {
        let region = self.region.clone();
        let credentials = self.credentials.clone();
        let config = BucketConfiguration::default();
        let result = if self.path_style() {
            Bucket::create_with_path_style(bucket, region, credentials, config).await
        } else {
            Bucket::create(bucket, region, credentials, config).await
        };

        match result {
            Ok(response) if response.success() => Ok(CreateOutcome::Created),
            Ok(response) => {
                classify_create(bucket, response.response_code, response.response_text)
            }
            Err(S3Error::HttpFailWithBody(status, body)) => classify_create(bucket, status, body),
            Err(e) => Err(from_s3(e)),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.bucket(bucket)?.exists().await.map_err(from_s3)
    }

    async fn put_object(&self, put: ObjectPut) -> Result<(), StoreError> {
        let mut bucket = self.bucket(&put.bucket)?;
        bucket.add_header("x-amz-acl", put.acl.as_header());
        let response = bucket
            .put_object_with_content_type(&put.key, &put.body, &put.content_type)
            .await
            .map_err(from_s3)?;
        match response.status_code() {
            200..=299 => Ok(()),
            status => Err(StoreError::Rejected {
                status,
                message: String::from_utf8_lossy(response.as_slice()).into_owned(),
            }),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = utf8_percent_encode(key, KEY_ENCODE);
        match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{bucket}/{key}"),
            None => format!(
                "https://{bucket}.s3.{}.amazonaws.com/{key}",
                self.region_name
            ),
        }
    }
}

/// Sorts a failed creation into "ours already", "someone else's" or a plain rejection.
fn classify_create(bucket: &str, status: u16, body: String) -> Result<CreateOutcome, StoreError> {
    match status {
        409 if body.contains("BucketAlreadyOwnedByYou") => Ok(CreateOutcome::AlreadyOwned),
        409 => Err(StoreError::Conflict(bucket.to_string())),
        _ => Err(StoreError::Rejected {
            status,
            message: body,
        }),
    }
}

fn from_s3(err: S3Error) -> StoreError {
    match err {
        S3Error::HttpFailWithBody(status, message) => StoreError::Rejected { status, message },
        other => StoreError::Transport(other.to_string()),
    }
}
