use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::Client;
use opendal::services::S3;
use std::sync::Arc;

use crate::storage::backend::{ObjectStorage, StorageError, StorageProvider, StorageResult};
use crate::storage::types::{ListPage, ObjectRecord};
use crate::sync::location::CredentialProfile;

/// Public endpoint used for region discovery when no custom endpoint is set.
const AWS_GLOBAL_ENDPOINT: &str = "https://s3.amazonaws.com";

/// S3 provider bound to an explicit credential profile.
///
/// `endpoint` selects an S3-compatible service (MinIO, R2, ...) instead of AWS.
#[derive(Debug, Clone)]
pub struct S3Provider {
    profile: CredentialProfile,
    endpoint: Option<String>,
}

impl S3Provider {
    pub fn new(profile: CredentialProfile) -> Self {
        Self {
            profile,
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    async fn resolve_region(&self, scope: &str) -> StorageResult<String> {
        let endpoint = self.endpoint.as_deref().unwrap_or(AWS_GLOBAL_ENDPOINT);
        S3::detect_region(endpoint, scope)
            .await
            .ok_or_else(|| StorageError::Request {
                operation: "DetectRegion",
                message: format!("no region reported by {} for bucket {}", endpoint, scope),
            })
    }

    async fn connect(&self, region: &str) -> StorageResult<Arc<dyn ObjectStorage>> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()));
        if let Some(name) = self.profile.name() {
            loader = loader.profile_name(name);
        }
        let config = loader.load().await;

        let client = if let Some(ref endpoint) = self.endpoint {
            // S3-compatible services generally need path-style addressing
            let s3_config = aws_sdk_s3::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build();
            Client::from_conf(s3_config)
        } else {
            Client::new(&config)
        };

        Ok(Arc::new(S3Storage::new(client, region)))
    }
}

/// `ObjectStorage` over the AWS SDK client. `Client` is cheap to clone and
/// safe to share between tasks.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    region: String,
}

impl S3Storage {
    pub fn new(client: Client, region: &str) -> Self {
        Self {
            client,
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Build the `CopySource` header value. Each key segment is URL-encoded, the
/// separators are kept.
fn copy_source(scope: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", scope, encoded.join("/"))
}

fn request_error<E: ProvideErrorMetadata>(operation: &'static str, err: SdkError<E>) -> StorageError {
    let message = match err.as_service_error() {
        Some(service_err) => format!(
            "{} ({})",
            service_err.code().unwrap_or("unknown"),
            service_err.message().unwrap_or("no message")
        ),
        None => err.to_string(),
    };
    StorageError::Request { operation, message }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_page(
        &self,
        scope: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: i32,
    ) -> StorageResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(scope)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = scope, prefix = prefix, error = %e, "S3 ListObjectsV2 failed");
                request_error("ListObjectsV2", e)
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let size = object.size().unwrap_or(0).max(0) as u64;
                Some(ObjectRecord::new(key, size))
            })
            .collect();

        let continuation = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            continuation,
        })
    }

    async fn copy_object(
        &self,
        src_scope: &str,
        src_key: &str,
        dst_scope: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();

        self.client
            .copy_object()
            .bucket(dst_scope)
            .copy_source(copy_source(src_scope, src_key))
            .key(dst_key)
            .send()
            .await
            .map_err(|e| request_error("CopyObject", e))?;

        tracing::debug!(
            from = %format!("{}/{}", src_scope, src_key),
            to = %format!("{}/{}", dst_scope, dst_key),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 copy successful"
        );

        Ok(())
    }

    async fn exists(&self, scope: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(scope).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.as_service_error(), Some(HeadObjectError::NotFound(_))) => Ok(false),
            Err(e) => Err(request_error("HeadObject", e)),
        }
    }
}
