//! Storage locations.
//!
//! A location URI (`s3://bucket/prefix`) is parsed up front and resolved once
//! into an immutable [`StorageLocation`]: scope, directory-form prefix, the
//! region serving the bucket and a client handle for that region.

use std::fmt;
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::storage::{ObjectStorage, StorageProvider};

/// Supported URI scheme.
pub const SCHEME: &str = "s3";

/// Region assumed when discovery fails.
pub const DEFAULT_FALLBACK_REGION: &str = "us-east-1";

/// Credentials selection, passed explicitly into providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialProfile(Option<String>);

impl CredentialProfile {
    /// Use the SDK default credential chain.
    pub fn default_chain() -> Self {
        Self(None)
    }

    /// Use a named shared-config profile. Blank names select the default chain.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(name))
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Parsed but unresolved location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationUri {
    uri: String,
    scope: String,
    prefix: String,
}

impl LocationUri {
    /// Parse `s3://scope[/prefix]`.
    ///
    /// The prefix comes back in directory form: empty, or ending in a single `/`.
    pub fn parse(uri: &str) -> SyncResult<Self> {
        let trimmed = uri.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| SyncError::invalid_location(uri, "expected s3://bucket/prefix"))?;

        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(SyncError::invalid_location(
                uri,
                format!("unsupported scheme `{}`", scheme),
            ));
        }

        let (scope, path) = rest.split_once('/').unwrap_or((rest, ""));
        if scope.is_empty() {
            return Err(SyncError::invalid_location(uri, "missing bucket name"));
        }
        if scope.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
            return Err(SyncError::invalid_location(
                uri,
                format!("invalid bucket name `{}`", scope),
            ));
        }

        let path = path.trim_matches('/');
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        Ok(Self {
            uri: trimmed.to_string(),
            scope: scope.to_string(),
            prefix,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for LocationUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", SCHEME, self.scope, self.prefix)
    }
}

/// Fully resolved location. Owned by one sync run.
#[derive(Clone)]
pub struct StorageLocation {
    uri: LocationUri,
    region: String,
    storage: Arc<dyn ObjectStorage>,
}

impl StorageLocation {
    pub fn new(uri: LocationUri, region: impl Into<String>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            uri,
            region: region.into(),
            storage,
        }
    }

    pub fn uri(&self) -> &LocationUri {
        &self.uri
    }

    pub fn scope(&self) -> &str {
        self.uri.scope()
    }

    pub fn prefix(&self) -> &str {
        self.uri.prefix()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Full storage key for a key relative to this location's prefix.
    pub fn object_key(&self, relative: &str) -> String {
        format!("{}{}", self.prefix(), relative)
    }

    /// `s3://scope/prefix/relative` for progress output.
    pub fn display_key(&self, relative: &str) -> String {
        format!("{}{}", self.uri, relative)
    }
}

impl fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageLocation")
            .field("uri", &self.uri.to_string())
            .field("region", &self.region)
            .finish()
    }
}

/// One-shot resolver turning URIs into [`StorageLocation`]s.
pub struct LocationResolver {
    provider: Arc<dyn StorageProvider>,
    fallback_region: String,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn StorageProvider>, fallback_region: impl Into<String>) -> Self {
        Self {
            provider,
            fallback_region: fallback_region.into(),
        }
    }

    /// Parse, discover the region and connect a client.
    ///
    /// Malformed URIs fail before any network call. A failed region lookup is
    /// logged and the fallback region is used instead.
    pub async fn resolve(&self, uri: &str) -> SyncResult<StorageLocation> {
        let uri = LocationUri::parse(uri)?;
        let region = self.region_for(uri.scope()).await;

        let storage = self
            .provider
            .connect(&region)
            .await
            .map_err(|e| SyncError::Config(format!("unable to connect to {}: {}", uri, e)))?;

        tracing::debug!(location = %uri, region = %region, "location resolved");
        Ok(StorageLocation::new(uri, region, storage))
    }

    async fn region_for(&self, scope: &str) -> String {
        match self.provider.resolve_region(scope).await {
            Ok(region) if !region.is_empty() => region,
            Ok(_) => {
                tracing::warn!(
                    bucket = scope,
                    fallback = %self.fallback_region,
                    "empty region reported, using fallback"
                );
                self.fallback_region.clone()
            }
            Err(source) => {
                let err = SyncError::RegionResolution {
                    scope: scope.to_string(),
                    source,
                };
                tracing::warn!(fallback = %self.fallback_region, "{}", err);
                self.fallback_region.clone()
            }
        }
    }
}
