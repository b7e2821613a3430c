use thiserror::Error;
use url::Url;

/// Core error type for resolution and loading.
///
/// Only `MalformedSpecifier` and `ContentFetch` escape a `resolve` call;
/// manifest and entry-point failures are absorbed by the package metadata
/// resolver and degrade to literal-path resolution.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed specifier '{specifier}': {reason}")]
    MalformedSpecifier { specifier: String, reason: String },

    #[error("Failed to fetch manifest at {url}: {reason}")]
    ManifestFetch { url: Url, reason: String },

    #[error("No entry point for subpath '{subpath}' in '{package}'")]
    EntryResolution { package: String, subpath: String },

    #[error("Failed to fetch content for '{specifier}'")]
    ContentFetch {
        specifier: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Request previously failed for {0}")]
    KnownFailed(Url),

    #[error("Request failed with status {status} for {url}")]
    Status { status: u16, url: Url },

    #[error("No cached content at '{0}'")]
    UnknownVirtualPath(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn malformed(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSpecifier {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    pub fn manifest_fetch(url: Url, reason: impl Into<String>) -> Self {
        Self::ManifestFetch {
            url,
            reason: reason.into(),
        }
    }

    pub fn entry_resolution(package: impl Into<String>, subpath: impl Into<String>) -> Self {
        Self::EntryResolution {
            package: package.into(),
            subpath: subpath.into(),
        }
    }

    #[must_use]
    pub fn content_fetch(specifier: impl Into<String>, source: Error) -> Self {
        Self::ContentFetch {
            specifier: specifier.into(),
            source: Box::new(source),
        }
    }

    /// Whether the resolver may absorb this failure and fall back to
    /// literal-path resolution.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ManifestFetch { .. } | Self::EntryResolution { .. }
        )
    }
}
