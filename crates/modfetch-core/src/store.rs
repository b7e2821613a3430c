//! Virtual content store.
//!
//! Fetched CDN content is stored under synthetic `/node_modules/...` paths
//! the build tool can address. The version segment is normalized away so
//! differently-formatted references to the same package version share one
//! entry, and each entry records its source URL so relative imports from
//! inside a stored file resolve against the file's own origin.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Root prefix of every virtual path.
pub const VIRTUAL_ROOT: &str = "/node_modules";

/// Loader category hint derived from a virtual path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderHint {
    /// Source code; `.js`/`.cjs` normalize to the TypeScript-capable
    /// loader.
    Ts,
    /// Source code with JSX; `.jsx` normalizes to `.tsx`.
    Tsx,
    /// Stylesheet.
    Css,
    /// Embed as data URL (images, fonts).
    DataUrl,
    /// Raw text.
    Text,
    /// Binary passthrough.
    Binary,
}

impl LoaderHint {
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.') {
            "jsx" | "tsx" => Self::Tsx,
            "css" | "scss" | "sass" => Self::Css,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "ico" | "woff" | "woff2"
            | "ttf" | "otf" | "eot" => Self::DataUrl,
            "svg" | "html" | "txt" | "md" => Self::Text,
            "wasm" => Self::Binary,
            // Code extensions and the extensionless default.
            _ => Self::Ts,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Tsx => "tsx",
            Self::Css => "css",
            Self::DataUrl => "dataurl",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

/// One stored file.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    pub path: String,
    pub content: Bytes,
    /// The CDN URL the content was fetched from.
    pub source_url: Url,
}

/// Process-wide content store plus the specifier-to-path index.
///
/// Cheap to clone; clones share state. Entries are only ever inserted or
/// overwritten by key, so concurrent readers never observe partial state.
#[derive(Clone, Default)]
pub struct VirtualStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    files: RwLock<HashMap<String, Arc<VirtualFile>>>,
    index: RwLock<HashMap<String, String>>,
}

impl VirtualStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fetched file. Writes only happen after a fully successful
    /// fetch; partial content never lands here.
    pub async fn put(&self, file: VirtualFile) {
        self.inner
            .files
            .write()
            .await
            .insert(file.path.clone(), Arc::new(file));
    }

    pub async fn get(&self, virtual_path: &str) -> Option<Arc<VirtualFile>> {
        self.inner.files.read().await.get(virtual_path).cloned()
    }

    /// Record a specifier-to-path mapping so repeated resolution of the
    /// same specifier is a plain lookup.
    pub async fn remember(&self, specifier: &str, virtual_path: &str) {
        self.inner
            .index
            .write()
            .await
            .insert(specifier.to_string(), virtual_path.to_string());
    }

    pub async fn lookup(&self, specifier: &str) -> Option<String> {
        self.inner.index.read().await.get(specifier).cloned()
    }

    /// Build the virtual path for a resolved CDN URL.
    ///
    /// The CDN origin's own path prefix is dropped and the `@version`
    /// segment is stripped, so `/react@18.2.0/index.js` maps to
    /// `/node_modules/react/index.js` however the version was written.
    #[must_use]
    pub fn virtual_path_for(origin: &Url, url: &Url) -> String {
        let path = url.path().replace("%40", "@");
        let rel = path
            .strip_prefix(origin.path())
            .unwrap_or_else(|| path.trim_start_matches('/'));

        let mut out = String::from(VIRTUAL_ROOT);
        for segment in rel.split('/') {
            if segment.is_empty() {
                continue;
            }
            out.push('/');
            out.push_str(strip_version(segment));
        }
        out
    }
}

/// Drop a `@version` suffix from a path segment; a leading `@` is a scope
/// marker, not a version delimiter.
fn strip_version(segment: &str) -> &str {
    match segment.char_indices().find(|&(pos, c)| c == '@' && pos > 0) {
        Some((pos, _)) => &segment[..pos],
        None => segment,
    }
}
