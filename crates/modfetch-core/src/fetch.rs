//! HTTP transport and the two-tier fetch cache.
//!
//! The cache layers an in-memory map over an optional on-disk store.
//! Manifest requests are cached permanently (immutable per version);
//! content requests use a stale-while-revalidate policy, returning the
//! cached body immediately and refreshing it in the background.
//!
//! In-flight requests for the same key are not de-duplicated; entries are
//! idempotent per URL, so concurrent duplicate fetches are harmless.

use crate::error::Error;
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// A fetched response body plus the URL it finally came from (after
/// redirects).
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub url: Url,
    pub body: Bytes,
}

/// Object-safe seam over the network.
///
/// Production uses [`HttpTransport`]; tests substitute a scripted map.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<FetchedBody, Error>>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("modfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<FetchedBody, Error>> {
        let client = self.client.clone();
        let url = url.clone();
        Box::pin(async move {
            let response = client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Status {
                    status: status.as_u16(),
                    url,
                });
            }
            let final_url = response.url().clone();
            let body = response.bytes().await?;
            Ok(FetchedBody {
                url: final_url,
                body,
            })
        })
    }
}

/// Two-tier GET response cache with a shared failed-URL set.
///
/// Cheap to clone; all clones share state. Constructed once per build
/// session and handed into every resolve call.
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    transport: Arc<dyn Transport>,
    memory: RwLock<HashMap<String, Arc<FetchedBody>>>,
    failed: RwLock<HashSet<String>>,
    disk: Option<PathBuf>,
}

impl FetchCache {
    /// Create a cache over the given transport, with an optional
    /// persistent tier rooted at `disk`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, disk: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                transport,
                memory: RwLock::new(HashMap::new()),
                failed: RwLock::new(HashSet::new()),
                disk,
            }),
        }
    }

    /// Fetch a URL through the cache.
    ///
    /// `permanent` entries are never refreshed once cached; non-permanent
    /// hits trigger a background refresh that overwrites the entry for
    /// next time.
    ///
    /// # Errors
    /// Returns the transport error on a miss that cannot be fetched, or
    /// `KnownFailed` when the URL is already in the failed set.
    pub async fn get(&self, url: &Url, permanent: bool) -> Result<Arc<FetchedBody>, Error> {
        let key = url.as_str().to_string();

        if self.inner.failed.read().await.contains(&key) {
            return Err(Error::KnownFailed(url.clone()));
        }

        let hit = self.inner.memory.read().await.get(&key).cloned();
        if let Some(cached) = hit {
            if !permanent {
                self.spawn_refresh(url.clone());
            }
            return Ok(cached);
        }

        if let Some(from_disk) = self.read_disk(url) {
            debug!(url = %url, "fetch cache disk hit");
            let cached = Arc::new(from_disk);
            self.inner
                .memory
                .write()
                .await
                .insert(key, cached.clone());
            if !permanent {
                self.spawn_refresh(url.clone());
            }
            return Ok(cached);
        }

        match self.inner.transport.fetch(url).await {
            Ok(body) => Ok(self.store(url, body).await),
            Err(err) => {
                self.inner.failed.write().await.insert(key);
                Err(err)
            }
        }
    }

    /// Whether the URL is in the shared failed set.
    pub async fn is_failed(&self, url: &Url) -> bool {
        self.inner.failed.read().await.contains(url.as_str())
    }

    /// Record a URL as known-bad so future attempts short-circuit.
    pub async fn mark_failed(&self, url: &Url) {
        self.inner
            .failed
            .write()
            .await
            .insert(url.as_str().to_string());
    }

    /// Re-fetch a URL and overwrite its cache entry.
    ///
    /// Refresh failures are logged, never surfaced, and do not poison the
    /// failed set.
    pub async fn refresh(&self, url: &Url) {
        match self.inner.transport.fetch(url).await {
            Ok(body) => {
                self.store(url, body).await;
            }
            Err(err) => warn!(url = %url, error = %err, "background refresh failed"),
        }
    }

    fn spawn_refresh(&self, url: Url) {
        let cache = self.clone();
        tokio::spawn(async move {
            cache.refresh(&url).await;
        });
    }

    async fn store(&self, requested: &Url, body: FetchedBody) -> Arc<FetchedBody> {
        self.write_disk(requested, &body);
        let cached = Arc::new(body);
        self.inner
            .memory
            .write()
            .await
            .insert(requested.as_str().to_string(), cached.clone());
        cached
    }

    fn read_disk(&self, url: &Url) -> Option<FetchedBody> {
        let dir = self.inner.disk.as_ref()?;
        let (body_path, url_path) = disk_paths(dir, url);
        let body = std::fs::read(&body_path).ok()?;
        let final_url = std::fs::read_to_string(&url_path)
            .ok()
            .and_then(|s| Url::parse(s.trim()).ok())
            .unwrap_or_else(|| url.clone());
        Some(FetchedBody {
            url: final_url,
            body: body.into(),
        })
    }

    fn write_disk(&self, requested: &Url, body: &FetchedBody) {
        let Some(dir) = self.inner.disk.as_ref() else {
            return;
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %err, "cannot create cache dir");
            return;
        }
        let (body_path, url_path) = disk_paths(dir, requested);
        if let Err(err) = std::fs::write(&body_path, &body.body)
            .and_then(|()| std::fs::write(&url_path, body.url.as_str()))
        {
            warn!(url = %requested, error = %err, "cannot persist cache entry");
        }
    }
}

fn disk_paths(dir: &Path, url: &Url) -> (PathBuf, PathBuf) {
    let digest = blake3::hash(url.as_str().as_bytes()).to_hex();
    (
        dir.join(format!("{digest}.bin")),
        dir.join(format!("{digest}.url")),
    )
}
