//! Resolver session: specifier to virtual path, virtual path to content.
//!
//! One `Resolver` is constructed per build session and handed into every
//! resolve/load call; all caches live on it, never in module globals.
//!
//! A resolve request flows classifier -> origin resolver -> (bare)
//! specifier parser -> package metadata resolver -> extension prober ->
//! content store. A load request is a pure store lookup.

use crate::error::Error;
use crate::exports;
use crate::fetch::{FetchCache, HttpTransport, Transport};
use crate::manifest::{PackageManifest, ResolutionContext};
use crate::origin::{CdnStyle, CdnTarget, DEFAULT_CDN};
use crate::probe::{extension_of, probe};
use crate::specifier::{ParsedSpecifier, SpecifierKind};
use crate::store::{LoaderHint, VirtualFile, VirtualStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Per-session resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// CDN used for specifiers without a scheme or recognized origin.
    pub default_cdn: Url,
    /// Root of the persistent fetch-cache tier; in-memory only when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_cdn: Url::parse(DEFAULT_CDN).expect("default CDN constant parses"),
            cache_dir: None,
        }
    }
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub virtual_path: String,
    /// The manifest that drove entry-point resolution, with peer versions
    /// merged from the requesting context. Callers thread it back in as
    /// the ancestor for imports found inside the resolved module.
    pub manifest: Option<Arc<PackageManifest>>,
}

/// Content served back to the build tool.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub content: String,
    pub hint: LoaderHint,
}

/// Resolves import specifiers against CDNs and serves the fetched content.
pub struct Resolver {
    options: ResolverOptions,
    fetch: FetchCache,
    store: VirtualStore,
    /// Manifests keyed by virtual path, re-supplied on index hits.
    manifests: RwLock<HashMap<String, Arc<PackageManifest>>>,
}

/// Outcome of manifest-driven entry resolution.
struct PackageEntry {
    subpath: String,
    manifest: Option<Arc<PackageManifest>>,
}

impl Resolver {
    /// Create a resolver with the production HTTP transport.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(options: ResolverOptions) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(options, transport))
    }

    /// Create a resolver over a caller-supplied transport.
    #[must_use]
    pub fn with_transport(options: ResolverOptions, transport: Arc<dyn Transport>) -> Self {
        let fetch = FetchCache::new(transport, options.cache_dir.clone());
        Self {
            options,
            fetch,
            store: VirtualStore::new(),
            manifests: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &VirtualStore {
        &self.store
    }

    #[must_use]
    pub fn fetch_cache(&self) -> &FetchCache {
        &self.fetch
    }

    /// Resolve a specifier to a virtual path.
    ///
    /// # Errors
    /// Fails with `MalformedSpecifier` when no package name can be
    /// extracted, or `ContentFetch` when every entry and extension
    /// fallback is exhausted.
    pub async fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<Resolved, Error> {
        let key = index_key(ctx.importer.as_deref(), specifier);
        if let Some(virtual_path) = self.store.lookup(&key).await {
            let manifest = self.manifests.read().await.get(&virtual_path).cloned();
            return Ok(Resolved {
                virtual_path,
                manifest,
            });
        }

        let resolved = match SpecifierKind::classify(specifier) {
            SpecifierKind::Relative => self.resolve_relative(specifier, ctx).await?,
            SpecifierKind::Absolute => self.resolve_absolute(specifier, ctx).await?,
            SpecifierKind::Bare => self.resolve_bare(specifier, ctx).await?,
        };

        self.store.remember(&key, &resolved.virtual_path).await;
        Ok(resolved)
    }

    /// Look up previously resolved content by virtual path.
    ///
    /// # Errors
    /// Fails when the path was never resolved.
    pub async fn load(&self, virtual_path: &str) -> Result<Loaded, Error> {
        let file = self
            .store
            .get(virtual_path)
            .await
            .ok_or_else(|| Error::UnknownVirtualPath(virtual_path.to_string()))?;
        Ok(Loaded {
            content: String::from_utf8_lossy(&file.content).into_owned(),
            hint: LoaderHint::from_extension(&extension_of(virtual_path)),
        })
    }

    /// Relative imports resolve against the importer's recorded source
    /// URL, so a file under `/node_modules/pkg/` stays on its own CDN.
    async fn resolve_relative(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<Resolved, Error> {
        let base = self.importer_source(ctx).await;
        let base = match base {
            Some(source) => source,
            None => {
                warn!(specifier, "relative import without a known importer; using default CDN");
                self.options.default_cdn.clone()
            }
        };
        let target = base.join(specifier)?;
        self.fetch_literal(specifier, target.as_str()).await
    }

    /// Absolute imports resolve against the importer's CDN origin root.
    async fn resolve_absolute(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<Resolved, Error> {
        let origin = match self.importer_source(ctx).await {
            Some(source) => {
                CdnTarget::resolve(source.as_str(), &self.options.default_cdn)?.origin
            }
            None => self.options.default_cdn.clone(),
        };
        let target = origin.join(specifier.trim_start_matches('/'))?;
        self.fetch_literal(specifier, target.as_str()).await
    }

    async fn resolve_bare(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<Resolved, Error> {
        let target = CdnTarget::resolve(specifier, &self.options.default_cdn)?;
        match target.style {
            // Path-literal backends have no package.json semantics.
            CdnStyle::Github | CdnStyle::Deno => {
                self.probe_and_store(specifier, &target, None).await
            }
            CdnStyle::Npm | CdnStyle::Other => self.resolve_package(specifier, &target, ctx).await,
        }
    }

    async fn resolve_package(
        &self,
        specifier: &str,
        target: &CdnTarget,
        ctx: &ResolutionContext,
    ) -> Result<Resolved, Error> {
        let mut parsed = ParsedSpecifier::parse(&target.path)?;

        // First-pin rule: a bare sub-import reuses the version its
        // ancestor already declared rather than re-resolving latest.
        if parsed.version.is_none() {
            if let Some(ancestor) = &ctx.ancestor {
                if let Some(pinned) = ancestor.dependency_version(&parsed.name) {
                    parsed.version = Some(pinned.to_string());
                }
            }
        }

        let entry = self.resolve_package_entry(&parsed, target).await;

        // With a manifest, the fetched name/version win over the parsed
        // ones; CDNs redirect latest to a concrete version. Without one,
        // the URL is probed exactly as written: rewriting an unversioned
        // path would invent an `@latest` segment the origin may not
        // understand.
        let entry_url = match &entry.manifest {
            Some(manifest) => {
                let name = manifest.name.as_deref().unwrap_or(&parsed.name);
                let version = manifest
                    .version
                    .as_deref()
                    .unwrap_or_else(|| parsed.version_or_latest());
                target
                    .origin
                    .join(&format!("{name}@{version}{}", entry.subpath))?
            }
            None => target.url.clone(),
        };
        let probed = probe(&self.fetch, &entry_url)
            .await
            .map_err(|source| Error::content_fetch(specifier, source))?;

        let virtual_path = VirtualStore::virtual_path_for(&target.origin, &probed.url);
        self.store
            .put(VirtualFile {
                path: virtual_path.clone(),
                content: probed.body.body.clone(),
                source_url: probed.url.clone(),
            })
            .await;

        let manifest = entry.manifest.map(|manifest| match &ctx.ancestor {
            Some(ancestor) => Arc::new(manifest.with_merged_peers(ancestor.as_ref())),
            None => manifest,
        });
        if let Some(manifest) = &manifest {
            self.manifests
                .write()
                .await
                .insert(virtual_path.clone(), manifest.clone());
        }

        Ok(Resolved {
            virtual_path,
            manifest,
        })
    }

    /// Fetch the nearest package.json candidates and resolve the entry
    /// subpath. All failures here are recoverable: the worst case is
    /// literal-path resolution of the original subpath.
    async fn resolve_package_entry(
        &self,
        parsed: &ParsedSpecifier,
        target: &CdnTarget,
    ) -> PackageEntry {
        let package = format!("{}@{}", parsed.name, parsed.version_or_latest());
        let directory_like = is_directory_like(&parsed.subpath);

        let root_url = target.origin.join(&format!("{package}/package.json")).ok();
        let local_url = if directory_like && !parsed.subpath.is_empty() {
            target
                .origin
                .join(&format!("{package}{}/package.json", parsed.subpath))
                .ok()
        } else {
            None
        };

        let (local, root) = futures::join!(
            self.fetch_manifest(local_url.as_ref()),
            self.fetch_manifest(root_url.as_ref()),
        );

        // Prefer the subpath-local manifest: it reflects monorepo
        // sub-package boundaries. With an empty subpath the root manifest
        // *is* the subpath-local one.
        let (manifest, subpath_local) = match (local, root) {
            (Some(manifest), _) => (manifest, true),
            (None, Some(manifest)) => (manifest, parsed.subpath.is_empty()),
            (None, None) => {
                warn!(
                    package = %package,
                    "no manifest reachable; falling back to literal path"
                );
                return PackageEntry {
                    subpath: parsed.subpath.clone(),
                    manifest: None,
                };
            }
        };

        let relative = relative_subpath(&parsed.subpath);
        let modern = manifest
            .exports
            .as_ref()
            .and_then(|exports| exports::resolve_entry(exports, &relative))
            .map(normalize_entry);
        let resolved = modern.or_else(|| {
            if subpath_local {
                exports::resolve_legacy(&manifest).map(normalize_entry)
            } else {
                None
            }
        });

        let subpath = match resolved {
            // A subpath-local entry is relative to that sub-directory,
            // not the package root.
            Some(entry) if subpath_local && !parsed.subpath.is_empty() => {
                format!("{}{entry}", parsed.subpath)
            }
            Some(entry) => entry,
            None => {
                let err = Error::entry_resolution(&package, &parsed.subpath);
                warn!(error = %err, "using subpath as-is");
                parsed.subpath.clone()
            }
        };

        PackageEntry {
            subpath,
            manifest: Some(Arc::new(manifest)),
        }
    }

    async fn fetch_manifest(&self, url: Option<&Url>) -> Option<PackageManifest> {
        let url = url?;
        match self.fetch.get(url, true).await {
            Ok(body) => match PackageManifest::parse(&body.body) {
                Ok(manifest) => Some(manifest),
                Err(err) => {
                    let err = Error::manifest_fetch(url.clone(), err.to_string());
                    warn!(error = %err, "manifest is not valid JSON");
                    None
                }
            },
            Err(err) => {
                let err = Error::manifest_fetch(url.clone(), err.to_string());
                debug!(error = %err, "manifest fetch failed");
                None
            }
        }
    }

    /// Probe a literal URL (no manifest semantics) and store the result.
    async fn fetch_literal(&self, specifier: &str, url: &str) -> Result<Resolved, Error> {
        let target = CdnTarget::resolve(url, &self.options.default_cdn)?;
        self.probe_and_store(specifier, &target, None).await
    }

    async fn probe_and_store(
        &self,
        specifier: &str,
        target: &CdnTarget,
        manifest: Option<Arc<PackageManifest>>,
    ) -> Result<Resolved, Error> {
        let probed = probe(&self.fetch, &target.url)
            .await
            .map_err(|source| Error::content_fetch(specifier, source))?;
        let virtual_path = VirtualStore::virtual_path_for(&target.origin, &probed.url);
        self.store
            .put(VirtualFile {
                path: virtual_path.clone(),
                content: probed.body.body.clone(),
                source_url: probed.url.clone(),
            })
            .await;
        Ok(Resolved {
            virtual_path,
            manifest,
        })
    }

    /// Source URL of the importing file, when it came through this store.
    async fn importer_source(&self, ctx: &ResolutionContext) -> Option<Url> {
        let importer = ctx.importer.as_deref()?;
        let file = self.store.get(importer).await?;
        Some(file.source_url.clone())
    }
}

/// Index key for the specifier-to-path cache. Relative and absolute
/// specifiers are scoped to their importer.
fn index_key(importer: Option<&str>, specifier: &str) -> String {
    match (importer, SpecifierKind::classify(specifier)) {
        (Some(importer), SpecifierKind::Relative | SpecifierKind::Absolute) => {
            format!("{importer}|{specifier}")
        }
        _ => specifier.to_string(),
    }
}

/// A subpath with no extension on its last segment names a directory.
fn is_directory_like(subpath: &str) -> bool {
    match subpath.rsplit('/').next() {
        Some(last) => !last.contains('.'),
        None => true,
    }
}

/// Convert a stored subpath (`/x`, `""`) to exports-map form (`./x`, `.`).
fn relative_subpath(subpath: &str) -> String {
    if subpath.is_empty() || subpath == "/" {
        ".".to_string()
    } else {
        format!(".{subpath}")
    }
}

/// Normalize an exports/legacy result (`./dist/x`, `dist/x`) to a
/// `/`-prefixed subpath.
fn normalize_entry(entry: String) -> String {
    let trimmed = entry.trim_start_matches("./").trim_start_matches('/');
    format!("/{trimmed}")
}
