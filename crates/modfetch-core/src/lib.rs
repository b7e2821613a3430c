//! CDN module resolution: resolve bare/relative/absolute import
//! specifiers against public CDNs with Node-style package semantics,
//! and serve the fetched content from a virtual file tree.
//!
//! The entry point is [`Resolver`]: `resolve()` turns a specifier into
//! a stable `/node_modules/...` virtual path, `load()` returns the
//! content behind a virtual path together with a loader hint.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod exports;
pub mod fetch;
pub mod manifest;
pub mod origin;
pub mod probe;
pub mod resolve;
pub mod specifier;
pub mod store;

pub use error::Error;
pub use fetch::{FetchCache, FetchedBody, HttpTransport, Transport};
pub use manifest::{PackageManifest, ResolutionContext};
pub use origin::{CdnStyle, CdnTarget, DEFAULT_CDN};
pub use resolve::{Loaded, Resolved, Resolver, ResolverOptions};
pub use specifier::{ParsedSpecifier, SpecifierKind, LATEST};
pub use store::{LoaderHint, VirtualFile, VirtualStore, VIRTUAL_ROOT};
