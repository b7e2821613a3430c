//! Extension probing for URLs written without a file extension.
//!
//! Candidates are the cartesian product of path variants and extension
//! variants, tried in order through the fetch cache. The first success
//! wins; if every variant fails, the first attempt's error is surfaced as
//! the most representative of genuine intent.

use crate::error::Error;
use crate::fetch::{FetchCache, FetchedBody};
use std::future::Future;
use std::sync::Arc;
use url::Url;

const PATH_VARIANTS: &[&str] = &["", "/index"];
const EXT_VARIANTS: &[&str] = &["", ".js", ".mjs", ".ts", ".tsx", ".cjs", ".d.ts"];

/// A successful probe.
#[derive(Debug, Clone)]
pub struct Probed {
    pub url: Url,
    pub body: Arc<FetchedBody>,
    /// Extension of the winning URL, including the dot (`".mjs"`), or
    /// empty when the URL has none.
    pub extension: String,
}

/// Run an ordered list of fallible attempts; first success wins, the
/// first error is kept as the representative failure.
///
/// # Errors
/// Returns the first attempt's error when all fail, or `exhausted()` when
/// there were no attempts at all.
pub async fn first_ok<T, Fut>(
    attempts: impl IntoIterator<Item = Fut>,
    exhausted: impl FnOnce() -> Error,
) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
{
    let mut first_err: Option<Error> = None;
    for attempt in attempts {
        match attempt.await {
            Ok(value) => return Ok(value),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    Err(first_err.unwrap_or_else(exhausted))
}

/// Ordered candidate URLs for an ambiguous base URL.
#[must_use]
pub fn candidates(base: &Url) -> Vec<Url> {
    let base_str = base.as_str().trim_end_matches('/');
    let mut out = Vec::with_capacity(PATH_VARIANTS.len() * EXT_VARIANTS.len());
    for path in PATH_VARIANTS {
        for ext in EXT_VARIANTS {
            if let Ok(candidate) = Url::parse(&format!("{base_str}{path}{ext}")) {
                if !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
    }
    out
}

/// Probe suffix candidates of `base` until one fetch succeeds.
///
/// Every attempt goes through the fetch cache, so failed candidates land
/// in the process-wide failed set and short-circuit future probes.
///
/// # Errors
/// Returns the first candidate's error when every variant fails.
pub async fn probe(cache: &FetchCache, base: &Url) -> Result<Probed, Error> {
    let attempts = candidates(base).into_iter().map(|candidate| {
        let cache = cache.clone();
        async move {
            let body = cache.get(&candidate, false).await?;
            Ok((candidate, body))
        }
    });
    let (url, body) = first_ok(attempts, || Error::Status {
        status: 404,
        url: base.clone(),
    })
    .await?;
    let extension = extension_of(url.path());
    Ok(Probed {
        url,
        body,
        extension,
    })
}

/// Extension of a URL path's final segment, `.d.ts`-aware.
#[must_use]
pub fn extension_of(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    if file.ends_with(".d.ts") && file.len() > ".d.ts".len() {
        return ".d.ts".to_string();
    }
    match file.rfind('.') {
        Some(pos) if pos > 0 => file[pos..].to_string(),
        _ => String::new(),
    }
}
