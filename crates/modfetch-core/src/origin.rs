//! CDN origin resolution.
//!
//! Maps scheme prefixes (`esm:react`, `unpkg:lodash@4`) and recognized
//! fully-qualified origins to a normalized base URL, and strips the prefix
//! to obtain the pure specifier path.

use crate::error::Error;
use url::Url;

/// Default CDN used when a specifier carries no scheme or known origin.
pub const DEFAULT_CDN: &str = "https://unpkg.com/";

/// Resolution semantics supported by a CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdnStyle {
    /// Versioned, package.json-aware resolution.
    Npm,
    /// Path-literal; no package.json semantics.
    Github,
    /// Path-literal; no package.json semantics.
    Deno,
    /// Unknown backend; npm-style resolution is attempted, failures are
    /// non-fatal.
    Other,
}

struct KnownCdn {
    schemes: &'static [&'static str],
    origins: &'static [&'static str],
    base: &'static str,
    style: CdnStyle,
}

const KNOWN_CDNS: &[KnownCdn] = &[
    KnownCdn {
        schemes: &["skypack"],
        origins: &["https://cdn.skypack.dev"],
        base: "https://cdn.skypack.dev/",
        style: CdnStyle::Npm,
    },
    KnownCdn {
        schemes: &["esm", "esm.sh"],
        origins: &["https://cdn.esm.sh", "https://esm.sh"],
        base: "https://cdn.esm.sh/",
        style: CdnStyle::Npm,
    },
    KnownCdn {
        schemes: &["unpkg"],
        origins: &["https://unpkg.com"],
        base: "https://unpkg.com/",
        style: CdnStyle::Npm,
    },
    KnownCdn {
        schemes: &["jsdelivr", "esm.run"],
        origins: &["https://cdn.jsdelivr.net/npm", "https://esm.run"],
        base: "https://cdn.jsdelivr.net/npm/",
        style: CdnStyle::Npm,
    },
    KnownCdn {
        schemes: &["jsdelivr.gh"],
        origins: &["https://cdn.jsdelivr.net/gh"],
        base: "https://cdn.jsdelivr.net/gh/",
        style: CdnStyle::Github,
    },
    KnownCdn {
        schemes: &["deno"],
        origins: &["https://deno.land"],
        base: "https://deno.land/",
        style: CdnStyle::Deno,
    },
    KnownCdn {
        schemes: &["github"],
        origins: &["https://raw.githubusercontent.com"],
        base: "https://raw.githubusercontent.com/",
        style: CdnStyle::Github,
    },
];

/// A specifier mapped onto a concrete CDN.
#[derive(Debug, Clone)]
pub struct CdnTarget {
    /// Base URL, normalized to end with `/`.
    pub origin: Url,
    /// The specifier with any scheme or known-origin prefix stripped.
    pub path: String,
    /// `origin` joined with `path`.
    pub url: Url,
    pub style: CdnStyle,
}

impl CdnTarget {
    /// Map a specifier to a CDN origin and pure path.
    ///
    /// Scheme prefixes and recognized fully-qualified origins take
    /// precedence over `default_cdn`.
    ///
    /// # Errors
    /// Returns an error if the resulting URL cannot be parsed.
    pub fn resolve(specifier: &str, default_cdn: &Url) -> Result<Self, Error> {
        if specifier.contains("://") {
            for cdn in KNOWN_CDNS {
                for origin in cdn.origins {
                    if let Some(rest) = strip_origin(specifier, origin) {
                        return Self::build(Url::parse(cdn.base)?, rest, cdn.style);
                    }
                }
            }
            // Unknown origin: conservative, rooted at the URL's own host.
            let url = Url::parse(specifier)?;
            let mut origin = url.clone();
            origin.set_path("/");
            origin.set_query(None);
            origin.set_fragment(None);
            let path = url.path().trim_start_matches('/').to_string();
            return Self::build(origin, &path, CdnStyle::Other);
        }

        if let Some((scheme, rest)) = specifier.split_once(':') {
            if !rest.starts_with("//") {
                for cdn in KNOWN_CDNS {
                    if cdn.schemes.contains(&scheme) {
                        return Self::build(Url::parse(cdn.base)?, rest, cdn.style);
                    }
                }
            }
        }

        let origin = ensure_trailing_slash(default_cdn.clone());
        let style = style_of_origin(&origin);
        Self::build(origin, specifier, style)
    }

    fn build(origin: Url, path: &str, style: CdnStyle) -> Result<Self, Error> {
        let origin = ensure_trailing_slash(origin);
        let path = path.trim_start_matches('/').to_string();
        let url = origin.join(&path)?;
        Ok(Self {
            origin,
            path,
            url,
            style,
        })
    }
}

/// Strip a known origin prefix, requiring a segment boundary after it.
fn strip_origin<'a>(specifier: &'a str, origin: &str) -> Option<&'a str> {
    let rest = specifier.strip_prefix(origin)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Classify a base URL against the known CDN table.
fn style_of_origin(origin: &Url) -> CdnStyle {
    let origin_str = origin.as_str().trim_end_matches('/');
    for cdn in KNOWN_CDNS {
        if cdn.origins.contains(&origin_str) {
            return cdn.style;
        }
    }
    CdnStyle::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_cdn() -> Url {
        Url::parse(DEFAULT_CDN).unwrap()
    }

    #[test]
    fn test_scheme_precedence_over_default() {
        let target = CdnTarget::resolve("esm:react", &default_cdn()).unwrap();
        assert_eq!(target.origin.as_str(), "https://cdn.esm.sh/");
        assert_eq!(target.path, "react");
        assert_eq!(target.url.as_str(), "https://cdn.esm.sh/react");
        assert_eq!(target.style, CdnStyle::Npm);
    }

    #[test]
    fn test_default_cdn_used_for_plain_bare() {
        let target = CdnTarget::resolve("react@18.2.0", &default_cdn()).unwrap();
        assert_eq!(target.origin.as_str(), "https://unpkg.com/");
        assert_eq!(target.path, "react@18.2.0");
        assert_eq!(target.style, CdnStyle::Npm);
    }

    #[test]
    fn test_known_origin_recognized() {
        let target = CdnTarget::resolve(
            "https://cdn.jsdelivr.net/npm/lodash@4/debounce",
            &default_cdn(),
        )
        .unwrap();
        assert_eq!(target.origin.as_str(), "https://cdn.jsdelivr.net/npm/");
        assert_eq!(target.path, "lodash@4/debounce");
        assert_eq!(target.style, CdnStyle::Npm);
    }

    #[test]
    fn test_origin_match_requires_boundary() {
        // "https://esm.sh" must not swallow a longer host.
        let target = CdnTarget::resolve("https://esm.shady.example/x", &default_cdn()).unwrap();
        assert_eq!(target.style, CdnStyle::Other);
        assert_eq!(target.origin.as_str(), "https://esm.shady.example/");
        assert_eq!(target.path, "x");
    }

    #[test]
    fn test_github_style() {
        let target = CdnTarget::resolve("github:user/repo/main/src/x.js", &default_cdn()).unwrap();
        assert_eq!(target.style, CdnStyle::Github);
        assert_eq!(
            target.url.as_str(),
            "https://raw.githubusercontent.com/user/repo/main/src/x.js"
        );
    }

    #[test]
    fn test_deno_style() {
        let target = CdnTarget::resolve("deno:std@0.200.0/path/mod.ts", &default_cdn()).unwrap();
        assert_eq!(target.style, CdnStyle::Deno);
        assert_eq!(target.origin.as_str(), "https://deno.land/");
    }

    #[test]
    fn test_esm_run_alias() {
        let target = CdnTarget::resolve("esm.run:preact", &default_cdn()).unwrap();
        assert_eq!(target.origin.as_str(), "https://cdn.jsdelivr.net/npm/");
    }

    #[test]
    fn test_unknown_default_is_other_style() {
        let default = Url::parse("https://cdn.example.com/modules").unwrap();
        let target = CdnTarget::resolve("react", &default).unwrap();
        assert_eq!(target.style, CdnStyle::Other);
        // Trailing slash is always added.
        assert_eq!(target.origin.as_str(), "https://cdn.example.com/modules/");
        assert_eq!(
            target.url.as_str(),
            "https://cdn.example.com/modules/react"
        );
    }

    #[test]
    fn test_scoped_path_preserved() {
        let target = CdnTarget::resolve("unpkg:@scope/pkg@1.0.0/x", &default_cdn()).unwrap();
        assert_eq!(target.path, "@scope/pkg@1.0.0/x");
        assert_eq!(
            target.url.as_str(),
            "https://unpkg.com/@scope/pkg@1.0.0/x"
        );
    }
}
