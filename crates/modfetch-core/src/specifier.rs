//! Specifier classification and package specifier parsing.
//!
//! Parses bare specifiers like:
//! - `react`
//! - `react@18.2.0`
//! - `lodash@4/debounce`
//! - `@scope/name@1.0.0-rc.1/sub/path`

use crate::error::Error;

/// Version marker used when a specifier carries no explicit version.
pub const LATEST: &str = "latest";

/// How a specifier is written in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Package reference by name (`react`, `@scope/pkg/sub`).
    Bare,
    /// `./x` or `../x`.
    Relative,
    /// `/abs/y` or a platform-absolute path.
    Absolute,
}

impl SpecifierKind {
    /// Classify a specifier. Pure; no filesystem or network access.
    #[must_use]
    pub fn classify(specifier: &str) -> Self {
        if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            return Self::Relative;
        }
        if specifier.starts_with('/') || is_drive_absolute(specifier) {
            return Self::Absolute;
        }
        Self::Bare
    }
}

/// Windows-style `C:/` or `C:\` prefix.
fn is_drive_absolute(specifier: &str) -> bool {
    let bytes = specifier.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// A bare specifier split into its package parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSpecifier {
    /// Full package name (`@scope/name` or `name`).
    pub name: String,
    /// Explicit version or range; `None` means latest.
    pub version: Option<String>,
    /// Subpath within the package; `/`-prefixed or empty.
    pub subpath: String,
}

impl ParsedSpecifier {
    /// Parse a pure (origin-stripped) bare specifier path.
    ///
    /// The version delimiter is the `@` after the name part, which for
    /// scoped packages is the one after `@scope/`. The subpath starts at
    /// the first `/` following the name and optional version.
    ///
    /// # Errors
    /// Returns `MalformedSpecifier` if the name segment is empty.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim().trim_start_matches('/');
        if input.is_empty() {
            return Err(Error::malformed(input, "empty package name"));
        }

        // For scoped packages the name spans the first '/' as well.
        let search_start = if input.starts_with('@') {
            match input.find('/') {
                Some(pos) => pos + 1,
                None => {
                    return Err(Error::malformed(
                        input,
                        "scoped package is missing its name segment",
                    ))
                }
            }
        } else {
            0
        };

        let rest = &input[search_start..];
        let at_pos = rest.find('@');
        let slash_pos = rest.find('/');

        let (name_end, version, subpath) = match (at_pos, slash_pos) {
            // name@version or name@version/sub
            (Some(at), slash) if slash.map_or(true, |s| at < s) => {
                let after_at = &rest[at + 1..];
                match after_at.find('/') {
                    Some(sub) => (
                        search_start + at,
                        Some(after_at[..sub].to_string()),
                        after_at[sub..].to_string(),
                    ),
                    None => (search_start + at, Some(after_at.to_string()), String::new()),
                }
            }
            // name/sub (no version)
            (_, Some(slash)) => (
                search_start + slash,
                None,
                rest[slash..].to_string(),
            ),
            // just a name
            _ => (input.len(), None, String::new()),
        };

        let name = &input[..name_end];
        if name.is_empty() || name == "@" || name.ends_with('/') {
            return Err(Error::malformed(input, "empty package name"));
        }

        // A trailing '@' means no version was actually written.
        let version = version.filter(|v| !v.is_empty());

        Ok(Self {
            name: name.to_string(),
            version,
            subpath: trim_trailing_slash(subpath),
        })
    }

    /// The version to use in URLs, falling back to the latest marker.
    #[must_use]
    pub fn version_or_latest(&self) -> &str {
        self.version.as_deref().unwrap_or(LATEST)
    }

    /// Whether the package is scoped (`@scope/name`).
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.name.starts_with('@')
    }

    /// Re-join the parts into the original pure path form.
    #[must_use]
    pub fn to_path(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{}{}", self.name, version, self.subpath),
            None => format!("{}{}", self.name, self.subpath),
        }
    }
}

fn trim_trailing_slash(mut subpath: String) -> String {
    while subpath.len() > 1 && subpath.ends_with('/') {
        subpath.pop();
    }
    if subpath == "/" {
        String::new()
    } else {
        subpath
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_relative() {
        assert_eq!(SpecifierKind::classify("./x"), SpecifierKind::Relative);
        assert_eq!(SpecifierKind::classify("../lib/y"), SpecifierKind::Relative);
        assert_eq!(SpecifierKind::classify("."), SpecifierKind::Relative);
    }

    #[test]
    fn test_classify_absolute() {
        assert_eq!(SpecifierKind::classify("/abs/y"), SpecifierKind::Absolute);
        assert_eq!(
            SpecifierKind::classify("C:\\Users\\x"),
            SpecifierKind::Absolute
        );
    }

    #[test]
    fn test_classify_bare() {
        assert_eq!(SpecifierKind::classify("react"), SpecifierKind::Bare);
        assert_eq!(
            SpecifierKind::classify("@scope/pkg/sub"),
            SpecifierKind::Bare
        );
        assert_eq!(
            SpecifierKind::classify("esm:lodash@4/debounce"),
            SpecifierKind::Bare
        );
    }

    #[test]
    fn test_parse_simple() {
        let parsed = ParsedSpecifier::parse("react").unwrap();
        assert_eq!(parsed.name, "react");
        assert_eq!(parsed.version, None);
        assert_eq!(parsed.subpath, "");
        assert_eq!(parsed.version_or_latest(), LATEST);
    }

    #[test]
    fn test_parse_with_version() {
        let parsed = ParsedSpecifier::parse("react@18.2.0").unwrap();
        assert_eq!(parsed.name, "react");
        assert_eq!(parsed.version, Some("18.2.0".to_string()));
        assert_eq!(parsed.subpath, "");
    }

    #[test]
    fn test_parse_with_subpath() {
        let parsed = ParsedSpecifier::parse("lodash@4/debounce").unwrap();
        assert_eq!(parsed.name, "lodash");
        assert_eq!(parsed.version, Some("4".to_string()));
        assert_eq!(parsed.subpath, "/debounce");
    }

    #[test]
    fn test_parse_subpath_without_version() {
        let parsed = ParsedSpecifier::parse("lodash/debounce").unwrap();
        assert_eq!(parsed.name, "lodash");
        assert_eq!(parsed.version, None);
        assert_eq!(parsed.subpath, "/debounce");
    }

    #[test]
    fn test_parse_scoped() {
        let parsed = ParsedSpecifier::parse("@types/node").unwrap();
        assert_eq!(parsed.name, "@types/node");
        assert!(parsed.is_scoped());
        assert_eq!(parsed.version, None);
    }

    #[test]
    fn test_parse_scoped_with_version_and_subpath() {
        let parsed = ParsedSpecifier::parse("@babel/core@7.22.0/lib/parse").unwrap();
        assert_eq!(parsed.name, "@babel/core");
        assert_eq!(parsed.version, Some("7.22.0".to_string()));
        assert_eq!(parsed.subpath, "/lib/parse");
    }

    #[test]
    fn test_parse_prerelease_version() {
        let parsed = ParsedSpecifier::parse("pkg@1.0.0-rc.1+build.5/x").unwrap();
        assert_eq!(parsed.version, Some("1.0.0-rc.1+build.5".to_string()));
        assert_eq!(parsed.subpath, "/x");
    }

    #[test]
    fn test_round_trip_law() {
        for input in [
            "react@18.2.0",
            "lodash@4/debounce",
            "@babel/core@7.22.0/lib/parse",
            "pkg@1.0.0-rc.1/a/b/c.js",
        ] {
            let parsed = ParsedSpecifier::parse(input).unwrap();
            assert_eq!(parsed.to_path(), input, "round-trip of '{input}'");
        }
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(ParsedSpecifier::parse("").is_err());
        assert!(ParsedSpecifier::parse("   ").is_err());
        assert!(ParsedSpecifier::parse("@").is_err());
        assert!(ParsedSpecifier::parse("@scope").is_err());
    }

    #[test]
    fn test_trailing_at_means_latest() {
        let parsed = ParsedSpecifier::parse("react@").unwrap();
        assert_eq!(parsed.version, None);
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let parsed = ParsedSpecifier::parse("react@18/").unwrap();
        assert_eq!(parsed.subpath, "");
        let parsed = ParsedSpecifier::parse("lodash/fp/").unwrap();
        assert_eq!(parsed.subpath, "/fp");
    }
}
