//! Package manifest (package.json) model and resolution context.

use crate::error::Error;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Parsed contents of a `package.json`.
///
/// `exports` and the legacy entry fields stay untyped: real-world manifests
/// use strings, arrays, and maps interchangeably, and entry resolution
/// interprets them structurally.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub exports: Option<Value>,
    pub main: Option<Value>,
    pub module: Option<Value>,
    pub browser: Option<Value>,
    pub unpkg: Option<Value>,
    pub bin: Option<Value>,
    pub dependencies: Map<String, Value>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: Map<String, Value>,
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: Map<String, Value>,
}

impl PackageManifest {
    /// Parse manifest bytes.
    ///
    /// # Errors
    /// Returns an error if the body is not valid JSON.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Look up the pinned version for a dependency name.
    ///
    /// Checks `dependencies`, then `peerDependencies`, then
    /// `devDependencies`; non-string entries are ignored.
    #[must_use]
    pub fn dependency_version(&self, name: &str) -> Option<&str> {
        [
            &self.dependencies,
            &self.peer_dependencies,
            &self.dev_dependencies,
        ]
        .into_iter()
        .find_map(|table| table.get(name).and_then(Value::as_str))
    }

    /// Return a copy whose `peerDependencies` are overwritten with the
    /// versions the parent manifest already pinned, so a later bare import
    /// of the same peer reuses that version instead of `latest`.
    #[must_use]
    pub fn with_merged_peers(&self, parent: &PackageManifest) -> PackageManifest {
        let mut merged = self.clone();
        let names: Vec<String> = merged.peer_dependencies.keys().cloned().collect();
        for name in names {
            if let Some(version) = parent.dependency_version(&name) {
                merged
                    .peer_dependencies
                    .insert(name, Value::String(version.to_string()));
            }
        }
        merged
    }
}

/// Per-resolve state threaded from importer to imported module.
///
/// Constructed fresh for the entry point and derived via [`for_import`]
/// for each resolved module; never global.
///
/// [`for_import`]: ResolutionContext::for_import
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    /// Virtual path of the importing file, if any.
    pub importer: Option<String>,
    /// Nearest ancestor manifest; supplies pinned dependency versions.
    pub ancestor: Option<Arc<PackageManifest>>,
}

impl ResolutionContext {
    /// Context for a top-level entry point.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Context for imports found inside a resolved module.
    #[must_use]
    pub fn for_import(
        importer: impl Into<String>,
        ancestor: Option<Arc<PackageManifest>>,
    ) -> Self {
        Self {
            importer: Some(importer.into()),
            ancestor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: Value) -> PackageManifest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_minimal() {
        let m = PackageManifest::parse(br#"{"name":"react","version":"18.2.0"}"#).unwrap();
        assert_eq!(m.name.as_deref(), Some("react"));
        assert_eq!(m.version.as_deref(), Some("18.2.0"));
        assert!(m.exports.is_none());
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(PackageManifest::parse(b"not json").is_err());
    }

    #[test]
    fn test_dependency_version_order() {
        let m = manifest(json!({
            "dependencies": { "a": "1.0.0" },
            "peerDependencies": { "a": "2.0.0", "b": "3.0.0" },
            "devDependencies": { "c": "4.0.0", "bad": 7 }
        }));
        assert_eq!(m.dependency_version("a"), Some("1.0.0"));
        assert_eq!(m.dependency_version("b"), Some("3.0.0"));
        assert_eq!(m.dependency_version("c"), Some("4.0.0"));
        assert_eq!(m.dependency_version("bad"), None);
        assert_eq!(m.dependency_version("missing"), None);
    }

    #[test]
    fn test_merge_peers_pins_parent_versions() {
        let parent = manifest(json!({
            "dependencies": { "react": "18.2.0" }
        }));
        let child = manifest(json!({
            "peerDependencies": { "react": ">=16", "vue": "^3" }
        }));
        let merged = child.with_merged_peers(&parent);
        assert_eq!(
            merged.peer_dependencies.get("react").and_then(Value::as_str),
            Some("18.2.0")
        );
        // Unknown peers keep their declared range.
        assert_eq!(
            merged.peer_dependencies.get("vue").and_then(Value::as_str),
            Some("^3")
        );
    }
}
