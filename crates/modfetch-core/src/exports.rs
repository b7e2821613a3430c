//! Package entry-point resolution.
//!
//! Modern resolution walks the `exports` map under ordered condition sets;
//! legacy resolution falls back to the single-field indicators
//! (`module`/`browser`/`main`/`unpkg`/`bin`).
//!
//! Supported `exports` shapes:
//! - `exports: "./path"` - string shorthand
//! - `exports: { ".": "./path" }` - explicit root
//! - `exports: { ".": { "browser": "./b.js", "default": "./d.js" } }`
//! - `exports: { "./feature": ... }` - subpaths, including `*` patterns

use crate::manifest::PackageManifest;
use serde_json::Value;

/// A named group of resolution conditions tried against `exports` targets.
#[derive(Debug, Clone, Copy)]
pub struct ConditionSet {
    pub names: &'static [&'static str],
    /// Broad sets additionally accept condition entries that don't
    /// enumerate any of the standard names, to maximize hit rate against
    /// real-world manifests.
    pub broad: bool,
}

/// Condition sets in trial order; first success wins.
pub const CONDITION_SETS: &[ConditionSet] = &[
    ConditionSet {
        names: &["browser", "module"],
        broad: false,
    },
    ConditionSet {
        names: &["deno", "worker", "production"],
        broad: true,
    },
    ConditionSet {
        names: &["require"],
        broad: false,
    },
];

/// Legacy fields in trial order.
const LEGACY_FIELDS: &[fn(&PackageManifest) -> Option<&Value>] = &[
    |m| m.module.as_ref(),
    |m| m.browser.as_ref(),
    |m| m.main.as_ref(),
    |m| m.unpkg.as_ref(),
    |m| m.bin.as_ref(),
];

/// Resolve a subpath through the `exports` map, trying each condition set
/// in order.
///
/// `subpath` must be `"."` or `"./..."`. Returns a `"./"`-prefixed target.
#[must_use]
pub fn resolve_entry(exports: &Value, subpath: &str) -> Option<String> {
    CONDITION_SETS
        .iter()
        .find_map(|set| resolve_exports(exports, subpath, set))
}

/// Resolve a subpath through the `exports` map under one condition set.
#[must_use]
pub fn resolve_exports(exports: &Value, subpath: &str, set: &ConditionSet) -> Option<String> {
    if subpath == "." {
        return resolve_root(exports, set);
    }
    resolve_subpath(exports, subpath, set).or_else(|| resolve_pattern(exports, subpath, set))
}

fn resolve_root(exports: &Value, set: &ConditionSet) -> Option<String> {
    if let Some(s) = exports.as_str() {
        return validate_export_path(s);
    }
    let obj = exports.as_object()?;
    if let Some(dot) = obj.get(".") {
        return resolve_target(dot, set);
    }
    // Conditions object at the root level (no "." key).
    if !has_subpath_keys(obj) {
        return resolve_conditions(obj, set);
    }
    None
}

fn resolve_subpath(exports: &Value, subpath: &str, set: &ConditionSet) -> Option<String> {
    if !subpath.starts_with("./") {
        return None;
    }
    let obj = exports.as_object()?;
    if !has_subpath_keys(obj) {
        return None;
    }
    let target = obj.get(subpath)?;
    resolve_target(target, set)
}

/// Pattern exports like `"./*"` or `"./features/*"`.
///
/// Most specific pattern (longest key) wins.
fn resolve_pattern(exports: &Value, subpath: &str, set: &ConditionSet) -> Option<String> {
    if !subpath.starts_with("./") {
        return None;
    }
    let obj = exports.as_object()?;

    let mut matches: Vec<(&str, &Value, String)> = Vec::new();
    for (key, value) in obj {
        if key.chars().filter(|&c| c == '*').count() != 1 || !key.starts_with("./") {
            continue;
        }
        if let Some(star_value) = match_pattern(key, subpath) {
            matches.push((key.as_str(), value, star_value));
        }
    }
    if matches.is_empty() {
        return None;
    }

    matches.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
    let (_, target_value, star_value) = &matches[0];
    let target = resolve_target(target_value, set)?;
    substitute_star(&target, star_value)
}

fn has_subpath_keys(obj: &serde_json::Map<String, Value>) -> bool {
    obj.keys().any(|k| k == "." || k.starts_with("./"))
}

fn match_pattern(pattern: &str, subpath: &str) -> Option<String> {
    let star_pos = pattern.find('*')?;
    let prefix = &pattern[..star_pos];
    let suffix = &pattern[star_pos + 1..];

    if !subpath.starts_with(prefix) {
        return None;
    }
    if !suffix.is_empty() && !subpath.ends_with(suffix) {
        return None;
    }

    let start = prefix.len();
    let end = subpath.len() - suffix.len();
    if start > end {
        return None;
    }
    let star_value = &subpath[start..end];
    if star_value.is_empty() {
        return None;
    }
    Some(star_value.to_string())
}

fn substitute_star(target: &str, star_value: &str) -> Option<String> {
    if target.chars().filter(|&c| c == '*').count() != 1 {
        return None;
    }
    let result = target.replace('*', star_value);
    if !result.starts_with("./") {
        return None;
    }
    if result.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(result)
}

fn resolve_target(target: &Value, set: &ConditionSet) -> Option<String> {
    match target {
        Value::String(s) => validate_export_path(s),
        Value::Object(conditions) => resolve_conditions(conditions, set),
        _ => None,
    }
}

fn resolve_conditions(
    conditions: &serde_json::Map<String, Value>,
    set: &ConditionSet,
) -> Option<String> {
    for name in set.names {
        if let Some(target) = conditions.get(*name) {
            if let Some(resolved) = resolve_target(target, set) {
                return Some(resolved);
            }
        }
    }
    if let Some(target) = conditions.get("default") {
        if let Some(resolved) = resolve_target(target, set) {
            return Some(resolved);
        }
    }
    if set.broad {
        // Accept whatever condition the manifest offers first.
        for (key, target) in conditions {
            if key.starts_with('.') {
                continue;
            }
            if let Some(resolved) = resolve_target(target, set) {
                return Some(resolved);
            }
        }
    }
    None
}

/// Export targets must be relative, starting with `./`.
fn validate_export_path(path: &str) -> Option<String> {
    if path.starts_with("./") {
        Some(path.to_string())
    } else {
        None
    }
}

/// Resolve the entry from legacy single-field indicators.
///
/// A field value may be a string, an array (first string element wins), or
/// a map from input path to output path. For maps the first key with a
/// truthy value whose name neither ends in `.cjs` nor contains a `src/`
/// segment is chosen; if no key qualifies, the first key is taken
/// regardless.
#[must_use]
pub fn resolve_legacy(manifest: &PackageManifest) -> Option<String> {
    LEGACY_FIELDS
        .iter()
        .filter_map(|field| field(manifest))
        .find_map(legacy_value)
}

fn legacy_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.as_str().filter(|s| !s.is_empty()).map(String::from)),
        Value::Object(map) => map
            .iter()
            .find(|(key, value)| {
                truthy(*value) && !key.ends_with(".cjs") && !key.contains("src/")
            })
            .map(|(key, _)| key.clone())
            .or_else(|| map.keys().next().cloned()),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
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
    fn test_exports_string_root() {
        let exports = json!("./dist/index.js");
        assert_eq!(
            resolve_entry(&exports, "."),
            Some("./dist/index.js".to_string())
        );
    }

    #[test]
    fn test_exports_dot_string() {
        let exports = json!({ ".": "./dist/index.mjs" });
        assert_eq!(
            resolve_entry(&exports, "."),
            Some("./dist/index.mjs".to_string())
        );
    }

    #[test]
    fn test_exports_browser_condition_preferred() {
        let exports = json!({
            ".": {
                "browser": "./browser.js",
                "require": "./cjs.cjs",
                "default": "./d.js"
            }
        });
        assert_eq!(resolve_entry(&exports, "."), Some("./browser.js".to_string()));
    }

    #[test]
    fn test_exports_module_condition() {
        let exports = json!({
            ".": { "module": "./esm.mjs", "require": "./cjs.cjs" }
        });
        assert_eq!(resolve_entry(&exports, "."), Some("./esm.mjs".to_string()));
    }

    #[test]
    fn test_exports_broad_fallback_takes_unlisted_condition() {
        // Neither {browser,module} nor default apply; the broad set accepts
        // the first condition offered.
        let exports = json!({
            ".": { "node": "./node.js" }
        });
        assert_eq!(resolve_entry(&exports, "."), Some("./node.js".to_string()));
    }

    #[test]
    fn test_exports_require_last() {
        let exports = json!({ ".": { "require": "./cjs.cjs" } });
        let strict = &CONDITION_SETS[0];
        assert_eq!(resolve_exports(&exports, ".", strict), None);
        assert_eq!(resolve_entry(&exports, "."), Some("./cjs.cjs".to_string()));
    }

    #[test]
    fn test_exports_conditions_at_root_level() {
        let exports = json!({
            "browser": "./b.js",
            "require": "./r.cjs"
        });
        assert_eq!(resolve_entry(&exports, "."), Some("./b.js".to_string()));
    }

    #[test]
    fn test_exports_subpath_exact() {
        let exports = json!({
            ".": "./index.js",
            "./feature": "./dist/feature.js"
        });
        assert_eq!(
            resolve_entry(&exports, "./feature"),
            Some("./dist/feature.js".to_string())
        );
        assert_eq!(resolve_entry(&exports, "./other"), None);
    }

    #[test]
    fn test_exports_pattern() {
        let exports = json!({
            ".": "./index.js",
            "./*": "./dist/*.js",
            "./features/*": "./dist/features/*.js"
        });
        assert_eq!(
            resolve_entry(&exports, "./utils"),
            Some("./dist/utils.js".to_string())
        );
        // Most specific pattern wins.
        assert_eq!(
            resolve_entry(&exports, "./features/auth"),
            Some("./dist/features/auth.js".to_string())
        );
    }

    #[test]
    fn test_exports_pattern_path_traversal_rejected() {
        let exports = json!({ "./*": "./*.js" });
        assert_eq!(resolve_entry(&exports, "./../secret"), None);
    }

    #[test]
    fn test_exports_invalid_target_ignored() {
        assert_eq!(resolve_entry(&json!("https://example.com/x"), "."), None);
        assert_eq!(resolve_entry(&json!("/absolute.js"), "."), None);
        assert_eq!(resolve_entry(&json!("lodash"), "."), None);
    }

    #[test]
    fn test_legacy_browser_field() {
        let m = manifest(json!({ "browser": "dist/browser.js" }));
        assert_eq!(resolve_legacy(&m), Some("dist/browser.js".to_string()));
    }

    #[test]
    fn test_legacy_module_before_browser() {
        let m = manifest(json!({
            "browser": "dist/browser.js",
            "module": "dist/index.mjs"
        }));
        assert_eq!(resolve_legacy(&m), Some("dist/index.mjs".to_string()));
    }

    #[test]
    fn test_legacy_main_only() {
        let m = manifest(json!({ "main": "index.js" }));
        assert_eq!(resolve_legacy(&m), Some("index.js".to_string()));
    }

    #[test]
    fn test_legacy_array_takes_first_string() {
        let m = manifest(json!({ "main": [null, "lib/entry.js"] }));
        assert_eq!(resolve_legacy(&m), Some("lib/entry.js".to_string()));
    }

    #[test]
    fn test_legacy_map_skips_cjs_and_src_keys() {
        let m = manifest(json!({
            "browser": {
                "main.js": false,
                "main.cjs": "./a.cjs",
                "main.mjs": "./a.mjs"
            }
        }));
        assert_eq!(resolve_legacy(&m), Some("main.mjs".to_string()));
    }

    #[test]
    fn test_legacy_map_falls_back_to_first_key() {
        let m = manifest(json!({
            "browser": {
                "src/index.cjs": "./a.cjs",
                "src/other.js": "./b.js"
            }
        }));
        assert_eq!(resolve_legacy(&m), Some("src/index.cjs".to_string()));
    }

    #[test]
    fn test_legacy_none() {
        let m = manifest(json!({ "name": "x" }));
        assert_eq!(resolve_legacy(&m), None);
    }
}
