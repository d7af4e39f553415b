//! Origin classification for unit paths.
//!
//! An unpacked bundle mixes first-party application modules with third-party
//! packages and bundler runtime shims. Classification is a fixed substring
//! check against the normalized path — no globbing, no regex.

/// Path fragments that mark a unit as third-party or build tooling.
/// Case-sensitive; compared after `\` → `/` normalization.
const VENDOR_PATH_MARKERS: &[&str] = &[
    "node_modules",
    "webpack/runtime",
    "webpack/bootstrap",
    "(webpack)",
    "vendor/",
    "bower_components",
    "jspm_packages",
    "shims/",
];

/// Return true when `path` points at a vendor / build-tooling unit.
///
/// Empty paths are never vendor.
pub fn is_vendor_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let normalized = path.replace('\\', "/");
    VENDOR_PATH_MARKERS.iter().any(|m| normalized.contains(m))
}
