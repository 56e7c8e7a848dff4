//! Git directory generator patterns derived from a Flux `spec.path`.
//!
//! Argo CD's directory generator walks the whole repository tree, so the
//! directory Flux bootstraps itself into must always be excluded or it would be
//! deployed as a workload of its own.

use ferry_core::FLUX_SYSTEM_DIR;
use tracing::warn;

/// Pattern matching every top-level directory of the repository.
pub const ALL_DIRECTORIES: &str = "*";

const ROOT_MARKER: &str = "./";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPatterns {
    pub include: String,
    pub exclude: String,
}

/// Derive include/exclude patterns from a Flux path such as `./apps/team1`.
///
/// Everything after the first `./` is the directory prefix. An empty prefix,
/// or a path without the marker at all, means the repository root.
pub fn normalize(path: &str) -> DirectoryPatterns {
    let remainder = match path.split_once(ROOT_MARKER) {
        Some((_, rest)) => rest.trim_end_matches('/'),
        None => {
            if !path.is_empty() {
                warn!(path = %path, "path has no ./ root marker; treating it as the repository root");
            }
            ""
        }
    };
    if remainder.is_empty() {
        DirectoryPatterns { include: ALL_DIRECTORIES.to_string(), exclude: FLUX_SYSTEM_DIR.to_string() }
    } else {
        DirectoryPatterns {
            include: format!("{}/*", remainder),
            exclude: format!("{}/{}", remainder, FLUX_SYSTEM_DIR),
        }
    }
}

/// Operator supplied excludes (in their order) followed by the derived one.
/// Exact duplicates keep only their first occurrence.
pub fn exclude_patterns(derived: &str, extra: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(extra.len() + 1);
    for p in extra.iter().map(String::as_str).chain(std::iter::once(derived)) {
        if p.is_empty() || out.iter().any(|seen| seen == p) { continue; }
        out.push(p.to_string());
    }
    out
}
