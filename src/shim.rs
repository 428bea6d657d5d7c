//! Compatibility shim for third-party stage packs.
//!
//! Two historical workarounds live here, kept in one place so the rest of
//! the pipeline stays clean:
//!
//! 1. [`admit`] filters stage registrations. The `legacy-css` pack registers
//!    stages that conflict with the built-in style pipeline, so its names
//!    are denied wholesale at registration time.
//! 2. [`rewrite_vendor_paths`] fixes up bundle inputs. Reference scanning
//!    resolves every input against the intermediate tree, but third-party
//!    files (anything under a vendor marker such as `node_modules`) are
//!    never compiled into it and must be read from their original location.

use std::path::{Path, PathBuf};

/// Stage-name prefixes that are never admitted into a task graph.
const DENIED_STAGE_FAMILY: &[&str] = &["legacy-css"];

/// Whether a stage name may be registered.
pub fn admit(stage_name: &str) -> bool {
    !DENIED_STAGE_FAMILY.iter().any(|prefix| stage_name.starts_with(prefix))
}

/// Strip the intermediate-tree prefix from vendor inputs.
///
/// `temp_root` is the project-relative intermediate directory (for example
/// `temp`). An input is a vendor input when any of its components contains
/// one of `markers`. Idempotent: inputs already outside the intermediate
/// tree are left alone, so re-running a build never double-rewrites a plan
/// read back from disk.
pub fn rewrite_vendor_paths(inputs: &mut [PathBuf], temp_root: &Path, markers: &[String]) {
    for input in inputs.iter_mut() {
        if !is_vendor_path(input, markers) {
            continue;
        }
        if let Ok(stripped) = input.strip_prefix(temp_root) {
            *input = stripped.to_path_buf();
        }
    }
}

fn is_vendor_path(path: &Path, markers: &[String]) -> bool {
    path.components().any(|component| {
        let text = component.as_os_str().to_string_lossy();
        markers.iter().any(|marker| text.contains(marker.as_str()))
    })
}
