//! Version gate for build descriptions
//!
//! A document may carry `min_ver`, the oldest kiln release able to process
//! it. Document authors usually write short versions such as `"0.3"`, so
//! parsing pads missing components before handing the string to semver.

use std::cmp::Ordering;

use semver::Version;

use crate::error::ValidationError;

/// Current kiln version from Cargo.toml
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a version, accepting `"1"`, `"1.2"` and full semver strings
///
/// # Examples
/// ```
/// use kiln::core::version::parse_version;
///
/// assert_eq!(parse_version("0.3").unwrap().to_string(), "0.3.0");
/// assert_eq!(parse_version("1.2.3-rc1").unwrap().to_string(), "1.2.3-rc1");
/// ```
pub fn parse_version(version: &str) -> Result<Version, ValidationError> {
    let trimmed = version.trim().trim_start_matches('v');

    // Split off pre-release/build metadata so only the numeric core is padded
    let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(core_end);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => trimmed.to_string(),
    };

    Version::parse(&padded).map_err(|e| ValidationError::InvalidVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// Compare two versions
///
/// # Returns
/// * `Ordering::Less` if v1 < v2
/// * `Ordering::Equal` if v1 == v2
/// * `Ordering::Greater` if v1 > v2
pub fn compare_versions(v1: &str, v2: &str) -> Result<Ordering, ValidationError> {
    let parsed_v1 = parse_version(v1)?;
    let parsed_v2 = parse_version(v2)?;
    Ok(parsed_v1.cmp(&parsed_v2))
}

/// Check that `actual` satisfies a `min_ver` requirement
pub fn check_min_version(required: &str, actual: &str) -> Result<(), ValidationError> {
    if compare_versions(required, actual)? == Ordering::Greater {
        return Err(ValidationError::VersionTooOld {
            required: required.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Check a `min_ver` requirement against the running kiln
pub fn check_kiln_version(required: &str) -> Result<(), ValidationError> {
    check_min_version(required, CURRENT_VERSION)
}
