//! Site-wide advisory notice: packaged asset version drift.

/// Library version the packaged admin assets must match.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Warning shown on every page when the deployed asset bundle was built for another version.
pub fn asset_version_warning(asset_version: Option<&str>) -> Option<String> {
    let asset_version = asset_version.map(str::trim).filter(|v| !v.is_empty())?;
    let normalized = asset_version.trim_start_matches(&['v', '^', '~', '='][..]);
    if normalized == LIBRARY_VERSION {
        return None;
    }
    Some(format!(
        "The packaged admin assets ({}) do not match the library version ({}). \
         Rebuild or reinstall the assets so both versions are the same.",
        asset_version, LIBRARY_VERSION
    ))
}
