//! Naming rules for source keys and converted artifacts.

/// Last path segment of an object key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// File name without its final extension. A leading dot does not start an extension.
pub fn base_name(key: &str) -> &str {
    let name = file_name(key);
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// Deterministic artifact name for a base name and sequence.
pub fn cog_name(base_name: &str, sequence: i32) -> String {
    format!("{}_to_cog_{}.tiff", base_name, sequence)
}
