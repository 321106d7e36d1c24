//! Page path normalization and element key derivation.

use sha2::{Digest, Sha256};

pub const DEFAULT_PAGE: &str = "index.html";

/// Normalize a project-relative page path.
///
/// Backslashes become `/`, leading slashes and `.`/`..` segments are dropped.
/// An empty result falls back to `index.html`.
pub fn normalize_page_path(raw: Option<&str>) -> String {
    let value = raw.unwrap_or(DEFAULT_PAGE).replace('\\', "/");
    let parts: Vec<&str> = value
        .trim()
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect();

    if parts.is_empty() {
        DEFAULT_PAGE.to_string()
    } else {
        parts.join("/")
    }
}

/// Uppercase hex SHA-256 of `input`
pub fn sha256_hex(input: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(input))
}

/// Stable element key for a selector on a page: `el_` + 16 hex chars.
pub fn build_element_key(page_path: &str, selector: &str) -> String {
    let seed = format!("{}::{}", normalize_page_path(Some(page_path)), selector.trim());
    let digest = sha256_hex(seed.as_bytes()).to_ascii_lowercase();
    format!("el_{}", &digest[..16])
}
