use sha2::{Digest, Sha256};

use crate::models::RawMetadata;

pub const CASE_ID_LEN: usize = 12;

/// Stable case identifier: the first 12 hex digits of the SHA-256 of the
/// study's SOP instance UID, or of its file name when the UID is absent.
pub fn derive_case_id(raw: &RawMetadata, source_name: &str) -> String {
    let seed = raw
        .get("SOPInstanceUID")
        .map(|uid| uid.trim())
        .filter(|uid| !uid.is_empty())
        .unwrap_or(source_name);
    let digest = Sha256::digest(seed.as_bytes());
    let hex = format!("{digest:x}");
    hex[..CASE_ID_LEN].to_string()
}
