//! Page fingerprints: scope a sub-mapping of session data to one logical page.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the logical page identity.
pub fn page_fingerprint(page_id: &str) -> String {
    hex::encode(Sha256::digest(page_id.as_bytes()))
}
