//! Cache keys for probe results.
//!
//! A fingerprint is the endpoint followed by the tail of the credential. The
//! tail is a heuristic, not a cryptographic identity: two profiles sharing an
//! endpoint and the last characters of their key share a cache entry.

use crate::profiles::Profile;

/// Number of trailing credential characters folded into the key
pub const CREDENTIAL_TAIL_LEN: usize = 8;

/// Derive the cache key for an endpoint/credential pair
pub fn fingerprint(base_url: &str, credential: &str) -> String {
    let start = credential
        .char_indices()
        .rev()
        .nth(CREDENTIAL_TAIL_LEN - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    format!("{}:{}", base_url, &credential[start..])
}

pub fn profile_fingerprint(profile: &Profile) -> String {
    fingerprint(&profile.base_url, &profile.credential)
}
