// crates/stoneforge-core/src/model/hashing.rs
// ============================================================================
// Module: Stoneforge Hashing
// Description: SHA-256 content hashing and base36 identifier derivation.
// Purpose: Provide deterministic content-addressed identifiers and document hashes.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! All content-addressed identifiers and document hashes are derived from
//! SHA-256 digests. [`derive_element_id`] implements the collision-retry
//! truncation scheme from spec.md §4.2.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

use crate::model::identifiers::ELEMENT_ID_PREFIX;
use crate::model::identifiers::ElementId;

// ============================================================================
// SECTION: Hex / SHA-256
// ============================================================================

/// Lowercase hex alphabet used for digest rendering.
const HEX: &[u8; 16] = b"0123456789abcdef";

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Returns the lowercase hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Returns the raw SHA-256 digest bytes.
#[must_use]
fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

// ============================================================================
// SECTION: Base36 Encoding
// ============================================================================

/// Base36 alphabet (digits then lowercase letters), matching the element id
/// body charset accepted by [`ElementId::is_well_formed`](crate::model::identifiers::ElementId::is_well_formed).
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encodes a byte slice as a base36 string of at least `min_len` characters.
///
/// Treats `bytes` as a big-endian unsigned integer. Used only to derive
/// identifier bodies, not for general-purpose codecs.
#[must_use]
fn base36_encode(bytes: &[u8], min_len: usize) -> String {
    // Work over a big-endian digit array in base 256, repeatedly dividing by 36.
    let mut digits: Vec<u8> = bytes.to_vec();
    let mut out = Vec::new();
    while digits.iter().any(|&d| d != 0) {
        let mut remainder: u32 = 0;
        for digit in &mut digits {
            let acc = remainder * 256 + u32::from(*digit);
            *digit = (acc / 36) as u8;
            remainder = acc % 36;
        }
        out.push(BASE36[remainder as usize]);
    }
    if out.is_empty() {
        out.push(BASE36[0]);
    }
    out.reverse();
    while out.len() < min_len {
        out.insert(0, BASE36[0]);
    }
    // SAFETY-free: BASE36 bytes are all valid ASCII.
    String::from_utf8(out).unwrap_or_default()
}

// ============================================================================
// SECTION: Element Id Derivation
// ============================================================================

/// Derives candidate element identifiers from `identifier` and `created_by`,
/// per spec.md §4.2: `hash(identifier || created_by)`, base36-encoded,
/// truncated to a growing prefix length starting at `min_len` up to
/// `max_len` (spec.md §6 `idGenerator.minLen`/`idGenerator.maxLen`).
///
/// Returns one candidate per length in that range, in increasing length
/// order, so callers can probe for the first unused id and fail with
/// `IdExhausted` once the range is spent.
///
/// # Panics
///
/// Panics if `min_len > max_len`.
#[must_use]
pub fn derive_element_id_candidates(
    identifier: &str,
    created_by: &str,
    min_len: usize,
    max_len: usize,
) -> Vec<ElementId> {
    assert!(min_len <= max_len, "min_len must not exceed max_len");
    let mut payload = Vec::with_capacity(identifier.len() + created_by.len());
    payload.extend_from_slice(identifier.as_bytes());
    payload.extend_from_slice(created_by.as_bytes());
    let digest = sha256_bytes(&payload);
    let body = base36_encode(&digest, max_len);
    // body is at least max_len long; take growing prefixes.
    let start = body.len().saturating_sub(max_len);
    (min_len..=max_len)
        .map(|len| {
            let end = start + len;
            ElementId::from_raw(format!("{ELEMENT_ID_PREFIX}{}", &body[start..end]))
        })
        .collect()
}
