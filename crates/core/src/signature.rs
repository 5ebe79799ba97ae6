//! Webhook payload signature verification (HMAC-SHA1).
//!
//! GitHub signs each delivery with the hook secret and sends the digest in
//! the `X-Hub-Signature` header as `sha1=<hex>`. The digest must be
//! recomputed over the exact bytes received.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

/// Header carrying the algorithm-prefixed payload digest.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Algorithm tag in front of the hex digest.
pub const SIGNATURE_PREFIX: &str = "sha1=";

type HmacSha1 = Hmac<Sha1>;

/// Compute the lowercase hex HMAC-SHA1 of `payload` keyed by `secret`.
pub fn compute_hmac_sha1(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify `presented_hex` against the digest of `raw_body`.
///
/// `presented_hex` must already be stripped of its `sha1=` prefix and
/// lower-cased (see [`normalize_signature`]). The comparison runs in
/// constant time over the hex strings; a length mismatch is a plain `false`.
pub fn verify(secret: &str, raw_body: &[u8], presented_hex: &str) -> bool {
    let computed = compute_hmac_sha1(secret, raw_body);
    computed.as_bytes().ct_eq(presented_hex.as_bytes()).into()
}

/// Strip the algorithm prefix and lower-case a raw header value.
pub fn normalize_signature(header_value: &str) -> String {
    let value = header_value.trim();
    let hex = value
        .get(..SIGNATURE_PREFIX.len())
        .filter(|tag| tag.eq_ignore_ascii_case(SIGNATURE_PREFIX))
        .map_or(value, |_| &value[SIGNATURE_PREFIX.len()..]);
    hex.to_ascii_lowercase()
}
