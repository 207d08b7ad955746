//! GitHub webhook signature verification (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header GitHub signs deliveries with.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Compute the header value GitHub sends for `body` signed with `secret`.
///
/// # Examples
///
/// ```
/// use devopsbot_codereview::signature::sign;
///
/// let header = sign(b"It's a Secret to Everybody", b"Hello, World!");
/// assert_eq!(
///     header,
///     "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
/// );
/// ```
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    format!("{PREFIX}{}", hex::encode(mac(secret, body).finalize().into_bytes()))
}

/// Check `header` against the signature of `body` under `secret`.
///
/// The comparison runs in constant time. A header without the `sha256=`
/// prefix or with non-hex digits never verifies.
pub fn verify(secret: &[u8], body: &[u8], header: &str) -> bool {
    let Some(digest_hex) = header.trim().strip_prefix(PREFIX) else {
        return false;
    };
    let Ok(digest) = hex::decode(digest_hex) else {
        return false;
    };
    mac(secret, body).verify_slice(&digest).is_ok()
}

fn mac(secret: &[u8], body: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(body);
    mac
}
