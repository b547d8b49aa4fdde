//! Password verification against plain and DES-crypt secrets.

use subtle::ConstantTimeEq;

/// Length of a traditional DES-crypt hash: two salt characters plus eleven.
pub const CRYPT_HASH_LEN: usize = 13;

pub fn check_plain(configured: &str, supplied: &str) -> bool {
    bool::from(configured.as_bytes().ct_eq(supplied.as_bytes()))
}

/// Check `supplied` against a stored 13-character crypt hash whose first
/// two characters are the salt. Anything that is not a well-formed hash
/// simply fails.
pub fn check_crypt(stored: &str, supplied: &str) -> bool {
    if stored.len() != CRYPT_HASH_LEN {
        return false;
    }
    let Some(salt) = stored.get(..2) else {
        return false;
    };
    if !salt
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'/')
    {
        return false;
    }
    match pwhash::unix_crypt::hash_with(salt, supplied) {
        Ok(computed) => bool::from(computed.as_bytes().ct_eq(stored.as_bytes())),
        Err(e) => {
            tracing::debug!("crypt rejected salt: {}", e);
            false
        }
    }
}
