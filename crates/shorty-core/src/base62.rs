use std::num::NonZeroU64;

/// Characters a short code is built from, indexed by digit value.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const BASE: u64 = ALPHABET.len() as u64;

/// Longest possible encoding, reached by `u64::MAX`.
const MAX_ENCODED_LEN: usize = 11;

/// Encodes an allocated id as a base-62 string.
///
/// Digits are appended least significant first and the result is **not**
/// reversed: the first character is `ALPHABET[id % 62]`. Existing codes in
/// the store were produced with this ordering, so it must not change.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU64;
/// use shorty_core::base62::encode;
///
/// assert_eq!(encode(NonZeroU64::new(1).unwrap()), "b");
/// assert_eq!(encode(NonZeroU64::new(62).unwrap()), "ab");
/// ```
pub fn encode(id: NonZeroU64) -> String {
    let mut id = id.get();
    let mut code = String::with_capacity(MAX_ENCODED_LEN);

    while id > 0 {
        code.push(ALPHABET[(id % BASE) as usize] as char);
        id /= BASE;
    }

    code
}
