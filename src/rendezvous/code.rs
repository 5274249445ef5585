//! Share code generation and normalization.

use rand::Rng;

/// Uppercase alphanumerics minus the look-alikes 0/O and 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const DEFAULT_CODE_LENGTH: usize = 6;
pub const MAX_CODE_LENGTH: usize = 64;

/// Generate a random human-readable share code.
pub fn generate_share_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length.max(1))
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Trim and uppercase a code typed by a person.
///
/// Returns `None` for empty codes, codes over [`MAX_CODE_LENGTH`], or codes
/// containing anything besides ASCII alphanumerics and `-`.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() || code.len() > MAX_CODE_LENGTH {
        return None;
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    Some(code.to_ascii_uppercase())
}
