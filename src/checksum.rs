//! Content checksums used for dedup probes in the offset table.

use sha2::{Digest, Sha256};

/// Hex-encodes a SHA-256 digest the way the reference implementation does:
/// each byte is written with an uppercase hex formatter and no zero padding,
/// so a byte in `0x00..=0x0F` contributes a single character instead of two.
/// The resulting token therefore does not have a fixed length. This quirk is
/// preserved on purpose: on-disk indices produced by either implementation
/// must compare equal byte-for-byte.
pub fn checksum(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        use std::fmt::Write;
        write!(out, "{:X}", byte).expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_stable() {
        let a = checksum(b"");
        let b = checksum(b"");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_content() {
        assert_ne!(checksum(b"a"), checksum(b"b"));
    }

    #[test]
    fn low_bytes_collapse_to_one_hex_char() {
        // sha256("b") = 3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d,
        // which has three bytes < 0x10 (three 0x00 bytes), each of which must
        // render as a single '0' rather than the zero-padded '00'. A full
        // 32-byte digest with no collapsed bytes would render as 64 hex
        // characters; each collapsed byte shortens the rendering by one.
        let sum = checksum(b"b");
        assert_eq!(sum, "3E23E816039594A33894F6564E1B1348BBD7A088D42C4ACB73EEAED59C09D");
        assert_eq!(sum.len(), 64 - 3);
    }
}
