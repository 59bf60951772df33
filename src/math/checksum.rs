//! Checksums and string hashing

use crc32fast::Hasher;

use crate::text::string::cstr;

/// Starting value of the djb2 hash
pub const HASH_SEED: u32 = 5381;

/// IEEE CRC-32 of `data`
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// CRC-32 of some bytes followed by `data`, given `crc` for the bytes
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}

/// djb2 hash (h * 33 + c) of the C string in `s`
///
/// Bytes count as unsigned.
pub fn hash(s: &[u8]) -> u32 {
    cstr(s)
        .iter()
        .fold(HASH_SEED, |h, &c| h.wrapping_mul(33).wrapping_add(c as u32))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_crc32() {
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32(b"hello world"), 0x0d4a_1185);
    }

    #[test]
    pub fn test_crc32_update() {
        let whole = crc32(b"hello world");
        assert_eq!(crc32_update(crc32(b"hello "), b"world"), whole);
        assert_eq!(crc32_update(0, b"hello world"), whole);
        assert_eq!(crc32_update(whole, b""), whole);
    }

    #[test]
    pub fn test_hash() {
        assert_eq!(hash(b""), HASH_SEED);
        assert_eq!(hash(b"hello"), 261_238_937);
        assert_eq!(hash(b"hello\0world"), hash(b"hello"));
        assert_ne!(hash(b"ab"), hash(b"ba"));
        // wraps rather than overflowing
        let long = vec![b'z'; 1000];
        assert_eq!(hash(&long), 3048599957);
    }
}
