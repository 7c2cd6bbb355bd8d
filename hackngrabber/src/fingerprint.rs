use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake128;

/// Number of SHAKE128 output bytes kept for a fingerprint.
const FINGERPRINT_BYTES: usize = 4;

/// Derive the story id from its title.
///
/// SHAKE128 over the UTF-8 title, first 4 output bytes read as a big-endian
/// two's-complement integer. This matches ids already stored in existing
/// `newsdatabase.db` files. The id space is 32 bits, so different titles can
/// collide; a colliding title is dropped by the store's insert-or-ignore.
pub fn derive_id(title: &str) -> i64 {
    let mut hasher = Shake128::default();
    hasher.update(title.as_bytes());

    let mut digest = [0u8; FINGERPRINT_BYTES];
    hasher.finalize_xof().read(&mut digest);

    i32::from_be_bytes(digest) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_title_same_id() {
        let title = "Show HN: My Rust crate";
        assert_eq!(derive_id(title), derive_id(title));
    }

    #[test]
    fn matches_known_digests() {
        // shake_128(title).digest(4), big-endian signed
        assert_eq!(derive_id(""), 2140941220);
        assert_eq!(derive_id("A"), -1514521874);
        assert_eq!(derive_id("B"), 1954962879);
        assert_eq!(derive_id("C"), 781551604);
        assert_eq!(derive_id("Hello, world"), -291107183);
        assert_eq!(derive_id("Show HN: My Rust crate"), 1452138216);
    }

    #[test]
    fn id_fits_in_32_bits() {
        for title in ["a", "longer title with spaces", "ünïcödé"] {
            let id = derive_id(title);
            assert!(id >= i32::MIN as i64 && id <= i32::MAX as i64);
        }
    }
}
