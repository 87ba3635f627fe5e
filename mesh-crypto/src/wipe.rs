//! Explicit secure erasure for buffers holding key material in transit.

use zeroize::Zeroize;

/// Overwrite `buf` with zeroes. Unlike `Vec::clear`, this is guaranteed not
/// to be optimized away, because `Zeroize::zeroize` uses a volatile write.
pub fn secure_wipe(buf: &mut [u8]) {
    buf.zeroize();
}

/// Same, but also truncates the buffer to length zero.
pub fn secure_wipe_vec(buf: &mut Vec<u8>) {
    buf.zeroize();
    buf.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wipe_zeroes_fixed_buffer() {
        let mut buf = [0xABu8; 16];
        secure_wipe(&mut buf);
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn wipe_zeroes_and_empties_vec() {
        let mut buf = vec![1u8, 2, 3, 4];
        secure_wipe_vec(&mut buf);
        assert!(buf.is_empty());
    }
}
