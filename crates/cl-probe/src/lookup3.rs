//! Bob Jenkins' lookup3 `hashlittle`, used to check the GPU hash kernel.
//!
//! Keys are consumed byte-wise in little-endian order, so the result does
//! not depend on host endianness or key alignment.

#[inline(always)]
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);

    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

#[inline(always)]
fn final_mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}

#[inline(always)]
fn word(block: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]])
}

/// 32-bit lookup3 hash of `key` with initial value `seed`.
pub fn hash(key: &[u8], seed: u32) -> u32 {
    let init = 0xdead_beef_u32
        .wrapping_add(key.len() as u32)
        .wrapping_add(seed);
    let (mut a, mut b, mut c) = (init, init, init);

    let mut rest = key;
    while rest.len() > 12 {
        a = a.wrapping_add(word(rest, 0));
        b = b.wrapping_add(word(rest, 4));
        c = c.wrapping_add(word(rest, 8));
        mix(&mut a, &mut b, &mut c);
        rest = &rest[12..];
    }

    if rest.is_empty() {
        return c;
    }

    // Zero padding is equivalent to the reference's fall-through tail.
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    a = a.wrapping_add(word(&tail, 0));
    b = b.wrapping_add(word(&tail, 4));
    c = c.wrapping_add(word(&tail, 8));

    final_mix(&mut a, &mut b, &mut c);
    c
}

/// Hashes consecutive `key_len`-byte keys of `block`. A trailing partial
/// key is ignored.
pub fn hash_keys(block: &[u8], key_len: usize, seed: u32) -> Vec<u32> {
    if key_len == 0 {
        return Vec::new();
    }
    block
        .chunks_exact(key_len)
        .map(|key| hash(key, seed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR_SCORE: &[u8] = b"Four score and seven years ago";

    #[test]
    fn empty_key_skips_final_mix() {
        assert_eq!(hash(b"", 0), 0xdead_beef);
        assert_eq!(hash(b"", 7), 0xdead_beef + 7);
    }

    #[test]
    fn reference_driver_values() {
        assert_eq!(hash(FOUR_SCORE, 0), 0x1777_0551);
        assert_eq!(hash(FOUR_SCORE, 1), 0xcd62_8161);
    }

    #[test]
    fn every_tail_length_is_distinct() {
        let data: Vec<u8> = (0u8..40).collect();
        let mut seen = std::collections::HashSet::new();
        for len in 0..=data.len() {
            assert!(seen.insert(hash(&data[..len], 0)), "collision at len {len}");
        }
    }

    #[test]
    fn seed_changes_hash() {
        assert_ne!(hash(b"abcdefghijklm", 0), hash(b"abcdefghijklm", 1));
    }

    #[test]
    fn hash_keys_splits_block() {
        let block = b"abcdefghijkl";
        let hashes = hash_keys(block, 4, 3);
        assert_eq!(hashes, vec![hash(b"abcd", 3), hash(b"efgh", 3), hash(b"ijkl", 3)]);
        assert!(hash_keys(block, 0, 0).is_empty());
        assert_eq!(hash_keys(block, 5, 0).len(), 2);
    }
}
