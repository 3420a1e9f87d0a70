//! Helpers for per-entity capability bitmaps.
//!
//! A capability bitmap is a little-endian bit array where bit `i` set means
//! the entity exposes the control at table index `i`.

/// True when bit `index` is set. Bits past the end of the bitmap are clear.
pub fn test_bit(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index / 8)
        .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
}

/// Set bit `index`. Returns false when the index lies outside the bitmap.
pub fn set_bit(bitmap: &mut [u8], index: usize) -> bool {
    match bitmap.get_mut(index / 8) {
        Some(byte) => {
            *byte |= 1 << (index % 8);
            true
        }
        None => false,
    }
}

/// Clear bit `index`. Returns true when the bit was previously set.
pub fn clear_bit(bitmap: &mut [u8], index: usize) -> bool {
    match bitmap.get_mut(index / 8) {
        Some(byte) => {
            let mask = 1 << (index % 8);
            let was_set = *byte & mask != 0;
            *byte &= !mask;
            was_set
        }
        None => false,
    }
}

/// Number of set bits.
pub fn weight(bitmap: &[u8]) -> usize {
    bitmap.iter().map(|byte| byte.count_ones() as usize).sum()
}

/// Indices of the set bits in ascending order.
///
/// # Example
/// ```rust
/// use uvc_bitfield::set_bits;
///
/// let indices: Vec<usize> = set_bits(&[0b0000_0101, 0b1000_0000]).collect();
/// assert_eq!(indices, vec![0, 2, 15]);
/// ```
pub fn set_bits(bitmap: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bitmap.iter().enumerate().flat_map(|(byte_index, &byte)| {
        (0..8usize)
            .filter(move |bit| byte & (1 << bit) != 0)
            .map(move |bit| byte_index * 8 + bit)
    })
}
