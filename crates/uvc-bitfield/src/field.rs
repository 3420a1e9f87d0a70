//! Little-endian bit-field extraction and insertion.

/// Widest field the codec handles. Mapped values are 32-bit integers.
pub const MAX_FIELD_BITS: u32 = 32;

/// Read `bits` bits starting at bit `offset` of a little-endian buffer.
///
/// The field may straddle any number of byte boundaries. When `signed` is set
/// the value is sign-extended from the top bit of the field. Widths above
/// [`MAX_FIELD_BITS`] are clamped; a zero width returns 0.
///
/// # Example
/// ```rust
/// use uvc_bitfield::extract;
///
/// // 12-bit field starting at bit 4: 0xABC
/// let data = [0xC0, 0xAB];
/// assert_eq!(extract(&data, 4, 12, false), 0xABC);
/// // Same bits read as signed: top bit set, so the value is negative.
/// assert_eq!(extract(&data, 4, 12, true), 0xABC - 0x1000);
/// ```
pub fn extract(data: &[u8], offset: usize, bits: u32, signed: bool) -> i32 {
    let bits = bits.min(MAX_FIELD_BITS);
    if bits == 0 {
        return 0;
    }

    let mut value: u32 = 0;
    let mut produced: u32 = 0;
    let mut byte_index = offset / 8;
    let mut shift = (offset % 8) as u32;

    while produced < bits {
        let byte = data.get(byte_index).copied().unwrap_or(0);
        let take = (8 - shift).min(bits - produced);
        let chunk = (u32::from(byte) >> shift) & ((1u32 << take) - 1);
        value |= chunk << produced;
        produced += take;
        shift = 0;
        byte_index += 1;
    }

    if signed && bits < MAX_FIELD_BITS && value & (1u32 << (bits - 1)) != 0 {
        value |= u32::MAX << bits;
    }

    value as i32
}

/// Write the low `bits` bits of `value` at bit `offset` of a little-endian buffer.
///
/// Bits outside `[offset, offset + bits)` are preserved, including the
/// untouched bits of partially covered bytes. Widths above [`MAX_FIELD_BITS`]
/// are clamped; a zero width leaves the buffer unchanged.
///
/// # Example
/// ```rust
/// use uvc_bitfield::insert;
///
/// let mut data = [0xFF, 0xFF];
/// insert(&mut data, 4, 8, 0);
/// assert_eq!(data, [0x0F, 0xF0]);
/// ```
pub fn insert(data: &mut [u8], offset: usize, bits: u32, value: i32) {
    let mut remaining = bits.min(MAX_FIELD_BITS);
    let mut pending = value as u32;
    let mut byte_index = offset / 8;
    let mut shift = (offset % 8) as u32;

    while remaining > 0 {
        let take = (8 - shift).min(remaining);
        let mask = (((1u16 << take) - 1) << shift) as u8;
        if let Some(byte) = data.get_mut(byte_index) {
            let incoming = ((pending as u16) << shift) as u8;
            *byte = (*byte & !mask) | (incoming & mask);
        }
        pending >>= take;
        remaining -= take;
        shift = 0;
        byte_index += 1;
    }
}

/// Location and signedness of one field inside a control payload.
///
/// # Example
/// ```rust
/// use uvc_bitfield::BitField;
///
/// let red = BitField::new(16, 16).signed();
/// let mut data = [0u8; 4];
/// red.insert(&mut data, -2);
/// assert_eq!(data, [0x00, 0x00, 0xFE, 0xFF]);
/// assert_eq!(red.extract(&data), -2);
/// assert!(red.fits(4));
/// assert!(!red.fits(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    /// First bit of the field, counted from bit 0 of byte 0.
    pub offset: u16,
    /// Field width in bits.
    pub bits: u8,
    /// Sign-extend on extraction.
    pub signed: bool,
}

impl BitField {
    pub const fn new(offset: u16, bits: u8) -> Self {
        Self {
            offset,
            bits,
            signed: false,
        }
    }

    pub const fn signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }

    /// Index one past the last bit of the field.
    pub const fn end(&self) -> usize {
        self.offset as usize + self.bits as usize
    }

    /// True when the field lies inside a buffer of `len` bytes and is no
    /// wider than [`MAX_FIELD_BITS`].
    pub const fn fits(&self, len: usize) -> bool {
        self.bits as u32 <= MAX_FIELD_BITS && self.end() <= len * 8
    }

    pub fn extract(&self, data: &[u8]) -> i32 {
        extract(data, self.offset as usize, u32::from(self.bits), self.signed)
    }

    pub fn insert(&self, data: &mut [u8], value: i32) {
        insert(data, self.offset as usize, u32::from(self.bits), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_aligned_u16() {
        let data = [0x2C, 0x01];
        assert_eq!(extract(&data, 0, 16, false), 300);
    }

    #[test]
    fn test_single_bit_fields() {
        let data = [0b0000_0100];
        assert_eq!(extract(&data, 2, 1, false), 1);
        assert_eq!(extract(&data, 1, 1, false), 0);
        // A signed one-bit field holding 1 is -1.
        assert_eq!(extract(&data, 2, 1, true), -1);
    }

    #[test]
    fn test_unaligned_cross_byte_field() {
        // 10-bit value 0x2A5 at offset 3 spans three bytes.
        let mut data = [0u8; 3];
        insert(&mut data, 3, 10, 0x2A5);
        assert_eq!(data, [0x28, 0x15, 0x00]);
        assert_eq!(extract(&data, 3, 10, false), 0x2A5);
    }

    #[test]
    fn test_full_width_signed() {
        let mut data = [0u8; 4];
        insert(&mut data, 0, 32, i32::MIN);
        assert_eq!(data, [0x00, 0x00, 0x00, 0x80]);
        assert_eq!(extract(&data, 0, 32, true), i32::MIN);
        assert_eq!(extract(&data, 0, 32, false), i32::MIN);
    }

    #[test]
    fn test_sign_extension_16_bit() {
        let data = [0xFF, 0xFF];
        assert_eq!(extract(&data, 0, 16, true), -1);
        assert_eq!(extract(&data, 0, 16, false), 0xFFFF);
    }

    #[test]
    fn test_zero_width_is_noop() {
        let mut data = [0xAA];
        insert(&mut data, 3, 0, -1);
        assert_eq!(data, [0xAA]);
        assert_eq!(extract(&data, 3, 0, true), 0);
    }

    #[test]
    fn test_width_clamped_to_32() {
        let data = [0xFF; 8];
        assert_eq!(extract(&data, 0, 40, false), -1);
    }

    #[test]
    fn test_out_of_buffer_reads_zero() {
        let data = [0xFF];
        assert_eq!(extract(&data, 4, 8, false), 0x0F);
        assert_eq!(extract(&data, 16, 8, false), 0);
    }

    #[test]
    fn test_out_of_buffer_write_dropped() {
        let mut data = [0x00];
        insert(&mut data, 4, 8, 0xFF);
        assert_eq!(data, [0xF0]);
    }

    #[test]
    fn test_insert_preserves_neighbours() {
        let mut data = [0xFF, 0xFF, 0xFF];
        insert(&mut data, 5, 9, 0);
        assert_eq!(data, [0x1F, 0xC0, 0xFF]);
    }

    #[test]
    fn test_bitfield_fits() {
        assert!(BitField::new(0, 16).fits(2));
        assert!(!BitField::new(1, 16).fits(2));
        assert!(BitField::new(0, 0).fits(0));
        assert!(!BitField::new(0, 33).fits(8));
    }
}
