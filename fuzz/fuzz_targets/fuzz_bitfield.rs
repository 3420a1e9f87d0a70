//! Fuzzes bit-field extract/insert with arbitrary buffers and field layouts.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_bitfield
#![no_main]
use libfuzzer_sys::fuzz_target;
use uvc_bitfield::{extract, insert, set_bits, weight};

fuzz_target!(|data: &[u8]| {
    let [offset, bits, a, b, c, d, rest @ ..] = data else {
        return;
    };
    let offset = usize::from(*offset);
    let bits = u32::from(*bits % 40);
    let value = i32::from_le_bytes([*a, *b, *c, *d]);

    let mut buffer = rest.to_vec();
    let before = buffer.clone();
    insert(&mut buffer, offset, bits, value);
    let _ = extract(&buffer, offset, bits, true);

    // Bits outside the field never change.
    let end = offset.saturating_add(bits.min(32) as usize);
    for bit in 0..buffer.len() * 8 {
        if bit < offset || bit >= end {
            let old = before.get(bit / 8).map(|byte| byte >> (bit % 8) & 1);
            let new = buffer.get(bit / 8).map(|byte| byte >> (bit % 8) & 1);
            assert_eq!(old, new);
        }
    }
    assert_eq!(weight(&buffer), set_bits(&buffer).count());
});
