//! Fuzzes get/set of every stock mapping against arbitrary control buffers.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_mapping_codec
#![no_main]
use libfuzzer_sys::fuzz_target;
use uvc_control::QueryKind;
use uvc_control::mapping::builtin_mappings;

const QUERIES: [QueryKind; 5] = [
    QueryKind::Current,
    QueryKind::Min,
    QueryKind::Max,
    QueryKind::Resolution,
    QueryKind::Default,
];

fuzz_target!(|data: &[u8]| {
    let [selector, a, b, c, d, rest @ ..] = data else {
        return;
    };
    let value = i32::from_le_bytes([*a, *b, *c, *d]);

    for mapping in builtin_mappings() {
        let mut buffer = rest.to_vec();
        for query in QUERIES {
            let _ = mapping.decode(query, &buffer);
        }
        mapping.encode(value, &mut buffer);
        assert_eq!(buffer.len(), rest.len());

        let _ = mapping.menu_index(value);
        let _ = mapping.menu_value(i32::from(*selector));
    }
});
