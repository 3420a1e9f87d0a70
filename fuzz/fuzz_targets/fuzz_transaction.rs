//! Drives transactions with fuzzer-chosen writes and transport failures and
//! checks that a failed commit never leaves a staged value behind.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_transaction
#![no_main]
use libfuzzer_sys::fuzz_target;
use uvc_control::ids::cid;
use uvc_control::transport::mock::MockTransport;
use uvc_control::{ControlDevice, ControlId, DeviceIdentity, EngineConfig, Entity, EntityId, TransportError};

const IDS: [ControlId; 6] = [
    cid::BRIGHTNESS,
    cid::CONTRAST,
    cid::SATURATION,
    cid::GAIN,
    cid::POWER_LINE_FREQUENCY,
    cid::HUE_AUTO,
];

fuzz_target!(|data: &[u8]| {
    let [fail_at, rest @ ..] = data else {
        return;
    };
    // Brightness, contrast, saturation, gain, power line frequency, hue auto.
    let Ok(device) = ControlDevice::discover(
        DeviceIdentity::new(0x046d, 0x0825),
        vec![Entity::processing_unit(2, [0b0000_1011, 0b0000_1110])],
        MockTransport::new(),
        EngineConfig::default(),
    ) else {
        return;
    };

    let before: Vec<_> = IDS.iter().map(|id| device.get(*id).ok()).collect();
    let Ok(mut tx) = device.begin(EntityId(2)) else {
        return;
    };
    for pair in rest.chunks_exact(2) {
        if let [which, value] = pair {
            if let Some(id) = IDS.get(usize::from(*which) % IDS.len()) {
                let _ = tx.set(*id, i32::from(*value as i8));
            }
        }
    }
    if *fail_at > 0 {
        device
            .transport()
            .fail_set_after(usize::from(*fail_at % 8), TransportError::Stalled);
    }
    if tx.commit().is_err() {
        let after: Vec<_> = IDS.iter().map(|id| device.get(*id).ok()).collect();
        assert_eq!(before, after);
    }
});
