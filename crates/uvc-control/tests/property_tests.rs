//! Property-based tests for transaction atomicity, blacklist pruning and range
//! snapping.

use proptest::prelude::*;
use uvc_control::blacklist::{BUILTIN_BLACKLIST, BlacklistRule, prune_entity};
use uvc_control::control::snap_to_range;
use uvc_control::ids::pu;
use uvc_control::prelude::*;
use uvc_control::transport::mock::MockTransport;

const UNIT: EntityId = EntityId(2);

/// Unsigned 16-bit controls that keep their cached value across commits.
const CONTROLS: [(ControlId, u8); 6] = [
    (cid::CONTRAST, pu::CONTRAST),
    (cid::SATURATION, pu::SATURATION),
    (cid::SHARPNESS, pu::SHARPNESS),
    (cid::GAMMA, pu::GAMMA),
    (cid::BACKLIGHT_COMPENSATION, pu::BACKLIGHT_COMPENSATION),
    (cid::GAIN, pu::GAIN),
];

fn unit_device() -> ControlResult<ControlDevice<MockTransport>> {
    ControlDevice::discover(
        DeviceIdentity::new(0x046d, 0x0825),
        // The six controls above plus hue, which updates on its own.
        vec![Entity::processing_unit(2, [0b0011_1110, 0b0000_0011])],
        MockTransport::new(),
        EngineConfig::builder().clamp_to_range(false).build()?,
    )
}

fn entity_kind() -> impl Strategy<Value = EntityKind> {
    prop_oneof![Just(EntityKind::Camera), Just(EntityKind::ProcessingUnit)]
}

fn identity() -> impl Strategy<Value = DeviceIdentity> {
    prop_oneof![
        Just(DeviceIdentity::new(0x13d3, 0x509b)),
        Just(DeviceIdentity::new(0x1c4f, 0x3000)),
        Just(DeviceIdentity::new(0x5986, 0x0241)),
        Just(DeviceIdentity::new(0x06f8, 0x3005)),
        (any::<u16>(), any::<u16>()).prop_map(|(vid, pid)| DeviceIdentity::new(vid, pid)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_failed_commit_leaves_every_control_unchanged(
        initial in prop::array::uniform6(any::<u16>()),
        staged in prop::array::uniform6(any::<u16>()),
        (dirty, failing) in (1usize..=6).prop_flat_map(|n| (Just(n), 1..=n)),
    ) {
        let device = unit_device()?;
        let mock = device.transport();
        mock.respond(UNIT, pu::HUE, QueryKind::Current, [0x10, 0x00]);
        device.get(cid::HUE)?;
        for ((id, selector), value) in CONTROLS.iter().zip(initial) {
            mock.respond(UNIT, *selector, QueryKind::Current, value.to_le_bytes());
            prop_assert_eq!(device.get(*id)?, i32::from(value));
        }

        let mut tx = device.begin(UNIT)?;
        for ((id, _), value) in CONTROLS.iter().zip(staged).take(dirty) {
            tx.set(*id, i32::from(value))?;
        }
        mock.fail_set_after(failing, TransportError::Stalled);
        prop_assert_eq!(tx.commit(), Err(ControlError::Transport(TransportError::Stalled)));

        for ((id, selector), value) in CONTROLS.iter().zip(initial) {
            prop_assert_eq!(device.peek(*id)?, Some(i32::from(value)));
            // Accepted writes were compensated, so the device agrees.
            prop_assert_eq!(mock.current(UNIT, *selector), Some(value.to_le_bytes().to_vec()));
        }
        prop_assert_eq!(device.peek(cid::HUE)?, None);
    }

    #[test]
    fn test_successful_commit_applies_every_control(
        staged in prop::array::uniform6(any::<u16>()),
        dirty in 1usize..=6,
    ) {
        let device = unit_device()?;
        let mut tx = device.begin(UNIT)?;
        for ((id, _), value) in CONTROLS.iter().zip(staged).take(dirty) {
            tx.set(*id, i32::from(value))?;
        }
        prop_assert_eq!(tx.commit()?, dirty);

        for ((id, _), value) in CONTROLS.iter().zip(staged).take(dirty) {
            prop_assert_eq!(device.get(*id)?, i32::from(value));
        }
    }

    #[test]
    fn test_pruning_is_idempotent(
        identity in identity(),
        kind in entity_kind(),
        bitmap in prop::collection::vec(any::<u8>(), 0..4),
        extra in prop::collection::vec((entity_kind(), any::<u8>()), 0..4),
    ) {
        let rules: Vec<BlacklistRule> = BUILTIN_BLACKLIST
            .iter()
            .copied()
            .chain(extra.into_iter().map(|(kind, index)| {
                BlacklistRule::new(identity.vendor_id, identity.product_id, kind, index)
            }))
            .collect();

        let mut once = Entity::new(1, kind, bitmap);
        let first = prune_entity(identity, &mut once, &rules);
        let mut twice = once.clone();
        let second = prune_entity(identity, &mut twice, &rules);

        prop_assert_eq!(&once.bitmap, &twice.bitmap);
        prop_assert_eq!(second, 0);
        prop_assert!(first <= rules.len());
    }

    #[test]
    fn test_pruning_is_order_independent(
        kind in entity_kind(),
        bitmap in prop::collection::vec(any::<u8>(), 0..4),
        indices in prop::collection::vec(any::<u8>(), 0..6),
    ) {
        let identity = DeviceIdentity::new(0x1234, 0x5678);
        let rules: Vec<BlacklistRule> = indices
            .iter()
            .map(|index| BlacklistRule::new(0x1234, 0x5678, kind, *index))
            .collect();

        let mut forward = Entity::new(1, kind, bitmap.clone());
        prune_entity(identity, &mut forward, &rules);
        let mut backward = Entity::new(1, kind, bitmap);
        prune_entity(identity, &mut backward, rules.iter().rev());

        prop_assert_eq!(forward.bitmap, backward.bitmap);
    }

    #[test]
    fn test_snapped_value_stays_in_range(
        value in any::<i32>(),
        a in -100_000i32..100_000,
        b in -100_000i32..100_000,
        step in 0i32..1000,
    ) {
        let (min, max) = (a.min(b), a.max(b));
        let snapped = snap_to_range(value, min, max, step, true);
        prop_assert!(snapped >= min && snapped <= max);
    }
}
