//! Per-device suppression of controls known to misbehave.
//!
//! Some devices advertise controls in their capability bitmap that crash the
//! firmware or answer garbage when queried. Rules clear those bits before
//! discovery counts the supported controls.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uvc_bitfield::{clear_bit, test_bit};

use crate::entity::{DeviceIdentity, Entity, EntityKind};

/// Suppress bitmap index `index` of `entity` on devices matching the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlacklistRule {
    pub vendor_id: u16,
    pub product_id: u16,
    pub entity: EntityKind,
    pub index: u8,
}

impl BlacklistRule {
    #[must_use]
    pub const fn new(vendor_id: u16, product_id: u16, entity: EntityKind, index: u8) -> Self {
        Self {
            vendor_id,
            product_id,
            entity,
            index,
        }
    }

    /// True when the rule targets this device and entity.
    #[must_use]
    pub fn applies_to(&self, identity: DeviceIdentity, entity: &Entity) -> bool {
        self.vendor_id == identity.vendor_id
            && self.product_id == identity.product_id
            && self.entity.guid().is_some()
            && self.entity.guid() == entity.kind.guid()
    }
}

/// Known-defective controls.
pub const BUILTIN_BLACKLIST: &[BlacklistRule] = &[
    // Gain
    BlacklistRule::new(0x13d3, 0x509b, EntityKind::ProcessingUnit, 9),
    // White balance temperature
    BlacklistRule::new(0x1c4f, 0x3000, EntityKind::ProcessingUnit, 6),
    // Hue
    BlacklistRule::new(0x5986, 0x0241, EntityKind::ProcessingUnit, 2),
    // Zoom, absolute
    BlacklistRule::new(0x06f8, 0x3005, EntityKind::Camera, 9),
];

/// Clear every bit of `entity`'s bitmap named by a matching rule.
///
/// Indices past the end of the bitmap are ignored. Returns the number of bits
/// that were set and are now clear, so a second pass returns 0.
pub fn prune_entity<'a>(
    identity: DeviceIdentity,
    entity: &mut Entity,
    rules: impl IntoIterator<Item = &'a BlacklistRule>,
) -> usize {
    let mut pruned = 0;
    for rule in rules {
        if !rule.applies_to(identity, entity) {
            continue;
        }
        let index = usize::from(rule.index);
        if index >= entity.bitmap_bits() || !test_bit(&entity.bitmap, index) {
            continue;
        }
        if clear_bit(&mut entity.bitmap, index) {
            warn!(
                device = %identity,
                entity = %entity.id,
                kind = entity.kind.label(),
                index,
                "Blacklisted control pruned"
            );
            pruned += 1;
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: DeviceIdentity = DeviceIdentity::new(0x5986, 0x0241);

    #[test]
    fn test_prunes_matching_bit() {
        let mut unit = Entity::processing_unit(2, [0b0000_0101]);
        assert_eq!(prune_entity(DEVICE, &mut unit, BUILTIN_BLACKLIST), 1);
        assert_eq!(unit.bitmap, vec![0b0000_0001]);
    }

    #[test]
    fn test_other_devices_untouched() {
        let mut unit = Entity::processing_unit(2, [0b0000_0101]);
        let other = DeviceIdentity::new(0x046d, 0x0825);
        assert_eq!(prune_entity(other, &mut unit, BUILTIN_BLACKLIST), 0);
        assert_eq!(unit.bitmap, vec![0b0000_0101]);
    }

    #[test]
    fn test_kind_must_match() {
        // Same device, but bit 2 of a camera terminal is not blacklisted.
        let mut camera = Entity::camera(1, [0b0000_0100]);
        assert_eq!(prune_entity(DEVICE, &mut camera, BUILTIN_BLACKLIST), 0);
    }

    #[test]
    fn test_index_past_bitmap_is_ignored() {
        let device = DeviceIdentity::new(0x06f8, 0x3005);
        // Zoom absolute is bit 9; a one-byte bitmap cannot hold it.
        let mut camera = Entity::camera(1, [0xFF]);
        assert_eq!(prune_entity(device, &mut camera, BUILTIN_BLACKLIST), 0);
        assert_eq!(camera.bitmap, vec![0xFF]);
    }

    #[test]
    fn test_other_kind_rule_never_applies() {
        let rule = BlacklistRule::new(0x5986, 0x0241, EntityKind::Other(0x0301), 0);
        let mut unit = Entity::new(4, EntityKind::Other(0x0301), [0x01]);
        assert_eq!(prune_entity(DEVICE, &mut unit, [&rule]), 0);
    }
}
