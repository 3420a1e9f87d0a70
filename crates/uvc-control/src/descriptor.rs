//! Control descriptors: which hardware controls the class defines, how wide
//! they are on the wire and which requests they answer.

use bitflags::bitflags;

use crate::entity::Guid;
use crate::ids::{GUID_CAMERA, GUID_PROCESSING, ct, pu};

bitflags! {
    /// Requests a control answers, plus caching behaviour.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u16 {
        const SET_CUR     = 1 << 0;
        const GET_CUR     = 1 << 1;
        const GET_MIN     = 1 << 2;
        const GET_MAX     = 1 << 3;
        const GET_RES     = 1 << 4;
        const GET_DEF     = 1 << 5;
        /// Value survives a session interruption and is reapplied by restore.
        const RESTORE     = 1 << 6;
        /// Hardware may change the value on its own.
        const AUTO_UPDATE = 1 << 7;

        const GET_RANGE   = Self::GET_CUR.bits()
            | Self::GET_MIN.bits()
            | Self::GET_MAX.bits()
            | Self::GET_RES.bits()
            | Self::GET_DEF.bits();
    }
}

/// Static description of one hardware control.
///
/// Control instances hold a copy, never a reference, so the live state does not
/// depend on the table it was matched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlDescriptor {
    /// GUID of the entity kind that owns the control.
    pub entity: Guid,
    pub selector: u8,
    /// Bit position in the entity's capability bitmap.
    pub index: u8,
    /// Wire size in bytes.
    pub size: u16,
    pub flags: ControlFlags,
}

impl ControlDescriptor {
    #[must_use]
    pub const fn new(entity: Guid, selector: u8, index: u8, size: u16, flags: ControlFlags) -> Self {
        Self {
            entity,
            selector,
            index,
            size,
            flags,
        }
    }

    #[must_use]
    pub const fn can_set(&self) -> bool {
        self.flags.contains(ControlFlags::SET_CUR)
    }

    #[must_use]
    pub const fn can_get(&self) -> bool {
        self.flags.contains(ControlFlags::GET_CUR)
    }

    #[must_use]
    pub const fn is_auto_update(&self) -> bool {
        self.flags.contains(ControlFlags::AUTO_UPDATE)
    }

    /// True when a commit must drop the cached current value.
    #[must_use]
    pub const fn needs_refetch(&self) -> bool {
        self.is_auto_update() || !self.can_get()
    }

    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.size as usize
    }
}

const SET_RANGE_RESTORE: ControlFlags = ControlFlags::SET_CUR
    .union(ControlFlags::GET_RANGE)
    .union(ControlFlags::RESTORE);

const SET_RANGE_RESTORE_AUTO: ControlFlags = SET_RANGE_RESTORE.union(ControlFlags::AUTO_UPDATE);

const SET_CUR_DEF_RESTORE: ControlFlags = ControlFlags::SET_CUR
    .union(ControlFlags::GET_CUR)
    .union(ControlFlags::GET_DEF)
    .union(ControlFlags::RESTORE);

const SET_CUR_RESTORE: ControlFlags = ControlFlags::SET_CUR
    .union(ControlFlags::GET_CUR)
    .union(ControlFlags::RESTORE);

/// Relative controls: range is readable, current value is not.
const SET_RELATIVE_AUTO: ControlFlags = ControlFlags::SET_CUR
    .union(ControlFlags::GET_MIN)
    .union(ControlFlags::GET_MAX)
    .union(ControlFlags::GET_RES)
    .union(ControlFlags::GET_DEF)
    .union(ControlFlags::AUTO_UPDATE);

const fn processing(selector: u8, index: u8, size: u16, flags: ControlFlags) -> ControlDescriptor {
    ControlDescriptor::new(GUID_PROCESSING, selector, index, size, flags)
}

const fn camera(selector: u8, index: u8, size: u16, flags: ControlFlags) -> ControlDescriptor {
    ControlDescriptor::new(GUID_CAMERA, selector, index, size, flags)
}

/// Descriptors for every processing-unit and camera-terminal control the
/// class defines.
pub const BUILTIN_DESCRIPTORS: &[ControlDescriptor] = &[
    processing(pu::BRIGHTNESS, 0, 2, SET_RANGE_RESTORE),
    processing(pu::CONTRAST, 1, 2, SET_RANGE_RESTORE),
    processing(pu::HUE, 2, 2, SET_RANGE_RESTORE_AUTO),
    processing(pu::SATURATION, 3, 2, SET_RANGE_RESTORE),
    processing(pu::SHARPNESS, 4, 2, SET_RANGE_RESTORE),
    processing(pu::GAMMA, 5, 2, SET_RANGE_RESTORE),
    processing(pu::WHITE_BALANCE_TEMPERATURE, 6, 2, SET_RANGE_RESTORE_AUTO),
    processing(pu::WHITE_BALANCE_COMPONENT, 7, 4, SET_RANGE_RESTORE_AUTO),
    processing(pu::BACKLIGHT_COMPENSATION, 8, 2, SET_RANGE_RESTORE),
    processing(pu::GAIN, 9, 2, SET_RANGE_RESTORE),
    processing(pu::POWER_LINE_FREQUENCY, 10, 1, SET_CUR_DEF_RESTORE),
    processing(pu::HUE_AUTO, 11, 1, SET_CUR_DEF_RESTORE),
    processing(pu::WHITE_BALANCE_TEMPERATURE_AUTO, 12, 1, SET_CUR_DEF_RESTORE),
    processing(pu::WHITE_BALANCE_COMPONENT_AUTO, 13, 1, SET_CUR_DEF_RESTORE),
    processing(pu::DIGITAL_MULTIPLIER, 14, 2, SET_RANGE_RESTORE),
    processing(pu::DIGITAL_MULTIPLIER_LIMIT, 15, 2, SET_RANGE_RESTORE),
    processing(pu::ANALOG_VIDEO_STANDARD, 16, 1, ControlFlags::GET_CUR),
    processing(pu::ANALOG_LOCK_STATUS, 17, 1, ControlFlags::GET_CUR),
    camera(ct::SCANNING_MODE, 0, 1, SET_CUR_RESTORE),
    camera(
        ct::AE_MODE,
        1,
        1,
        SET_CUR_DEF_RESTORE.union(ControlFlags::GET_RES),
    ),
    camera(ct::AE_PRIORITY, 2, 1, SET_CUR_RESTORE),
    camera(ct::EXPOSURE_TIME_ABSOLUTE, 3, 4, SET_RANGE_RESTORE_AUTO),
    camera(
        ct::EXPOSURE_TIME_RELATIVE,
        4,
        1,
        ControlFlags::SET_CUR.union(ControlFlags::RESTORE),
    ),
    camera(ct::FOCUS_ABSOLUTE, 5, 2, SET_RANGE_RESTORE_AUTO),
    camera(ct::FOCUS_RELATIVE, 6, 2, SET_RELATIVE_AUTO),
    camera(ct::IRIS_ABSOLUTE, 7, 2, SET_RANGE_RESTORE_AUTO),
    camera(
        ct::IRIS_RELATIVE,
        8,
        1,
        ControlFlags::SET_CUR.union(ControlFlags::AUTO_UPDATE),
    ),
    camera(ct::ZOOM_ABSOLUTE, 9, 2, SET_RANGE_RESTORE_AUTO),
    camera(ct::ZOOM_RELATIVE, 10, 3, SET_RELATIVE_AUTO),
    camera(ct::PANTILT_ABSOLUTE, 11, 8, SET_RANGE_RESTORE_AUTO),
    camera(
        ct::PANTILT_RELATIVE,
        12,
        4,
        ControlFlags::SET_CUR
            .union(ControlFlags::GET_RANGE)
            .union(ControlFlags::AUTO_UPDATE),
    ),
    camera(ct::ROLL_ABSOLUTE, 13, 2, SET_RANGE_RESTORE_AUTO),
    camera(ct::ROLL_RELATIVE, 14, 2, SET_RELATIVE_AUTO),
    camera(ct::FOCUS_AUTO, 17, 1, SET_CUR_DEF_RESTORE),
    camera(
        ct::PRIVACY,
        18,
        1,
        SET_CUR_RESTORE.union(ControlFlags::AUTO_UPDATE),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_keys_are_unique() {
        let mut by_index = HashSet::new();
        let mut by_selector = HashSet::new();
        for descriptor in BUILTIN_DESCRIPTORS {
            assert!(by_index.insert((descriptor.entity, descriptor.index)));
            assert!(by_selector.insert((descriptor.entity, descriptor.selector)));
        }
        assert_eq!(BUILTIN_DESCRIPTORS.len(), 35);
    }

    #[test]
    fn test_get_range_includes_current() {
        assert!(ControlFlags::GET_RANGE.contains(ControlFlags::GET_CUR));
        assert!(!ControlFlags::GET_RANGE.contains(ControlFlags::SET_CUR));
    }

    #[test]
    fn test_refetch_rules() {
        let hue = processing(pu::HUE, 2, 2, SET_RANGE_RESTORE_AUTO);
        assert!(hue.needs_refetch());

        let gain = processing(pu::GAIN, 9, 2, SET_RANGE_RESTORE);
        assert!(!gain.needs_refetch());

        // Write-only controls never hold a value fetched from hardware.
        let exposure_rel = camera(
            ct::EXPOSURE_TIME_RELATIVE,
            4,
            1,
            ControlFlags::SET_CUR.union(ControlFlags::RESTORE),
        );
        assert!(exposure_rel.needs_refetch());
        assert!(!exposure_rel.can_get());
    }
}
