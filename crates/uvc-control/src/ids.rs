//! Class-defined identifiers: entity GUIDs, control selectors, request codes
//! and logical control ids.
//!
//! # Sources
//!
//! - **USB Device Class Definition for Video Devices 1.1**, section A.9
//!   (control selectors) and A.8 (request codes).
//! - Logical ids follow the V4L2 numbering (`V4L2_CID_BASE = 0x00980900`,
//!   `V4L2_CID_CAMERA_CLASS_BASE = 0x009A0900`) so existing tools can address
//!   the same controls by the same numbers.

#![deny(static_mut_refs)]

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::Guid;

/// Class GUID of the camera input terminal.
pub const GUID_CAMERA: Guid = Guid([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
]);

/// Class GUID of the media transport input terminal.
pub const GUID_MEDIA_TRANSPORT_INPUT: Guid = Guid([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
]);

/// Class GUID of the processing unit.
pub const GUID_PROCESSING: Guid = Guid([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01,
]);

/// Class-specific request codes (`bRequest`).
pub mod request {
    pub const SET_CUR: u8 = 0x01;
    pub const GET_CUR: u8 = 0x81;
    pub const GET_MIN: u8 = 0x82;
    pub const GET_MAX: u8 = 0x83;
    pub const GET_RES: u8 = 0x84;
    pub const GET_LEN: u8 = 0x85;
    pub const GET_INFO: u8 = 0x86;
    pub const GET_DEF: u8 = 0x87;
}

/// Processing unit control selectors.
pub mod pu {
    pub const BACKLIGHT_COMPENSATION: u8 = 0x01;
    pub const BRIGHTNESS: u8 = 0x02;
    pub const CONTRAST: u8 = 0x03;
    pub const GAIN: u8 = 0x04;
    pub const POWER_LINE_FREQUENCY: u8 = 0x05;
    pub const HUE: u8 = 0x06;
    pub const SATURATION: u8 = 0x07;
    pub const SHARPNESS: u8 = 0x08;
    pub const GAMMA: u8 = 0x09;
    pub const WHITE_BALANCE_TEMPERATURE: u8 = 0x0A;
    pub const WHITE_BALANCE_TEMPERATURE_AUTO: u8 = 0x0B;
    pub const WHITE_BALANCE_COMPONENT: u8 = 0x0C;
    pub const WHITE_BALANCE_COMPONENT_AUTO: u8 = 0x0D;
    pub const DIGITAL_MULTIPLIER: u8 = 0x0E;
    pub const DIGITAL_MULTIPLIER_LIMIT: u8 = 0x0F;
    pub const HUE_AUTO: u8 = 0x10;
    pub const ANALOG_VIDEO_STANDARD: u8 = 0x11;
    pub const ANALOG_LOCK_STATUS: u8 = 0x12;
}

/// Camera terminal control selectors.
pub mod ct {
    pub const SCANNING_MODE: u8 = 0x01;
    pub const AE_MODE: u8 = 0x02;
    pub const AE_PRIORITY: u8 = 0x03;
    pub const EXPOSURE_TIME_ABSOLUTE: u8 = 0x04;
    pub const EXPOSURE_TIME_RELATIVE: u8 = 0x05;
    pub const FOCUS_ABSOLUTE: u8 = 0x06;
    pub const FOCUS_RELATIVE: u8 = 0x07;
    pub const FOCUS_AUTO: u8 = 0x08;
    pub const IRIS_ABSOLUTE: u8 = 0x09;
    pub const IRIS_RELATIVE: u8 = 0x0A;
    pub const ZOOM_ABSOLUTE: u8 = 0x0B;
    pub const ZOOM_RELATIVE: u8 = 0x0C;
    pub const PANTILT_ABSOLUTE: u8 = 0x0D;
    pub const PANTILT_RELATIVE: u8 = 0x0E;
    pub const ROLL_ABSOLUTE: u8 = 0x0F;
    pub const ROLL_RELATIVE: u8 = 0x10;
    pub const PRIVACY: u8 = 0x11;
}

/// Logical control id exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlId(pub u32);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Logical control ids for the stock mappings.
pub mod cid {
    use super::ControlId;

    pub const USER_BASE: u32 = 0x0098_0900;
    pub const CAMERA_BASE: u32 = 0x009A_0900;

    pub const BRIGHTNESS: ControlId = ControlId(USER_BASE);
    pub const CONTRAST: ControlId = ControlId(USER_BASE + 1);
    pub const SATURATION: ControlId = ControlId(USER_BASE + 2);
    pub const HUE: ControlId = ControlId(USER_BASE + 3);
    pub const AUTO_WHITE_BALANCE: ControlId = ControlId(USER_BASE + 12);
    pub const RED_BALANCE: ControlId = ControlId(USER_BASE + 14);
    pub const BLUE_BALANCE: ControlId = ControlId(USER_BASE + 15);
    pub const GAMMA: ControlId = ControlId(USER_BASE + 16);
    pub const GAIN: ControlId = ControlId(USER_BASE + 19);
    pub const POWER_LINE_FREQUENCY: ControlId = ControlId(USER_BASE + 24);
    pub const HUE_AUTO: ControlId = ControlId(USER_BASE + 25);
    pub const WHITE_BALANCE_TEMPERATURE: ControlId = ControlId(USER_BASE + 26);
    pub const SHARPNESS: ControlId = ControlId(USER_BASE + 27);
    pub const BACKLIGHT_COMPENSATION: ControlId = ControlId(USER_BASE + 28);

    pub const EXPOSURE_AUTO: ControlId = ControlId(CAMERA_BASE + 1);
    pub const EXPOSURE_ABSOLUTE: ControlId = ControlId(CAMERA_BASE + 2);
    pub const EXPOSURE_AUTO_PRIORITY: ControlId = ControlId(CAMERA_BASE + 3);
    pub const PAN_ABSOLUTE: ControlId = ControlId(CAMERA_BASE + 8);
    pub const TILT_ABSOLUTE: ControlId = ControlId(CAMERA_BASE + 9);
    pub const FOCUS_ABSOLUTE: ControlId = ControlId(CAMERA_BASE + 10);
    pub const FOCUS_AUTO: ControlId = ControlId(CAMERA_BASE + 12);
    pub const ZOOM_ABSOLUTE: ControlId = ControlId(CAMERA_BASE + 13);
    pub const ZOOM_CONTINUOUS: ControlId = ControlId(CAMERA_BASE + 15);
    pub const PRIVACY: ControlId = ControlId(CAMERA_BASE + 16);
    pub const IRIS_ABSOLUTE: ControlId = ControlId(CAMERA_BASE + 17);
    pub const IRIS_RELATIVE: ControlId = ControlId(CAMERA_BASE + 18);
    pub const PAN_SPEED: ControlId = ControlId(CAMERA_BASE + 32);
    pub const TILT_SPEED: ControlId = ControlId(CAMERA_BASE + 33);
}

/// Exposure mode menu index meaning "manual".
pub const EXPOSURE_MANUAL: i32 = 1;
