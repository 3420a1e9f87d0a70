//! Mappings between logical control ids and bit fields of a control buffer.

use serde::{Deserialize, Serialize};
use uvc_bitfield::BitField;

use crate::entity::Guid;
use crate::ids::{
    ControlId, EXPOSURE_MANUAL, GUID_CAMERA, GUID_PROCESSING, cid, ct, pu,
};
use crate::transport::QueryKind;

/// How the mapped value is presented to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Boolean,
    /// Index into an enumerated menu.
    Menu,
    /// Index into a menu whose raw values are single-bit flags.
    Bitmask,
}

/// One menu choice: the raw hardware value and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub value: u32,
    pub name: String,
}

impl MenuEntry {
    #[must_use]
    pub fn new(value: u32, name: impl Into<String>) -> Self {
        Self {
            value,
            name: name.into(),
        }
    }
}

/// Master control gating a mapping.
///
/// The gated mapping is authoritative only while `id` holds `manual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterLink {
    pub id: ControlId,
    pub manual: i32,
}

/// Reads a logical value out of a slot. The query says which slot is read.
pub type DecodeFn = fn(&ControlMapping, QueryKind, &[u8]) -> i32;

/// Writes a logical value into the current slot.
pub type EncodeFn = fn(&ControlMapping, i32, &mut [u8]);

/// Value codec of a mapping.
#[derive(Debug, Clone, Copy, Default)]
pub enum MappingCodec {
    /// Plain little-endian bit field.
    #[default]
    LittleEndian,
    /// Non-linear encoding.
    Custom { decode: DecodeFn, encode: EncodeFn },
}

/// Translation between a logical control id and a field of a control's buffer.
#[derive(Debug, Clone)]
pub struct ControlMapping {
    pub id: ControlId,
    pub name: String,
    /// GUID of the entity kind the target control belongs to.
    pub entity: Guid,
    pub selector: u8,
    pub field: BitField,
    pub kind: ValueKind,
    pub menu: Vec<MenuEntry>,
    pub master: Option<MasterLink>,
    /// Ids whose meaning or range changes when this mapping is written.
    pub slaves: Vec<ControlId>,
    pub codec: MappingCodec,
}

impl ControlMapping {
    /// Unsigned integer mapping with the little-endian codec.
    #[must_use]
    pub fn new(id: ControlId, name: impl Into<String>, entity: Guid, selector: u8, field: BitField) -> Self {
        Self {
            id,
            name: name.into(),
            entity,
            selector,
            field,
            kind: ValueKind::Integer,
            menu: Vec::new(),
            master: None,
            slaves: Vec::new(),
            codec: MappingCodec::LittleEndian,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn menu(mut self, entries: impl IntoIterator<Item = MenuEntry>) -> Self {
        self.menu = entries.into_iter().collect();
        self
    }

    #[must_use]
    pub fn master(mut self, id: ControlId, manual: i32) -> Self {
        self.master = Some(MasterLink { id, manual });
        self
    }

    #[must_use]
    pub fn slaves(mut self, ids: impl IntoIterator<Item = ControlId>) -> Self {
        self.slaves = ids.into_iter().collect();
        self
    }

    #[must_use]
    pub fn codec(mut self, decode: DecodeFn, encode: EncodeFn) -> Self {
        self.codec = MappingCodec::Custom { decode, encode };
        self
    }

    /// True when callers see menu indices instead of raw values.
    #[must_use]
    pub fn has_menu(&self) -> bool {
        matches!(self.kind, ValueKind::Menu | ValueKind::Bitmask) && !self.menu.is_empty()
    }

    /// True when the field lies inside a control of `size` bytes.
    #[must_use]
    pub fn fits(&self, size: u16) -> bool {
        self.field.fits(usize::from(size))
    }

    pub fn decode(&self, query: QueryKind, data: &[u8]) -> i32 {
        match self.codec {
            MappingCodec::LittleEndian => self.field.extract(data),
            MappingCodec::Custom { decode, .. } => decode(self, query, data),
        }
    }

    pub fn encode(&self, value: i32, data: &mut [u8]) {
        match self.codec {
            MappingCodec::LittleEndian => self.field.insert(data, value),
            MappingCodec::Custom { encode, .. } => encode(self, value, data),
        }
    }

    /// Menu index whose raw value equals `raw`.
    #[must_use]
    pub fn menu_index(&self, raw: i32) -> Option<usize> {
        self.menu.iter().position(|entry| entry.value as i32 == raw)
    }

    /// Raw value of the menu entry at `index`.
    #[must_use]
    pub fn menu_value(&self, index: i32) -> Option<i32> {
        let index = usize::try_from(index).ok()?;
        self.menu.get(index).map(|entry| entry.value as i32)
    }
}

fn direction_byte(value: i32) -> u8 {
    match value.signum() {
        0 => 0x00,
        1 => 0x01,
        _ => 0xFF,
    }
}

fn speed_byte(value: i32) -> u8 {
    value.unsigned_abs().min(0xFF) as u8
}

/// Relative zoom: byte 0 is the direction, byte 2 the speed.
pub fn decode_zoom(_mapping: &ControlMapping, query: QueryKind, data: &[u8]) -> i32 {
    let direction = data.first().copied().unwrap_or(0) as i8;
    let speed = i32::from(data.get(2).copied().unwrap_or(0));
    match query {
        QueryKind::Current => match direction {
            0 => 0,
            d if d > 0 => speed,
            _ => -speed,
        },
        QueryKind::Min => -speed,
        _ => speed,
    }
}

pub fn encode_zoom(_mapping: &ControlMapping, value: i32, data: &mut [u8]) {
    if let Some(byte) = data.first_mut() {
        *byte = direction_byte(value);
    }
    if let Some(byte) = data.get_mut(2) {
        *byte = speed_byte(value);
    }
}

/// Relative pan or tilt: a direction byte followed by a speed byte, starting at
/// the mapping's byte offset.
pub fn decode_rel_speed(mapping: &ControlMapping, query: QueryKind, data: &[u8]) -> i32 {
    let first = usize::from(mapping.field.offset / 8);
    let direction = data.get(first).copied().unwrap_or(0) as i8;
    let speed = i32::from(data.get(first + 1).copied().unwrap_or(0));
    match query {
        QueryKind::Current => match direction {
            0 => 0,
            d if d > 0 => speed,
            _ => -speed,
        },
        QueryKind::Min => -speed,
        _ => speed,
    }
}

pub fn encode_rel_speed(mapping: &ControlMapping, value: i32, data: &mut [u8]) {
    let first = usize::from(mapping.field.offset / 8);
    if let Some(byte) = data.get_mut(first) {
        *byte = direction_byte(value);
    }
    if let Some(byte) = data.get_mut(first + 1) {
        *byte = speed_byte(value);
    }
}

fn processing(id: ControlId, name: &str, selector: u8, field: BitField) -> ControlMapping {
    ControlMapping::new(id, name, GUID_PROCESSING, selector, field)
}

fn camera(id: ControlId, name: &str, selector: u8, field: BitField) -> ControlMapping {
    ControlMapping::new(id, name, GUID_CAMERA, selector, field)
}

/// Stock mappings for the class-defined controls.
///
/// The temperature and component white-balance auto controls share
/// [`cid::AUTO_WHITE_BALANCE`]. On a unit exposing both, the id reaches the
/// temperature auto control (first in bitmap order), so the component auto
/// control is not addressable by id and the blue/red components are gated by
/// the temperature auto value.
#[must_use]
pub fn builtin_mappings() -> Vec<ControlMapping> {
    let u16_field = BitField::new(0, 16);
    let i16_field = BitField::new(0, 16).signed();
    let flag = BitField::new(0, 1);

    vec![
        processing(cid::BRIGHTNESS, "Brightness", pu::BRIGHTNESS, i16_field),
        processing(cid::CONTRAST, "Contrast", pu::CONTRAST, u16_field),
        processing(cid::HUE, "Hue", pu::HUE, i16_field).master(cid::HUE_AUTO, 0),
        processing(cid::SATURATION, "Saturation", pu::SATURATION, u16_field),
        processing(cid::SHARPNESS, "Sharpness", pu::SHARPNESS, u16_field),
        processing(cid::GAMMA, "Gamma", pu::GAMMA, u16_field),
        processing(
            cid::BACKLIGHT_COMPENSATION,
            "Backlight Compensation",
            pu::BACKLIGHT_COMPENSATION,
            u16_field,
        ),
        processing(cid::GAIN, "Gain", pu::GAIN, u16_field),
        processing(
            cid::POWER_LINE_FREQUENCY,
            "Power Line Frequency",
            pu::POWER_LINE_FREQUENCY,
            BitField::new(0, 2),
        )
        .kind(ValueKind::Menu)
        .menu([
            MenuEntry::new(0, "Disabled"),
            MenuEntry::new(1, "50 Hz"),
            MenuEntry::new(2, "60 Hz"),
        ]),
        processing(cid::HUE_AUTO, "Hue, Auto", pu::HUE_AUTO, flag)
            .kind(ValueKind::Boolean)
            .slaves([cid::HUE]),
        camera(
            cid::EXPOSURE_AUTO,
            "Exposure, Auto",
            ct::AE_MODE,
            BitField::new(0, 4),
        )
        .kind(ValueKind::Bitmask)
        .menu([
            MenuEntry::new(2, "Auto Mode"),
            MenuEntry::new(1, "Manual Mode"),
            MenuEntry::new(4, "Shutter Priority Mode"),
            MenuEntry::new(8, "Aperture Priority Mode"),
        ])
        .slaves([cid::EXPOSURE_ABSOLUTE]),
        camera(
            cid::EXPOSURE_AUTO_PRIORITY,
            "Exposure, Auto Priority",
            ct::AE_PRIORITY,
            flag,
        )
        .kind(ValueKind::Boolean),
        camera(
            cid::EXPOSURE_ABSOLUTE,
            "Exposure (Absolute)",
            ct::EXPOSURE_TIME_ABSOLUTE,
            BitField::new(0, 32),
        )
        .master(cid::EXPOSURE_AUTO, EXPOSURE_MANUAL),
        processing(
            cid::AUTO_WHITE_BALANCE,
            "White Balance Temperature, Auto",
            pu::WHITE_BALANCE_TEMPERATURE_AUTO,
            flag,
        )
        .kind(ValueKind::Boolean)
        .slaves([cid::WHITE_BALANCE_TEMPERATURE]),
        processing(
            cid::WHITE_BALANCE_TEMPERATURE,
            "White Balance Temperature",
            pu::WHITE_BALANCE_TEMPERATURE,
            u16_field,
        )
        .master(cid::AUTO_WHITE_BALANCE, 0),
        processing(
            cid::AUTO_WHITE_BALANCE,
            "White Balance Component, Auto",
            pu::WHITE_BALANCE_COMPONENT_AUTO,
            flag,
        )
        .kind(ValueKind::Boolean)
        .slaves([cid::BLUE_BALANCE, cid::RED_BALANCE]),
        processing(
            cid::BLUE_BALANCE,
            "White Balance Blue Component",
            pu::WHITE_BALANCE_COMPONENT,
            i16_field,
        )
        .master(cid::AUTO_WHITE_BALANCE, 0),
        processing(
            cid::RED_BALANCE,
            "White Balance Red Component",
            pu::WHITE_BALANCE_COMPONENT,
            BitField::new(16, 16).signed(),
        )
        .master(cid::AUTO_WHITE_BALANCE, 0),
        camera(
            cid::FOCUS_ABSOLUTE,
            "Focus (absolute)",
            ct::FOCUS_ABSOLUTE,
            u16_field,
        )
        .master(cid::FOCUS_AUTO, 0),
        camera(cid::FOCUS_AUTO, "Focus, Auto", ct::FOCUS_AUTO, flag)
            .kind(ValueKind::Boolean)
            .slaves([cid::FOCUS_ABSOLUTE]),
        camera(cid::IRIS_ABSOLUTE, "Iris, Absolute", ct::IRIS_ABSOLUTE, u16_field),
        camera(
            cid::IRIS_RELATIVE,
            "Iris, Relative",
            ct::IRIS_RELATIVE,
            BitField::new(0, 8).signed(),
        ),
        camera(cid::ZOOM_ABSOLUTE, "Zoom, Absolute", ct::ZOOM_ABSOLUTE, u16_field),
        camera(
            cid::ZOOM_CONTINUOUS,
            "Zoom, Continuous",
            ct::ZOOM_RELATIVE,
            BitField::new(0, 0).signed(),
        )
        .codec(decode_zoom, encode_zoom),
        camera(
            cid::PAN_ABSOLUTE,
            "Pan (Absolute)",
            ct::PANTILT_ABSOLUTE,
            BitField::new(0, 32).signed(),
        ),
        camera(
            cid::TILT_ABSOLUTE,
            "Tilt (Absolute)",
            ct::PANTILT_ABSOLUTE,
            BitField::new(32, 32).signed(),
        ),
        camera(
            cid::PAN_SPEED,
            "Pan (Speed)",
            ct::PANTILT_RELATIVE,
            BitField::new(0, 16).signed(),
        )
        .codec(decode_rel_speed, encode_rel_speed),
        camera(
            cid::TILT_SPEED,
            "Tilt (Speed)",
            ct::PANTILT_RELATIVE,
            BitField::new(16, 16).signed(),
        )
        .codec(decode_rel_speed, encode_rel_speed),
        camera(cid::PRIVACY, "Privacy", ct::PRIVACY, flag).kind(ValueKind::Boolean),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(id: ControlId) -> Option<ControlMapping> {
        builtin_mappings().into_iter().find(|m| m.id == id)
    }

    #[test]
    fn test_zoom_codec() -> Result<(), Box<dyn std::error::Error>> {
        let zoom = find(cid::ZOOM_CONTINUOUS).ok_or("zoom mapping missing")?;
        let mut data = [0u8, 0x11, 0u8];

        zoom.encode(-3, &mut data);
        assert_eq!(data, [0xFF, 0x11, 0x03]);
        assert_eq!(zoom.decode(QueryKind::Current, &data), -3);
        // Range queries report the speed, negated for the minimum.
        assert_eq!(zoom.decode(QueryKind::Max, &data), 3);
        assert_eq!(zoom.decode(QueryKind::Min, &data), -3);

        zoom.encode(1000, &mut data);
        assert_eq!(data, [0x01, 0x11, 0xFF]);

        zoom.encode(0, &mut data);
        assert_eq!(zoom.decode(QueryKind::Current, &data), 0);
        Ok(())
    }

    #[test]
    fn test_rel_speed_codec_uses_byte_offset() -> Result<(), Box<dyn std::error::Error>> {
        let pan = find(cid::PAN_SPEED).ok_or("pan speed missing")?;
        let tilt = find(cid::TILT_SPEED).ok_or("tilt speed missing")?;
        let mut data = [0u8; 4];

        pan.encode(5, &mut data);
        tilt.encode(-7, &mut data);
        assert_eq!(data, [0x01, 0x05, 0xFF, 0x07]);

        assert_eq!(pan.decode(QueryKind::Current, &data), 5);
        assert_eq!(tilt.decode(QueryKind::Current, &data), -7);
        assert_eq!(tilt.decode(QueryKind::Min, &data), -7);
        assert_eq!(tilt.decode(QueryKind::Max, &data), 7);
        Ok(())
    }

    #[test]
    fn test_split_white_balance_fields() -> Result<(), Box<dyn std::error::Error>> {
        let blue = find(cid::BLUE_BALANCE).ok_or("blue missing")?;
        let red = find(cid::RED_BALANCE).ok_or("red missing")?;
        let mut data = [0u8; 4];

        blue.encode(-1, &mut data);
        red.encode(0x0102, &mut data);
        assert_eq!(data, [0xFF, 0xFF, 0x02, 0x01]);
        assert_eq!(blue.decode(QueryKind::Current, &data), -1);
        assert_eq!(red.decode(QueryKind::Current, &data), 0x0102);
        Ok(())
    }

    #[test]
    fn test_menu_translation() -> Result<(), Box<dyn std::error::Error>> {
        let exposure = find(cid::EXPOSURE_AUTO).ok_or("exposure auto missing")?;
        assert!(exposure.has_menu());
        assert_eq!(exposure.menu_index(1), Some(EXPOSURE_MANUAL as usize));
        assert_eq!(exposure.menu_value(0), Some(2));
        assert_eq!(exposure.menu_value(4), None);
        assert_eq!(exposure.menu_value(-1), None);

        let gain = find(cid::GAIN).ok_or("gain missing")?;
        assert!(!gain.has_menu());
        Ok(())
    }

    #[test]
    fn test_master_slave_links_are_symmetric() {
        let mappings = builtin_mappings();
        for mapping in &mappings {
            if let Some(master) = mapping.master {
                let listed = mappings
                    .iter()
                    .filter(|m| m.id == master.id)
                    .any(|m| m.slaves.contains(&mapping.id));
                assert!(listed, "{} not listed as slave of {}", mapping.id, master.id);
            }
        }
    }
}
