//! Entities of the device's functional graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{GUID_CAMERA, GUID_MEDIA_TRANSPORT_INPUT, GUID_PROCESSING};

/// 128-bit class or extension-unit identifier, stored in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Unit or terminal id assigned by the device descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u8);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of an entity. Decides which part of the descriptor table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Camera input terminal.
    Camera,
    /// Media transport input terminal.
    MediaTransportInput,
    /// Processing unit.
    ProcessingUnit,
    /// Vendor extension unit identified by its GUID.
    ExtensionUnit {
        /// Extension code GUID.
        guid: Guid,
    },
    /// Any other terminal or unit type. Carries no controls.
    Other(u16),
}

impl EntityKind {
    /// GUID used to match descriptors, mappings and blacklist rules.
    #[must_use]
    pub const fn guid(&self) -> Option<Guid> {
        match self {
            Self::Camera => Some(GUID_CAMERA),
            Self::MediaTransportInput => Some(GUID_MEDIA_TRANSPORT_INPUT),
            Self::ProcessingUnit => Some(GUID_PROCESSING),
            Self::ExtensionUnit { guid } => Some(*guid),
            Self::Other(_) => None,
        }
    }

    #[must_use]
    pub const fn is_extension(&self) -> bool {
        matches!(self, Self::ExtensionUnit { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::MediaTransportInput => "media-transport-input",
            Self::ProcessingUnit => "processing-unit",
            Self::ExtensionUnit { .. } => "extension-unit",
            Self::Other(_) => "other",
        }
    }
}

/// Vendor/product pair of the device, used for quirk lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    #[must_use]
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// An entity as supplied by descriptor discovery.
///
/// `bitmap` is the `bmControls` capability bitmap. Bit `i` set means the
/// control at table index `i` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub bitmap: Vec<u8>,
}

impl Entity {
    #[must_use]
    pub fn new(id: u8, kind: EntityKind, bitmap: impl Into<Vec<u8>>) -> Self {
        Self {
            id: EntityId(id),
            kind,
            bitmap: bitmap.into(),
        }
    }

    #[must_use]
    pub fn camera(id: u8, bitmap: impl Into<Vec<u8>>) -> Self {
        Self::new(id, EntityKind::Camera, bitmap)
    }

    #[must_use]
    pub fn processing_unit(id: u8, bitmap: impl Into<Vec<u8>>) -> Self {
        Self::new(id, EntityKind::ProcessingUnit, bitmap)
    }

    #[must_use]
    pub fn extension_unit(id: u8, guid: Guid, bitmap: impl Into<Vec<u8>>) -> Self {
        Self::new(id, EntityKind::ExtensionUnit { guid }, bitmap)
    }

    /// Number of bits the bitmap can describe.
    #[must_use]
    pub fn bitmap_bits(&self) -> usize {
        self.bitmap.len() * 8
    }
}
