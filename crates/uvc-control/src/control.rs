//! Runtime state of one hardware control.
//!
//! A [`ResolvedControl`] owns six value slots of `descriptor.size` bytes each
//! (current, backup, min, max, resolution, default), the mappings copied onto
//! it at discovery, and its write state. Every method that talks to the device
//! takes the transport and entity explicitly; callers hold the entity lock.

use tracing::debug;

use crate::descriptor::{ControlDescriptor, ControlFlags};
use crate::entity::EntityId;
use crate::error::{ControlError, ControlResult};
use crate::ids::ControlId;
use crate::mapping::{ControlMapping, MasterLink, ValueKind};
use crate::tables::check_fits;
use crate::transport::{ControlTransport, QueryKind};

/// One of the six value slots of a control buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSlot {
    Current,
    Backup,
    Min,
    Max,
    Resolution,
    Default,
}

impl ControlSlot {
    const fn position(self) -> usize {
        match self {
            Self::Current => 0,
            Self::Backup => 1,
            Self::Min => 2,
            Self::Max => 3,
            Self::Resolution => 4,
            Self::Default => 5,
        }
    }
}

/// Range slots and the request that fills each of them.
const RANGE_QUERIES: [(ControlFlags, QueryKind, ControlSlot); 4] = [
    (ControlFlags::GET_MIN, QueryKind::Min, ControlSlot::Min),
    (ControlFlags::GET_MAX, QueryKind::Max, ControlSlot::Max),
    (ControlFlags::GET_RES, QueryKind::Resolution, ControlSlot::Resolution),
    (ControlFlags::GET_DEF, QueryKind::Default, ControlSlot::Default),
];

/// Six consecutive slots of `size` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlData {
    size: usize,
    bytes: Vec<u8>,
}

impl ControlData {
    pub const SLOTS: usize = 6;

    /// Allocate a zeroed buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AllocationFailure`] if the memory cannot be
    /// reserved.
    pub fn allocate(size: usize) -> ControlResult<Self> {
        let total = size
            .checked_mul(Self::SLOTS)
            .ok_or(ControlError::AllocationFailure { bytes: usize::MAX })?;
        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(total).is_err() {
            return Err(ControlError::AllocationFailure { bytes: total });
        }
        bytes.resize(total, 0);
        Ok(Self { size, bytes })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn range(&self, slot: ControlSlot) -> std::ops::Range<usize> {
        let start = slot.position() * self.size;
        start..start + self.size
    }

    #[must_use]
    pub fn slot(&self, slot: ControlSlot) -> &[u8] {
        self.bytes.get(self.range(slot)).unwrap_or_default()
    }

    pub fn slot_mut(&mut self, slot: ControlSlot) -> &mut [u8] {
        let range = self.range(slot);
        self.bytes.get_mut(range).unwrap_or_default()
    }

    pub fn copy_slot(&mut self, from: ControlSlot, to: ControlSlot) {
        let src = self.range(from);
        let dst = self.range(to);
        if src.end <= self.bytes.len() && dst.end <= self.bytes.len() {
            self.bytes.copy_within(src, dst.start);
        }
    }

    /// Copy `data` into a slot when the lengths agree.
    pub fn fill(&mut self, slot: ControlSlot, data: &[u8]) -> bool {
        let target = self.slot_mut(slot);
        if target.len() != data.len() {
            return false;
        }
        target.copy_from_slice(data);
        true
    }
}

/// Pending-write state of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteState {
    #[default]
    Clean,
    /// Current slot holds a value not yet sent to the device.
    Dirty,
}

/// Static metadata and range of one mapping, in logical units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInfo {
    pub id: ControlId,
    pub name: String,
    pub kind: ValueKind,
    pub entity: EntityId,
    pub selector: u8,
    pub readable: bool,
    pub writable: bool,
    pub auto_update: bool,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default: i32,
    /// Menu labels in index order. Empty for non-menu mappings.
    pub menu: Vec<String>,
    pub master: Option<MasterLink>,
    pub slaves: Vec<ControlId>,
}

/// Snap `value` to the nearest `step` above `min` and clamp it to `[min, max]`.
///
/// A zero step is treated as 1. Unsigned bounds are compared as `u32`.
#[must_use]
pub fn snap_to_range(value: i32, min: i32, max: i32, step: i32, signed: bool) -> i32 {
    let (lo, hi, step) = if signed {
        (i64::from(min), i64::from(max), i64::from(step).abs())
    } else {
        (
            i64::from(min as u32),
            i64::from(max as u32),
            i64::from(step as u32),
        )
    };
    let step = step.max(1);
    let value = i64::from(value);
    let snapped = lo + (value - lo + step / 2).div_euclid(step) * step;
    snapped.max(lo).min(hi) as i32
}

/// Logical value of a raw field: menu index for menu mappings.
fn to_logical(mapping: &ControlMapping, raw: i32) -> i32 {
    if mapping.has_menu() {
        mapping
            .menu_index(raw)
            .and_then(|index| i32::try_from(index).ok())
            .unwrap_or(raw)
    } else {
        raw
    }
}

/// A control matched to a descriptor.
#[derive(Debug, Clone)]
pub struct ResolvedControl {
    descriptor: ControlDescriptor,
    mappings: Vec<ControlMapping>,
    data: ControlData,
    state: WriteState,
    loaded: bool,
    /// `loaded` as it was when the backup slot was taken.
    backup_loaded: bool,
    modified: bool,
    cached: bool,
}

impl ResolvedControl {
    /// Allocate the value buffer for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AllocationFailure`] if the buffer cannot be
    /// allocated.
    pub fn new(descriptor: ControlDescriptor) -> ControlResult<Self> {
        Ok(Self {
            descriptor,
            mappings: Vec::new(),
            data: ControlData::allocate(descriptor.size_bytes())?,
            state: WriteState::Clean,
            loaded: false,
            backup_loaded: false,
            modified: false,
            cached: false,
        })
    }

    /// Append a copy of `mapping`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::OutOfRangeField`] if the field does not fit,
    /// [`ControlError::InvalidConfiguration`] if the id is already mapped on
    /// this control, or [`ControlError::AllocationFailure`].
    pub fn attach(&mut self, mapping: &ControlMapping) -> ControlResult<()> {
        check_fits(mapping, self.descriptor.size)?;
        if self.mapping(mapping.id).is_some() {
            return Err(ControlError::invalid_configuration(format!(
                "mapping {} already present on selector {:#04x}",
                mapping.id, self.descriptor.selector
            )));
        }
        if self.mappings.try_reserve(1).is_err() {
            return Err(ControlError::AllocationFailure {
                bytes: std::mem::size_of::<ControlMapping>(),
            });
        }
        debug!(id = %mapping.id, name = %mapping.name, selector = self.descriptor.selector, "Mapping added");
        self.mappings.push(mapping.clone());
        Ok(())
    }

    /// Remove the mapping for `id`.
    pub fn detach(&mut self, id: ControlId) -> Option<ControlMapping> {
        let position = self.mappings.iter().position(|m| m.id == id)?;
        Some(self.mappings.remove(position))
    }

    #[must_use]
    pub fn descriptor(&self) -> &ControlDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn mappings(&self) -> &[ControlMapping] {
        &self.mappings
    }

    #[must_use]
    pub fn mapping(&self, id: ControlId) -> Option<&ControlMapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn data(&self) -> &ControlData {
        &self.data
    }

    #[must_use]
    pub fn state(&self) -> WriteState {
        self.state
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state == WriteState::Dirty
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    fn position(&self, id: ControlId) -> ControlResult<usize> {
        self.mappings
            .iter()
            .position(|m| m.id == id)
            .ok_or(ControlError::UnsupportedControl(id))
    }

    fn fetch<T: ControlTransport + ?Sized>(
        &self,
        entity: EntityId,
        transport: &T,
        query: QueryKind,
    ) -> ControlResult<Vec<u8>> {
        let expected = self.descriptor.size_bytes();
        let data = transport.send_get(entity, self.descriptor.selector, query, expected)?;
        if data.len() != expected {
            return Err(ControlError::ShortResponse {
                selector: self.descriptor.selector,
                expected,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    fn load_current<T: ControlTransport + ?Sized>(&mut self, entity: EntityId, transport: &T) -> ControlResult<()> {
        let data = self.fetch(entity, transport, QueryKind::Current)?;
        self.data.fill(ControlSlot::Current, &data);
        self.loaded = true;
        Ok(())
    }

    /// Fetch min/max/resolution/default once.
    fn ensure_cached<T: ControlTransport + ?Sized>(&mut self, entity: EntityId, transport: &T) -> ControlResult<()> {
        if self.cached {
            return Ok(());
        }
        for (flag, query, slot) in RANGE_QUERIES {
            if self.descriptor.flags.contains(flag) {
                let data = self.fetch(entity, transport, query)?;
                self.data.fill(slot, &data);
            }
        }
        self.cached = true;
        Ok(())
    }

    /// Logical value of `id`, fetching the current value if it is stale.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AccessDenied`] for write-only controls, or the
    /// transport failure.
    pub fn read<T: ControlTransport + ?Sized>(
        &mut self,
        id: ControlId,
        entity: EntityId,
        transport: &T,
    ) -> ControlResult<i32> {
        let position = self.position(id)?;
        if !self.descriptor.can_get() {
            return Err(ControlError::access_denied(id, "GET_CUR"));
        }
        if !self.loaded {
            self.load_current(entity, transport)?;
        }
        let mapping = self.mappings.get(position).ok_or(ControlError::UnsupportedControl(id))?;
        let raw = mapping.decode(QueryKind::Current, self.data.slot(ControlSlot::Current));
        Ok(to_logical(mapping, raw))
    }

    /// Logical value held in the current slot, if it reflects the device.
    #[must_use]
    pub fn peek(&self, id: ControlId) -> Option<i32> {
        if !self.loaded {
            return None;
        }
        let mapping = self.mapping(id)?;
        let raw = mapping.decode(QueryKind::Current, self.data.slot(ControlSlot::Current));
        Some(to_logical(mapping, raw))
    }

    fn normalize<T: ControlTransport + ?Sized>(
        &mut self,
        id: ControlId,
        position: usize,
        value: i32,
        clamp: bool,
        entity: EntityId,
        transport: &T,
    ) -> ControlResult<i32> {
        let mapping = self.mappings.get(position).ok_or(ControlError::UnsupportedControl(id))?;
        let (kind, has_menu, signed) = (mapping.kind, mapping.has_menu(), mapping.field.signed);

        if kind == ValueKind::Boolean {
            return Ok(i32::from(value != 0));
        }

        if has_menu {
            let raw = mapping
                .menu_value(value)
                .ok_or(ControlError::invalid_value(id, value))?;
            if kind == ValueKind::Bitmask && self.descriptor.flags.contains(ControlFlags::GET_RES) {
                self.ensure_cached(entity, transport)?;
                let supported = self
                    .mappings
                    .get(position)
                    .map_or(0, |m| m.decode(QueryKind::Resolution, self.data.slot(ControlSlot::Resolution)));
                if supported & raw == 0 {
                    return Err(ControlError::invalid_value(id, value));
                }
            }
            return Ok(raw);
        }

        let bounded = self
            .descriptor
            .flags
            .contains(ControlFlags::GET_MIN.union(ControlFlags::GET_MAX));
        if kind != ValueKind::Integer || !clamp || !bounded {
            return Ok(value);
        }

        self.ensure_cached(entity, transport)?;
        let Some(mapping) = self.mappings.get(position) else {
            return Ok(value);
        };
        let min = mapping.decode(QueryKind::Min, self.data.slot(ControlSlot::Min));
        let max = mapping.decode(QueryKind::Max, self.data.slot(ControlSlot::Max));
        let step = if self.descriptor.flags.contains(ControlFlags::GET_RES) {
            mapping.decode(QueryKind::Resolution, self.data.slot(ControlSlot::Resolution))
        } else {
            1
        };
        Ok(snap_to_range(value, min, max, step, signed))
    }

    /// Write `value` into the current slot and mark the control dirty.
    ///
    /// Returns the value actually staged, after normalisation.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AccessDenied`] for read-only controls,
    /// [`ControlError::InvalidValue`] for a menu index outside the menu, or a
    /// transport failure while loading the untouched bits or the range.
    pub fn stage<T: ControlTransport + ?Sized>(
        &mut self,
        id: ControlId,
        value: i32,
        clamp: bool,
        entity: EntityId,
        transport: &T,
    ) -> ControlResult<i32> {
        let position = self.position(id)?;
        if !self.descriptor.can_set() {
            return Err(ControlError::access_denied(id, "SET_CUR"));
        }
        let value = self.normalize(id, position, value, clamp, entity, transport)?;

        let bits = self.mappings.get(position).map_or(0, |m| usize::from(m.field.bits));
        if !self.loaded && self.descriptor.size_bytes() * 8 != bits {
            // Partial write: the other bits of the buffer must come from the device.
            if self.descriptor.can_get() {
                self.load_current(entity, transport)?;
            } else {
                self.data.slot_mut(ControlSlot::Current).fill(0);
            }
            self.loaded = true;
        }

        if self.state == WriteState::Clean {
            self.data.copy_slot(ControlSlot::Current, ControlSlot::Backup);
            self.backup_loaded = self.loaded;
        }
        if let Some(mapping) = self.mappings.get(position) {
            mapping.encode(value, self.data.slot_mut(ControlSlot::Current));
        }
        // The staged value is what later reads in this transaction must see.
        self.loaded = true;
        self.state = WriteState::Dirty;
        self.modified = true;
        Ok(value)
    }

    /// Range and metadata of `id` in logical units.
    ///
    /// # Errors
    ///
    /// Returns a transport failure while fetching the range.
    pub fn info<T: ControlTransport + ?Sized>(
        &mut self,
        id: ControlId,
        entity: EntityId,
        transport: &T,
    ) -> ControlResult<ControlInfo> {
        let position = self.position(id)?;
        self.ensure_cached(entity, transport)?;
        let mapping = self.mappings.get(position).ok_or(ControlError::UnsupportedControl(id))?;
        let flags = self.descriptor.flags;

        let default = if flags.contains(ControlFlags::GET_DEF) {
            to_logical(mapping, mapping.decode(QueryKind::Default, self.data.slot(ControlSlot::Default)))
        } else {
            0
        };
        let decode_if = |flag: ControlFlags, query: QueryKind, slot: ControlSlot| {
            if flags.contains(flag) {
                mapping.decode(query, self.data.slot(slot))
            } else {
                0
            }
        };
        let (minimum, maximum, step) = if mapping.has_menu() {
            let last = i32::try_from(mapping.menu.len()).unwrap_or(i32::MAX) - 1;
            (0, last, 1)
        } else if mapping.kind == ValueKind::Boolean {
            (0, 1, 1)
        } else {
            (
                decode_if(ControlFlags::GET_MIN, QueryKind::Min, ControlSlot::Min),
                decode_if(ControlFlags::GET_MAX, QueryKind::Max, ControlSlot::Max),
                decode_if(ControlFlags::GET_RES, QueryKind::Resolution, ControlSlot::Resolution),
            )
        };

        Ok(ControlInfo {
            id,
            name: mapping.name.clone(),
            kind: mapping.kind,
            entity,
            selector: self.descriptor.selector,
            readable: self.descriptor.can_get(),
            writable: self.descriptor.can_set(),
            auto_update: self.descriptor.is_auto_update(),
            minimum,
            maximum,
            step,
            default,
            menu: mapping.menu.iter().map(|entry| entry.name.clone()).collect(),
            master: mapping.master,
            slaves: mapping.slaves.clone(),
        })
    }

    /// Current slot, for sending to the device.
    #[must_use]
    pub fn current(&self) -> &[u8] {
        self.data.slot(ControlSlot::Current)
    }

    /// Backup slot, for compensating writes.
    #[must_use]
    pub fn backup(&self) -> &[u8] {
        self.data.slot(ControlSlot::Backup)
    }

    /// True when the backup slot holds a value read back from the device.
    ///
    /// A full-width write never loads the current value, so its backup is the
    /// zeroed buffer and must not be written back.
    #[must_use]
    pub fn backup_is_known(&self) -> bool {
        self.backup_loaded && self.descriptor.can_get()
    }

    /// Undo a staged write. Returns true when the control was dirty.
    pub fn revert(&mut self) -> bool {
        if self.state != WriteState::Dirty {
            return false;
        }
        self.data.copy_slot(ControlSlot::Backup, ControlSlot::Current);
        self.loaded = self.backup_loaded;
        self.state = WriteState::Clean;
        true
    }

    /// Mark a committed write as applied.
    pub fn settle(&mut self) {
        self.state = WriteState::Clean;
    }

    /// Drop the cached current value if the device may change it on its own
    /// or cannot report it.
    pub fn invalidate(&mut self) {
        if self.descriptor.needs_refetch() {
            self.loaded = false;
        }
    }

    /// Stage the held value again for a session restore.
    ///
    /// Only modified controls that persist across sessions qualify.
    pub fn stage_restore(&mut self) -> bool {
        if !self.modified || !self.descriptor.flags.contains(ControlFlags::RESTORE) {
            return false;
        }
        if self.state == WriteState::Clean {
            self.data.copy_slot(ControlSlot::Current, ControlSlot::Backup);
            self.backup_loaded = self.loaded;
        }
        self.state = WriteState::Dirty;
        true
    }
}

/// How a capability bit is bound.
#[derive(Debug, Clone)]
pub enum ControlBinding {
    /// Extension-unit control not yet resolved.
    Unresolved,
    /// No descriptor matched, or resolution failed. Skipped by every lookup.
    Unsupported,
    Resolved(Box<ResolvedControl>),
}

/// One set bit of an entity's capability bitmap.
#[derive(Debug, Clone)]
pub struct Control {
    index: usize,
    binding: ControlBinding,
}

impl Control {
    #[must_use]
    pub fn new(index: usize, binding: ControlBinding) -> Self {
        Self { index, binding }
    }

    /// Bitmap index of the control.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn binding(&self) -> &ControlBinding {
        &self.binding
    }

    pub(crate) fn set_binding(&mut self, binding: ControlBinding) {
        self.binding = binding;
    }

    /// True when a descriptor was matched.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(self.binding, ControlBinding::Resolved(_))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.binding, ControlBinding::Unresolved)
    }

    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedControl> {
        match &self.binding {
            ControlBinding::Resolved(control) => Some(control),
            _ => None,
        }
    }

    pub fn resolved_mut(&mut self) -> Option<&mut ResolvedControl> {
        match &mut self.binding {
            ControlBinding::Resolved(control) => Some(control),
            _ => None,
        }
    }
}
