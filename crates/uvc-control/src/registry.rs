//! Entity and control bookkeeping: discovery, lookup, lazy extension-unit
//! resolution, runtime mapping changes and teardown.
//!
//! # Locking
//!
//! Each entity's control set sits behind its own mutex, so transactions on
//! different entities run in parallel. The id index has its own `RwLock`.
//! When both are needed the entity lock is taken first.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uvc_bitfield::{set_bits, weight};

use crate::blacklist::{BlacklistRule, prune_entity};
use crate::control::{Control, ControlBinding, ResolvedControl};
use crate::descriptor::{ControlDescriptor, ControlFlags};
use crate::entity::{DeviceIdentity, Entity, EntityId, EntityKind, Guid};
use crate::error::{ControlError, ControlResult};
use crate::ids::ControlId;
use crate::mapping::ControlMapping;
use crate::tables::ControlTables;
use crate::transport::{ControlTransport, QueryKind};

/// GET_INFO capability bits of extension-unit controls.
mod info_bits {
    pub const GET: u8 = 1 << 0;
    pub const SET: u8 = 1 << 1;
    pub const AUTO_UPDATE: u8 = 1 << 3;
}

/// Outcome of discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub entities: usize,
    /// One per set capability bit after pruning.
    pub controls: usize,
    /// Controls matched to a descriptor.
    pub initialized: usize,
    /// Extension-unit controls awaiting resolution.
    pub pending: usize,
    /// Capability bits cleared by the blacklist.
    pub pruned: usize,
    /// Entities whose controls could not be set up. Other entities are unaffected.
    pub failures: Vec<(EntityId, ControlError)>,
}

/// Resources released by teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub controls: usize,
    pub mappings: usize,
    /// Value buffer bytes released.
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location {
    entity: EntityId,
    position: usize,
}

/// An entity and its control set.
#[derive(Debug)]
pub struct EntityControls {
    entity: Entity,
    controls: Mutex<Vec<Control>>,
}

impl EntityControls {
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Control>> {
        self.controls.lock()
    }
}

/// Every entity of one device session.
#[derive(Debug)]
pub struct ControlRegistry {
    identity: DeviceIdentity,
    tables: Arc<ControlTables>,
    entities: Vec<EntityControls>,
    index: RwLock<HashMap<ControlId, Location>>,
}

impl ControlRegistry {
    /// Prune, count and match the controls of every entity.
    ///
    /// A failure on one entity leaves it without controls and is recorded in
    /// the report; the remaining entities are still discovered.
    pub fn discover(
        identity: DeviceIdentity,
        entities: Vec<Entity>,
        tables: Arc<ControlTables>,
        extra_blacklist: &[BlacklistRule],
    ) -> (Self, DiscoveryReport) {
        let mut report = DiscoveryReport::default();
        let mut index = HashMap::new();
        let mut built = Vec::with_capacity(entities.len());

        for mut entity in entities {
            report.entities += 1;
            report.pruned += prune_entity(
                identity,
                &mut entity,
                tables.blacklist().iter().chain(extra_blacklist),
            );

            let controls = match build_controls(&entity, &tables) {
                Ok(controls) => controls,
                Err(err) => {
                    error!(entity = %entity.id, kind = entity.kind.label(), error = %err, "Control setup failed");
                    report.failures.push((entity.id, err));
                    Vec::new()
                }
            };

            for (position, control) in controls.iter().enumerate() {
                report.controls += 1;
                let location = Location {
                    entity: entity.id,
                    position,
                };
                match control.binding() {
                    ControlBinding::Resolved(resolved) => {
                        report.initialized += 1;
                        for mapping in resolved.mappings() {
                            index.entry(mapping.id).or_insert(location);
                        }
                    }
                    ControlBinding::Unresolved => {
                        report.pending += 1;
                        if let EntityKind::ExtensionUnit { guid } = entity.kind {
                            if let Some(selector) = extension_selector(&tables, &guid, control.index()) {
                                for mapping in tables.mappings_for(&guid, selector) {
                                    index.entry(mapping.id).or_insert(location);
                                }
                            }
                        }
                    }
                    ControlBinding::Unsupported => {}
                }
            }

            built.push(EntityControls {
                entity,
                controls: Mutex::new(controls),
            });
        }

        info!(
            device = %identity,
            entities = report.entities,
            controls = report.controls,
            initialized = report.initialized,
            pending = report.pending,
            pruned = report.pruned,
            failures = report.failures.len(),
            "Control discovery complete"
        );

        let registry = Self {
            identity,
            tables,
            entities: built,
            index: RwLock::new(index),
        };
        (registry, report)
    }

    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    #[must_use]
    pub fn tables(&self) -> &Arc<ControlTables> {
        &self.tables
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityControls> {
        self.entities.iter()
    }

    /// # Errors
    ///
    /// Returns [`ControlError::UnknownEntity`] if no entity has this id.
    pub fn entity(&self, id: EntityId) -> ControlResult<&EntityControls> {
        self.entities
            .iter()
            .find(|e| e.id() == id)
            .ok_or(ControlError::UnknownEntity(id))
    }

    fn location(&self, id: ControlId) -> ControlResult<Location> {
        self.index
            .read()
            .get(&id)
            .copied()
            .ok_or(ControlError::UnsupportedControl(id))
    }

    /// Entity that owns the mapping for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] if no mapping carries `id`.
    pub fn locate(&self, id: ControlId) -> ControlResult<EntityId> {
        self.location(id).map(|location| location.entity)
    }

    /// Resolved control carrying `id` inside a locked entity, resolving a
    /// pending extension-unit control on the way.
    pub(crate) fn find_control<'c, T: ControlTransport + ?Sized>(
        &self,
        entity: &Entity,
        controls: &'c mut [Control],
        id: ControlId,
        transport: &T,
    ) -> ControlResult<&'c mut ResolvedControl> {
        let location = self.location(id)?;
        if location.entity != entity.id {
            return Err(ControlError::UnsupportedControl(id));
        }
        let control = controls
            .get_mut(location.position)
            .ok_or(ControlError::UnsupportedControl(id))?;
        resolve_if_pending(entity, control, &self.tables, transport)?;
        match control.resolved_mut() {
            Some(resolved) if resolved.mapping(id).is_some() => Ok(resolved),
            _ => Err(ControlError::UnsupportedControl(id)),
        }
    }

    /// Like [`Self::find_control`] without resolving: `None` for a pending
    /// extension-unit control.
    pub(crate) fn find_resolved<'c>(
        &self,
        entity: &Entity,
        controls: &'c [Control],
        id: ControlId,
    ) -> ControlResult<Option<&'c ResolvedControl>> {
        let location = self.location(id)?;
        if location.entity != entity.id {
            return Err(ControlError::UnsupportedControl(id));
        }
        let control = controls
            .get(location.position)
            .ok_or(ControlError::UnsupportedControl(id))?;
        match control.binding() {
            ControlBinding::Unresolved => Ok(None),
            ControlBinding::Resolved(resolved) if resolved.mapping(id).is_some() => Ok(Some(resolved.as_ref())),
            _ => Err(ControlError::UnsupportedControl(id)),
        }
    }

    /// Resolve every pending extension-unit control of an entity.
    ///
    /// Returns the number of controls now resolved. Controls whose queries hit
    /// a transport failure stay pending.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownEntity`] if no entity has this id.
    pub fn resolve_extension_units<T: ControlTransport + ?Sized>(
        &self,
        entity: EntityId,
        transport: &T,
    ) -> ControlResult<usize> {
        let owner = self.entity(entity)?;
        let mut controls = owner.lock();
        let mut resolved = 0;
        let mut added = Vec::new();
        for (position, control) in controls.iter_mut().enumerate() {
            if !control.is_pending() {
                continue;
            }
            // Transport failures stay pending for a later access.
            if resolve_if_pending(&owner.entity, control, &self.tables, transport).is_err() {
                continue;
            }
            if let Some(control) = control.resolved() {
                resolved += 1;
                added.extend(control.mappings().iter().map(|m| (m.id, position)));
            }
        }
        let mut index = self.index.write();
        for (id, position) in added {
            index.entry(id).or_insert(Location { entity, position });
        }
        Ok(resolved)
    }

    /// Copies of every mapping on resolved controls of an entity.
    ///
    /// Pending extension-unit controls are not resolved by this call.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownEntity`] if no entity has this id.
    pub fn mappings(&self, entity: EntityId) -> ControlResult<Vec<ControlMapping>> {
        let owner = self.entity(entity)?;
        let controls = owner.lock();
        Ok(controls
            .iter()
            .filter_map(Control::resolved)
            .flat_map(|control| control.mappings().iter().cloned())
            .collect())
    }

    /// Copy `mapping` onto the control of `entity` it targets.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] if the entity has no such
    /// control, [`ControlError::OutOfRangeField`] if the field does not fit, or
    /// [`ControlError::InvalidConfiguration`] if the control already carries the id.
    /// A transport failure while resolving an extension-unit target is returned
    /// as [`ControlError::Transport`] and the control stays pending.
    pub fn add_mapping<T: ControlTransport + ?Sized>(
        &self,
        entity: EntityId,
        mapping: &ControlMapping,
        transport: &T,
    ) -> ControlResult<()> {
        let owner = self.entity(entity)?;
        let Some(guid) = owner.entity.kind.guid().filter(|guid| *guid == mapping.entity) else {
            return Err(ControlError::UnsupportedControl(mapping.id));
        };

        let mut controls = owner.lock();
        let mut target = None;
        for (position, control) in controls.iter_mut().enumerate() {
            let selector = match control.binding() {
                ControlBinding::Resolved(resolved) => Some(resolved.descriptor().selector),
                ControlBinding::Unresolved => extension_selector(&self.tables, &guid, control.index()),
                ControlBinding::Unsupported => None,
            };
            if selector == Some(mapping.selector) {
                resolve_if_pending(&owner.entity, control, &self.tables, transport)?;
                target = control.resolved_mut().map(|resolved| (position, resolved));
                break;
            }
        }
        let Some((position, control)) = target else {
            return Err(ControlError::UnsupportedControl(mapping.id));
        };

        control.attach(mapping)?;
        self.index
            .write()
            .entry(mapping.id)
            .or_insert(Location { entity, position });
        Ok(())
    }

    /// Remove the per-session mapping for `id`. The shared tables are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] if no mapping carries `id`.
    pub fn remove_mapping(&self, id: ControlId) -> ControlResult<ControlMapping> {
        let location = self.location(id)?;
        let owner = self.entity(location.entity)?;
        let mut controls = owner.lock();

        let removed = controls
            .get_mut(location.position)
            .and_then(Control::resolved_mut)
            .and_then(|control| control.detach(id))
            .ok_or(ControlError::UnsupportedControl(id))?;

        // Another control of the same entity may carry the same id.
        let next = controls.iter().enumerate().find_map(|(position, control)| {
            control
                .resolved()
                .and_then(|resolved| resolved.mapping(id))
                .map(|_| position)
        });
        let mut index = self.index.write();
        match next {
            Some(position) => {
                index.insert(
                    id,
                    Location {
                        entity: location.entity,
                        position,
                    },
                );
            }
            None => {
                index.remove(&id);
            }
        }
        debug!(id = %id, entity = %location.entity, "Mapping removed");
        Ok(removed)
    }

    /// Release every control buffer and mapping copy.
    ///
    /// Entity identities and bitmaps stay. Afterwards every lookup reports
    /// [`ControlError::UnsupportedControl`].
    pub fn teardown(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for owner in &self.entities {
            let mut controls = owner.lock();
            for control in controls.iter() {
                report.controls += 1;
                if let Some(resolved) = control.resolved() {
                    report.mappings += resolved.mappings().len();
                    report.bytes += resolved.data().size() * crate::control::ControlData::SLOTS;
                }
            }
            controls.clear();
        }
        self.index.write().clear();
        info!(
            device = %self.identity,
            controls = report.controls,
            mappings = report.mappings,
            bytes = report.bytes,
            "Controls released"
        );
        report
    }
}

/// Controls for every set bit of an entity's bitmap.
fn build_controls(entity: &Entity, tables: &ControlTables) -> ControlResult<Vec<Control>> {
    let Some(guid) = entity.kind.guid() else {
        return Ok(Vec::new());
    };

    let count = weight(&entity.bitmap);
    let mut controls = Vec::new();
    if controls.try_reserve_exact(count).is_err() {
        return Err(ControlError::AllocationFailure {
            bytes: count * std::mem::size_of::<Control>(),
        });
    }

    for index in set_bits(&entity.bitmap) {
        // Querying extension units during discovery destabilizes some devices.
        if entity.kind.is_extension() {
            controls.push(Control::new(index, ControlBinding::Unresolved));
            continue;
        }
        let binding = match tables.descriptor(&guid, index) {
            Some(descriptor) => {
                let mut control = ResolvedControl::new(*descriptor)?;
                for mapping in tables.mappings_for(&guid, descriptor.selector) {
                    control.attach(mapping)?;
                }
                debug!(
                    entity = %entity.id,
                    index,
                    selector = descriptor.selector,
                    mappings = control.mappings().len(),
                    "Control added"
                );
                ControlBinding::Resolved(Box::new(control))
            }
            None => ControlBinding::Unsupported,
        };
        controls.push(Control::new(index, binding));
    }
    Ok(controls)
}

/// Selector of the extension-unit control at bitmap `index`.
fn extension_selector(tables: &ControlTables, guid: &Guid, index: usize) -> Option<u8> {
    match tables.descriptor(guid, index) {
        Some(descriptor) => Some(descriptor.selector),
        None => u8::try_from(index + 1).ok(),
    }
}

/// Resolve a pending extension-unit control.
///
/// A definite answer is memoized: success as resolved, a malformed reply as
/// unsupported. A transport failure leaves the control pending and is returned.
fn resolve_if_pending<T: ControlTransport + ?Sized>(
    entity: &Entity,
    control: &mut Control,
    tables: &ControlTables,
    transport: &T,
) -> ControlResult<()> {
    if !control.is_pending() {
        return Ok(());
    }
    let binding = match resolve_extension(entity, control.index(), tables, transport) {
        Ok(resolved) => {
            debug!(
                entity = %entity.id,
                index = control.index(),
                selector = resolved.descriptor().selector,
                size = resolved.descriptor().size,
                "Extension unit control resolved"
            );
            ControlBinding::Resolved(Box::new(resolved))
        }
        Err(err @ ControlError::Transport(_)) => {
            warn!(entity = %entity.id, index = control.index(), error = %err, "Extension unit query failed, control stays pending");
            return Err(err);
        }
        Err(err) => {
            warn!(entity = %entity.id, index = control.index(), error = %err, "Extension unit control unavailable");
            ControlBinding::Unsupported
        }
    };
    control.set_binding(binding);
    Ok(())
}

fn resolve_extension<T: ControlTransport + ?Sized>(
    entity: &Entity,
    index: usize,
    tables: &ControlTables,
    transport: &T,
) -> ControlResult<ResolvedControl> {
    let EntityKind::ExtensionUnit { guid } = entity.kind else {
        return Err(ControlError::UnknownEntity(entity.id));
    };
    let descriptor = match tables.descriptor(&guid, index) {
        Some(descriptor) => *descriptor,
        None => query_extension(entity.id, guid, index, transport)?,
    };

    let mut control = ResolvedControl::new(descriptor)?;
    for mapping in tables.mappings_for(&guid, descriptor.selector) {
        if let Err(err) = control.attach(mapping) {
            warn!(id = %mapping.id, error = %err, "Extension unit mapping skipped");
        }
    }
    Ok(control)
}

/// Ask the device for the size and capabilities of an extension-unit control.
fn query_extension<T: ControlTransport + ?Sized>(
    entity: EntityId,
    guid: Guid,
    index: usize,
    transport: &T,
) -> ControlResult<ControlDescriptor> {
    let (Ok(bit), Some(selector)) = (u8::try_from(index), u8::try_from(index + 1).ok()) else {
        return Err(ControlError::invalid_configuration(format!(
            "extension unit control index {index} has no selector"
        )));
    };

    let length = transport.send_get(entity, selector, QueryKind::Length, 2)?;
    let size = match length.as_slice() {
        [lo, hi] => u16::from_le_bytes([*lo, *hi]),
        other => {
            return Err(ControlError::ShortResponse {
                selector,
                expected: 2,
                actual: other.len(),
            });
        }
    };

    let info = transport.send_get(entity, selector, QueryKind::Info, 1)?;
    let bits = match info.as_slice() {
        [bits] => *bits,
        other => {
            return Err(ControlError::ShortResponse {
                selector,
                expected: 1,
                actual: other.len(),
            });
        }
    };

    let mut flags = ControlFlags::GET_MIN | ControlFlags::GET_MAX | ControlFlags::GET_RES | ControlFlags::GET_DEF;
    if bits & info_bits::GET != 0 {
        flags |= ControlFlags::GET_CUR;
    }
    if bits & info_bits::SET != 0 {
        flags |= ControlFlags::SET_CUR;
    }
    if bits & info_bits::AUTO_UPDATE != 0 {
        flags |= ControlFlags::AUTO_UPDATE;
    }
    Ok(ControlDescriptor::new(guid, selector, bit, size, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::BUILTIN_BLACKLIST;
    use crate::error::TransportError;
    use crate::ids::{cid, pu};
    use crate::transport::mock::MockTransport;
    use uvc_bitfield::BitField;

    const XU_GUID: Guid = Guid([0x5A; 16]);

    fn discover(identity: DeviceIdentity, entities: Vec<Entity>) -> (ControlRegistry, DiscoveryReport) {
        ControlRegistry::discover(identity, entities, ControlTables::builtin(), &[])
    }

    #[test]
    fn test_blacklisted_bit_is_not_instantiated() {
        let (registry, report) = discover(
            DeviceIdentity::new(0x5986, 0x0241),
            vec![Entity::processing_unit(2, [0b0000_0101])],
        );
        assert_eq!(report.pruned, 1);
        assert_eq!(report.controls, 1);
        assert_eq!(report.initialized, 1);
        assert_eq!(registry.locate(cid::BRIGHTNESS), Ok(EntityId(2)));
        assert_eq!(registry.locate(cid::HUE), Err(ControlError::UnsupportedControl(cid::HUE)));
    }

    #[test]
    fn test_unknown_bits_stay_uninitialized() {
        // Bit 20 has no processing-unit descriptor.
        let (_, report) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::processing_unit(2, [0x01, 0x00, 0x10])],
        );
        assert_eq!(report.controls, 2);
        assert_eq!(report.initialized, 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_other_entities_have_no_controls() {
        let (registry, report) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::new(5, EntityKind::Other(0x0301), [0xFF])],
        );
        assert_eq!(report.controls, 0);
        assert_eq!(registry.entities().count(), 1);
    }

    #[test]
    fn test_extra_blacklist_applies() {
        let extra = [BlacklistRule::new(0x046d, 0x0825, EntityKind::ProcessingUnit, 0)];
        let (_, report) = ControlRegistry::discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::processing_unit(2, [0b0000_0011])],
            ControlTables::builtin(),
            &extra,
        );
        assert_eq!(report.pruned, 1);
        assert_eq!(report.controls, 1);
        assert_eq!(BUILTIN_BLACKLIST.len(), 4);
    }

    #[test]
    fn test_extension_unit_resolves_lazily_once() -> ControlResult<()> {
        let mock = MockTransport::new();
        let unit = EntityId(6);
        mock.respond(unit, 0x01, QueryKind::Length, [0x02, 0x00]);
        mock.respond(unit, 0x01, QueryKind::Info, [0x03]);

        let (registry, report) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::extension_unit(6, XU_GUID, [0b0000_0001])],
        );
        assert_eq!(report.pending, 1);
        assert_eq!(mock.call_count(), 0);

        let vendor = ControlMapping::new(ControlId(0x0100_0001), "Vendor", XU_GUID, 0x01, BitField::new(0, 16));
        registry.add_mapping(unit, &vendor, &mock)?;
        assert_eq!(mock.call_count(), 2);

        let owner = registry.entity(unit)?;
        let mut controls = owner.lock();
        let control = registry.find_control(owner.entity(), &mut controls, vendor.id, &mock)?;
        assert_eq!(control.descriptor().size, 2);
        assert!(control.descriptor().can_get() && control.descriptor().can_set());
        assert!(!control.descriptor().is_auto_update());
        // No further GET_LEN/GET_INFO once resolved.
        assert_eq!(mock.call_count(), 2);
        Ok(())
    }

    #[test]
    fn test_failed_extension_resolution_is_memoized() -> ControlResult<()> {
        let mock = MockTransport::new();
        // GET_LEN answers with three bytes.
        mock.respond(EntityId(6), 0x02, QueryKind::Length, [0x02, 0x00, 0x00]);
        let (registry, _) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::extension_unit(6, XU_GUID, [0b0000_0010])],
        );

        assert_eq!(registry.resolve_extension_units(EntityId(6), &mock)?, 0);
        let calls = mock.call_count();
        assert_eq!(registry.resolve_extension_units(EntityId(6), &mock)?, 0);
        assert_eq!(mock.call_count(), calls);
        Ok(())
    }

    #[test]
    fn test_transient_extension_failure_is_retried() -> ControlResult<()> {
        let mock = MockTransport::new();
        let unit = EntityId(6);
        mock.fail_gets(Some(TransportError::Timeout));
        let (registry, _) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::extension_unit(6, XU_GUID, [0b0000_0001])],
        );
        let vendor = ControlMapping::new(ControlId(0x0100_0003), "Vendor", XU_GUID, 0x01, BitField::new(0, 16));

        assert_eq!(
            registry.add_mapping(unit, &vendor, &mock),
            Err(ControlError::Transport(TransportError::Timeout))
        );
        assert_eq!(registry.resolve_extension_units(unit, &mock)?, 0);
        assert!(registry.entity(unit)?.lock().first().is_some_and(Control::is_pending));

        mock.fail_gets(None);
        mock.respond(unit, 0x01, QueryKind::Length, [0x02, 0x00]);
        mock.respond(unit, 0x01, QueryKind::Info, [0x03]);
        registry.add_mapping(unit, &vendor, &mock)?;
        assert_eq!(registry.locate(vendor.id)?, unit);
        Ok(())
    }

    #[test]
    fn test_shared_white_balance_auto_id_reaches_temperature_control() -> ControlResult<()> {
        // White balance temperature auto (bit 12) and component auto (bit 13).
        let (registry, report) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::processing_unit(2, [0x00, 0b0011_0000])],
        );
        assert_eq!(report.initialized, 2);

        let both = registry
            .mappings(EntityId(2))?
            .iter()
            .filter(|mapping| mapping.id == cid::AUTO_WHITE_BALANCE)
            .count();
        assert_eq!(both, 2);

        let owner = registry.entity(EntityId(2))?;
        let controls = owner.lock();
        let control = registry.find_resolved(owner.entity(), &controls, cid::AUTO_WHITE_BALANCE)?;
        assert_eq!(
            control.map(|control| control.descriptor().selector),
            Some(pu::WHITE_BALANCE_TEMPERATURE_AUTO)
        );
        Ok(())
    }

    #[test]
    fn test_add_and_remove_mapping() -> ControlResult<()> {
        let mock = MockTransport::new();
        let (registry, _) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::processing_unit(2, [0x01, 0x02])],
        );
        let low_byte = ControlMapping::new(
            ControlId(0x0100_0002),
            "Brightness, Low Byte",
            crate::ids::GUID_PROCESSING,
            pu::BRIGHTNESS,
            BitField::new(0, 8),
        );
        registry.add_mapping(EntityId(2), &low_byte, &mock)?;
        assert_eq!(registry.mappings(EntityId(2))?.len(), 3);

        let too_wide = ControlMapping::new(
            ControlId(0x0100_0003),
            "Too Wide",
            crate::ids::GUID_PROCESSING,
            pu::BRIGHTNESS,
            BitField::new(8, 16),
        );
        assert!(matches!(
            registry.add_mapping(EntityId(2), &too_wide, &mock),
            Err(ControlError::OutOfRangeField { .. })
        ));
        assert!(matches!(
            registry.add_mapping(EntityId(2), &low_byte, &mock),
            Err(ControlError::InvalidConfiguration(_))
        ));

        let removed = registry.remove_mapping(low_byte.id)?;
        assert_eq!(removed.name, "Brightness, Low Byte");
        assert!(registry.locate(low_byte.id).is_err());
        // The shared table still has the stock mappings.
        assert_eq!(
            ControlTables::builtin().mappings_for(&crate::ids::GUID_PROCESSING, pu::BRIGHTNESS).count(),
            1
        );
        Ok(())
    }

    #[test]
    fn test_teardown_releases_everything() -> ControlResult<()> {
        let (registry, _) = discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![
                Entity::processing_unit(2, [0x81, 0x00]),
                Entity::camera(1, [0x08]),
            ],
        );
        let report = registry.teardown();
        // Brightness, white balance component, exposure time.
        assert_eq!(report.controls, 3);
        assert_eq!(report.mappings, 4);
        assert_eq!(report.bytes, (2 + 4 + 4) * 6);
        assert!(registry.locate(cid::BRIGHTNESS).is_err());
        assert_eq!(registry.entity(EntityId(1))?.entity().bitmap, vec![0x08]);
        Ok(())
    }
}
