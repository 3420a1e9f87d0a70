//! Per-device facade over the registry, transport and configuration.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::control::{Control, ControlInfo, ResolvedControl};
use crate::entity::{DeviceIdentity, Entity, EntityId};
use crate::error::{ControlError, ControlResult};
use crate::ids::ControlId;
use crate::mapping::ControlMapping;
use crate::registry::{ControlRegistry, DiscoveryReport, TeardownReport};
use crate::resolver::Eligibility;
use crate::tables::ControlTables;
use crate::transaction::{self, Transaction};
use crate::transport::ControlTransport;

/// Outcome of [`ControlDevice::restore_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Controls written back to the device.
    pub restored: usize,
    /// Entities whose restore commit failed; their controls were reverted.
    pub failures: Vec<(EntityId, ControlError)>,
}

/// Controls of one device session.
///
/// ```
/// use uvc_control::prelude::*;
/// use uvc_control::transport::mock::MockTransport;
///
/// # fn main() -> ControlResult<()> {
/// let device = ControlDevice::discover(
///     DeviceIdentity::new(0x046d, 0x0825),
///     vec![Entity::processing_unit(2, [0b0000_0011])],
///     MockTransport::new(),
///     EngineConfig::builder().clamp_to_range(false).build()?,
/// )?;
///
/// let mut tx = device.begin_for(cid::CONTRAST)?;
/// tx.set(cid::CONTRAST, 300)?;
/// tx.commit()?;
/// assert_eq!(device.get(cid::CONTRAST)?, 300);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ControlDevice<T: ControlTransport> {
    registry: ControlRegistry,
    transport: T,
    config: EngineConfig,
    report: DiscoveryReport,
}

impl<T: ControlTransport> ControlDevice<T> {
    /// Discover the controls of `entities` against the built-in tables.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidConfiguration`] if `config` is invalid.
    /// Per-entity failures do not fail discovery; see
    /// [`Self::discovery_report`].
    pub fn discover(
        identity: DeviceIdentity,
        entities: Vec<Entity>,
        transport: T,
        config: EngineConfig,
    ) -> ControlResult<Self> {
        Self::with_tables(identity, entities, transport, config, ControlTables::builtin())
    }

    /// Discover against custom tables.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidConfiguration`] if `config` is invalid.
    pub fn with_tables(
        identity: DeviceIdentity,
        entities: Vec<Entity>,
        transport: T,
        config: EngineConfig,
        tables: Arc<ControlTables>,
    ) -> ControlResult<Self> {
        config.validate()?;
        let (registry, report) = ControlRegistry::discover(identity, entities, tables, &config.extra_blacklist);
        let device = Self {
            registry,
            transport,
            config,
            report,
        };

        if !device.config.lazy_extension_units {
            for owner in device.registry.entities() {
                if !owner.entity().kind.is_extension() {
                    continue;
                }
                let resolved = device.registry.resolve_extension_units(owner.id(), &device.transport)?;
                debug!(entity = %owner.id(), resolved, "Extension unit resolved eagerly");
            }
        }
        Ok(device)
    }

    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        self.registry.identity()
    }

    #[must_use]
    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn discovery_report(&self) -> &DiscoveryReport {
        &self.report
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.registry.entities().map(|owner| owner.entity())
    }

    /// Mappings on the resolved controls of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownEntity`].
    pub fn mappings(&self, entity: EntityId) -> ControlResult<Vec<ControlMapping>> {
        self.registry.mappings(entity)
    }

    fn with_control<R>(
        &self,
        id: ControlId,
        f: impl FnOnce(&mut ResolvedControl, EntityId, &T) -> ControlResult<R>,
    ) -> ControlResult<R> {
        let owner = self.registry.entity(self.registry.locate(id)?)?;
        let mut controls = owner.lock();
        let control = self
            .registry
            .find_control(owner.entity(), &mut controls, id, &self.transport)?;
        f(control, owner.id(), &self.transport)
    }

    /// Logical value of `id`, fetched from the device when not cached.
    ///
    /// Blocks while a transaction holds the owning entity.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`], [`ControlError::AccessDenied`]
    /// or a transport failure.
    pub fn get(&self, id: ControlId) -> ControlResult<i32> {
        self.with_control(id, |control, entity, transport| control.read(id, entity, transport))
    }

    /// Cached logical value of `id`, without I/O.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] if no mapping carries `id`.
    pub fn peek(&self, id: ControlId) -> ControlResult<Option<i32>> {
        let owner = self.registry.entity(self.registry.locate(id)?)?;
        let controls = owner.lock();
        let control = self.registry.find_resolved(owner.entity(), &controls, id)?;
        Ok(control.and_then(|control| control.peek(id)))
    }

    /// Range and metadata of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] or a transport failure
    /// while fetching the range.
    pub fn query(&self, id: ControlId) -> ControlResult<ControlInfo> {
        self.with_control(id, |control, entity, transport| control.info(id, entity, transport))
    }

    /// Whether `id` may be written now.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] or a transport failure
    /// while reading the master.
    pub fn eligibility(&self, id: ControlId) -> ControlResult<Eligibility> {
        let owner = self.registry.entity(self.registry.locate(id)?)?;
        let mut controls = owner.lock();
        transaction::eligibility(&self.registry, owner.entity(), &mut controls, id, &self.transport)
    }

    /// Open a transaction on `entity`, waiting for any other one to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownEntity`].
    pub fn begin(&self, entity: EntityId) -> ControlResult<Transaction<'_, T>> {
        let owner = self.registry.entity(entity)?;
        Ok(Transaction::begin(self, owner))
    }

    /// Open a transaction on the entity that owns `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`].
    pub fn begin_for(&self, id: ControlId) -> ControlResult<Transaction<'_, T>> {
        self.begin(self.registry.locate(id)?)
    }

    /// Write back every modified control that persists across sessions.
    ///
    /// Each entity is committed on its own; a failed entity is reverted and
    /// reported while the others are still restored.
    pub fn restore_all(&self) -> RestoreReport {
        let mut report = RestoreReport::default();
        for owner in self.registry.entities() {
            let mut controls = owner.lock();
            let mut staged = 0;
            for control in controls.iter_mut().filter_map(Control::resolved_mut) {
                if control.stage_restore() {
                    debug!(entity = %owner.id(), selector = control.descriptor().selector, "Control restored");
                    staged += 1;
                }
            }
            if staged == 0 {
                continue;
            }
            match transaction::commit_controls(
                owner.id(),
                &mut controls,
                &self.transport,
                self.config.compensate_on_commit_failure,
            ) {
                Ok(written) => report.restored += written,
                Err(err) => report.failures.push((owner.id(), err)),
            }
        }
        info!(
            device = %self.identity(),
            restored = report.restored,
            failures = report.failures.len(),
            "Session restore complete"
        );
        report
    }

    /// Add `mapping` to the control of `entity` it targets.
    ///
    /// # Errors
    ///
    /// See [`ControlRegistry::add_mapping`].
    pub fn add_mapping(&self, entity: EntityId, mapping: &ControlMapping) -> ControlResult<()> {
        self.registry.add_mapping(entity, mapping, &self.transport)
    }

    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] if no mapping carries `id`.
    pub fn remove_mapping(&self, id: ControlId) -> ControlResult<ControlMapping> {
        self.registry.remove_mapping(id)
    }

    /// # Errors
    ///
    /// Returns [`ControlError::UnknownEntity`].
    pub fn resolve_extension_units(&self, entity: EntityId) -> ControlResult<usize> {
        self.registry.resolve_extension_units(entity, &self.transport)
    }

    /// Release every control. The device stays usable for enumeration only.
    pub fn teardown(&self) -> TeardownReport {
        self.registry.teardown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ControlDescriptor, ControlFlags};
    use crate::entity::Guid;
    use crate::ids::{cid, pu};
    use crate::transport::QueryKind;
    use crate::transport::mock::MockTransport;
    use uvc_bitfield::BitField;

    const XU_GUID: Guid = Guid([0xA1; 16]);

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config
            .extra_blacklist
            .push(crate::blacklist::BlacklistRule::new(1, 2, crate::entity::EntityKind::Other(0), 0));
        let result = ControlDevice::discover(DeviceIdentity::new(1, 2), Vec::new(), MockTransport::new(), config);
        assert!(matches!(result, Err(ControlError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_eager_extension_resolution() -> ControlResult<()> {
        let mock = MockTransport::new();
        mock.respond(EntityId(4), 0x01, QueryKind::Length, [0x04, 0x00]);
        mock.respond(EntityId(4), 0x01, QueryKind::Info, [0x0B]);
        let config = EngineConfig::builder().lazy_extension_units(false).build()?;
        let device = ControlDevice::discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::extension_unit(4, XU_GUID, [0x01])],
            mock,
            config,
        )?;
        assert_eq!(device.transport().call_count(), 2);
        assert_eq!(device.discovery_report().pending, 1);

        let vendor = ControlMapping::new(ControlId(0x0100_1000), "Vendor", XU_GUID, 0x01, BitField::new(0, 32));
        device.add_mapping(EntityId(4), &vendor)?;
        let info = device.query(vendor.id)?;
        assert!(info.readable && info.writable && info.auto_update);
        Ok(())
    }

    #[test]
    fn test_static_extension_descriptor_skips_device_query() -> ControlResult<()> {
        let descriptor = ControlDescriptor::new(XU_GUID, 0x05, 0, 1, ControlFlags::GET_CUR.union(ControlFlags::SET_CUR));
        let mapping = ControlMapping::new(ControlId(0x0100_2000), "LED", XU_GUID, 0x05, BitField::new(0, 1))
            .kind(crate::mapping::ValueKind::Boolean);
        let tables = Arc::new(ControlTables::new(vec![descriptor], vec![mapping], Vec::new())?);

        let device = ControlDevice::with_tables(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::extension_unit(4, XU_GUID, [0x01])],
            MockTransport::new(),
            EngineConfig::default(),
            tables,
        )?;
        assert_eq!(device.peek(ControlId(0x0100_2000))?, None);

        let mut tx = device.begin_for(ControlId(0x0100_2000))?;
        assert_eq!(tx.set(ControlId(0x0100_2000), 5)?, 1);
        tx.commit()?;
        assert_eq!(device.transport().sets(), vec![(EntityId(4), 0x05, vec![0x01])]);
        Ok(())
    }

    #[test]
    fn test_query_reports_range() -> ControlResult<()> {
        let mock = MockTransport::new();
        mock.respond_range_u16(EntityId(2), pu::GAIN, 0, 100, 1, 32);
        let device = ControlDevice::discover(
            DeviceIdentity::new(0x046d, 0x0825),
            vec![Entity::processing_unit(2, [0x00, 0x02])],
            mock,
            EngineConfig::default(),
        )?;
        let info = device.query(cid::GAIN)?;
        assert_eq!((info.minimum, info.maximum, info.step, info.default), (0, 100, 1, 32));
        assert_eq!(info.name, "Gain");
        assert_eq!(device.eligibility(cid::GAIN)?, Eligibility::Writable);
        Ok(())
    }
}
