//! Begin/commit/rollback over one entity's pending control writes.
//!
//! A [`Transaction`] holds the entity's lock from `begin` until it is
//! committed, rolled back or dropped. Writes are staged in the current slot of
//! each control with the previous value kept in the backup slot; `commit` sends
//! every dirty control in bitmap order and, if one send fails, reverts all of
//! them.

use parking_lot::MutexGuard;
use tracing::{debug, warn};

use crate::control::Control;
use crate::device::ControlDevice;
use crate::entity::{Entity, EntityId};
use crate::error::{ControlError, ControlResult};
use crate::ids::ControlId;
use crate::registry::{ControlRegistry, EntityControls};
use crate::resolver::{self, Eligibility};
use crate::transport::ControlTransport;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// Exclusive write access to one entity.
///
/// Dropping an open transaction rolls it back.
pub struct Transaction<'a, T: ControlTransport> {
    device: &'a ControlDevice<T>,
    owner: &'a EntityControls,
    controls: MutexGuard<'a, Vec<Control>>,
    state: TransactionState,
}

impl<'a, T: ControlTransport> Transaction<'a, T> {
    pub(crate) fn begin(device: &'a ControlDevice<T>, owner: &'a EntityControls) -> Self {
        let controls = owner.lock();
        debug!(entity = %owner.id(), "Transaction started");
        Self {
            device,
            owner,
            controls,
            state: TransactionState::Open,
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.owner.id()
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of controls with a staged, unsent value.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.controls
            .iter()
            .filter_map(Control::resolved)
            .filter(|control| control.is_dirty())
            .count()
    }

    /// Whether `id` may be written now, seeing values staged in this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`] if this entity has no
    /// mapping for `id`, or a transport failure while reading the master.
    pub fn eligibility(&mut self, id: ControlId) -> ControlResult<Eligibility> {
        let device = self.device;
        eligibility(
            device.registry(),
            self.owner.entity(),
            &mut self.controls,
            id,
            device.transport(),
        )
    }

    /// Stage `value` for `id`. Nothing is sent until [`Self::commit`].
    ///
    /// Returns the value actually staged after clamping or boolean
    /// normalisation.
    ///
    /// # Errors
    ///
    /// - [`ControlError::UnsupportedControl`] if this entity has no mapping for `id`
    /// - [`ControlError::AccessDenied`] if the control is read-only
    /// - [`ControlError::NotWritable`] if the master is not in its manual state
    /// - [`ControlError::InvalidValue`] for a menu index outside the menu
    /// - a transport failure while loading untouched bits or the range
    pub fn set(&mut self, id: ControlId, value: i32) -> ControlResult<i32> {
        match self.eligibility(id)? {
            Eligibility::Writable => {}
            Eligibility::ReadOnly => return Err(ControlError::access_denied(id, "SET_CUR")),
            Eligibility::Gated {
                master,
                current,
                manual,
            } => {
                debug!(id = %id, master = %master, current, manual, "Write refused by master");
                return Err(ControlError::NotWritable {
                    id,
                    master,
                    current,
                    manual,
                });
            }
        }

        let device = self.device;
        let entity = self.owner.entity();
        let control = device
            .registry()
            .find_control(entity, &mut self.controls, id, device.transport())?;
        let staged = control.stage(id, value, device.config().clamp_to_range, entity.id, device.transport())?;
        debug!(id = %id, value, staged, entity = %entity.id, "Control staged");
        Ok(staged)
    }

    /// Logical value of `id`, including any value staged in this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnsupportedControl`], [`ControlError::AccessDenied`]
    /// or a transport failure.
    pub fn get(&mut self, id: ControlId) -> ControlResult<i32> {
        let device = self.device;
        let entity = self.owner.entity();
        let control = device
            .registry()
            .find_control(entity, &mut self.controls, id, device.transport())?;
        control.read(id, entity.id, device.transport())
    }

    /// Send every staged value and release the entity.
    ///
    /// Returns the number of controls written.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Transport`] for the first failed send. Every
    /// staged control is then reverted to its value from before the
    /// transaction.
    pub fn commit(mut self) -> ControlResult<usize> {
        let device = self.device;
        let result = commit_controls(
            self.owner.id(),
            &mut self.controls,
            device.transport(),
            device.config().compensate_on_commit_failure,
        );
        self.state = if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::RolledBack
        };
        result
    }

    /// Discard every staged value without I/O and release the entity.
    ///
    /// Returns the number of controls reverted.
    pub fn rollback(mut self) -> usize {
        let reverted = rollback_controls(&mut self.controls);
        self.state = TransactionState::RolledBack;
        debug!(entity = %self.owner.id(), reverted, "Transaction rolled back");
        reverted
    }
}

impl<T: ControlTransport> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        if self.state != TransactionState::Open {
            return;
        }
        let reverted = rollback_controls(&mut self.controls);
        warn!(entity = %self.owner.id(), reverted, "Transaction dropped while open, rolled back");
    }
}

impl<T: ControlTransport> std::fmt::Debug for Transaction<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("entity", &self.owner.id())
            .field("state", &self.state)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Eligibility of `id` inside a locked entity.
pub(crate) fn eligibility<T: ControlTransport + ?Sized>(
    registry: &ControlRegistry,
    entity: &Entity,
    controls: &mut [Control],
    id: ControlId,
    transport: &T,
) -> ControlResult<Eligibility> {
    let (writable, master) = {
        let control = registry.find_control(entity, controls, id, transport)?;
        let mapping = control.mapping(id).ok_or(ControlError::UnsupportedControl(id))?;
        (control.descriptor().can_set(), mapping.master)
    };
    if !writable {
        return Ok(Eligibility::ReadOnly);
    }
    let Some(link) = master else {
        return Ok(Eligibility::Writable);
    };

    let master_value = match registry.find_control(entity, controls, link.id, transport) {
        Ok(control) if control.descriptor().can_get() => Some(control.read(link.id, entity.id, transport)?),
        Ok(_) | Err(ControlError::UnsupportedControl(_)) => None,
        Err(err) => return Err(err),
    };
    Ok(resolver::check(writable, master, master_value))
}

/// Send every dirty control of a locked entity.
///
/// Every control that may change on its own loses its cached value, whatever
/// the outcome. On failure all dirty controls are reverted and, with
/// `compensate`, the ones the device already accepted are written back.
pub(crate) fn commit_controls<T: ControlTransport + ?Sized>(
    entity: EntityId,
    controls: &mut [Control],
    transport: &T,
    compensate: bool,
) -> ControlResult<usize> {
    for control in controls.iter_mut().filter_map(Control::resolved_mut) {
        control.invalidate();
    }

    let mut sent = Vec::new();
    let mut failure = None;
    for (position, control) in controls.iter().enumerate() {
        let Some(control) = control.resolved().filter(|c| c.is_dirty()) else {
            continue;
        };
        let selector = control.descriptor().selector;
        match transport.send_set(entity, selector, control.current()) {
            Ok(()) => sent.push(position),
            Err(err) => {
                failure = Some((selector, err));
                break;
            }
        }
    }

    let Some((selector, err)) = failure else {
        for control in controls.iter_mut().filter_map(Control::resolved_mut) {
            control.settle();
        }
        debug!(entity = %entity, written = sent.len(), "Transaction committed");
        return Ok(sent.len());
    };

    warn!(
        entity = %entity,
        selector,
        error = %err,
        accepted = sent.len(),
        "Commit failed, reverting staged controls"
    );
    if compensate {
        for control in sent
            .iter()
            .filter_map(|position| controls.get(*position))
            .filter_map(Control::resolved)
        {
            let selector = control.descriptor().selector;
            if !control.backup_is_known() {
                warn!(entity = %entity, selector, "Prior value never read, skipping compensating write");
                continue;
            }
            if let Err(err) = transport.send_set(entity, selector, control.backup()) {
                warn!(entity = %entity, selector, error = %err, "Compensating write failed");
            }
        }
    }
    rollback_controls(controls);
    Err(ControlError::Transport(err))
}

/// Revert every dirty control of a locked entity.
pub(crate) fn rollback_controls(controls: &mut [Control]) -> usize {
    let mut reverted = 0;
    for control in controls.iter_mut().filter_map(Control::resolved_mut) {
        if control.revert() {
            reverted += 1;
        }
        control.invalidate();
    }
    reverted
}
