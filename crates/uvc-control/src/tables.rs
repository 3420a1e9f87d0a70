//! Read-only catalogues shared by every device session.

use std::sync::{Arc, OnceLock};
use tracing::error;

use crate::blacklist::{BUILTIN_BLACKLIST, BlacklistRule};
use crate::descriptor::{BUILTIN_DESCRIPTORS, ControlDescriptor};
use crate::entity::Guid;
use crate::error::{ControlError, ControlResult};
use crate::mapping::{ControlMapping, builtin_mappings};

/// Descriptor, mapping and blacklist tables.
///
/// Built once and shared by reference. Controls copy what they need, so a
/// session never observes later changes to a table.
#[derive(Debug)]
pub struct ControlTables {
    descriptors: Vec<ControlDescriptor>,
    mappings: Vec<ControlMapping>,
    blacklist: Vec<BlacklistRule>,
}

static BUILTIN: OnceLock<Arc<ControlTables>> = OnceLock::new();

impl ControlTables {
    /// Build custom tables.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::OutOfRangeField`] if a mapping does not fit the
    /// control it targets.
    pub fn new(
        descriptors: Vec<ControlDescriptor>,
        mappings: Vec<ControlMapping>,
        blacklist: Vec<BlacklistRule>,
    ) -> ControlResult<Self> {
        let tables = Self {
            descriptors,
            mappings,
            blacklist,
        };
        tables.validate()?;
        Ok(tables)
    }

    /// The class-defined tables.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(BUILTIN.get_or_init(|| {
            Arc::new(Self {
                descriptors: BUILTIN_DESCRIPTORS.to_vec(),
                mappings: builtin_mappings(),
                blacklist: BUILTIN_BLACKLIST.to_vec(),
            })
        }))
    }

    /// Check every mapping against the descriptor it targets.
    ///
    /// Mappings whose control has no static descriptor (extension units) are
    /// checked when the control is resolved.
    ///
    /// # Errors
    ///
    /// Returns the first [`ControlError::OutOfRangeField`] found.
    pub fn validate(&self) -> ControlResult<()> {
        for mapping in &self.mappings {
            let Some(descriptor) = self.descriptor_for_selector(&mapping.entity, mapping.selector) else {
                continue;
            };
            check_fits(mapping, descriptor.size)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ControlDescriptor] {
        &self.descriptors
    }

    #[must_use]
    pub fn mappings(&self) -> &[ControlMapping] {
        &self.mappings
    }

    #[must_use]
    pub fn blacklist(&self) -> &[BlacklistRule] {
        &self.blacklist
    }

    /// Descriptor at bitmap index `index` of entities of kind `entity`.
    #[must_use]
    pub fn descriptor(&self, entity: &Guid, index: usize) -> Option<&ControlDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.entity == *entity && usize::from(d.index) == index)
    }

    #[must_use]
    pub fn descriptor_for_selector(&self, entity: &Guid, selector: u8) -> Option<&ControlDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.entity == *entity && d.selector == selector)
    }

    /// Mappings targeting one control, in table order.
    pub fn mappings_for<'a>(&'a self, entity: &'a Guid, selector: u8) -> impl Iterator<Item = &'a ControlMapping> + 'a {
        self.mappings
            .iter()
            .filter(move |m| m.entity == *entity && m.selector == selector)
    }
}

/// Fail when `mapping` does not fit a control of `size` bytes.
///
/// # Errors
///
/// Returns [`ControlError::OutOfRangeField`].
pub(crate) fn check_fits(mapping: &ControlMapping, size: u16) -> ControlResult<()> {
    if mapping.fits(size) {
        return Ok(());
    }
    error!(
        id = %mapping.id,
        name = %mapping.name,
        offset = mapping.field.offset,
        bits = mapping.field.bits,
        size,
        "Mapping field exceeds control size"
    );
    Err(ControlError::OutOfRangeField {
        id: mapping.id,
        offset: mapping.field.offset,
        bits: mapping.field.bits,
        size,
    })
}
