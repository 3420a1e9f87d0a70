//! Master/slave linkage between mappings.
//!
//! A mapping with a master is authoritative only while the master holds its
//! manual value, e.g. an absolute exposure time is meaningless while
//! auto-exposure is on. The engine checks eligibility before staging a write
//! but never reorders dependent writes; callers write masters first.

use crate::ids::ControlId;
use crate::mapping::{ControlMapping, MasterLink};

/// Whether a mapping may be written right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Writable,
    /// The control does not accept SET_CUR.
    ReadOnly,
    /// The master holds a value other than its manual value.
    Gated {
        master: ControlId,
        current: i32,
        manual: i32,
    },
}

impl Eligibility {
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Writable)
    }
}

/// Decide eligibility from the master's current value.
///
/// `master_value` is `None` when the master is not present on the same entity
/// or cannot be read; such a master does not gate the write.
#[must_use]
pub fn check(writable: bool, master: Option<MasterLink>, master_value: Option<i32>) -> Eligibility {
    if !writable {
        return Eligibility::ReadOnly;
    }
    match (master, master_value) {
        (Some(link), Some(current)) if current != link.manual => Eligibility::Gated {
            master: link.id,
            current,
            manual: link.manual,
        },
        _ => Eligibility::Writable,
    }
}

/// Ids whose range or meaning changes when `mapping` is written.
#[must_use]
pub fn dependents(mapping: &ControlMapping) -> &[ControlId] {
    &mapping.slaves
}

/// Mappings in `mappings` gated by `master`.
pub fn gated_by<'a>(
    master: ControlId,
    mappings: impl IntoIterator<Item = &'a ControlMapping>,
) -> impl Iterator<Item = &'a ControlMapping> {
    mappings
        .into_iter()
        .filter(move |m| m.master.is_some_and(|link| link.id == master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EXPOSURE_MANUAL, cid};
    use crate::mapping::builtin_mappings;

    #[test]
    fn test_gated_when_master_not_manual() {
        let link = MasterLink {
            id: cid::HUE_AUTO,
            manual: 0,
        };
        assert_eq!(
            check(true, Some(link), Some(1)),
            Eligibility::Gated {
                master: cid::HUE_AUTO,
                current: 1,
                manual: 0
            }
        );
        assert!(check(true, Some(link), Some(0)).is_writable());
    }

    #[test]
    fn test_unknown_master_does_not_gate() {
        let link = MasterLink {
            id: cid::EXPOSURE_AUTO,
            manual: EXPOSURE_MANUAL,
        };
        assert!(check(true, Some(link), None).is_writable());
        assert!(check(true, None, Some(3)).is_writable());
    }

    #[test]
    fn test_read_only_wins() {
        assert_eq!(check(false, None, None), Eligibility::ReadOnly);
    }

    #[test]
    fn test_gated_by_matches_slaves() {
        let mappings = builtin_mappings();
        let mut ids: Vec<ControlId> = gated_by(cid::AUTO_WHITE_BALANCE, &mappings).map(|m| m.id).collect();
        ids.sort();
        assert_eq!(
            ids,
            vec![cid::RED_BALANCE, cid::BLUE_BALANCE, cid::WHITE_BALANCE_TEMPERATURE]
        );

        let master = mappings.iter().find(|m| m.id == cid::FOCUS_AUTO);
        assert_eq!(master.map(dependents), Some(&[cid::FOCUS_ABSOLUTE][..]));
    }
}
