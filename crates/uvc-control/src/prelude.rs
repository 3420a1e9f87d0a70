//! Commonly used types.
//!
//! ```rust
//! use uvc_control::prelude::*;
//!
//! let config = EngineConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(cid::BRIGHTNESS, ControlId(0x0098_0900));
//! ```

pub use crate::blacklist::BlacklistRule;
pub use crate::config::{EngineConfig, EngineConfigBuilder};
pub use crate::control::{ControlInfo, WriteState};
pub use crate::descriptor::{ControlDescriptor, ControlFlags};
pub use crate::device::{ControlDevice, RestoreReport};
pub use crate::entity::{DeviceIdentity, Entity, EntityId, EntityKind, Guid};
pub use crate::error::{ControlError, ControlResult, TransportError};
pub use crate::ids::{ControlId, cid};
pub use crate::mapping::{ControlMapping, MenuEntry, ValueKind};
pub use crate::registry::{DiscoveryReport, TeardownReport};
pub use crate::resolver::Eligibility;
pub use crate::tables::ControlTables;
pub use crate::transaction::{Transaction, TransactionState};
pub use crate::transport::{ControlTransport, QueryKind};
