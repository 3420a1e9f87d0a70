//! # uvc-control
//!
//! Control engine for USB Video Class devices: discovers the controls each
//! entity advertises, maps logical control ids onto bit-fields of the
//! hardware payloads, and applies batched writes atomically from the caller's
//! point of view.
//!
//! ## Architecture
//!
//! - [`descriptor`], [`mapping`], [`blacklist`] - class-defined static data
//! - [`tables`] - the read-only catalogues shared by every session
//! - [`registry`] - discovery, lookup, lazy extension units and teardown
//! - [`control`] - value buffers, range cache and the clean/dirty state
//! - [`transaction`] - begin/commit/rollback over one entity
//! - [`resolver`] - master/slave write eligibility
//! - [`transport`] - the request collaborator and its test mock
//! - [`device`] - the per-device facade
//!
//! ## Concurrency
//!
//! Each entity's control set has its own lock, held by a [`Transaction`] from
//! `begin` to `commit`/`rollback`. Transactions on different entities proceed
//! in parallel. Every call may block on the transport.
//!
//! ## Example
//!
//! ```rust
//! use uvc_control::prelude::*;
//! use uvc_control::transport::mock::MockTransport;
//!
//! # fn main() -> ControlResult<()> {
//! let device = ControlDevice::discover(
//!     DeviceIdentity::new(0x5986, 0x0241),
//!     vec![Entity::processing_unit(2, [0b0000_0101])],
//!     MockTransport::new(),
//!     EngineConfig::default(),
//! )?;
//!
//! // Hue is blacklisted on this camera; only brightness is left.
//! assert_eq!(device.discovery_report().controls, 1);
//! assert!(device.get(cid::HUE).is_err());
//! # Ok(())
//! # }
//! ```

#![deny(
    static_mut_refs,
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, reason = "types are re-exported at the crate root")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod blacklist;
pub mod config;
pub mod control;
pub mod descriptor;
pub mod device;
pub mod entity;
pub mod error;
pub mod ids;
pub mod mapping;
pub mod registry;
pub mod resolver;
pub mod tables;
pub mod transaction;
pub mod transport;

pub mod prelude;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use device::{ControlDevice, RestoreReport};
pub use entity::{DeviceIdentity, Entity, EntityId, EntityKind, Guid};
pub use error::{ControlError, ControlResult, TransportError};
pub use ids::ControlId;
pub use transaction::{Transaction, TransactionState};
pub use transport::{ControlTransport, QueryKind};
