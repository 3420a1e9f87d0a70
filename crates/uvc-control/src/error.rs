//! Error types for the control engine.
//!
//! [`TransportError`] is what the command transport reports. [`ControlError`]
//! is what every engine operation returns.

use thiserror::Error;

use crate::entity::EntityId;
use crate::ids::ControlId;

/// Failure reported by the command transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device did not answer in time.
    #[error("Transport timeout")]
    Timeout,

    /// The device is gone.
    #[error("Device disconnected")]
    Disconnected,

    /// The device stalled the control request.
    #[error("Control request stalled")]
    Stalled,

    /// Any other I/O failure.
    #[error("Transport I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Create an I/O error.
    #[must_use]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }
}

/// Errors returned by control engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// A value buffer or mapping copy could not be allocated.
    #[error("Allocation of {bytes} bytes failed")]
    AllocationFailure {
        /// Requested size.
        bytes: usize,
    },

    /// A GET or SET request failed.
    #[error("Transport failure: {0}")]
    Transport(#[source] TransportError),

    /// No initialized mapping carries this logical id.
    #[error("Unsupported control: {0}")]
    UnsupportedControl(ControlId),

    /// A mapping's field does not fit inside its control's buffer.
    #[error("Mapping {id} field at bit {offset} width {bits} exceeds {size}-byte control")]
    OutOfRangeField {
        /// Offending mapping.
        id: ControlId,
        /// First bit of the field.
        offset: u16,
        /// Field width in bits.
        bits: u8,
        /// Control size in bytes.
        size: u16,
    },

    /// The control does not support the requested access.
    #[error("Control {id} does not support {access}")]
    AccessDenied {
        /// Target mapping.
        id: ControlId,
        /// Access that was attempted.
        access: &'static str,
    },

    /// The mapping is gated by a master control that is not in manual mode.
    #[error("Control {id} is not writable while {master} = {current} (manual = {manual})")]
    NotWritable {
        /// Gated mapping.
        id: ControlId,
        /// Master mapping.
        master: ControlId,
        /// Current master value.
        current: i32,
        /// Master value that makes `id` writable.
        manual: i32,
    },

    /// The value cannot be represented by the mapping.
    #[error("Invalid value {value} for control {id}")]
    InvalidValue {
        /// Target mapping.
        id: ControlId,
        /// Rejected value.
        value: i32,
    },

    /// The transport answered with the wrong number of bytes.
    #[error("Short response for selector {selector:#04x}: expected {expected} bytes, got {actual}")]
    ShortResponse {
        /// Control selector.
        selector: u8,
        /// Expected length.
        expected: usize,
        /// Received length.
        actual: usize,
    },

    /// No entity with this id was discovered.
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ControlError {
    /// Create an unsupported control error.
    #[must_use]
    pub fn unsupported(id: ControlId) -> Self {
        Self::UnsupportedControl(id)
    }

    /// Create an access denied error.
    #[must_use]
    pub fn access_denied(id: ControlId, access: &'static str) -> Self {
        Self::AccessDenied { id, access }
    }

    /// Create an invalid value error.
    #[must_use]
    pub fn invalid_value(id: ControlId, value: i32) -> Self {
        Self::InvalidValue { id, value }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// True when the failure came from the transport.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ShortResponse { .. })
    }

    /// True when repeating the same operation may succeed.
    ///
    /// The engine never retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Timeout | TransportError::Stalled)
        )
    }
}

impl From<TransportError> for ControlError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Result type for control engine operations.
pub type ControlResult<T> = Result<T, ControlError>;
