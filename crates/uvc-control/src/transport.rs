//! Command transport seam.
//!
//! The engine never talks to hardware directly. Every GET and SET goes through
//! [`ControlTransport`], which carries one class-specific control request to an
//! entity and returns the raw payload.

use std::sync::Arc;

use crate::entity::EntityId;
use crate::error::TransportError;
use crate::ids::request;

/// Which value a GET request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Current,
    Min,
    Max,
    Resolution,
    Default,
    /// Payload length of an extension-unit control.
    Length,
    /// Capability bits of an extension-unit control.
    Info,
}

impl QueryKind {
    /// Class-specific `bRequest` code.
    #[must_use]
    pub const fn request_code(self) -> u8 {
        match self {
            Self::Current => request::GET_CUR,
            Self::Min => request::GET_MIN,
            Self::Max => request::GET_MAX,
            Self::Resolution => request::GET_RES,
            Self::Default => request::GET_DEF,
            Self::Length => request::GET_LEN,
            Self::Info => request::GET_INFO,
        }
    }
}

/// Blocking transport for class-specific control requests.
///
/// Implementations must be callable from several threads at once; the engine
/// serializes requests per entity only.
pub trait ControlTransport: Send + Sync {
    /// Issue a GET request and return exactly the bytes the device answered.
    ///
    /// `len` is the expected payload length (`wLength`).
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request fails.
    fn send_get(
        &self,
        entity: EntityId,
        selector: u8,
        query: QueryKind,
        len: usize,
    ) -> Result<Vec<u8>, TransportError>;

    /// Issue a SET_CUR request.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request fails.
    fn send_set(&self, entity: EntityId, selector: u8, data: &[u8]) -> Result<(), TransportError>;
}

impl<T: ControlTransport + ?Sized> ControlTransport for Arc<T> {
    fn send_get(
        &self,
        entity: EntityId,
        selector: u8,
        query: QueryKind,
        len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).send_get(entity, selector, query, len)
    }

    fn send_set(&self, entity: EntityId, selector: u8, data: &[u8]) -> Result<(), TransportError> {
        (**self).send_set(entity, selector, data)
    }
}

/// Scriptable in-memory transport for tests.
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// One request seen by the mock.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Get {
            entity: EntityId,
            selector: u8,
            query: QueryKind,
        },
        Set {
            entity: EntityId,
            selector: u8,
            data: Vec<u8>,
        },
    }

    #[derive(Debug, Default)]
    struct State {
        responses: HashMap<(EntityId, u8, QueryKind), Vec<u8>>,
        calls: Vec<Call>,
        sets_seen: usize,
        fail_set_at: Option<(usize, TransportError)>,
        fail_gets: Option<TransportError>,
        disconnected: bool,
    }

    /// Device stand-in.
    ///
    /// Unprogrammed GETs answer with zeros of the requested length. A
    /// successful SET becomes the answer of the next GET_CUR for that control.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        state: Mutex<State>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Program the answer to a GET request. The bytes are returned as-is.
        pub fn respond(&self, entity: EntityId, selector: u8, query: QueryKind, data: impl Into<Vec<u8>>) {
            self.state
                .lock()
                .responses
                .insert((entity, selector, query), data.into());
        }

        /// Program min/max/resolution/default for a 16-bit control.
        pub fn respond_range_u16(&self, entity: EntityId, selector: u8, min: u16, max: u16, res: u16, def: u16) {
            self.respond(entity, selector, QueryKind::Min, min.to_le_bytes());
            self.respond(entity, selector, QueryKind::Max, max.to_le_bytes());
            self.respond(entity, selector, QueryKind::Resolution, res.to_le_bytes());
            self.respond(entity, selector, QueryKind::Default, def.to_le_bytes());
        }

        /// Fail the `nth` SET request counted from now (1-based).
        pub fn fail_set_after(&self, nth: usize, error: TransportError) {
            let mut state = self.state.lock();
            let target = state.sets_seen + nth;
            state.fail_set_at = Some((target, error));
        }

        /// Fail every GET request until cleared.
        pub fn fail_gets(&self, error: Option<TransportError>) {
            self.state.lock().fail_gets = error;
        }

        pub fn disconnect(&self) {
            self.state.lock().disconnected = true;
        }

        pub fn reconnect(&self) {
            self.state.lock().disconnected = false;
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().calls.clone()
        }

        pub fn call_count(&self) -> usize {
            self.state.lock().calls.len()
        }

        /// Payloads of every SET request, successful or not.
        pub fn sets(&self) -> Vec<(EntityId, u8, Vec<u8>)> {
            self.state
                .lock()
                .calls
                .iter()
                .filter_map(|call| match call {
                    Call::Set {
                        entity,
                        selector,
                        data,
                    } => Some((*entity, *selector, data.clone())),
                    Call::Get { .. } => None,
                })
                .collect()
        }

        pub fn reset_calls(&self) {
            self.state.lock().calls.clear();
        }

        /// What the device currently holds for a control.
        pub fn current(&self, entity: EntityId, selector: u8) -> Option<Vec<u8>> {
            self.state
                .lock()
                .responses
                .get(&(entity, selector, QueryKind::Current))
                .cloned()
        }
    }

    impl ControlTransport for MockTransport {
        fn send_get(
            &self,
            entity: EntityId,
            selector: u8,
            query: QueryKind,
            len: usize,
        ) -> Result<Vec<u8>, TransportError> {
            let mut state = self.state.lock();
            state.calls.push(Call::Get {
                entity,
                selector,
                query,
            });
            if state.disconnected {
                return Err(TransportError::Disconnected);
            }
            if let Some(error) = state.fail_gets.clone() {
                return Err(error);
            }
            Ok(state
                .responses
                .get(&(entity, selector, query))
                .cloned()
                .unwrap_or_else(|| vec![0; len]))
        }

        fn send_set(&self, entity: EntityId, selector: u8, data: &[u8]) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            state.calls.push(Call::Set {
                entity,
                selector,
                data: data.to_vec(),
            });
            if state.disconnected {
                return Err(TransportError::Disconnected);
            }
            state.sets_seen += 1;
            let sets_seen = state.sets_seen;
            if matches!(&state.fail_set_at, Some((target, _)) if *target == sets_seen) {
                if let Some((_, error)) = state.fail_set_at.take() {
                    return Err(error);
                }
            }
            state
                .responses
                .insert((entity, selector, QueryKind::Current), data.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Call, MockTransport};
    use super::*;

    #[test]
    fn test_request_codes() {
        assert_eq!(QueryKind::Current.request_code(), 0x81);
        assert_eq!(QueryKind::Default.request_code(), 0x87);
        assert_eq!(QueryKind::Length.request_code(), 0x85);
    }

    #[test]
    fn test_mock_echoes_set_into_current() -> Result<(), TransportError> {
        let mock = MockTransport::new();
        let unit = EntityId(2);

        assert_eq!(mock.send_get(unit, 0x03, QueryKind::Current, 2)?, vec![0, 0]);
        mock.send_set(unit, 0x03, &[0x2C, 0x01])?;
        assert_eq!(mock.send_get(unit, 0x03, QueryKind::Current, 2)?, vec![0x2C, 0x01]);
        assert_eq!(mock.call_count(), 3);
        Ok(())
    }

    #[test]
    fn test_mock_fails_nth_set_once() -> Result<(), TransportError> {
        let mock = MockTransport::new();
        let unit = EntityId(2);
        mock.fail_set_after(2, TransportError::Stalled);

        mock.send_set(unit, 0x02, &[1])?;
        assert_eq!(mock.send_set(unit, 0x03, &[2]), Err(TransportError::Stalled));
        mock.send_set(unit, 0x04, &[3])?;

        // The failed write never reached the device.
        assert_eq!(mock.current(unit, 0x03), None);
        assert_eq!(mock.sets().len(), 3);
        assert!(matches!(mock.calls().first(), Some(Call::Set { selector: 0x02, .. })));
        Ok(())
    }

    #[test]
    fn test_arc_forwards() -> Result<(), TransportError> {
        let mock = Arc::new(MockTransport::new());
        let shared: Arc<MockTransport> = Arc::clone(&mock);
        shared.send_set(EntityId(1), 0x01, &[9])?;
        assert_eq!(mock.current(EntityId(1), 0x01), Some(vec![9]));
        Ok(())
    }
}
