// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routes inbound joold control operations to sync/test/advertise/ack
//! handlers.

use thiserror::Error;
use tracing::warn;

/// The four recognized joold control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Feed a replication payload into the session table.
    Add,
    /// A connectivity/liveness check.
    Test,
    /// Ask every peer to send a full sync.
    Advertise,
    /// Acknowledges a previously sent `Add`/`Test`/`Advertise`.
    Ack,
}

impl Operation {
    /// Parses a big-endian `u16` operation discriminant.
    #[must_use]
    pub fn from_wire(value: u16) -> Option<Self> {
        match value {
            1 => Some(Operation::Add),
            2 => Some(Operation::Test),
            3 => Some(Operation::Advertise),
            4 => Some(Operation::Ack),
            _ => None,
        }
    }
}

/// Errors raised before a joold operation is ever routed.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DispatchError {
    /// The operation discriminant did not match any known joold operation.
    #[error("unrecognized joold operation {0}")]
    UnknownOperation(u16),
    /// A joold operation was received on a stateless (SIIT) translator.
    #[error("joold operations are not available on a stateless translator")]
    StatelessTranslator,
}

/// What the caller should do after [`dispatch`] returns successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Whether the caller must send an acknowledgement frame back.
    pub should_ack: bool,
    /// Set when the routed handler itself failed (`Add`/`joold.sync` only);
    /// `should_ack` is forced `true` in that case so the peer learns the
    /// sync did not apply.
    pub handler_error: Option<String>,
}

impl DispatchOutcome {
    fn ack() -> Self {
        Self { should_ack: true, handler_error: None }
    }

    fn no_ack() -> Self {
        Self { should_ack: false, handler_error: None }
    }

    fn ack_with_error(message: String) -> Self {
        Self { should_ack: true, handler_error: Some(message) }
    }
}

/// The joold operations a translator instance exposes to the control channel.
///
/// This crate only routes to these callbacks; it does not implement them —
/// session synchronization, advertisement and liveness-check bodies are an
/// external collaborator, per this crate's scope.
pub trait JoolCallbacks {
    /// The error type `sync` can fail with.
    type SyncError: std::fmt::Display;

    /// Applies a replication payload (the `Add` operation).
    fn sync(&mut self, payload: &[u8]) -> Result<(), Self::SyncError>;
    /// Handles a connectivity/liveness check (the `Test` operation).
    fn test(&mut self);
    /// Asks every peer to send a full sync (the `Advertise` operation).
    fn advertise(&mut self);
    /// Handles an acknowledgement of a previous send (the `Ack` operation).
    fn ack(&mut self);
}

/// Routes one inbound control frame's operation to `callbacks`.
///
/// If `stateless` is set (the translator is configured as SIIT), every
/// operation is rejected with [`DispatchError::StatelessTranslator`]
/// before any routing happens.
pub fn dispatch<C: JoolCallbacks>(
    operation: u16,
    payload: &[u8],
    stateless: bool,
    callbacks: &mut C,
) -> Result<DispatchOutcome, DispatchError> {
    if stateless {
        warn!(operation, "joold operation rejected: translator is stateless");
        return Err(DispatchError::StatelessTranslator);
    }

    match Operation::from_wire(operation) {
        Some(Operation::Add) => match callbacks.sync(payload) {
            Ok(()) => Ok(DispatchOutcome::no_ack()),
            Err(e) => Ok(DispatchOutcome::ack_with_error(e.to_string())),
        },
        Some(Operation::Test) => {
            callbacks.test();
            Ok(DispatchOutcome::ack())
        }
        Some(Operation::Advertise) => {
            callbacks.advertise();
            Ok(DispatchOutcome::ack())
        }
        Some(Operation::Ack) => {
            callbacks.ack();
            Ok(DispatchOutcome::no_ack())
        }
        None => {
            warn!(operation, "rejecting unrecognized joold operation");
            Err(DispatchError::UnknownOperation(operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct SyncError(&'static str);

    impl fmt::Display for SyncError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[derive(Default)]
    struct Recorder {
        synced: Option<Vec<u8>>,
        sync_should_fail: bool,
        tested: bool,
        advertised: bool,
        acked: bool,
    }

    impl JoolCallbacks for Recorder {
        type SyncError = SyncError;

        fn sync(&mut self, payload: &[u8]) -> Result<(), SyncError> {
            if self.sync_should_fail {
                return Err(SyncError("sync failed"));
            }
            self.synced = Some(payload.to_vec());
            Ok(())
        }
        fn test(&mut self) {
            self.tested = true;
        }
        fn advertise(&mut self) {
            self.advertised = true;
        }
        fn ack(&mut self) {
            self.acked = true;
        }
    }

    #[test]
    fn add_success_does_not_ack() {
        let mut rec = Recorder::default();
        let outcome = dispatch(1, b"payload", false, &mut rec).unwrap();
        assert!(!outcome.should_ack);
        assert_eq!(rec.synced.as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn add_failure_acks_with_error() {
        let mut rec = Recorder { sync_should_fail: true, ..Recorder::default() };
        let outcome = dispatch(1, b"x", false, &mut rec).unwrap();
        assert!(outcome.should_ack);
        assert_eq!(outcome.handler_error.as_deref(), Some("sync failed"));
    }

    #[test]
    fn test_and_advertise_always_ack() {
        let mut rec = Recorder::default();
        assert!(dispatch(2, &[], false, &mut rec).unwrap().should_ack);
        assert!(rec.tested);
        assert!(dispatch(3, &[], false, &mut rec).unwrap().should_ack);
        assert!(rec.advertised);
    }

    #[test]
    fn ack_never_acks() {
        let mut rec = Recorder::default();
        let outcome = dispatch(4, &[], false, &mut rec).unwrap();
        assert!(!outcome.should_ack);
        assert!(rec.acked);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let mut rec = Recorder::default();
        assert_eq!(dispatch(99, &[], false, &mut rec), Err(DispatchError::UnknownOperation(99)));
    }

    #[test]
    fn stateless_translator_rejects_before_dispatch() {
        let mut rec = Recorder::default();
        assert_eq!(dispatch(1, &[], true, &mut rec), Err(DispatchError::StatelessTranslator));
        assert!(rec.synced.is_none());
    }
}
