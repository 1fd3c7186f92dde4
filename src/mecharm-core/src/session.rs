// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Session lease state machine.
//!
//! Exactly one remote controller may hold the arm at a time. The machine
//! is the sole owner of the lease and of the monotonic session id counter;
//! every transition is an explicit method and every rejection is a typed
//! error that leaves the state untouched.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Correlates an event back to the action that caused it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic action id source, starting at 1. Each issuing side owns its
/// own generator; ids are unique per generator, not globally.
#[derive(Debug, Default)]
pub struct ActionIdGen(AtomicU64);

impl ActionIdGen {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> ActionId {
        ActionId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Identity of an issued lease. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: u64,
    pub device_client_id: String,
    pub remote_client_id: String,
}

/// Why a lease operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    /// A session is already active; carries the holder's controller id.
    Busy { holder: String },
    /// No active session, or the referenced session id is stale.
    NoCurrentSession,
}

impl fmt::Display for LeaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy { holder } => write!(f, "session busy, held by {}", holder),
            Self::NoCurrentSession => write!(f, "no current session"),
        }
    }
}

impl std::error::Error for LeaseError {}

/// Lease state: the arm is either free or exclusively held.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active(SessionInfo),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Active(info) => write!(
                f,
                "Active(session {} for {})",
                info.session_id, info.remote_client_id
            ),
        }
    }
}

/// The session lease state machine.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
    last_session_id: u64,
}

impl SessionMachine {
    /// Create a machine in the Idle state. Session ids start at 1 and are
    /// never reused for the lifetime of the machine.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            last_session_id: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SessionState::Idle)
    }

    /// The active lease, if any.
    pub fn current(&self) -> Option<&SessionInfo> {
        match &self.state {
            SessionState::Active(info) => Some(info),
            SessionState::Idle => None,
        }
    }

    /// Issue a new lease to `remote_client_id`. Refused while any session
    /// is active, including one held by the same controller.
    pub fn begin(
        &mut self,
        device_client_id: &str,
        remote_client_id: &str,
    ) -> Result<SessionInfo, LeaseError> {
        match &self.state {
            SessionState::Active(info) => Err(LeaseError::Busy {
                holder: info.remote_client_id.clone(),
            }),
            SessionState::Idle => {
                self.last_session_id += 1;
                let info = SessionInfo {
                    session_id: self.last_session_id,
                    device_client_id: device_client_id.to_string(),
                    remote_client_id: remote_client_id.to_string(),
                };
                self.state = SessionState::Active(info.clone());
                Ok(info)
            }
        }
    }

    /// Check a session-scoped action against the active lease. Does not
    /// change state.
    pub fn admit(&self, session_id: u64) -> Result<&SessionInfo, LeaseError> {
        match &self.state {
            SessionState::Active(info) if info.session_id == session_id => Ok(info),
            _ => Err(LeaseError::NoCurrentSession),
        }
    }

    /// Release the lease if `session_id` names the active session. A stale
    /// or unknown id is refused without touching the state, so a repeated
    /// exit can never tear down a successor session.
    pub fn exit(&mut self, session_id: u64) -> Result<SessionInfo, LeaseError> {
        match &self.state {
            SessionState::Active(info) if info.session_id == session_id => {
                let info = info.clone();
                self.state = SessionState::Idle;
                Ok(info)
            }
            _ => Err(LeaseError::NoCurrentSession),
        }
    }

    /// Revoke the active lease unconditionally. Used by the inactivity
    /// supervisor; returns the revoked lease, or None when already idle.
    pub fn expire(&mut self) -> Option<SessionInfo> {
        match std::mem::take(&mut self.state) {
            SessionState::Active(info) => Some(info),
            SessionState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let machine = SessionMachine::new();
        assert!(machine.is_idle());
        assert!(machine.current().is_none());
    }

    #[test]
    fn test_begin_issues_session_ids_from_one() {
        let mut machine = SessionMachine::new();
        let info = machine.begin("arm0", "ctrl-1").unwrap();
        assert_eq!(info.session_id, 1);
        assert_eq!(info.device_client_id, "arm0");
        assert_eq!(info.remote_client_id, "ctrl-1");
        assert!(matches!(machine.state(), SessionState::Active(_)));
    }

    #[test]
    fn test_begin_while_active_is_busy_and_keeps_state() {
        let mut machine = SessionMachine::new();
        let first = machine.begin("arm0", "ctrl-1").unwrap();

        let err = machine.begin("arm0", "ctrl-2").unwrap_err();
        assert_eq!(
            err,
            LeaseError::Busy {
                holder: "ctrl-1".to_string()
            }
        );
        assert_eq!(machine.current(), Some(&first));
    }

    #[test]
    fn test_begin_busy_even_for_current_holder() {
        let mut machine = SessionMachine::new();
        machine.begin("arm0", "ctrl-1").unwrap();

        let err = machine.begin("arm0", "ctrl-1").unwrap_err();
        assert!(matches!(err, LeaseError::Busy { holder } if holder == "ctrl-1"));
    }

    #[test]
    fn test_admit_matches_only_active_session_id() {
        let mut machine = SessionMachine::new();
        assert_eq!(machine.admit(1), Err(LeaseError::NoCurrentSession));

        let info = machine.begin("arm0", "ctrl-1").unwrap();
        assert!(machine.admit(info.session_id).is_ok());
        assert_eq!(machine.admit(99), Err(LeaseError::NoCurrentSession));
    }

    #[test]
    fn test_exit_releases_lease() {
        let mut machine = SessionMachine::new();
        let info = machine.begin("arm0", "ctrl-1").unwrap();

        let released = machine.exit(info.session_id).unwrap();
        assert_eq!(released, info);
        assert!(machine.is_idle());
    }

    #[test]
    fn test_exit_with_stale_id_is_refused() {
        let mut machine = SessionMachine::new();
        let info = machine.begin("arm0", "ctrl-1").unwrap();

        assert_eq!(machine.exit(42), Err(LeaseError::NoCurrentSession));
        assert_eq!(machine.current(), Some(&info));
    }

    #[test]
    fn test_second_exit_does_not_destroy_successor() {
        let mut machine = SessionMachine::new();
        let first = machine.begin("arm0", "ctrl-1").unwrap();
        machine.exit(first.session_id).unwrap();

        let second = machine.begin("arm0", "ctrl-2").unwrap();
        // A duplicate exit for the closed session must not tear down the
        // new one.
        assert_eq!(
            machine.exit(first.session_id),
            Err(LeaseError::NoCurrentSession)
        );
        assert_eq!(machine.current(), Some(&second));
    }

    #[test]
    fn test_session_ids_are_monotonic_across_leases() {
        let mut machine = SessionMachine::new();
        let a = machine.begin("arm0", "ctrl-1").unwrap();
        machine.exit(a.session_id).unwrap();
        let b = machine.begin("arm0", "ctrl-1").unwrap();
        machine.expire();
        let c = machine.begin("arm0", "ctrl-2").unwrap();

        assert_eq!(a.session_id, 1);
        assert_eq!(b.session_id, 2);
        assert_eq!(c.session_id, 3);
    }

    #[test]
    fn test_expire_only_when_active() {
        let mut machine = SessionMachine::new();
        assert!(machine.expire().is_none());

        let info = machine.begin("arm0", "ctrl-1").unwrap();
        assert_eq!(machine.expire(), Some(info));
        assert!(machine.is_idle());
    }

    #[test]
    fn test_action_id_gen_is_monotonic() {
        let ids = ActionIdGen::new();
        let a = ids.next();
        let b = ids.next();
        assert_eq!(a, ActionId(1));
        assert_eq!(b, ActionId(2));
    }
}
