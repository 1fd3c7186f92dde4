// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stable numeric error codes carried by error events.

use std::fmt;

/// Wire error codes. The numeric values are a published contract with
/// remote controllers and must never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Malformed, unknown or out-of-bounds action.
    BadAction = 300,
    /// Another controller already holds the session lease.
    SessionBusy = 400,
    /// No active session, or the referenced session id is stale.
    NoCurrentSession = 401,
    /// The active session was revoked after inactivity.
    SessionTimeout = 402,
    /// A motion failed while executing.
    MoveError = 500,
}

impl ErrorCode {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            300 => Some(Self::BadAction),
            400 => Some(Self::SessionBusy),
            401 => Some(Self::NoCurrentSession),
            402 => Some(Self::SessionTimeout),
            500 => Some(Self::MoveError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
