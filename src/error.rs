// Copyright 2023, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The error types of the library.

use crate::params::uci_packets::{SessionHandle, StatusCode};

/// The error code for the library.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The provided parameters are invalid, or the method is not allowed to be
    /// called in the current state.
    #[error("Bad parameters")]
    BadParameters,
    /// The maximum number of sessions for the protocol has been reached and no
    /// lower-priority session could be evicted.
    #[error("Max sessions exceeded")]
    MaxSessionsExceeded,
    /// Max ranging round retries reached.
    #[error("Max ranging round retries reached")]
    MaxRrRetryReached,
    /// The session fails with a protocol specific reason.
    #[error("The session fails with a protocol specific reason")]
    ProtocolSpecific,
    /// The remote device has requested to change the session.
    #[error("The remote device has requested to change the session")]
    RemoteRequest,
    /// The response or notification is not received within the deadline.
    #[error("The response or notification is not received in timeout")]
    Timeout,
    /// The command should be retried.
    #[error("The command should be retried")]
    CommandRetry,
    /// A session with the same handle or session id already exists.
    #[error("Duplicated session handle: {0}")]
    DuplicatedSessionHandle(SessionHandle),
    /// The session handle is not present in the session table.
    #[error("Unknown session handle: {0}")]
    UnknownSessionHandle(SessionHandle),
    /// The operation is not permitted in the current session state.
    #[error("The operation is rejected in the current state")]
    Rejected,
    /// System policy disallows the request (e.g. non-foreground 3p app).
    #[error("Denied by system policy")]
    ForegroundPolicy,
    /// The UCI transport returned a non-OK status.
    #[error("The UCI transport returned the status code: {0:?}")]
    Uci(StatusCode),
    /// The tokio runtime failed, e.g. the channel is closed.
    #[error("The tokio runtime failed")]
    TokioFailure,
    /// The unknown error.
    #[error("The unknown error")]
    Unknown,

    #[cfg(any(test, feature = "mock-utils"))]
    #[error("The result of the mock method is not assigned")]
    MockUndefined,
}

/// The result type returned by the library's methods.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The UCI status code this error surfaces to the application callbacks.
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Error::Uci(status) => *status,
            Error::BadParameters => StatusCode::InvalidParam,
            Error::MaxSessionsExceeded => StatusCode::ErrorMaxSessionsExceeded,
            Error::DuplicatedSessionHandle(_) => StatusCode::ErrorSessionDuplicate,
            Error::UnknownSessionHandle(_) => StatusCode::ErrorSessionNotExist,
            Error::Rejected => StatusCode::Rejected,
            _ => StatusCode::Failed,
        }
    }
}
