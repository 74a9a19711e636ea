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

//! The session manager and its collaborators.

pub mod advertise_manager;
pub mod callback;
pub mod policy;
pub mod session_manager;
pub mod session_table;

pub(crate) mod uwb_session;

pub use advertise_manager::AdvertiseConfig;
pub use callback::{RangingChangeReason, RangingStartedParams, SessionEvent, UwbSessionCallback};
pub use policy::{AttributionSource, PolicyOracle, StaticPolicy};
pub use session_manager::{SessionManager, StartRangingParams};
pub use session_table::ClosedSessionInfo;
pub use uwb_session::UwbControlee;
