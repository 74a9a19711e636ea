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

//! The controller-side session layer of a UWB (Ultra-Wideband) ranging stack.
//!
//! The crate sits between application clients and a UCI transport speaking to
//! the UWB subsystem. Its core is the [`session::SessionManager`]: a
//! serialized event loop that owns the set of live sessions, drives each one
//! through its UCI lifecycle with bounded per-operation deadlines, enforces
//! admission and platform policy, buffers received data per peer, and reports
//! every outcome through the [`session::UwbSessionCallback`].
//!
//! The transport below is abstracted by [`uci::UciManager`]; platform
//! decisions (privilege, foreground state, session caps, data delivery
//! permission) come from a [`session::PolicyOracle`].

pub mod error;
pub mod params;
pub mod session;
pub mod uci;

mod utils;

pub use error::{Error, Result};
