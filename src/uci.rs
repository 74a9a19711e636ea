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

//! The boundary to the UCI transport: the command trait and the notification
//! model.

#[cfg(any(test, feature = "mock-utils"))]
pub mod mock_uci_manager;
pub mod notification;
pub mod uci_manager;

pub use notification::{
    DataRcvNotification, RadarDataRcvNotification, RadarSweepData, RangingMeasurements,
    SessionRangeData, UciSessionNotification,
};
pub use uci_manager::UciManager;
