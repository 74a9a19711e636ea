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

//! The parameters of the UWB sessions.

pub mod aliro_app_config_params;
pub mod app_config_params;
pub mod ccc_app_config_params;
pub mod fira_app_config_params;
pub mod radar_app_config_params;
pub mod uci_packets;

pub(crate) mod utils;

pub use aliro_app_config_params::{
    AliroAppConfigParams, AliroAppConfigParamsBuilder, AliroStartRangingParams,
    AliroStartedAppConfigParams,
};
pub use app_config_params::{AppConfigParams, Protocol};
pub use ccc_app_config_params::{
    CccAppConfigParams, CccAppConfigParamsBuilder, CccStartRangingParams,
    CccStartedAppConfigParams,
};
pub use fira_app_config_params::{
    FiraAppConfigParams, FiraAppConfigParamsBuilder, FiraRangingReconfigureParams,
};
pub use radar_app_config_params::{RadarAppConfigParams, RadarAppConfigParamsBuilder};
