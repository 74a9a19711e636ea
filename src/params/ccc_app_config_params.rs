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

//! The UCI application config parameters for the CCC (Car Connectivity
//! Consortium digital key) ranging session.

#![allow(missing_docs)]

use std::collections::HashMap;

use log::error;
use num_derive::{FromPrimitive, ToPrimitive};

use crate::params::app_config_params::{AppConfigParams, AppConfigTlvMap};
use crate::params::fira_app_config_params::{
    DeviceRole, DeviceType, MultiNodeMode, RangeDataNtfConfig, StsConfig,
};
use crate::params::uci_packets::{AppConfigTlvType, SessionState};
use crate::params::utils::{
    bytes_to_u32, bytes_to_u64, bytes_to_u8, u16_to_bytes, u32_to_bytes, u64_to_bytes, u8_to_bytes,
    validate,
};
use crate::utils::{builder_field, getter_field};

const CHAP_IN_RSTU: u16 = 400; // 1 Chap = 400 RSTU.
pub(super) const MINIMUM_BLOCK_DURATION_MS: u32 = 96;

// The constant AppConfigTlv values for CCC.
const CCC_DEVICE_TYPE: DeviceType = DeviceType::Controlee;
const CCC_STS_CONFIG: StsConfig = StsConfig::Dynamic;
const CCC_MULTI_NODE_MODE: MultiNodeMode = MultiNodeMode::OneToMany;
const CCC_RANGE_DATA_NTF_CONFIG: RangeDataNtfConfig = RangeDataNtfConfig::Disable;
const CCC_DEVICE_ROLE: DeviceRole = DeviceRole::Initiator;
const CCC_URSK_TTL: u16 = 0x2D0;

const DEFAULT_PROTOCOL_VERSION: CccProtocolVersion = CccProtocolVersion { major: 1, minor: 0 };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CccAppConfigParams {
    protocol_version: CccProtocolVersion,
    uwb_config: CccUwbConfig,
    pulse_shape_combo: CccPulseShapeCombo,
    ran_multiplier: u32,
    channel_number: CccUwbChannel,
    chaps_per_slot: ChapsPerSlot,
    num_responder_nodes: u8,
    slots_per_rr: u8,
    sync_code_index: u8,
    hopping_mode: CccHoppingMode,
    hop_mode_key: u32,
    uwb_time0: u64,
    sts_index: u32,
    initiation_time_ms: u64,
    absolute_initiation_time_us: u64,
}

#[allow(missing_docs)]
impl CccAppConfigParams {
    // Generate the getter methods for all the fields.
    getter_field!(protocol_version, CccProtocolVersion);
    getter_field!(uwb_config, CccUwbConfig);
    getter_field!(pulse_shape_combo, CccPulseShapeCombo);
    getter_field!(ran_multiplier, u32);
    getter_field!(channel_number, CccUwbChannel);
    getter_field!(chaps_per_slot, ChapsPerSlot);
    getter_field!(num_responder_nodes, u8);
    getter_field!(slots_per_rr, u8);
    getter_field!(sync_code_index, u8);
    getter_field!(hopping_mode, CccHoppingMode);
    getter_field!(hop_mode_key, u32);
    getter_field!(uwb_time0, u64);
    getter_field!(sts_index, u32);
    getter_field!(initiation_time_ms, u64);
    getter_field!(absolute_initiation_time_us, u64);

    pub fn is_config_updatable(config_map: &AppConfigTlvMap, session_state: SessionState) -> bool {
        match session_state {
            SessionState::Idle => {
                // Only the start-ranging overrides can be updated at idle state.
                let updatable = [
                    AppConfigTlvType::RangingDuration,
                    AppConfigTlvType::StsIndex,
                    AppConfigTlvType::UwbInitiationTime,
                ];
                config_map.keys().all(|key| updatable.contains(key))
            }
            _ => false,
        }
    }

    pub fn generate_config_map(&self) -> AppConfigTlvMap {
        debug_assert!(self.is_valid().is_some());

        HashMap::from([
            (AppConfigTlvType::DeviceType, u8_to_bytes(CCC_DEVICE_TYPE as u8)),
            (AppConfigTlvType::StsConfig, u8_to_bytes(CCC_STS_CONFIG as u8)),
            (AppConfigTlvType::MultiNodeMode, u8_to_bytes(CCC_MULTI_NODE_MODE as u8)),
            (AppConfigTlvType::ChannelNumber, u8_to_bytes(self.channel_number as u8)),
            (AppConfigTlvType::NoOfControlee, u8_to_bytes(self.num_responder_nodes)),
            (
                AppConfigTlvType::SlotDuration,
                u16_to_bytes((self.chaps_per_slot as u16) * CHAP_IN_RSTU),
            ),
            (
                AppConfigTlvType::RangingDuration,
                u32_to_bytes(self.ran_multiplier * MINIMUM_BLOCK_DURATION_MS),
            ),
            (
                AppConfigTlvType::SessionInfoNtfConfig,
                u8_to_bytes(CCC_RANGE_DATA_NTF_CONFIG as u8),
            ),
            (AppConfigTlvType::DeviceRole, u8_to_bytes(CCC_DEVICE_ROLE as u8)),
            (AppConfigTlvType::PreambleCodeIndex, u8_to_bytes(self.sync_code_index)),
            (AppConfigTlvType::SlotsPerRr, u8_to_bytes(self.slots_per_rr)),
            (AppConfigTlvType::HoppingMode, u8_to_bytes(self.hopping_mode as u8)),
            (AppConfigTlvType::StsIndex, u32_to_bytes(self.sts_index)),
            (AppConfigTlvType::UwbInitiationTime, self.initiation_time_bytes()),
            (AppConfigTlvType::CccHopModeKey, u32_to_bytes(self.hop_mode_key)),
            (AppConfigTlvType::CccUwbTime0, u64_to_bytes(self.uwb_time0)),
            (AppConfigTlvType::CccRangingProtocolVer, self.protocol_version.clone().into()),
            (AppConfigTlvType::CccUwbConfigId, u16_to_bytes(self.uwb_config as u16)),
            (AppConfigTlvType::CccPulseshapeCombo, self.pulse_shape_combo.clone().into()),
            (AppConfigTlvType::CccUrskTtl, u16_to_bytes(CCC_URSK_TTL)),
        ])
    }

    fn initiation_time_bytes(&self) -> Vec<u8> {
        if self.absolute_initiation_time_us != 0 {
            u64_to_bytes(self.absolute_initiation_time_us)
        } else {
            u64_to_bytes(self.initiation_time_ms)
        }
    }

    fn is_valid(&self) -> Option<()> {
        validate(
            (1..=32).contains(&self.sync_code_index),
            "sync_code_index should be between 1 to 32",
        )?;

        self.ran_multiplier.checked_mul(MINIMUM_BLOCK_DURATION_MS).or_else(|| {
            error!("ran_multiplier * MINIMUM_BLOCK_DURATION_MS overflows");
            None
        })?;

        Some(())
    }

    /// Rebuild the params by merging in the overrides of a start-ranging
    /// request.
    pub fn with_start_ranging_params(&self, start_params: &CccStartRangingParams) -> Self {
        let mut params = self.clone();
        params.ran_multiplier = start_params.ran_multiplier;
        params.sts_index = start_params.sts_index;
        params.initiation_time_ms = start_params.initiation_time_ms;
        params.absolute_initiation_time_us = start_params.absolute_initiation_time_us;
        params
    }

    /// Rebuild the params with the computed absolute initiation time. Zero
    /// resets the value so a later start re-computes it.
    pub fn with_absolute_initiation_time(&self, absolute_initiation_time_us: u64) -> Self {
        let mut params = self.clone();
        params.absolute_initiation_time_us = absolute_initiation_time_us;
        params
    }
}

pub struct CccAppConfigParamsBuilder {
    protocol_version: CccProtocolVersion,
    uwb_config: Option<CccUwbConfig>,
    pulse_shape_combo: Option<CccPulseShapeCombo>,
    ran_multiplier: Option<u32>,
    channel_number: Option<CccUwbChannel>,
    chaps_per_slot: Option<ChapsPerSlot>,
    num_responder_nodes: Option<u8>,
    slots_per_rr: Option<u8>,
    sync_code_index: Option<u8>,
    hopping_mode: Option<CccHoppingMode>,
    hop_mode_key: u32,
    uwb_time0: u64,
    sts_index: u32,
    initiation_time_ms: u64,
    absolute_initiation_time_us: u64,
}

#[allow(clippy::new_without_default)]
impl CccAppConfigParamsBuilder {
    pub fn new() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            uwb_config: None,
            pulse_shape_combo: None,
            ran_multiplier: None,
            channel_number: None,
            chaps_per_slot: None,
            num_responder_nodes: None,
            slots_per_rr: None,
            sync_code_index: None,
            hopping_mode: None,
            hop_mode_key: 0,
            uwb_time0: 0,
            sts_index: 0,
            initiation_time_ms: 0,
            absolute_initiation_time_us: 0,
        }
    }

    pub fn build(&self) -> Option<AppConfigParams> {
        let params = CccAppConfigParams {
            protocol_version: self.protocol_version.clone(),
            uwb_config: self.uwb_config?,
            pulse_shape_combo: self.pulse_shape_combo.clone()?,
            ran_multiplier: self.ran_multiplier?,
            channel_number: self.channel_number?,
            chaps_per_slot: self.chaps_per_slot?,
            num_responder_nodes: self.num_responder_nodes?,
            slots_per_rr: self.slots_per_rr?,
            sync_code_index: self.sync_code_index?,
            hopping_mode: self.hopping_mode?,
            hop_mode_key: self.hop_mode_key,
            uwb_time0: self.uwb_time0,
            sts_index: self.sts_index,
            initiation_time_ms: self.initiation_time_ms,
            absolute_initiation_time_us: self.absolute_initiation_time_us,
        };
        params.is_valid()?;
        Some(AppConfigParams::Ccc(params))
    }

    pub fn from_params(params: &AppConfigParams) -> Option<Self> {
        match params {
            AppConfigParams::Ccc(params) => Some(Self {
                protocol_version: params.protocol_version.clone(),
                uwb_config: Some(params.uwb_config),
                pulse_shape_combo: Some(params.pulse_shape_combo.clone()),
                ran_multiplier: Some(params.ran_multiplier),
                channel_number: Some(params.channel_number),
                chaps_per_slot: Some(params.chaps_per_slot),
                num_responder_nodes: Some(params.num_responder_nodes),
                slots_per_rr: Some(params.slots_per_rr),
                sync_code_index: Some(params.sync_code_index),
                hopping_mode: Some(params.hopping_mode),
                hop_mode_key: params.hop_mode_key,
                uwb_time0: params.uwb_time0,
                sts_index: params.sts_index,
                initiation_time_ms: params.initiation_time_ms,
                absolute_initiation_time_us: params.absolute_initiation_time_us,
            }),
            _ => None,
        }
    }

    // Generate the setter methods for all the fields.
    builder_field!(protocol_version, CccProtocolVersion);
    builder_field!(uwb_config, CccUwbConfig, Some);
    builder_field!(pulse_shape_combo, CccPulseShapeCombo, Some);
    builder_field!(ran_multiplier, u32, Some);
    builder_field!(channel_number, CccUwbChannel, Some);
    builder_field!(chaps_per_slot, ChapsPerSlot, Some);
    builder_field!(num_responder_nodes, u8, Some);
    builder_field!(slots_per_rr, u8, Some);
    builder_field!(sync_code_index, u8, Some);
    builder_field!(hopping_mode, CccHoppingMode, Some);
    builder_field!(hop_mode_key, u32);
    builder_field!(uwb_time0, u64);
    builder_field!(sts_index, u32);
    builder_field!(initiation_time_ms, u64);
    builder_field!(absolute_initiation_time_us, u64);
}

/// The overrides a caller can supply when starting a CCC session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CccStartRangingParams {
    pub ran_multiplier: u32,
    pub sts_index: u32,
    pub initiation_time_ms: u64,
    pub absolute_initiation_time_us: u64,
}

/// The parameters read back from the UWBS after a CCC session started; the
/// controller fills in the hopping state it actually selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CccStartedAppConfigParams {
    pub sts_index: u32,
    pub hop_mode_key: u32,
    pub uwb_time0: u64,
    pub ran_multiplier: u32,
    pub sync_code_index: u8,
}

impl CccStartedAppConfigParams {
    pub fn from_config_map(mut config_map: HashMap<AppConfigTlvType, Vec<u8>>) -> Option<Self> {
        Some(Self {
            sts_index: bytes_to_u32(config_map.remove(&AppConfigTlvType::StsIndex)?)?,
            hop_mode_key: bytes_to_u32(config_map.remove(&AppConfigTlvType::CccHopModeKey)?)?,
            uwb_time0: bytes_to_u64(config_map.remove(&AppConfigTlvType::CccUwbTime0)?)?,
            ran_multiplier: bytes_to_u32(config_map.remove(&AppConfigTlvType::RangingDuration)?)?
                / MINIMUM_BLOCK_DURATION_MS,
            sync_code_index: bytes_to_u8(
                config_map.remove(&AppConfigTlvType::PreambleCodeIndex)?,
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CccProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl From<CccProtocolVersion> for Vec<u8> {
    fn from(item: CccProtocolVersion) -> Self {
        vec![item.major, item.minor]
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CccUwbConfig {
    Config0 = 0,
    Config1 = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CccPulseShapeCombo {
    pub initiator_tx: PulseShape,
    pub responder_tx: PulseShape,
}

impl From<CccPulseShapeCombo> for Vec<u8> {
    fn from(item: CccPulseShapeCombo) -> Self {
        vec![((item.initiator_tx as u8) << 4) | (item.responder_tx as u8)]
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum PulseShape {
    SymmetricalRootRaisedCosine = 0x0,
    PrecursorFree = 0x1,
    PrecursorFreeSpecial = 0x2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CccUwbChannel {
    Channel5 = 5,
    Channel9 = 9,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ChapsPerSlot {
    Chaps3 = 3,
    Chaps4 = 4,
    Chaps6 = 6,
    Chaps8 = 8,
    Chaps9 = 9,
    Chaps12 = 12,
    Chaps24 = 24,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CccHoppingMode {
    Disable = 0,
    AdaptiveDefault = 2,
    ContinuousDefault = 3,
    AdaptiveAes = 4,
    ContinuousAes = 5,
}
