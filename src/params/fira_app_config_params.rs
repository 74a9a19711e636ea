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

//! This module defines the UCI application config parameters for the FiRa ranging session.

use std::collections::{HashMap, HashSet};

use num_derive::{FromPrimitive, ToPrimitive};
use zeroize::Zeroize;

use crate::params::app_config_params::{AppConfigParams, AppConfigTlvMap};
use crate::params::uci_packets::{
    AppConfigTlvType, SessionHandle, SessionState, SessionToken, SubSessionId, UwbAddress,
};
use crate::params::utils::{u16_to_bytes, u32_to_bytes, u64_to_bytes, u8_to_bytes, validate};
use crate::utils::{builder_field, getter_field};

// The default value of each parameter.
const DEFAULT_RANGING_ROUND_USAGE: RangingRoundUsage = RangingRoundUsage::DsTwr;
const DEFAULT_STS_CONFIG: StsConfig = StsConfig::Static;
const DEFAULT_CHANNEL_NUMBER: UwbChannel = UwbChannel::Channel9;
const DEFAULT_SLOT_DURATION_RSTU: u16 = 2400;
const DEFAULT_RANGING_DURATION_MS: u32 = 200;
const DEFAULT_AOA_RESULT_REQUEST: AoaResultRequest = AoaResultRequest::ReqAoaResults;
const DEFAULT_RANGE_DATA_NTF_CONFIG: RangeDataNtfConfig = RangeDataNtfConfig::Enable;
const DEFAULT_RANGE_DATA_NTF_PROXIMITY_NEAR_CM: u16 = 0;
const DEFAULT_RANGE_DATA_NTF_PROXIMITY_FAR_CM: u16 = 20000;
const DEFAULT_SCHEDULED_MODE: ScheduledMode = ScheduledMode::TimeScheduledRanging;
const DEFAULT_MAC_ADDRESS_MODE: MacAddressMode = MacAddressMode::MacAddress2Bytes;
const DEFAULT_HOPPING_MODE: HoppingMode = HoppingMode::Disable;
const DEFAULT_MAX_RR_RETRY: u16 = 0;
const DEFAULT_UWB_INITIATION_TIME_MS: u64 = 0;
const DEFAULT_ABSOLUTE_UWB_INITIATION_TIME_US: u64 = 0;
const DEFAULT_BLOCK_STRIDE_LENGTH: u8 = 0;
const DEFAULT_SUB_SESSION_ID: SubSessionId = 0;
const DEFAULT_DATA_REPETITION_COUNT: u8 = 0;
const DEFAULT_FILTER_TYPE: FilterType = FilterType::DefaultFilter;

/// The session priority a caller gets when it does not ask for one. A
/// different value in the open parameters is treated as an explicit override
/// and freezes the priority for the lifetime of the session.
pub const DEFAULT_SESSION_PRIORITY: u8 = 50;

/// The default ranging-error streak window. Zero disables the supervision.
pub const DEFAULT_RANGING_ERROR_STREAK_TIMEOUT_MS: u64 = 30_000;

/// The FiRa application configuration parameters of one session.
/// Ref: FiRa Consortium UWB Command Interface Generic Technical Specification Version 2.0.0.
#[derive(Clone, PartialEq, Eq)]
pub struct FiraAppConfigParams {
    device_type: DeviceType,
    device_role: DeviceRole,
    ranging_round_usage: RangingRoundUsage,
    sts_config: StsConfig,
    multi_node_mode: MultiNodeMode,
    channel_number: UwbChannel,
    device_mac_address: UwbAddress,
    dst_mac_address: Vec<UwbAddress>,
    slot_duration_rstu: u16,
    ranging_duration_ms: u32,
    aoa_result_request: AoaResultRequest,
    range_data_ntf_config: RangeDataNtfConfig,
    range_data_ntf_proximity_near_cm: u16,
    range_data_ntf_proximity_far_cm: u16,
    scheduled_mode: ScheduledMode,
    session_priority: u8,
    mac_address_mode: MacAddressMode,
    max_rr_retry: u16,
    uwb_initiation_time_ms: u64,
    absolute_uwb_initiation_time_us: u64,
    hopping_mode: HoppingMode,
    block_stride_length: u8,
    sub_session_id: SubSessionId,
    session_key: Option<Vec<u8>>,
    session_time_base: Option<SessionTimeBase>,
    data_repetition_count: u8,

    // Android-specific parameters that never reach the UWBS.
    ranging_error_streak_timeout_ms: u64,
    filter_type: FilterType,
}

/// Explicitly implement Debug trait to prevent logging key material.
impl std::fmt::Debug for FiraAppConfigParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        static REDACTED_STR: &str = "redacted";

        f.debug_struct("FiraAppConfigParams")
            .field("device_type", &self.device_type)
            .field("device_role", &self.device_role)
            .field("ranging_round_usage", &self.ranging_round_usage)
            .field("sts_config", &self.sts_config)
            .field("multi_node_mode", &self.multi_node_mode)
            .field("channel_number", &self.channel_number)
            .field("device_mac_address", &self.device_mac_address)
            .field("dst_mac_address", &self.dst_mac_address)
            .field("slot_duration_rstu", &self.slot_duration_rstu)
            .field("ranging_duration_ms", &self.ranging_duration_ms)
            .field("aoa_result_request", &self.aoa_result_request)
            .field("range_data_ntf_config", &self.range_data_ntf_config)
            .field("range_data_ntf_proximity_near_cm", &self.range_data_ntf_proximity_near_cm)
            .field("range_data_ntf_proximity_far_cm", &self.range_data_ntf_proximity_far_cm)
            .field("scheduled_mode", &self.scheduled_mode)
            .field("session_priority", &self.session_priority)
            .field("mac_address_mode", &self.mac_address_mode)
            .field("max_rr_retry", &self.max_rr_retry)
            .field("uwb_initiation_time_ms", &self.uwb_initiation_time_ms)
            .field("absolute_uwb_initiation_time_us", &self.absolute_uwb_initiation_time_us)
            .field("hopping_mode", &self.hopping_mode)
            .field("block_stride_length", &self.block_stride_length)
            .field("sub_session_id", &REDACTED_STR) // key-adjacent, PII.
            .field("session_key", &REDACTED_STR)
            .field("session_time_base", &self.session_time_base)
            .field("data_repetition_count", &self.data_repetition_count)
            .field("ranging_error_streak_timeout_ms", &self.ranging_error_streak_timeout_ms)
            .field("filter_type", &self.filter_type)
            .finish()
    }
}

impl Drop for FiraAppConfigParams {
    fn drop(&mut self) {
        self.sub_session_id.zeroize();
        if let Some(key) = self.session_key.as_mut() {
            key.zeroize();
        }
    }
}

#[allow(missing_docs)]
impl FiraAppConfigParams {
    // Generate the getter methods for all the fields.
    getter_field!(device_type, DeviceType);
    getter_field!(device_role, DeviceRole);
    getter_field!(ranging_round_usage, RangingRoundUsage);
    getter_field!(sts_config, StsConfig);
    getter_field!(multi_node_mode, MultiNodeMode);
    getter_field!(channel_number, UwbChannel);
    getter_field!(device_mac_address, UwbAddress);
    getter_field!(dst_mac_address, Vec<UwbAddress>);
    getter_field!(slot_duration_rstu, u16);
    getter_field!(ranging_duration_ms, u32);
    getter_field!(aoa_result_request, AoaResultRequest);
    getter_field!(range_data_ntf_config, RangeDataNtfConfig);
    getter_field!(range_data_ntf_proximity_near_cm, u16);
    getter_field!(range_data_ntf_proximity_far_cm, u16);
    getter_field!(scheduled_mode, ScheduledMode);
    getter_field!(session_priority, u8);
    getter_field!(mac_address_mode, MacAddressMode);
    getter_field!(max_rr_retry, u16);
    getter_field!(uwb_initiation_time_ms, u64);
    getter_field!(absolute_uwb_initiation_time_us, u64);
    getter_field!(hopping_mode, HoppingMode);
    getter_field!(block_stride_length, u8);
    getter_field!(sub_session_id, SubSessionId);
    getter_field!(session_key, Option<Vec<u8>>);
    getter_field!(session_time_base, Option<SessionTimeBase>);
    getter_field!(data_repetition_count, u8);
    getter_field!(ranging_error_streak_timeout_ms, u64);
    getter_field!(filter_type, FilterType);

    /// Validate if the params are valid.
    fn is_valid(&self) -> Option<()> {
        validate(
            (1..=8).contains(&self.dst_mac_address.len()),
            "The length of dst_mac_address should be between 1 to 8",
        )?;
        validate(
            (1..=100).contains(&self.session_priority),
            "session_priority should be between 1 to 100",
        )?;
        validate(
            (0..=10000).contains(&self.uwb_initiation_time_ms),
            "uwb_initiation_time_ms should be between 0 to 10000",
        )?;
        if let Some(key) = self.session_key.as_ref() {
            validate(
                [16, 32].contains(&key.len()),
                "session_key should be 16 or 32 bytes long",
            )?;
        }

        match self.mac_address_mode {
            MacAddressMode::MacAddress2Bytes | MacAddressMode::MacAddress8Bytes2BytesHeader => {
                validate(
                    matches!(self.device_mac_address, UwbAddress::Short(_)),
                    "device_mac_address should be short address",
                )?;
                validate(
                    self.dst_mac_address.iter().all(|addr| matches!(addr, UwbAddress::Short(_))),
                    "dst_mac_address should be short address",
                )?;
            }
            MacAddressMode::MacAddress8Bytes => {
                validate(
                    matches!(self.device_mac_address, UwbAddress::Extended(_)),
                    "device_mac_address should be extended address",
                )?;
                validate(
                    self.dst_mac_address.iter().all(|addr| matches!(addr, UwbAddress::Extended(_))),
                    "dst_mac_address should be extended address",
                )?;
            }
        }

        Some(())
    }

    /// Determine if the |config_map| is updatable in the state |session_state|.
    pub fn is_config_updatable(config_map: &AppConfigTlvMap, session_state: SessionState) -> bool {
        match session_state {
            SessionState::Active => {
                let available_list = HashSet::from([
                    AppConfigTlvType::RangingDuration,
                    AppConfigTlvType::SessionInfoNtfConfig,
                    AppConfigTlvType::NearProximityConfig,
                    AppConfigTlvType::FarProximityConfig,
                    AppConfigTlvType::BlockStrideLength,
                    AppConfigTlvType::SuspendRangingRounds,
                ]);
                config_map.keys().all(|key| available_list.contains(key))
            }
            SessionState::Idle => true,
            _ => false,
        }
    }

    /// Generate the AppConfigTlv map from the FiraAppConfigParams instance.
    pub fn generate_config_map(&self) -> AppConfigTlvMap {
        debug_assert!(self.is_valid().is_some());

        let mut config_map = HashMap::from([
            (AppConfigTlvType::DeviceType, u8_to_bytes(self.device_type as u8)),
            (AppConfigTlvType::DeviceRole, u8_to_bytes(self.device_role as u8)),
            (AppConfigTlvType::RangingRoundUsage, u8_to_bytes(self.ranging_round_usage as u8)),
            (AppConfigTlvType::StsConfig, u8_to_bytes(self.sts_config as u8)),
            (AppConfigTlvType::MultiNodeMode, u8_to_bytes(self.multi_node_mode as u8)),
            (AppConfigTlvType::ChannelNumber, u8_to_bytes(self.channel_number as u8)),
            (AppConfigTlvType::NoOfControlee, u8_to_bytes(self.dst_mac_address.len() as u8)),
            (AppConfigTlvType::DeviceMacAddress, self.device_mac_address.to_bytes()),
            (AppConfigTlvType::DstMacAddress, addresses_to_bytes(&self.dst_mac_address)),
            (AppConfigTlvType::SlotDuration, u16_to_bytes(self.slot_duration_rstu)),
            (AppConfigTlvType::RangingDuration, u32_to_bytes(self.ranging_duration_ms)),
            (AppConfigTlvType::AoaResultReq, u8_to_bytes(self.aoa_result_request as u8)),
            (AppConfigTlvType::SessionInfoNtfConfig, u8_to_bytes(self.range_data_ntf_config as u8)),
            (
                AppConfigTlvType::NearProximityConfig,
                u16_to_bytes(self.range_data_ntf_proximity_near_cm),
            ),
            (
                AppConfigTlvType::FarProximityConfig,
                u16_to_bytes(self.range_data_ntf_proximity_far_cm),
            ),
            (AppConfigTlvType::ScheduledMode, u8_to_bytes(self.scheduled_mode as u8)),
            (AppConfigTlvType::SessionPriority, u8_to_bytes(self.session_priority)),
            (AppConfigTlvType::MacAddressMode, u8_to_bytes(self.mac_address_mode as u8)),
            (AppConfigTlvType::MaxRrRetry, u16_to_bytes(self.max_rr_retry)),
            (
                AppConfigTlvType::UwbInitiationTime,
                self.initiation_time_bytes(),
            ),
            (AppConfigTlvType::HoppingMode, u8_to_bytes(self.hopping_mode as u8)),
            (AppConfigTlvType::BlockStrideLength, u8_to_bytes(self.block_stride_length)),
            (AppConfigTlvType::SubSessionId, u32_to_bytes(self.sub_session_id)),
            (AppConfigTlvType::DataRepetitionCount, u8_to_bytes(self.data_repetition_count)),
        ]);

        if let Some(key) = self.session_key.as_ref() {
            config_map.insert(AppConfigTlvType::SessionKey, key.clone());
        }
        if let Some(time_base) = self.session_time_base.as_ref() {
            config_map.insert(AppConfigTlvType::SessionTimeBase, time_base.to_bytes());
        }

        config_map
    }

    // The absolute initiation time (in microseconds) wins over the relative
    // one (in milliseconds) when both are present.
    fn initiation_time_bytes(&self) -> Vec<u8> {
        if self.absolute_uwb_initiation_time_us != 0 {
            u64_to_bytes(self.absolute_uwb_initiation_time_us)
        } else {
            u64_to_bytes(self.uwb_initiation_time_ms)
        }
    }

    /// Rebuild the params with a different SESSION_PRIORITY value.
    pub fn with_session_priority(&self, session_priority: u8) -> Self {
        let mut params = self.clone();
        params.session_priority = session_priority;
        params
    }

    /// Rebuild the params with the computed absolute initiation time. Zero
    /// resets the value so a later start re-computes it.
    pub fn with_absolute_initiation_time(&self, absolute_uwb_initiation_time_us: u64) -> Self {
        let mut params = self.clone();
        params.absolute_uwb_initiation_time_us = absolute_uwb_initiation_time_us;
        params
    }

    /// Rebuild the params with the reference session's handle replaced by the
    /// controller-assigned token inside the SESSION_TIME_BASE parameter.
    pub fn with_session_time_base_token(&self, token: SessionToken) -> Self {
        let mut params = self.clone();
        if let Some(time_base) = params.session_time_base.as_mut() {
            time_base.resolved_token = Some(token);
        }
        params
    }

    /// Rebuild the params by applying the fields set in the reconfigure
    /// request.
    pub fn with_reconfigure_params(&self, reconfigure: &FiraRangingReconfigureParams) -> Self {
        let mut params = self.clone();
        if let Some(block_stride_length) = reconfigure.block_stride_length {
            params.block_stride_length = block_stride_length;
        }
        if let Some(range_data_ntf_config) = reconfigure.range_data_ntf_config {
            params.range_data_ntf_config = range_data_ntf_config;
        }
        if let Some(near_cm) = reconfigure.range_data_proximity_near_cm {
            params.range_data_ntf_proximity_near_cm = near_cm;
        }
        if let Some(far_cm) = reconfigure.range_data_proximity_far_cm {
            params.range_data_ntf_proximity_far_cm = far_cm;
        }
        params
    }

    /// The effective time between ranging rounds, accounting for block
    /// striding.
    pub fn current_ranging_interval_ms(&self) -> u32 {
        self.ranging_duration_ms * (self.block_stride_length as u32 + 1)
    }
}

fn addresses_to_bytes(addresses: &[UwbAddress]) -> Vec<u8> {
    addresses.iter().flat_map(|addr| addr.to_bytes()).collect()
}

/// The SESSION_TIME_BASE parameter: time-synchronize this session to a
/// reference session. The application supplies the reference session's handle;
/// the stack resolves it to the controller-assigned token before the config is
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeBase {
    pub reference_time_base: u8,
    pub reference_session_handle: SessionHandle,
    pub session_offset_us: u32,
    pub(crate) resolved_token: Option<SessionToken>,
}

/// Bit 0 of the reference_time_base byte enables the feature.
pub const SESSION_TIME_BASE_REFERENCE_FEATURE_ENABLED: u8 = 0x01;

impl SessionTimeBase {
    pub fn new(
        reference_time_base: u8,
        reference_session_handle: SessionHandle,
        session_offset_us: u32,
    ) -> Self {
        Self { reference_time_base, reference_session_handle, session_offset_us, resolved_token: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.reference_time_base & SESSION_TIME_BASE_REFERENCE_FEATURE_ENABLED != 0
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = u8_to_bytes(self.reference_time_base);
        out.extend(u32_to_bytes(self.resolved_token.unwrap_or(0)));
        out.extend(u32_to_bytes(self.session_offset_us));
        out
    }
}

/// The builder pattern for the FiraAppConfigParams.
pub struct FiraAppConfigParamsBuilder {
    device_type: Option<DeviceType>,
    device_role: Option<DeviceRole>,
    ranging_round_usage: RangingRoundUsage,
    sts_config: StsConfig,
    multi_node_mode: Option<MultiNodeMode>,
    channel_number: UwbChannel,
    device_mac_address: Option<UwbAddress>,
    dst_mac_address: Vec<UwbAddress>,
    slot_duration_rstu: u16,
    ranging_duration_ms: u32,
    aoa_result_request: AoaResultRequest,
    range_data_ntf_config: RangeDataNtfConfig,
    range_data_ntf_proximity_near_cm: u16,
    range_data_ntf_proximity_far_cm: u16,
    scheduled_mode: ScheduledMode,
    session_priority: u8,
    mac_address_mode: MacAddressMode,
    max_rr_retry: u16,
    uwb_initiation_time_ms: u64,
    absolute_uwb_initiation_time_us: u64,
    hopping_mode: HoppingMode,
    block_stride_length: u8,
    sub_session_id: SubSessionId,
    session_key: Option<Vec<u8>>,
    session_time_base: Option<SessionTimeBase>,
    data_repetition_count: u8,
    ranging_error_streak_timeout_ms: u64,
    filter_type: FilterType,
}

#[allow(clippy::new_without_default)]
#[allow(missing_docs)]
impl FiraAppConfigParamsBuilder {
    /// Fill the default value of each field if it exists, otherwise put None.
    pub fn new() -> Self {
        Self {
            device_type: None,
            device_role: None,
            ranging_round_usage: DEFAULT_RANGING_ROUND_USAGE,
            sts_config: DEFAULT_STS_CONFIG,
            multi_node_mode: None,
            channel_number: DEFAULT_CHANNEL_NUMBER,
            device_mac_address: None,
            dst_mac_address: vec![],
            slot_duration_rstu: DEFAULT_SLOT_DURATION_RSTU,
            ranging_duration_ms: DEFAULT_RANGING_DURATION_MS,
            aoa_result_request: DEFAULT_AOA_RESULT_REQUEST,
            range_data_ntf_config: DEFAULT_RANGE_DATA_NTF_CONFIG,
            range_data_ntf_proximity_near_cm: DEFAULT_RANGE_DATA_NTF_PROXIMITY_NEAR_CM,
            range_data_ntf_proximity_far_cm: DEFAULT_RANGE_DATA_NTF_PROXIMITY_FAR_CM,
            scheduled_mode: DEFAULT_SCHEDULED_MODE,
            session_priority: DEFAULT_SESSION_PRIORITY,
            mac_address_mode: DEFAULT_MAC_ADDRESS_MODE,
            max_rr_retry: DEFAULT_MAX_RR_RETRY,
            uwb_initiation_time_ms: DEFAULT_UWB_INITIATION_TIME_MS,
            absolute_uwb_initiation_time_us: DEFAULT_ABSOLUTE_UWB_INITIATION_TIME_US,
            hopping_mode: DEFAULT_HOPPING_MODE,
            block_stride_length: DEFAULT_BLOCK_STRIDE_LENGTH,
            sub_session_id: DEFAULT_SUB_SESSION_ID,
            session_key: None,
            session_time_base: None,
            data_repetition_count: DEFAULT_DATA_REPETITION_COUNT,
            ranging_error_streak_timeout_ms: DEFAULT_RANGING_ERROR_STREAK_TIMEOUT_MS,
            filter_type: DEFAULT_FILTER_TYPE,
        }
    }

    pub fn from_params(params: &AppConfigParams) -> Option<Self> {
        match params {
            AppConfigParams::Fira(params) => Some(Self {
                device_type: Some(params.device_type),
                device_role: Some(params.device_role),
                ranging_round_usage: params.ranging_round_usage,
                sts_config: params.sts_config,
                multi_node_mode: Some(params.multi_node_mode),
                channel_number: params.channel_number,
                device_mac_address: Some(params.device_mac_address),
                dst_mac_address: params.dst_mac_address.clone(),
                slot_duration_rstu: params.slot_duration_rstu,
                ranging_duration_ms: params.ranging_duration_ms,
                aoa_result_request: params.aoa_result_request,
                range_data_ntf_config: params.range_data_ntf_config,
                range_data_ntf_proximity_near_cm: params.range_data_ntf_proximity_near_cm,
                range_data_ntf_proximity_far_cm: params.range_data_ntf_proximity_far_cm,
                scheduled_mode: params.scheduled_mode,
                session_priority: params.session_priority,
                mac_address_mode: params.mac_address_mode,
                max_rr_retry: params.max_rr_retry,
                uwb_initiation_time_ms: params.uwb_initiation_time_ms,
                absolute_uwb_initiation_time_us: params.absolute_uwb_initiation_time_us,
                hopping_mode: params.hopping_mode,
                block_stride_length: params.block_stride_length,
                sub_session_id: params.sub_session_id,
                session_key: params.session_key.clone(),
                session_time_base: params.session_time_base.clone(),
                data_repetition_count: params.data_repetition_count,
                ranging_error_streak_timeout_ms: params.ranging_error_streak_timeout_ms,
                filter_type: params.filter_type,
            }),
            _ => None,
        }
    }

    pub fn build(&self) -> Option<AppConfigParams> {
        let params = FiraAppConfigParams {
            device_type: self.device_type?,
            device_role: self.device_role?,
            ranging_round_usage: self.ranging_round_usage,
            sts_config: self.sts_config,
            multi_node_mode: self.multi_node_mode?,
            channel_number: self.channel_number,
            device_mac_address: self.device_mac_address?,
            dst_mac_address: self.dst_mac_address.clone(),
            slot_duration_rstu: self.slot_duration_rstu,
            ranging_duration_ms: self.ranging_duration_ms,
            aoa_result_request: self.aoa_result_request,
            range_data_ntf_config: self.range_data_ntf_config,
            range_data_ntf_proximity_near_cm: self.range_data_ntf_proximity_near_cm,
            range_data_ntf_proximity_far_cm: self.range_data_ntf_proximity_far_cm,
            scheduled_mode: self.scheduled_mode,
            session_priority: self.session_priority,
            mac_address_mode: self.mac_address_mode,
            max_rr_retry: self.max_rr_retry,
            uwb_initiation_time_ms: self.uwb_initiation_time_ms,
            absolute_uwb_initiation_time_us: self.absolute_uwb_initiation_time_us,
            hopping_mode: self.hopping_mode,
            block_stride_length: self.block_stride_length,
            sub_session_id: self.sub_session_id,
            session_key: self.session_key.clone(),
            session_time_base: self.session_time_base.clone(),
            data_repetition_count: self.data_repetition_count,
            ranging_error_streak_timeout_ms: self.ranging_error_streak_timeout_ms,
            filter_type: self.filter_type,
        };

        params.is_valid()?;
        Some(AppConfigParams::Fira(params))
    }

    // Generate the setter methods for all the fields.
    builder_field!(device_type, DeviceType, Some);
    builder_field!(device_role, DeviceRole, Some);
    builder_field!(ranging_round_usage, RangingRoundUsage);
    builder_field!(sts_config, StsConfig);
    builder_field!(multi_node_mode, MultiNodeMode, Some);
    builder_field!(channel_number, UwbChannel);
    builder_field!(device_mac_address, UwbAddress, Some);
    builder_field!(dst_mac_address, Vec<UwbAddress>);
    builder_field!(slot_duration_rstu, u16);
    builder_field!(ranging_duration_ms, u32);
    builder_field!(aoa_result_request, AoaResultRequest);
    builder_field!(range_data_ntf_config, RangeDataNtfConfig);
    builder_field!(range_data_ntf_proximity_near_cm, u16);
    builder_field!(range_data_ntf_proximity_far_cm, u16);
    builder_field!(scheduled_mode, ScheduledMode);
    builder_field!(session_priority, u8);
    builder_field!(mac_address_mode, MacAddressMode);
    builder_field!(max_rr_retry, u16);
    builder_field!(uwb_initiation_time_ms, u64);
    builder_field!(absolute_uwb_initiation_time_us, u64);
    builder_field!(hopping_mode, HoppingMode);
    builder_field!(block_stride_length, u8);
    builder_field!(sub_session_id, SubSessionId);
    builder_field!(session_key, Option<Vec<u8>>);
    builder_field!(session_time_base, Option<SessionTimeBase>);
    builder_field!(data_repetition_count, u8);
    builder_field!(ranging_error_streak_timeout_ms, u64);
    builder_field!(filter_type, FilterType);
}

/// The fields of a FiRa reconfigure request. An `action` indicates a multicast
/// controlee update; everything else is a session configuration change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiraRangingReconfigureParams {
    pub action: Option<crate::params::uci_packets::UpdateMulticastListAction>,
    pub address_list: Option<Vec<UwbAddress>>,
    pub sub_session_id_list: Option<Vec<SubSessionId>>,
    pub sub_session_key_list: Option<Vec<Vec<u8>>>,
    pub block_stride_length: Option<u8>,
    pub range_data_ntf_config: Option<RangeDataNtfConfig>,
    pub range_data_proximity_near_cm: Option<u16>,
    pub range_data_proximity_far_cm: Option<u16>,
    pub suspend_ranging_rounds: Option<SuspendRanging>,
}

impl FiraRangingReconfigureParams {
    /// Generate the TLVs for the configuration-change fields (the multicast
    /// fields go through SESSION_UPDATE_CONTROLLER_MULTICAST_LIST_CMD
    /// instead).
    pub fn generate_config_map(&self) -> AppConfigTlvMap {
        let mut config_map = HashMap::new();
        if let Some(block_stride_length) = self.block_stride_length {
            config_map.insert(AppConfigTlvType::BlockStrideLength, u8_to_bytes(block_stride_length));
        }
        if let Some(range_data_ntf_config) = self.range_data_ntf_config {
            config_map.insert(
                AppConfigTlvType::SessionInfoNtfConfig,
                u8_to_bytes(range_data_ntf_config as u8),
            );
        }
        if let Some(near_cm) = self.range_data_proximity_near_cm {
            config_map.insert(AppConfigTlvType::NearProximityConfig, u16_to_bytes(near_cm));
        }
        if let Some(far_cm) = self.range_data_proximity_far_cm {
            config_map.insert(AppConfigTlvType::FarProximityConfig, u16_to_bytes(far_cm));
        }
        if let Some(suspend) = self.suspend_ranging_rounds {
            config_map.insert(AppConfigTlvType::SuspendRangingRounds, u8_to_bytes(suspend as u8));
        }
        config_map
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum DeviceType {
    Controlee = 0,
    Controller = 1,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum DeviceRole {
    Responder = 0,
    Initiator = 1,
    Advertiser = 5,
    Observer = 6,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum RangingRoundUsage {
    SsTwr = 1,
    DsTwr = 2,
    SsTwrNon = 3,
    DsTwrNon = 4,
    OwrAoaMeasurement = 5,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum StsConfig {
    Static = 0,
    Dynamic = 1,
    DynamicForControleeIndividualKey = 2,
    Provisioned = 3,
    ProvisionedForControleeIndividualKey = 4,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum MultiNodeMode {
    Unicast = 0,
    OneToMany = 1,
    ManyToMany = 2,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum UwbChannel {
    Channel5 = 5,
    Channel6 = 6,
    Channel8 = 8,
    Channel9 = 9,
    Channel10 = 10,
    Channel12 = 12,
    Channel13 = 13,
    Channel14 = 14,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum AoaResultRequest {
    NoAoaReport = 0,
    ReqAoaResults = 1,
    ReqAoaResultsAzimuthOnly = 2,
    ReqAoaResultsElevationOnly = 3,
    ReqAoaResultsInterleaved = 0xF0,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum RangeDataNtfConfig {
    Disable = 0,
    Enable = 1,
    EnableProximityLevelTrig = 2,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ScheduledMode {
    ContentionBasedRanging = 0,
    TimeScheduledRanging = 1,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum MacAddressMode {
    MacAddress2Bytes = 0,
    MacAddress8Bytes2BytesHeader = 1,
    MacAddress8Bytes = 2,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum HoppingMode {
    Disable = 0,
    FiraHoppingEnable = 1,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SuspendRanging {
    Disabled = 0,
    Enabled = 1,
}

/// The AoA filtering flavor for the session's controlees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// No corrections applied.
    NoFilter,
    /// Filter and correct with the platform default pose source.
    DefaultFilter,
    /// Filter with an application-provided pose source.
    ApplicationFilter,
}
