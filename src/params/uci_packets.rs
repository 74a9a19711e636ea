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

//! The UCI-adjacent value types shared between the session components and the
//! UCI transport boundary.

#![allow(missing_docs)]

use std::collections::{hash_map::RandomState, HashMap};
use std::iter::FromIterator;

use num_derive::{FromPrimitive, ToPrimitive};
use zeroize::Zeroize;

/// The ID of the UWB session, assigned by the caller and passed to the UWBS.
pub type SessionId = u32;
/// The opaque per-session key minted by the application layer.
pub type SessionHandle = u64;
/// The controller-assigned token for a session, used when a session has to
/// reference another session by value (e.g. hybrid phase lists).
pub type SessionToken = u32;
/// The ID of the sub-session for a controlee.
pub type SubSessionId = u32;
/// The identifier of the UWB chip serving a session.
pub type ChipId = String;

pub const SHORT_ADDRESS_LEN: usize = 2;
pub const EXTENDED_ADDRESS_LEN: usize = 8;

/// The state of the UWB session, per SESSION_STATUS_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SessionState {
    Init = 0x00,
    Deinit = 0x01,
    Active = 0x02,
    Idle = 0x03,
    Error = 0xFF,
}

/// The type byte given to SESSION_INIT_CMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SessionType {
    FiraRangingSession = 0x00,
    FiraRangingAndInBandDataSession = 0x01,
    FiraDataTransferSession = 0x02,
    FiraRangingOnlyPhase = 0x03,
    FiraInBandDataPhase = 0x04,
    FiraRangingWithDataPhase = 0x05,
    Ccc = 0xA0,
    Radar = 0xA1,
    Aliro = 0xA2,
    DeviceTestMode = 0xD0,
}

impl SessionType {
    /// True when the session type carries an in-band data phase that accepts a
    /// data transfer phase configuration.
    pub fn supports_data_transfer_phase(&self) -> bool {
        matches!(
            self,
            SessionType::FiraRangingAndInBandDataSession
                | SessionType::FiraDataTransferSession
                | SessionType::FiraInBandDataPhase
        )
    }
}

/// The status code of a UCI command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0x00,
    Rejected = 0x01,
    Failed = 0x02,
    SyntaxError = 0x03,
    InvalidParam = 0x04,
    InvalidRange = 0x05,
    InvalidMessageSize = 0x06,
    UnknownGid = 0x07,
    UnknownOid = 0x08,
    ReadOnly = 0x09,
    CommandRetry = 0x0A,
    Unknown = 0x0B,
    // UWB session specific status codes.
    ErrorSessionNotExist = 0x11,
    ErrorSessionDuplicate = 0x12,
    ErrorSessionActive = 0x13,
    ErrorMaxSessionsExceeded = 0x14,
    ErrorSessionNotConfigured = 0x15,
    ErrorActiveSessionsOngoing = 0x16,
    ErrorMulticastListFull = 0x17,
    ErrorAddressNotFound = 0x18,
    ErrorAddressAlreadyPresent = 0x19,
    OkNegativeDistanceReport = 0x1B,
    // UWB ranging session specific status codes.
    RangingTxFailed = 0x20,
    RangingRxTimeout = 0x21,
    RangingRxPhyDecFailed = 0x22,
    RangingRxPhyToaFailed = 0x23,
    RangingRxPhyStsFailed = 0x24,
    RangingRxMacDecFailed = 0x25,
    RangingRxMacIeDecFailed = 0x26,
    RangingRxMacIeMissing = 0x27,
    ErrorRoundIndexNotActivated = 0x28,
    ErrorNumberOfActiveRangingRoundsExceeded = 0x29,
    ErrorRoundIndexNotSetAsInitiator = 0x2A,
    ErrorDlTdoaDeviceAddressNotMatchingInReplyTimeList = 0x2B,
    // UWB data session specific status codes.
    DataMaxTxApduSizeExceeded = 0x30,
    DataRxCrcError = 0x31,
    // Vendor specific status codes.
    ErrorCccSeBusy = 0x50,
    ErrorCccLifecycle = 0x51,
    AndroidRegulationUwbOff = 0x52,
}

impl StatusCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::OkNegativeDistanceReport)
    }
}

/// The reason code carried by SESSION_STATUS_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ReasonCode {
    StateChangeWithSessionManagementCommands = 0x00,
    MaxRangingRoundRetryCountReached = 0x01,
    MaxNumberOfMeasurementsReached = 0x02,
    SessionSuspendedDueToInbandSignal = 0x03,
    SessionResumedDueToInbandSignal = 0x04,
    SessionStoppedDueToInbandSignal = 0x05,
    ErrorInvalidUlTdoaRandomWindow = 0x1D,
    ErrorSlotLengthNotSupported = 0x20,
    ErrorInsufficientSlotsPerRr = 0x21,
    ErrorMacAddressModeNotSupported = 0x22,
    ErrorInvalidRangingInterval = 0x23,
    ErrorInvalidStsConfig = 0x24,
    ErrorInvalidRframeConfig = 0x25,
    ErrorHusNotEnoughSlots = 0x26,
    ErrorHusCfpPhaseTooShort = 0x27,
    ErrorHusCapPhaseTooShort = 0x28,
    ErrorHusOthers = 0x29,
    ErrorSessionKeyNotFound = 0x2A,
    ErrorSubSessionKeyNotFound = 0x2B,
    // Vendor specific reason codes.
    RegulationUwbOff = 0x80,
}

/// The UWB device address of a local or remote device.
///
/// The UCI data path always carries the extended (8-byte) form; a short
/// address is widened by zero-extending the 6 most significant bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UwbAddress {
    Short([u8; SHORT_ADDRESS_LEN]),
    Extended([u8; EXTENDED_ADDRESS_LEN]),
}

impl UwbAddress {
    /// Convert the raw little-endian bytes to an address, accepting only the
    /// two valid lengths.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            SHORT_ADDRESS_LEN => Some(UwbAddress::Short(bytes.try_into().ok()?)),
            EXTENDED_ADDRESS_LEN => Some(UwbAddress::Extended(bytes.try_into().ok()?)),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            UwbAddress::Short(addr) => addr.to_vec(),
            UwbAddress::Extended(addr) => addr.to_vec(),
        }
    }

    /// Widen to the extended 8-byte form used by the UCI data path.
    pub fn to_extended_bytes(self) -> [u8; EXTENDED_ADDRESS_LEN] {
        match self {
            UwbAddress::Short(addr) => {
                let mut extended = [0; EXTENDED_ADDRESS_LEN];
                extended[..SHORT_ADDRESS_LEN].copy_from_slice(&addr);
                extended
            }
            UwbAddress::Extended(addr) => addr,
        }
    }

    /// The numeric form used as a map key for per-peer bookkeeping.
    pub fn as_u64(self) -> u64 {
        u64::from_le_bytes(self.to_extended_bytes())
    }

    pub fn len(&self) -> usize {
        match self {
            UwbAddress::Short(_) => SHORT_ADDRESS_LEN,
            UwbAddress::Extended(_) => EXTENDED_ADDRESS_LEN,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The action of SESSION_UPDATE_CONTROLLER_MULTICAST_LIST_CMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum UpdateMulticastListAction {
    AddControlee = 0x00,
    RemoveControlee = 0x01,
    AddControleeWithShortSubSessionKey = 0x02,
    AddControleeWithLongSubSessionKey = 0x03,
}

impl UpdateMulticastListAction {
    pub fn is_add(&self) -> bool {
        !matches!(self, UpdateMulticastListAction::RemoveControlee)
    }

    /// True for the provisioned-STS variants that carry a per-controlee key.
    pub fn needs_sub_session_key(&self) -> bool {
        matches!(
            self,
            UpdateMulticastListAction::AddControleeWithShortSubSessionKey
                | UpdateMulticastListAction::AddControleeWithLongSubSessionKey
        )
    }
}

/// A controlee entry of the multicast list update command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controlee {
    pub short_address: [u8; SHORT_ADDRESS_LEN],
    pub sub_session_id: SubSessionId,
}

/// A controlee entry carrying a per-controlee sub-session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControleeWithSessionKey {
    pub short_address: [u8; SHORT_ADDRESS_LEN],
    pub sub_session_id: SubSessionId,
    pub session_key: Vec<u8>,
}

impl Drop for ControleeWithSessionKey {
    fn drop(&mut self) {
        self.session_key.zeroize();
    }
}

/// The controlee list variants of the multicast list update command. The key
/// lengths match the 16-byte and 32-byte "add" actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controlees {
    NoSessionKey(Vec<Controlee>),
    ShortSessionKey(Vec<ControleeWithSessionKey>),
    LongSessionKey(Vec<ControleeWithSessionKey>),
}

impl Controlees {
    pub fn len(&self) -> usize {
        match self {
            Controlees::NoSessionKey(list) => list.len(),
            Controlees::ShortSessionKey(list) => list.len(),
            Controlees::LongSessionKey(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The per-controlee status of SESSION_UPDATE_CONTROLLER_MULTICAST_LIST_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum MulticastUpdateStatusCode {
    OkMulticastListUpdate = 0x00,
    ErrorMulticastListFull = 0x01,
    ErrorKeyFetchFail = 0x02,
    ErrorSubSessionIdNotFound = 0x03,
    ErrorSubSessionKeyNotFound = 0x04,
    ErrorSubSessionKeyNotApplicable = 0x05,
    ErrorSessionKeyNotFound = 0x06,
    ErrorAddressNotFound = 0x07,
    ErrorAddressAlreadyPresent = 0x08,
}

/// The outcome for a single controlee of a multicast list update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControleeStatus {
    pub mac_address: [u8; SHORT_ADDRESS_LEN],
    pub sub_session_id: SubSessionId,
    pub status: MulticastUpdateStatusCode,
}

/// The list of per-controlee outcomes delivered by the multicast update
/// notification.
pub type ControleeStatusList = Vec<ControleeStatus>;

/// The ID of an application configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum AppConfigTlvType {
    DeviceType = 0x00,
    RangingRoundUsage = 0x01,
    StsConfig = 0x02,
    MultiNodeMode = 0x03,
    ChannelNumber = 0x04,
    NoOfControlee = 0x05,
    DeviceMacAddress = 0x06,
    DstMacAddress = 0x07,
    SlotDuration = 0x08,
    RangingDuration = 0x09,
    StsIndex = 0x0A,
    MacFcsType = 0x0B,
    RangingRoundControl = 0x0C,
    AoaResultReq = 0x0D,
    SessionInfoNtfConfig = 0x0E,
    NearProximityConfig = 0x0F,
    FarProximityConfig = 0x10,
    DeviceRole = 0x11,
    RframeConfig = 0x12,
    RssiReporting = 0x13,
    PreambleCodeIndex = 0x14,
    SfdId = 0x15,
    PsduDataRate = 0x16,
    PreambleDuration = 0x17,
    LinkLayerMode = 0x18,
    DataRepetitionCount = 0x19,
    RangingTimeStruct = 0x1A,
    SlotsPerRr = 0x1B,
    TxAdaptivePayloadPower = 0x1C,
    ResponderSlotIndex = 0x1E,
    PrfMode = 0x1F,
    ScheduledMode = 0x22,
    KeyRotation = 0x23,
    KeyRotationRate = 0x24,
    SessionPriority = 0x25,
    MacAddressMode = 0x26,
    VendorId = 0x27,
    StaticStsIv = 0x28,
    NumberOfStsSegments = 0x29,
    MaxRrRetry = 0x2A,
    UwbInitiationTime = 0x2B,
    HoppingMode = 0x2C,
    BlockStrideLength = 0x2D,
    ResultReportConfig = 0x2E,
    InBandTerminationAttemptCount = 0x2F,
    SubSessionId = 0x30,
    BprfPhrDataRate = 0x31,
    MaxNumberOfMeasurements = 0x32,
    StsLength = 0x35,
    SuspendRangingRounds = 0x3B,
    SessionKey = 0x45,
    SubSessionKey = 0x46,
    SessionDataTransferStatusNtfConfig = 0x47,
    SessionTimeBase = 0x48,
    ApplicationDataEndpoint = 0x4C,
    // CCC specific application configurations.
    CccHopModeKey = 0xA0,
    CccUwbTime0 = 0xA1,
    CccRangingProtocolVer = 0xA3,
    CccUwbConfigId = 0xA4,
    CccPulseshapeCombo = 0xA5,
    CccUrskTtl = 0xA6,
    CccLastIndexUsed = 0xA8,
    // Android specific application configurations.
    NbOfRangeMeasurements = 0xE3,
    NbOfAzimuthMeasurements = 0xE4,
    NbOfElevationMeasurements = 0xE5,
}

/// The (type, value) pair of an application configuration parameter. The value
/// is wiped on drop, as the TLV list can carry session key material.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfigTlv {
    pub cfg_id: AppConfigTlvType,
    v: Vec<u8>,
}

/// Redact the value when logging, as the TLV may contain PII.
impl std::fmt::Debug for AppConfigTlv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("AppConfigTlv").field("cfg_id", &self.cfg_id).field("v", &"redacted").finish()
    }
}

impl AppConfigTlv {
    pub fn new(cfg_id: AppConfigTlvType, v: Vec<u8>) -> Self {
        Self { cfg_id, v }
    }

    pub fn value(&self) -> &[u8] {
        &self.v
    }

    pub fn into_value(mut self) -> Vec<u8> {
        std::mem::take(&mut self.v)
    }
}

impl Drop for AppConfigTlv {
    fn drop(&mut self) {
        self.v.zeroize();
    }
}

/// Compare the TLV lists as maps, ignoring the order of the parameters.
pub fn app_config_tlvs_eq(a: &[AppConfigTlv], b: &[AppConfigTlv]) -> bool {
    app_config_tlvs_to_map(a) == app_config_tlvs_to_map(b)
}

fn app_config_tlvs_to_map(
    tlvs: &[AppConfigTlv],
) -> HashMap<AppConfigTlvType, &Vec<u8>, RandomState> {
    HashMap::from_iter(tlvs.iter().map(|tlv| (tlv.cfg_id, &tlv.v)))
}

/// The ID of a radar configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum RadarConfigTlvType {
    RadarTimingParams = 0x00,
    SamplesPerSweep = 0x01,
    SweepMode = 0x02,
    SweepOffset = 0x03,
    BitsPerSample = 0x04,
    NumberOfBursts = 0x05,
    RadarDataType = 0x06,
}

/// The (type, value) pair of a radar configuration parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarConfigTlv {
    pub cfg_id: RadarConfigTlvType,
    pub v: Vec<u8>,
}

/// Compare the radar TLV lists as maps, ignoring the order of the parameters.
pub fn radar_config_tlvs_eq(a: &[RadarConfigTlv], b: &[RadarConfigTlv]) -> bool {
    radar_config_tlvs_to_map(a) == radar_config_tlvs_to_map(b)
}

fn radar_config_tlvs_to_map(
    tlvs: &[RadarConfigTlv],
) -> HashMap<RadarConfigTlvType, &Vec<u8>, RandomState> {
    HashMap::from_iter(tlvs.iter().map(|tlv| (tlv.cfg_id, &tlv.v)))
}

/// The status of a single applied application configuration parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfigStatus {
    pub cfg_id: AppConfigTlvType,
    pub status: StatusCode,
}

/// The response of SESSION_SET_APP_CONFIG_CMD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAppConfigResponse {
    pub status: StatusCode,
    pub config_status: Vec<AppConfigStatus>,
}

/// The response of SESSION_UPDATE_DT_TAG_RANGING_ROUNDS_CMD: the ranging
/// rounds that could not be activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdateDtTagRangingRoundsResponse {
    pub status: StatusCode,
    pub ranging_round_indexes: Vec<u8>,
}

/// The measurement kind of a SESSION_INFO_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum RangingMeasurementType {
    TwoWay = 0x01,
    DlTdoa = 0x02,
    OwrAoa = 0x03,
}

/// A two-way (SS-TWR / DS-TWR) ranging measurement for one responder.
///
/// The AoA fields are in the UCI Q9.7 fixed point format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoWayRangingMeasurement {
    pub mac_address: UwbAddress,
    pub status: StatusCode,
    pub nlos: u8,
    pub distance_cm: u16,
    pub aoa_azimuth: i16,
    pub aoa_azimuth_fom: u8,
    pub aoa_elevation: i16,
    pub aoa_elevation_fom: u8,
    pub aoa_destination_azimuth: i16,
    pub aoa_destination_azimuth_fom: u8,
    pub aoa_destination_elevation: i16,
    pub aoa_destination_elevation_fom: u8,
    pub slot_index: u8,
    pub rssi: u8,
}

/// A one-way-ranging AoA measurement from an advertiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwrAoaRangingMeasurement {
    pub mac_address: UwbAddress,
    pub status: StatusCode,
    pub nlos: u8,
    pub frame_sequence_number: u8,
    pub block_index: u16,
    pub aoa_azimuth: i16,
    pub aoa_azimuth_fom: u8,
    pub aoa_elevation: i16,
    pub aoa_elevation_fom: u8,
}

/// A DL-TDoA measurement for one anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlTdoaRangingMeasurement {
    pub mac_address: UwbAddress,
    pub status: StatusCode,
    pub message_control: u16,
    pub block_index: u16,
    pub round_index: u8,
    pub nlos: u8,
    pub aoa_azimuth: i16,
    pub aoa_azimuth_fom: u8,
    pub aoa_elevation: i16,
    pub aoa_elevation_fom: u8,
    pub rssi: u8,
    pub tx_timestamp: u64,
    pub rx_timestamp: u64,
    pub anchor_cfo: u16,
    pub cfo: u16,
}

/// The status code of a DATA_MESSAGE_RCV packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum DataRcvStatusCode {
    Ok = 0x00,
    ErrorRejected = 0x01,
    ErrorUnknownSessionId = 0x02,
}

/// The status code of a DATA_TRANSFER_STATUS_NTF.
///
/// Written as per recent spec versions (v2.0.0): 0x01 is a per-repetition
/// success, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum DataTransferNtfStatusCode {
    Ok = 0x00,
    RepetitionOk = 0x01,
    ErrorDataTransfer = 0x02,
    ErrorNoCreditAvailable = 0x03,
    ErrorRejected = 0x04,
    ErrorSessionTypeNotSupported = 0x05,
    ErrorDataTransferIsOngoing = 0x06,
    ErrorInvalidFormat = 0x07,
}

impl DataTransferNtfStatusCode {
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            DataTransferNtfStatusCode::Ok | DataTransferNtfStatusCode::RepetitionOk
        )
    }
}

/// The status code of a SESSION_DATA_TRANSFER_PHASE_CONFIG_NTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum DataTransferPhaseConfigNtfStatusCode {
    ConfigSuccess = 0x00,
    ErrorInvalidSlotBitmap = 0x01,
    ErrorDuplicateSlotAssignment = 0x02,
    ErrorConfig = 0x03,
}

/// Bit 0 of the data transfer control byte selects the address length of the
/// phase management list entries.
pub const DATA_TRANSFER_CONTROL_SHORT_MAC_ADDRESS: u8 = 0x00;

/// One entry of the data transfer phase management list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTransferPhaseManagementEntry {
    pub uwb_address: UwbAddress,
    pub slot_bitmap: Vec<u8>,
}

/// The parameters of SESSION_DATA_TRANSFER_PHASE_CONFIG_CMD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDataTransferPhaseConfig {
    pub dtpcm_repetition: u8,
    pub data_transfer_control: u8,
    pub management_list: Vec<DataTransferPhaseManagementEntry>,
}

impl SessionDataTransferPhaseConfig {
    /// The slot bitmap size in bytes selected by bits [3:1] of the control
    /// byte.
    pub fn slot_bitmap_size(&self) -> usize {
        1 << ((self.data_transfer_control & 0x0F) >> 1)
    }

    /// The address length in bytes selected by bit 0 of the control byte.
    pub fn address_size(&self) -> usize {
        if self.data_transfer_control & 0x01 == DATA_TRANSFER_CONTROL_SHORT_MAC_ADDRESS {
            SHORT_ADDRESS_LEN
        } else {
            EXTENDED_ADDRESS_LEN
        }
    }
}

/// One phase interval of a hybrid session, referencing another session by its
/// application handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridSessionPhaseList {
    pub session_handle: SessionHandle,
    pub start_slot_index: u16,
    pub end_slot_index: u16,
}

/// The parameters of SESSION_SET_HUS_CONTROLLER_CONFIG_CMD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridSessionConfig {
    pub update_time: [u8; 8],
    pub phase_list: Vec<HybridSessionPhaseList>,
}

/// The size of one serialized phase element: token (4) + start (2) + end (2).
pub const HYBRID_PHASE_ELEMENT_SIZE: usize = 8;

/// The UCI generic version of the UWBS, from the device info response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl UciProtocolVersion {
    pub const V1_1: UciProtocolVersion = UciProtocolVersion { major: 1, minor: 1 };
    pub const V2_0: UciProtocolVersion = UciProtocolVersion { major: 2, minor: 0 };
}
