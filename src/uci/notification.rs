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

//! The asynchronous notifications delivered upward by the UCI transport for
//! the session-scoped notification groups.

use crate::params::uci_packets::{
    ControleeStatusList, DataRcvStatusCode, DataTransferNtfStatusCode,
    DataTransferPhaseConfigNtfStatusCode, DlTdoaRangingMeasurement, OwrAoaRangingMeasurement,
    RangingMeasurementType, ReasonCode, SessionId, SessionState, StatusCode,
    TwoWayRangingMeasurement, UwbAddress,
};

/// The session-scoped UCI notifications routed to the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum UciSessionNotification {
    /// SESSION_STATUS_NTF.
    SessionStatus {
        session_id: SessionId,
        session_state: SessionState,
        reason_code: ReasonCode,
    },
    /// SESSION_UPDATE_CONTROLLER_MULTICAST_LIST_NTF.
    SessionUpdateControllerMulticastList {
        session_id: SessionId,
        remaining_multicast_list_size: usize,
        status_list: ControleeStatusList,
    },
    /// SESSION_INFO_NTF: one frame of ranging results.
    RangeData(SessionRangeData),
    /// DATA_MESSAGE_RCV: an application payload received from a remote peer.
    DataReceived(DataRcvNotification),
    /// DATA_TRANSFER_STATUS_NTF: the outcome of an outbound data packet.
    DataTransferStatus {
        session_id: SessionId,
        uci_sequence_number: u16,
        status: DataTransferNtfStatusCode,
        tx_count: u8,
    },
    /// RADAR_DATA_MESSAGE_RCV: one burst of radar sweeps.
    RadarData(RadarDataRcvNotification),
    /// SESSION_DATA_TRANSFER_PHASE_CONFIG_NTF.
    DataTransferPhaseConfig {
        session_id: SessionId,
        status: DataTransferPhaseConfigNtfStatusCode,
    },
}

/// The measurement data of a SESSION_INFO_NTF.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRangeData {
    /// The sequence counter that starts with 0 when the session is started.
    pub sequence_number: u32,
    /// The identifier of the session.
    pub session_id: SessionId,
    /// The current ranging interval setting in the unit of ms.
    pub current_ranging_interval_ms: u32,
    /// The ranging measurement type.
    pub ranging_measurement_type: RangingMeasurementType,
    /// The ranging measurement data.
    pub ranging_measurements: RangingMeasurements,
    /// Indication that a RCR was sent/received in the current ranging round.
    pub rcr_indicator: u8,
    /// The raw notification payload, for the vendor layers.
    pub raw_ranging_data: Vec<u8>,
}

impl SessionRangeData {
    /// True when every measurement of the frame carries an error status. A
    /// frame without measurements does not count as an error frame.
    pub fn all_measurements_in_error(&self) -> bool {
        match &self.ranging_measurements {
            RangingMeasurements::TwoWay(measurements) => {
                !measurements.is_empty() && measurements.iter().all(|m| !m.status.is_ok())
            }
            RangingMeasurements::OwrAoa(measurement) => !measurement.status.is_ok(),
            RangingMeasurements::DlTdoa(measurements) => {
                !measurements.is_empty() && measurements.iter().all(|m| !m.status.is_ok())
            }
        }
    }
}

/// The measurement list of a SESSION_INFO_NTF, tagged by the measurement type.
#[derive(Debug, Clone, PartialEq)]
pub enum RangingMeasurements {
    /// A list of two-way ranging measurements, one per responder.
    TwoWay(Vec<TwoWayRangingMeasurement>),
    /// A single one-way-ranging AoA measurement from an advertiser.
    OwrAoa(OwrAoaRangingMeasurement),
    /// A list of DL-TDoA measurements, one per anchor.
    DlTdoa(Vec<DlTdoaRangingMeasurement>),
}

/// The DATA_MESSAGE_RCV packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRcvNotification {
    /// The identifier of the session on which data transfer is happening.
    pub session_id: SessionId,
    /// The status of the data rx.
    pub status: DataRcvStatusCode,
    /// The sequence number of the data packet.
    pub uci_sequence_number: u16,
    /// MacAddress of the sender of the application data.
    pub source_address: UwbAddress,
    /// Application Payload Data.
    pub payload: Vec<u8>,
}

/// One burst of radar data.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarDataRcvNotification {
    /// The identifier of the radar session.
    pub session_id: SessionId,
    /// The status of the radar data rx.
    pub status: StatusCode,
    /// The type of the radar data carried by the sweeps.
    pub radar_data_type: u8,
    /// Number of sweeps in this burst.
    pub number_of_sweeps: u8,
    /// Number of samples captured for each radar sweep.
    pub samples_per_sweep: u8,
    /// Bits per sample in the radar sweep.
    pub bits_per_sample: u8,
    /// The start offset of the sweeps, relative to 0cm distance.
    pub sweep_offset: u16,
    /// The radar sweeps of this burst.
    pub sweep_data: Vec<RadarSweepData>,
}

/// One radar sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarSweepData {
    /// The sequence number of the sweep.
    pub sequence_number: u32,
    /// The timestamp when this sweep was captured.
    pub timestamp: u32,
    /// Vendor specific data of the sweep.
    pub vendor_specific_data: Vec<u8>,
    /// The sample data of the sweep.
    pub sample_data: Vec<u8>,
}
