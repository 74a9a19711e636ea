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

//! The application-facing notification sink of the session manager, and the
//! mapping from UCI status / reason codes to the application-visible reason
//! taxonomy.

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::params::aliro_app_config_params::AliroStartedAppConfigParams;
use crate::params::app_config_params::AppConfigParams;
use crate::params::ccc_app_config_params::CccStartedAppConfigParams;
use crate::params::uci_packets::{
    AppConfigTlv, DataRcvStatusCode, DataTransferNtfStatusCode,
    DataTransferPhaseConfigNtfStatusCode, MulticastUpdateStatusCode, ReasonCode, SessionHandle,
    StatusCode, UwbAddress,
};
use crate::uci::notification::{RadarDataRcvNotification, SessionRangeData};

/// The reason of an application-visible session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingChangeReason {
    /// The request originated from the local client API.
    LocalApi,
    /// The maximum number of sessions was reached.
    MaxSessionsReached,
    /// The parameters were rejected.
    BadParameters,
    /// A protocol specific lifecycle failure.
    ProtocolSpecific,
    /// The platform policy forced the change (background app, error streak).
    SystemPolicy,
    /// A regulatory constraint forced the change.
    SystemRegulation,
    /// The maximum ranging round retry count was reached.
    MaxRrRetryReached,
    /// The remote peer requested the change.
    RemoteRequest,
    /// Not enough slots per ranging round.
    InsufficientSlotsPerRr,
    /// The session was resumed by an in-band signal.
    SessionResumed,
    /// The session was suspended by an in-band signal.
    SessionSuspended,
    /// The session was stopped by an in-band signal.
    InbandSessionStop,
    /// The reason is unknown.
    Unknown,
}

impl RangingChangeReason {
    /// Map a UCI command status to the application-visible reason.
    pub fn from_status_code(status: StatusCode) -> Self {
        match status {
            StatusCode::Ok => RangingChangeReason::LocalApi,
            StatusCode::ErrorMaxSessionsExceeded => RangingChangeReason::MaxSessionsReached,
            StatusCode::InvalidParam
            | StatusCode::InvalidRange
            | StatusCode::InvalidMessageSize => RangingChangeReason::BadParameters,
            StatusCode::ErrorSessionNotExist
            | StatusCode::ErrorCccLifecycle
            | StatusCode::ErrorCccSeBusy => RangingChangeReason::ProtocolSpecific,
            StatusCode::AndroidRegulationUwbOff => RangingChangeReason::SystemRegulation,
            _ => RangingChangeReason::Unknown,
        }
    }

    /// Map a SESSION_STATUS_NTF reason code to the application-visible reason.
    pub fn from_reason_code(reason_code: ReasonCode) -> Self {
        match reason_code {
            ReasonCode::StateChangeWithSessionManagementCommands => RangingChangeReason::LocalApi,
            ReasonCode::MaxRangingRoundRetryCountReached => RangingChangeReason::MaxRrRetryReached,
            ReasonCode::MaxNumberOfMeasurementsReached => RangingChangeReason::RemoteRequest,
            ReasonCode::ErrorInsufficientSlotsPerRr
            | ReasonCode::ErrorSlotLengthNotSupported
            | ReasonCode::ErrorInvalidUlTdoaRandomWindow
            | ReasonCode::ErrorMacAddressModeNotSupported
            | ReasonCode::ErrorInvalidRangingInterval
            | ReasonCode::ErrorInvalidStsConfig
            | ReasonCode::ErrorInvalidRframeConfig
            | ReasonCode::ErrorHusNotEnoughSlots
            | ReasonCode::ErrorHusCfpPhaseTooShort
            | ReasonCode::ErrorHusCapPhaseTooShort
            | ReasonCode::ErrorHusOthers => RangingChangeReason::BadParameters,
            ReasonCode::ErrorSessionKeyNotFound | ReasonCode::ErrorSubSessionKeyNotFound => {
                RangingChangeReason::ProtocolSpecific
            }
            ReasonCode::RegulationUwbOff => RangingChangeReason::SystemRegulation,
            ReasonCode::SessionResumedDueToInbandSignal => RangingChangeReason::SessionResumed,
            ReasonCode::SessionSuspendedDueToInbandSignal => RangingChangeReason::SessionSuspended,
            ReasonCode::SessionStoppedDueToInbandSignal => RangingChangeReason::InbandSessionStop,
        }
    }
}

/// Convert a SESSION_STATUS_NTF reason code to the UCI status some callbacks
/// carry.
pub(crate) fn reason_code_to_status_code(reason_code: ReasonCode) -> StatusCode {
    match reason_code {
        ReasonCode::StateChangeWithSessionManagementCommands => StatusCode::Ok,
        ReasonCode::ErrorSessionKeyNotFound | ReasonCode::ErrorSubSessionKeyNotFound => {
            StatusCode::ErrorSessionNotExist
        }
        _ => StatusCode::Failed,
    }
}

/// Collapse a per-controlee multicast update outcome into the UCI status
/// space the application callbacks speak.
pub(crate) fn multicast_status_to_status_code(status: MulticastUpdateStatusCode) -> StatusCode {
    match status {
        MulticastUpdateStatusCode::OkMulticastListUpdate => StatusCode::Ok,
        MulticastUpdateStatusCode::ErrorMulticastListFull => StatusCode::ErrorMulticastListFull,
        MulticastUpdateStatusCode::ErrorAddressNotFound => StatusCode::ErrorAddressNotFound,
        MulticastUpdateStatusCode::ErrorAddressAlreadyPresent => {
            StatusCode::ErrorAddressAlreadyPresent
        }
        _ => StatusCode::Failed,
    }
}

/// Collapse a DATA_TRANSFER_STATUS_NTF outcome into the UCI status space.
pub(crate) fn data_transfer_status_to_status_code(
    status: DataTransferNtfStatusCode,
) -> StatusCode {
    match status {
        DataTransferNtfStatusCode::Ok | DataTransferNtfStatusCode::RepetitionOk => StatusCode::Ok,
        DataTransferNtfStatusCode::ErrorRejected => StatusCode::Rejected,
        _ => StatusCode::Failed,
    }
}

/// Collapse a DATA_MESSAGE_RCV status into the UCI status space.
pub(crate) fn data_rcv_status_to_status_code(status: DataRcvStatusCode) -> StatusCode {
    match status {
        DataRcvStatusCode::Ok => StatusCode::Ok,
        DataRcvStatusCode::ErrorRejected => StatusCode::Rejected,
        DataRcvStatusCode::ErrorUnknownSessionId => StatusCode::ErrorSessionNotExist,
    }
}

/// The parameters reported with a successful start.
#[derive(Debug, Clone, PartialEq)]
pub enum RangingStartedParams {
    /// FiRa reports the session parameters in effect.
    Fira(AppConfigParams),
    /// CCC reports the started parameters read back from the UWBS.
    CccStarted(CccStartedAppConfigParams),
    /// ALIRO reports the started parameters read back from the UWBS.
    AliroStarted(AliroStartedAppConfigParams),
}

/// The callback interface the session manager reports every session outcome
/// through. The core never raises errors across this boundary; every failure
/// path surfaces as one of the `*_failed` callbacks.
pub trait UwbSessionCallback: 'static + Send {
    fn on_ranging_opened(&mut self, session_handle: SessionHandle);
    fn on_ranging_open_failed(
        &mut self,
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
    );
    fn on_ranging_started(
        &mut self,
        session_handle: SessionHandle,
        params: Option<RangingStartedParams>,
    );
    fn on_ranging_start_failed(
        &mut self,
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
    );
    fn on_ranging_stopped(
        &mut self,
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
        stopped_params: Vec<AppConfigTlv>,
    );
    fn on_ranging_stop_failed(&mut self, session_handle: SessionHandle, status: StatusCode);
    fn on_ranging_reconfigured(&mut self, session_handle: SessionHandle);
    fn on_ranging_reconfigure_failed(&mut self, session_handle: SessionHandle, status: StatusCode);
    fn on_ranging_closed(
        &mut self,
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
    );
    fn on_controlee_added(&mut self, session_handle: SessionHandle, address: UwbAddress);
    fn on_controlee_add_failed(
        &mut self,
        session_handle: SessionHandle,
        address: Option<UwbAddress>,
        status: StatusCode,
    );
    fn on_controlee_removed(&mut self, session_handle: SessionHandle, address: UwbAddress);
    fn on_controlee_remove_failed(
        &mut self,
        session_handle: SessionHandle,
        address: Option<UwbAddress>,
        status: StatusCode,
    );
    fn on_ranging_result(&mut self, session_handle: SessionHandle, range_data: SessionRangeData);
    fn on_data_received(
        &mut self,
        session_handle: SessionHandle,
        address: UwbAddress,
        payload: Vec<u8>,
    );
    fn on_data_receive_failed(
        &mut self,
        session_handle: SessionHandle,
        address: UwbAddress,
        status: StatusCode,
    );
    fn on_data_sent(&mut self, session_handle: SessionHandle, address: UwbAddress);
    fn on_data_send_failed(
        &mut self,
        session_handle: SessionHandle,
        address: UwbAddress,
        status: StatusCode,
    );
    fn on_data_transfer_phase_configured(
        &mut self,
        session_handle: SessionHandle,
        status: DataTransferPhaseConfigNtfStatusCode,
    );
    fn on_data_transfer_phase_config_failed(
        &mut self,
        session_handle: SessionHandle,
        status: DataTransferPhaseConfigNtfStatusCode,
    );
    fn on_ranging_paused(&mut self, session_handle: SessionHandle);
    fn on_ranging_pause_failed(&mut self, session_handle: SessionHandle, status: StatusCode);
    fn on_ranging_resumed(&mut self, session_handle: SessionHandle);
    fn on_ranging_resume_failed(&mut self, session_handle: SessionHandle, status: StatusCode);
    fn on_ranging_rounds_update_dt_tag_status(
        &mut self,
        session_handle: SessionHandle,
        status: StatusCode,
        ranging_round_indexes: Vec<u8>,
    );
    fn on_radar_data_received(
        &mut self,
        session_handle: SessionHandle,
        radar_data: RadarDataRcvNotification,
    );
}

/// One application-visible event, produced by the event loop or the
/// notification router and drained by the dispatcher task. Going through a
/// single channel keeps the per-session callback order identical to the
/// emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RangingOpened {
        session_handle: SessionHandle,
    },
    RangingOpenFailed {
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
    },
    RangingStarted {
        session_handle: SessionHandle,
        params: Option<RangingStartedParams>,
    },
    RangingStartFailed {
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
    },
    RangingStopped {
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
        stopped_params: Vec<AppConfigTlv>,
    },
    RangingStopFailed {
        session_handle: SessionHandle,
        status: StatusCode,
    },
    RangingReconfigured {
        session_handle: SessionHandle,
    },
    RangingReconfigureFailed {
        session_handle: SessionHandle,
        status: StatusCode,
    },
    RangingClosed {
        session_handle: SessionHandle,
        reason: RangingChangeReason,
        status: StatusCode,
    },
    ControleeAdded {
        session_handle: SessionHandle,
        address: UwbAddress,
    },
    ControleeAddFailed {
        session_handle: SessionHandle,
        address: Option<UwbAddress>,
        status: StatusCode,
    },
    ControleeRemoved {
        session_handle: SessionHandle,
        address: UwbAddress,
    },
    ControleeRemoveFailed {
        session_handle: SessionHandle,
        address: Option<UwbAddress>,
        status: StatusCode,
    },
    RangingResult {
        session_handle: SessionHandle,
        range_data: SessionRangeData,
    },
    DataReceived {
        session_handle: SessionHandle,
        address: UwbAddress,
        payload: Vec<u8>,
    },
    DataReceiveFailed {
        session_handle: SessionHandle,
        address: UwbAddress,
        status: StatusCode,
    },
    DataSent {
        session_handle: SessionHandle,
        address: UwbAddress,
    },
    DataSendFailed {
        session_handle: SessionHandle,
        address: UwbAddress,
        status: StatusCode,
    },
    DataTransferPhaseConfigured {
        session_handle: SessionHandle,
        status: DataTransferPhaseConfigNtfStatusCode,
    },
    DataTransferPhaseConfigFailed {
        session_handle: SessionHandle,
        status: DataTransferPhaseConfigNtfStatusCode,
    },
    RangingPaused {
        session_handle: SessionHandle,
    },
    RangingPauseFailed {
        session_handle: SessionHandle,
        status: StatusCode,
    },
    RangingResumed {
        session_handle: SessionHandle,
    },
    RangingResumeFailed {
        session_handle: SessionHandle,
        status: StatusCode,
    },
    RangingRoundsUpdateDtTagStatus {
        session_handle: SessionHandle,
        status: StatusCode,
        ranging_round_indexes: Vec<u8>,
    },
    RadarDataReceived {
        session_handle: SessionHandle,
        radar_data: RadarDataRcvNotification,
    },
}

/// Drain the event channel into the callback until every sender is dropped.
pub(crate) fn run_event_dispatcher<C: UwbSessionCallback>(
    mut receiver: mpsc::UnboundedReceiver<SessionEvent>,
    mut callback: C,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            dispatch_event(&mut callback, event);
        }
        debug!("The session event dispatcher is about to drop.");
    })
}

fn dispatch_event<C: UwbSessionCallback>(callback: &mut C, event: SessionEvent) {
    match event {
        SessionEvent::RangingOpened { session_handle } => callback.on_ranging_opened(session_handle),
        SessionEvent::RangingOpenFailed { session_handle, reason, status } => {
            callback.on_ranging_open_failed(session_handle, reason, status)
        }
        SessionEvent::RangingStarted { session_handle, params } => {
            callback.on_ranging_started(session_handle, params)
        }
        SessionEvent::RangingStartFailed { session_handle, reason, status } => {
            callback.on_ranging_start_failed(session_handle, reason, status)
        }
        SessionEvent::RangingStopped { session_handle, reason, status, stopped_params } => {
            callback.on_ranging_stopped(session_handle, reason, status, stopped_params)
        }
        SessionEvent::RangingStopFailed { session_handle, status } => {
            callback.on_ranging_stop_failed(session_handle, status)
        }
        SessionEvent::RangingReconfigured { session_handle } => {
            callback.on_ranging_reconfigured(session_handle)
        }
        SessionEvent::RangingReconfigureFailed { session_handle, status } => {
            callback.on_ranging_reconfigure_failed(session_handle, status)
        }
        SessionEvent::RangingClosed { session_handle, reason, status } => {
            callback.on_ranging_closed(session_handle, reason, status)
        }
        SessionEvent::ControleeAdded { session_handle, address } => {
            callback.on_controlee_added(session_handle, address)
        }
        SessionEvent::ControleeAddFailed { session_handle, address, status } => {
            callback.on_controlee_add_failed(session_handle, address, status)
        }
        SessionEvent::ControleeRemoved { session_handle, address } => {
            callback.on_controlee_removed(session_handle, address)
        }
        SessionEvent::ControleeRemoveFailed { session_handle, address, status } => {
            callback.on_controlee_remove_failed(session_handle, address, status)
        }
        SessionEvent::RangingResult { session_handle, range_data } => {
            callback.on_ranging_result(session_handle, range_data)
        }
        SessionEvent::DataReceived { session_handle, address, payload } => {
            callback.on_data_received(session_handle, address, payload)
        }
        SessionEvent::DataReceiveFailed { session_handle, address, status } => {
            callback.on_data_receive_failed(session_handle, address, status)
        }
        SessionEvent::DataSent { session_handle, address } => {
            callback.on_data_sent(session_handle, address)
        }
        SessionEvent::DataSendFailed { session_handle, address, status } => {
            callback.on_data_send_failed(session_handle, address, status)
        }
        SessionEvent::DataTransferPhaseConfigured { session_handle, status } => {
            callback.on_data_transfer_phase_configured(session_handle, status)
        }
        SessionEvent::DataTransferPhaseConfigFailed { session_handle, status } => {
            callback.on_data_transfer_phase_config_failed(session_handle, status)
        }
        SessionEvent::RangingPaused { session_handle } => callback.on_ranging_paused(session_handle),
        SessionEvent::RangingPauseFailed { session_handle, status } => {
            callback.on_ranging_pause_failed(session_handle, status)
        }
        SessionEvent::RangingResumed { session_handle } => {
            callback.on_ranging_resumed(session_handle)
        }
        SessionEvent::RangingResumeFailed { session_handle, status } => {
            callback.on_ranging_resume_failed(session_handle, status)
        }
        SessionEvent::RangingRoundsUpdateDtTagStatus {
            session_handle,
            status,
            ranging_round_indexes,
        } => callback.on_ranging_rounds_update_dt_tag_status(
            session_handle,
            status,
            ranging_round_indexes,
        ),
        SessionEvent::RadarDataReceived { session_handle, radar_data } => {
            callback.on_radar_data_received(session_handle, radar_data)
        }
    }
}

#[cfg(any(test, feature = "mock-utils"))]
pub mod mock_session_callback {
    //! A recording mock of the session callback.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;

    /// Records every callback invocation in order, for the tests to assert
    /// against.
    #[derive(Clone, Default)]
    pub struct MockSessionCallback {
        received_calls: Arc<Mutex<Vec<SessionEvent>>>,
        call_received: Arc<Notify>,
    }

    impl MockSessionCallback {
        pub fn new() -> Self {
            Default::default()
        }

        /// The callback invocations received so far, in order.
        pub fn received(&self) -> Vec<SessionEvent> {
            self.received_calls.lock().unwrap().clone()
        }

        /// Wait until at least |count| invocations were received.
        ///
        /// Returns false if the count is not reached within a second of the
        /// last received call.
        pub async fn wait_received_count(&self, count: usize) -> bool {
            while self.received_calls.lock().unwrap().len() < count {
                if timeout(Duration::from_secs(1), self.call_received.notified()).await.is_err() {
                    return false;
                }
            }
            true
        }

        fn record(&mut self, event: SessionEvent) {
            self.received_calls.lock().unwrap().push(event);
            self.call_received.notify_one();
        }
    }

    impl UwbSessionCallback for MockSessionCallback {
        fn on_ranging_opened(&mut self, session_handle: SessionHandle) {
            self.record(SessionEvent::RangingOpened { session_handle });
        }
        fn on_ranging_open_failed(
            &mut self,
            session_handle: SessionHandle,
            reason: RangingChangeReason,
            status: StatusCode,
        ) {
            self.record(SessionEvent::RangingOpenFailed { session_handle, reason, status });
        }
        fn on_ranging_started(
            &mut self,
            session_handle: SessionHandle,
            params: Option<RangingStartedParams>,
        ) {
            self.record(SessionEvent::RangingStarted { session_handle, params });
        }
        fn on_ranging_start_failed(
            &mut self,
            session_handle: SessionHandle,
            reason: RangingChangeReason,
            status: StatusCode,
        ) {
            self.record(SessionEvent::RangingStartFailed { session_handle, reason, status });
        }
        fn on_ranging_stopped(
            &mut self,
            session_handle: SessionHandle,
            reason: RangingChangeReason,
            status: StatusCode,
            stopped_params: Vec<AppConfigTlv>,
        ) {
            self.record(SessionEvent::RangingStopped {
                session_handle,
                reason,
                status,
                stopped_params,
            });
        }
        fn on_ranging_stop_failed(&mut self, session_handle: SessionHandle, status: StatusCode) {
            self.record(SessionEvent::RangingStopFailed { session_handle, status });
        }
        fn on_ranging_reconfigured(&mut self, session_handle: SessionHandle) {
            self.record(SessionEvent::RangingReconfigured { session_handle });
        }
        fn on_ranging_reconfigure_failed(
            &mut self,
            session_handle: SessionHandle,
            status: StatusCode,
        ) {
            self.record(SessionEvent::RangingReconfigureFailed { session_handle, status });
        }
        fn on_ranging_closed(
            &mut self,
            session_handle: SessionHandle,
            reason: RangingChangeReason,
            status: StatusCode,
        ) {
            self.record(SessionEvent::RangingClosed { session_handle, reason, status });
        }
        fn on_controlee_added(&mut self, session_handle: SessionHandle, address: UwbAddress) {
            self.record(SessionEvent::ControleeAdded { session_handle, address });
        }
        fn on_controlee_add_failed(
            &mut self,
            session_handle: SessionHandle,
            address: Option<UwbAddress>,
            status: StatusCode,
        ) {
            self.record(SessionEvent::ControleeAddFailed { session_handle, address, status });
        }
        fn on_controlee_removed(&mut self, session_handle: SessionHandle, address: UwbAddress) {
            self.record(SessionEvent::ControleeRemoved { session_handle, address });
        }
        fn on_controlee_remove_failed(
            &mut self,
            session_handle: SessionHandle,
            address: Option<UwbAddress>,
            status: StatusCode,
        ) {
            self.record(SessionEvent::ControleeRemoveFailed { session_handle, address, status });
        }
        fn on_ranging_result(
            &mut self,
            session_handle: SessionHandle,
            range_data: SessionRangeData,
        ) {
            self.record(SessionEvent::RangingResult { session_handle, range_data });
        }
        fn on_data_received(
            &mut self,
            session_handle: SessionHandle,
            address: UwbAddress,
            payload: Vec<u8>,
        ) {
            self.record(SessionEvent::DataReceived { session_handle, address, payload });
        }
        fn on_data_receive_failed(
            &mut self,
            session_handle: SessionHandle,
            address: UwbAddress,
            status: StatusCode,
        ) {
            self.record(SessionEvent::DataReceiveFailed { session_handle, address, status });
        }
        fn on_data_sent(&mut self, session_handle: SessionHandle, address: UwbAddress) {
            self.record(SessionEvent::DataSent { session_handle, address });
        }
        fn on_data_send_failed(
            &mut self,
            session_handle: SessionHandle,
            address: UwbAddress,
            status: StatusCode,
        ) {
            self.record(SessionEvent::DataSendFailed { session_handle, address, status });
        }
        fn on_data_transfer_phase_configured(
            &mut self,
            session_handle: SessionHandle,
            status: DataTransferPhaseConfigNtfStatusCode,
        ) {
            self.record(SessionEvent::DataTransferPhaseConfigured { session_handle, status });
        }
        fn on_data_transfer_phase_config_failed(
            &mut self,
            session_handle: SessionHandle,
            status: DataTransferPhaseConfigNtfStatusCode,
        ) {
            self.record(SessionEvent::DataTransferPhaseConfigFailed { session_handle, status });
        }
        fn on_ranging_paused(&mut self, session_handle: SessionHandle) {
            self.record(SessionEvent::RangingPaused { session_handle });
        }
        fn on_ranging_pause_failed(&mut self, session_handle: SessionHandle, status: StatusCode) {
            self.record(SessionEvent::RangingPauseFailed { session_handle, status });
        }
        fn on_ranging_resumed(&mut self, session_handle: SessionHandle) {
            self.record(SessionEvent::RangingResumed { session_handle });
        }
        fn on_ranging_resume_failed(&mut self, session_handle: SessionHandle, status: StatusCode) {
            self.record(SessionEvent::RangingResumeFailed { session_handle, status });
        }
        fn on_ranging_rounds_update_dt_tag_status(
            &mut self,
            session_handle: SessionHandle,
            status: StatusCode,
            ranging_round_indexes: Vec<u8>,
        ) {
            self.record(SessionEvent::RangingRoundsUpdateDtTagStatus {
                session_handle,
                status,
                ranging_round_indexes,
            });
        }
        fn on_radar_data_received(
            &mut self,
            session_handle: SessionHandle,
            radar_data: RadarDataRcvNotification,
        ) {
            self.record(SessionEvent::RadarDataReceived { session_handle, radar_data });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_code_mapping() {
        assert_eq!(
            RangingChangeReason::from_reason_code(
                ReasonCode::StateChangeWithSessionManagementCommands
            ),
            RangingChangeReason::LocalApi
        );
        assert_eq!(
            RangingChangeReason::from_reason_code(ReasonCode::MaxRangingRoundRetryCountReached),
            RangingChangeReason::MaxRrRetryReached
        );
        assert_eq!(
            RangingChangeReason::from_reason_code(ReasonCode::ErrorInvalidStsConfig),
            RangingChangeReason::BadParameters
        );
        assert_eq!(
            RangingChangeReason::from_reason_code(ReasonCode::SessionStoppedDueToInbandSignal),
            RangingChangeReason::InbandSessionStop
        );
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            RangingChangeReason::from_status_code(StatusCode::Ok),
            RangingChangeReason::LocalApi
        );
        assert_eq!(
            RangingChangeReason::from_status_code(StatusCode::ErrorMaxSessionsExceeded),
            RangingChangeReason::MaxSessionsReached
        );
        assert_eq!(
            RangingChangeReason::from_status_code(StatusCode::ErrorCccSeBusy),
            RangingChangeReason::ProtocolSpecific
        );
        assert_eq!(
            RangingChangeReason::from_status_code(StatusCode::Failed),
            RangingChangeReason::Unknown
        );
    }

    #[test]
    fn test_reason_code_to_status_code() {
        assert_eq!(
            reason_code_to_status_code(ReasonCode::StateChangeWithSessionManagementCommands),
            StatusCode::Ok
        );
        assert_eq!(
            reason_code_to_status_code(ReasonCode::ErrorSessionKeyNotFound),
            StatusCode::ErrorSessionNotExist
        );
        assert_eq!(
            reason_code_to_status_code(ReasonCode::MaxRangingRoundRetryCountReached),
            StatusCode::Failed
        );
    }
}
