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

//! This module offers a mocked version of UciManager for testing.
//!
//! The mocked version mimics the behavior of the UCI transport and the stack
//! below it, so the session manager can be exercised without UWB hardware.
//! Each expected call optionally carries the notifications the UWBS would
//! deliver after accepting the command.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::params::uci_packets::{
    app_config_tlvs_eq, radar_config_tlvs_eq, AppConfigTlv, AppConfigTlvType, Controlees,
    RadarConfigTlv, SessionId, SessionToken, SessionType,
    SessionUpdateDtTagRangingRoundsResponse, SetAppConfigResponse, UciProtocolVersion,
    UpdateMulticastListAction, EXTENDED_ADDRESS_LEN,
};
use crate::uci::notification::UciSessionNotification;
use crate::uci::uci_manager::UciManager;

#[derive(Clone, Default)]
/// Mock version of UciManager for testing.
pub struct MockUciManager {
    expected_calls: Arc<Mutex<VecDeque<ExpectedCall>>>,
    expect_call_consumed: Arc<Notify>,
    notf_sender: Arc<Mutex<Option<mpsc::UnboundedSender<UciSessionNotification>>>>,
}

#[allow(dead_code)]
impl MockUciManager {
    /// Constructor.
    pub fn new() -> Self {
        Default::default()
    }

    /// Attach the channel the mock delivers notifications on, standing in for
    /// the transport's upward callback path.
    pub fn set_session_notification_sender(
        &mut self,
        notf_sender: mpsc::UnboundedSender<UciSessionNotification>,
    ) {
        self.notf_sender.lock().unwrap().replace(notf_sender);
    }

    /// Wait until expected calls are done.
    ///
    /// Returns false if calls are pending after 1 second.
    pub async fn wait_expected_calls_done(&mut self) -> bool {
        while !self.expected_calls.lock().unwrap().is_empty() {
            if timeout(Duration::from_secs(1), self.expect_call_consumed.notified()).await.is_err()
            {
                return false;
            }
        }
        true
    }

    /// Prepare Mock to expect session_init.
    ///
    /// MockUciManager expects call with parameters, returns out as response,
    /// followed by notfs sent.
    pub fn expect_session_init(
        &mut self,
        expected_session_id: SessionId,
        expected_session_type: SessionType,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::SessionInit {
            expected_session_id,
            expected_session_type,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect session_deinit.
    pub fn expect_session_deinit(
        &mut self,
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::SessionDeinit {
            expected_session_id,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect session_set_app_config.
    pub fn expect_session_set_app_config(
        &mut self,
        expected_session_id: SessionId,
        expected_config_tlvs: Vec<AppConfigTlv>,
        notfs: Vec<UciSessionNotification>,
        out: Result<SetAppConfigResponse>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::SessionSetAppConfig {
            expected_session_id,
            expected_config_tlvs,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect session_set_app_config with any TLV list.
    ///
    /// Used by the flows that re-generate TLVs internally (e.g. the priority
    /// re-sync before start), where the exact list is not interesting to the
    /// test.
    pub fn expect_session_set_app_config_any_tlvs(
        &mut self,
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<SetAppConfigResponse>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::SessionSetAppConfigAnyTlvs {
            expected_session_id,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect session_get_app_config.
    pub fn expect_session_get_app_config(
        &mut self,
        expected_session_id: SessionId,
        expected_config_ids: Vec<AppConfigTlvType>,
        out: Result<Vec<AppConfigTlv>>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::SessionGetAppConfig {
            expected_session_id,
            expected_config_ids,
            out,
        });
    }

    /// Prepare Mock to expect android_set_radar_config.
    pub fn expect_android_set_radar_config(
        &mut self,
        expected_session_id: SessionId,
        expected_config_tlvs: Vec<RadarConfigTlv>,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::AndroidSetRadarConfig {
            expected_session_id,
            expected_config_tlvs,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect range_start.
    pub fn expect_range_start(
        &mut self,
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::RangeStart {
            expected_session_id,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect range_stop.
    pub fn expect_range_stop(
        &mut self,
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::RangeStop {
            expected_session_id,
            notfs,
            out,
        });
    }

    /// Prepare Mock to expect session_update_controller_multicast_list.
    pub fn expect_session_update_controller_multicast_list(
        &mut self,
        expected_session_id: SessionId,
        expected_action: UpdateMulticastListAction,
        expected_controlees: Controlees,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(
            ExpectedCall::SessionUpdateControllerMulticastList {
                expected_session_id,
                expected_action,
                expected_controlees,
                notfs,
                out,
            },
        );
    }

    /// Prepare Mock to expect send_data_packet.
    pub fn expect_send_data_packet(
        &mut self,
        expected_session_id: SessionId,
        expected_dest_mac_address: [u8; EXTENDED_ADDRESS_LEN],
        expected_uci_sequence_number: u16,
        expected_data: Vec<u8>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::SendDataPacket {
            expected_session_id,
            expected_dest_mac_address,
            expected_uci_sequence_number,
            expected_data,
            out,
        });
    }

    /// Prepare Mock to expect session_data_transfer_phase_config.
    pub fn expect_session_data_transfer_phase_config(
        &mut self,
        expected_session_id: SessionId,
        expected_dtpcm_repetition: u8,
        expected_data_transfer_control: u8,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(
            ExpectedCall::SessionDataTransferPhaseConfig {
                expected_session_id,
                expected_dtpcm_repetition,
                expected_data_transfer_control,
                notfs,
                out,
            },
        );
    }

    /// Prepare Mock to expect session_update_dt_tag_ranging_rounds.
    pub fn expect_session_update_dt_tag_ranging_rounds(
        &mut self,
        expected_session_id: SessionId,
        expected_ranging_round_indexes: Vec<u8>,
        out: Result<SessionUpdateDtTagRangingRoundsResponse>,
    ) {
        self.expected_calls.lock().unwrap().push_back(
            ExpectedCall::SessionUpdateDtTagRangingRounds {
                expected_session_id,
                expected_ranging_round_indexes,
                out,
            },
        );
    }

    /// Prepare Mock to expect session_set_hybrid_controller_config.
    pub fn expect_session_set_hybrid_controller_config(
        &mut self,
        expected_session_id: SessionId,
        expected_number_of_phases: u8,
        expected_phase_list: Vec<u8>,
        out: Result<()>,
    ) {
        self.expected_calls.lock().unwrap().push_back(
            ExpectedCall::SessionSetHybridControllerConfig {
                expected_session_id,
                expected_number_of_phases,
                expected_phase_list,
                out,
            },
        );
    }

    /// Prepare Mock to expect session_query_max_data_size.
    pub fn expect_session_query_max_data_size(
        &mut self,
        expected_session_id: SessionId,
        out: Result<u16>,
    ) {
        self.expected_calls
            .lock()
            .unwrap()
            .push_back(ExpectedCall::SessionQueryMaxDataSize { expected_session_id, out });
    }

    /// Prepare Mock to expect get_session_token_from_session_id.
    pub fn expect_get_session_token_from_session_id(
        &mut self,
        expected_session_id: SessionId,
        out: Result<SessionToken>,
    ) {
        self.expected_calls
            .lock()
            .unwrap()
            .push_back(ExpectedCall::GetSessionToken { expected_session_id, out });
    }

    /// Prepare Mock to expect core_query_uwb_timestamp.
    pub fn expect_core_query_uwb_timestamp(&mut self, out: Result<u64>) {
        self.expected_calls.lock().unwrap().push_back(ExpectedCall::CoreQueryUwbTimestamp { out });
    }

    fn send_notifications(&self, notfs: Vec<UciSessionNotification>) {
        let sender = self.notf_sender.lock().unwrap();
        if let Some(sender) = sender.as_ref() {
            for notf in notfs.into_iter() {
                let _ = sender.send(notf);
            }
        }
    }

    fn pop_and_consume<T>(
        &self,
        matcher: impl FnOnce(&ExpectedCall) -> bool,
        extract: impl FnOnce(ExpectedCall) -> (Vec<UciSessionNotification>, Result<T>),
    ) -> Result<T> {
        let call = {
            let mut expected_calls = self.expected_calls.lock().unwrap();
            match expected_calls.pop_front() {
                Some(call) if matcher(&call) => call,
                Some(call) => {
                    expected_calls.push_front(call);
                    return Err(Error::MockUndefined);
                }
                None => return Err(Error::MockUndefined),
            }
        };
        self.expect_call_consumed.notify_one();
        let (notfs, out) = extract(call);
        self.send_notifications(notfs);
        out
    }
}

#[async_trait]
impl UciManager for MockUciManager {
    async fn session_init(
        &self,
        session_id: SessionId,
        session_type: SessionType,
        _chip_id: &str,
    ) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionInit {
                    expected_session_id, expected_session_type, ..
                } if *expected_session_id == session_id && *expected_session_type == session_type)
            },
            |call| match call {
                ExpectedCall::SessionInit { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_deinit(&self, session_id: SessionId, _chip_id: &str) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionDeinit {
                    expected_session_id, ..
                } if *expected_session_id == session_id)
            },
            |call| match call {
                ExpectedCall::SessionDeinit { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_set_app_config(
        &self,
        session_id: SessionId,
        config_tlvs: Vec<AppConfigTlv>,
        _chip_id: &str,
        _protocol_version: UciProtocolVersion,
    ) -> Result<SetAppConfigResponse> {
        self.pop_and_consume(
            |call| match call {
                ExpectedCall::SessionSetAppConfig {
                    expected_session_id, expected_config_tlvs, ..
                } => {
                    *expected_session_id == session_id
                        && app_config_tlvs_eq(expected_config_tlvs, &config_tlvs)
                }
                ExpectedCall::SessionSetAppConfigAnyTlvs { expected_session_id, .. } => {
                    *expected_session_id == session_id
                }
                _ => false,
            },
            |call| match call {
                ExpectedCall::SessionSetAppConfig { notfs, out, .. } => (notfs, out),
                ExpectedCall::SessionSetAppConfigAnyTlvs { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_get_app_config(
        &self,
        session_id: SessionId,
        app_cfg: Vec<AppConfigTlvType>,
        _chip_id: &str,
    ) -> Result<Vec<AppConfigTlv>> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionGetAppConfig {
                    expected_session_id, expected_config_ids, ..
                } if *expected_session_id == session_id && *expected_config_ids == app_cfg)
            },
            |call| match call {
                ExpectedCall::SessionGetAppConfig { out, .. } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }

    async fn android_set_radar_config(
        &self,
        session_id: SessionId,
        config_tlvs: Vec<RadarConfigTlv>,
        _chip_id: &str,
    ) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::AndroidSetRadarConfig {
                    expected_session_id, expected_config_tlvs, ..
                } if *expected_session_id == session_id
                    && radar_config_tlvs_eq(expected_config_tlvs, &config_tlvs))
            },
            |call| match call {
                ExpectedCall::AndroidSetRadarConfig { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn range_start(&self, session_id: SessionId, _chip_id: &str) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::RangeStart {
                    expected_session_id, ..
                } if *expected_session_id == session_id)
            },
            |call| match call {
                ExpectedCall::RangeStart { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn range_stop(&self, session_id: SessionId, _chip_id: &str) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::RangeStop {
                    expected_session_id, ..
                } if *expected_session_id == session_id)
            },
            |call| match call {
                ExpectedCall::RangeStop { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_update_controller_multicast_list(
        &self,
        session_id: SessionId,
        action: UpdateMulticastListAction,
        controlees: Controlees,
        _chip_id: &str,
    ) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionUpdateControllerMulticastList {
                    expected_session_id, expected_action, expected_controlees, ..
                } if *expected_session_id == session_id
                    && *expected_action == action
                    && *expected_controlees == controlees)
            },
            |call| match call {
                ExpectedCall::SessionUpdateControllerMulticastList { notfs, out, .. } => {
                    (notfs, out)
                }
                _ => unreachable!(),
            },
        )
    }

    async fn send_data_packet(
        &self,
        session_id: SessionId,
        dest_mac_address: [u8; EXTENDED_ADDRESS_LEN],
        uci_sequence_number: u16,
        data: Vec<u8>,
        _chip_id: &str,
    ) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SendDataPacket {
                    expected_session_id,
                    expected_dest_mac_address,
                    expected_uci_sequence_number,
                    expected_data,
                    ..
                } if *expected_session_id == session_id
                    && *expected_dest_mac_address == dest_mac_address
                    && *expected_uci_sequence_number == uci_sequence_number
                    && *expected_data == data)
            },
            |call| match call {
                ExpectedCall::SendDataPacket { out, .. } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_data_transfer_phase_config(
        &self,
        session_id: SessionId,
        dtpcm_repetition: u8,
        data_transfer_control: u8,
        _dtpml_size: u8,
        _mac_address: Vec<u8>,
        _slot_bitmap: Vec<u8>,
        _chip_id: &str,
    ) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionDataTransferPhaseConfig {
                    expected_session_id,
                    expected_dtpcm_repetition,
                    expected_data_transfer_control,
                    ..
                } if *expected_session_id == session_id
                    && *expected_dtpcm_repetition == dtpcm_repetition
                    && *expected_data_transfer_control == data_transfer_control)
            },
            |call| match call {
                ExpectedCall::SessionDataTransferPhaseConfig { notfs, out, .. } => (notfs, out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_update_dt_tag_ranging_rounds(
        &self,
        session_id: SessionId,
        ranging_round_indexes: Vec<u8>,
        _chip_id: &str,
    ) -> Result<SessionUpdateDtTagRangingRoundsResponse> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionUpdateDtTagRangingRounds {
                    expected_session_id, expected_ranging_round_indexes, ..
                } if *expected_session_id == session_id
                    && *expected_ranging_round_indexes == ranging_round_indexes)
            },
            |call| match call {
                ExpectedCall::SessionUpdateDtTagRangingRounds { out, .. } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_set_hybrid_controller_config(
        &self,
        session_id: SessionId,
        number_of_phases: u8,
        _update_time: [u8; 8],
        phase_list: Vec<u8>,
        _chip_id: &str,
    ) -> Result<()> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionSetHybridControllerConfig {
                    expected_session_id, expected_number_of_phases, expected_phase_list, ..
                } if *expected_session_id == session_id
                    && *expected_number_of_phases == number_of_phases
                    && *expected_phase_list == phase_list)
            },
            |call| match call {
                ExpectedCall::SessionSetHybridControllerConfig { out, .. } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }

    async fn session_query_max_data_size(
        &self,
        session_id: SessionId,
        _chip_id: &str,
    ) -> Result<u16> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::SessionQueryMaxDataSize {
                    expected_session_id, ..
                } if *expected_session_id == session_id)
            },
            |call| match call {
                ExpectedCall::SessionQueryMaxDataSize { out, .. } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }

    async fn get_session_token_from_session_id(
        &self,
        session_id: SessionId,
        _chip_id: &str,
    ) -> Result<SessionToken> {
        self.pop_and_consume(
            |call| {
                matches!(call, ExpectedCall::GetSessionToken {
                    expected_session_id, ..
                } if *expected_session_id == session_id)
            },
            |call| match call {
                ExpectedCall::GetSessionToken { out, .. } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }

    async fn core_query_uwb_timestamp(&self, _chip_id: &str) -> Result<u64> {
        self.pop_and_consume(
            |call| matches!(call, ExpectedCall::CoreQueryUwbTimestamp { .. }),
            |call| match call {
                ExpectedCall::CoreQueryUwbTimestamp { out } => (vec![], out),
                _ => unreachable!(),
            },
        )
    }
}

enum ExpectedCall {
    SessionInit {
        expected_session_id: SessionId,
        expected_session_type: SessionType,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    SessionDeinit {
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    SessionSetAppConfig {
        expected_session_id: SessionId,
        expected_config_tlvs: Vec<AppConfigTlv>,
        notfs: Vec<UciSessionNotification>,
        out: Result<SetAppConfigResponse>,
    },
    SessionSetAppConfigAnyTlvs {
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<SetAppConfigResponse>,
    },
    SessionGetAppConfig {
        expected_session_id: SessionId,
        expected_config_ids: Vec<AppConfigTlvType>,
        out: Result<Vec<AppConfigTlv>>,
    },
    AndroidSetRadarConfig {
        expected_session_id: SessionId,
        expected_config_tlvs: Vec<RadarConfigTlv>,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    RangeStart {
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    RangeStop {
        expected_session_id: SessionId,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    SessionUpdateControllerMulticastList {
        expected_session_id: SessionId,
        expected_action: UpdateMulticastListAction,
        expected_controlees: Controlees,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    SendDataPacket {
        expected_session_id: SessionId,
        expected_dest_mac_address: [u8; EXTENDED_ADDRESS_LEN],
        expected_uci_sequence_number: u16,
        expected_data: Vec<u8>,
        out: Result<()>,
    },
    SessionDataTransferPhaseConfig {
        expected_session_id: SessionId,
        expected_dtpcm_repetition: u8,
        expected_data_transfer_control: u8,
        notfs: Vec<UciSessionNotification>,
        out: Result<()>,
    },
    SessionUpdateDtTagRangingRounds {
        expected_session_id: SessionId,
        expected_ranging_round_indexes: Vec<u8>,
        out: Result<SessionUpdateDtTagRangingRoundsResponse>,
    },
    SessionSetHybridControllerConfig {
        expected_session_id: SessionId,
        expected_number_of_phases: u8,
        expected_phase_list: Vec<u8>,
        out: Result<()>,
    },
    SessionQueryMaxDataSize {
        expected_session_id: SessionId,
        out: Result<u16>,
    },
    GetSessionToken {
        expected_session_id: SessionId,
        out: Result<SessionToken>,
    },
    CoreQueryUwbTimestamp {
        out: Result<u64>,
    },
}
