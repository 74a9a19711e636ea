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

//! The down-interface to the UCI transport.
//!
//! An implementation wraps the per-chip UCI command path and is expected to be
//! cheap to clone (a handle onto an actor, in practice). Every command is
//! synchronous-fallible: the returned status reflects the UCI response, while
//! session state changes and data arrive later as
//! [`UciSessionNotification`](crate::uci::notification::UciSessionNotification)s
//! on the channel handed to the session manager.

use async_trait::async_trait;

use crate::error::Result;
use crate::params::uci_packets::{
    AppConfigTlv, AppConfigTlvType, Controlees, RadarConfigTlv, SessionId, SessionToken,
    SessionType, SessionUpdateDtTagRangingRoundsResponse, SetAppConfigResponse,
    UciProtocolVersion, UpdateMulticastListAction, EXTENDED_ADDRESS_LEN,
};

#[async_trait]
pub trait UciManager: 'static + Send + Sync + Clone {
    /// Create the session on the UWBS. A SESSION_STATUS_NTF with the Init
    /// state follows on success.
    async fn session_init(
        &self,
        session_id: SessionId,
        session_type: SessionType,
        chip_id: &str,
    ) -> Result<()>;

    /// Destroy the session on the UWBS.
    async fn session_deinit(&self, session_id: SessionId, chip_id: &str) -> Result<()>;

    /// Apply the application configuration TLVs to the session.
    async fn session_set_app_config(
        &self,
        session_id: SessionId,
        config_tlvs: Vec<AppConfigTlv>,
        chip_id: &str,
        protocol_version: UciProtocolVersion,
    ) -> Result<SetAppConfigResponse>;

    /// Fetch application configuration TLVs from the session. An empty
    /// |app_cfg| requests the full protocol-specific set.
    async fn session_get_app_config(
        &self,
        session_id: SessionId,
        app_cfg: Vec<AppConfigTlvType>,
        chip_id: &str,
    ) -> Result<Vec<AppConfigTlv>>;

    /// Apply the radar configuration TLVs to a radar session.
    async fn android_set_radar_config(
        &self,
        session_id: SessionId,
        config_tlvs: Vec<RadarConfigTlv>,
        chip_id: &str,
    ) -> Result<()>;

    /// Start ranging of the session.
    async fn range_start(&self, session_id: SessionId, chip_id: &str) -> Result<()>;

    /// Stop ranging of the session.
    async fn range_stop(&self, session_id: SessionId, chip_id: &str) -> Result<()>;

    /// Update the controlee list of a controller session. The per-controlee
    /// outcome follows as a multicast list update notification.
    async fn session_update_controller_multicast_list(
        &self,
        session_id: SessionId,
        action: UpdateMulticastListAction,
        controlees: Controlees,
        chip_id: &str,
    ) -> Result<()>;

    /// Send an application data payload to a remote peer. The peer address is
    /// always the extended form on the data path.
    async fn send_data_packet(
        &self,
        session_id: SessionId,
        dest_mac_address: [u8; EXTENDED_ADDRESS_LEN],
        uci_sequence_number: u16,
        data: Vec<u8>,
        chip_id: &str,
    ) -> Result<()>;

    /// Configure the data transfer phase of an in-band data session.
    #[allow(clippy::too_many_arguments)]
    async fn session_data_transfer_phase_config(
        &self,
        session_id: SessionId,
        dtpcm_repetition: u8,
        data_transfer_control: u8,
        dtpml_size: u8,
        mac_address: Vec<u8>,
        slot_bitmap: Vec<u8>,
        chip_id: &str,
    ) -> Result<()>;

    /// Update the active ranging rounds of a DT-Tag session. The response
    /// lists the rounds that could not be activated.
    async fn session_update_dt_tag_ranging_rounds(
        &self,
        session_id: SessionId,
        ranging_round_indexes: Vec<u8>,
        chip_id: &str,
    ) -> Result<SessionUpdateDtTagRangingRoundsResponse>;

    /// Configure the phase list of a hybrid session controller. |phase_list|
    /// carries the serialized little-endian phase elements.
    async fn session_set_hybrid_controller_config(
        &self,
        session_id: SessionId,
        number_of_phases: u8,
        update_time: [u8; 8],
        phase_list: Vec<u8>,
        chip_id: &str,
    ) -> Result<()>;

    /// Query the maximum application data size the session can send in one
    /// packet.
    async fn session_query_max_data_size(
        &self,
        session_id: SessionId,
        chip_id: &str,
    ) -> Result<u16>;

    /// Fetch the controller-assigned token for the session. On UWBS versions
    /// that do not mint tokens this returns the session id itself.
    async fn get_session_token_from_session_id(
        &self,
        session_id: SessionId,
        chip_id: &str,
    ) -> Result<SessionToken>;

    /// Query the UWBS clock, in microseconds.
    async fn core_query_uwb_timestamp(&self, chip_id: &str) -> Result<u64>;
}
