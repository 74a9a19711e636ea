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

//! The per-session state: lifecycle, wait latch, buffered data, timers and
//! priority.
//!
//! A session is shared between the event loop (which runs the command
//! handlers) and the notification router. The router is the only writer
//! outside the loop; it mutates the session under the inner lock and then
//! bumps the wait latch so a blocked command handler re-reads the state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::params::aliro_app_config_params::AliroStartRangingParams;
use crate::params::app_config_params::{AppConfigParams, Protocol};
use crate::params::ccc_app_config_params::CccStartRangingParams;
use crate::params::fira_app_config_params::{
    DeviceRole, DeviceType, FiraRangingReconfigureParams, FilterType, RangeDataNtfConfig,
    RangingRoundUsage, StsConfig, DEFAULT_SESSION_PRIORITY,
};
use crate::params::uci_packets::{
    ChipId, ControleeStatusList, ReasonCode, SessionHandle, SessionId, SessionState, SessionType,
    UwbAddress,
};
use crate::session::policy::{AttributionSource, PolicyOracle};

/// The session priority bands, from highest to lowest: ALIRO/CCC, system
/// apps, foreground apps, background apps. The default value sits between the
/// foreground and background bands so explicit overrides are detectable.
pub(crate) const ALIRO_SESSION_PRIORITY: u8 = 80;
pub(crate) const CCC_SESSION_PRIORITY: u8 = 80;
pub(crate) const SYSTEM_APP_SESSION_PRIORITY: u8 = 70;
pub(crate) const FG_SESSION_PRIORITY: u8 = 60;
pub(crate) const BG_SESSION_PRIORITY: u8 = 40;

/// A zero streak timeout disables the ranging-error supervision.
pub(crate) const RANGING_RESULT_ERROR_NO_TIMEOUT: u64 = 0;

/// The last operation requested on a session; the router consults it when an
/// ambiguous notification arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperationType {
    InitSession,
    Start,
    Stop,
    Reconfigure,
    Deinit,
    OnDeinit,
    SendData,
    UpdateDtTagRounds,
    DataTransferPhaseConfig,
}

/// A controlee confirmed by the UWBS for a controller session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UwbControlee {
    pub address: UwbAddress,
}

/// One application payload received from a remote peer, buffered until its
/// release condition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReceivedDataInfo {
    pub sequence_number: u16,
    pub address: u64,
    pub payload: Vec<u8>,
}

/// The bookkeeping for one outbound payload, kept until the UWBS reports a
/// terminal transfer status for its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SendDataInfo {
    pub address: UwbAddress,
    pub payload: Vec<u8>,
}

/// The confirmed outcome of a multicast list update command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MulticastListUpdateStatus {
    pub remaining_multicast_list_size: usize,
    pub status_list: ControleeStatusList,
}

pub(crate) struct UwbSession {
    session_handle: SessionHandle,
    session_id: SessionId,
    session_type: SessionType,
    protocol: Protocol,
    chip_id: ChipId,
    attribution_source: AttributionSource,
    // The first non-privileged link of the attribution chain, resolved once
    // at creation.
    non_privileged_link: Option<AttributionSource>,
    // The wait latch: an epoch counter bumped by the router after every
    // session mutation. Command handlers subscribe before issuing a command
    // and wait for a bump with a deadline.
    latch_sender: watch::Sender<u64>,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: SessionState,
    last_reason_code: ReasonCode,
    params: AppConfigParams,
    operation: OperationType,
    stack_priority: u8,
    priority_override: bool,
    has_non_privileged_fg_app: bool,
    needs_app_config_update: bool,
    needs_uwbs_timestamp_query: bool,
    data_delivery_permission_check_needed: bool,
    acquired_default_pose: bool,
    controlees: Vec<UwbControlee>,
    // peer address -> (sequence number -> payload), kept sorted so release
    // happens in sequence order.
    rx_data: HashMap<u64, BTreeMap<u16, ReceivedDataInfo>>,
    tx_sequence_number: u16,
    send_data_map: HashMap<u16, SendDataInfo>,
    multicast_list_update_status: Option<MulticastListUpdateStatus>,
    ranging_error_streak_timer: Option<JoinHandle<()>>,
    bg_app_timer: Option<JoinHandle<()>>,
}

impl UwbSession {
    pub fn new(
        session_handle: SessionHandle,
        session_id: SessionId,
        session_type: SessionType,
        chip_id: ChipId,
        attribution_source: AttributionSource,
        params: AppConfigParams,
        policy: &dyn PolicyOracle,
    ) -> Self {
        let protocol = params.protocol();
        let non_privileged_link =
            policy.first_non_privileged(&attribution_source).cloned();

        let mut stack_priority =
            calculate_session_priority(protocol, non_privileged_link.as_ref(), policy);
        let mut priority_override = false;
        let mut acquired_default_pose = false;
        let mut controlees = Vec::new();
        let params = match params {
            AppConfigParams::Fira(fira_params) => {
                acquired_default_pose = *fira_params.filter_type() == FilterType::DefaultFilter;
                controlees = fira_params
                    .dst_mac_address()
                    .iter()
                    .map(|address| UwbControlee { address: *address })
                    .collect();

                // A non-default priority in the open params is an explicit
                // override and freezes the priority for the session's
                // lifetime.
                if *fira_params.session_priority() != DEFAULT_SESSION_PRIORITY {
                    priority_override = true;
                    stack_priority = *fira_params.session_priority();
                    AppConfigParams::Fira(fira_params)
                } else {
                    AppConfigParams::Fira(fira_params.with_session_priority(stack_priority))
                }
            }
            other => other,
        };

        let inner = SessionInner {
            state: SessionState::Deinit,
            last_reason_code: ReasonCode::StateChangeWithSessionManagementCommands,
            params,
            operation: OperationType::InitSession,
            stack_priority,
            priority_override,
            has_non_privileged_fg_app: false,
            needs_app_config_update: false,
            needs_uwbs_timestamp_query: false,
            data_delivery_permission_check_needed: true,
            acquired_default_pose,
            controlees,
            rx_data: HashMap::new(),
            tx_sequence_number: 0,
            send_data_map: HashMap::new(),
            multicast_list_update_status: None,
            ranging_error_streak_timer: None,
            bg_app_timer: None,
        };

        Self {
            session_handle,
            session_id,
            session_type,
            protocol,
            chip_id,
            attribution_source,
            non_privileged_link,
            latch_sender: watch::channel(0).0,
            inner: Mutex::new(inner),
        }
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session_handle
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn chip_id(&self) -> &str {
        &self.chip_id
    }

    pub fn attribution_source(&self) -> &AttributionSource {
        &self.attribution_source
    }

    pub fn non_privileged_link(&self) -> Option<&AttributionSource> {
        self.non_privileged_link.as_ref()
    }

    pub fn has_non_privileged_app(&self) -> bool {
        self.non_privileged_link.is_some()
    }

    // ---------- Wait latch ----------

    /// Subscribe to the wait latch. The subscription must be taken before
    /// issuing the UCI command so a notification arriving right after the
    /// command response is not lost.
    pub fn subscribe_latch(&self) -> watch::Receiver<u64> {
        self.latch_sender.subscribe()
    }

    /// Wake every handler blocked on the latch.
    pub fn notify_latch(&self) {
        self.latch_sender.send_modify(|epoch| *epoch += 1);
    }

    /// Block until the router bumps the latch, or the deadline passes.
    pub async fn wait_latch(
        &self,
        latch: &mut watch::Receiver<u64>,
        deadline: Duration,
    ) -> Result<()> {
        timeout(deadline, latch.changed())
            .await
            .map_err(|_| {
                warn!("Session {}: timed out waiting for a notification", self.session_id);
                Error::Timeout
            })?
            .map_err(|_| {
                debug!("Session {} is about to drop.", self.session_id);
                Error::TokioFailure
            })
    }

    // ---------- Lifecycle state ----------

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    pub fn set_state(&self, state: SessionState, reason_code: ReasonCode) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = state;
        inner.last_reason_code = reason_code;
    }

    pub fn last_reason_code(&self) -> ReasonCode {
        self.inner.lock().unwrap().last_reason_code
    }

    pub fn operation(&self) -> OperationType {
        self.inner.lock().unwrap().operation
    }

    pub fn set_operation(&self, operation: OperationType) {
        self.inner.lock().unwrap().operation = operation;
    }

    // ---------- Params ----------

    pub fn params(&self) -> AppConfigParams {
        self.inner.lock().unwrap().params.clone()
    }

    pub fn needs_app_config_update(&self) -> bool {
        self.inner.lock().unwrap().needs_app_config_update
    }

    pub fn reset_needs_app_config_update(&self) {
        self.inner.lock().unwrap().needs_app_config_update = false;
    }

    pub fn needs_uwbs_timestamp_query(&self) -> bool {
        self.inner.lock().unwrap().needs_uwbs_timestamp_query
    }

    /// Merge the start-ranging overrides into the stored params and mark the
    /// app config for re-application before the next start.
    pub fn update_ccc_params_on_start(&self, start_params: &CccStartRangingParams) {
        let mut inner = self.inner.lock().unwrap();
        let updated = match &inner.params {
            AppConfigParams::Ccc(ccc_params) => {
                Some(AppConfigParams::Ccc(ccc_params.with_start_ranging_params(start_params)))
            }
            _ => None,
        };
        if let Some(params) = updated {
            inner.params = params;
            inner.needs_app_config_update = true;
        }
    }

    /// Merge the start-ranging overrides into the stored params and mark the
    /// app config for re-application before the next start.
    pub fn update_aliro_params_on_start(&self, start_params: &AliroStartRangingParams) {
        let mut inner = self.inner.lock().unwrap();
        let updated = match &inner.params {
            AppConfigParams::Aliro(aliro_params) => {
                Some(AppConfigParams::Aliro(aliro_params.with_start_ranging_params(start_params)))
            }
            _ => None,
        };
        if let Some(params) = updated {
            inner.params = params;
            inner.needs_app_config_update = true;
        }
    }

    /// Re-sync the SESSION_PRIORITY param with the stack priority; the value
    /// handed to the UWBS can only change across a stop/start cycle.
    pub fn update_fira_params_on_start_if_changed(&self) {
        let mut inner = self.inner.lock().unwrap();
        let updated = match &inner.params {
            AppConfigParams::Fira(fira_params)
                if *fira_params.session_priority() != inner.stack_priority =>
            {
                Some(AppConfigParams::Fira(
                    fira_params.with_session_priority(inner.stack_priority),
                ))
            }
            _ => None,
        };
        if let Some(params) = updated {
            inner.params = params;
            inner.needs_app_config_update = true;
        }
    }

    /// Merge a reconfigure request into the stored params.
    pub fn update_fira_params_on_reconfigure(&self, reconfigure: &FiraRangingReconfigureParams) {
        let mut inner = self.inner.lock().unwrap();
        let updated = match &inner.params {
            AppConfigParams::Fira(fira_params) => {
                Some(AppConfigParams::Fira(fira_params.with_reconfigure_params(reconfigure)))
            }
            _ => None,
        };
        if let Some(params) = updated {
            inner.params = params;
        }
    }

    /// Decide whether the UWBS clock has to be read to turn the configured
    /// relative initiation time into an absolute one. Required for UCI >= 2.0
    /// when only the relative time is set.
    pub fn set_needs_uwbs_timestamp_query(&self, uci_major_version: u8, policy: &dyn PolicyOracle) {
        let mut inner = self.inner.lock().unwrap();
        if uci_major_version < 2 {
            return;
        }
        inner.needs_uwbs_timestamp_query = match &inner.params {
            AppConfigParams::Fira(params) => {
                *params.uwb_initiation_time_ms() != 0
                    && *params.absolute_uwb_initiation_time_us() == 0
            }
            AppConfigParams::Ccc(params) => {
                policy.is_absolute_initiation_time_enabled()
                    && *params.initiation_time_ms() != 0
                    && *params.absolute_initiation_time_us() == 0
            }
            AppConfigParams::Aliro(params) => {
                policy.is_absolute_initiation_time_enabled()
                    && *params.initiation_time_ms() != 0
                    && *params.absolute_initiation_time_us() == 0
            }
            AppConfigParams::Radar(_) => false,
        };
    }

    /// Fold the UWBS timestamp into an absolute initiation time:
    /// `absolute_us = timestamp_us + relative_ms * 1000`.
    pub fn compute_absolute_initiation_time(&self, uwbs_timestamp_us: u64) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.needs_uwbs_timestamp_query {
            return;
        }
        let updated = match &inner.params {
            AppConfigParams::Fira(params) => AppConfigParams::Fira(
                params.with_absolute_initiation_time(
                    uwbs_timestamp_us + params.uwb_initiation_time_ms() * 1000,
                ),
            ),
            AppConfigParams::Ccc(params) => AppConfigParams::Ccc(
                params.with_absolute_initiation_time(
                    uwbs_timestamp_us + params.initiation_time_ms() * 1000,
                ),
            ),
            AppConfigParams::Aliro(params) => AppConfigParams::Aliro(
                params.with_absolute_initiation_time(
                    uwbs_timestamp_us + params.initiation_time_ms() * 1000,
                ),
            ),
            other => other.clone(),
        };
        inner.params = updated;
        inner.needs_app_config_update = true;
    }

    /// Reset the computed absolute initiation time so a future start
    /// re-computes it. A value provided by the application is left alone.
    pub fn reset_absolute_initiation_time(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.needs_uwbs_timestamp_query {
            return;
        }
        let updated = match &inner.params {
            AppConfigParams::Fira(params) => {
                AppConfigParams::Fira(params.with_absolute_initiation_time(0))
            }
            AppConfigParams::Ccc(params) => {
                AppConfigParams::Ccc(params.with_absolute_initiation_time(0))
            }
            AppConfigParams::Aliro(params) => {
                AppConfigParams::Aliro(params.with_absolute_initiation_time(0))
            }
            other => other.clone(),
        };
        inner.params = updated;
        inner.needs_uwbs_timestamp_query = false;
    }

    /// The time between ranging rounds, accounting for block striding. Only
    /// meaningful for FiRa sessions.
    pub fn current_fira_ranging_interval_ms(&self) -> Option<u32> {
        match &self.inner.lock().unwrap().params {
            AppConfigParams::Fira(params) => Some(params.current_ranging_interval_ms()),
            _ => None,
        }
    }

    pub fn ranging_error_streak_timeout_ms(&self) -> u64 {
        match &self.inner.lock().unwrap().params {
            AppConfigParams::Fira(params) => *params.ranging_error_streak_timeout_ms(),
            _ => RANGING_RESULT_ERROR_NO_TIMEOUT,
        }
    }

    pub fn is_controller(&self) -> bool {
        matches!(
            &self.inner.lock().unwrap().params,
            AppConfigParams::Fira(params) if *params.device_type() == DeviceType::Controller
        )
    }

    /// True for a one-way-ranging observer session, i.e. the only session
    /// kind whose received payloads are buffered behind the pointing check.
    pub fn is_owr_aoa_observer(&self) -> bool {
        matches!(
            &self.inner.lock().unwrap().params,
            AppConfigParams::Fira(params)
                if *params.ranging_round_usage() == RangingRoundUsage::OwrAoaMeasurement
                    && *params.device_role() == DeviceRole::Observer
        )
    }

    pub fn sts_config(&self) -> Option<StsConfig> {
        match &self.inner.lock().unwrap().params {
            AppConfigParams::Fira(params) => Some(*params.sts_config()),
            _ => None,
        }
    }

    pub fn has_session_key(&self) -> bool {
        matches!(
            &self.inner.lock().unwrap().params,
            AppConfigParams::Fira(params) if params.session_key().is_some()
        )
    }

    pub fn data_repetition_count(&self) -> u8 {
        match &self.inner.lock().unwrap().params {
            AppConfigParams::Fira(params) => *params.data_repetition_count(),
            _ => 0,
        }
    }

    /// The live notification-control override applied on fg/bg transitions.
    /// The stored params are not touched; the reconfigure carries either the
    /// configured bounds (foreground) or Disable (background).
    pub fn fg_state_reconfigure_params(&self) -> Option<FiraRangingReconfigureParams> {
        let inner = self.inner.lock().unwrap();
        let AppConfigParams::Fira(params) = &inner.params else {
            return None;
        };
        let reconfigure = if inner.has_non_privileged_fg_app {
            FiraRangingReconfigureParams {
                range_data_ntf_config: Some(*params.range_data_ntf_config()),
                range_data_proximity_near_cm: Some(*params.range_data_ntf_proximity_near_cm()),
                range_data_proximity_far_cm: Some(*params.range_data_ntf_proximity_far_cm()),
                ..Default::default()
            }
        } else {
            FiraRangingReconfigureParams {
                range_data_ntf_config: Some(RangeDataNtfConfig::Disable),
                ..Default::default()
            }
        };
        Some(reconfigure)
    }

    // ---------- Priority ----------

    pub fn stack_priority(&self) -> u8 {
        self.inner.lock().unwrap().stack_priority
    }

    pub fn priority_override(&self) -> bool {
        self.inner.lock().unwrap().priority_override
    }

    /// Re-derive the priority band after a fg/bg transition. No-op when the
    /// caller locked the priority at open time.
    pub fn recalculate_stack_priority(&self, policy: &dyn PolicyOracle) {
        let mut inner = self.inner.lock().unwrap();
        if inner.priority_override {
            return;
        }
        inner.stack_priority =
            calculate_session_priority(self.protocol, self.non_privileged_link.as_ref(), policy);
    }

    pub fn has_non_privileged_fg_app(&self) -> bool {
        self.inner.lock().unwrap().has_non_privileged_fg_app
    }

    pub fn set_has_non_privileged_fg_app(&self, foreground: bool) {
        self.inner.lock().unwrap().has_non_privileged_fg_app = foreground;
    }

    // ---------- Permission flags ----------

    pub fn data_delivery_permission_check_needed(&self) -> bool {
        self.inner.lock().unwrap().data_delivery_permission_check_needed
    }

    pub fn acquired_default_pose(&self) -> bool {
        self.inner.lock().unwrap().acquired_default_pose
    }

    pub fn release_default_pose(&self) {
        self.inner.lock().unwrap().acquired_default_pose = false;
    }

    // ---------- Controlee list ----------

    pub fn controlees(&self) -> Vec<UwbControlee> {
        self.inner.lock().unwrap().controlees.clone()
    }

    /// Record a controlee confirmed by the UWBS. Only called to mirror the
    /// confirmed multicast state.
    pub fn add_controlee(&self, address: UwbAddress) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.controlees.iter().any(|controlee| controlee.address == address) {
            inner.controlees.push(UwbControlee { address });
        }
    }

    /// Drop a controlee confirmed removed by the UWBS.
    pub fn remove_controlee(&self, address: UwbAddress) {
        let mut inner = self.inner.lock().unwrap();
        inner.controlees.retain(|controlee| controlee.address != address);
    }

    // ---------- Multicast update status ----------

    pub fn set_multicast_list_update_status(&self, status: MulticastListUpdateStatus) {
        self.inner.lock().unwrap().multicast_list_update_status = Some(status);
    }

    pub fn take_multicast_list_update_status(&self) -> Option<MulticastListUpdateStatus> {
        self.inner.lock().unwrap().multicast_list_update_status.take()
    }

    // ---------- Received data buffering ----------

    /// Buffer a received payload for the peer. Duplicates (same sequence
    /// number) are dropped. When the peer's buffer is full, the smallest
    /// stored sequence number is evicted, and only when the incoming sequence
    /// number is strictly greater; the retained set is always the top-N
    /// highest sequence numbers seen so far.
    pub fn add_received_data(&self, info: ReceivedDataInfo, max_packets_to_store: usize) {
        let mut inner = self.inner.lock().unwrap();
        let peer_buffer = inner.rx_data.entry(info.address).or_default();
        if peer_buffer.len() < max_packets_to_store {
            peer_buffer.entry(info.sequence_number).or_insert(info);
        } else if let Some((&smallest, _)) = peer_buffer.iter().next() {
            if smallest < info.sequence_number
                && !peer_buffer.contains_key(&info.sequence_number)
            {
                peer_buffer.remove(&smallest);
                peer_buffer.insert(info.sequence_number, info);
            }
        }
    }

    /// Drain every buffered payload of the peer, in ascending sequence order.
    pub fn take_all_received_data(&self, address: u64) -> Vec<ReceivedDataInfo> {
        let mut inner = self.inner.lock().unwrap();
        match inner.rx_data.get_mut(&address) {
            Some(peer_buffer) => std::mem::take(peer_buffer).into_values().collect(),
            None => Vec::new(),
        }
    }

    /// The peers with buffered (or previously buffered) payloads.
    pub fn remote_mac_addresses(&self) -> Vec<u64> {
        self.inner.lock().unwrap().rx_data.keys().copied().collect()
    }

    #[cfg(test)]
    pub fn buffered_packet_count(&self, address: u64) -> usize {
        self.inner.lock().unwrap().rx_data.get(&address).map_or(0, |buffer| buffer.len())
    }

    // ---------- Outbound data tracking ----------

    /// Allocate the UCI sequence number for the next outbound payload.
    pub fn next_data_sequence_number(&self) -> u16 {
        let mut inner = self.inner.lock().unwrap();
        let sequence_number = inner.tx_sequence_number;
        inner.tx_sequence_number = inner.tx_sequence_number.wrapping_add(1);
        sequence_number
    }

    pub fn add_send_data_info(&self, sequence_number: u16, info: SendDataInfo) {
        self.inner.lock().unwrap().send_data_map.insert(sequence_number, info);
    }

    pub fn send_data_info(&self, sequence_number: u16) -> Option<SendDataInfo> {
        self.inner.lock().unwrap().send_data_map.get(&sequence_number).cloned()
    }

    pub fn remove_send_data_info(&self, sequence_number: u16) {
        self.inner.lock().unwrap().send_data_map.remove(&sequence_number);
    }

    // ---------- Timers ----------

    /// Arm the ranging-error streak timer, if not armed yet. |on_expired| is
    /// the single-shot action, typically an internal stop-ranging command.
    pub fn start_ranging_error_streak_timer_if_not_set<F>(&self, timeout_ms: u64, on_expired: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.ranging_error_streak_timer.is_none() {
            debug!(
                "Session {}: starting the ranging-error streak timer for {} ms",
                self.session_id, timeout_ms
            );
            inner.ranging_error_streak_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                on_expired();
            }));
        }
    }

    pub fn stop_ranging_error_streak_timer_if_set(&self) {
        if let Some(timer) = self.inner.lock().unwrap().ranging_error_streak_timer.take() {
            timer.abort();
        }
    }

    /// Arm the background-app timer, if not armed yet.
    pub fn start_bg_app_timer_if_not_set<F>(&self, timeout_ms: u64, on_expired: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.bg_app_timer.is_none() {
            debug!("Session {}: starting the background-app timer", self.session_id);
            inner.bg_app_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                on_expired();
            }));
        }
    }

    pub fn stop_bg_app_timer_if_set(&self) {
        if let Some(timer) = self.inner.lock().unwrap().bg_app_timer.take() {
            timer.abort();
        }
    }

    /// Cancel every session timer; called on stop and close.
    pub fn stop_timers(&self) {
        self.stop_ranging_error_streak_timer_if_set();
        self.stop_bg_app_timer_if_set();
    }
}

/// Derive the priority band of a session: ALIRO/CCC above any app, system
/// apps above foreground apps, background apps at the bottom.
pub(crate) fn calculate_session_priority(
    protocol: Protocol,
    non_privileged_link: Option<&AttributionSource>,
    policy: &dyn PolicyOracle,
) -> u8 {
    match protocol {
        Protocol::Aliro => ALIRO_SESSION_PRIORITY,
        Protocol::Ccc => CCC_SESSION_PRIORITY,
        _ => match non_privileged_link {
            None => SYSTEM_APP_SESSION_PRIORITY,
            Some(link) => {
                if policy.is_foreground_app_or_service(link.uid, &link.package_name) {
                    FG_SESSION_PRIORITY
                } else {
                    BG_SESSION_PRIORITY
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::params::fira_app_config_params::{
        FiraAppConfigParamsBuilder, MultiNodeMode,
    };
    use crate::session::policy::StaticPolicy;

    const HANDLE: SessionHandle = 1;
    const SESSION_ID: SessionId = 0x123;
    const PEER: u64 = 0xBEEF;

    fn fira_params(session_priority: u8) -> AppConfigParams {
        FiraAppConfigParamsBuilder::new()
            .device_type(DeviceType::Controller)
            .device_role(DeviceRole::Initiator)
            .multi_node_mode(MultiNodeMode::Unicast)
            .device_mac_address(UwbAddress::Short([1, 2]))
            .dst_mac_address(vec![UwbAddress::Short([3, 4])])
            .session_priority(session_priority)
            .build()
            .unwrap()
    }

    fn new_session(params: AppConfigParams, policy: &StaticPolicy) -> UwbSession {
        UwbSession::new(
            HANDLE,
            SESSION_ID,
            SessionType::FiraRangingSession,
            "default".to_string(),
            AttributionSource::new(10001, "com.example.app"),
            params,
            policy,
        )
    }

    fn received(sequence_number: u16) -> ReceivedDataInfo {
        ReceivedDataInfo { sequence_number, address: PEER, payload: vec![sequence_number as u8] }
    }

    #[test]
    fn test_rx_buffer_bound_and_eviction() {
        let policy = StaticPolicy::new();
        let session = new_session(fira_params(DEFAULT_SESSION_PRIORITY), &policy);

        for sequence_number in [5, 3, 4] {
            session.add_received_data(received(sequence_number), 3);
        }
        assert_eq!(session.buffered_packet_count(PEER), 3);

        // A duplicate is a no-op.
        session.add_received_data(received(4), 3);
        assert_eq!(session.buffered_packet_count(PEER), 3);

        // A smaller sequence number than everything stored is dropped.
        session.add_received_data(received(2), 3);
        let drained = session.take_all_received_data(PEER);
        assert_eq!(
            drained.iter().map(|info| info.sequence_number).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );

        // A larger sequence number evicts the smallest stored one.
        for sequence_number in [5, 3, 4] {
            session.add_received_data(received(sequence_number), 3);
        }
        session.add_received_data(received(9), 3);
        let drained = session.take_all_received_data(PEER);
        assert_eq!(
            drained.iter().map(|info| info.sequence_number).collect::<Vec<_>>(),
            vec![4, 5, 9]
        );
        assert_eq!(session.buffered_packet_count(PEER), 0);
    }

    #[test]
    fn test_tx_sequence_number_wraps() {
        let policy = StaticPolicy::new();
        let session = new_session(fira_params(DEFAULT_SESSION_PRIORITY), &policy);

        assert_eq!(session.next_data_sequence_number(), 0);
        assert_eq!(session.next_data_sequence_number(), 1);

        // Force the counter to the wrap point.
        for _ in 2..u16::MAX {
            session.next_data_sequence_number();
        }
        assert_eq!(session.next_data_sequence_number(), u16::MAX);
        assert_eq!(session.next_data_sequence_number(), 0);
    }

    #[test]
    fn test_priority_follows_fg_state() {
        let policy = StaticPolicy::new();
        policy.set_foreground(10001, true);
        let session = new_session(fira_params(DEFAULT_SESSION_PRIORITY), &policy);
        assert_eq!(session.stack_priority(), FG_SESSION_PRIORITY);
        assert!(!session.priority_override());

        policy.set_foreground(10001, false);
        session.recalculate_stack_priority(&policy);
        assert_eq!(session.stack_priority(), BG_SESSION_PRIORITY);
    }

    #[test]
    fn test_priority_override_is_frozen() {
        let policy = StaticPolicy::new();
        let session = new_session(fira_params(90), &policy);
        assert_eq!(session.stack_priority(), 90);
        assert!(session.priority_override());

        policy.set_foreground(10001, true);
        session.recalculate_stack_priority(&policy);
        assert_eq!(session.stack_priority(), 90);
    }

    #[test]
    fn test_default_priority_written_into_params() {
        let policy = StaticPolicy::new();
        policy.add_privileged_uid(10001);
        let session = new_session(fira_params(DEFAULT_SESSION_PRIORITY), &policy);

        assert_eq!(session.stack_priority(), SYSTEM_APP_SESSION_PRIORITY);
        match session.params() {
            AppConfigParams::Fira(params) => {
                assert_eq!(*params.session_priority(), SYSTEM_APP_SESSION_PRIORITY)
            }
            _ => panic!("Not a Fira params"),
        }
    }

    #[test]
    fn test_fg_state_reconfigure_params() {
        let policy = StaticPolicy::new();
        let session = new_session(fira_params(DEFAULT_SESSION_PRIORITY), &policy);

        session.set_has_non_privileged_fg_app(false);
        let reconfigure = session.fg_state_reconfigure_params().unwrap();
        assert_eq!(reconfigure.range_data_ntf_config, Some(RangeDataNtfConfig::Disable));
        assert_eq!(reconfigure.range_data_proximity_near_cm, None);

        session.set_has_non_privileged_fg_app(true);
        let reconfigure = session.fg_state_reconfigure_params().unwrap();
        assert_eq!(reconfigure.range_data_ntf_config, Some(RangeDataNtfConfig::Enable));
        assert_eq!(reconfigure.range_data_proximity_near_cm, Some(0));
        assert_eq!(reconfigure.range_data_proximity_far_cm, Some(20000));
    }

    #[test]
    fn test_controlee_list_mirrors_confirmed_state() {
        let policy = StaticPolicy::new();
        let session = new_session(fira_params(DEFAULT_SESSION_PRIORITY), &policy);
        assert_eq!(session.controlees().len(), 1);

        session.add_controlee(UwbAddress::Short([0x11, 0x00]));
        session.add_controlee(UwbAddress::Short([0x11, 0x00]));
        assert_eq!(session.controlees().len(), 2);

        session.remove_controlee(UwbAddress::Short([3, 4]));
        assert_eq!(session.controlees().len(), 1);
        assert_eq!(session.controlees()[0].address, UwbAddress::Short([0x11, 0x00]));
    }
}
