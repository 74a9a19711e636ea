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

//! The session manager: the serialized event loop that owns every session
//! mutation, and the notification router that feeds asynchronous UWBS
//! notifications back into the sessions.
//!
//! Commands run one at a time with a per-operation deadline; while a command
//! handler waits on a session's latch, the router keeps running and is the
//! one to release it. Every application-visible outcome leaves through the
//! session event channel, so the callback observes the per-session order the
//! core produced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::params::aliro_app_config_params::{AliroStartRangingParams, AliroStartedAppConfigParams};
use crate::params::app_config_params::{AppConfigParams, Protocol};
use crate::params::ccc_app_config_params::{CccStartRangingParams, CccStartedAppConfigParams};
use crate::params::fira_app_config_params::{
    FiraRangingReconfigureParams, StsConfig, SuspendRanging,
};
use crate::params::uci_packets::{
    AppConfigTlv, AppConfigTlvType, ChipId, Controlee, ControleeWithSessionKey, Controlees,
    DataRcvStatusCode, DataTransferNtfStatusCode, DataTransferPhaseConfigNtfStatusCode,
    HybridSessionConfig, MulticastUpdateStatusCode, ReasonCode, SessionDataTransferPhaseConfig,
    SessionHandle, SessionId, SessionState, SessionType, StatusCode, UciProtocolVersion,
    UpdateMulticastListAction, UwbAddress, HYBRID_PHASE_ELEMENT_SIZE,
};
use crate::params::utils::{u16_to_bytes, u32_to_bytes};
use crate::session::advertise_manager::AdvertiseManager;
use crate::session::callback::{
    data_rcv_status_to_status_code, data_transfer_status_to_status_code,
    multicast_status_to_status_code, reason_code_to_status_code, run_event_dispatcher,
    RangingChangeReason, RangingStartedParams, SessionEvent, UwbSessionCallback,
};
use crate::session::policy::{AttributionSource, PolicyOracle};
use crate::session::session_table::SessionTable;
use crate::session::uwb_session::{
    MulticastListUpdateStatus, OperationType, ReceivedDataInfo, SendDataInfo, UwbControlee,
    UwbSession, RANGING_RESULT_ERROR_NO_TIMEOUT,
};
use crate::uci::notification::{
    DataRcvNotification, RadarDataRcvNotification, RangingMeasurements, SessionRangeData,
    UciSessionNotification,
};
use crate::uci::uci_manager::UciManager;
use crate::utils::clean_mpsc_receiver;

// The per-operation deadlines of the command handlers. For FiRa start/stop,
// the deadline is raised to four ranging intervals so a slow interval cannot
// starve the state notification.
const RANGING_SESSION_OPEN_THRESHOLD_MS: u64 = 16_000;
const RANGING_SESSION_START_THRESHOLD_MS: u64 = 3_000;
const RANGING_SESSION_CLOSE_THRESHOLD_MS: u64 = 3_000;
const RANGING_ROUNDS_UPDATE_DT_TAG_THRESHOLD_MS: u64 = 3_000;
const DATA_TRANSFER_PHASE_CONFIG_THRESHOLD_MS: u64 = 2_000;

// How long a non-privileged app may keep ranging from the background before
// the session is stopped.
const NON_PRIVILEGED_BG_APP_TIMEOUT_MS: u64 = 120_000;

/// The protocol-specific overrides a caller may pass to start_ranging.
#[derive(Debug, Clone, PartialEq)]
pub enum StartRangingParams {
    Ccc(CccStartRangingParams),
    Aliro(AliroStartRangingParams),
}

/// The SessionManager organizes the state machines of the existing UWB
/// sessions, sends the session-related requests to the UCI transport, and
/// routes the session notifications coming back from it. Using the actor
/// model, SessionManager delegates the requests to SessionManagerActor.
pub struct SessionManager {
    cmd_sender: mpsc::UnboundedSender<(SessionCommand, ResponseSender)>,
}

impl SessionManager {
    /// Create the manager and spawn its event loop, notification router and
    /// callback dispatcher.
    pub fn new<T: UciManager, C: UwbSessionCallback>(
        uci_manager: T,
        uci_notf_receiver: mpsc::UnboundedReceiver<UciSessionNotification>,
        callback: C,
        policy: Arc<dyn PolicyOracle>,
        uci_version: UciProtocolVersion,
    ) -> Self {
        let (cmd_sender, cmd_receiver) = mpsc::unbounded_channel();
        let (internal_cmd_sender, internal_cmd_receiver) = mpsc::unbounded_channel();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let session_table = Arc::new(SessionTable::new());
        let advertise_manager = Arc::new(Mutex::new(AdvertiseManager::default()));

        run_event_dispatcher(event_receiver, callback);

        let router = NotificationRouter {
            uci_notf_receiver,
            session_table: session_table.clone(),
            policy: policy.clone(),
            advertise_manager: advertise_manager.clone(),
            event_sender: event_sender.clone(),
            internal_cmd_sender: internal_cmd_sender.clone(),
        };
        tokio::spawn(async move { router.run().await });

        let mut actor = SessionManagerActor {
            cmd_receiver,
            internal_cmd_receiver,
            internal_cmd_sender,
            uci_manager,
            session_table,
            policy,
            advertise_manager,
            event_sender,
            uci_version,
            non_privileged_uid_sessions: HashMap::new(),
        };
        tokio::spawn(async move { actor.run().await });

        Self { cmd_sender }
    }

    /// Open a new ranging (or data-transfer / radar) session. The outcome is
    /// also reported through the callback as rangingOpened / rangingOpenFailed.
    pub async fn init_session(
        &self,
        attribution_source: AttributionSource,
        session_handle: SessionHandle,
        session_id: SessionId,
        session_type: SessionType,
        chip_id: ChipId,
        params: AppConfigParams,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::InitSession {
            attribution_source,
            session_handle,
            session_id,
            session_type,
            chip_id,
            params,
        })
        .await?;
        Ok(())
    }

    /// Close the session.
    pub async fn deinit_session(&self, session_handle: SessionHandle) -> Result<()> {
        self.send_cmd(SessionCommand::DeinitSession {
            session_handle,
            close_reason: RangingChangeReason::LocalApi,
        })
        .await?;
        Ok(())
    }

    /// Start ranging of the session, optionally overriding the CCC/ALIRO
    /// start parameters.
    pub async fn start_ranging(
        &self,
        session_handle: SessionHandle,
        start_params: Option<StartRangingParams>,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::StartRanging { session_handle, start_params }).await?;
        Ok(())
    }

    /// Stop ranging of the session.
    pub async fn stop_ranging(&self, session_handle: SessionHandle) -> Result<()> {
        self.send_cmd(SessionCommand::StopRanging {
            session_handle,
            triggered_by_system_policy: false,
        })
        .await?;
        Ok(())
    }

    /// Reconfigure the session: a parameter change, a suspend/resume, or
    /// (when an action is set) a controlee multicast list update.
    pub async fn reconfigure(
        &self,
        session_handle: SessionHandle,
        params: FiraRangingReconfigureParams,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::Reconfigure {
            session_handle,
            params,
            triggered_by_fg_state_change: false,
        })
        .await?;
        Ok(())
    }

    /// Send an application payload to a remote peer of the session.
    pub async fn send_data(
        &self,
        session_handle: SessionHandle,
        address: UwbAddress,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::SendData { session_handle, address, payload }).await?;
        Ok(())
    }

    /// Update the active ranging rounds of a DT-Tag session.
    pub async fn update_dt_tag_ranging_rounds(
        &self,
        session_handle: SessionHandle,
        ranging_round_indexes: Vec<u8>,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::UpdateDtTagRangingRounds {
            session_handle,
            ranging_round_indexes,
        })
        .await?;
        Ok(())
    }

    /// Configure the data transfer phase of an in-band data session.
    pub async fn set_data_transfer_phase_config(
        &self,
        session_handle: SessionHandle,
        config: SessionDataTransferPhaseConfig,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::SetDataTransferPhaseConfig { session_handle, config })
            .await?;
        Ok(())
    }

    /// Configure the phase list of a hybrid session controller.
    pub async fn set_hybrid_session_configuration(
        &self,
        session_handle: SessionHandle,
        config: HybridSessionConfig,
    ) -> Result<()> {
        self.send_cmd(SessionCommand::SetHybridSessionConfig { session_handle, config }).await?;
        Ok(())
    }

    /// Query the maximum application data size the session can send.
    pub async fn query_max_data_size(&self, session_handle: SessionHandle) -> Result<u16> {
        match self.send_cmd(SessionCommand::QueryMaxDataSize { session_handle }).await? {
            Response::MaxDataSize(size) => Ok(size),
            _ => panic!("query_max_data_size() should return MaxDataSize"),
        }
    }

    /// The current parameters of the session.
    pub async fn session_params(&self, session_handle: SessionHandle) -> Result<AppConfigParams> {
        match self.send_cmd(SessionCommand::GetParams { session_handle }).await? {
            Response::AppConfigParams(params) => Ok(params),
            _ => panic!("session_params() should return AppConfigParams"),
        }
    }

    /// The UWBS-confirmed controlee list of a controller session.
    pub async fn session_controlees(
        &self,
        session_handle: SessionHandle,
    ) -> Result<Vec<UwbControlee>> {
        match self.send_cmd(SessionCommand::GetControlees { session_handle }).await? {
            Response::Controlees(controlees) => Ok(controlees),
            _ => panic!("session_controlees() should return Controlees"),
        }
    }

    /// Feed a uid importance transition from the platform. Sessions owned by
    /// the uid get their notification control and priority reconciled.
    pub async fn on_uid_importance(&self, uid: u32, foreground: bool) -> Result<()> {
        self.send_cmd(SessionCommand::OnUidImportance { uid, foreground }).await?;
        Ok(())
    }

    /// The owning client died: close its session.
    pub async fn on_client_death(&self, session_handle: SessionHandle) -> Result<()> {
        self.send_cmd(SessionCommand::DeinitSession {
            session_handle,
            close_reason: RangingChangeReason::Unknown,
        })
        .await?;
        Ok(())
    }

    /// Stop ranging on every active session; used when the service is being
    /// disabled.
    pub async fn stop_all_ranging(&self) -> Result<()> {
        self.send_cmd(SessionCommand::StopAllRanging).await?;
        Ok(())
    }

    /// Close every session without issuing further UCI commands; used when
    /// the stack below is going away.
    pub async fn deinit_all_sessions(&self) -> Result<()> {
        self.send_cmd(SessionCommand::DeinitAllSessions).await?;
        Ok(())
    }

    // Send the |cmd| to the SessionManagerActor.
    async fn send_cmd(&self, cmd: SessionCommand) -> Result<Response> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.cmd_sender.send((cmd, result_sender)).map_err(|cmd| {
            error!("Failed to send cmd: {:?}", cmd.0);
            Error::TokioFailure
        })?;
        result_receiver.await.unwrap_or(Err(Error::TokioFailure))
    }
}

#[derive(Debug)]
enum SessionCommand {
    InitSession {
        attribution_source: AttributionSource,
        session_handle: SessionHandle,
        session_id: SessionId,
        session_type: SessionType,
        chip_id: ChipId,
        params: AppConfigParams,
    },
    DeinitSession {
        session_handle: SessionHandle,
        close_reason: RangingChangeReason,
    },
    StartRanging {
        session_handle: SessionHandle,
        start_params: Option<StartRangingParams>,
    },
    StopRanging {
        session_handle: SessionHandle,
        triggered_by_system_policy: bool,
    },
    Reconfigure {
        session_handle: SessionHandle,
        params: FiraRangingReconfigureParams,
        triggered_by_fg_state_change: bool,
    },
    SendData {
        session_handle: SessionHandle,
        address: UwbAddress,
        payload: Vec<u8>,
    },
    UpdateDtTagRangingRounds {
        session_handle: SessionHandle,
        ranging_round_indexes: Vec<u8>,
    },
    SetDataTransferPhaseConfig {
        session_handle: SessionHandle,
        config: SessionDataTransferPhaseConfig,
    },
    SetHybridSessionConfig {
        session_handle: SessionHandle,
        config: HybridSessionConfig,
    },
    QueryMaxDataSize {
        session_handle: SessionHandle,
    },
    GetParams {
        session_handle: SessionHandle,
    },
    GetControlees {
        session_handle: SessionHandle,
    },
    OnUidImportance {
        uid: u32,
        foreground: bool,
    },
    StopAllRanging,
    DeinitAllSessions,
}

#[derive(Debug)]
enum Response {
    Null,
    AppConfigParams(AppConfigParams),
    Controlees(Vec<UwbControlee>),
    MaxDataSize(u16),
}
type ResponseSender = oneshot::Sender<Result<Response>>;

// The events the loop sends to itself: timer expirations and the deferred
// handling of an unsolicited deinit notification.
#[derive(Debug)]
enum InternalCommand {
    OnDeinit { session_id: SessionId },
    StopRangingSystemPolicy { session_handle: SessionHandle },
}

struct SessionManagerActor<T: UciManager> {
    cmd_receiver: mpsc::UnboundedReceiver<(SessionCommand, ResponseSender)>,
    internal_cmd_receiver: mpsc::UnboundedReceiver<InternalCommand>,
    internal_cmd_sender: mpsc::UnboundedSender<InternalCommand>,
    uci_manager: T,
    session_table: Arc<SessionTable>,
    policy: Arc<dyn PolicyOracle>,
    advertise_manager: Arc<Mutex<AdvertiseManager>>,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    uci_version: UciProtocolVersion,
    // uid -> the non-privileged FiRa sessions it owns; drives the fg/bg
    // reconciliation.
    non_privileged_uid_sessions: HashMap<u32, Vec<SessionHandle>>,
}

impl<T: UciManager> SessionManagerActor<T> {
    async fn run(&mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_receiver.recv() => {
                    match cmd {
                        None => {
                            debug!("SessionManager is about to drop.");
                            break;
                        }
                        Some((cmd, result_sender)) => {
                            let result = self.handle_cmd(cmd).await;
                            let _ = result_sender.send(result);
                        }
                    }
                }
                Some(internal_cmd) = self.internal_cmd_receiver.recv() => {
                    self.handle_internal_cmd(internal_cmd).await;
                }
            }
        }
        clean_mpsc_receiver(&mut self.internal_cmd_receiver);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_sender.send(event);
    }

    async fn handle_cmd(&mut self, cmd: SessionCommand) -> Result<Response> {
        match cmd {
            SessionCommand::InitSession {
                attribution_source,
                session_handle,
                session_id,
                session_type,
                chip_id,
                params,
            } => {
                self.handle_init_session(
                    attribution_source,
                    session_handle,
                    session_id,
                    session_type,
                    chip_id,
                    params,
                )
                .await?;
                Ok(Response::Null)
            }
            SessionCommand::DeinitSession { session_handle, close_reason } => {
                self.handle_deinit_session(session_handle, close_reason).await?;
                Ok(Response::Null)
            }
            SessionCommand::StartRanging { session_handle, start_params } => {
                self.handle_start_ranging(session_handle, start_params).await?;
                Ok(Response::Null)
            }
            SessionCommand::StopRanging { session_handle, triggered_by_system_policy } => {
                self.handle_stop_ranging(session_handle, triggered_by_system_policy).await?;
                Ok(Response::Null)
            }
            SessionCommand::Reconfigure {
                session_handle,
                params,
                triggered_by_fg_state_change,
            } => {
                self.handle_reconfigure(session_handle, params, triggered_by_fg_state_change)
                    .await?;
                Ok(Response::Null)
            }
            SessionCommand::SendData { session_handle, address, payload } => {
                self.handle_send_data(session_handle, address, payload).await?;
                Ok(Response::Null)
            }
            SessionCommand::UpdateDtTagRangingRounds {
                session_handle,
                ranging_round_indexes,
            } => {
                self.handle_update_dt_tag_ranging_rounds(session_handle, ranging_round_indexes)
                    .await?;
                Ok(Response::Null)
            }
            SessionCommand::SetDataTransferPhaseConfig { session_handle, config } => {
                self.handle_set_data_transfer_phase_config(session_handle, config).await?;
                Ok(Response::Null)
            }
            SessionCommand::SetHybridSessionConfig { session_handle, config } => {
                self.handle_set_hybrid_session_config(session_handle, config).await?;
                Ok(Response::Null)
            }
            SessionCommand::QueryMaxDataSize { session_handle } => {
                let session = self.session(session_handle)?;
                let size = self
                    .uci_manager
                    .session_query_max_data_size(session.session_id(), session.chip_id())
                    .await?;
                Ok(Response::MaxDataSize(size))
            }
            SessionCommand::GetParams { session_handle } => {
                let session = self.session(session_handle)?;
                Ok(Response::AppConfigParams(session.params()))
            }
            SessionCommand::GetControlees { session_handle } => {
                let session = self.session(session_handle)?;
                Ok(Response::Controlees(session.controlees()))
            }
            SessionCommand::OnUidImportance { uid, foreground } => {
                self.handle_uid_importance(uid, foreground).await;
                Ok(Response::Null)
            }
            SessionCommand::StopAllRanging => {
                self.handle_stop_all_ranging().await;
                Ok(Response::Null)
            }
            SessionCommand::DeinitAllSessions => {
                self.handle_deinit_all_sessions();
                Ok(Response::Null)
            }
        }
    }

    async fn handle_internal_cmd(&mut self, cmd: InternalCommand) {
        match cmd {
            InternalCommand::OnDeinit { session_id } => {
                self.handle_on_deinit(session_id);
            }
            InternalCommand::StopRangingSystemPolicy { session_handle } => {
                info!(
                    "Stopping session (handle {}) due to system policy",
                    session_handle
                );
                let _ = self.handle_stop_ranging(session_handle, true).await;
            }
        }
    }

    fn session(&self, session_handle: SessionHandle) -> Result<Arc<UwbSession>> {
        self.session_table
            .get_by_handle(session_handle)
            .ok_or(Error::UnknownSessionHandle(session_handle))
    }

    // ---------- Open ----------

    async fn handle_init_session(
        &mut self,
        attribution_source: AttributionSource,
        session_handle: SessionHandle,
        session_id: SessionId,
        session_type: SessionType,
        chip_id: ChipId,
        params: AppConfigParams,
    ) -> Result<()> {
        if !params.is_type_matched(session_type) {
            error!("session_type {:?} doesn't match with the params", session_type);
            self.emit(SessionEvent::RangingOpenFailed {
                session_handle,
                reason: RangingChangeReason::BadParameters,
                status: StatusCode::InvalidParam,
            });
            return Err(Error::BadParameters);
        }

        let session = Arc::new(UwbSession::new(
            session_handle,
            session_id,
            session_type,
            chip_id,
            attribution_source,
            params,
            self.policy.as_ref(),
        ));

        // Gate on the attribution chain: a non-privileged app that is not in
        // the foreground may only range when policy allows it.
        if let Some(link) = session.non_privileged_link() {
            let has_fg_app =
                self.policy.is_foreground_app_or_service(link.uid, &link.package_name);
            session.set_has_non_privileged_fg_app(has_fg_app);
            if !has_fg_app && !self.policy.is_background_ranging_enabled() {
                error!("openRanging rejected: system policy disallows non-fg 3p apps");
                self.emit(SessionEvent::RangingOpenFailed {
                    session_handle,
                    reason: RangingChangeReason::SystemPolicy,
                    status: StatusCode::Failed,
                });
                return Err(Error::ForegroundPolicy);
            }
        }

        if self.session_table.contains_handle(session_handle)
            || self.session_table.contains_id(session_id)
        {
            info!(
                "Duplicated session. handle: {}, session_id: {}",
                session_handle, session_id
            );
            self.emit(SessionEvent::RangingOpenFailed {
                session_handle,
                reason: RangingChangeReason::BadParameters,
                status: StatusCode::ErrorSessionDuplicate,
            });
            return Err(Error::DuplicatedSessionHandle(session_handle));
        }

        if !self.admit_session(&session).await {
            self.emit(SessionEvent::RangingOpenFailed {
                session_handle,
                reason: RangingChangeReason::MaxSessionsReached,
                status: StatusCode::ErrorMaxSessionsExceeded,
            });
            return Err(Error::MaxSessionsExceeded);
        }

        self.session_table.insert(session.clone());
        self.index_non_privileged_session(&session);

        let result = match timeout(
            Duration::from_millis(RANGING_SESSION_OPEN_THRESHOLD_MS),
            self.do_open_ranging(&session),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                info!("Failed to initialize session {} - status: TIMEOUT", session_id);
                Err(Error::Timeout)
            }
        };

        match result {
            Ok(()) => {
                self.emit(SessionEvent::RangingOpened { session_handle });
                Ok(())
            }
            Err(e) => {
                let status = e.to_status_code();
                self.emit(SessionEvent::RangingOpenFailed {
                    session_handle,
                    reason: RangingChangeReason::from_status_code(status),
                    status,
                });
                // Tear down whatever was created on the controller.
                session.set_operation(OperationType::OnDeinit);
                let _ = self
                    .uci_manager
                    .session_deinit(session.session_id(), session.chip_id())
                    .await;
                self.cleanup_session(&session);
                self.session_table.remove(session_handle);
                Err(e)
            }
        }
    }

    /// Check the per-protocol session cap, evicting a lower-priority FiRa
    /// session when possible. Returns false when the new session does not fit.
    async fn admit_session(&mut self, session: &Arc<UwbSession>) -> bool {
        let protocol = session.protocol();
        let max_sessions = self.policy.max_sessions(protocol, session.chip_id());
        if self.session_table.count_by_protocol(protocol) < max_sessions {
            return true;
        }
        // CCC/ALIRO/Radar sessions all share one priority; only FiRa sessions
        // can make space by evicting a strictly lower-priority session.
        if protocol != Protocol::Fira {
            info!("Max {:?} sessions exceeded", protocol);
            return false;
        }

        let Some(lowest) = self.session_table.session_with_lowest_priority(Protocol::Fira) else {
            warn!("Max sessions exceeded, but the list of sessions is empty");
            return false;
        };
        if lowest.stack_priority() >= session.stack_priority() {
            info!("Max FiRa sessions exceeded and no lower-priority session to evict");
            return false;
        }

        info!(
            "Evicting low-priority session (handle {}) to make space",
            lowest.session_handle()
        );
        self.handle_deinit_session(
            lowest.session_handle(),
            RangingChangeReason::MaxSessionsReached,
        )
        .await
        .is_ok()
    }

    async fn do_open_ranging(&self, session: &Arc<UwbSession>) -> Result<()> {
        let open_deadline = Duration::from_millis(RANGING_SESSION_OPEN_THRESHOLD_MS);
        let mut latch = session.subscribe_latch();
        session.set_operation(OperationType::InitSession);

        self.uci_manager
            .session_init(session.session_id(), session.session_type(), session.chip_id())
            .await?;

        // Cache the controller-assigned token for cross-session references.
        let token = self
            .uci_manager
            .get_session_token_from_session_id(session.session_id(), session.chip_id())
            .await?;
        self.session_table.insert_session_token(session.session_id(), token);

        self.wait_for_state(session, &mut latch, SessionState::Init, open_deadline).await?;

        session.set_needs_uwbs_timestamp_query(self.uci_version.major, self.policy.as_ref());
        self.set_absolute_initiation_time_if_needed(session).await?;
        let result = self.apply_app_config(session).await;
        session.reset_absolute_initiation_time();
        result?;

        self.wait_for_state(session, &mut latch, SessionState::Idle, open_deadline).await?;
        Ok(())
    }

    /// Apply the full application configuration of the session.
    async fn apply_app_config(&self, session: &Arc<UwbSession>) -> Result<()> {
        let mut params = session.params();

        // A FiRa session time-base references another session by handle;
        // substitute the controller-assigned token before the config leaves.
        if let AppConfigParams::Fira(fira_params) = &params {
            if let Some(time_base) = fira_params.session_time_base() {
                if time_base.is_enabled() {
                    if let Some(token) = self
                        .session_table
                        .session_id_of(time_base.reference_session_handle)
                        .and_then(|reference_id| self.session_table.session_token(reference_id))
                    {
                        params = AppConfigParams::Fira(
                            fira_params.with_session_time_base_token(token),
                        );
                    }
                }
            }
        }

        if let AppConfigParams::Radar(_) = &params {
            return self
                .uci_manager
                .android_set_radar_config(
                    session.session_id(),
                    params.generate_radar_tlvs(),
                    session.chip_id(),
                )
                .await;
        }

        let response = self
            .uci_manager
            .session_set_app_config(
                session.session_id(),
                params.generate_tlvs(),
                session.chip_id(),
                self.uci_version,
            )
            .await?;
        for config_status in response.config_status.iter() {
            warn!(
                "AppConfig {:?} is not applied: {:?}",
                config_status.cfg_id, config_status.status
            );
        }
        if !response.status.is_ok() {
            error!("Failed to set app_config. StatusCode: {:?}", response.status);
            return Err(Error::Uci(response.status));
        }
        Ok(())
    }

    async fn set_absolute_initiation_time_if_needed(
        &self,
        session: &Arc<UwbSession>,
    ) -> Result<()> {
        if session.needs_uwbs_timestamp_query() {
            let timestamp_us =
                self.uci_manager.core_query_uwb_timestamp(session.chip_id()).await?;
            session.compute_absolute_initiation_time(timestamp_us);
        }
        Ok(())
    }

    // ---------- Start ----------

    async fn handle_start_ranging(
        &mut self,
        session_handle: SessionHandle,
        start_params: Option<StartRangingParams>,
    ) -> Result<()> {
        let session = self.session(session_handle)?;
        match session.state() {
            SessionState::Idle => {}
            SessionState::Active => {
                info!("Session {} is already ranging", session.session_id());
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::Unknown,
                    status: StatusCode::Rejected,
                });
                return Err(Error::Rejected);
            }
            _ => {
                info!("Session {} can't start ranging", session.session_id());
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::Unknown,
                    status: StatusCode::Failed,
                });
                return Err(Error::Rejected);
            }
        }

        match (start_params, session.protocol()) {
            (Some(StartRangingParams::Ccc(ccc_start_params)), Protocol::Ccc) => {
                info!(
                    "startRanging - update RAN multiplier: {}, stsIndex: {}",
                    ccc_start_params.ran_multiplier, ccc_start_params.sts_index
                );
                session.update_ccc_params_on_start(&ccc_start_params);
            }
            (Some(StartRangingParams::Aliro(aliro_start_params)), Protocol::Aliro) => {
                info!(
                    "startRanging - update RAN multiplier: {}, stsIndex: {}",
                    aliro_start_params.ran_multiplier, aliro_start_params.sts_index
                );
                session.update_aliro_params_on_start(&aliro_start_params);
            }
            (None, Protocol::Fira) => session.update_fira_params_on_start_if_changed(),
            (None, _) => {}
            (Some(_), _) => {
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::BadParameters,
                    status: StatusCode::InvalidParam,
                });
                return Err(Error::BadParameters);
            }
        }
        session.set_needs_uwbs_timestamp_query(self.uci_version.major, self.policy.as_ref());

        let deadline = self.start_stop_deadline(&session);
        let result = match timeout(deadline, self.do_start_ranging(&session)).await {
            Ok(result) => result,
            Err(_) => {
                info!("Failed to start ranging - status: TIMEOUT");
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::Unknown,
                    status: StatusCode::Failed,
                });
                Err(Error::Timeout)
            }
        };

        // A non-privileged app that is (still) in the background gets its
        // ranging-data notifications muted right after the start.
        if result.is_ok()
            && session.has_non_privileged_app()
            && !session.has_non_privileged_fg_app()
        {
            info!(
                "Session {} reconfiguring ntf control due to app state",
                session.session_id()
            );
            self.reconfigure_on_fg_state_change(&session).await;
        }
        result
    }

    async fn do_start_ranging(&self, session: &Arc<UwbSession>) -> Result<()> {
        let session_handle = session.session_handle();
        let deadline = self.start_stop_deadline(session);
        let mut latch = session.subscribe_latch();

        self.set_absolute_initiation_time_if_needed(session).await?;
        if session.needs_app_config_update() {
            session.reset_needs_app_config_update();
            let result = self.apply_app_config(session).await;
            session.reset_absolute_initiation_time();
            if let Err(e) = result {
                let status = e.to_status_code();
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::from_status_code(status),
                    status,
                });
                return Err(e);
            }
        }

        session.set_operation(OperationType::Start);
        if let Err(e) = self
            .uci_manager
            .range_start(session.session_id(), session.chip_id())
            .await
        {
            let status = e.to_status_code();
            self.emit(SessionEvent::RangingStartFailed {
                session_handle,
                reason: RangingChangeReason::from_status_code(status),
                status,
            });
            return Err(e);
        }

        match self.wait_for_state(session, &mut latch, SessionState::Active, deadline).await {
            Ok(()) => {}
            Err(Error::Timeout) => {
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::Unknown,
                    status: StatusCode::Failed,
                });
                return Err(Error::Timeout);
            }
            Err(_) => {
                // The controller refused the start; the reason code of the
                // last status notification says why.
                let reason_code = session.last_reason_code();
                self.emit(SessionEvent::RangingStartFailed {
                    session_handle,
                    reason: RangingChangeReason::from_reason_code(reason_code),
                    status: reason_code_to_status_code(reason_code),
                });
                return Err(Error::Uci(reason_code_to_status_code(reason_code)));
            }
        }

        let started_params = self.started_params(session).await;
        self.emit(SessionEvent::RangingStarted { session_handle, params: started_params });
        Ok(())
    }

    /// The parameters reported with rangingStarted: CCC and ALIRO read the
    /// started configuration back from the UWBS.
    async fn started_params(&self, session: &Arc<UwbSession>) -> Option<RangingStartedParams> {
        match session.protocol() {
            Protocol::Fira => Some(RangingStartedParams::Fira(session.params())),
            Protocol::Ccc => {
                let config_map = self.fetch_app_config_map(session).await?;
                CccStartedAppConfigParams::from_config_map(config_map)
                    .map(RangingStartedParams::CccStarted)
            }
            Protocol::Aliro => {
                let config_map = self.fetch_app_config_map(session).await?;
                AliroStartedAppConfigParams::from_config_map(config_map)
                    .map(RangingStartedParams::AliroStarted)
            }
            Protocol::Radar => None,
        }
    }

    async fn fetch_app_config_map(
        &self,
        session: &Arc<UwbSession>,
    ) -> Option<HashMap<AppConfigTlvType, Vec<u8>>> {
        match self
            .uci_manager
            .session_get_app_config(session.session_id(), vec![], session.chip_id())
            .await
        {
            Ok(tlvs) => Some(
                tlvs.into_iter().map(|tlv| (tlv.cfg_id, tlv.into_value())).collect(),
            ),
            Err(e) => {
                error!("Failed to get app config after start/stop: {:?}", e);
                None
            }
        }
    }

    // ---------- Stop ----------

    async fn handle_stop_ranging(
        &mut self,
        session_handle: SessionHandle,
        triggered_by_system_policy: bool,
    ) -> Result<()> {
        let session = self.session(session_handle)?;
        match session.state() {
            SessionState::Active => {}
            SessionState::Idle => {
                info!("Session {} is already idle", session.session_id());
                self.emit_stopped(&session, triggered_by_system_policy, StatusCode::Ok).await;
                return Ok(());
            }
            _ => {
                info!("Session {} is not an active session", session.session_id());
                self.emit(SessionEvent::RangingStopFailed {
                    session_handle,
                    status: StatusCode::Rejected,
                });
                return Err(Error::Rejected);
            }
        }

        let deadline = self.start_stop_deadline(&session);
        let result = match timeout(
            deadline,
            self.do_stop_ranging(&session, triggered_by_system_policy),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                info!("Failed to stop ranging - status: TIMEOUT");
                self.emit(SessionEvent::RangingStopFailed {
                    session_handle,
                    status: StatusCode::Failed,
                });
                Err(Error::Timeout)
            }
        };

        // The session stopped moving; its timers and advertiser records no
        // longer apply.
        session.stop_timers();
        self.remove_advertiser_data(&session);
        result
    }

    async fn do_stop_ranging(
        &self,
        session: &Arc<UwbSession>,
        triggered_by_system_policy: bool,
    ) -> Result<()> {
        let session_handle = session.session_handle();
        let deadline = self.start_stop_deadline(session);
        let mut latch = session.subscribe_latch();
        session.set_operation(OperationType::Stop);

        if let Err(e) = self
            .uci_manager
            .range_stop(session.session_id(), session.chip_id())
            .await
        {
            if session.state() == SessionState::Idle {
                // The stop raced with a remote stop; report success.
                self.emit_stopped(session, true, StatusCode::Ok).await;
                return Ok(());
            }
            self.emit(SessionEvent::RangingStopFailed {
                session_handle,
                status: e.to_status_code(),
            });
            return Err(e);
        }

        if self.wait_for_state(session, &mut latch, SessionState::Idle, deadline).await.is_err() {
            self.emit(SessionEvent::RangingStopFailed {
                session_handle,
                status: StatusCode::Failed,
            });
            return Err(Error::Uci(StatusCode::Failed));
        }

        self.emit_stopped(session, triggered_by_system_policy, StatusCode::Ok).await;
        Ok(())
    }

    async fn emit_stopped(
        &self,
        session: &Arc<UwbSession>,
        triggered_by_system_policy: bool,
        status: StatusCode,
    ) {
        let stopped_params = self.stopped_params(session).await;
        let reason = if triggered_by_system_policy {
            RangingChangeReason::SystemPolicy
        } else {
            RangingChangeReason::LocalApi
        };
        self.emit(SessionEvent::RangingStopped {
            session_handle: session.session_handle(),
            reason,
            status,
            stopped_params,
        });
    }

    /// CCC and ALIRO attach the stopped configuration (e.g. the last STS
    /// index used) to the stopped callback, when policy enables the fetch.
    async fn stopped_params(&self, session: &Arc<UwbSession>) -> Vec<AppConfigTlv> {
        if !matches!(session.protocol(), Protocol::Ccc | Protocol::Aliro)
            || !self.policy.is_stopped_params_fetch_enabled()
        {
            return Vec::new();
        }
        match self
            .uci_manager
            .session_get_app_config(session.session_id(), vec![], session.chip_id())
            .await
        {
            Ok(tlvs) => tlvs,
            Err(e) => {
                error!("Failed to get the ranging stopped params: {:?}", e);
                Vec::new()
            }
        }
    }

    // ---------- Reconfigure ----------

    async fn handle_reconfigure(
        &mut self,
        session_handle: SessionHandle,
        params: FiraRangingReconfigureParams,
        triggered_by_fg_state_change: bool,
    ) -> Result<()> {
        let session = self.session(session_handle)?;
        if !matches!(session.state(), SessionState::Idle | SessionState::Active) {
            if !triggered_by_fg_state_change {
                self.emit(SessionEvent::RangingReconfigureFailed {
                    session_handle,
                    status: StatusCode::Rejected,
                });
            }
            return Err(Error::Rejected);
        }

        if params.suspend_ranging_rounds.is_some() && !self.suspend_precondition_ok(&session) {
            return Err(Error::Rejected);
        }
        if params.address_list.is_some() && !self.multicast_precondition_ok(&session, &params) {
            return Err(Error::Rejected);
        }

        // Keep the stored params in sync with the requested change; a live
        // fg/bg override never touches them.
        if !triggered_by_fg_state_change {
            session.update_fira_params_on_reconfigure(&params);
        }

        match timeout(
            Duration::from_millis(RANGING_SESSION_OPEN_THRESHOLD_MS),
            self.do_reconfigure(&session, params, triggered_by_fg_state_change),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                info!("Failed to reconfigure - status: TIMEOUT");
                if !triggered_by_fg_state_change {
                    self.emit(SessionEvent::RangingReconfigureFailed {
                        session_handle,
                        status: StatusCode::Failed,
                    });
                }
                Err(Error::Timeout)
            }
        }
    }

    fn suspend_precondition_ok(&self, session: &Arc<UwbSession>) -> bool {
        let precondition_ok =
            session.is_controller() && session.state() == SessionState::Active;
        if !precondition_ok {
            error!(
                "suspend ranging precondition failed for session {}",
                session.session_id()
            );
        }
        precondition_ok
    }

    /// Only a controller updates the multicast list, and only the 16/32-byte
    /// "add" actions carry per-controlee keys: they require the
    /// provisioned-individual-key STS mode, and the session key and the
    /// sub-session keys must come from the same source.
    fn multicast_precondition_ok(
        &self,
        session: &Arc<UwbSession>,
        params: &FiraRangingReconfigureParams,
    ) -> bool {
        if !session.is_controller() {
            error!("Multicast update rejected: session is not a controller");
            return false;
        }
        let Some(action) = params.action else {
            return false;
        };
        if action.needs_sub_session_key() {
            if session.sts_config() != Some(StsConfig::ProvisionedForControleeIndividualKey) {
                error!("Multicast update rejected: STS config doesn't allow sub-session keys");
                return false;
            }
            if session.has_session_key() != params.sub_session_key_list.is_some() {
                error!("Multicast update rejected: session key and sub-session keys mismatch");
                return false;
            }
        } else if params.sub_session_key_list.is_some() {
            error!("Multicast update rejected: unexpected sub-session keys");
            return false;
        }
        true
    }

    async fn do_reconfigure(
        &self,
        session: &Arc<UwbSession>,
        params: FiraRangingReconfigureParams,
        triggered_by_fg_state_change: bool,
    ) -> Result<()> {
        match params.action {
            Some(action) => self.do_multicast_list_update(session, action, &params).await,
            None => {
                self.do_config_change(session, &params, triggered_by_fg_state_change).await
            }
        }
    }

    async fn do_config_change(
        &self,
        session: &Arc<UwbSession>,
        params: &FiraRangingReconfigureParams,
        triggered_by_fg_state_change: bool,
    ) -> Result<()> {
        let session_handle = session.session_handle();
        session.set_operation(OperationType::Reconfigure);
        let tlvs = params
            .generate_config_map()
            .into_iter()
            .map(|(cfg_id, v)| AppConfigTlv::new(cfg_id, v))
            .collect();
        let result = match self
            .uci_manager
            .session_set_app_config(session.session_id(), tlvs, session.chip_id(), self.uci_version)
            .await
        {
            Ok(response) if response.status.is_ok() => Ok(()),
            Ok(response) => Err(Error::Uci(response.status)),
            Err(e) => Err(e),
        };

        // A suspend/resume reconfigure reports through the pause/resume
        // callbacks on top of the reconfigure outcome.
        if let Some(suspend) = params.suspend_ranging_rounds {
            match (suspend, &result) {
                (SuspendRanging::Enabled, Ok(())) => {
                    self.emit(SessionEvent::RangingPaused { session_handle })
                }
                (SuspendRanging::Enabled, Err(e)) => self.emit(SessionEvent::RangingPauseFailed {
                    session_handle,
                    status: e.to_status_code(),
                }),
                (SuspendRanging::Disabled, Ok(())) => {
                    self.emit(SessionEvent::RangingResumed { session_handle })
                }
                (SuspendRanging::Disabled, Err(e)) => {
                    self.emit(SessionEvent::RangingResumeFailed {
                        session_handle,
                        status: e.to_status_code(),
                    })
                }
            }
        }

        if triggered_by_fg_state_change {
            return result;
        }
        match &result {
            Ok(()) => self.emit(SessionEvent::RangingReconfigured { session_handle }),
            Err(e) => self.emit(SessionEvent::RangingReconfigureFailed {
                session_handle,
                status: e.to_status_code(),
            }),
        }
        result
    }

    async fn do_multicast_list_update(
        &self,
        session: &Arc<UwbSession>,
        action: UpdateMulticastListAction,
        params: &FiraRangingReconfigureParams,
    ) -> Result<()> {
        let session_handle = session.session_handle();
        let Some(address_list) = params.address_list.as_ref() else {
            error!("Multicast update missing the address list");
            self.emit_controlee_command_failed(session_handle, action, StatusCode::InvalidParam);
            self.emit(SessionEvent::RangingReconfigureFailed {
                session_handle,
                status: StatusCode::InvalidParam,
            });
            return Err(Error::BadParameters);
        };
        let controlees = match build_controlees(action, address_list, params) {
            Some(controlees) => controlees,
            None => {
                self.emit_controlee_command_failed(
                    session_handle,
                    action,
                    StatusCode::InvalidParam,
                );
                self.emit(SessionEvent::RangingReconfigureFailed {
                    session_handle,
                    status: StatusCode::InvalidParam,
                });
                return Err(Error::BadParameters);
            }
        };

        let mut latch = session.subscribe_latch();
        session.set_operation(OperationType::Reconfigure);
        if let Err(e) = self
            .uci_manager
            .session_update_controller_multicast_list(
                session.session_id(),
                action,
                controlees,
                session.chip_id(),
            )
            .await
        {
            error!("Unable to update the controller multicast list: {:?}", e);
            self.emit_controlee_command_failed(session_handle, action, e.to_status_code());
            self.emit(SessionEvent::RangingReconfigureFailed {
                session_handle,
                status: e.to_status_code(),
            });
            return Err(e);
        }

        // The per-controlee outcome arrives as a notification; the session's
        // controlee list only ever mirrors the confirmed state.
        let Some(multicast_status) = self
            .wait_for_multicast_status(session, &mut latch)
            .await
        else {
            error!("The confirmed controller multicast list is missing");
            self.emit(SessionEvent::RangingReconfigureFailed {
                session_handle,
                status: StatusCode::Failed,
            });
            return Err(Error::Timeout);
        };

        debug!(
            "Confirmed multicast list: {} entries, {} slots remaining",
            multicast_status.status_list.len(),
            multicast_status.remaining_multicast_list_size
        );
        let mut overall_status = StatusCode::Ok;
        for controlee_status in multicast_status.status_list.iter() {
            let address = UwbAddress::Short(controlee_status.mac_address);
            match (
                controlee_status.status,
                action.is_add(),
            ) {
                (MulticastUpdateStatusCode::OkMulticastListUpdate, true) => {
                    session.add_controlee(address);
                    self.emit(SessionEvent::ControleeAdded { session_handle, address });
                }
                (MulticastUpdateStatusCode::OkMulticastListUpdate, false) => {
                    session.remove_controlee(address);
                    self.emit(SessionEvent::ControleeRemoved { session_handle, address });
                }
                (status, true) => {
                    overall_status = multicast_status_to_status_code(status);
                    self.emit(SessionEvent::ControleeAddFailed {
                        session_handle,
                        address: Some(address),
                        status: multicast_status_to_status_code(status),
                    });
                }
                (status, false) => {
                    overall_status = multicast_status_to_status_code(status);
                    self.emit(SessionEvent::ControleeRemoveFailed {
                        session_handle,
                        address: Some(address),
                        status: multicast_status_to_status_code(status),
                    });
                }
            }
        }

        if overall_status.is_ok() {
            self.emit(SessionEvent::RangingReconfigured { session_handle });
            Ok(())
        } else {
            self.emit(SessionEvent::RangingReconfigureFailed {
                session_handle,
                status: overall_status,
            });
            Err(Error::Uci(overall_status))
        }
    }

    fn emit_controlee_command_failed(
        &self,
        session_handle: SessionHandle,
        action: UpdateMulticastListAction,
        status: StatusCode,
    ) {
        if action.is_add() {
            self.emit(SessionEvent::ControleeAddFailed { session_handle, address: None, status });
        } else {
            self.emit(SessionEvent::ControleeRemoveFailed {
                session_handle,
                address: None,
                status,
            });
        }
    }

    async fn wait_for_multicast_status(
        &self,
        session: &Arc<UwbSession>,
        latch: &mut watch::Receiver<u64>,
    ) -> Option<MulticastListUpdateStatus> {
        let deadline = Duration::from_millis(RANGING_SESSION_OPEN_THRESHOLD_MS);
        loop {
            if let Some(status) = session.take_multicast_list_update_status() {
                return Some(status);
            }
            if session.wait_latch(latch, deadline).await.is_err() {
                return None;
            }
        }
    }

    // ---------- Close ----------

    async fn handle_deinit_session(
        &mut self,
        session_handle: SessionHandle,
        close_reason: RangingChangeReason,
    ) -> Result<()> {
        let session = self.session(session_handle)?;

        let status = match timeout(
            Duration::from_millis(RANGING_SESSION_CLOSE_THRESHOLD_MS),
            self.do_deinit_session(&session),
        )
        .await
        {
            Ok(Ok(())) => StatusCode::Ok,
            Ok(Err(e)) => {
                // Transport failures during deinit are logged; the session is
                // removed regardless.
                warn!("Failed to deinit session {}: {:?}", session.session_id(), e);
                e.to_status_code()
            }
            Err(_) => {
                info!("Failed to deinit session - status: TIMEOUT");
                StatusCode::Failed
            }
        };

        session.stop_timers();
        self.cleanup_session(&session);
        self.session_table.remove(session_handle);

        // Notify about the closure after removing the session from the table.
        info!("onRangingClosed - status: {:?}", status);
        self.emit(SessionEvent::RangingClosed {
            session_handle,
            reason: close_reason,
            status,
        });
        Ok(())
    }

    async fn do_deinit_session(&self, session: &Arc<UwbSession>) -> Result<()> {
        let mut latch = session.subscribe_latch();
        session.set_operation(OperationType::Deinit);
        self.uci_manager
            .session_deinit(session.session_id(), session.chip_id())
            .await?;
        self.wait_for_state(
            session,
            &mut latch,
            SessionState::Deinit,
            Duration::from_millis(RANGING_SESSION_CLOSE_THRESHOLD_MS),
        )
        .await
    }

    /// The deferred handler of an unsolicited SESSION_STATUS_NTF(Deinit):
    /// the controller already destroyed the session, clean up our side.
    fn handle_on_deinit(&mut self, session_id: SessionId) {
        let Some(session) = self.session_table.get_by_id(session_id) else {
            info!("onDeinit: ignoring already deleted session {}", session_id);
            return;
        };
        debug!("onDeinit: {}", session_id);
        session.set_operation(OperationType::OnDeinit);
        session.stop_timers();
        self.cleanup_session(&session);
        self.session_table.remove(session.session_handle());
        self.emit(SessionEvent::RangingClosed {
            session_handle: session.session_handle(),
            reason: RangingChangeReason::SystemPolicy,
            status: StatusCode::Ok,
        });
    }

    /// The shared close bookkeeping: uid index, advertiser records, pose
    /// source.
    fn cleanup_session(&mut self, session: &Arc<UwbSession>) {
        self.remove_advertiser_data(session);
        if session.acquired_default_pose() {
            session.release_default_pose();
        }
        self.unindex_non_privileged_session(session);
    }

    fn remove_advertiser_data(&self, session: &Arc<UwbSession>) {
        let mut advertise_manager = self.advertise_manager.lock().unwrap();
        for remote_address in session.remote_mac_addresses() {
            advertise_manager.remove_advertise_target(remote_address);
        }
    }

    // ---------- Data path ----------

    async fn handle_send_data(
        &mut self,
        session_handle: SessionHandle,
        address: UwbAddress,
        payload: Vec<u8>,
    ) -> Result<()> {
        let Ok(session) = self.session(session_handle) else {
            info!("sendData: unknown session handle {}", session_handle);
            self.emit(SessionEvent::DataSendFailed {
                session_handle,
                address,
                status: StatusCode::ErrorSessionNotExist,
            });
            return Err(Error::UnknownSessionHandle(session_handle));
        };

        match timeout(
            Duration::from_millis(RANGING_SESSION_OPEN_THRESHOLD_MS),
            self.do_send_data(&session, address, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                info!("Failed to send data - status: TIMEOUT");
                self.emit(SessionEvent::DataSendFailed {
                    session_handle,
                    address,
                    status: StatusCode::Failed,
                });
                Err(Error::Timeout)
            }
        }
    }

    async fn do_send_data(
        &self,
        session: &Arc<UwbSession>,
        address: UwbAddress,
        payload: Vec<u8>,
    ) -> Result<()> {
        let session_handle = session.session_handle();
        // Application data only moves on an active session.
        if session.state() != SessionState::Active {
            info!("sendData: session {} is not active", session.session_id());
            self.emit(SessionEvent::DataSendFailed {
                session_handle,
                address,
                status: StatusCode::Failed,
            });
            return Err(Error::Rejected);
        }
        if payload.is_empty() {
            self.emit(SessionEvent::DataSendFailed {
                session_handle,
                address,
                status: StatusCode::InvalidParam,
            });
            return Err(Error::BadParameters);
        }

        session.set_operation(OperationType::SendData);
        let sequence_number = session.next_data_sequence_number();
        session.add_send_data_info(
            sequence_number,
            SendDataInfo { address, payload: payload.clone() },
        );

        if let Err(e) = self
            .uci_manager
            .send_data_packet(
                session.session_id(),
                address.to_extended_bytes(),
                sequence_number,
                payload,
                session.chip_id(),
            )
            .await
        {
            error!(
                "sendData error {:?} for session {}, sequence number {}",
                e,
                session.session_id(),
                sequence_number
            );
            session.remove_send_data_info(sequence_number);
            self.emit(SessionEvent::DataSendFailed {
                session_handle,
                address,
                status: e.to_status_code(),
            });
            return Err(e);
        }
        Ok(())
    }

    // ---------- DT-Tag ranging rounds ----------

    async fn handle_update_dt_tag_ranging_rounds(
        &mut self,
        session_handle: SessionHandle,
        ranging_round_indexes: Vec<u8>,
    ) -> Result<()> {
        let session = self.session(session_handle)?;
        session.set_operation(OperationType::UpdateDtTagRounds);

        let response = match timeout(
            Duration::from_millis(RANGING_ROUNDS_UPDATE_DT_TAG_THRESHOLD_MS),
            self.uci_manager.session_update_dt_tag_ranging_rounds(
                session.session_id(),
                ranging_round_indexes,
                session.chip_id(),
            ),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                info!("Failed to update the DT-Tag ranging rounds: {:?}", e);
                self.emit(SessionEvent::RangingRoundsUpdateDtTagStatus {
                    session_handle,
                    status: StatusCode::ErrorRoundIndexNotActivated,
                    ranging_round_indexes: vec![],
                });
                return Err(e);
            }
            Err(_) => {
                info!("Failed to update the DT-Tag ranging rounds - status: TIMEOUT");
                self.emit(SessionEvent::RangingRoundsUpdateDtTagStatus {
                    session_handle,
                    status: StatusCode::ErrorRoundIndexNotActivated,
                    ranging_round_indexes: vec![],
                });
                return Err(Error::Timeout);
            }
        };

        self.emit(SessionEvent::RangingRoundsUpdateDtTagStatus {
            session_handle,
            status: response.status,
            ranging_round_indexes: response.ranging_round_indexes,
        });
        Ok(())
    }

    // ---------- Data transfer phase config ----------

    async fn handle_set_data_transfer_phase_config(
        &mut self,
        session_handle: SessionHandle,
        config: SessionDataTransferPhaseConfig,
    ) -> Result<()> {
        let session = self.session(session_handle)?;
        if !session.session_type().supports_data_transfer_phase() {
            error!(
                "setDataTransferPhaseConfig not applicable for session type {:?}",
                session.session_type()
            );
            self.emit(SessionEvent::DataTransferPhaseConfigFailed {
                session_handle,
                status: DataTransferPhaseConfigNtfStatusCode::ErrorConfig,
            });
            return Err(Error::BadParameters);
        }

        // Every management entry must match the address length and slot
        // bitmap size selected by the control byte.
        let address_size = config.address_size();
        let slot_bitmap_size = config.slot_bitmap_size();
        let mut mac_address = Vec::with_capacity(config.management_list.len() * address_size);
        let mut slot_bitmap = Vec::with_capacity(config.management_list.len() * slot_bitmap_size);
        for entry in config.management_list.iter() {
            if entry.uwb_address.len() != address_size
                || entry.slot_bitmap.len() != slot_bitmap_size
            {
                error!("setDataTransferPhaseConfig: slot bitmap size or address is not matching");
                self.emit(SessionEvent::DataTransferPhaseConfigFailed {
                    session_handle,
                    status: DataTransferPhaseConfigNtfStatusCode::ErrorInvalidSlotBitmap,
                });
                return Err(Error::BadParameters);
            }
            mac_address.extend(entry.uwb_address.to_bytes());
            slot_bitmap.extend(entry.slot_bitmap.iter());
        }

        session.set_operation(OperationType::DataTransferPhaseConfig);
        let result = match timeout(
            Duration::from_millis(DATA_TRANSFER_PHASE_CONFIG_THRESHOLD_MS),
            self.uci_manager.session_data_transfer_phase_config(
                session.session_id(),
                config.dtpcm_repetition,
                config.data_transfer_control,
                config.management_list.len() as u8,
                mac_address,
                slot_bitmap,
                session.chip_id(),
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };

        if let Err(e) = result {
            info!("Failed to set the data transfer phase config: {:?}", e);
            self.emit(SessionEvent::DataTransferPhaseConfigFailed {
                session_handle,
                status: DataTransferPhaseConfigNtfStatusCode::ErrorConfig,
            });
            return Err(e);
        }
        // The terminal outcome arrives via the phase config notification.
        Ok(())
    }

    // ---------- Hybrid session ----------

    async fn handle_set_hybrid_session_config(
        &mut self,
        session_handle: SessionHandle,
        config: HybridSessionConfig,
    ) -> Result<()> {
        let session = self.session(session_handle)?;
        info!(
            "setHybridSessionConfiguration - session {}, numberOfPhases: {}",
            session.session_id(),
            config.phase_list.len(),
        );

        // Each phase element is serialized little-endian as
        // (session token: u32, start slot: u16, end slot: u16).
        let mut phase_list_bytes =
            Vec::with_capacity(config.phase_list.len() * HYBRID_PHASE_ELEMENT_SIZE);
        for phase in config.phase_list.iter() {
            let reference_id = self
                .session_table
                .session_id_of(phase.session_handle)
                .ok_or(Error::BadParameters)?;
            let token = match self.session_table.session_token(reference_id) {
                Some(token) => token,
                None => {
                    self.uci_manager
                        .get_session_token_from_session_id(reference_id, session.chip_id())
                        .await?
                }
            };
            phase_list_bytes.extend(u32_to_bytes(token));
            phase_list_bytes.extend(u16_to_bytes(phase.start_slot_index));
            phase_list_bytes.extend(u16_to_bytes(phase.end_slot_index));
        }

        self.uci_manager
            .session_set_hybrid_controller_config(
                session.session_id(),
                config.phase_list.len() as u8,
                config.update_time,
                phase_list_bytes,
                session.chip_id(),
            )
            .await
    }

    // ---------- App state transitions ----------

    fn index_non_privileged_session(&mut self, session: &Arc<UwbSession>) {
        if session.session_type() != SessionType::FiraRangingSession {
            return;
        }
        if let Some(link) = session.non_privileged_link() {
            debug!("Tracking non-privileged FiRa session of uid {}", link.uid);
            self.non_privileged_uid_sessions
                .entry(link.uid)
                .or_default()
                .push(session.session_handle());
        }
    }

    fn unindex_non_privileged_session(&mut self, session: &Arc<UwbSession>) {
        if let Some(link) = session.non_privileged_link() {
            if let Some(handles) = self.non_privileged_uid_sessions.get_mut(&link.uid) {
                handles.retain(|handle| *handle != session.session_handle());
                if handles.is_empty() {
                    self.non_privileged_uid_sessions.remove(&link.uid);
                }
            }
        }
    }

    async fn handle_uid_importance(&mut self, uid: u32, foreground: bool) {
        let Some(handles) = self.non_privileged_uid_sessions.get(&uid).cloned() else {
            // Not a uid in the watch list.
            return;
        };
        for session_handle in handles {
            let Ok(session) = self.session(session_handle) else {
                continue;
            };
            if session.has_non_privileged_fg_app() == foreground {
                // Already at the correct state.
                continue;
            }
            session.set_has_non_privileged_fg_app(foreground);
            info!(
                "App state change for session {}. IsFg: {}",
                session.session_id(),
                foreground
            );

            // Reconfigure the notification control based on the new fg/bg
            // state, and re-derive the priority band.
            self.reconfigure_on_fg_state_change(&session).await;
            session.recalculate_stack_priority(self.policy.as_ref());

            if !self.policy.is_background_ranging_enabled() {
                // A non-privileged app in the background only gets a bounded
                // window before its session is stopped.
                if !foreground {
                    let internal_cmd_sender = self.internal_cmd_sender.clone();
                    session.start_bg_app_timer_if_not_set(
                        NON_PRIVILEGED_BG_APP_TIMEOUT_MS,
                        move || {
                            let _ = internal_cmd_sender.send(
                                InternalCommand::StopRangingSystemPolicy { session_handle },
                            );
                        },
                    );
                } else {
                    session.stop_bg_app_timer_if_set();
                }
            }
        }
    }

    /// Apply the live notification-control override for the session's current
    /// fg/bg state. The stored params stay untouched.
    async fn reconfigure_on_fg_state_change(&self, session: &Arc<UwbSession>) {
        let Some(reconfigure_params) = session.fg_state_reconfigure_params() else {
            return;
        };
        let result = match timeout(
            Duration::from_millis(RANGING_SESSION_OPEN_THRESHOLD_MS),
            self.do_reconfigure(session, reconfigure_params, true),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };
        if let Err(e) = result {
            warn!(
                "Failed to reconfigure session {} on fg state change: {:?}",
                session.session_id(),
                e
            );
        }
    }

    // ---------- Bulk operations ----------

    async fn handle_stop_all_ranging(&mut self) {
        debug!("stopAllRanging()");
        for session in self.session_table.all_sessions() {
            if session.state() != SessionState::Active {
                continue;
            }
            match self
                .uci_manager
                .range_stop(session.session_id(), session.chip_id())
                .await
            {
                Ok(()) => session.set_state(
                    SessionState::Idle,
                    ReasonCode::StateChangeWithSessionManagementCommands,
                ),
                Err(e) => info!(
                    "stopAllRanging: session {} failed to stop: {:?}",
                    session.session_id(),
                    e
                ),
            }
        }
    }

    fn handle_deinit_all_sessions(&mut self) {
        debug!("deinitAllSessions()");
        for session in self.session_table.all_sessions() {
            self.handle_on_deinit(session.session_id());
        }
    }

    // ---------- Waiting ----------

    /// The per-operation deadline of the start/stop handlers.
    fn start_stop_deadline(&self, session: &Arc<UwbSession>) -> Duration {
        let mut deadline_ms = RANGING_SESSION_START_THRESHOLD_MS;
        if let Some(interval_ms) = session.current_fira_ranging_interval_ms() {
            deadline_ms = deadline_ms.max(4 * interval_ms as u64);
        }
        Duration::from_millis(deadline_ms)
    }

    /// Wait until the session reaches the expected state: check first (the
    /// notification may already have been routed), then block on the latch
    /// once and re-check.
    async fn wait_for_state(
        &self,
        session: &Arc<UwbSession>,
        latch: &mut watch::Receiver<u64>,
        expected_state: SessionState,
        deadline: Duration,
    ) -> Result<()> {
        if session.state() == expected_state {
            return Ok(());
        }
        session.wait_latch(latch, deadline).await?;

        let state = session.state();
        if state != expected_state {
            error!(
                "Transited to the wrong state {:?}; the expected state is {:?}",
                state, expected_state
            );
            return Err(Error::Uci(StatusCode::Failed));
        }
        Ok(())
    }
}

/// Pack the requested controlee entries into the wire shape of the action.
/// The sub-session id list defaults to zeroes when omitted.
fn build_controlees(
    action: UpdateMulticastListAction,
    address_list: &[UwbAddress],
    params: &FiraRangingReconfigureParams,
) -> Option<Controlees> {
    let mut short_addresses = Vec::with_capacity(address_list.len());
    for address in address_list {
        match address {
            UwbAddress::Short(short_address) => short_addresses.push(*short_address),
            UwbAddress::Extended(_) => {
                error!("Multicast update only takes short controlee addresses");
                return None;
            }
        }
    }

    let sub_session_ids = match params.sub_session_id_list.as_ref() {
        Some(sub_session_ids) if !sub_session_ids.is_empty() => {
            if sub_session_ids.len() != short_addresses.len() {
                return None;
            }
            sub_session_ids.clone()
        }
        // Set to 0's for the UCI stack.
        _ => vec![0; short_addresses.len()],
    };

    if action.needs_sub_session_key() {
        let sub_session_keys = params.sub_session_key_list.clone().unwrap_or_default();
        if sub_session_keys.len() != short_addresses.len() {
            return None;
        }
        let expected_key_len =
            if action == UpdateMulticastListAction::AddControleeWithShortSubSessionKey {
                16
            } else {
                32
            };
        if sub_session_keys.iter().any(|key| key.len() != expected_key_len) {
            return None;
        }
        let controlees = short_addresses
            .into_iter()
            .zip(sub_session_ids)
            .zip(sub_session_keys)
            .map(|((short_address, sub_session_id), session_key)| ControleeWithSessionKey {
                short_address,
                sub_session_id,
                session_key,
            })
            .collect();
        if action == UpdateMulticastListAction::AddControleeWithShortSubSessionKey {
            Some(Controlees::ShortSessionKey(controlees))
        } else {
            Some(Controlees::LongSessionKey(controlees))
        }
    } else {
        Some(Controlees::NoSessionKey(
            short_addresses
                .into_iter()
                .zip(sub_session_ids)
                .map(|(short_address, sub_session_id)| Controlee { short_address, sub_session_id })
                .collect(),
        ))
    }
}

// ---------- Notification routing ----------

struct NotificationRouter {
    uci_notf_receiver: mpsc::UnboundedReceiver<UciSessionNotification>,
    session_table: Arc<SessionTable>,
    policy: Arc<dyn PolicyOracle>,
    advertise_manager: Arc<Mutex<AdvertiseManager>>,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    internal_cmd_sender: mpsc::UnboundedSender<InternalCommand>,
}

impl NotificationRouter {
    async fn run(mut self) {
        while let Some(notf) = self.uci_notf_receiver.recv().await {
            self.handle_notification(notf);
        }
        debug!("NotificationRouter is about to drop.");
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_sender.send(event);
    }

    fn handle_notification(&mut self, notf: UciSessionNotification) {
        match notf {
            UciSessionNotification::SessionStatus {
                session_id,
                session_state,
                reason_code,
            } => self.handle_session_status(session_id, session_state, reason_code),
            UciSessionNotification::SessionUpdateControllerMulticastList {
                session_id,
                remaining_multicast_list_size,
                status_list,
            } => {
                let Some(session) = self.session_table.get_by_id(session_id) else {
                    debug!("Multicast update notification for an invalid session");
                    return;
                };
                debug!(
                    "Multicast update ntf: {} entries, {} slots remaining",
                    status_list.len(),
                    remaining_multicast_list_size
                );
                session.set_multicast_list_update_status(MulticastListUpdateStatus {
                    remaining_multicast_list_size,
                    status_list,
                });
                session.notify_latch();
            }
            UciSessionNotification::RangeData(range_data) => self.handle_range_data(range_data),
            UciSessionNotification::DataReceived(data) => self.handle_data_received(data),
            UciSessionNotification::DataTransferStatus {
                session_id,
                uci_sequence_number,
                status,
                tx_count,
            } => self.handle_data_transfer_status(
                session_id,
                uci_sequence_number,
                status,
                tx_count,
            ),
            UciSessionNotification::RadarData(radar_data) => self.handle_radar_data(radar_data),
            UciSessionNotification::DataTransferPhaseConfig { session_id, status } => {
                let Some(session) = self.session_table.get_by_id(session_id) else {
                    error!("Phase config notification for unknown session {}", session_id);
                    return;
                };
                if status == DataTransferPhaseConfigNtfStatusCode::ConfigSuccess {
                    self.emit(SessionEvent::DataTransferPhaseConfigured {
                        session_handle: session.session_handle(),
                        status,
                    });
                } else {
                    self.emit(SessionEvent::DataTransferPhaseConfigFailed {
                        session_handle: session.session_handle(),
                        status,
                    });
                }
            }
        }
    }

    fn handle_session_status(
        &mut self,
        session_id: SessionId,
        session_state: SessionState,
        reason_code: ReasonCode,
    ) {
        info!(
            "SessionStatus notification - session: {}, state: {:?}, reason: {:?}",
            session_id, session_state, reason_code
        );
        let Some(session) = self.session_table.get_by_id(session_id) else {
            debug!("Session status notification for an invalid session");
            return;
        };

        let prev_state = session.state();
        session.set_state(session_state, reason_code);

        match session_state {
            SessionState::Idle => {
                // A remote-initiated stop surfaces here; a local stop reports
                // from its own command handler.
                if prev_state == SessionState::Active
                    && reason_code != ReasonCode::StateChangeWithSessionManagementCommands
                {
                    self.emit(SessionEvent::RangingStopped {
                        session_handle: session.session_handle(),
                        reason: RangingChangeReason::from_reason_code(reason_code),
                        status: reason_code_to_status_code(reason_code),
                        stopped_params: vec![],
                    });
                }
            }
            SessionState::Deinit => {
                // The controller destroyed the session on its own; hand the
                // cleanup to the event loop.
                if session.operation() != OperationType::Deinit {
                    let _ = self
                        .internal_cmd_sender
                        .send(InternalCommand::OnDeinit { session_id });
                }
            }
            _ => {}
        }

        session.notify_latch();
    }

    fn handle_range_data(&mut self, range_data: SessionRangeData) {
        let Some(session) = self.session_table.get_by_id(range_data.session_id) else {
            info!("Session is not initialized or the ranging data is for an unknown session");
            return;
        };

        // Re-check the data delivery permission; a revoked app must not see
        // any more results, and learns nothing about the drop.
        if session.data_delivery_permission_check_needed()
            && !self.policy.has_data_delivery_permission(session.attribution_source())
        {
            debug!("Dropping the ranging result: permission denied");
            return;
        }

        self.emit(SessionEvent::RangingResult {
            session_handle: session.session_handle(),
            range_data: range_data.clone(),
        });

        self.process_owr_aoa_data(&session, &range_data);

        // Supervise the ranging-error streak: the timer arms on the first
        // all-error frame and is disarmed by any success.
        let streak_timeout_ms = session.ranging_error_streak_timeout_ms();
        if self.policy.is_ranging_error_streak_timer_enabled()
            && streak_timeout_ms != RANGING_RESULT_ERROR_NO_TIMEOUT
        {
            if range_data.all_measurements_in_error() {
                let internal_cmd_sender = self.internal_cmd_sender.clone();
                let session_handle = session.session_handle();
                session.start_ranging_error_streak_timer_if_not_set(streak_timeout_ms, move || {
                    let _ = internal_cmd_sender
                        .send(InternalCommand::StopRangingSystemPolicy { session_handle });
                });
            } else {
                session.stop_ranging_error_streak_timer_if_set();
            }
        }
    }

    /// Fold an OWR-AoA measurement into the advertise records, and release
    /// the peer's buffered payloads once the observer points at it.
    fn process_owr_aoa_data(&mut self, session: &Arc<UwbSession>, range_data: &SessionRangeData) {
        let RangingMeasurements::OwrAoa(measurement) = &range_data.ranging_measurements else {
            return;
        };
        if !session.is_owr_aoa_observer() {
            info!("OwrAoa measurement on a session that is not an OWR-AoA observer");
            return;
        }

        let address = measurement.mac_address.as_u64();
        let now = tokio::time::Instant::now().into_std();
        let pointed = {
            let mut advertise_manager = self.advertise_manager.lock().unwrap();
            advertise_manager.update_advertise_target(address, measurement, now);
            advertise_manager.is_pointed_target(address, now)
        };
        if !pointed {
            return;
        }

        let received_data = session.take_all_received_data(address);
        if received_data.is_empty() {
            debug!("OwrAoa: no application payload data found for {:#X}", address);
            return;
        }
        // Release in ascending sequence-number order.
        let release_address = UwbAddress::Extended(address.to_le_bytes());
        for info in received_data {
            self.emit(SessionEvent::DataReceived {
                session_handle: session.session_handle(),
                address: release_address,
                payload: info.payload,
            });
        }
        self.advertise_manager.lock().unwrap().remove_advertise_target(address);
    }

    fn handle_data_received(&mut self, data: DataRcvNotification) {
        let Some(session) = self.session_table.get_by_id(data.session_id) else {
            error!("Received data for unknown session {}", data.session_id);
            return;
        };

        // The address of a DATA_MESSAGE_RCV is always expected in the
        // extended form (a short MacAddress is zero-extended).
        let UwbAddress::Extended(address_bytes) = data.source_address else {
            error!(
                "Received data for session {} with an unexpected address length {}",
                data.session_id,
                data.source_address.len()
            );
            return;
        };

        if data.status != DataRcvStatusCode::Ok {
            self.emit(SessionEvent::DataReceiveFailed {
                session_handle: session.session_handle(),
                address: data.source_address,
                status: data_rcv_status_to_status_code(data.status),
            });
            return;
        }

        if !session.is_owr_aoa_observer() {
            // Everything except the OWR-AoA observer case goes straight up.
            self.emit(SessionEvent::DataReceived {
                session_handle: session.session_handle(),
                address: data.source_address,
                payload: data.payload,
            });
            return;
        }

        session.add_received_data(
            ReceivedDataInfo {
                sequence_number: data.uci_sequence_number,
                address: u64::from_le_bytes(address_bytes),
                payload: data.payload,
            },
            self.policy.rx_data_max_packets_to_store(),
        );
    }

    fn handle_data_transfer_status(
        &mut self,
        session_id: SessionId,
        uci_sequence_number: u16,
        status: DataTransferNtfStatusCode,
        tx_count: u8,
    ) {
        let Some(session) = self.session_table.get_by_id(session_id) else {
            error!("Data send status for unknown session {}", session_id);
            return;
        };
        let Some(send_data_info) = session.send_data_info(uci_sequence_number) else {
            error!(
                "No SendDataInfo found for the data packet (session {}, sequence number {})",
                session_id, uci_sequence_number
            );
            return;
        };

        if status.is_ok() {
            self.emit(SessionEvent::DataSent {
                session_handle: session.session_handle(),
                address: send_data_info.address,
            });
        } else {
            self.emit(SessionEvent::DataSendFailed {
                session_handle: session.session_handle(),
                address: send_data_info.address,
                status: data_transfer_status_to_status_code(status),
            });
            session.remove_send_data_info(uci_sequence_number);
        }

        // When the transmission count covers the configured repetitions, the
        // packet's bookkeeping is complete.
        if status == DataTransferNtfStatusCode::Ok
            && tx_count as u32 >= session.data_repetition_count() as u32 + 1
        {
            session.remove_send_data_info(uci_sequence_number);
        }
    }

    fn handle_radar_data(&mut self, radar_data: RadarDataRcvNotification) {
        let Some(session) = self.session_table.get_by_id(radar_data.session_id) else {
            info!("Radar data for an unknown session");
            return;
        };
        if session.data_delivery_permission_check_needed()
            && !self.policy.has_data_delivery_permission(session.attribution_source())
        {
            debug!("Dropping the radar data: permission denied");
            return;
        }
        self.emit(SessionEvent::RadarDataReceived {
            session_handle: session.session_handle(),
            radar_data,
        });
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    use crate::params::ccc_app_config_params::CccStartRangingParams;
    use crate::params::fira_app_config_params::{RangeDataNtfConfig, SuspendRanging};
    use crate::params::uci_packets::{
        AppConfigTlvType, DataTransferNtfStatusCode, DataTransferPhaseManagementEntry,
        HybridSessionPhaseList, MulticastUpdateStatusCode,
        SessionUpdateDtTagRangingRoundsResponse,
    };
    use crate::params::utils::u8_to_bytes;
    use crate::session::callback::mock_session_callback::MockSessionCallback;
    use crate::session::policy::StaticPolicy;
    use crate::uci::mock_uci_manager::MockUciManager;
    use crate::utils::init_test_logging;

    const CHIP_ID: &str = "default";
    const PRIVILEGED_UID: u32 = 1000;
    const APP_UID: u32 = 10001;

    struct TestHarness {
        session_manager: SessionManager,
        uci_manager: MockUciManager,
        callback: MockSessionCallback,
        policy: Arc<StaticPolicy>,
        notf_sender: mpsc::UnboundedSender<UciSessionNotification>,
    }

    fn setup_session_manager(
        policy: StaticPolicy,
        uci_version: UciProtocolVersion,
        setup_uci_manager_fn: impl FnOnce(&mut MockUciManager),
    ) -> TestHarness {
        init_test_logging();

        let (notf_sender, notf_receiver) = mpsc::unbounded_channel();
        let mut uci_manager = MockUciManager::new();
        uci_manager.set_session_notification_sender(notf_sender.clone());
        setup_uci_manager_fn(&mut uci_manager);

        let callback = MockSessionCallback::new();
        let policy = Arc::new(policy);
        let session_manager = SessionManager::new(
            uci_manager.clone(),
            notf_receiver,
            callback.clone(),
            policy.clone(),
            uci_version,
        );
        TestHarness { session_manager, uci_manager, callback, policy, notf_sender }
    }

    fn privileged_policy() -> StaticPolicy {
        let policy = StaticPolicy::new();
        policy.add_privileged_uid(PRIVILEGED_UID);
        policy
    }

    fn privileged_source() -> AttributionSource {
        AttributionSource::new(PRIVILEGED_UID, "com.android.uwb")
    }

    fn expect_session_open(
        uci_manager: &mut MockUciManager,
        session_id: SessionId,
        session_type: SessionType,
    ) {
        uci_manager.expect_session_init(
            session_id,
            session_type,
            vec![session_status_notf(
                session_id,
                SessionState::Init,
                ReasonCode::StateChangeWithSessionManagementCommands,
            )],
            Ok(()),
        );
        uci_manager.expect_get_session_token_from_session_id(
            session_id,
            Ok(0x1000 + session_id),
        );
        uci_manager.expect_session_set_app_config_any_tlvs(
            session_id,
            vec![session_status_notf(
                session_id,
                SessionState::Idle,
                ReasonCode::StateChangeWithSessionManagementCommands,
            )],
            Ok(set_app_config_ok()),
        );
    }

    async fn open_session(
        harness: &TestHarness,
        session_handle: SessionHandle,
        session_id: SessionId,
        session_type: SessionType,
        source: AttributionSource,
        params: AppConfigParams,
    ) {
        harness
            .session_manager
            .init_session(
                source,
                session_handle,
                session_id,
                session_type,
                CHIP_ID.to_string(),
                params,
            )
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_open_start_stop_close() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_range_stop(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Idle,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_session_deinit(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Deinit,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();
        harness.session_manager.stop_ranging(session_handle).await.unwrap();
        harness.session_manager.deinit_session(session_handle).await.unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(4).await);
        let events = harness.callback.received();
        assert_eq!(events[0], SessionEvent::RangingOpened { session_handle });
        assert!(matches!(
            &events[1],
            SessionEvent::RangingStarted {
                session_handle: handle,
                params: Some(RangingStartedParams::Fira(_)),
            } if *handle == session_handle
        ));
        assert_eq!(
            events[2],
            SessionEvent::RangingStopped {
                session_handle,
                reason: RangingChangeReason::LocalApi,
                status: StatusCode::Ok,
                stopped_params: vec![],
            }
        );
        assert_eq!(
            events[3],
            SessionEvent::RangingClosed {
                session_handle,
                reason: RangingChangeReason::LocalApi,
                status: StatusCode::Ok,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_duplicated_session_rejected() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        let result = harness
            .session_manager
            .init_session(
                privileged_source(),
                session_handle,
                session_id,
                SessionType::FiraRangingSession,
                CHIP_ID.to_string(),
                fira_controller_params(),
            )
            .await;
        assert_eq!(result, Err(Error::DuplicatedSessionHandle(session_handle)));

        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::RangingOpenFailed {
                session_handle,
                reason: RangingChangeReason::BadParameters,
                status: StatusCode::ErrorSessionDuplicate,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejected_for_background_app() {
        let session_handle = 1;

        // Background ranging is disallowed and the app's uid is not in the
        // foreground.
        let harness =
            setup_session_manager(StaticPolicy::new(), UciProtocolVersion::V1_1, |_| {});

        let result = harness
            .session_manager
            .init_session(
                AttributionSource::new(APP_UID, "com.example.app"),
                session_handle,
                7,
                SessionType::FiraRangingSession,
                CHIP_ID.to_string(),
                fira_controller_params(),
            )
            .await;
        assert_eq!(result, Err(Error::ForegroundPolicy));

        assert!(harness.callback.wait_received_count(1).await);
        assert_eq!(
            harness.callback.received()[0],
            SessionEvent::RangingOpenFailed {
                session_handle,
                reason: RangingChangeReason::SystemPolicy,
                status: StatusCode::Failed,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_timeout_tears_down_session() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                // The controller accepts the command but never sends the Init
                // state notification.
                uci_manager.expect_session_init(
                    session_id,
                    SessionType::FiraRangingSession,
                    vec![],
                    Ok(()),
                );
                uci_manager
                    .expect_get_session_token_from_session_id(session_id, Ok(0x1000 + session_id));
                uci_manager.expect_session_deinit(session_id, vec![], Ok(()));
            },
        );

        let result = harness
            .session_manager
            .init_session(
                privileged_source(),
                session_handle,
                session_id,
                SessionType::FiraRangingSession,
                CHIP_ID.to_string(),
                fira_controller_params(),
            )
            .await;
        assert_eq!(result, Err(Error::Timeout));

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(1).await);
        assert_eq!(
            harness.callback.received()[0],
            SessionEvent::RangingOpenFailed {
                session_handle,
                reason: RangingChangeReason::Unknown,
                status: StatusCode::Failed,
            }
        );

        // The session is gone; a start on it reports an unknown handle.
        let result = harness.session_manager.start_ranging(session_handle, None).await;
        assert_eq!(result, Err(Error::UnknownSessionHandle(session_handle)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_sessions_with_eviction() {
        let low_handle = 1;
        let mid_handle = 2;
        let new_handle = 3;

        let policy = privileged_policy();
        let mut harness =
            setup_session_manager(policy.max_fira_sessions(2), UciProtocolVersion::V1_1, {
                |uci_manager| {
                    expect_session_open(uci_manager, 0x11, SessionType::FiraRangingSession);
                    expect_session_open(uci_manager, 0x22, SessionType::FiraRangingSession);
                    // The lowest-priority session is evicted before the new
                    // session opens.
                    uci_manager.expect_session_deinit(
                        0x11,
                        vec![session_status_notf(
                            0x11,
                            SessionState::Deinit,
                            ReasonCode::StateChangeWithSessionManagementCommands,
                        )],
                        Ok(()),
                    );
                    expect_session_open(uci_manager, 0x33, SessionType::FiraRangingSession);
                }
            });

        let open_with_priority = |handle, session_id, priority| {
            let params = fira_controller_params_builder().session_priority(priority).build().unwrap();
            let manager = &harness.session_manager;
            async move {
                manager
                    .init_session(
                        privileged_source(),
                        handle,
                        session_id,
                        SessionType::FiraRangingSession,
                        CHIP_ID.to_string(),
                        params,
                    )
                    .await
            }
        };

        open_with_priority(low_handle, 0x11, 40).await.unwrap();
        open_with_priority(mid_handle, 0x22, 60).await.unwrap();
        // Priority 70 evicts the priority-40 session.
        open_with_priority(new_handle, 0x33, 70).await.unwrap();
        // Priority 10 is below every existing session: rejected.
        let result = open_with_priority(4, 0x44, 10).await;
        assert_eq!(result, Err(Error::MaxSessionsExceeded));

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(5).await);
        let events = harness.callback.received();
        assert_eq!(events[0], SessionEvent::RangingOpened { session_handle: low_handle });
        assert_eq!(events[1], SessionEvent::RangingOpened { session_handle: mid_handle });
        assert_eq!(
            events[2],
            SessionEvent::RangingClosed {
                session_handle: low_handle,
                reason: RangingChangeReason::MaxSessionsReached,
                status: StatusCode::Ok,
            }
        );
        assert_eq!(events[3], SessionEvent::RangingOpened { session_handle: new_handle });
        assert_eq!(
            events[4],
            SessionEvent::RangingOpenFailed {
                session_handle: 4,
                reason: RangingChangeReason::MaxSessionsReached,
                status: StatusCode::ErrorMaxSessionsExceeded,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranging_error_streak_stops_session() {
        let session_handle = 1;
        let session_id = 7;
        let streak_timeout_ms = 5_000;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_range_stop(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Idle,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
            },
        );

        let params = fira_controller_params_builder()
            .ranging_error_streak_timeout_ms(streak_timeout_ms)
            .build()
            .unwrap();
        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            params,
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();

        // Five frames, each 1000 ms apart, with every measurement in error.
        for _ in 0..5 {
            harness
                .notf_sender
                .send(two_way_range_data_notf(
                    session_id,
                    vec![StatusCode::RangingRxTimeout, StatusCode::RangingTxFailed],
                ))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1_000)).await;
        }
        // Cross the streak deadline without any successful frame.
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        // Open + start + 5 results + the policy-triggered stop.
        assert!(harness.callback.wait_received_count(8).await);
        let events = harness.callback.received();
        assert_eq!(
            events.last().unwrap(),
            &SessionEvent::RangingStopped {
                session_handle,
                reason: RangingChangeReason::SystemPolicy,
                status: StatusCode::Ok,
                stopped_params: vec![],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranging_error_streak_cleared_by_success() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
            },
        );

        let params = fira_controller_params_builder()
            .ranging_error_streak_timeout_ms(5_000)
            .build()
            .unwrap();
        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            params,
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();

        harness
            .notf_sender
            .send(two_way_range_data_notf(session_id, vec![StatusCode::RangingRxTimeout]))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        // A successful frame disarms the streak timer.
        harness
            .notf_sender
            .send(two_way_range_data_notf(session_id, vec![StatusCode::Ok]))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10_000)).await;

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(4).await);
        // No stop was issued: the last events are the two ranging results.
        let events = harness.callback.received();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[3], SessionEvent::RangingResult { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_owr_aoa_buffered_delivery() {
        let session_handle = 1;
        let session_id = 7;
        let peer_short = [0xEF, 0xBE];
        let peer_extended = UwbAddress::Extended([0xEF, 0xBE, 0, 0, 0, 0, 0, 0]);

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            owr_aoa_observer_params(),
        )
        .await;

        // Three payloads arrive out of order and are buffered.
        for sequence_number in [5u16, 3, 4] {
            harness
                .notf_sender
                .send(data_rcv_notf(
                    session_id,
                    sequence_number,
                    peer_extended,
                    vec![sequence_number as u8],
                ))
                .unwrap();
        }
        // Three in-threshold OWR-AoA measurements make the peer a pointed
        // target; the buffered payloads are then released in order.
        for _ in 0..3 {
            harness.notf_sender.send(owr_aoa_range_data_notf(session_id, peer_short)).unwrap();
        }

        // Open + 3 results + 3 released payloads.
        assert!(harness.callback.wait_received_count(7).await);
        let data_events: Vec<_> = harness
            .callback
            .received()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::DataReceived { address, payload, .. } => Some((address, payload)),
                _ => None,
            })
            .collect();
        assert_eq!(
            data_events,
            vec![
                (peer_extended, vec![3]),
                (peer_extended, vec![4]),
                (peer_extended, vec![5]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_received_non_owr_delivered_immediately() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        // A short source address is structurally invalid on the data path and
        // is dropped.
        harness
            .notf_sender
            .send(data_rcv_notf(session_id, 1, UwbAddress::Short([1, 2]), vec![0x0F]))
            .unwrap();
        let valid_address = UwbAddress::Extended([0x01, 0xAA, 0, 0, 0, 0, 0, 0]);
        harness
            .notf_sender
            .send(data_rcv_notf(session_id, 2, valid_address, vec![0xA0]))
            .unwrap();

        assert!(harness.callback.wait_received_count(2).await);
        let events = harness.callback.received();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            SessionEvent::DataReceived {
                session_handle,
                address: valid_address,
                payload: vec![0xA0],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_multicast_add_with_provisioned_key() {
        let session_handle = 1;
        let session_id = 7;
        let key1 = vec![0x01; 16];
        let key2 = vec![0x02; 16];

        let expected_controlees = Controlees::ShortSessionKey(vec![
            ControleeWithSessionKey {
                short_address: [0x11, 0x00],
                sub_session_id: 1,
                session_key: key1.clone(),
            },
            ControleeWithSessionKey {
                short_address: [0x22, 0x00],
                sub_session_id: 2,
                session_key: key2.clone(),
            },
        ]);
        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_session_update_controller_multicast_list(
                    session_id,
                    UpdateMulticastListAction::AddControleeWithShortSubSessionKey,
                    expected_controlees,
                    vec![multicast_update_notf(
                        session_id,
                        vec![
                            ([0x11, 0x00], 1, MulticastUpdateStatusCode::OkMulticastListUpdate),
                            (
                                [0x22, 0x00],
                                2,
                                MulticastUpdateStatusCode::ErrorAddressAlreadyPresent,
                            ),
                        ],
                    )],
                    Ok(()),
                );
            },
        );

        let params = fira_controller_params_builder()
            .sts_config(StsConfig::ProvisionedForControleeIndividualKey)
            .session_key(Some(vec![0x42; 16]))
            .build()
            .unwrap();
        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            params,
        )
        .await;

        let result = harness
            .session_manager
            .reconfigure(
                session_handle,
                FiraRangingReconfigureParams {
                    action: Some(UpdateMulticastListAction::AddControleeWithShortSubSessionKey),
                    address_list: Some(vec![
                        UwbAddress::Short([0x11, 0x00]),
                        UwbAddress::Short([0x22, 0x00]),
                    ]),
                    sub_session_id_list: Some(vec![1, 2]),
                    sub_session_key_list: Some(vec![key1, key2]),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(result, Err(Error::Uci(StatusCode::ErrorAddressAlreadyPresent)));

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(4).await);
        let events = harness.callback.received();
        assert_eq!(
            events[1],
            SessionEvent::ControleeAdded {
                session_handle,
                address: UwbAddress::Short([0x11, 0x00]),
            }
        );
        assert_eq!(
            events[2],
            SessionEvent::ControleeAddFailed {
                session_handle,
                address: Some(UwbAddress::Short([0x22, 0x00])),
                status: StatusCode::ErrorAddressAlreadyPresent,
            }
        );
        assert_eq!(
            events[3],
            SessionEvent::RangingReconfigureFailed {
                session_handle,
                status: StatusCode::ErrorAddressAlreadyPresent,
            }
        );

        // The controlee list mirrors only the confirmed state: the initial
        // destination plus 0x11, but not 0x22.
        let controlees = harness.session_manager.session_controlees(session_handle).await.unwrap();
        let addresses: Vec<_> = controlees.into_iter().map(|controlee| controlee.address).collect();
        assert!(addresses.contains(&UwbAddress::Short([0x11, 0x00])));
        assert!(!addresses.contains(&UwbAddress::Short([0x22, 0x00])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_multicast_rejected_without_provisioned_sts() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        // Static STS: the 16-byte add action is not allowed.
        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        let result = harness
            .session_manager
            .reconfigure(
                session_handle,
                FiraRangingReconfigureParams {
                    action: Some(UpdateMulticastListAction::AddControleeWithShortSubSessionKey),
                    address_list: Some(vec![UwbAddress::Short([0x11, 0x00])]),
                    sub_session_key_list: Some(vec![vec![0x01; 16]]),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(result, Err(Error::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_app_notification_control() {
        let session_handle = 1;
        let session_id = 7;

        let policy = StaticPolicy::new().background_ranging_enabled(true);
        policy.set_foreground(APP_UID, true);
        let mut harness =
            setup_session_manager(policy, UciProtocolVersion::V1_1, |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                // Background: the notification control is disabled, nothing
                // else moves.
                uci_manager.expect_session_set_app_config(
                    session_id,
                    vec![AppConfigTlv::new(
                        AppConfigTlvType::SessionInfoNtfConfig,
                        u8_to_bytes(RangeDataNtfConfig::Disable as u8),
                    )],
                    vec![],
                    Ok(set_app_config_ok()),
                );
                // Foreground again: the configured bounds are restored.
                uci_manager.expect_session_set_app_config(
                    session_id,
                    vec![
                        AppConfigTlv::new(
                            AppConfigTlvType::SessionInfoNtfConfig,
                            u8_to_bytes(RangeDataNtfConfig::EnableProximityLevelTrig as u8),
                        ),
                        AppConfigTlv::new(
                            AppConfigTlvType::NearProximityConfig,
                            crate::params::utils::u16_to_bytes(50),
                        ),
                        AppConfigTlv::new(
                            AppConfigTlvType::FarProximityConfig,
                            crate::params::utils::u16_to_bytes(500),
                        ),
                    ],
                    vec![],
                    Ok(set_app_config_ok()),
                );
            });

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            AttributionSource::new(APP_UID, "com.example.app"),
            fira_bg_reconfigurable_params(),
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();

        harness.policy.set_foreground(APP_UID, false);
        harness.session_manager.on_uid_importance(APP_UID, false).await.unwrap();
        harness.policy.set_foreground(APP_UID, true);
        harness.session_manager.on_uid_importance(APP_UID, true).await.unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);

        // The stored params were never mutated by the live override.
        let params = harness.session_manager.session_params(session_handle).await.unwrap();
        match params {
            AppConfigParams::Fira(fira_params) => {
                assert_eq!(
                    *fira_params.range_data_ntf_config(),
                    RangeDataNtfConfig::EnableProximityLevelTrig
                );
                assert_eq!(*fira_params.range_data_ntf_proximity_near_cm(), 50);
                assert_eq!(*fira_params.range_data_ntf_proximity_far_cm(), 500);
            }
            _ => panic!("Not a Fira params"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_data_and_transfer_status() {
        let session_handle = 1;
        let session_id = 7;
        let peer = UwbAddress::Short([0x05, 0x06]);

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_send_data_packet(
                    session_id,
                    [0x05, 0x06, 0, 0, 0, 0, 0, 0],
                    /* uci_sequence_number= */ 0,
                    vec![0x01, 0x02, 0x03],
                    Ok(()),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();
        harness
            .session_manager
            .send_data(session_handle, peer, vec![0x01, 0x02, 0x03])
            .await
            .unwrap();

        harness
            .notf_sender
            .send(UciSessionNotification::DataTransferStatus {
                session_id,
                uci_sequence_number: 0,
                status: DataTransferNtfStatusCode::Ok,
                tx_count: 1,
            })
            .unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(3).await);
        assert_eq!(
            harness.callback.received()[2],
            SessionEvent::DataSent { session_handle, address: peer }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_data_rejected_when_not_active() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        let result = harness
            .session_manager
            .send_data(session_handle, UwbAddress::Short([0x05, 0x06]), vec![0x01])
            .await;
        assert_eq!(result, Err(Error::Rejected));

        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::DataSendFailed {
                session_handle,
                address: UwbAddress::Short([0x05, 0x06]),
                status: StatusCode::Failed,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_stop_reports_reason() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();

        // The controller stopped the session on its own.
        harness
            .notf_sender
            .send(session_status_notf(
                session_id,
                SessionState::Idle,
                ReasonCode::MaxRangingRoundRetryCountReached,
            ))
            .unwrap();

        assert!(harness.callback.wait_received_count(3).await);
        assert_eq!(
            harness.callback.received()[2],
            SessionEvent::RangingStopped {
                session_handle,
                reason: RangingChangeReason::MaxRrRetryReached,
                status: StatusCode::Failed,
                stopped_params: vec![],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsolicited_deinit_closes_session() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        harness
            .notf_sender
            .send(session_status_notf(
                session_id,
                SessionState::Deinit,
                ReasonCode::SessionStoppedDueToInbandSignal,
            ))
            .unwrap();

        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::RangingClosed {
                session_handle,
                reason: RangingChangeReason::SystemPolicy,
                status: StatusCode::Ok,
            }
        );
        let result = harness.session_manager.stop_ranging(session_handle).await;
        assert_eq!(result, Err(Error::UnknownSessionHandle(session_handle)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_idle_is_idempotent() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.stop_ranging(session_handle).await.unwrap();

        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::RangingStopped {
                session_handle,
                reason: RangingChangeReason::LocalApi,
                status: StatusCode::Ok,
                stopped_params: vec![],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ccc_start_and_stop_fetch_configs() {
        let session_handle = 1;
        let session_id = 0xCC;
        let started_tlvs = vec![
            AppConfigTlv::new(AppConfigTlvType::StsIndex, crate::params::utils::u32_to_bytes(5)),
            AppConfigTlv::new(
                AppConfigTlvType::CccHopModeKey,
                crate::params::utils::u32_to_bytes(0x1234),
            ),
            AppConfigTlv::new(
                AppConfigTlvType::CccUwbTime0,
                crate::params::utils::u64_to_bytes(987_654),
            ),
            AppConfigTlv::new(
                AppConfigTlvType::RangingDuration,
                crate::params::utils::u32_to_bytes(8 * 96),
            ),
            AppConfigTlv::new(AppConfigTlvType::PreambleCodeIndex, u8_to_bytes(9)),
        ];
        let stopped_tlvs = vec![AppConfigTlv::new(
            AppConfigTlvType::CccLastIndexUsed,
            crate::params::utils::u32_to_bytes(12),
        )];

        let mut harness = setup_session_manager(privileged_policy(), UciProtocolVersion::V1_1, {
            let started_tlvs = started_tlvs.clone();
            let stopped_tlvs = stopped_tlvs.clone();
            move |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::Ccc);
                // The start-params merge marks the app config for
                // re-application before the start command.
                uci_manager.expect_session_set_app_config_any_tlvs(
                    session_id,
                    vec![],
                    Ok(set_app_config_ok()),
                );
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_session_get_app_config(session_id, vec![], Ok(started_tlvs));
                uci_manager.expect_range_stop(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Idle,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_session_get_app_config(session_id, vec![], Ok(stopped_tlvs));
            }
        });

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::Ccc,
            privileged_source(),
            ccc_params(),
        )
        .await;
        harness
            .session_manager
            .start_ranging(
                session_handle,
                Some(StartRangingParams::Ccc(CccStartRangingParams {
                    ran_multiplier: 8,
                    sts_index: 5,
                    initiation_time_ms: 0,
                    absolute_initiation_time_us: 0,
                })),
            )
            .await
            .unwrap();
        harness.session_manager.stop_ranging(session_handle).await.unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(3).await);
        let events = harness.callback.received();
        match &events[1] {
            SessionEvent::RangingStarted {
                params: Some(RangingStartedParams::CccStarted(started)),
                ..
            } => {
                assert_eq!(started.sts_index, 5);
                assert_eq!(started.ran_multiplier, 8);
            }
            event => panic!("Unexpected event: {:?}", event),
        }
        match &events[2] {
            SessionEvent::RangingStopped { reason, stopped_params, .. } => {
                assert_eq!(*reason, RangingChangeReason::LocalApi);
                assert_eq!(stopped_params.len(), 1);
            }
            event => panic!("Unexpected event: {:?}", event),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_queries_uwbs_timestamp_for_relative_initiation_time() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V2_0,
            |uci_manager| {
                uci_manager.expect_session_init(
                    session_id,
                    SessionType::FiraRangingSession,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Init,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager
                    .expect_get_session_token_from_session_id(session_id, Ok(0x1000 + session_id));
                uci_manager.expect_core_query_uwb_timestamp(Ok(1_000_000));
                uci_manager.expect_session_set_app_config_any_tlvs(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Idle,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(set_app_config_ok()),
                );
            },
        );

        let params = fira_controller_params_builder()
            .uwb_initiation_time_ms(5)
            .build()
            .unwrap();
        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            params,
        )
        .await;

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        // The computed absolute time was reset after the config applied, so a
        // future start re-computes it.
        let params = harness.session_manager.session_params(session_handle).await.unwrap();
        match params {
            AppConfigParams::Fira(fira_params) => {
                assert_eq!(*fira_params.absolute_uwb_initiation_time_us(), 0);
                assert_eq!(*fira_params.uwb_initiation_time_ms(), 5);
            }
            _ => panic!("Not a Fira params"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dt_tag_ranging_rounds_update() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_session_update_dt_tag_ranging_rounds(
                    session_id,
                    vec![0, 1, 2],
                    Ok(SessionUpdateDtTagRangingRoundsResponse {
                        status: StatusCode::Ok,
                        ranging_round_indexes: vec![2],
                    }),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness
            .session_manager
            .update_dt_tag_ranging_rounds(session_handle, vec![0, 1, 2])
            .await
            .unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::RangingRoundsUpdateDtTagStatus {
                session_handle,
                status: StatusCode::Ok,
                ranging_round_indexes: vec![2],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_transfer_phase_config() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(
                    uci_manager,
                    session_id,
                    SessionType::FiraRangingAndInBandDataSession,
                );
                uci_manager.expect_session_data_transfer_phase_config(
                    session_id,
                    /* dtpcm_repetition= */ 0,
                    /* data_transfer_control= */ 0,
                    vec![UciSessionNotification::DataTransferPhaseConfig {
                        session_id,
                        status: DataTransferPhaseConfigNtfStatusCode::ConfigSuccess,
                    }],
                    Ok(()),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingAndInBandDataSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        // Control byte 0: short addresses, 1-byte slot bitmaps.
        harness
            .session_manager
            .set_data_transfer_phase_config(
                session_handle,
                SessionDataTransferPhaseConfig {
                    dtpcm_repetition: 0,
                    data_transfer_control: 0,
                    management_list: vec![DataTransferPhaseManagementEntry {
                        uwb_address: UwbAddress::Short([0x01, 0x02]),
                        slot_bitmap: vec![0xFF],
                    }],
                },
            )
            .await
            .unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::DataTransferPhaseConfigured {
                session_handle,
                status: DataTransferPhaseConfigNtfStatusCode::ConfigSuccess,
            }
        );

        // A slot bitmap that does not match the control byte is rejected
        // before anything reaches the UWBS.
        let result = harness
            .session_manager
            .set_data_transfer_phase_config(
                session_handle,
                SessionDataTransferPhaseConfig {
                    dtpcm_repetition: 0,
                    data_transfer_control: 0,
                    management_list: vec![DataTransferPhaseManagementEntry {
                        uwb_address: UwbAddress::Short([0x01, 0x02]),
                        slot_bitmap: vec![0xFF, 0x00],
                    }],
                },
            )
            .await;
        assert_eq!(result, Err(Error::BadParameters));
        assert!(harness.callback.wait_received_count(3).await);
        assert_eq!(
            harness.callback.received()[2],
            SessionEvent::DataTransferPhaseConfigFailed {
                session_handle,
                status: DataTransferPhaseConfigNtfStatusCode::ErrorInvalidSlotBitmap,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hybrid_session_configuration() {
        let primary_handle = 1;
        let primary_id = 0x11;
        let secondary_handle = 2;
        let secondary_id = 0x22;

        // (token 0x1022, start slot 3, end slot 7), little-endian.
        let mut expected_phase_list = crate::params::utils::u32_to_bytes(0x1000 + secondary_id);
        expected_phase_list.extend(crate::params::utils::u16_to_bytes(3));
        expected_phase_list.extend(crate::params::utils::u16_to_bytes(7));

        let mut harness = setup_session_manager(privileged_policy(), UciProtocolVersion::V1_1, {
            let expected_phase_list = expected_phase_list.clone();
            move |uci_manager| {
                expect_session_open(uci_manager, primary_id, SessionType::FiraRangingSession);
                expect_session_open(uci_manager, secondary_id, SessionType::FiraRangingSession);
                uci_manager.expect_session_set_hybrid_controller_config(
                    primary_id,
                    /* number_of_phases= */ 1,
                    expected_phase_list,
                    Ok(()),
                );
            }
        });

        open_session(
            &harness,
            primary_handle,
            primary_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        open_session(
            &harness,
            secondary_handle,
            secondary_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;

        harness
            .session_manager
            .set_hybrid_session_configuration(
                primary_handle,
                HybridSessionConfig {
                    update_time: [0; 8],
                    phase_list: vec![HybridSessionPhaseList {
                        session_handle: secondary_handle,
                        start_slot_index: 3,
                        end_slot_index: 7,
                    }],
                },
            )
            .await
            .unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_max_data_size() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_session_query_max_data_size(session_id, Ok(1024));
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        let size = harness.session_manager.query_max_data_size(session_handle).await.unwrap();
        assert_eq!(size, 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_and_resume_ranging_rounds() {
        let session_handle = 1;
        let session_id = 7;

        let mut harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_range_start(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Active,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager.expect_session_set_app_config(
                    session_id,
                    vec![AppConfigTlv::new(
                        AppConfigTlvType::SuspendRangingRounds,
                        u8_to_bytes(SuspendRanging::Enabled as u8),
                    )],
                    vec![],
                    Ok(set_app_config_ok()),
                );
                uci_manager.expect_session_set_app_config(
                    session_id,
                    vec![AppConfigTlv::new(
                        AppConfigTlvType::SuspendRangingRounds,
                        u8_to_bytes(SuspendRanging::Disabled as u8),
                    )],
                    vec![],
                    Ok(set_app_config_ok()),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.start_ranging(session_handle, None).await.unwrap();

        harness
            .session_manager
            .reconfigure(
                session_handle,
                FiraRangingReconfigureParams {
                    suspend_ranging_rounds: Some(SuspendRanging::Enabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        harness
            .session_manager
            .reconfigure(
                session_handle,
                FiraRangingReconfigureParams {
                    suspend_ranging_rounds: Some(SuspendRanging::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(harness.uci_manager.wait_expected_calls_done().await);
        assert!(harness.callback.wait_received_count(6).await);
        let events = harness.callback.received();
        assert_eq!(events[2], SessionEvent::RangingPaused { session_handle });
        assert_eq!(events[3], SessionEvent::RangingReconfigured { session_handle });
        assert_eq!(events[4], SessionEvent::RangingResumed { session_handle });
        assert_eq!(events[5], SessionEvent::RangingReconfigured { session_handle });
    }

    #[tokio::test(start_paused = true)]
    async fn test_radar_session_open_and_data() {
        let session_handle = 1;
        let session_id = 0xAD;
        let params = radar_params();
        let radar_tlvs = params.generate_radar_tlvs();

        let harness = setup_session_manager(privileged_policy(), UciProtocolVersion::V1_1, {
            move |uci_manager| {
                uci_manager.expect_session_init(
                    session_id,
                    SessionType::Radar,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Init,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
                uci_manager
                    .expect_get_session_token_from_session_id(session_id, Ok(0x1000 + session_id));
                uci_manager.expect_android_set_radar_config(
                    session_id,
                    radar_tlvs,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Idle,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
            }
        });

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::Radar,
            privileged_source(),
            params,
        )
        .await;

        let radar_data = RadarDataRcvNotification {
            session_id,
            status: StatusCode::Ok,
            radar_data_type: 0,
            number_of_sweeps: 1,
            samples_per_sweep: 128,
            bits_per_sample: 0,
            sweep_offset: 0,
            sweep_data: vec![],
        };
        harness
            .notf_sender
            .send(UciSessionNotification::RadarData(radar_data.clone()))
            .unwrap();

        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::RadarDataReceived { session_handle, radar_data }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_death_closes_session() {
        let session_handle = 1;
        let session_id = 7;

        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, session_id, SessionType::FiraRangingSession);
                uci_manager.expect_session_deinit(
                    session_id,
                    vec![session_status_notf(
                        session_id,
                        SessionState::Deinit,
                        ReasonCode::StateChangeWithSessionManagementCommands,
                    )],
                    Ok(()),
                );
            },
        );

        open_session(
            &harness,
            session_handle,
            session_id,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.on_client_death(session_handle).await.unwrap();

        assert!(harness.callback.wait_received_count(2).await);
        assert_eq!(
            harness.callback.received()[1],
            SessionEvent::RangingClosed {
                session_handle,
                reason: RangingChangeReason::Unknown,
                status: StatusCode::Ok,
            }
        );
        let result = harness.session_manager.stop_ranging(session_handle).await;
        assert_eq!(result, Err(Error::UnknownSessionHandle(session_handle)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deinit_all_sessions() {
        let harness = setup_session_manager(
            privileged_policy(),
            UciProtocolVersion::V1_1,
            |uci_manager| {
                expect_session_open(uci_manager, 0x11, SessionType::FiraRangingSession);
                expect_session_open(uci_manager, 0x22, SessionType::FiraRangingSession);
            },
        );

        open_session(
            &harness,
            1,
            0x11,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        open_session(
            &harness,
            2,
            0x22,
            SessionType::FiraRangingSession,
            privileged_source(),
            fira_controller_params(),
        )
        .await;
        harness.session_manager.deinit_all_sessions().await.unwrap();

        assert!(harness.callback.wait_received_count(4).await);
        let closed: Vec<_> = harness
            .callback
            .received()
            .into_iter()
            .filter(|event| {
                matches!(
                    event,
                    SessionEvent::RangingClosed {
                        reason: RangingChangeReason::SystemPolicy,
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(closed.len(), 2);

        let result = harness.session_manager.stop_ranging(1).await;
        assert_eq!(result, Err(Error::UnknownSessionHandle(1)));
    }
}
