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

//! The process-wide table of live sessions, plus the session-token cache and
//! a small trail of recently closed sessions for diagnostics.
//!
//! The table is shared between the event loop and the notification router;
//! only the event loop inserts or removes entries.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::params::app_config_params::Protocol;
use crate::params::uci_packets::{ChipId, SessionHandle, SessionId, SessionState, SessionToken};
use crate::session::uwb_session::UwbSession;

const MAX_RECENTLY_CLOSED_SESSIONS: usize = 5;

/// The diagnostic record kept after a session is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSessionInfo {
    pub session_handle: SessionHandle,
    pub session_id: SessionId,
    pub protocol: Protocol,
    pub chip_id: ChipId,
    pub last_state: SessionState,
    pub stack_priority: u8,
}

#[derive(Default)]
pub(crate) struct SessionTable {
    sessions: Mutex<HashMap<SessionHandle, Arc<UwbSession>>>,
    session_tokens: Mutex<HashMap<SessionId, SessionToken>>,
    recently_closed: Mutex<VecDeque<ClosedSessionInfo>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&self, session: Arc<UwbSession>) {
        self.sessions.lock().unwrap().insert(session.session_handle(), session);
    }

    pub fn get_by_handle(&self, session_handle: SessionHandle) -> Option<Arc<UwbSession>> {
        self.sessions.lock().unwrap().get(&session_handle).cloned()
    }

    pub fn get_by_id(&self, session_id: SessionId) -> Option<Arc<UwbSession>> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .find(|session| session.session_id() == session_id)
            .cloned()
    }

    /// The session id of the handle; None for unknown handles.
    pub fn session_id_of(&self, session_handle: SessionHandle) -> Option<SessionId> {
        self.get_by_handle(session_handle).map(|session| session.session_id())
    }

    pub fn contains_handle(&self, session_handle: SessionHandle) -> bool {
        self.sessions.lock().unwrap().contains_key(&session_handle)
    }

    pub fn contains_id(&self, session_id: SessionId) -> bool {
        self.get_by_id(session_id).is_some()
    }

    pub fn count_by_protocol(&self, protocol: Protocol) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|session| session.protocol() == protocol)
            .count()
    }

    /// The session with the lowest stack priority among the protocol's
    /// sessions, i.e. the eviction candidate.
    pub fn session_with_lowest_priority(&self, protocol: Protocol) -> Option<Arc<UwbSession>> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|session| session.protocol() == protocol)
            .min_by_key(|session| session.stack_priority())
            .cloned()
    }

    pub fn all_sessions(&self) -> Vec<Arc<UwbSession>> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }

    /// Remove the session and keep its diagnostic record in the
    /// recently-closed trail.
    pub fn remove(&self, session_handle: SessionHandle) -> Option<Arc<UwbSession>> {
        let session = self.sessions.lock().unwrap().remove(&session_handle)?;
        self.session_tokens.lock().unwrap().remove(&session.session_id());

        let mut recently_closed = self.recently_closed.lock().unwrap();
        if recently_closed.len() == MAX_RECENTLY_CLOSED_SESSIONS {
            recently_closed.pop_front();
        }
        recently_closed.push_back(ClosedSessionInfo {
            session_handle: session.session_handle(),
            session_id: session.session_id(),
            protocol: session.protocol(),
            chip_id: session.chip_id().to_string(),
            last_state: session.state(),
            stack_priority: session.stack_priority(),
        });
        Some(session)
    }

    /// The diagnostic records of the most recently closed sessions, oldest
    /// first.
    pub fn recently_closed(&self) -> Vec<ClosedSessionInfo> {
        self.recently_closed.lock().unwrap().iter().cloned().collect()
    }

    // ---------- Session token cache ----------

    pub fn insert_session_token(&self, session_id: SessionId, token: SessionToken) {
        self.session_tokens.lock().unwrap().insert(session_id, token);
    }

    pub fn session_token(&self, session_id: SessionId) -> Option<SessionToken> {
        self.session_tokens.lock().unwrap().get(&session_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::params::app_config_params::AppConfigParams;
    use crate::params::fira_app_config_params::{
        DeviceRole, DeviceType, FiraAppConfigParamsBuilder, MultiNodeMode,
    };
    use crate::params::uci_packets::{SessionType, UwbAddress};
    use crate::session::policy::{AttributionSource, StaticPolicy};

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

    fn session(handle: SessionHandle, session_id: SessionId, priority: u8) -> Arc<UwbSession> {
        let policy = StaticPolicy::new();
        Arc::new(UwbSession::new(
            handle,
            session_id,
            SessionType::FiraRangingSession,
            "default".to_string(),
            AttributionSource::new(10001, "com.example.app"),
            fira_params(priority),
            &policy,
        ))
    }

    #[test]
    fn test_lookup_by_handle_and_id() {
        let table = SessionTable::new();
        table.insert(session(1, 0x11, 90));
        table.insert(session(2, 0x22, 80));

        assert_eq!(table.session_id_of(1), Some(0x11));
        assert_eq!(table.session_id_of(3), None);
        assert_eq!(table.get_by_id(0x22).unwrap().session_handle(), 2);
        assert!(table.get_by_id(0x33).is_none());
        assert_eq!(table.count_by_protocol(Protocol::Fira), 2);
        assert_eq!(table.count_by_protocol(Protocol::Ccc), 0);
    }

    #[test]
    fn test_lowest_priority_session() {
        let table = SessionTable::new();
        table.insert(session(1, 0x11, 90));
        table.insert(session(2, 0x22, 40));
        table.insert(session(3, 0x33, 60));

        let lowest = table.session_with_lowest_priority(Protocol::Fira).unwrap();
        assert_eq!(lowest.session_handle(), 2);
        assert!(table.session_with_lowest_priority(Protocol::Ccc).is_none());
    }

    #[test]
    fn test_remove_keeps_recently_closed_trail() {
        let table = SessionTable::new();
        for handle in 1..=7u64 {
            table.insert(session(handle, handle as SessionId, 50));
            table.insert_session_token(handle as SessionId, 0x1000 + handle as SessionToken);
        }
        for handle in 1..=7u64 {
            assert!(table.remove(handle).is_some());
            assert_eq!(table.session_token(handle as SessionId), None);
        }
        assert!(table.remove(1).is_none());

        let closed = table.recently_closed();
        assert_eq!(closed.len(), MAX_RECENTLY_CLOSED_SESSIONS);
        // The trail is bounded, keeping the most recent entries.
        assert_eq!(closed.first().unwrap().session_handle, 3);
        assert_eq!(closed.last().unwrap().session_handle, 7);
    }
}
