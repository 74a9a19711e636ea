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

//! The platform policy the session manager consults for admission, priority
//! and data delivery decisions. The real implementation lives in the outer
//! service; [`StaticPolicy`] covers embedding and tests.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::params::app_config_params::Protocol;
use crate::utils::consuming_builder_field;

/// The default cap of concurrent FiRa sessions per chip.
pub const DEFAULT_MAX_FIRA_SESSIONS: usize = 5;
/// The default cap of concurrent CCC sessions per chip.
pub const DEFAULT_MAX_CCC_SESSIONS: usize = 1;
/// The default cap of concurrent ALIRO sessions per chip.
pub const DEFAULT_MAX_ALIRO_SESSIONS: usize = 1;
/// The default cap of concurrent radar sessions per chip.
pub const DEFAULT_MAX_RADAR_SESSIONS: usize = 1;
/// The default bound of buffered received payloads per remote peer.
pub const DEFAULT_RX_DATA_MAX_PACKETS_TO_STORE: usize = 10;

/// One link of the attribution chain of a request: the app (or the app acting
/// on behalf of another app) that receives the ranging results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionSource {
    pub uid: u32,
    pub package_name: String,
    pub next: Option<Box<AttributionSource>>,
}

impl AttributionSource {
    /// A chain of a single link.
    pub fn new(uid: u32, package_name: &str) -> Self {
        Self { uid, package_name: package_name.to_string(), next: None }
    }

    /// Iterate the chain from the requesting app outward.
    pub fn iter(&self) -> impl Iterator<Item = &AttributionSource> {
        std::iter::successors(Some(self), |source| source.next.as_deref())
    }
}

/// The queries the session manager makes against the platform.
pub trait PolicyOracle: 'static + Send + Sync {
    /// True when the app is a system app or signed with the platform key.
    fn is_privileged(&self, uid: u32, package_name: &str) -> bool;

    /// True when the app currently has foreground (or foreground-service)
    /// importance.
    fn is_foreground_app_or_service(&self, uid: u32, package_name: &str) -> bool;

    /// True when non-foreground apps are allowed to range.
    fn is_background_ranging_enabled(&self) -> bool;

    /// True when the ranging-error streak supervision is enabled.
    fn is_ranging_error_streak_timer_enabled(&self) -> bool;

    /// True when the CCC/ALIRO stopped parameters should be fetched and
    /// attached to the stopped callback.
    fn is_stopped_params_fetch_enabled(&self) -> bool;

    /// True when CCC/ALIRO sessions should compute an absolute initiation
    /// time from the UWBS clock.
    fn is_absolute_initiation_time_enabled(&self) -> bool;

    /// Re-check that the attribution chain still holds the data delivery
    /// permission. Ingress data is dropped silently when this fails.
    fn has_data_delivery_permission(&self, attribution_source: &AttributionSource) -> bool;

    /// The cap of concurrent sessions for the protocol on the chip.
    fn max_sessions(&self, protocol: Protocol, chip_id: &str) -> usize;

    /// The bound of buffered received payloads per remote peer.
    fn rx_data_max_packets_to_store(&self) -> usize;

    /// The first link of the chain that is not privileged, i.e. the app whose
    /// foreground state gates the session.
    fn first_non_privileged<'a>(
        &self,
        attribution_source: &'a AttributionSource,
    ) -> Option<&'a AttributionSource> {
        attribution_source.iter().find(|link| !self.is_privileged(link.uid, &link.package_name))
    }
}

/// A policy with fixed knobs and explicit uid sets. The uid sets use interior
/// mutability so tests can flip app states while the manager is running.
pub struct StaticPolicy {
    privileged_uids: Mutex<HashSet<u32>>,
    foreground_uids: Mutex<HashSet<u32>>,
    revoked_data_delivery_uids: Mutex<HashSet<u32>>,
    background_ranging_enabled: bool,
    ranging_error_streak_timer_enabled: bool,
    stopped_params_fetch_enabled: bool,
    absolute_initiation_time_enabled: bool,
    max_fira_sessions: usize,
    max_ccc_sessions: usize,
    max_aliro_sessions: usize,
    max_radar_sessions: usize,
    rx_data_max_packets_to_store: usize,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            privileged_uids: Mutex::new(HashSet::new()),
            foreground_uids: Mutex::new(HashSet::new()),
            revoked_data_delivery_uids: Mutex::new(HashSet::new()),
            background_ranging_enabled: false,
            ranging_error_streak_timer_enabled: true,
            stopped_params_fetch_enabled: true,
            absolute_initiation_time_enabled: true,
            max_fira_sessions: DEFAULT_MAX_FIRA_SESSIONS,
            max_ccc_sessions: DEFAULT_MAX_CCC_SESSIONS,
            max_aliro_sessions: DEFAULT_MAX_ALIRO_SESSIONS,
            max_radar_sessions: DEFAULT_MAX_RADAR_SESSIONS,
            rx_data_max_packets_to_store: DEFAULT_RX_DATA_MAX_PACKETS_TO_STORE,
        }
    }
}

#[allow(missing_docs)]
impl StaticPolicy {
    pub fn new() -> Self {
        Default::default()
    }

    // Generate the setter methods for the policy knobs.
    consuming_builder_field!(background_ranging_enabled, bool);
    consuming_builder_field!(ranging_error_streak_timer_enabled, bool);
    consuming_builder_field!(stopped_params_fetch_enabled, bool);
    consuming_builder_field!(absolute_initiation_time_enabled, bool);
    consuming_builder_field!(max_fira_sessions, usize);
    consuming_builder_field!(max_ccc_sessions, usize);
    consuming_builder_field!(max_aliro_sessions, usize);
    consuming_builder_field!(max_radar_sessions, usize);
    consuming_builder_field!(rx_data_max_packets_to_store, usize);

    /// Mark the uid as a privileged (system) app.
    pub fn add_privileged_uid(&self, uid: u32) {
        self.privileged_uids.lock().unwrap().insert(uid);
    }

    /// Flip the foreground state of the uid.
    pub fn set_foreground(&self, uid: u32, foreground: bool) {
        let mut foreground_uids = self.foreground_uids.lock().unwrap();
        if foreground {
            foreground_uids.insert(uid);
        } else {
            foreground_uids.remove(&uid);
        }
    }

    /// Revoke the data delivery permission of the uid.
    pub fn revoke_data_delivery_permission(&self, uid: u32) {
        self.revoked_data_delivery_uids.lock().unwrap().insert(uid);
    }
}

impl PolicyOracle for StaticPolicy {
    fn is_privileged(&self, uid: u32, _package_name: &str) -> bool {
        self.privileged_uids.lock().unwrap().contains(&uid)
    }

    fn is_foreground_app_or_service(&self, uid: u32, _package_name: &str) -> bool {
        self.foreground_uids.lock().unwrap().contains(&uid)
    }

    fn is_background_ranging_enabled(&self) -> bool {
        self.background_ranging_enabled
    }

    fn is_ranging_error_streak_timer_enabled(&self) -> bool {
        self.ranging_error_streak_timer_enabled
    }

    fn is_stopped_params_fetch_enabled(&self) -> bool {
        self.stopped_params_fetch_enabled
    }

    fn is_absolute_initiation_time_enabled(&self) -> bool {
        self.absolute_initiation_time_enabled
    }

    fn has_data_delivery_permission(&self, attribution_source: &AttributionSource) -> bool {
        let revoked = self.revoked_data_delivery_uids.lock().unwrap();
        attribution_source.iter().all(|link| !revoked.contains(&link.uid))
    }

    fn max_sessions(&self, protocol: Protocol, _chip_id: &str) -> usize {
        match protocol {
            Protocol::Fira => self.max_fira_sessions,
            Protocol::Ccc => self.max_ccc_sessions,
            Protocol::Aliro => self.max_aliro_sessions,
            Protocol::Radar => self.max_radar_sessions,
        }
    }

    fn rx_data_max_packets_to_store(&self) -> usize {
        self.rx_data_max_packets_to_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_privileged_walks_the_chain() {
        let policy = StaticPolicy::new();
        policy.add_privileged_uid(1000);

        let chain = AttributionSource {
            uid: 1000,
            package_name: "com.android.system".to_string(),
            next: Some(Box::new(AttributionSource::new(10001, "com.example.app"))),
        };
        let link = policy.first_non_privileged(&chain).unwrap();
        assert_eq!(link.uid, 10001);

        let system_only = AttributionSource::new(1000, "com.android.system");
        assert!(policy.first_non_privileged(&system_only).is_none());
    }

    #[test]
    fn test_data_delivery_permission() {
        let policy = StaticPolicy::new();
        let chain = AttributionSource::new(10001, "com.example.app");
        assert!(policy.has_data_delivery_permission(&chain));

        policy.revoke_data_delivery_permission(10001);
        assert!(!policy.has_data_delivery_permission(&chain));
    }
}
