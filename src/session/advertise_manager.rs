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

//! Correlates OWR-AoA measurements per advertiser to decide whether the
//! observer device is currently pointed at that advertiser. Buffered
//! application payloads from an advertiser are only released to the client
//! once the pointing predicate holds.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::params::uci_packets::OwrAoaRangingMeasurement;

// The AoA fields of the OWR measurement are in the UCI Q9.7 fixed point
// format.
const Q9_7_SCALE: f32 = 128.0;

const DEFAULT_AZIMUTH_THRESHOLD_DEG: f32 = 10.0;
const DEFAULT_ELEVATION_THRESHOLD_DEG: f32 = 10.0;
const DEFAULT_WINDOW_SIZE: usize = 10;
const DEFAULT_REQUIRED_HITS: usize = 3;
const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5);

/// The thresholds of the pointing predicate.
#[derive(Debug, Clone)]
pub struct AdvertiseConfig {
    /// The maximum |azimuth| in degrees that counts as pointing.
    pub azimuth_threshold_deg: f32,
    /// The maximum |elevation| in degrees that counts as pointing.
    pub elevation_threshold_deg: f32,
    /// How many trailing measurements are kept per advertiser.
    pub window_size: usize,
    /// How many trailing in-threshold measurements make a pointed target.
    pub required_hits: usize,
    /// Measurements older than this do not count.
    pub freshness: Duration,
}

impl Default for AdvertiseConfig {
    fn default() -> Self {
        Self {
            azimuth_threshold_deg: DEFAULT_AZIMUTH_THRESHOLD_DEG,
            elevation_threshold_deg: DEFAULT_ELEVATION_THRESHOLD_DEG,
            window_size: DEFAULT_WINDOW_SIZE,
            required_hits: DEFAULT_REQUIRED_HITS,
            freshness: DEFAULT_FRESHNESS,
        }
    }
}

#[derive(Debug)]
struct AdvertiseTarget {
    samples: VecDeque<AoaSample>,
}

#[derive(Debug, Clone, Copy)]
struct AoaSample {
    azimuth_deg: f32,
    elevation_deg: f32,
    received_at: Instant,
}

/// The rolling per-advertiser records of one OWR-AoA session group.
pub struct AdvertiseManager {
    config: AdvertiseConfig,
    targets: HashMap<u64, AdvertiseTarget>,
}

impl AdvertiseManager {
    pub fn new(config: AdvertiseConfig) -> Self {
        Self { config, targets: HashMap::new() }
    }

    /// Fold one OWR-AoA measurement into the advertiser's rolling record.
    pub fn update_advertise_target(
        &mut self,
        address: u64,
        measurement: &OwrAoaRangingMeasurement,
        now: Instant,
    ) {
        let target = self
            .targets
            .entry(address)
            .or_insert_with(|| AdvertiseTarget { samples: VecDeque::new() });
        if target.samples.len() == self.config.window_size {
            target.samples.pop_front();
        }
        target.samples.push_back(AoaSample {
            azimuth_deg: measurement.aoa_azimuth as f32 / Q9_7_SCALE,
            elevation_deg: measurement.aoa_elevation as f32 / Q9_7_SCALE,
            received_at: now,
        });
    }

    /// True when the trailing measurements from the advertiser say the
    /// observer is pointed at it: the last `required_hits` samples are all
    /// fresh and within the angular thresholds.
    pub fn is_pointed_target(&self, address: u64, now: Instant) -> bool {
        let Some(target) = self.targets.get(&address) else {
            return false;
        };
        if target.samples.len() < self.config.required_hits {
            return false;
        }
        target.samples.iter().rev().take(self.config.required_hits).all(|sample| {
            now.saturating_duration_since(sample.received_at) <= self.config.freshness
                && sample.azimuth_deg.abs() <= self.config.azimuth_threshold_deg
                && sample.elevation_deg.abs() <= self.config.elevation_threshold_deg
        })
    }

    /// Drop the advertiser's record, e.g. after its buffered payloads were
    /// released or its session closed.
    pub fn remove_advertise_target(&mut self, address: u64) {
        self.targets.remove(&address);
    }
}

impl Default for AdvertiseManager {
    fn default() -> Self {
        Self::new(AdvertiseConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::params::uci_packets::{StatusCode, UwbAddress};

    const ADDRESS: u64 = 0xBEEF;

    fn measurement(azimuth_deg: f32, elevation_deg: f32) -> OwrAoaRangingMeasurement {
        OwrAoaRangingMeasurement {
            mac_address: UwbAddress::Short([0xEF, 0xBE]),
            status: StatusCode::Ok,
            nlos: 0,
            frame_sequence_number: 0,
            block_index: 0,
            aoa_azimuth: (azimuth_deg * Q9_7_SCALE) as i16,
            aoa_azimuth_fom: 100,
            aoa_elevation: (elevation_deg * Q9_7_SCALE) as i16,
            aoa_elevation_fom: 100,
        }
    }

    #[test]
    fn test_not_pointed_without_enough_samples() {
        let mut manager = AdvertiseManager::default();
        let now = Instant::now();

        manager.update_advertise_target(ADDRESS, &measurement(0.0, 0.0), now);
        assert!(!manager.is_pointed_target(ADDRESS, now));
    }

    #[test]
    fn test_pointed_after_consecutive_hits() {
        let mut manager = AdvertiseManager::default();
        let now = Instant::now();

        for _ in 0..DEFAULT_REQUIRED_HITS {
            manager.update_advertise_target(ADDRESS, &measurement(2.0, -3.0), now);
        }
        assert!(manager.is_pointed_target(ADDRESS, now));
        assert!(!manager.is_pointed_target(0x1234, now));
    }

    #[test]
    fn test_wide_angle_breaks_the_streak() {
        let mut manager = AdvertiseManager::default();
        let now = Instant::now();

        manager.update_advertise_target(ADDRESS, &measurement(0.0, 0.0), now);
        manager.update_advertise_target(ADDRESS, &measurement(0.0, 0.0), now);
        manager.update_advertise_target(ADDRESS, &measurement(45.0, 0.0), now);
        assert!(!manager.is_pointed_target(ADDRESS, now));

        // Three further in-threshold samples re-establish the streak.
        for _ in 0..DEFAULT_REQUIRED_HITS {
            manager.update_advertise_target(ADDRESS, &measurement(1.0, 1.0), now);
        }
        assert!(manager.is_pointed_target(ADDRESS, now));
    }

    #[test]
    fn test_stale_samples_do_not_count() {
        let mut manager = AdvertiseManager::default();
        let then = Instant::now();

        for _ in 0..DEFAULT_REQUIRED_HITS {
            manager.update_advertise_target(ADDRESS, &measurement(0.0, 0.0), then);
        }
        assert!(manager.is_pointed_target(ADDRESS, then));
        assert!(!manager.is_pointed_target(ADDRESS, then + DEFAULT_FRESHNESS * 2));
    }

    #[test]
    fn test_remove_target() {
        let mut manager = AdvertiseManager::default();
        let now = Instant::now();

        for _ in 0..DEFAULT_REQUIRED_HITS {
            manager.update_advertise_target(ADDRESS, &measurement(0.0, 0.0), now);
        }
        manager.remove_advertise_target(ADDRESS);
        assert!(!manager.is_pointed_target(ADDRESS, now));
    }
}
