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

//! The configuration parameters for a radar session. Radar sessions use their
//! own parameter ID space, separate from the ranging app config.

#![allow(missing_docs)]

use std::collections::HashMap;

use num_derive::{FromPrimitive, ToPrimitive};

use crate::params::uci_packets::RadarConfigTlvType;
use crate::params::utils::{u16_to_bytes, u8_to_bytes, validate};
use crate::utils::{builder_field, getter_field};

const DEFAULT_SAMPLES_PER_SWEEP: u8 = 64;
const DEFAULT_SWEEP_OFFSET: u16 = 0;
const DEFAULT_BITS_PER_SAMPLE: BitsPerSample = BitsPerSample::Value32;
const DEFAULT_NUMBER_OF_BURSTS: u16 = 0;
const DEFAULT_RADAR_DATA_TYPE: RadarDataType = RadarDataType::RadarSweepSamples;

pub(super) type RadarConfigTlvMap = HashMap<RadarConfigTlvType, Vec<u8>>;

/// The radar sweep timing parameters: burst period, sweep period and sweeps
/// per burst, packed into one TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarTimingParams {
    pub burst_period_ms: u16,
    pub sweep_period_rstu: u16,
    pub sweeps_per_burst: u8,
}

impl RadarTimingParams {
    fn to_bytes(self) -> Vec<u8> {
        let mut out = u16_to_bytes(self.burst_period_ms);
        out.extend(u16_to_bytes(self.sweep_period_rstu));
        out.extend(u8_to_bytes(self.sweeps_per_burst));
        out
    }
}

/// The application configuration parameters of a radar session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarAppConfigParams {
    timing_params: RadarTimingParams,
    samples_per_sweep: u8,
    sweep_offset: u16,
    bits_per_sample: BitsPerSample,
    number_of_bursts: u16,
    radar_data_type: RadarDataType,
}

#[allow(missing_docs)]
impl RadarAppConfigParams {
    getter_field!(timing_params, RadarTimingParams);
    getter_field!(samples_per_sweep, u8);
    getter_field!(sweep_offset, u16);
    getter_field!(bits_per_sample, BitsPerSample);
    getter_field!(number_of_bursts, u16);
    getter_field!(radar_data_type, RadarDataType);

    pub fn generate_config_map(&self) -> RadarConfigTlvMap {
        debug_assert!(self.is_valid().is_some());

        HashMap::from([
            (RadarConfigTlvType::RadarTimingParams, self.timing_params.to_bytes()),
            (RadarConfigTlvType::SamplesPerSweep, u8_to_bytes(self.samples_per_sweep)),
            (RadarConfigTlvType::SweepOffset, u16_to_bytes(self.sweep_offset)),
            (RadarConfigTlvType::BitsPerSample, u8_to_bytes(self.bits_per_sample as u8)),
            (RadarConfigTlvType::NumberOfBursts, u16_to_bytes(self.number_of_bursts)),
            (RadarConfigTlvType::RadarDataType, u8_to_bytes(self.radar_data_type as u8)),
        ])
    }

    fn is_valid(&self) -> Option<()> {
        validate(self.samples_per_sweep > 0, "samples_per_sweep should not be 0")?;
        validate(
            self.timing_params.sweeps_per_burst > 0,
            "sweeps_per_burst should not be 0",
        )?;
        Some(())
    }
}

pub struct RadarAppConfigParamsBuilder {
    timing_params: Option<RadarTimingParams>,
    samples_per_sweep: u8,
    sweep_offset: u16,
    bits_per_sample: BitsPerSample,
    number_of_bursts: u16,
    radar_data_type: RadarDataType,
}

#[allow(clippy::new_without_default)]
impl RadarAppConfigParamsBuilder {
    pub fn new() -> Self {
        Self {
            timing_params: None,
            samples_per_sweep: DEFAULT_SAMPLES_PER_SWEEP,
            sweep_offset: DEFAULT_SWEEP_OFFSET,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            number_of_bursts: DEFAULT_NUMBER_OF_BURSTS,
            radar_data_type: DEFAULT_RADAR_DATA_TYPE,
        }
    }

    pub fn build(&self) -> Option<RadarAppConfigParams> {
        let params = RadarAppConfigParams {
            timing_params: self.timing_params?,
            samples_per_sweep: self.samples_per_sweep,
            sweep_offset: self.sweep_offset,
            bits_per_sample: self.bits_per_sample,
            number_of_bursts: self.number_of_bursts,
            radar_data_type: self.radar_data_type,
        };
        params.is_valid()?;
        Some(params)
    }

    builder_field!(timing_params, RadarTimingParams, Some);
    builder_field!(samples_per_sweep, u8);
    builder_field!(sweep_offset, u16);
    builder_field!(bits_per_sample, BitsPerSample);
    builder_field!(number_of_bursts, u16);
    builder_field!(radar_data_type, RadarDataType);
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum BitsPerSample {
    Value32 = 0,
    Value48 = 1,
    Value64 = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum RadarDataType {
    RadarSweepSamples = 0,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_config_map() {
        let params = RadarAppConfigParamsBuilder::new()
            .timing_params(RadarTimingParams {
                burst_period_ms: 100,
                sweep_period_rstu: 200,
                sweeps_per_burst: 16,
            })
            .samples_per_sweep(128)
            .build()
            .unwrap();

        let config_map = params.generate_config_map();
        assert_eq!(config_map[&RadarConfigTlvType::SamplesPerSweep], vec![128]);
        assert_eq!(
            config_map[&RadarConfigTlvType::RadarTimingParams],
            vec![100, 0, 200, 0, 16]
        );
    }

    #[test]
    fn test_builder_rejects_missing_timing() {
        assert!(RadarAppConfigParamsBuilder::new().build().is_none());
    }
}
