// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Station configuration.
//!
//! Loaded from TOML; every section and field is optional and falls back to
//! the defaults below.
//!
//! ```toml
//! [register]
//! id = 1
//! opening_cash = "100.00"
//! scan_policy = "all"          # all | at_least_one
//!
//! [queue]
//! capacity = 8
//!
//! [shop]
//! open_on_start = true
//! wind_down_secs = 60.0
//! day_length_secs = 86400.0
//! hours = { open_at = 21600.0, close_at = 79200.0 }
//!
//! [[pumps]]
//! id = 1
//! capacity = "50"
//! initial_fuel = "50"
//! rate_per_sec = "5"
//! price_per_gallon = "3.50"
//! ```

use crate::base::{PumpId, RegisterId};
use crate::error::StationError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// How much must be scanned before payment can be requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Every item on the belt.
    #[default]
    All,
    /// At least one item.
    AtLeastOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    pub id: RegisterId,
    pub opening_cash: Decimal,
    pub scan_policy: ScanPolicy,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            id: RegisterId(1),
            opening_cash: Decimal::ZERO,
            scan_policy: ScanPolicy::All,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum waiting customers; unbounded when absent.
    pub capacity: Option<usize>,
}

/// Daily opening window, in seconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShopHours {
    pub open_at: f64,
    pub close_at: f64,
}

impl ShopHours {
    /// Whether the shop should be open at `time_of_day`. A window with
    /// `close_at < open_at` wraps past midnight.
    pub fn is_open_at(&self, time_of_day: f64) -> bool {
        if self.open_at <= self.close_at {
            time_of_day >= self.open_at && time_of_day < self.close_at
        } else {
            time_of_day >= self.open_at || time_of_day < self.close_at
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub open_on_start: bool,
    pub wind_down_secs: f64,
    pub day_length_secs: f64,
    /// Optional opening schedule; without one the shop is only toggled by hand.
    pub hours: Option<ShopHours>,
    /// Time of day the simulation starts at.
    pub start_time_secs: f64,
}

impl ShopConfig {
    pub const DEFAULT_WIND_DOWN_SECS: f64 = 60.0;
    pub const DEFAULT_DAY_LENGTH_SECS: f64 = 86_400.0;
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            open_on_start: true,
            wind_down_secs: Self::DEFAULT_WIND_DOWN_SECS,
            day_length_secs: Self::DEFAULT_DAY_LENGTH_SECS,
            hours: None,
            start_time_secs: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    pub id: PumpId,
    /// Tank capacity in gallons.
    pub capacity: Decimal,
    pub initial_fuel: Decimal,
    /// Gallons dispensed per second of flow.
    pub rate_per_sec: Decimal,
    pub price_per_gallon: Decimal,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            id: PumpId(1),
            capacity: dec!(50),
            initial_fuel: dec!(50),
            rate_per_sec: dec!(5),
            price_per_gallon: dec!(3.50),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub register: RegisterConfig,
    pub queue: QueueConfig,
    pub shop: ShopConfig,
    pub pumps: Vec<PumpConfig>,
}

impl StationConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::InvalidConfig`] on syntax or validation errors.
    pub fn from_toml_str(source: &str) -> Result<Self, StationError> {
        let config: Self = toml::from_str(source).map_err(|e| StationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StationError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| StationError::InvalidConfig {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), StationError> {
        let invalid = |reason: String| Err(StationError::InvalidConfig { reason });

        if self.register.opening_cash < Decimal::ZERO {
            return invalid("register opening_cash must not be negative".to_owned());
        }
        if self.queue.capacity == Some(0) {
            return invalid("queue capacity must be at least 1".to_owned());
        }
        if !(self.shop.wind_down_secs.is_finite() && self.shop.wind_down_secs >= 0.0) {
            return invalid("shop wind_down_secs must be a non-negative number".to_owned());
        }
        if !(self.shop.day_length_secs.is_finite() && self.shop.day_length_secs > 0.0) {
            return invalid("shop day_length_secs must be positive".to_owned());
        }
        if let Some(hours) = self.shop.hours {
            let day = 0.0..self.shop.day_length_secs;
            if !day.contains(&hours.open_at) || !day.contains(&hours.close_at) {
                return invalid("shop hours must fall within the day".to_owned());
            }
        }

        let mut seen = HashSet::new();
        for pump in &self.pumps {
            if !seen.insert(pump.id) {
                return invalid(format!("duplicate pump id {}", pump.id));
            }
            if pump.capacity <= Decimal::ZERO
                || pump.rate_per_sec <= Decimal::ZERO
                || pump.price_per_gallon <= Decimal::ZERO
            {
                return invalid(format!(
                    "pump {}: capacity, rate and price must be positive",
                    pump.id
                ));
            }
            if pump.initial_fuel < Decimal::ZERO || pump.initial_fuel > pump.capacity {
                return invalid(format!(
                    "pump {}: initial_fuel must be within 0..=capacity",
                    pump.id
                ));
            }
        }
        Ok(())
    }
}
