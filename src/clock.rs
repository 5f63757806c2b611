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

//! Simulation clock and opening schedule.
//!
//! The clock is advanced only by the external tick; nothing here reads wall
//! time. Time of day is derived from the elapsed total, never stored apart
//! from it.

use crate::config::{ShopConfig, ShopHours};
use crate::money::duration_from_secs;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    elapsed: Duration,
    day_length: Duration,
}

impl SimClock {
    /// Clock starting at `start` into the day. A zero day length is treated
    /// as one second.
    pub fn new(day_length: Duration, start: Duration) -> Self {
        let day_length = day_length.max(Duration::from_secs(1));
        Self {
            elapsed: start,
            day_length,
        }
    }

    pub fn from_config(config: &ShopConfig) -> Self {
        Self::new(
            duration_from_secs(config.day_length_secs),
            duration_from_secs(config.start_time_secs),
        )
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Completed days since the clock started at midnight.
    pub fn day(&self) -> u64 {
        (self.elapsed.as_nanos() / self.day_length.as_nanos()) as u64
    }

    /// Seconds since midnight of the current day.
    pub fn time_of_day_secs(&self) -> f64 {
        let nanos = self.elapsed.as_nanos() % self.day_length.as_nanos();
        Duration::from_nanos(nanos as u64).as_secs_f64()
    }
}

/// Turns [`ShopHours`] into open/close commands at the window edges.
///
/// Only edges produce commands, so an operator can override the gate by hand
/// until the next boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopSchedule {
    hours: ShopHours,
    last: Option<bool>,
}

impl ShopSchedule {
    pub fn new(hours: ShopHours) -> Self {
        Self { hours, last: None }
    }

    /// Returns `Some(open)` when the scheduled state differs from the last
    /// poll, including the very first poll.
    pub fn poll(&mut self, time_of_day_secs: f64) -> Option<bool> {
        let open = self.hours.is_open_at(time_of_day_secs);
        if self.last == Some(open) {
            return None;
        }
        self.last = Some(open);
        Some(open)
    }
}
