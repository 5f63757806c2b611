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

//! Fixed-point helpers for money and fuel volumes.
//!
//! Money is carried as [`Decimal`] rounded to cents; fuel volumes keep four
//! decimal places so that many small ticks do not drift.

use rust_decimal::{Decimal, RoundingStrategy};
use std::time::Duration;

/// Decimal places kept for currency amounts.
pub const MONEY_PRECISION: u32 = 2;

/// Decimal places kept for fuel volumes (gallons).
pub const VOLUME_PRECISION: u32 = 4;

/// Rounds an amount to cents using banker's rounding.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(MONEY_PRECISION)
}

/// Rounds a volume to [`VOLUME_PRECISION`] places, toward zero.
///
/// Truncating keeps a metered draw from ever exceeding what the tank holds.
pub fn round_volume(volume: Decimal) -> Decimal {
    volume.round_dp_with_strategy(VOLUME_PRECISION, RoundingStrategy::ToZero)
}

/// Rounds up to the next whole currency unit (`8.50` becomes `9`).
pub fn round_up_whole(amount: Decimal) -> Decimal {
    amount.ceil()
}

/// Converts a tick duration to seconds without going through `f64`.
pub fn seconds(delta: Duration) -> Decimal {
    Decimal::from_i128_with_scale(delta.as_micros() as i128, 6)
}

/// Converts fractional seconds (as found in config files) to a [`Duration`].
///
/// Negative and NaN inputs clamp to zero, overflowing ones to [`Duration::MAX`].
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
