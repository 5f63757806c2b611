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

//! How simulated customers decide what to hand over at the register.
//!
//! Any policy is acceptable as long as the tender covers the total; the
//! register still checks it in `accept_payment`.

use crate::money::{round_money, round_up_whole};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const DEFAULT_EXACT_PROBABILITY: f64 = 0.7;
const DEFAULT_MAX_EXTRA_NOTES: u32 = 3;
const NOTE: Decimal = dec!(5);

/// Chooses a tender for a given transaction total.
pub trait PaymentPolicy {
    fn tender(&mut self, total: Decimal) -> Decimal;
}

/// Pays the exact total.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTender;

impl PaymentPolicy for ExactTender {
    fn tender(&mut self, total: Decimal) -> Decimal {
        round_money(total)
    }
}

/// Rounds up to the next whole currency unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundUpTender;

impl PaymentPolicy for RoundUpTender {
    fn tender(&mut self, total: Decimal) -> Decimal {
        round_up_whole(total)
    }
}

/// Pays exact most of the time, otherwise rounds up and adds a random
/// number of five-unit notes.
#[derive(Debug, Clone)]
pub struct RandomTender<R = StdRng> {
    rng: R,
    exact_probability: f64,
    max_extra_notes: u32,
}

impl RandomTender<StdRng> {
    /// Deterministic policy for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomTender<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            exact_probability: DEFAULT_EXACT_PROBABILITY,
            max_extra_notes: DEFAULT_MAX_EXTRA_NOTES,
        }
    }

    pub fn exact_probability(mut self, probability: f64) -> Self {
        if !probability.is_nan() {
            self.exact_probability = probability.clamp(0.0, 1.0);
        }
        self
    }
}

impl<R: Rng> PaymentPolicy for RandomTender<R> {
    fn tender(&mut self, total: Decimal) -> Decimal {
        if self.rng.random_bool(self.exact_probability) {
            return round_money(total);
        }
        let notes = self.rng.random_range(0..=self.max_extra_notes);
        round_up_whole(total) + NOTE * Decimal::from(notes)
    }
}
