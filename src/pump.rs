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

//! Fuel pumps.
//!
//! Each pump owns its own tank and meters fuel to one occupant at a time.
//! Pumps never lock each other, so any number of them can dispense at once.
//!
//! ```text
//!  Free ──acquire──► Occupied ──release──────────► Free
//!                       │
//!                       ├──tick (limit reached)──► Free + SessionFilled
//!                       └──tick (tank dry)───────► Free + TankEmptied
//! ```

use crate::base::{Occupant, PumpId};
use crate::config::PumpConfig;
use crate::error::StationError;
use crate::events::{EventBus, StationEvent};
use crate::money::{round_money, round_volume, seconds};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Metering state while a pump is occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PumpSession {
    pub pump: PumpId,
    pub occupant: Occupant,
    pub gallons: Decimal,
    pub cost: Decimal,
    /// Stop automatically after this many gallons.
    pub limit: Option<Decimal>,
    fuel_at_start: Decimal,
}

/// Final charge of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuelCharge {
    pub pump: PumpId,
    pub occupant: Occupant,
    pub gallons: Decimal,
    pub cost: Decimal,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nobody at the pump.
    Idle,
    Dispensing { drawn: Decimal },
    /// The session limit was reached and the pump released itself.
    Filled { drawn: Decimal, charge: FuelCharge },
    /// The tank ran dry and the pump released itself.
    TankEmptied { drawn: Decimal, charge: FuelCharge },
}

impl TickOutcome {
    pub fn drawn(&self) -> Decimal {
        match self {
            Self::Idle => Decimal::ZERO,
            Self::Dispensing { drawn }
            | Self::Filled { drawn, .. }
            | Self::TankEmptied { drawn, .. } => *drawn,
        }
    }
}

/// Persisted pump state. Sessions in flight are not saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpSnapshot {
    pub id: PumpId,
    pub fuel: Decimal,
}

#[derive(Debug)]
struct PumpData {
    capacity: Decimal,
    fuel: Decimal,
    rate_per_sec: Decimal,
    price_per_gallon: Decimal,
    session: Option<PumpSession>,
}

impl PumpData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.fuel >= Decimal::ZERO,
            "Invariant violated: tank went negative: {}",
            self.fuel
        );
        debug_assert!(
            self.fuel <= self.capacity,
            "Invariant violated: tank above capacity: {}",
            self.fuel
        );
        if let Some(session) = &self.session {
            debug_assert!(
                session.gallons <= session.fuel_at_start,
                "Invariant violated: session drew {} from a tank that held {}",
                session.gallons,
                session.fuel_at_start
            );
        }
    }

    fn acquire(
        &mut self,
        pump: PumpId,
        occupant: Occupant,
        limit: Option<Decimal>,
    ) -> Result<(), StationError> {
        if limit.is_some_and(|gallons| gallons <= Decimal::ZERO) {
            return Err(StationError::InvalidAmount);
        }
        if self.session.is_some() {
            return Err(StationError::PumpBusy);
        }
        if self.fuel <= Decimal::ZERO {
            return Err(StationError::TankEmpty);
        }
        self.session = Some(PumpSession {
            pump,
            occupant,
            gallons: Decimal::ZERO,
            cost: Decimal::ZERO,
            limit,
            fuel_at_start: self.fuel,
        });
        self.assert_invariants();
        Ok(())
    }

    fn tick(&mut self, delta: Duration) -> TickOutcome {
        let fuel = self.fuel;
        let flow = round_volume(self.rate_per_sec * seconds(delta));
        let price = self.price_per_gallon;
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Idle;
        };

        let limit_left = session
            .limit
            .map(|limit| limit - session.gallons)
            .unwrap_or(fuel);
        let drawn = flow.min(fuel).min(limit_left).max(Decimal::ZERO);

        session.gallons += drawn;
        session.cost = round_money(session.gallons * price);
        let filled = session.limit.is_some_and(|limit| session.gallons >= limit);
        self.fuel -= drawn;
        self.assert_invariants();

        if self.fuel <= Decimal::ZERO {
            self.fuel = Decimal::ZERO;
            if let Some(charge) = self.release() {
                return TickOutcome::TankEmptied { drawn, charge };
            }
        }
        if filled {
            if let Some(charge) = self.release() {
                return TickOutcome::Filled { drawn, charge };
            }
        }
        TickOutcome::Dispensing { drawn }
    }

    fn release(&mut self) -> Option<FuelCharge> {
        self.session.take().map(|session| FuelCharge {
            pump: session.pump,
            occupant: session.occupant,
            gallons: session.gallons,
            cost: session.cost,
        })
    }

    fn refill(&mut self, amount: Decimal) -> Result<Decimal, StationError> {
        if amount <= Decimal::ZERO {
            return Err(StationError::InvalidAmount);
        }
        let added = amount.min(self.capacity - self.fuel);
        self.fuel += added;
        if let Some(session) = self.session.as_mut() {
            session.fuel_at_start += added;
        }
        self.assert_invariants();
        Ok(added)
    }
}

/// A metered fuel pump with a finite tank.
pub struct FuelPump {
    id: PumpId,
    inner: Mutex<PumpData>,
    bus: Arc<EventBus>,
}

impl FuelPump {
    pub fn from_config(config: &PumpConfig, bus: Arc<EventBus>) -> Self {
        Self {
            id: config.id,
            inner: Mutex::new(PumpData {
                capacity: config.capacity,
                fuel: config.initial_fuel.min(config.capacity).max(Decimal::ZERO),
                rate_per_sec: config.rate_per_sec,
                price_per_gallon: config.price_per_gallon,
                session: None,
            }),
            bus,
        }
    }

    pub fn id(&self) -> PumpId {
        self.id
    }

    /// Gallons left in the tank.
    pub fn fuel(&self) -> Decimal {
        self.inner.lock().fuel
    }

    pub fn capacity(&self) -> Decimal {
        self.inner.lock().capacity
    }

    pub fn price_per_gallon(&self) -> Decimal {
        self.inner.lock().price_per_gallon
    }

    pub fn is_free(&self) -> bool {
        self.inner.lock().session.is_none()
    }

    pub fn session(&self) -> Option<PumpSession> {
        self.inner.lock().session.clone()
    }

    /// Starts a session for `occupant`.
    ///
    /// # Errors
    ///
    /// - [`StationError::PumpBusy`] - Someone already holds the nozzle.
    /// - [`StationError::TankEmpty`] - No fuel left.
    pub fn acquire(&self, occupant: impl Into<Occupant>) -> Result<(), StationError> {
        self.acquire_inner(occupant.into(), None)
    }

    /// Starts a session that releases itself after `gallons`.
    ///
    /// # Errors
    ///
    /// As [`FuelPump::acquire`], plus [`StationError::InvalidAmount`] for a
    /// non-positive limit.
    pub fn acquire_with_limit(
        &self,
        occupant: impl Into<Occupant>,
        gallons: Decimal,
    ) -> Result<(), StationError> {
        self.acquire_inner(occupant.into(), Some(gallons))
    }

    fn acquire_inner(&self, occupant: Occupant, limit: Option<Decimal>) -> Result<(), StationError> {
        let result = self.inner.lock().acquire(self.id, occupant.clone(), limit);
        match result {
            Ok(()) => {
                debug!(pump = %self.id, occupant = %occupant, "pump acquired");
                self.bus.publish(StationEvent::PumpAcquired {
                    pump: self.id,
                    occupant,
                });
                Ok(())
            }
            Err(e) => {
                warn!(pump = %self.id, occupant = %occupant, error = %e, "acquire rejected");
                Err(e)
            }
        }
    }

    /// Meters `delta` worth of flow to the occupant, if any.
    ///
    /// Ticks on one pump must be sequential; the pump lock enforces it.
    pub fn tick(&self, delta: Duration) -> TickOutcome {
        let outcome = self.inner.lock().tick(delta);
        match &outcome {
            TickOutcome::Filled { charge, .. } => {
                info!(pump = %self.id, gallons = %charge.gallons, "session filled");
                self.publish_charge(charge);
                self.bus.publish(StationEvent::SessionFilled(self.id));
            }
            TickOutcome::TankEmptied { charge, .. } => {
                warn!(pump = %self.id, gallons = %charge.gallons, "tank ran dry mid-session");
                self.publish_charge(charge);
                self.bus.publish(StationEvent::TankEmptied(self.id));
            }
            TickOutcome::Idle | TickOutcome::Dispensing { .. } => {}
        }
        outcome
    }

    /// Ends the session and returns its cost. Releasing a free pump returns
    /// zero and does nothing else.
    pub fn release(&self) -> Decimal {
        self.release_session()
            .map_or(Decimal::ZERO, |charge| charge.cost)
    }

    /// Like [`FuelPump::release`], returning the full charge.
    pub fn release_session(&self) -> Option<FuelCharge> {
        let charge = self.inner.lock().release()?;
        debug!(pump = %self.id, cost = %charge.cost, "pump released");
        self.publish_charge(&charge);
        Some(charge)
    }

    /// Tops up the tank, never past capacity. Returns what was added.
    ///
    /// Safe while a session is running; the extra fuel is available on the
    /// next tick.
    pub fn refill(&self, amount: Decimal) -> Result<Decimal, StationError> {
        let added = self.inner.lock().refill(amount)?;
        info!(pump = %self.id, %added, "tank refilled");
        self.bus.publish(StationEvent::Refilled {
            pump: self.id,
            added,
        });
        Ok(added)
    }

    pub fn snapshot(&self) -> PumpSnapshot {
        PumpSnapshot {
            id: self.id,
            fuel: self.fuel(),
        }
    }

    /// Restores the tank level from a snapshot, clamped to capacity.
    ///
    /// # Errors
    ///
    /// [`StationError::PumpBusy`] while a session is metering from the tank.
    pub(crate) fn restore_fuel(&self, fuel: Decimal) -> Result<(), StationError> {
        let mut data = self.inner.lock();
        if data.session.is_some() {
            return Err(StationError::PumpBusy);
        }
        data.fuel = fuel.min(data.capacity).max(Decimal::ZERO);
        data.assert_invariants();
        Ok(())
    }

    fn publish_charge(&self, charge: &FuelCharge) {
        self.bus.publish(StationEvent::FuelCharged {
            pump: charge.pump,
            occupant: charge.occupant.clone(),
            gallons: charge.gallons,
            cost: charge.cost,
        });
    }
}

impl fmt::Debug for FuelPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.lock();
        f.debug_struct("FuelPump")
            .field("id", &self.id)
            .field("fuel", &data.fuel)
            .field("occupied", &data.session.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn data(fuel: Decimal) -> PumpData {
        PumpData {
            capacity: dec!(50),
            fuel,
            rate_per_sec: dec!(5),
            price_per_gallon: dec!(3.50),
            session: None,
        }
    }

    #[test]
    fn pump_data_tick_meters_flow() {
        let mut data = data(dec!(50));
        data.acquire(PumpId(1), Occupant::Player, None).unwrap();

        let outcome = data.tick(Duration::from_secs(2));

        assert_eq!(outcome, TickOutcome::Dispensing { drawn: dec!(10) });
        let session = data.session.as_ref().unwrap();
        assert_eq!(session.gallons, dec!(10));
        assert_eq!(session.cost, dec!(35.00));
        assert_eq!(data.fuel, dec!(40));
    }

    #[test]
    fn pump_data_tick_caps_at_tank() {
        let mut data = data(dec!(3));
        data.acquire(PumpId(1), Occupant::Player, None).unwrap();

        let outcome = data.tick(Duration::from_secs(1));

        match outcome {
            TickOutcome::TankEmptied { drawn, charge } => {
                assert_eq!(drawn, dec!(3));
                assert_eq!(charge.gallons, dec!(3));
                assert_eq!(charge.cost, dec!(10.50));
            }
            other => panic!("expected TankEmptied, got {other:?}"),
        }
        assert_eq!(data.fuel, Decimal::ZERO);
        assert!(data.session.is_none());
    }

    #[test]
    fn pump_data_limit_stops_session() {
        let mut data = data(dec!(50));
        data.acquire(PumpId(1), Occupant::Player, Some(dec!(7)))
            .unwrap();

        assert_eq!(
            data.tick(Duration::from_secs(1)),
            TickOutcome::Dispensing { drawn: dec!(5) }
        );
        let outcome = data.tick(Duration::from_secs(1));

        assert!(matches!(outcome, TickOutcome::Filled { drawn, .. } if drawn == dec!(2)));
        assert_eq!(data.fuel, dec!(43));
    }

    #[test]
    fn pump_data_refill_clamps_to_capacity() {
        let mut data = data(dec!(45));
        assert_eq!(data.refill(dec!(20)), Ok(dec!(5)));
        assert_eq!(data.fuel, dec!(50));
        assert_eq!(data.refill(dec!(-1)), Err(StationError::InvalidAmount));
    }

    #[test]
    fn pump_data_rejects_non_positive_limit() {
        let mut data = data(dec!(50));
        assert_eq!(
            data.acquire(PumpId(1), Occupant::Player, Some(Decimal::ZERO)),
            Err(StationError::InvalidAmount)
        );
        assert!(data.session.is_none());
    }
}
