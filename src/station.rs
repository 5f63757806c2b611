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

//! Station facade.
//!
//! The [`Station`] builds every component once from a [`StationConfig`] and
//! hands out references; there are no process-wide singletons. It also fans
//! the external simulation tick out to the shop gate, the opening schedule
//! and every pump.
//!
//! # Thread Safety
//!
//! Pumps live in a [`DashMap`] and each pump, the register and the queue
//! carry their own lock, so independent resources progress independently.

use crate::base::{CustomerRef, PumpId};
use crate::clock::{ShopSchedule, SimClock};
use crate::config::StationConfig;
use crate::error::StationError;
use crate::events::{EventBus, StationEvent};
use crate::pump::{FuelPump, PumpSnapshot, TickOutcome};
use crate::queue::CustomerQueue;
use crate::register::{Register, RegisterState};
use crate::shop::{ShopGate, ShopSnapshot};
use crossbeam::channel::Receiver;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything external save/load needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSnapshot {
    pub shop: ShopSnapshot,
    pub register_cash: Decimal,
    pub pumps: Vec<PumpSnapshot>,
}

/// Running totals of what the station reported to the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Takings {
    pub sales_count: u32,
    pub sales_revenue: Decimal,
    pub fuel_sessions: u32,
    pub fuel_gallons: Decimal,
    pub fuel_revenue: Decimal,
}

impl Takings {
    fn record(&mut self, event: &StationEvent) {
        match event {
            StationEvent::SaleCompleted { revenue, .. } => {
                self.sales_count += 1;
                self.sales_revenue += *revenue;
            }
            StationEvent::FuelCharged { gallons, cost, .. } => {
                self.fuel_sessions += 1;
                self.fuel_gallons += *gallons;
                self.fuel_revenue += *cost;
            }
            _ => {}
        }
    }

    pub fn total(&self) -> Decimal {
        self.sales_revenue + self.fuel_revenue
    }
}

/// What one station tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationTick {
    /// `Some(open)` when the schedule toggled the shop this tick.
    pub scheduled: Option<bool>,
    /// Customers forced out by an expired wind-down.
    pub evicted: Vec<CustomerRef>,
    /// Per-pump outcomes, ordered by pump id.
    pub pumps: Vec<(PumpId, TickOutcome)>,
}

pub struct Station {
    bus: Arc<EventBus>,
    gate: ShopGate,
    register: Arc<Register>,
    queue: Arc<CustomerQueue>,
    pumps: DashMap<PumpId, FuelPump>,
    clock: Mutex<SimClock>,
    schedule: Mutex<Option<ShopSchedule>>,
    ledger: Receiver<StationEvent>,
    takings: Mutex<Takings>,
}

impl Station {
    /// Builds a station from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::InvalidConfig`] if validation fails.
    pub fn new(config: &StationConfig) -> Result<Self, StationError> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let ledger = bus.subscribe();
        let register = Arc::new(Register::from_config(&config.register, Arc::clone(&bus)));
        let queue = CustomerQueue::new(Arc::clone(&register), &config.queue);
        let gate = ShopGate::from_config(&config.shop, Arc::clone(&bus));
        let pumps = config
            .pumps
            .iter()
            .map(|pump| (pump.id, FuelPump::from_config(pump, Arc::clone(&bus))))
            .collect();

        let station = Self {
            bus,
            gate,
            register,
            queue,
            pumps,
            clock: Mutex::new(SimClock::from_config(&config.shop)),
            schedule: Mutex::new(config.shop.hours.map(ShopSchedule::new)),
            ledger,
            takings: Mutex::new(Takings::default()),
        };
        station.apply_schedule();
        info!(
            pumps = station.pumps.len(),
            open = station.gate.is_accepting(),
            "station ready"
        );
        Ok(station)
    }

    pub fn gate(&self) -> &ShopGate {
        &self.gate
    }

    pub fn register(&self) -> &Arc<Register> {
        &self.register
    }

    pub fn queue(&self) -> &Arc<CustomerQueue> {
        &self.queue
    }

    /// New event subscription; see [`EventBus::subscribe`].
    pub fn subscribe(&self) -> Receiver<StationEvent> {
        self.bus.subscribe()
    }

    /// Looks up a pump.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::UnknownPump`] if no pump has this id.
    pub fn pump(
        &self,
        id: PumpId,
    ) -> Result<dashmap::mapref::one::Ref<'_, PumpId, FuelPump>, StationError> {
        self.pumps.get(&id).ok_or(StationError::UnknownPump)
    }

    /// Pump ids in ascending order.
    pub fn pump_ids(&self) -> Vec<PumpId> {
        let mut ids: Vec<PumpId> = self.pumps.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Lets a customer in if the shop is accepting. Returns whether they were
    /// admitted.
    pub fn admit(&self, customer: CustomerRef) -> bool {
        if !self.gate.is_accepting() {
            debug!(customer = %customer, "admission refused, shop closed");
            return false;
        }
        self.gate.register_entered(customer);
        true
    }

    pub fn time_of_day_secs(&self) -> f64 {
        self.clock.lock().time_of_day_secs()
    }

    /// Advances the whole station by `delta`.
    pub fn tick(&self, delta: Duration) -> StationTick {
        self.clock.lock().advance(delta);
        let was_accepting = self.gate.is_accepting();
        let scheduled = self.apply_schedule();
        // A wind-down started by this tick's schedule boundary gets its full
        // grace period.
        let evicted = if was_accepting && scheduled == Some(false) {
            Vec::new()
        } else {
            self.gate.tick(delta)
        };

        let mut pumps: Vec<(PumpId, TickOutcome)> = self
            .pumps
            .iter()
            .map(|entry| (*entry.key(), entry.value().tick(delta)))
            .collect();
        pumps.sort_by_key(|(id, _)| *id);
        drop(self.record_takings());

        StationTick {
            scheduled,
            evicted,
            pumps,
        }
    }

    fn apply_schedule(&self) -> Option<bool> {
        let time_of_day = self.clock.lock().time_of_day_secs();
        let open = self.schedule.lock().as_mut()?.poll(time_of_day)?;
        debug!(time_of_day, open, "schedule boundary");
        if open {
            self.gate.open();
        } else {
            self.gate.close();
        }
        Some(open)
    }

    /// Revenue and fuel sold so far.
    pub fn takings(&self) -> Takings {
        self.record_takings().clone()
    }

    fn record_takings(&self) -> parking_lot::MutexGuard<'_, Takings> {
        let mut takings = self.takings.lock();
        for event in self.ledger.try_iter() {
            takings.record(&event);
        }
        takings
    }

    pub fn snapshot(&self) -> StationSnapshot {
        let pumps = self
            .pump_ids()
            .into_iter()
            .filter_map(|id| self.pumps.get(&id).map(|pump| pump.snapshot()))
            .collect();
        StationSnapshot {
            shop: self.gate.snapshot(),
            register_cash: self.register.cash_balance(),
            pumps,
        }
    }

    /// Applies a saved snapshot. Tank levels are clamped to capacity and
    /// snapshots for unknown pumps are skipped.
    ///
    /// Only a quiet station can be restored: the register must be idle and
    /// every restored pump free. Nothing is changed when the check fails.
    ///
    /// # Errors
    ///
    /// - [`StationError::InvalidStateTransition`] - A sale is in progress.
    /// - [`StationError::PumpBusy`] - A restored pump has an active session.
    pub fn restore(&self, snapshot: &StationSnapshot) -> Result<(), StationError> {
        let state = self.register.state();
        if state != RegisterState::Idle {
            warn!(%state, "restore refused, sale in progress");
            return Err(StationError::InvalidStateTransition {
                operation: "restore a snapshot",
                state: state.as_str(),
            });
        }
        for saved in &snapshot.pumps {
            if self.pumps.get(&saved.id).is_some_and(|pump| !pump.is_free()) {
                warn!(pump = %saved.id, "restore refused, pump in use");
                return Err(StationError::PumpBusy);
            }
        }

        self.register.restore_cash(snapshot.register_cash)?;
        for saved in &snapshot.pumps {
            match self.pumps.get(&saved.id) {
                Some(pump) => pump.restore_fuel(saved.fuel)?,
                None => warn!(pump = %saved.id, "snapshot for unknown pump skipped"),
            }
        }
        self.gate.restore(&snapshot.shop);
        info!("station restored from snapshot");
        Ok(())
    }
}
