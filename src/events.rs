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

//! Typed station events and their broadcast bus.
//!
//! Components publish [`StationEvent`]s after a state change has fully
//! committed. Subscribers (UI, wallet, customer mover) each get their own
//! [`crossbeam`] receiver; a subscriber that drops its receiver is pruned on
//! the next publish.

use crate::base::{CustomerRef, Occupant, PumpId, RegisterId};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

/// Everything the engine reports to the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StationEvent {
    // Shop gate
    ShopOpened,
    ShopClosed,
    /// Polite request for the mover to walk a customer out.
    PleaseLeave(CustomerRef),
    /// Wind-down expired; the customer has been removed from the shop.
    ForcedLeave(CustomerRef),

    // Checkout
    TransactionStarted {
        register: RegisterId,
        customer: CustomerRef,
    },
    TransactionCancelled {
        register: RegisterId,
        customer: CustomerRef,
    },
    /// A completed sale. The wallet credits `revenue`.
    SaleCompleted {
        register: RegisterId,
        customer: CustomerRef,
        revenue: Decimal,
        change: Decimal,
    },
    RegisterIdle(RegisterId),

    // Fuel
    PumpAcquired {
        pump: PumpId,
        occupant: Occupant,
    },
    /// A session ended. The wallet debits `cost` from the occupant.
    FuelCharged {
        pump: PumpId,
        occupant: Occupant,
        gallons: Decimal,
        cost: Decimal,
    },
    /// The session reached its fill limit and released itself.
    SessionFilled(PumpId),
    /// The tank ran dry mid-session and the pump released itself.
    TankEmptied(PumpId),
    Refilled {
        pump: PumpId,
        added: Decimal,
    },
}

/// Fan-out publisher for [`StationEvent`]s.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<StationEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber. Only events published afterwards are seen.
    pub fn subscribe(&self) -> Receiver<StationEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber.
    pub fn publish(&self, event: StationEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
