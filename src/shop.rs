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

//! Shop admission gate.
//!
//! A single open/closed switch plus the set of customers currently inside.
//! Closing asks everyone inside to leave and starts a wind-down timer; if
//! anyone is still inside when it runs out they are forcibly removed. That
//! timer is the only hard eviction path in the station.

use crate::base::{CustomerId, CustomerRef};
use crate::config::ShopConfig;
use crate::events::{EventBus, StationEvent};
use crate::money::duration_from_secs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persisted shop state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSnapshot {
    pub is_open: bool,
    pub customers_inside: Vec<CustomerRef>,
}

#[derive(Debug)]
struct ShopData {
    is_open: bool,
    /// Ordered by id so eviction signals are deterministic.
    inside: BTreeMap<CustomerId, CustomerRef>,
    wind_down_left: Option<Duration>,
}

/// Open/closed switch with a grace period for customers already inside.
#[derive(Debug)]
pub struct ShopGate {
    wind_down: Duration,
    inner: Mutex<ShopData>,
    bus: Arc<EventBus>,
}

impl ShopGate {
    pub const DEFAULT_WIND_DOWN: Duration = Duration::from_secs(60);

    pub fn new(is_open: bool, wind_down: Duration, bus: Arc<EventBus>) -> Self {
        Self {
            wind_down,
            inner: Mutex::new(ShopData {
                is_open,
                inside: BTreeMap::new(),
                wind_down_left: None,
            }),
            bus,
        }
    }

    pub fn from_config(config: &ShopConfig, bus: Arc<EventBus>) -> Self {
        Self::new(
            config.open_on_start,
            duration_from_secs(config.wind_down_secs),
            bus,
        )
    }

    /// Opens the shop. Cancels a pending wind-down and its eviction.
    ///
    /// Returns `false` if the shop was already open.
    pub fn open(&self) -> bool {
        let mut data = self.inner.lock();
        if data.is_open {
            return false;
        }
        data.is_open = true;
        let cancelled = data.wind_down_left.take();
        drop(data);

        if let Some(left) = cancelled {
            info!(remaining_secs = left.as_secs_f64(), "wind-down cancelled");
        }
        info!("shop opened");
        self.bus.publish(StationEvent::ShopOpened);
        true
    }

    /// Closes the shop, asks everyone inside to leave and starts the wind-down.
    ///
    /// Returns the customers that were asked to leave. Closing a closed shop
    /// is a no-op and does not restart the timer.
    pub fn close(&self) -> Vec<CustomerRef> {
        let mut data = self.inner.lock();
        if !data.is_open {
            return Vec::new();
        }
        data.is_open = false;
        data.wind_down_left = Some(self.wind_down);
        let asked: Vec<CustomerRef> = data.inside.values().cloned().collect();
        drop(data);

        info!(
            inside = asked.len(),
            wind_down_secs = self.wind_down.as_secs_f64(),
            "shop closed"
        );
        self.bus.publish(StationEvent::ShopClosed);
        for customer in &asked {
            self.bus.publish(StationEvent::PleaseLeave(customer.clone()));
        }
        asked
    }

    /// Whether new customers may be routed to the shop.
    pub fn is_accepting(&self) -> bool {
        self.inner.lock().is_open
    }

    /// Records a customer walking in. Returns `false` if already inside.
    pub fn register_entered(&self, customer: CustomerRef) -> bool {
        let mut data = self.inner.lock();
        if !data.is_open {
            warn!(customer = %customer, "customer entered a closed shop");
        }
        let id = customer.id();
        if data.inside.contains_key(&id) {
            return false;
        }
        debug!(customer = %customer, "customer entered");
        data.inside.insert(id, customer);
        true
    }

    /// Records a customer walking out. Returns `false` if they were not inside.
    pub fn register_left(&self, customer: CustomerId) -> bool {
        let removed = self.inner.lock().inside.remove(&customer);
        match removed {
            Some(customer) => {
                debug!(customer = %customer, "customer left");
                true
            }
            None => false,
        }
    }

    /// Advances the wind-down timer. When it expires, everyone still inside
    /// is forced out exactly once and returned.
    pub fn tick(&self, delta: Duration) -> Vec<CustomerRef> {
        let mut data = self.inner.lock();
        let Some(left) = data.wind_down_left else {
            return Vec::new();
        };
        if left > delta {
            data.wind_down_left = Some(left - delta);
            return Vec::new();
        }
        data.wind_down_left = None;
        let evicted: Vec<CustomerRef> = std::mem::take(&mut data.inside).into_values().collect();
        drop(data);

        if !evicted.is_empty() {
            info!(count = evicted.len(), "wind-down expired, forcing customers out");
        }
        for customer in &evicted {
            self.bus.publish(StationEvent::ForcedLeave(customer.clone()));
        }
        evicted
    }

    /// Time left before forced eviction, if a wind-down is running.
    pub fn wind_down_remaining(&self) -> Option<Duration> {
        self.inner.lock().wind_down_left
    }

    pub fn is_inside(&self, customer: CustomerId) -> bool {
        self.inner.lock().inside.contains_key(&customer)
    }

    pub fn customers_inside(&self) -> Vec<CustomerRef> {
        self.inner.lock().inside.values().cloned().collect()
    }

    pub fn snapshot(&self) -> ShopSnapshot {
        let data = self.inner.lock();
        ShopSnapshot {
            is_open: data.is_open,
            customers_inside: data.inside.values().cloned().collect(),
        }
    }

    /// Replaces the gate state with a saved snapshot. No wind-down is resumed.
    pub(crate) fn restore(&self, snapshot: &ShopSnapshot) {
        let mut data = self.inner.lock();
        data.is_open = snapshot.is_open;
        data.wind_down_left = None;
        data.inside = snapshot
            .customers_inside
            .iter()
            .map(|customer| (customer.id(), customer.clone()))
            .collect();
    }
}
