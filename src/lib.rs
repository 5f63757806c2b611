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

//! # Forecourt
//!
//! This library provides the retail service engine of a gas station
//! simulation: the checkout register, the customer line feeding it, the fuel
//! pumps and the shop's open/closed admission gate.
//!
//! ## Core Components
//!
//! - [`Station`]: Builds and owns every component, fans out the simulation tick
//! - [`ShopGate`]: Admission switch with a wind-down before forced eviction
//! - [`CustomerQueue`]: FIFO line handing customers to a single register
//! - [`Register`]: Scan, total, pay and change state machine with a cash drawer
//! - [`FuelPump`]: Metered, mutually exclusive pump with a finite tank
//! - [`StationError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use forecourt_rs::{Cart, CustomerId, CustomerRef, EnqueueOutcome, Station, StationConfig};
//! use rust_decimal_macros::dec;
//!
//! let station = Station::new(&StationConfig::default()).unwrap();
//! let ada = CustomerRef::new(CustomerId(1), "Ada");
//!
//! assert!(station.admit(ada.clone()));
//! let cart = Cart::new().with("Soda", dec!(2.50), 1).unwrap();
//! assert_eq!(station.queue().enqueue(ada, cart), Ok(EnqueueOutcome::Serving));
//!
//! let register = station.register();
//! register.scan_next_item().unwrap();
//! register.request_payment(dec!(5.00)).unwrap();
//! assert_eq!(register.accept_payment().unwrap(), dec!(2.50));
//! register.give_change().unwrap();
//! assert_eq!(station.takings().sales_revenue, dec!(2.50));
//! ```
//!
//! ## Thread Safety
//!
//! The engine is driven by a single external tick, but every resource carries
//! its own lock, so pumps and the register can also be driven from separate
//! threads.

mod base;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod money;
pub mod payment;
pub mod pump;
pub mod queue;
pub mod register;
pub mod shop;
mod station;

pub use base::{CustomerId, CustomerRef, Occupant, PumpId, RegisterId};
pub use catalog::{Cart, Catalog, Product, SaleItem};
pub use config::{ScanPolicy, StationConfig};
pub use error::StationError;
pub use events::{EventBus, StationEvent};
pub use payment::{ExactTender, PaymentPolicy, RandomTender, RoundUpTender};
pub use pump::{FuelCharge, FuelPump, PumpSession, TickOutcome};
pub use queue::{AbandonOutcome, CustomerQueue, EnqueueOutcome, ServeOutcome};
pub use register::{Receipt, Register, RegisterState, Transaction};
pub use shop::ShopGate;
pub use station::{Station, StationSnapshot, StationTick, Takings};
