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

//! Error types for station operations.
//!
//! Every error is local and recoverable: a failed call leaves the component
//! exactly as it was before the call.

use rust_decimal::Decimal;
use thiserror::Error;

/// Station operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    /// Operation is not permitted in the component's current state
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// Tender does not cover the transaction total
    #[error("insufficient payment: tendered {tendered}, total {total}")]
    InsufficientPayment { tendered: Decimal, total: Decimal },

    /// Every item in the transaction is already scanned
    #[error("nothing to scan")]
    NothingToScan,

    /// Payment requested before any item was scanned
    #[error("no items scanned")]
    NoItemsScanned,

    /// Payment requested while the scan policy still requires scanning
    #[error("{remaining} item(s) left to scan")]
    ItemsLeftToScan { remaining: usize },

    /// Transaction started with nothing in the cart
    #[error("cart is empty")]
    EmptyCart,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Pump already has an occupant
    #[error("pump is busy")]
    PumpBusy,

    /// Pump tank has no fuel left
    #[error("tank is empty")]
    TankEmpty,

    /// Referenced pump does not exist
    #[error("unknown pump")]
    UnknownPump,

    /// Configuration failed validation
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
