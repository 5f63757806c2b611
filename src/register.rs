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

//! Checkout register.
//!
//! Implemented State Machine
//!
//! ```text
//!  Idle ──start──► Scanning ──request_payment──► AwaitingPayment ──accept──► AwaitingChange
//!   ▲                 │                               │                          │
//!   │                 └────────cancel─────────────────┤                          │
//!   └─────────────────────────────────────────────────┴─────────give_change──────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use forecourt_rs::{Cart, CustomerId, CustomerRef, EventBus, Register, RegisterId};
//! use rust_decimal_macros::dec;
//!
//! let register = Register::new(RegisterId(1), Arc::new(EventBus::new()));
//! let cart = Cart::new().with("Soda", dec!(2.50), 1).unwrap();
//! register
//!     .start_transaction(CustomerRef::new(CustomerId(1), "Ada"), cart)
//!     .unwrap();
//! register.scan_next_item().unwrap();
//! register.request_payment(dec!(3.00)).unwrap();
//! assert_eq!(register.accept_payment().unwrap(), dec!(0.50));
//! register.give_change().unwrap();
//! assert_eq!(register.cash_balance(), dec!(2.50));
//! ```

use crate::base::{CustomerRef, RegisterId};
use crate::catalog::{Cart, SaleItem};
use crate::config::{RegisterConfig, ScanPolicy};
use crate::error::StationError;
use crate::events::{EventBus, StationEvent};
use crate::money::round_money;
use crate::payment::PaymentPolicy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Where the register is in its checkout protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegisterState {
    Idle,
    Scanning,
    AwaitingPayment,
    AwaitingChange,
}

impl RegisterState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::AwaitingPayment => "awaiting payment",
            Self::AwaitingChange => "awaiting change",
        }
    }
}

impl fmt::Display for RegisterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sale in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub customer: CustomerRef,
    pub items: Vec<SaleItem>,
    pub total: Decimal,
    pub tendered: Decimal,
    pub change_due: Decimal,
    pub state: RegisterState,
}

impl Transaction {
    fn new(customer: CustomerRef, items: Vec<SaleItem>) -> Self {
        Self {
            customer,
            items,
            total: Decimal::ZERO,
            tendered: Decimal::ZERO,
            change_due: Decimal::ZERO,
            state: RegisterState::Scanning,
        }
    }

    pub fn scanned_count(&self) -> usize {
        self.items.iter().filter(|item| item.scanned).count()
    }

    pub fn remaining_count(&self) -> usize {
        self.items.len() - self.scanned_count()
    }
}

/// Summary of a finished sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub register: RegisterId,
    pub customer: CustomerRef,
    pub total: Decimal,
    pub tendered: Decimal,
    pub change: Decimal,
}

/// Notified after a sale completes and the register has gone idle.
///
/// Called without any register lock held, so implementations may call back
/// into the register.
pub trait CompletionListener: Send + Sync {
    fn sale_completed(&self, register: RegisterId);
}

#[derive(Debug)]
struct RegisterData {
    cash: Decimal,
    scan_policy: ScanPolicy,
    /// `None` exactly when the register is idle.
    transaction: Option<Transaction>,
}

impl RegisterData {
    fn state(&self) -> RegisterState {
        self.transaction
            .as_ref()
            .map_or(RegisterState::Idle, |tx| tx.state)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.cash >= Decimal::ZERO,
            "Invariant violated: cash balance went negative: {}",
            self.cash
        );
        if let Some(tx) = &self.transaction {
            let scanned: Decimal = tx
                .items
                .iter()
                .filter(|item| item.scanned)
                .map(SaleItem::line_total)
                .sum();
            debug_assert_eq!(
                tx.total, scanned,
                "Invariant violated: total drifted from scanned items"
            );
            debug_assert!(
                tx.change_due >= Decimal::ZERO,
                "Invariant violated: negative change due: {}",
                tx.change_due
            );
        }
    }

    /// Returns the active transaction if it is in `expected`.
    fn active_in(
        &mut self,
        operation: &'static str,
        expected: RegisterState,
    ) -> Result<&mut Transaction, StationError> {
        let state = self.state();
        match self.transaction.as_mut() {
            Some(tx) if tx.state == expected => Ok(tx),
            _ => Err(StationError::InvalidStateTransition {
                operation,
                state: state.as_str(),
            }),
        }
    }

    fn start(&mut self, customer: CustomerRef, cart: Cart) -> Result<(), StationError> {
        if self.transaction.is_some() {
            return Err(StationError::InvalidStateTransition {
                operation: "start a transaction",
                state: self.state().as_str(),
            });
        }
        if cart.is_empty() {
            return Err(StationError::EmptyCart);
        }
        self.transaction = Some(Transaction::new(customer, cart.into_sale_items()));
        self.assert_invariants();
        Ok(())
    }

    fn scan(&mut self) -> Result<SaleItem, StationError> {
        let tx = self.active_in("scan", RegisterState::Scanning)?;
        let item = tx
            .items
            .iter_mut()
            .find(|item| !item.scanned)
            .ok_or(StationError::NothingToScan)?;
        item.scanned = true;
        let scanned = item.clone();
        tx.total += scanned.line_total();
        self.assert_invariants();
        Ok(scanned)
    }

    /// The scanning transaction, if it is ready to be paid for.
    fn payable(&mut self) -> Result<&mut Transaction, StationError> {
        let policy = self.scan_policy;
        let tx = self.active_in("request payment", RegisterState::Scanning)?;
        if tx.scanned_count() == 0 {
            return Err(StationError::NoItemsScanned);
        }
        if policy == ScanPolicy::All && tx.remaining_count() > 0 {
            return Err(StationError::ItemsLeftToScan {
                remaining: tx.remaining_count(),
            });
        }
        Ok(tx)
    }

    fn request_payment(&mut self, tendered: Decimal) -> Result<(), StationError> {
        if tendered < Decimal::ZERO {
            return Err(StationError::InvalidAmount);
        }
        let tx = self.payable()?;
        tx.tendered = round_money(tendered);
        tx.state = RegisterState::AwaitingPayment;
        Ok(())
    }

    fn present_tender(&mut self, tendered: Decimal) -> Result<(), StationError> {
        if tendered < Decimal::ZERO {
            return Err(StationError::InvalidAmount);
        }
        let tx = self.active_in("present tender", RegisterState::AwaitingPayment)?;
        tx.tendered = round_money(tendered);
        Ok(())
    }

    fn accept_payment(&mut self) -> Result<Decimal, StationError> {
        let tx = self.active_in("accept payment", RegisterState::AwaitingPayment)?;
        if tx.tendered < tx.total {
            return Err(StationError::InsufficientPayment {
                tendered: tx.tendered,
                total: tx.total,
            });
        }
        tx.change_due = tx.tendered - tx.total;
        tx.state = RegisterState::AwaitingChange;
        let (tendered, change) = (tx.tendered, tx.change_due);
        self.cash += tendered;
        self.assert_invariants();
        Ok(change)
    }

    fn give_change(&mut self) -> Result<Transaction, StationError> {
        let tx = self.active_in("give change", RegisterState::AwaitingChange)?;
        let change = tx.change_due;
        self.cash -= change;
        let finished = self.transaction.take();
        self.assert_invariants();
        finished.ok_or(StationError::InvalidStateTransition {
            operation: "give change",
            state: RegisterState::Idle.as_str(),
        })
    }

    fn cancel(&mut self) -> Result<Transaction, StationError> {
        match self.state() {
            RegisterState::Scanning | RegisterState::AwaitingPayment => {}
            state => {
                return Err(StationError::InvalidStateTransition {
                    operation: "cancel",
                    state: state.as_str(),
                });
            }
        }
        self.transaction
            .take()
            .ok_or(StationError::InvalidStateTransition {
                operation: "cancel",
                state: RegisterState::Idle.as_str(),
            })
    }
}

/// A checkout register serving one customer at a time.
///
/// All mutation goes through `&self` methods that lock the register, so a
/// register may be shared across threads behind an [`Arc`]. Each method either
/// fully transitions or leaves the register untouched.
pub struct Register {
    id: RegisterId,
    inner: Mutex<RegisterData>,
    bus: Arc<EventBus>,
    listener: Mutex<Option<Weak<dyn CompletionListener>>>,
}

impl Register {
    pub fn new(id: RegisterId, bus: Arc<EventBus>) -> Self {
        Self {
            id,
            inner: Mutex::new(RegisterData {
                cash: Decimal::ZERO,
                scan_policy: ScanPolicy::default(),
                transaction: None,
            }),
            bus,
            listener: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RegisterConfig, bus: Arc<EventBus>) -> Self {
        let register = Self::new(config.id, bus);
        {
            let mut data = register.inner.lock();
            data.cash = round_money(config.opening_cash.max(Decimal::ZERO));
            data.scan_policy = config.scan_policy;
        }
        register
    }

    pub fn with_scan_policy(self, policy: ScanPolicy) -> Self {
        self.inner.lock().scan_policy = policy;
        self
    }

    /// Installs the hook told about completed sales. Replaces any earlier one.
    pub fn set_completion_listener(&self, listener: Weak<dyn CompletionListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn id(&self) -> RegisterId {
        self.id
    }

    pub fn state(&self) -> RegisterState {
        self.inner.lock().state()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == RegisterState::Idle
    }

    pub fn cash_balance(&self) -> Decimal {
        self.inner.lock().cash
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        self.inner.lock().scan_policy
    }

    /// Copy of the sale in progress, for rendering.
    pub fn transaction(&self) -> Option<Transaction> {
        self.inner.lock().transaction.clone()
    }

    pub fn current_customer(&self) -> Option<CustomerRef> {
        self.inner
            .lock()
            .transaction
            .as_ref()
            .map(|tx| tx.customer.clone())
    }

    /// Loads `cart` as unscanned items and starts scanning.
    ///
    /// # Errors
    ///
    /// - [`StationError::InvalidStateTransition`] - A transaction is already active.
    /// - [`StationError::EmptyCart`] - Nothing to sell.
    pub fn start_transaction(&self, customer: CustomerRef, cart: Cart) -> Result<(), StationError> {
        let result = self.inner.lock().start(customer.clone(), cart);
        match result {
            Ok(()) => {
                debug!(register = %self.id, customer = %customer, "transaction started");
                self.bus.publish(StationEvent::TransactionStarted {
                    register: self.id,
                    customer,
                });
                Ok(())
            }
            Err(e) => {
                warn!(register = %self.id, customer = %customer, error = %e, "start rejected");
                Err(e)
            }
        }
    }

    /// Scans the first unscanned item and adds it to the total.
    ///
    /// Scanning never advances to payment on its own.
    ///
    /// # Errors
    ///
    /// - [`StationError::InvalidStateTransition`] - Not scanning.
    /// - [`StationError::NothingToScan`] - Every item is already scanned.
    pub fn scan_next_item(&self) -> Result<SaleItem, StationError> {
        let result = self.inner.lock().scan();
        match &result {
            Ok(item) => debug!(register = %self.id, item = %item.name, "item scanned"),
            Err(e) => debug!(register = %self.id, error = %e, "scan rejected"),
        }
        result
    }

    /// Moves to payment with `tendered` presented by the customer or player.
    ///
    /// Under [`ScanPolicy::All`] every item must be scanned first; under
    /// [`ScanPolicy::AtLeastOne`] one scanned item is enough.
    ///
    /// # Errors
    ///
    /// - [`StationError::InvalidStateTransition`] - Not scanning.
    /// - [`StationError::NoItemsScanned`] - Nothing scanned yet.
    /// - [`StationError::ItemsLeftToScan`] - Policy requires all items scanned.
    /// - [`StationError::InvalidAmount`] - Negative tender.
    pub fn request_payment(&self, tendered: Decimal) -> Result<(), StationError> {
        let result = self.inner.lock().request_payment(tendered);
        match &result {
            Ok(()) => debug!(register = %self.id, %tendered, "payment requested"),
            Err(e) => warn!(register = %self.id, error = %e, "payment request rejected"),
        }
        result
    }

    /// Like [`Register::request_payment`], with the tender chosen by `policy`
    /// from the current total. Returns the tender.
    pub fn request_payment_with(
        &self,
        policy: &mut dyn PaymentPolicy,
    ) -> Result<Decimal, StationError> {
        let mut data = self.inner.lock();
        // A rejected request leaves the policy untouched.
        let total = data.payable()?.total;
        let tendered = policy.tender(total);
        data.request_payment(tendered)?;
        drop(data);
        debug!(register = %self.id, %tendered, "payment requested by policy");
        Ok(round_money(tendered))
    }

    /// Replaces the tender while awaiting payment, e.g. after a rejected
    /// [`Register::accept_payment`].
    pub fn present_tender(&self, tendered: Decimal) -> Result<(), StationError> {
        self.inner.lock().present_tender(tendered)
    }

    /// Takes the tender into the drawer and returns the change due.
    ///
    /// # Errors
    ///
    /// - [`StationError::InvalidStateTransition`] - Not awaiting payment.
    /// - [`StationError::InsufficientPayment`] - Tender below total; the
    ///   transaction stays in `AwaitingPayment` and cash is unchanged.
    pub fn accept_payment(&self) -> Result<Decimal, StationError> {
        let result = self.inner.lock().accept_payment();
        match &result {
            Ok(change) => debug!(register = %self.id, %change, "payment accepted"),
            Err(e) => warn!(register = %self.id, error = %e, "payment rejected"),
        }
        result
    }

    /// Pays out the change and completes the sale, even when no change is due.
    ///
    /// Publishes [`StationEvent::SaleCompleted`] and then tells the completion
    /// listener so it can pull the next customer.
    pub fn give_change(&self) -> Result<Receipt, StationError> {
        let finished = self.inner.lock().give_change();
        let tx = match finished {
            Ok(tx) => tx,
            Err(e) => {
                warn!(register = %self.id, error = %e, "give change rejected");
                return Err(e);
            }
        };

        let receipt = Receipt {
            register: self.id,
            customer: tx.customer,
            total: tx.total,
            tendered: tx.tendered,
            change: tx.change_due,
        };
        info!(
            register = %self.id,
            customer = %receipt.customer,
            total = %receipt.total,
            change = %receipt.change,
            "sale completed"
        );
        self.bus.publish(StationEvent::SaleCompleted {
            register: self.id,
            customer: receipt.customer.clone(),
            revenue: receipt.total,
            change: receipt.change,
        });
        self.bus.publish(StationEvent::RegisterIdle(self.id));

        let listener = self.listener.lock().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.sale_completed(self.id);
        }
        Ok(receipt)
    }

    /// Abandons the sale without touching the cash drawer.
    ///
    /// Does not pull the next customer; whoever cancelled decides that.
    ///
    /// # Errors
    ///
    /// [`StationError::InvalidStateTransition`] unless scanning or awaiting payment.
    pub fn cancel_transaction(&self) -> Result<CustomerRef, StationError> {
        let result = self.inner.lock().cancel();
        match result {
            Ok(tx) => {
                info!(register = %self.id, customer = %tx.customer, "transaction cancelled");
                self.bus.publish(StationEvent::TransactionCancelled {
                    register: self.id,
                    customer: tx.customer.clone(),
                });
                self.bus.publish(StationEvent::RegisterIdle(self.id));
                Ok(tx.customer)
            }
            Err(e) => {
                warn!(register = %self.id, error = %e, "cancel rejected");
                Err(e)
            }
        }
    }

    /// Restores the drawer from a saved snapshot.
    ///
    /// # Errors
    ///
    /// [`StationError::InvalidStateTransition`] unless the register is idle;
    /// an open sale may already have tender in the drawer.
    pub(crate) fn restore_cash(&self, cash: Decimal) -> Result<(), StationError> {
        let mut data = self.inner.lock();
        let state = data.state();
        if state != RegisterState::Idle {
            return Err(StationError::InvalidStateTransition {
                operation: "restore the drawer",
                state: state.as_str(),
            });
        }
        data.cash = round_money(cash.max(Decimal::ZERO));
        Ok(())
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.lock();
        f.debug_struct("Register")
            .field("id", &self.id)
            .field("state", &data.state())
            .field("cash", &data.cash)
            .finish()
    }
}
