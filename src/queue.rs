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

//! Customer line in front of a single register.
//!
//! The queue owns admission order and the hand-off into its [`Register`]; it
//! never touches transaction data. Service order is strictly first in, first
//! out; customers may leave from any position without disturbing the others.
//!
//! Lock order is always queue, then register. The register releases its own
//! lock before calling back into the queue on completion.

use crate::base::{CustomerId, CustomerRef, RegisterId};
use crate::catalog::Cart;
use crate::config::QueueConfig;
use crate::error::StationError;
use crate::register::{CompletionListener, Register};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Result of [`CustomerQueue::enqueue`]. Duplicates and a full line are
/// benign outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Waiting at this zero-based position.
    Waiting { position: usize },
    /// Went straight to the idle register.
    Serving,
    AlreadyQueued,
    QueueFull,
}

/// Result of [`CustomerQueue::abandon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonOutcome {
    /// Left the line before being served.
    LeftQueue,
    /// Was at the register; the sale was cancelled.
    CancelledSale,
    /// Neither waiting nor being served.
    NotQueued,
}

/// Result of [`CustomerQueue::serve_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    Started(CustomerRef),
    /// Nobody waiting; the register stays idle.
    Empty,
    /// The register is already serving someone.
    Busy,
}

#[derive(Debug)]
struct Waiting {
    customer: CustomerRef,
    cart: Cart,
}

#[derive(Debug, Default)]
struct QueueData {
    waiting: VecDeque<Waiting>,
    serving: Option<CustomerRef>,
}

impl QueueData {
    fn position(&self, id: CustomerId) -> Option<usize> {
        self.waiting.iter().position(|w| w.customer.id() == id)
    }

    fn is_serving(&self, id: CustomerId) -> bool {
        self.serving.as_ref().is_some_and(|c| c.id() == id)
    }
}

/// FIFO admission into exactly one [`Register`].
#[derive(Debug)]
pub struct CustomerQueue {
    register: Arc<Register>,
    capacity: Option<usize>,
    inner: Mutex<QueueData>,
}

impl CustomerQueue {
    /// Creates the queue and registers it as the register's completion
    /// listener, so finished sales pull the next customer.
    pub fn new(register: Arc<Register>, config: &QueueConfig) -> Arc<Self> {
        let queue = Arc::new(Self {
            register,
            capacity: config.capacity,
            inner: Mutex::new(QueueData::default()),
        });
        let weak = Arc::downgrade(&queue);
        let listener: Weak<dyn CompletionListener> = weak;
        queue.register.set_completion_listener(listener);
        queue
    }

    pub fn register(&self) -> &Arc<Register> {
        &self.register
    }

    /// Adds a customer to the back of the line. If the register is idle and
    /// nobody is being served, they go straight to the register.
    ///
    /// # Errors
    ///
    /// [`StationError::EmptyCart`] - Nothing to buy.
    pub fn enqueue(
        &self,
        customer: CustomerRef,
        cart: Cart,
    ) -> Result<EnqueueOutcome, StationError> {
        if cart.is_empty() {
            return Err(StationError::EmptyCart);
        }

        let mut data = self.inner.lock();
        self.reconcile(&mut data);

        if data.is_serving(customer.id()) || data.position(customer.id()).is_some() {
            debug!(customer = %customer, "duplicate enqueue ignored");
            return Ok(EnqueueOutcome::AlreadyQueued);
        }
        if self
            .capacity
            .is_some_and(|capacity| data.waiting.len() >= capacity)
        {
            debug!(customer = %customer, "queue full");
            return Ok(EnqueueOutcome::QueueFull);
        }

        let id = customer.id();
        debug!(customer = %customer, position = data.waiting.len(), "customer enqueued");
        data.waiting.push_back(Waiting { customer, cart });

        if data.serving.is_none() {
            self.serve_next_locked(&mut data);
        }
        if data.is_serving(id) {
            return Ok(EnqueueOutcome::Serving);
        }
        let position = data.position(id).unwrap_or(data.waiting.len());
        Ok(EnqueueOutcome::Waiting { position })
    }

    /// Removes a customer from wherever they are in the line.
    ///
    /// If they were at the register, the sale is cancelled and the next
    /// customer is pulled.
    ///
    /// # Errors
    ///
    /// [`StationError::InvalidStateTransition`] - The customer has already paid
    /// and is waiting for change; the sale must finish.
    pub fn abandon(&self, customer: CustomerId) -> Result<AbandonOutcome, StationError> {
        let mut data = self.inner.lock();
        self.reconcile(&mut data);

        if let Some(position) = data.position(customer) {
            if let Some(left) = data.waiting.remove(position) {
                info!(customer = %left.customer, position, "customer left the queue");
            }
            return Ok(AbandonOutcome::LeftQueue);
        }

        if data.is_serving(customer) {
            self.register.cancel_transaction()?;
            data.serving = None;
            self.serve_next_locked(&mut data);
            return Ok(AbandonOutcome::CancelledSale);
        }

        Ok(AbandonOutcome::NotQueued)
    }

    /// Starts the head of the line on the register if the register is idle.
    ///
    /// Calling this while the register is busy is a no-op.
    pub fn serve_next(&self) -> ServeOutcome {
        let mut data = self.inner.lock();
        self.reconcile(&mut data);
        self.serve_next_locked(&mut data)
    }

    fn serve_next_locked(&self, data: &mut QueueData) -> ServeOutcome {
        if data.serving.is_some() || !self.register.is_idle() {
            return ServeOutcome::Busy;
        }
        let Some(next) = data.waiting.pop_front() else {
            debug!(register = %self.register.id(), "queue empty, register idle");
            return ServeOutcome::Empty;
        };

        let customer = next.customer.clone();
        match self
            .register
            .start_transaction(customer.clone(), next.cart.clone())
        {
            Ok(()) => {
                data.serving = Some(customer.clone());
                ServeOutcome::Started(customer)
            }
            Err(e) => {
                // Someone started a sale on the register directly.
                warn!(customer = %customer, error = %e, "hand-off to register failed");
                data.waiting.push_front(next);
                ServeOutcome::Busy
            }
        }
    }

    /// Forgets the served customer if the register no longer has them, e.g.
    /// after the player cancelled the sale at the register.
    fn reconcile(&self, data: &mut QueueData) {
        if let Some(serving) = &data.serving {
            if self.register.current_customer().as_ref() != Some(serving) {
                debug!(customer = %serving, "register no longer serving customer");
                data.serving = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().waiting.is_empty()
    }

    /// Waiting customers in service order, excluding the one being served.
    pub fn waiting(&self) -> Vec<CustomerRef> {
        self.inner
            .lock()
            .waiting
            .iter()
            .map(|w| w.customer.clone())
            .collect()
    }

    pub fn position(&self, customer: CustomerId) -> Option<usize> {
        self.inner.lock().position(customer)
    }

    pub fn serving(&self) -> Option<CustomerRef> {
        let mut data = self.inner.lock();
        self.reconcile(&mut data);
        data.serving.clone()
    }
}

impl CompletionListener for CustomerQueue {
    fn sale_completed(&self, register: RegisterId) {
        let mut data = self.inner.lock();
        // Another call may already have handed the register to the next
        // customer between completion and this callback.
        self.reconcile(&mut data);
        if let ServeOutcome::Started(customer) = self.serve_next_locked(&mut data) {
            debug!(%register, customer = %customer, "next customer pulled");
        }
    }
}
