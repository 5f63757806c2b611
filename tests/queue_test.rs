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

//! Customer queue integration tests.

use forecourt_rs::config::QueueConfig;
use forecourt_rs::{
    AbandonOutcome, Cart, CustomerId, CustomerQueue, CustomerRef, EnqueueOutcome, EventBus,
    Register, RegisterId, RegisterState, ServeOutcome, StationError,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

// === Helper Functions ===

fn make_queue(capacity: Option<usize>) -> Arc<CustomerQueue> {
    let register = Arc::new(Register::new(RegisterId(1), Arc::new(EventBus::new())));
    CustomerQueue::new(register, &QueueConfig { capacity })
}

fn make_customer(id: u32) -> CustomerRef {
    CustomerRef::new(CustomerId(id), format!("customer-{id}"))
}

fn cart() -> Cart {
    Cart::new().with("Soda", dec!(2.50), 1).unwrap()
}

/// Runs the sale currently on the register to completion.
fn complete_sale(queue: &CustomerQueue) {
    let register = queue.register();
    while register.scan_next_item().is_ok() {}
    register.request_payment(dec!(5.00)).unwrap();
    register.accept_payment().unwrap();
    register.give_change().unwrap();
}

// === Enqueue ===

#[test]
fn first_customer_goes_straight_to_idle_register() {
    let queue = make_queue(None);

    let outcome = queue.enqueue(make_customer(1), cart()).unwrap();

    assert_eq!(outcome, EnqueueOutcome::Serving);
    assert_eq!(queue.serving(), Some(make_customer(1)));
    assert_eq!(queue.register().state(), RegisterState::Scanning);
    assert!(queue.is_empty());
}

#[test]
fn later_customers_wait_in_order() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();

    assert_eq!(
        queue.enqueue(make_customer(2), cart()).unwrap(),
        EnqueueOutcome::Waiting { position: 0 }
    );
    assert_eq!(
        queue.enqueue(make_customer(3), cart()).unwrap(),
        EnqueueOutcome::Waiting { position: 1 }
    );
    assert_eq!(queue.waiting(), vec![make_customer(2), make_customer(3)]);
    assert_eq!(queue.position(CustomerId(3)), Some(1));
}

#[test]
fn duplicate_enqueue_is_a_no_op() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();

    assert_eq!(
        queue.enqueue(make_customer(1), cart()).unwrap(),
        EnqueueOutcome::AlreadyQueued
    );
    assert_eq!(
        queue.enqueue(make_customer(2), cart()).unwrap(),
        EnqueueOutcome::AlreadyQueued
    );
    assert_eq!(queue.len(), 1);
}

#[test]
fn full_queue_is_a_no_op() {
    let queue = make_queue(Some(1));
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();

    assert_eq!(
        queue.enqueue(make_customer(3), cart()).unwrap(),
        EnqueueOutcome::QueueFull
    );
    assert_eq!(queue.waiting(), vec![make_customer(2)]);
}

#[test]
fn empty_cart_is_rejected() {
    let queue = make_queue(None);
    assert_eq!(
        queue.enqueue(make_customer(1), Cart::new()),
        Err(StationError::EmptyCart)
    );
    assert!(queue.serving().is_none());
}

// === Serving ===

#[test]
fn completion_pulls_next_customer() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();

    complete_sale(&queue);

    assert_eq!(queue.serving(), Some(make_customer(2)));
    assert_eq!(
        queue.register().current_customer(),
        Some(make_customer(2))
    );
    assert!(queue.is_empty());
}

#[test]
fn last_completion_leaves_register_idle() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();

    complete_sale(&queue);

    assert!(queue.serving().is_none());
    assert!(queue.register().is_idle());
    assert_eq!(queue.serve_next(), ServeOutcome::Empty);
}

#[test]
fn serve_next_while_busy_is_a_no_op() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();

    assert_eq!(queue.serve_next(), ServeOutcome::Busy);
    assert_eq!(queue.serve_next(), ServeOutcome::Busy);
    assert_eq!(queue.serving(), Some(make_customer(1)));
    assert_eq!(queue.len(), 1);
}

#[test]
fn serves_strictly_in_arrival_order() {
    let queue = make_queue(None);
    for id in 1..=5 {
        queue.enqueue(make_customer(id), cart()).unwrap();
    }

    let mut served = Vec::new();
    while let Some(customer) = queue.serving() {
        served.push(customer.id().0);
        complete_sale(&queue);
    }

    assert_eq!(served, vec![1, 2, 3, 4, 5]);
}

// === Abandonment ===

#[test]
fn abandon_from_middle_keeps_order() {
    let queue = make_queue(None);
    for id in 1..=4 {
        queue.enqueue(make_customer(id), cart()).unwrap();
    }

    assert_eq!(
        queue.abandon(CustomerId(3)).unwrap(),
        AbandonOutcome::LeftQueue
    );
    assert_eq!(queue.waiting(), vec![make_customer(2), make_customer(4)]);
}

#[test]
fn abandon_at_register_cancels_and_serves_next() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();
    queue.register().scan_next_item().unwrap();

    assert_eq!(
        queue.abandon(CustomerId(1)).unwrap(),
        AbandonOutcome::CancelledSale
    );

    assert_eq!(queue.serving(), Some(make_customer(2)));
    assert_eq!(queue.register().cash_balance(), dec!(0));
    let tx = queue.register().transaction().unwrap();
    assert_eq!(tx.total, dec!(0));
}

#[test]
fn abandon_last_customer_at_register_leaves_idle() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();

    queue.abandon(CustomerId(1)).unwrap();

    assert!(queue.register().is_idle());
    assert!(queue.serving().is_none());
}

#[test]
fn abandon_after_paying_is_rejected() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    let register = queue.register();
    register.scan_next_item().unwrap();
    register.request_payment(dec!(5.00)).unwrap();
    register.accept_payment().unwrap();

    assert!(matches!(
        queue.abandon(CustomerId(1)),
        Err(StationError::InvalidStateTransition { .. })
    ));
    assert_eq!(queue.serving(), Some(make_customer(1)));
}

#[test]
fn abandon_unknown_customer_is_benign() {
    let queue = make_queue(None);
    assert_eq!(
        queue.abandon(CustomerId(99)).unwrap(),
        AbandonOutcome::NotQueued
    );
}

#[test]
fn scenario_abandon_while_other_is_served() {
    // Queue [A, B], register idle: A is served, B leaves, A completes.
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();

    queue.abandon(CustomerId(2)).unwrap();
    complete_sale(&queue);

    assert!(queue.is_empty());
    assert!(queue.register().is_idle());
    assert!(queue.serving().is_none());
}

// === Direct register use ===

#[test]
fn player_cancel_at_register_needs_explicit_serve_next() {
    let queue = make_queue(None);
    queue.enqueue(make_customer(1), cart()).unwrap();
    queue.enqueue(make_customer(2), cart()).unwrap();

    queue.register().cancel_transaction().unwrap();
    assert!(queue.register().is_idle());
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.serve_next(), ServeOutcome::Started(make_customer(2)));
}

#[test]
fn register_started_elsewhere_blocks_hand_off() {
    let queue = make_queue(None);
    queue
        .register()
        .start_transaction(make_customer(50), cart())
        .unwrap();

    assert_eq!(
        queue.enqueue(make_customer(1), cart()).unwrap(),
        EnqueueOutcome::Waiting { position: 0 }
    );
    assert_eq!(queue.serve_next(), ServeOutcome::Busy);

    queue.register().cancel_transaction().unwrap();
    assert_eq!(queue.serve_next(), ServeOutcome::Started(make_customer(1)));
}
