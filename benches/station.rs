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

//! Benchmarks for the station engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single checkout through the register
//! - Queue throughput with completion hand-off
//! - Pump metering per tick
//! - Parallel sessions across independent pumps

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use forecourt_rs::config::{PumpConfig, QueueConfig};
use forecourt_rs::{
    Cart, CustomerId, CustomerQueue, CustomerRef, EventBus, ExactTender, FuelPump, PumpId,
    Register, RegisterId, Station, StationConfig,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Helper Functions
// =============================================================================

fn make_cart(lines: usize) -> Cart {
    let mut cart = Cart::new();
    for i in 0..lines {
        cart.add(format!("item-{i}"), Decimal::new(199 + i as i64, 2), 1)
            .expect("valid line");
    }
    cart
}

fn checkout(register: &Register) {
    while register.scan_next_item().is_ok() {}
    register
        .request_payment_with(&mut ExactTender)
        .expect("all items scanned");
    register.accept_payment().expect("exact tender");
    register.give_change().expect("paid");
}

fn make_station(pumps: u16) -> Station {
    let config = StationConfig {
        pumps: (1..=pumps)
            .map(|id| PumpConfig {
                id: PumpId(id),
                capacity: Decimal::new(1_000_000, 0),
                initial_fuel: Decimal::new(1_000_000, 0),
                ..PumpConfig::default()
            })
            .collect(),
        ..StationConfig::default()
    };
    Station::new(&config).expect("valid config")
}

// =============================================================================
// Register Benchmarks
// =============================================================================

fn bench_single_checkout(c: &mut Criterion) {
    let register = Register::new(RegisterId(1), Arc::new(EventBus::new()));

    c.bench_function("single_checkout_3_items", |b| {
        b.iter(|| {
            register
                .start_transaction(CustomerRef::new(CustomerId(1), "bench"), make_cart(3))
                .expect("idle register");
            checkout(black_box(&register));
        })
    });
}

fn bench_cart_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout_by_cart_size");

    for lines in [1, 10, 100] {
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, &lines| {
            let register = Register::new(RegisterId(1), Arc::new(EventBus::new()));
            b.iter(|| {
                register
                    .start_transaction(CustomerRef::new(CustomerId(1), "bench"), make_cart(lines))
                    .expect("idle register");
                checkout(&register);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Queue Benchmarks
// =============================================================================

fn bench_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_throughput");

    for count in [10u32, 100, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let register = Arc::new(Register::new(RegisterId(1), Arc::new(EventBus::new())));
                let queue = CustomerQueue::new(Arc::clone(&register), &QueueConfig::default());
                for id in 0..count {
                    queue
                        .enqueue(CustomerRef::new(CustomerId(id), "bench"), make_cart(2))
                        .expect("non-empty cart");
                }
                while queue.serving().is_some() {
                    checkout(&register);
                }
                black_box(register.cash_balance())
            })
        });
    }
    group.finish();
}

// =============================================================================
// Pump Benchmarks
// =============================================================================

fn bench_pump_tick(c: &mut Criterion) {
    let pump = FuelPump::from_config(
        &PumpConfig {
            capacity: Decimal::new(1_000_000_000, 0),
            initial_fuel: Decimal::new(1_000_000_000, 0),
            ..PumpConfig::default()
        },
        Arc::new(EventBus::new()),
    );
    pump.acquire(CustomerRef::new(CustomerId(1), "bench"))
        .expect("free pump");

    c.bench_function("pump_tick_16ms", |b| {
        b.iter(|| black_box(pump.tick(Duration::from_millis(16))))
    });
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_pumps(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_pump_sessions");

    for pumps in [1u16, 4, 16] {
        group.throughput(Throughput::Elements(pumps as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pumps), &pumps, |b, &pumps| {
            let station = make_station(pumps);
            b.iter(|| {
                station.pump_ids().into_par_iter().for_each(|id| {
                    let pump = station.pump(id).expect("configured pump");
                    let _ = pump.acquire(CustomerRef::new(CustomerId(id.0 as u32), "bench"));
                    for _ in 0..10 {
                        pump.tick(Duration::from_millis(100));
                    }
                    black_box(pump.release());
                });
            })
        });
    }
    group.finish();
}

fn bench_station_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("station_tick");

    for pumps in [1u16, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(pumps), &pumps, |b, &pumps| {
            let station = make_station(pumps);
            for id in station.pump_ids() {
                let pump = station.pump(id).expect("configured pump");
                let _ = pump.acquire(CustomerRef::new(CustomerId(id.0 as u32), "bench"));
            }
            b.iter(|| black_box(station.tick(Duration::from_millis(16))))
        });
    }
    group.finish();
}

criterion_group!(register, bench_single_checkout, bench_cart_sizes,);

criterion_group!(queue, bench_queue_throughput,);

criterion_group!(pumps, bench_pump_tick,);

criterion_group!(concurrent, bench_parallel_pumps, bench_station_tick,);

criterion_main!(register, queue, pumps, concurrent);
