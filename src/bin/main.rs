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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use forecourt_rs::money::duration_from_secs;
use forecourt_rs::{
    Cart, CustomerId, CustomerRef, Occupant, PumpId, RandomTender, Station, StationConfig,
    StationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Forecourt - Replay station scenario scripts
///
/// Reads timed commands from a CSV file, drives a simulated gas station with
/// them and writes the final state to stdout.
#[derive(Parser, Debug)]
#[command(name = "forecourt-rs")]
#[command(about = "Replays gas station scenario CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with scenario commands
    ///
    /// Expected format: at,command,target,arg
    /// Example: cargo run -- scenario.csv > summary.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Station configuration (TOML); defaults to one pump and an open shop
    #[arg(short, long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Simulation step between commands, in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Seed for simulated customers paying with `pay,,,auto`
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Print the final snapshot as JSON instead of CSV
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match StationConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => default_config(),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let runner = Runner {
        step: Duration::from_millis(args.tick_ms.max(1)),
        seed: args.seed,
    };
    let station = match runner.run(&config, BufReader::new(file)) {
        Ok(station) => station,
        Err(e) => {
            eprintln!("Error running scenario: {}", e);
            process::exit(1);
        }
    };

    let written = if args.json {
        write_json(&station, std::io::stdout())
    } else {
        write_summary(&station, std::io::stdout()).map_err(|e| e.to_string())
    };
    if let Err(e) = written {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn default_config() -> StationConfig {
    StationConfig {
        pumps: vec![Default::default()],
        ..StationConfig::default()
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] StationError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Raw CSV record matching the script format.
///
/// Fields: `at, command, target, arg`
#[derive(Debug, Deserialize)]
struct ScriptRecord {
    at: f64,
    command: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arg: Option<String>,
}

/// Most `step` ticks run to reach one command's timestamp.
const MAX_CATCH_UP_STEPS: u32 = 100_000;

struct Runner {
    step: Duration,
    seed: u64,
}

impl Runner {
    /// Replays a scenario script against a fresh station.
    ///
    /// Commands run in file order. Before each command the station is ticked
    /// in `step` increments up to the command's `at` time; timestamps that go
    /// backwards run immediately. Malformed rows and rejected commands are
    /// logged and skipped.
    ///
    /// # Example
    ///
    /// ```csv
    /// at,command,target,arg
    /// 0,enter,1,Ada
    /// 0,enqueue,1,Soda:2.50x1;Chips:3.00x2
    /// 1,scan,,
    /// 2,scan,,
    /// 3,pay,,9.00
    /// 3,accept,,
    /// 4,change,,
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the CSV cannot be read.
    fn run<R: Read>(&self, config: &StationConfig, reader: R) -> Result<Station, RunError> {
        let station = Station::new(config)?;
        let mut names: HashMap<CustomerId, String> = HashMap::new();
        let mut payer = RandomTender::seeded(self.seed);
        let mut now = Duration::ZERO;

        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        for result in rdr.deserialize::<ScriptRecord>() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "skipping malformed row");
                    continue;
                }
            };

            let at = if record.at.is_finite() {
                duration_from_secs(record.at)
            } else {
                Duration::ZERO
            };
            // Long gaps are covered by a single tick instead of millions of steps.
            let longest_catch_up = self
                .step
                .checked_mul(MAX_CATCH_UP_STEPS)
                .unwrap_or(Duration::MAX);
            while now < at {
                let gap = at - now;
                let delta = if gap > longest_catch_up {
                    gap
                } else {
                    self.step.min(gap)
                };
                station.tick(delta);
                now += delta;
            }

            if let Err(e) = apply(&station, &record, &mut names, &mut payer) {
                warn!(at = record.at, command = %record.command, error = %e, "command rejected");
            }
        }

        Ok(station)
    }
}

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("unknown command")]
    Unknown,
    #[error("missing or malformed {0}")]
    BadField(&'static str),
    #[error(transparent)]
    Station(#[from] StationError),
}

fn apply(
    station: &Station,
    record: &ScriptRecord,
    names: &mut HashMap<CustomerId, String>,
    payer: &mut RandomTender,
) -> Result<(), CommandError> {
    let target = record.target.as_deref().unwrap_or("");
    let arg = record.arg.as_deref().unwrap_or("");
    let register = station.register();

    match record.command.to_lowercase().as_str() {
        "open" => {
            station.gate().open();
        }
        "close" => {
            station.gate().close();
        }
        "enter" => {
            let id = customer_id(target)?;
            if !arg.is_empty() {
                names.insert(id, arg.to_owned());
            }
            if !station.admit(customer(id, names)) {
                debug!(customer = %id, "turned away at the door");
            }
        }
        "leave" => {
            station.gate().register_left(customer_id(target)?);
        }
        "enqueue" => {
            let id = customer_id(target)?;
            let outcome = station.queue().enqueue(customer(id, names), parse_cart(arg)?)?;
            debug!(customer = %id, ?outcome, "enqueue");
        }
        "abandon" => {
            let outcome = station.queue().abandon(customer_id(target)?)?;
            debug!(?outcome, "abandon");
        }
        "serve_next" => {
            station.queue().serve_next();
        }
        "scan" => {
            register.scan_next_item()?;
        }
        "pay" if arg.eq_ignore_ascii_case("auto") => {
            register.request_payment_with(payer)?;
        }
        "pay" => register.request_payment(amount(arg)?)?,
        "tender" => register.present_tender(amount(arg)?)?,
        "accept" => {
            register.accept_payment()?;
        }
        "change" => {
            register.give_change()?;
        }
        "cancel" => {
            register.cancel_transaction()?;
        }
        "acquire" => {
            let pump = station.pump(pump_id(target)?)?;
            let (who, limit) = match arg.split_once(':') {
                Some((who, limit)) => (who, Some(amount(limit)?)),
                None => (arg, None),
            };
            let occupant = if who.eq_ignore_ascii_case("player") || who.is_empty() {
                Occupant::Player
            } else {
                Occupant::Customer(customer(customer_id(who)?, names))
            };
            match limit {
                Some(gallons) => pump.acquire_with_limit(occupant, gallons)?,
                None => pump.acquire(occupant)?,
            }
        }
        "release" => {
            station.pump(pump_id(target)?)?.release();
        }
        "refill" => {
            station.pump(pump_id(target)?)?.refill(amount(arg)?)?;
        }
        _ => return Err(CommandError::Unknown),
    }
    Ok(())
}

fn customer(id: CustomerId, names: &HashMap<CustomerId, String>) -> CustomerRef {
    let name = names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("customer-{id}"));
    CustomerRef::new(id, name)
}

fn customer_id(field: &str) -> Result<CustomerId, CommandError> {
    field
        .parse()
        .map(CustomerId)
        .map_err(|_| CommandError::BadField("customer id"))
}

fn pump_id(field: &str) -> Result<PumpId, CommandError> {
    field
        .parse()
        .map(PumpId)
        .map_err(|_| CommandError::BadField("pump id"))
}

fn amount(field: &str) -> Result<Decimal, CommandError> {
    Decimal::from_str(field).map_err(|_| CommandError::BadField("amount"))
}

/// Parses `Name:price x qty` lines separated by `;`, e.g.
/// `Soda:2.50x1;Chips:3.00x2`. A missing quantity means one.
fn parse_cart(field: &str) -> Result<Cart, CommandError> {
    let mut cart = Cart::new();
    for line in field.split(';').map(str::trim).filter(|l| !l.is_empty()) {
        let (name, rest) = line.split_once(':').ok_or(CommandError::BadField("cart"))?;
        let (price, quantity) = match rest.split_once(['x', 'X']) {
            Some((price, quantity)) => (
                price,
                quantity
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| CommandError::BadField("cart quantity"))?,
            ),
            None => (rest, 1),
        };
        cart.add(name.trim(), amount(price.trim())?, quantity)?;
    }
    Ok(cart)
}

/// One `component,id,metric,value` row of the summary.
#[derive(Debug, Serialize)]
struct SummaryRow {
    component: &'static str,
    id: String,
    metric: &'static str,
    value: String,
}

impl SummaryRow {
    fn new(component: &'static str, id: impl ToString, metric: &'static str, value: impl ToString) -> Self {
        Self {
            component,
            id: id.to_string(),
            metric,
            value: value.to_string(),
        }
    }
}

/// Write the final station state to a CSV writer.
///
/// # CSV Format
///
/// Columns: `component, id, metric, value`
///
/// ```csv
/// component,id,metric,value
/// shop,,open,true
/// register,1,cash,8.50
/// pump,1,fuel,40.0000
/// ```
fn write_summary<W: Write>(station: &Station, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let snapshot = station.snapshot();
    let takings = station.takings();
    let register = station.register();

    wtr.serialize(SummaryRow::new("shop", "", "open", snapshot.shop.is_open))?;
    wtr.serialize(SummaryRow::new(
        "shop",
        "",
        "inside",
        snapshot.shop.customers_inside.len(),
    ))?;
    wtr.serialize(SummaryRow::new("queue", "", "waiting", station.queue().len()))?;
    wtr.serialize(SummaryRow::new("register", register.id(), "state", register.state()))?;
    wtr.serialize(SummaryRow::new("register", register.id(), "cash", snapshot.register_cash))?;
    for pump in &snapshot.pumps {
        wtr.serialize(SummaryRow::new("pump", pump.id, "fuel", pump.fuel))?;
    }
    wtr.serialize(SummaryRow::new("takings", "", "sales", takings.sales_count))?;
    wtr.serialize(SummaryRow::new("takings", "", "sales_revenue", takings.sales_revenue))?;
    wtr.serialize(SummaryRow::new("takings", "", "fuel_gallons", takings.fuel_gallons))?;
    wtr.serialize(SummaryRow::new("takings", "", "fuel_revenue", takings.fuel_revenue))?;

    wtr.flush()?;
    Ok(())
}

fn write_json<W: Write>(station: &Station, mut writer: W) -> Result<(), String> {
    let output = serde_json::json!({
        "snapshot": station.snapshot(),
        "takings": station.takings(),
    });
    serde_json::to_writer_pretty(&mut writer, &output).map_err(|e| e.to_string())?;
    writeln!(writer).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_rs::RegisterState;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn run(script: &str) -> Station {
        let runner = Runner {
            step: Duration::from_millis(100),
            seed: 0,
        };
        runner.run(&default_config(), Cursor::new(script)).unwrap()
    }

    #[test]
    fn full_checkout() {
        let station = run("at,command,target,arg\n\
                           0,enter,1,Ada\n\
                           0,enqueue,1,Soda:2.50x1;Chips:3.00x2\n\
                           1,scan,,\n\
                           1,scan,,\n\
                           2,pay,,9.00\n\
                           2,accept,,\n\
                           3,change,,\n");

        assert_eq!(station.register().cash_balance(), dec!(8.50));
        assert_eq!(station.register().state(), RegisterState::Idle);
        assert_eq!(station.takings().sales_count, 1);
    }

    #[test]
    fn pumping_between_timestamps() {
        let station = run("at,command,target,arg\n\
                           0,acquire,1,player\n\
                           2,release,1,\n");

        let takings = station.takings();
        assert_eq!(takings.fuel_gallons, dec!(10));
        assert_eq!(takings.fuel_revenue, dec!(35.00));
        assert_eq!(station.pump(PumpId(1)).unwrap().fuel(), dec!(40));
    }

    #[test]
    fn close_evicts_after_wind_down() {
        let station = run("at,command,target,arg\n\
                           0,enter,1,Ada\n\
                           0,enter,2,Bo\n\
                           1,close,,\n\
                           62,open,,\n");

        assert!(station.gate().customers_inside().is_empty());
        assert!(station.gate().is_accepting());
    }

    #[test]
    fn far_timestamp_is_reached_in_one_tick() {
        let station = run("at,command,target,arg\n\
                           0,acquire,1,player\n\
                           1e12,open,,\n");

        let pump = station.pump(PumpId(1)).unwrap();
        assert_eq!(pump.fuel(), Decimal::ZERO);
        assert!(pump.is_free());
        assert_eq!(station.takings().fuel_gallons, dec!(50));
    }

    #[test]
    fn skips_bad_rows_and_rejected_commands() {
        let station = run("at,command,target,arg\n\
                           0,dance,,\n\
                           0,scan,,\n\
                           oops,enter,1,\n\
                           0,enter,x,\n\
                           0,enter,2,Bo\n");

        assert_eq!(station.gate().customers_inside().len(), 1);
    }

    #[test]
    fn parse_cart_lines() {
        let cart = parse_cart("Soda:2.50x1; Chips:3.00 x 2;Gum:0.99").unwrap();
        assert_eq!(cart.lines().len(), 3);
        assert_eq!(cart.estimated_total(), dec!(9.49));

        assert!(parse_cart("Soda").is_err());
        assert!(parse_cart("Soda:free").is_err());
        assert!(parse_cart("Soda:1.00x0").is_err());
    }

    #[test]
    fn summary_has_header_and_pump_rows() {
        let station = run("at,command,target,arg\n");
        let mut output = Vec::new();
        write_summary(&station, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("component,id,metric,value"));
        assert!(output.contains("pump,1,fuel,50"));
        assert!(output.contains("shop,,open,true"));
    }

    #[test]
    fn json_output_parses() {
        let station = run("at,command,target,arg\n");
        let mut output = Vec::new();
        write_json(&station, &mut output).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed["snapshot"]["shop"]["is_open"], true);
        assert_eq!(parsed["snapshot"]["pumps"][0]["fuel"], "50");
    }
}
