// Copyright 2026 the Decimal Machine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small runnable pricing example.
//!
//! Shows:
//! - Compiling a DSMAL program once and reusing one machine across orders
//! - Baseline values and per-run overrides via `reset_with`
//! - Reading results back in canonical decimal form
//!
//! The program implements a discount ladder:
//!   subtotal = quantity * unit_price
//!   discount = 10% when subtotal >= 100, 5% when subtotal >= 50, else 0
//!   total    = subtotal - subtotal * discount

use std::sync::Arc;

use anyhow::{Context, Result};
use decimal_machine::program::Program;
use decimal_machine::vm::Machine;

// Variables: 0 quantity | 1 unit_price | 2 subtotal | 3 discount | 4 total
// Constants: 0 = 100, 1 = 0.10, 2 = 50, 3 = 0.05
const PRICING: &str = concat!(
    "quantity|unit_price|subtotal|discount|total;",
    "100|0.10|50|0.05;",
    "Lv0Lv1MlSt2",      //  0..=3   subtotal = quantity * unit_price
    "Lv2Lc0GeJz11",     //  4..=7   if subtotal >= 100:
    "Lc1St3Ju17",       //  8..=10    discount = 0.10; goto total
    "Lv2Lc2GeJz17",     // 11..=14  elif subtotal >= 50:
    "Lc3St3",           // 15..=16    discount = 0.05
    "Lv2Lv2Lv3MlSbSt4", // 17..=22  total = subtotal - subtotal * discount
    "Xx",               // 23
);

fn main() -> Result<()> {
    let program =
        Arc::new(Program::parse(PRICING).context("pricing program failed to compile")?);
    let mut machine = Machine::with_baseline(Arc::clone(&program), [("unit_price", "19.99")])
        .context("baseline rejected")?;

    println!("pricing program: {} instructions", program.instruction_count());

    for quantity in ["1", "3", "6"] {
        machine
            .reset_with([("quantity", quantity)])
            .context("reset failed")?;
        let executed = machine.run().context("run failed")?;
        println!(
            "qty {:>2}  subtotal {:>8}  discount {:>5}  total {:>8}  ({executed} instructions)",
            quantity,
            machine.get("subtotal")?,
            machine.get("discount")?,
            machine.get("total")?,
        );
    }

    Ok(())
}
