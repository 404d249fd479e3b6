// Copyright 2026 the Decimal Machine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `decimal_machine`: a bounded decimal stack machine for embedded rule
//! programs.
//!
//! The machine executes a compact textual program format ("DSMAL"):
//! three semicolon-separated sections listing variable names, constant
//! literals, and a concatenation of two-letter instructions. Programs are
//! flowcharts compiled by a front end elsewhere; the machine only loads and
//! runs them. All arithmetic is decimal (34 significant digits, decimal128
//! exponent range), all resources are fixed per machine (32 operand stack
//! slots, 256 arena cells, a per-run instruction budget), and the only
//! failure modes are arithmetic faults and resource exhaustion.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use decimal_machine::program::Program;
//! use decimal_machine::vm::Machine;
//!
//! // Compute the area of a circle from its radius.
//! let program = Arc::new(Program::parse("radius|area;3.14;Lv0CpMlLc0MlSt1Xx")?);
//! let mut machine = Machine::with_baseline(Arc::clone(&program), [("radius", "2")])?;
//! let executed = machine.run()?;
//! assert_eq!(executed, 7);
//! assert_eq!(machine.get("area")?, "12.56");
//!
//! // Machines are reusable: reset to the baseline and run again.
//! machine.reset_with([("radius", "3")])?;
//! machine.run()?;
//! assert_eq!(machine.get("area")?, "28.26");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![no_std]

extern crate alloc;

pub(crate) mod arena;
pub mod decimal;
pub mod opcode;
pub mod program;
pub(crate) mod value;
pub mod vm;
