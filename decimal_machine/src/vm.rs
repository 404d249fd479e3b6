// Copyright 2026 the Decimal Machine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The machine: execution state, the dispatch loop, and host access.
//!
//! A [`Machine`] binds one shared [`Program`] to a 32-slot operand stack, a
//! 256-cell arena, and two parallel variable banks (current and baseline).
//! Machines are built once and rerun many times; [`Machine::reset`] restores
//! the baseline between runs. Execution is strictly sequential and bounded:
//! the stack, the arena, and the instruction budget are all fixed, and every
//! failure is surfaced as an [`ExecutionError`] carrying the faulting
//! instruction index and opcode.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use crate::arena::Arena;
pub use crate::arena::ARENA_SIZE;
use crate::decimal::{Dec128, DecError};
use crate::opcode::Opcode;
use crate::program::{Instr, Program};
use crate::value::{interned, Num, Slot, MAX_INTERNED_DIGIT};

/// Operand stack depth.
pub const STACK_SIZE: usize = 32;
/// Default per-run instruction budget.
pub const DEFAULT_INSTRUCTION_LIMIT: u64 = 10_000;

/// A runtime fault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The program counter left the instruction table.
    OutOfBounds,
    /// An instruction required more operands than the stack held.
    StackUnderflow {
        /// Operands the instruction requires.
        required: usize,
        /// Operands the stack held.
        available: usize,
    },
    /// A push exceeded the stack depth.
    StackOverflow,
    /// The arena had no free cell even after a collection.
    OutOfSpace,
    /// Division by zero.
    DivisionByZero,
    /// An operation undefined for its operands (e.g. `0 ^ -1`).
    IllegalOperation,
    /// A result exceeded the decimal range.
    Overflow,
    /// A result was inexact below the decimal range.
    Underflow,
    /// A constant reference past the constants table.
    ConstantOutOfRange(u16),
    /// A variable reference past the variable banks.
    VariableOutOfRange(u16),
    /// The random source ran out of values.
    RandomExhausted,
    /// The random source produced an unparsable value.
    InvalidRandomValue(String),
    /// The per-run instruction budget was spent.
    InstructionLimitExceeded {
        /// Instructions executed before the budget ran out.
        executed: u64,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "execution location out of bounds"),
            Self::StackUnderflow { .. } => write!(f, "stack underflow"),
            Self::StackOverflow => write!(f, "ran out of stack"),
            Self::OutOfSpace => write!(f, "ran out of space"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::IllegalOperation => write!(f, "illegal operation"),
            Self::Overflow => write!(f, "result was too large"),
            Self::Underflow => write!(f, "result was too small"),
            Self::ConstantOutOfRange(slot) => {
                write!(f, "reference to nonexistent constant slot {slot}")
            }
            Self::VariableOutOfRange(slot) => {
                write!(f, "reference to nonexistent variable slot {slot}")
            }
            Self::RandomExhausted => write!(f, "random source ran out of values"),
            Self::InvalidRandomValue(v) => write!(f, "invalid random number value \"{v}\""),
            Self::InstructionLimitExceeded { executed } => {
                write!(f, "instruction limit exceeded after {executed} instructions")
            }
        }
    }
}

impl core::error::Error for Fault {}

/// A failed run: the fault plus where it happened.
///
/// `opcode` is `None` only when no instruction was decodable at the fault
/// site (the program counter was out of bounds).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionError {
    /// Instruction index at the fault.
    pub instruction: usize,
    /// Opcode at the fault, if one was decodable.
    pub opcode: Option<Opcode>,
    /// What went wrong.
    pub fault: Fault,
}

impl ExecutionError {
    fn mnemonic(&self) -> &'static str {
        self.opcode.map_or("??", Opcode::mnemonic)
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fault {
            Fault::OutOfBounds => {
                write!(
                    f,
                    "current execution location {} is out-of-bounds",
                    self.instruction
                )
            }
            Fault::StackUnderflow {
                required,
                available,
            } => {
                write!(
                    f,
                    "instruction \"{}\" requires {required} operand(s), but the stack only has {available}",
                    self.mnemonic()
                )
            }
            Fault::StackOverflow => write!(f, "ran out of stack"),
            Fault::OutOfSpace => write!(f, "ran out of space"),
            Fault::DivisionByZero | Fault::IllegalOperation => {
                write!(f, "illegal {} at instruction {}", self.mnemonic(), self.instruction)
            }
            Fault::Overflow => {
                write!(
                    f,
                    "result of {} at instruction {} was too large",
                    self.mnemonic(),
                    self.instruction
                )
            }
            Fault::Underflow => {
                write!(
                    f,
                    "result of {} at instruction {} was too small",
                    self.mnemonic(),
                    self.instruction
                )
            }
            Fault::ConstantOutOfRange(slot) => {
                write!(
                    f,
                    "execution halted on reference to nonexistent constant slot {slot} at instruction {}",
                    self.instruction
                )
            }
            Fault::VariableOutOfRange(slot) => {
                write!(
                    f,
                    "execution halted on reference to nonexistent variable slot {slot} at instruction {}",
                    self.instruction
                )
            }
            Fault::RandomExhausted => write!(f, "random source ran out of values"),
            Fault::InvalidRandomValue(v) => {
                write!(f, "invalid random number value \"{v}\"")
            }
            Fault::InstructionLimitExceeded { executed } => {
                write!(f, "execution forcibly terminated after {executed} instructions")
            }
        }
    }
}

impl core::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.fault)
    }
}

/// A host variable-access error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariableError {
    /// The program declares no variable with this name.
    Unknown(String),
    /// The value did not parse as a finite decimal.
    Invalid(String),
    /// The arena had no room for the value.
    OutOfSpace,
}

impl fmt::Display for VariableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "unknown variable \"{name}\""),
            Self::Invalid(value) => write!(f, "invalid variable value \"{value}\""),
            Self::OutOfSpace => write!(f, "ran out of space"),
        }
    }
}

impl core::error::Error for VariableError {}

/// A value a host hands to the machine.
///
/// Booleans become 1/0; strings must parse as finite decimals.
#[derive(Clone, Debug, PartialEq)]
pub enum VarValue {
    /// A boolean, stored as one or zero.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A decimal value.
    Decimal(Dec128),
    /// A decimal-parsable string.
    Text(String),
}

impl From<bool> for VarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for VarValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for VarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Dec128> for VarValue {
    fn from(v: Dec128) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for VarValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A source of values for the `Lr` instruction.
///
/// The machine pulls one value per `Lr` in strict execution order. Returning
/// `None` fails the instruction with [`Fault::RandomExhausted`]. When no
/// source is configured at all, `Lr` pushes zero.
pub trait RandomSource {
    /// Produces the next value, or `None` when exhausted.
    fn next_value(&mut self) -> Option<VarValue>;
}

impl<F> RandomSource for F
where
    F: FnMut() -> Option<VarValue>,
{
    fn next_value(&mut self) -> Option<VarValue> {
        self()
    }
}

enum Flow {
    Advance,
    Jump(u16),
    Exit,
}

enum IntakeError {
    Invalid(String),
    OutOfSpace,
}

/// A mutable execution instance bound to one [`Program`].
pub struct Machine {
    program: Arc<Program>,
    /// Current slots in `[0, N)`, baseline slots in `[N, 2N)`.
    variables: Vec<Slot>,
    stack: [Slot; STACK_SIZE],
    stack_used: usize,
    arena: Arena,
    instruction_limit: u64,
    random_source: Option<Box<dyn RandomSource>>,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("variables", &self.program.variable_count())
            .field("instruction_limit", &self.instruction_limit)
            .finish_non_exhaustive()
    }
}

impl Machine {
    /// Creates a machine with every variable (current and baseline) zero.
    #[must_use]
    pub fn new(program: Arc<Program>) -> Self {
        let n = program.variable_count();
        Self {
            program,
            variables: alloc::vec![Slot::Digit(0); n * 2],
            stack: [Slot::Digit(0); STACK_SIZE],
            stack_used: 0,
            arena: Arena::new(),
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
            random_source: None,
        }
    }

    /// Creates a machine and seals the given assignments as its baseline.
    pub fn with_baseline<K, V, I>(program: Arc<Program>, baseline: I) -> Result<Self, VariableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<VarValue>,
    {
        let mut machine = Self::new(program);
        for (name, value) in baseline {
            machine.set(name.as_ref(), value)?;
        }
        let n = machine.program.variable_count();
        let (current, base) = machine.variables.split_at_mut(n);
        base.copy_from_slice(current);
        Ok(machine)
    }

    /// The program this machine executes.
    #[must_use]
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Number of variables (equals the program's).
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.program.variable_count()
    }

    /// The per-run instruction budget.
    #[must_use]
    pub fn instruction_limit(&self) -> u64 {
        self.instruction_limit
    }

    /// Sets the per-run instruction budget. Zero makes the very first
    /// instruction exceed the limit.
    pub fn set_instruction_limit(&mut self, limit: u64) {
        self.instruction_limit = limit;
    }

    /// Installs the random source consulted by `Lr`.
    pub fn set_random_source(&mut self, source: impl RandomSource + 'static) {
        self.random_source = Some(Box::new(source));
    }

    /// Removes the random source; `Lr` pushes zero afterwards.
    pub fn clear_random_source(&mut self) {
        self.random_source = None;
    }

    /// Reads a variable in canonical string form.
    pub fn get(&self, name: &str) -> Result<String, VariableError> {
        let index = self.slot_index(name)?;
        Ok(self.num(self.variables[index]).dec.to_string())
    }

    /// Assigns a variable's current value (the baseline is untouched).
    pub fn set<V: Into<VarValue>>(&mut self, name: &str, value: V) -> Result<(), VariableError> {
        let index = self.slot_index(name)?;
        let slot = self.intake(value.into()).map_err(|e| match e {
            IntakeError::Invalid(v) => VariableError::Invalid(v),
            IntakeError::OutOfSpace => VariableError::OutOfSpace,
        })?;
        self.variables[index] = slot;
        Ok(())
    }

    /// Restores every current variable to its baseline value.
    pub fn reset(&mut self) -> &mut Self {
        let n = self.program.variable_count();
        let (current, base) = self.variables.split_at_mut(n);
        current.copy_from_slice(base);
        self
    }

    /// Restores the baseline, then applies `overrides` to current values.
    pub fn reset_with<K, V, I>(&mut self, overrides: I) -> Result<&mut Self, VariableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<VarValue>,
    {
        self.reset();
        for (name, value) in overrides {
            self.set(name.as_ref(), value)?;
        }
        Ok(self)
    }

    /// Runs the program from instruction zero.
    ///
    /// Returns the number of instructions executed. The stack is emptied on
    /// return regardless of outcome; variables keep whatever assignments
    /// completed.
    pub fn run(&mut self) -> Result<u64, ExecutionError> {
        self.run_internal(None)
    }

    /// Runs the program, recording which instructions were dispatched.
    ///
    /// On success the flag vector has one entry per instruction index; on
    /// failure it is discarded.
    pub fn run_with_coverage(&mut self) -> Result<Vec<bool>, ExecutionError> {
        let mut bits = alloc::vec![false; self.program.instruction_count()];
        self.run_internal(Some(&mut bits))?;
        Ok(bits)
    }

    fn run_internal(&mut self, mut coverage: Option<&mut [bool]>) -> Result<u64, ExecutionError> {
        let program = Arc::clone(&self.program);
        let limit = self.instruction_limit;
        let count = program.instruction_count();
        let mut pc: usize = 0;
        let mut executed: u64 = 0;

        let result = loop {
            if pc >= count {
                break Err(ExecutionError {
                    instruction: pc,
                    opcode: None,
                    fault: Fault::OutOfBounds,
                });
            }
            let Instr { op, param } = program.instructions[pc];
            if executed == limit {
                break Err(ExecutionError {
                    instruction: pc,
                    opcode: Some(op),
                    fault: Fault::InstructionLimitExceeded { executed },
                });
            }
            let required = op.operands_required();
            if self.stack_used < required {
                break Err(ExecutionError {
                    instruction: pc,
                    opcode: Some(op),
                    fault: Fault::StackUnderflow {
                        required,
                        available: self.stack_used,
                    },
                });
            }
            executed += 1;
            if let Some(bits) = coverage.as_deref_mut() {
                bits[pc] = true;
            }

            match self.step(&program, op, param) {
                Ok(Flow::Advance) => pc += 1,
                Ok(Flow::Jump(target)) => pc = target as usize,
                Ok(Flow::Exit) => break Ok(executed),
                Err(fault) => {
                    break Err(ExecutionError {
                        instruction: pc,
                        opcode: Some(op),
                        fault,
                    });
                }
            }
        };

        self.stack_used = 0;
        result
    }

    fn step(&mut self, program: &Program, op: Opcode, param: u16) -> Result<Flow, Fault> {
        match op {
            Opcode::Exit => return Ok(Flow::Exit),

            Opcode::JumpUnconditional => return Ok(Flow::Jump(param)),
            Opcode::JumpIfNonzero => {
                let v = self.pop();
                if !self.num(v).is_zero() {
                    return Ok(Flow::Jump(param));
                }
            }
            Opcode::JumpIfZero => {
                let v = self.pop();
                if self.num(v).is_zero() {
                    return Ok(Flow::Jump(param));
                }
            }

            Opcode::LoadConstant => {
                if param as usize >= program.constant_count() {
                    return Err(Fault::ConstantOutOfRange(param));
                }
                self.push(Slot::Constant(param))?;
            }
            Opcode::LoadVariable => {
                if param as usize >= program.variable_count() {
                    return Err(Fault::VariableOutOfRange(param));
                }
                self.push(self.variables[param as usize])?;
            }
            Opcode::LoadRandom => {
                match self.random_source.take() {
                    None => self.push(Slot::Digit(0))?,
                    Some(mut source) => {
                        let value = source.next_value();
                        self.random_source = Some(source);
                        let value = value.ok_or(Fault::RandomExhausted)?;
                        let slot = self.intake(value).map_err(|e| match e {
                            IntakeError::Invalid(v) => Fault::InvalidRandomValue(v),
                            IntakeError::OutOfSpace => Fault::OutOfSpace,
                        })?;
                        self.push(slot)?;
                    }
                }
            }
            Opcode::LoadZero => self.push(Slot::Digit(0))?,
            Opcode::LoadOne => self.push(Slot::Digit(1))?,

            Opcode::SetVariable => {
                if param as usize >= program.variable_count() {
                    return Err(Fault::VariableOutOfRange(param));
                }
                let v = self.pop();
                self.variables[param as usize] = v;
            }

            Opcode::Copy => {
                let top = self.top();
                self.push(top)?;
            }
            Opcode::Pop => {
                let _ = self.pop();
            }

            Opcode::Not => {
                let v = self.pop();
                let bit = i8::from(self.num(v).is_zero());
                self.push(Slot::Digit(bit))?;
            }
            Opcode::Negate => {
                let a = self.pop();
                self.push_negated(a)?;
            }
            Opcode::Absolute => {
                let n = self.num(self.top());
                if n.is_negative() {
                    let a = self.pop();
                    self.push_negated(a)?;
                }
            }
            Opcode::Ceiling | Opcode::Floor | Opcode::Round => {
                let n = self.num(self.top());
                let integral = n.small.is_some() || n.dec.is_integer();
                if !integral {
                    let a = self.pop();
                    let rounded = match op {
                        Opcode::Ceiling => n.dec.ceil(),
                        Opcode::Floor => n.dec.floor(),
                        _ => n.dec.round(),
                    };
                    self.push_num(Num::from_dec(rounded), [Some(a), None])?;
                }
            }

            Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan | Opcode::GreaterThanOrEqual => {
                let b = self.pop();
                let a = self.pop();
                let ord = compare(&self.num(a), &self.num(b));
                let truth = match op {
                    Opcode::Equal => ord == Ordering::Equal,
                    Opcode::NotEqual => ord != Ordering::Equal,
                    Opcode::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                };
                self.push(Slot::Digit(i8::from(truth)))?;
            }

            Opcode::Add => {
                let b = self.pop();
                let bn = self.num(b);
                if bn.is_zero() {
                    return Ok(Flow::Advance);
                }
                let a = self.pop();
                let an = self.num(a);
                if an.is_zero() {
                    self.push(b)?;
                    return Ok(Flow::Advance);
                }
                let r = add_nums(&an, &bn)?;
                self.push_num(r, [Some(a), Some(b)])?;
            }
            Opcode::Subtract => {
                let b = self.pop();
                let bn = self.num(b);
                if bn.is_zero() {
                    return Ok(Flow::Advance);
                }
                let a = self.pop();
                let an = self.num(a);
                if obviously_equal(a, &an, b, &bn) {
                    self.push(Slot::Digit(0))?;
                    return Ok(Flow::Advance);
                }
                if an.is_zero() {
                    self.push_negated(b)?;
                    return Ok(Flow::Advance);
                }
                let r = sub_nums(&an, &bn)?;
                self.push_num(r, [Some(a), Some(b)])?;
            }
            Opcode::Multiply => {
                let b = self.pop();
                let bn = self.num(b);
                if bn.is_zero() {
                    let _ = self.pop();
                    self.push(Slot::Digit(0))?;
                    return Ok(Flow::Advance);
                }
                if bn.is_one() {
                    return Ok(Flow::Advance);
                }
                let a = self.pop();
                let an = self.num(a);
                if an.is_zero() {
                    self.push(Slot::Digit(0))?;
                    return Ok(Flow::Advance);
                }
                if an.is_one() {
                    self.push(b)?;
                    return Ok(Flow::Advance);
                }
                let r = mul_nums(&an, &bn)?;
                self.push_num(r, [Some(a), Some(b)])?;
            }
            Opcode::Divide => {
                let b = self.pop();
                let bn = self.num(b);
                if bn.is_zero() {
                    return Err(Fault::DivisionByZero);
                }
                if bn.is_one() {
                    return Ok(Flow::Advance);
                }
                let a = self.pop();
                let an = self.num(a);
                if an.is_zero() {
                    self.push(Slot::Digit(0))?;
                    return Ok(Flow::Advance);
                }
                // Only obvious equality short-circuits to one; decimals that
                // merely compare equal still go through the division.
                if obviously_equal(a, &an, b, &bn) {
                    self.push(Slot::Digit(1))?;
                    return Ok(Flow::Advance);
                }
                let r = an
                    .dec
                    .div(bn.dec)
                    .map(Num::from_dec)
                    .map_err(fault_from_dec)?;
                self.push_num(r, [Some(a), Some(b)])?;
            }
            Opcode::Power => {
                let b = self.pop();
                let bn = self.num(b);
                if bn.is_one() {
                    return Ok(Flow::Advance);
                }
                if bn.is_two() {
                    let a = self.pop();
                    let an = self.num(a);
                    if an.is_zero() {
                        self.push(Slot::Digit(0))?;
                        return Ok(Flow::Advance);
                    }
                    let r = mul_nums(&an, &an)?;
                    self.push_num(r, [Some(a), None])?;
                    return Ok(Flow::Advance);
                }
                let a = self.pop();
                let an = self.num(a);
                if bn.is_zero() {
                    let bit = i8::from(!an.is_zero());
                    self.push(Slot::Digit(bit))?;
                    return Ok(Flow::Advance);
                }
                if an.is_zero() {
                    if bn.is_negative() {
                        return Err(Fault::IllegalOperation);
                    }
                    self.push(Slot::Digit(0))?;
                    return Ok(Flow::Advance);
                }
                if an.is_one() {
                    self.push(Slot::Digit(1))?;
                    return Ok(Flow::Advance);
                }
                let r = an
                    .dec
                    .pow(bn.dec)
                    .map(Num::from_dec)
                    .map_err(fault_from_dec)?;
                self.push_num(r, [Some(a), Some(b)])?;
            }

            Opcode::Min | Opcode::Max => {
                let b = self.pop();
                let a = self.pop();
                let ord = compare(&self.num(a), &self.num(b));
                // Ties keep the second operand.
                let chosen = if op == Opcode::Min {
                    if ord == Ordering::Less { a } else { b }
                } else if ord == Ordering::Greater {
                    a
                } else {
                    b
                };
                self.push(chosen)?;
            }
        }
        Ok(Flow::Advance)
    }

    fn slot_index(&self, name: &str) -> Result<usize, VariableError> {
        self.program
            .slot(name)
            .map(usize::from)
            .ok_or_else(|| VariableError::Unknown(name.to_string()))
    }

    fn num(&self, slot: Slot) -> Num {
        match slot {
            Slot::Digit(d) => *interned(d),
            Slot::Constant(i) => self.program.constants[i as usize],
            Slot::Arena(i) => self.arena.get(i),
        }
    }

    fn push(&mut self, slot: Slot) -> Result<(), Fault> {
        if self.stack_used == STACK_SIZE {
            return Err(Fault::StackOverflow);
        }
        self.stack[self.stack_used] = slot;
        self.stack_used += 1;
        Ok(())
    }

    fn pop(&mut self) -> Slot {
        debug_assert!(self.stack_used > 0, "operand count was pre-checked");
        self.stack_used -= 1;
        self.stack[self.stack_used]
    }

    fn top(&self) -> Slot {
        self.stack[self.stack_used - 1]
    }

    /// Pushes a result value, interning small integers and allocating an
    /// arena cell otherwise. `roots` keeps popped operands alive if the
    /// allocation has to collect.
    fn push_num(&mut self, num: Num, roots: [Option<Slot>; 2]) -> Result<(), Fault> {
        if let Some(d) = num.as_digit() {
            return self.push(Slot::Digit(d));
        }
        let index = self
            .arena
            .alloc(num, &self.stack[..self.stack_used], &self.variables, roots)
            .map_err(|_| Fault::OutOfSpace)?;
        self.push(Slot::Arena(index))
    }

    fn push_negated(&mut self, operand: Slot) -> Result<(), Fault> {
        let n = self.num(operand);
        if let Some(d) = n.as_digit() {
            return self.push(Slot::Digit(-d));
        }
        let r = match n.small {
            // i32::MIN negates fine through the i64 path.
            Some(i) => Num::from_i64(-i64::from(i)),
            None => Num::from_dec(n.dec.neg()),
        };
        self.push_num(r, [Some(operand), None])
    }

    fn intake(&mut self, value: VarValue) -> Result<Slot, IntakeError> {
        match value {
            VarValue::Bool(b) => Ok(Slot::Digit(i8::from(b))),
            VarValue::Int(i) => {
                if (-i64::from(MAX_INTERNED_DIGIT)..=i64::from(MAX_INTERNED_DIGIT)).contains(&i) {
                    return Ok(Slot::Digit(i as i8));
                }
                self.slot_for_num(Num::from_i64(i))
            }
            VarValue::Decimal(d) => self.slot_for_num(Num::from_dec(d)),
            VarValue::Text(s) => match Dec128::parse(&s) {
                Ok(d) => self.slot_for_num(Num::from_dec(d)),
                Err(_) => Err(IntakeError::Invalid(s)),
            },
        }
    }

    fn slot_for_num(&mut self, num: Num) -> Result<Slot, IntakeError> {
        if let Some(d) = num.as_digit() {
            return Ok(Slot::Digit(d));
        }
        self.arena
            .alloc(num, &self.stack[..self.stack_used], &self.variables, [None, None])
            .map(Slot::Arena)
            .map_err(|_| IntakeError::OutOfSpace)
    }
}

fn compare(a: &Num, b: &Num) -> Ordering {
    match (a.small, b.small) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.dec.cmp(&b.dec),
    }
}

fn obviously_equal(a: Slot, an: &Num, b: Slot, bn: &Num) -> bool {
    a == b || matches!((an.small, bn.small), (Some(x), Some(y)) if x == y)
}

fn fault_from_dec(e: DecError) -> Fault {
    match e {
        DecError::Overflow => Fault::Overflow,
        DecError::Underflow => Fault::Underflow,
        DecError::DivisionByZero => Fault::DivisionByZero,
        DecError::IllegalOperation => Fault::IllegalOperation,
    }
}

fn add_nums(a: &Num, b: &Num) -> Result<Num, Fault> {
    if let (Some(x), Some(y)) = (a.small, b.small) {
        return Ok(Num::from_i64(i64::from(x) + i64::from(y)));
    }
    a.dec.add(b.dec).map(Num::from_dec).map_err(fault_from_dec)
}

fn sub_nums(a: &Num, b: &Num) -> Result<Num, Fault> {
    if let (Some(x), Some(y)) = (a.small, b.small) {
        return Ok(Num::from_i64(i64::from(x) - i64::from(y)));
    }
    a.dec.sub(b.dec).map(Num::from_dec).map_err(fault_from_dec)
}

fn mul_nums(a: &Num, b: &Num) -> Result<Num, Fault> {
    if let (Some(x), Some(y)) = (a.small, b.small) {
        return Ok(Num::from_i64(i64::from(x) * i64::from(y)));
    }
    a.dec.mul(b.dec).map(Num::from_dec).map_err(fault_from_dec)
}
