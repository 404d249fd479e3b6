// Copyright 2026 the Decimal Machine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Program container and DSMAL text parsing.
//!
//! A program string has the form `VARS;CONSTS;CODE`: a pipe-separated list
//! of variable names, a pipe-separated list of constant literals, and a
//! concatenation of instructions. Parsing validates everything that does not
//! depend on runtime state; jump targets are deliberately left unchecked
//! until execution. Serialization is the retained source string itself.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::decimal::Dec128;
use crate::opcode::Opcode;
use crate::value::Num;

/// Maximum number of variables a program may declare.
pub const MAX_VARIABLES: usize = u16::MAX as usize;
/// Maximum number of constants a program may declare.
pub const MAX_CONSTANTS: usize = u16::MAX as usize;
/// Maximum number of instructions a program may contain.
pub const MAX_INSTRUCTIONS: usize = u16::MAX as usize;

/// A decoded instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instr {
    /// The opcode.
    pub op: Opcode,
    /// The parameter; zero for opcodes without one.
    pub param: u16,
}

/// A program construction error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramError {
    /// The source did not split into exactly three sections.
    MissingSections,
    /// A variable name was empty.
    EmptyVariableName,
    /// A variable name appeared twice.
    DuplicateVariableName(String),
    /// More than [`MAX_VARIABLES`] variables.
    TooManyVariables,
    /// A constant literal did not parse as a finite decimal.
    InvalidConstant(String),
    /// More than [`MAX_CONSTANTS`] constants.
    TooManyConstants,
    /// The code section was empty.
    EmptyCode,
    /// An instruction did not start with a known letter pair.
    InvalidInstruction(String),
    /// An instruction parameter exceeded 65 535.
    ParameterTooLarge,
    /// More than [`MAX_INSTRUCTIONS`] instructions.
    TooManyInstructions,
    /// A load referenced a constant slot past the constants section.
    ConstantSlotOutOfRange(u16),
    /// A load or store referenced a variable slot past the variables section.
    VariableSlotOutOfRange(u16),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSections => {
                write!(
                    f,
                    "program must have variables, constants, and instructions sections"
                )
            }
            Self::EmptyVariableName => write!(f, "invalid variable name \"\""),
            Self::DuplicateVariableName(name) => {
                write!(f, "duplicate variable name \"{name}\"")
            }
            Self::TooManyVariables => write!(f, "too many variables"),
            Self::InvalidConstant(lit) => write!(f, "invalid constant value \"{lit}\""),
            Self::TooManyConstants => write!(f, "too many constants"),
            Self::EmptyCode => write!(f, "program must contain at least one instruction"),
            Self::InvalidInstruction(name) => write!(f, "invalid instruction \"{name}\""),
            Self::ParameterTooLarge => write!(f, "instruction parameter is too large"),
            Self::TooManyInstructions => write!(f, "too many instructions"),
            Self::ConstantSlotOutOfRange(slot) => {
                write!(f, "reference to nonexistent constant slot {slot}")
            }
            Self::VariableSlotOutOfRange(slot) => {
                write!(f, "reference to nonexistent variable slot {slot}")
            }
        }
    }
}

impl core::error::Error for ProgramError {}

/// An immutable, shareable compiled program.
///
/// Construction parses the whole source; afterwards nothing is mutated, so a
/// `Program` can be shared across threads and machines freely.
#[derive(Clone, Debug)]
pub struct Program {
    source: String,
    variables: Vec<String>,
    slots: HashMap<String, u16>,
    pub(crate) constants: Vec<Num>,
    pub(crate) instructions: Vec<Instr>,
}

impl Program {
    /// Parses a DSMAL source string.
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        let mut sections = source.split(';');
        let (vars, consts, code) = match (
            sections.next(),
            sections.next(),
            sections.next(),
            sections.next(),
        ) {
            (Some(v), Some(c), Some(i), None) => (v, c, i),
            _ => return Err(ProgramError::MissingSections),
        };

        let (variables, slots) = parse_variables(vars)?;
        let constants = parse_constants(consts)?;
        let instructions = parse_instructions(code, constants.len(), variables.len())?;

        Ok(Self {
            source: source.to_string(),
            variables,
            slots,
            constants,
            instructions,
        })
    }

    /// The original DSMAL source; parsing it again yields an equivalent
    /// program.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of declared variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Declared variable names, in slot order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Number of declared constants.
    #[must_use]
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Number of instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// The decoded instruction stream.
    #[must_use]
    pub fn instructions(&self) -> &[Instr] {
        &self.instructions
    }

    pub(crate) fn slot(&self, name: &str) -> Option<u16> {
        self.slots.get(name).copied()
    }
}

fn parse_variables(section: &str) -> Result<(Vec<String>, HashMap<String, u16>), ProgramError> {
    let mut variables = Vec::new();
    let mut slots = HashMap::new();
    if section.is_empty() {
        return Ok((variables, slots));
    }
    for name in section.split('|') {
        if name.is_empty() {
            return Err(ProgramError::EmptyVariableName);
        }
        if variables.len() == MAX_VARIABLES {
            return Err(ProgramError::TooManyVariables);
        }
        let slot = variables.len() as u16;
        if slots.insert(name.to_string(), slot).is_some() {
            return Err(ProgramError::DuplicateVariableName(name.to_string()));
        }
        variables.push(name.to_string());
    }
    Ok((variables, slots))
}

fn parse_constants(section: &str) -> Result<Vec<Num>, ProgramError> {
    let mut constants = Vec::new();
    if section.is_empty() {
        return Ok(constants);
    }
    for lit in section.split('|') {
        if constants.len() == MAX_CONSTANTS {
            return Err(ProgramError::TooManyConstants);
        }
        if lit.is_empty() {
            return Err(ProgramError::InvalidConstant(String::new()));
        }
        let dec = Dec128::parse(lit)
            .map_err(|_| ProgramError::InvalidConstant(lit.to_string()))?;
        constants.push(Num::from_dec(dec));
    }
    Ok(constants)
}

fn parse_instructions(
    section: &str,
    constant_count: usize,
    variable_count: usize,
) -> Result<Vec<Instr>, ProgramError> {
    if section.is_empty() {
        return Err(ProgramError::EmptyCode);
    }
    let mut instructions = Vec::new();
    let mut chars = section.chars().peekable();
    while let Some(upper) = chars.next() {
        if !upper.is_ascii_uppercase() {
            return Err(ProgramError::InvalidInstruction(upper.to_string()));
        }
        let lower = match chars.peek() {
            Some(&c) if c.is_ascii_lowercase() => {
                chars.next();
                c
            }
            // The mnemonic is reported truncated when its second letter is
            // not a lowercase letter.
            _ => return Err(ProgramError::InvalidInstruction(upper.to_string())),
        };
        let op = match Opcode::from_letters(upper, lower) {
            Some(op) => op,
            None => {
                let mut name = String::new();
                name.push(upper);
                name.push(lower);
                return Err(ProgramError::InvalidInstruction(name));
            }
        };

        let mut param: u32 = 0;
        if op.has_param() {
            while let Some(&c) = chars.peek() {
                let Some(digit) = c.to_digit(10) else { break };
                chars.next();
                param = param * 10 + digit;
                if param > u32::from(u16::MAX) {
                    return Err(ProgramError::ParameterTooLarge);
                }
            }
            // Constant and variable references are checkable now; jump
            // targets are validated when executed.
            match op {
                Opcode::LoadConstant if param as usize >= constant_count => {
                    return Err(ProgramError::ConstantSlotOutOfRange(param as u16));
                }
                Opcode::LoadVariable | Opcode::SetVariable
                    if param as usize >= variable_count =>
                {
                    return Err(ProgramError::VariableSlotOutOfRange(param as u16));
                }
                _ => {}
            }
        }

        if instructions.len() == MAX_INSTRUCTIONS {
            return Err(ProgramError::TooManyInstructions);
        }
        instructions.push(Instr {
            op,
            param: param as u16,
        });
    }
    Ok(instructions)
}
