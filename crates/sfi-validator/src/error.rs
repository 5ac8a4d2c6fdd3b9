// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Diagnostics and error types for validation

use std::{fmt, ops::Range};

use thiserror::Error;

/// Kind of unit a bundle check was applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Instruction,
    Superinstruction,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Instruction => write!(f, "instruction"),
            UnitKind::Superinstruction => write!(f, "superinstruction"),
        }
    }
}

/// Security violations discovered during validation
///
/// Conditions are recorded through their `Display` form so that diagnostics
/// do not depend on the pattern library's condition type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("unrecognized instruction '{text}'")]
    UnrecognizedInstruction { text: String },

    #[error("{unit} crosses bundle boundary")]
    CrossesBundleBoundary { unit: UnitKind },

    #[error("{required} required, but {current} holds")]
    UnmetPrecondition { required: String, current: String },

    #[error("unsafe condition at the end of bundle: {condition}")]
    UnsafeConditionAtBundleEnd { condition: String },

    #[error("unsafe condition at the end of chunk: {condition}")]
    UnsafeConditionAtChunkEnd { condition: String },

    #[error("jump into a middle of instruction ({target:#x})")]
    JumpIntoMiddleOfInstruction { target: u64 },
}

/// A violation located at an offset in the instruction stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub offset: u64,
    pub violation: Violation,
}

impl Diagnostic {
    pub fn new(offset: u64, violation: Violation) -> Self {
        Self { offset, violation }
    }

    /// Human-readable description of the violation
    pub fn message(&self) -> String {
        self.violation.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.offset, self.violation)
    }
}

/// Broken input or collaborator contracts
///
/// These indicate a bug in the caller, the decoder or the pattern library,
/// never a property of the validated code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("instruction {index} starts at {found:#x}, expected {expected:#x}")]
    NonContiguous {
        index: usize,
        expected: u64,
        found: u64,
    },

    #[error("instruction at {offset:#x} has zero length")]
    EmptyInstruction { offset: u64 },

    #[error("instruction at {offset:#x} ends past the address space")]
    AddressOverflow { offset: u64 },

    #[error(
        "unit at {offset:#x} declares conditions ({before} -> {after}) in a configuration without condition propagation"
    )]
    UnexpectedCondition {
        offset: u64,
        before: String,
        after: String,
    },

    #[error("bundle size {0} is not a non-zero power of two")]
    InvalidBundleSize(u64),

    #[error("maximum superinstruction length must be at least 1")]
    InvalidSuperinstructionLength,
}

/// Result of validation containing every diagnostic found
#[derive(Debug, Default)]
pub struct ValidationResult {
    diagnostics: Vec<Diagnostic>,
    units: Vec<Range<u64>>,
}

impl ValidationResult {
    /// Returns true if the stream was accepted
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Returns the diagnostics in discovery order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consumes the result and returns the diagnostics
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Address ranges of the units consumed by the pass, in stream order
    pub fn units(&self) -> &[Range<u64>] {
        &self.units
    }

    pub(crate) fn push(&mut self, offset: u64, violation: Violation) {
        self.diagnostics.push(Diagnostic::new(offset, violation));
    }

    pub(crate) fn record_unit(&mut self, unit: Range<u64>) {
        self.units.push(unit);
    }
}
