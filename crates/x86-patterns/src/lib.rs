// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! x86 pattern library for the bundle sandbox validator
//!
//! Recognizes the safe instruction idioms of the 32-bit (segment based) and
//! 64-bit (`%r15` based) sandboxes in AT&T disassembly text, and plugs into
//! [`sfi_validator::Validator`] through [`PatternMatcher`].
//!
//! ```no_run
//! use x86_patterns::{Mode, validate_file};
//!
//! let result = validate_file(Mode::X86_64, "module.lst")?;
//! for diagnostic in result.diagnostics() {
//!     println!("{diagnostic}");
//! }
//! # Ok::<(), x86_patterns::ValidateError>(())
//! ```

mod condition;
mod opcodes;
mod patterns;
mod registers;
mod syntax;

use std::path::Path;

use sfi_validator::{ContractViolation, ListingError, ValidationResult, Validator, read_listing};
use thiserror::Error;

pub use condition::RegisterCondition;
pub use opcodes::{ClassifiedOpcode, OpcodeClass};
pub use patterns::{Mode, X86Patterns};
pub use registers::{Gpr, Register, SegmentRegister, Width};
pub use sfi_validator::PatternMatcher;

/// Errors that stop validation of a listing before a verdict is reached
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
}

/// Validator for one sandbox flavour
pub fn validator(mode: Mode) -> Validator<X86Patterns> {
    Validator::new(mode.config(), X86Patterns::new(mode))
}

/// Read an objdump listing and validate it
pub fn validate_file(
    mode: Mode,
    path: impl AsRef<Path>,
) -> Result<ValidationResult, ValidateError> {
    let instructions = read_listing(path)?;
    Ok(validator(mode).validate(&instructions)?)
}
