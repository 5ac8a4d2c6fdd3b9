// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bundle sandboxing validator for decoded instruction streams
//!
//! Proves that a contiguous stream of instructions obeys the structural rules
//! of a software fault-isolation sandbox in the style of Native Client: code is
//! split into fixed-size, aligned bundles, and control may only enter at bundle
//! boundaries or at the start of a recognized instruction.
//!
//! # Validation Checklist
//!
//! | Check | Description |
//! |-------|-------------|
//! | **Recognized instructions** | Every instruction must be classified as safe by the pattern library |
//! | **Superinstructions** | Multi-instruction idioms (e.g. mask + indirect jump) are matched greedily, longest first |
//! | **Bundle boundaries** | No instruction or superinstruction may straddle a bundle boundary |
//! | **Conditions** (64-bit) | Obligations carried between instructions must be met, and must not be pending at a bundle end |
//! | **Direct jump targets** | Destinations must be bundle-aligned or the start of a matched unit |
//!
//! # Collaborators
//!
//! Decoding bytes into [`Instruction`] records and recognizing safe idioms are
//! the job of external components. The engine only talks to the latter
//! through [`PatternMatcher`], whose answers carry [`Condition`] values.
//!
//! # Results
//!
//! Security violations never stop the pass: they are accumulated as
//! [`Diagnostic`]s in a [`ValidationResult`]. Broken input or collaborator
//! contracts (non-contiguous stream, conditions in a configuration that does
//! not propagate them) are reported as a [`ContractViolation`] instead.

mod condition;
mod config;
mod error;
mod instruction;
pub mod listing;
mod matcher;
mod validate;

pub use condition::Condition;
pub use config::{ConditionPolicy, DEFAULT_BUNDLE_SIZE, ValidatorConfig};
pub use error::{ContractViolation, Diagnostic, UnitKind, ValidationResult, Violation};
pub use instruction::Instruction;
pub use listing::{ListingError, parse_listing, read_listing};
pub use matcher::{Match, PatternMatcher, SingleMatch, UnitConditions};
pub use validate::Validator;
