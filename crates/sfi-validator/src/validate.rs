// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Validation of instruction streams against the bundle sandbox rules
//!
//! Provides [`Validator`] which performs the checks described in the
//! crate-level documentation in a single forward pass, followed by a jump
//! closure check once every valid target is known.

use std::{
    collections::{BTreeMap, HashSet},
    ops::Range,
};

use tracing::{debug, trace};

use crate::{
    Condition, Instruction, PatternMatcher, ValidatorConfig,
    error::{ContractViolation, UnitKind, ValidationResult, Violation},
    matcher::{Match, SingleMatch},
};

/// Mutable state of one validation pass.
///
/// Lives only for the duration of a single [`Validator::validate`] call.
pub(crate) struct ValidationState<C> {
    /// Condition established by the units processed so far
    pub(crate) condition: C,
    /// Addresses control may legally reach
    pub(crate) valid_targets: HashSet<u64>,
    /// Direct jumps, source address to destination
    pub(crate) jumps: BTreeMap<u64, u64>,
    pub(crate) result: ValidationResult,
}

impl<C: Condition> ValidationState<C> {
    fn new(capacity: usize) -> Self {
        Self {
            condition: C::default(),
            valid_targets: HashSet::with_capacity(capacity + 1),
            jumps: BTreeMap::new(),
            result: ValidationResult::default(),
        }
    }
}

/// Bundle sandbox validator
///
/// Holds only immutable configuration, so one validator can check any number
/// of independent streams, including from several threads at once.
pub struct Validator<M> {
    config: ValidatorConfig,
    matcher: M,
}

impl<M: PatternMatcher> Validator<M> {
    /// Create a validator for the given configuration and pattern library
    pub fn new(config: ValidatorConfig, matcher: M) -> Self {
        Self { config, matcher }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Validate a contiguous instruction stream.
    ///
    /// Every security violation is reported in the returned
    /// [`ValidationResult`]; the whole stream is always consumed. An `Err` is
    /// only returned when the input or the pattern library break their
    /// contracts.
    pub fn validate(
        &self,
        instructions: &[Instruction],
    ) -> Result<ValidationResult, ContractViolation> {
        check_contiguous(instructions)?;

        let Some(last) = instructions.last() else {
            return Ok(ValidationResult::default());
        };
        let end = last.end();

        debug!(
            start = instructions[0].address,
            end,
            count = instructions.len(),
            "validating instruction stream"
        );

        let mut state = ValidationState::new(instructions.len());
        let mut index = 0;

        while index < instructions.len() {
            state.valid_targets.insert(instructions[index].address);

            if let Some(length) = self.match_superinstruction(&mut state, &instructions[index..])? {
                index += length;
                continue;
            }

            self.check_single(&mut state, &instructions[index])?;
            index += 1;
        }

        state.valid_targets.insert(end);
        self.config
            .policy()
            .check_final(&mut state, self.config.bundle_size(), end);

        self.check_jumps(&mut state);

        debug!(
            diagnostics = state.result.diagnostics().len(),
            units = state.result.units().len(),
            "validation finished"
        );
        Ok(state.result)
    }

    /// Greedily match the longest superinstruction starting at `remaining[0]`.
    ///
    /// Returns the number of instructions consumed, or `None` if no window
    /// matched.
    fn match_superinstruction(
        &self,
        state: &mut ValidationState<M::Condition>,
        remaining: &[Instruction],
    ) -> Result<Option<usize>, ContractViolation> {
        let longest = self.config.max_superinstruction_length().min(remaining.len());

        for length in (2..=longest).rev() {
            let window = &remaining[..length];
            let Match::Matched(conditions) = self.matcher.match_superinstruction(window) else {
                continue;
            };

            let unit = window[0].address..window[length - 1].end();
            trace!(start = unit.start, end = unit.end, length, "matched superinstruction");

            self.check_bundle(state, &unit, UnitKind::Superinstruction);
            self.config.policy().check_unit(
                state,
                self.config.bundle_size(),
                unit.clone(),
                &conditions.before,
                conditions.after,
            )?;
            state.result.record_unit(unit);
            return Ok(Some(length));
        }

        Ok(None)
    }

    /// Classify and check one instruction on its own.
    fn check_single(
        &self,
        state: &mut ValidationState<M::Condition>,
        instruction: &Instruction,
    ) -> Result<(), ContractViolation> {
        let unit = instruction.address..instruction.end();

        match self.matcher.match_single(instruction) {
            Match::Matched(SingleMatch {
                jump_target,
                before,
                after,
            }) => {
                trace!(start = unit.start, end = unit.end, ?jump_target, "matched instruction");

                self.check_bundle(state, &unit, UnitKind::Instruction);
                self.config.policy().check_unit(
                    state,
                    self.config.bundle_size(),
                    unit.clone(),
                    &before,
                    after,
                )?;
                if let Some(target) = jump_target {
                    state.jumps.insert(instruction.address, target);
                }
            }
            Match::NotMatched => {
                // Reported once here; the reset keeps one bad instruction from
                // cascading into condition diagnostics downstream.
                debug!(offset = instruction.address, text = %instruction.text, "unrecognized instruction");
                state.result.push(
                    instruction.address,
                    Violation::UnrecognizedInstruction {
                        text: instruction.text.clone(),
                    },
                );
                state.condition = M::Condition::default();
            }
        }

        state.result.record_unit(unit);
        Ok(())
    }

    /// Report a unit whose first and last bytes lie in different bundles.
    fn check_bundle(
        &self,
        state: &mut ValidationState<M::Condition>,
        unit: &Range<u64>,
        kind: UnitKind,
    ) {
        if self.config.bundle_of(unit.start) != self.config.bundle_of(unit.end - 1) {
            state
                .result
                .push(unit.start, Violation::CrossesBundleBoundary { unit: kind });
        }
    }

    /// Check every recorded direct jump now that all valid targets are known.
    fn check_jumps(&self, state: &mut ValidationState<M::Condition>) {
        for (&source, &target) in &state.jumps {
            if self.config.is_bundle_aligned(target) || state.valid_targets.contains(&target) {
                continue;
            }
            state
                .result
                .push(source, Violation::JumpIntoMiddleOfInstruction { target });
        }
    }
}

/// Check that every instruction starts where the previous one ended.
fn check_contiguous(instructions: &[Instruction]) -> Result<(), ContractViolation> {
    let mut expected = None;

    for (index, instruction) in instructions.iter().enumerate() {
        if let Some(expected) = expected {
            if instruction.address != expected {
                return Err(ContractViolation::NonContiguous {
                    index,
                    expected,
                    found: instruction.address,
                });
            }
        }
        if instruction.length == 0 {
            return Err(ContractViolation::EmptyInstruction {
                offset: instruction.address,
            });
        }
        expected = Some(
            instruction
                .address
                .checked_add(instruction.length)
                .ok_or(ContractViolation::AddressOverflow {
                    offset: instruction.address,
                })?,
        );
    }

    Ok(())
}
