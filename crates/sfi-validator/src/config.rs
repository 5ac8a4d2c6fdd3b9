// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Validator configurations
//!
//! The two sandbox flavours share one engine and differ only in the values
//! held by [`ValidatorConfig`]: bundle size, the longest superinstruction the
//! pattern library may report, and whether conditions propagate between
//! instructions.

use std::ops::Range;

use crate::{
    Condition,
    error::{ContractViolation, Violation},
    validate::ValidationState,
};

/// Bundle size used by both x86 flavours.
pub const DEFAULT_BUNDLE_SIZE: u64 = 32;

/// How conditions declared by the pattern library are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionPolicy {
    /// No cross-instruction obligations exist. A non-clear condition from the
    /// pattern library is a contract violation.
    Forbidden,
    /// Conditions flow from each unit to the next and are reset at bundle
    /// boundaries.
    Propagated,
}

impl ConditionPolicy {
    /// Apply the condition protocol to one matched unit spanning `unit`.
    pub(crate) fn check_unit<C: Condition>(
        self,
        state: &mut ValidationState<C>,
        bundle_size: u64,
        unit: Range<u64>,
        before: &C,
        after: C,
    ) -> Result<(), ContractViolation> {
        match self {
            ConditionPolicy::Forbidden => {
                if !before.is_clear() || !after.is_clear() {
                    return Err(ContractViolation::UnexpectedCondition {
                        offset: unit.start,
                        before: before.to_string(),
                        after: after.to_string(),
                    });
                }
            }
            ConditionPolicy::Propagated => {
                let unmet = !state.condition.implies(before);
                if unmet {
                    state.result.push(
                        unit.start,
                        Violation::UnmetPrecondition {
                            required: before.to_string(),
                            current: state.condition.to_string(),
                        },
                    );
                }

                // Entering here from a clear state would skip the obligation.
                if unmet || !C::default().implies(before) {
                    state.valid_targets.remove(&unit.start);
                }

                state.condition = after;

                if unit.end % bundle_size == 0 {
                    if !state.condition.implies(&C::default()) {
                        state.result.push(
                            unit.start,
                            Violation::UnsafeConditionAtBundleEnd {
                                condition: state.condition.to_string(),
                            },
                        );
                    }
                    state.condition = C::default();
                }
            }
        }
        Ok(())
    }

    /// Check the condition left at `end`, one past the last instruction.
    pub(crate) fn check_final<C: Condition>(
        self,
        state: &mut ValidationState<C>,
        bundle_size: u64,
        end: u64,
    ) {
        if self == ConditionPolicy::Forbidden || end % bundle_size == 0 {
            return;
        }
        if !state.condition.implies(&C::default()) {
            state.result.push(
                end,
                Violation::UnsafeConditionAtChunkEnd {
                    condition: state.condition.to_string(),
                },
            );
        }
    }
}

/// Parameters of one sandbox flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    bundle_size: u64,
    max_superinstruction_length: usize,
    policy: ConditionPolicy,
}

impl ValidatorConfig {
    /// Create a configuration, checking that the bundle size is a power of two.
    pub fn new(
        bundle_size: u64,
        max_superinstruction_length: usize,
        policy: ConditionPolicy,
    ) -> Result<Self, ContractViolation> {
        if !bundle_size.is_power_of_two() {
            return Err(ContractViolation::InvalidBundleSize(bundle_size));
        }
        if max_superinstruction_length == 0 {
            return Err(ContractViolation::InvalidSuperinstructionLength);
        }
        Ok(Self {
            bundle_size,
            max_superinstruction_length,
            policy,
        })
    }

    /// x86-32: segment-based sandbox, no condition propagation.
    pub fn x86_32() -> Self {
        Self {
            bundle_size: DEFAULT_BUNDLE_SIZE,
            max_superinstruction_length: 2,
            policy: ConditionPolicy::Forbidden,
        }
    }

    /// x86-64: `%r15`-based sandbox with register conditions.
    pub fn x86_64() -> Self {
        Self {
            bundle_size: DEFAULT_BUNDLE_SIZE,
            max_superinstruction_length: 5,
            policy: ConditionPolicy::Propagated,
        }
    }

    pub fn bundle_size(&self) -> u64 {
        self.bundle_size
    }

    pub fn max_superinstruction_length(&self) -> usize {
        self.max_superinstruction_length
    }

    pub fn policy(&self) -> ConditionPolicy {
        self.policy
    }

    /// Index of the bundle containing `address`
    pub fn bundle_of(&self, address: u64) -> u64 {
        address / self.bundle_size
    }

    pub fn is_bundle_aligned(&self, address: u64) -> bool {
        address % self.bundle_size == 0
    }
}
