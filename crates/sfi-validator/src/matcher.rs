// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Protocol between the engine and the pattern library
//!
//! The pattern library is an external collaborator. It recognizes single
//! instructions and multi-instruction superinstructions, and tells the engine
//! which [`Condition`] each of them requires and establishes.

use crate::{Condition, Instruction};

/// Outcome of asking the pattern library about a window of instructions.
///
/// `NotMatched` is an ordinary answer: the engine reacts by trying a shorter
/// window, or by falling back to single-instruction classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match<T> {
    Matched(T),
    NotMatched,
}

impl<T> Match<T> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Match::Matched(_))
    }

    /// Converts into an `Option`, dropping the distinction between variants.
    pub fn matched(self) -> Option<T> {
        match self {
            Match::Matched(value) => Some(value),
            Match::NotMatched => None,
        }
    }
}

impl<T> From<Option<T>> for Match<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Match::Matched(value),
            None => Match::NotMatched,
        }
    }
}

/// Conditions declared for a matched superinstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitConditions<C> {
    /// Required before the first instruction of the unit
    pub before: C,
    /// Established after the last instruction of the unit
    pub after: C,
}

impl<C: Condition> UnitConditions<C> {
    /// Both sides clear, the usual case for superinstructions.
    pub fn clear() -> Self {
        Self::default()
    }
}

/// Classification of a single instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleMatch<C> {
    /// Destination of a direct jump or call, `None` for everything else
    pub jump_target: Option<u64>,
    pub before: C,
    pub after: C,
}

impl<C: Condition> SingleMatch<C> {
    /// A non-jump instruction with clear conditions.
    pub fn plain() -> Self {
        Self::default()
    }

    /// A direct jump or call to `target` with clear conditions.
    pub fn jump(target: u64) -> Self {
        Self {
            jump_target: Some(target),
            ..Self::default()
        }
    }

    pub fn with_conditions(mut self, before: C, after: C) -> Self {
        self.before = before;
        self.after = after;
        self
    }
}

/// Pattern library consulted by the [`Validator`](crate::Validator).
///
/// Implementations must be pure: the same window always produces the same
/// answer.
pub trait PatternMatcher {
    type Condition: Condition;

    /// Try to recognize `window` (at least two instructions) as one
    /// superinstruction.
    fn match_superinstruction(
        &self,
        window: &[Instruction],
    ) -> Match<UnitConditions<Self::Condition>>;

    /// Classify a single instruction, resolving direct jump destinations.
    fn match_single(&self, instruction: &Instruction) -> Match<SingleMatch<Self::Condition>>;
}

impl<M: PatternMatcher + ?Sized> PatternMatcher for &M {
    type Condition = M::Condition;

    fn match_superinstruction(
        &self,
        window: &[Instruction],
    ) -> Match<UnitConditions<Self::Condition>> {
        (**self).match_superinstruction(window)
    }

    fn match_single(&self, instruction: &Instruction) -> Match<SingleMatch<Self::Condition>> {
        (**self).match_single(instruction)
    }
}
