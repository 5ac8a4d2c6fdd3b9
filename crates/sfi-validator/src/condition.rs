// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conditions carried between instructions
//!
//! A condition describes what the instruction stream guarantees, or still
//! owes, at a given point. The pattern library attaches a precondition and a
//! postcondition to every unit it recognizes; the engine tracks the current
//! condition and checks that each precondition is met.
//!
//! The [`Default`] value is the clear condition: nothing is guaranteed and
//! nothing is outstanding. This is the state at every bundle boundary, since any
//! bundle boundary may be the target of an indirect jump.

use std::fmt::{Debug, Display};

/// Safety obligation propagated through the instruction stream.
///
/// Values are immutable: the engine replaces its current condition, it never
/// mutates one.
pub trait Condition: Clone + Default + PartialEq + Debug + Display {
    /// Returns true if a stream in state `self` satisfies everything `other`
    /// demands.
    fn implies(&self, other: &Self) -> bool;

    /// Check if this is the clear condition.
    #[inline]
    fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}
