// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use sfi_validator::Condition;

use crate::registers::Gpr;

/// Register state carried between adjacent instructions in 64-bit mode
///
/// `restricted` names a register whose upper 32 bits are known to be zero,
/// which makes it safe as an index into the sandbox. `pending_sandbox` names
/// `%rsp` or `%rbp` after a 32-bit write, before `%r15` has been added back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterCondition {
    restricted: Option<Gpr>,
    pending_sandbox: Option<Gpr>,
}

impl RegisterCondition {
    pub fn restricted(gpr: Gpr) -> Self {
        Self {
            restricted: Some(gpr),
            pending_sandbox: None,
        }
    }

    pub fn pending_sandbox(gpr: Gpr) -> Self {
        Self {
            restricted: None,
            pending_sandbox: Some(gpr),
        }
    }

    pub fn restricted_register(&self) -> Option<Gpr> {
        self.restricted
    }

    pub fn pending_sandbox_register(&self) -> Option<Gpr> {
        self.pending_sandbox
    }
}

impl Condition for RegisterCondition {
    /// Extra restricted registers may be forgotten. A pending sandbox must
    /// match exactly.
    fn implies(&self, other: &Self) -> bool {
        (other.restricted.is_none() || other.restricted == self.restricted)
            && other.pending_sandbox == self.pending_sandbox
    }
}

impl fmt::Display for RegisterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.restricted, self.pending_sandbox) {
            (None, None) => write!(f, "no condition"),
            (Some(restricted), None) => write!(f, "{restricted} is restricted"),
            (None, Some(pending)) => write!(f, "{pending} needs sandboxing"),
            (Some(restricted), Some(pending)) => {
                write!(f, "{restricted} is restricted and {pending} needs sandboxing")
            }
        }
    }
}
