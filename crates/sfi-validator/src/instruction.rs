// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoded instruction records

use std::fmt;

/// A decoded instruction with its location information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the first byte
    pub address: u64,
    /// Encoded length in bytes
    pub length: u64,
    /// Disassembly text (AT&T syntax for the bundled x86 pattern library)
    pub text: String,
}

impl Instruction {
    pub fn new(address: u64, length: u64, text: impl Into<String>) -> Self {
        Self {
            address,
            length,
            text: text.into(),
        }
    }

    /// Address one past the last byte of this instruction
    pub fn end(&self) -> u64 {
        self.address + self.length
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}: {}", self.address, self.text)
    }
}
