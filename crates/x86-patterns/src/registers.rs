// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! x86 register names

use std::{collections::HashMap, fmt};

use lazy_static::lazy_static;

/// General purpose register family, independent of access width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gpr {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

/// Access width of a general purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Qword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentRegister {
    Cs,
    Ds,
    Es,
    Fs,
    Gs,
    Ss,
}

/// A register operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    General { gpr: Gpr, width: Width },
    /// `%rip` / `%eip`, only valid as a memory base
    InstructionPointer,
    Segment(SegmentRegister),
    /// Control and debug registers
    Privileged,
    /// Vector, x87 and mask registers
    Other,
}

/// Names of each family as `[64-bit, 32-bit, 16-bit, low 8-bit]`
const GPR_NAMES: [(Gpr, [&str; 4]); 16] = [
    (Gpr::Rax, ["rax", "eax", "ax", "al"]),
    (Gpr::Rcx, ["rcx", "ecx", "cx", "cl"]),
    (Gpr::Rdx, ["rdx", "edx", "dx", "dl"]),
    (Gpr::Rbx, ["rbx", "ebx", "bx", "bl"]),
    (Gpr::Rsp, ["rsp", "esp", "sp", "spl"]),
    (Gpr::Rbp, ["rbp", "ebp", "bp", "bpl"]),
    (Gpr::Rsi, ["rsi", "esi", "si", "sil"]),
    (Gpr::Rdi, ["rdi", "edi", "di", "dil"]),
    (Gpr::R8, ["r8", "r8d", "r8w", "r8b"]),
    (Gpr::R9, ["r9", "r9d", "r9w", "r9b"]),
    (Gpr::R10, ["r10", "r10d", "r10w", "r10b"]),
    (Gpr::R11, ["r11", "r11d", "r11w", "r11b"]),
    (Gpr::R12, ["r12", "r12d", "r12w", "r12b"]),
    (Gpr::R13, ["r13", "r13d", "r13w", "r13b"]),
    (Gpr::R14, ["r14", "r14d", "r14w", "r14b"]),
    (Gpr::R15, ["r15", "r15d", "r15w", "r15b"]),
];

const WIDTHS: [Width; 4] = [Width::Qword, Width::Dword, Width::Word, Width::Byte];

const HIGH_BYTES: [(&str, Gpr); 4] = [
    ("ah", Gpr::Rax),
    ("ch", Gpr::Rcx),
    ("dh", Gpr::Rdx),
    ("bh", Gpr::Rbx),
];

const SEGMENTS: [(&str, SegmentRegister); 6] = [
    ("cs", SegmentRegister::Cs),
    ("ds", SegmentRegister::Ds),
    ("es", SegmentRegister::Es),
    ("fs", SegmentRegister::Fs),
    ("gs", SegmentRegister::Gs),
    ("ss", SegmentRegister::Ss),
];

lazy_static! {
    /// Map from register name (without `%`) to register
    static ref BY_NAME: HashMap<&'static str, Register> = {
        let mut map = HashMap::new();
        for (gpr, names) in GPR_NAMES {
            for (name, width) in names.into_iter().zip(WIDTHS) {
                map.insert(name, Register::General { gpr, width });
            }
        }
        for (name, gpr) in HIGH_BYTES {
            map.insert(name, Register::General { gpr, width: Width::Byte });
        }
        for (name, segment) in SEGMENTS {
            map.insert(name, Register::Segment(segment));
        }
        map.insert("rip", Register::InstructionPointer);
        map.insert("eip", Register::InstructionPointer);
        map
    };
}

impl Register {
    /// Look up a register by its name without the `%` sigil.
    pub fn from_name(name: &str) -> Self {
        if let Some(register) = BY_NAME.get(name) {
            return *register;
        }
        if is_numbered(name, "cr") || is_numbered(name, "db") || is_numbered(name, "dr") {
            return Register::Privileged;
        }
        Register::Other
    }

    pub fn general(gpr: Gpr, width: Width) -> Self {
        Register::General { gpr, width }
    }

    /// The register family and width, if this is a general purpose register.
    pub fn as_general(&self) -> Option<(Gpr, Width)> {
        match *self {
            Register::General { gpr, width } => Some((gpr, width)),
            _ => None,
        }
    }
}

fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

impl Gpr {
    fn names(self) -> &'static [&'static str; 4] {
        &GPR_NAMES[self as usize].1
    }

    /// 64-bit name, e.g. `rax`
    pub fn name(self) -> &'static str {
        self.names()[0]
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name())
    }
}
