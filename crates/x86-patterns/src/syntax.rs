// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! AT&T disassembly syntax as printed by GNU objdump
//!
//! Operands are listed source first, destination last. In
//! `lock addl $0x1,0x8(%r15,%rax,1)` the prefix is `lock`, the mnemonic
//! `addl`, the source an immediate and the destination a memory reference of
//! the form `displacement(base,index,scale)`.
//!
//! Direct branch targets are printed as bare hexadecimal addresses followed
//! by a symbolic annotation (`jmp 40 <f+0x40>`); they parse as a memory
//! operand with only a displacement.

use crate::registers::Register;

/// Words objdump prints in front of the mnemonic
const PREFIXES: [&str; 15] = [
    "lock", "rep", "repz", "repe", "repnz", "repne", "data16", "addr32", "cs", "ds", "es",
    "fs", "gs", "ss", "notrack",
];

/// A memory reference `segment:displacement(base,index,scale)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryOperand {
    pub segment: Option<Register>,
    pub displacement: i64,
    pub base: Option<Register>,
    pub index: Option<Register>,
    pub scale: u8,
}

impl MemoryOperand {
    /// A bare address with no registers, as used by direct branches.
    pub fn absolute_address(&self) -> Option<u64> {
        match self {
            MemoryOperand {
                segment: None,
                base: None,
                index: None,
                displacement,
                ..
            } => Some(*displacement as u64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Immediate(i64),
    Memory(MemoryOperand),
    /// `*operand`, the target of an indirect branch
    Indirect(Box<Operand>),
}

impl Operand {
    pub fn as_register(&self) -> Option<Register> {
        match self {
            Operand::Register(register) => Some(*register),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryOperand> {
        match self {
            Operand::Memory(memory) => Some(memory),
            _ => None,
        }
    }
}

/// A disassembled instruction split into prefixes, mnemonic and operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction<'a> {
    pub prefixes: Vec<&'a str>,
    pub mnemonic: &'a str,
    pub operands: Vec<Operand>,
}

impl<'a> ParsedInstruction<'a> {
    /// Parse disassembly text, returning `None` if it is not well formed.
    pub fn parse(text: &'a str) -> Option<Self> {
        // Drop the symbolic annotation of branch targets
        let text = text.split_once('<').map_or(text, |(code, _)| code).trim();

        let mut prefixes = Vec::new();
        let mut rest = text;
        let mnemonic = loop {
            let (word, tail) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(word, tail)| (word, tail.trim_start()));
            if word.is_empty() {
                return None;
            }
            if !tail.is_empty() && is_prefix(word) {
                prefixes.push(word);
                rest = tail;
                continue;
            }
            rest = tail;
            break word;
        };

        let operands = split_operands(rest)
            .into_iter()
            .map(parse_operand)
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            prefixes,
            mnemonic,
            operands,
        })
    }

    /// Destination operand (AT&T order puts it last)
    pub fn destination(&self) -> Option<&Operand> {
        self.operands.last()
    }

    /// The memory operand, if any. x86 instructions have at most one.
    pub fn memory(&self) -> Option<&MemoryOperand> {
        self.operands.iter().find_map(Operand::as_memory)
    }
}

fn is_prefix(word: &str) -> bool {
    PREFIXES.contains(&word) || word.starts_with("rex")
}

/// Split comma-separated operands, keeping memory references together
fn split_operands(s: &str) -> Vec<&str> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }

    let mut operands = Vec::new();
    let mut start = 0;
    let mut paren_depth: u32 = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            ',' if paren_depth == 0 => {
                operands.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    operands.push(s[start..].trim());

    operands
}

fn parse_operand(text: &str) -> Option<Operand> {
    if let Some(inner) = text.strip_prefix('*') {
        return Some(Operand::Indirect(Box::new(parse_operand(inner)?)));
    }
    if let Some(immediate) = text.strip_prefix('$') {
        return parse_number(immediate).map(Operand::Immediate);
    }
    if let Some(name) = text.strip_prefix('%') {
        if !name.contains([':', '(']) {
            return Some(Operand::Register(parse_register(text)?));
        }
    }
    parse_memory(text).map(Operand::Memory)
}

fn parse_register(text: &str) -> Option<Register> {
    let name = text.trim().strip_prefix('%')?;
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(Register::from_name(name))
}

fn parse_memory(text: &str) -> Option<MemoryOperand> {
    let (segment, address) = match text.split_once(':') {
        Some((segment, address)) => (Some(parse_register(segment)?), address),
        None => (None, text),
    };

    let (displacement, registers) = match address.split_once('(') {
        Some((displacement, registers)) => (displacement, Some(registers.strip_suffix(')')?)),
        None => (address, None),
    };
    let displacement = match displacement.trim() {
        "" => 0,
        value => parse_number(value)?,
    };

    let mut memory = MemoryOperand {
        segment,
        displacement,
        base: None,
        index: None,
        scale: 1,
    };

    if let Some(registers) = registers {
        let mut parts = registers.split(',').map(str::trim);
        memory.base = match parts.next() {
            Some("") | None => None,
            Some(base) => Some(parse_register(base)?),
        };
        memory.index = match parts.next() {
            Some("") | None => None,
            Some(index) => Some(parse_register(index)?),
        };
        if let Some(scale) = parts.next() {
            memory.scale = scale.parse().ok().filter(|&s| matches!(s, 1 | 2 | 4 | 8))?;
        }
        if parts.next().is_some() || (memory.base.is_none() && memory.index.is_none()) {
            return None;
        }
    }

    Some(memory)
}

/// Parse a hexadecimal number with optional sign and `0x` prefix.
///
/// objdump prints immediates and displacements with `0x` and branch targets
/// without; both are hexadecimal.
fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    let value = u64::from_str_radix(digits, 16).ok()? as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}
