// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! x86 opcode classification
//!
//! Only mnemonics listed here can be accepted by the pattern library; anything
//! else is reported as unrecognized. System instructions (`syscall`, `int`,
//! `sysenter`), returns, far transfers, segment loads and privileged
//! instructions are deliberately absent.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// How an instruction uses its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    /// Writes its last operand
    Write,
    /// Writes its last operand without accessing memory (`lea`)
    Address,
    /// Reads its operands only
    Read,
    /// Writes `%rax` / `%rdx` implicitly (sign extensions)
    Implicit,
    Nop,
    Jump,
    ConditionalJump,
    Call,
    /// String instructions using `%rsi` / `%rdi` implicitly
    String,
}

/// Classification of an x86 mnemonic
#[derive(Debug)]
pub struct ClassifiedOpcode {
    /// The mnemonic without AT&T size suffix (e.g. "add", "jmp")
    pub mnemonic: &'static str,
    pub class: OpcodeClass,
}

impl ClassifiedOpcode {
    const fn new(mnemonic: &'static str, class: OpcodeClass) -> Self {
        Self { mnemonic, class }
    }

    const fn write(mnemonic: &'static str) -> Self {
        Self::new(mnemonic, OpcodeClass::Write)
    }

    const fn read(mnemonic: &'static str) -> Self {
        Self::new(mnemonic, OpcodeClass::Read)
    }

    const fn conditional_jump(mnemonic: &'static str) -> Self {
        Self::new(mnemonic, OpcodeClass::ConditionalJump)
    }

    const fn string(mnemonic: &'static str) -> Self {
        Self::new(mnemonic, OpcodeClass::String)
    }

    /// Classify by mnemonic as printed by objdump
    ///
    /// Falls back to stripping one AT&T size suffix (`addl` -> `add`,
    /// `callq` -> `call`). Returns None for unknown mnemonics.
    pub fn from_mnemonic(mnemonic: &str) -> Option<&'static Self> {
        if let Some(&classified) = BY_MNEMONIC.get(mnemonic) {
            return Some(classified);
        }
        let stem = mnemonic.strip_suffix(['b', 'w', 'l', 'q'])?;
        BY_MNEMONIC.get(stem).copied()
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self.class,
            OpcodeClass::Jump | OpcodeClass::ConditionalJump | OpcodeClass::Call
        )
    }
}

#[rustfmt::skip]
const OPCODE_TABLE: &[ClassifiedOpcode] = &[
    // Moves
    ClassifiedOpcode::write("mov"),
    ClassifiedOpcode::write("movabs"),
    ClassifiedOpcode::write("movzbl"),
    ClassifiedOpcode::write("movzbw"),
    ClassifiedOpcode::write("movzbq"),
    ClassifiedOpcode::write("movzwl"),
    ClassifiedOpcode::write("movzwq"),
    ClassifiedOpcode::write("movsbl"),
    ClassifiedOpcode::write("movsbw"),
    ClassifiedOpcode::write("movsbq"),
    ClassifiedOpcode::write("movswl"),
    ClassifiedOpcode::write("movswq"),
    ClassifiedOpcode::write("movslq"),
    ClassifiedOpcode::write("pop"),
    ClassifiedOpcode::new("lea", OpcodeClass::Address),

    // Integer arithmetic and logic
    ClassifiedOpcode::write("add"),
    ClassifiedOpcode::write("adc"),
    ClassifiedOpcode::write("sub"),
    ClassifiedOpcode::write("sbb"),
    ClassifiedOpcode::write("imul"),
    ClassifiedOpcode::write("and"),
    ClassifiedOpcode::write("or"),
    ClassifiedOpcode::write("xor"),
    ClassifiedOpcode::write("not"),
    ClassifiedOpcode::write("neg"),
    ClassifiedOpcode::write("inc"),
    ClassifiedOpcode::write("dec"),
    ClassifiedOpcode::write("shl"),
    ClassifiedOpcode::write("sal"),
    ClassifiedOpcode::write("shr"),
    ClassifiedOpcode::write("sar"),
    ClassifiedOpcode::write("rol"),
    ClassifiedOpcode::write("ror"),
    ClassifiedOpcode::write("shld"),
    ClassifiedOpcode::write("shrd"),
    ClassifiedOpcode::write("bswap"),
    ClassifiedOpcode::write("bsf"),
    ClassifiedOpcode::write("bsr"),
    ClassifiedOpcode::write("popcnt"),
    ClassifiedOpcode::write("lzcnt"),
    ClassifiedOpcode::write("tzcnt"),

    // Conditional moves and sets
    ClassifiedOpcode::write("cmove"),
    ClassifiedOpcode::write("cmovne"),
    ClassifiedOpcode::write("cmovl"),
    ClassifiedOpcode::write("cmovle"),
    ClassifiedOpcode::write("cmovg"),
    ClassifiedOpcode::write("cmovge"),
    ClassifiedOpcode::write("cmovb"),
    ClassifiedOpcode::write("cmovbe"),
    ClassifiedOpcode::write("cmova"),
    ClassifiedOpcode::write("cmovae"),
    ClassifiedOpcode::write("cmovs"),
    ClassifiedOpcode::write("cmovns"),
    ClassifiedOpcode::write("sete"),
    ClassifiedOpcode::write("setne"),
    ClassifiedOpcode::write("setl"),
    ClassifiedOpcode::write("setle"),
    ClassifiedOpcode::write("setg"),
    ClassifiedOpcode::write("setge"),
    ClassifiedOpcode::write("setb"),
    ClassifiedOpcode::write("setbe"),
    ClassifiedOpcode::write("seta"),
    ClassifiedOpcode::write("setae"),
    ClassifiedOpcode::write("sets"),
    ClassifiedOpcode::write("setns"),

    // Comparisons and stores to the stack
    ClassifiedOpcode::read("cmp"),
    ClassifiedOpcode::read("test"),
    ClassifiedOpcode::read("bt"),
    ClassifiedOpcode::read("push"),

    // SSE scalar and vector moves
    ClassifiedOpcode::write("movd"),
    ClassifiedOpcode::write("movq"),
    ClassifiedOpcode::write("movss"),
    ClassifiedOpcode::write("movsd"),
    ClassifiedOpcode::write("movaps"),
    ClassifiedOpcode::write("movups"),
    ClassifiedOpcode::write("movdqa"),
    ClassifiedOpcode::write("movdqu"),
    ClassifiedOpcode::write("addsd"),
    ClassifiedOpcode::write("subsd"),
    ClassifiedOpcode::write("mulsd"),
    ClassifiedOpcode::write("divsd"),
    ClassifiedOpcode::write("xorps"),
    ClassifiedOpcode::write("pxor"),
    ClassifiedOpcode::write("cvtsi2sd"),
    ClassifiedOpcode::write("cvttsd2si"),
    ClassifiedOpcode::read("ucomisd"),
    ClassifiedOpcode::read("comisd"),

    // Sign extension of the accumulator
    ClassifiedOpcode::new("cltq", OpcodeClass::Implicit),
    ClassifiedOpcode::new("cltd", OpcodeClass::Implicit),
    ClassifiedOpcode::new("cqto", OpcodeClass::Implicit),
    ClassifiedOpcode::new("cwtl", OpcodeClass::Implicit),

    // Padding
    ClassifiedOpcode::new("nop", OpcodeClass::Nop),
    ClassifiedOpcode::new("hlt", OpcodeClass::Nop),

    // Control flow
    ClassifiedOpcode::new("jmp", OpcodeClass::Jump),
    ClassifiedOpcode::new("call", OpcodeClass::Call),
    ClassifiedOpcode::conditional_jump("jo"),
    ClassifiedOpcode::conditional_jump("jno"),
    ClassifiedOpcode::conditional_jump("jb"),
    ClassifiedOpcode::conditional_jump("jae"),
    ClassifiedOpcode::conditional_jump("je"),
    ClassifiedOpcode::conditional_jump("jne"),
    ClassifiedOpcode::conditional_jump("jbe"),
    ClassifiedOpcode::conditional_jump("ja"),
    ClassifiedOpcode::conditional_jump("js"),
    ClassifiedOpcode::conditional_jump("jns"),
    ClassifiedOpcode::conditional_jump("jp"),
    ClassifiedOpcode::conditional_jump("jnp"),
    ClassifiedOpcode::conditional_jump("jl"),
    ClassifiedOpcode::conditional_jump("jge"),
    ClassifiedOpcode::conditional_jump("jle"),
    ClassifiedOpcode::conditional_jump("jg"),

    // String instructions
    ClassifiedOpcode::string("movsb"),
    ClassifiedOpcode::string("movsw"),
    ClassifiedOpcode::string("movsl"),
    ClassifiedOpcode::string("movsq"),
    ClassifiedOpcode::string("stos"),
    ClassifiedOpcode::string("stosb"),
    ClassifiedOpcode::string("stosw"),
    ClassifiedOpcode::string("stosl"),
    ClassifiedOpcode::string("stosq"),
];

lazy_static! {
    /// Map from mnemonic string to ClassifiedOpcode
    pub static ref BY_MNEMONIC: HashMap<&'static str, &'static ClassifiedOpcode> = {
        OPCODE_TABLE.iter().map(|c| (c.mnemonic, c)).collect()
    };
}
