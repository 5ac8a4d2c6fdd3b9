// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Safe instruction idioms for the x86 sandboxes
//!
//! # 32-bit
//!
//! Memory is confined by segmentation, so data accesses need no checks beyond
//! refusing writes to segment and control registers and segment overrides
//! other than `%gs` (thread pointer). Indirect branches must be masked to a
//! bundle boundary right before the branch:
//!
//! ```text
//! and    $0xffffffe0,%eax
//! jmp    *%eax
//! ```
//!
//! # 64-bit
//!
//! The sandbox is a 4GiB region based at `%r15`. Memory operands must use
//! `%r15`, `%rsp`, `%rbp` or `%rip` as their base, and an index register is
//! only safe after a 32-bit write has cleared its upper half, which is the
//! `restricted` condition. `%rsp` and `%rbp` must point into the sandbox at all
//! times, except between a 32-bit write and the `add %r15` that follows it.
//! Indirect branches and string instructions are only accepted as
//! superinstructions that rebuild the address from `%r15`.

use sfi_validator::{
    Condition, Instruction, Match, PatternMatcher, SingleMatch, UnitConditions, ValidatorConfig,
};
use tracing::trace;

use crate::{
    condition::RegisterCondition,
    opcodes::{ClassifiedOpcode, OpcodeClass},
    registers::{Gpr, Register, SegmentRegister, Width},
    syntax::{MemoryOperand, Operand, ParsedInstruction},
};

/// Sandbox flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    X86_32,
    X86_64,
}

impl Mode {
    /// Validator configuration matching this flavour
    pub fn config(self) -> ValidatorConfig {
        match self {
            Mode::X86_32 => ValidatorConfig::x86_32(),
            Mode::X86_64 => ValidatorConfig::x86_64(),
        }
    }
}

/// Pattern library for AT&T disassembly produced by objdump
#[derive(Debug, Clone)]
pub struct X86Patterns {
    mode: Mode,
    /// `~(bundle_size - 1)`, the immediate of the masking `and`
    mask: i64,
}

impl X86Patterns {
    pub fn new(mode: Mode) -> Self {
        let bundle_size = mode.config().bundle_size() as i64;
        Self {
            mode,
            mask: !(bundle_size - 1),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// objdump prints the 32-bit mask either sign-extended or as an unsigned
    /// 32-bit value.
    fn is_bundle_mask(&self, immediate: i64) -> bool {
        immediate == self.mask || immediate == i64::from(self.mask as u32)
    }

    /// `and $mask,%eR`, returning R
    fn masked_register(&self, parsed: &ParsedInstruction) -> Option<Gpr> {
        if !parsed.prefixes.is_empty() || stem(parsed) != Some("and") {
            return None;
        }
        match parsed.operands.as_slice() {
            [Operand::Immediate(immediate), Operand::Register(register)]
                if self.is_bundle_mask(*immediate) =>
            {
                general(*register, Width::Dword)
            }
            _ => None,
        }
    }

    fn match_masked_branch_32(&self, window: &[ParsedInstruction]) -> bool {
        let [mask, branch] = window else {
            return false;
        };
        self.masked_register(mask)
            .is_some_and(|gpr| is_indirect_branch(branch, gpr, Width::Dword))
    }

    fn match_masked_branch_64(&self, window: &[ParsedInstruction]) -> bool {
        let [mask, rebase, branch] = window else {
            return false;
        };
        let Some(gpr) = self.masked_register(mask) else {
            return false;
        };
        !matches!(gpr, Gpr::Rsp | Gpr::R15)
            && is_rebase(rebase, gpr)
            && is_indirect_branch(branch, gpr, Width::Qword)
    }

    fn match_superinstruction_32(&self, window: &[ParsedInstruction]) -> bool {
        self.match_masked_branch_32(window)
    }

    fn match_superinstruction_64(&self, window: &[ParsedInstruction]) -> bool {
        match window {
            [_, _, _] => {
                self.match_masked_branch_64(window) || is_sandboxed_string(window, "stos")
            }
            [_, _, _, _, _] => is_sandboxed_string(window, "movs"),
            _ => false,
        }
    }

    fn match_direct_branch(
        &self,
        parsed: &ParsedInstruction,
    ) -> Match<SingleMatch<RegisterCondition>> {
        match parsed.operands.as_slice() {
            [Operand::Memory(memory)] => memory.absolute_address().map(SingleMatch::jump).into(),
            // Indirect branches are only accepted as superinstructions
            _ => Match::NotMatched,
        }
    }

    fn match_single_32(
        &self,
        parsed: &ParsedInstruction,
        opcode: &ClassifiedOpcode,
    ) -> Match<SingleMatch<RegisterCondition>> {
        if let Some(Operand::Register(register)) = parsed.destination() {
            if writes_destination(opcode)
                && matches!(register, Register::Segment(_) | Register::Privileged)
            {
                return Match::NotMatched;
            }
        }

        let skip_segment_check = matches!(opcode.class, OpcodeClass::Nop | OpcodeClass::String);
        if let Some(memory) = parsed.memory() {
            let segment_ok = matches!(
                memory.segment,
                None | Some(Register::Segment(SegmentRegister::Gs))
            );
            if !segment_ok && !skip_segment_check {
                return Match::NotMatched;
            }
        }

        Match::Matched(SingleMatch::plain())
    }

    fn match_single_64(
        &self,
        parsed: &ParsedInstruction,
        opcode: &ClassifiedOpcode,
    ) -> Match<SingleMatch<RegisterCondition>> {
        match opcode.class {
            OpcodeClass::Nop | OpcodeClass::Implicit => {
                return Match::Matched(SingleMatch::plain());
            }
            OpcodeClass::String => return Match::NotMatched,
            _ => {}
        }

        // Implicit %rdx:%rax destination
        if opcode.mnemonic == "imul" && parsed.operands.len() == 1 {
            return Match::NotMatched;
        }

        let mut before = RegisterCondition::default();
        if opcode.class != OpcodeClass::Address {
            if let Some(memory) = parsed.memory() {
                let Some(precondition) = sandboxed_address(memory) else {
                    return Match::NotMatched;
                };
                before = precondition;
            }
        }

        let mut after = RegisterCondition::default();
        if writes_destination(opcode) {
            match parsed.destination() {
                Some(Operand::Register(Register::General { gpr, width })) => {
                    match (gpr, width) {
                        (Gpr::R15, _) => return Match::NotMatched,
                        (Gpr::Rsp | Gpr::Rbp, Width::Qword) => {
                            let Some(precondition) = stack_pointer_update(parsed, *gpr) else {
                                return Match::NotMatched;
                            };
                            if !precondition.is_clear() {
                                before = precondition;
                            }
                        }
                        (Gpr::Rsp | Gpr::Rbp, Width::Dword) => {
                            after = RegisterCondition::pending_sandbox(*gpr);
                        }
                        (Gpr::Rsp | Gpr::Rbp, _) => return Match::NotMatched,
                        (_, Width::Dword) => after = RegisterCondition::restricted(*gpr),
                        _ => {}
                    }
                }
                Some(Operand::Register(Register::Segment(_) | Register::Privileged)) => {
                    return Match::NotMatched;
                }
                _ => {}
            }
        }

        Match::Matched(SingleMatch::plain().with_conditions(before, after))
    }
}

impl PatternMatcher for X86Patterns {
    type Condition = RegisterCondition;

    fn match_superinstruction(
        &self,
        window: &[Instruction],
    ) -> Match<UnitConditions<RegisterCondition>> {
        let Some(parsed) = window
            .iter()
            .map(|instruction| ParsedInstruction::parse(&instruction.text))
            .collect::<Option<Vec<_>>>()
        else {
            return Match::NotMatched;
        };

        let matched = match self.mode {
            Mode::X86_32 => self.match_superinstruction_32(&parsed),
            Mode::X86_64 => self.match_superinstruction_64(&parsed),
        };
        if !matched {
            return Match::NotMatched;
        }

        trace!(start = window[0].address, length = window.len(), "sandboxing idiom");
        Match::Matched(UnitConditions::clear())
    }

    fn match_single(&self, instruction: &Instruction) -> Match<SingleMatch<RegisterCondition>> {
        let Some(parsed) = ParsedInstruction::parse(&instruction.text) else {
            return Match::NotMatched;
        };
        let Some(opcode) = ClassifiedOpcode::from_mnemonic(parsed.mnemonic) else {
            return Match::NotMatched;
        };
        if !prefixes_allowed(&parsed, opcode) {
            return Match::NotMatched;
        }

        if opcode.is_branch() {
            return self.match_direct_branch(&parsed);
        }

        match self.mode {
            Mode::X86_32 => self.match_single_32(&parsed, opcode),
            Mode::X86_64 => self.match_single_64(&parsed, opcode),
        }
    }
}

/// Mnemonic with the size suffix removed
fn stem(parsed: &ParsedInstruction) -> Option<&'static str> {
    ClassifiedOpcode::from_mnemonic(parsed.mnemonic).map(|opcode| opcode.mnemonic)
}

/// The register family if `register` is a general purpose register of `width`
fn general(register: Register, width: Width) -> Option<Gpr> {
    match register.as_general() {
        Some((gpr, w)) if w == width => Some(gpr),
        _ => None,
    }
}

fn is_register(operand: &Operand, gpr: Gpr, width: Width) -> bool {
    operand.as_register() == Some(Register::general(gpr, width))
}

fn writes_destination(opcode: &ClassifiedOpcode) -> bool {
    matches!(opcode.class, OpcodeClass::Write | OpcodeClass::Address)
}

fn prefixes_allowed(parsed: &ParsedInstruction, opcode: &ClassifiedOpcode) -> bool {
    parsed.prefixes.iter().all(|&prefix| match prefix {
        "lock" => {
            opcode.class == OpcodeClass::Write
                && matches!(parsed.destination(), Some(Operand::Memory(_)))
        }
        "rep" | "repz" | "repe" | "repnz" | "repne" => opcode.class == OpcodeClass::String,
        "data16" | "cs" => opcode.class == OpcodeClass::Nop,
        _ => false,
    })
}

/// Precondition for a memory access to stay inside the sandbox, or `None` if
/// it never does.
fn sandboxed_address(memory: &MemoryOperand) -> Option<RegisterCondition> {
    if memory.segment.is_some() {
        return None;
    }

    let base_ok = match memory.base {
        Some(Register::InstructionPointer) => true,
        Some(register) => matches!(
            general(register, Width::Qword),
            Some(Gpr::R15 | Gpr::Rsp | Gpr::Rbp)
        ),
        None => false,
    };
    if !base_ok {
        return None;
    }

    match memory.index {
        None => Some(RegisterCondition::default()),
        Some(index) => general(index, Width::Qword).map(RegisterCondition::restricted),
    }
}

/// Check a 64-bit write to `%rsp` / `%rbp`, returning its precondition.
///
/// Immediate adjustments rely on the guard regions around the sandbox.
fn stack_pointer_update(parsed: &ParsedInstruction, gpr: Gpr) -> Option<RegisterCondition> {
    let [source, _] = parsed.operands.as_slice() else {
        return None;
    };
    match (stem(parsed)?, source) {
        ("add" | "sub" | "and", Operand::Immediate(_)) => Some(RegisterCondition::default()),
        ("add", source) if is_register(source, Gpr::R15, Width::Qword) => {
            Some(RegisterCondition::pending_sandbox(gpr))
        }
        ("mov", source)
            if is_register(source, Gpr::Rsp, Width::Qword)
                || is_register(source, Gpr::Rbp, Width::Qword) =>
        {
            Some(RegisterCondition::default())
        }
        _ => None,
    }
}

/// `add %r15,%rR`
fn is_rebase(parsed: &ParsedInstruction, gpr: Gpr) -> bool {
    parsed.prefixes.is_empty()
        && stem(parsed) == Some("add")
        && matches!(
            parsed.operands.as_slice(),
            [source, destination]
                if is_register(source, Gpr::R15, Width::Qword)
                    && is_register(destination, gpr, Width::Qword)
        )
}

/// `jmp *%R` or `call *%R`
fn is_indirect_branch(parsed: &ParsedInstruction, gpr: Gpr, width: Width) -> bool {
    let is_jump_or_call = ClassifiedOpcode::from_mnemonic(parsed.mnemonic)
        .is_some_and(|opcode| matches!(opcode.class, OpcodeClass::Jump | OpcodeClass::Call));
    parsed.prefixes.is_empty()
        && is_jump_or_call
        && matches!(
            parsed.operands.as_slice(),
            [Operand::Indirect(target)] if is_register(target, gpr, width)
        )
}

/// `mov %eR,%eR`, clearing the upper half of R
fn is_zero_extension(parsed: &ParsedInstruction, gpr: Gpr) -> bool {
    parsed.prefixes.is_empty()
        && stem(parsed) == Some("mov")
        && matches!(
            parsed.operands.as_slice(),
            [source, destination]
                if is_register(source, gpr, Width::Dword)
                    && is_register(destination, gpr, Width::Dword)
        )
}

/// `lea (%r15,%rR,1),%rR`
fn is_sandbox_lea(parsed: &ParsedInstruction, gpr: Gpr) -> bool {
    let expected = MemoryOperand {
        segment: None,
        displacement: 0,
        base: Some(Register::general(Gpr::R15, Width::Qword)),
        index: Some(Register::general(gpr, Width::Qword)),
        scale: 1,
    };
    parsed.prefixes.is_empty()
        && stem(parsed) == Some("lea")
        && matches!(
            parsed.operands.as_slice(),
            [Operand::Memory(memory), destination]
                if *memory == expected && is_register(destination, gpr, Width::Qword)
        )
}

/// `[mov %esi,%esi; lea (%r15,%rsi,1),%rsi;] mov %edi,%edi;
/// lea (%r15,%rdi,1),%rdi; rep <string>`
fn is_sandboxed_string(window: &[ParsedInstruction], family: &str) -> bool {
    let (setup, [string]) = window.split_at(window.len().saturating_sub(1)) else {
        return false;
    };
    let registers: &[Gpr] = match setup.len() {
        2 => &[Gpr::Rdi],
        4 => &[Gpr::Rsi, Gpr::Rdi],
        _ => return false,
    };

    let setup_ok = setup
        .chunks(2)
        .zip(registers)
        .all(|(pair, &gpr)| is_zero_extension(&pair[0], gpr) && is_sandbox_lea(&pair[1], gpr));

    let string_ok = string.prefixes.iter().all(|&prefix| prefix == "rep")
        && string.mnemonic.starts_with(family)
        && ClassifiedOpcode::from_mnemonic(string.mnemonic)
            .is_some_and(|opcode| opcode.class == OpcodeClass::String);

    setup_ok && string_ok
}
