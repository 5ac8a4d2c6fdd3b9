//! Property tests for the validation engine
//!
//! Random instruction streams are checked against a small text-driven pattern
//! library. The properties do not depend on which diagnostics are produced,
//! only on how the engine walks the stream.

use std::fmt;

use proptest::prelude::*;
use sfi_validator::{
    Condition, Instruction, Match, PatternMatcher, SingleMatch, UnitConditions, Validator,
    ValidatorConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Pending(Option<u8>);

impl fmt::Display for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(register) => write!(f, "pending r{register}"),
            None => write!(f, "clear"),
        }
    }
}

impl Condition for Pending {
    fn implies(&self, other: &Self) -> bool {
        self == other
    }
}

/// Recognizes `pair`+`pair` and `triple`x3 superinstructions, `set N` / `use N`
/// condition pairs, `jmp N` direct jumps and rejects `bad`.
struct ScriptMatcher;

impl PatternMatcher for ScriptMatcher {
    type Condition = Pending;

    fn match_superinstruction(&self, window: &[Instruction]) -> Match<UnitConditions<Pending>> {
        let all = |text: &str| window.iter().all(|i| i.text == text);
        match window.len() {
            2 if all("pair") => Match::Matched(UnitConditions::clear()),
            3 if all("triple") => Match::Matched(UnitConditions::clear()),
            _ => Match::NotMatched,
        }
    }

    fn match_single(&self, instruction: &Instruction) -> Match<SingleMatch<Pending>> {
        let (op, arg) = instruction
            .text
            .split_once(' ')
            .map_or((instruction.text.as_str(), 0), |(op, arg)| {
                (op, arg.parse().unwrap_or(0))
            });
        match op {
            "bad" => Match::NotMatched,
            "jmp" => Match::Matched(SingleMatch::jump(arg)),
            "set" => Match::Matched(
                SingleMatch::plain().with_conditions(Pending(None), Pending(Some(arg as u8))),
            ),
            "use" => Match::Matched(
                SingleMatch::plain().with_conditions(Pending(Some(arg as u8)), Pending(None)),
            ),
            _ => Match::Matched(SingleMatch::plain()),
        }
    }
}

fn operation() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => Just("nop".to_string()),
        2 => Just("pair".to_string()),
        2 => Just("triple".to_string()),
        1 => Just("bad".to_string()),
        1 => (0u64..4).prop_map(|r| format!("set {r}")),
        1 => (0u64..4).prop_map(|r| format!("use {r}")),
        1 => (0u64..256).prop_map(|t| format!("jmp {t}")),
    ]
}

fn instruction_stream() -> impl Strategy<Value = Vec<Instruction>> {
    (
        0u64..64,
        prop::collection::vec((1u64..16, operation()), 0..48),
    )
        .prop_map(|(start, items)| {
            let mut address = start;
            items
                .into_iter()
                .map(|(length, text)| {
                    let instruction = Instruction::new(address, length, text);
                    address += length;
                    instruction
                })
                .collect()
        })
}

proptest! {
    /// Validating the same stream twice yields the same diagnostics.
    #[test]
    fn prop_validation_is_idempotent(instructions in instruction_stream()) {
        let validator = Validator::new(ValidatorConfig::x86_64(), ScriptMatcher);

        let first = validator.validate(&instructions).unwrap();
        let second = validator.validate(&instructions).unwrap();

        prop_assert_eq!(first.diagnostics(), second.diagnostics());
        prop_assert_eq!(first.units(), second.units());
    }

    /// Units tile the stream exactly: no instruction is skipped or consumed twice.
    #[test]
    fn prop_units_cover_stream_once(instructions in instruction_stream()) {
        let validator = Validator::new(ValidatorConfig::x86_64(), ScriptMatcher);
        let result = validator.validate(&instructions).unwrap();

        let total: u64 = instructions.iter().map(|i| i.length).sum();
        let consumed: u64 = result.units().iter().map(|u| u.end - u.start).sum();
        prop_assert_eq!(consumed, total);

        let mut expected = instructions.first().map(|i| i.address);
        for unit in result.units() {
            prop_assert_eq!(Some(unit.start), expected);
            expected = Some(unit.end);
        }
        prop_assert_eq!(expected, instructions.last().map(Instruction::end));
    }

    /// Streams of recognized, bundle-contained, condition-free instructions are accepted.
    #[test]
    fn prop_clean_stream_is_accepted(
        length in prop::sample::select(vec![1u64, 2, 4, 8, 16, 32]),
        count in 0u64..64,
    ) {
        // Equal power-of-two lengths from 0 never straddle a 32-byte bundle
        let instructions: Vec<_> = (0..count)
            .map(|index| Instruction::new(index * length, length, "nop"))
            .collect();

        let validator = Validator::new(ValidatorConfig::x86_64(), ScriptMatcher);
        let result = validator.validate(&instructions).unwrap();
        prop_assert!(result.is_ok(), "{:?}", result.diagnostics());
    }
}
