// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reader for GNU `objdump -d` listings
//!
//! Turns the textual output of an external disassembler into the
//! [`Instruction`] records consumed by the validator. Only instruction lines
//! are significant:
//!
//! ```text
//!   4004d6:	48 89 e5             	mov    %rsp,%rbp
//! ```
//!
//! Instructions longer than the disassembler's byte column continue on
//! following lines that carry an address and bytes but no text; their bytes
//! are added to the preceding instruction. Every other line (file header,
//! section banner, symbol label, blank line) is ignored.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::Instruction;

/// Errors while reading a listing
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("line {line}: malformed instruction byte '{byte}'")]
    MalformedByte { line: usize, byte: String },

    #[error("line {line}: instruction has no bytes")]
    MissingBytes { line: usize },

    #[error("line {line}: continuation bytes with no preceding instruction")]
    OrphanContinuation { line: usize },

    #[error("line {line}: continuation starts at {found:#x}, expected {expected:#x}")]
    DetachedContinuation {
        line: usize,
        expected: u64,
        found: u64,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A line that carries an address and instruction bytes
struct ListingLine<'a> {
    address: u64,
    length: u64,
    /// Disassembly text, `None` on continuation lines
    text: Option<&'a str>,
}

impl<'a> ListingLine<'a> {
    /// Parse an instruction line, returning `None` for lines to be skipped.
    fn parse(line: &'a str, line_number: usize) -> Result<Option<Self>, ListingError> {
        let Some((head, rest)) = line.trim_start().split_once(':') else {
            return Ok(None);
        };
        // objdump separates the address from the bytes with a tab; header
        // lines such as "a.o:     file format ..." use spaces.
        let Some(rest) = rest.strip_prefix('\t') else {
            return Ok(None);
        };
        let Ok(address) = u64::from_str_radix(head, 16) else {
            return Ok(None);
        };

        let (bytes, text) = match rest.split_once('\t') {
            Some((bytes, text)) => (bytes, Some(text)),
            None => (rest, None),
        };

        let mut length = 0;
        for byte in bytes.split_whitespace() {
            if byte.len() != 2 || u8::from_str_radix(byte, 16).is_err() {
                return Err(ListingError::MalformedByte {
                    line: line_number,
                    byte: byte.to_string(),
                });
            }
            length += 1;
        }
        if length == 0 {
            return Err(ListingError::MissingBytes { line: line_number });
        }

        let text = text
            .map(|text| text.split_once('#').map_or(text, |(code, _)| code).trim())
            .filter(|text| !text.is_empty());

        Ok(Some(Self {
            address,
            length,
            text,
        }))
    }
}

/// Parse an objdump listing into instruction records
pub fn parse_listing(source: &str) -> Result<Vec<Instruction>, ListingError> {
    let mut instructions: Vec<Instruction> = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let Some(parsed) = ListingLine::parse(line, line_number)? else {
            continue;
        };

        match parsed.text {
            Some(text) => instructions.push(Instruction::new(parsed.address, parsed.length, text)),
            None => {
                let previous = instructions
                    .last_mut()
                    .ok_or(ListingError::OrphanContinuation { line: line_number })?;
                if parsed.address != previous.end() {
                    return Err(ListingError::DetachedContinuation {
                        line: line_number,
                        expected: previous.end(),
                        found: parsed.address,
                    });
                }
                previous.length += parsed.length;
            }
        }
    }

    Ok(instructions)
}

/// Read and parse an objdump listing from a file
pub fn read_listing(path: impl AsRef<Path>) -> Result<Vec<Instruction>, ListingError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ListingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_listing(&source)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn test_parse_instruction_lines() {
        let listing = indoc! {"

            a.o:     file format elf64-x86-64


            Disassembly of section .text:

            0000000000000000 <f>:
               0:\t55                   \tpush   %rbp
               1:\t48 89 e5             \tmov    %rsp,%rbp
               4:\tc3                   \tretq
        "};
        let instructions = parse_listing(listing).unwrap();

        assert_eq!(
            instructions,
            vec![
                Instruction::new(0, 1, "push   %rbp"),
                Instruction::new(1, 3, "mov    %rsp,%rbp"),
                Instruction::new(4, 1, "retq"),
            ]
        );
    }

    #[test]
    fn test_continuation_extends_previous() {
        let listing = indoc! {"
               0:\t48 c7 c0 00 00 00 00 \tmov    $0x0,%rax
               7:\t66 2e 0f 1f 84 00 00 \tnopw   %cs:0x0(%rax,%rax,1)
               e:\t00 00 00
              11:\t90                   \tnop
        "};
        let instructions = parse_listing(listing).unwrap();

        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[1].address, 7);
        assert_eq!(instructions[1].length, 10);
        assert_eq!(instructions[2].address, 0x11);
    }

    #[test]
    fn test_strips_comments() {
        let listing = "   0:\t48 8b 05 00 00 00 00 \tmov    0x0(%rip),%rax        # 7 <f+0x7>\n";
        let instructions = parse_listing(listing).unwrap();
        assert_eq!(instructions[0].text, "mov    0x0(%rip),%rax");
    }

    #[test]
    fn test_orphan_continuation() {
        let listing = "   0:\t00 00 00 \n";
        assert!(matches!(
            parse_listing(listing),
            Err(ListingError::OrphanContinuation { line: 1 })
        ));
    }

    #[test]
    fn test_detached_continuation() {
        let listing = indoc! {"
               0:\t90                   \tnop
               4:\t00 00
        "};
        assert!(matches!(
            parse_listing(listing),
            Err(ListingError::DetachedContinuation {
                line: 2,
                expected: 1,
                found: 4,
            })
        ));
    }

    #[test]
    fn test_malformed_byte() {
        let listing = "   0:\t9g                   \tnop\n";
        assert!(matches!(
            parse_listing(listing),
            Err(ListingError::MalformedByte { line: 1, ref byte }) if byte == "9g"
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.lst");
        assert!(matches!(read_listing(&path), Err(ListingError::Io { .. })));
    }
}
