//! End-to-end validation of objdump listings

use indoc::indoc;
use sfi_validator::{Diagnostic, ValidationResult, parse_listing};
use x86_patterns::{Mode, validator};

fn validate(mode: Mode, listing: &str) -> ValidationResult {
    let instructions = parse_listing(listing).unwrap();
    validator(mode).validate(&instructions).unwrap()
}

fn messages(result: &ValidationResult) -> Vec<String> {
    result.diagnostics().iter().map(Diagnostic::to_string).collect()
}

/// 0x1e bytes of padding
const PADDING_64: &str = indoc! {"
       0:\t0f 1f 84 00 00 00 00 \tnopl   0x0(%rax,%rax,1)
       7:\t00
       8:\t0f 1f 84 00 00 00 00 \tnopl   0x0(%rax,%rax,1)
       f:\t00
      10:\t0f 1f 84 00 00 00 00 \tnopl   0x0(%rax,%rax,1)
      17:\t00
      18:\t66 0f 1f 44 00 00    \tnopw   0x0(%rax,%rax,1)
"};

#[test]
fn test_64bit_function_accepted() {
    let listing = indoc! {"

        f.o:     file format elf64-x86-64


        Disassembly of section .text:

        0000000000000000 <f>:
           0:\t55                   \tpush   %rbp
           1:\t48 89 e5             \tmov    %rsp,%rbp
           4:\t89 f8                \tmov    %edi,%eax
           6:\t41 8b 04 87          \tmov    (%r15,%rax,4),%eax
           a:\t83 e1 e0             \tand    $0xffffffe0,%ecx
           d:\t4c 01 f9             \tadd    %r15,%rcx
          10:\tff e1                \tjmpq   *%rcx
          12:\t66 2e 0f 1f 84 00 00 \tnopw   %cs:0x0(%rax,%rax,1)
          19:\t00 00 00
          1c:\t0f 1f 40 00          \tnopl   0x0(%rax)
          20:\teb de                \tjmp    0 <f>
          22:\te8 dd ff ff ff       \tcallq  4 <f+0x4>
    "};
    let result = validate(Mode::X86_64, listing);

    assert!(result.is_ok(), "{:?}", messages(&result));
    assert_eq!(result.units().len(), 9);
    assert_eq!(result.units()[4], 0xa..0x12);
}

#[test]
fn test_64bit_unrestricted_index() {
    let listing = indoc! {"
           0:\t48 89 f8             \tmov    %rdi,%rax
           3:\t41 8b 04 87          \tmov    (%r15,%rax,4),%eax
           7:\tc3                   \tretq
    "};
    let result = validate(Mode::X86_64, listing);

    assert_eq!(
        messages(&result),
        vec![
            "0x3: %rax is restricted required, but no condition holds",
            "0x7: unrecognized instruction 'retq'",
        ]
    );
}

#[test]
fn test_64bit_index_from_other_register() {
    let listing = indoc! {"
           0:\t89 f9                \tmov    %edi,%ecx
           2:\t41 8b 04 87          \tmov    (%r15,%rax,4),%eax
    "};
    let result = validate(Mode::X86_64, listing);

    // A restricted register is a guarantee, not an obligation, so the chunk
    // may end with one
    assert_eq!(
        messages(&result),
        vec!["0x2: %rax is restricted required, but %rcx is restricted holds"]
    );
}

#[test]
fn test_64bit_stack_pointer_rebase() {
    let listing = indoc! {"
           0:\t89 c4                \tmov    %eax,%esp
           2:\t4c 01 fc             \tadd    %r15,%rsp
           5:\t48 83 ec 10          \tsub    $0x10,%rsp
    "};
    let result = validate(Mode::X86_64, listing);
    assert!(result.is_ok(), "{:?}", messages(&result));
}

#[test]
fn test_64bit_jump_to_rebase_is_unsafe() {
    // Entering at the add would skip the 32-bit write it depends on
    let listing = indoc! {"
           0:\t89 c4                \tmov    %eax,%esp
           2:\t4c 01 fc             \tadd    %r15,%rsp
           5:\teb fb                \tjmp    2 <f+0x2>
    "};
    let result = validate(Mode::X86_64, listing);

    assert_eq!(messages(&result), vec!["0x5: jump into a middle of instruction (0x2)"]);
}

#[test]
fn test_64bit_missing_rebase() {
    let listing = indoc! {"
           0:\t89 c4                \tmov    %eax,%esp
           2:\t90                   \tnop
    "};
    let result = validate(Mode::X86_64, listing);

    assert_eq!(
        messages(&result),
        vec!["0x2: no condition required, but %rsp needs sandboxing holds"]
    );
}

#[test]
fn test_64bit_pending_rebase_at_chunk_end() {
    let listing = "   0:\t89 e5                \tmov    %esp,%ebp\n";
    let result = validate(Mode::X86_64, listing);

    assert_eq!(
        messages(&result),
        vec!["0x2: unsafe condition at the end of chunk: %rbp needs sandboxing"]
    );
}

#[test]
fn test_64bit_pending_rebase_at_bundle_end() {
    let listing = format!(
        "{PADDING_64}{}",
        indoc! {"
              1e:\t89 c4                \tmov    %eax,%esp
              20:\t4c 01 fc             \tadd    %r15,%rsp
        "}
    );
    let result = validate(Mode::X86_64, &listing);

    assert_eq!(
        messages(&result),
        vec![
            "0x1e: unsafe condition at the end of bundle: %rsp needs sandboxing",
            "0x20: %rsp needs sandboxing required, but no condition holds",
        ]
    );
}

#[test]
fn test_64bit_instruction_straddles_bundle() {
    let listing = format!(
        "{PADDING_64}{}",
        indoc! {"
              1e:\t48 89 e5             \tmov    %rsp,%rbp
        "}
    );
    let result = validate(Mode::X86_64, &listing);

    assert_eq!(messages(&result), vec!["0x1e: instruction crosses bundle boundary"]);
}

#[test]
fn test_64bit_sandboxed_string_store() {
    let listing = indoc! {"
           0:\t89 ff                \tmov    %edi,%edi
           2:\t49 8d 3c 3f          \tlea    (%r15,%rdi,1),%rdi
           6:\tf3 aa                \trep stos %al,%es:(%rdi)
           8:\tf3 aa                \trep stos %al,%es:(%rdi)
    "};
    let result = validate(Mode::X86_64, listing);

    assert_eq!(result.units().first(), Some(&(0..8)));
    assert_eq!(
        messages(&result),
        vec!["0x8: unrecognized instruction 'rep stos %al,%es:(%rdi)'"]
    );
}

#[test]
fn test_64bit_rejects_system_and_unsandboxed_code() {
    let listing = indoc! {"
           0:\t0f 05                \tsyscall
           2:\t48 8b 03             \tmov    (%rbx),%rax
           5:\t4d 89 c7             \tmov    %r8,%r15
           8:\tff e0                \tjmpq   *%rax
    "};
    let result = validate(Mode::X86_64, listing);

    let offsets: Vec<_> = result.diagnostics().iter().map(|d| d.offset).collect();
    assert_eq!(offsets, vec![0x0, 0x2, 0x5, 0x8]);
}

#[test]
fn test_32bit_function_accepted() {
    let listing = indoc! {"
        00000000 <f>:
           0:\t55                   \tpush   %ebp
           1:\t89 e5                \tmov    %esp,%ebp
           3:\t8b 45 08             \tmov    0x8(%ebp),%eax
           6:\t65 a1 00 00 00 00    \tmov    %gs:0x0,%eax
           c:\t83 e0 e0             \tand    $0xffffffe0,%eax
           f:\tff e0                \tjmp    *%eax
          11:\te8 ea ff ff ff       \tcall   0 <f>
    "};
    let result = validate(Mode::X86_32, listing);

    assert!(result.is_ok(), "{:?}", messages(&result));
    assert_eq!(result.units().len(), 6);
}

#[test]
fn test_32bit_superinstruction_straddles_bundle() {
    let listing = indoc! {"
           0:\t8d b4 26 00 00 00 00 \tlea    0x0(%esi,%eiz,1),%esi
           7:\t00
           8:\t8d b4 26 00 00 00 00 \tlea    0x0(%esi,%eiz,1),%esi
           f:\t00
          10:\t8d b4 26 00 00 00 00 \tlea    0x0(%esi,%eiz,1),%esi
          17:\t00
          18:\t0f 1f 44 00 00       \tnopl   0x0(%eax,%eax,1)
          1d:\t83 e0 e0             \tand    $0xffffffe0,%eax
          20:\tff e0                \tjmp    *%eax
    "};
    let result = validate(Mode::X86_32, listing);

    assert_eq!(messages(&result), vec!["0x1d: superinstruction crosses bundle boundary"]);
}

#[test]
fn test_32bit_jump_into_superinstruction() {
    let listing = indoc! {"
           0:\t83 e0 e0             \tand    $0xffffffe0,%eax
           3:\tff e0                \tjmp    *%eax
           5:\teb fc                \tjmp    3 <f+0x3>
    "};
    let result = validate(Mode::X86_32, listing);

    assert_eq!(messages(&result), vec!["0x5: jump into a middle of instruction (0x3)"]);
}

#[test]
fn test_32bit_rejects_unmasked_and_privileged() {
    let listing = indoc! {"
           0:\tff e0                \tjmp    *%eax
           2:\t8e d8                \tmov    %eax,%ds
           4:\tcd 80                \tint    $0x80
           6:\t64 a1 00 00 00 00    \tmov    %fs:0x0,%eax
    "};
    let result = validate(Mode::X86_32, listing);

    assert_eq!(
        messages(&result),
        vec![
            "0x0: unrecognized instruction 'jmp    *%eax'",
            "0x2: unrecognized instruction 'mov    %eax,%ds'",
            "0x4: unrecognized instruction 'int    $0x80'",
            "0x6: unrecognized instruction 'mov    %fs:0x0,%eax'",
        ]
    );
}

#[test]
fn test_same_listing_both_modes() {
    // 32-bit masking is not enough for the 64-bit sandbox
    let listing = indoc! {"
           0:\t83 e0 e0             \tand    $0xffffffe0,%eax
           3:\tff e0                \tjmp    *%rax
    "};

    let result = validate(Mode::X86_64, listing);
    assert_eq!(messages(&result), vec!["0x3: unrecognized instruction 'jmp    *%rax'"]);
}
