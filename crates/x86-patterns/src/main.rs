// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bundle sandbox validator CLI
//!
//! Validates the disassembly of a sandboxed module and prints one line per
//! violation.
//!
//! Usage:
//!     objdump -d module.o > module.lst
//!     sfi-validate --64 module.lst
//!
//! Exit status is 0 when the code is accepted, 1 when violations were found
//! and 2 when the listing could not be checked.

use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;
use x86_patterns::{Mode, validate_file};

const USAGE: &str = "Usage: sfi-validate [--32|--64] <listing>";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("sfi-validate - bundle sandbox validator for x86 objdump listings");
        eprintln!();
        eprintln!("{USAGE}");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --32        Validate 32-bit (segment based) sandbox code");
        eprintln!("  --64        Validate 64-bit (%r15 based) sandbox code [default]");
        eprintln!("  --help, -h  Show this help message");
        process::exit(0);
    }

    let mut mode = Mode::X86_64;
    let mut path = None;
    for arg in &args {
        match arg.as_str() {
            "--32" => mode = Mode::X86_32,
            "--64" => mode = Mode::X86_64,
            flag if flag.starts_with('-') => {
                eprintln!("Unknown option: {flag}");
                eprintln!("{USAGE}");
                process::exit(2);
            }
            _ if path.is_some() => {
                eprintln!("{USAGE}");
                process::exit(2);
            }
            _ => path = Some(arg),
        }
    }

    let Some(path) = path else {
        eprintln!("{USAGE}");
        process::exit(2);
    };

    let result = match validate_file(mode, path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    for diagnostic in result.diagnostics() {
        println!("{diagnostic}");
    }

    info!(
        ?mode,
        units = result.units().len(),
        diagnostics = result.diagnostics().len(),
        "validated {path}"
    );

    if !result.is_ok() {
        process::exit(1);
    }
}
