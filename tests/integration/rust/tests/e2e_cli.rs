//! End-to-End CLI Tests
//!
//! Program files written to disk, loaded through `vm_cli::Runner` with
//! parsed command-line arguments, and run to completion or fault.

use std::path::{Path, PathBuf};

use bytecode_system::{ClassBuilder, MemoryContext, MethodBuilder, Opcode, ParamType, TrapId};
use clap::Parser;
use integration_tests::program;
use tempfile::TempDir;
use vm_cli::{Cli, CliError, Command, RunArgs, Runner};

const LOCL: MemoryContext = MemoryContext::Locl;

fn run_args(argv: &[&str]) -> RunArgs {
    let mut full = vec!["stackvm", "run"];
    full.extend_from_slice(argv);
    match Cli::try_parse_from(full).unwrap().command {
        Command::Run(args) => args,
    }
}

fn save(dir: &TempDir, classes: Vec<ClassBuilder>) -> PathBuf {
    let path = dir.path().join("program.obe");
    program(classes).unwrap().save(&path).unwrap();
    path
}

/// Main calls `Down(depth)`, which recurses until its argument reaches 0.
fn recursion(depth: i64) -> Vec<ClassBuilder> {
    let main = MethodBuilder::new("Main:,")
        .emit_operand(Opcode::LoadIntLit, depth)
        .emit_operand(Opcode::LoadIntLit, 0)
        .call(1, 0)
        .emit(Opcode::Rtrn);
    let down = MethodBuilder::new("Down:i,")
        .param(ParamType::Int)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit_operand(Opcode::LoadIntLit, 0)
        .emit(Opcode::EqlInt)
        .jump_if(1, 1)
        .emit_operand(Opcode::LoadIntLit, 1)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit(Opcode::SubInt)
        .emit_operand(Opcode::LoadIntLit, 0)
        .call(1, 0)
        .label(1)
        .emit(Opcode::Rtrn);
    vec![
        ClassBuilder::new("Main").method(main),
        ClassBuilder::new("Recurse").method(down),
    ]
}

fn run_file(path: &Path) -> Result<(), CliError> {
    Runner::load(&run_args(&[path.to_str().unwrap()]))?.run()
}

#[test]
fn test_deepest_allowed_nesting_runs() {
    // Down(1023) leaves 1024 frames above Main
    let dir = TempDir::new().unwrap();
    let path = save(&dir, recursion(1023));
    run_file(&path).unwrap();
}

#[test]
fn test_one_frame_too_deep_overflows() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, recursion(1024));

    let err = run_file(&path).unwrap_err();
    let report = err.to_string();

    assert_eq!(err.exit_code(), 1);
    assert!(!err.is_exit());
    assert!(report.starts_with(">>> call stack bounds have been exceeded <<<"));
    assert!(report.contains("Unwinding local stack:"));
    assert!(report.contains("Recurse:Down:i,"));
}

#[test]
fn test_exit_trap_sets_status() {
    let dir = TempDir::new().unwrap();
    let main = MethodBuilder::new("Main:,")
        .emit_operand(Opcode::LoadIntLit, 5)
        .trap(TrapId::Exit, 1)
        .emit(Opcode::Rtrn);
    let path = save(&dir, vec![ClassBuilder::new("Main").method(main)]);

    let err = run_file(&path).unwrap_err();
    assert!(err.is_exit());
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn test_program_output_and_arguments() {
    let dir = TempDir::new().unwrap();
    let main = MethodBuilder::new("Main:o.System.String*,")
        .param(ParamType::ObjectArray)
        .emit_var(Opcode::StorLoclIntVar, 0, LOCL)
        .emit_var(Opcode::LoadLoclIntVar, 0, LOCL)
        .emit(Opcode::LoadArySize)
        .trap(TrapId::StdOutInt, 1)
        .emit(Opcode::Rtrn);
    let path = save(&dir, vec![ClassBuilder::new("Main").method(main)]);

    let runner = Runner::load(&run_args(&[path.to_str().unwrap(), "x", "-y", "z"])).unwrap();
    let output = runner.runtime().capture_stdout();
    runner.run().unwrap();

    assert_eq!(String::from_utf8_lossy(&output.lock()), "3");
}

#[test]
fn test_gc_flags_reach_the_runtime() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, recursion(3));

    let runner = Runner::load(&run_args(&["--gc-threshold", "8k", path.to_str().unwrap()])).unwrap();
    assert_eq!(runner.runtime().memory().config().threshold, 8 * 1024);
    runner.run().unwrap();
}

#[test]
fn test_corrupt_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("junk.obe");
    std::fs::write(&path, b"SVM").unwrap();

    let err = run_file(&path).unwrap_err();
    assert!(matches!(err, CliError::Load(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().starts_with("unable to load program"));
}
