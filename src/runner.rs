use crate::codegen;
use crate::error::SlateError;
use crate::interpreter::Interpreter;
use crate::parser;
use crate::transpile::transpile;
use crate::vm::Vm;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Ways a command-line invocation can fail, each with its own exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    MissingArguments,
    UnknownCommand,
    FileRead,
    Parse,
    Runtime,
}

impl Failure {
    pub fn exit_code(self) -> i32 {
        match self {
            Failure::MissingArguments => 1,
            Failure::UnknownCommand => 2,
            Failure::FileRead => 3,
            Failure::Parse => 4,
            Failure::Runtime => 5,
        }
    }

    /// Lexical and parse errors share a status; everything else is a runtime failure.
    pub fn of(error: &SlateError) -> Self {
        if error.is_runtime() {
            Failure::Runtime
        } else {
            Failure::Parse
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Interpreter,
    Il,
}

/// Parse and execute `source`, returning everything it printed.
/// `input` feeds `input()` calls.
pub fn execute_source(source: &str, input: &str, backend: Backend) -> Result<String, SlateError> {
    let program = parser::parse(source)?;
    match backend {
        Backend::Interpreter => {
            let mut interpreter = Interpreter::new();
            interpreter.run_with_input(&program, input)?;
            Ok(interpreter.take_output())
        }
        Backend::Il => crate::vm::execute(&program, input),
    }
}

/// Execute `source`, print its output, and report any error as a diagnostic.
/// Output produced before a runtime error is still printed.
pub fn run(source: &str, filename: Option<&str>, backend: Backend) -> Result<(), Failure> {
    let program = parser::parse(source).map_err(|error| {
        error.report(source, filename);
        Failure::of(&error)
    })?;
    debug!(statements = program.statements.len(), ?backend, "parsed");

    let (result, output) = match backend {
        Backend::Interpreter => {
            let mut interpreter = Interpreter::new();
            let result = interpreter.run(&program).map(|_| ());
            (result, interpreter.take_output())
        }
        Backend::Il => match codegen::compile(&program) {
            Ok(chunk) => {
                let mut vm = Vm::new();
                let result = vm.run(&chunk);
                (result, vm.take_output())
            }
            Err(error) => (Err(error), String::new()),
        },
    };

    print!("{}", output);
    result.map_err(|error| {
        error.report(source, filename);
        Failure::of(&error)
    })
}

pub fn read_source(path: &Path) -> Result<String, Failure> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("Error reading file '{}': {}", path.display(), e);
        Failure::FileRead
    })
}

pub fn run_file(path: &Path, backend: Backend) -> Result<(), Failure> {
    let source = read_source(path)?;
    run(&source, Some(&path.display().to_string()), backend)
}

/// Print the JavaScript translation of a source file.
pub fn transpile_file(path: &Path) -> Result<(), Failure> {
    let source = read_source(path)?;
    let filename = path.display().to_string();
    let program = parser::parse(&source).map_err(|error| {
        error.report(&source, Some(&filename));
        Failure::of(&error)
    })?;
    print!("{}", transpile(&program));
    Ok(())
}
