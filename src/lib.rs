// Slate Language Toolchain Library
//
// Lexer, parser, tree-walking interpreter, IL compiler and VM, and a
// JavaScript transpiler for a small dynamically typed teaching language.

use std::sync::Once;

// Public modules
pub mod ast;
pub mod codegen;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod io;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod repl;
pub mod runner;
mod stack;
pub mod transpile;
pub mod value;
pub mod vm;

// Re-export commonly used items
pub use ast::{Expr, Program, Stmt};
pub use codegen::{compile, Chunk, Instr};
pub use environment::Environment;
pub use error::{ErrorKind, SlateError, Span};
pub use interpreter::{Flow, Interpreter};
pub use io::{InputSource, OutputBuffer};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse, Parser};
pub use runner::{execute_source, Backend, Failure};
pub use transpile::transpile;
pub use value::Value;
pub use vm::Vm;

// Re-export main functions
pub use repl::start as start_repl;
pub use repl::start_il as start_il_repl;
pub use runner::run;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Only installs a subscriber when `RUST_LOG`
/// is set, e.g. `RUST_LOG=slate=debug` or `RUST_LOG=slate::vm=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}
