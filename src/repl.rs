use crate::ast::{Expr, Program, Stmt};
use crate::codegen;
use crate::interpreter::Interpreter;
use crate::parser;
use crate::value::Value;
use crate::vm::Vm;
use std::io::{self, Write};

/// Interpreter REPL. One interpreter lives for the whole session, so
/// declarations from earlier lines stay visible.
pub fn start() {
    println!("Slate Interpreter v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+D to quit");
    println!();

    let mut interpreter = Interpreter::new();
    read_lines(|line| run_interpreter_line(line, &mut interpreter));
}

/// IL REPL. Every line is compiled and executed on a brand-new VM; nothing
/// carries over between lines.
pub fn start_il() {
    println!("Slate IL REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Each line runs on a fresh VM. Type 'exit' or press Ctrl+D to quit");
    println!();

    read_lines(run_il_line);
}

fn read_lines(mut handle: impl FnMut(&str)) {
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF reached (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }
                handle(line);
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}

/// Run one line against a persistent interpreter and return what to show:
/// printed output followed by the line's value when it has one.
pub fn eval_interpreter_line(
    source: &str,
    interpreter: &mut Interpreter,
) -> Result<String, crate::SlateError> {
    let program = parser::parse(source)?;
    let result = interpreter.run(&program);
    let mut shown = interpreter.take_output();

    match result? {
        Value::Null => {}
        value => {
            shown.push_str(&value.to_string());
            shown.push('\n');
        }
    }
    Ok(shown)
}

fn run_interpreter_line(source: &str, interpreter: &mut Interpreter) {
    match eval_interpreter_line(source, interpreter) {
        Ok(shown) => print!("{}", shown),
        Err(error) => error.report(source, None),
    }
}

/// Compile and run one line on a fresh VM. Bare expression statements are
/// turned into print statements so their values are echoed.
pub fn eval_il_line(source: &str) -> Result<String, crate::SlateError> {
    let program = echo_expressions(parser::parse(source)?);
    let chunk = codegen::compile(&program)?;
    let mut vm = Vm::new();
    vm.run(&chunk)?;
    Ok(vm.take_output())
}

fn run_il_line(source: &str) {
    match eval_il_line(source) {
        Ok(shown) => print!("{}", shown),
        Err(error) => error.report(source, None),
    }
}

fn echo_expressions(program: Program) -> Program {
    let statements = program
        .statements
        .into_iter()
        .map(|statement| match statement {
            Stmt::Expression { expr, span } if !is_print_call(&expr) => Stmt::Print { expr, span },
            other => other,
        })
        .collect();
    Program { statements }
}

fn is_print_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { name, .. } if name == "print")
}
