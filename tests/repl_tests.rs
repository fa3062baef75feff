use pretty_assertions::assert_eq;
use slate::error::ErrorKind;
use slate::repl::{eval_il_line, eval_interpreter_line};
use slate::runner::{self, Backend, Failure};
use slate::Interpreter;
use std::path::Path;

#[test]
fn interpreter_lines_share_state() {
    let mut interpreter = Interpreter::new();

    assert_eq!(eval_interpreter_line("set x = 10;", &mut interpreter).unwrap(), "10\n");
    assert_eq!(eval_interpreter_line("x + 5", &mut interpreter).unwrap(), "15\n");
    assert_eq!(
        eval_interpreter_line("function sq(n) { return n * n; }", &mut interpreter).unwrap(),
        ""
    );
    assert_eq!(eval_interpreter_line("sq(x)", &mut interpreter).unwrap(), "100\n");
}

#[test]
fn interpreter_lines_echo_output_before_value() {
    let mut interpreter = Interpreter::new();
    assert_eq!(eval_interpreter_line("print(1)", &mut interpreter).unwrap(), "1\n");
    assert_eq!(
        eval_interpreter_line("set y = 2; print(y); y + 1", &mut interpreter).unwrap(),
        "2\n3\n"
    );
}

#[test]
fn interpreter_session_survives_errors() {
    let mut interpreter = Interpreter::new();
    eval_interpreter_line("set total = 1;", &mut interpreter).unwrap();

    let error = eval_interpreter_line("print(2); total / 0", &mut interpreter).unwrap_err();
    assert_eq!(error.kind, ErrorKind::RuntimeError);

    let error = eval_interpreter_line("total +", &mut interpreter).unwrap_err();
    assert_eq!(error.kind, ErrorKind::ParseError);

    // Output printed before the failure is not replayed
    assert_eq!(eval_interpreter_line("total", &mut interpreter).unwrap(), "1\n");
}

#[test]
fn il_lines_echo_bare_expressions() {
    assert_eq!(eval_il_line("1 + 2").unwrap(), "3\n");
    assert_eq!(eval_il_line("print(4)").unwrap(), "4\n");
    assert_eq!(eval_il_line("set x = 10; x * 2").unwrap(), "20\n");
    assert_eq!(eval_il_line("set x = 10;").unwrap(), "");
}

#[test]
fn il_lines_start_from_a_fresh_vm() {
    assert_eq!(eval_il_line("set x = 10;").unwrap(), "");
    let error = eval_il_line("x + 5").unwrap_err();
    assert_eq!(error.message, "Undefined variable 'x'");
}

#[test]
fn exit_codes() {
    let codes: Vec<i32> = [
        Failure::MissingArguments,
        Failure::UnknownCommand,
        Failure::FileRead,
        Failure::Parse,
        Failure::Runtime,
    ]
    .iter()
    .map(|failure| failure.exit_code())
    .collect();
    assert_eq!(codes, vec![1, 2, 3, 4, 5]);
}

#[test]
fn failures_follow_the_error_kind() {
    let lex = slate::parse("1.2.3").unwrap_err();
    let parse = slate::parse("(1").unwrap_err();
    let runtime = runner::execute_source("print(x);", "", Backend::Interpreter).unwrap_err();

    assert_eq!(Failure::of(&lex), Failure::Parse);
    assert_eq!(Failure::of(&parse), Failure::Parse);
    assert_eq!(Failure::of(&runtime), Failure::Runtime);
}

#[test]
fn run_reports_failures() {
    assert_eq!(runner::run("print(1);", None, Backend::Interpreter), Ok(()));
    assert_eq!(runner::run("print(", None, Backend::Il), Err(Failure::Parse));
    assert_eq!(runner::run("print(1 / 0);", None, Backend::Il), Err(Failure::Runtime));
    assert_eq!(
        runner::run_file(Path::new("does/not/exist.sl"), Backend::Interpreter),
        Err(Failure::FileRead)
    );
}
