use pretty_assertions::assert_eq;
use slate::ast::Stmt;
use slate::transpile::{transpile, transpile_expr};
use slate::{execute_source, parse, Backend};
use std::process::Command;

fn js(source: &str) -> String {
    transpile(&parse(source).unwrap())
}

/// The translated program without the prelude.
fn body(source: &str) -> String {
    let output = js(source);
    let start = output
        .find("function __or")
        .and_then(|at| output[at..].find('\n').map(|end| at + end + 1))
        .expect("prelude present");
    output[start..].trim_start().to_string()
}

fn expression(source: &str) -> String {
    match parse(source).unwrap().statements.remove(0) {
        Stmt::Expression { expr, .. } => transpile_expr(&expr),
        other => panic!("not an expression statement: {:?}", other),
    }
}

#[test]
fn output_starts_with_the_prelude() {
    let output = js("print(1);");
    assert!(output.starts_with("let __lines = null;\n"));
    for helper in [
        "class __Float",
        "function print(",
        "function input(",
        "function __add(",
        "function __div(",
        "function __mod(",
        "function __eq(",
        "function __and(",
        "function __or(",
    ] {
        assert!(output.contains(helper), "missing {}", helper);
    }
}

#[test]
fn declarations() {
    assert_eq!(
        body("set x = 10; bind y: int = 2; x = x + y;"),
        "let x = 10;\nconst y = 2;\nx = __add(x, y);\n"
    );
    assert_eq!(body("set f: float = 3;"), "let f = __float(3);\n");
}

#[test]
fn operators_go_through_helpers() {
    assert_eq!(expression("a / b;"), "__div(a, b)");
    assert_eq!(expression("a % b;"), "__mod(a, b)");
    assert_eq!(expression("a && b || c;"), "__or(__and(a, b), c)");
    assert_eq!(expression("a == b;"), "__eq(a, b)");
    assert_eq!(expression("a != b;"), "!__eq(a, b)");
    assert_eq!(expression("a & b | c;"), "((a & b) | c)");
}

#[test]
fn grouping_is_explicit() {
    assert_eq!(expression("1 + 2 * 3;"), "__add(1, __mul(2, 3))");
    assert_eq!(expression("a < b + c;"), "__add((a < b), c)");
    assert_eq!(expression("!done;"), "!done");
    assert_eq!(expression("-x;"), "__neg(x)");
}

#[test]
fn floats_are_boxed() {
    assert_eq!(expression("7.0 / 2;"), "__div(__float(7.0), 2)");
    assert_eq!(expression("[1, 2.5, null, true];"), "[1, __float(2.5), null, true]");
}

#[test]
fn string_literals_are_escaped() {
    assert_eq!(expression(r#""say \"hi\"\n";"#), r#""say \"hi\"\n""#);
}

#[test]
fn control_flow() {
    assert_eq!(
        body("if (x > 1) { print(x); } else { print(0); }"),
        "if ((x > 1)) {\n    print(x);\n} else {\n    print(0);\n}\n"
    );
    assert_eq!(
        body("while (i < 3) { ++i; }"),
        "while ((i < 3)) {\n    (i = __add(i, 1));\n}\n"
    );
}

#[test]
fn for_loops_are_lowered() {
    let expected = "\
{
    let i = 0;
    let __first = true;
    while (true) {
        if (!__first) {
            (i = __add(i, 1));
        }
        __first = false;
        if (!((i < 3))) break;
        if (__eq(i, 1)) {
            continue;
        }
        print(i);
    }
}
";
    assert_eq!(
        body("for (set i = 0; i < 3; ++i) { if (i == 1) { continue; } print(i); }"),
        expected
    );
}

#[test]
fn functions() {
    assert_eq!(
        body("function add(a, b) { return a + b; } function nothing() { return; }"),
        "function add(a, b) {\n    return __add(a, b);\n}\nfunction nothing() {\n    return null;\n}\n"
    );
}

/// Programs whose JavaScript translation must print what the interpreter prints.
const NODE_PROGRAMS: &[&str] = &[
    "print(7.0 / 2); print(7 / 2); print(-7 / 2); print(7 % 3); print(7.5 % 2);",
    "set f: float = 3; print(f); print(f / 2); print(1 + 2.5); print(2 * 1.5); print(0.5 - 1); print(1.0 / 0);",
    r#"print("n = " + 5); print("x" + 2.0); print([1, 2.5, "a", null]); print();"#,
    r#"print(1 == 1.0); print([1, 2] == [1, 2]); print(1 && 0); print(null || "true"); print(1 < 2.5); print(2 != 2.0);"#,
    "set x = 1.5; ++x; print(x); set y = 1.0; --y; print(y); set n = 3; ++n; print(n);",
    "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); } print(fib(15));",
    "set sum = 0; for (set i = 0; i < 6; ++i) { if (i % 2 == 0) { continue; } sum = sum + i; } print(sum);",
    "set i = 0; while (true) { if (i == 3) { break; } i = i + 1; } print(i);",
    "function double(x) { return x * 2.0; } set xs = [1, 2]; xs[1] = double(xs[0]); print(xs); print(double);",
];

/// Run `source` through node, or `None` when node is not installed.
fn run_under_node(source: &str, index: usize) -> Option<String> {
    let path = std::env::temp_dir().join(format!(
        "slate-transpile-{}-{}.js",
        std::process::id(),
        index
    ));
    std::fs::write(&path, js(source)).unwrap();
    let output = Command::new("node").arg(&path).output();
    let _ = std::fs::remove_file(&path);

    let output = output.ok()?;
    assert!(
        output.status.success(),
        "node failed on {}:\n{}",
        source,
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8(output.stdout).unwrap())
}

#[test]
fn node_prints_what_the_interpreter_prints() {
    for (index, source) in NODE_PROGRAMS.iter().enumerate() {
        let expected = execute_source(source, "", Backend::Interpreter).unwrap();
        match run_under_node(source, index) {
            Some(actual) => assert_eq!(actual, expected, "{}", source),
            None => {
                eprintln!("node not found, skipping translated program checks");
                return;
            }
        }
    }
}
