// Parser robustness tests
//
// Table-driven suites of source snippets that must parse, or must fail with
// a message containing the expected text.

use slate::error::{ErrorKind, SlateError};
use slate::parser::parse;

/// Test result for a single test case
#[derive(Debug)]
pub enum TestResult {
    Pass,
    Fail(String),
    Crash(String),
}

/// Individual test case
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    pub should_succeed: bool,
    pub expected_error_contains: Option<String>,
}

/// Test suite containing multiple test cases
#[derive(Debug)]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tests: Vec::new(),
        }
    }

    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Run all tests in this suite
    pub fn run(&self) -> TestSuiteResults {
        let mut results = TestSuiteResults::new(&self.name);

        println!("Running test suite: {}", self.name);
        println!("{}", "=".repeat(50));

        for test in &self.tests {
            let result = run_single_test(test);
            results.add_result(&test.name, result);
        }

        results.print_summary();
        results
    }
}

/// Results for a test suite run
#[derive(Debug)]
pub struct TestSuiteResults {
    pub suite_name: String,
    pub failures: Vec<String>,
    pub passed: usize,
}

impl TestSuiteResults {
    pub fn new(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            failures: Vec::new(),
            passed: 0,
        }
    }

    pub fn add_result(&mut self, test_name: &str, result: TestResult) {
        match result {
            TestResult::Pass => {
                self.passed += 1;
                println!("  ok   {}", test_name);
            }
            TestResult::Fail(msg) => {
                println!("  FAIL {}: {}", test_name, msg);
                self.failures.push(format!("{}: {}", test_name, msg));
            }
            TestResult::Crash(msg) => {
                println!("  CRASH {}: {}", test_name, msg);
                self.failures.push(format!("{}: crashed - {}", test_name, msg));
            }
        }
    }

    pub fn print_summary(&self) {
        println!();
        println!(
            "{}: {} passed, {} failed",
            self.suite_name,
            self.passed,
            self.failures.len()
        );
        println!();
    }
}

/// Run a single test case
fn run_single_test(test: &TestCase) -> TestResult {
    // Catch any panics to detect crashes
    let result = std::panic::catch_unwind(|| parse_input(&test.input));

    match result {
        Ok(parse_result) => match (parse_result, test.should_succeed) {
            (Ok(()), true) => TestResult::Pass,
            (Ok(()), false) => {
                TestResult::Fail("Expected parsing to fail, but it succeeded".to_string())
            }
            (Err(error), false) => match &test.expected_error_contains {
                Some(expected) if !error.message.contains(expected.as_str()) => {
                    TestResult::Fail(format!(
                        "Error message '{}' doesn't contain expected text '{}'",
                        error.message, expected
                    ))
                }
                _ => TestResult::Pass,
            },
            (Err(error), true) => TestResult::Fail(format!(
                "Expected parsing to succeed, but got error: {}",
                error.message
            )),
        },
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic".to_string()
            };
            TestResult::Crash(panic_msg)
        }
    }
}

fn parse_input(input: &str) -> Result<(), SlateError> {
    parse(input).map(|_| ())
}

/// Test case builders for convenience
impl TestCase {
    pub fn should_succeed(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: true,
            expected_error_contains: None,
        }
    }

    pub fn should_fail(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: false,
            expected_error_contains: None,
        }
    }

    pub fn should_fail_with_message(name: &str, input: &str, expected_msg: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            should_succeed: false,
            expected_error_contains: Some(expected_msg.to_string()),
        }
    }
}

// ============================================================================
// Test Suite Creation Functions
// ============================================================================

fn create_malformed_expressions_tests() -> TestSuite {
    let mut suite = TestSuite::new("Malformed Expressions");

    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_paren",
        "(1 + 2",
        "Expected ')', found end of input",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_paren_nested",
        "((1 + 2)",
        "Expected ')'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_closing_paren",
        "1 + 2)",
        "Expected expression, found ')'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "empty_parentheses",
        "()",
        "Expected expression, found ')'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "empty_parentheses_in_expression",
        "1 + ()",
        "Expected expression, found ')'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_bracket",
        "[1, 2",
        "Expected ']'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_opening_brace",
        "{ x = 1",
        "Expected '}', found end of input",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unmatched_closing_brace",
        "x = 1 }",
        "Expected expression, found '}'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "unknown_character",
        "x = @",
        "unknown character '@'",
    ));

    suite
}

fn create_edge_case_tests() -> TestSuite {
    let mut suite = TestSuite::new("Edge Cases");

    suite.add_test(TestCase::should_succeed("empty_input", ""));
    suite.add_test(TestCase::should_succeed("only_whitespace", "   \n\t  "));
    suite.add_test(TestCase::should_succeed("only_comment", "// nothing here"));
    suite.add_test(TestCase::should_fail("unexpected_eof_after_operator", "1 +"));
    suite.add_test(TestCase::should_fail("unexpected_eof_in_expression", "1 + ("));

    let deep_parens = "(".repeat(100) + "1" + &")".repeat(100);
    suite.add_test(TestCase::should_succeed("deeply_nested_parens", &deep_parens));

    suite
}

fn create_operator_tests() -> TestSuite {
    let mut suite = TestSuite::new("Operator Tests");

    suite.add_test(TestCase::should_fail("missing_left_operand", "+ 1"));
    suite.add_test(TestCase::should_fail_with_message(
        "missing_right_operand",
        "1 *",
        "Expected expression after '*', found end of input",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "operator_followed_by_keyword",
        "x = 1 + while",
        "Expected expression after '+', found 'while'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "double_plus_needs_identifier",
        "1 ++ 2",
        "Expected identifier",
    ));
    suite.add_test(TestCase::should_succeed("negated_operand", "1 +- 2"));
    suite.add_test(TestCase::should_succeed("logical", "true && false || true"));
    suite.add_test(TestCase::should_succeed("bitwise", "6 & 3 | 1"));
    suite.add_test(TestCase::should_succeed("comparison_chain", "1 < 2 == true"));
    suite.add_test(TestCase::should_succeed("modulo", "7 % 3"));
    suite.add_test(TestCase::should_succeed("not", "!(1 < 2)"));

    suite
}

fn create_declaration_tests() -> TestSuite {
    let mut suite = TestSuite::new("Declaration Tests");

    suite.add_test(TestCase::should_succeed("set", "set x = 1;"));
    suite.add_test(TestCase::should_succeed("let_alias", "let x = 1;"));
    suite.add_test(TestCase::should_succeed("annotated", "set x: float = 1;"));
    suite.add_test(TestCase::should_succeed("constant", "bind limit: int = 10;"));
    suite.add_test(TestCase::should_fail_with_message(
        "unknown_type",
        "set x: number = 1;",
        "Expected type name, found identifier 'number'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "missing_name",
        "bind = 3;",
        "Expected identifier, found '='",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "missing_initializer",
        "set x 5;",
        "Expected '=', found integer literal 5",
    ));

    suite
}

fn create_control_flow_tests() -> TestSuite {
    let mut suite = TestSuite::new("Control Flow Tests");

    suite.add_test(TestCase::should_succeed("valid_if", "if (true) { x = 1 }"));
    suite.add_test(TestCase::should_succeed("if_else_chain", "if (a) { } else if (b) { } else { }"));
    suite.add_test(TestCase::should_fail_with_message(
        "if_missing_condition",
        "if { x = 1 }",
        "Expected '('",
    ));
    suite.add_test(TestCase::should_fail("if_missing_body", "if (true)"));

    suite.add_test(TestCase::should_succeed("valid_while", "while (true) { x = 1 }"));
    suite.add_test(TestCase::should_fail("while_missing_condition", "while { x = 1 }"));

    suite.add_test(TestCase::should_succeed(
        "valid_for",
        "for (set i = 0; i < 10; i = i + 1) { print(i) }",
    ));
    suite.add_test(TestCase::should_succeed("for_prefix_increment", "for (i = 0; i < 10; ++i) {}"));
    suite.add_test(TestCase::should_succeed("for_empty_clauses", "for (;;) { break; }"));
    suite.add_test(TestCase::should_fail_with_message(
        "for_increment_missing_identifier",
        "for (i = 0; i < 10; ++) {}",
        "Expected identifier, found ')'",
    ));
    suite.add_test(TestCase::should_succeed("break_continue", "while (true) { continue; break; }"));

    suite
}

fn create_literal_tests() -> TestSuite {
    let mut suite = TestSuite::new("Literal Tests");

    suite.add_test(TestCase::should_succeed("integer_literal", "42"));
    suite.add_test(TestCase::should_succeed("float_literal", "3.14"));
    suite.add_test(TestCase::should_succeed("leading_dot_float", ".5"));
    suite.add_test(TestCase::should_succeed("string_literal", "\"hello\""));
    suite.add_test(TestCase::should_succeed("boolean_true", "true"));
    suite.add_test(TestCase::should_succeed("null_literal", "null"));
    suite.add_test(TestCase::should_succeed("empty_array", "[]"));
    suite.add_test(TestCase::should_fail_with_message(
        "multiple_dots",
        "3.14.159",
        "Malformed literal 3.14.159",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "integer_too_large",
        "99999999999999999999",
        "Malformed literal",
    ));
    suite.add_test(TestCase::should_fail("unterminated_string", "\"hello"));

    suite
}

fn create_function_tests() -> TestSuite {
    let mut suite = TestSuite::new("Function Tests");

    suite.add_test(TestCase::should_succeed("simple_call", "foo()"));
    suite.add_test(TestCase::should_succeed("call_with_args", "foo(1, 2, 3)"));
    suite.add_test(TestCase::should_succeed("call_in_expression", "x = foo(1) * 2"));
    suite.add_test(TestCase::should_fail("missing_closing_paren", "foo(1, 2"));
    suite.add_test(TestCase::should_fail_with_message(
        "trailing_comma",
        "foo(1, 2,)",
        "Expected expression, found ')'",
    ));
    suite.add_test(TestCase::should_succeed(
        "declaration",
        "function add(a, b) { return a + b; }",
    ));
    suite.add_test(TestCase::should_succeed("bare_return", "function f() { return; }"));
    suite.add_test(TestCase::should_fail("missing_name", "function (a) {}"));
    suite.add_test(TestCase::should_fail_with_message(
        "duplicate_parameter",
        "function f(a, a) {}",
        "Duplicate parameter 'a'",
    ));
    suite.add_test(TestCase::should_fail_with_message(
        "body_needs_braces",
        "function f(a) return a;",
        "Expected '{'",
    ));

    suite
}

fn create_assignment_tests() -> TestSuite {
    let mut suite = TestSuite::new("Assignment Tests");

    suite.add_test(TestCase::should_succeed("simple_assignment", "x = 1"));
    suite.add_test(TestCase::should_succeed("index_assignment", "xs[0] = 5;"));
    suite.add_test(TestCase::should_succeed("index_expression", "xs[0] + 1;"));
    suite.add_test(TestCase::should_fail("unclosed_index", "xs[0 = 1;"));
    suite.add_test(TestCase::should_fail("missing_value", "x ="));
    suite.add_test(TestCase::should_fail_with_message(
        "invalid_target",
        "1 = x",
        "Expected expression, found '='",
    ));

    suite
}

// ============================================================================
// Main Test Function
// ============================================================================

#[test]
fn comprehensive_parser_tests() {
    let suites = vec![
        create_malformed_expressions_tests(),
        create_edge_case_tests(),
        create_operator_tests(),
        create_declaration_tests(),
        create_control_flow_tests(),
        create_literal_tests(),
        create_function_tests(),
        create_assignment_tests(),
    ];

    let mut failures = Vec::new();
    for suite in suites {
        failures.extend(suite.run().failures);
    }

    assert!(failures.is_empty(), "parser tests failed:\n{}", failures.join("\n"));
}

#[test]
fn malformed_literals_are_lexical_errors() {
    let error = parse("set x = 1.2.3;").unwrap_err();
    assert_eq!(error.kind, ErrorKind::LexError);

    let error = parse("print(\"open").unwrap_err();
    assert_eq!(error.kind, ErrorKind::LexError);
}

#[test]
fn flattened_precedence_tier() {
    use slate::ast::{BinaryOp, Expr, Stmt};

    // `<` and `+` share a tier, so `a < b + c` groups as `(a < b) + c`
    let program = parse("a < b + c;").unwrap();
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Binary { left, operator, .. },
            ..
        } => {
            assert_eq!(*operator, BinaryOp::Add);
            assert!(matches!(
                **left,
                Expr::Binary {
                    operator: BinaryOp::Less,
                    ..
                }
            ));
        }
        other => panic!("unexpected statement: {:?}", other),
    }

    // `*` still binds tighter
    let program = parse("1 + 2 * 3;").unwrap();
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Binary { right, operator, .. },
            ..
        } => {
            assert_eq!(*operator, BinaryOp::Add);
            assert!(matches!(
                **right,
                Expr::Binary {
                    operator: BinaryOp::Multiply,
                    ..
                }
            ));
        }
        other => panic!("unexpected statement: {:?}", other),
    }
}

#[test]
fn identifier_statements_are_disambiguated() {
    use slate::ast::{Expr, Stmt};

    let program = parse("xs[1] = 2; xs[1]; f(1); x = 3; x;").unwrap();
    let statements = &program.statements;
    assert_eq!(statements.len(), 5);
    assert!(matches!(statements[0], Stmt::IndexAssign { .. }));
    assert!(matches!(
        statements[1],
        Stmt::Expression {
            expr: Expr::Index { .. },
            ..
        }
    ));
    assert!(matches!(
        statements[2],
        Stmt::Expression {
            expr: Expr::Call { .. },
            ..
        }
    ));
    assert!(matches!(statements[3], Stmt::Assign { .. }));
    assert!(matches!(
        statements[4],
        Stmt::Expression {
            expr: Expr::Variable { .. },
            ..
        }
    ));
}

#[test]
fn statements_can_be_pulled_one_at_a_time() {
    let mut parser = slate::Parser::from_source("set a = 1; set b = 2;");
    let mut count = 0;
    while !parser.is_at_end() {
        parser.parse_statement().unwrap();
        count += 1;
    }
    assert_eq!(count, 2);
}

#[test]
fn expect_names_both_token_kinds() {
    use slate::lexer::TokenKind;

    let mut parser = slate::Parser::from_source("42");
    let error = parser.expect(TokenKind::Identifier).unwrap_err();
    assert_eq!(error.kind, ErrorKind::ParseError);
    assert_eq!(error.message, "Expected identifier, found integer literal 42");
}

/// Parse on a thread with a small stack, the way an embedding host might.
fn parse_on_small_stack(source: String) -> Result<(), SlateError> {
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || parse_input(&source))
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn nesting_is_limited() {
    let limit = slate::parser::MAX_NESTING;

    let parens = |depth: usize| "(".repeat(depth) + "1" + &")".repeat(depth);
    assert!(parse_on_small_stack(parens(200)).is_ok());

    let error = parse_on_small_stack(parens(1000)).unwrap_err();
    assert_eq!(error.kind, ErrorKind::ParseError);
    assert_eq!(error.message, format!("Nesting deeper than {} levels", limit));

    let blocks = "{".repeat(limit + 1) + &"}".repeat(limit + 1);
    let error = parse_on_small_stack(blocks).unwrap_err();
    assert!(error.message.starts_with("Nesting deeper than"), "{}", error.message);

    let negations = "!".repeat(limit * 2) + "true";
    let error = parse_on_small_stack(negations).unwrap_err();
    assert!(error.message.starts_with("Nesting deeper than"), "{}", error.message);
}
