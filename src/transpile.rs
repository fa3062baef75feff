//! Source-to-source translation to JavaScript.
//!
//! The output starts with a small prelude so translated programs keep the
//! language's semantics where JavaScript differs. Floats are boxed in
//! `__Float` so that `7.0 / 2` stays a float division, and arithmetic,
//! equality and logic go through helpers that know about the box. `&&` and
//! `||` are eager, and `print`/`input` are line based.
//!
//! Scripts run in sloppy mode: assigning an undeclared name declares it, as
//! in the source language.

use crate::ast::{BinaryOp, Expr, Program, Stmt, TypeAnnotation, UnaryOp, UpdateOp};

const PRELUDE: &str = r#"let __lines = null;
class __Float {
    constructor(value) { this.value = value; }
    valueOf() { return this.value; }
    toString() { return __show(this); }
}
function __float(value) {
    return typeof value === "number" ? new __Float(value) : value;
}
function print(...values) {
    if (values.length === 0) console.log("");
    for (const value of values) console.log(__show(value));
    return null;
}
function input() {
    if (__lines === null) {
        __lines = require("fs").readFileSync(0, "utf8").split(/\r?\n/);
        if (__lines[__lines.length - 1] === "") __lines.pop();
    }
    if (__lines.length === 0) return null;
    const line = __lines.shift();
    const trimmed = line.trim();
    if (/^[+-]?\d+$/.test(trimmed)) return parseInt(trimmed, 10);
    if (trimmed !== "" && !isNaN(Number(trimmed))) return new __Float(Number(trimmed));
    return line;
}
function __show(value) {
    if (value === null) return "null";
    if (value instanceof __Float) {
        const v = value.value;
        if (v === Infinity) return "inf";
        if (v === -Infinity) return "-inf";
        if (Number.isInteger(v)) return v.toFixed(1);
        return String(v);
    }
    if (Array.isArray(value)) return "[" + value.map(__show).join(", ") + "]";
    if (typeof value === "function") return "<function " + value.name + ">";
    return String(value);
}
function __isFloat(a, b) { return a instanceof __Float || b instanceof __Float; }
function __isNumber(value) { return typeof value === "number" || value instanceof __Float; }
function __arith(a, b, op) {
    const value = op(Number(a), Number(b));
    return __isFloat(a, b) ? new __Float(value) : value;
}
function __add(a, b) {
    if (typeof a === "string" || typeof b === "string") return __show(a) + __show(b);
    return __arith(a, b, (x, y) => x + y);
}
function __sub(a, b) { return __arith(a, b, (x, y) => x - y); }
function __mul(a, b) { return __arith(a, b, (x, y) => x * y); }
function __div(a, b) {
    if (__isFloat(a, b)) return new __Float(Number(a) / Number(b));
    if (b === 0) throw new Error("Division by zero");
    return Math.trunc(a / b);
}
function __mod(a, b) {
    if (__isFloat(a, b)) return new __Float(Number(a) % Number(b));
    if (b === 0) throw new Error("Division by zero");
    return a % b;
}
function __neg(a) { return a instanceof __Float ? new __Float(-a.value) : -a; }
function __eq(a, b) {
    if (__isNumber(a) && __isNumber(b)) return Number(a) === Number(b);
    if (Array.isArray(a) && Array.isArray(b)) {
        return a.length === b.length && a.every((item, i) => __eq(item, b[i]));
    }
    return a === b;
}
function __bool(value, op) {
    if (typeof value === "boolean") return value;
    if (value === null) return false;
    if (__isNumber(value)) return Number(value) !== 0;
    if (value === "true" || value === "false") return value === "true";
    const type = Array.isArray(value) ? "array" : typeof value;
    throw new Error("Operator '" + op + "' cannot convert " + type + " to bool");
}
function __and(a, b) { return __bool(a, "&&") && __bool(b, "&&"); }
function __or(a, b) { return __bool(a, "||") || __bool(b, "||"); }
"#;

struct Emitter {
    out: String,
    indent: usize,
}

impl Emitter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                name,
                annotation,
                initializer,
                ..
            } => self.line(&format!("let {} = {};", name, initial(*annotation, initializer))),
            Stmt::ConstDecl {
                name,
                annotation,
                initializer,
                ..
            } => self.line(&format!("const {} = {};", name, initial(*annotation, initializer))),
            Stmt::Assign { name, value, .. } => {
                self.line(&format!("{} = {};", name, expr(value)))
            }
            Stmt::IndexAssign {
                name, index, value, ..
            } => self.line(&format!("{}[{}] = {};", name, expr(index), expr(value))),
            Stmt::Expression { expr: e, .. } => self.line(&format!("{};", expr(e))),
            Stmt::Block { statements, .. } => {
                self.line("{");
                self.body(statements);
                self.line("}");
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.line(&format!("if ({}) {{", expr(condition)));
                self.nested(then_branch);
                match else_branch {
                    Some(else_branch) => {
                        self.line("} else {");
                        self.nested(else_branch);
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.line(&format!("while ({}) {{", expr(condition)));
                self.nested(body);
                self.line("}");
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                // Lowered to a while loop so the clauses can hold any statement
                self.line("{");
                self.indent += 1;
                if let Some(initializer) = initializer {
                    self.stmt(initializer);
                }
                let condition = condition.as_ref().map_or("true".to_string(), expr);
                let first = "__first";
                self.line(&format!("let {} = true;", first));
                self.line("while (true) {");
                self.indent += 1;
                if let Some(increment) = increment {
                    self.line(&format!("if (!{}) {{", first));
                    self.indent += 1;
                    self.stmt(increment);
                    self.indent -= 1;
                    self.line("}");
                }
                self.line(&format!("{} = false;", first));
                self.line(&format!("if (!({})) break;", condition));
                self.nested(body);
                self.indent -= 1;
                self.line("}");
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Function(decl) => {
                self.line(&format!(
                    "function {}({}) {{",
                    decl.name,
                    decl.params.join(", ")
                ));
                self.body(&decl.body);
                self.line("}");
            }
            Stmt::Return { value, .. } => match value {
                Some(value) => self.line(&format!("return {};", expr(value))),
                None => self.line("return null;"),
            },
            Stmt::Break { .. } => self.line("break;"),
            Stmt::Continue { .. } => self.line("continue;"),
            Stmt::Print { expr: e, .. } => self.line(&format!("print({});", expr(e))),
        }
    }

    fn body(&mut self, statements: &[Stmt]) {
        self.indent += 1;
        for statement in statements {
            self.stmt(statement);
        }
        self.indent -= 1;
    }

    /// Body of a braced construct; blocks are flattened into the braces.
    fn nested(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements, .. } => self.body(statements),
            other => self.body(std::slice::from_ref(other)),
        }
    }
}

/// A `float` annotation promotes an int initializer.
fn initial(annotation: Option<TypeAnnotation>, initializer: &Expr) -> String {
    match annotation {
        Some(TypeAnnotation::Float) => format!("__float({})", expr(initializer)),
        _ => expr(initializer),
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Integer { value, .. } => value.to_string(),
        Expr::Float { value, .. } => {
            if value.fract() == 0.0 && value.is_finite() {
                format!("__float({:.1})", value)
            } else {
                format!("__float({})", value)
            }
        }
        Expr::Boolean { value, .. } => value.to_string(),
        Expr::Str { value, .. } => string_literal(value),
        Expr::Null { .. } => "null".to_string(),
        Expr::Array { elements, .. } => {
            let items: Vec<String> = elements.iter().map(expr).collect();
            format!("[{}]", items.join(", "))
        }
        Expr::Variable { name, .. } => name.clone(),
        Expr::Binary {
            left,
            operator,
            right,
            ..
        } => {
            let (l, r) = (expr(left), expr(right));
            let helper = match operator {
                BinaryOp::Add => "__add",
                BinaryOp::Subtract => "__sub",
                BinaryOp::Multiply => "__mul",
                BinaryOp::Divide => "__div",
                BinaryOp::Modulo => "__mod",
                BinaryOp::And => "__and",
                BinaryOp::Or => "__or",
                BinaryOp::Equal => "__eq",
                BinaryOp::NotEqual => return format!("!__eq({}, {})", l, r),
                // Relational operators unbox floats through `valueOf`
                other => return format!("({} {} {})", l, other, r),
            };
            format!("{}({}, {})", helper, l, r)
        }
        Expr::Unary {
            operator, operand, ..
        } => match operator {
            UnaryOp::Not => format!("!{}", expr(operand)),
            UnaryOp::Negate => format!("__neg({})", expr(operand)),
        },
        Expr::Update { name, operator, .. } => match operator {
            UpdateOp::Increment => format!("({0} = __add({0}, 1))", name),
            UpdateOp::Decrement => format!("({0} = __sub({0}, 1))", name),
        },
        Expr::Index { name, index, .. } => format!("{}[{}]", name, expr(index)),
        Expr::Call { name, args, .. } => {
            let args: Vec<String> = args.iter().map(expr).collect();
            format!("{}({})", name, args.join(", "))
        }
    }
}

fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a program as a standalone JavaScript file.
pub fn transpile(program: &Program) -> String {
    let mut emitter = Emitter {
        out: String::from(PRELUDE),
        indent: 0,
    };
    emitter.out.push('\n');
    for statement in &program.statements {
        emitter.stmt(statement);
    }
    emitter.out
}

/// Render a single expression, without the prelude.
pub fn transpile_expr(e: &Expr) -> String {
    expr(e)
}
