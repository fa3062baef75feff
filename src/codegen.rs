use crate::ast::{BinaryOp, Expr, Program, Stmt, TypeAnnotation, UnaryOp, UpdateOp};
use crate::error::{SlateError, Span};
use crate::interpreter::outside_loop;
use crate::stack::ensure_sufficient_stack;
use std::collections::HashMap;
use std::fmt;

pub type Ip = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    PushInt(i64),
    PushFloat(f64),
    PushBool(bool),
    PushStr(String),
    PushNull,
    Pop,
    Load(String),
    /// Pops the initializer and declares `name` in the current scope.
    Declare {
        name: String,
        annotation: Option<TypeAnnotation>,
        constant: bool,
    },
    /// Pops a value and assigns it.
    Store(String),
    /// Pops an index, pushes `name[index]`.
    LoadIndex(String),
    /// Pops a value then an index, and writes `name[index]`.
    StoreIndex(String),
    /// Prefix `++`/`--`; pushes the updated value.
    Update {
        name: String,
        operator: UpdateOp,
    },
    MakeArray(usize),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Jump(Ip),
    /// Pops a condition that must be a bool.
    JumpIfFalse {
        target: Ip,
        construct: &'static str,
    },
    Call {
        name: String,
        argc: usize,
    },
    /// Pops `argc` values and writes each as a line.
    Print(usize),
    /// Reads a line; `argc` is checked at run time to match the interpreter.
    Input(usize),
    Return,
    Halt,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instr::PushInt(n) => write!(f, "push_int {}", n),
            Instr::PushFloat(n) => write!(f, "push_float {}", n),
            Instr::PushBool(b) => write!(f, "push_bool {}", b),
            Instr::PushStr(s) => write!(f, "push_str {:?}", s),
            Instr::PushNull => write!(f, "push_null"),
            Instr::Pop => write!(f, "pop"),
            Instr::Load(name) => write!(f, "load {}", name),
            Instr::Declare {
                name,
                annotation,
                constant,
            } => {
                write!(f, "{} {}", if *constant { "bind" } else { "declare" }, name)?;
                if let Some(annotation) = annotation {
                    write!(f, ": {}", annotation)?;
                }
                Ok(())
            }
            Instr::Store(name) => write!(f, "store {}", name),
            Instr::LoadIndex(name) => write!(f, "load_index {}", name),
            Instr::StoreIndex(name) => write!(f, "store_index {}", name),
            Instr::Update { name, operator } => match operator {
                UpdateOp::Increment => write!(f, "inc {}", name),
                UpdateOp::Decrement => write!(f, "dec {}", name),
            },
            Instr::MakeArray(n) => write!(f, "make_array {}", n),
            Instr::Binary(op) => write!(f, "binary {}", op),
            Instr::Unary(UnaryOp::Not) => write!(f, "not"),
            Instr::Unary(UnaryOp::Negate) => write!(f, "neg"),
            Instr::Jump(target) => write!(f, "jump {}", target),
            Instr::JumpIfFalse { target, .. } => write!(f, "jump_if_false {}", target),
            Instr::Call { name, argc } => write!(f, "call {} {}", name, argc),
            Instr::Print(argc) => write!(f, "print {}", argc),
            Instr::Input(argc) => write!(f, "input {}", argc),
            Instr::Return => write!(f, "return"),
            Instr::Halt => write!(f, "halt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub entry: Ip,
    pub params: Vec<String>,
}

/// Compiled program: instructions, the source span of each one, and the
/// entry points of every user function.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Instr>,
    pub spans: Vec<Span>,
    pub functions: HashMap<String, FunctionInfo>,
}

impl Chunk {
    /// Human-readable listing, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut entries: HashMap<Ip, &str> = HashMap::new();
        for (name, info) in &self.functions {
            entries.insert(info.entry, name);
        }

        let mut listing = String::new();
        for (ip, instr) in self.code.iter().enumerate() {
            if let Some(name) = entries.get(&ip) {
                listing.push_str(&format!("{}:\n", name));
            }
            listing.push_str(&format!("{:4}  {}\n", ip, instr));
        }
        listing
    }
}

#[derive(Default)]
struct LoopContext {
    breaks: Vec<Ip>,
    continues: Vec<Ip>,
}

pub struct Codegen {
    chunk: Chunk,
    loops: Vec<LoopContext>,
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            chunk: Chunk::default(),
            loops: Vec::new(),
        }
    }

    pub fn compile(mut self, program: &Program) -> Result<Chunk, SlateError> {
        for statement in &program.statements {
            self.stmt(statement)?;
        }
        let end = program.statements.last().map(|s| s.span()).unwrap_or_default();
        self.emit(Instr::Halt, end);
        tracing::debug!(instructions = self.chunk.code.len(), "compiled IL");
        Ok(self.chunk)
    }

    fn emit(&mut self, instr: Instr, span: Span) -> Ip {
        let pos = self.chunk.code.len();
        self.chunk.code.push(instr);
        self.chunk.spans.push(span);
        pos
    }

    fn here(&self) -> Ip {
        self.chunk.code.len()
    }

    fn patch(&mut self, pos: Ip, target: Ip) {
        match &mut self.chunk.code[pos] {
            Instr::Jump(t) | Instr::JumpIfFalse { target: t, .. } => *t = target,
            _ => unreachable!("patched a non-jump instruction"),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), SlateError> {
        ensure_sufficient_stack(|| self.compile_stmt(stmt))
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), SlateError> {
        ensure_sufficient_stack(|| self.compile_expr(expr))
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), SlateError> {
        match stmt {
            Stmt::VarDecl {
                name,
                annotation,
                initializer,
                span,
            }
            | Stmt::ConstDecl {
                name,
                annotation,
                initializer,
                span,
            } => {
                self.expr(initializer)?;
                self.emit(
                    Instr::Declare {
                        name: name.clone(),
                        annotation: *annotation,
                        constant: matches!(stmt, Stmt::ConstDecl { .. }),
                    },
                    *span,
                );
            }
            Stmt::Assign { name, value, span } => {
                self.expr(value)?;
                self.emit(Instr::Store(name.clone()), *span);
            }
            Stmt::IndexAssign {
                name,
                index,
                value,
                span,
            } => {
                self.expr(index)?;
                self.expr(value)?;
                self.emit(Instr::StoreIndex(name.clone()), *span);
            }
            Stmt::Expression { expr, span } => {
                self.expr(expr)?;
                self.emit(Instr::Pop, *span);
            }
            Stmt::Block { statements, .. } => {
                for statement in statements {
                    self.stmt(statement)?;
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                self.expr(condition)?;
                let skip_then = self.emit(
                    Instr::JumpIfFalse {
                        target: 0,
                        construct: "if",
                    },
                    *span,
                );
                self.stmt(then_branch)?;

                if let Some(else_branch) = else_branch {
                    let skip_else = self.emit(Instr::Jump(0), *span);
                    let else_start = self.here();
                    self.patch(skip_then, else_start);
                    self.stmt(else_branch)?;
                    let end = self.here();
                    self.patch(skip_else, end);
                } else {
                    let end = self.here();
                    self.patch(skip_then, end);
                }
            }
            Stmt::While {
                condition,
                body,
                span,
            } => {
                let start = self.here();
                self.expr(condition)?;
                let exit = self.emit(
                    Instr::JumpIfFalse {
                        target: 0,
                        construct: "while",
                    },
                    *span,
                );

                self.loops.push(LoopContext::default());
                self.stmt(body)?;
                let context = self.loops.pop().unwrap_or_default();

                self.emit(Instr::Jump(start), *span);
                let end = self.here();
                self.patch(exit, end);
                self.close_loop(context, start, end);
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                span,
            } => {
                if let Some(initializer) = initializer {
                    self.stmt(initializer)?;
                }

                let start = self.here();
                let exit = match condition {
                    Some(condition) => {
                        self.expr(condition)?;
                        Some(self.emit(
                            Instr::JumpIfFalse {
                                target: 0,
                                construct: "for",
                            },
                            *span,
                        ))
                    }
                    None => None,
                };

                self.loops.push(LoopContext::default());
                self.stmt(body)?;
                let context = self.loops.pop().unwrap_or_default();

                // `continue` lands on the increment
                let continue_target = self.here();
                if let Some(increment) = increment {
                    self.stmt(increment)?;
                }
                self.emit(Instr::Jump(start), *span);

                let end = self.here();
                if let Some(exit) = exit {
                    self.patch(exit, end);
                }
                self.close_loop(context, continue_target, end);
            }
            Stmt::Function(decl) => {
                let skip = self.emit(Instr::Jump(0), decl.span);
                let entry = self.here();
                self.chunk.functions.insert(
                    decl.name.clone(),
                    FunctionInfo {
                        entry,
                        params: decl.params.clone(),
                    },
                );

                // Loops around the declaration are not visible inside the body
                let outer_loops = std::mem::take(&mut self.loops);
                let body = decl.body.iter().try_for_each(|statement| self.stmt(statement));
                self.loops = outer_loops;
                body?;

                self.emit(Instr::PushNull, decl.span);
                self.emit(Instr::Return, decl.span);
                let end = self.here();
                self.patch(skip, end);
            }
            Stmt::Return { value, span } => {
                match value {
                    Some(value) => self.expr(value)?,
                    None => {
                        self.emit(Instr::PushNull, *span);
                    }
                }
                self.emit(Instr::Return, *span);
            }
            Stmt::Break { span } => {
                let jump = self.emit(Instr::Jump(0), *span);
                match self.loops.last_mut() {
                    Some(context) => context.breaks.push(jump),
                    None => return Err(outside_loop("break", *span)),
                }
            }
            Stmt::Continue { span } => {
                let jump = self.emit(Instr::Jump(0), *span);
                match self.loops.last_mut() {
                    Some(context) => context.continues.push(jump),
                    None => return Err(outside_loop("continue", *span)),
                }
            }
            Stmt::Print { expr, span } => {
                self.expr(expr)?;
                self.emit(Instr::Print(1), *span);
            }
        }
        Ok(())
    }

    fn close_loop(&mut self, context: LoopContext, continue_target: Ip, end: Ip) {
        for jump in context.breaks {
            self.patch(jump, end);
        }
        for jump in context.continues {
            self.patch(jump, continue_target);
        }
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), SlateError> {
        match expr {
            Expr::Integer { value, span } => {
                self.emit(Instr::PushInt(*value), *span);
            }
            Expr::Float { value, span } => {
                self.emit(Instr::PushFloat(*value), *span);
            }
            Expr::Boolean { value, span } => {
                self.emit(Instr::PushBool(*value), *span);
            }
            Expr::Str { value, span } => {
                self.emit(Instr::PushStr(value.clone()), *span);
            }
            Expr::Null { span } => {
                self.emit(Instr::PushNull, *span);
            }
            Expr::Array { elements, span } => {
                for element in elements {
                    self.expr(element)?;
                }
                self.emit(Instr::MakeArray(elements.len()), *span);
            }
            Expr::Variable { name, span } => {
                self.emit(Instr::Load(name.clone()), *span);
            }
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                // No short-circuit: both operands always run, as in the interpreter
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Instr::Binary(*operator), *span);
            }
            Expr::Unary {
                operator,
                operand,
                span,
            } => {
                self.expr(operand)?;
                self.emit(Instr::Unary(*operator), *span);
            }
            Expr::Update {
                name,
                operator,
                span,
            } => {
                self.emit(
                    Instr::Update {
                        name: name.clone(),
                        operator: *operator,
                    },
                    *span,
                );
            }
            Expr::Index { name, index, span } => {
                self.expr(index)?;
                self.emit(Instr::LoadIndex(name.clone()), *span);
            }
            Expr::Call { name, args, span } => match name.as_str() {
                "print" => {
                    for arg in args {
                        self.expr(arg)?;
                    }
                    self.emit(Instr::Print(args.len()), *span);
                    self.emit(Instr::PushNull, *span);
                }
                "input" => {
                    self.emit(Instr::Input(args.len()), *span);
                }
                _ => {
                    for arg in args {
                        self.expr(arg)?;
                    }
                    self.emit(
                        Instr::Call {
                            name: name.clone(),
                            argc: args.len(),
                        },
                        *span,
                    );
                }
            },
        }
        Ok(())
    }
}

/// Compile a parsed program to IL.
pub fn compile(program: &Program) -> Result<Chunk, SlateError> {
    Codegen::new().compile(program)
}
