use crate::ast::{Expr, FunctionDecl, Program, Stmt};
use crate::environment::Environment;
use crate::error::{SlateError, Span};
use crate::io::{InputSource, OutputBuffer};
use crate::ops;
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;
use std::rc::Rc;
use tracing::{debug, trace};

/// Nested user-function calls allowed before a call fails with a stack overflow.
pub const MAX_CALL_DEPTH: usize = 200;

/// Result of executing a statement.
///
/// `Break` and `Continue` are consumed by the nearest enclosing loop; `Return`
/// travels through loops and blocks until the nearest function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    environment: Environment,
    output: OutputBuffer,
    input: InputSource,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_input(InputSource::Stdin)
    }

    pub fn with_input(input: InputSource) -> Self {
        Self {
            environment: Environment::new(),
            output: OutputBuffer::new(),
            input,
            call_depth: 0,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn output(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    /// Capture everything printed so far and reset the output buffer.
    pub fn take_output(&mut self) -> String {
        self.output.take()
    }

    /// Replace the input source, handing back the previous one.
    pub fn set_input(&mut self, input: InputSource) -> InputSource {
        std::mem::replace(&mut self.input, input)
    }

    /// Execute a program. The value is that of the last top-level statement,
    /// or the value of a top-level `return`.
    pub fn run(&mut self, program: &Program) -> Result<Value, SlateError> {
        debug!(statements = program.statements.len(), "interpreting program");
        let mut last = Value::Null;

        for statement in &program.statements {
            match self.execute(statement)? {
                Flow::Normal(value) => last = value,
                Flow::Return(value) => return Ok(value),
                Flow::Break => return Err(outside_loop("break", statement.span())),
                Flow::Continue => return Err(outside_loop("continue", statement.span())),
            }
        }

        Ok(last)
    }

    /// Run with `input()` reading from `input`; the previous source is
    /// restored afterwards whether or not the run succeeds.
    pub fn run_with_input(&mut self, program: &Program, input: &str) -> Result<Value, SlateError> {
        let previous = self.set_input(InputSource::from_text(input));
        let result = self.run(program);
        self.input = previous;
        result
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow, SlateError> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, SlateError> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Flow, SlateError> {
        trace!(span = ?stmt.span(), "execute");
        match stmt {
            Stmt::VarDecl {
                name,
                annotation,
                initializer,
                span,
            } => {
                let value = self.evaluate(initializer)?;
                let value = self
                    .environment
                    .declare(name, value, *annotation, false, *span)?;
                Ok(Flow::Normal(value))
            }
            Stmt::ConstDecl {
                name,
                annotation,
                initializer,
                span,
            } => {
                let value = self.evaluate(initializer)?;
                self.environment
                    .declare(name, value, *annotation, true, *span)?;
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Assign { name, value, span } => {
                let value = self.evaluate(value)?;
                self.environment.assign(name, value.clone(), *span)?;
                Ok(Flow::Normal(value))
            }
            Stmt::IndexAssign {
                name,
                index,
                value,
                span,
            } => {
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                self.environment.check_mutable(name, *span)?;

                match self.environment.get_mut(name) {
                    Some(Value::Array(items)) => {
                        let i = ops::index(items.len(), &index, name, *span)?;
                        items[i] = value.clone();
                        Ok(Flow::Normal(value))
                    }
                    Some(other) => Err(not_an_array(name, other, *span)),
                    None => Err(undefined_variable(name, *span)),
                }
            }
            Stmt::Expression { expr, .. } => Ok(Flow::Normal(self.evaluate(expr)?)),
            Stmt::Block { statements, .. } => {
                for statement in statements {
                    match self.execute(statement)? {
                        Flow::Normal(_) => {}
                        signal => return Ok(signal),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                let condition = self.evaluate(condition)?;
                if ops::condition(condition, "if", *span)? {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal(Value::Null))
                }
            }
            Stmt::While {
                condition,
                body,
                span,
            } => {
                loop {
                    let value = self.evaluate(condition)?;
                    if !ops::condition(value, "while", *span)? {
                        break;
                    }
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Normal(_) | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                span,
            } => {
                if let Some(initializer) = initializer {
                    if let signal @ (Flow::Break | Flow::Continue | Flow::Return(_)) =
                        self.execute(initializer)?
                    {
                        return Ok(signal);
                    }
                }

                loop {
                    if let Some(condition) = condition {
                        let value = self.evaluate(condition)?;
                        if !ops::condition(value, "for", *span)? {
                            break;
                        }
                    }

                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Normal(_) | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }

                    // `continue` still runs the increment
                    if let Some(increment) = increment {
                        if let ret @ Flow::Return(_) = self.execute(increment)? {
                            return Ok(ret);
                        }
                    }
                }
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Function(decl) => {
                self.environment.check_mutable(&decl.name, decl.span)?;
                self.environment
                    .bind(&decl.name, Value::Function(Rc::clone(decl)));
                Ok(Flow::Normal(Value::Null))
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
            Stmt::Print { expr, .. } => {
                let value = self.evaluate(expr)?;
                self.output.write_line(&value.to_string());
                Ok(Flow::Normal(Value::Null))
            }
        }
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, SlateError> {
        match expr {
            Expr::Integer { value, .. } => Ok(Value::Int(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Boolean { value, .. } => Ok(Value::Bool(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::Null { .. } => Ok(Value::Null),
            Expr::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element)?);
                }
                Ok(Value::Array(items))
            }
            Expr::Variable { name, span } => self
                .environment
                .get(name)
                .cloned()
                .ok_or_else(|| undefined_variable(name, *span)),
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                ops::binary(*operator, left, right, *span)
            }
            Expr::Unary {
                operator,
                operand,
                span,
            } => {
                let operand = self.evaluate(operand)?;
                ops::unary(*operator, operand, *span)
            }
            Expr::Update {
                name,
                operator,
                span,
            } => self.environment.update(name, *operator, *span),
            Expr::Index { name, index, span } => {
                let index = self.evaluate(index)?;
                match self.environment.get(name) {
                    Some(Value::Array(items)) => {
                        let i = ops::index(items.len(), &index, name, *span)?;
                        Ok(items[i].clone())
                    }
                    Some(other) => Err(not_an_array(name, other, *span)),
                    None => Err(undefined_variable(name, *span)),
                }
            }
            Expr::Call { name, args, span } => self.call(name, args, *span),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr], span: Span) -> Result<Value, SlateError> {
        // Built-ins shadow user-defined functions
        match name {
            "print" => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                write_values(&mut self.output, &values);
                Ok(Value::Null)
            }
            "input" => {
                if !args.is_empty() {
                    return Err(SlateError::runtime_error_with_help(
                        span,
                        format!("input() takes no arguments, got {}", args.len()),
                        "Usage: set answer = input();".to_string(),
                    ));
                }
                read_input(&mut self.input, span)
            }
            _ => self.call_function(name, args, span),
        }
    }

    fn call_function(&mut self, name: &str, args: &[Expr], span: Span) -> Result<Value, SlateError> {
        let decl = match self.environment.get(name) {
            Some(Value::Function(decl)) => Rc::clone(decl),
            Some(other) => {
                return Err(SlateError::runtime_error(
                    span,
                    format!("'{}' is not a function (found {})", name, other.type_name()),
                ))
            }
            None => {
                return Err(SlateError::runtime_error(
                    span,
                    format!("Undefined function '{}'", name),
                ))
            }
        };

        if args.len() != decl.params.len() {
            return Err(arity_mismatch(&decl.name, decl.params.len(), args.len(), span));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(stack_overflow(span));
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg)?);
        }

        debug!(function = name, depth = self.call_depth, "call");
        let snapshot = self.environment.snapshot();
        for (param, value) in decl.params.iter().zip(values) {
            self.environment.bind_parameter(param, value);
        }

        self.call_depth += 1;
        let result = self.execute_body(&decl);
        self.call_depth -= 1;
        self.environment.restore_after_call(snapshot, &decl.params);

        result
    }

    fn execute_body(&mut self, decl: &FunctionDecl) -> Result<Value, SlateError> {
        for statement in &decl.body {
            match self.execute(statement)? {
                Flow::Normal(_) => {}
                Flow::Return(value) => return Ok(value),
                Flow::Break => return Err(outside_loop("break", statement.span())),
                Flow::Continue => return Err(outside_loop("continue", statement.span())),
            }
        }
        Ok(Value::Null)
    }
}

/// `print` semantics: one line per value, an empty line for no values.
pub(crate) fn write_values(output: &mut OutputBuffer, values: &[Value]) {
    if values.is_empty() {
        output.write_line("");
    }
    for value in values {
        output.write_line(&value.to_string());
    }
}

pub(crate) fn read_input(input: &mut InputSource, span: Span) -> Result<Value, SlateError> {
    let line = input.read_line().map_err(|e| {
        SlateError::runtime_error(span, format!("Failed to read input: {}", e))
    })?;
    Ok(line.map_or(Value::Null, |line| Value::from_input(&line)))
}

pub(crate) fn undefined_variable(name: &str, span: Span) -> SlateError {
    SlateError::runtime_error(span, format!("Undefined variable '{}'", name))
}

pub(crate) fn not_an_array(name: &str, value: &Value, span: Span) -> SlateError {
    SlateError::runtime_error(
        span,
        format!("'{}' is not an array (found {})", name, value.type_name()),
    )
}

pub(crate) fn arity_mismatch(name: &str, expected: usize, found: usize, span: Span) -> SlateError {
    SlateError::runtime_error(
        span,
        format!(
            "Function '{}' expects {} argument(s), got {}",
            name, expected, found
        ),
    )
}

pub(crate) fn stack_overflow(span: Span) -> SlateError {
    SlateError::runtime_error_with_help(
        span,
        format!("Stack overflow: more than {} nested calls", MAX_CALL_DEPTH),
        "Check that recursive functions have a reachable base case.".to_string(),
    )
}

pub(crate) fn outside_loop(keyword: &str, span: Span) -> SlateError {
    SlateError::runtime_error(span, format!("'{}' used outside of a loop", keyword))
}
