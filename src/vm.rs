use crate::codegen::{Chunk, Instr, Ip};
use crate::environment::Environment;
use crate::error::{SlateError, Span};
use crate::interpreter::{
    arity_mismatch, not_an_array, read_input, stack_overflow, undefined_variable, write_values,
    MAX_CALL_DEPTH,
};
use crate::io::{InputSource, OutputBuffer};
use crate::ops;
use crate::value::Value;
use tracing::{debug, trace};

struct Frame {
    return_ip: Ip,
    locals: Environment,
}

/// Stack machine executing a compiled `Chunk`.
///
/// Names resolve to the innermost call frame's locals first, then globals.
pub struct Vm {
    stack: Vec<Value>,
    globals: Environment,
    frames: Vec<Frame>,
    output: OutputBuffer,
    input: InputSource,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_input(InputSource::Stdin)
    }

    pub fn with_input(input: InputSource) -> Self {
        Self {
            stack: Vec::with_capacity(256),
            globals: Environment::new(),
            frames: Vec::new(),
            output: OutputBuffer::new(),
            input,
        }
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn take_output(&mut self) -> String {
        self.output.take()
    }

    pub fn set_input(&mut self, input: InputSource) -> InputSource {
        std::mem::replace(&mut self.input, input)
    }

    /// Run with `input()` reading from `input`, restoring the previous source
    /// afterwards.
    pub fn run_with_input(&mut self, chunk: &Chunk, input: &str) -> Result<(), SlateError> {
        let previous = self.set_input(InputSource::from_text(input));
        let result = self.run(chunk);
        self.input = previous;
        result
    }

    pub fn run(&mut self, chunk: &Chunk) -> Result<(), SlateError> {
        debug!(instructions = chunk.code.len(), "running IL");
        self.stack.clear();
        self.frames.clear();

        let result = self.dispatch(chunk);
        if result.is_err() {
            // Leave the VM reusable after a failed run
            self.stack.clear();
            self.frames.clear();
        }
        result
    }

    fn dispatch(&mut self, chunk: &Chunk) -> Result<(), SlateError> {
        let mut ip = 0;

        while let Some(instr) = chunk.code.get(ip) {
            let span = chunk.spans.get(ip).copied().unwrap_or_default();
            trace!(ip, %instr, "dispatch");
            ip += 1;

            match instr {
                Instr::PushInt(n) => self.stack.push(Value::Int(*n)),
                Instr::PushFloat(n) => self.stack.push(Value::Float(*n)),
                Instr::PushBool(b) => self.stack.push(Value::Bool(*b)),
                Instr::PushStr(s) => self.stack.push(Value::Str(s.clone())),
                Instr::PushNull => self.stack.push(Value::Null),
                Instr::Pop => {
                    self.pop(span)?;
                }
                Instr::Load(name) => {
                    let value = self
                        .lookup(name)
                        .cloned()
                        .ok_or_else(|| undefined_variable(name, span))?;
                    self.stack.push(value);
                }
                Instr::Declare {
                    name,
                    annotation,
                    constant,
                } => {
                    let value = self.pop(span)?;
                    let in_call = !self.frames.is_empty();
                    if in_call && self.globals.contains(name) {
                        return Err(SlateError::runtime_error(
                            span,
                            format!("Variable '{}' is already declared", name),
                        ));
                    }
                    self.scope_mut()
                        .declare(name, value, *annotation, *constant, span)?;
                }
                Instr::Store(name) => {
                    let value = self.pop(span)?;
                    self.owner_of_mut(name).assign(name, value, span)?;
                }
                Instr::LoadIndex(name) => {
                    let index = self.pop(span)?;
                    let value = match self.lookup(name) {
                        Some(Value::Array(items)) => {
                            let i = ops::index(items.len(), &index, name, span)?;
                            items[i].clone()
                        }
                        Some(other) => return Err(not_an_array(name, other, span)),
                        None => return Err(undefined_variable(name, span)),
                    };
                    self.stack.push(value);
                }
                Instr::StoreIndex(name) => {
                    let value = self.pop(span)?;
                    let index = self.pop(span)?;
                    let scope = self.owner_of_mut(name);
                    scope.check_mutable(name, span)?;
                    match scope.get_mut(name) {
                        Some(Value::Array(items)) => {
                            let i = ops::index(items.len(), &index, name, span)?;
                            items[i] = value;
                        }
                        Some(other) => return Err(not_an_array(name, other, span)),
                        None => return Err(undefined_variable(name, span)),
                    }
                }
                Instr::Update { name, operator } => {
                    let value = self.owner_of_mut(name).update(name, *operator, span)?;
                    self.stack.push(value);
                }
                Instr::MakeArray(count) => {
                    let items = self.pop_n(*count, span)?;
                    self.stack.push(Value::Array(items));
                }
                Instr::Binary(operator) => {
                    let right = self.pop(span)?;
                    let left = self.pop(span)?;
                    self.stack.push(ops::binary(*operator, left, right, span)?);
                }
                Instr::Unary(operator) => {
                    let operand = self.pop(span)?;
                    self.stack.push(ops::unary(*operator, operand, span)?);
                }
                Instr::Jump(target) => ip = *target,
                Instr::JumpIfFalse { target, construct } => {
                    let condition = self.pop(span)?;
                    if !ops::condition(condition, construct, span)? {
                        ip = *target;
                    }
                }
                Instr::Call { name, argc } => {
                    let function = match chunk.functions.get(name) {
                        Some(function) => function,
                        None if self.lookup(name).is_some() => {
                            return Err(SlateError::runtime_error(
                                span,
                                format!("'{}' is not a function", name),
                            ))
                        }
                        None => {
                            return Err(SlateError::runtime_error(
                                span,
                                format!("Undefined function '{}'", name),
                            ))
                        }
                    };
                    if *argc != function.params.len() {
                        return Err(arity_mismatch(name, function.params.len(), *argc, span));
                    }
                    if self.frames.len() >= MAX_CALL_DEPTH {
                        return Err(stack_overflow(span));
                    }

                    let args = self.pop_n(*argc, span)?;
                    let mut locals = Environment::new();
                    for (param, value) in function.params.iter().zip(args) {
                        locals.bind(param, value);
                    }
                    debug!(function = %name, depth = self.frames.len(), "call");
                    self.frames.push(Frame {
                        return_ip: ip,
                        locals,
                    });
                    ip = function.entry;
                }
                Instr::Print(argc) => {
                    let values = self.pop_n(*argc, span)?;
                    write_values(&mut self.output, &values);
                }
                Instr::Input(argc) => {
                    if *argc != 0 {
                        return Err(SlateError::runtime_error(
                            span,
                            format!("input() takes no arguments, got {}", argc),
                        ));
                    }
                    let value = read_input(&mut self.input, span)?;
                    self.stack.push(value);
                }
                Instr::Return => {
                    let value = self.pop(span)?;
                    match self.frames.pop() {
                        Some(frame) => {
                            ip = frame.return_ip;
                            self.stack.push(value);
                        }
                        // top-level `return` ends the program
                        None => return Ok(()),
                    }
                }
                Instr::Halt => return Ok(()),
            }
        }

        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.locals.get(name))
            .or_else(|| self.globals.get(name))
    }

    /// Scope that new declarations go into.
    fn scope_mut(&mut self) -> &mut Environment {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.locals,
            None => &mut self.globals,
        }
    }

    /// Scope that currently owns `name`, or the declaring scope for a new name.
    fn owner_of_mut(&mut self, name: &str) -> &mut Environment {
        let local = self
            .frames
            .last()
            .map_or(false, |frame| frame.locals.contains(name));
        if !local && self.globals.contains(name) {
            &mut self.globals
        } else {
            self.scope_mut()
        }
    }

    fn pop(&mut self, span: Span) -> Result<Value, SlateError> {
        self.stack
            .pop()
            .ok_or_else(|| SlateError::runtime_error(span, "IL stack underflow".to_string()))
    }

    fn pop_n(&mut self, count: usize, span: Span) -> Result<Vec<Value>, SlateError> {
        if self.stack.len() < count {
            return Err(SlateError::runtime_error(span, "IL stack underflow".to_string()));
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }
}

/// Compile and execute a program on a fresh VM, returning its output.
pub fn execute(program: &crate::ast::Program, input: &str) -> Result<String, SlateError> {
    let chunk = crate::codegen::compile(program)?;
    let mut vm = Vm::new();
    vm.run_with_input(&chunk, input)?;
    Ok(vm.take_output())
}
