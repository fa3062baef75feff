use crate::ast::{TypeAnnotation, UpdateOp};
use crate::error::{SlateError, Span};
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Identifier bindings plus the set of names declared with `bind`.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    constants: HashSet<String>,
}

/// State captured before a function call binds its parameters.
#[derive(Debug)]
pub struct CallSnapshot {
    values: HashMap<String, Value>,
    constants: HashSet<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// Bind without any checks.
    pub fn bind(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Bind a call parameter. It hides any constant of the same name until
    /// `restore_after_call` puts the constant back.
    pub fn bind_parameter(&mut self, name: &str, value: Value) {
        self.constants.remove(name);
        self.bind(name, value);
    }

    /// `set`/`bind`: reject redeclaration, check the annotation, then bind.
    /// Returns the bound value (after any int-to-float promotion).
    pub fn declare(
        &mut self,
        name: &str,
        value: Value,
        annotation: Option<TypeAnnotation>,
        constant: bool,
        span: Span,
    ) -> Result<Value, SlateError> {
        if self.contains(name) {
            return Err(SlateError::runtime_error_with_help(
                span,
                format!("Variable '{}' is already declared", name),
                format!("Use '{} = ...' to assign a new value instead.", name),
            ));
        }

        let value = match annotation {
            Some(annotation) => value.conform_to(annotation).map_err(|value| {
                SlateError::runtime_error(
                    span,
                    format!(
                        "Type mismatch for '{}': declared {}, found {}",
                        name,
                        annotation,
                        value.type_name()
                    ),
                )
            })?,
            None => value,
        };

        if constant {
            self.constants.insert(name.to_string());
        }
        self.values.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Plain assignment. The new value must keep the runtime type of the
    /// existing binding (a `null` binding accepts anything); unknown names are
    /// declared implicitly.
    pub fn assign(&mut self, name: &str, value: Value, span: Span) -> Result<(), SlateError> {
        self.check_mutable(name, span)?;

        if let Some(existing) = self.values.get(name) {
            if !matches!(existing, Value::Null) && !existing.same_type(&value) {
                return Err(SlateError::runtime_error(
                    span,
                    format!(
                        "Type mismatch assigning to '{}': expected {}, found {}",
                        name,
                        existing.type_name(),
                        value.type_name()
                    ),
                ));
            }
        }

        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Prefix `++`/`--` on a numeric binding; returns the updated value.
    pub fn update(&mut self, name: &str, operator: UpdateOp, span: Span) -> Result<Value, SlateError> {
        self.check_mutable(name, span)?;

        let (symbol, delta) = match operator {
            UpdateOp::Increment => ("++", 1),
            UpdateOp::Decrement => ("--", -1),
        };

        let slot = self.values.get_mut(name).ok_or_else(|| {
            SlateError::runtime_error(span, format!("Undefined variable '{}'", name))
        })?;
        let updated = match &*slot {
            Value::Int(n) => Value::Int(n.wrapping_add(delta)),
            Value::Float(n) => Value::Float(n + delta as f64),
            other => {
                return Err(SlateError::runtime_error(
                    span,
                    format!(
                        "Cannot apply '{}' to '{}' of type {}",
                        symbol,
                        name,
                        other.type_name()
                    ),
                ))
            }
        };
        *slot = updated.clone();
        Ok(updated)
    }

    pub fn check_mutable(&self, name: &str, span: Span) -> Result<(), SlateError> {
        if self.is_constant(name) {
            return Err(SlateError::runtime_error_with_help(
                span,
                format!("Cannot assign to constant '{}'", name),
                format!("'{}' was declared with 'bind'; use 'set' for variables.", name),
            ));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            values: self.values.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Undo the bindings of a finished call: drop every name the call
    /// introduced and give parameter-shadowed names their pre-call values.
    /// Other pre-existing bindings keep whatever the call assigned to them.
    pub fn restore_after_call(&mut self, snapshot: CallSnapshot, params: &[String]) {
        let CallSnapshot {
            mut values,
            constants,
        } = snapshot;

        self.values.retain(|name, _| values.contains_key(name));
        for param in params {
            if let Some(previous) = values.remove(param) {
                self.values.insert(param.clone(), previous);
            }
        }
        self.constants = constants;
    }
}
