use crate::ast::{FunctionDecl, TypeAnnotation};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Function(Rc<FunctionDecl>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    /// Whether two values have the same runtime type, used by assignment.
    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Check this value against a declared annotation. `float` also accepts
    /// integers, which are promoted.
    pub fn conform_to(self, annotation: TypeAnnotation) -> Result<Value, Value> {
        match (annotation, self) {
            (TypeAnnotation::Int, v @ Value::Int(_)) => Ok(v),
            (TypeAnnotation::Float, v @ Value::Float(_)) => Ok(v),
            (TypeAnnotation::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
            (TypeAnnotation::Bool, v @ Value::Bool(_)) => Ok(v),
            (TypeAnnotation::Str, v @ Value::Str(_)) => Ok(v),
            (_, v) => Err(v),
        }
    }

    /// Boolean reading of a value for `&&` and `||`: numbers are true when
    /// non-zero, `null` is false, and only the strings "true" and "false"
    /// convert. Arrays and functions have no boolean reading.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            Value::Float(n) => Some(*n != 0.0),
            Value::Str(s) if s == "true" => Some(true),
            Value::Str(s) if s == "false" => Some(false),
            Value::Null => Some(false),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse one line of user input: integer, then float, then raw text.
    pub fn from_input(line: &str) -> Value {
        let trimmed = line.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            Value::Int(n)
        } else if let Ok(n) = trimmed.parse::<f64>() {
            Value::Float(n)
        } else {
            Value::Str(line.to_string())
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Float(l), Value::Float(r)) => l == r,
            (Value::Int(l), Value::Float(r)) => (*l as f64) == *r,
            (Value::Float(l), Value::Int(r)) => *l == (*r as f64),
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => l == r,
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                // Always show at least one decimal place for floats
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(decl) => write!(f, "<function {}>", decl.name),
        }
    }
}
