use crate::{
    lang::tokenizing::Token,
    runtime::{
        data_structures::{variable::VariablePtr, word_options::WordOptions},
        words::WordPtr,
    },
};
use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

/// A mapping from string keys to values.  Keys are always strings in this language.
pub type ValueRecord = IndexMap<String, Value>;

/// Core value enumeration used by the Catena interpreter.  This represents every data type the
/// interpreter and the underlying script code can understand and manipulate.
#[derive(Clone)]
pub enum Value {
    /// The value represents nothing and no data is associated.
    None,

    /// A 64-bit signed integer.
    Int(i64),

    /// A 64-bit floating point value.
    Float(f64),

    /// A boolean value.
    Bool(bool),

    /// A UTF-8 string.
    String(String),

    /// An ordered sequence of values.
    Array(Vec<Value>),

    /// A mapping from string keys to values.
    Record(ValueRecord),

    /// An instant in time with an associated time zone.
    DateTime(DateTime<Tz>),

    /// A handle to a variable cell.  Resolving a variable's name pushes the cell itself, not its
    /// contents.
    Variable(VariablePtr),

    /// A handle to a word.
    Word(WordPtr),

    /// A handle to a keyword-argument carrier.
    Options(Rc<WordOptions>),

    /// A source code token.  Array literals use the opening token as a collection sentinel.
    Token(Token),
}

/// Allow code to create a default Value.
impl Default for Value {
    fn default() -> Value {
        Value::None
    }
}

/// Equality for values.  Primitives compare structurally, with integers promoted to floats when
/// compared against them.  Collections compare element-wise.  Handles compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,

            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),

            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,

            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,

            (Value::DateTime(a), Value::DateTime(b)) => a == b,

            (Value::Variable(a), Value::Variable(b)) => Rc::ptr_eq(a, b),
            (Value::Word(a), Value::Word(b)) => Rc::ptr_eq(a, b),
            (Value::Options(a), Value::Options(b)) => Rc::ptr_eq(a, b),

            (Value::Token(a), Value::Token(b)) => a == b,

            _ => false,
        }
    }
}

/// Pretty print the value for display.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::None => write!(f, "null"),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Bool(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "{}", value),

            Value::Array(values) => {
                write!(f, "[ ")?;

                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }

                    if let Value::String(text) = value {
                        write!(f, "\"{}\"", text)?;
                    } else {
                        write!(f, "{}", value)?;
                    }
                }

                write!(f, " ]")
            }

            Value::Record(record) => {
                write!(f, "{{ ")?;

                for (index, (key, value)) in record.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }

                    write!(f, "\"{}\": {}", key, value)?;
                }

                write!(f, " }}")
            }

            Value::DateTime(value) => {
                write!(f, "{}", value.to_rfc3339_opts(SecondsFormat::Secs, true))
            }

            Value::Variable(variable) => write!(f, "<variable {}>", variable.borrow().name()),
            Value::Word(word) => write!(f, "<word {}>", word.name()),
            Value::Options(options) => write!(f, "{}", options),
            Value::Token(token) => write!(f, "{}", token),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Handily implement variant checks for the types the Value enumeration supports.
macro_rules! is_variant {
    ($name:ident , $variant:ident) => {
        #[doc = concat!("Check if the value is the variant ", stringify!($variant), ".")]
        pub fn $name(&self) -> bool {
            matches!(self, Value::$variant(_))
        }
    };
}

impl Value {
    /// Check if the value is the None variant.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    // Create variant checks for the other supported types.
    is_variant!(is_int, Int);
    is_variant!(is_float, Float);
    is_variant!(is_bool, Bool);
    is_variant!(is_string, String);
    is_variant!(is_array, Array);
    is_variant!(is_record, Record);
    is_variant!(is_datetime, DateTime);
    is_variant!(is_variable, Variable);
    is_variant!(is_word, Word);
    is_variant!(is_options, Options);
    is_variant!(is_token, Token);

    /// Is the value one of the numeric variants?
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    /// Get the value as an integer, converting floats and booleans.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Float(value) => Some(*value as i64),
            Value::Bool(value) => Some(*value as i64),
            _ => None,
        }
    }

    /// Get the value as a float, promoting integers and booleans.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Bool(value) => Some(*value as i64 as f64),
            _ => None,
        }
    }

    /// Get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    /// Get the value's string contents, if it is a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Render the value as JSON.  Handles render as their string representations.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => {
                serde_json::Number::from_f64(*value).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::Bool(value) => serde_json::Value::from(*value),
            Value::String(value) => serde_json::Value::from(value.clone()),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            Value::Record(record) => serde_json::Value::Object(
                record
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::DateTime(value) => {
                serde_json::Value::from(value.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Value::Variable(variable) => variable.borrow().value().to_json(),
            Value::Word(_) | Value::Options(_) | Value::Token(_) => {
                serde_json::Value::from(self.to_string())
            }
        }
    }
}

/// Convert an arbitrary data type to a Value.
pub trait ToValue {
    /// Implement to handle the actual conversion.
    fn to_value(&self) -> Value;
}

/// Define implementations for converting between Values and the raw data types they represent.
macro_rules! value_conversion {
    ($data_type:ty , $variant:ident) => {
        #[doc = concat!("Allow conversion from ", stringify!($data_type), " to a Value.")]
        impl ToValue for $data_type {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        #[doc = concat!("Support converting from a ", stringify!($data_type), " to a Value.")]
        impl From<$data_type> for Value {
            fn from(original: $data_type) -> Value {
                Value::$variant(original)
            }
        }
    };
}

// Implement the simple conversions for the value enumeration types.
value_conversion!(i64, Int);
value_conversion!(f64, Float);
value_conversion!(bool, Bool);
value_conversion!(String, String);
value_conversion!(Vec<Value>, Array);
value_conversion!(ValueRecord, Record);
value_conversion!(DateTime<Tz>, DateTime);
value_conversion!(VariablePtr, Variable);
value_conversion!(WordPtr, Word);
value_conversion!(Token, Token);

/// Convenience conversion from borrowed strings.
impl From<&str> for Value {
    fn from(original: &str) -> Value {
        Value::String(original.to_owned())
    }
}

/// Convenience conversion from word options.
impl From<WordOptions> for Value {
    fn from(original: WordOptions) -> Value {
        Value::Options(Rc::new(original))
    }
}

/// The usize type is not represented directly in the Value enumeration, so it converts to an
/// integer internally.
impl From<usize> for Value {
    fn from(original: usize) -> Value {
        Value::Int(original as i64)
    }
}
