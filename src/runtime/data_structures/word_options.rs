use crate::runtime::{
    data_structures::value::{Value, ValueRecord},
    error::{self, ErrorKind, ScriptError},
};
use indexmap::IndexMap;
use std::fmt::{self, Debug, Display, Formatter};

/// A typed keyword-argument carrier for option-aware words.
///
/// Words accept options as a flat array of dot-symbol keys and values, built with the `~>` word:
///
/// ```text
/// "a b c" [.separator "; "] ~> INTERPOLATE
/// ```
///
/// Dot-symbols arrive with the leading `.` already stripped, so keys are stored as plain strings.
/// Later keys override earlier ones.
pub struct WordOptions {
    options: IndexMap<String, Value>,
}

impl WordOptions {
    /// Create an empty options carrier.
    pub fn new() -> WordOptions {
        WordOptions {
            options: IndexMap::new(),
        }
    }

    /// Build options from a flat array of key-value pairs: `[k1, v1, k2, v2, …]`.  The array must
    /// have an even length and every key must be a string.
    pub fn from_flat_array(values: &[Value]) -> error::Result<WordOptions> {
        if values.len() % 2 != 0 {
            return Err(ScriptError::new(ErrorKind::InvalidOptions(format!(
                "Options must be key-value pairs (even length), got {} elements",
                values.len()
            ))));
        }

        let mut options = IndexMap::new();

        for pair in values.chunks(2) {
            let key = match &pair[0] {
                Value::String(key) => key.clone(),
                other => {
                    return Err(ScriptError::new(ErrorKind::InvalidOptions(format!(
                        "Option keys must be strings (dot-symbols), got: {}",
                        other
                    ))));
                }
            };

            options.insert(key, pair[1].clone());
        }

        Ok(WordOptions { options })
    }

    /// Get an option's value, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Get an option's value, or the given default when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.options.get(key).cloned().unwrap_or(default)
    }

    /// Is the option present?
    pub fn has(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// The option keys, in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.options.keys().map(String::as_str).collect()
    }

    /// Convert the options to a plain record.
    pub fn to_record(&self) -> ValueRecord {
        self.options.clone()
    }

    /// How many options are present?
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Are there no options?
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl Default for WordOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Show the options in their source shape for debugging.
impl Display for WordOptions {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.options.is_empty() {
            return write!(f, "<WordOptions: >");
        }

        write!(f, "<WordOptions:")?;

        for (key, value) in self.options.iter() {
            write!(f, " .{} {}", key, value.to_json())?;
        }

        write!(f, ">")
    }
}

impl Debug for WordOptions {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
