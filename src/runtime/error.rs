use crate::lang::source_buffer::CodeLocation;
use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

/// The classes of error the interpreter can report.  Each carries whatever identifying detail the
/// class calls for; location and cause information ride on the enclosing ScriptError.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A string literal ran off the end of the input.
    #[error("Unterminated string")]
    UnterminatedString,

    /// A definition name contained a forbidden character, or ended prematurely.
    #[error("{0}")]
    InvalidDefinitionName(String),

    /// A definition was still open when the source ended.
    #[error("Missing semicolon (;) to end definition")]
    MissingDefTerminator,

    /// A `;` was found outside of any definition.
    #[error("Extra semicolon (;) outside of definition")]
    ExtraDefTerminator,

    /// A `}` tried to pop the app module off the bottom of the module stack.
    #[error("Cannot pop app module from module stack")]
    ModuleStackUnderflow,

    /// A word popped from an empty operand stack.
    #[error("Stack underflow")]
    StackUnderflow,

    /// A name did not resolve to a word, a variable, or a literal.
    #[error("Unknown word: {0}")]
    UnknownWord(String),

    /// A module name was not found in the interpreter's registry.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// A variable name used the reserved `__` prefix.
    #[error("Invalid variable name: {0}")]
    InvalidVariableName(String),

    /// A module operation failed.
    #[error("Module error in {module}: {message}")]
    ModuleError { module: String, message: String },

    /// A word options array was malformed.
    #[error("{0}")]
    InvalidOptions(String),

    /// A debug word halted the run on purpose.  Bypasses word error handlers.
    #[error("Intentional stop: {0}")]
    IntentionalStop(String),

    /// A word's execution failed; the underlying fault rides along as the cause.
    #[error("Error executing word: {0}")]
    WordExecution(String),

    /// Anything that doesn't fit the classes above.
    #[error("{0}")]
    Other(String),
}

/// Any error that occurs while tokenizing or executing Catena code.  Wraps an ErrorKind with the
/// location in the source the error occurred at, the offending snippet of code, and the error
/// that caused this one, when each is available.
#[derive(Clone)]
pub struct ScriptError {
    /// What went wrong.
    kind: ErrorKind,

    /// The location in the source code the error occurred, if available.
    location: Option<CodeLocation>,

    /// The snippet of source code involved, if available.
    snippet: Option<String>,

    /// The error that caused this one, if any.
    cause: Option<Box<ScriptError>>,
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Pretty print the ScriptError with whatever context it carries.
impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(location) = &self.location {
            write!(f, "\n  at {}", location)?;
        }

        if let Some(snippet) = &self.snippet {
            write!(f, "\n  in: {}", snippet)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  caused by: {}", cause)?;
        }

        Ok(())
    }
}

impl Debug for ScriptError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl ScriptError {
    /// Create a new ScriptError with no location or cause attached.
    pub fn new(kind: ErrorKind) -> ScriptError {
        ScriptError {
            kind,
            location: None,
            snippet: None,
            cause: None,
        }
    }

    /// Attach the location in the source code the error occurred at.
    pub fn with_location(mut self, location: CodeLocation) -> ScriptError {
        self.location = Some(location);
        self
    }

    /// Attach the location only if one is available.
    pub fn with_location_opt(mut self, location: Option<CodeLocation>) -> ScriptError {
        self.location = location;
        self
    }

    /// Attach the snippet of source code involved in the error.
    pub fn with_snippet(mut self, snippet: String) -> ScriptError {
        self.snippet = Some(snippet);
        self
    }

    /// Attach the error that caused this one.
    pub fn with_cause(mut self, cause: ScriptError) -> ScriptError {
        self.cause = Some(Box::new(cause));
        self
    }

    /// What went wrong.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// If available, the location in the source code the error occurred.
    pub fn location(&self) -> Option<&CodeLocation> {
        self.location.as_ref()
    }

    /// If available, the snippet of source code involved in the error.
    pub fn snippet(&self) -> Option<&str> {
        self.snippet.as_deref()
    }

    /// If available, the error that caused this one.
    pub fn cause(&self) -> Option<&ScriptError> {
        self.cause.as_deref()
    }

    /// Is this the sentinel error used by debug words to halt a run?  These bypass word error
    /// handlers entirely.
    pub fn is_intentional_stop(&self) -> bool {
        matches!(self.kind, ErrorKind::IntentionalStop(_))
    }
}
