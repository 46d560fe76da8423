//! Runtime for the Catena language.
//!
//! Catena is a stack-based, concatenative scripting language.  Source text is
//! streamed through a tokenizer, parsed into immediate and compiled words, and
//! executed against an operand stack within a nestable namespace hierarchy.
//!
//! The crate is organized into two layers.  The `lang` module holds everything
//! that understands raw source text: source locations and the tokenizer.  The
//! `runtime` module holds the execution substrate: values, the operand stack,
//! the word taxonomy, modules, literal handlers, and the interpreter itself.

pub mod lang;
pub mod runtime;

pub use runtime::interpreter::Interpreter;
