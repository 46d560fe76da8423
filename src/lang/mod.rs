/// Module for tracking locations within the original source code.
pub mod source_buffer;

/// Module for turning the source code into a stream of tokens for the interpreter to dispatch.
pub mod tokenizing;
