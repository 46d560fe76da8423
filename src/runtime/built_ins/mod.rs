use crate::runtime::interpreter::Interpreter;

/// The essential word set: stack shuffling, variables, module plumbing, options, interpolation,
/// and the debug words.
pub mod core_words;

pub use core_words::new_core_module;

/// Register the built-in word sets with an interpreter.  The core module is registered by name
/// and its words are imported unprefixed.
pub fn register_built_ins(interp: &mut Interpreter) {
    let core = core_words::new_core_module();
    interp.import_module(&core, "");
}
