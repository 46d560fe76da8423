use crate::{
    lang::{source_buffer::CodeLocation, tokenizing::TokenType},
    runtime::{
        data_structures::value::Value,
        error::{self, ErrorKind, ScriptError},
        interpreter::Interpreter,
        module::Module,
    },
};
use std::{
    cell::RefCell,
    fmt::{self, Debug, Formatter},
    rc::Rc,
};
use tracing::trace;

/// A word handed around by reference.  Words are shared freely: a definition body, a module
/// dictionary, and an importing host may all point at the same word.
pub type WordPtr = Rc<Word>;

/// The function behind a native word.  Can be a closure or a plain Rust function.
pub type NativeHandler = Rc<dyn Fn(&mut Interpreter) -> error::Result<()>>;

/// A handler invoked when a word's execution fails.  Returning Ok means the error was handled
/// and execution continues; returning an error moves on to the next handler.
pub type WordErrorHandler = Rc<dyn Fn(&ScriptError, &WordPtr, &mut Interpreter) -> error::Result<()>>;

/// The cached result of a memoized word.
pub struct MemoCell {
    has_value: bool,
    value: Value,
}

/// Metadata about where a word can execute.  Standard library words are available in any
/// runtime, while host-specific words are pinned to the runtime that provides them.  Execution
/// planners use this when deciding how to batch work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeInfo {
    runtime: String,
    is_remote: bool,
    is_standard: bool,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        RuntimeInfo {
            runtime: "local".to_owned(),
            is_remote: false,
            is_standard: false,
        }
    }
}

impl RuntimeInfo {
    /// The runtime the word belongs to.
    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    /// Does the word require remote execution?
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// Is the word part of the standard library, available in every runtime?
    pub fn is_standard(&self) -> bool {
        self.is_standard
    }
}

/// The behavior variants a word can have.  This is a closed sum: every executable unit in the
/// language is one of these.
pub enum WordKind {
    /// Pushes a fixed value onto the operand stack.
    PushValue(Value),

    /// Executes a compiled body of words in order.
    Definition(RefCell<Vec<WordPtr>>),

    /// Invokes a host-provided function.
    Native(NativeHandler),

    /// Delegates to another word.  Used by prefixed imports: `prefix.name` delegates to `name`.
    Execute(WordPtr),

    /// Immediate word that enters a module, creating it on first use.  The word's name is the
    /// module name; an empty name refers to the app module.
    StartModule,

    /// Immediate word that pops the module stack.
    EndModule,

    /// Collects everything above the nearest array sentinel into a sequence.
    EndArray,

    /// Runs its target on first execution, caches the top of stack, and replays the cached value
    /// on later executions.
    Memo {
        target: WordPtr,
        cell: RefCell<MemoCell>,
    },

    /// Forces a memoized word to re-run and re-cache.  Pushes nothing.
    MemoRefresh(WordPtr),

    /// Forces a memoized word to re-run and re-cache, then pushes the fresh value.
    MemoRefreshGet(WordPtr),
}

/// The unit of execution.  Every word carries a name, the source location it was compiled from,
/// and an ordered list of error handlers, alongside its behavior variant.
pub struct Word {
    name: String,
    display: String,
    location: RefCell<Option<CodeLocation>>,
    error_handlers: RefCell<Vec<WordErrorHandler>>,
    runtime_info: RuntimeInfo,
    kind: WordKind,
}

impl Debug for Word {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match &self.kind {
            WordKind::PushValue(_) => "push",
            WordKind::Definition(_) => "definition",
            WordKind::Native(_) => "native",
            WordKind::Execute(_) => "execute",
            WordKind::StartModule => "start-module",
            WordKind::EndModule => "end-module",
            WordKind::EndArray => "end-array",
            WordKind::Memo { .. } => "memo",
            WordKind::MemoRefresh(_) => "memo-refresh",
            WordKind::MemoRefreshGet(_) => "memo-refresh-get",
        };

        write!(f, "<{} word {}>", kind, self.name)
    }
}

impl Word {
    fn make(name: &str, kind: WordKind) -> WordPtr {
        Rc::new(Word {
            name: name.to_owned(),
            display: name.to_owned(),
            location: RefCell::new(None),
            error_handlers: RefCell::new(Vec::new()),
            runtime_info: RuntimeInfo::default(),
            kind,
        })
    }

    /// Create a word that pushes a fixed value.
    pub fn push_value(name: &str, value: Value) -> WordPtr {
        Word::make(name, WordKind::PushValue(value))
    }

    /// Create a word defined by a sequence of other words.
    pub fn definition(name: &str, body: Vec<WordPtr>) -> WordPtr {
        Word::make(name, WordKind::Definition(RefCell::new(body)))
    }

    /// Create a word backed by a host function.
    pub fn native<Handler>(name: &str, handler: Handler) -> WordPtr
    where
        Handler: Fn(&mut Interpreter) -> error::Result<()> + 'static,
    {
        Word::make(name, WordKind::Native(Rc::new(handler)))
    }

    /// Create a word that delegates to another under a different name.
    pub fn execute_alias(name: &str, target: WordPtr) -> WordPtr {
        Word::make(name, WordKind::Execute(target))
    }

    /// Create the immediate word that enters the named module.
    pub fn start_module(name: &str) -> WordPtr {
        Word::make(name, WordKind::StartModule)
    }

    /// Create the immediate word that leaves the current module.
    pub fn end_module() -> WordPtr {
        Word::make("}", WordKind::EndModule)
    }

    /// Create the word that collects an array literal off the stack.
    pub fn end_array() -> WordPtr {
        Word::make("]", WordKind::EndArray)
    }

    /// Wrap a word in a memoizing cell.  The memo takes the underlying word's name.
    pub fn memo(target: WordPtr) -> WordPtr {
        let name = target.name.clone();

        Word::make(
            &name,
            WordKind::Memo {
                target,
                cell: RefCell::new(MemoCell {
                    has_value: false,
                    value: Value::None,
                }),
            },
        )
    }

    /// Create the `NAME!` refresh companion of a memoized word.
    pub fn memo_refresh(memo: WordPtr) -> WordPtr {
        let name = format!("{}!", memo.name);
        Word::make(&name, WordKind::MemoRefresh(memo))
    }

    /// Create the `NAME!@` refresh-and-get companion of a memoized word.
    pub fn memo_refresh_get(memo: WordPtr) -> WordPtr {
        let name = format!("{}!@", memo.name);
        Word::make(&name, WordKind::MemoRefreshGet(memo))
    }

    /// The word's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the word shows itself in listings.  Defaults to the name.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The word's behavior variant.
    pub fn kind(&self) -> &WordKind {
        &self.kind
    }

    /// Where and how the word can execute.  A prefixed-import delegate reports its target's
    /// runtime info, so the alias is indistinguishable from the word it wraps.
    pub fn runtime_info(&self) -> &RuntimeInfo {
        match &self.kind {
            WordKind::Execute(target) => target.runtime_info(),
            _ => &self.runtime_info,
        }
    }

    /// Where the word was compiled from, if it has been compiled into a definition.
    pub fn location(&self) -> Option<CodeLocation> {
        self.location.borrow().clone()
    }

    /// Record where the word was compiled from.
    pub fn set_location(&self, location: Option<CodeLocation>) {
        *self.location.borrow_mut() = location;
    }

    /// Append an error handler.  Handlers are tried in registration order when a native or
    /// definition word's execution fails.
    pub fn add_error_handler(&self, handler: WordErrorHandler) {
        self.error_handlers.borrow_mut().push(handler);
    }

    /// Remove every registered error handler.  Handlers have no usable identity, so removal is
    /// all-or-nothing.
    pub fn clear_error_handlers(&self) {
        self.error_handlers.borrow_mut().clear();
    }

    /// How many error handlers are registered?
    pub fn error_handler_count(&self) -> usize {
        self.error_handlers.borrow().len()
    }

    /// Execute the word against the interpreter.
    pub fn execute(self: &Rc<Self>, interp: &mut Interpreter) -> error::Result<()> {
        match &self.kind {
            WordKind::PushValue(value) => {
                interp.push(value.clone());
                Ok(())
            }

            WordKind::Definition(body) => {
                trace!(word = %self.name, "executing definition");

                let body = body.borrow().clone();

                for word in &body {
                    if let Err(err) = word.execute(interp) {
                        self.try_error_handlers(err, interp)?;
                    }
                }

                Ok(())
            }

            WordKind::Native(handler) => {
                let handler = handler.clone();

                if let Err(err) = handler(interp) {
                    self.try_error_handlers(err, interp)?;
                }

                Ok(())
            }

            WordKind::Execute(target) => target.execute(interp),

            WordKind::StartModule => {
                // An empty name refers to the app module.
                if self.name.is_empty() {
                    let app_module = interp.app_module();
                    interp.module_stack_push(app_module);
                    return Ok(());
                }

                let current = interp.cur_module();
                let existing = current.borrow().find_module(&self.name);

                let module = match existing {
                    Some(module) => module,
                    None => {
                        let module = Module::new(&self.name);

                        current
                            .borrow_mut()
                            .register_module(&self.name, &self.name, module.clone());

                        // Modules created at the top level are also globally registered so they
                        // can be imported by name.
                        if Rc::ptr_eq(&current, &interp.app_module()) {
                            interp.register_module(module.clone());
                        }

                        module
                    }
                };

                interp.module_stack_push(module);
                Ok(())
            }

            WordKind::EndModule => interp.module_stack_pop().map(|_| ()),

            WordKind::EndArray => {
                let mut items = Vec::new();

                loop {
                    let item = interp.pop()?;

                    if let Value::Token(token) = &item {
                        if token.token_type() == TokenType::StartArray {
                            break;
                        }
                    }

                    items.push(item);
                }

                items.reverse();
                interp.push(Value::Array(items));

                Ok(())
            }

            WordKind::Memo { cell, .. } => {
                if !cell.borrow().has_value {
                    self.refresh_memo(interp)?;
                }

                let value = cell.borrow().value.clone();
                interp.push(value);

                Ok(())
            }

            WordKind::MemoRefresh(memo) => memo.refresh_memo(interp),

            WordKind::MemoRefreshGet(memo) => {
                memo.refresh_memo(interp)?;

                let WordKind::Memo { cell, .. } = &memo.kind else {
                    return Err(self.not_a_memo_error());
                };

                let value = cell.borrow().value.clone();
                interp.push(value);

                Ok(())
            }
        }
    }

    /// Re-run a memoized word's underlying body and capture its result.  The body is expected to
    /// leave exactly one value on the stack.
    fn refresh_memo(self: &Rc<Self>, interp: &mut Interpreter) -> error::Result<()> {
        let WordKind::Memo { target, cell } = &self.kind else {
            return Err(self.not_a_memo_error());
        };

        target.execute(interp)?;

        let value = interp.pop()?;
        let mut cell = cell.borrow_mut();

        cell.value = value;
        cell.has_value = true;

        Ok(())
    }

    fn not_a_memo_error(&self) -> ScriptError {
        ScriptError::new(ErrorKind::Other(format!(
            "Word {} is not a memoized word",
            self.name
        )))
    }

    /// Run the word's error handlers against a failure.  The intentional-stop sentinel bypasses
    /// handlers entirely.  The first handler to succeed swallows the fault; if none succeed the
    /// original error propagates, not a handler's own.
    fn try_error_handlers(
        self: &Rc<Self>,
        err: ScriptError,
        interp: &mut Interpreter,
    ) -> error::Result<()> {
        if err.is_intentional_stop() {
            return Err(err);
        }

        let handlers = self.error_handlers.borrow().clone();

        for handler in handlers {
            if handler(&err, self, interp).is_ok() {
                return Ok(());
            }
        }

        Err(err)
    }
}
