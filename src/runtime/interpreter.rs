use crate::{
    lang::{
        source_buffer::CodeLocation,
        tokenizing::{Token, TokenType, Tokenizer},
    },
    runtime::{
        data_structures::{stack::Stack, value::Value},
        error::{self, ErrorKind, ScriptError},
        literals::{self, LiteralHandler, SharedTimeZone},
        module::{Module, ModulePtr},
        words::{Word, WordPtr},
    },
};
use chrono_tz::Tz;
use std::{cell::RefCell, collections::HashMap, rc::Rc};
use tracing::{debug, trace};

/// A definition in the middle of being compiled.  Becomes a definition word when the terminating
/// `;` arrives.
struct DefinitionBuilder {
    name: String,
    words: Vec<WordPtr>,
}

/// The core Catena interpreter.
///
/// The interpreter owns the operand stack, the module stack (whose bottom is always the app
/// module), the registry of importable modules, a stack of tokenizers for nested evaluation, and
/// the literal handlers that turn unbound names into values.  One interpreter executes one token
/// at a time on the thread that drives `run`; nested `run` calls from native words re-use the
/// same interpreter.
pub struct Interpreter {
    /// The operand stack.
    stack: Stack,

    /// The unnamed top level module.  Always the bottom of the module stack.
    app_module: ModulePtr,

    /// The stack of modules establishing the current lexical scope.
    module_stack: Vec<ModulePtr>,

    /// Modules that can be imported by name.
    registered_modules: HashMap<String, ModulePtr>,

    /// One tokenizer per active `run` call, innermost last.
    tokenizer_stack: Vec<Tokenizer>,

    /// The token dispatched before the current one.  Missing-terminator errors at end of input
    /// point here.
    previous_token: Option<Token>,

    /// Location of the token currently being handled, for errors raised between tokens.
    current_location: Option<CodeLocation>,

    /// Is a definition currently being compiled?
    is_compiling: bool,

    /// Was the open definition started with `@:`?
    is_memo_definition: bool,

    /// The definition being compiled, if any.  Present exactly when `is_compiling` is set.
    cur_definition: Option<DefinitionBuilder>,

    /// Literal handlers in priority order, highest first.
    literal_handlers: Vec<LiteralHandler>,

    /// The configured time zone, shared with the date and datetime literal handlers.
    timezone: SharedTimeZone,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create a new interpreter with an empty stack, an empty app module, and the standard
    /// literal handlers.  The configured time zone starts as UTC.
    pub fn new() -> Interpreter {
        let app_module = Module::new("");
        let timezone: SharedTimeZone = Rc::new(RefCell::new(Tz::UTC));
        let literal_handlers = literals::standard_handlers(&timezone);

        Interpreter {
            stack: Stack::new(),
            module_stack: vec![app_module.clone()],
            app_module,
            registered_modules: HashMap::new(),
            tokenizer_stack: Vec::new(),
            previous_token: None,
            current_location: None,
            is_compiling: false,
            is_memo_definition: false,
            cur_definition: None,
            literal_handlers,
            timezone,
        }
    }

    // ------------------------------------------------------------------------------------------
    // Stack operations
    // ------------------------------------------------------------------------------------------

    /// Push a value onto the operand stack.  This is the primary way of sending values to words.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop the top value from the operand stack.  Underflow is reported with the location of the
    /// token being handled.
    pub fn pop(&mut self) -> error::Result<Value> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(ScriptError::new(ErrorKind::StackUnderflow)
                .with_location_opt(self.current_location.clone())),
        }
    }

    /// Look at the top value without removing it.
    pub fn peek(&self) -> error::Result<Value> {
        match self.stack.peek() {
            Some(value) => Ok(value.clone()),
            None => Err(ScriptError::new(ErrorKind::StackUnderflow)
                .with_location_opt(self.current_location.clone())),
        }
    }

    /// The operand stack, for examination.
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Pop the top value and convert it to an integer.
    pub fn pop_as_int(&mut self) -> error::Result<i64> {
        let value = self.pop()?;

        value
            .as_int()
            .ok_or_else(|| self.type_error("Expected a numeric value"))
    }

    /// Pop the top value and convert it to a float.
    pub fn pop_as_float(&mut self) -> error::Result<f64> {
        let value = self.pop()?;

        value
            .as_float()
            .ok_or_else(|| self.type_error("Expected a numeric value"))
    }

    /// Pop the top value and convert it to a boolean.
    pub fn pop_as_bool(&mut self) -> error::Result<bool> {
        let value = self.pop()?;

        value
            .as_bool()
            .ok_or_else(|| self.type_error("Expected a boolean value"))
    }

    /// Pop the top value and take its string contents.
    pub fn pop_as_string(&mut self) -> error::Result<String> {
        match self.pop()? {
            Value::String(text) => Ok(text),
            _ => Err(self.type_error("Expected a string value")),
        }
    }

    /// Pop the top value and take its array contents.
    pub fn pop_as_array(&mut self) -> error::Result<Vec<Value>> {
        match self.pop()? {
            Value::Array(items) => Ok(items),
            _ => Err(self.type_error("Expected an array")),
        }
    }

    /// Build a type mismatch error at the current location.
    fn type_error(&self, message: &str) -> ScriptError {
        ScriptError::new(ErrorKind::Other(message.to_owned()))
            .with_location_opt(self.current_location.clone())
    }

    // ------------------------------------------------------------------------------------------
    // Module operations
    // ------------------------------------------------------------------------------------------

    /// The unnamed top level module.
    pub fn app_module(&self) -> ModulePtr {
        self.app_module.clone()
    }

    /// The module at the top of the module stack, establishing the current scope.
    pub fn cur_module(&self) -> ModulePtr {
        // The module stack is never empty; its bottom is the app module.
        self.module_stack
            .last()
            .cloned()
            .unwrap_or_else(|| self.app_module.clone())
    }

    /// How deep is the module stack?
    pub fn module_stack_depth(&self) -> usize {
        self.module_stack.len()
    }

    /// Push a module onto the module stack.
    pub fn module_stack_push(&mut self, module: ModulePtr) {
        self.module_stack.push(module);
    }

    /// Pop the module stack.  Popping the bottom app module is a fatal error.
    pub fn module_stack_pop(&mut self) -> error::Result<ModulePtr> {
        if self.module_stack.len() <= 1 {
            return Err(ScriptError::new(ErrorKind::ModuleStackUnderflow)
                .with_location_opt(self.current_location.clone()));
        }

        self.module_stack.pop().ok_or_else(|| {
            ScriptError::new(ErrorKind::Other("Module stack is empty".to_owned()))
        })
    }

    /// Make a module importable by name.
    pub fn register_module(&mut self, module: ModulePtr) {
        let name = module.borrow().name().to_owned();
        self.registered_modules.insert(name, module);
    }

    /// Find a registered module by name.
    pub fn find_module(&self, name: &str) -> error::Result<ModulePtr> {
        self.registered_modules.get(name).cloned().ok_or_else(|| {
            ScriptError::new(ErrorKind::UnknownModule(name.to_owned()))
                .with_location_opt(self.current_location.clone())
        })
    }

    /// Register a module and import its exportable words into the app module under the given
    /// prefix.  An empty prefix imports the words unprefixed.
    pub fn import_module(&mut self, module: &ModulePtr, prefix: &str) {
        self.register_module(module.clone());
        self.app_module.borrow_mut().import_module(prefix, module);
    }

    /// Import a list of registered modules into the app module.  Entries are either a module
    /// name, imported under the name itself as prefix, or a `[name, prefix]` pair; an explicit
    /// empty prefix imports the words unprefixed.
    pub fn use_modules(&mut self, entries: &[Value]) -> error::Result<()> {
        for entry in entries {
            let (module_name, prefix) = match entry {
                Value::String(name) => (name.clone(), name.clone()),

                Value::Array(pair) => {
                    let name = match pair.first() {
                        Some(Value::String(name)) => name.clone(),
                        _ => {
                            return Err(self.type_error(
                                "Module list entries must be names or [name, prefix] pairs",
                            ));
                        }
                    };

                    let prefix = match pair.get(1) {
                        Some(Value::String(prefix)) => prefix.clone(),
                        None => String::new(),
                        Some(_) => {
                            return Err(self.type_error("Module import prefixes must be strings"));
                        }
                    };

                    (name, prefix)
                }

                _ => {
                    return Err(self.type_error(
                        "Module list entries must be names or [name, prefix] pairs",
                    ));
                }
            };

            let module = self.find_module(&module_name)?;
            self.app_module.borrow_mut().import_module(&prefix, &module);
        }

        Ok(())
    }

    // ------------------------------------------------------------------------------------------
    // Literal handlers and time zone
    // ------------------------------------------------------------------------------------------

    /// Register a custom literal handler.  New handlers are prepended, so they take priority
    /// over the standard ones.
    pub fn register_literal_handler(&mut self, handler: LiteralHandler) {
        self.literal_handlers.insert(0, handler);
    }

    /// Try the literal handlers, in priority order, on an unbound name.  The first success wins
    /// and is wrapped in a word that pushes the parsed value.
    fn find_literal_word(&self, name: &str) -> Option<WordPtr> {
        for handler in &self.literal_handlers {
            if let Some(value) = handler(name) {
                return Some(Word::push_value(name, value));
            }
        }

        None
    }

    /// Set the time zone used by the date and datetime literal handlers.
    pub fn set_time_zone(&mut self, id: &str) -> error::Result<()> {
        let zone: Tz = id
            .parse()
            .map_err(|_| ScriptError::new(ErrorKind::Other(format!("Unknown time zone: {}", id))))?;

        *self.timezone.borrow_mut() = zone;
        Ok(())
    }

    /// The configured time zone.
    pub fn time_zone(&self) -> Tz {
        *self.timezone.borrow()
    }

    // ------------------------------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------------------------------

    /// Resolve a name: the module stack from top to bottom, then the literal handlers.
    pub fn find_word(&self, name: &str) -> error::Result<WordPtr> {
        for module in self.module_stack.iter().rev() {
            if let Some(word) = module.borrow().find_word(name) {
                return Ok(word);
            }
        }

        if let Some(word) = self.find_literal_word(name) {
            return Ok(word);
        }

        Err(ScriptError::new(ErrorKind::UnknownWord(name.to_owned())))
    }

    // ------------------------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------------------------

    /// Is a definition currently being compiled?
    pub fn is_compiling(&self) -> bool {
        self.is_compiling
    }

    /// Execute a piece of Catena source.
    pub fn run(&mut self, code: &str) -> error::Result<()> {
        self.run_with_location(code, None)
    }

    /// Execute a piece of Catena source, reporting positions relative to the given reference
    /// location.  Used for nested evaluation of text extracted from an enclosing source.
    pub fn run_with_location(
        &mut self,
        code: &str,
        reference: Option<CodeLocation>,
    ) -> error::Result<()> {
        debug!(bytes = code.len(), depth = self.tokenizer_stack.len(), "running source");

        self.tokenizer_stack.push(Tokenizer::new(code, reference, false));

        let result = self.run_current_tokenizer();

        self.tokenizer_stack.pop();
        result
    }

    /// Pull tokens from the innermost tokenizer and dispatch them until end of input.
    fn run_current_tokenizer(&mut self) -> error::Result<()> {
        loop {
            let token = {
                let tokenizer = match self.tokenizer_stack.last_mut() {
                    Some(tokenizer) => tokenizer,
                    None => {
                        return Err(ScriptError::new(ErrorKind::Other(
                            "No active tokenizer".to_owned(),
                        )));
                    }
                };

                match tokenizer.next_token()? {
                    Some(token) => token,
                    // Only streaming tokenizers defer, and run never creates one.
                    None => return Err(ScriptError::new(ErrorKind::UnterminatedString)),
                }
            };

            self.current_location = Some(token.location().clone());
            self.handle_token(&token)?;

            if token.token_type() == TokenType::Eos {
                break;
            }

            self.previous_token = Some(token);
        }

        Ok(())
    }

    /// Dispatch a single token.
    fn handle_token(&mut self, token: &Token) -> error::Result<()> {
        trace!(kind = ?token.token_type(), text = token.text(), "dispatching token");

        match token.token_type() {
            TokenType::String => self.handle_word(
                Word::push_value("<string>", Value::String(token.text().to_owned())),
                token.location(),
            ),

            TokenType::Comment => Ok(()),

            TokenType::StartArray => self.handle_word(
                Word::push_value("<start_array>", Value::Token(token.clone())),
                token.location(),
            ),

            TokenType::EndArray => self.handle_word(Word::end_array(), token.location()),

            TokenType::StartModule => self.handle_immediate_word(Word::start_module(token.text())),

            TokenType::EndModule => self.handle_immediate_word(Word::end_module()),

            TokenType::StartDef => self.begin_definition(token, false),

            TokenType::StartMemo => self.begin_definition(token, true),

            TokenType::EndDef => self.finish_definition(token),

            TokenType::DotSymbol => self.handle_word(
                Word::push_value("<dot-symbol>", Value::String(token.text().to_owned())),
                token.location(),
            ),

            TokenType::Word => {
                let word = self
                    .find_word(token.text())
                    .map_err(|err| err.with_location(token.location().clone()))?;

                self.handle_word(word, token.location())
            }

            TokenType::Eos => {
                if self.is_compiling {
                    let location = self.previous_token.as_ref().map(|t| t.location().clone());

                    return Err(ScriptError::new(ErrorKind::MissingDefTerminator)
                        .with_location_opt(location));
                }

                Ok(())
            }
        }
    }

    /// Compile or execute a word, depending on the interpreter mode.  While compiling, the word
    /// picks up the location of the token that produced it.
    fn handle_word(&mut self, word: WordPtr, location: &CodeLocation) -> error::Result<()> {
        if self.is_compiling {
            word.set_location(Some(location.clone()));

            match self.cur_definition.as_mut() {
                Some(definition) => {
                    definition.words.push(word);
                    Ok(())
                }
                None => Err(ScriptError::new(ErrorKind::Other(
                    "Compiling without an open definition".to_owned(),
                ))),
            }
        } else {
            word.execute(self)
        }
    }

    /// Module words are immediate: they execute during compilation and are compiled into the
    /// open definition as well.
    fn handle_immediate_word(&mut self, word: WordPtr) -> error::Result<()> {
        if self.is_compiling {
            if let Some(definition) = self.cur_definition.as_mut() {
                definition.words.push(word.clone());
            }
        }

        word.execute(self)
    }

    /// Open a definition for the `:` and `@:` tokens.
    fn begin_definition(&mut self, token: &Token, is_memo: bool) -> error::Result<()> {
        if self.is_compiling {
            let location = self.previous_token.as_ref().map(|t| t.location().clone());

            return Err(
                ScriptError::new(ErrorKind::MissingDefTerminator).with_location_opt(location)
            );
        }

        self.cur_definition = Some(DefinitionBuilder {
            name: token.text().to_owned(),
            words: Vec::new(),
        });

        self.is_compiling = true;
        self.is_memo_definition = is_memo;

        Ok(())
    }

    /// Install the open definition for the `;` token.  Memoized definitions install the memo and
    /// its two refresh companions.
    fn finish_definition(&mut self, token: &Token) -> error::Result<()> {
        if !self.is_compiling {
            return Err(ScriptError::new(ErrorKind::ExtraDefTerminator)
                .with_location(token.location().clone()));
        }

        let definition = match self.cur_definition.take() {
            Some(definition) => definition,
            None => {
                return Err(ScriptError::new(ErrorKind::ExtraDefTerminator)
                    .with_location(token.location().clone()));
            }
        };

        let word = Word::definition(&definition.name, definition.words);
        let module = self.cur_module();

        if self.is_memo_definition {
            module.borrow_mut().add_memo_words(word);
        } else {
            module.borrow_mut().add_word(word);
        }

        self.is_compiling = false;

        Ok(())
    }
}
