use crate::runtime::{
    data_structures::{
        value::Value,
        variable::{Variable, VariablePtr},
    },
    error,
    interpreter::Interpreter,
    words::{Word, WordPtr},
};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Formatter},
    rc::Rc,
};
use tracing::debug;

/// A module handed around by reference.  A module may be a child of another module and be
/// registered with the interpreter at the same time.
pub type ModulePtr = Rc<RefCell<Module>>;

/// A named dictionary of words and variables.
///
/// Modules provide namespacing and code organization.  Each module maintains its own word
/// dictionary (searched newest first, so later definitions shadow older ones), a variable table,
/// a registry of child modules, and a list of exportable word names controlling what crosses the
/// module boundary on import.
pub struct Module {
    name: String,
    words: Vec<WordPtr>,
    exportable: Vec<String>,
    variables: HashMap<String, VariablePtr>,
    modules: HashMap<String, ModulePtr>,
    module_prefixes: HashMap<String, HashSet<String>>,
    source: String,
}

impl Debug for Module {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "<module {} ({} words, {} variables)>",
            if self.name.is_empty() { "<app>" } else { &self.name },
            self.words.len(),
            self.variables.len()
        )
    }
}

impl Module {
    /// Create a new empty module.
    pub fn new(name: &str) -> ModulePtr {
        Module::new_with_source(name, "")
    }

    /// Create a new module, remembering the source code it was built from.
    pub fn new_with_source(name: &str, source: &str) -> ModulePtr {
        Rc::new(RefCell::new(Module {
            name: name.to_owned(),
            words: Vec::new(),
            exportable: Vec::new(),
            variables: HashMap::new(),
            modules: HashMap::new(),
            module_prefixes: HashMap::new(),
            source: source.to_owned(),
        }))
    }

    /// The module's name.  The app module's name is empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source code the module was built from, if any was recorded.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Duplicate the module: the word list and exportable list are copied, variables become
    /// independent cells, and child module references are shared.
    pub fn dup(&self) -> ModulePtr {
        let duplicate = Module::new_with_source(&self.name, &self.source);

        {
            let mut inner = duplicate.borrow_mut();

            inner.words = self.words.clone();
            inner.exportable = self.exportable.clone();

            for (name, variable) in &self.variables {
                inner.variables.insert(name.clone(), variable.borrow().dup());
            }

            for (name, module) in &self.modules {
                inner.modules.insert(name.clone(), module.clone());
            }
        }

        duplicate
    }

    /// Duplicate the module and re-run its imports so that prefixed words are restored in the
    /// copy.
    pub fn copy(&self) -> ModulePtr {
        let result = self.dup();

        for (module_name, prefixes) in &self.module_prefixes {
            if let Some(module) = self.modules.get(module_name) {
                for prefix in prefixes {
                    result.borrow_mut().import_module(prefix, module);
                }
            }
        }

        result
    }

    /// Find a child module by name.
    pub fn find_module(&self, name: &str) -> Option<ModulePtr> {
        self.modules.get(name).cloned()
    }

    /// Register a child module, remembering the prefix it was imported under so the module can be
    /// re-copied later.
    pub fn register_module(&mut self, module_name: &str, prefix: &str, module: ModulePtr) {
        self.modules.insert(module_name.to_owned(), module);

        self.module_prefixes
            .entry(module_name.to_owned())
            .or_default()
            .insert(prefix.to_owned());
    }

    /// Import a module's exportable words into this module.
    ///
    /// The imported module is duplicated first so the host's copy is isolated.  With an empty
    /// prefix the words are added directly; otherwise each word is wrapped in a delegate named
    /// `prefix.name`.
    pub fn import_module(&mut self, prefix: &str, module: &ModulePtr) {
        let duplicate = module.borrow().dup();
        let words = duplicate.borrow().exportable_words();

        debug!(
            module = %module.borrow().name(),
            prefix,
            words = words.len(),
            "importing module"
        );

        for word in words {
            if prefix.is_empty() {
                self.add_word(word);
            } else {
                let prefixed_name = format!("{}.{}", prefix, word.name());
                self.add_word(Word::execute_alias(&prefixed_name, word));
            }
        }

        let module_name = module.borrow().name().to_owned();
        self.register_module(&module_name, prefix, duplicate);
    }

    /// Add a word to the dictionary.  Words are never replaced; the newest addition simply
    /// shadows older words with the same name.
    pub fn add_word(&mut self, word: WordPtr) {
        self.words.push(word);
    }

    /// Install a memoized definition.  Adds the memo itself plus its `NAME!` and `NAME!@`
    /// companions, and returns the memo.
    pub fn add_memo_words(&mut self, word: WordPtr) -> WordPtr {
        let memo = Word::memo(word);

        self.words.push(memo.clone());
        self.words.push(Word::memo_refresh(memo.clone()));
        self.words.push(Word::memo_refresh_get(memo.clone()));

        memo
    }

    /// Add word names to the exportable list.
    pub fn add_exportable(&mut self, names: Vec<String>) {
        self.exportable.extend(names);
    }

    /// Add a word and mark it exportable in one step.
    pub fn add_exportable_word(&mut self, word: WordPtr) {
        self.exportable.push(word.name().to_owned());
        self.words.push(word);
    }

    /// Create an exportable native word from a host function.
    pub fn add_native_word<Handler>(&mut self, name: &str, handler: Handler)
    where
        Handler: Fn(&mut Interpreter) -> error::Result<()> + 'static,
    {
        self.add_exportable_word(Word::native(name, handler));
    }

    /// The names allowed to cross the module boundary on import.
    pub fn exportable(&self) -> &[String] {
        &self.exportable
    }

    /// Every word whose name appears in the exportable list.
    pub fn exportable_words(&self) -> Vec<WordPtr> {
        let exportable: HashSet<&str> = self.exportable.iter().map(String::as_str).collect();

        self.words
            .iter()
            .filter(|word| exportable.contains(word.name()))
            .cloned()
            .collect()
    }

    /// Find a word by name: the dictionary first, then the variable table.  A variable resolves
    /// to a word that pushes the variable cell itself.
    pub fn find_word(&self, name: &str) -> Option<WordPtr> {
        self.find_dictionary_word(name)
            .or_else(|| self.find_variable_word(name))
    }

    /// Search the dictionary from newest to oldest for a word with the given name.
    pub fn find_dictionary_word(&self, name: &str) -> Option<WordPtr> {
        self.words
            .iter()
            .rev()
            .find(|word| word.name() == name)
            .cloned()
    }

    /// Find a variable and wrap it in a word that pushes the cell.
    fn find_variable_word(&self, name: &str) -> Option<WordPtr> {
        self.variables
            .get(name)
            .map(|variable| Word::push_value(name, Value::Variable(variable.clone())))
    }

    /// Add a variable to the module.  Does nothing if the variable already exists.
    pub fn add_variable(&mut self, name: &str, value: Value) {
        self.variables
            .entry(name.to_owned())
            .or_insert_with(|| Variable::new(name, value));
    }

    /// Look up a variable cell by name.
    pub fn variable(&self, name: &str) -> Option<VariablePtr> {
        self.variables.get(name).cloned()
    }

    /// Look up a variable cell, creating it with a null value if absent.
    pub fn get_or_add_variable(&mut self, name: &str) -> VariablePtr {
        self.variables
            .entry(name.to_owned())
            .or_insert_with(|| Variable::new(name, Value::None))
            .clone()
    }
}
