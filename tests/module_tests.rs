use catena::runtime::data_structures::value::Value;
use catena::runtime::module::Module;
use catena::runtime::words::Word;
use catena::Interpreter;

#[test]
fn dictionary_search_is_last_wins() {
    let module = Module::new("m");

    module.borrow_mut().add_word(Word::push_value("W", Value::Int(1)));
    module.borrow_mut().add_word(Word::push_value("W", Value::Int(2)));

    let mut interp = Interpreter::new();
    let word = module.borrow().find_word("W").unwrap();

    word.execute(&mut interp).unwrap();
    assert_eq!(interp.stack().items(), &[Value::Int(2)]);
}

#[test]
fn dictionary_words_shadow_variables() {
    let module = Module::new("m");

    module.borrow_mut().add_variable("X", Value::Int(9));
    module.borrow_mut().add_word(Word::push_value("X", Value::Int(1)));

    let mut interp = Interpreter::new();
    let word = module.borrow().find_word("X").unwrap();

    word.execute(&mut interp).unwrap();
    assert_eq!(interp.stack().items(), &[Value::Int(1)]);
}

#[test]
fn variables_resolve_to_cells() {
    let module = Module::new("m");

    module.borrow_mut().add_variable("X", Value::Int(9));

    let mut interp = Interpreter::new();
    let word = module.borrow().find_word("X").unwrap();

    word.execute(&mut interp).unwrap();
    assert!(matches!(interp.stack().items()[0], Value::Variable(_)));
}

#[test]
fn dup_isolates_variables() {
    let module = Module::new("m");
    module.borrow_mut().add_variable("X", Value::Int(1));

    let duplicate = module.borrow().dup();

    duplicate
        .borrow()
        .variable("X")
        .unwrap()
        .borrow_mut()
        .set_value(Value::Int(2));

    assert_eq!(
        *module.borrow().variable("X").unwrap().borrow().value(),
        Value::Int(1)
    );
}

#[test]
fn only_exportable_words_cross_an_import() {
    let source = Module::new("source");

    {
        let mut source = source.borrow_mut();
        source.add_word(Word::push_value("PUBLIC", Value::Int(1)));
        source.add_word(Word::push_value("PRIVATE", Value::Int(2)));
        source.add_exportable(vec!["PUBLIC".to_owned()]);
    }

    let host = Module::new("host");
    host.borrow_mut().import_module("", &source);

    assert!(host.borrow().find_dictionary_word("PUBLIC").is_some());
    assert!(host.borrow().find_dictionary_word("PRIVATE").is_none());
}

#[test]
fn prefixed_imports_wrap_words_in_delegates() {
    let source = Module::new("source");

    {
        let mut source = source.borrow_mut();
        source.add_word(Word::push_value("W", Value::Int(7)));
        source.add_exportable(vec!["W".to_owned()]);
    }

    let host = Module::new("host");
    host.borrow_mut().import_module("s", &source);

    let word = host.borrow().find_dictionary_word("s.W").unwrap();

    // The delegate reports its target's runtime info.
    assert_eq!(word.runtime_info().runtime(), "local");

    let mut interp = Interpreter::new();
    word.execute(&mut interp).unwrap();

    assert_eq!(interp.stack().items(), &[Value::Int(7)]);
}

#[test]
fn copy_restores_import_prefixes() {
    let helper = Module::new("helper");

    {
        let mut helper = helper.borrow_mut();
        helper.add_word(Word::push_value("H", Value::Int(7)));
        helper.add_exportable(vec!["H".to_owned()]);
    }

    let host = Module::new("host");
    host.borrow_mut().import_module("h", &helper);

    let copy = host.borrow().copy();

    assert!(copy.borrow().find_dictionary_word("h.H").is_some());
}

#[test]
fn imported_memo_words_share_their_cache_with_the_original() {
    let mut interp = Interpreter::new();

    interp.run("{mod @: M 41 ; }").unwrap();

    let module = interp.find_module("mod").unwrap();
    module.borrow_mut().add_exportable(vec!["M".to_owned()]);

    let host = Module::new("host");

    host.borrow_mut().import_module("", &module);

    // Prime the cache through the host's copy.
    let word = host.borrow().find_dictionary_word("M").unwrap();
    word.execute(&mut interp).unwrap();

    assert_eq!(interp.stack().items(), &[Value::Int(41)]);
}
