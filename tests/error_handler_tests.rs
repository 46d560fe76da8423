use catena::runtime::data_structures::value::Value;
use catena::runtime::error::{ErrorKind, ScriptError};
use catena::runtime::words::{Word, WordErrorHandler, WordPtr};
use catena::Interpreter;
use std::cell::Cell;
use std::rc::Rc;

fn failing_word(message: &str) -> WordPtr {
    let message = message.to_owned();

    Word::native("FAILING-WORD", move |_interp| {
        Err(ScriptError::new(ErrorKind::Other(message.clone())))
    })
}

fn succeeding_handler(called: &Rc<Cell<bool>>) -> WordErrorHandler {
    let called = called.clone();

    Rc::new(move |_err: &ScriptError, _word: &WordPtr, _interp: &mut Interpreter| {
        called.set(true);
        Ok(())
    })
}

fn failing_handler(called: &Rc<Cell<bool>>) -> WordErrorHandler {
    let called = called.clone();

    Rc::new(move |_err: &ScriptError, _word: &WordPtr, _interp: &mut Interpreter| {
        called.set(true);
        Err(ScriptError::new(ErrorKind::Other("handler error".to_owned())))
    })
}

#[test]
fn handlers_are_counted_and_cleared() {
    let word = failing_word("boom");
    let called = Rc::new(Cell::new(false));

    assert_eq!(word.error_handler_count(), 0);

    word.add_error_handler(succeeding_handler(&called));
    word.add_error_handler(succeeding_handler(&called));
    assert_eq!(word.error_handler_count(), 2);

    word.clear_error_handlers();
    assert_eq!(word.error_handler_count(), 0);
}

#[test]
fn a_successful_handler_swallows_the_error() {
    let mut interp = Interpreter::new();
    let word = failing_word("Test error");
    let called = Rc::new(Cell::new(false));

    word.add_error_handler(succeeding_handler(&called));

    assert!(word.execute(&mut interp).is_ok());
    assert!(called.get());
}

#[test]
fn handlers_receive_the_original_error() {
    let mut interp = Interpreter::new();
    let word = failing_word("Test error");
    let seen = Rc::new(Cell::new(false));

    {
        let seen = seen.clone();

        word.add_error_handler(Rc::new(
            move |err: &ScriptError, _word: &WordPtr, _interp: &mut Interpreter| {
                if *err.kind() == ErrorKind::Other("Test error".to_owned()) {
                    seen.set(true);
                }
                Ok(())
            },
        ));
    }

    word.execute(&mut interp).unwrap();
    assert!(seen.get());
}

#[test]
fn the_original_error_propagates_when_no_handler_succeeds() {
    let mut interp = Interpreter::new();
    let word = failing_word("Original error");
    let called = Rc::new(Cell::new(false));

    word.add_error_handler(failing_handler(&called));

    let err = word.execute(&mut interp).unwrap_err();

    assert!(called.get());
    assert_eq!(*err.kind(), ErrorKind::Other("Original error".to_owned()));
}

#[test]
fn handlers_run_in_registration_order_until_one_succeeds() {
    let mut interp = Interpreter::new();
    let word = failing_word("boom");

    let first = Rc::new(Cell::new(false));
    let second = Rc::new(Cell::new(false));
    let third = Rc::new(Cell::new(false));

    word.add_error_handler(failing_handler(&first));
    word.add_error_handler(succeeding_handler(&second));
    word.add_error_handler(succeeding_handler(&third));

    word.execute(&mut interp).unwrap();

    assert!(first.get());
    assert!(second.get());
    assert!(!third.get());
}

#[test]
fn intentional_stops_bypass_handlers() {
    let mut interp = Interpreter::new();
    let called = Rc::new(Cell::new(false));

    let word = Word::native("STOPPING-WORD", |_interp| {
        Err(ScriptError::new(ErrorKind::IntentionalStop(
            "STOP".to_owned(),
        )))
    });

    word.add_error_handler(succeeding_handler(&called));

    let err = word.execute(&mut interp).unwrap_err();

    assert!(err.is_intentional_stop());
    assert!(!called.get());
}

#[test]
fn definitions_continue_after_a_handled_body_error() {
    let mut interp = Interpreter::new();
    let called = Rc::new(Cell::new(false));

    let body = vec![
        failing_word("body error"),
        Word::push_value("forty-two", Value::Int(42)),
    ];

    let definition = Word::definition("RESILIENT", body);
    definition.add_error_handler(succeeding_handler(&called));

    definition.execute(&mut interp).unwrap();

    assert!(called.get());
    assert_eq!(interp.stack().items(), &[Value::Int(42)]);
}

#[test]
fn push_value_words_never_engage_handlers() {
    let mut interp = Interpreter::new();
    let word = Word::push_value("value", Value::Int(1));
    let called = Rc::new(Cell::new(false));

    word.add_error_handler(succeeding_handler(&called));
    word.execute(&mut interp).unwrap();

    assert!(!called.get());
    assert_eq!(interp.stack().len(), 1);
}
