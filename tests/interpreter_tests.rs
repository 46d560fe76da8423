use catena::lang::source_buffer::CodeLocation;
use catena::runtime::built_ins::register_built_ins;
use catena::runtime::data_structures::value::Value;
use catena::runtime::error::ErrorKind;
use catena::Interpreter;
use chrono::Timelike;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;

/// An interpreter with the core words plus integer `+` and `*` for arithmetic scenarios.
fn test_interpreter() -> Interpreter {
    let mut interp = Interpreter::new();

    register_built_ins(&mut interp);

    let app = interp.app_module();

    app.borrow_mut().add_native_word("+", |interp| {
        let b = interp.pop_as_int()?;
        let a = interp.pop_as_int()?;

        interp.push(Value::from(a + b));
        Ok(())
    });

    app.borrow_mut().add_native_word("*", |interp| {
        let b = interp.pop_as_int()?;
        let a = interp.pop_as_int()?;

        interp.push(Value::from(a * b));
        Ok(())
    });

    interp
}

fn stack_of(interp: &Interpreter) -> Vec<Value> {
    interp.stack().items().to_vec()
}

#[test]
fn initial_state() {
    let interp = Interpreter::new();

    assert_eq!(interp.stack().len(), 0);
    assert_eq!(interp.cur_module().borrow().name(), "");
    assert_eq!(interp.module_stack_depth(), 1);
}

#[test]
fn strings_push_their_contents() {
    let mut interp = Interpreter::new();

    interp.run(r#""hello""#).unwrap();

    assert_eq!(stack_of(&interp), vec![Value::from("hello")]);
}

#[test]
fn comments_are_ignored() {
    let mut interp = Interpreter::new();

    interp.run("# This is a comment").unwrap();
    assert_eq!(interp.stack().len(), 0);

    interp.run(r#""before" # trailing comment"#).unwrap();
    assert_eq!(interp.stack().len(), 1);
}

#[test]
fn empty_array() {
    let mut interp = Interpreter::new();

    interp.run("[]").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Array(Vec::new())]);
}

#[test]
fn array_with_items() {
    let mut interp = Interpreter::new();

    interp.run("[1 2 3]").unwrap();

    assert_eq!(
        stack_of(&interp),
        vec![Value::Array(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3)
        ])]
    );
}

#[test]
fn arrays_nest() {
    let mut interp = Interpreter::new();

    interp.run("[ 1 2 [ 3 4 ] 5 ]").unwrap();

    assert_eq!(
        stack_of(&interp),
        vec![Value::Array(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Array(vec![Value::Int(3), Value::Int(4)]),
            Value::Int(5),
        ])]
    );
}

#[test]
fn end_array_without_start_underflows() {
    let mut interp = Interpreter::new();

    let err = interp.run("]").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::StackUnderflow);
}

#[test]
fn adds_integers() {
    let mut interp = test_interpreter();

    interp.run("2 4 +").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(6)]);
}

#[test]
fn definitions_execute_their_bodies() {
    let mut interp = test_interpreter();

    interp.run(": DOUBLE 2 * ; 21 DOUBLE").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(42)]);
}

#[test]
fn definitions_are_installed_in_the_current_module() {
    let mut interp = Interpreter::new();

    interp.run(": PUSH_42 42 ;").unwrap();

    let module = interp.cur_module();
    assert!(module.borrow().find_dictionary_word("PUSH_42").is_some());
}

#[test]
fn definition_matches_direct_execution() {
    let mut direct = test_interpreter();
    direct.run("1 2 +").unwrap();

    let mut defined = test_interpreter();
    defined.run(": F 1 2 + ; F").unwrap();

    assert_eq!(stack_of(&direct), stack_of(&defined));
}

#[test]
fn later_definitions_shadow_earlier_ones() {
    let mut interp = Interpreter::new();

    interp.run(": W 1 ; : W 2 ; W").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(2)]);
}

#[test]
fn entering_an_unnamed_module_pushes_the_app_module() {
    let mut interp = Interpreter::new();

    interp.run("{").unwrap();

    assert_eq!(interp.module_stack_depth(), 2);
    assert_eq!(interp.cur_module().borrow().name(), "");
}

#[test]
fn entering_a_named_module() {
    let mut interp = Interpreter::new();

    interp.run("{mymodule").unwrap();

    assert_eq!(interp.cur_module().borrow().name(), "mymodule");
}

#[test]
fn leaving_a_module_restores_the_scope() {
    let mut interp = Interpreter::new();

    interp.run("{mymodule }").unwrap();

    assert_eq!(interp.cur_module().borrow().name(), "");
}

#[test]
fn popping_the_app_module_is_fatal() {
    let mut interp = Interpreter::new();

    let err = interp.run("}").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::ModuleStackUnderflow);
}

#[test]
fn module_words_are_immediate_inside_definitions() {
    let mut interp = Interpreter::new();

    interp.run(": W {mod } 1 ; W W").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(1), Value::Int(1)]);
    assert_eq!(interp.cur_module().borrow().name(), "");
}

#[test]
fn memo_definitions_install_three_words() {
    let mut interp = Interpreter::new();

    interp.run("@: CONSTANT 42 ;").unwrap();

    let module = interp.cur_module();
    let module = module.borrow();

    assert!(module.find_dictionary_word("CONSTANT").is_some());
    assert!(module.find_dictionary_word("CONSTANT!").is_some());
    assert!(module.find_dictionary_word("CONSTANT!@").is_some());
}

#[test]
fn memo_replays_the_cached_value_and_refresh_pushes_nothing() {
    let mut interp = test_interpreter();

    interp.run("@: X 2 3 + ; X X X!").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(5), Value::Int(5)]);
}

#[test]
fn memo_refresh_get_pushes_the_fresh_value() {
    let mut interp = test_interpreter();

    interp.run("@: X 2 3 + ; X! X!@").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(5)]);
}

#[test]
fn memo_bodies_run_once_until_refreshed() {
    let mut interp = Interpreter::new();
    let calls = Rc::new(Cell::new(0_i64));

    {
        let calls = calls.clone();

        interp.app_module().borrow_mut().add_native_word("TICK", move |interp| {
            calls.set(calls.get() + 1);
            interp.push(Value::from(calls.get()));
            Ok(())
        });
    }

    interp.run("@: T TICK ; T T T").unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(
        stack_of(&interp),
        vec![Value::Int(1), Value::Int(1), Value::Int(1)]
    );

    interp.run("T!").unwrap();
    assert_eq!(calls.get(), 2);

    interp.run("T").unwrap();
    assert_eq!(interp.stack().items().last(), Some(&Value::Int(2)));
}

#[test]
fn literal_words_push_typed_values() {
    let mut interp = Interpreter::new();

    interp.run("TRUE FALSE 42 3.14").unwrap();

    assert_eq!(
        stack_of(&interp),
        vec![
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(42),
            Value::Float(3.14)
        ]
    );
}

#[test]
fn datetime_literals_keep_their_zone() {
    let mut interp = Interpreter::new();

    interp.run("2025-05-20T08:00:00[America/Los_Angeles]").unwrap();

    let Value::DateTime(datetime) = &stack_of(&interp)[0] else {
        panic!("expected a datetime on the stack");
    };

    assert_eq!(datetime.hour(), 8);
    assert_eq!(datetime.minute(), 0);
    assert_eq!(datetime.timezone().name(), "America/Los_Angeles");
}

#[test]
fn unknown_words_error_with_a_location() {
    let mut interp = Interpreter::new();

    let err = interp.run("UNKNOWN_WORD").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::UnknownWord("UNKNOWN_WORD".to_owned()));
    assert!(err.location().is_some());
}

#[test]
fn missing_terminator_points_at_the_previous_token() {
    let mut interp = Interpreter::new();

    let err = interp.run(": W").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::MissingDefTerminator);

    let location = err.location().expect("expected a location");
    assert_eq!(location.line(), 1);
    assert_eq!(location.column(), 3);
}

#[test]
fn nested_definition_start_is_a_missing_terminator() {
    let mut interp = Interpreter::new();

    let err = interp.run(": A 1 : B 2 ;").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::MissingDefTerminator);
}

#[test]
fn extra_terminator_is_an_error() {
    let mut interp = Interpreter::new();

    let err = interp.run(";").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::ExtraDefTerminator);
    assert!(err.location().is_some());
}

#[test]
fn stack_underflow_carries_a_location() {
    let mut interp = test_interpreter();

    let err = interp.run("1 +").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::StackUnderflow);
    assert!(err.location().is_some());
}

#[test]
fn exported_words_import_under_the_module_prefix() {
    let mut interp = test_interpreter();

    interp
        .run("{mod : P 1 ; [\"P\"] EXPORT } [\"mod\"] USE-MODULES mod.P")
        .unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(1)]);
}

#[test]
fn unexported_words_do_not_cross_the_import_boundary() {
    let mut interp = test_interpreter();

    interp
        .run("{mod : P 1 ; : HIDDEN 2 ; [\"P\"] EXPORT } [\"mod\"] USE-MODULES")
        .unwrap();

    let err = interp.run("mod.HIDDEN").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownWord(_)));

    let err = interp.run("HIDDEN").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownWord(_)));
}

#[test]
fn explicit_empty_prefix_imports_unprefixed() {
    let mut interp = test_interpreter();

    interp
        .run("{mod : P 1 ; [\"P\"] EXPORT } [[\"mod\" \"\"]] USE-MODULES P")
        .unwrap();

    assert_eq!(stack_of(&interp), vec![Value::Int(1)]);
}

#[test]
fn importing_an_unknown_module_fails() {
    let mut interp = test_interpreter();

    let err = interp.run("[\"nope\"] USE-MODULES").unwrap_err();

    assert_eq!(*err.kind(), ErrorKind::UnknownModule("nope".to_owned()));
}

#[test]
fn words_defined_in_a_module_stay_out_of_the_app_scope() {
    let mut interp = Interpreter::new();

    interp.run("{mod : P 1 ; }").unwrap();

    let err = interp.run("P").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownWord(_)));
}

#[test]
fn custom_literal_handlers_take_priority() {
    let mut interp = Interpreter::new();

    interp.register_literal_handler(Rc::new(|text| {
        if text == "42" {
            Some(Value::from("custom"))
        } else {
            None
        }
    }));

    interp.run("42 43").unwrap();

    assert_eq!(
        stack_of(&interp),
        vec![Value::from("custom"), Value::Int(43)]
    );
}

#[test]
fn nested_runs_report_relative_locations() {
    let mut interp = Interpreter::new();
    let reference = CodeLocation::new("<inner>", 5, 1, 100, 100);

    let err = interp
        .run_with_location("UNKNOWN_WORD", Some(reference))
        .unwrap_err();

    let location = err.location().expect("expected a location");

    assert_eq!(location.source(), "<inner>");
    assert_eq!(location.line(), 5);
    assert_eq!(location.start_pos(), 100);
}

#[test]
fn dot_symbols_push_their_text() {
    let mut interp = Interpreter::new();

    interp.run(".separator").unwrap();

    assert_eq!(stack_of(&interp), vec![Value::from("separator")]);
}
