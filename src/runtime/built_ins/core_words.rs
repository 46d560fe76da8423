use crate::runtime::{
    data_structures::{value::Value, variable::VariablePtr, word_options::WordOptions},
    error::{self, ErrorKind, ScriptError},
    interpreter::Interpreter,
    module::{Module, ModulePtr},
};
use std::rc::Rc;

/// Get or create a variable in the current module, validating the name.  Names beginning with
/// `__` are reserved.
fn get_or_create_variable(interp: &mut Interpreter, name: &str) -> error::Result<VariablePtr> {
    if name.starts_with("__") {
        return Err(ScriptError::new(ErrorKind::InvalidVariableName(
            name.to_owned(),
        )));
    }

    Ok(interp.cur_module().borrow_mut().get_or_add_variable(name))
}

/// Accept either a variable handle or a string variable name.  String names auto-create the
/// variable in the current module.
fn resolve_variable(interp: &mut Interpreter, value: Value) -> error::Result<VariablePtr> {
    match value {
        Value::String(name) => get_or_create_variable(interp, &name),
        Value::Variable(variable) => Ok(variable),
        _ => Err(ScriptError::new(ErrorKind::Other(
            "Expected a variable or a variable name".to_owned(),
        ))),
    }
}

/// Discard the top value.
///
/// Signature: `value -- `
fn word_pop(interp: &mut Interpreter) -> error::Result<()> {
    let _ = interp.pop()?;
    Ok(())
}

/// Duplicate the top value.
///
/// Signature: `value -- value value`
fn word_dup(interp: &mut Interpreter) -> error::Result<()> {
    let value = interp.pop()?;

    interp.push(value.clone());
    interp.push(value);

    Ok(())
}

/// Swap the top two values.
///
/// Signature: `a b -- b a`
fn word_swap(interp: &mut Interpreter) -> error::Result<()> {
    let b = interp.pop()?;
    let a = interp.pop()?;

    interp.push(b);
    interp.push(a);

    Ok(())
}

/// Declare variables in the current module from an array of names.
///
/// Signature: `[name …] -- `
fn word_variables(interp: &mut Interpreter) -> error::Result<()> {
    let names = interp.pop_as_array()?;
    let module = interp.cur_module();

    for name in &names {
        if let Value::String(name) = name {
            if name.starts_with("__") {
                return Err(ScriptError::new(ErrorKind::InvalidVariableName(
                    name.clone(),
                )));
            }

            module.borrow_mut().add_variable(name, Value::None);
        }
    }

    Ok(())
}

/// Store a value in a variable.  Accepts a variable handle or a string name.
///
/// Signature: `value variable -- `
fn word_set(interp: &mut Interpreter) -> error::Result<()> {
    let variable = interp.pop()?;
    let value = interp.pop()?;

    let variable = resolve_variable(interp, variable)?;
    variable.borrow_mut().set_value(value);

    Ok(())
}

/// Fetch a variable's value.  Accepts a variable handle or a string name.
///
/// Signature: `variable -- value`
fn word_get(interp: &mut Interpreter) -> error::Result<()> {
    let variable = interp.pop()?;

    let variable = resolve_variable(interp, variable)?;
    let value = variable.borrow().value().clone();

    interp.push(value);
    Ok(())
}

/// Store a value in a variable and leave the stored value on the stack.
///
/// Signature: `value variable -- value`
fn word_set_get(interp: &mut Interpreter) -> error::Result<()> {
    let variable = interp.pop()?;
    let value = interp.pop()?;

    let variable = resolve_variable(interp, variable)?;
    variable.borrow_mut().set_value(value);

    let value = variable.borrow().value().clone();
    interp.push(value);

    Ok(())
}

/// Mark word names in the current module as exportable.
///
/// Signature: `[name …] -- `
fn word_export(interp: &mut Interpreter) -> error::Result<()> {
    let names = interp.pop_as_array()?;

    let names: Vec<String> = names
        .iter()
        .filter_map(|name| name.as_string().map(str::to_owned))
        .collect();

    interp.cur_module().borrow_mut().add_exportable(names);
    Ok(())
}

/// Import registered modules into the app module.  Entries are a module name or a
/// `[name, prefix]` pair.
///
/// Signature: `[entry …] -- `
fn word_use_modules(interp: &mut Interpreter) -> error::Result<()> {
    let entries = interp.pop_as_array()?;
    interp.use_modules(&entries)
}

/// Evaluate a string as Catena source on the same interpreter.
///
/// Signature: `string -- …`
fn word_interpret(interp: &mut Interpreter) -> error::Result<()> {
    match interp.pop()? {
        Value::None => Ok(()),
        Value::String(code) => interp.run(&code),
        _ => Ok(()),
    }
}

/// Leave the stack untouched.
///
/// Signature: ` -- `
fn word_identity(_interp: &mut Interpreter) -> error::Result<()> {
    Ok(())
}

/// Leave the stack untouched.
///
/// Signature: ` -- `
fn word_nop(_interp: &mut Interpreter) -> error::Result<()> {
    Ok(())
}

/// Push the null value.
///
/// Signature: ` -- null`
fn word_null(interp: &mut Interpreter) -> error::Result<()> {
    interp.push(Value::None);
    Ok(())
}

/// Is the top value an array?
///
/// Signature: `value -- bool`
fn word_array_check(interp: &mut Interpreter) -> error::Result<()> {
    let value = interp.pop()?;

    interp.push(Value::Bool(value.is_array()));
    Ok(())
}

/// Is the value missing for defaulting purposes?  Null and the empty string both count.
fn is_missing(value: &Value) -> bool {
    value.is_none() || matches!(value, Value::String(text) if text.is_empty())
}

/// Replace a null or empty value with a default.
///
/// Signature: `value default -- value-or-default`
fn word_default(interp: &mut Interpreter) -> error::Result<()> {
    let default_value = interp.pop()?;
    let value = interp.pop()?;

    if is_missing(&value) {
        interp.push(default_value);
    } else {
        interp.push(value);
    }

    Ok(())
}

/// Replace a null or empty value with the result of evaluating a default expression.  The
/// expression only runs when it is needed.
///
/// Signature: `value default-code -- value-or-result`
fn word_default_star(interp: &mut Interpreter) -> error::Result<()> {
    let default_code = interp.pop()?;
    let value = interp.pop()?;

    if is_missing(&value) {
        if let Value::String(code) = default_code {
            interp.run(&code)?;

            let result = interp.pop()?;
            interp.push(result);

            return Ok(());
        }
    }

    interp.push(value);
    Ok(())
}

/// Convert a flat array of dot-symbol keys and values into a word options carrier.
///
/// Signature: `[k1 v1 …] -- options`
fn word_to_options(interp: &mut Interpreter) -> error::Result<()> {
    let values = interp.pop_as_array()?;
    let options = WordOptions::from_flat_array(&values)?;

    interp.push(Value::from(options));
    Ok(())
}

/// Pop a value that may be followed by a word options carrier on top of it.
fn pop_value_and_options(interp: &mut Interpreter) -> error::Result<(Value, Rc<WordOptions>)> {
    let top = interp.pop()?;

    if let Value::Options(options) = top {
        let value = interp.pop()?;
        Ok((value, options))
    } else {
        Ok((top, Rc::new(WordOptions::new())))
    }
}

fn string_option(options: &WordOptions, key: &str, default: &str) -> String {
    match options.get(key) {
        Some(Value::String(text)) => text.clone(),
        _ => default.to_owned(),
    }
}

fn bool_option(options: &WordOptions, key: &str) -> bool {
    matches!(options.get(key), Some(Value::Bool(true)))
}

/// Render a value as display text, honoring the separator, null text, and JSON options.
fn value_to_string(value: &Value, separator: &str, null_text: &str, use_json: bool) -> String {
    if value.is_none() {
        return null_text.to_owned();
    }

    if use_json {
        return value.to_json().to_string();
    }

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| value_to_string(item, separator, null_text, false))
            .collect::<Vec<String>>()
            .join(separator),

        Value::Record(_) => value.to_json().to_string(),

        _ => value.to_string(),
    }
}

/// Replace `.name` references in a string with the named variables' values.  A reference counts
/// only at the start of the string or after whitespace, and `\.` escapes a literal dot.
/// References to reserved names are left as written.
fn interpolate_string(
    interp: &mut Interpreter,
    text: &str,
    separator: &str,
    null_text: &str,
    use_json: bool,
) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if ch == '\\' && chars.get(index + 1) == Some(&'.') {
            result.push('.');
            index += 2;
            continue;
        }

        let at_reference_start = index == 0 || chars[index - 1].is_whitespace();

        if ch == '.' && at_reference_start {
            let mut end = index + 1;

            if end < chars.len() && (chars[end].is_ascii_alphabetic() || chars[end] == '_') {
                end += 1;

                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric()
                        || chars[end] == '_'
                        || chars[end] == '-')
                {
                    end += 1;
                }

                let name: String = chars[index + 1..end].iter().collect();

                if let Ok(variable) = get_or_create_variable(interp, &name) {
                    let value = variable.borrow().value().clone();

                    result.push_str(&value_to_string(&value, separator, null_text, use_json));
                    index = end;
                    continue;
                }
            }
        }

        result.push(ch);
        index += 1;
    }

    result
}

/// Interpolate variable references in a string.  Accepts an optional trailing options carrier
/// with `separator`, `null_text`, and `json` keys.
///
/// Signature: `string -- string` or `string options -- string`
fn word_interpolate(interp: &mut Interpreter) -> error::Result<()> {
    let (value, options) = pop_value_and_options(interp)?;

    let separator = string_option(&options, "separator", ", ");
    let null_text = string_option(&options, "null_text", "null");
    let use_json = bool_option(&options, "json");

    let text = match &value {
        Value::String(text) => text.clone(),
        _ => String::new(),
    };

    let result = interpolate_string(interp, &text, &separator, &null_text, use_json);

    interp.push(Value::String(result));
    Ok(())
}

/// Print a value.  Strings are interpolated first; everything else is rendered directly.
/// Accepts the same options as INTERPOLATE.
///
/// Signature: `value -- ` or `value options -- `
fn word_print(interp: &mut Interpreter) -> error::Result<()> {
    let (value, options) = pop_value_and_options(interp)?;

    let separator = string_option(&options, "separator", ", ");
    let null_text = string_option(&options, "null_text", "null");
    let use_json = bool_option(&options, "json");

    let result = match &value {
        Value::String(text) => {
            let text = text.clone();
            interpolate_string(interp, &text, &separator, &null_text, use_json)
        }
        _ => value_to_string(&value, &separator, &null_text, use_json),
    };

    println!("{}", result);
    Ok(())
}

/// Print the top of the stack and halt the run.
///
/// Signature: `… -- …` (halts)
fn word_peek(interp: &mut Interpreter) -> error::Result<()> {
    match interp.stack().peek() {
        Some(value) => println!("{}", value),
        None => println!("<STACK EMPTY>"),
    }

    Err(ScriptError::new(ErrorKind::IntentionalStop(
        "PEEK!".to_owned(),
    )))
}

/// Print the whole stack, top first, as pretty JSON, and halt the run.
///
/// Signature: `… -- …` (halts)
fn word_stack_debug(interp: &mut Interpreter) -> error::Result<()> {
    let reversed: Vec<serde_json::Value> = interp
        .stack()
        .items()
        .iter()
        .rev()
        .map(Value::to_json)
        .collect();

    let rendered =
        serde_json::to_string_pretty(&reversed).unwrap_or_else(|_| "[]".to_owned());

    println!("{}", rendered);

    Err(ScriptError::new(ErrorKind::IntentionalStop(
        "STACK!".to_owned(),
    )))
}

/// Build the core module.  Every word is exportable.
pub fn new_core_module() -> ModulePtr {
    let module = Module::new("core");

    {
        let mut module = module.borrow_mut();

        // Stack operations.
        module.add_native_word("POP", word_pop);
        module.add_native_word("DUP", word_dup);
        module.add_native_word("SWAP", word_swap);

        // Variable operations.
        module.add_native_word("VARIABLES", word_variables);
        module.add_native_word("!", word_set);
        module.add_native_word("@", word_get);
        module.add_native_word("!@", word_set_get);

        // Module operations.
        module.add_native_word("EXPORT", word_export);
        module.add_native_word("USE-MODULES", word_use_modules);

        // Execution.
        module.add_native_word("INTERPRET", word_interpret);

        // Control flow helpers.
        module.add_native_word("IDENTITY", word_identity);
        module.add_native_word("NOP", word_nop);
        module.add_native_word("NULL", word_null);
        module.add_native_word("ARRAY?", word_array_check);
        module.add_native_word("DEFAULT", word_default);
        module.add_native_word("*DEFAULT", word_default_star);

        // Options.
        module.add_native_word("~>", word_to_options);

        // String operations.
        module.add_native_word("INTERPOLATE", word_interpolate);
        module.add_native_word("PRINT", word_print);

        // Debug.
        module.add_native_word("PEEK!", word_peek);
        module.add_native_word("STACK!", word_stack_debug);
    }

    module
}
