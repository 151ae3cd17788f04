//! Built-in functions and value formatting.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::type_name;

type Func = fn(&[Value]) -> Result<Value, String>;

fn lookup(name: &str) -> Option<Func> {
    Some(match name {
        "and" => and,
        "or" => or,
        "not" => not,
        "eq" => eq,
        "ne" => ne,
        "lt" => lt,
        "le" => le,
        "gt" => gt,
        "ge" => ge,
        "len" => len,
        "index" => index,
        "print" => print,
        "printf" => printf,
        "println" => println,
        "replace" => replace,
        "quote" => quote,
        "squote" => squote,
        "upper" => upper,
        "lower" => lower,
        "trim" => trim,
        "trimPrefix" => trim_prefix,
        "trimSuffix" => trim_suffix,
        "contains" => contains,
        "hasPrefix" => has_prefix,
        "hasSuffix" => has_suffix,
        "default" => default,
        _ => return None,
    })
}

pub(crate) fn is_defined(name: &str) -> bool {
    lookup(name).is_some()
}

pub(crate) fn call(name: &str, args: &[Value]) -> Result<Value, String> {
    let func = lookup(name).ok_or_else(|| format!("function {:?} not defined", name))?;
    func(args)
}

/// Truthiness: false, 0, nil and empty strings or collections are false.
pub(crate) fn truth(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Format a value the way `{{ . }}` prints it.
pub(crate) fn print_value(value: &Value) -> String {
    match value {
        Value::Null => "<no value>".to_string(),
        other => format_value(other),
    }
}

/// `%v` formatting.
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(" "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}:{}", k, format_value(v)))
                .collect();
            format!("map[{}]", entries.join(" "))
        }
    }
}

fn to_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => format_value(other),
    }
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn at_least(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() < want {
        return Err(format!(
            "wrong number of args for {}: want at least {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn and(args: &[Value]) -> Result<Value, String> {
    at_least("and", args, 1)?;
    let found = args.iter().find(|v| !truth(v)).unwrap_or(&args[args.len() - 1]);
    Ok(found.clone())
}

fn or(args: &[Value]) -> Result<Value, String> {
    at_least("or", args, 1)?;
    let found = args.iter().find(|v| truth(v)).unwrap_or(&args[args.len() - 1]);
    Ok(found.clone())
}

fn not(args: &[Value]) -> Result<Value, String> {
    arity("not", args, 1)?;
    Ok(Value::Bool(!truth(&args[0])))
}

fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

fn equal(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Number(x), Value::Number(y)) => Ok(compare_numbers(x, y) == Ordering::Equal),
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            Err("non-comparable type".to_string())
        }
        _ => Err("incompatible types for comparison".to_string()),
    }
}

fn order(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(compare_numbers(x, y)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            Err("incompatible types for comparison".to_string())
        }
        _ => Err(format!("invalid type for comparison: {}", type_name(a))),
    }
}

fn eq(args: &[Value]) -> Result<Value, String> {
    at_least("eq", args, 2)?;
    for other in &args[1..] {
        if equal(&args[0], other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn ne(args: &[Value]) -> Result<Value, String> {
    arity("ne", args, 2)?;
    Ok(Value::Bool(!equal(&args[0], &args[1])?))
}

fn lt(args: &[Value]) -> Result<Value, String> {
    arity("lt", args, 2)?;
    Ok(Value::Bool(order(&args[0], &args[1])? == Ordering::Less))
}

fn le(args: &[Value]) -> Result<Value, String> {
    arity("le", args, 2)?;
    Ok(Value::Bool(order(&args[0], &args[1])? != Ordering::Greater))
}

fn gt(args: &[Value]) -> Result<Value, String> {
    arity("gt", args, 2)?;
    Ok(Value::Bool(order(&args[0], &args[1])? == Ordering::Greater))
}

fn ge(args: &[Value]) -> Result<Value, String> {
    arity("ge", args, 2)?;
    Ok(Value::Bool(order(&args[0], &args[1])? != Ordering::Less))
}

fn len(args: &[Value]) -> Result<Value, String> {
    arity("len", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.len())),
        Value::Array(a) => Ok(Value::from(a.len())),
        Value::Object(o) => Ok(Value::from(o.len())),
        other => Err(format!("len of type {}", type_name(other))),
    }
}

fn index(args: &[Value]) -> Result<Value, String> {
    at_least("index", args, 1)?;
    let mut item = args[0].clone();
    for key in &args[1..] {
        item = match (&item, key) {
            (Value::Array(items), Value::Number(n)) => {
                let i = n
                    .as_i64()
                    .ok_or_else(|| format!("cannot index slice/array with type {}", type_name(key)))?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| format!("index out of range: {}", i))?
            }
            (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or(Value::Null),
            (Value::Null, _) => return Err("index of untyped nil".to_string()),
            (Value::Array(_), _) => {
                return Err(format!("cannot index slice/array with type {}", type_name(key)))
            }
            _ => return Err(format!("can't index item of type {}", type_name(&item))),
        };
    }
    Ok(item)
}

fn print(args: &[Value]) -> Result<Value, String> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !args[i - 1].is_string() && !arg.is_string() {
            out.push(' ');
        }
        out.push_str(&format_value(arg));
    }
    Ok(Value::String(out))
}

fn println(args: &[Value]) -> Result<Value, String> {
    let items: Vec<String> = args.iter().map(format_value).collect();
    Ok(Value::String(format!("{}\n", items.join(" "))))
}

fn printf(args: &[Value]) -> Result<Value, String> {
    at_least("printf", args, 1)?;
    Ok(Value::String(sprintf(&to_str(&args[0]), &args[1..])))
}

fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn bad_verb(verb: char, arg: &Value) -> String {
    format!("%!{}({}={})", verb, type_name(arg), format_value(arg))
}

/// A subset of Go's `fmt.Sprintf`: `%s`, `%v`, `%d`, `%q`, `%t` and `%%`.
fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut remaining = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = remaining.next() else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        let formatted = match (verb, arg) {
            ('s' | 'v', _) => format_value(arg),
            ('d', Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            ('q', Value::String(s)) => quoted(s),
            ('t', Value::Bool(b)) => b.to_string(),
            _ => bad_verb(verb, arg),
        };
        out.push_str(&formatted);
    }
    let extra: Vec<String> = remaining
        .map(|v| format!("{}={}", type_name(v), format_value(v)))
        .collect();
    if !extra.is_empty() {
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

fn replace(args: &[Value]) -> Result<Value, String> {
    arity("replace", args, 3)?;
    let (old, new, s) = (to_str(&args[0]), to_str(&args[1]), to_str(&args[2]));
    Ok(Value::String(s.replace(&old, &new)))
}

fn quote(args: &[Value]) -> Result<Value, String> {
    let items: Vec<String> = args
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| quoted(&to_str(v)))
        .collect();
    Ok(Value::String(items.join(" ")))
}

fn squote(args: &[Value]) -> Result<Value, String> {
    let items: Vec<String> = args
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| format!("'{}'", to_str(v)))
        .collect();
    Ok(Value::String(items.join(" ")))
}

fn upper(args: &[Value]) -> Result<Value, String> {
    arity("upper", args, 1)?;
    Ok(Value::String(to_str(&args[0]).to_uppercase()))
}

fn lower(args: &[Value]) -> Result<Value, String> {
    arity("lower", args, 1)?;
    Ok(Value::String(to_str(&args[0]).to_lowercase()))
}

fn trim(args: &[Value]) -> Result<Value, String> {
    arity("trim", args, 1)?;
    Ok(Value::String(to_str(&args[0]).trim().to_string()))
}

fn trim_prefix(args: &[Value]) -> Result<Value, String> {
    arity("trimPrefix", args, 2)?;
    let (prefix, s) = (to_str(&args[0]), to_str(&args[1]));
    Ok(Value::String(s.strip_prefix(&prefix).unwrap_or(&s).to_string()))
}

fn trim_suffix(args: &[Value]) -> Result<Value, String> {
    arity("trimSuffix", args, 2)?;
    let (suffix, s) = (to_str(&args[0]), to_str(&args[1]));
    Ok(Value::String(s.strip_suffix(&suffix).unwrap_or(&s).to_string()))
}

fn contains(args: &[Value]) -> Result<Value, String> {
    arity("contains", args, 2)?;
    Ok(Value::Bool(to_str(&args[1]).contains(&to_str(&args[0]))))
}

fn has_prefix(args: &[Value]) -> Result<Value, String> {
    arity("hasPrefix", args, 2)?;
    Ok(Value::Bool(to_str(&args[1]).starts_with(&to_str(&args[0]))))
}

fn has_suffix(args: &[Value]) -> Result<Value, String> {
    arity("hasSuffix", args, 2)?;
    Ok(Value::Bool(to_str(&args[1]).ends_with(&to_str(&args[0]))))
}

/// `default DEFAULT GIVEN`: GIVEN unless it is empty.
fn default(args: &[Value]) -> Result<Value, String> {
    at_least("default", args, 1)?;
    if args.len() > 2 {
        return Err(format!("wrong number of args for default: want 1 or 2 got {}", args.len()));
    }
    match args.get(1) {
        Some(given) if truth(given) => Ok(given.clone()),
        _ => Ok(args[0].clone()),
    }
}
