use std::sync::LazyLock;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::env::EnvRef;
use super::error::EvalError;
use super::runtime_value::{NativeFn, ObjectRef, Value};
use super::{ConsoleLevel, Interpreter};
use crate::number::format_number;
use crate::range::Position;

type MethodTable = LazyLock<FxHashMap<&'static str, NativeFn>>;

/// Names installed into every global scope.
pub const GLOBAL_NAMES: &[&str] = &[
    "console",
    "Math",
    "JSON",
    "Object",
    "Array",
    "String",
    "Number",
    "Boolean",
    "Error",
    "TypeError",
    "ReferenceError",
    "RangeError",
    "SyntaxError",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "undefined",
    "NaN",
    "Infinity",
];

#[inline(always)]
fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn native(name: &str, func: NativeFn) -> Value {
    Value::Object(ObjectRef::native(name, func))
}

fn namespace(methods: &MethodTable) -> ObjectRef {
    let object = ObjectRef::ordinary();
    for (name, func) in methods.iter().sorted_by_key(|(name, _)| **name) {
        object.set(SmolStr::new(name), native(name, *func));
    }
    object
}

fn console_write(interpreter: &Interpreter, level: ConsoleLevel, args: &[Value]) -> Result<Value, EvalError> {
    let text = args.iter().map(|value| value.to_string()).join(" ");
    (interpreter.console())(level, &text);
    Ok(Value::Undefined)
}

fn error_object(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        message => message.to_string(),
    };
    Ok(Value::Object(ObjectRef::error(name, message)))
}

static CONSOLE: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("log", |interpreter, _, args, _| {
        console_write(interpreter, ConsoleLevel::Log, args)
    });
    map.insert("info", |interpreter, _, args, _| {
        console_write(interpreter, ConsoleLevel::Info, args)
    });
    map.insert("debug", |interpreter, _, args, _| {
        console_write(interpreter, ConsoleLevel::Debug, args)
    });
    map.insert("warn", |interpreter, _, args, _| {
        console_write(interpreter, ConsoleLevel::Warn, args)
    });
    map.insert("error", |interpreter, _, args, _| {
        console_write(interpreter, ConsoleLevel::Error, args)
    });
    map
});

static MATH: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("floor", |_, _, args, _| Ok(arg(args, 0).to_number().floor().into()));
    map.insert("ceil", |_, _, args, _| Ok(arg(args, 0).to_number().ceil().into()));
    map.insert("round", |_, _, args, _| {
        Ok((arg(args, 0).to_number() + 0.5).floor().into())
    });
    map.insert("trunc", |_, _, args, _| Ok(arg(args, 0).to_number().trunc().into()));
    map.insert("abs", |_, _, args, _| Ok(arg(args, 0).to_number().abs().into()));
    map.insert("sqrt", |_, _, args, _| Ok(arg(args, 0).to_number().sqrt().into()));
    map.insert("pow", |_, _, args, _| {
        Ok(arg(args, 0).to_number().powf(arg(args, 1).to_number()).into())
    });
    map.insert("max", |_, _, args, _| {
        Ok(args
            .iter()
            .map(Value::to_number)
            .fold(f64::NEG_INFINITY, |max, n| if n.is_nan() || max.is_nan() { f64::NAN } else { max.max(n) })
            .into())
    });
    map.insert("min", |_, _, args, _| {
        Ok(args
            .iter()
            .map(Value::to_number)
            .fold(f64::INFINITY, |min, n| if n.is_nan() || min.is_nan() { f64::NAN } else { min.min(n) })
            .into())
    });
    map
});

static JSON: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("stringify", |_, _, args, position| {
        let mut seen = Vec::new();
        Ok(stringify(&arg(args, 0), &mut seen, position)?
            .map(Value::from)
            .unwrap_or_default())
    });
    map
});

static OBJECT: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("keys", |_, _, args, position| match arg(args, 0) {
        Value::Object(object) => Ok(Value::Object(ObjectRef::array(
            object.keys().into_iter().map(Value::String).collect(),
        ))),
        Value::String(s) => Ok(Value::Object(ObjectRef::array(
            (0..s.chars().count()).map(|i| Value::from(i.to_string())).collect(),
        ))),
        value if value.is_nullish() => Err(EvalError::type_error(
            "Cannot convert undefined or null to object",
            position,
        )),
        _ => Ok(Value::Object(ObjectRef::array(Vec::new()))),
    });
    map
});

static ARRAY: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("isArray", |_, _, args, _| Ok(arg(args, 0).is_array().into()));
    map
});

static GLOBAL_FUNCTIONS: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("parseInt", |_, _, args, _| {
        let radix = match arg(args, 1) {
            Value::Undefined => None,
            radix => Some(radix.to_number() as u32),
        };
        Ok(parse_int(&arg(args, 0).to_string(), radix).into())
    });
    map.insert("parseFloat", |_, _, args, _| {
        Ok(parse_float(&arg(args, 0).to_string()).into())
    });
    map.insert("isNaN", |_, _, args, _| Ok(arg(args, 0).to_number().is_nan().into()));
    map.insert("isFinite", |_, _, args, _| {
        Ok(arg(args, 0).to_number().is_finite().into())
    });
    map.insert("String", |_, _, args, _| {
        Ok(args.first().map(|value| value.to_string()).unwrap_or_default().into())
    });
    map.insert("Number", |_, _, args, _| {
        Ok(args.first().map(Value::to_number).unwrap_or(0.0).into())
    });
    map.insert("Boolean", |_, _, args, _| Ok(arg(args, 0).is_truthy().into()));
    map.insert("Error", |_, _, args, _| error_object("Error", args));
    map.insert("TypeError", |_, _, args, _| error_object("TypeError", args));
    map.insert("ReferenceError", |_, _, args, _| {
        error_object("ReferenceError", args)
    });
    map.insert("RangeError", |_, _, args, _| error_object("RangeError", args));
    map.insert("SyntaxError", |_, _, args, _| error_object("SyntaxError", args));
    map
});

static STRING_METHODS: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("charAt", |_, this, args, _| {
        let index = arg(args, 0).to_number();
        let index = if index.is_nan() { 0.0 } else { index };
        Ok(this
            .to_string()
            .chars()
            .nth(index as usize)
            .filter(|_| index >= 0.0)
            .map(|c| c.to_string())
            .unwrap_or_default()
            .into())
    });
    map.insert("indexOf", |_, this, args, _| {
        let s = this.to_string();
        let needle = arg(args, 0).to_string();
        Ok(s.find(&needle)
            .map(|byte| s[..byte].chars().count() as f64)
            .unwrap_or(-1.0)
            .into())
    });
    map.insert("includes", |_, this, args, _| {
        Ok(this.to_string().contains(&arg(args, 0).to_string()).into())
    });
    map.insert("startsWith", |_, this, args, _| {
        Ok(this.to_string().starts_with(&arg(args, 0).to_string()).into())
    });
    map.insert("endsWith", |_, this, args, _| {
        Ok(this.to_string().ends_with(&arg(args, 0).to_string()).into())
    });
    map.insert("slice", |_, this, args, _| {
        let chars = this.to_string().chars().collect::<Vec<_>>();
        let start = relative_index(&arg(args, 0), chars.len(), 0);
        let end = relative_index(&arg(args, 1), chars.len(), chars.len());
        Ok(chars[start..end.max(start)].iter().collect::<String>().into())
    });
    map.insert("substring", |_, this, args, _| {
        let chars = this.to_string().chars().collect::<Vec<_>>();
        let clamp = |value: Value, default: usize| match value {
            Value::Undefined => default,
            value => {
                let n = value.to_number();
                if n.is_nan() || n < 0.0 { 0 } else { (n as usize).min(chars.len()) }
            }
        };
        let (a, b) = (clamp(arg(args, 0), 0), clamp(arg(args, 1), chars.len()));
        Ok(chars[a.min(b)..a.max(b)].iter().collect::<String>().into())
    });
    map.insert("toUpperCase", |_, this, _, _| Ok(this.to_string().to_uppercase().into()));
    map.insert("toLowerCase", |_, this, _, _| Ok(this.to_string().to_lowercase().into()));
    map.insert("trim", |_, this, _, _| Ok(this.to_string().trim().into()));
    map.insert("split", |_, this, args, _| {
        let s = this.to_string();
        let parts = match arg(args, 0) {
            Value::Undefined => vec![Value::from(s)],
            separator => {
                let separator = separator.to_string();
                if separator.is_empty() {
                    s.chars().map(|c| Value::from(c.to_string())).collect()
                } else {
                    s.split(separator.as_str()).map(Value::from).collect()
                }
            }
        };
        Ok(Value::Object(ObjectRef::array(parts)))
    });
    map.insert("replace", |_, this, args, _| {
        Ok(this
            .to_string()
            .replacen(&arg(args, 0).to_string(), &arg(args, 1).to_string(), 1)
            .into())
    });
    map
});

static NUMBER_METHODS: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("toFixed", |_, this, args, position| {
        let digits = arg(args, 0).to_number();
        let digits = if digits.is_nan() { 0.0 } else { digits };
        if !(0.0..=100.0).contains(&digits) {
            return Err(EvalError::range_error(
                "toFixed() digits argument must be between 0 and 100",
                position,
            ));
        }
        let n = this.to_number();
        if !n.is_finite() {
            return Ok(format_number(n).into());
        }
        Ok(format!("{:.*}", digits as usize, n).into())
    });
    map.insert("toString", |_, this, args, position| {
        let n = this.to_number();
        match arg(args, 0) {
            Value::Undefined => Ok(format_number(n).into()),
            radix => {
                let radix = radix.to_number() as u32;
                if !(2..=36).contains(&radix) {
                    return Err(EvalError::range_error(
                        "toString() radix must be between 2 and 36",
                        position,
                    ));
                }
                Ok(to_radix_string(n, radix).into())
            }
        }
    });
    map
});

static ARRAY_METHODS: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("push", |_, this, args, _| {
        Ok(this_array(this)
            .with_array(|items| {
                items.extend(args.iter().cloned());
                items.len() as f64
            })
            .unwrap_or_default()
            .into())
    });
    map.insert("pop", |_, this, _, _| {
        Ok(this_array(this).with_array(Vec::pop).flatten().unwrap_or_default())
    });
    map.insert("shift", |_, this, _, _| {
        Ok(this_array(this)
            .with_array(|items| (!items.is_empty()).then(|| items.remove(0)))
            .flatten()
            .unwrap_or_default())
    });
    map.insert("unshift", |_, this, args, _| {
        Ok(this_array(this)
            .with_array(|items| {
                items.splice(0..0, args.iter().cloned());
                items.len() as f64
            })
            .unwrap_or_default()
            .into())
    });
    map.insert("join", |_, this, args, _| {
        let separator = match arg(args, 0) {
            Value::Undefined => SmolStr::new(","),
            separator => SmolStr::new(separator.to_string()),
        };
        Ok(items_of(this)
            .iter()
            .map(|item| if item.is_nullish() { String::new() } else { item.to_string() })
            .join(&separator)
            .into())
    });
    map.insert("indexOf", |_, this, args, _| {
        let needle = arg(args, 0);
        Ok(items_of(this)
            .iter()
            .position(|item| item.strict_equals(&needle))
            .map(|i| i as f64)
            .unwrap_or(-1.0)
            .into())
    });
    map.insert("includes", |_, this, args, _| {
        let needle = arg(args, 0);
        Ok(items_of(this).iter().any(|item| *item == needle).into())
    });
    map.insert("slice", |_, this, args, _| {
        let items = items_of(this);
        let start = relative_index(&arg(args, 0), items.len(), 0);
        let end = relative_index(&arg(args, 1), items.len(), items.len());
        Ok(Value::Object(ObjectRef::array(items[start..end.max(start)].to_vec())))
    });
    map.insert("concat", |_, this, args, _| {
        let mut items = items_of(this);
        for value in args {
            match value.as_object().and_then(ObjectRef::array_items) {
                Some(more) => items.extend(more),
                None => items.push(value.clone()),
            }
        }
        Ok(Value::Object(ObjectRef::array(items)))
    });
    map.insert("reverse", |_, this, _, _| {
        this_array(this).with_array(|items| items.reverse());
        Ok(this.clone())
    });
    map.insert("map", |interpreter, this, args, position| {
        let callback = callback(args, position)?;
        let mut mapped = Vec::new();
        for (i, item) in items_of(this).into_iter().enumerate() {
            mapped.push(interpreter.call_function(
                &callback,
                Value::Undefined,
                vec![item, (i as f64).into(), this.clone()],
                position,
            )?);
        }
        Ok(Value::Object(ObjectRef::array(mapped)))
    });
    map.insert("filter", |interpreter, this, args, position| {
        let callback = callback(args, position)?;
        let mut kept = Vec::new();
        for (i, item) in items_of(this).into_iter().enumerate() {
            let keep = interpreter.call_function(
                &callback,
                Value::Undefined,
                vec![item.clone(), (i as f64).into(), this.clone()],
                position,
            )?;
            if keep.is_truthy() {
                kept.push(item);
            }
        }
        Ok(Value::Object(ObjectRef::array(kept)))
    });
    map.insert("forEach", |interpreter, this, args, position| {
        let callback = callback(args, position)?;
        for (i, item) in items_of(this).into_iter().enumerate() {
            interpreter.call_function(
                &callback,
                Value::Undefined,
                vec![item, (i as f64).into(), this.clone()],
                position,
            )?;
        }
        Ok(Value::Undefined)
    });
    map.insert("find", |interpreter, this, args, position| {
        let callback = callback(args, position)?;
        for (i, item) in items_of(this).into_iter().enumerate() {
            let found = interpreter.call_function(
                &callback,
                Value::Undefined,
                vec![item.clone(), (i as f64).into(), this.clone()],
                position,
            )?;
            if found.is_truthy() {
                return Ok(item);
            }
        }
        Ok(Value::Undefined)
    });
    map.insert("some", |interpreter, this, args, position| {
        let callback = callback(args, position)?;
        for (i, item) in items_of(this).into_iter().enumerate() {
            let matched = interpreter.call_function(
                &callback,
                Value::Undefined,
                vec![item, (i as f64).into(), this.clone()],
                position,
            )?;
            if matched.is_truthy() {
                return Ok(true.into());
            }
        }
        Ok(false.into())
    });
    map.insert("reduce", |interpreter, this, args, position| {
        let callback = callback(args, position)?;
        let mut items = items_of(this).into_iter().enumerate();
        let mut accumulator = match args.get(1) {
            Some(initial) => initial.clone(),
            None => match items.next() {
                Some((_, first)) => first,
                None => {
                    return Err(EvalError::type_error(
                        "Reduce of empty array with no initial value",
                        position,
                    ));
                }
            },
        };
        for (i, item) in items {
            accumulator = interpreter.call_function(
                &callback,
                Value::Undefined,
                vec![accumulator, item, (i as f64).into(), this.clone()],
                position,
            )?;
        }
        Ok(accumulator)
    });
    map
});

static OBJECT_METHODS: MethodTable = LazyLock::new(|| {
    let mut map: FxHashMap<&'static str, NativeFn> = FxHashMap::default();
    map.insert("hasOwnProperty", |_, this, args, _| {
        let key = arg(args, 0).to_property_key();
        Ok(this
            .as_object()
            .is_some_and(|object| object.has_own(&key))
            .into())
    });
    map.insert("toString", |_, this, _, _| Ok(this.to_string().into()));
    map
});

fn this_array(this: &Value) -> ObjectRef {
    this.as_object().cloned().unwrap_or_else(|| ObjectRef::array(Vec::new()))
}

fn items_of(this: &Value) -> Vec<Value> {
    this.as_object()
        .and_then(ObjectRef::array_items)
        .unwrap_or_default()
}

fn callback(args: &[Value], position: Position) -> Result<Value, EvalError> {
    match args.first() {
        Some(callback) if callback.is_function() => Ok(callback.clone()),
        value => Err(EvalError::type_error(
            format!("{:?} is not a function", value.cloned().unwrap_or_default()),
            position,
        )),
    }
}

/// Resolves a possibly negative index argument against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }

    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n.trunc()).max(0.0) as usize
    } else {
        (n.trunc() as usize).min(len)
    }
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() || n.fract() != 0.0 || radix == 10 {
        return format_number(n);
    }

    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        digits.push(std::char::from_digit((value % radix as u64) as u32, radix).unwrap_or('0'));
        value /= radix as u64;
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.into_iter().rev().collect()
}

pub(crate) fn parse_int(s: &str, radix: Option<u32>) -> f64 {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, s) = match radix {
        None | Some(0) | Some(16) if s.starts_with("0x") || s.starts_with("0X") => (16, &s[2..]),
        None | Some(0) => (10, s),
        Some(radix) if (2..=36).contains(&radix) => (radix, s),
        Some(_) => return f64::NAN,
    };

    let digits = s.chars().take_while(|c| c.is_digit(radix)).collect::<String>();
    if digits.is_empty() {
        return f64::NAN;
    }

    let n = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, digit| acc * radix as f64 + digit as f64);

    if negative { -n } else { n }
}

pub(crate) fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let unsigned = s.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    // Longest prefix that still parses as a number.
    (1..=s.len())
        .rev()
        .filter(|end| s.is_char_boundary(*end))
        .find_map(|end| {
            let prefix = &s[..end];
            prefix
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
                .then(|| prefix.parse::<f64>().ok())
                .flatten()
        })
        .unwrap_or(f64::NAN)
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if (c as u32) < 0x20 => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// `None` for values JSON cannot represent (`undefined`, functions).
fn stringify(value: &Value, seen: &mut Vec<ObjectRef>, position: Position) -> Result<Option<String>, EvalError> {
    let object = match value {
        Value::Undefined => return Ok(None),
        Value::Null => return Ok(Some("null".to_string())),
        Value::Bool(b) => return Ok(Some(b.to_string())),
        Value::Number(n) if n.is_finite() => return Ok(Some(format_number(*n))),
        Value::Number(_) => return Ok(Some("null".to_string())),
        Value::String(s) => return Ok(Some(quote(s))),
        Value::Object(object) if object.is_function() => return Ok(None),
        Value::Object(object) => object,
    };

    if seen.iter().any(|visited| visited.ptr_eq(object)) {
        return Err(EvalError::type_error("Converting circular structure to JSON", position));
    }
    seen.push(object.clone());

    let json = if let Some(items) = object.array_items() {
        let items = items
            .iter()
            .map(|item| Ok(stringify(item, seen, position)?.unwrap_or_else(|| "null".to_string())))
            .collect::<Result<Vec<_>, EvalError>>()?;
        format!("[{}]", items.join(","))
    } else {
        let mut members = Vec::new();
        for key in object.keys() {
            let member = object.get(&key).unwrap_or_default();
            if let Some(json) = stringify(&member, seen, position)? {
                members.push(format!("{}:{}", quote(&key), json));
            }
        }
        format!("{{{}}}", members.join(","))
    };

    seen.pop();
    Ok(Some(json))
}

pub(crate) fn string_property(s: &str, key: &str) -> Option<Value> {
    if key == "length" {
        return Some(Value::Number(s.chars().count() as f64));
    }

    if let Ok(index) = key.parse::<usize>() {
        return s.chars().nth(index).map(|c| Value::from(c.to_string()));
    }

    lookup(&STRING_METHODS, key).or_else(|| object_method(key))
}

pub(crate) fn number_method(key: &str) -> Option<Value> {
    lookup(&NUMBER_METHODS, key).or_else(|| object_method(key))
}

pub(crate) fn array_method(key: &str) -> Option<Value> {
    lookup(&ARRAY_METHODS, key)
}

pub(crate) fn object_method(key: &str) -> Option<Value> {
    lookup(&OBJECT_METHODS, key)
}

fn lookup(methods: &MethodTable, key: &str) -> Option<Value> {
    methods.get(key).map(|func| native(key, *func))
}

/// Installs the built-in bindings into a fresh global scope.
pub(crate) fn install(globals: &EnvRef) {
    let mut env = globals.write();

    env.define_intrinsic("console".into(), Value::Object(namespace(&CONSOLE)));

    let math = namespace(&MATH);
    math.set("PI".into(), Value::Number(std::f64::consts::PI));
    math.set("E".into(), Value::Number(std::f64::consts::E));
    env.define_intrinsic("Math".into(), Value::Object(math));

    env.define_intrinsic("JSON".into(), Value::Object(namespace(&JSON)));

    for (name, func) in GLOBAL_FUNCTIONS.iter().sorted_by_key(|(name, _)| **name) {
        env.define_intrinsic(SmolStr::new(name), native(name, *func));
    }

    // `Object` and `Array` are callable namespaces.
    let object = ObjectRef::native("Object", |_, _, args, _| match arg(args, 0) {
        value @ Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(ObjectRef::ordinary())),
    });
    for (name, func) in OBJECT.iter() {
        object.set(SmolStr::new(name), native(name, *func));
    }
    env.define_intrinsic("Object".into(), Value::Object(object));

    let array = ObjectRef::native("Array", |_, _, args, _| {
        Ok(Value::Object(ObjectRef::array(args.to_vec())))
    });
    for (name, func) in ARRAY.iter() {
        array.set(SmolStr::new(name), native(name, *func));
    }
    env.define_intrinsic("Array".into(), Value::Object(array));

    env.define_intrinsic("undefined".into(), Value::Undefined);
    env.define_intrinsic("NaN".into(), Value::Number(f64::NAN));
    env.define_intrinsic("Infinity".into(), Value::Number(f64::INFINITY));
}
