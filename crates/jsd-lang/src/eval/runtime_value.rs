use std::fmt::{self, Debug, Display, Formatter};

use itertools::Itertools;
use smol_str::SmolStr;

use super::Interpreter;
use super::env::EnvRef;
use super::error::EvalError;
use crate::ast::node::FunctionDecl;
use crate::number::{format_number, parse_number};
use crate::range::Position;
use crate::{Shared, SharedCell};

pub type NativeFn = fn(&mut Interpreter, &Value, &[Value], Position) -> Result<Value, EvalError>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(SmolStr),
    Object(ObjectRef),
}

impl Value {
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(object) if object.is_function() => "function",
            Value::Object(_) => "object",
        }
    }

    #[inline(always)]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline(always)]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_function(&self) -> bool {
        self.as_object().is_some_and(ObjectRef::is_function)
    }

    pub fn is_array(&self) -> bool {
        self.as_object().is_some_and(ObjectRef::is_array)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !(n.is_nan() || *n == 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Object(_) => parse_number(&self.to_string()),
        }
    }

    /// Property key used when this value indexes an object.
    pub fn to_property_key(&self) -> SmolStr {
        match self {
            Value::String(s) => s.clone(),
            value => SmolStr::new(value.to_string()),
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Object(_), primitive) | (primitive, Value::Object(_)) => {
                let converted = Value::String(SmolStr::new(match self {
                    Value::Object(_) => self.to_string(),
                    _ => other.to_string(),
                }));
                converted.loose_equals(primitive)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(_), Value::Number(_)) => self.strict_equals(other),
            _ => self.to_number() == other.to_number(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(SmolStr::new(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(SmolStr::new(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(object) => write!(f, "{}", object),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(object) => write!(f, "{}", object.describe()),
            value => write!(f, "{}", value),
        }
    }
}

#[derive(Clone)]
pub struct Closure {
    pub(crate) decl: Shared<FunctionDecl>,
    pub(crate) env: EnvRef,
    pub(crate) name: SmolStr,
    pub(crate) file: SmolStr,
    /// Lexically bound `this` of arrow functions.
    pub(crate) this: Option<Value>,
}

#[derive(Clone)]
pub struct NativeFunction {
    pub(crate) name: SmolStr,
    pub(crate) func: NativeFn,
}

#[derive(Clone)]
pub enum Callable {
    Closure(Closure),
    Native(NativeFunction),
}

impl Callable {
    pub fn name(&self) -> &SmolStr {
        match self {
            Callable::Closure(closure) => &closure.name,
            Callable::Native(native) => &native.name,
        }
    }
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Callable),
    Error,
}

struct Property {
    key: SmolStr,
    value: Value,
    enumerable: bool,
}

pub struct Object {
    kind: ObjectKind,
    properties: Vec<Property>,
    prototype: Option<ObjectRef>,
}

impl Object {
    fn own_property(&self, key: &str) -> Option<Value> {
        match &self.kind {
            ObjectKind::Array(items) => {
                if key == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                if let Some(item) = array_index(key).and_then(|index| items.get(index)) {
                    return Some(item.clone());
                }
            }
            ObjectKind::Function(callable) if key == "name" => {
                return Some(Value::String(callable.name().clone()));
            }
            _ => {}
        }

        self.properties
            .iter()
            .find(|property| property.key == key)
            .map(|property| property.value.clone())
    }
}

/// Largest number of slots one write may add to an array's dense storage.
const MAX_DENSE_GROWTH: usize = 1 << 20;
const MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<usize>().ok()
}

/// Shared handle to a heap object; clones alias the same object.
#[derive(Clone)]
pub struct ObjectRef(Shared<SharedCell<Object>>);

impl ObjectRef {
    fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self(Shared::new(SharedCell::new(Object {
            kind,
            properties: Vec::new(),
            prototype,
        })))
    }

    pub fn ordinary() -> Self {
        Self::new(ObjectKind::Ordinary, None)
    }

    pub fn with_prototype(prototype: Option<ObjectRef>) -> Self {
        Self::new(ObjectKind::Ordinary, prototype)
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::new(ObjectKind::Array(items), None)
    }

    pub fn error(name: &str, message: impl Into<String>) -> Self {
        let object = Self::new(ObjectKind::Error, None);
        object.set_hidden("name".into(), Value::from(name));
        object.set_hidden("message".into(), Value::from(message.into()));
        object
    }

    pub(crate) fn native(name: &str, func: NativeFn) -> Self {
        Self::new(
            ObjectKind::Function(Callable::Native(NativeFunction {
                name: SmolStr::new(name),
                func,
            })),
            None,
        )
    }

    pub(crate) fn closure(closure: Closure) -> Self {
        let is_arrow = closure.decl.is_arrow;
        let function = Self::new(ObjectKind::Function(Callable::Closure(closure)), None);

        if !is_arrow {
            function.set_hidden("prototype".into(), Value::Object(ObjectRef::ordinary()));
        }

        function
    }

    #[inline(always)]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Shared::ptr_eq(&self.0, &other.0)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.0.read().kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.read().kind, ObjectKind::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.0.read().kind, ObjectKind::Error)
    }

    pub fn array_len(&self) -> Option<usize> {
        match &self.0.read().kind {
            ObjectKind::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Snapshot of the elements when this is an array.
    pub fn array_items(&self) -> Option<Vec<Value>> {
        match &self.0.read().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    pub(crate) fn with_array<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        match &mut self.0.write().kind {
            ObjectKind::Array(items) => Some(f(items)),
            _ => None,
        }
    }

    pub fn function_name(&self) -> Option<SmolStr> {
        match &self.0.read().kind {
            ObjectKind::Function(callable) => Some(callable.name().clone()),
            _ => None,
        }
    }

    pub(crate) fn callable(&self) -> Option<Callable> {
        match &self.0.read().kind {
            ObjectKind::Function(callable) => Some(callable.clone()),
            _ => None,
        }
    }

    /// Own enumerable keys in insertion order, array indices first.
    pub fn keys(&self) -> Vec<SmolStr> {
        let object = self.0.read();
        let indices = match &object.kind {
            ObjectKind::Array(items) => (0..items.len()).map(|i| SmolStr::new(i.to_string())).collect(),
            _ => Vec::new(),
        };

        indices
            .into_iter()
            .chain(
                object
                    .properties
                    .iter()
                    .filter(|property| property.enumerable)
                    .map(|property| property.key.clone()),
            )
            .collect()
    }

    /// Property lookup through the prototype chain.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (own, prototype) = {
            let object = self.0.read();
            (object.own_property(key), object.prototype.clone())
        };

        own.or_else(|| prototype.and_then(|prototype| prototype.get(key)))
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.read().own_property(key).is_some()
    }

    pub fn set(&self, key: SmolStr, value: Value) {
        self.define(key, value, true);
    }

    /// Script-level property assignment; rejects array lengths the dense storage cannot hold.
    pub fn assign(&self, key: SmolStr, value: Value, position: Position) -> Result<(), EvalError> {
        if key == "length" {
            if let Some(current) = self.array_len() {
                let len = value.to_number();
                let valid = len >= 0.0
                    && len.fract() == 0.0
                    && len <= MAX_ARRAY_LENGTH
                    && len as usize <= current.saturating_add(MAX_DENSE_GROWTH);
                if !valid {
                    return Err(EvalError::range_error("Invalid array length", position));
                }
            }
        }

        self.set(key, value);
        Ok(())
    }

    fn set_hidden(&self, key: SmolStr, value: Value) {
        self.define(key, value, false);
    }

    fn define(&self, key: SmolStr, value: Value, enumerable: bool) {
        let mut object = self.0.write();

        if let ObjectKind::Array(items) = &mut object.kind {
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 && len as usize <= items.len().saturating_add(MAX_DENSE_GROWTH) {
                    items.resize(len as usize, Value::Undefined);
                }
                return;
            }
            // Indices far past the end are kept as ordinary properties.
            if let Some(index) = array_index(&key).filter(|&index| index < items.len().saturating_add(MAX_DENSE_GROWTH)) {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return;
            }
        }

        match object
            .properties
            .iter_mut()
            .find(|property| property.key == key)
        {
            Some(property) => property.value = value,
            None => object.properties.push(Property {
                key,
                value,
                enumerable,
            }),
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut object = self.0.write();

        if let (ObjectKind::Array(items), Some(index)) = (&mut object.kind, array_index(key)) {
            if let Some(item) = items.get_mut(index) {
                *item = Value::Undefined;
                return true;
            }
        }

        object.properties.retain(|property| property.key != key);
        true
    }

    /// Short description used in debug output, never recursing into children.
    pub fn describe(&self) -> String {
        match &self.0.read().kind {
            ObjectKind::Ordinary => "[object Object]".to_string(),
            ObjectKind::Array(items) => format!("[object Array({})]", items.len()),
            ObjectKind::Function(callable) => format!("[Function: {}]", callable.name()),
            ObjectKind::Error => "[object Error]".to_string(),
        }
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(items) = self.array_items() {
            return write!(
                f,
                "{}",
                items
                    .iter()
                    .map(|item| if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_string()
                    })
                    .join(",")
            );
        }

        if let Some(name) = self.function_name() {
            return write!(f, "function {}() {{ [code] }}", name);
        }

        if self.is_error() {
            let name = self.get("name").map(|v| v.to_string()).unwrap_or_default();
            let message = self.get("message").map(|v| v.to_string()).unwrap_or_default();

            return if message.is_empty() {
                write!(f, "{}", name)
            } else {
                write!(f, "{}: {}", name, message)
            };
        }

        write!(f, "[object Object]")
    }
}
