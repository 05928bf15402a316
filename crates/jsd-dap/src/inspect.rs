use std::path::Path;

use dap::responses::EvaluateResponse;
use dap::types;
use itertools::Itertools;
use jsd_lang::{GLOBAL_NAMES, ObjectRef, Runtime, StackFrame, Value};
use tracing::debug;

use crate::handles::HandleRegistry;

/// Deepest call stack reported to the client.
pub const MAX_STACK_FRAMES: usize = 10;

const PREVIEW_KEYS: usize = 3;

/// What a variables reference expands to.
#[derive(Debug, Clone)]
pub enum VariableHandle {
    Locals { frame_id: i64 },
    Globals,
    Value(Value),
}

/// Rendered form of one value for a variables or evaluate response.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub value: String,
    pub type_name: &'static str,
    pub variables_reference: i64,
}

/// Snapshots the paused call stack and materializes scopes and values on demand.
///
/// Frame ids index the last captured stack (1 is the newest frame). Variable references
/// stay valid until [`Inspector::invalidate`], after which they resolve to nothing.
#[derive(Debug, Default)]
pub struct Inspector {
    frames: Vec<StackFrame>,
    variables: HandleRegistry<VariableHandle>,
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Object(object) if object.is_function() => "function",
        Value::Object(object) if object.is_array() => "array",
        Value::Object(_) => "object",
    }
}

/// Short description of a composite value, never listing nested contents.
pub fn preview(object: &ObjectRef) -> String {
    if let Some(len) = object.array_len() {
        return format!("Array[{}]", len);
    }
    if object.is_error() {
        return object.to_string();
    }

    let keys = object.keys();
    match keys.len() {
        0 => "{}".to_string(),
        n if n <= PREVIEW_KEYS => format!("{{{}}}", keys.iter().join(", ")),
        _ => format!("{{{}, ...}}", keys.iter().take(PREVIEW_KEYS).join(", ")),
    }
}

pub fn source(path: &str) -> types::Source {
    types::Source {
        name: Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string()),
        path: Some(path.to_string()),
        source_reference: None,
        presentation_hint: None,
        origin: None,
        sources: None,
        adapter_data: None,
        checksums: None,
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the captured frames and every variable reference handed out so far.
    pub fn invalidate(&mut self) {
        self.frames.clear();
        self.variables.clear_all();
    }

    /// Captures the engine call stack, replacing the previous frame ids.
    pub fn capture(&mut self, runtime: &Runtime) -> &[StackFrame] {
        self.frames = runtime.capture_call_stack(MAX_STACK_FRAMES);
        &self.frames
    }

    pub fn frame(&self, frame_id: i64) -> Option<&StackFrame> {
        usize::try_from(frame_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.frames.get(index))
    }

    /// Protocol frames for the captured stack, skipping `start` frames and keeping at most `levels`.
    pub fn stack_frames(&self, start: usize, levels: Option<usize>) -> Vec<types::StackFrame> {
        self.frames
            .iter()
            .enumerate()
            .skip(start)
            .take(levels.filter(|levels| *levels > 0).unwrap_or(MAX_STACK_FRAMES))
            .map(|(index, frame)| types::StackFrame {
                id: index as i64 + 1,
                name: match frame.function_name() {
                    "" => "(anonymous)".to_string(),
                    name => name.to_string(),
                },
                source: Some(source(frame.file())),
                line: frame.position().line as i64,
                column: frame.position().column as i64,
                ..Default::default()
            })
            .collect()
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// The `Local` and `Global` scopes of a frame, each with a fresh reference.
    pub fn scopes(&mut self, frame_id: i64) -> Vec<types::Scope> {
        let locals = self.variables.allocate(VariableHandle::Locals { frame_id });
        let globals = self.variables.allocate(VariableHandle::Globals);

        [("Local", locals), ("Global", globals)]
            .into_iter()
            .map(|(name, variables_reference)| types::Scope {
                name: name.to_string(),
                variables_reference,
                expensive: false,
                named_variables: None,
                indexed_variables: None,
                source: None,
                line: None,
                column: None,
                end_line: None,
                end_column: None,
                presentation_hint: None,
            })
            .collect()
    }

    /// Expands a scope or composite value. Unknown or stale references yield no variables.
    pub fn variables(&mut self, runtime: &Runtime, reference: i64) -> Vec<types::Variable> {
        let Some(handle) = self.variables.resolve(reference).cloned() else {
            debug!(reference, "Variables reference not found");
            return Vec::new();
        };

        match handle {
            VariableHandle::Locals { frame_id } => self.locals(frame_id),
            VariableHandle::Globals => {
                let bindings = runtime
                    .global_bindings()
                    .into_iter()
                    .filter(|(name, _)| !GLOBAL_NAMES.contains(&name.as_str()))
                    .collect::<Vec<_>>();
                bindings
                    .into_iter()
                    .map(|(name, value)| self.variable(&name, &value))
                    .collect()
            }
            VariableHandle::Value(Value::Object(object)) => self.properties(&object),
            VariableHandle::Value(_) => Vec::new(),
        }
    }

    fn locals(&mut self, frame_id: i64) -> Vec<types::Variable> {
        let Some(frame) = self.frame(frame_id).cloned() else {
            debug!(frame_id, "Frame not found");
            return Vec::new();
        };

        let locals = frame.locals();
        let mut variables = locals
            .iter()
            .map(|(name, value)| self.variable(name, value))
            .collect::<Vec<_>>();

        // Parameters are already bindings of the frame; report the rest positionally.
        for (index, argument) in frame.arguments().iter().enumerate() {
            let name = match frame.params().get(index) {
                Some(param) if locals.iter().any(|(name, _)| name == param) => continue,
                Some(param) => param.to_string(),
                None => format!("arguments[{}]", index),
            };
            variables.push(self.variable(&name, argument));
        }

        if !frame.this().is_undefined() {
            variables.push(self.variable("this", frame.this()));
        }

        variables
    }

    fn properties(&mut self, object: &ObjectRef) -> Vec<types::Variable> {
        let mut variables = object
            .keys()
            .into_iter()
            .filter_map(|key| object.get(&key).map(|value| (key, value)))
            .map(|(key, value)| self.variable(&key, &value))
            .collect::<Vec<_>>();

        if let Some(len) = object.array_len() {
            variables.insert(0, self.variable("length", &Value::Number(len as f64)));
        }

        variables
    }

    /// Renders `value`, allocating a reference when it can be expanded.
    pub fn render(&mut self, value: &Value) -> Rendered {
        let (value_text, variables_reference) = match value {
            Value::String(s) => (format!("{:?}", s.as_str()), 0),
            Value::Object(object) => match object.function_name() {
                Some(name) if name.is_empty() => ("[Function: (anonymous)]".to_string(), 0),
                Some(name) => (format!("[Function: {}]", name), 0),
                None => (
                    preview(object),
                    self.variables.allocate(VariableHandle::Value(value.clone())),
                ),
            },
            value => (value.to_string(), 0),
        };

        Rendered {
            value: value_text,
            type_name: type_name(value),
            variables_reference,
        }
    }

    fn variable(&mut self, name: &str, value: &Value) -> types::Variable {
        let rendered = self.render(value);

        types::Variable {
            name: name.to_string(),
            value: rendered.value,
            type_field: Some(rendered.type_name.to_string()),
            variables_reference: rendered.variables_reference,
            named_variables: None,
            indexed_variables: None,
            presentation_hint: None,
            evaluate_name: Some(name.to_string()),
            memory_reference: None,
        }
    }

    /// Evaluates `expression` in the scope of `frame_id`, or globally without one.
    #[allow(clippy::result_large_err)]
    pub fn evaluate(
        &mut self,
        runtime: &Runtime,
        expression: &str,
        frame_id: Option<i64>,
    ) -> Result<EvaluateResponse, jsd_lang::Error> {
        let value = match frame_id.filter(|id| *id > 0) {
            Some(frame_id) => runtime.evaluate_in_frame(expression, (frame_id - 1) as usize)?,
            None => runtime.run_string(expression)?,
        };
        let rendered = self.render(&value);

        Ok(EvaluateResponse {
            result: rendered.value,
            type_field: Some(rendered.type_name.to_string()),
            variables_reference: rendered.variables_reference,
            named_variables: None,
            indexed_variables: None,
            presentation_hint: None,
            memory_reference: None,
        })
    }
}
