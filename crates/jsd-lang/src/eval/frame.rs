use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use super::env::{EnvRef, ScopeKind};
use super::runtime_value::Value;
use crate::ast::node::Ident;
use crate::range::Position;
use crate::Shared;

/// One activation on the interpreter's call stack.
#[derive(Clone)]
pub struct StackFrame {
    pub(crate) function_name: SmolStr,
    pub(crate) file: SmolStr,
    pub(crate) position: Position,
    /// Innermost scope of the statement currently running in this frame.
    pub(crate) scope: EnvRef,
    pub(crate) function_scope: EnvRef,
    pub(crate) arguments: Vec<Value>,
    pub(crate) params: Vec<Ident>,
    pub(crate) this: Value,
}

impl StackFrame {
    pub(crate) fn new(
        function_name: SmolStr,
        file: SmolStr,
        position: Position,
        function_scope: EnvRef,
        arguments: Vec<Value>,
        params: Vec<Ident>,
        this: Value,
    ) -> Self {
        Self {
            function_name,
            file,
            position,
            scope: Shared::clone(&function_scope),
            function_scope,
            arguments,
            params,
            this,
        }
    }

    /// Empty for the top-level program.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn params(&self) -> &[Ident] {
        &self.params
    }

    pub fn this(&self) -> &Value {
        &self.this
    }

    pub fn is_top_level(&self) -> bool {
        self.function_scope.read().kind() == ScopeKind::Global
    }

    /// Bindings visible from the current statement up to the function boundary,
    /// innermost first. Globals are not locals, even for the top-level frame.
    pub fn locals(&self) -> Vec<(Ident, Value)> {
        let mut seen = FxHashSet::default();
        let mut locals = Vec::new();
        let mut current = Some(Shared::clone(&self.scope));

        while let Some(scope) = current {
            let (kind, bindings, parent) = {
                let env = scope.read();
                (env.kind(), env.bindings(), env.parent())
            };

            if kind == ScopeKind::Global {
                break;
            }

            for (name, value) in bindings {
                if seen.insert(name.clone()) {
                    locals.push((name, value));
                }
            }

            if Shared::ptr_eq(&scope, &self.function_scope) {
                break;
            }
            current = parent;
        }

        locals
    }

    pub(crate) fn scope(&self) -> &EnvRef {
        &self.scope
    }

    pub(crate) fn enter(&mut self, position: Position, scope: &EnvRef) {
        self.position = position;
        if !Shared::ptr_eq(&self.scope, scope) {
            self.scope = Shared::clone(scope);
        }
    }
}

impl std::fmt::Debug for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackFrame")
            .field("function_name", &self.function_name)
            .field("file", &self.file)
            .field("position", &self.position)
            .finish()
    }
}
