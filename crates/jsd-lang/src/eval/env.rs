use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use super::error::EvalError;
use super::runtime_value::Value;
use crate::ast::node::Ident;
use crate::range::Position;
use crate::{Shared, SharedCell};

pub type EnvRef = Shared<SharedCell<Env>>;

#[derive(Error, Debug, PartialEq)]
pub enum EnvError {
    #[error("{0} is not defined")]
    NotDefined(SmolStr),
    #[error("Assignment to constant variable.")]
    ConstAssignment(SmolStr),
}

impl EnvError {
    pub fn to_eval_error(&self, position: Position) -> EvalError {
        match self {
            EnvError::NotDefined(_) => EvalError::reference_error(self.to_string(), position),
            EnvError::ConstAssignment(_) => EvalError::type_error(self.to_string(), position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeKind {
    #[default]
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
    /// Installed by the runtime rather than by the script.
    intrinsic: bool,
}

#[derive(Debug, Default)]
pub struct Env {
    context: FxHashMap<Ident, Binding>,
    order: Vec<Ident>,
    parent: Option<EnvRef>,
    kind: ScopeKind,
}

impl Env {
    pub fn global() -> EnvRef {
        Shared::new(SharedCell::new(Env::default()))
    }

    pub fn child(parent: &EnvRef, kind: ScopeKind) -> EnvRef {
        Shared::new(SharedCell::new(Env {
            context: FxHashMap::default(),
            order: Vec::new(),
            parent: Some(Shared::clone(parent)),
            kind,
        }))
    }

    #[inline(always)]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    pub fn has_own(&self, ident: &str) -> bool {
        self.context.contains_key(ident)
    }

    pub fn define(&mut self, ident: Ident, value: Value, mutable: bool) {
        self.insert(ident, value, mutable, false);
    }

    pub(crate) fn define_intrinsic(&mut self, ident: Ident, value: Value) {
        self.insert(ident, value, true, true);
    }

    fn insert(&mut self, ident: Ident, value: Value, mutable: bool, intrinsic: bool) {
        if !self.context.contains_key(&ident) {
            self.order.push(ident.clone());
        }

        self.context.insert(
            ident,
            Binding {
                value,
                mutable,
                intrinsic,
            },
        );
    }

    /// Script-visible bindings of this scope in declaration order.
    pub fn bindings(&self) -> Vec<(Ident, Value)> {
        self.order
            .iter()
            .filter_map(|ident| {
                self.context
                    .get(ident)
                    .filter(|binding| !binding.intrinsic)
                    .map(|binding| (ident.clone(), binding.value.clone()))
            })
            .collect()
    }

    /// Walks the scope chain for `ident`.
    pub fn resolve(env: &EnvRef, ident: &str) -> Result<Value, EnvError> {
        let mut current = Shared::clone(env);

        loop {
            let parent = {
                let scope = current.read();
                if let Some(binding) = scope.context.get(ident) {
                    return Ok(binding.value.clone());
                }
                scope.parent.clone()
            };

            match parent {
                Some(parent) => current = parent,
                None => return Err(EnvError::NotDefined(SmolStr::new(ident))),
            }
        }
    }

    /// Updates the nearest binding of `ident`; undeclared names become globals.
    pub fn assign(env: &EnvRef, ident: &str, value: Value) -> Result<(), EnvError> {
        let mut current = Shared::clone(env);

        loop {
            let parent = {
                let mut scope = current.write();
                if let Some(binding) = scope.context.get_mut(ident) {
                    if !binding.mutable {
                        return Err(EnvError::ConstAssignment(SmolStr::new(ident)));
                    }
                    binding.value = value;
                    return Ok(());
                }

                match scope.parent.clone() {
                    Some(parent) => parent,
                    None => {
                        scope.define(SmolStr::new(ident), value, true);
                        return Ok(());
                    }
                }
            };

            current = parent;
        }
    }

    /// Nearest enclosing function (or global) scope, where `var` declarations live.
    pub fn function_scope(env: &EnvRef) -> EnvRef {
        let mut current = Shared::clone(env);

        loop {
            let parent = {
                let scope = current.read();
                match (scope.kind, scope.parent.clone()) {
                    (ScopeKind::Block, Some(parent)) => parent,
                    _ => break,
                }
            };
            current = parent;
        }

        current
    }
}
