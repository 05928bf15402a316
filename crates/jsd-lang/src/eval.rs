use smol_str::SmolStr;

use crate::ast::node::{
    self as ast, BinaryOp, DeclKind, Expr, ExprKind, FunctionBody, FunctionDecl, Ident,
    LogicalOp, PropertyKey, Stmt, StmtKind, TemplateSegment, UnaryOp,
};
use crate::range::Position;
use crate::{Shared, SharedCell};

pub mod builtin;
pub mod debugger;
pub mod env;
pub mod error;
pub mod frame;
pub mod runtime_value;

use debugger::Debugger;
use env::{Env, EnvRef, ScopeKind};
use error::EvalError;
use frame::StackFrame;
use runtime_value::{Callable, Closure, ObjectRef, Value};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleLevel::Warn | ConsoleLevel::Error)
    }
}

/// Destination of `console.*` output.
pub type ConsoleSink = Shared<dyn Fn(ConsoleLevel, &str) + Send + Sync>;

pub type CallStack = Shared<SharedCell<Vec<StackFrame>>>;

enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Assignable location.
enum Reference {
    Binding(Ident),
    Property(Value, SmolStr),
}

pub struct Interpreter {
    env: EnvRef,
    this: Value,
    file: SmolStr,
    call_stack: CallStack,
    debugger: Option<Shared<Debugger>>,
    console: ConsoleSink,
    max_call_depth: usize,
    completion: Value,
}

impl Interpreter {
    pub(crate) fn new(
        env: EnvRef,
        file: SmolStr,
        call_stack: CallStack,
        console: ConsoleSink,
        max_call_depth: usize,
    ) -> Self {
        Self {
            env,
            this: Value::Undefined,
            file,
            call_stack,
            debugger: None,
            console,
            max_call_depth,
            completion: Value::Undefined,
        }
    }

    pub(crate) fn with_debugger(mut self, debugger: Option<Shared<Debugger>>) -> Self {
        self.debugger = debugger;
        self
    }

    pub(crate) fn with_this(mut self, this: Value) -> Self {
        self.this = this;
        self
    }

    pub(crate) fn console(&self) -> &ConsoleSink {
        &self.console
    }

    /// Runs `program` as the top-level frame of a script.
    pub(crate) fn run_main(&mut self, program: &ast::Program) -> Result<Value, EvalError> {
        self.call_stack.write().push(StackFrame::new(
            SmolStr::default(),
            self.file.clone(),
            Position::default(),
            Shared::clone(&self.env),
            Vec::new(),
            Vec::new(),
            Value::Undefined,
        ));

        let result = self.eval_program(program);
        self.call_stack.write().pop();

        if let Some(debugger) = &self.debugger {
            debugger.finish();
        }

        result
    }

    /// Evaluates `program` in the current scope and returns its completion value.
    pub(crate) fn eval_program(&mut self, program: &ast::Program) -> Result<Value, EvalError> {
        self.completion = Value::Undefined;
        self.hoist(program);
        self.exec_block(program)?;
        Ok(std::mem::take(&mut self.completion))
    }

    fn with_scope<T>(&mut self, env: EnvRef, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = saved;
        result
    }

    fn enter_statement(&mut self, stmt: &Stmt) {
        let depth = {
            let mut call_stack = self.call_stack.write();
            if let Some(frame) = call_stack.last_mut() {
                frame.enter(stmt.position, &self.env);
            }
            call_stack.len()
        };

        if let Some(debugger) = self.debugger.clone() {
            debugger.on_statement(&self.file, stmt.position, depth);
        }
    }

    fn hoist(&mut self, stmts: &[Shared<Stmt>]) {
        let mut names = Vec::new();
        collect_var_names(stmts, &mut names);

        let scope = Env::function_scope(&self.env);
        {
            let mut scope = scope.write();
            for name in names {
                if !scope.has_own(&name) {
                    scope.define(name, Value::Undefined, true);
                }
            }
        }

        self.hoist_functions(stmts);
    }

    fn hoist_functions(&mut self, stmts: &[Shared<Stmt>]) {
        for stmt in stmts {
            if let StmtKind::Function(decl) = &stmt.kind {
                let function = self.make_closure(decl, None);
                self.env
                    .write()
                    .define(decl.name.clone().unwrap_or_default(), function, true);
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Shared<Stmt>]) -> Result<Completion, EvalError> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Completion::Normal => {}
                completion => return Ok(completion),
            }
        }

        Ok(Completion::Normal)
    }

    fn exec_scoped_block(&mut self, stmts: &[Shared<Stmt>]) -> Result<Completion, EvalError> {
        let env = Env::child(&self.env, ScopeKind::Block);
        self.with_scope(env, |interpreter| {
            interpreter.hoist_functions(stmts);
            interpreter.exec_block(stmts)
        })
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Completion, EvalError> {
        if stmt.is_steppable() {
            self.enter_statement(stmt);
        }

        match &stmt.kind {
            StmtKind::Declaration(kind, declarators) => {
                for (name, init) in declarators {
                    self.declare(*kind, name, init.as_ref(), stmt.position)?;
                }
                Ok(Completion::Normal)
            }
            StmtKind::Function(_) | StmtKind::Empty => Ok(Completion::Normal),
            StmtKind::Expr(expr) => {
                self.completion = self.eval_expr(expr)?;
                Ok(Completion::Normal)
            }
            StmtKind::If(test, consequent, alternate) => {
                if self.eval_expr(test)?.is_truthy() {
                    self.exec_stmt(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StmtKind::While(test, body) => {
                while self.eval_expr(test)?.is_truthy() {
                    match self.exec_stmt(body)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::DoWhile(body, test) => {
                loop {
                    match self.exec_stmt(body)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.eval_expr(test)?.is_truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let env = Env::child(&self.env, ScopeKind::Block);
                self.with_scope(env, |interpreter| {
                    interpreter.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body)
                })
            }
            StmtKind::ForIn {
                decl,
                name,
                iterable,
                body,
                values,
            } => {
                let iterable = self.eval_expr(iterable)?;
                let items = if *values {
                    self.iterate_values(&iterable, stmt.position)?
                } else {
                    iterate_keys(&iterable)
                };

                for item in items {
                    let env = Env::child(&self.env, ScopeKind::Block);
                    let completion = self.with_scope(env, |interpreter| {
                        interpreter.bind_loop_variable(*decl, name, item, stmt.position)?;
                        interpreter.exec_stmt(body)
                    })?;

                    match completion {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::Switch(discriminant, cases) => {
                let discriminant = self.eval_expr(discriminant)?;
                let env = Env::child(&self.env, ScopeKind::Block);
                self.with_scope(env, |interpreter| {
                    interpreter.exec_switch(&discriminant, cases)
                })
            }
            StmtKind::Block(stmts) => self.exec_scoped_block(stmts),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            StmtKind::Break => Ok(Completion::Break),
            StmtKind::Continue => Ok(Completion::Continue),
            StmtKind::Throw(expr) => {
                let value = self.eval_expr(expr)?;
                Err(EvalError::thrown(value, stmt.position))
            }
            StmtKind::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let result = match (self.exec_scoped_block(block), handler) {
                    (Err(err), Some(handler)) => {
                        let env = Env::child(&self.env, ScopeKind::Block);
                        if let Some(param) = param {
                            env.write().define(param.clone(), err.value, true);
                        }
                        self.with_scope(env, |interpreter| interpreter.exec_scoped_block(handler))
                    }
                    (result, _) => result,
                };

                if let Some(finalizer) = finalizer {
                    match self.exec_scoped_block(finalizer)? {
                        Completion::Normal => {}
                        completion => return Ok(completion),
                    }
                }

                result
            }
        }
    }

    fn declare(
        &mut self,
        kind: DeclKind,
        name: &Ident,
        init: Option<&Expr>,
        position: Position,
    ) -> Result<(), EvalError> {
        let value = match init {
            Some(expr) => self.eval_named(expr, name)?,
            None if kind == DeclKind::Var => return Ok(()),
            None => Value::Undefined,
        };

        match kind {
            DeclKind::Var => {
                Env::assign(&self.env, name, value).map_err(|e| e.to_eval_error(position))
            }
            DeclKind::Let | DeclKind::Const => {
                self.env
                    .write()
                    .define(name.clone(), value, kind == DeclKind::Let);
                Ok(())
            }
        }
    }

    fn bind_loop_variable(
        &mut self,
        decl: Option<DeclKind>,
        name: &Ident,
        value: Value,
        position: Position,
    ) -> Result<(), EvalError> {
        match decl {
            Some(DeclKind::Let) => self.env.write().define(name.clone(), value, true),
            Some(DeclKind::Const) => self.env.write().define(name.clone(), value, false),
            Some(DeclKind::Var) | None => {
                Env::assign(&self.env, name, value).map_err(|e| e.to_eval_error(position))?
            }
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Completion, EvalError> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }

        loop {
            if let Some(test) = test {
                if !self.eval_expr(test)?.is_truthy() {
                    break;
                }
            }

            match self.exec_stmt(body)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }

            if let Some(update) = update {
                self.eval_expr(update)?;
            }
        }

        Ok(Completion::Normal)
    }

    fn exec_switch(
        &mut self,
        discriminant: &Value,
        cases: &[ast::SwitchCase],
    ) -> Result<Completion, EvalError> {
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval_expr(test)?.strict_equals(discriminant) {
                    start = Some(i);
                    break;
                }
            }
        }

        let start = match start.or_else(|| cases.iter().position(|case| case.test.is_none())) {
            Some(start) => start,
            None => return Ok(Completion::Normal),
        };

        for case in &cases[start..] {
            self.hoist_functions(&case.body);
            match self.exec_block(&case.body)? {
                Completion::Normal => {}
                Completion::Break => break,
                completion => return Ok(completion),
            }
        }

        Ok(Completion::Normal)
    }

    fn iterate_values(&self, iterable: &Value, position: Position) -> Result<Vec<Value>, EvalError> {
        match iterable {
            Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Object(object) => object.array_items().ok_or_else(|| {
                EvalError::type_error(format!("{} is not iterable", iterable), position)
            }),
            _ => Err(EvalError::type_error(
                format!("{} is not iterable", iterable),
                position,
            )),
        }
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Template(segments) => {
                let mut text = String::new();
                for segment in segments {
                    match segment {
                        TemplateSegment::Text(s) => text.push_str(s),
                        TemplateSegment::Expr(expr) => text.push_str(&self.eval_expr(expr)?.to_string()),
                    }
                }
                Ok(Value::from(text))
            }
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => {
                Env::resolve(&self.env, name).map_err(|e| e.to_eval_error(expr.position))
            }
            ExprKind::This => Ok(self.this.clone()),
            ExprKind::Array(elements) => {
                let items = elements
                    .iter()
                    .map(|element| self.eval_expr(element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Object(ObjectRef::array(items)))
            }
            ExprKind::Object(properties) => {
                let object = ObjectRef::ordinary();
                for (key, value) in properties {
                    let key = match key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(expr) => self.eval_expr(expr)?.to_property_key(),
                    };
                    let value = self.eval_named(value, &key)?;
                    object.set(key, value);
                }
                Ok(Value::Object(object))
            }
            ExprKind::Function(decl) => Ok(self.make_closure(decl, None)),
            ExprKind::Unary(op, operand) => self.eval_unary(*op, operand, expr.position),
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => {
                let reference = self.reference(target)?;
                let old = self.get_reference(&reference, target.position)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.put_reference(reference, Value::Number(new), target.position)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary(op, left, right) => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                binary_op(*op, &left, &right, expr.position)
            }
            ExprKind::Logical(op, left, right) => {
                let left = self.eval_expr(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expr(right)
                }
            }
            ExprKind::Assign(op, target, value) => {
                let reference = self.reference(target)?;
                let value = match op.binary_op() {
                    None => {
                        let hint = match &reference {
                            Reference::Binding(name) => name.clone(),
                            Reference::Property(_, key) => key.clone(),
                        };
                        self.eval_named(value, &hint)?
                    }
                    Some(op) => {
                        let current = self.get_reference(&reference, target.position)?;
                        let value = self.eval_expr(value)?;
                        binary_op(op, &current, &value, expr.position)?
                    }
                };
                self.put_reference(reference, value.clone(), target.position)?;
                Ok(value)
            }
            ExprKind::Conditional(test, consequent, alternate) => {
                if self.eval_expr(test)?.is_truthy() {
                    self.eval_expr(consequent)
                } else {
                    self.eval_expr(alternate)
                }
            }
            ExprKind::Member(object, name) => {
                let object = self.eval_expr(object)?;
                self.get_property(&object, name, expr.position)
            }
            ExprKind::Index(object, index) => {
                let object = self.eval_expr(object)?;
                let key = self.eval_expr(index)?.to_property_key();
                self.get_property(&object, &key, expr.position)
            }
            ExprKind::Call(callee, args) => {
                let (function, this) = match &callee.kind {
                    ExprKind::Member(object, name) => {
                        let object = self.eval_expr(object)?;
                        (self.get_property(&object, name, callee.position)?, object)
                    }
                    ExprKind::Index(object, index) => {
                        let object = self.eval_expr(object)?;
                        let key = self.eval_expr(index)?.to_property_key();
                        (self.get_property(&object, &key, callee.position)?, object)
                    }
                    _ => (self.eval_expr(callee)?, Value::Undefined),
                };
                let args = self.eval_args(args)?;

                if !function.is_function() {
                    return Err(EvalError::type_error(
                        format!("{} is not a function", callee_name(callee)),
                        expr.position,
                    ));
                }

                self.call_function(&function, this, args, expr.position)
            }
            ExprKind::New(callee, args) => {
                let constructor = self.eval_expr(callee)?;
                let args = self.eval_args(args)?;
                self.construct(&constructor, args, &callee_name(callee), expr.position)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval_expr(arg)).collect()
    }

    /// Evaluates `expr`, naming anonymous functions after the binding they are assigned to.
    fn eval_named(&mut self, expr: &Expr, name: &Ident) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Function(decl) if decl.name.is_none() => {
                Ok(self.make_closure(decl, Some(name.clone())))
            }
            _ => self.eval_expr(expr),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, position: Position) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Typeof => {
                if let ExprKind::Ident(name) = &operand.kind {
                    return Ok(Value::from(
                        Env::resolve(&self.env, name)
                            .map(|value| value.type_of())
                            .unwrap_or("undefined"),
                    ));
                }
                Ok(Value::from(self.eval_expr(operand)?.type_of()))
            }
            UnaryOp::Delete => match &operand.kind {
                ExprKind::Member(..) | ExprKind::Index(..) => match self.reference(operand)? {
                    Reference::Property(Value::Object(object), key) => Ok(Value::Bool(object.delete(&key))),
                    Reference::Property(value, key) if value.is_nullish() => Err(EvalError::type_error(
                        format!("Cannot convert undefined or null to object (deleting '{}')", key),
                        position,
                    )),
                    _ => Ok(Value::Bool(true)),
                },
                _ => Ok(Value::Bool(true)),
            },
            UnaryOp::Not => Ok(Value::Bool(!self.eval_expr(operand)?.is_truthy())),
            UnaryOp::Negate => Ok(Value::Number(-self.eval_expr(operand)?.to_number())),
            UnaryOp::Plus => Ok(Value::Number(self.eval_expr(operand)?.to_number())),
            UnaryOp::Void => {
                self.eval_expr(operand)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn reference(&mut self, target: &Expr) -> Result<Reference, EvalError> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Reference::Binding(name.clone())),
            ExprKind::Member(object, name) => Ok(Reference::Property(self.eval_expr(object)?, name.clone())),
            ExprKind::Index(object, index) => {
                let object = self.eval_expr(object)?;
                let key = self.eval_expr(index)?.to_property_key();
                Ok(Reference::Property(object, key))
            }
            _ => Err(EvalError::syntax_error(
                "Invalid left-hand side in assignment",
                target.position,
            )),
        }
    }

    fn get_reference(&mut self, reference: &Reference, position: Position) -> Result<Value, EvalError> {
        match reference {
            Reference::Binding(name) => {
                Env::resolve(&self.env, name).map_err(|e| e.to_eval_error(position))
            }
            Reference::Property(object, key) => self.get_property(object, key, position),
        }
    }

    fn put_reference(&mut self, reference: Reference, value: Value, position: Position) -> Result<(), EvalError> {
        match reference {
            Reference::Binding(name) => {
                Env::assign(&self.env, &name, value).map_err(|e| e.to_eval_error(position))
            }
            Reference::Property(Value::Object(object), key) => object.assign(key, value, position),
            Reference::Property(target, key) if target.is_nullish() => Err(EvalError::type_error(
                format!("Cannot set properties of {} (setting '{}')", target, key),
                position,
            )),
            Reference::Property(..) => Ok(()),
        }
    }

    pub(crate) fn get_property(&mut self, object: &Value, key: &str, position: Position) -> Result<Value, EvalError> {
        let property = match object {
            Value::Undefined | Value::Null => {
                return Err(EvalError::type_error(
                    format!("Cannot read properties of {} (reading '{}')", object, key),
                    position,
                ));
            }
            Value::String(s) => builtin::string_property(s, key),
            Value::Number(_) => builtin::number_method(key),
            Value::Bool(_) => None,
            Value::Object(object) => object
                .get(key)
                .or_else(|| object.is_array().then(|| builtin::array_method(key)).flatten())
                .or_else(|| builtin::object_method(key)),
        };

        Ok(property.unwrap_or_default())
    }

    fn make_closure(&self, decl: &Shared<FunctionDecl>, name_hint: Option<Ident>) -> Value {
        let name = decl.name.clone().or(name_hint).unwrap_or_default();

        Value::Object(ObjectRef::closure(Closure {
            decl: Shared::clone(decl),
            env: Shared::clone(&self.env),
            name,
            file: self.file.clone(),
            this: decl.is_arrow.then(|| self.this.clone()),
        }))
    }

    pub(crate) fn call_function(
        &mut self,
        function: &Value,
        this: Value,
        args: Vec<Value>,
        position: Position,
    ) -> Result<Value, EvalError> {
        let callable = function
            .as_object()
            .and_then(ObjectRef::callable)
            .ok_or_else(|| EvalError::type_error(format!("{:?} is not a function", function), position))?;

        match callable {
            Callable::Native(native) => (native.func)(self, &this, &args, position),
            Callable::Closure(closure) => self.call_closure(&closure, this, args, position),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        this: Value,
        args: Vec<Value>,
        position: Position,
    ) -> Result<Value, EvalError> {
        if self.call_stack.read().len() >= self.max_call_depth {
            return Err(EvalError::range_error("Maximum call stack size exceeded", position));
        }

        let env = Env::child(&closure.env, ScopeKind::Function);
        {
            let mut scope = env.write();
            for (i, param) in closure.decl.params.iter().enumerate() {
                scope.define(param.clone(), args.get(i).cloned().unwrap_or_default(), true);
            }
        }

        let this = closure.this.clone().unwrap_or(this);
        self.call_stack.write().push(StackFrame::new(
            closure.name.clone(),
            closure.file.clone(),
            closure.decl.position,
            Shared::clone(&env),
            args,
            closure.decl.params.clone(),
            this.clone(),
        ));

        let saved_this = std::mem::replace(&mut self.this, this);
        let saved_file = std::mem::replace(&mut self.file, closure.file.clone());

        let result = self.with_scope(env, |interpreter| match &closure.decl.body {
            FunctionBody::Block(body) => {
                interpreter.hoist(body);
                match interpreter.exec_block(body)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
            FunctionBody::Expr(expr) => interpreter.eval_expr(expr),
        });

        self.this = saved_this;
        self.file = saved_file;
        self.call_stack.write().pop();

        result
    }

    fn construct(
        &mut self,
        constructor: &Value,
        args: Vec<Value>,
        name: &str,
        position: Position,
    ) -> Result<Value, EvalError> {
        let not_a_constructor = || EvalError::type_error(format!("{} is not a constructor", name), position);
        let object = constructor.as_object().ok_or_else(not_a_constructor)?;

        match object.callable() {
            Some(Callable::Native(native)) => (native.func)(self, &Value::Undefined, &args, position),
            Some(Callable::Closure(closure)) if !closure.decl.is_arrow => {
                let prototype = object.get("prototype").and_then(|value| value.as_object().cloned());
                let instance = ObjectRef::with_prototype(prototype);

                match self.call_closure(&closure, Value::Object(instance.clone()), args, position)? {
                    value @ Value::Object(_) => Ok(value),
                    _ => Ok(Value::Object(instance)),
                }
            }
            _ => Err(not_a_constructor()),
        }
    }
}

fn iterate_keys(iterable: &Value) -> Vec<Value> {
    match iterable {
        Value::Object(object) => object.keys().into_iter().map(Value::String).collect(),
        Value::String(s) => (0..s.chars().count())
            .map(|i| Value::from(i.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn callee_name(callee: &Expr) -> String {
    match &callee.kind {
        ExprKind::Ident(name) => name.to_string(),
        ExprKind::Member(object, name) => format!("{}.{}", callee_name(object), name),
        ExprKind::Index(object, _) => format!("{}[...]", callee_name(object)),
        ExprKind::This => "this".to_string(),
        ExprKind::Call(callee, _) => format!("{}(...)", callee_name(callee)),
        _ => "expression".to_string(),
    }
}

fn collect_var_names(stmts: &[Shared<Stmt>], names: &mut Vec<Ident>) {
    for stmt in stmts {
        collect_stmt_var_names(stmt, names);
    }
}

fn collect_stmt_var_names(stmt: &Stmt, names: &mut Vec<Ident>) {
    match &stmt.kind {
        StmtKind::Declaration(DeclKind::Var, declarators) => {
            names.extend(declarators.iter().map(|(name, _)| name.clone()));
        }
        StmtKind::If(_, consequent, alternate) => {
            collect_stmt_var_names(consequent, names);
            if let Some(alternate) = alternate {
                collect_stmt_var_names(alternate, names);
            }
        }
        StmtKind::While(_, body) | StmtKind::DoWhile(body, _) => collect_stmt_var_names(body, names),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_stmt_var_names(init, names);
            }
            collect_stmt_var_names(body, names);
        }
        StmtKind::ForIn { decl, name, body, .. } => {
            if *decl == Some(DeclKind::Var) {
                names.push(name.clone());
            }
            collect_stmt_var_names(body, names);
        }
        StmtKind::Switch(_, cases) => {
            for case in cases {
                collect_var_names(&case.body, names);
            }
        }
        StmtKind::Block(stmts) => collect_var_names(stmts, names),
        StmtKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(handler, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}

/// Visits every steppable statement, including those inside function bodies.
pub(crate) fn for_each_statement(stmts: &[Shared<Stmt>], f: &mut impl FnMut(&Stmt)) {
    for stmt in stmts {
        visit_statement(stmt, f);
    }
}

fn visit_statement(stmt: &Stmt, f: &mut impl FnMut(&Stmt)) {
    if stmt.is_steppable() {
        f(stmt);
    }

    match &stmt.kind {
        StmtKind::Function(decl) => visit_function(decl, f),
        StmtKind::Declaration(_, declarators) => {
            for (_, init) in declarators {
                if let Some(init) = init {
                    visit_expr(init, f);
                }
            }
        }
        StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::Return(Some(expr)) => visit_expr(expr, f),
        StmtKind::If(test, consequent, alternate) => {
            visit_expr(test, f);
            visit_statement(consequent, f);
            if let Some(alternate) = alternate {
                visit_statement(alternate, f);
            }
        }
        StmtKind::While(test, body) | StmtKind::DoWhile(body, test) => {
            visit_expr(test, f);
            visit_statement(body, f);
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            if let Some(init) = init {
                visit_statement(init, f);
            }
            for expr in test.iter().chain(update.iter()) {
                visit_expr(expr, f);
            }
            visit_statement(body, f);
        }
        StmtKind::ForIn { iterable, body, .. } => {
            visit_expr(iterable, f);
            visit_statement(body, f);
        }
        StmtKind::Switch(discriminant, cases) => {
            visit_expr(discriminant, f);
            for case in cases {
                for_each_statement(&case.body, f);
            }
        }
        StmtKind::Block(stmts) => for_each_statement(stmts, f),
        StmtKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            for stmts in [Some(block), handler.as_ref(), finalizer.as_ref()].into_iter().flatten() {
                for_each_statement(stmts, f);
            }
        }
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Empty => {}
    }
}

fn visit_function(decl: &FunctionDecl, f: &mut impl FnMut(&Stmt)) {
    if let FunctionBody::Block(body) = &decl.body {
        for_each_statement(body, f);
    }
}

/// Finds function bodies nested in expressions.
fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Stmt)) {
    match &expr.kind {
        ExprKind::Function(decl) => visit_function(decl, f),
        ExprKind::Template(segments) => {
            for segment in segments {
                if let TemplateSegment::Expr(expr) = segment {
                    visit_expr(expr, f);
                }
            }
        }
        ExprKind::Array(items) => {
            for item in items {
                visit_expr(item, f);
            }
        }
        ExprKind::Object(properties) => {
            for (key, value) in properties {
                if let PropertyKey::Computed(key) = key {
                    visit_expr(key, f);
                }
                visit_expr(value, f);
            }
        }
        ExprKind::Unary(_, operand) => visit_expr(operand, f),
        ExprKind::Update { target, .. } => visit_expr(target, f),
        ExprKind::Binary(_, left, right)
        | ExprKind::Logical(_, left, right)
        | ExprKind::Assign(_, left, right)
        | ExprKind::Index(left, right) => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        ExprKind::Conditional(test, consequent, alternate) => {
            visit_expr(test, f);
            visit_expr(consequent, f);
            visit_expr(alternate, f);
        }
        ExprKind::Member(object, _) => visit_expr(object, f),
        ExprKind::Call(callee, args) | ExprKind::New(callee, args) => {
            visit_expr(callee, f);
            for arg in args {
                visit_expr(arg, f);
            }
        }
        ExprKind::Number(_)
        | ExprKind::String(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Ident(_)
        | ExprKind::This => {}
    }
}

fn binary_op(op: BinaryOp, left: &Value, right: &Value, position: Position) -> Result<Value, EvalError> {
    let value = match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(_) | Value::Object(_), _) | (_, Value::String(_) | Value::Object(_)) => {
                Value::from(format!("{}{}", left, right))
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };

            Value::Bool(ordering.is_some_and(|ordering| match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => match right {
            Value::Object(object) => Value::Bool(object.has(&left.to_property_key())),
            _ => {
                return Err(EvalError::type_error(
                    format!("Cannot use 'in' operator to search for '{}' in {}", left, right),
                    position,
                ));
            }
        },
    };

    Ok(value)
}
