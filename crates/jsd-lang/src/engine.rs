use smol_str::SmolStr;

use crate::ast::node::{Ident, Program};
use crate::error::{self, InnerError};
use crate::eval::debugger::Debugger;
use crate::eval::env::{Env, EnvRef};
use crate::eval::frame::StackFrame;
use crate::eval::runtime_value::Value;
use crate::eval::{
    self, CallStack, ConsoleLevel, ConsoleSink, DEFAULT_MAX_CALL_DEPTH, Interpreter, builtin,
};
use crate::{Shared, SharedCell, parse};

/// Script name used for code evaluated outside of a loaded program.
pub const EVAL_FILE: &str = "<eval>";

#[derive(Debug, Clone)]
pub struct Options {
    /// Calls nested deeper than this raise a `RangeError`.
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// An isolated execution context: one global scope, one call stack and an optional debugger.
///
/// Clones share the same context, so one clone can inspect a script another clone is running.
#[derive(Clone)]
pub struct Runtime {
    globals: EnvRef,
    call_stack: CallStack,
    debugger: Option<Shared<Debugger>>,
    console: ConsoleSink,
    pub(crate) options: Options,
}

impl Default for Runtime {
    fn default() -> Self {
        let globals = Env::global();
        builtin::install(&globals);

        Self {
            globals,
            call_stack: Shared::new(SharedCell::new(Vec::new())),
            debugger: None,
            console: Shared::new(|level: ConsoleLevel, text: &str| {
                if level.is_error() {
                    eprintln!("{}", text);
                } else {
                    println!("{}", text);
                }
            }),
            options: Options::default(),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("debugger", &self.debugger)
            .field("options", &self.options)
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_call_depth(&mut self, max_call_depth: usize) {
        self.options.max_call_depth = max_call_depth;
    }

    /// Redirects `console.*` output.
    pub fn set_console<F>(&mut self, console: F)
    where
        F: Fn(ConsoleLevel, &str) + Send + Sync + 'static,
    {
        self.console = Shared::new(console);
    }

    /// Installs the debugger extension, returning the existing one if already enabled.
    pub fn enable_debugger(&mut self) -> Shared<Debugger> {
        match &self.debugger {
            Some(debugger) => Shared::clone(debugger),
            None => {
                let debugger = Shared::new(Debugger::new());
                self.debugger = Some(Shared::clone(&debugger));
                debugger
            }
        }
    }

    pub fn debugger(&self) -> Option<Shared<Debugger>> {
        self.debugger.clone()
    }

    #[allow(clippy::result_large_err)]
    pub fn run_script(&self, file: &str, code: &str) -> Result<Value, error::Error> {
        let program = parse(file, code)?;

        if let Some(debugger) = &self.debugger {
            eval::for_each_statement(&program, &mut |stmt| {
                debugger.register_line_start(file, stmt.position)
            });
        }

        self.interpreter(Shared::clone(&self.globals), SmolStr::new(file), Shared::clone(&self.call_stack))
            .with_debugger(self.debugger.clone())
            .run_main(&program)
            .map_err(|e| error::Error::from_error(file, code, InnerError::Eval(e)))
    }

    /// Evaluates `code` in the global scope without consulting the debugger.
    #[allow(clippy::result_large_err)]
    pub fn run_string(&self, code: &str) -> Result<Value, error::Error> {
        let program = parse(EVAL_FILE, code)?;
        self.evaluate(Shared::clone(&self.globals), Value::Undefined, &program, code)
    }

    /// Evaluates `code` in the scope of the frame at `index` (0 is the newest frame).
    /// Falls back to the global scope when no such frame exists.
    #[allow(clippy::result_large_err)]
    pub fn evaluate_in_frame(&self, code: &str, index: usize) -> Result<Value, error::Error> {
        let frame = self.call_stack.read().iter().rev().nth(index).cloned();

        match frame {
            Some(frame) => {
                let program = parse(EVAL_FILE, code)?;
                self.evaluate(Shared::clone(frame.scope()), frame.this().clone(), &program, code)
            }
            None => self.run_string(code),
        }
    }

    #[allow(clippy::result_large_err)]
    fn evaluate(&self, env: EnvRef, this: Value, program: &Program, code: &str) -> Result<Value, error::Error> {
        // A detached call stack keeps evaluation out of the inspected frames.
        self.interpreter(env, SmolStr::new(EVAL_FILE), Shared::new(SharedCell::new(Vec::new())))
            .with_this(this)
            .eval_program(program)
            .map_err(|e| error::Error::from_error(EVAL_FILE, code, InnerError::Eval(e)))
    }

    fn interpreter(&self, env: EnvRef, file: SmolStr, call_stack: CallStack) -> Interpreter {
        Interpreter::new(
            env,
            file,
            call_stack,
            Shared::clone(&self.console),
            self.options.max_call_depth,
        )
    }

    /// Snapshot of up to `max` frames, newest first.
    pub fn capture_call_stack(&self, max: usize) -> Vec<StackFrame> {
        self.call_stack.read().iter().rev().take(max).cloned().collect()
    }

    /// Script-defined globals in definition order.
    pub fn global_bindings(&self) -> Vec<(Ident, Value)> {
        self.globals.read().bindings()
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
