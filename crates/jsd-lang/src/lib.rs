//! An embeddable interpreter for a JavaScript subset, built to be driven by a debugger.
//!
//! ```rust
//! let runtime = jsd_lang::Runtime::new();
//! let value = runtime.run_script("main.js", "var x = 40; x + 2").unwrap();
//! assert_eq!(value, jsd_lang::Value::Number(42.0));
//! ```
//!
//! The debugger extension reports each statement about to run to a [`DebugHandler`],
//! which blocks the script until it returns the next [`DebugCommand`]:
//!
//! ```rust
//! use jsd_lang::{DebugCommand, DebugHandler, DebuggerState, Runtime};
//!
//! struct Trace;
//!
//! impl DebugHandler for Trace {
//!     fn on_pause(&self, state: &DebuggerState) -> DebugCommand {
//!         println!("paused at {}:{}", state.file, state.position);
//!         DebugCommand::Continue
//!     }
//! }
//!
//! let mut runtime = Runtime::new();
//! let debugger = runtime.enable_debugger();
//! debugger.add_breakpoint("main.js", 2, None);
//! debugger.set_handler(std::sync::Arc::new(Trace));
//! runtime.run_script("main.js", "var a = 1;\nvar b = a + 1;\n").unwrap();
//! ```
mod ast;
mod engine;
mod error;
mod eval;
mod lexer;
mod number;
mod range;

use ast::parser::Parser;
use error::InnerError;

pub use ast::Program;
pub use engine::{EVAL_FILE, Options, Runtime};
pub use error::Error;
pub use eval::builtin::GLOBAL_NAMES;
pub use eval::debugger::{Breakpoint, DebugCommand, DebugHandler, Debugger, DebuggerState};
pub use eval::frame::StackFrame;
pub use eval::runtime_value::{ObjectRef, Value};
pub use eval::{ConsoleLevel, ConsoleSink};
pub use lexer::token::{Token, TokenKind};
pub use range::Position;

pub type Shared<T> = std::sync::Arc<T>;
pub type SharedCell<T> = parking_lot::RwLock<T>;

#[allow(clippy::result_large_err)]
pub fn tokenize(file: &str, code: &str) -> Result<Vec<Token>, Error> {
    lexer::tokenize(code).map_err(|e| Error::from_error(file, code, InnerError::Lexer(e)))
}

#[allow(clippy::result_large_err)]
pub fn parse(file: &str, code: &str) -> Result<Program, Error> {
    let tokens = tokenize(file, code)?;
    Parser::new(&tokens)
        .parse()
        .map_err(|e| Error::from_error(file, code, InnerError::Parse(e)))
}
