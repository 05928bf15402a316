use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::Shared;
use crate::range::Position;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Hash)]
pub enum DebugCommand {
    /// Run until the next breakpoint.
    #[default]
    Continue,
    /// Stop at the next statement in the same or a shallower frame.
    StepOver,
    /// Stop at the next statement, diving into calls.
    StepInto,
    /// Stop at the next statement after the current function returns.
    StepOut,
}

/// Represents a breakpoint registered with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    pub id: usize,
    pub file: SmolStr,
    pub line: u32,
    /// `None` matches the first statement on the line.
    pub column: Option<u32>,
}

/// What the handler sees when execution is about to run a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DebuggerState {
    pub file: SmolStr,
    pub position: Position,
    pub breakpoint: Option<Breakpoint>,
    /// Number of frames on the call stack, including the top-level frame.
    pub depth: usize,
}

impl DebuggerState {
    /// The notification sent once when a stepped program finishes.
    pub fn end_of_program() -> Self {
        Self {
            file: SmolStr::default(),
            position: Position::END_OF_PROGRAM,
            breakpoint: None,
            depth: 0,
        }
    }

    pub fn is_end_of_program(&self) -> bool {
        self.file.is_empty() && self.position.line == Position::END_OF_PROGRAM.line
    }
}

/// Receives control on the executing thread; the script resumes when it returns.
pub trait DebugHandler: Send + Sync {
    fn on_pause(&self, state: &DebuggerState) -> DebugCommand;
}

#[derive(Default)]
pub struct Debugger {
    breakpoints: Mutex<Vec<Breakpoint>>,
    next_breakpoint_id: AtomicUsize,
    step_mode: AtomicBool,
    /// Set by a pause request; the next statement reaches the handler regardless of the step filter.
    interrupt: AtomicBool,
    handler: RwLock<Option<Shared<dyn DebugHandler>>>,
    /// Column of the first statement on each line, per file.
    line_starts: RwLock<FxHashMap<SmolStr, FxHashMap<u32, u32>>>,
    /// Last command returned by the handler and the depth it was issued at.
    stepping: Mutex<(DebugCommand, usize)>,
}

impl std::fmt::Debug for Debugger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("breakpoints", &*self.breakpoints.lock())
            .field("step_mode", &self.is_step_mode())
            .finish()
    }
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_breakpoint(&self, file: &str, line: u32, column: Option<u32>) -> usize {
        let id = self.next_breakpoint_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.breakpoints.lock().push(Breakpoint {
            id,
            file: SmolStr::new(file),
            line,
            column,
        });
        id
    }

    pub fn remove_breakpoint(&self, id: usize) -> bool {
        let mut breakpoints = self.breakpoints.lock();
        let len = breakpoints.len();
        breakpoints.retain(|bp| bp.id != id);
        breakpoints.len() != len
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().clone()
    }

    pub fn clear_breakpoints(&self) {
        self.breakpoints.lock().clear();
    }

    pub fn set_handler(&self, handler: Shared<dyn DebugHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Enables or disables per-statement callbacks. Safe to call while a script runs.
    pub fn set_step_mode(&self, enabled: bool) {
        self.step_mode.store(enabled, Ordering::SeqCst);
    }

    /// Makes the next statement reach the handler, even inside a call being stepped over.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
        self.set_step_mode(true);
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
    }

    pub fn is_step_mode(&self) -> bool {
        self.step_mode.load(Ordering::SeqCst)
    }

    pub(crate) fn register_line_start(&self, file: &str, position: Position) {
        self.line_starts
            .write()
            .entry(SmolStr::new(file))
            .or_default()
            .entry(position.line)
            .and_modify(|column| *column = (*column).min(position.column))
            .or_insert(position.column);
    }

    fn find_breakpoint(&self, file: &str, position: Position) -> Option<Breakpoint> {
        let breakpoints = self.breakpoints.lock();
        if breakpoints.is_empty() {
            return None;
        }

        let first_column = self
            .line_starts
            .read()
            .get(file)
            .and_then(|lines| lines.get(&position.line).copied());

        breakpoints
            .iter()
            .find(|bp| {
                bp.file == file
                    && bp.line == position.line
                    && match bp.column {
                        Some(column) => column == position.column,
                        None => first_column.is_none_or(|column| column == position.column),
                    }
            })
            .cloned()
    }

    fn passes_step_filter(&self, depth: usize) -> bool {
        let (command, issued_at) = *self.stepping.lock();

        match command {
            DebugCommand::Continue | DebugCommand::StepInto => true,
            DebugCommand::StepOver => depth <= issued_at,
            DebugCommand::StepOut => depth < issued_at,
        }
    }

    /// Called before each steppable statement.
    pub(crate) fn on_statement(&self, file: &str, position: Position, depth: usize) {
        let breakpoint = self.find_breakpoint(file, position);

        let stepping = self.is_step_mode()
            && (self.interrupt.swap(false, Ordering::SeqCst) || self.passes_step_filter(depth));
        if breakpoint.is_none() && !stepping {
            return;
        }

        let state = DebuggerState {
            file: SmolStr::new(file),
            position,
            breakpoint,
            depth,
        };

        if let Some(command) = self.notify(&state) {
            *self.stepping.lock() = (command, depth);
        }
    }

    /// Sends the end-of-program notification when stepping is active.
    pub(crate) fn finish(&self) {
        if self.is_step_mode() {
            self.notify(&DebuggerState::end_of_program());
        }
        *self.stepping.lock() = (DebugCommand::Continue, 0);
    }

    fn notify(&self, state: &DebuggerState) -> Option<DebugCommand> {
        let handler = self.handler.read().clone()?;
        Some(handler.on_pause(state))
    }
}
