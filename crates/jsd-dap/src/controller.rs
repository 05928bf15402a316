use crossbeam_channel::{Receiver, Sender};
use jsd_lang::{DebugCommand, Debugger, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// The instruction the execution thread follows at its next instrumentable point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepMode {
    #[default]
    Continue,
    StepOver,
    StepInto,
    StepOut,
}

impl StepMode {
    pub fn is_stepping(self) -> bool {
        self != StepMode::Continue
    }
}

impl From<StepMode> for DebugCommand {
    fn from(mode: StepMode) -> Self {
        match mode {
            StepMode::Continue => DebugCommand::Continue,
            StepMode::StepOver => DebugCommand::StepOver,
            StepMode::StepInto => DebugCommand::StepInto,
            StepMode::StepOut => DebugCommand::StepOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint,
    Step,
    Pause,
}

#[derive(Debug, Default)]
struct ControllerState {
    mode: StepMode,
    /// A stop has been announced and its resume signal not yet sent.
    awaiting_command: bool,
    pause_requested: bool,
    debugger: Option<Shared<Debugger>>,
}

impl ControllerState {
    fn set_engine_stepping(&self, enabled: bool) {
        if let Some(debugger) = &self.debugger {
            debugger.set_step_mode(enabled);
        }
    }

    fn set_engine_interrupt(&self, enabled: bool) {
        if let Some(debugger) = &self.debugger {
            if enabled {
                debugger.interrupt();
            } else {
                debugger.clear_interrupt();
            }
        }
    }
}

/// Pause/resume handshake between the control thread and the execution thread.
///
/// The execution thread announces a stop and marks itself as awaiting a command in one
/// critical section, then blocks on a single-slot channel. A resume command that sees the
/// mark sends into the slot, so the signal survives even if the execution thread has not
/// reached `recv` yet. A resume with no announced stop only updates the mode.
#[derive(Debug)]
pub struct ExecutionController {
    state: Mutex<ControllerState>,
    resume_tx: Sender<StepMode>,
    resume_rx: Receiver<StepMode>,
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionController {
    pub fn new() -> Self {
        let (resume_tx, resume_rx) = crossbeam_channel::bounded(1);
        Self {
            state: Mutex::new(ControllerState::default()),
            resume_tx,
            resume_rx,
        }
    }

    /// Binds the engine whose single-step instrumentation this controller toggles.
    pub fn attach(&self, debugger: Shared<Debugger>) {
        self.state.lock().debugger = Some(debugger);
    }

    /// Sets the initial mode for a fresh launch.
    pub fn reset(&self, mode: StepMode) {
        let mut state = self.state.lock();
        state.mode = mode;
        state.awaiting_command = false;
        state.pause_requested = false;
        state.set_engine_interrupt(false);
        state.set_engine_stepping(mode.is_stepping());
        while self.resume_rx.try_recv().is_ok() {}
    }

    pub fn mode(&self) -> StepMode {
        self.state.lock().mode
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().awaiting_command
    }

    /// Records `mode` and releases the execution thread if it is stopped.
    /// Returns whether a stopped thread was released.
    pub fn resume(&self, mode: StepMode) -> bool {
        let mut state = self.state.lock();
        state.mode = mode;
        state.pause_requested = false;
        state.set_engine_interrupt(false);
        state.set_engine_stepping(mode.is_stepping());

        if !state.awaiting_command {
            debug!(?mode, "No stopped thread, mode recorded for the next stop");
            return false;
        }

        state.awaiting_command = false;
        if let Err(e) = self.resume_tx.try_send(mode) {
            warn!(error = %e, "Resume slot already filled");
            return false;
        }
        true
    }

    /// Asks the execution thread to stop at its next statement, whatever step is in flight.
    pub fn request_pause(&self) {
        let mut state = self.state.lock();
        state.pause_requested = true;
        state.set_engine_interrupt(true);
    }

    /// Decides whether the execution thread stops at the current statement.
    pub fn stop_reason(&self, at_breakpoint: bool) -> Option<StopReason> {
        let mut state = self.state.lock();

        if at_breakpoint {
            state.pause_requested = false;
            Some(StopReason::Breakpoint)
        } else if state.pause_requested {
            state.pause_requested = false;
            Some(StopReason::Pause)
        } else if state.mode.is_stepping() {
            Some(StopReason::Step)
        } else {
            None
        }
    }

    /// Announces a stop and blocks the calling (execution) thread until a resume command arrives.
    pub fn pause_and_wait<F>(&self, announce: F) -> StepMode
    where
        F: FnOnce(),
    {
        {
            let mut state = self.state.lock();
            announce();
            state.awaiting_command = true;
        }

        match self.resume_rx.recv() {
            // A command that superseded the one that released us wins.
            Ok(_) => self.state.lock().mode,
            Err(e) => {
                warn!(error = %e, "Resume channel closed, continuing");
                StepMode::Continue
            }
        }
    }
}
