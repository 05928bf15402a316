use dap::events::StoppedEventBody;
use dap::types::StoppedEventReason;
use jsd_lang::{DebugCommand, DebugHandler, DebuggerState, Shared};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::THREAD_ID;
use crate::breakpoints::BreakpointTable;
use crate::controller::{ExecutionController, StopReason};
use crate::transport::MessageWriter;

/// The engine-side debug callback: decides whether to stop, announces the stop to the
/// client and blocks the execution thread until the client resumes it.
pub struct DapDebugHandler {
    controller: Shared<ExecutionController>,
    breakpoints: Shared<Mutex<BreakpointTable>>,
    writer: Shared<MessageWriter>,
}

impl std::fmt::Debug for DapDebugHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DapDebugHandler")
            .field("mode", &self.controller.mode())
            .finish()
    }
}

impl DapDebugHandler {
    pub fn new(
        controller: Shared<ExecutionController>,
        breakpoints: Shared<Mutex<BreakpointTable>>,
        writer: Shared<MessageWriter>,
    ) -> Self {
        Self {
            controller,
            breakpoints,
            writer,
        }
    }

    fn stopped_event(&self, reason: StopReason, state: &DebuggerState, hit_ids: Vec<i64>) {
        let (reason, description) = match reason {
            StopReason::Breakpoint => (StoppedEventReason::Breakpoint, "Paused on breakpoint"),
            StopReason::Step => (StoppedEventReason::Step, "Paused after step"),
            StopReason::Pause => (StoppedEventReason::Pause, "Paused"),
        };

        let body = StoppedEventBody {
            reason,
            description: Some(description.to_string()),
            thread_id: Some(THREAD_ID),
            preserve_focus_hint: None,
            text: None,
            all_threads_stopped: Some(true),
            hit_breakpoint_ids: if hit_ids.is_empty() { None } else { Some(hit_ids) },
        };

        let result = serde_json::to_value(body)
            .map_err(|e| e.to_string())
            .and_then(|body| {
                self.writer
                    .send_event("stopped", Some(body))
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => debug!(file = %state.file, line = state.position.line, "Sent stopped event"),
            Err(e) => error!(error = %e, "Failed to send stopped event"),
        }
    }
}

impl DebugHandler for DapDebugHandler {
    fn on_pause(&self, state: &DebuggerState) -> DebugCommand {
        if state.is_end_of_program() {
            debug!("End of program");
            return DebugCommand::Continue;
        }

        let hit_ids = self.breakpoints.lock().hit_ids(
            state.breakpoint.as_ref().map(|bp| bp.id),
            &state.file,
            state.position.line,
        );
        let at_breakpoint = state.breakpoint.is_some() || !hit_ids.is_empty();

        let Some(reason) = self.controller.stop_reason(at_breakpoint) else {
            return DebugCommand::Continue;
        };

        debug!(?reason, file = %state.file, position = %state.position, depth = state.depth, "Stopping");
        let mode = self
            .controller
            .pause_and_wait(|| self.stopped_event(reason, state, hit_ids));
        debug!(?mode, "Resumed");

        mode.into()
    }
}
