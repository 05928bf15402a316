use std::fs;
use std::ops::ControlFlow;
use std::thread::JoinHandle;

use dap::requests::{
    EvaluateArguments, ScopesArguments, SetBreakpointsArguments, StackTraceArguments, VariablesArguments,
};
use dap::responses::{
    ContinueResponse, ScopesResponse, SetBreakpointsResponse, SetExceptionBreakpointsResponse, StackTraceResponse,
    ThreadsResponse, VariablesResponse,
};
use dap::types::{self, Capabilities, OutputEventCategory};
use jsd_lang::{Runtime, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::THREAD_ID;
use crate::breakpoints::{BreakpointTable, RequestedBreakpoint};
use crate::controller::{ExecutionController, StepMode};
use crate::error::JsdAdapterError;
use crate::executor;
use crate::handler::DapDebugHandler;
use crate::inspect::Inspector;
use crate::protocol::{LaunchArgs, Request};
use crate::transport::{MessageWriter, TransportError};

type CommandResult = Result<Option<Value>, JsdAdapterError>;

#[derive(Debug)]
struct LaunchedProgram {
    program: String,
    source: String,
}

/// Session state for one client: dispatches requests and owns the debuggee.
pub struct JsdAdapter {
    writer: Shared<MessageWriter>,
    controller: Shared<ExecutionController>,
    breakpoints: Shared<Mutex<BreakpointTable>>,
    inspector: Inspector,
    runtime: Runtime,
    launched: Option<LaunchedProgram>,
    execution: Option<JoinHandle<i64>>,
}

impl std::fmt::Debug for JsdAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsdAdapter")
            .field("launched", &self.launched.as_ref().map(|launched| &launched.program))
            .field("running", &self.execution.is_some())
            .finish()
    }
}

fn body<T: Serialize>(body: T) -> CommandResult {
    serde_json::to_value(body)
        .map(Some)
        .map_err(|e| JsdAdapterError::Transport(TransportError::Encode(e)))
}

impl JsdAdapter {
    pub fn new(writer: Shared<MessageWriter>) -> Self {
        // Evaluation before launch runs in a scratch context whose output still goes to the client.
        let mut runtime = Runtime::new();
        executor::forward_console(&mut runtime, &writer);

        Self {
            writer,
            controller: Shared::new(ExecutionController::new()),
            breakpoints: Shared::new(Mutex::new(BreakpointTable::new())),
            inspector: Inspector::new(),
            runtime,
            launched: None,
            execution: None,
        }
    }

    /// Answers one request. Breaks once the session should end.
    pub fn handle_request(&mut self, request: &Request) -> Result<ControlFlow<()>, TransportError> {
        if !request.is_request() {
            debug!(seq = request.seq, kind = %request.type_, "Ignoring non-request message");
            return Ok(ControlFlow::Continue(()));
        }

        debug!(seq = request.seq, command = %request.command, "Received request");

        let succeeded = match self.dispatch(request) {
            Ok(body) => {
                self.writer.respond(request, Ok(body))?;
                true
            }
            Err(e) => {
                warn!(command = %request.command, error = %e, "Request failed");
                self.writer.respond(request, Err(e.to_string()))?;
                false
            }
        };

        match request.command.as_str() {
            "initialize" if succeeded => self.writer.send_event("initialized", None)?,
            "configurationDone" if succeeded => self.start_execution(),
            "terminate" => {
                self.writer.send_event("terminated", None)?;
                return Ok(ControlFlow::Break(()));
            }
            "disconnect" => return Ok(ControlFlow::Break(())),
            _ => {}
        }

        Ok(ControlFlow::Continue(()))
    }

    fn dispatch(&mut self, request: &Request) -> CommandResult {
        match request.command.as_str() {
            "initialize" => body(Capabilities {
                supports_configuration_done_request: Some(true),
                supports_conditional_breakpoints: Some(false),
                supports_evaluate_for_hovers: Some(true),
                supports_set_variable: Some(false),
                supports_terminate_request: Some(true),
                ..Default::default()
            }),
            "launch" => self.launch(request.arguments()?),
            "setBreakpoints" => self.set_breakpoints(request.arguments()?),
            "setExceptionBreakpoints" => body(SetExceptionBreakpointsResponse {
                breakpoints: Some(Vec::new()),
            }),
            "configurationDone" => Ok(None),
            "threads" => body(ThreadsResponse {
                threads: vec![types::Thread {
                    id: THREAD_ID,
                    name: "main".to_string(),
                }],
            }),
            "stackTrace" => self.stack_trace(request.optional_arguments()?),
            "scopes" => {
                let args: ScopesArguments = request.arguments()?;
                body(ScopesResponse {
                    scopes: self.inspector.scopes(args.frame_id),
                })
            }
            "variables" => {
                let args: VariablesArguments = request.arguments()?;
                body(VariablesResponse {
                    variables: self.inspector.variables(&self.runtime, args.variables_reference),
                })
            }
            "evaluate" => {
                let args: EvaluateArguments = request.arguments()?;
                debug!(expression = %args.expression, frame_id = ?args.frame_id, "Evaluating");
                let response = self
                    .inspector
                    .evaluate(&self.runtime, &args.expression, args.frame_id)
                    .map_err(|e| JsdAdapterError::EvaluationError(e.to_string()))?;
                body(response)
            }
            "continue" => {
                self.resume(StepMode::Continue)?;
                body(ContinueResponse {
                    all_threads_continued: Some(true),
                })
            }
            "next" => self.resume(StepMode::StepOver),
            "stepIn" => self.resume(StepMode::StepInto),
            "stepOut" => self.resume(StepMode::StepOut),
            "pause" => {
                self.controller.request_pause();
                Ok(None)
            }
            "disconnect" | "terminate" => {
                info!(command = %request.command, "Ending session");
                Ok(None)
            }
            command => Err(JsdAdapterError::UnhandledCommand(command.to_string())),
        }
    }

    fn launch(&mut self, args: LaunchArgs) -> CommandResult {
        debug!(?args, "Received launch request");

        if self.execution.is_some() {
            return Err(JsdAdapterError::AlreadyRunning);
        }

        let source = fs::read_to_string(&args.program).map_err(|source| JsdAdapterError::FileError {
            path: args.program.clone(),
            source,
        })?;

        let mut runtime = Runtime::new();
        executor::forward_console(&mut runtime, &self.writer);

        {
            let mut breakpoints = self.breakpoints.lock();
            breakpoints.set_program(&args.program);

            if args.no_debug {
                info!(program = %args.program, "Launching without debugging");
            } else {
                let debugger = runtime.enable_debugger();
                debugger.set_handler(Shared::new(DapDebugHandler::new(
                    Shared::clone(&self.controller),
                    Shared::clone(&self.breakpoints),
                    Shared::clone(&self.writer),
                )));
                breakpoints.apply(&debugger);
                self.controller.attach(debugger);
            }
        }

        self.controller.reset(if args.stop_on_entry {
            StepMode::StepInto
        } else {
            StepMode::Continue
        });
        self.inspector.invalidate();
        self.runtime = runtime;
        self.launched = Some(LaunchedProgram {
            program: args.program,
            source,
        });

        Ok(None)
    }

    fn set_breakpoints(&mut self, args: SetBreakpointsArguments) -> CommandResult {
        let path = args
            .source
            .path
            .clone()
            .or_else(|| args.source.name.clone())
            .ok_or_else(|| JsdAdapterError::MissingArguments("setBreakpoints source".to_string()))?;

        let requested = args
            .breakpoints
            .iter()
            .flatten()
            .map(|bp| RequestedBreakpoint {
                line: bp.line.max(0) as u32,
                column: bp.column.map(|column| column.max(0) as u32),
            })
            .collect::<Vec<_>>();

        let debugger = self.runtime.debugger();
        let added = self
            .breakpoints
            .lock()
            .replace_for_file(&path, &requested, debugger.as_deref());

        let breakpoints = added
            .into_iter()
            .map(|(id, entry)| types::Breakpoint {
                id: Some(id),
                verified: true,
                message: None,
                source: Some(args.source.clone()),
                line: Some(i64::from(entry.line)),
                column: entry.column.map(i64::from),
                end_line: None,
                end_column: None,
                instruction_reference: None,
                offset: None,
            })
            .collect();

        body(SetBreakpointsResponse { breakpoints })
    }

    fn stack_trace(&mut self, args: Option<StackTraceArguments>) -> CommandResult {
        self.inspector.capture(&self.runtime);

        let (start, levels) = args.map(|args| (args.start_frame, args.levels)).unwrap_or_default();
        let start = start.unwrap_or(0).max(0) as usize;
        let levels = levels.map(|levels| levels.max(0) as usize);

        body(StackTraceResponse {
            stack_frames: self.inspector.stack_frames(start, levels),
            total_frames: Some(self.inspector.total_frames() as i64),
        })
    }

    fn resume(&mut self, mode: StepMode) -> CommandResult {
        // Handles from the previous stop must not outlive it.
        self.inspector.invalidate();
        let released = self.controller.resume(mode);
        debug!(?mode, released, "Resume requested");
        Ok(None)
    }

    fn start_execution(&mut self) {
        if self.execution.is_some() {
            debug!("Execution already started");
            return;
        }
        let Some(launched) = &self.launched else {
            debug!("configurationDone before launch, nothing to run");
            return;
        };

        match executor::spawn(
            self.runtime.clone(),
            launched.program.clone(),
            launched.source.clone(),
            Shared::clone(&self.writer),
        ) {
            Ok(handle) => self.execution = Some(handle),
            Err(e) => {
                error!(error = %e, "Failed to start execution thread");
                let message = JsdAdapterError::SpawnError(e).to_string();
                if let Err(e) = self.writer.send_output(OutputEventCategory::Stderr, format!("{}\n", message)) {
                    error!(error = %e, "Failed to report execution failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::io::{self, Cursor, Write};

    #[derive(Clone, Default)]
    struct SharedBuffer(Shared<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn take(&self) -> Vec<Value> {
            let bytes = std::mem::take(&mut *self.0.lock());
            let mut reader = Cursor::new(bytes);
            let mut messages = Vec::new();
            while let Some(body) = crate::transport::read_message(&mut reader).unwrap() {
                messages.push(serde_json::from_slice(&body).unwrap());
            }
            messages
        }
    }

    fn adapter() -> (JsdAdapter, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let adapter = JsdAdapter::new(Shared::new(MessageWriter::new(buffer.clone())));
        (adapter, buffer)
    }

    fn request(seq: i64, command: &str, arguments: Option<Value>) -> Request {
        let mut message = json!({"seq": seq, "type": "request", "command": command});
        if let Some(arguments) = arguments {
            message["arguments"] = arguments;
        }
        serde_json::from_value(message).unwrap()
    }

    #[test]
    fn test_initialize() {
        let (mut adapter, output) = adapter();

        let flow = adapter
            .handle_request(&request(1, "initialize", Some(json!({"adapterID": "jsd"}))))
            .unwrap();
        let messages = output.take();

        assert!(flow.is_continue());
        assert_eq!(messages[0]["type"], "response");
        assert_eq!(messages[0]["success"], true);
        assert_eq!(messages[0]["body"]["supportsConfigurationDoneRequest"], true);
        assert_eq!(messages[0]["body"]["supportsEvaluateForHovers"], true);
        assert_eq!(messages[0]["body"]["supportsTerminateRequest"], true);
        assert_eq!(messages[1]["event"], "initialized");
    }

    #[rstest]
    #[case::unknown("restartFrame", None)]
    #[case::missing_arguments("launch", None)]
    #[case::missing_program("launch", Some(json!({"program": "/definitely/not/here.js"})))]
    #[case::bad_arguments("scopes", Some(json!({"frameId": "one"})))]
    fn test_failed_requests_keep_session(#[case] command: &str, #[case] arguments: Option<Value>) {
        let (mut adapter, output) = adapter();

        let flow = adapter.handle_request(&request(4, command, arguments)).unwrap();
        let messages = output.take();

        assert!(flow.is_continue());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["success"], false);
        assert_eq!(messages[0]["request_seq"], 4);
        assert!(!messages[0]["message"].as_str().unwrap().is_empty());

        adapter.handle_request(&request(5, "threads", None)).unwrap();
        let threads = output.take();
        assert_eq!(threads[0]["body"]["threads"][0]["id"], THREAD_ID);
        assert_eq!(threads[0]["body"]["threads"][0]["name"], "main");
    }

    #[test]
    fn test_evaluate_without_program() {
        let (mut adapter, output) = adapter();

        adapter
            .handle_request(&request(1, "evaluate", Some(json!({"expression": "1+1"}))))
            .unwrap();
        adapter
            .handle_request(&request(2, "evaluate", Some(json!({"expression": "nope", "context": "repl"}))))
            .unwrap();
        let messages = output.take();

        assert_eq!(messages[0]["body"]["result"], "2");
        assert_eq!(messages[0]["body"]["type"], "number");
        assert_eq!(messages[1]["success"], false);
        assert!(messages[1]["message"].as_str().unwrap().contains("nope is not defined"));
    }

    #[test]
    fn test_breakpoints_before_launch() {
        let (mut adapter, output) = adapter();

        adapter
            .handle_request(&request(
                1,
                "setBreakpoints",
                Some(json!({"source": {"path": "/tmp/main.js"}, "breakpoints": [{"line": 2}, {"line": 7, "column": 3}]})),
            ))
            .unwrap();
        let messages = output.take();
        let breakpoints = messages[0]["body"]["breakpoints"].as_array().unwrap();

        assert_eq!(breakpoints.len(), 2);
        assert_eq!(breakpoints[0]["id"], 1);
        assert_eq!(breakpoints[0]["verified"], true);
        assert_eq!(breakpoints[0]["line"], 2);
        assert_eq!(breakpoints[1]["column"], 3);
        assert_eq!(breakpoints[1]["source"]["path"], "/tmp/main.js");
        assert_eq!(adapter.breakpoints.lock().len(), 2);
    }

    #[test]
    fn test_configuration_done_before_launch_starts_nothing() {
        let (mut adapter, output) = adapter();

        adapter.handle_request(&request(1, "configurationDone", None)).unwrap();

        assert!(adapter.execution.is_none());
        assert_eq!(output.take()[0]["success"], true);
    }

    #[test]
    fn test_resume_without_stop() {
        let (mut adapter, output) = adapter();

        for (seq, command) in ["continue", "next", "stepIn", "stepOut", "pause"].into_iter().enumerate() {
            let flow = adapter
                .handle_request(&request(seq as i64 + 1, command, Some(json!({"threadId": THREAD_ID}))))
                .unwrap();
            assert!(flow.is_continue());
        }

        let messages = output.take();
        assert!(messages.iter().all(|message| message["success"] == true));
        assert_eq!(messages[0]["body"]["allThreadsContinued"], true);
    }

    #[rstest]
    #[case::disconnect("disconnect", vec!["response"])]
    #[case::terminate("terminate", vec!["response", "event"])]
    fn test_session_end(#[case] command: &str, #[case] kinds: Vec<&str>) {
        let (mut adapter, output) = adapter();

        let flow = adapter.handle_request(&request(1, command, None)).unwrap();
        let messages = output.take();

        assert!(flow.is_break());
        assert_eq!(messages.iter().map(|m| m["type"].as_str().unwrap()).collect::<Vec<_>>(), kinds);
        if command == "terminate" {
            assert_eq!(messages[1]["event"], "terminated");
        }
    }
}
