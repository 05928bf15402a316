use std::io;
use std::thread::{self, JoinHandle};

use dap::events::ExitedEventBody;
use dap::types::OutputEventCategory;
use jsd_lang::{ConsoleLevel, Runtime, Shared};
use tracing::{debug, error, info};

use crate::transport::MessageWriter;

/// Scripts recurse on the native stack of the execution thread.
const EXECUTION_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Routes the script's `console.*` calls to `output` events.
pub fn forward_console(runtime: &mut Runtime, writer: &Shared<MessageWriter>) {
    let writer = Shared::clone(writer);

    runtime.set_console(move |level: ConsoleLevel, text: &str| {
        let category = if level.is_error() {
            OutputEventCategory::Stderr
        } else {
            OutputEventCategory::Console
        };

        if let Err(e) = writer.send_output(category, format!("{}\n", text)) {
            error!(error = %e, "Failed to send console output");
        }
    });
}

/// Runs `source` on a dedicated thread, reporting the outcome as `exited` and `terminated` events.
pub fn spawn(
    runtime: Runtime,
    program: String,
    source: String,
    writer: Shared<MessageWriter>,
) -> io::Result<JoinHandle<i64>> {
    thread::Builder::new()
        .name("jsd-exec".to_string())
        .stack_size(EXECUTION_STACK_SIZE)
        .spawn(move || execute(&runtime, &program, &source, &writer))
}

/// Runs the program to completion on the calling thread and returns its exit code.
pub fn execute(runtime: &Runtime, program: &str, source: &str, writer: &MessageWriter) -> i64 {
    info!(program, "Script execution starting");

    let exit_code = match runtime.run_script(program, source) {
        Ok(value) => {
            debug!(result = ?value, "Script execution completed");
            0
        }
        Err(e) => {
            error!(error = %e, "Script execution failed");
            if let Err(e) = writer.send_output(OutputEventCategory::Stderr, format!("{}\n", e)) {
                error!(error = %e, "Failed to send error output");
            }
            1
        }
    };

    let exited = serde_json::to_value(ExitedEventBody { exit_code }).ok();
    for (event, body) in [("exited", exited), ("terminated", None)] {
        if let Err(e) = writer.send_event(event, body) {
            error!(error = %e, event, "Failed to send event");
        }
    }

    info!(exit_code, "Script execution finished");
    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::io::{Cursor, Write};

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

    fn events(buffer: &SharedBuffer) -> Vec<Value> {
        let mut reader = Cursor::new(buffer.0.lock().clone());
        let mut messages = Vec::new();
        while let Some(body) = crate::transport::read_message(&mut reader).unwrap() {
            messages.push(serde_json::from_slice(&body).unwrap());
        }
        messages
    }

    fn run(code: &str) -> (i64, Vec<Value>) {
        let buffer = SharedBuffer::default();
        let writer = Shared::new(MessageWriter::new(buffer.clone()));
        let mut runtime = Runtime::new();
        forward_console(&mut runtime, &writer);

        let exit_code = spawn(runtime, "main.js".to_string(), code.to_string(), writer)
            .unwrap()
            .join()
            .unwrap();
        (exit_code, events(&buffer))
    }

    #[test]
    fn test_successful_run() {
        let (exit_code, events) = run("var x = 1;\nconsole.log('x is', x);\nconsole.warn('careful');\n");

        assert_eq!(exit_code, 0);
        let names = events.iter().map(|e| e["event"].as_str().unwrap()).collect::<Vec<_>>();
        assert_eq!(names, vec!["output", "output", "exited", "terminated"]);
        assert_eq!(events[0]["body"]["output"], "x is 1\n");
        assert_eq!(events[0]["body"]["category"], "console");
        assert_eq!(events[1]["body"]["category"], "stderr");
        assert_eq!(events[2]["body"]["exitCode"], 0);
    }

    #[test]
    fn test_uncaught_error() {
        let (exit_code, events) = run("throw new Error(\"x\")");

        assert_eq!(exit_code, 1);
        assert_eq!(events[0]["event"], "output");
        assert_eq!(events[0]["body"]["category"], "stderr");
        assert!(events[0]["body"]["output"].as_str().unwrap().contains("Error: x"));
        assert_eq!(events[1]["body"]["exitCode"], 1);
        assert_eq!(events[2]["event"], "terminated");
    }

    #[test]
    fn test_deep_recursion_reports_range_error() {
        let (exit_code, events) = run("function f(n) { return f(n + 1); }\nf(0);\n");

        assert_eq!(exit_code, 1);
        assert!(events[0]["body"]["output"].as_str().unwrap().contains("RangeError"));
    }
}
