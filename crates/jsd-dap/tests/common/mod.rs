#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use jsd_dap::transport::{self, TransportError};
use serde_json::{Value, json};
use tempfile::TempDir;

const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Read half of an in-memory byte pipe.
pub struct PipeReader {
    receiver: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    offset: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset == self.chunk.len() {
            match self.receiver.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.offset = 0;
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no message from the adapter"));
                }
            }
        }

        let n = buf.len().min(self.chunk.len() - self.offset);
        buf[..n].copy_from_slice(&self.chunk[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Write half of an in-memory byte pipe.
pub struct PipeWriter {
    sender: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn pipe() -> (PipeWriter, PipeReader) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (
        PipeWriter { sender },
        PipeReader {
            receiver,
            chunk: Vec::new(),
            offset: 0,
        },
    )
}

/// A script written to a temporary directory for the duration of a test.
pub struct Program {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Program {
    pub fn new(code: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.js");
        fs::write(&path, code).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &str {
        self.path.to_str().unwrap()
    }
}

/// Drives one adapter session over in-memory pipes.
pub struct TestClient {
    input: Option<PipeWriter>,
    output: BufReader<PipeReader>,
    seq: i64,
    pending: VecDeque<Value>,
    received_seqs: Vec<i64>,
    server: Option<JoinHandle<Result<(), TransportError>>>,
}

impl TestClient {
    pub fn start() -> Self {
        let (client_writer, adapter_reader) = pipe();
        let (adapter_writer, client_reader) = pipe();

        let server = thread::spawn(move || jsd_dap::serve(BufReader::new(adapter_reader), adapter_writer));

        Self {
            input: Some(client_writer),
            output: BufReader::new(client_reader),
            seq: 0,
            pending: VecDeque::new(),
            received_seqs: Vec::new(),
            server: Some(server),
        }
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.input.as_mut().unwrap().write_all(bytes).unwrap();
    }

    pub fn send(&mut self, command: &str, arguments: Option<Value>) -> i64 {
        self.seq += 1;
        let mut request = json!({"seq": self.seq, "type": "request", "command": command});
        if let Some(arguments) = arguments {
            request["arguments"] = arguments;
        }
        transport::write_message(self.input.as_mut().unwrap(), &request).unwrap();
        self.seq
    }

    fn read(&mut self) -> Value {
        let body = transport::read_message(&mut self.output)
            .unwrap()
            .expect("adapter closed the stream");
        let message: Value = serde_json::from_slice(&body).unwrap();
        self.received_seqs.push(message["seq"].as_i64().unwrap());
        message
    }

    /// `seq` of every message read from the adapter so far, in arrival order.
    pub fn received_seqs(&self) -> &[i64] {
        &self.received_seqs
    }

    /// Sends a request and returns its response, queueing any events read on the way.
    pub fn request(&mut self, command: &str, arguments: Option<Value>) -> Value {
        let seq = self.send(command, arguments);
        loop {
            let message = self.read();
            if message["type"] == "response" && message["request_seq"] == seq {
                return message;
            }
            self.pending.push_back(message);
        }
    }

    /// Returns the next message of any kind.
    pub fn next_message(&mut self) -> Value {
        match self.pending.pop_front() {
            Some(message) => message,
            None => self.read(),
        }
    }

    /// Returns the next event. Responses nobody asked for are dropped.
    pub fn next_event(&mut self) -> Value {
        loop {
            let message = self.next_message();
            if message["type"] == "event" {
                return message;
            }
        }
    }

    /// Returns the first event named `event`, discarding earlier events.
    pub fn wait_event(&mut self, event: &str) -> Value {
        loop {
            let message = self.next_event();
            if message["event"] == event {
                return message;
            }
        }
    }

    /// Collects events up to and including the first one named `last`.
    pub fn events_until(&mut self, last: &str) -> Vec<Value> {
        let mut events = Vec::new();
        loop {
            let event = self.next_event();
            let done = event["event"] == last;
            events.push(event);
            if done {
                return events;
            }
        }
    }

    pub fn initialize(&mut self) -> Value {
        let response = self.request("initialize", Some(json!({"adapterID": "jsd", "linesStartAt1": true})));
        assert_eq!(response["success"], true);
        self.wait_event("initialized");
        response
    }

    pub fn launch(&mut self, program: &Program, extra: Value) -> Value {
        let mut arguments = json!({"program": program.path()});
        if let (Some(arguments), Some(extra)) = (arguments.as_object_mut(), extra.as_object()) {
            arguments.extend(extra.clone());
        }
        self.request("launch", Some(arguments))
    }

    pub fn set_breakpoints(&mut self, path: &str, lines: &[u32]) -> Value {
        let breakpoints = lines.iter().map(|line| json!({"line": line})).collect::<Vec<_>>();
        self.request(
            "setBreakpoints",
            Some(json!({"source": {"path": path}, "breakpoints": breakpoints})),
        )
    }

    pub fn configuration_done(&mut self) -> Value {
        self.request("configurationDone", None)
    }

    pub fn stack_trace(&mut self) -> Value {
        self.request("stackTrace", Some(json!({"threadId": 1})))
    }

    pub fn scopes(&mut self, frame_id: i64) -> Value {
        self.request("scopes", Some(json!({"frameId": frame_id})))
    }

    pub fn variables(&mut self, reference: i64) -> Value {
        self.request("variables", Some(json!({"variablesReference": reference})))
    }

    pub fn evaluate(&mut self, expression: &str, frame_id: Option<i64>) -> Value {
        let mut arguments = json!({"expression": expression, "context": "repl"});
        if let Some(frame_id) = frame_id {
            arguments["frameId"] = json!(frame_id);
        }
        self.request("evaluate", Some(arguments))
    }

    pub fn resume(&mut self, command: &str) -> Value {
        self.request(command, Some(json!({"threadId": 1})))
    }

    /// Variables of the named scope of the given frame, as `(name, value)` pairs.
    pub fn scope_variables(&mut self, frame_id: i64, scope: &str) -> Vec<(String, String)> {
        let scopes = self.scopes(frame_id);
        let reference = scopes["body"]["scopes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == scope)
            .map(|s| s["variablesReference"].as_i64().unwrap())
            .unwrap();

        variable_pairs(&self.variables(reference))
    }

    /// Closes the client side and waits for the adapter to finish.
    pub fn finish(mut self) {
        self.input.take();
        if let Some(server) = self.server.take() {
            server.join().unwrap().unwrap();
        }
    }

    /// Waits for the adapter to finish after it ended the session itself.
    pub fn join(mut self) {
        if let Some(server) = self.server.take() {
            server.join().unwrap().unwrap();
        }
    }
}

pub fn variable_pairs(response: &Value) -> Vec<(String, String)> {
    response["body"]["variables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| {
            (
                v["name"].as_str().unwrap().to_string(),
                v["value"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

pub fn top_frame(stack_trace: &Value) -> (i64, String, i64) {
    let frame = &stack_trace["body"]["stackFrames"][0];
    (
        frame["id"].as_i64().unwrap(),
        frame["name"].as_str().unwrap().to_string(),
        frame["line"].as_i64().unwrap(),
    )
}
