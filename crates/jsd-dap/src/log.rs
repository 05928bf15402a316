use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use dap::types::OutputEventCategory;
use jsd_lang::Shared;
use tracing_subscriber::fmt::MakeWriter;

use crate::transport::MessageWriter;

/// A `tracing` writer that hands each formatted log line to a channel.
#[derive(Clone)]
pub struct DebugConsoleWriter {
    sender: Sender<String>,
}

impl DebugConsoleWriter {
    pub fn new() -> (Self, Receiver<String>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl Write for DebugConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A closed channel means the session is gone; logging must not fail because of it.
        let _ = self.sender.send(String::from_utf8_lossy(buf).to_string());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for DebugConsoleWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Drains `logs` into `console` output events until the channel closes or the client goes away.
pub fn forward(logs: Receiver<String>, writer: Shared<MessageWriter>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("jsd-log".to_string())
        .spawn(move || {
            for line in logs.iter() {
                if writer.send_output(OutputEventCategory::Console, line).is_err() {
                    break;
                }
            }
        })
}
