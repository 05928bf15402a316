use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpListener;

use crossbeam_channel::Receiver;
use jsd_lang::Shared;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::DynResult;
use crate::adapter::JsdAdapter;
use crate::log::{self, DebugConsoleWriter};
use crate::protocol::Request;
use crate::transport::{self, MessageWriter, TransportError};

#[cfg(debug_assertions)]
const DEFAULT_FILTER: &str = "jsd_dap=debug";
#[cfg(not(debug_assertions))]
const DEFAULT_FILTER: &str = "jsd_dap=info";

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// TCP port on 127.0.0.1. `None` or `0` serves over stdio.
    pub port: Option<u16>,
    /// A `tracing` filter directive, taking precedence over `RUST_LOG`.
    pub log_level: Option<String>,
    /// Also forward adapter logs to the client's debug console.
    pub trace_console: bool,
}

/// Installs logging and serves one debug session, returning when it ends.
pub fn start(options: ServerOptions) -> DynResult<()> {
    let logs = init_logging(&options)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting jsd debug adapter");

    match options.port.filter(|port| *port != 0) {
        None => {
            info!("Serving over stdio");
            run_session(io::stdin().lock(), io::stdout(), logs)?;
        }
        Some(port) => {
            let listener = TcpListener::bind(("127.0.0.1", port))?;
            info!(address = %listener.local_addr()?, "Waiting for a client");

            let (stream, peer) = listener.accept()?;
            info!(%peer, "Client connected");

            run_session(BufReader::new(stream.try_clone()?), stream, logs)?;
        }
    }

    info!("Debug adapter stopped");
    Ok(())
}

/// Serves one session over an arbitrary byte stream pair.
pub fn serve<R: BufRead>(reader: R, writer: impl Write + Send + 'static) -> Result<(), TransportError> {
    run_session(reader, writer, None)
}

fn init_logging(options: &ServerOptions) -> DynResult<Option<Receiver<String>>> {
    let filter = match &options.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let (console, logs) = if options.trace_console {
        let (writer, logs) = DebugConsoleWriter::new();
        let layer = fmt::layer().with_ansi(false).without_time().with_writer(writer);
        (Some(layer), Some(logs))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(console)
        .try_init()?;

    Ok(logs)
}

fn run_session<R: BufRead>(
    mut reader: R,
    writer: impl Write + Send + 'static,
    logs: Option<Receiver<String>>,
) -> Result<(), TransportError> {
    let writer = Shared::new(MessageWriter::new(writer));

    if let Some(logs) = logs {
        if let Err(e) = log::forward(logs, Shared::clone(&writer)) {
            warn!(error = %e, "Failed to start debug console forwarding");
        }
    }

    let mut adapter = JsdAdapter::new(Shared::clone(&writer));

    loop {
        let body = match transport::read_message(&mut reader) {
            Ok(Some(body)) => body,
            Ok(None) => {
                info!("Client disconnected or stream ended");
                break;
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Transport failed, ending session");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                continue;
            }
        };

        let request: Request = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Dropping message that is not valid JSON");
                continue;
            }
        };

        if adapter.handle_request(&request)?.is_break() {
            debug!(command = %request.command, "Session ended by client");
            break;
        }
    }

    Ok(())
}
