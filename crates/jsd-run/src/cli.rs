use clap::{Parser, Subcommand};
use colored::Colorize;
use jsd_lang::{ConsoleLevel, Runtime};
use miette::{IntoDiagnostic, miette};
use std::io::{self, Write};
use std::path::PathBuf;
use std::{fs, thread};

/// Scripts recurse on the native stack of the thread running them.
const RUN_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "jsd")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To run a script:\n\
    jsd run main.js\n\n\
    ## To start a debug adapter over stdio:\n\
    jsd dap\n\n\
    ## To accept one debug client on a TCP port:\n\
    jsd dap --port 4711")]
#[command(about = "jsd runs and debugs JavaScript-subset scripts.", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a script to completion
    Run {
        /// Path to the script
        file: PathBuf,
        /// Calls nested deeper than this raise a RangeError
        #[arg(long)]
        max_call_depth: Option<usize>,
    },
    /// Start a Debug Adapter Protocol server
    Dap {
        /// Accept one client on 127.0.0.1:<PORT> instead of serving stdio
        #[arg(short, long)]
        port: Option<u16>,
        /// Log filter directive, e.g. `debug` or `jsd_dap=trace`
        #[arg(long)]
        log_level: Option<String>,
        /// Forward adapter logs to the client's debug console
        #[arg(long)]
        trace_console: bool,
    },
}

impl Cli {
    pub fn run(self) -> miette::Result<()> {
        match self.commands {
            Commands::Run { file, max_call_depth } => run_file(file, max_call_depth),
            Commands::Dap {
                port,
                log_level,
                trace_console,
            } => jsd_dap::start(jsd_dap::ServerOptions {
                port,
                log_level,
                trace_console,
            })
            .map_err(|e| miette!(e.to_string())),
        }
    }
}

fn run_file(file: PathBuf, max_call_depth: Option<usize>) -> miette::Result<()> {
    if !file.exists() {
        return Err(miette!("File not found: {}", file.display()));
    }

    let code = fs::read_to_string(&file).into_diagnostic()?;
    let name = file.to_string_lossy().to_string();

    let mut runtime = Runtime::new();
    if let Some(max_call_depth) = max_call_depth {
        runtime.set_max_call_depth(max_call_depth);
    }
    runtime.set_console(print_console);

    let result = thread::Builder::new()
        .name("jsd-run".to_string())
        .stack_size(RUN_STACK_SIZE)
        .spawn(move || runtime.run_script(&name, &code).map(|_| ()))
        .into_diagnostic()?
        .join()
        .map_err(|_| miette!("Script thread panicked"))?;

    io::stdout().flush().into_diagnostic()?;
    result.map_err(miette::Report::new)
}

fn print_console(level: ConsoleLevel, text: &str) {
    // A closed pipe on the other end is not the script's failure.
    let _ = match level {
        ConsoleLevel::Warn => writeln!(io::stderr().lock(), "{}", text.yellow()),
        ConsoleLevel::Error => writeln!(io::stderr().lock(), "{}", text.red()),
        ConsoleLevel::Log | ConsoleLevel::Info | ConsoleLevel::Debug => writeln!(io::stdout().lock(), "{}", text),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::run(vec!["jsd", "run", "main.js"])]
    #[case::run_with_depth(vec!["jsd", "run", "main.js", "--max-call-depth", "32"])]
    #[case::dap(vec!["jsd", "dap"])]
    #[case::dap_with_options(vec!["jsd", "dap", "--port", "4711", "--log-level", "debug", "--trace-console"])]
    fn test_parse_commands(#[case] args: Vec<&str>) {
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[rstest]
    #[case::no_subcommand(vec!["jsd"])]
    #[case::run_without_file(vec!["jsd", "run"])]
    #[case::bad_port(vec!["jsd", "dap", "--port", "seventy"])]
    fn test_reject_invalid_commands(#[case] args: Vec<&str>) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_dap_options() {
        let cli = Cli::try_parse_from(["jsd", "dap", "-p", "0", "--trace-console"]).unwrap();

        match cli.commands {
            Commands::Dap {
                port,
                log_level,
                trace_console,
            } => {
                assert_eq!(port, Some(0));
                assert_eq!(log_level, None);
                assert!(trace_console);
            }
            Commands::Run { .. } => panic!("expected the dap command"),
        }
    }

    #[test]
    fn test_run_missing_file() {
        let err = run_file(PathBuf::from("/no/such/script.js"), None).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
