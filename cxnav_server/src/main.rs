//! # cxnav_server
//!
//! Editor-facing completion and symbol-location server. Speaks the cxnav
//! line protocol on stdin/stdout: the editor writes newline-framed requests,
//! the server answers and terminates every response with a `$` line.
//!
//! ## Usage
//!
//! ```bash
//! # Serve completions for one buffer, with its compile flags
//! cxnav_server /path/to/main.cpp -- -I/path/include -std=c++17
//! ```

use std::io::{stdin, stdout};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use tracing::info;

use cxnav::parser::clang::ClangParser;
use cxnav::server::Server;

#[derive(ClapParser, Debug)]
#[command(name = "cxnav_server")]
#[command(about = "Completion and symbol-location server over libclang")]
#[command(version)]
struct Args {
    /// Source file the session is opened for
    source: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Arguments passed verbatim to the clang driver
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    clang_args: Vec<String>,
}

/// Configure SIGPIPE handling to ignore broken pipes at OS level.
/// On Unix systems, writing to a closed pipe sends SIGPIPE which terminates
/// the process. We ignore it so the write fails with EPIPE instead and the
/// request loop can wind down as an ordinary I/O error.
#[cfg(unix)]
fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_sigpipe() {
    // No-op on non-Unix platforms
}

fn main() -> Result<()> {
    // Ignore SIGPIPE - a dying editor becomes an EPIPE error, not a signal
    ignore_sigpipe();

    let args = Args::parse();

    // Initialize logging - MUST write to stderr, stdout is the wire.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    info!("Starting cxnav_server v{}", env!("CARGO_PKG_VERSION"));
    info!("Session source: {}", args.source);

    let parser = ClangParser::new().context("libclang is required at runtime")?;
    let mut server = Server::new(parser, args.source, args.clang_args);

    info!("Server ready. Listening on stdio...");

    let stdin = stdin();
    let stdout = stdout();
    server.run(&mut stdin.lock(), &mut stdout.lock())?;

    Ok(())
}
