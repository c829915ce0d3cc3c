use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use herald_protocol::codec::{try_read_message, write_message};
use herald_protocol::{DaemonRequest, DaemonResponse};
use log::{debug, error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

use crate::state::DaemonState;

/// How often the accept loop looks at the shutdown flag when idle.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// RAII guard that ensures the Unix socket file is removed on shutdown,
/// even if we return early or panic.
struct SocketGuard<'a> {
    path: &'a Path,
}

impl<'a> Drop for SocketGuard<'a> {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                error!(
                    "Failed to remove Unix socket at {} on shutdown: {err}",
                    self.path.display()
                );
            }
        }
    }
}

/// Serve clients until SIGINT or SIGTERM.
pub fn run_rpc_server(state: Arc<DaemonState>) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    // Register signal handlers. They only set the atomic flag
    for sig in [SIGINT, SIGTERM] {
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("Failed to register signal handler for {sig}"))?;
    }

    serve(state, shutdown)
}

/// Bind the socket and accept clients until `shutdown` is set.
pub fn serve(state: Arc<DaemonState>, shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    let socket_path = &state.config.socket_path;

    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create socket directory {}", parent.display())
        })?;
    }

    // Clean up stale socket if it exists.
    if socket_path.exists() {
        fs::remove_file(socket_path).with_context(|| {
            format!(
                "Failed to remove existing socket at {}",
                socket_path.display()
            )
        })?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket at {}", socket_path.display()))?;
    listener
        .set_nonblocking(true)
        .context("Failed to make listener non-blocking")?;

    // Ensure socket is cleaned up on any exit path.
    let _socket_guard = SocketGuard {
        path: socket_path.as_path(),
    };

    info!("herald daemon listening on {}", socket_path.display());

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown signal observed; stopping RPC server.");
            break;
        }

        match listener.accept() {
            Ok((stream, _addr)) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    if let Err(err) = handle_client(stream, &state) {
                        error!("Error while handling client: {err:#}");
                    }
                });
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                error!("Accept error: {err}");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }

    info!("RPC server shutdown complete.");
    Ok(())
}

/// Answer requests on one connection until the client hangs up.
fn handle_client(mut stream: UnixStream, state: &DaemonState) -> anyhow::Result<()> {
    // Accepted sockets inherit the listener's non-blocking mode.
    stream
        .set_nonblocking(false)
        .context("Failed to make client stream blocking")?;

    while let Some(request) = try_read_message::<_, DaemonRequest>(&mut stream)
        .context("Failed to read DaemonRequest")?
    {
        debug!("Received request: {:?}", request);

        let response = match request {
            DaemonRequest::Ping => DaemonResponse::Pong,
            DaemonRequest::Status => state.status(),
            DaemonRequest::Submit(req) => state.submit(req),
        };

        write_message(&mut stream, &response).context("Failed to write DaemonResponse")?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
