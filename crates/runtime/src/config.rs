use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "herald";
pub const PROGRAM_LOG_LEVEL: &str = "HERALD_LOG_LEVEL";
pub const SOCKET_FILE_NAME: &str = "herald.sock";

/// Per-user directory for runtime artifacts (socket, journal).
///
/// Prefers the runtime dir (`$XDG_RUNTIME_DIR` on Linux) and falls back to the
/// cache dir, then to the current directory.
pub fn herald_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROGRAM_NAME)
}

/// Default Unix socket path shared by the daemon and the client.
pub fn default_socket_path() -> PathBuf {
    herald_dir().join(SOCKET_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
