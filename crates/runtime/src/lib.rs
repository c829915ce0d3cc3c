mod config;
pub mod logging;

pub use config::{PROGRAM_LOG_LEVEL, PROGRAM_NAME, default_socket_path, herald_dir};

pub use logging::init;
