use std::io::Stderr;
use std::sync::{LazyLock, Mutex};

pub mod dialog;
pub mod init;
pub mod message;
pub mod table;

pub static TERMINAL_STDERR: LazyLock<Mutex<Stderr>> =
    LazyLock::new(|| Mutex::new(std::io::stderr()));
