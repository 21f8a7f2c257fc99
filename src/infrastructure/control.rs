//! Operator control
//!
//! A dedicated thread does blocking line reads on stdin and cancels the shared
//! token on `q`. Ctrl-C is wired to the same token. Cancelling twice is a
//! no-op, so both sources can fire.

use std::io::{self, BufRead};
use std::thread;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

/// Read lines until a quit command, EOF, or a read error.
/// Returns true when the token was cancelled here.
pub fn watch_lines<R: BufRead>(reader: R, cancel: &CancellationToken) -> bool {
    for line in reader.lines() {
        match line {
            Ok(line) if is_quit_command(&line) => {
                info!("Quit requested, finishing the current attempt...");
                cancel.cancel();
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Console input error: {}", e);
                return false;
            }
        }
    }
    debug!("Console input closed");
    false
}

pub fn spawn_console_listener(cancel: CancellationToken) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            watch_lines(io::stdin().lock(), &cancel);
        })
}

pub fn spawn_ctrl_c_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Ctrl-C received, finishing the current attempt...");
                    cancel.cancel();
                }
                Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
            },
        }
    })
}
