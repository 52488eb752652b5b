//! Completion notification on a background thread. The thread touches no
//! timer state.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::output::stamp;

pub fn spawn(label: &str, command: Option<Vec<String>>) -> JoinHandle<()> {
    let label = label.to_string();
    thread::spawn(move || {
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "\x07{}", stamp(format!("{} done. Notified.", label)));
        let _ = stdout.flush();

        let Some((program, args)) = command.as_deref().and_then(|c| c.split_first()) else {
            return;
        };
        let status = Command::new(program)
            .args(args)
            .env("TOCK_LABEL", &label)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if !status.success() => {
                tracing::warn!(program = %program, %status, "Notify command failed");
            }
            Err(err) => {
                tracing::warn!(program = %program, error = %err, "Failed to run notify command");
            }
            Ok(_) => {}
        }
    })
}
