use std::{convert::Infallible, io, process::Command};

use chrono::Local;
use log::{debug, info, warn};

use crate::{client::Client, transport::Transport, Error};

/// Unsolicited result code announcing a newly stored message
pub const NOTIFICATION_TOKEN: &str = "+CMTI:";

/// Watch the modem for new message notifications until cancelled.
///
/// Every line carrying [`NOTIFICATION_TOKEN`] is reported on `out` with the
/// local time, then `on_notification` runs. Only errors end the loop, an
/// interrupt surfaces as [`Error::Cancelled`].
pub fn run<T: Transport>(
    client: &mut Client<T>,
    out: &mut impl io::Write,
    mut on_notification: impl FnMut(),
) -> Result<Infallible, Error> {
    loop {
        let line = client.read_line()?;
        debug!("Read line: {}", line);

        if line.contains(NOTIFICATION_TOKEN) {
            info!("+CMTI received");
            writeln!(out, "{} New message received", Local::now())?;
            out.flush()?;
            on_notification();
        }
    }
}

/// Shell command run for every new message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationHook {
    command: String,
}

impl NotificationHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the command through `sh -c` and wait for it. Failures are logged,
    /// never returned.
    pub fn run(&self) {
        info!("Running command: {}", self.command);
        match Command::new("sh").arg("-c").arg(&self.command).output() {
            Ok(output) => {
                debug!("Return code: {:?}", output.status.code());
                debug!("stdout: {}", String::from_utf8_lossy(&output.stdout));
                debug!("stderr: {}", String::from_utf8_lossy(&output.stderr));
                if !output.status.success() {
                    warn!("Command {:?} exited with {}", self.command, output.status);
                }
            }
            Err(e) => warn!("Could not run {:?}: {}", self.command, e),
        }
    }
}
