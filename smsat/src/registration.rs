use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{
    client::Client,
    commands::{GetRegistrationStatus, RegStatus},
    transport::Transport,
    Error,
};

/// Polls `AT+CREG?` until the modem reports a usable registration.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationMonitor {
    interval: Duration,
    attempt_timeout: Duration,
}

impl Default for RegistrationMonitor {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}

impl RegistrationMonitor {
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns the registration state as soon as it allows sending, or
    /// [`Error::NetworkUnavailable`] once `deadline` has passed.
    pub fn wait_for_registration<T: Transport>(
        &self,
        client: &mut Client<T>,
        deadline: Duration,
    ) -> Result<RegStatus, Error> {
        debug!("Waiting {:?} for mobile network connection", deadline);
        let start = Instant::now();
        let query = GetRegistrationStatus {
            timeout: self.attempt_timeout,
        };

        loop {
            match client.send(&query) {
                Ok(Some(status)) if status.is_registered() => {
                    info!("Network connection established ({:?})", status);
                    return Ok(status);
                }
                Ok(status) => debug!("Not registered yet: {:?}", status),
                Err(Error::Protocol { .. }) => {}
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Err(Error::NetworkUnavailable(deadline));
            }
            client.cancel().sleep(self.interval.min(deadline - elapsed))?;
        }
    }
}
