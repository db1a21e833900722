use std::time::Duration;

use log::{debug, error, info};
use sms_pdu::{Pdu, Submit};

use crate::{client::Client, commands::SendPrompt, transport::Transport, Error};

/// Sends encoded message parts with the `AT+CMGS` prompt/submit exchange.
#[derive(Debug, Clone, Copy)]
pub struct Sender {
    prompt_timeout: Duration,
    ack_timeout: Duration,
}

impl Default for Sender {
    fn default() -> Self {
        Self {
            prompt_timeout: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

impl Sender {
    /// How long to wait for the `>` prompt.
    #[must_use]
    pub const fn prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    /// How long to wait for `OK` after a message body.
    #[must_use]
    pub const fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Encode `text` into as many units as it needs. Multi-part messages get
    /// a random concatenation reference.
    pub fn encode(recipient: &str, text: &str) -> Result<Vec<Pdu>, Error> {
        let pdus = Submit::new(recipient, text)
            .with_reference(rand::random())
            .to_pdus()?;
        debug!("Encoded message to {} into {} parts", recipient, pdus.len());
        Ok(pdus)
    }

    /// Transmit `pdus` in order, reporting each one to `progress` as
    /// `(sent, total)`. Stops at the first part that is not acknowledged;
    /// parts already sent stay sent.
    pub fn transmit<T: Transport>(
        &self,
        client: &mut Client<T>,
        pdus: &[Pdu],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<(), Error> {
        let total = pdus.len();
        for (sent, pdu) in pdus.iter().enumerate() {
            if let Err(source) = self.transmit_one(client, pdu) {
                error!("Error sending message part {}/{}: {}", sent + 1, total, source);
                return Err(Error::Send {
                    sent,
                    total,
                    source: Box::new(source),
                });
            }
            progress(sent + 1, total);
        }

        info!("Message sent successfully");
        Ok(())
    }

    /// Encode and transmit in one go.
    pub fn send<T: Transport>(
        &self,
        client: &mut Client<T>,
        recipient: &str,
        text: &str,
    ) -> Result<(), Error> {
        let pdus = Self::encode(recipient, text)?;
        self.transmit(client, &pdus, |_, _| {})
    }

    fn transmit_one<T: Transport>(&self, client: &mut Client<T>, pdu: &Pdu) -> Result<(), Error> {
        client.send(&SendPrompt {
            length: pdu.length(),
            timeout: self.prompt_timeout,
        })?;

        debug!("{}", pdu.as_str());
        let ack = client.submit(pdu.as_str().as_bytes(), "OK", self.ack_timeout)?;
        if !ack.success {
            return Err(Error::Protocol {
                command: format!("message body ({} octets)", pdu.length()),
                expected: "OK".into(),
                response: ack.raw_response,
            });
        }
        Ok(())
    }
}
