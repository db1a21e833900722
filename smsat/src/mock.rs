use std::{collections::VecDeque, sync::Once, thread, time::Duration};

use embedded_io::{ErrorKind, ErrorType};
use env_logger::Env;

use crate::{cancel::Cancel, transport::Transport};

static INIT: Once = Once::new();

pub fn setup_log() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
            .is_test(true)
            .init();
    });
}

/// In-memory modem. Every written frame (a write ending a line or carrying the
/// submit byte) releases the next scripted reply into the receive buffer.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    pub written: Vec<u8>,
    pub input_clears: usize,
    pub output_clears: usize,
    cancel_when_drained: Option<Cancel>,
    fail_with: Option<ErrorKind>,
}

#[derive(Debug)]
pub struct MockError(pub ErrorKind);

impl embedded_io::Error for MockError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply to the next frame.
    pub fn reply(mut self, reply: &str) -> Self {
        self.replies.push_back(reply.as_bytes().to_vec());
        self
    }

    /// Bytes already waiting in the receive buffer, as sent unsolicited by the
    /// modem.
    pub fn unsolicited(mut self, data: &str) -> Self {
        self.rx.extend(data.bytes());
        self
    }

    /// Raise `cancel` once the receive buffer runs dry.
    pub fn cancel_when_drained(mut self, cancel: &Cancel) -> Self {
        self.cancel_when_drained = Some(cancel.clone());
        self
    }

    /// Fail every read with `kind`.
    pub fn failing(mut self, kind: ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }

    /// Written frames as text, without the leading escape byte and the line
    /// or submit terminator.
    pub fn commands(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written)
            .split_inclusive(['\n', '\u{1A}'])
            .map(|frame| {
                frame
                    .trim_start_matches('\u{1B}')
                    .trim_end_matches(['\r', '\n', '\u{1A}'])
                    .to_string()
            })
            .collect()
    }
}

impl ErrorType for ScriptedTransport {
    type Error = MockError;
}

impl embedded_io::Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if let Some(kind) = self.fail_with {
            return Err(MockError(kind));
        }

        if self.rx.is_empty() {
            if let Some(cancel) = &self.cancel_when_drained {
                cancel.cancel();
            }
            thread::sleep(Duration::from_millis(1));
            return Err(MockError(ErrorKind::TimedOut));
        }

        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl embedded_io::Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.extend_from_slice(buf);
        if buf.iter().any(|b| matches!(b, b'\n' | 0x1A)) {
            if let Some(reply) = self.replies.pop_front() {
                self.rx.extend(reply);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), Self::Error> {
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.input_clears += 1;
        self.rx.clear();
        Ok(())
    }

    fn clear_output(&mut self) -> Result<(), Self::Error> {
        self.output_clears += 1;
        Ok(())
    }
}
