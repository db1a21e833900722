use std::time::{Duration, Instant};

use embedded_io::{Error as _, ErrorKind};
use log::{debug, error, trace};

use crate::{
    cancel::Cancel,
    commands::AtCmd,
    helpers::{contains, LossyStr},
    transport::Transport,
    Error,
};

/// Sent ahead of every command to abort a half-entered one.
pub const ESC: u8 = 0x1B;
/// Ends a message body after the `>` prompt.
pub const CTRL_Z: u8 = 0x1A;

/// Upper bound of a single blocking read, so cancellation is noticed quickly.
const POLL_SLICE: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 256;

/// Outcome of one command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResult {
    /// Expected terminator was seen before the timeout
    pub success: bool,
    /// Everything received until the terminator or the timeout
    pub raw_response: String,
}

/// Client responsible for the command/response exchange with the modem. One
/// exchange at a time, each one waiting for its terminator or its timeout.
pub struct Client<T: Transport> {
    transport: T,
    cancel: Cancel,
    pending: Vec<u8>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, cancel: Cancel) -> Self {
        Self {
            transport,
            cancel,
            pending: Vec::new(),
        }
    }

    /// Send `command` and wait up to `timeout` for `expected` to show up in
    /// the response. A missing terminator is logged and reported through
    /// [`AtResult::success`], not as an error.
    pub fn execute(
        &mut self,
        command: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<AtResult, Error> {
        self.exchange(command, expected, timeout, false)
    }

    /// Like [`Client::execute`], without logging a missing terminator.
    pub fn execute_muted(
        &mut self,
        command: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<AtResult, Error> {
        self.exchange(command, expected, timeout, true)
    }

    /// Run a typed command. A missing terminator becomes [`Error::Protocol`].
    pub fn send<C: AtCmd<LEN>, const LEN: usize>(
        &mut self,
        cmd: &C,
    ) -> Result<C::Response, Error> {
        let mut command = heapless::String::<LEN>::new();
        cmd.write(&mut command).map_err(|_| Error::Overflow)?;

        let result = self.exchange(&command, C::EXPECTED, cmd.timeout(), C::QUIET)?;
        if !result.success {
            return Err(Error::Protocol {
                command: command.as_str().into(),
                expected: C::EXPECTED.into(),
                response: result.raw_response,
            });
        }
        cmd.parse(&result.raw_response)
    }

    /// Write a message body followed by [`CTRL_Z`] and wait for `expected`.
    /// Pending input is kept, as the modem may already be answering.
    pub fn submit(
        &mut self,
        payload: &[u8],
        expected: &str,
        timeout: Duration,
    ) -> Result<AtResult, Error> {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(CTRL_Z);
        self.write_frame(&frame)?;

        let response = self.collect(expected.as_bytes(), timeout)?;
        Ok(classify("<message body>", expected, &response, false))
    }

    /// Block until a complete line arrived and return it without its line
    /// ending. There is no overall timeout, only cancellation ends the wait.
    pub fn read_line(&mut self) -> Result<String, Error> {
        let mut chunk = [0; READ_CHUNK];
        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                return Ok(String::from_utf8_lossy(&line)
                    .trim_end_matches(['\r', '\n'])
                    .to_string());
            }

            self.cancel.check()?;
            let n = self.read_slice(&mut chunk, POLL_SLICE)?;
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn cancel(&self) -> &Cancel {
        &self.cancel
    }

    fn exchange(
        &mut self,
        command: &str,
        expected: &str,
        timeout: Duration,
        muted: bool,
    ) -> Result<AtResult, Error> {
        debug!("AT command: {}", command);

        self.pending.clear();
        self.transport.clear_input().map_err(Error::transport)?;

        let mut frame = Vec::with_capacity(command.len() + 3);
        frame.push(ESC);
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(b"\r\n");
        self.write_frame(&frame)?;

        let response = self.collect(expected.as_bytes(), timeout)?;
        Ok(classify(command, expected, &response, muted))
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        if frame.len() < 50 {
            trace!("Sending frame: {:?}", LossyStr(frame));
        } else {
            trace!("Sending frame with long payload ({} bytes)", frame.len());
        }

        self.transport.write_all(frame).map_err(Error::transport)?;
        self.transport.flush().map_err(Error::transport)
    }

    fn collect(&mut self, expected: &[u8], timeout: Duration) -> Result<Vec<u8>, Error> {
        let deadline = Instant::now() + timeout;
        let mut response = Vec::new();
        let mut chunk = [0; READ_CHUNK];

        while !contains(&response, expected) {
            self.cancel.check()?;
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let n = self.read_slice(&mut chunk, (deadline - now).min(POLL_SLICE))?;
            response.extend_from_slice(&chunk[..n]);
        }

        trace!("Buffer contents: {:?}", LossyStr(&response));
        Ok(response)
    }

    /// One read bounded by `slice`. Timeouts count as zero bytes read.
    fn read_slice(&mut self, chunk: &mut [u8], slice: Duration) -> Result<usize, Error> {
        self.transport
            .set_timeout(slice)
            .map_err(Error::transport)?;

        match self.transport.read(chunk) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(Error::transport(e)),
        }
    }
}

/// Success is the terminator appearing anywhere in the response.
fn classify(command: &str, expected: &str, response: &[u8], muted: bool) -> AtResult {
    let success = contains(response, expected.as_bytes());
    if success {
        debug!("AT response: {:?}", LossyStr(response));
    } else if !muted {
        error!("AT ERROR:\t{}", command);
        error!("AT Response:\t{:?}", LossyStr(response));
    }

    AtResult {
        success,
        raw_response: String::from_utf8_lossy(response).into_owned(),
    }
}
