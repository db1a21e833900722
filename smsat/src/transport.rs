use std::{io, time::Duration};

use embedded_io::{ErrorType, Read, Write};
use log::info;
use serialport::{ClearBuffer, FlowControl, SerialPort};

use crate::{Error, SessionConfig};

/// Byte stream to the modem.
///
/// Reads block for at most the configured timeout and report an
/// [`embedded_io::ErrorKind::TimedOut`] error when nothing arrived.
pub trait Transport: Read + Write {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), Self::Error>;

    /// Discard bytes received but not yet read.
    fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Discard bytes written but not yet transmitted.
    fn clear_output(&mut self) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        T::set_timeout(self, timeout)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        T::clear_input(self)
    }

    fn clear_output(&mut self) -> Result<(), Self::Error> {
        T::clear_output(self)
    }
}

/// [`Transport`] over a local serial device.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(config: &SessionConfig) -> Result<Self, Error> {
        info!(
            "Setting up serial port {} at {} {:?}",
            config.port, config.baud, config.framing
        );

        let mut port = serialport::new(&config.port, config.baud)
            .data_bits(config.framing.data_bits)
            .parity(config.framing.parity)
            .stop_bits(config.framing.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()?;
        port.clear(ClearBuffer::All)?;

        Ok(Self { port })
    }
}

impl ErrorType for SerialTransport {
    type Error = io::Error;
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        io::Read::read(&mut self.port, buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        io::Write::write(&mut self.port, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        io::Write::flush(&mut self.port)
    }
}

impl Transport for SerialTransport {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn clear_output(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(ClearBuffer::Output)
            .map_err(io::Error::from)
    }
}
