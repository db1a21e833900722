use core::str::FromStr;
use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use crate::Error;

/// Byte framing of the serial link, written as `8N1`, `7E2` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Config(format!("serial mode {s:?}"));

        let &[data_bits, parity, stop_bits] = s.as_bytes() else {
            return Err(invalid());
        };

        Ok(Self {
            data_bits: match data_bits {
                b'5' => DataBits::Five,
                b'6' => DataBits::Six,
                b'7' => DataBits::Seven,
                b'8' => DataBits::Eight,
                _ => return Err(invalid()),
            },
            parity: match parity.to_ascii_uppercase() {
                b'N' => Parity::None,
                b'E' => Parity::Even,
                b'O' => Parity::Odd,
                _ => return Err(invalid()),
            },
            stop_bits: match stop_bits {
                b'1' => StopBits::One,
                b'2' => StopBits::Two,
                _ => return Err(invalid()),
            },
        })
    }
}

/// Modem power pin. A pulse duration means the modem toggles on a pulse of
/// that length; without one the pin is held at the active level while the
/// modem should be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerPin {
    pub(crate) pin: u8,
    pub(crate) active_low: bool,
    pub(crate) pulse_up: Option<Duration>,
    pub(crate) pulse_down: Option<Duration>,
}

impl PowerPin {
    #[must_use]
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            active_low: false,
            pulse_up: None,
            pulse_down: None,
        }
    }

    #[must_use]
    pub const fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    #[must_use]
    pub const fn pulse_up(mut self, pulse: Option<Duration>) -> Self {
        self.pulse_up = pulse;
        self
    }

    #[must_use]
    pub const fn pulse_down(mut self, pulse: Option<Duration>) -> Self {
        self.pulse_down = pulse;
        self
    }

    pub const fn pin(&self) -> u8 {
        self.pin
    }
}

/// Connection parameters of one session. Built once before the session
/// starts and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub(crate) port: String,
    pub(crate) baud: u32,
    pub(crate) framing: Framing,
    pub(crate) power: Option<PowerPin>,
    pub(crate) registration_wait: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyS0"),
            baud: 115_200,
            framing: Framing::default(),
            power: None,
            registration_wait: Duration::from_secs(18),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    #[must_use]
    pub const fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    #[must_use]
    pub const fn power_pin(mut self, power: Option<PowerPin>) -> Self {
        self.power = power;
        self
    }

    #[must_use]
    pub const fn registration_wait(mut self, wait: Duration) -> Self {
        self.registration_wait = wait;
        self
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub const fn power(&self) -> Option<PowerPin> {
        self.power
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_framing() {
        assert_eq!("8N1".parse::<Framing>().unwrap(), Framing::default());
        assert_eq!(
            "7e2".parse::<Framing>().unwrap(),
            Framing {
                data_bits: DataBits::Seven,
                parity: Parity::Even,
                stop_bits: StopBits::Two,
            }
        );
        assert!("9N1".parse::<Framing>().is_err());
        assert!("8X1".parse::<Framing>().is_err());
        assert!("8N".parse::<Framing>().is_err());
        assert!("8N1 ".parse::<Framing>().is_err());
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.port(), "/dev/ttyS0");
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.power(), None);
        assert_eq!(config.registration_wait, Duration::from_secs(18));
    }

    #[test]
    fn builder() {
        let pin = PowerPin::new(17)
            .active_low(true)
            .pulse_up(Some(Duration::from_secs(1)));
        let config = SessionConfig::new("/dev/ttyUSB2")
            .baud(9600)
            .power_pin(Some(pin))
            .registration_wait(Duration::from_secs(30));

        assert_eq!(config.port(), "/dev/ttyUSB2");
        assert_eq!(config.baud, 9600);
        assert_eq!(config.power().map(|p| p.pin()), Some(17));
        assert!(pin.active_low);
        assert_eq!(pin.pulse_down, None);
    }
}
