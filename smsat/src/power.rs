use std::{thread, time::Duration};

use log::{debug, info};

use crate::{config::PowerPin, transport::Transport, Error};

/// Wait after a power down pulse before the modem may be touched again.
const SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Discrete output pin driver.
pub trait PowerController {
    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Error>;
}

impl<P: PowerController + ?Sized> PowerController for Box<P> {
    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        P::set_level(self, pin, level)
    }
}

impl<P: PowerController + ?Sized> PowerController for &mut P {
    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        P::set_level(self, pin, level)
    }
}

/// Controller for setups without a power pin.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopController;

impl PowerController for NoopController {
    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        debug!("No power controller, ignoring pin {} {:?}", pin, level);
        Ok(())
    }
}

#[cfg(feature = "gpio")]
pub use self::gpio::GpioController;

#[cfg(feature = "gpio")]
mod gpio {
    use std::{collections::HashMap, thread, time::Duration};

    use log::debug;
    use rppal::gpio::{Gpio, OutputPin};

    use super::{Level, PowerController};
    use crate::Error;

    /// Pins need a moment after being switched to output.
    const SETUP_DELAY: Duration = Duration::from_millis(100);

    /// Raspberry Pi GPIO, BCM numbering.
    pub struct GpioController {
        gpio: Gpio,
        pins: HashMap<u8, OutputPin>,
    }

    impl GpioController {
        pub fn new() -> Result<Self, Error> {
            let gpio = Gpio::new().map_err(|e| Error::Power(e.to_string()))?;
            Ok(Self {
                gpio,
                pins: HashMap::new(),
            })
        }

        fn output(&mut self, pin: u8) -> Result<&mut OutputPin, Error> {
            if !self.pins.contains_key(&pin) {
                debug!("Setup GPIO pin {}", pin);
                let mut output = self
                    .gpio
                    .get(pin)
                    .map_err(|e| Error::Power(e.to_string()))?
                    .into_output();
                // The sequencer drives the pin explicitly on every exit path
                output.set_reset_on_drop(false);
                thread::sleep(SETUP_DELAY);
                self.pins.insert(pin, output);
            }
            self.pins
                .get_mut(&pin)
                .ok_or_else(|| Error::Power(format!("GPIO pin {pin} unavailable")))
        }
    }

    impl PowerController for GpioController {
        fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Error> {
            let output = self.output(pin)?;
            match level {
                Level::High => output.set_high(),
                Level::Low => output.set_low(),
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Unpowered,
    Powered,
}

/// Drives the modem power pin through its power up and power down sequence.
pub struct PowerSequencer<P: PowerController> {
    controller: P,
    pin: Option<PowerPin>,
    active: Level,
    inactive: Level,
    settle: Duration,
    state: PowerState,
}

impl<P: PowerController> PowerSequencer<P> {
    /// Takes over `pin` and drives it to its inactive level.
    pub fn new(mut controller: P, pin: Option<PowerPin>) -> Result<Self, Error> {
        let (active, inactive) = match pin {
            Some(PowerPin {
                active_low: true, ..
            }) => (Level::Low, Level::High),
            _ => (Level::High, Level::Low),
        };

        if let Some(pin) = pin {
            controller.set_level(pin.pin, inactive)?;
        }

        Ok(Self {
            controller,
            pin,
            active,
            inactive,
            settle: SETTLE,
            state: PowerState::Unpowered,
        })
    }

    /// Override the wait after a power down pulse.
    #[must_use]
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub const fn state(&self) -> PowerState {
        self.state
    }

    pub fn controller(&self) -> &P {
        &self.controller
    }

    /// Switch the modem on, then discard whatever the link buffered while it
    /// was off. Does nothing without a power pin.
    pub fn power_up<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        let Some(pin) = self.pin else {
            debug!("Power pin not set, skipping modem power up");
            return Ok(());
        };

        match pin.pulse_up {
            Some(pulse) => {
                info!("Sending modem power up signal on GPIO pin {}", pin.pin);
                self.pulse(pin.pin, pulse)?;
            }
            None => {
                info!("Setting modem GPIO pin {} active", pin.pin);
                self.controller.set_level(pin.pin, self.active)?;
            }
        }
        self.state = PowerState::Powered;

        transport.clear_input().map_err(Error::transport)?;
        transport.clear_output().map_err(Error::transport)
    }

    /// Switch the modem off again. Does nothing unless a power up happened
    /// before, so it is safe to call on every exit path.
    pub fn power_down(&mut self) -> Result<(), Error> {
        if self.state != PowerState::Powered {
            debug!("No modem power control, skipping power down");
            return Ok(());
        }
        self.state = PowerState::Unpowered;

        let Some(pin) = self.pin else {
            return Ok(());
        };

        match pin.pulse_down {
            Some(pulse) => {
                info!("Sending modem power down signal on GPIO pin {}", pin.pin);
                self.pulse(pin.pin, pulse)?;
                thread::sleep(self.settle);
            }
            None => {
                info!("Setting modem GPIO pin {} inactive", pin.pin);
                self.controller.set_level(pin.pin, self.inactive)?;
            }
        }
        Ok(())
    }

    fn pulse(&mut self, pin: u8, hold: Duration) -> Result<(), Error> {
        self.controller.set_level(pin, self.active)?;
        thread::sleep(hold);
        self.controller.set_level(pin, self.inactive)
    }
}
