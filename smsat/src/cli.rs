use std::time::Duration;

use chrono::TimeDelta;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use smsat::{DeletePolicy, Framing, PowerPin, ReceiveOptions, SessionConfig};

/// Send and receive SMS messages.
#[derive(Debug, Parser)]
#[command(name = "smsat", version, disable_version_flag = true)]
pub struct Cli {
    /// Serial device path
    #[arg(short, long, env = "SMSAT_PORT", default_value = "/dev/ttyS0")]
    pub port: String,

    /// Serial baud rate
    #[arg(short, long, env = "SMSAT_BAUD", default_value_t = 115_200)]
    pub baud: u32,

    /// Serial mode
    #[arg(short, long, env = "SMSAT_MODE", default_value = "8N1")]
    pub mode: Framing,

    /// Modem GPIO power pin (BCM numbering, 0 for none)
    #[arg(short = 'g', long, env = "SMSAT_PWRPIN")]
    pub pwrpin: Option<u8>,

    /// Power up GPIO pulse (seconds, 0 holds the pin active instead)
    #[arg(short = 'u', long, env = "SMSAT_PWRUP", default_value_t = 0)]
    pub pwrup: u64,

    /// Power down GPIO pulse (seconds, 0 releases the pin instead)
    #[arg(short = 'd', long, env = "SMSAT_PWRDOWN", default_value_t = 0)]
    pub pwrdown: u64,

    /// Time to wait for network connection (seconds)
    #[arg(short, long, env = "SMSAT_WAIT", default_value_t = 18)]
    pub wait: u64,

    /// GPIO power pin active low
    #[arg(short = 'l', long, env = "SMSAT_PWRLOW")]
    pub pwrlow: bool,

    /// Set log level
    #[arg(long, env = "SMSAT_LOG", default_value = "warn", value_parser = parse_level)]
    pub log: LevelFilter,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: (),

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send SMS message. The message text is read from stdin.
    Send {
        /// Recipient phone number
        number: String,
    },
    /// Check for received SMS messages.
    Recv {
        /// Maximum age of stored message fragments (hours)
        #[arg(short = 'a', long, default_value_t = 1)]
        maxage: u32,

        /// Do not delete listed messages from SIM memory
        #[arg(short, long, conflicts_with = "deleteall")]
        preserve: bool,

        /// Delete all received messages from SIM memory
        #[arg(short = 'D', long)]
        deleteall: bool,
    },
    /// Listen for new SMS notifications.
    Monitor {
        /// Run shell command for each notification
        #[arg(short, long)]
        command: Option<String>,
    },
    /// Clear all messages from SIM.
    Clear,
    /// Query modem information.
    Info,
    /// Send AT command.
    At {
        /// Raw AT command
        command: String,

        /// Expected success response
        #[arg(default_value = "OK")]
        back: String,

        /// Maximum time to wait for response (seconds)
        #[arg(default_value_t = 2)]
        timeout: u64,
    },
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        let power = self.pwrpin.filter(|&pin| pin != 0).map(|pin| {
            PowerPin::new(pin)
                .active_low(self.pwrlow)
                .pulse_up(seconds(self.pwrup))
                .pulse_down(seconds(self.pwrdown))
        });

        SessionConfig::new(self.port.as_str())
            .baud(self.baud)
            .framing(self.mode)
            .power_pin(power)
            .registration_wait(Duration::from_secs(self.wait))
    }
}

impl Command {
    /// Receive options, `None` for other commands.
    pub fn receive_options(&self) -> Option<ReceiveOptions> {
        let Self::Recv {
            maxage,
            preserve,
            deleteall,
        } = *self
        else {
            return None;
        };

        let delete = if deleteall {
            DeletePolicy::DeleteAll
        } else if preserve {
            DeletePolicy::Preserve
        } else {
            DeletePolicy::DeleteListed
        };

        Some(ReceiveOptions {
            max_age: TimeDelta::hours(i64::from(maxage)),
            delete,
        })
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Level names are case insensitive, `warning` and `critical` are accepted too.
fn parse_level(s: &str) -> Result<LevelFilter, String> {
    match s.to_ascii_lowercase().as_str() {
        "warning" => Ok(LevelFilter::Warn),
        "critical" => Ok(LevelFilter::Error),
        other => other
            .parse()
            .map_err(|_| format!("unknown log level {s:?}")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("smsat").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&["info"]).unwrap();
        assert_eq!(cli.log, LevelFilter::Warn);
        assert!(matches!(cli.command, Command::Info));
        assert_eq!(cli.session_config(), SessionConfig::default());
    }

    #[test]
    fn power_pin() {
        let cli = parse(&["-g", "17", "-u", "2", "-l", "clear"]).unwrap();
        let pin = cli.session_config().power().unwrap();
        assert_eq!(pin.pin(), 17);
        assert_eq!(
            pin,
            PowerPin::new(17)
                .active_low(true)
                .pulse_up(Some(Duration::from_secs(2)))
        );

        let cli = parse(&["-g", "0", "clear"]).unwrap();
        assert_eq!(cli.session_config().power(), None);
    }

    #[test]
    fn serial_options() {
        let cli = parse(&[
            "-p", "/dev/ttyAMA0", "-b", "9600", "-m", "7E1", "-w", "30", "-d", "3", "info",
        ])
        .unwrap();
        let expected = SessionConfig::new("/dev/ttyAMA0")
            .baud(9600)
            .framing("7E1".parse().unwrap())
            .registration_wait(Duration::from_secs(30));
        assert_eq!(cli.session_config(), expected);
        assert_eq!(cli.pwrdown, 3);

        assert!(parse(&["-m", "8Q1", "info"]).is_err());
    }

    #[test]
    fn log_levels() {
        assert_eq!(parse(&["--log", "WARNING", "info"]).unwrap().log, LevelFilter::Warn);
        assert_eq!(parse(&["--log", "debug", "info"]).unwrap().log, LevelFilter::Debug);
        assert!(parse(&["--log", "loud", "info"]).is_err());
    }

    #[test]
    fn recv_policies() {
        let options = parse(&["recv"]).unwrap().command.receive_options().unwrap();
        assert_eq!(options, ReceiveOptions::default());

        let options = parse(&["recv", "-a", "24", "-p"])
            .unwrap()
            .command
            .receive_options()
            .unwrap();
        assert_eq!(options.max_age, TimeDelta::hours(24));
        assert_eq!(options.delete, DeletePolicy::Preserve);

        let options = parse(&["recv", "-D"]).unwrap().command.receive_options().unwrap();
        assert_eq!(options.delete, DeletePolicy::DeleteAll);

        let err = parse(&["recv", "-p", "-D"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn at_defaults() {
        match parse(&["at", "AT+CSQ"]).unwrap().command {
            Command::At {
                command,
                back,
                timeout,
            } => {
                assert_eq!(command, "AT+CSQ");
                assert_eq!(back, "OK");
                assert_eq!(timeout, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn version_flag() {
        let err = parse(&["-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        let err = parse(&["--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn command_required() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["send"]).is_err());
    }

    #[test]
    fn verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
