mod cli;

use std::{
    io::{self, IsTerminal, Read, Write},
    process::ExitCode,
    time::Duration,
};

use clap::Parser;
use log::{error, info};
use smsat::{
    Cancel, Client, Error, NoopController, NotificationHook, PowerController, PowerSequencer,
    SerialTransport, Session, SessionConfig,
};

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log)
        .parse_default_env()
        .init();

    // Read before the signal handler goes in, so Ctrl-C still aborts typing
    let message = match matches!(cli.command, Command::Send { .. })
        .then(read_message)
        .transpose()
    {
        Ok(message) => message,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = Cancel::new();
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.cancel()) {
        eprintln!("Error setting signal handler: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli, message.as_deref(), cancel) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(Error::Cancelled) => {
            info!("Received interrupt. Exiting...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, message: Option<&str>, cancel: Cancel) -> Result<bool, Error> {
    let config = cli.session_config();
    let transport = SerialTransport::open(&config)?;
    let sequencer = PowerSequencer::new(power_controller(&config)?, config.power())?;
    let mut session = Session::new(&config, Client::new(transport, cancel), sequencer);

    match &cli.command {
        Command::Send { number } => {
            eprintln!("Sending SMS message to {number}");
            let text = message.unwrap_or_default();
            let result = session.send(number, text, |sent, total| {
                if total > 1 {
                    eprintln!("Sent part {sent}/{total}");
                }
            });
            match result {
                Ok(()) => {
                    eprintln!("Message sent successfully");
                    Ok(true)
                }
                Err(e @ Error::Send { .. }) => {
                    eprintln!("Error sending message!");
                    Err(e)
                }
                Err(e) => Err(e),
            }
        }
        Command::Recv { .. } => {
            eprintln!("Checking for received messages");
            let options = cli.command.receive_options().unwrap_or_default();
            let result = session.receive(options, |records| {
                let mut stdout = io::stdout().lock();
                serde_json::to_writer_pretty(&mut stdout, records)?;
                writeln!(stdout)?;
                Ok(())
            });
            if let Err(Error::Protocol { .. }) = result {
                eprintln!("Error checking messages!");
            }
            result.map(|_| true)
        }
        Command::Monitor { command } => {
            println!("Listening for +CMTI messages on {}", config.port());
            let hook = command.as_deref().map(NotificationHook::new);
            let never = session.monitor(&mut io::stdout(), || {
                if let Some(hook) = &hook {
                    hook.run();
                }
            })?;
            match never {}
        }
        Command::Clear => {
            eprintln!("Clearing all SMS messages from modem storage");
            session.clear()?;
            Ok(true)
        }
        Command::Info => {
            println!("Querying modem information...");
            for (_, result) in session.info()? {
                println!("{}", result.raw_response);
            }
            Ok(true)
        }
        Command::At {
            command,
            back,
            timeout,
        } => {
            println!("{command}");
            let result = session.raw(command, back, Duration::from_secs(*timeout))?;
            println!("{}", result.raw_response);
            Ok(result.success)
        }
    }
}

fn read_message() -> Result<String, Error> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        println!("Enter message, press Ctrl-D on blank line to send");
    }

    let mut message = String::new();
    stdin.read_to_string(&mut message)?;
    let message = message.trim();
    if message.is_empty() {
        return Err(Error::EmptyMessage);
    }
    Ok(message.to_string())
}

#[cfg(feature = "gpio")]
fn power_controller(config: &SessionConfig) -> Result<Box<dyn PowerController>, Error> {
    let controller: Box<dyn PowerController> = match config.power() {
        Some(_) => Box::new(smsat::GpioController::new()?),
        None => Box::new(NoopController),
    };
    Ok(controller)
}

#[cfg(not(feature = "gpio"))]
fn power_controller(config: &SessionConfig) -> Result<Box<dyn PowerController>, Error> {
    match config.power() {
        Some(pin) => Err(Error::Config(format!(
            "power pin {} needs the gpio feature",
            pin.pin()
        ))),
        None => Ok(Box::new(NoopController)),
    }
}
