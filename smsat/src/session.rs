use std::{collections::HashSet, convert::Infallible, io, time::Duration};

use chrono::{TimeDelta, Utc};
use log::{debug, error, info, warn};

use crate::{
    client::{AtResult, Client},
    commands::{
        DeleteFlag, DeleteMessage, DeleteMessages, ListStatus, SelectSimStorage, SetPduMode,
    },
    messages::{self, MessageRecord, StorageIndex},
    monitor,
    power::{PowerController, PowerSequencer},
    reassembly::Reassembler,
    registration::RegistrationMonitor,
    sender::Sender,
    transport::Transport,
    Error, SessionConfig,
};

/// Commands reported by [`Session::info`], in order.
pub const INFO_COMMANDS: [&str; 6] = [
    "ATI", "AT+CPIN?", "AT+CIMI", "AT+CSQ", "AT+CREG?", "AT+COPS?",
];
const INFO_TIMEOUT: Duration = Duration::from_secs(1);

/// What happens to stored messages once they were delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Leave storage untouched
    Preserve,
    /// Delete what was delivered plus read messages past the maximum age
    #[default]
    DeleteListed,
    /// Delete every read message
    DeleteAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Read messages older than this are released from storage
    pub max_age: TimeDelta,
    pub delete: DeletePolicy,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_age: TimeDelta::hours(1),
            delete: DeletePolicy::default(),
        }
    }
}

/// One modem session. Owns the link and the power pin for its whole
/// lifetime; the modem is powered down again when the session is dropped,
/// whichever way the operation ended.
pub struct Session<'a, T: Transport, P: PowerController> {
    config: &'a SessionConfig,
    client: Client<T>,
    sequencer: PowerSequencer<P>,
    registration: RegistrationMonitor,
    sender: Sender,
}

impl<'a, T: Transport, P: PowerController> Session<'a, T, P> {
    pub fn new(
        config: &'a SessionConfig,
        client: Client<T>,
        sequencer: PowerSequencer<P>,
    ) -> Self {
        Self {
            config,
            client,
            sequencer,
            registration: RegistrationMonitor::default(),
            sender: Sender::default(),
        }
    }

    #[must_use]
    pub fn with_registration(mut self, registration: RegistrationMonitor) -> Self {
        self.registration = registration;
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = sender;
        self
    }

    pub fn client_mut(&mut self) -> &mut Client<T> {
        &mut self.client
    }

    pub fn sequencer(&self) -> &PowerSequencer<P> {
        &self.sequencer
    }

    /// Send `text` to `recipient`, reporting every acknowledged part to
    /// `progress`. The text is encoded before the modem is touched.
    pub fn send(
        &mut self,
        recipient: &str,
        text: &str,
        progress: impl FnMut(usize, usize),
    ) -> Result<(), Error> {
        let pdus = Sender::encode(recipient, text)?;
        info!("Sending SMS message to {}", recipient);

        self.power_up()?;
        self.registration
            .wait_for_registration(&mut self.client, self.config.registration_wait)?;
        tolerate(self.client.send(&SetPduMode))?;

        self.sender.transmit(&mut self.client, &pdus, progress)
    }

    /// Collect new messages, reassembling concatenated ones, and hand them
    /// to `deliver`. Storage is cleaned up per `options.delete` only after
    /// `deliver` succeeded.
    pub fn receive(
        &mut self,
        options: ReceiveOptions,
        deliver: impl FnOnce(&[MessageRecord]) -> Result<(), Error>,
    ) -> Result<Vec<MessageRecord>, Error> {
        info!("Checking for received messages");
        self.power_up()?;
        tolerate(self.client.send(&SetPduMode))?;
        tolerate(self.client.send(&SelectSimStorage))?;

        let mut reassembler = Reassembler::new();
        let mut deletable = Vec::new();

        match messages::list(&mut self.client, ListStatus::Read) {
            Ok(read) => {
                // A cutoff before the earliest representable date spares everything
                let cutoff = Utc::now().checked_sub_signed(options.max_age);
                for record in read {
                    if cutoff.is_some_and(|cutoff| record.timestamp < cutoff) {
                        debug!("Message in slot {} is past the maximum age", record.slot);
                        deletable.push(record.slot);
                    }
                    if record.fragment.is_some() {
                        reassembler.ingest(record);
                    }
                }
            }
            Err(Error::Protocol { .. }) => warn!("Could not list read messages"),
            Err(e) => return Err(e),
        }

        let mut output = Vec::new();
        for record in messages::list(&mut self.client, ListStatus::Unread)? {
            if let Some(plain) = reassembler.ingest(record) {
                deletable.push(plain.slot);
                output.push(plain);
            }
        }

        let (joined, fragment_slots) = reassembler.drain_complete();
        if reassembler.pending() > 0 {
            debug!("{} concatenated messages still incomplete", reassembler.pending());
        }
        output.extend(joined);
        deletable.extend(fragment_slots);

        deliver(&output)?;

        match options.delete {
            DeletePolicy::Preserve => {}
            DeletePolicy::DeleteAll => {
                tolerate(self.client.send(&DeleteMessages {
                    flag: DeleteFlag::Read,
                }))?;
            }
            DeletePolicy::DeleteListed => {
                let mut seen = HashSet::new();
                deletable.retain(|slot| seen.insert(*slot));
                self.delete(&deletable)?;
            }
        }

        Ok(output)
    }

    /// Delete every stored message.
    pub fn clear(&mut self) -> Result<(), Error> {
        info!("Clearing all SMS messages from modem storage");
        self.power_up()?;
        self.client.send(&DeleteMessages {
            flag: DeleteFlag::All,
        })
    }

    /// Query identification, SIM and network state.
    pub fn info(&mut self) -> Result<Vec<(&'static str, AtResult)>, Error> {
        self.power_up()?;
        INFO_COMMANDS
            .iter()
            .map(|&command| {
                let result = self.client.execute(command, "OK", INFO_TIMEOUT)?;
                Ok((command, result))
            })
            .collect()
    }

    /// Run a single free-form command.
    pub fn raw(
        &mut self,
        command: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<AtResult, Error> {
        info!("Sending specified AT command");
        self.power_up()?;
        self.client.execute(command, expected, timeout)
    }

    /// Report new message notifications on `out` until cancelled.
    pub fn monitor(
        &mut self,
        out: &mut impl io::Write,
        on_notification: impl FnMut(),
    ) -> Result<Infallible, Error> {
        info!("Listening for +CMTI messages on {}", self.config.port());
        self.power_up()?;
        monitor::run(&mut self.client, out, on_notification)
    }

    fn power_up(&mut self) -> Result<(), Error> {
        self.sequencer.power_up(self.client.transport_mut())
    }

    fn delete(&mut self, slots: &[StorageIndex]) -> Result<(), Error> {
        for &slot in slots {
            tolerate(self.client.send(&DeleteMessage { slot }))?;
        }
        Ok(())
    }
}

impl<T: Transport, P: PowerController> Drop for Session<'_, T, P> {
    fn drop(&mut self) {
        info!("Closing serial port and cleaning up");
        if let Err(e) = self.sequencer.power_down() {
            error!("Modem power down failed: {}", e);
        }
    }
}

/// A command the modem did not acknowledge is already logged by the client
/// and does not stop the operation.
fn tolerate(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Err(Error::Protocol { .. }) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cancel::Cancel,
        config::PowerPin,
        mock::{setup_log, ScriptedTransport},
        power::{test::RecordingController, Level, PowerState},
    };
    use chrono::DateTime;
    use sms_pdu::{Alphabet, Deliver, FragmentInfo};

    const OK: &str = "\r\nOK\r\n";
    const HELLOHELLO: &str =
        "07917283010010F5040BC87238880900F10000993092516195800AE8329BFD4697D9EC37";

    fn config() -> SessionConfig {
        SessionConfig::new("/dev/null")
            .power_pin(Some(PowerPin::new(4)))
            .registration_wait(Duration::from_millis(100))
    }

    fn session<'a>(
        config: &'a SessionConfig,
        mock: &'a mut ScriptedTransport,
        controller: &'a mut RecordingController,
    ) -> Session<'a, &'a mut ScriptedTransport, &'a mut RecordingController> {
        setup_log();
        let sequencer = PowerSequencer::new(controller, config.power())
            .unwrap()
            .settle(Duration::ZERO);
        Session::new(config, Client::new(mock, Cancel::new()), sequencer)
            .with_registration(
                RegistrationMonitor::default()
                    .interval(Duration::from_millis(5))
                    .attempt_timeout(Duration::from_millis(20)),
            )
            .with_sender(
                Sender::default()
                    .prompt_timeout(Duration::from_millis(50))
                    .ack_timeout(Duration::from_millis(50)),
            )
    }

    fn deliver_pdu(date: &str, text: &str, fragment: Option<FragmentInfo>) -> String {
        Deliver {
            smsc: None,
            sender: "+15550100".to_string(),
            timestamp: DateTime::parse_from_rfc3339(date).unwrap(),
            text: text.to_string(),
            alphabet: Alphabet::Gsm7,
            fragment,
        }
        .to_hex()
        .unwrap()
    }

    fn listing(entries: &[(StorageIndex, &str)]) -> String {
        let mut out = String::from("\r\n");
        for (slot, pdu) in entries {
            out.push_str(&format!("+CMGL: {slot},1,,{}\r\n{pdu}\r\n", pdu.len() / 2));
        }
        out.push_str(OK);
        out
    }

    fn fragment(reference: u16, sequence: u8, count: u8) -> Option<FragmentInfo> {
        Some(FragmentInfo {
            reference,
            sequence,
            count,
        })
    }

    #[test]
    fn send_when_registered() {
        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply("\r\n+CREG: 0,1\r\n\r\nOK\r\n")
            .reply(OK)
            .reply("\r\n> ")
            .reply("\r\n+CMGS: 3\r\n\r\nOK\r\n");
        let mut controller = RecordingController::default();

        {
            let mut session = session(&config, &mut mock, &mut controller);
            let mut progress = Vec::new();
            session
                .send("+46708251358", "hellohello", |sent, total| progress.push((sent, total)))
                .unwrap();
            assert_eq!(progress, vec![(1, 1)]);
            assert_eq!(session.sequencer().state(), PowerState::Powered);
        }

        assert_eq!(
            mock.commands(),
            vec![
                "AT+CREG?",
                "AT+CMGF=0",
                "AT+CMGS=22",
                "0001000B916407281553F800000AE8329BFD4697D9EC37"
            ]
        );
        assert_eq!(
            controller.levels,
            vec![(4, Level::Low), (4, Level::High), (4, Level::Low)]
        );
    }

    #[test]
    fn send_without_network() {
        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply("\r\n+CREG: 0,2\r\n\r\nOK\r\n")
            .reply("\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        let mut controller = RecordingController::default();

        {
            let mut session = session(&config, &mut mock, &mut controller);
            assert!(matches!(
                session.send("+46708251358", "hi", |_, _| {}),
                Err(Error::NetworkUnavailable(_))
            ));
        }

        assert!(mock.commands().iter().all(|c| c == "AT+CREG?"));
        // Powered down on the error path too
        assert_eq!(controller.levels.last(), Some(&(4, Level::Low)));
        assert_eq!(controller.levels.len(), 3);
    }

    #[test]
    fn send_rejects_bad_recipient_before_power_up() {
        let config = config();
        let mut mock = ScriptedTransport::new();
        let mut controller = RecordingController::default();

        {
            let mut session = session(&config, &mut mock, &mut controller);
            assert!(matches!(
                session.send("call me", "hi", |_, _| {}),
                Err(Error::Encoding(_))
            ));
        }

        assert!(mock.written.is_empty());
        assert_eq!(controller.levels, vec![(4, Level::Low)]);
    }

    #[test]
    fn receive_deletes_listed() {
        let old = deliver_pdu("2001-01-01T00:00:00+00:00", "old", None);
        let stale_part = deliver_pdu("2001-01-01T00:00:00+00:00", "f1", fragment(7, 1, 2));
        let new_part = deliver_pdu("2099-01-01T00:00:00+00:00", "f2", fragment(7, 2, 2));

        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply(OK)
            .reply(OK)
            .reply(&listing(&[(1, &old), (2, &stale_part), (3, HELLOHELLO)]))
            .reply(&listing(&[(4, HELLOHELLO), (5, &new_part)]))
            .reply(OK)
            .reply(OK)
            .reply(OK)
            .reply(OK);
        let mut controller = RecordingController::default();

        let mut delivered = 0;
        let records = {
            let mut session = session(&config, &mut mock, &mut controller);
            session
                .receive(ReceiveOptions::default(), |records| {
                    delivered = records.len();
                    Ok(())
                })
                .unwrap()
        };

        assert_eq!(delivered, 2);
        assert_eq!(records[0].slot, 4);
        assert_eq!(records[0].text, "hellohello");
        assert_eq!(records[1].text, "f1f2");
        assert_eq!(records[1].slot, 5);

        assert_eq!(
            mock.commands(),
            vec![
                "AT+CMGF=0",
                "AT+CPMS=\"SM\",\"SM\",\"SM\"",
                "AT+CMGL=1",
                "AT+CMGL=0",
                "AT+CMGD=1",
                "AT+CMGD=2",
                "AT+CMGD=4",
                "AT+CMGD=5",
            ]
        );
    }

    #[test]
    fn receive_keeps_incomplete_sets() {
        let part = deliver_pdu("2099-01-01T00:00:00+00:00", "f1", fragment(9, 1, 3));

        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply(OK)
            .reply(OK)
            .reply(&listing(&[]))
            .reply(&listing(&[(6, &part)]));
        let mut controller = RecordingController::default();

        let records = {
            let mut session = session(&config, &mut mock, &mut controller);
            session.receive(ReceiveOptions::default(), |_| Ok(())).unwrap()
        };

        assert!(records.is_empty());
        assert_eq!(mock.commands().len(), 4);
    }

    #[test]
    fn receive_delete_all_and_preserve() {
        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply(OK)
            .reply(OK)
            .reply(&listing(&[]))
            .reply(&listing(&[(2, HELLOHELLO)]))
            .reply(OK);
        let mut controller = RecordingController::default();
        {
            let mut session = session(&config, &mut mock, &mut controller);
            let options = ReceiveOptions {
                delete: DeletePolicy::DeleteAll,
                ..ReceiveOptions::default()
            };
            session.receive(options, |_| Ok(())).unwrap();
        }
        assert_eq!(mock.commands().last().map(String::as_str), Some("AT+CMGD=1,1"));

        let mut mock = ScriptedTransport::new()
            .reply(OK)
            .reply(OK)
            .reply(&listing(&[]))
            .reply(&listing(&[(2, HELLOHELLO)]));
        let mut controller = RecordingController::default();
        {
            let mut session = session(&config, &mut mock, &mut controller);
            let options = ReceiveOptions {
                delete: DeletePolicy::Preserve,
                ..ReceiveOptions::default()
            };
            assert_eq!(session.receive(options, |_| Ok(())).unwrap().len(), 1);
        }
        assert_eq!(mock.commands().last().map(String::as_str), Some("AT+CMGL=0"));
    }

    #[test]
    fn receive_deletes_nothing_when_delivery_fails() {
        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply(OK)
            .reply(OK)
            .reply(&listing(&[]))
            .reply(&listing(&[(2, HELLOHELLO)]));
        let mut controller = RecordingController::default();
        {
            let mut session = session(&config, &mut mock, &mut controller);
            let result = session.receive(ReceiveOptions::default(), |_| {
                Err(Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)))
            });
            assert!(matches!(result, Err(Error::Io(_))));
        }
        assert!(!mock.commands().iter().any(|c| c.starts_with("AT+CMGD")));
    }

    #[test]
    fn clear_deletes_everything() {
        let config = config();
        let mut mock = ScriptedTransport::new().reply(OK);
        let mut controller = RecordingController::default();
        {
            let mut session = session(&config, &mut mock, &mut controller);
            session.clear().unwrap();
        }
        assert_eq!(mock.commands(), vec!["AT+CMGD=1,4"]);
    }

    #[test]
    fn info_and_raw() {
        let config = SessionConfig::default();
        let mut mock = ScriptedTransport::new()
            .reply("\r\nSIM800 R14.18\r\n\r\nOK\r\n")
            .reply("\r\n+CPIN: READY\r\n\r\nOK\r\n")
            .reply("\r\n240011234567890\r\n\r\nOK\r\n")
            .reply("\r\n+CSQ: 17,0\r\n\r\nOK\r\n")
            .reply("\r\n+CREG: 0,1\r\n\r\nOK\r\n")
            .reply("\r\n+COPS: 0,0,\"Telia\"\r\n\r\nOK\r\n")
            .reply("\r\n+CCLK: \"24/01/01,10:00:00+04\"\r\n\r\nOK\r\n");
        let mut controller = RecordingController::default();
        {
            let mut session = session(&config, &mut mock, &mut controller);
            let info = session.info().unwrap();
            let commands: Vec<&str> = info.iter().map(|(c, _)| *c).collect();
            assert_eq!(commands, INFO_COMMANDS);
            assert!(info.iter().all(|(_, r)| r.success));
            assert!(info[3].1.raw_response.contains("+CSQ: 17,0"));

            let result = session
                .raw("AT+CCLK?", "OK", Duration::from_millis(50))
                .unwrap();
            assert!(result.success);
            assert!(result.raw_response.contains("+CCLK"));
        }
        // No power pin configured
        assert!(controller.levels.is_empty());
    }

    #[test]
    fn monitor_stops_on_cancel() {
        // Without a power pin, so power up keeps the buffered notification
        let config = SessionConfig::default();
        let cancel = Cancel::new();
        let mut mock = ScriptedTransport::new()
            .unsolicited("+CMTI: \"SM\",1\r\n")
            .cancel_when_drained(&cancel);
        let mut controller = RecordingController::default();
        let mut calls = 0;
        {
            let sequencer = PowerSequencer::new(&mut controller, config.power())
                .unwrap()
                .settle(Duration::ZERO);
            let mut session = Session::new(&config, Client::new(&mut mock, cancel), sequencer);
            let result = session.monitor(&mut io::sink(), || calls += 1);
            assert!(matches!(result, Err(Error::Cancelled)));
        }
        assert_eq!(calls, 1);
        assert_eq!(mock.input_clears, 0);
    }

    #[test]
    fn receive_with_unbounded_age_keeps_read_messages() {
        let old = deliver_pdu("2001-01-01T00:00:00+00:00", "old", None);

        let config = config();
        let mut mock = ScriptedTransport::new()
            .reply(OK)
            .reply(OK)
            .reply(&listing(&[(1, &old)]))
            .reply(&listing(&[]));
        let mut controller = RecordingController::default();

        let records = {
            let mut session = session(&config, &mut mock, &mut controller);
            let options = ReceiveOptions {
                max_age: TimeDelta::hours(u32::MAX.into()),
                ..ReceiveOptions::default()
            };
            session.receive(options, |_| Ok(())).unwrap()
        };

        assert!(records.is_empty());
        assert!(!mock.commands().iter().any(|c| c.starts_with("AT+CMGD")));
    }

    #[test]
    fn cancelled_monitor_powers_down() {
        let config = config();
        let cancel = Cancel::new();
        let mut mock = ScriptedTransport::new().cancel_when_drained(&cancel);
        let mut controller = RecordingController::default();
        {
            setup_log();
            let sequencer = PowerSequencer::new(&mut controller, config.power())
                .unwrap()
                .settle(Duration::ZERO);
            let mut session = Session::new(&config, Client::new(&mut mock, cancel), sequencer);
            let result = session.monitor(&mut io::sink(), || {});
            assert!(matches!(result, Err(Error::Cancelled)));
            assert_eq!(session.sequencer().state(), PowerState::Powered);
        }
        assert_eq!(
            controller.levels,
            vec![(4, Level::Low), (4, Level::High), (4, Level::Low)]
        );
        assert_eq!(controller.levels.last(), Some(&(4, Level::Low)));
    }
}
