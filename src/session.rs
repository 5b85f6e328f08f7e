/// Session loop for one serial connection to the rig
///
/// Decodes the byte stream into events, keeps the unit toggle and the
/// pins-not-located notification counter, and drives whatever implements
/// `ControlPanel`. One message is decoded per loop iteration and the loop
/// never blocks waiting for serial data.

use anyhow::Result;
use log::{error, info, warn};

use crate::connection::RigLink;
use crate::protocol::{parse_height, Command, Flag};
use crate::units::{derive_display, DerivedDisplay, UnitMode};

/// After this many pins-not-located events the encoder is considered stuck.
pub const PIN_NOTIFICATION_LIMIT: u32 = 100;

/// Operator-facing notices raised by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// First pins-not-located event: ask the operator to rotate the encoder.
    RotateEncoder,
    /// Pin search never converged; the session is about to end.
    PinConfigurationExhausted,
}

/// Why a session ended. The serial port closes on every one of these paths
/// when the `Session` is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PanelClosed,
    FirmwareError,
    PinConfigurationExhausted,
}

/// Contract the presentation layer implements for the loop.
///
/// `notify` returns false to request termination; no dialog widget or
/// blocking behavior is implied.
pub trait ControlPanel {
    /// Process pending UI work. False means the panel has been closed.
    fn poll_alive(&mut self) -> bool;
    /// Show a freshly derived height/energy pair.
    fn render(&mut self, display: &DerivedDisplay);
    /// Surface a notice to the operator.
    fn notify(&mut self, notice: Notice) -> bool;
}

pub struct Session<L: RigLink> {
    link: L,
    unit: UnitMode,
    notifications: u32,
}

impl<L: RigLink> Session<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            unit: UnitMode::default(),
            notifications: 0,
        }
    }

    pub fn unit_mode(&self) -> UnitMode {
        self.unit
    }

    /// Service at most one message from the rig.
    ///
    /// Returns `Ok(None)` when the session should keep running, including
    /// when no data was waiting. Decode-time problems that are survivable
    /// (unexpected flag, malformed height payload) are logged and skipped.
    pub fn step(&mut self, panel: &mut dyn ControlPanel) -> Result<Option<SessionEnd>> {
        if !self.link.bytes_available()? {
            return Ok(None);
        }

        let byte = self.link.read_byte()?;
        match Flag::from_byte(byte) {
            Flag::PinsNotLocated => {
                self.notifications += 1;
                if self.notifications == 1 {
                    if !panel.notify(Notice::RotateEncoder) {
                        return Ok(Some(SessionEnd::PanelClosed));
                    }
                } else if self.notifications > PIN_NOTIFICATION_LIMIT {
                    error!(
                        target: "session",
                        "Pin search exhausted after {} notifications",
                        self.notifications
                    );
                    let _ = panel.notify(Notice::PinConfigurationExhausted);
                    return Ok(Some(SessionEnd::PinConfigurationExhausted));
                }
            }
            Flag::Height => {
                let line = self.link.read_line()?;
                match parse_height(&line) {
                    Ok(height) => {
                        let display = derive_display(height, self.unit);
                        panel.render(&display);
                    }
                    // A garbage payload line is survivable; skip it rather
                    // than tearing the session down.
                    Err(e) => warn!(target: "session", "Skipping height message: {:#}", e),
                }
            }
            Flag::FirmwareError => {
                error!(
                    target: "session",
                    "An error occurred in the firmware on the microcontroller"
                );
                return Ok(Some(SessionEnd::FirmwareError));
            }
            Flag::Unexpected(b) => {
                warn!(
                    target: "session",
                    "Unexpected flag {:?} (0x{:02x}), ignoring",
                    b as char,
                    b
                );
            }
        }
        Ok(None)
    }

    /// Drive the loop until a terminal condition.
    ///
    /// Each iteration gives the panel a chance to run first; only while the
    /// panel is alive is the serial side polled.
    pub fn run(&mut self, panel: &mut dyn ControlPanel) -> Result<SessionEnd> {
        loop {
            if !panel.poll_alive() {
                info!(target: "session", "Panel closed, ending session");
                return Ok(SessionEnd::PanelClosed);
            }
            if let Some(end) = self.step(panel)? {
                return Ok(end);
            }
        }
    }

    /// Zero the rig's height measurement at the current position.
    pub fn set_floor(&mut self) -> Result<()> {
        self.link.send(Command::SetFloor)
    }

    /// Flip the display unit and tell the firmware about it.
    pub fn toggle_unit(&mut self) -> Result<UnitMode> {
        self.unit = self.unit.toggled();
        self.link.send(Command::ChangeUnit)?;
        Ok(self.unit)
    }

    /// Tell the firmware the host is going away. The port itself closes
    /// when the session is dropped.
    pub fn shutdown(&mut self) -> Result<()> {
        self.link.send(Command::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{CONVERSION, GRAVITY, MASS};
    use std::collections::VecDeque;

    struct FakeLink {
        incoming: VecDeque<u8>,
        sent: Vec<Command>,
    }

    impl FakeLink {
        fn new(script: &[u8]) -> Self {
            Self {
                incoming: script.iter().copied().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl RigLink for FakeLink {
        fn bytes_available(&mut self) -> Result<bool> {
            Ok(!self.incoming.is_empty())
        }

        fn read_byte(&mut self) -> Result<u8> {
            self.incoming
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }

        fn read_line(&mut self) -> Result<String> {
            let mut line = Vec::new();
            while let Some(b) = self.incoming.pop_front() {
                line.push(b);
                if b == b'\n' {
                    break;
                }
            }
            Ok(String::from_utf8(line)?)
        }

        fn send(&mut self, cmd: Command) -> Result<()> {
            self.sent.push(cmd);
            Ok(())
        }
    }

    struct RecordingPanel {
        renders: Vec<DerivedDisplay>,
        notices: Vec<Notice>,
        continue_after_notice: bool,
        polls_remaining: usize,
    }

    impl RecordingPanel {
        fn new() -> Self {
            Self {
                renders: Vec::new(),
                notices: Vec::new(),
                continue_after_notice: true,
                polls_remaining: 10_000,
            }
        }
    }

    impl ControlPanel for RecordingPanel {
        fn poll_alive(&mut self) -> bool {
            // Budget keeps a broken loop from hanging the test run.
            if self.polls_remaining == 0 {
                return false;
            }
            self.polls_remaining -= 1;
            true
        }

        fn render(&mut self, display: &DerivedDisplay) {
            self.renders.push(display.clone());
        }

        fn notify(&mut self, notice: Notice) -> bool {
            self.notices.push(notice);
            match notice {
                Notice::RotateEncoder => self.continue_after_notice,
                Notice::PinConfigurationExhausted => false,
            }
        }
    }

    #[test]
    fn first_pin_event_notifies_then_next_ninety_nine_are_silent() {
        let script: Vec<u8> = std::iter::repeat(b'l').take(100).chain([b'e']).collect();
        let mut session = Session::new(FakeLink::new(&script));
        let mut panel = RecordingPanel::new();

        let end = session.run(&mut panel).unwrap();
        assert_eq!(end, SessionEnd::FirmwareError);
        assert_eq!(panel.notices, vec![Notice::RotateEncoder]);
        assert!(panel.renders.is_empty());
    }

    #[test]
    fn hundred_and_first_pin_event_is_fatal() {
        let script: Vec<u8> = std::iter::repeat(b'l').take(101).collect();
        let mut session = Session::new(FakeLink::new(&script));
        let mut panel = RecordingPanel::new();

        let end = session.run(&mut panel).unwrap();
        assert_eq!(end, SessionEnd::PinConfigurationExhausted);
        assert_eq!(
            panel.notices,
            vec![Notice::RotateEncoder, Notice::PinConfigurationExhausted]
        );
    }

    #[test]
    fn pin_notice_refused_by_panel_ends_session() {
        let mut session = Session::new(FakeLink::new(b"l"));
        let mut panel = RecordingPanel::new();
        panel.continue_after_notice = false;

        let end = session.run(&mut panel).unwrap();
        assert_eq!(end, SessionEnd::PanelClosed);
    }

    #[test]
    fn height_then_firmware_error_end_to_end() {
        let mut session = Session::new(FakeLink::new(b"lh12.0\ne"));
        let mut panel = RecordingPanel::new();

        let end = session.run(&mut panel).unwrap();
        assert_eq!(end, SessionEnd::FirmwareError);
        assert_eq!(panel.notices, vec![Notice::RotateEncoder]);
        assert_eq!(panel.renders.len(), 1);
        assert_eq!(panel.renders[0].height_text, "Height: 1' 0.0\"");
        let expected_energy = (12.0 / CONVERSION) * GRAVITY * MASS;
        assert_eq!(
            panel.renders[0].energy_text,
            format!("Energy: {:.2} j", expected_energy)
        );
    }

    #[test]
    fn negative_height_renders_without_borrow() {
        let mut session = Session::new(FakeLink::new(b"h-6.0\ne"));
        let mut panel = RecordingPanel::new();

        session.run(&mut panel).unwrap();
        assert_eq!(panel.renders[0].height_text, "Height: 0' -6.0\"");
    }

    #[test]
    fn unrecognized_flag_is_ignored() {
        let mut session = Session::new(FakeLink::new(b"z"));
        let mut panel = RecordingPanel::new();

        assert_eq!(session.step(&mut panel).unwrap(), None);
        assert!(panel.renders.is_empty());
        assert!(panel.notices.is_empty());
        // Session is still open and idle.
        assert_eq!(session.step(&mut panel).unwrap(), None);
    }

    #[test]
    fn malformed_height_payload_is_skipped() {
        let mut session = Session::new(FakeLink::new(b"hnot-a-number\nh12.0\ne"));
        let mut panel = RecordingPanel::new();

        let end = session.run(&mut panel).unwrap();
        assert_eq!(end, SessionEnd::FirmwareError);
        assert_eq!(panel.renders.len(), 1);
        assert_eq!(panel.renders[0].height_text, "Height: 1' 0.0\"");
    }

    #[test]
    fn closed_panel_ends_session_before_reading() {
        let mut session = Session::new(FakeLink::new(b"h12.0\n"));
        let mut panel = RecordingPanel::new();
        panel.polls_remaining = 0;

        let end = session.run(&mut panel).unwrap();
        assert_eq!(end, SessionEnd::PanelClosed);
        assert!(panel.renders.is_empty());
    }

    #[test]
    fn commands_write_their_bytes() {
        let mut session = Session::new(FakeLink::new(b""));

        session.set_floor().unwrap();
        assert_eq!(session.toggle_unit().unwrap(), UnitMode::Imperial);
        assert_eq!(session.toggle_unit().unwrap(), UnitMode::Metric);
        session.shutdown().unwrap();

        assert_eq!(
            session.link.sent,
            vec![
                Command::SetFloor,
                Command::ChangeUnit,
                Command::ChangeUnit,
                Command::Shutdown
            ]
        );
    }

    #[test]
    fn toggled_unit_changes_next_render_only() {
        let mut session = Session::new(FakeLink::new(b"h39.370\n"));
        let mut panel = RecordingPanel::new();

        session.toggle_unit().unwrap();
        session.step(&mut panel).unwrap();
        assert_eq!(panel.renders[0].height_text, "Height: 1.000 m");
        // Energy text is unaffected by the mode.
        let expected_energy = (39.370 / CONVERSION) * GRAVITY * MASS;
        assert_eq!(
            panel.renders[0].energy_text,
            format!("Energy: {:.2} j", expected_energy)
        );
    }
}
