/// Control panel window for the Impressio monorail rig
///
/// Layout mirrors the bench fixture's original panel: height and energy
/// readouts across the top, Set Floor spanning both columns, Exit and the
/// unit toggle along the bottom. One serial message is serviced per frame;
/// button commands run on the same thread, so a command and a read never
/// interleave.

use std::time::Duration;

use eframe::egui;
use log::error;

use crate::connection::RigConnection;
use crate::session::{ControlPanel, Notice, Session, SessionEnd};
use crate::units::DerivedDisplay;

/// Collects what one loop iteration pushed at the presentation layer.
#[derive(Default)]
struct PanelBridge {
    display: Option<DerivedDisplay>,
    notice: Option<Notice>,
}

impl ControlPanel for PanelBridge {
    fn poll_alive(&mut self) -> bool {
        // eframe stops calling update() once the window is closed, so a
        // bridge that is being polled is alive by construction.
        true
    }

    fn render(&mut self, display: &DerivedDisplay) {
        self.display = Some(display.clone());
    }

    fn notify(&mut self, notice: Notice) -> bool {
        self.notice = Some(notice);
        !matches!(notice, Notice::PinConfigurationExhausted)
    }
}

pub struct MonorailApp {
    session: Option<Session<RigConnection>>,
    height_text: String,
    energy_text: String,
    rotate_notice_open: bool,
    ended_reason: Option<String>,
}

impl MonorailApp {
    pub fn new(session: Session<RigConnection>) -> Self {
        Self {
            session: Some(session),
            height_text: "Height:".to_string(),
            energy_text: "Energy:".to_string(),
            rotate_notice_open: false,
            ended_reason: None,
        }
    }

    fn end_session(&mut self, reason: String) {
        // Dropping the session releases the serial port.
        self.session = None;
        self.ended_reason = Some(reason);
    }

    fn describe(end: SessionEnd) -> String {
        match end {
            SessionEnd::PanelClosed => "Panel closed".to_string(),
            SessionEnd::FirmwareError => {
                "An error occurred in the firmware on the microcontroller".to_string()
            }
            SessionEnd::PinConfigurationExhausted => {
                "Something is wrong with the pin configuration. \
                 Check the encoder connection and try again."
                    .to_string()
            }
        }
    }

    /// Give the session loop one iteration and fold the result into the
    /// widget state.
    fn service_session(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let mut bridge = PanelBridge::default();
        let outcome = session.step(&mut bridge);

        if let Some(display) = bridge.display {
            self.height_text = display.height_text;
            self.energy_text = display.energy_text;
        }
        if let Some(Notice::RotateEncoder) = bridge.notice {
            self.rotate_notice_open = true;
        }

        match outcome {
            Ok(None) => {}
            Ok(Some(end)) => self.end_session(Self::describe(end)),
            Err(e) => {
                error!(target: "gui", "Session error: {:#}", e);
                self.end_session(format!("Serial link failed: {:#}", e));
            }
        }
    }

    fn run_command<F>(&mut self, what: &str, command: F)
    where
        F: FnOnce(&mut Session<RigConnection>) -> anyhow::Result<()>,
    {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = command(session) {
            error!(target: "gui", "{} failed: {:#}", what, e);
            self.end_session(format!("{} failed: {:#}", what, e));
        }
    }
}

impl eframe::App for MonorailApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.service_session();

        let connected = self.session.is_some();
        let unit_label = self
            .session
            .as_ref()
            .map(|s| s.unit_mode().label())
            .unwrap_or("Metric");

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.add_enabled_ui(connected, |ui| {
                if ui
                    .add_sized([ui.available_width(), 32.0], egui::Button::new("Set Floor"))
                    .clicked()
                {
                    self.run_command("Set floor", |s| s.set_floor());
                }
            });
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.add_enabled_ui(connected, |ui| {
                    if ui.button("Exit").clicked() {
                        self.run_command("Shutdown", |s| s.shutdown());
                        self.session = None;
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.add_enabled_ui(connected, |ui| {
                        if ui.button(unit_label).clicked() {
                            self.run_command("Unit change", |s| s.toggle_unit().map(|_| ()));
                        }
                    });
                });
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |cols| {
                cols[0].centered_and_justified(|ui| {
                    ui.label(egui::RichText::new(&self.height_text).size(28.0).strong());
                });
                cols[1].centered_and_justified(|ui| {
                    ui.label(egui::RichText::new(&self.energy_text).size(28.0).strong());
                });
            });

            if let Some(reason) = &self.ended_reason {
                ui.separator();
                ui.colored_label(egui::Color32::LIGHT_RED, reason);
                ui.label("Restart the application to reconnect.");
            }
        });

        if self.rotate_notice_open {
            egui::Window::new("Loading...")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(
                        "Close this message and rotate the encoder \
                         until all pins have been found",
                    );
                    if ui.button("Close").clicked() {
                        self.rotate_notice_open = false;
                    }
                });
        }

        ctx.request_repaint_after(Duration::from_millis(16));
    }
}
