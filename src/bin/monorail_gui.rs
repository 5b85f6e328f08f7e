/// Control panel for the Impressio monorail impact tester
///
/// Opens the serial link to the rig microcontroller and runs the egui
/// panel. Port and baud come from impressio.yaml for this hostname, with
/// --port/--baud overriding.
///
/// Run with: cargo run --bin monorail_gui --release

use clap::Parser;
use eframe::egui;
use gethostname::gethostname;

use impressio::config_loader;
use impressio::connection::RigConnection;
use impressio::gui::control_panel::MonorailApp;
use impressio::session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port override, e.g. /dev/ttyUSB0
    #[arg(long)]
    port: Option<String>,
    /// Baud rate override
    #[arg(long)]
    baud: Option<u32>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let hostname = gethostname().to_string_lossy().to_string();
    let mut settings = match config_loader::load_rig_settings(&hostname) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(baud) = args.baud {
        settings.baud_rate = baud;
    }

    let connection = match RigConnection::open(&settings.port, settings.baud_rate) {
        Ok(connection) => connection,
        Err(e) => {
            eprintln!("Port inaccessible at this time: {:#}", e);
            std::process::exit(1);
        }
    };

    let app = MonorailApp::new(Session::new(connection));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Impressio Monorail")
            .with_inner_size([800.0, 400.0])
            .with_resizable(false),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "Impressio Monorail",
        options,
        Box::new(|_cc| Box::new(app)),
    ) {
        eprintln!("GUI error: {}", e);
    }
}
