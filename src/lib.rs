/// Impressio Monorail host library
///
/// Serial protocol, session loop and conversion model for the twin-wire
/// impact testing rig's height measurement system.

pub mod config_loader;
pub mod connection;
pub mod gui;
pub mod protocol;
pub mod session;
pub mod units;
