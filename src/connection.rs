/// Serial connection to the rig microcontroller
///
/// Owns the one `serialport` handle for the lifetime of a session. The
/// session loop talks to it through the `RigLink` trait so tests can swap
/// in an in-memory transport.

use std::io::Read;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::protocol::Command;

/// How long to wait for the rest of a height line once its flag arrived.
const LINE_DEADLINE: Duration = Duration::from_secs(2);

/// Transport seam between the session loop and the serial port.
pub trait RigLink {
    /// Non-blocking: is at least one unread byte waiting?
    fn bytes_available(&mut self) -> Result<bool>;
    /// Read exactly one byte. Only called after `bytes_available`.
    fn read_byte(&mut self) -> Result<u8>;
    /// Read up to and including the next newline.
    fn read_line(&mut self) -> Result<String>;
    /// Write one command byte and flush it.
    fn send(&mut self, cmd: Command) -> Result<()>;
}

pub struct RigConnection {
    port: Box<dyn SerialPort>,
    port_path: String,
}

impl RigConnection {
    /// Open the configured port. Fails loudly; the caller reports and exits
    /// before any session starts.
    pub fn open(port_path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_path, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(500))
            .open()
            .with_context(|| format!("Failed to open {} at {} baud", port_path, baud_rate))?;

        debug!(target: "connection", "Opened {} at {} baud", port_path, baud_rate);
        Ok(Self {
            port,
            port_path: port_path.to_string(),
        })
    }
}

impl RigLink for RigConnection {
    fn bytes_available(&mut self) -> Result<bool> {
        let waiting = self
            .port
            .bytes_to_read()
            .context("Failed to query serial receive buffer")?;
        Ok(waiting > 0)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.port
            .read_exact(&mut buf)
            .context("Failed to read flag byte")?;
        Ok(buf[0])
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let start = Instant::now();
        loop {
            let mut buf = [0u8; 1];
            match self.port.read(&mut buf) {
                Ok(1) => {
                    line.push(buf[0]);
                    if buf[0] == b'\n' {
                        break;
                    }
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e).context("Failed to read height payload"),
            }
            if start.elapsed() > LINE_DEADLINE {
                return Err(anyhow!(
                    "Timed out waiting for end of height payload ({} bytes so far)",
                    line.len()
                ));
            }
        }
        String::from_utf8(line).context("Height payload is not valid UTF-8")
    }

    fn send(&mut self, cmd: Command) -> Result<()> {
        self.port
            .write_all(&[cmd.byte()])
            .with_context(|| format!("Failed to write {:?} command", cmd))?;
        self.port.flush().context("Failed to flush serial port")?;
        debug!(target: "connection", "Sent {:?} ({:?})", cmd, cmd.byte() as char);
        Ok(())
    }
}

impl Drop for RigConnection {
    fn drop(&mut self) {
        // Box<dyn SerialPort> closes the descriptor on drop; this is just
        // the session-teardown breadcrumb in the log.
        debug!(target: "connection", "Closing {}", self.port_path);
    }
}
