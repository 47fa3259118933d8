//! Serial output with reconnect.
//!
//! The port is opened lazily. A failed write drops the handle, so the next
//! [`SerialLink::send`] reopens the device; unplugging and replugging the
//! board needs no restart. A path of `-` writes to stdout instead, for
//! piping into the desktop simulator.
//!
//! With a line rate the device is opened through `serialport` (8N1, no flow
//! control). Without one it is opened as a plain file and its current line
//! settings are left alone.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

/// Path that selects stdout.
pub const STDOUT_PATH: &str = "-";

/// How long a write may block before the port counts as gone.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SerialLink {
    path: PathBuf,
    baud: Option<u32>,
    port: Option<Box<dyn Write>>,
}

impl SerialLink {
    /// `baud` of `None` leaves the line settings as they are.
    pub fn new(
        path: impl Into<PathBuf>,
        baud: Option<u32>,
    ) -> Self {
        Self {
            path: path.into(),
            baud,
            port: None,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool { self.port.is_some() }

    fn connect(&mut self) -> Result<&mut Box<dyn Write>> {
        let port: Box<dyn Write> = if self.path.as_os_str() == STDOUT_PATH {
            Box::new(io::stdout())
        } else if let Some(baud) = self.baud {
            let port = serialport::new(self.path.to_string_lossy(), baud)
                .timeout(WRITE_TIMEOUT)
                .open()
                .with_context(|| format!("opening serial port {} at {baud} baud", self.path.display()))?;
            info!("Connected to serial port {} at {baud} baud", self.path.display());
            Box::new(port)
        } else {
            let file = OpenOptions::new()
                .write(true)
                .open(&self.path)
                .with_context(|| format!("opening serial port {}", self.path.display()))?;
            info!("Connected to serial port {} (line settings untouched)", self.path.display());
            Box::new(file)
        };
        Ok(self.port.insert(port))
    }

    /// Write one line (terminator added here).
    pub fn send(
        &mut self,
        line: &str,
    ) -> Result<()> {
        let port = match self.port {
            Some(ref mut port) => port,
            None => self.connect()?,
        };
        let written = port
            .write_all(line.as_bytes())
            .and_then(|()| port.write_all(b"\n"))
            .and_then(|()| port.flush());
        if let Err(e) = written {
            self.port = None;
            return Err(e).with_context(|| format!("writing to {}", self.path.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pcstats-feeder-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_send_appends_newline() {
        let path = temp_path("send");
        fs::write(&path, b"").unwrap();

        let mut link = SerialLink::new(&path, None);
        link.send("45,30,52").unwrap();
        link.send("46,31,N/A").unwrap();
        assert!(link.is_connected());
        assert_eq!(fs::read_to_string(&path).unwrap(), "45,30,52\n46,31,N/A\n");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_port_reports_error_and_retries() {
        let path = temp_path("missing");
        fs::remove_file(&path).ok();

        let mut link = SerialLink::new(&path, None);
        let err = link.send("1,2,3").unwrap_err();
        assert!(format!("{err:#}").contains("opening serial port"), "{err:#}");
        assert!(!link.is_connected());

        // Device shows up later: the next send connects.
        fs::write(&path, b"").unwrap();
        link.send("4,5,6").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4,5,6\n");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_without_baud_opens_plain_file() {
        // Only the serial driver could configure a line rate, and a regular
        // file is not a tty: success means the settings were never touched.
        let path = temp_path("untouched");
        fs::write(&path, b"").unwrap();

        let mut link = SerialLink::new(&path, None);
        link.send("45,30,52").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "45,30,52\n");

        fs::remove_file(&path).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_baud_goes_through_serial_driver() {
        let path = temp_path("not-a-tty");
        fs::write(&path, b"").unwrap();

        let mut link = SerialLink::new(&path, Some(115_200));
        let err = link.send("45,30,52").unwrap_err();
        assert!(format!("{err:#}").contains("at 115200 baud"), "{err:#}");
        assert!(!link.is_connected());
        assert_eq!(fs::read_to_string(&path).unwrap(), "", "nothing written around the driver");

        fs::remove_file(&path).ok();
    }
}
