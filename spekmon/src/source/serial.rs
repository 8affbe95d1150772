//! Live line source over a serial port.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::{FlowControl, SerialPort};

use super::{LineRead, RecvError};

pub static DEFAULT_BAUD: u32 = 115200;
static READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Port handle shared between the reader thread and the command side.
/// The mutex is the serialization domain for all port I/O; reads give
/// it up at least every read timeout, so a queued write never waits
/// longer than that.
pub type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Open `port` at `baud`, 8N1 with hardware flow control.
pub fn open(port: &str, baud: u32) -> serialport::Result<SharedPort> {
    let port = serialport::new(port, baud)
        .timeout(READ_TIMEOUT)
        .flow_control(FlowControl::Hardware)
        .open()?;
    Ok(Arc::new(Mutex::new(port)))
}

/// Reassembles newline-terminated lines out of the port's byte stream.
pub struct SerialLines {
    port: SharedPort,
    rxbuf: Vec<u8>,
    lines: VecDeque<String>,
}

impl SerialLines {
    pub fn new(port: SharedPort) -> SerialLines {
        SerialLines {
            port,
            rxbuf: Vec::new(),
            lines: VecDeque::new(),
        }
    }

    fn refill(&mut self) -> Result<(), RecvError> {
        let mut buf = [0u8; 1024];
        let n = {
            let mut port = self.port.lock().unwrap();
            match port.read(&mut buf) {
                Ok(n) => n,
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    0
                }
                Err(e) => return Err(RecvError::Io(e)),
            }
        };
        if n == 0 {
            return Err(RecvError::NotReady);
        }
        self.rxbuf.extend_from_slice(&buf[..n]);
        drain_lines(&mut self.rxbuf, &mut self.lines);
        Ok(())
    }
}

impl LineRead for SerialLines {
    fn recv(&mut self) -> Result<String, RecvError> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(line);
            }
            self.refill()?;
        }
    }
}

fn drain_lines(rxbuf: &mut Vec<u8>, lines: &mut VecDeque<String>) {
    while let Some(pos) = rxbuf.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = rxbuf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
        let line = text.trim();
        if !line.is_empty() {
            lines.push_back(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_reassemble_across_chunks() {
        let mut rxbuf = Vec::new();
        let mut lines = VecDeque::new();

        rxbuf.extend_from_slice(b"{\"fr");
        drain_lines(&mut rxbuf, &mut lines);
        assert!(lines.is_empty());

        rxbuf.extend_from_slice(b"eq\":1}\r\nready\npartial");
        drain_lines(&mut rxbuf, &mut lines);
        assert_eq!(lines, ["{\"freq\":1}", "ready"]);
        assert_eq!(rxbuf, b"partial");
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut rxbuf = b"\r\n\n  \nok\n".to_vec();
        let mut lines = VecDeque::new();
        drain_lines(&mut rxbuf, &mut lines);
        assert_eq!(lines, ["ok"]);
    }
}
