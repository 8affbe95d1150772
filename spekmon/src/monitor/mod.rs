//! Session facade over one scanner.
//!
//! [`Monitor`] owns the reader thread plus every display-facing
//! surface: the latest-reading slot, the console ring, the waterfall
//! history, the shared timing cache and the outbound command channel.
//! Display layers poll it on a tick; nothing in here blocks on them.

mod console;
mod latest;
mod waterfall;

pub use console::{ConsoleRing, DEFAULT_CAPACITY};
pub use latest::LatestSlot;
pub use waterfall::{Waterfall, WaterfallSnapshot, DEFAULT_ROWS, FLOOR_DBM};

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::input::{self, Effect, InputState, Key};
use crate::proto::{self, Decoder, ScanReading, ScanTiming, TimingContext};
use crate::source::{
    self, Dispatch, LineRead, RawLog, ReplayLines, SerialLines, SharedPort, Source,
};

/// Consumer tick period display layers should drain at.
pub static TICK: Duration = Duration::from_millis(200);

/// Outbound command channel. Cheap to clone; every clone talks to the
/// same port. With no port attached (replay sessions) sends are
/// silently dropped.
#[derive(Clone)]
pub struct CommandTx {
    port: Option<SharedPort>,
}

impl CommandTx {
    /// Write `cmd` to the device. Failures are reported, not returned;
    /// a command the device never saw shows up in its behavior anyway.
    pub fn send(&self, cmd: &str) {
        let port = match &self.port {
            Some(port) => port,
            None => return,
        };
        let mut port = port.lock().unwrap();
        let res = port.write_all(cmd.as_bytes()).and_then(|_| port.flush());
        if let Err(e) = res {
            log::warn!("command write failed: {}", e);
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

#[derive(Debug)]
pub enum SetupError {
    Port(serialport::Error),
    Io(std::io::Error),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SetupError::Port(e) => write!(f, "{}", e),
            SetupError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl From<serialport::Error> for SetupError {
    fn from(e: serialport::Error) -> SetupError {
        SetupError::Port(e)
    }
}

impl From<std::io::Error> for SetupError {
    fn from(e: std::io::Error) -> SetupError {
        SetupError::Io(e)
    }
}

pub struct Monitor {
    latest: Arc<LatestSlot>,
    console: Arc<ConsoleRing>,
    waterfall: Waterfall,
    timing: TimingContext,
    tx: CommandTx,
    input: InputState,
    source: Source,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Monitor").finish_non_exhaustive()
    }
}

impl Monitor {
    /// Live session on a serial device. Optionally captures every scan
    /// line to `raw_log`. Sends the init command once the reader is up.
    pub fn device(
        port_name: &str,
        baud: u32,
        raw_log: Option<&Path>,
    ) -> Result<Monitor, SetupError> {
        let port = source::open(port_name, baud)?;
        let rawlog = match raw_log {
            Some(path) => Some(RawLog::open(path)?),
            None => None,
        };
        let tx = CommandTx {
            port: Some(port.clone()),
        };
        let monitor = Monitor::assemble(SerialLines::new(port), tx, rawlog);
        monitor.tx.send(proto::INIT_COMMAND);
        Ok(monitor)
    }

    /// Replay session over a capture file. No port, no raw log; the
    /// session ends when the file does.
    pub fn replay(path: &Path) -> Result<Monitor, SetupError> {
        let lines = ReplayLines::open(path)?;
        Ok(Monitor::assemble(lines, CommandTx { port: None }, None))
    }

    fn assemble<L: LineRead + 'static>(
        lines: L,
        tx: CommandTx,
        rawlog: Option<RawLog>,
    ) -> Monitor {
        let timing = TimingContext::new();
        let latest = Arc::new(LatestSlot::new());
        let console = Arc::new(ConsoleRing::default());
        let dispatch = Dispatch {
            decoder: Decoder::new(timing.clone()),
            latest: latest.clone(),
            console: console.clone(),
            rawlog,
        };
        let source = Source::spawn(lines, dispatch);
        Monitor {
            latest,
            console,
            waterfall: Waterfall::new(wf_rows(), FLOOR_DBM),
            timing,
            tx,
            input: InputState::new(),
            source,
        }
    }

    /// Newest reading since the last call, already folded into the
    /// waterfall. None when no new reading arrived this tick.
    pub fn drain_latest_reading(&mut self) -> Option<ScanReading> {
        let reading = self.latest.take()?;
        self.waterfall.observe(&reading);
        Some(reading)
    }

    /// Last `k` console lines, oldest first.
    pub fn console_snapshot(&self, k: usize) -> Vec<String> {
        self.console.tail(k)
    }

    pub fn waterfall_snapshot(&self) -> Option<WaterfallSnapshot> {
        self.waterfall.snapshot()
    }

    /// Timing from the most recent scan line.
    pub fn timing(&self) -> Option<ScanTiming> {
        self.timing.get()
    }

    /// Feed one keystroke through the command machine and apply its
    /// effects.
    pub fn key(&mut self, key: Key) {
        let state = std::mem::take(&mut self.input);
        let (state, effects) = input::step(state, key);
        self.input = state;
        for effect in effects {
            match effect {
                Effect::Send(cmd) => self.tx.send(&cmd),
                Effect::Console(line) => self.console.push(line),
            }
        }
    }

    /// True while a multi-argument command is being edited.
    pub fn input_active(&self) -> bool {
        self.input.line_input()
    }

    pub fn input_buffer(&self) -> &str {
        self.input.buffer()
    }

    /// Put a local notice in the console pane.
    pub fn notice(&self, line: &str) {
        self.console.push(line.to_string());
    }

    /// Handle for sending commands outside the keystroke path.
    pub fn commands(&self) -> CommandTx {
        self.tx.clone()
    }

    /// True once the source is exhausted (replay reached end of file,
    /// or a dead serial source gave up).
    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }

    pub fn stop(&mut self) {
        self.source.stop();
    }
}

fn wf_rows() -> usize {
    if let Ok(req) = std::env::var("SPEKMON_WF_ROWS") {
        std::cmp::max(req.parse().unwrap_or(0), 1)
    } else {
        DEFAULT_ROWS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    static CAPTURE: &str = concat!(
        "{\"scanint_ms\":500,\"sweep_ms\":300,\"scan\":1,\"h\":[\"freq\"],",
        "\"c\":[[2412,-90,-95,-85,-80],[2417,-88,-93,-83,-78]]}\n",
        "{\"scanint_ms\":500,\"sweep_ms\":300,\"scan\":1,\"h\":[\"freq\"],",
        "\"c\":[[2412,-89,-94,-84,-79],[2417,-87,-92,-82,-77]]}\n",
    );

    fn temp_capture(tag: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("spekmon-{}-{}.log", tag, std::process::id()));
        std::fs::write(&path, CAPTURE).unwrap();
        path
    }

    fn wait_finished(monitor: &Monitor) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !monitor.is_finished() {
            assert!(Instant::now() < deadline, "replay never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn replay_session_feeds_reading_waterfall_and_timing() {
        let path = temp_capture("session");
        let mut monitor = Monitor::replay(&path).unwrap();
        wait_finished(&monitor);

        // the slot holds the newest reading only
        let reading = monitor.drain_latest_reading().unwrap();
        assert_eq!(reading.freqs, vec![2412, 2417]);
        assert_eq!(reading.max, vec![-84, -82]);
        assert!(monitor.drain_latest_reading().is_none());

        let snap = monitor.waterfall_snapshot().unwrap();
        assert_eq!(snap.cols, 2);
        assert_eq!(snap.row(snap.rows - 1), &[-84.0, -82.0]);
        assert_eq!(snap.row(0), &[FLOOR_DBM, FLOOR_DBM]);

        let timing = monitor.timing().unwrap();
        assert_eq!(timing.scan_interval_ms, 500);
        assert_eq!(timing.sweep_time_ms, 300);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn keystrokes_and_notices_reach_console_without_a_port() {
        let path = temp_capture("keys");
        let mut monitor = Monitor::replay(&path).unwrap();
        wait_finished(&monitor);
        assert!(!monitor.commands().is_open());

        monitor.key(Key::Char('s'));
        monitor.notice(">> playback file: demo.log");
        assert_eq!(
            monitor.console_snapshot(5),
            vec![">> s (single scan)", ">> playback file: demo.log"]
        );

        monitor.key(Key::Char('x'));
        assert!(monitor.input_active());
        assert_eq!(monitor.input_buffer(), "x ");
        std::fs::remove_file(&path).unwrap();
    }
}
