//! Line sources and the reader thread that drains them.
//!
//! A [`LineRead`] implementation produces raw lines from somewhere (a
//! serial port, a capture file); [`Source`] owns the thread that pulls
//! lines out of one and fans each line out to the decoder, the latest
//! slot, the console ring and the raw log. The thread holds no lock
//! while it waits for input.

mod rawlog;
mod replay;
mod serial;

pub use rawlog::RawLog;
pub use replay::ReplayLines;
pub use serial::{open, SerialLines, SharedPort, DEFAULT_BAUD};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::monitor::{ConsoleRing, LatestSlot};
use crate::proto::{Decoder, LineClass};

static POLL_PAUSE: Duration = Duration::from_millis(10);
static ERROR_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub enum RecvError {
    /// Nothing to read right now; poll again shortly.
    NotReady,
    /// The source is exhausted for good.
    Eof,
    Io(std::io::Error),
}

/// A producer of raw protocol lines, one at a time, trimmed and
/// nonempty.
pub trait LineRead: Send {
    fn recv(&mut self) -> Result<String, RecvError>;

    /// How long to hold off after delivering a reading with the given
    /// interval. None means lines arrive at their natural rate.
    fn pace(&self, _interval_ms: i64) -> Option<Duration> {
        None
    }

    /// Whether console-classified lines from this source are worth
    /// showing.
    fn forwards_console(&self) -> bool {
        true
    }

    /// Whether a read error is worth retrying.
    fn recovers(&self) -> bool {
        true
    }
}

/// Where decoded lines go. One per reader thread.
pub(crate) struct Dispatch {
    pub decoder: Decoder,
    pub latest: Arc<LatestSlot>,
    pub console: Arc<ConsoleRing>,
    pub rawlog: Option<RawLog>,
}

impl Dispatch {
    /// Route one raw line. Returns the reading's interval when the line
    /// published a reading, for sources that pace on it.
    fn line(&self, raw: &str, forward_console: bool) -> Option<i64> {
        match self.decoder.classify(raw) {
            LineClass::Console => {
                if forward_console {
                    self.console.push(raw.to_string());
                }
                None
            }
            class => {
                // every scan-classified line is captured, even faulty
                // ones, so a replayed log reproduces the session
                if let Some(sink) = &self.rawlog {
                    sink.append(raw);
                }
                match class {
                    LineClass::Reading(reading) => {
                        let interval_ms = reading.interval_ms;
                        self.latest.push(reading);
                        Some(interval_ms)
                    }
                    LineClass::Fault(fault) => {
                        log::warn!("{}", fault);
                        self.console.push(format!("!! {}", fault));
                        None
                    }
                    _ => None,
                }
            }
        }
    }
}

/// Handle to a running reader thread.
pub struct Source {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Source {
    pub(crate) fn spawn<L: LineRead + 'static>(mut lines: L, dispatch: Dispatch) -> Source {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = thread::spawn(move || {
            run(&mut lines, &dispatch, &flag);
        });
        Source {
            stop,
            thread: Some(thread),
        }
    }

    /// Ask the thread to finish and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// True once the thread has exited, requested or not.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(lines: &mut dyn LineRead, dispatch: &Dispatch, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        match lines.recv() {
            Ok(raw) => {
                if let Some(interval_ms) = dispatch.line(&raw, lines.forwards_console()) {
                    if let Some(pause) = lines.pace(interval_ms) {
                        thread::sleep(pause);
                    }
                }
            }
            Err(RecvError::NotReady) => thread::sleep(POLL_PAUSE),
            Err(RecvError::Eof) => break,
            Err(RecvError::Io(e)) => {
                log::warn!("line source read failed: {}", e);
                if !lines.recovers() {
                    break;
                }
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    log::debug!("line source loop done");
}
