//! Replay line source over a captured scan log.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use super::{LineRead, RecvError};

/// Pace between replayed lines when a reading carries no interval.
static DEFAULT_PACE: Duration = Duration::from_millis(200);

/// Reads lines from a capture file and asks the reader loop to pace
/// them by each reading's own scan interval, so a replayed session
/// unfolds roughly in real time. End of file ends the source.
pub struct ReplayLines<R> {
    reader: R,
}

impl ReplayLines<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(ReplayLines::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> ReplayLines<R> {
    pub fn new(reader: R) -> ReplayLines<R> {
        ReplayLines { reader }
    }
}

impl<R: BufRead + Send> LineRead for ReplayLines<R> {
    fn recv(&mut self) -> Result<String, RecvError> {
        loop {
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => return Err(RecvError::Eof),
                Ok(_) => {
                    let line = buf.trim();
                    if !line.is_empty() {
                        return Ok(line.to_string());
                    }
                }
                Err(e) => return Err(RecvError::Io(e)),
            }
        }
    }

    fn pace(&self, interval_ms: i64) -> Option<Duration> {
        if interval_ms > 0 {
            Some(Duration::from_millis(interval_ms as u64))
        } else {
            Some(DEFAULT_PACE)
        }
    }

    // a capture holds scan lines only; anything else is noise
    fn forwards_console(&self) -> bool {
        false
    }

    fn recovers(&self) -> bool {
        false
    }
}
