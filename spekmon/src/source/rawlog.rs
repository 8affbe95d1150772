//! Verbatim append log of scan lines, for later replay.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Append-only sink for raw scan lines. Every line is flushed as it is
/// written so a crash loses at most the line in flight. Write failures
/// are reported and swallowed; capture must never take the session down.
pub struct RawLog {
    file: Mutex<File>,
    path: String,
}

impl RawLog {
    pub fn open(path: &Path) -> io::Result<RawLog> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(RawLog {
            file: Mutex::new(file),
            path: path.display().to_string(),
        })
    }

    pub fn append(&self, line: &str) {
        let mut file = self.file.lock().unwrap();
        if let Err(e) = write_line(&mut file, line) {
            log::warn!("scan log write to {} failed: {}", self.path, e);
        }
    }
}

fn write_line(file: &mut File, line: &str) -> io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("spekmon-{}-{}.log", tag, std::process::id()))
    }

    #[test]
    fn lines_append_with_terminators() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);

        let sink = RawLog::open(&path).unwrap();
        sink.append("{\"freq\":1}");
        sink.append("{\"freq\":2}");
        drop(sink);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\"freq\":1}\n{\"freq\":2}\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reopen_keeps_existing_lines() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        RawLog::open(&path).unwrap().append("first");
        RawLog::open(&path).unwrap().append("second");

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "first\nsecond\n");
        std::fs::remove_file(&path).unwrap();
    }
}
