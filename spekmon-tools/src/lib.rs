//! Shared plumbing for the spekmon command line tools: option tables,
//! serial port enumeration and session setup.

use std::path::{Path, PathBuf};

use getopts::Options;
use spekmon::source::DEFAULT_BAUD;
use spekmon::Monitor;

/// Default capture file for `-l` without an argument.
pub static DEFAULT_LOG_FILE: &str = "scan_json.log";

/// Option table shared by every tool. The scanner port is a free
/// argument; with none given the tools auto-detect.
pub fn common_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt(
        "b",
        "",
        &format!("baud rate (default {})", DEFAULT_BAUD),
        "rate",
    );
    opts.optopt(
        "r",
        "replay",
        "replay a captured scan log instead of opening a device",
        "file",
    );
    opts.optflagopt(
        "l",
        "log",
        &format!("capture scan lines to a file (default {})", DEFAULT_LOG_FILE),
        "file",
    );
    opts.optflag("d", "", "Debugging output");
    opts.optflag("h", "help", "Print this help");
    opts.optflag("", "enum", "Enumerate all serial devices, then quit");
    opts
}

pub struct SerialDevice {
    pub port: String,
    pub label: String,
}

// USB details are all serialport gives us to go on, so auto-detection
// treats any USB CDC port as a candidate scanner.
pub fn enum_devices(all: bool) -> Vec<SerialDevice> {
    let mut ports: Vec<SerialDevice> = Vec::new();

    if let Ok(avail_ports) = serialport::available_ports() {
        for p in avail_ports.iter() {
            let label = match &p.port_type {
                serialport::SerialPortType::UsbPort(info) => {
                    let product = info.product.as_deref().unwrap_or("?");
                    format!("usb {:04x}:{:04x} {}", info.vid, info.pid, product)
                }
                _ => {
                    if !all {
                        continue;
                    }
                    "non-usb".to_string()
                }
            };
            #[cfg(target_os = "macos")]
            if p.port_name.starts_with("/dev/tty.") && !all {
                continue;
            }
            ports.push(SerialDevice {
                port: p.port_name.clone(),
                label,
            });
        }
    }

    ports
}

/// The single plausible scanner port, or an error telling the user to
/// pick one.
pub fn auto_port() -> Result<String, String> {
    let mut candidates = enum_devices(false);
    match candidates.len() {
        0 => Err("no USB serial port found, name one explicitly".to_string()),
        1 => Ok(candidates.remove(0).port),
        _ => Err("multiple serial ports found, name one explicitly".to_string()),
    }
}

pub fn list_ports() {
    let devices = enum_devices(true);
    if devices.is_empty() {
        println!("no serial ports found");
        return;
    }
    println!("serial ports:");
    for dev in devices {
        println!(" * {} ({})", dev.port, dev.label);
    }
}

/// Build the session the parsed options describe: a replay of a capture
/// file with `-r`, otherwise a live device.
pub fn open_session(matches: &getopts::Matches) -> Result<Monitor, String> {
    if let Some(file) = matches.opt_str("r") {
        if matches.opt_present("l") {
            return Err("raw logging is not available in replay mode".to_string());
        }
        return Monitor::replay(Path::new(&file))
            .map_err(|e| format!("cannot replay {}: {}", file, e));
    }

    let baud = match matches.opt_str("b") {
        Some(rate) => rate
            .parse::<u32>()
            .map_err(|_| format!("invalid baud rate '{}'", rate))?,
        None => DEFAULT_BAUD,
    };
    let port = match matches.free.first() {
        Some(port) => port.clone(),
        None => auto_port()?,
    };
    let raw_log = matches.opt_default("l", DEFAULT_LOG_FILE).map(PathBuf::from);
    Monitor::device(&port, baud, raw_log.as_deref())
        .map_err(|e| format!("cannot open {}: {}", port, e))
}

/// Install the logger behind the `log` facade. Without `-d` no logger
/// is installed and records are discarded, keeping the raw-mode
/// terminal clean.
pub fn init_logging(debugging: bool) {
    if debugging {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_conflicts_with_raw_logging() {
        let matches = common_opts().parse(["-r", "capture.log", "-l"]).unwrap();
        let err = open_session(&matches).unwrap_err();
        assert!(err.contains("replay mode"), "got: {}", err);
    }

    #[test]
    fn log_option_defaults_its_file_name() {
        let matches = common_opts().parse(["-l"]).unwrap();
        assert_eq!(
            matches.opt_default("l", DEFAULT_LOG_FILE),
            Some(DEFAULT_LOG_FILE.to_string())
        );
        let matches = common_opts().parse(["--log=other.log"]).unwrap();
        assert_eq!(
            matches.opt_default("l", DEFAULT_LOG_FILE),
            Some("other.log".to_string())
        );
        let matches = common_opts().parse(["some-port"]).unwrap();
        assert_eq!(matches.opt_default("l", DEFAULT_LOG_FILE), None);
    }
}
