//! Line protocol of the Power Scanner 2G4.
//!
//! The scanner shares one serial stream between JSON scan objects (one
//! per line) and free-form firmware console text. This module decides
//! which is which, decodes scan objects into [`ScanReading`] values, and
//! defines the outbound command set.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Substring present in the header array of every scan line. Lines
/// without it never reach the JSON parser.
static SCAN_MARKER: &str = "freq";

/// Key of the channel entry list. Required for a line to classify as a
/// scan.
static CHANNELS_KEY: &str = "c";

/// Sent once after opening a device: JSON output on, periodic scan on,
/// 500 ms interval. Brings a factory-state scanner up without user
/// action.
pub static INIT_COMMAND: &str = "JP.";

/// Single-character device commands and their echo descriptions.
pub static COMMANDS: &[(char, &str)] = &[
    ('s', "single scan"),
    ('p', "toggle periodic scan"),
    ('h', "reset max hold"),
    ('j', "toggle json"),
    ('n', "reset freq.range default"),
    ('l', "set freq.range to low"),
    ('?', "help"),
];

/// Scan-interval preset keys: 100 ms, 500 ms, 1 s, 2 s, 5 s, 10 s.
pub static INTERVAL_PRESETS: &[char] = &['!', '.', '1', '2', '5', '0'];

/// Echo description for a single-character command, if it is one.
pub fn command_description(cmd: char) -> Option<&'static str> {
    COMMANDS.iter().find(|(c, _)| *c == cmd).map(|(_, d)| *d)
}

/// One decoded spectrum sweep.
///
/// The five sequences are parallel: entry `i` of each describes channel
/// `i`. Frequencies are MHz, ascending, assigned by the device; power
/// values are dBm. A published reading always has at least one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReading {
    pub freqs: Vec<i32>,
    /// Average power per channel.
    pub avg: Vec<i16>,
    /// Minimum power per channel.
    pub min: Vec<i16>,
    /// Maximum power per channel.
    pub max: Vec<i16>,
    /// Max-hold power per channel, device-side, reset with `h`.
    pub hold: Vec<i16>,
    /// Integration period declared in this reading (`scan` key), ms.
    /// 0 when the device did not report one.
    pub interval_ms: i64,
}

impl ScanReading {
    /// Number of channels.
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Strongest max-hold channel as `(freq, dBm)`.
    pub fn peak(&self) -> Option<(i32, i16)> {
        self.freqs
            .iter()
            .zip(&self.max)
            .map(|(f, p)| (*f, *p))
            .max_by_key(|(_, p)| *p)
    }
}

impl fmt::Display for ScanReading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "scan {} ch", self.len())?;
        if let (Some(first), Some(last)) = (self.freqs.first(), self.freqs.last()) {
            write!(f, " {}..{} MHz", first, last)?;
        }
        if let Some((freq, dbm)) = self.peak() {
            write!(f, " peak {} dBm @ {} MHz", dbm, freq)?;
        }
        write!(f, " interval {} ms", self.interval_ms)
    }
}

/// Scan timing reported by the device alongside each reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Power integration period per channel (`scanint_ms`), ms.
    pub scan_interval_ms: i64,
    /// Duration of one sweep over all channels (`sweep_ms`), ms.
    pub sweep_time_ms: i64,
}

/// Shared cache of the most recent [`ScanTiming`]. The decoder is the
/// only writer; display consumers hold clones and read.
#[derive(Debug, Clone, Default)]
pub struct TimingContext {
    inner: Arc<RwLock<Option<ScanTiming>>>,
}

impl TimingContext {
    pub fn new() -> TimingContext {
        TimingContext::default()
    }

    /// Timing from the most recent scan line, None before the first one.
    pub fn get(&self) -> Option<ScanTiming> {
        *self.inner.read().unwrap()
    }

    fn set(&self, timing: ScanTiming) {
        *self.inner.write().unwrap() = Some(timing);
    }
}

/// Terminal classification of one raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Scan line with at least one valid channel entry.
    Reading(ScanReading),
    /// Anything that is not scan JSON: firmware console text.
    Console,
    /// Scan line whose channel entries were all malformed. Dropped
    /// without further notice.
    Discarded,
    /// Scan line missing required fields. Dropped, but reported.
    Fault(DecodeFault),
}

/// Faults on lines that already classified as scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFault {
    /// `scanint_ms`/`sweep_ms` absent or non-numeric.
    MissingTiming,
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeFault::MissingTiming => {
                write!(f, "scan line without scanint_ms/sweep_ms")
            }
        }
    }
}

/// Line classifier. Stateless apart from the shared timing cache it
/// refreshes from every scan line.
#[derive(Debug, Clone)]
pub struct Decoder {
    timing: TimingContext,
}

impl Decoder {
    pub fn new(timing: TimingContext) -> Decoder {
        Decoder { timing }
    }

    /// Classify one raw line.
    ///
    /// A line is a scan candidate only if it contains the marker
    /// substring; anything else is console text without paying for a
    /// JSON parse. Candidates that fail to parse, or parse without the
    /// channel key, are console text too. From the channel key onwards
    /// the line is a scan and never falls back to console: missing
    /// timing fields are a fault, and a line whose entries are all
    /// malformed is discarded. Timing is cached before the entries are
    /// walked, so even a discarded line refreshes it.
    pub fn classify(&self, line: &str) -> LineClass {
        let line = line.trim();
        if !line.contains(SCAN_MARKER) {
            return LineClass::Console;
        }
        let obj: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return LineClass::Console,
        };
        let channels = match obj.get(CHANNELS_KEY) {
            Some(c) => c,
            None => return LineClass::Console,
        };
        match (as_int(obj.get("scanint_ms")), as_int(obj.get("sweep_ms"))) {
            (Some(scan_interval_ms), Some(sweep_time_ms)) => self.timing.set(ScanTiming {
                scan_interval_ms,
                sweep_time_ms,
            }),
            _ => return LineClass::Fault(DecodeFault::MissingTiming),
        }
        let interval_ms = as_int(obj.get("scan")).unwrap_or(0);

        let mut reading = ScanReading {
            freqs: Vec::new(),
            avg: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
            hold: Vec::new(),
            interval_ms,
        };
        if let Some(entries) = channels.as_array() {
            for entry in entries {
                let entry = match entry.as_array() {
                    Some(e) if e.len() >= 5 => e,
                    _ => continue,
                };
                let fields = (
                    as_int(Some(&entry[0])),
                    as_int(Some(&entry[1])),
                    as_int(Some(&entry[2])),
                    as_int(Some(&entry[3])),
                    as_int(Some(&entry[4])),
                );
                if let (Some(freq), Some(avg), Some(min), Some(max), Some(hold)) = fields {
                    reading.freqs.push(freq as i32);
                    reading.avg.push(avg as i16);
                    reading.min.push(min as i16);
                    reading.max.push(max as i16);
                    reading.hold.push(hold as i16);
                }
            }
        }
        if reading.is_empty() {
            LineClass::Discarded
        } else {
            LineClass::Reading(reading)
        }
    }
}

/// Numeric JSON value as an integer, truncating floats toward zero.
fn as_int(v: Option<&Value>) -> Option<i64> {
    let v = v?;
    match v.as_i64() {
        Some(i) => Some(i),
        None => v.as_f64().map(|f| f as i64),
    }
}

/// Validate a frequency-range command buffer against `x <int> <int>`.
/// Returns the trimmed command text to put on the wire, or None if the
/// buffer does not match the grammar.
pub fn range_command(buffer: &str) -> Option<&str> {
    let text = buffer.trim();
    let mut parts = text.split_whitespace();
    if parts.next() != Some("x") {
        return None;
    }
    for _ in 0..2 {
        let arg = parts.next()?;
        let digits = arg.strip_prefix('-').unwrap_or(arg);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    if parts.next().is_some() {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    static GOOD_LINE: &str = concat!(
        r#"{"scanint_ms":500,"sweep_ms":300,"scan":500,"#,
        r#""h":["freq","avg","min","max","hold"],"#,
        r#""c":[[2412,-90,-95,-85,-80]]}"#
    );

    fn decoder() -> Decoder {
        Decoder::new(TimingContext::new())
    }

    #[test]
    fn decodes_single_channel_scan() {
        match decoder().classify(GOOD_LINE) {
            LineClass::Reading(r) => {
                assert_eq!(r.len(), 1);
                assert_eq!(r.freqs, vec![2412]);
                assert_eq!(r.avg, vec![-90]);
                assert_eq!(r.min, vec![-95]);
                assert_eq!(r.max, vec![-85]);
                assert_eq!(r.hold, vec![-80]);
                assert_eq!(r.interval_ms, 500);
            }
            other => panic!("expected reading, got {:?}", other),
        }
    }

    #[test]
    fn updates_shared_timing() {
        let timing = TimingContext::new();
        assert_eq!(timing.get(), None);
        Decoder::new(timing.clone()).classify(GOOD_LINE);
        assert_eq!(
            timing.get(),
            Some(ScanTiming {
                scan_interval_ms: 500,
                sweep_time_ms: 300,
            })
        );
    }

    #[test]
    fn marker_rejection_precedes_parsing() {
        // Valid scan JSON in every way, except nothing in it contains
        // the marker substring. Must classify as console, proving the
        // parser never saw it.
        let line = r#"{"scanint_ms":500,"sweep_ms":300,"c":[[2412,-90,-95,-85,-80]]}"#;
        assert_eq!(decoder().classify(line), LineClass::Console);
        assert_eq!(decoder().classify("button pressed"), LineClass::Console);
    }

    #[test]
    fn unparsable_marker_line_is_console() {
        assert_eq!(decoder().classify("freq sweep started"), LineClass::Console);
        assert_eq!(
            decoder().classify(r#"{"h":["freq"],"c":[[broken"#),
            LineClass::Console
        );
    }

    #[test]
    fn object_without_channel_key_is_console() {
        let line = r#"{"scanint_ms":500,"sweep_ms":300,"h":["freq","avg","min","max","hold"]}"#;
        assert_eq!(decoder().classify(line), LineClass::Console);
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        // Four entries: one short, one non-numeric, two good.
        let line = concat!(
            r#"{"scanint_ms":500,"sweep_ms":300,"scan":500,"h":["freq"],"#,
            r#""c":[[2412,-90,-95,-85,-80],[2417,-91],"#,
            r#"[2422,"x",-95,-85,-80],[2427,-92,-97,-87,-82]]}"#
        );
        match decoder().classify(line) {
            LineClass::Reading(r) => {
                assert_eq!(r.freqs, vec![2412, 2427]);
                assert_eq!(r.avg, vec![-90, -92]);
                assert_eq!(r.hold, vec![-80, -82]);
            }
            other => panic!("expected reading, got {:?}", other),
        }
    }

    #[test]
    fn all_entries_malformed_discards_line() {
        let line = r#"{"scanint_ms":500,"sweep_ms":300,"h":["freq"],"c":[[2412],["x"]]}"#;
        assert_eq!(decoder().classify(line), LineClass::Discarded);
        let line = r#"{"scanint_ms":500,"sweep_ms":300,"h":["freq"],"c":[]}"#;
        assert_eq!(decoder().classify(line), LineClass::Discarded);
    }

    #[test]
    fn missing_timing_is_a_fault() {
        let line = r#"{"h":["freq"],"scan":500,"c":[[2412,-90,-95,-85,-80]]}"#;
        assert_eq!(
            decoder().classify(line),
            LineClass::Fault(DecodeFault::MissingTiming)
        );
    }

    #[test]
    fn timing_cached_even_for_discarded_lines() {
        let timing = TimingContext::new();
        let line = r#"{"scanint_ms":250,"sweep_ms":100,"h":["freq"],"c":[["bad"]]}"#;
        assert_eq!(
            Decoder::new(timing.clone()).classify(line),
            LineClass::Discarded
        );
        assert_eq!(
            timing.get(),
            Some(ScanTiming {
                scan_interval_ms: 250,
                sweep_time_ms: 100,
            })
        );
    }

    #[test]
    fn extra_entry_elements_are_ignored() {
        let line = concat!(
            r#"{"scanint_ms":500,"sweep_ms":300,"h":["freq"],"#,
            r#""c":[[2412,-90,-95,-85,-80,1,2,3]]}"#
        );
        match decoder().classify(line) {
            LineClass::Reading(r) => assert_eq!(r.hold, vec![-80]),
            other => panic!("expected reading, got {:?}", other),
        }
    }

    #[test]
    fn float_values_truncate_toward_zero() {
        let line = concat!(
            r#"{"scanint_ms":500.9,"sweep_ms":300,"h":["freq"],"#,
            r#""c":[[2412.7,-90.5,-95,-85,-80]]}"#
        );
        match decoder().classify(line) {
            LineClass::Reading(r) => {
                assert_eq!(r.freqs, vec![2412]);
                assert_eq!(r.avg, vec![-90]);
            }
            other => panic!("expected reading, got {:?}", other),
        }
    }

    #[test]
    fn missing_scan_key_defaults_interval_to_zero() {
        let line = r#"{"scanint_ms":500,"sweep_ms":300,"h":["freq"],"c":[[2412,-90,-95,-85,-80]]}"#;
        match decoder().classify(line) {
            LineClass::Reading(r) => assert_eq!(r.interval_ms, 0),
            other => panic!("expected reading, got {:?}", other),
        }
    }

    #[test]
    fn reading_summary_reports_peak() {
        let r = ScanReading {
            freqs: vec![2412, 2437, 2462],
            avg: vec![-90, -80, -88],
            min: vec![-95, -92, -94],
            max: vec![-85, -42, -70],
            hold: vec![-80, -40, -65],
            interval_ms: 500,
        };
        assert_eq!(r.peak(), Some((2437, -42)));
        let text = r.to_string();
        assert!(text.contains("3 ch"), "summary was: {}", text);
        assert!(text.contains("2412..2462"), "summary was: {}", text);
    }

    #[test]
    fn range_grammar_accepts_two_integers() {
        assert_eq!(range_command("x 10 20"), Some("x 10 20"));
        assert_eq!(range_command("x -5 100"), Some("x -5 100"));
        assert_eq!(range_command("x  2400   2480 "), Some("x  2400   2480"));
    }

    #[test]
    fn range_grammar_rejects_bad_input() {
        assert_eq!(range_command("x 10"), None);
        assert_eq!(range_command("x abc 20"), None);
        assert_eq!(range_command("x 10 20 30"), None);
        assert_eq!(range_command("x 10 2-0"), None);
        assert_eq!(range_command("x - 20"), None);
        assert_eq!(range_command("y 10 20"), None);
        assert_eq!(range_command(""), None);
    }

    #[test]
    fn command_table_lookup() {
        assert_eq!(command_description('s'), Some("single scan"));
        assert_eq!(command_description('z'), None);
        assert!(INTERVAL_PRESETS.contains(&'.'));
    }
}
