//! spekmon-monitor
//!
//! Full-screen terminal monitor for the Power Scanner 2G4: scan
//! summary, waterfall preview, device console and keyboard commands,
//! live from a serial port or replayed from a capture file.

use std::env;
use std::io::{self, stdout, Write};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use crossterm::{
    cursor::*,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::*,
    terminal::*,
};

use spekmon::input::Key;
use spekmon::monitor::{FLOOR_DBM, TICK};
use spekmon::{Monitor, ScanReading};
use spekmon_tools::{common_opts, init_logging, list_ports, open_session};

/// Newest waterfall rows shown under the header.
static WF_PREVIEW_ROWS: usize = 8;
static RAMP: &[u8] = b" .:-=+*#%@";

fn usage_brief(program: &str) -> String {
    format!(
        "Usage: {} [-b rate] [-l] [-d] [port]\n       {} -r capture [-d]\n       {} --enum",
        program, program, program
    )
}

enum Flow {
    Continue,
    Quit,
}

fn main() -> ExitCode {
    let opts = common_opts();
    let args: Vec<String> = env::args().collect();

    macro_rules! die{
        ($f:expr,$($a:tt)*)=>{
        {
            die!(format!($f, $($a)*));
        }
        };
        ($msg:expr)=>{
        {
            eprintln!("ERROR: {}", $msg);
            return ExitCode::FAILURE;
        }
        };
    }
    macro_rules! die_usage{
        ($f:expr,$($a:tt)*)=>{
        {
            die_usage!(format!($f, $($a)*));
        }
        };
        ($msg:expr)=>{
        {
            die!("{}\n{}", $msg, opts.usage(&usage_brief(&args[0])));
        }
        };
    }

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => die_usage!("{}", f.to_string()),
    };
    if matches.opt_present("h") {
        println!("{}", opts.usage(&usage_brief(&args[0])));
        return ExitCode::SUCCESS;
    }
    if matches.opt_present("enum") {
        list_ports();
        return ExitCode::SUCCESS;
    }
    init_logging(matches.opt_present("d"));

    let mut monitor = match open_session(&matches) {
        Ok(monitor) => monitor,
        Err(e) => die!("{}", e),
    };
    if let Some(file) = matches.opt_str("r") {
        monitor.notice(&format!(">> playback file: {}", file));
    }

    let mut out = stdout();
    if let Err(e) = enable_raw_mode() {
        die!("cannot enter raw mode: {}", e);
    }
    if let Err(e) = execute!(out, EnterAlternateScreen, Hide) {
        _ = disable_raw_mode();
        die!("cannot set up terminal: {}", e);
    }

    let result = run(&mut monitor, &mut out);

    _ = execute!(out, Show, LeaveAlternateScreen);
    _ = disable_raw_mode();
    monitor.stop();

    if let Err(e) = result {
        die!("display error: {}", e);
    }
    ExitCode::SUCCESS
}

fn run(monitor: &mut Monitor, out: &mut io::Stdout) -> io::Result<()> {
    let mut console_visible = true;
    let mut last_reading: Option<ScanReading> = None;
    let mut last_draw: Option<Instant> = None;

    loop {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Flow::Quit = handle_key(monitor, key, &mut console_visible) {
                    return Ok(());
                }
                // redraw promptly so echoes show up under the keystroke
                last_draw = None;
            }
        }
        let due = match last_draw {
            Some(t) => t.elapsed() >= TICK,
            None => true,
        };
        if due {
            if let Some(reading) = monitor.drain_latest_reading() {
                last_reading = Some(reading);
            }
            draw(out, monitor, last_reading.as_ref(), console_visible)?;
            last_draw = Some(Instant::now());
        }
    }
}

fn handle_key(monitor: &mut Monitor, key: KeyEvent, console_visible: &mut bool) -> Flow {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char('c') = key.code {
            return Flow::Quit;
        }
    }
    if !monitor.input_active() {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('d') => {
                *console_visible = !*console_visible;
                monitor.notice(&format!(">> d (console_visible={})", console_visible));
                return Flow::Continue;
            }
            _ => {}
        }
    }
    let key = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Esc => Key::Esc,
        _ => return Flow::Continue,
    };
    monitor.key(key);
    Flow::Continue
}

fn draw(
    out: &mut io::Stdout,
    monitor: &Monitor,
    reading: Option<&ScanReading>,
    console_visible: bool,
) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    let state = if monitor.is_finished() { "stopped" } else { "live" };
    let header = match monitor.timing() {
        Some(t) => format!(
            "spekmon  [{}]  scanint {} ms  sweep {} ms",
            state, t.scan_interval_ms, t.sweep_time_ms
        ),
        None => format!("spekmon  [{}]  waiting for first scan...", state),
    };
    queue!(out, Print(header), MoveToNextLine(1))?;

    match reading {
        Some(r) => queue!(out, Print(r.to_string()), MoveToNextLine(2))?,
        None => queue!(out, Print("no scan data yet"), MoveToNextLine(2))?,
    }

    if let Some(snap) = monitor.waterfall_snapshot() {
        let first = snap.rows.saturating_sub(WF_PREVIEW_ROWS);
        for i in first..snap.rows {
            let row: String = snap.row(i).iter().map(|&v| ramp_char(v)).collect();
            queue!(out, Print(row), MoveToNextLine(1))?;
        }
        queue!(out, MoveToNextLine(1))?;
    }

    queue!(
        out,
        Print("keys: s p h j n l x ? | ! . 1 2 5 0 | d console | q quit"),
        MoveToNextLine(2)
    )?;

    if console_visible {
        for line in monitor.console_snapshot(10) {
            queue!(out, Print(line), MoveToNextLine(1))?;
        }
    }
    if monitor.input_active() {
        queue!(
            out,
            MoveToNextLine(1),
            Print(format!("edit> {}_", monitor.input_buffer()))
        )?;
    }
    out.flush()
}

fn ramp_char(dbm: f32) -> char {
    let t = ((dbm - FLOOR_DBM) / 60.0).clamp(0.0, 1.0);
    let idx = (t * (RAMP.len() - 1) as f32).round() as usize;
    RAMP[idx] as char
}
