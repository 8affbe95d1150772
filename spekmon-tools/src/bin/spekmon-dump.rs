//! spekmon-dump
//!
//! Prints each scan reading as a timestamped one-line summary. Handy
//! for checking a device or a capture without the full-screen monitor.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use spekmon_tools::{common_opts, init_logging, list_ports, open_session};

fn usage_brief(program: &str) -> String {
    format!(
        "Usage: {} [-b rate] [-l] [-d] [port]\n       {} -r capture [-d]\n       {} --enum",
        program, program, program
    )
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

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => die!("{}\n{}", f, opts.usage(&usage_brief(&args[0]))),
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

    loop {
        if let Some(reading) = monitor.drain_latest_reading() {
            println!("{} {}", chrono::Local::now().format("%T%.3f"), reading);
        } else if monitor.is_finished() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    monitor.stop();
    ExitCode::SUCCESS
}
