//! Metapod open binary: print the payload embedded in a PE file

use clap::Parser;
use metapod::exit_codes::*;
use metapod::pod::cli;
use std::{env, panic, path::PathBuf, process};

const VERSION: &str = metapod::version::VERSION;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Recover the metadata payload from a PE file")]
struct Args {
    /// File to read
    input: PathBuf,

    /// Show image, signature and block details instead of the payload
    #[arg(long)]
    info: bool,

    /// With --info, print the report as JSON
    #[arg(long, requires = "info")]
    json: bool,

    /// Log level (trace, debug, info, warn, error, json[:level])
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in metapod-open");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    if env::args().nth(1).as_deref() == Some("--version") {
        println!("metapod-open {}", metapod::version::full_version());
        return EXIT_SUCCESS;
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            return EXIT_SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return EXIT_INVALID_ARGS;
        }
    };

    if let Some(ref level) = args.log_level {
        metapod::logger::JsonLogger::init_with_level(level, "CLI --log-level");
    } else {
        metapod::logger::JsonLogger::init();
    }

    if args.info {
        cli::show_info(&args.input, args.json)
    } else {
        cli::show_payload(&args.input)
    }
}
