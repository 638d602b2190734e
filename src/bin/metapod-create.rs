//! Metapod create binary: embed a payload into a PE template

use clap::Parser;
use metapod::CreateOptions;
use metapod::exit_codes::*;
use metapod::pod::cli;
use std::{env, panic, path::PathBuf, process};

const VERSION: &str = metapod::version::VERSION;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Embed a metadata payload into a signed PE file")]
struct Args {
    /// Template executable
    #[arg(short, long)]
    input: PathBuf,

    /// Payload text to embed
    #[arg(short, long, conflicts_with = "payload_file")]
    payload: Option<String>,

    /// Read the payload from a UTF-8 file instead
    #[arg(long)]
    payload_file: Option<PathBuf>,

    /// Where to write the new executable
    #[arg(short, long)]
    output: PathBuf,

    /// Overwrite the output if it exists
    #[arg(short, long)]
    force: bool,

    /// Do not read the output back after writing
    #[arg(long)]
    skip_verification: bool,

    /// Fail if the template has no certificate table
    #[arg(long)]
    require_signature: bool,

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
            eprintln!("Fatal: Unhandled panic in metapod-create");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    if env::args().nth(1).as_deref() == Some("--version") {
        println!("metapod-create {}", metapod::version::full_version());
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

    let options = CreateOptions {
        overwrite: args.force,
        skip_verification: args.skip_verification,
        require_signature: args.require_signature,
    };

    cli::create(
        &args.input,
        args.payload,
        args.payload_file,
        &args.output,
        options,
    )
}
