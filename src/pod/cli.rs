//! CLI command handlers for metapod files

use anyhow::{Context, bail};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::{self, CreateOptions, InspectReport};
use crate::exit_codes::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS, exit_code_for};

/// Resolve the payload text from `--payload` or `--payload-file`
pub fn read_payload(inline: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    match (inline, file) {
        (Some(_), Some(_)) => bail!("--payload and --payload-file are mutually exclusive"),
        (Some(text), None) => Ok(text),
        (None, Some(path)) => {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read payload file {}", path.display()))?;
            String::from_utf8(bytes)
                .with_context(|| format!("Payload file {} is not valid UTF-8", path.display()))
        }
        (None, None) => bail!("one of --payload or --payload-file is required"),
    }
}

/// Embed a payload and report what was written
pub fn create(
    input: &Path,
    payload: Option<String>,
    payload_file: Option<PathBuf>,
    output: &Path,
    options: CreateOptions,
) -> i32 {
    let payload = match read_payload(payload, payload_file.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return EXIT_INVALID_ARGS;
        }
    };

    match api::create_file(input, &payload, output, options) {
        Ok(report) => {
            println!("✅ Created {}", report.output.display());
            println!("  Payload: {} bytes", payload.len());
            println!("  Block offset: {:#x}", report.block_offset);
            println!("  Output size: {} bytes", report.output_size);
            if report.signed {
                println!("  Signed region: {}", report.signed_region_digest);
            } else {
                println!("  Signed region: none (template is unsigned)");
            }
            if !report.verified {
                println!("  Verified: skipped");
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Create error: {e}");
            exit_code_for(&e)
        }
    }
}

/// Print the most recent payload to stdout
pub fn show_payload(input: &Path) -> i32 {
    log::trace!("show_payload starting for: {:?}", input);
    match api::open_file(input) {
        Ok(payload) => {
            println!("{payload}");
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

/// Show file information, as text or JSON
pub fn show_info(input: &Path, json: bool) -> i32 {
    let report = match api::inspect_file(input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if json {
        return match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                println!("{text}");
                EXIT_SUCCESS
            }
            Err(e) => {
                eprintln!("Error: Failed to encode report: {e}");
                EXIT_ERROR
            }
        };
    }

    print_report(&report);
    EXIT_SUCCESS
}

fn print_report(report: &InspectReport) {
    println!("📦 File Information:");
    println!("  Path: {}", report.path.display());
    println!("  Size: {} bytes", report.file_size);
    println!();

    println!("🔧 Image:");
    match (&report.image, &report.image_error) {
        (Some(image), _) => {
            let kind = if image.dll { "DLL" } else { "executable" };
            println!("  Format: {} ({kind}, machine {})", image.format, image.machine);
            println!("  Sections: {}", image.sections.join(", "));
            println!("  Declared size: {} bytes", image.declared_file_size);
        }
        (None, Some(err)) => println!("  Not a PE image: {} (code {})", err.message, err.code),
        (None, None) => println!("  Not a PE image"),
    }
    println!();

    println!("🔏 Signature:");
    match &report.certificate {
        Some(cert) => {
            println!("  Certificate table: {:#x} ({} bytes)", cert.offset, cert.size);
            println!(
                "  Authenticode: {}",
                if cert.authenticode { "✓" } else { "✗" }
            );
            if let Some(end) = report.signed_region_end {
                println!("  Signed region end: {end:#x}");
            }
        }
        None => println!("  Unsigned"),
    }
    if let Some(digest) = &report.signed_region_digest {
        println!("  Region digest: {digest}");
    }
    println!("  Overlay: {} bytes", report.overlay_size);
    println!();

    println!("📊 Payload Blocks: {}", report.blocks.len());
    for block in &report.blocks {
        println!(
            "  - {:#x}: v{}, {} bytes, crc {}",
            block.offset, block.version, block.length, block.checksum
        );
    }
    println!();

    match (&report.payload, &report.error) {
        (Some(payload), _) => println!("📝 Payload: {payload}"),
        (None, Some(err)) => println!("✗ {} (code {})", err.message, err.code),
        (None, None) => {}
    }
}
