//! High-level API for metapod file operations
//!
//! The engine in [`crate::pod`] works on byte buffers only. This module reads and
//! writes the files around it, logs what happens, and keeps filesystem failures
//! apart from engine failures.

use log::{debug, info, trace, warn};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::exceptions::{MetapodError, Result};
use crate::pod::checksums::region_digest;
use crate::pod::extractor;
use crate::pod::{self, EngineError, PortableExecutableImage};

/// Options for creating a metapod file
#[derive(Debug, Default, Clone)]
pub struct CreateOptions {
    /// Replace `output` if it already exists
    pub overwrite: bool,
    /// Skip reading the output back after embedding
    pub skip_verification: bool,
    /// Refuse templates without a certificate table
    pub require_signature: bool,
}

/// What `create_file` wrote
#[derive(Debug, Clone, Serialize)]
pub struct EmbedReport {
    pub output: PathBuf,
    pub template_size: usize,
    pub output_size: usize,
    pub block_offset: usize,
    pub block_size: usize,
    pub signed_region_end: usize,
    pub signed_region_digest: String,
    pub signed: bool,
    pub verified: bool,
}

/// Code and message for a failure surfaced in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub code: i32,
    pub message: String,
}

impl From<EngineError> for ErrorInfo {
    fn from(err: EngineError) -> Self {
        ErrorInfo {
            code: err.code(),
            message: err.message().to_string(),
        }
    }
}

/// PE header summary
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub format: String,
    pub machine: String,
    pub dll: bool,
    pub executable: bool,
    pub sections: Vec<String>,
    pub size_of_headers: u32,
    pub declared_file_size: usize,
}

/// Certificate table summary
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub offset: u32,
    pub size: u32,
    pub authenticode: bool,
    pub at_end_of_file: bool,
}

/// One payload block found in the file
#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    pub offset: usize,
    pub version: u16,
    pub length: u32,
    pub checksum: String,
}

/// Everything `inspect_file` learned about a file
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub file_size: usize,
    pub image: Option<ImageSummary>,
    pub image_error: Option<ErrorInfo>,
    pub certificate: Option<CertificateSummary>,
    pub signed_region_end: Option<usize>,
    pub signed_region_digest: Option<String>,
    pub overlay_size: usize,
    pub scan_start: usize,
    pub blocks: Vec<BlockSummary>,
    pub payload: Option<String>,
    pub error: Option<ErrorInfo>,
}

fn read_existing(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(MetapodError::FileNotFound(path.to_path_buf()));
    }
    trace!("Reading {}", path.display());
    Ok(fs::read(path)?)
}

/// Embed `payload` into the template at `input` and write the result to `output`.
///
/// The output is written to a temporary file beside `output`, synced, then
/// renamed into place, so a failed run never leaves a partial file behind.
pub fn create_file(
    input: &Path,
    payload: &str,
    output: &Path,
    options: CreateOptions,
) -> Result<EmbedReport> {
    debug!(
        "Creating {} from {} ({} byte payload)",
        output.display(),
        input.display(),
        payload.len()
    );

    let template = read_existing(input)?;
    if output.exists() && !options.overwrite {
        return Err(MetapodError::OutputExists(output.to_path_buf()));
    }

    let result = pod::embed(&template, payload)?;
    let signed = result.is_signed();
    if !signed {
        if options.require_signature {
            return Err(MetapodError::Unsigned(input.to_path_buf()));
        }
        warn!(
            "{} has no certificate table; output will not carry a signature",
            input.display()
        );
    }

    let signed_region_end = result.signed_region_end();
    trace!(
        "Block of {} bytes at offset {:#x}",
        result.block_len(),
        result.block_offset()
    );

    let verified = if options.skip_verification {
        debug!("Skipping read-back verification");
        false
    } else {
        verify_output(&template, result.bytes(), payload, signed_region_end)?;
        true
    };

    write_atomically(input, output, result.bytes(), options.overwrite)?;

    let report = EmbedReport {
        output: output.to_path_buf(),
        template_size: template.len(),
        output_size: result.bytes().len(),
        block_offset: result.block_offset(),
        block_size: result.block_len(),
        signed_region_end,
        signed_region_digest: region_digest(&template[..signed_region_end]),
        signed,
        verified,
    };
    info!(
        "Wrote {} ({} bytes, block at {:#x})",
        output.display(),
        report.output_size,
        report.block_offset
    );
    Ok(report)
}

fn verify_output(template: &[u8], output: &[u8], payload: &str, signed_end: usize) -> Result<()> {
    if output.get(..signed_end) != template.get(..signed_end) {
        return Err(MetapodError::VerificationFailed(
            "signed region changed during embedding".to_string(),
        ));
    }
    match pod::open(output) {
        Ok(recovered) if recovered == payload => {
            debug!("Read-back verification passed");
            Ok(())
        }
        Ok(_) => Err(MetapodError::VerificationFailed(
            "recovered payload differs from the embedded one".to_string(),
        )),
        Err(err) => Err(MetapodError::VerificationFailed(format!(
            "payload could not be read back: {err}"
        ))),
    }
}

fn write_atomically(input: &Path, output: &Path, bytes: &[u8], overwrite: bool) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;

    // Keep the template's mode so executables stay executable
    if let Ok(metadata) = fs::metadata(input) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    if overwrite {
        temp.persist(output).map_err(|e| MetapodError::IoError(e.error))?;
    } else {
        temp.persist_noclobber(output).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                MetapodError::OutputExists(output.to_path_buf())
            } else {
                MetapodError::IoError(e.error)
            }
        })?;
    }
    Ok(())
}

/// Recover the most recently embedded payload from the file at `input`
pub fn open_file(input: &Path) -> Result<String> {
    let data = read_existing(input)?;
    debug!("Opening {} ({} bytes)", input.display(), data.len());
    let payload = pod::open(&data)?;
    trace!("Recovered {} byte payload", payload.len());
    Ok(payload)
}

/// Describe the file at `input`: PE summary, signature layout and every block
pub fn inspect_file(input: &Path) -> Result<InspectReport> {
    let data = read_existing(input)?;
    Ok(inspect_bytes(input, &data))
}

fn inspect_bytes(path: &Path, data: &[u8]) -> InspectReport {
    let mut report = InspectReport {
        path: path.to_path_buf(),
        file_size: data.len(),
        image: None,
        image_error: None,
        certificate: None,
        signed_region_end: None,
        signed_region_digest: None,
        overlay_size: 0,
        scan_start: 0,
        blocks: Vec::new(),
        payload: None,
        error: None,
    };

    match PortableExecutableImage::parse(data) {
        Ok(image) => {
            report.image = Some(ImageSummary {
                format: image.format().to_string(),
                machine: format!("{:#06x}", image.machine()),
                dll: image.is_dll(),
                executable: image.is_executable(),
                sections: image.sections().iter().map(|s| s.name.clone()).collect(),
                size_of_headers: image.size_of_headers(),
                declared_file_size: image.declared_file_size(),
            });
            report.certificate = image.certificate().map(|table| CertificateSummary {
                offset: table.offset,
                size: table.size,
                authenticode: table.header.is_some_and(|h| h.is_authenticode()),
                at_end_of_file: image.certificate_at_end_of_file(),
            });
            report.signed_region_end = Some(image.signed_region_end());
            report.signed_region_digest = Some(region_digest(image.signed_region()));
            report.overlay_size = data.len().saturating_sub(image.scan_start());
        }
        Err(err) => {
            debug!("{} does not parse as PE: {err}", path.display());
            report.image_error = Some(err.into());
        }
    }

    let scan = extractor::scan(data);
    report.scan_start = scan.start;
    report.blocks = scan
        .blocks
        .iter()
        .map(|located| BlockSummary {
            offset: located.offset,
            version: located.block.version,
            length: located.block.length(),
            checksum: format!("{:08x}", located.block.checksum),
        })
        .collect();

    match pod::open(data) {
        Ok(payload) => report.payload = Some(payload),
        Err(err) => report.error = Some(err.into()),
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::fixtures::PeBuilder;
    use tempfile::TempDir;

    fn write_template(dir: &TempDir, name: &str, signed: bool) -> PathBuf {
        let mut builder = PeBuilder::new().section(vec![0x90; 0x200]);
        if signed {
            builder = builder.certificate(vec![0x30; 48]);
        }
        let path = dir.path().join(name);
        fs::write(&path, builder.build()).unwrap();
        path
    }

    #[test]
    fn test_create_then_open() {
        let dir = TempDir::new().unwrap();
        let input = write_template(&dir, "app.exe", true);
        let output = dir.path().join("app-tagged.exe");

        let report =
            create_file(&input, "hello-metapod", &output, CreateOptions::default()).unwrap();
        assert!(report.signed);
        assert!(report.verified);
        assert_eq!(report.block_size, 18 + 13);
        assert!(report.signed_region_digest.starts_with("sha256:"));

        assert_eq!(open_file(&output).unwrap(), "hello-metapod");
        // Template is untouched
        assert_eq!(open_file(&input).unwrap_err().engine_code(), Some(1050));
    }

    #[test]
    fn test_signed_prefix_preserved_on_disk() {
        let dir = TempDir::new().unwrap();
        let input = write_template(&dir, "app.exe", true);
        let output = dir.path().join("out.exe");
        let report = create_file(&input, "channel=beta", &output, CreateOptions::default()).unwrap();

        let template = fs::read(&input).unwrap();
        let written = fs::read(&output).unwrap();
        assert_eq!(written.len(), report.output_size);
        assert_eq!(
            &written[..report.signed_region_end],
            &template[..report.signed_region_end]
        );
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = create_file(
            &dir.path().join("absent.exe"),
            "x",
            &dir.path().join("out.exe"),
            CreateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MetapodError::FileNotFound(_)));

        let err = open_file(&dir.path().join("absent.exe")).unwrap_err();
        assert!(matches!(err, MetapodError::FileNotFound(_)));
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let input = write_template(&dir, "app.exe", true);
        let output = dir.path().join("out.exe");
        fs::write(&output, b"keep me").unwrap();

        let err = create_file(&input, "x", &output, CreateOptions::default()).unwrap_err();
        assert!(matches!(err, MetapodError::OutputExists(_)));
        assert_eq!(fs::read(&output).unwrap(), b"keep me");

        let options = CreateOptions {
            overwrite: true,
            ..CreateOptions::default()
        };
        create_file(&input, "replaced", &output, options).unwrap();
        assert_eq!(open_file(&output).unwrap(), "replaced");
    }

    #[test]
    fn test_require_signature() {
        let dir = TempDir::new().unwrap();
        let input = write_template(&dir, "plain.exe", false);
        let output = dir.path().join("out.exe");
        let options = CreateOptions {
            require_signature: true,
            ..CreateOptions::default()
        };

        let err = create_file(&input, "x", &output, options).unwrap_err();
        assert!(matches!(err, MetapodError::Unsigned(_)));
        assert!(!output.exists());

        let report = create_file(&input, "x", &output, CreateOptions::default()).unwrap();
        assert!(!report.signed);
        assert_eq!(open_file(&output).unwrap(), "x");
    }

    #[test]
    fn test_engine_errors_pass_through() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.txt");
        fs::write(&input, b"plain text, no headers").unwrap();
        let output = dir.path().join("out.exe");

        let err = create_file(&input, "x", &output, CreateOptions::default()).unwrap_err();
        assert_eq!(err.engine_code(), Some(1025));

        let input = write_template(&dir, "app.exe", true);
        let err = create_file(&input, "  \n", &output, CreateOptions::default()).unwrap_err();
        assert_eq!(err.engine_code(), Some(1060));
        assert!(!output.exists());
    }

    #[test]
    fn test_errors_match_engine_order() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.exe");
        let not_pe = dir.path().join("notes.txt");
        fs::write(&not_pe, b"plain text, no headers").unwrap();
        let empty = dir.path().join("empty.exe");
        fs::write(&empty, b"").unwrap();

        for (input, payload) in [(&not_pe, " "), (&not_pe, "ok"), (&empty, ""), (&empty, "ok")] {
            let template = fs::read(input).unwrap();
            let engine = pod::create(&template, payload).unwrap_err();
            let err = create_file(input, payload, &output, CreateOptions::default()).unwrap_err();
            assert_eq!(err.engine_code(), Some(engine.code()), "{}", input.display());
        }

        // Payload problems are reported before a missing signature
        let unsigned = write_template(&dir, "plain.exe", false);
        let options = CreateOptions {
            require_signature: true,
            ..CreateOptions::default()
        };
        let err = create_file(&unsigned, "", &output, options).unwrap_err();
        assert_eq!(err.engine_code(), Some(1060));
    }

    #[test]
    fn test_inspect_reports_blocks_and_payload() {
        let dir = TempDir::new().unwrap();
        let input = write_template(&dir, "app.exe", true);
        let first = dir.path().join("v1.exe");
        let second = dir.path().join("v2.exe");
        create_file(&input, "v1", &first, CreateOptions::default()).unwrap();
        create_file(&first, "v2", &second, CreateOptions::default()).unwrap();

        let report = inspect_file(&second).unwrap();
        assert_eq!(report.blocks.len(), 2);
        assert_eq!(report.payload.as_deref(), Some("v2"));
        assert!(report.error.is_none());
        let certificate = report.certificate.as_ref().unwrap();
        assert!(certificate.authenticode);
        assert!(!certificate.at_end_of_file);
        assert_eq!(report.overlay_size, 2 * 18 + 4);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["image"]["format"], "PE32");
        assert_eq!(json["blocks"][1]["length"], 2);
    }

    #[test]
    fn test_inspect_without_payload() {
        let dir = TempDir::new().unwrap();
        let input = write_template(&dir, "app.exe", false);
        let report = inspect_file(&input).unwrap();

        assert!(report.payload.is_none());
        assert_eq!(report.error, Some(ErrorInfo::from(EngineError::NoPayloadFound)));
        assert!(report.certificate.is_none());
        assert!(report.blocks.is_empty());
    }
}
