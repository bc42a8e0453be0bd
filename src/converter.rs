/*!
 * External PDF conversion through LibreOffice.
 *
 * PDF input is not parsed directly; it is converted out of process to a DOCX
 * document which then goes through the regular DOCX segmentation path. The
 * converter executable is looked up in the usual install locations first and
 * on PATH second; a missing converter is a reported condition, not a crash.
 */

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, error};
use once_cell::sync::Lazy;
use tempfile::TempDir;
use tokio::process::Command;

use crate::errors::ConversionError;

/// Bound on the whole conversion run; large PDFs are slow
pub const RUN_TIMEOUT_SECS: u64 = 300;

/// Well-known install locations tried before the PATH lookup
static KNOWN_INSTALL_PATHS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    if cfg!(windows) {
        vec![
            PathBuf::from("C:/Program Files/LibreOffice/program/soffice.exe"),
            PathBuf::from("C:/Program Files (x86)/LibreOffice/program/soffice.exe"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        )]
    } else {
        Vec::new()
    }
});

/// Names probed during the PATH lookup
const EXECUTABLE_NAMES: &[&str] = if cfg!(windows) {
    &["soffice.exe", "soffice"]
} else {
    &["soffice", "libreoffice"]
};

/// A converted document together with its scoped temporary directory.
///
/// The directory and the intermediate DOCX inside it are removed when this
/// value is dropped, on success and failure paths alike.
pub struct ConvertedDocument {
    _dir: TempDir,
    docx_path: PathBuf,
}

impl ConvertedDocument {
    /// Path of the intermediate DOCX file
    pub fn docx_path(&self) -> &Path {
        &self.docx_path
    }
}

/// Locate the LibreOffice executable, preferring known install paths
pub fn find_converter() -> Option<PathBuf> {
    for candidate in KNOWN_INSTALL_PATHS.iter() {
        if candidate.is_file() {
            return Some(candidate.clone());
        }
    }

    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        for name in EXECUTABLE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Whether a converter executable is available on this system
pub fn is_converter_available() -> bool {
    find_converter().is_some()
}

/// Convert a PDF to DOCX in a scoped temporary directory.
///
/// Returns the converted document together with its directory guard; dropping
/// the result removes the intermediate artifacts.
pub async fn convert_pdf_to_docx(pdf_path: &Path) -> Result<ConvertedDocument, ConversionError> {
    let soffice = find_converter().ok_or(ConversionError::ConverterNotFound)?;

    let temp_dir = TempDir::new()
        .map_err(|e| ConversionError::Failed(format!("could not create temporary directory: {}", e)))?;

    debug!(
        "Converting {} via {} into {}",
        pdf_path.display(),
        soffice.display(),
        temp_dir.path().display()
    );

    let mut command = Command::new(&soffice);
    command
        .arg("--headless")
        .arg("--convert-to")
        .arg("docx")
        .arg("--outdir")
        .arg(temp_dir.path())
        .arg(pdf_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| ConversionError::Failed(format!("failed to start converter: {}", e)))?;

    let output = match tokio::time::timeout(
        Duration::from_secs(RUN_TIMEOUT_SECS),
        child.wait_with_output(),
    )
    .await
    {
        Ok(result) => result
            .map_err(|e| ConversionError::Failed(format!("converter did not finish: {}", e)))?,
        Err(_) => {
            // kill_on_drop reaps the hung process
            return Err(ConversionError::Timeout(RUN_TIMEOUT_SECS));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Converter exited with {}: {}", output.status, stderr);
        return Err(ConversionError::Failed(stderr.into_owned()));
    }

    // LibreOffice names the output after the input's base name
    let base_name = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let docx_path = temp_dir.path().join(format!("{}.docx", base_name));

    if !docx_path.exists() {
        return Err(ConversionError::Failed(
            "conversion produced no output file".to_string(),
        ));
    }

    Ok(ConvertedDocument {
        _dir: temp_dir,
        docx_path,
    })
}
