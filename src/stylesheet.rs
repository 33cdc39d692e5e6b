use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Logical name of the Microsoft-supplied FREB style sheet.
pub const DEFAULT_STYLESHEET: &str = "freb.xsl";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("XSLT engine not found: install xsltproc or skip --freb-html")]
    EngineMissing,
    #[error("XSLT transformation failed ({status}): {stderr}")]
    EngineFailed { status: String, stderr: String },
    #[error("XSLT engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves the style sheet: an explicit path wins, then `freb.xsl` beside the
/// input document, then `freb.xsl` in the working directory. Absence is not an
/// error; the caller proceeds in extraction-only mode.
pub fn locate_stylesheet(explicit: Option<&Path>, input_dir: &Path) -> Option<PathBuf> {
    if let Some(p) = explicit {
        if p.exists() { return Some(p.to_path_buf()); }
        log::warn!("Stylesheet not found: {}", p.to_string_lossy());
        return None;
    }
    let beside = input_dir.join(DEFAULT_STYLESHEET);
    if beside.exists() { return Some(beside); }
    let cwd = PathBuf::from(DEFAULT_STYLESHEET);
    if cwd.exists() { return Some(cwd); }
    None
}

/// Runs the external engine over the raw document and style sheet and returns
/// the HTML it produced. The engine is opaque; only its exit status and
/// streams are interpreted.
pub fn transform(xml_path: &Path, xsl_path: &Path) -> Result<String, TransformError> {
    let out = match Command::new("xsltproc").arg(xsl_path).arg(xml_path).output() {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(TransformError::EngineMissing),
        Err(e) => return Err(TransformError::Io(e)),
    };
    if !out.status.success() {
        return Err(TransformError::EngineFailed {
            status: out.status.to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let d = std::env::temp_dir().join(format!("frebdoctor-test-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&d);
        std::fs::create_dir_all(&d).unwrap();
        d
    }

    #[test]
    fn explicit_path_wins_when_present() {
        let d = temp_dir("explicit");
        let xsl = d.join("custom.xsl");
        std::fs::write(&xsl, "<xsl/>").unwrap();
        assert_eq!(locate_stylesheet(Some(&xsl), &d).unwrap(), xsl);
        let _ = std::fs::remove_dir_all(&d);
    }

    #[test]
    fn missing_explicit_path_yields_none() {
        let d = temp_dir("missing");
        assert!(locate_stylesheet(Some(&d.join("nope.xsl")), &d).is_none());
        let _ = std::fs::remove_dir_all(&d);
    }

    #[test]
    fn falls_back_to_sheet_beside_input() {
        let d = temp_dir("beside");
        let xsl = d.join(DEFAULT_STYLESHEET);
        std::fs::write(&xsl, "<xsl/>").unwrap();
        assert_eq!(locate_stylesheet(None, &d).unwrap(), xsl);
        let _ = std::fs::remove_dir_all(&d);
    }
}
