use std::path::Path;

use globset::{GlobBuilder, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::extract::{self, NA};

/// One row of the batch digest. A file that failed extraction still produces
/// a row; the error never aborts the rest of the scan.
#[derive(Clone, Debug, Serialize)]
pub struct FileDigest {
    pub path: String,
    pub url: String,
    pub status: String,
    pub time_taken: String,
    pub events: usize,
    pub root_cause: String,
    pub error: Option<String>,
}

pub fn scan(root: &str, file_glob: Option<&str>, recursive: bool, progress: bool) -> Vec<FileDigest> {
    let glob = file_glob.unwrap_or("fr*.xml");
    let mut gs = GlobSetBuilder::new();
    let g = GlobBuilder::new(glob).case_insensitive(true).build().unwrap();
    gs.add(g);
    let set = gs.build().unwrap();
    let wd = if recursive { WalkDir::new(root) } else { WalkDir::new(root).max_depth(1) };
    let pb = if progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    let mut out: Vec<FileDigest> = Vec::new();
    for de in wd.into_iter().filter_map(Result::ok) {
        let p = de.path();
        if !p.is_file() { continue; }
        let Some(name) = p.file_name() else { continue };
        if !set.is_match(name) { continue; }
        if let Some(ref pb) = pb {
            pb.tick();
            pb.set_message(format!("Analyzed {} traces", out.len() + 1));
        }
        out.push(digest_file(p));
    }
    if let Some(pb) = pb { pb.finish_and_clear(); }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

pub fn digest_file(p: &Path) -> FileDigest {
    let path = p.to_string_lossy().into_owned();
    let bytes = match std::fs::read(p) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("Read failed for {}: {}", path, e);
            return failed_digest(path, e.to_string());
        }
    };
    match extract::analyze(&bytes) {
        Ok(rep) => FileDigest {
            path,
            url: rep.summary.url.clone(),
            status: format!("{}.{}", rep.summary.status_code, rep.summary.sub_status_code),
            time_taken: rep.summary.time_taken.clone(),
            events: rep.timeline.len(),
            root_cause: rep.summary.root_cause.clone(),
            error: None,
        },
        Err(e) => {
            log::warn!("Extraction failed for {}: {}", path, e);
            failed_digest(path, e.to_string())
        }
    }
}

fn failed_digest(path: String, error: String) -> FileDigest {
    FileDigest {
        path,
        url: NA.to_string(),
        status: format!("{}.{}", NA, NA),
        time_taken: NA.to_string(),
        events: 0,
        root_cause: "Unknown".to_string(),
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let d = std::env::temp_dir().join(format!("frebdoctor-scan-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&d);
        std::fs::create_dir_all(&d).unwrap();
        d
    }

    #[test]
    fn scans_matching_files_and_recovers_per_document() {
        let d = temp_dir("mixed");
        std::fs::write(d.join("fr000002.xml"), "<failedRequest url=\"http://x/b\" statusCode=\"500\" subStatusCode=\"0\"><event time=\"1\"><name>A</name></event></failedRequest>").unwrap();
        std::fs::write(d.join("fr000001.xml"), "<failedRequest url=\"http://x/a\" statusCode=\"404\" subStatusCode=\"0\"/>").unwrap();
        std::fs::write(d.join("fr000003.xml"), "not xml").unwrap();
        std::fs::write(d.join("ignore.txt"), "x").unwrap();
        let digests = scan(&d.to_string_lossy(), None, false, false);
        assert_eq!(digests.len(), 3);
        assert!(digests[0].path.ends_with("fr000001.xml"));
        assert_eq!(digests[0].status, "404.0");
        assert_eq!(digests[0].root_cause, "File Not Found (Check physical path)");
        assert_eq!(digests[1].events, 1);
        assert_eq!(digests[1].root_cause, "Server Error (Review modules/logs)");
        assert!(digests[2].error.is_some());
        assert_eq!(digests[2].url, NA);
        let _ = std::fs::remove_dir_all(&d);
    }

    #[test]
    fn glob_is_case_insensitive_and_overridable() {
        let d = temp_dir("glob");
        std::fs::write(d.join("FR000004.XML"), "<failedRequest/>").unwrap();
        std::fs::write(d.join("trace.xml"), "<failedRequest/>").unwrap();
        assert_eq!(scan(&d.to_string_lossy(), None, false, false).len(), 1);
        assert_eq!(scan(&d.to_string_lossy(), Some("*.xml"), false, false).len(), 2);
        let _ = std::fs::remove_dir_all(&d);
    }

    #[test]
    fn non_recursive_skips_subdirectories() {
        let d = temp_dir("depth");
        std::fs::create_dir_all(d.join("sub")).unwrap();
        std::fs::write(d.join("sub").join("fr000005.xml"), "<failedRequest/>").unwrap();
        assert!(scan(&d.to_string_lossy(), None, false, false).is_empty());
        assert_eq!(scan(&d.to_string_lossy(), None, true, false).len(), 1);
        let _ = std::fs::remove_dir_all(&d);
    }
}
