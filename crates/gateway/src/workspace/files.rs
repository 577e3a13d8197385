//! Bootstrap file reading: sanitization, per-file caps, and checksum
//! verification.
//!
//! The file set is fixed. Each file is stripped of zero-width
//! characters, long base64 blobs are redacted, content is capped with a
//! truncation marker, and integrity is checked against
//! `CHECKSUMS.sha256` (one line `<hex-sha256>  <basename>`). A file
//! that fails its checksum is excluded from injection.

use std::collections::HashMap;
use std::path::PathBuf;

use regex::Regex;
use sha2::{Digest, Sha256};

/// The bootstrap file set, in canonical order.
pub const BOOTSTRAP_FILES: &[&str] = &[
    "IDENTITY.md",
    "SOUL.md",
    "AGENTS.md",
    "TOOLS.md",
    "USER.md",
    "HEARTBEAT.md",
    "BOOTSTRAP.md",
    "MEMORY.md",
];

pub const CHECKSUM_MANIFEST: &str = "CHECKSUMS.sha256";
pub const TRUNCATION_MARKER: &str = "\n\n[...truncated]";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Section
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One bootstrap file, post-processing.
#[derive(Debug, Clone)]
pub struct Section {
    pub filename: String,
    pub content: String,
    pub missing: bool,
    pub truncated: bool,
    /// `false` when the manifest lists the file and its digest differs.
    pub checksum_ok: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WorkspaceReader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WorkspaceReader {
    root: PathBuf,
    per_file_max_chars: usize,
    base64_blob: Regex,
}

impl WorkspaceReader {
    pub fn new(root: impl Into<PathBuf>, per_file_max_chars: usize) -> Self {
        Self {
            root: root.into(),
            per_file_max_chars,
            base64_blob: Regex::new(r"[A-Za-z0-9+/]{64,}={0,2}")
                .unwrap_or_else(|e| panic!("invalid builtin pattern: {e}")),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Read, sanitize, cap, and checksum-verify the whole file set, in
    /// canonical order.
    pub fn read_all(&self) -> Vec<Section> {
        let manifest = self.load_manifest();
        BOOTSTRAP_FILES
            .iter()
            .map(|filename| self.read_one(filename, &manifest))
            .collect()
    }

    fn read_one(&self, filename: &str, manifest: &HashMap<String, String>) -> Section {
        let path = self.root.join(filename);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                return Section {
                    filename: filename.to_string(),
                    content: String::new(),
                    missing: true,
                    truncated: false,
                    checksum_ok: true,
                };
            }
        };

        // Integrity check runs over the raw bytes, before sanitization.
        let checksum_ok = match manifest.get(filename) {
            Some(expected) => {
                let actual = hex::encode(Sha256::digest(raw.as_bytes()));
                let ok = actual.eq_ignore_ascii_case(expected);
                if !ok {
                    tracing::warn!(file = %filename, "bootstrap file failed checksum, excluding");
                }
                ok
            }
            None => true,
        };
        if !checksum_ok {
            return Section {
                filename: filename.to_string(),
                content: String::new(),
                missing: false,
                truncated: false,
                checksum_ok: false,
            };
        }

        let sanitized = self.sanitize(&raw);
        let (content, truncated) = truncate_chars(&sanitized, self.per_file_max_chars);

        Section {
            filename: filename.to_string(),
            content,
            missing: false,
            truncated,
            checksum_ok: true,
        }
    }

    /// Strip zero-width characters and redact long base64 runs.
    fn sanitize(&self, raw: &str) -> String {
        let stripped: String = raw
            .chars()
            .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
            .collect();
        self.base64_blob
            .replace_all(&stripped, "[base64 redacted]")
            .into_owned()
    }

    fn load_manifest(&self) -> HashMap<String, String> {
        let path = self.root.join(CHECKSUM_MANIFEST);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return HashMap::new();
        };
        let mut manifest = HashMap::new();
        for line in raw.lines() {
            let mut parts = line.split_whitespace();
            if let (Some(digest), Some(basename)) = (parts.next(), parts.next()) {
                manifest.insert(basename.to_string(), digest.to_string());
            }
        }
        manifest
    }
}

/// Cap at a UTF-8 boundary and append the truncation marker.
pub fn truncate_chars(content: &str, max_chars: usize) -> (String, bool) {
    if content.len() <= max_chars {
        return (content.to_string(), false);
    }
    let mut end = max_chars;
    while !content.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    (format!("{}{TRUNCATION_MARKER}", &content[..end]), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with(files: &[(&str, &str)]) -> (tempfile::TempDir, WorkspaceReader) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let reader = WorkspaceReader::new(dir.path(), 100);
        (dir, reader)
    }

    #[test]
    fn missing_files_are_marked_not_fatal() {
        let (_dir, reader) = workspace_with(&[("IDENTITY.md", "I am Orion.")]);
        let sections = reader.read_all();
        assert_eq!(sections.len(), BOOTSTRAP_FILES.len());
        assert!(!sections[0].missing);
        assert!(sections.iter().filter(|s| s.missing).count() >= 6);
    }

    #[test]
    fn zero_width_chars_are_stripped() {
        let (_dir, reader) =
            workspace_with(&[("IDENTITY.md", "he\u{200B}llo \u{FEFF}world")]);
        let sections = reader.read_all();
        assert_eq!(sections[0].content, "hello world");
    }

    #[test]
    fn base64_blobs_are_redacted() {
        let blob = "A".repeat(80);
        let content = format!("key material: {blob} end");
        let (_dir, reader) = workspace_with(&[("IDENTITY.md", content.as_str())]);
        let sections = reader.read_all();
        assert!(sections[0].content.contains("[base64 redacted]"));
        assert!(!sections[0].content.contains(&blob));
    }

    #[test]
    fn long_files_are_truncated_with_marker() {
        let long = "x".repeat(500);
        let (_dir, reader) = workspace_with(&[("IDENTITY.md", long.as_str())]);
        let sections = reader.read_all();
        assert!(sections[0].truncated);
        assert!(sections[0].content.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn checksum_mismatch_excludes_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IDENTITY.md"), "real content").unwrap();
        std::fs::write(
            dir.path().join(CHECKSUM_MANIFEST),
            format!("{}  IDENTITY.md\n", "0".repeat(64)),
        )
        .unwrap();
        let reader = WorkspaceReader::new(dir.path(), 100);
        let sections = reader.read_all();
        assert!(!sections[0].checksum_ok);
        assert!(sections[0].content.is_empty());
    }

    #[test]
    fn checksum_match_includes_file() {
        let dir = tempfile::tempdir().unwrap();
        let content = "verified content";
        std::fs::write(dir.path().join("IDENTITY.md"), content).unwrap();
        let digest = hex::encode(Sha256::digest(content.as_bytes()));
        std::fs::write(
            dir.path().join(CHECKSUM_MANIFEST),
            format!("{digest}  IDENTITY.md\n"),
        )
        .unwrap();
        let reader = WorkspaceReader::new(dir.path(), 100);
        let sections = reader.read_all();
        assert!(sections[0].checksum_ok);
        assert_eq!(sections[0].content, content);
    }
}
