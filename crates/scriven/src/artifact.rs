//! Persisted transcript artifact format.
//!
//! Artifacts are plain markdown with a fixed header/body split:
//!
//! ```text
//! # Transcript: <source-stem>
//!
//! **Source:** <original filename>
//!
//! **Timestamps:** Enabled
//!
//! **Enhanced:** Yes (<engine name>)
//!
//! ## Content
//!
//! <body text>
//! ```
//!
//! Readers locate the literal `## Content` marker line and take everything
//! after it as the body; the header is metadata and must never be fed back
//! into further processing.

use std::path::Path;

use crate::error::StorageError;

/// The marker line separating artifact metadata from the body.
pub const CONTENT_MARKER: &str = "## Content";

/// Artifact header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactMeta {
    /// Original source filename (the audio file for transcripts).
    pub source: String,
    /// Whether timestamps were requested for the transcription.
    pub timestamps: bool,
    /// Name of the enhancement engine, for enhanced artifacts.
    pub enhanced_by: Option<String>,
}

impl ArtifactMeta {
    fn title(&self) -> &'static str {
        if self.enhanced_by.is_some() {
            "Enhanced Transcript"
        } else {
            "Transcript"
        }
    }
}

/// A parsed artifact: header fields plus the body text.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub meta: ArtifactMeta,
    pub body: String,
}

/// Derives the artifact filename for a transcription job: `<stem>_<id>.md`.
pub fn transcript_filename(input: &Path, job_id: i64) -> String {
    format!("{}_{}.md", stem_of(input), job_id)
}

/// Derives the artifact filename for an enhanced transcript:
/// `<stem>_<id>_enhanced.md`.
pub fn enhanced_filename(input: &Path, job_id: i64) -> String {
    format!("{}_{}_enhanced.md", stem_of(input), job_id)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Writes an artifact file. Filenames are derived per job id, so no two
/// jobs ever write the same path.
pub fn write(path: &Path, meta: &ArtifactMeta, body: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut content = String::new();
    content.push_str(&format!(
        "# {}: {}\n\n",
        meta.title(),
        stem_of(Path::new(&meta.source))
    ));
    content.push_str(&format!("**Source:** {}\n\n", meta.source));
    if meta.timestamps {
        content.push_str("**Timestamps:** Enabled\n\n");
    }
    if let Some(ref engine) = meta.enhanced_by {
        content.push_str(&format!("**Enhanced:** Yes ({})\n\n", engine));
    }
    content.push_str(CONTENT_MARKER);
    content.push_str("\n\n");
    content.push_str(body);

    std::fs::write(path, content).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads and parses an artifact file.
pub fn read(path: &Path) -> Result<Artifact, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse(&content))
}

/// Parses artifact content into header fields and body.
///
/// Header parsing is lenient: missing fields fall back to defaults, and a
/// missing `## Content` marker yields an empty body rather than treating
/// the header as transcript text.
pub fn parse(content: &str) -> Artifact {
    let mut source = String::new();
    let mut timestamps = false;
    let mut enhanced_by = None;

    for line in content.lines() {
        if line.starts_with(CONTENT_MARKER) {
            break;
        }
        if let Some(rest) = line.strip_prefix("**Source:**") {
            source = rest.trim().to_string();
        } else if line.starts_with("**Timestamps:**") {
            timestamps = line.contains("Enabled");
        } else if let Some(rest) = line.strip_prefix("**Enhanced:**") {
            let rest = rest.trim();
            enhanced_by = rest
                .find('(')
                .and_then(|open| rest[open..].find(')').map(|close| (open, open + close)))
                .map(|(open, close)| rest[open + 1..close].to_string());
        }
    }

    Artifact {
        meta: ArtifactMeta {
            source,
            timestamps,
            enhanced_by,
        },
        body: extract_body(content).to_string(),
    }
}

/// Returns the body text after the `## Content` marker line, trimmed.
/// Returns an empty string if the marker is absent.
pub fn extract_body(content: &str) -> &str {
    for (offset, line) in line_offsets(content) {
        if line.starts_with(CONTENT_MARKER) {
            let after = offset + line.len();
            return content[after..].trim();
        }
    }
    ""
}

fn line_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line.trim_end_matches(['\n', '\r'])))
    })
}

/// Removes an artifact file if it exists.
pub fn remove(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::RemoveFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
