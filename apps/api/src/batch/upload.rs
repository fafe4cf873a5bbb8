//! Turns uploaded résumé files into batch input. PDFs go through pdf-extract;
//! plain text and markdown are read as UTF-8.

use std::path::Path;

use thiserror::Error;

use crate::batch::job::ResumeInput;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type for '{0}' (expected .pdf, .txt or .md)")]
    UnsupportedType(String),

    #[error("Could not read text from '{file}': {reason}")]
    Unreadable { file: String, reason: String },
}

/// Candidate name derived from the file name: `jane_doe-cv.pdf` → "jane doe cv".
pub fn name_from_file(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn resume_from_file(file_name: &str, bytes: &[u8]) -> Result<ResumeInput, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let text = match extension.as_str() {
        "pdf" => pdf_extract::extract_text_from_mem(bytes).map_err(|e| UploadError::Unreadable {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?,
        "txt" | "md" => String::from_utf8(bytes.to_vec()).map_err(|e| UploadError::Unreadable {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?,
        _ => return Err(UploadError::UnsupportedType(file_name.to_string())),
    };

    Ok(ResumeInput {
        name: name_from_file(file_name),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_file_becomes_resume() {
        let resume = resume_from_file("jane_doe-cv.TXT", b"Closed $2M in ARR").unwrap();
        assert_eq!(resume.name, "jane doe cv");
        assert_eq!(resume.text, "Closed $2M in ARR");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        assert!(matches!(
            resume_from_file("photo.png", &[0x89, 0x50]),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_unreadable() {
        assert!(matches!(
            resume_from_file("notes.md", &[0xff, 0xfe, 0xfd]),
            Err(UploadError::Unreadable { .. })
        ));
    }
}
