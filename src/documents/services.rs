use uuid::Uuid;

use crate::{config::UploadConfig, error::ApiError};

/// Lowercased extension without the dot, if any.
pub fn file_extension(name: &str) -> Option<String> {
    let ext = name.rsplit_once('.')?.1;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Gate for the upload pipeline: extension against the allow-list, size
/// against the ceiling. Runs before anything is written anywhere. Returns the
/// normalized extension on success.
pub fn validate_upload(
    config: &UploadConfig,
    original_name: &str,
    size: usize,
) -> Result<String, ApiError> {
    let ext = file_extension(original_name)
        .ok_or_else(|| ApiError::validation("File has no extension"))?;

    if !config.allowed_types.iter().any(|t| t == &ext) {
        return Err(ApiError::validation(format!(
            "File type .{ext} is not supported"
        )));
    }
    if size > config.max_file_size {
        return Err(ApiError::validation(format!(
            "File exceeds the maximum size of {} bytes",
            config.max_file_size
        )));
    }
    Ok(ext)
}

/// Collision-resistant name the file is stored under on disk.
pub fn stored_file_name(ext: &str) -> String {
    format!("{}.{ext}", Uuid::new_v4())
}

pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UploadConfig {
        UploadConfig {
            dir: "uploads".into(),
            allowed_types: vec!["pdf".into(), "docx".into(), "txt".into()],
            max_file_size: 1000,
        }
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Report.PDF"), Some("pdf".into()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".into()));
        assert_eq!(file_extension("no-extension"), None);
        assert_eq!(file_extension("trailing-dot."), None);
    }

    #[test]
    fn accepts_allowed_file() {
        assert_eq!(validate_upload(&config(), "notes.pdf", 500).unwrap(), "pdf");
    }

    #[test]
    fn rejects_disallowed_extension() {
        let err = validate_upload(&config(), "malware.exe", 10).unwrap_err();
        assert!(err.to_string().contains(".exe"));
    }

    #[test]
    fn rejects_oversized_file() {
        let err = validate_upload(&config(), "big.pdf", 1001).unwrap_err();
        assert!(err.to_string().contains("maximum size"));
        // exactly at the ceiling is fine
        assert!(validate_upload(&config(), "fits.pdf", 1000).is_ok());
    }

    #[test]
    fn stored_names_are_unique_and_keep_the_extension() {
        let a = stored_file_name("pdf");
        let b = stored_file_name("pdf");
        assert_ne!(a, b);
        assert!(a.ends_with(".pdf"));
        assert!(!a.contains('/'));
    }

    #[test]
    fn keywords_are_trimmed_and_deduped_of_blanks() {
        assert_eq!(
            parse_keywords(" rust, web , ,backend,"),
            vec!["rust", "web", "backend"]
        );
        assert!(parse_keywords("").is_empty());
    }

    #[test]
    fn content_types_for_known_extensions() {
        assert_eq!(content_type_for("pdf"), "application/pdf");
        assert_eq!(content_type_for("txt"), "text/plain");
        assert_eq!(content_type_for("zzz"), "application/octet-stream");
    }
}
