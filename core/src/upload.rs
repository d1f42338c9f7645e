//! Multipart file uploads.
//!
//! A [`FileUpload`] names a local file. [`FileUpload::to_form`] reads it into
//! a `multipart/form-data` body with two parts: `file_name` carrying the bare
//! file name, and `file_content` carrying the bytes with a MIME type guessed
//! from the extension.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};

use crate::error::{ApiError, Result};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a file name, by extension.
pub fn mime_from_extension(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return OCTET_STREAM;
    };
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "xml" => "application/xml",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "rtf" => "application/rtf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => OCTET_STREAM,
    }
}

/// One `form-data` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// The boundary is derived from the part contents so it cannot occur
    /// inside them.
    pub fn new(parts: Vec<FormPart>) -> Self {
        let mut hasher = Sha256::new();
        for part in &parts {
            hasher.update(part.name.as_bytes());
            hasher.update(&part.data);
        }
        let boundary = format!("tass-core-{}", &hex::encode(hasher.finalize())[..32]);
        Self { boundary, parts }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", quote(&part.name));
            if let Some(file_name) = &part.file_name {
                disposition.push_str(&format!("; filename=\"{}\"", quote(file_name)));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A local file to send to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    path: PathBuf,
}

impl FileUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Result<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::InvalidArgument(format!("{} has no file name", self.path.display())))
    }

    pub fn mime_type(&self) -> &'static str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(OCTET_STREAM, mime_from_extension)
    }

    /// Reads the file into its upload form.
    pub fn to_form(&self) -> Result<MultipartForm> {
        let file_name = self.file_name()?;
        let data = fs::read(&self.path)?;
        Ok(MultipartForm::new(vec![
            FormPart {
                name: "file_name".to_string(),
                file_name: None,
                content_type: None,
                data: file_name.clone().into_bytes(),
            },
            FormPart {
                name: "file_content".to_string(),
                file_name: Some(file_name),
                content_type: Some(self.mime_type().to_string()),
                data,
            },
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_is_guessed_from_extension() {
        assert_eq!(mime_from_extension("report.PDF"), "application/pdf");
        assert_eq!(mime_from_extension("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_from_extension("notes"), OCTET_STREAM);
        assert_eq!(mime_from_extension("archive.7z"), OCTET_STREAM);
        assert_eq!(FileUpload::new("/tmp/x/Term 1.docx").mime_type(), mime_from_extension("a.docx"));
    }

    #[test]
    fn form_carries_name_and_content_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merit.txt");
        fs::write(&path, b"Well done").unwrap();

        let form = FileUpload::new(&path).to_form().unwrap();
        assert_eq!(form.parts().len(), 2);
        assert_eq!(form.parts()[0].name, "file_name");
        assert_eq!(form.parts()[0].data, b"merit.txt");
        assert_eq!(form.parts()[1].file_name.as_deref(), Some("merit.txt"));
        assert_eq!(form.parts()[1].content_type.as_deref(), Some("text/plain"));

        let body = String::from_utf8(form.encode()).unwrap();
        let b = form.boundary();
        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file_name\"\r\n\r\nmerit.txt\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file_content\"; filename=\"merit.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nWell done\r\n--{b}--\r\n"
        );
        assert_eq!(body, expected);
        assert_eq!(form.content_type(), format!("multipart/form-data; boundary={b}"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = FileUpload::new("/nonexistent/upload.pdf").to_form().unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let form = MultipartForm::new(vec![FormPart {
            name: "file_content".to_string(),
            file_name: Some("a\"b.txt".to_string()),
            content_type: None,
            data: Vec::new(),
        }]);
        let body = String::from_utf8(form.encode()).unwrap();
        assert!(body.contains("filename=\"a\\\"b.txt\""));
    }
}
