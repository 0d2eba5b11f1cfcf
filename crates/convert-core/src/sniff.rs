//! Content-based file type detection
//!
//! Classification never trusts the file name. Uploads whose detected type
//! is on the blocklist are refused by the stager.

use std::io::Cursor;

pub const PDF: &str = "application/pdf";
pub const PNG: &str = "image/png";
pub const JPEG: &str = "image/jpeg";
pub const GIF: &str = "image/gif";
pub const ZIP: &str = "application/zip";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const TEXT: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Executable and script types refused regardless of extension
pub const BLOCKED_MIME_TYPES: &[&str] = &[
    "application/x-executable",
    "application/x-sh",
    "application/x-bat",
    "application/x-dosexec",
    "application/x-msdownload",
    "application/x-mach-binary",
];

pub fn is_blocked(mime: &str) -> bool {
    BLOCKED_MIME_TYPES.contains(&mime)
}

pub trait MimeSniffer: Send + Sync {
    fn classify(&self, bytes: &[u8]) -> String;
}

/// Magic-number classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl MimeSniffer for MagicSniffer {
    fn classify(&self, bytes: &[u8]) -> String {
        classify_magic(bytes).to_string()
    }
}

fn classify_magic(bytes: &[u8]) -> &'static str {
    const MACH_O: [[u8; 4]; 5] = [
        [0xFE, 0xED, 0xFA, 0xCE],
        [0xFE, 0xED, 0xFA, 0xCF],
        [0xCE, 0xFA, 0xED, 0xFE],
        [0xCF, 0xFA, 0xED, 0xFE],
        [0xCA, 0xFE, 0xBA, 0xBE],
    ];

    if bytes.starts_with(b"%PDF-") {
        return PDF;
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return PNG;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return JPEG;
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return GIF;
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return classify_zip(bytes);
    }
    if bytes.starts_with(b"\x7FELF") {
        return "application/x-executable";
    }
    if bytes.starts_with(b"MZ") {
        return "application/x-dosexec";
    }
    if MACH_O.iter().any(|magic| bytes.starts_with(magic)) {
        return "application/x-mach-binary";
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => classify_text(text),
        Err(_) => OCTET_STREAM,
    }
}

/// Refine a ZIP container to an OOXML type by its part names
fn classify_zip(bytes: &[u8]) -> &'static str {
    let Ok(archive) = zip::ZipArchive::new(Cursor::new(bytes)) else {
        return ZIP;
    };

    let mut names = archive.file_names();
    let found = names.find_map(|name| {
        if name.starts_with("word/") {
            Some(DOCX)
        } else if name.starts_with("ppt/") {
            Some(PPTX)
        } else if name.starts_with("xl/") {
            Some(XLSX)
        } else {
            None
        }
    });
    found.unwrap_or(ZIP)
}

fn classify_text(text: &str) -> &'static str {
    let trimmed = text.trim_start_matches('\u{FEFF}').trim_start();
    let first_line = trimmed.lines().next().unwrap_or("");

    if let Some(interpreter) = first_line.strip_prefix("#!") {
        let shell = interpreter.split_whitespace().any(|part| {
            let name = part.rsplit('/').next().unwrap_or(part);
            matches!(name, "sh" | "bash" | "zsh" | "dash" | "ksh")
        });
        if shell {
            return "application/x-sh";
        }
    }
    if first_line.to_ascii_lowercase().starts_with("@echo off") {
        return "application/x-bat";
    }
    TEXT
}
