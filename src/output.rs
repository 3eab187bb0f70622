//! Presentation of the AI section: the divider on stdout and the optional output file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;

const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";
const RULE: &str = "────────────────────";

/// Separator printed between the passed-through input and the AI section
pub fn divider(title: &str, is_tty: bool) -> String {
    if is_tty {
        format!("\n\n{GRAY}{RULE} {title} {RULE}{RESET}\n")
    } else {
        format!("\n\n{title}\n{}\n", "-".repeat(title.chars().count()))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Metadata written above the model text in the output file
#[derive(Debug, Clone)]
pub struct SectionHeader<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub mode: &'a str,
    /// The raw window, before decoding and redaction
    pub window: &'a [u8],
    pub max_tokens: u32,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
}

impl SectionHeader<'_> {
    fn render(&self) -> String {
        format!(
            "# ai-section v1\n\
             provider={} model={} mode={} window_bytes={} sha256={}\n\
             tokens<={} elapsed_ms={}\n\
             timestamp={}\n\
             ---\n",
            self.provider,
            self.model,
            self.mode,
            self.window.len(),
            sha256_hex(self.window),
            self.max_tokens,
            self.elapsed_ms,
            self.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        )
    }
}

/// Header plus model text, terminated by a newline
pub fn render_section(header: &SectionHeader<'_>, text: &str) -> String {
    let mut section = header.render();
    section.push_str(text);
    if !text.ends_with('\n') {
        section.push('\n');
    }
    section
}

/// Write the AI section to `path`, replacing any existing file
pub fn write_section(path: &Path, header: &SectionHeader<'_>, text: &str) -> Result<()> {
    std::fs::write(path, render_section(header, text))
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header(window: &[u8]) -> SectionHeader<'_> {
        SectionHeader {
            provider: "ollama",
            model: "llama3",
            mode: "sum",
            window,
            max_tokens: 400,
            elapsed_ms: 1234,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap(),
        }
    }

    #[test]
    fn test_plain_divider_underlines_title() {
        assert_eq!(divider("ai scan", false), "\n\nai scan\n-------\n");
    }

    #[test]
    fn test_tty_divider_is_gray() {
        let line = divider("ai summary", true);
        assert!(line.starts_with("\n\n\x1b[90m"));
        assert!(line.contains(" ai summary "));
        assert!(line.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn test_sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_section_layout() {
        let section = render_section(&header(b"abc"), "### Quick summary\n- ok");
        assert_eq!(
            section,
            "# ai-section v1\n\
             provider=ollama model=llama3 mode=sum window_bytes=3 \
             sha256=ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n\
             tokens<=400 elapsed_ms=1234\n\
             timestamp=2024-05-01T12:30:05Z\n\
             ---\n\
             ### Quick summary\n- ok\n"
        );
    }

    #[test]
    fn test_existing_newline_not_doubled() {
        let section = render_section(&header(b""), "done\n");
        assert!(section.ends_with("---\ndone\n"));
    }

    #[test]
    fn test_write_section_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai.md");
        write_section(&path, &header(b"log"), "text").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# ai-section v1\n"));
        assert!(written.ends_with("---\ntext\n"));
    }

    #[test]
    fn test_write_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ai.md");
        let err = write_section(&path, &header(b""), "text").unwrap_err();
        assert!(err.to_string().contains("ai.md"));
    }
}
