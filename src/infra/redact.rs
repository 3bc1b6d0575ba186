//! Log hygiene: conversation text, identifiers, and blob refs never reach log
//! output in the clear.

use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 6] = ["body", "message", "text", "phone", "profile", "blob"];

pub fn redact_text(input: &str) -> String {
    input
        .split_whitespace()
        .map(redact_chunk)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "conversation-core panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("conversation-core panic: {}", scrubbed);
        }
    }));
}

fn redact_chunk(chunk: &str) -> String {
    let lowered = chunk.to_ascii_lowercase();
    if SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || looks_like_identifier(chunk)
    {
        REDACTED.to_owned()
    } else {
        chunk.to_owned()
    }
}

fn looks_like_identifier(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());

    let has_mixed = cleaned.chars().any(|ch| ch.is_ascii_alphabetic())
        && cleaned.chars().any(|ch| ch.is_ascii_digit());

    cleaned.len() >= 6 && (cleaned.chars().all(|ch| ch.is_ascii_digit()) || has_mixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_marked_and_identifier_chunks() {
        let input = "failed body=hello blob://a1b2c3 for +15550123456";
        let output = redact_text(input);

        assert!(!output.contains("hello"));
        assert!(!output.contains("a1b2c3"));
        assert!(!output.contains("15550123456"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn keeps_plain_diagnostic_words() {
        let output = redact_text("store read failed after retry");

        assert_eq!(output, "store read failed after retry");
    }
}
