//! Log helpers: single-line escaping of player-supplied text and the `security` audit
//! target used for administrative actions.

use std::fmt::Write;

use crate::types::Caller;

/// Log target the binary routes to `[logging] security_file`.
pub const SECURITY_TARGET: &str = "security";

const MAX_PREVIEW: usize = 200;

/// Escape text for a single log line. Newlines, tabs and other control characters are
/// made visible and long input is cut at [`MAX_PREVIEW`] characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Record an administrative action (kick, jail, mute, unban...) on the audit target.
pub fn audit(actor: &Caller, action: &str, target: &str, detail: Option<&str>) {
    match detail {
        Some(detail) => log::info!(
            target: SECURITY_TARGET,
            "{} {} {} ({})",
            escape_log(&actor.name),
            action,
            escape_log(target),
            escape_log(detail)
        ),
        None => log::info!(
            target: SECURITY_TARGET,
            "{} {} {}",
            escape_log(&actor.name),
            action,
            escape_log(target)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::escape_log;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_log("a\nb\r\tc\\"), "a\\nb\\r\\tc\\\\");
        assert_eq!(escape_log("\u{7}"), "\\x07");
    }

    #[test]
    fn truncates_long_input() {
        let long = "x".repeat(500);
        let out = escape_log(&long);
        assert!(out.ends_with('…'));
        assert_eq!(out.chars().count(), 201);
    }
}
