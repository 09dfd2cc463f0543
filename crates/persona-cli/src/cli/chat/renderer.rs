//! Terminal rendering for the chat loop.
//!
//! The async prompt keeps the terminal in raw mode while the loop runs, so
//! every line written here ends in `\r\n` instead of relying on `println!`.
//! Replies are revealed one character at a time (the typewriter effect);
//! a zero delay prints them at once.

use std::fmt::Display;
use std::io::{self, Write};
use std::time::Duration;

use console::style;

use persona_types::chat::Message;

const NEWLINE: &str = "\r\n";

/// Writes chat output to stdout.
pub struct ChatRenderer {
    delay: Duration,
}

impl ChatRenderer {
    pub fn new(typewriter_delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(typewriter_delay_ms),
        }
    }

    /// Print one line.
    pub fn line(&self, text: impl Display) {
        let mut out = io::stdout();
        let _ = write!(out, "{text}{NEWLINE}");
        let _ = out.flush();
    }

    pub fn blank(&self) {
        self.line("");
    }

    /// Print an assistant reply with the typewriter effect.
    pub async fn reply(&self, persona_name: &str, text: &str) {
        let mut out = io::stdout();
        let _ = write!(out, "{NEWLINE}  {} ", style(persona_name).cyan().bold());
        if let Err(e) = typewrite(&mut out, text, self.delay).await {
            tracing::debug!(error = %e, "typewriter output failed");
        }
        let _ = write!(out, "{NEWLINE}{NEWLINE}");
        let _ = out.flush();
    }

    /// Print a message as it appears in the transcript, without animation.
    pub fn message(&self, persona_name: &str, message: &Message) {
        if message.sent_by_user {
            self.line(format!("  {} {}", style("You").green().bold(), message.text));
        } else if is_error_text(&message.text) {
            self.line(format!(
                "  {} {}",
                style(persona_name).cyan().bold(),
                style(&message.text).red()
            ));
        } else {
            self.line(format!(
                "  {} {}",
                style(persona_name).cyan().bold(),
                message.text
            ));
        }
    }

    pub fn transcript(&self, persona_name: &str, messages: &[Message]) {
        self.blank();
        if messages.is_empty() {
            self.line(format!("  {}", style("No messages yet.").dim()));
        }
        for message in messages {
            self.message(persona_name, message);
        }
        self.blank();
    }
}

/// Write `text` one character at a time, sleeping `delay` between characters.
pub async fn typewrite<W: Write>(out: &mut W, text: &str, delay: Duration) -> io::Result<()> {
    if delay.is_zero() {
        write!(out, "{}", text.replace('\n', NEWLINE))?;
        return out.flush();
    }

    for ch in text.chars() {
        if ch == '\n' {
            out.write_all(NEWLINE.as_bytes())?;
        } else {
            write!(out, "{ch}")?;
        }
        out.flush()?;
        tokio::time::sleep(delay).await;
    }
    Ok(())
}

/// Synthetic error messages are wrapped in `[系统错误: …]` in every locale.
pub fn is_error_text(text: &str) -> bool {
    text.starts_with("[系统错误: ")
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_typewrite_without_delay() {
        let mut out = Vec::new();
        typewrite(&mut out, "你好，旅人\n再见", Duration::ZERO).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "你好，旅人\r\n再见");
    }

    #[tokio::test]
    async fn test_typewrite_with_delay_writes_every_char() {
        let mut out = Vec::new();
        typewrite(&mut out, "a\nb", Duration::from_millis(1)).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\r\nb");
    }

    #[test]
    fn test_is_error_text() {
        assert!(is_error_text("[系统错误: API 返回了空内容]"));
        assert!(is_error_text("[系统错误: Request cancelled]"));
        assert!(!is_error_text("你好，旅人"));
    }

    #[test]
    fn test_preview_counts_chars_not_bytes() {
        assert_eq!(preview("你好", 10), "你好");
        assert_eq!(preview("一二三四五六七八", 6), "一二三...");
        assert_eq!(preview("abcdef", 6), "abcdef");
    }
}
