use std::io::Write;

use parley_bridge::{ChatMessage, Role};
use parley_webview::{ChatSnapshot, Viewport};

/// Terminal stand-in for the transcript scroll area, measured in lines.
#[derive(Debug, Default)]
pub struct TerminalViewport {
    offset: f32,
    content_lines: usize,
    visible_lines: usize,
}

impl TerminalViewport {
    pub fn new(visible_lines: usize) -> Self {
        Self {
            offset: 0.0,
            content_lines: 0,
            visible_lines,
        }
    }

    pub fn set_content_lines(&mut self, lines: usize) {
        self.content_lines = lines;
    }
}

impl Viewport for TerminalViewport {
    fn offset(&self) -> f32 {
        self.offset
    }

    fn max_offset(&self) -> f32 {
        self.content_lines.saturating_sub(self.visible_lines) as f32
    }

    fn set_offset(&mut self, offset: f32) {
        self.offset = offset;
    }
}

/// Prints transcript changes incrementally between snapshots.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: usize,
    scratch_len: usize,
}

impl TranscriptPrinter {
    pub fn render(&mut self, snapshot: &ChatSnapshot, out: &mut impl Write) -> std::io::Result<()> {
        if snapshot.transcript.len() < self.printed {
            // Transcript was replaced by a restore.
            self.printed = 0;
        }

        if let Some(scratch) = &snapshot.scratch {
            let text = scratch.content.as_str();
            if self.scratch_len == 0 {
                write!(out, "assistant> ")?;
            }
            if let Some(tail) = text.get(self.scratch_len..) {
                write!(out, "{tail}")?;
            }
            self.scratch_len = text.len();
            out.flush()?;
        }

        for message in &snapshot.transcript[self.printed..] {
            if self.scratch_len > 0 && message.role == Role::Assistant {
                writeln!(out)?;
                if let Some(error) = &message.error {
                    writeln!(out, "  ! {error}")?;
                }
            } else {
                writeln!(out, "{}", format_message(message))?;
            }
            self.scratch_len = 0;
        }
        if snapshot.scratch.is_none() && self.scratch_len > 0 {
            writeln!(out, " [stopped]")?;
            self.scratch_len = 0;
        }
        self.printed = snapshot.transcript.len();
        Ok(())
    }
}

pub fn format_message(message: &ChatMessage) -> String {
    let role = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    match &message.error {
        Some(error) => format!("{role}> {}\n  ! {error}", message.content),
        None => format!("{role}> {}", message.content),
    }
}

pub fn line_count(snapshot: &ChatSnapshot) -> usize {
    snapshot
        .transcript
        .iter()
        .map(|message| message.content.lines().count().max(1))
        .sum()
}
