/// Keyboard input the chat box reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    Enter,
    CtrlEnter,
}

/// Text box state for composing the next prompt.
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    text: String,
    disabled: bool,
}

impl ChatInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// True when the current text may be submitted.
    pub fn can_submit(&self) -> bool {
        !self.disabled && is_submittable(&self.text)
    }

    /// Handles one key. Returns the text to submit for a plain Enter.
    ///
    /// The text is taken out of the box only when it is submittable.
    pub fn handle_key(&mut self, key: InputKey) -> Option<String> {
        match key {
            InputKey::CtrlEnter => {
                self.text.push('\n');
                None
            }
            InputKey::Enter if self.can_submit() => Some(std::mem::take(&mut self.text)),
            InputKey::Enter => None,
        }
    }
}

/// Empty and whitespace-only prompts are never sent.
pub fn is_submittable(text: &str) -> bool {
    !text.trim().is_empty()
}
