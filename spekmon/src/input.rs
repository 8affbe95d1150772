//! Keystroke handling for the device command set.
//!
//! A pure step function over [`InputState`]: callers feed [`Key`] events
//! and apply the returned [`Effect`]s (write to the device, push a
//! console notice). Nothing here touches a terminal or an event loop,
//! so the whole command surface tests without one.

use crate::proto;

/// Keystroke event as delivered by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Esc,
}

/// What the caller must do after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Put this text on the outbound command channel.
    Send(String),
    /// Show this notice in the console pane.
    Console(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    LineInput,
}

/// `{mode, buffer}` of the command entry machine. `Normal` dispatches
/// single-character commands; `LineInput` edits a multi-argument
/// command buffer until enter or escape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputState {
    mode: Mode,
    buffer: String,
}

impl Default for InputState {
    fn default() -> InputState {
        InputState {
            mode: Mode::Normal,
            buffer: String::new(),
        }
    }
}

impl InputState {
    pub fn new() -> InputState {
        InputState::default()
    }

    /// True while a multi-argument command is being edited.
    pub fn line_input(&self) -> bool {
        self.mode == Mode::LineInput
    }

    /// Current edit buffer. Empty in `Normal` mode.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

/// Advance the machine by one keystroke.
pub fn step(state: InputState, key: Key) -> (InputState, Vec<Effect>) {
    match state.mode {
        Mode::Normal => step_normal(state, key),
        Mode::LineInput => step_line_input(state, key),
    }
}

fn step_normal(state: InputState, key: Key) -> (InputState, Vec<Effect>) {
    let ch = match key {
        Key::Char(c) => c,
        _ => return (state, vec![]),
    };
    if ch == 'x' {
        let state = InputState {
            mode: Mode::LineInput,
            buffer: "x ".to_string(),
        };
        let effects = vec![Effect::Console(
            ">> x input: x <int> <int>  (finish with ENTER, ESC cancels)".to_string(),
        )];
        return (state, effects);
    }
    if let Some(desc) = proto::command_description(ch) {
        let effects = vec![
            Effect::Send(ch.to_string()),
            Effect::Console(format!(">> {} ({})", ch, desc)),
        ];
        return (state, effects);
    }
    if proto::INTERVAL_PRESETS.contains(&ch) {
        let effects = vec![
            Effect::Send(ch.to_string()),
            Effect::Console(format!(">> sets scan interval {}", ch)),
        ];
        return (state, effects);
    }
    (state, vec![])
}

fn step_line_input(mut state: InputState, key: Key) -> (InputState, Vec<Effect>) {
    match key {
        Key::Enter => {
            let buffer = std::mem::take(&mut state.buffer);
            state.mode = Mode::Normal;
            match proto::range_command(&buffer) {
                Some(cmd) => {
                    let effects = vec![
                        Effect::Send(format!("{}\n", cmd)),
                        Effect::Console(format!(">> send cmd:> {}", cmd)),
                    ];
                    (state, effects)
                }
                None => {
                    let notice = format!(
                        "!! invalid x command: '{}' (use: x <int> <int>)",
                        buffer.trim()
                    );
                    (state, vec![Effect::Console(notice)])
                }
            }
        }
        Key::Esc => {
            state.buffer.clear();
            state.mode = Mode::Normal;
            (state, vec![Effect::Console(">> x input canceled".to_string())])
        }
        Key::Backspace => {
            state.buffer.pop();
            let echo = echo_buffer(&state.buffer);
            (state, vec![echo])
        }
        Key::Char(c) if c.is_ascii_digit() || c == ' ' || c == '-' => {
            state.buffer.push(c);
            let echo = echo_buffer(&state.buffer);
            (state, vec![echo])
        }
        Key::Char(_) => (state, vec![]),
    }
}

fn echo_buffer(buffer: &str) -> Effect {
    Effect::Console(format!(">> {}_", buffer))
}
