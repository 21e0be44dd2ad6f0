//! Input handling with DAS (Delayed Auto Shift) and ARR (Auto Repeat Rate)
//!
//! Uses a polling-based approach that doesn't rely on key release events,
//! which are unreliable on Linux terminals.

use crate::game::Action;
use crate::settings::Settings;
use crate::skill::SkillKind;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

/// Time after which we consider a key "released" if no repeat received
const KEY_TIMEOUT: Duration = Duration::from_millis(100);

/// Input handler with DAS/ARR support
pub struct InputHandler {
    /// Held state for the repeatable keys
    left_state: Option<KeyPressState>,
    right_state: Option<KeyPressState>,
    down_state: Option<KeyPressState>,
    bindings: KeyBindings,
    das: Duration,
    arr: Duration,
}

#[derive(Debug, Clone)]
struct KeyPressState {
    first_press: Instant,
    last_seen: Instant,
    das_triggered: bool,
    last_arr: Option<Instant>,
}

impl KeyPressState {
    fn new(now: Instant) -> Self {
        Self {
            first_press: now,
            last_seen: now,
            das_triggered: false,
            last_arr: None,
        }
    }
}

/// Key bindings - supports multiple keys per action
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub move_left: Vec<KeyCode>,
    pub move_right: Vec<KeyCode>,
    pub soft_drop: Vec<KeyCode>,
    pub hard_drop: Vec<KeyCode>,
    pub rotate: Vec<KeyCode>,
    pub pause: Vec<KeyCode>,
    pub reset: Vec<KeyCode>,
    pub skill_slow: Vec<KeyCode>,
    pub skill_clear_row: Vec<KeyCode>,
    pub skill_swap_next: Vec<KeyCode>,
    pub quit: Vec<KeyCode>,
}

impl KeyBindings {
    /// Parse a key name into a KeyCode
    pub fn parse_key(s: &str) -> Option<KeyCode> {
        let code = match s.to_lowercase().as_str() {
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "space" => KeyCode::Char(' '),
            "enter" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "esc" | "escape" => KeyCode::Esc,
            "backspace" => KeyCode::Backspace,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => return None,
                }
            }
        };
        Some(code)
    }

    /// Parse a list of key names, skipping ones we don't understand
    fn parse_keys(keys: &[String]) -> Vec<KeyCode> {
        keys.iter()
            .filter_map(|name| {
                let code = Self::parse_key(name);
                if code.is_none() {
                    tracing::warn!(key = %name, "ignoring unknown key binding");
                }
                code
            })
            .collect()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let keys = &settings.keys;
        Self {
            move_left: Self::parse_keys(&keys.move_left),
            move_right: Self::parse_keys(&keys.move_right),
            soft_drop: Self::parse_keys(&keys.soft_drop),
            hard_drop: Self::parse_keys(&keys.hard_drop),
            rotate: Self::parse_keys(&keys.rotate),
            pause: Self::parse_keys(&keys.pause),
            reset: Self::parse_keys(&keys.reset),
            skill_slow: Self::parse_keys(&keys.skill_slow),
            skill_clear_row: Self::parse_keys(&keys.skill_clear_row),
            skill_swap_next: Self::parse_keys(&keys.skill_swap_next),
            quit: Self::parse_keys(&keys.quit),
        }
    }

    /// Map a single press to its non-repeating action
    fn action_for(&self, code: KeyCode) -> Option<Action> {
        let table = [
            (&self.hard_drop, Action::HardDrop),
            (&self.rotate, Action::Rotate),
            (&self.pause, Action::TogglePause),
            (&self.reset, Action::Reset),
            (&self.skill_slow, Action::Skill(SkillKind::Slow)),
            (&self.skill_clear_row, Action::Skill(SkillKind::ClearRandomRow)),
            (&self.skill_swap_next, Action::Skill(SkillKind::SwapNext)),
            (&self.quit, Action::Quit),
        ];
        table
            .into_iter()
            .find(|(keys, _)| keys.contains(&code))
            .map(|(_, action)| action)
    }
}

impl InputHandler {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            left_state: None,
            right_state: None,
            down_state: None,
            bindings: KeyBindings::from_settings(settings),
            das: Duration::from_millis(settings.gameplay.das_ms),
            arr: Duration::from_millis(settings.gameplay.arr_ms),
        }
    }

    /// Handle a key press event - returns immediate actions
    pub fn key_down(&mut self, key: KeyEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        let now = Instant::now();

        // Ctrl+C always quits
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            actions.push(Action::Quit);
            return actions;
        }

        let code = normalize_key(key.code);

        if self.bindings.move_left.contains(&code) {
            if let Some(state) = &mut self.left_state {
                state.last_seen = now;
            } else {
                actions.push(Action::MoveLeft);
                self.left_state = Some(KeyPressState::new(now));
            }
            // Cancel opposite direction
            self.right_state = None;
        } else if self.bindings.move_right.contains(&code) {
            if let Some(state) = &mut self.right_state {
                state.last_seen = now;
            } else {
                actions.push(Action::MoveRight);
                self.right_state = Some(KeyPressState::new(now));
            }
            self.left_state = None;
        } else if self.bindings.soft_drop.contains(&code) {
            if let Some(state) = &mut self.down_state {
                state.last_seen = now;
            } else {
                actions.push(Action::SoftDrop);
                self.down_state = Some(KeyPressState::new(now));
            }
        } else if let Some(action) = self.bindings.action_for(code) {
            actions.push(action);
        }

        actions
    }

    /// Handle a key release event (may not be called on Linux)
    pub fn key_up(&mut self, key: KeyEvent) {
        let code = normalize_key(key.code);

        if self.bindings.move_left.contains(&code) {
            self.left_state = None;
        } else if self.bindings.move_right.contains(&code) {
            self.right_state = None;
        } else if self.bindings.soft_drop.contains(&code) {
            self.down_state = None;
        }
    }

    /// Update held keys and return repeat actions (call every frame)
    pub fn update(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        let now = Instant::now();
        let (das, arr) = (self.das, self.arr);

        for (slot, action) in [
            (&mut self.left_state, Action::MoveLeft),
            (&mut self.right_state, Action::MoveRight),
            (&mut self.down_state, Action::SoftDrop),
        ] {
            // No recent key event means the key was released
            if slot
                .as_ref()
                .is_some_and(|state| now.duration_since(state.last_seen) > KEY_TIMEOUT)
            {
                *slot = None;
            }
            if let Some(state) = slot {
                if process_das_arr(state, now, das, arr) {
                    actions.push(action);
                }
            }
        }

        actions
    }

    /// Clear all held keys (useful for pause/resume)
    pub fn clear(&mut self) {
        self.left_state = None;
        self.right_state = None;
        self.down_state = None;
    }
}

/// Process DAS/ARR logic for a key state, returns true if should trigger action
fn process_das_arr(state: &mut KeyPressState, now: Instant, das: Duration, arr: Duration) -> bool {
    if now.duration_since(state.first_press) < das {
        return false;
    }

    if !state.das_triggered {
        // First trigger after DAS
        state.das_triggered = true;
        state.last_arr = Some(now);
        return true;
    }

    match state.last_arr {
        Some(last) if now.duration_since(last) >= arr => {
            state.last_arr = Some(now);
            true
        }
        _ => false,
    }
}

/// Normalize key codes for consistent handling
fn normalize_key(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}
