// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::ffi::CStr;

use anyhow::Result;
use tracing::{debug, warn};

use crate::password::PasswordBuffer;

/// Tint shown on every lock surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing typed yet and no failure so far.
    Init,
    Input,
    /// Same as `Input`, alternated with it on every keystroke.
    InputAlt,
    Failed,
}

/// What a key press means to the password prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Submit,
    Backspace,
    Clear,
    Text(char),
    /// Keys without a textual meaning, such as modifiers.
    Ignored,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Unlock,
    Continue { changed: bool },
}

/// Checks a candidate password against the stored credential.
pub trait Verifier {
    fn verify(&self, candidate: &CStr) -> Result<bool>;
}

pub struct AuthMachine {
    state: AuthState,
    password: PasswordBuffer,
    fail_on_clear: bool,
}

impl AuthMachine {
    pub fn new(fail_on_clear: bool) -> Self {
        Self {
            state: AuthState::Init,
            password: PasswordBuffer::new(),
            fail_on_clear,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn password(&self) -> &PasswordBuffer {
        &self.password
    }

    fn submit<V: Verifier>(&mut self, verifier: &V) -> bool {
        let submission = self.password.submit();

        match verifier.verify(submission.as_c_str()) {
            Ok(matched) => matched,
            Err(e) => {
                warn!("Password verification error: {e}");
                false
            }
        }
    }

    pub fn handle_key<V: Verifier>(&mut self, action: KeyAction, verifier: &V) -> KeyOutcome {
        let previous = self.state;
        let mut failed = previous == AuthState::Failed;

        match action {
            KeyAction::Submit => {
                if self.submit(verifier) {
                    debug!("Password accepted");
                    return KeyOutcome::Unlock;
                }

                debug!("Password rejected");
                failed = true;
            }
            KeyAction::Backspace => {
                self.password.pop();
            }
            KeyAction::Clear => self.password.clear(),
            KeyAction::Text(c) => {
                if !self.password.push(c) {
                    debug!("Password buffer full, dropping input");
                }
            }
            KeyAction::Ignored => {}
        }

        self.state = if !self.password.is_empty() {
            if self.password.char_count() % 2 == 1 {
                AuthState::Input
            } else {
                AuthState::InputAlt
            }
        } else if failed || self.fail_on_clear {
            AuthState::Failed
        } else {
            AuthState::Init
        };

        KeyOutcome::Continue {
            changed: self.state != previous,
        }
    }
}
