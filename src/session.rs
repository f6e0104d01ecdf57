// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthMachine, AuthState, KeyAction, KeyOutcome, Verifier},
    color::Rgb,
    config::TintConfigColors,
    outputs::{LockBackend, OutputSet},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    LockRequested,
    Locked,
    Unlocking,
    Terminated,
}

/// Everything the display server can tell the lock session, already
/// decoded from the wire.
#[derive(Debug)]
pub enum LockEvent<O> {
    OutputAdded { id: u32, output: O },
    OutputRemoved { id: u32 },
    OutputName { id: u32, name: String },
    OutputScale { id: u32, scale: i32 },
    OutputDone { id: u32 },
    Configure {
        id: u32,
        serial: u32,
        width: u32,
        height: u32,
    },
    Locked,
    Finished,
    Key(KeyAction),
}

pub struct LockSession<B: LockBackend, V: Verifier> {
    pub backend: B,
    outputs: OutputSet<B>,
    auth: AuthMachine,
    verifier: V,
    colors: TintConfigColors,
    phase: SessionPhase,
}

impl<B: LockBackend, V: Verifier> LockSession<B, V> {
    pub fn new(backend: B, verifier: V, colors: TintConfigColors, fail_on_clear: bool) -> Self {
        Self {
            backend,
            outputs: OutputSet::new(),
            auth: AuthMachine::new(fail_on_clear),
            verifier,
            colors,
            phase: SessionPhase::Connecting,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    pub fn outputs(&self) -> &OutputSet<B> {
        &self.outputs
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.phase, SessionPhase::Locked | SessionPhase::Unlocking)
    }

    pub fn is_running(&self) -> bool {
        !matches!(
            self.phase,
            SessionPhase::Unlocking | SessionPhase::Terminated
        )
    }

    fn color(&self) -> Rgb {
        self.colors.color_for(self.auth.state())
    }

    pub fn request_lock(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Connecting {
            bail!("Session lock already requested");
        }

        self.backend.request_lock()?;
        self.phase = SessionPhase::LockRequested;

        debug!("Requested session lock");

        Ok(())
    }

    pub fn handle(&mut self, event: LockEvent<B::Output>) -> Result<()> {
        let color = self.color();

        match event {
            LockEvent::OutputAdded { id, output } => {
                self.outputs.register(id, output, &mut self.backend)?;
            }
            LockEvent::OutputRemoved { id } => {
                self.outputs.deregister(id, &mut self.backend);
            }
            LockEvent::OutputName { id, name } => self.outputs.set_name(id, name),
            LockEvent::OutputScale { id, scale } => {
                self.outputs.set_scale(id, scale, &mut self.backend, color);
            }
            LockEvent::OutputDone { id } => {
                if self.outputs.is_active() {
                    self.outputs.materialize(id, &mut self.backend)?;
                }
            }
            LockEvent::Configure {
                id,
                serial,
                width,
                height,
            } => {
                self.outputs
                    .configure(id, serial, width, height, &mut self.backend, color);
            }
            LockEvent::Locked => self.on_locked()?,
            LockEvent::Finished => self.on_finished()?,
            LockEvent::Key(action) => self.on_key(action),
        }

        Ok(())
    }

    fn on_locked(&mut self) -> Result<()> {
        if self.phase != SessionPhase::LockRequested {
            warn!("Unexpected locked event in phase {:?}", self.phase);
            return Ok(());
        }

        info!("Session locked");

        self.phase = SessionPhase::Locked;
        self.outputs.activate(&mut self.backend)
    }

    fn on_finished(&mut self) -> Result<()> {
        match self.phase {
            SessionPhase::Connecting | SessionPhase::LockRequested => {
                bail!("Compositor refused the session lock, is another locker already running?")
            }
            _ => {
                warn!("Compositor revoked the session lock");
                Ok(())
            }
        }
    }

    fn on_key(&mut self, action: KeyAction) {
        if self.phase != SessionPhase::Locked {
            return;
        }

        match self.auth.handle_key(action, &self.verifier) {
            KeyOutcome::Unlock => {
                info!("Authenticated, unlocking");
                self.phase = SessionPhase::Unlocking;
                self.backend.unlock_and_release();
            }
            KeyOutcome::Continue { changed } => {
                if changed {
                    let color = self.color();
                    self.outputs.repaint_all(&mut self.backend, color);
                }
            }
        }
    }

    /// Releases every output. Only call once the server has acknowledged
    /// the unlock.
    pub fn teardown(&mut self) {
        self.outputs.clear(&mut self.backend);
        self.phase = SessionPhase::Terminated;
    }
}
