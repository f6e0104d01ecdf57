// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use anyhow::{Result, anyhow};
use std::os::fd::OwnedFd;
use tracing::{debug, warn};
use wayland_client::{
    Connection, Dispatch, Proxy, QueueHandle, WEnum,
    protocol::{wl_keyboard, wl_pointer, wl_seat},
};
use xkbcommon::xkb::{self, Keysym, keysyms};

use crate::{auth::KeyAction, session::LockEvent, state::TintState};

pub struct TintXkb {
    pub context: xkb::Context,
    pub keymap: Option<xkb::Keymap>,
    pub state: Option<xkb::State>,
}

impl TintXkb {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            keymap: None,
            state: None,
        }
    }
}

impl Default for TintXkb {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct TintSeat {
    pub seat: Option<wl_seat::WlSeat>,
    pub pointer: Option<wl_pointer::WlPointer>,
    pub keyboard: Option<wl_keyboard::WlKeyboard>,
}

/// `release` requests exist from version 3 of the seat interfaces.
fn release_keyboard(keyboard: wl_keyboard::WlKeyboard) {
    if keyboard.version() >= 3 {
        keyboard.release();
    }
}

fn release_pointer(pointer: wl_pointer::WlPointer) {
    if pointer.version() >= 3 {
        pointer.release();
    }
}

impl TintSeat {
    pub fn release(&mut self) {
        if let Some(keyboard) = self.keyboard.take() {
            release_keyboard(keyboard);
        }
        if let Some(pointer) = self.pointer.take() {
            release_pointer(pointer);
        }
    }
}

/// Maps a key symbol to its meaning for the password prompt.
pub fn key_action(sym: Keysym) -> KeyAction {
    match sym.raw() {
        keysyms::KEY_Return | keysyms::KEY_KP_Enter => KeyAction::Submit,
        keysyms::KEY_BackSpace => KeyAction::Backspace,
        keysyms::KEY_Escape => KeyAction::Clear,
        _ => char::from_u32(xkb::keysym_to_utf32(sym))
            .filter(|c| *c != '\0')
            .map(KeyAction::Text)
            .unwrap_or(KeyAction::Ignored),
    }
}

impl TintState {
    pub fn handle_keymap(&mut self, fd: OwnedFd, size: u32) -> Result<()> {
        // Mapped read-only and unmapped again by xkbcommon
        let keymap = unsafe {
            xkb::Keymap::new_from_fd(
                &self.xkb.context,
                fd,
                size as usize,
                xkb::KEYMAP_FORMAT_TEXT_V1,
                xkb::KEYMAP_COMPILE_NO_FLAGS,
            )
        }?
        .ok_or(anyhow!("Failed to get keymap"))?;
        let state = xkb::State::new(&keymap);

        self.xkb.state = Some(state);
        self.xkb.keymap = Some(keymap);
        self.cancel_repeat()?;

        debug!("Created keymap and state");

        Ok(())
    }

    pub fn handle_key(&mut self, key: u32, key_state: WEnum<wl_keyboard::KeyState>) -> Result<()> {
        let Some(xkb_state) = &self.xkb.state else {
            return Ok(());
        };

        // Evdev scancodes are offset by 8 in XKB
        let keycode = xkb::Keycode::new(key + 8);
        let sym = xkb_state.key_get_one_sym(keycode);

        let pressed = match key_state {
            WEnum::Value(wl_keyboard::KeyState::Pressed) => true,
            WEnum::Value(wl_keyboard::KeyState::Released) => false,
            _ => return Ok(()),
        };

        let repeats = pressed
            && self
                .xkb
                .keymap
                .as_ref()
                .is_some_and(|keymap| keymap.key_repeats(keycode));

        if pressed {
            self.press_sym(sym);
        }

        let action = self.repeat.key_event(key, sym, pressed, repeats);
        self.apply_timer(action)?;

        Ok(())
    }

    pub fn press_sym(&mut self, sym: Keysym) {
        self.dispatch_lock_event(LockEvent::Key(key_action(sym)));
    }

    pub fn handle_modifiers(
        &mut self,
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    ) -> Result<()> {
        let state = self
            .xkb
            .state
            .as_mut()
            .ok_or(anyhow!("Modifiers received before keymap"))?;
        state.update_mask(depressed, latched, locked, 0, 0, group);

        Ok(())
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for TintState {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: <wl_keyboard::WlKeyboard as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => {
                if let WEnum::Value(wl_keyboard::KeymapFormat::XkbV1) = format {
                    if let Err(e) = state.handle_keymap(fd, size) {
                        warn!("Error while handling keymap event: {e}");
                    }
                } else {
                    warn!("Unsupported keymap format {format:?}");
                }
            }
            wl_keyboard::Event::Key {
                serial: _,
                time: _,
                key,
                state: key_state,
            } => {
                if let Err(e) = state.handle_key(key, key_state) {
                    warn!("Error while handling key event: {e}");
                }
            }
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                debug!("Key repeat rate {rate}, delay {delay}");
                state.repeat.set_info(rate, delay);
            }
            wl_keyboard::Event::Modifiers {
                serial: _,
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
            } => {
                if let Err(e) =
                    state.handle_modifiers(mods_depressed, mods_latched, mods_locked, group)
                {
                    warn!("Error while handling modifiers event: {e}");
                }
            }
            wl_keyboard::Event::Leave { .. } => {
                if let Err(e) = state.cancel_repeat() {
                    warn!("Error while cancelling key repeat: {e}");
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for TintState {
    fn event(
        _: &mut Self,
        pointer: &wl_pointer::WlPointer,
        event: <wl_pointer::WlPointer as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_pointer::Event::Enter { serial, .. } = event {
            pointer.set_cursor(serial, None, 0, 0);
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for TintState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: <wl_seat::WlSeat as Proxy>::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        {
            let has_keyboard = capabilities.contains(wl_seat::Capability::Keyboard);
            if has_keyboard && state.seat.keyboard.is_none() {
                state.seat.keyboard = Some(seat.get_keyboard(qh, ()));
                debug!("Found keyboard");
            } else if !has_keyboard && let Some(keyboard) = state.seat.keyboard.take() {
                release_keyboard(keyboard);
                if let Err(e) = state.cancel_repeat() {
                    warn!("Error while cancelling key repeat: {e}");
                }
                debug!("Keyboard removed");
            }

            let has_pointer = capabilities.contains(wl_seat::Capability::Pointer);
            if has_pointer && state.seat.pointer.is_none() {
                state.seat.pointer = Some(seat.get_pointer(qh, ()));
                debug!("Found pointer");
            } else if !has_pointer && let Some(pointer) = state.seat.pointer.take() {
                release_pointer(pointer);
                debug!("Pointer removed");
            }
        }
    }
}
