// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use anyhow::Result;
use mio::Poll;
use nix::sys::timerfd::{ClockId, TimerFd, TimerFlags};
use tracing::debug;
use wayland_client::{
    Connection, Dispatch, QueueHandle,
    protocol::{wl_compositor, wl_display, wl_output, wl_registry, wl_seat},
};
use wayland_protocols::{
    ext::session_lock::v1::client::ext_session_lock_manager_v1,
    wp::{
        single_pixel_buffer::v1::client::wp_single_pixel_buffer_manager_v1,
        viewporter::client::wp_viewporter,
    },
};

use crate::{
    config::TintConfig,
    credential::CredentialStore,
    repeat::KeyRepeat,
    seat::{TintSeat, TintXkb},
    session::{LockEvent, LockSession},
    surface::WaylandBackend,
};

pub struct TintState {
    pub display: wl_display::WlDisplay,
    pub session: LockSession<WaylandBackend, CredentialStore>,
    pub seat: TintSeat,
    pub xkb: TintXkb,
    pub repeat: KeyRepeat,
    pub repeat_timer: TimerFd,
    pub poll: Option<Poll>,

    /// Fatal error raised inside a dispatch callback, returned by the next
    /// loop iteration.
    pub fatal: Option<anyhow::Error>,
}

impl TintState {
    pub fn new(
        display: wl_display::WlDisplay,
        qh: QueueHandle<TintState>,
        credentials: CredentialStore,
        config: &TintConfig,
    ) -> Result<Self> {
        let repeat_timer = TimerFd::new(
            ClockId::CLOCK_MONOTONIC,
            TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
        )?;

        Ok(Self {
            display,
            session: LockSession::new(
                WaylandBackend::new(qh),
                credentials,
                config.colors,
                config.general.fail_on_clear,
            ),
            seat: TintSeat::default(),
            xkb: TintXkb::new(),
            repeat: KeyRepeat::new(),
            repeat_timer,
            poll: None,
            fatal: None,
        })
    }

    pub fn get_registry(&self, qh: &QueueHandle<TintState>) -> wl_registry::WlRegistry {
        self.display.get_registry(qh, ())
    }

    pub fn dispatch_lock_event(&mut self, event: LockEvent<wl_output::WlOutput>) {
        if let Err(e) = self.session.handle(event)
            && self.fatal.is_none()
        {
            self.fatal = Some(e);
        }
    }

    pub fn take_fatal(&mut self) -> Result<()> {
        match self.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Releases everything still held once the compositor has seen the
    /// unlock.
    pub fn teardown(&mut self) -> Result<()> {
        self.cancel_repeat()?;
        self.session.teardown();
        self.seat.release();

        Ok(())
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for TintState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<TintState>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match &interface[..] {
                "wl_compositor" => {
                    let compositor = registry.bind::<wl_compositor::WlCompositor, _, _>(
                        name,
                        version.min(4),
                        qh,
                        (),
                    );
                    state.session.backend.compositor = Some(compositor);
                }
                "wl_seat" => {
                    let seat =
                        registry.bind::<wl_seat::WlSeat, _, _>(name, version.min(4), qh, ());
                    state.seat.seat = Some(seat);
                }
                "wl_output" => {
                    let output = registry.bind::<wl_output::WlOutput, _, _>(
                        name,
                        version.min(4),
                        qh,
                        name,
                    );
                    state.dispatch_lock_event(LockEvent::OutputAdded { id: name, output });
                }
                "wp_viewporter" => {
                    let viewporter =
                        registry.bind::<wp_viewporter::WpViewporter, _, _>(name, 1, qh, ());
                    state.session.backend.viewporter = Some(viewporter);
                }
                "wp_single_pixel_buffer_manager_v1" => {
                    let buffer_manager = registry
                        .bind::<wp_single_pixel_buffer_manager_v1::WpSinglePixelBufferManagerV1, _, _>(
                            name,
                            1,
                            qh,
                            (),
                        );
                    state.session.backend.buffer_manager = Some(buffer_manager);
                }
                "ext_session_lock_manager_v1" => {
                    let session_lock_manager = registry
                        .bind::<ext_session_lock_manager_v1::ExtSessionLockManagerV1, _, _>(
                        name,
                        1,
                        qh,
                        (),
                    );
                    state.session.backend.session_lock_manager = Some(session_lock_manager);
                }
                _ => {}
            },
            wl_registry::Event::GlobalRemove { name } => {
                debug!("Global {name} removed");
                state.dispatch_lock_event(LockEvent::OutputRemoved { id: name });
            }
            _ => {}
        }
    }
}
