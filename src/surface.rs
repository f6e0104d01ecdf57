// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use anyhow::{Result, anyhow, bail};
use tracing::warn;
use wayland_client::{
    Connection, Dispatch, Proxy, QueueHandle, delegate_noop,
    protocol::{wl_buffer, wl_compositor, wl_output, wl_region, wl_surface},
};
use wayland_protocols::{
    ext::session_lock::v1::client::{
        ext_session_lock_manager_v1, ext_session_lock_surface_v1, ext_session_lock_v1,
    },
    wp::{
        single_pixel_buffer::v1::client::wp_single_pixel_buffer_manager_v1,
        viewporter::client::{wp_viewport, wp_viewporter},
    },
};

use crate::{
    color::Rgb,
    outputs::{Geometry, LockBackend},
    session::LockEvent,
    state::TintState,
};

pub struct TintLockSurface {
    surface: wl_surface::WlSurface,
    lock_surface: ext_session_lock_surface_v1::ExtSessionLockSurfaceV1,
    viewport: wp_viewport::WpViewport,
}

/// Globals and the session lock object, as used by the lock session.
pub struct WaylandBackend {
    qh: QueueHandle<TintState>,
    pub compositor: Option<wl_compositor::WlCompositor>,
    pub session_lock_manager: Option<ext_session_lock_manager_v1::ExtSessionLockManagerV1>,
    pub buffer_manager: Option<wp_single_pixel_buffer_manager_v1::WpSinglePixelBufferManagerV1>,
    pub viewporter: Option<wp_viewporter::WpViewporter>,
    session_lock: Option<ext_session_lock_v1::ExtSessionLockV1>,
}

impl WaylandBackend {
    pub fn new(qh: QueueHandle<TintState>) -> Self {
        Self {
            qh,
            compositor: None,
            session_lock_manager: None,
            buffer_manager: None,
            viewporter: None,
            session_lock: None,
        }
    }

    /// Fails unless every global needed to lock and paint was advertised.
    pub fn check_globals(&self) -> Result<()> {
        if self.compositor.is_none() {
            bail!("Missing WlCompositor");
        }

        if self.session_lock_manager.is_none() {
            bail!("Missing ExtSessionLockManagerV1");
        }

        if self.buffer_manager.is_none() {
            bail!("Missing WpSinglePixelBufferManagerV1");
        }

        if self.viewporter.is_none() {
            bail!("Missing WpViewporter");
        }

        Ok(())
    }
}

impl LockBackend for WaylandBackend {
    type Output = wl_output::WlOutput;
    type Surface = TintLockSurface;

    fn request_lock(&mut self) -> Result<()> {
        let manager = self
            .session_lock_manager
            .as_ref()
            .ok_or(anyhow!("Missing ExtSessionLockManagerV1"))?;

        self.session_lock = Some(manager.lock(&self.qh, ()));

        Ok(())
    }

    fn unlock_and_release(&mut self) {
        if let Some(session_lock) = self.session_lock.take() {
            session_lock.unlock_and_destroy();
        }
    }

    fn create_lock_surface(
        &mut self,
        id: u32,
        output: &wl_output::WlOutput,
    ) -> Result<TintLockSurface> {
        let compositor = self
            .compositor
            .as_ref()
            .ok_or(anyhow!("Missing WlCompositor"))?;
        let viewporter = self
            .viewporter
            .as_ref()
            .ok_or(anyhow!("Missing WpViewporter"))?;
        let session_lock = self
            .session_lock
            .as_ref()
            .ok_or(anyhow!("Session lock has not been requested"))?;

        let surface = compositor.create_surface(&self.qh, ());
        let lock_surface = session_lock.get_lock_surface(&surface, output, &self.qh, id);
        let viewport = viewporter.get_viewport(&surface, &self.qh, ());

        Ok(TintLockSurface {
            surface,
            lock_surface,
            viewport,
        })
    }

    fn ack_configure(&mut self, surface: &TintLockSurface, serial: u32) {
        surface.lock_surface.ack_configure(serial);
    }

    fn paint(&mut self, surface: &TintLockSurface, color: Rgb, geometry: Geometry) {
        let (Some(compositor), Some(buffer_manager)) = (&self.compositor, &self.buffer_manager)
        else {
            warn!("Globals missing when attempting render");
            return;
        };

        let (r, g, b) = color.to_u32_channels();

        // Alpha is ignored, the surface is marked opaque below
        let buffer = buffer_manager.create_u32_rgba_buffer(r, g, b, u32::MAX, &self.qh, ());
        let opaque = compositor.create_region(&self.qh, ());
        opaque.add(0, 0, i32::MAX, i32::MAX);

        let wl_surface = &surface.surface;
        wl_surface.set_buffer_scale(geometry.scale);
        wl_surface.attach(Some(&buffer), 0, 0);
        wl_surface.damage_buffer(0, 0, i32::MAX, i32::MAX);
        wl_surface.set_opaque_region(Some(&opaque));
        surface
            .viewport
            .set_destination(geometry.width as i32, geometry.height as i32);
        wl_surface.commit();

        opaque.destroy();
        buffer.destroy();
    }

    fn destroy_surface(&mut self, surface: TintLockSurface) {
        surface.lock_surface.destroy();
        surface.viewport.destroy();
        surface.surface.destroy();
    }

    fn release_output(&mut self, output: wl_output::WlOutput) {
        if output.version() >= 3 {
            output.release();
        }
    }
}

delegate_noop!(TintState: wl_compositor::WlCompositor);
delegate_noop!(TintState: wl_region::WlRegion);
delegate_noop!(TintState: ignore wl_surface::WlSurface);
delegate_noop!(TintState: ignore wl_buffer::WlBuffer);
delegate_noop!(TintState: wp_viewporter::WpViewporter);
delegate_noop!(TintState: wp_viewport::WpViewport);
delegate_noop!(TintState: wp_single_pixel_buffer_manager_v1::WpSinglePixelBufferManagerV1);
delegate_noop!(TintState: ext_session_lock_manager_v1::ExtSessionLockManagerV1);

impl Dispatch<ext_session_lock_v1::ExtSessionLockV1, ()> for TintState {
    fn event(
        state: &mut Self,
        _: &ext_session_lock_v1::ExtSessionLockV1,
        event: <ext_session_lock_v1::ExtSessionLockV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            ext_session_lock_v1::Event::Locked => state.dispatch_lock_event(LockEvent::Locked),
            ext_session_lock_v1::Event::Finished => {
                state.dispatch_lock_event(LockEvent::Finished)
            }
            _ => {}
        }
    }
}

impl Dispatch<ext_session_lock_surface_v1::ExtSessionLockSurfaceV1, u32> for TintState {
    fn event(
        state: &mut Self,
        _: &ext_session_lock_surface_v1::ExtSessionLockSurfaceV1,
        event: <ext_session_lock_surface_v1::ExtSessionLockSurfaceV1 as Proxy>::Event,
        data: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let ext_session_lock_surface_v1::Event::Configure {
            serial,
            width,
            height,
        } = event
        {
            state.dispatch_lock_event(LockEvent::Configure {
                id: *data,
                serial,
                width,
                height,
            });
        }
    }
}

impl Dispatch<wl_output::WlOutput, u32> for TintState {
    fn event(
        state: &mut Self,
        _: &wl_output::WlOutput,
        event: <wl_output::WlOutput as Proxy>::Event,
        data: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let id = *data;

        match event {
            wl_output::Event::Name { name } => {
                state.dispatch_lock_event(LockEvent::OutputName { id, name });
            }
            wl_output::Event::Scale { factor } => {
                state.dispatch_lock_event(LockEvent::OutputScale { id, scale: factor });
            }
            wl_output::Event::Done => {
                state.dispatch_lock_event(LockEvent::OutputDone { id });
            }
            _ => {}
        }
    }
}
