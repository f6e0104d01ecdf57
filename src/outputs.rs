// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::color::Rgb;

/// The display server requests the lock session needs, implemented over
/// Wayland by `surface::WaylandBackend`.
pub trait LockBackend {
    type Output;
    type Surface;

    fn request_lock(&mut self) -> Result<()>;

    fn unlock_and_release(&mut self);

    fn create_lock_surface(&mut self, id: u32, output: &Self::Output) -> Result<Self::Surface>;

    fn ack_configure(&mut self, surface: &Self::Surface, serial: u32);

    /// Fills the surface with one opaque colour and commits it.
    fn paint(&mut self, surface: &Self::Surface, color: Rgb, geometry: Geometry);

    fn destroy_surface(&mut self, surface: Self::Surface);

    fn release_output(&mut self, output: Self::Output);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub scale: i32,
}

pub struct LockOutput<O, S> {
    pub id: u32,
    pub output: O,
    pub lock_surface: Option<S>,
    pub name: Option<String>,
    pub scale: i32,
    pub size: Option<(u32, u32)>,
}

impl<O, S> LockOutput<O, S> {
    fn new(id: u32, output: O) -> Self {
        Self {
            id,
            output,
            lock_surface: None,
            name: None,
            scale: 1,
            size: None,
        }
    }

    pub fn created(&self) -> bool {
        self.lock_surface.is_some()
    }

    fn geometry(&self) -> Option<Geometry> {
        let (width, height) = self.size?;
        Some(Geometry {
            width,
            height,
            scale: self.scale,
        })
    }

    fn repaint<B>(&self, backend: &mut B, color: Rgb)
    where
        B: LockBackend<Output = O, Surface = S>,
    {
        // Nothing can be shown before the first configure
        if let Some(surface) = &self.lock_surface
            && let Some(geometry) = self.geometry()
        {
            backend.paint(surface, color, geometry);
        }
    }
}

/// Every output the server advertised, keyed by its global name.
pub struct OutputSet<B: LockBackend> {
    outputs: HashMap<u32, LockOutput<B::Output, B::Surface>>,
    active: bool,
}

impl<B: LockBackend> OutputSet<B> {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            active: false,
        }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&LockOutput<B::Output, B::Surface>> {
        self.outputs.get(&id)
    }

    pub fn register(&mut self, id: u32, output: B::Output, backend: &mut B) -> Result<()> {
        if let Some(old) = self.outputs.insert(id, LockOutput::new(id, output)) {
            Self::destroy(old, backend);
        }

        if self.active {
            self.materialize(id, backend)?;
        }

        Ok(())
    }

    /// Creates the lock surface of an output, at most once.
    pub fn materialize(&mut self, id: u32, backend: &mut B) -> Result<()> {
        let Some(output) = self.outputs.get_mut(&id) else {
            return Ok(());
        };

        if output.created() {
            return Ok(());
        }

        let surface = backend.create_lock_surface(id, &output.output)?;
        output.lock_surface = Some(surface);

        debug!(
            "Created lock surface for output {} ({})",
            output.id,
            output.name.as_deref().unwrap_or("unnamed")
        );

        Ok(())
    }

    /// Creates lock surfaces for all known outputs, and for every output
    /// registered from now on.
    pub fn activate(&mut self, backend: &mut B) -> Result<()> {
        self.active = true;

        let ids: Vec<u32> = self.outputs.keys().copied().collect();
        for id in ids {
            self.materialize(id, backend)?;
        }

        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_name(&mut self, id: u32, name: String) {
        if let Some(output) = self.outputs.get_mut(&id) {
            debug!("Found output '{name}'");
            output.name = Some(name);
        }
    }

    pub fn set_scale(&mut self, id: u32, scale: i32, backend: &mut B, color: Rgb) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.scale = scale.max(1);
        }
        self.repaint(id, backend, color);
    }

    pub fn configure(
        &mut self,
        id: u32,
        serial: u32,
        width: u32,
        height: u32,
        backend: &mut B,
        color: Rgb,
    ) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };

        if !output.created() {
            return;
        }

        output.size = Some((width, height));
        if let Some(surface) = &output.lock_surface {
            backend.ack_configure(surface, serial);
        }
        self.repaint(id, backend, color);
    }

    pub fn repaint(&self, id: u32, backend: &mut B, color: Rgb) {
        if let Some(output) = self.outputs.get(&id) {
            output.repaint(backend, color);
        }
    }

    pub fn repaint_all(&self, backend: &mut B, color: Rgb) {
        for output in self.outputs.values() {
            output.repaint(backend, color);
        }
    }

    /// Forgets an output. Unknown ids are ignored.
    pub fn deregister(&mut self, id: u32, backend: &mut B) -> bool {
        match self.outputs.remove(&id) {
            Some(output) => {
                debug!("Removing output {id}");
                Self::destroy(output, backend);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, backend: &mut B) {
        for (_, output) in self.outputs.drain() {
            Self::destroy(output, backend);
        }
    }

    fn destroy(output: LockOutput<B::Output, B::Surface>, backend: &mut B) {
        if let Some(surface) = output.lock_surface {
            backend.destroy_surface(surface);
        }
        backend.release_output(output.output);
    }
}

impl<B: LockBackend> Default for OutputSet<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        RequestLock,
        Unlock,
        Create(u32),
        Ack(u32, u32),
        Paint(u32, Rgb, Geometry),
        DestroySurface(u32),
        ReleaseOutput(u32),
    }

    /// Records every request instead of talking to a compositor. Outputs and
    /// surfaces are both represented by the output id.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub calls: Vec<Call>,
    }

    impl RecordingBackend {
        pub fn paints(&self) -> Vec<(u32, Rgb)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Paint(id, color, _) => Some((*id, *color)),
                    _ => None,
                })
                .collect()
        }
    }

    impl LockBackend for RecordingBackend {
        type Output = u32;
        type Surface = u32;

        fn request_lock(&mut self) -> Result<()> {
            self.calls.push(Call::RequestLock);
            Ok(())
        }

        fn unlock_and_release(&mut self) {
            self.calls.push(Call::Unlock);
        }

        fn create_lock_surface(&mut self, id: u32, _: &u32) -> Result<u32> {
            self.calls.push(Call::Create(id));
            Ok(id)
        }

        fn ack_configure(&mut self, surface: &u32, serial: u32) {
            self.calls.push(Call::Ack(*surface, serial));
        }

        fn paint(&mut self, surface: &u32, color: Rgb, geometry: Geometry) {
            self.calls.push(Call::Paint(*surface, color, geometry));
        }

        fn destroy_surface(&mut self, surface: u32) {
            self.calls.push(Call::DestroySurface(surface));
        }

        fn release_output(&mut self, output: u32) {
            self.calls.push(Call::ReleaseOutput(output));
        }
    }

    const RED: Rgb = Rgb::new(0xcc, 0x33, 0x33);
    const BLUE: Rgb = Rgb::new(0x00, 0x55, 0x77);

    #[test]
    fn test_register_before_activation_does_not_materialize() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.register(7, 7, &mut backend).unwrap();
        outputs.configure(7, 1, 800, 600, &mut backend, RED);
        outputs.set_scale(7, 2, &mut backend, RED);
        assert!(outputs.deregister(7, &mut backend));

        assert_eq!(backend.calls, vec![Call::ReleaseOutput(7)]);
    }

    #[test]
    fn test_register_after_activation_materializes() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.activate(&mut backend).unwrap();
        outputs.register(3, 3, &mut backend).unwrap();
        outputs.materialize(3, &mut backend).unwrap();

        assert_eq!(backend.calls, vec![Call::Create(3)]);
        assert!(outputs.get(3).unwrap().created());
    }

    #[test]
    fn test_configure_acks_before_paint() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.register(1, 1, &mut backend).unwrap();
        outputs.set_scale(1, 2, &mut backend, RED);
        outputs.activate(&mut backend).unwrap();

        // Not configured yet, nothing to paint
        outputs.repaint_all(&mut backend, RED);
        outputs.configure(1, 42, 1920, 1080, &mut backend, BLUE);

        let geometry = Geometry {
            width: 1920,
            height: 1080,
            scale: 2,
        };
        assert_eq!(
            backend.calls,
            vec![Call::Create(1), Call::Ack(1, 42), Call::Paint(1, BLUE, geometry)]
        );
    }

    #[test]
    fn test_reconfigure_acks_each_serial_once() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.activate(&mut backend).unwrap();
        outputs.register(1, 1, &mut backend).unwrap();
        outputs.configure(1, 5, 800, 600, &mut backend, RED);
        outputs.configure(1, 6, 1024, 768, &mut backend, RED);

        let acks: Vec<_> = backend
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Ack(..)))
            .cloned()
            .collect();
        assert_eq!(acks, vec![Call::Ack(1, 5), Call::Ack(1, 6)]);
    }

    #[test]
    fn test_scale_change_repaints_configured_surface() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.activate(&mut backend).unwrap();
        outputs.register(1, 1, &mut backend).unwrap();
        outputs.configure(1, 1, 800, 600, &mut backend, RED);
        outputs.set_scale(1, 3, &mut backend, RED);

        let last = backend.calls.last().unwrap();
        assert_eq!(
            *last,
            Call::Paint(
                1,
                RED,
                Geometry {
                    width: 800,
                    height: 600,
                    scale: 3
                }
            )
        );
    }

    #[test]
    fn test_repaint_targets_one_output() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.activate(&mut backend).unwrap();
        for id in [1, 2] {
            outputs.register(id, id, &mut backend).unwrap();
            outputs.configure(id, id, 800, 600, &mut backend, RED);
        }
        backend.calls.clear();

        outputs.repaint(2, &mut backend, BLUE);
        outputs.repaint(5, &mut backend, BLUE);

        assert_eq!(backend.paints(), vec![(2, BLUE)]);
    }

    #[test]
    fn test_teardown_order() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.activate(&mut backend).unwrap();
        outputs.register(9, 9, &mut backend).unwrap();
        backend.calls.clear();

        outputs.deregister(9, &mut backend);
        assert!(!outputs.deregister(9, &mut backend));

        assert_eq!(
            backend.calls,
            vec![Call::DestroySurface(9), Call::ReleaseOutput(9)]
        );
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let mut backend = RecordingBackend::default();
        let mut outputs = OutputSet::<RecordingBackend>::new();

        outputs.register(2, 2, &mut backend).unwrap();
        outputs.activate(&mut backend).unwrap();
        outputs.materialize(2, &mut backend).unwrap();
        outputs.activate(&mut backend).unwrap();

        assert_eq!(backend.calls, vec![Call::Create(2)]);
    }
}
