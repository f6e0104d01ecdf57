// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::{
    io,
    os::fd::{AsFd, AsRawFd, BorrowedFd},
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use mio::{Events, Interest, Poll, Token, unix::SourceFd};
use nix::{
    errno::Errno,
    sys::{
        time::TimeSpec,
        timerfd::{Expiration, TimerSetTimeFlags},
    },
    unistd::read,
};
use wayland_client::{EventQueue, backend::ReadEventsGuard, backend::WaylandError};

use crate::{repeat::TimerAction, state::TintState};

/// Shortest timer expiry; a zero expiry would disarm the timer instead.
const MIN_REPEAT_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum EventType {
    Wayland = 0,
    KeyboardRepeat = 1,
}

impl EventType {
    fn from_usize(value: usize) -> Result<Self> {
        match value {
            0 => Ok(Self::Wayland),
            1 => Ok(Self::KeyboardRepeat),

            _ => Err(anyhow!("Invalid EventType value")),
        }
    }
}

fn is_eintr(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::Interrupted
}

impl TintState {
    pub fn arm_repeat(&mut self, delay: Duration) -> Result<()> {
        let delay = delay.max(MIN_REPEAT_DELAY);
        self.repeat_timer.set(
            Expiration::OneShot(TimeSpec::from_duration(delay)),
            TimerSetTimeFlags::empty(),
        )?;

        Ok(())
    }

    pub fn disarm_repeat(&mut self) -> Result<()> {
        self.repeat_timer.unset()?;

        Ok(())
    }

    pub fn apply_timer(&mut self, action: TimerAction) -> Result<()> {
        match action {
            TimerAction::Arm(delay) => self.arm_repeat(delay),
            TimerAction::Disarm => self.disarm_repeat(),
            TimerAction::Keep => Ok(()),
        }
    }

    pub fn cancel_repeat(&mut self) -> Result<()> {
        self.repeat.cancel();
        self.disarm_repeat()
    }

    /// Timer expiry: presses the held key once more and schedules the next
    /// repetition.
    fn handle_repeat_event(&mut self) -> Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];
        match read(&self.repeat_timer, &mut buf) {
            Ok(_) => {}
            // Disarmed since the poll returned
            Err(Errno::EAGAIN) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let (sym, action) = self.repeat.expire();
        if let Some(sym) = sym {
            self.press_sym(sym);
        }

        self.apply_timer(action)
    }

    fn setup_poll(&mut self) -> Result<()> {
        let poll = Poll::new()?;

        poll.registry().register(
            &mut SourceFd(&self.repeat_timer.as_fd().as_raw_fd()),
            Token(EventType::KeyboardRepeat as usize),
            Interest::READABLE,
        )?;

        self.poll = Some(poll);
        Ok(())
    }

    fn poll_events(&mut self, events: &mut Events, wayland_sock_fd: BorrowedFd<'_>) -> Result<()> {
        let mut wayland_sock_src = SourceFd(&wayland_sock_fd.as_raw_fd());

        let poll = self
            .poll
            .as_mut()
            .ok_or(anyhow!("Poll has not been created yet"))?;

        {
            // Register the Wayland file descriptor with the poll
            poll.registry().register(
                &mut wayland_sock_src,
                Token(EventType::Wayland as usize),
                Interest::READABLE,
            )?;

            match poll.poll(events, None) {
                Ok(_) => {}
                Err(e) if is_eintr(&e) => {}
                Err(e) => return Err(anyhow!("Error during epoll: {e}")),
            }

            poll.registry().deregister(&mut wayland_sock_src)?;
        }

        Ok(())
    }

    fn process_events(
        &mut self,
        events: &Events,
        read_guard: ReadEventsGuard,
        event_queue: &mut EventQueue<TintState>,
    ) -> Result<()> {
        let mut wayland_sock_ready = false;
        for event in events {
            match EventType::from_usize(event.token().0)? {
                EventType::Wayland => {
                    if event.is_error() || event.is_read_closed() {
                        bail!("Wayland socket disconnected");
                    }
                    wayland_sock_ready = true;
                }
                EventType::KeyboardRepeat => self.handle_repeat_event()?,
            }
        }

        if wayland_sock_ready {
            read_guard.read()?;
            event_queue.dispatch_pending(self)?;
        } else {
            std::mem::drop(read_guard);
        }

        Ok(())
    }

    fn flush(event_queue: &EventQueue<TintState>) -> Result<()> {
        match event_queue.flush() {
            Ok(()) => Ok(()),
            Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn event_loop_cycle(&mut self, event_queue: &mut EventQueue<TintState>) -> Result<()> {
        if self.poll.is_none() {
            self.setup_poll()?;
        }

        let mut events = Events::with_capacity(64);

        Self::flush(event_queue)?;
        event_queue.dispatch_pending(self)?;
        self.take_fatal()?;

        let read_guard = event_queue
            .prepare_read()
            .ok_or(anyhow!("Failed to obtain Wayland event read guard"))?;
        let wayland_sock_fd = read_guard.connection_fd();

        self.poll_events(&mut events, wayland_sock_fd)?;
        self.process_events(&events, read_guard, event_queue)?;
        self.take_fatal()?;

        Ok(())
    }
}
