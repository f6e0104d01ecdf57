// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::time::Duration;

use xkbcommon::xkb::Keysym;

/// What the repeat timer has to do after a key event or expiry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerAction {
    Arm(Duration),
    Disarm,
    Keep,
}

/// Key repeat schedule. Only tracks what repeats and when; the timer
/// itself lives in the event loop.
#[derive(Debug, Default)]
pub struct KeyRepeat {
    delay: Duration,
    period: Option<Duration>,
    held: Option<(u32, Keysym)>,
}

impl KeyRepeat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a `repeat_info` event. `rate` is in keys per second, a rate
    /// of zero or less disables repeating.
    pub fn set_info(&mut self, rate: i32, delay: i32) {
        self.delay = Duration::from_millis(delay.max(0) as u64);
        self.period = (rate > 0).then(|| Duration::from_millis(1000 / rate as u64));

        if self.period.is_none() {
            self.held = None;
        }
    }

    pub fn enabled(&self) -> bool {
        self.period.is_some()
    }

    /// Records a key press. Returns when the timer should first fire, or
    /// `None` if it should be disarmed.
    pub fn press(&mut self, key: u32, sym: Keysym, repeats: bool) -> Option<Duration> {
        if !repeats || !self.enabled() {
            self.held = None;
            return None;
        }

        self.held = Some((key, sym));
        Some(self.delay)
    }

    /// Records a key release. Returns `true` if the timer should be
    /// disarmed.
    pub fn release(&mut self, key: u32) -> bool {
        match self.held {
            Some((held, _)) if held == key => {
                self.held = None;
                true
            }
            _ => false,
        }
    }

    /// Maps a key event to the timer change it requires. A new press always
    /// rearms or disarms, a release only disarms when it lifts the held key.
    pub fn key_event(
        &mut self,
        key: u32,
        sym: Keysym,
        pressed: bool,
        repeats: bool,
    ) -> TimerAction {
        if pressed {
            match self.press(key, sym, repeats) {
                Some(delay) => TimerAction::Arm(delay),
                None => TimerAction::Disarm,
            }
        } else if self.release(key) {
            TimerAction::Disarm
        } else {
            TimerAction::Keep
        }
    }

    pub fn cancel(&mut self) {
        self.held = None;
    }

    /// Timer expiry: the symbol to press again and when to fire next.
    pub fn fire(&self) -> Option<(Keysym, Duration)> {
        let (_, sym) = self.held?;
        Some((sym, self.period?))
    }

    /// Timer expiry as a timer change: nothing held means the timer stops.
    pub fn expire(&self) -> (Option<Keysym>, TimerAction) {
        match self.fire() {
            Some((sym, period)) => (Some(sym), TimerAction::Arm(period)),
            None => (None, TimerAction::Disarm),
        }
    }
}

#[cfg(test)]
mod tests {
    use xkbcommon::xkb::keysyms;

    use super::*;

    fn sym(raw: u32) -> Keysym {
        Keysym::new(raw)
    }

    #[test]
    fn test_press_arms_with_delay_then_period() {
        let mut repeat = KeyRepeat::new();
        repeat.set_info(25, 600);

        let first = repeat.press(14, sym(keysyms::KEY_BackSpace), true);
        assert_eq!(first, Some(Duration::from_millis(600)));

        let (s, next) = repeat.fire().unwrap();
        assert_eq!(s, sym(keysyms::KEY_BackSpace));
        assert_eq!(next, Duration::from_millis(40));

        // Fires indefinitely until released
        assert!(repeat.fire().is_some());
    }

    #[test]
    fn test_release_only_matching_key() {
        let mut repeat = KeyRepeat::new();
        repeat.set_info(25, 600);
        repeat.press(30, sym(keysyms::KEY_a), true);

        assert!(!repeat.release(31));
        assert!(repeat.fire().is_some());
        assert!(repeat.release(30));
        assert!(repeat.fire().is_none());
    }

    #[test]
    fn test_new_press_replaces_held_key() {
        let mut repeat = KeyRepeat::new();
        repeat.set_info(10, 200);
        repeat.press(30, sym(keysyms::KEY_a), true);
        repeat.press(48, sym(keysyms::KEY_b), true);

        assert_eq!(repeat.fire().unwrap().0, sym(keysyms::KEY_b));
        assert!(!repeat.release(30));
    }

    #[test]
    fn test_key_events_drive_the_timer() {
        let mut repeat = KeyRepeat::new();
        repeat.set_info(25, 600);

        let a = sym(keysyms::KEY_a);
        assert_eq!(
            repeat.key_event(30, a, true, true),
            TimerAction::Arm(Duration::from_millis(600))
        );

        // Expiry presses the held key again and rearms at the period
        assert_eq!(
            repeat.expire(),
            (Some(a), TimerAction::Arm(Duration::from_millis(40)))
        );
        assert_eq!(
            repeat.expire(),
            (Some(a), TimerAction::Arm(Duration::from_millis(40)))
        );

        // Lifting another key leaves the timer alone
        assert_eq!(
            repeat.key_event(31, sym(keysyms::KEY_s), false, false),
            TimerAction::Keep
        );
        assert_eq!(repeat.key_event(30, a, false, true), TimerAction::Disarm);
        assert_eq!(repeat.expire(), (None, TimerAction::Disarm));
    }

    #[test]
    fn test_non_repeating_press_disarms_running_repeat() {
        let mut repeat = KeyRepeat::new();
        repeat.set_info(25, 600);

        repeat.key_event(30, sym(keysyms::KEY_a), true, true);
        assert_eq!(
            repeat.key_event(42, sym(keysyms::KEY_Shift_L), true, false),
            TimerAction::Disarm
        );
        assert_eq!(repeat.expire(), (None, TimerAction::Disarm));

        // The released key is no longer held
        assert_eq!(
            repeat.key_event(30, sym(keysyms::KEY_a), false, true),
            TimerAction::Keep
        );
    }

    #[test]
    fn test_disabled_and_non_repeating_keys() {
        let mut repeat = KeyRepeat::new();
        assert_eq!(repeat.press(30, sym(keysyms::KEY_a), true), None);

        repeat.set_info(0, 600);
        assert!(!repeat.enabled());
        assert_eq!(repeat.press(30, sym(keysyms::KEY_a), true), None);

        repeat.set_info(-1, 600);
        assert_eq!(repeat.press(30, sym(keysyms::KEY_a), true), None);

        repeat.set_info(25, 600);
        assert_eq!(repeat.press(42, sym(keysyms::KEY_Shift_L), false), None);
        assert!(repeat.fire().is_none());
    }
}
