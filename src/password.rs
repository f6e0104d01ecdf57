// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::ffi::CStr;

use zeroize::Zeroize;

pub const PASSWORD_CAPACITY: usize = 256;

/// Fixed-capacity passphrase storage.
///
/// The byte following the last character is always zero, so the usable
/// capacity is one byte short of `PASSWORD_CAPACITY` and the contents can be
/// handed to C as a string without copying. The storage is wiped on drop.
pub struct PasswordBuffer {
    data: [u8; PASSWORD_CAPACITY],
    len: usize,
}

impl PasswordBuffer {
    pub fn new() -> Self {
        Self {
            data: [0u8; PASSWORD_CAPACITY],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of Unicode scalars currently stored.
    pub fn char_count(&self) -> usize {
        self.as_str().chars().count()
    }

    fn as_str(&self) -> &str {
        // Only whole UTF-8 scalars are ever appended or removed
        std::str::from_utf8(&self.data[..self.len]).unwrap_or_default()
    }

    /// Appends a character, returning `false` if it would not fit.
    pub fn push(&mut self, c: char) -> bool {
        if c == '\0' {
            return false;
        }

        let mut encoded = [0u8; 4];
        let bytes = c.encode_utf8(&mut encoded).as_bytes();

        // Keep room for the terminating zero
        if self.len + bytes.len() >= PASSWORD_CAPACITY {
            encoded.zeroize();
            return false;
        }

        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        encoded.zeroize();

        true
    }

    /// Removes the last Unicode scalar, if any.
    pub fn pop(&mut self) -> bool {
        let Some(last) = self.as_str().chars().next_back() else {
            return false;
        };

        let new_len = self.len - last.len_utf8();
        self.data[new_len..self.len].zeroize();
        self.len = new_len;

        true
    }

    pub fn clear(&mut self) {
        self.data.zeroize();
        self.len = 0;
    }

    /// Hands out the contents for a single verification attempt. The buffer
    /// is erased when the returned guard goes out of scope, whatever the
    /// outcome of the attempt.
    pub fn submit(&mut self) -> Submission<'_> {
        Submission { buffer: self }
    }

    #[cfg(test)]
    pub(crate) fn raw_storage(&self) -> &[u8; PASSWORD_CAPACITY] {
        &self.data
    }
}

impl Default for PasswordBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PasswordBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct Submission<'a> {
    buffer: &'a mut PasswordBuffer,
}

impl Submission<'_> {
    pub fn as_c_str(&self) -> &CStr {
        // len < PASSWORD_CAPACITY and data[len] == 0 always hold, and no
        // interior zero byte is ever stored
        CStr::from_bytes_until_nul(&self.buffer.data).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer.data[..self.buffer.len]
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled(s: &str) -> PasswordBuffer {
        let mut buf = PasswordBuffer::new();
        for c in s.chars() {
            assert!(buf.push(c));
        }
        buf
    }

    #[test]
    fn test_push_and_pop_multibyte() {
        let mut buf = filled("aé€");
        assert_eq!(buf.len(), 1 + 2 + 3);
        assert_eq!(buf.char_count(), 3);

        assert!(buf.pop());
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.char_count(), 2);
        assert!(buf.raw_storage()[3..].iter().all(|b| *b == 0));

        assert!(buf.pop());
        assert!(buf.pop());
        assert!(!buf.pop());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_rejects_nul() {
        let mut buf = PasswordBuffer::new();
        assert!(!buf.push('\0'));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_submission_exposes_c_string() {
        let mut buf = filled("hunter2");
        {
            let submission = buf.submit();
            assert_eq!(submission.as_c_str().to_bytes(), b"hunter2");
            assert_eq!(submission.as_bytes(), b"hunter2");
        }
        assert!(buf.is_empty());
        assert!(buf.raw_storage().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_submission_erases_on_early_return() {
        fn failing_check(buf: &mut PasswordBuffer) -> Result<(), ()> {
            let submission = buf.submit();
            if !submission.as_bytes().is_empty() {
                return Err(());
            }
            Ok(())
        }

        let mut buf = filled("secret");
        assert!(failing_check(&mut buf).is_err());
        assert!(buf.is_empty());
        assert!(buf.raw_storage().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_fills_to_capacity_minus_terminator() {
        let mut buf = PasswordBuffer::new();
        let mut accepted = 0;
        while buf.push('x') {
            accepted += 1;
        }
        assert_eq!(accepted, PASSWORD_CAPACITY - 1);
        assert_eq!(buf.raw_storage()[PASSWORD_CAPACITY - 1], 0);
    }

    proptest! {
        #[test]
        fn prop_overflow_never_grows(extra in 1usize..1000, c in any::<char>()) {
            let mut buf = PasswordBuffer::new();
            for _ in 0..PASSWORD_CAPACITY + extra {
                let before = buf.len();
                let pushed = buf.push(c);
                prop_assert!(buf.len() < PASSWORD_CAPACITY);
                if !pushed {
                    prop_assert_eq!(buf.len(), before);
                }
            }
            prop_assert_eq!(buf.raw_storage()[buf.len()], 0);
        }
    }
}
