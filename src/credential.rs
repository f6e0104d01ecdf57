// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::{
    ffi::{CStr, CString, c_char},
    io,
};

use anyhow::{Context, Result, anyhow, bail};
use nix::{
    libc,
    unistd::{User, getuid},
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::auth::Verifier;

#[link(name = "crypt")]
unsafe extern "C" {
    fn crypt(key: *const c_char, salt: *const c_char) -> *mut c_char;
}

/// Marker stored in the account database when the real hash is in the
/// shadow database.
const SHADOW_PLACEHOLDER: &[u8] = b"x";

/// The invoking user's password hash, stored with its terminating zero.
pub struct CredentialStore {
    hash: Zeroizing<Vec<u8>>,
}

impl CredentialStore {
    /// Reads the invoking user's hash. Must run before privileges are
    /// dropped, since the shadow database is only readable with them.
    pub fn load() -> Result<Self> {
        let user = User::from_uid(getuid())?
            .ok_or(anyhow!("Current user does not exist"))?;

        debug!("Loading credentials for '{}'", user.name);

        let hash = if user.passwd.as_bytes() == SHADOW_PLACEHOLDER {
            shadow_hash(&user.name)
                .context("Failed to read shadow entry, ensure the binary is setuid or setgid shadow")?
        } else {
            Zeroizing::new(user.passwd.as_bytes_with_nul().to_vec())
        };

        Self::from_hash(hash)
    }

    fn from_hash(hash: Zeroizing<Vec<u8>>) -> Result<Self> {
        CStr::from_bytes_with_nul(&hash).context("Malformed password hash")?;

        match hash.first() {
            None | Some(0) => bail!("Account has no password set"),
            Some(b'!') | Some(b'*') => bail!("Account password is locked"),
            _ => {}
        }

        Ok(Self { hash })
    }

    fn hash(&self) -> &CStr {
        // Checked in from_hash
        CStr::from_bytes_with_nul(&self.hash).unwrap_or_default()
    }
}

fn shadow_hash(name: &str) -> Result<Zeroizing<Vec<u8>>> {
    let name = CString::new(name)?;

    let entry = unsafe { libc::getspnam(name.as_ptr()) };
    if entry.is_null() {
        return Err(io::Error::last_os_error()).context("getspnam failed");
    }

    let pwdp = unsafe { (*entry).sp_pwdp };
    if pwdp.is_null() {
        bail!("Shadow entry has no password field");
    }

    let hash = unsafe { CStr::from_ptr(pwdp) };
    Ok(Zeroizing::new(hash.to_bytes_with_nul().to_vec()))
}

impl Verifier for CredentialStore {
    fn verify(&self, candidate: &CStr) -> Result<bool> {
        let stored = self.hash();

        let computed = unsafe { crypt(candidate.as_ptr(), stored.as_ptr()) };
        if computed.is_null() {
            return Err(io::Error::last_os_error()).context("crypt failed");
        }

        let computed = unsafe { CStr::from_ptr(computed) };

        // Failure tokens start with '*', which no valid hash does
        if computed.to_bytes().first() == Some(&b'*') {
            bail!("crypt rejected the stored hash");
        }

        Ok(computed == stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(hash: &[u8]) -> Result<CredentialStore> {
        let mut bytes = hash.to_vec();
        bytes.push(0);
        CredentialStore::from_hash(Zeroizing::new(bytes))
    }

    #[test]
    fn test_rejects_unusable_hashes() {
        assert!(store(b"").is_err());
        assert!(store(b"!$6$salt$abc").is_err());
        assert!(store(b"*").is_err());
        assert!(CredentialStore::from_hash(Zeroizing::new(b"abc".to_vec())).is_err());
    }

    #[test]
    fn test_verifies_sha512_hash() {
        let hash = unsafe { CStr::from_ptr(crypt(c"correctpw".as_ptr(), c"$6$saltsalt$".as_ptr())) }
            .to_bytes()
            .to_vec();
        let store = store(&hash).unwrap();

        assert!(store.verify(c"correctpw").unwrap());
        assert!(!store.verify(c"wrongpw").unwrap());
    }
}
