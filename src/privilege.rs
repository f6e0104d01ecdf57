// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use anyhow::{Context, Result, bail};
use nix::unistd::{Gid, Uid, getgid, getuid, setgid, setuid};
use tracing::debug;

/// Process identity operations, split out so the drop sequence can be
/// exercised without being setuid.
pub trait Identity {
    fn real_uid(&self) -> Uid;
    fn real_gid(&self) -> Gid;
    fn set_uid(&self, uid: Uid) -> nix::Result<()>;
    fn set_gid(&self, gid: Gid) -> nix::Result<()>;
}

pub struct ProcessIdentity;

impl Identity for ProcessIdentity {
    fn real_uid(&self) -> Uid {
        getuid()
    }

    fn real_gid(&self) -> Gid {
        getgid()
    }

    fn set_uid(&self, uid: Uid) -> nix::Result<()> {
        setuid(uid)
    }

    fn set_gid(&self, gid: Gid) -> nix::Result<()> {
        setgid(gid)
    }
}

/// Permanently switches to the invoking user's real identity.
///
/// The group is dropped before the user, since changing the group is no
/// longer permitted once the user identity is gone. Afterwards the process
/// tries to become root again and fails if that works.
pub fn drop_privileges<I: Identity>(identity: &I) -> Result<()> {
    let uid = identity.real_uid();
    let gid = identity.real_gid();

    identity
        .set_gid(gid)
        .with_context(|| format!("Failed to set group id to {gid}"))?;
    identity
        .set_uid(uid)
        .with_context(|| format!("Failed to set user id to {uid}"))?;

    if !uid.is_root() && identity.set_uid(Uid::from_raw(0)).is_ok() {
        bail!("Failed to drop root, able to restore root user id");
    }

    if gid.as_raw() != 0 && identity.set_gid(Gid::from_raw(0)).is_ok() {
        bail!("Failed to drop root, able to restore root group id");
    }

    debug!("Running as uid {uid}, gid {gid}");

    Ok(())
}
