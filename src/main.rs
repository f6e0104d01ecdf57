// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

pub mod args;
pub mod auth;
pub mod color;
pub mod config;
pub mod credential;
pub mod event;
pub mod outputs;
pub mod password;
pub mod privilege;
pub mod repeat;
pub mod seat;
pub mod session;
pub mod state;
pub mod surface;

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info};
use wayland_client::Connection;

use crate::{
    args::{TintArgs, run_cli},
    config::TintConfig,
    credential::CredentialStore,
    privilege::{ProcessIdentity, drop_privileges},
    state::TintState,
};

fn start(args: &TintArgs) -> Result<()> {
    // The shadow database is only readable before dropping privileges
    let credentials = CredentialStore::load().context("Failed to load password hash")?;
    drop_privileges(&ProcessIdentity)?;

    let mut config = TintConfig::load(args.config_file.as_deref())?;
    config.merge_args(args);

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
    let display = conn.display();

    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();

    let mut state = TintState::new(display, qh.clone(), credentials, &config)?;

    state.get_registry(&qh);
    event_queue.roundtrip(&mut state)?;
    state.take_fatal()?;

    state.session.backend.check_globals()?;

    if state.seat.seat.is_none() {
        bail!("Missing WlSeat");
    }

    state.session.request_lock()?;
    event_queue.roundtrip(&mut state)?;
    state.take_fatal()?;

    while !state.session.is_locked() {
        event_queue.blocking_dispatch(&mut state)?;
        state.take_fatal()?;
    }

    debug!("Locked {} output(s)", state.session.outputs().len());

    while state.session.is_running() {
        state.event_loop_cycle(&mut event_queue)?;
    }

    // Let the compositor see the unlock before anything is torn down
    event_queue.roundtrip(&mut state)?;

    state.teardown()?;
    event_queue.flush()?;

    info!("Unlocked");

    Ok(())
}

fn main() -> ExitCode {
    let args = run_cli();

    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_max_level(args.log_level.to_level())
        .with_writer(std::io::stderr)
        .init();

    let now = chrono::Local::now();
    debug!("tintlock started at {}", now.to_rfc3339());

    let result = start(&args);

    let now = chrono::Local::now();
    debug!("tintlock exited at {}", now.to_rfc3339());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
