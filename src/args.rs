// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::{path::PathBuf, str::FromStr};

use clap::{
    Arg, ArgAction, ArgMatches, Command, ValueEnum,
    builder::{
        EnumValueParser, Styles,
        styling::{AnsiColor, Effects},
    },
};

use crate::color::Rgb;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

pub trait LoadArgMatches {
    fn load_arg_matches(matches: &ArgMatches) -> Self;
}

macro_rules! args_get_value {
    ($matches:expr, $obj:ty, $name:expr) => {
        $matches.get_one::<$obj>($name).cloned()
    };
}

pub struct TintArgs {
    pub log_level: LogLevel,
    pub config_file: Option<PathBuf>,
    pub colors: TintArgsColors,
    pub fail_on_clear: Option<bool>,
}

impl LoadArgMatches for TintArgs {
    fn load_arg_matches(matches: &ArgMatches) -> Self {
        let log_level = matches
            .get_one::<LogLevel>("log_level")
            .cloned()
            .unwrap_or(LogLevel::Info);
        let config_file = args_get_value!(matches, PathBuf, "config_file");
        let fail_on_clear = args_get_value!(matches, bool, "fail_on_clear");

        Self {
            log_level,
            config_file,
            colors: TintArgsColors::load_arg_matches(matches),
            fail_on_clear,
        }
    }
}

macro_rules! color_arg {
    ($id:expr, $short:expr, $long:expr, $help:expr) => {
        Arg::new($id)
            .help($help)
            .short($short)
            .long($long)
            .value_name("RRGGBB")
            .value_parser(Rgb::from_str)
    };
}

pub struct TintArgsColors {
    pub init: Option<Rgb>,
    pub input: Option<Rgb>,
    pub input_alt: Option<Rgb>,
    pub failed: Option<Rgb>,
}

impl LoadArgMatches for TintArgsColors {
    fn load_arg_matches(matches: &ArgMatches) -> Self {
        let init = args_get_value!(matches, Rgb, "init_color");
        let input = args_get_value!(matches, Rgb, "input_color");
        let input_alt = args_get_value!(matches, Rgb, "input_alt_color");
        let failed = args_get_value!(matches, Rgb, "fail_color");

        Self {
            init,
            input,
            input_alt,
            failed,
        }
    }
}

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightGreen.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::BrightGreen.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::BrightCyan.on_default().effects(Effects::BOLD))
        .placeholder(AnsiColor::BrightYellow.on_default())
        .valid(AnsiColor::BrightGreen.on_default())
        .invalid(AnsiColor::BrightRed.on_default())
}

fn build_cli() -> Command {
    Command::new("tintlock")
        .about("Minimal single colour screen locker for Wayland")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_version_flag(true)
        .styles(styles())
        .arg(
            Arg::new("version")
                .help("Print version")
                .short('v')
                .long("version")
                .action(ArgAction::Version),
        )
        .arg(
            Arg::new("log_level")
                .help("Log level verbosity")
                .short('l')
                .long("log-level")
                .value_name("LOG LEVEL")
                .value_parser(EnumValueParser::<LogLevel>::new())
                .default_value("info"),
        )
        .arg(
            Arg::new("config_file")
                .help("Path to an additional configuration file")
                .long("config-file")
                .value_name("CONFIG FILE")
                .value_parser(PathBuf::from_str),
        )
        .arg(color_arg!(
            "init_color",
            'c',
            "init-color",
            "Sets the color shown before any input"
        ))
        .arg(color_arg!(
            "input_color",
            'i',
            "input-color",
            "Sets the color shown during input"
        ))
        .arg(color_arg!(
            "input_alt_color",
            'a',
            "input-alt-color",
            "Sets the color alternated with the input color on every key"
        ))
        .arg(color_arg!(
            "fail_color",
            'f',
            "fail-color",
            "Sets the color shown after a wrong password"
        ))
        .arg(
            Arg::new("fail_on_clear")
                .help("Show the fail color whenever a key leaves the input empty")
                .long("fail-on-clear")
                .value_name("BOOL")
                .value_parser(bool::from_str),
        )
}

pub fn run_cli() -> TintArgs {
    let cli = build_cli();
    let args = cli.get_matches();

    TintArgs::load_arg_matches(&args)
}
