// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026, Nathan Gill

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use config::{Config, File, FileFormat};
use dirs::config_dir;
use serde::Deserialize;
use tracing::debug;

use crate::{args::TintArgs, auth::AuthState, color::Rgb};

const CONFIG_FILE_NAME: &str = "tintlock.toml";
const CONFIG_DIR_NAME: &str = "tintlock";
const SYSTEM_CONFIG_DIR: &str = "/etc";

#[derive(Debug, Default, Deserialize)]
pub struct TintConfig {
    #[serde(default)]
    pub colors: TintConfigColors,

    #[serde(default)]
    pub general: TintConfigGeneral,
}

#[derive(Debug, Copy, Clone, Deserialize)]
pub struct TintConfigColors {
    #[serde(default = "default_init_color")]
    pub init: Rgb,

    #[serde(default = "default_input_color")]
    pub input: Rgb,

    #[serde(default = "default_input_alt_color", rename = "inputAlt")]
    pub input_alt: Rgb,

    #[serde(default = "default_failed_color")]
    pub failed: Rgb,
}

impl TintConfigColors {
    pub fn color_for(&self, state: AuthState) -> Rgb {
        match state {
            AuthState::Init => self.init,
            AuthState::Input => self.input,
            AuthState::InputAlt => self.input_alt,
            AuthState::Failed => self.failed,
        }
    }
}

impl Default for TintConfigColors {
    fn default() -> Self {
        Self {
            init: default_init_color(),
            input: default_input_color(),
            input_alt: default_input_alt_color(),
            failed: default_failed_color(),
        }
    }
}

fn default_init_color() -> Rgb {
    Rgb::new(0x00, 0x00, 0x00)
}

fn default_input_color() -> Rgb {
    Rgb::new(0x00, 0x55, 0x77)
}

fn default_input_alt_color() -> Rgb {
    Rgb::new(0x00, 0x50, 0x70)
}

fn default_failed_color() -> Rgb {
    Rgb::new(0xcc, 0x33, 0x33)
}

#[derive(Debug, Deserialize)]
pub struct TintConfigGeneral {
    /// Show the failure tint whenever a key leaves the input empty.
    #[serde(default = "default_fail_on_clear", rename = "failOnClear")]
    pub fail_on_clear: bool,
}

impl Default for TintConfigGeneral {
    fn default() -> Self {
        Self {
            fail_on_clear: default_fail_on_clear(),
        }
    }
}

fn default_fail_on_clear() -> bool {
    true
}

fn config_file_in(mut dir: PathBuf) -> Option<PathBuf> {
    dir.push(CONFIG_DIR_NAME);
    dir.push(CONFIG_FILE_NAME);

    dir.is_file().then_some(dir)
}

impl TintConfig {
    /// Loads the system and user configuration files, then the explicitly
    /// requested one, each overriding the previous.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut files = Vec::new();

        if let Some(system_config) = config_file_in(PathBuf::from(SYSTEM_CONFIG_DIR)) {
            files.push(system_config);
        }

        let user_dir = config_dir().ok_or(anyhow!("Failed to get user config directory"))?;
        if let Some(user_config) = config_file_in(user_dir) {
            files.push(user_config);
        }

        if let Some(path) = config_file {
            if !path.is_file() {
                bail!("Config file {:#?} does not exist", path);
            }
            files.push(path.to_path_buf());
        }

        Self::load_files(&files)
    }

    fn load_files(files: &[PathBuf]) -> Result<Self> {
        let mut builder = Config::builder();

        for file in files {
            let file_str = file
                .to_str()
                .ok_or(anyhow!("Failed to get config string from path"))?;
            builder = builder.add_source(File::new(file_str, FileFormat::Toml));
            debug!("Including config file {:#?}", file);
        }

        let config = builder.build()?;

        Ok(config.try_deserialize::<Self>()?)
    }

    /// Command line flags take precedence over every file.
    pub fn merge_args(&mut self, args: &TintArgs) {
        let colors = &args.colors;

        if let Some(init) = colors.init {
            self.colors.init = init;
        }
        if let Some(input) = colors.input {
            self.colors.input = input;
        }
        if let Some(input_alt) = colors.input_alt {
            self.colors.input_alt = input_alt;
        }
        if let Some(failed) = colors.failed {
            self.colors.failed = failed;
        }
        if let Some(fail_on_clear) = args.fail_on_clear {
            self.general.fail_on_clear = fail_on_clear;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::args::{LogLevel, TintArgsColors};

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_files() {
        let config = TintConfig::load_files(&[]).unwrap();

        assert_eq!(config.colors.init, Rgb::new(0, 0, 0));
        assert_eq!(config.colors.failed, Rgb::new(0xcc, 0x33, 0x33));
        assert!(config.general.fail_on_clear);
    }

    #[test]
    fn test_later_files_override_earlier() {
        let system = toml_file(
            r##"
            [colors]
            init = "111111"
            failed = "#222222"

            [general]
            failOnClear = false
            "##,
        );
        let user = toml_file(
            r#"
            [colors]
            inputAlt = "333333"
            failed = "444444"
            "#,
        );

        let config =
            TintConfig::load_files(&[system.path().to_path_buf(), user.path().to_path_buf()])
                .unwrap();

        assert_eq!(config.colors.init, Rgb::new(0x11, 0x11, 0x11));
        assert_eq!(config.colors.input, default_input_color());
        assert_eq!(config.colors.input_alt, Rgb::new(0x33, 0x33, 0x33));
        assert_eq!(config.colors.failed, Rgb::new(0x44, 0x44, 0x44));
        assert!(!config.general.fail_on_clear);
    }

    #[test]
    fn test_invalid_color_in_file() {
        let file = toml_file("[colors]\ninit = \"12345\"\n");
        assert!(TintConfig::load_files(&[file.path().to_path_buf()]).is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(TintConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_args_override_files() {
        let mut config = TintConfig::default();
        let args = TintArgs {
            log_level: LogLevel::Info,
            config_file: None,
            colors: TintArgsColors {
                init: None,
                input: Some(Rgb::new(1, 2, 3)),
                input_alt: None,
                failed: Some(Rgb::new(4, 5, 6)),
            },
            fail_on_clear: Some(false),
        };

        config.merge_args(&args);

        assert_eq!(config.colors.init, default_init_color());
        assert_eq!(config.colors.input, Rgb::new(1, 2, 3));
        assert_eq!(config.colors.failed, Rgb::new(4, 5, 6));
        assert!(!config.general.fail_on_clear);
    }

    #[test]
    fn test_color_for_state() {
        let colors = TintConfigColors::default();
        assert_eq!(colors.color_for(AuthState::Init), colors.init);
        assert_eq!(colors.color_for(AuthState::Input), colors.input);
        assert_eq!(colors.color_for(AuthState::InputAlt), colors.input_alt);
        assert_eq!(colors.color_for(AuthState::Failed), colors.failed);
    }
}
