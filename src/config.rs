// Viewer settings: defaults, caller overrides and the optional `glview.toml`.
//
// The file is only touched when `GLVIEW_CONFIG` is set in the environment. With
// the toggle on, an existing file is read at startup and a missing one is
// written out with the defaults so it can be edited for the next run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment toggle that enables the persisted config file.
pub const CONFIG_TOGGLE_ENV: &str = "GLVIEW_CONFIG";
/// Optional override for where the file lives.
pub const CONFIG_PATH_ENV: &str = "GLVIEW_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "glview.toml";

/// How the headless sink draws into the terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalProtocol {
    /// Truecolor ANSI, two pixel rows per text row using '▀'.
    #[default]
    HalfBlock,
    /// iTerm2 inline image escape (base64 PNG).
    Iterm2,
    /// Kitty graphics protocol (base64 PNG, chunked).
    Kitty,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub vsync: bool,
    pub double_buffer: bool,
    pub rgba_buffer: bool,
    /// Skip the GPU path entirely.
    pub cpu: bool,
    /// Idle backoff and minimum spacing between loop iterations.
    pub frame_interval_ms: u64,
    /// GPU only: follow window resizes with the GL viewport. Off keeps the
    /// viewport at the configured size and only records the new dimensions.
    pub resize_viewport: bool,
    pub terminal: TerminalProtocol,
    pub terminal_columns: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_name: "Screen".to_string(),
            x: 100,
            y: 100,
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
            double_buffer: true,
            rgba_buffer: false,
            cpu: false,
            frame_interval_ms: 8,
            resize_viewport: false,
            terminal: TerminalProtocol::HalfBlock,
            terminal_columns: 80,
        }
    }
}

/// Caller-supplied overrides; `None` leaves the current value alone.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub window_name: Option<String>,
    pub window_x: Option<i32>,
    pub window_y: Option<i32>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub fullscreen: Option<bool>,
    pub vsync: Option<bool>,
    pub double_buffer: Option<bool>,
    pub rgba_buffer: Option<bool>,
    pub cpu: Option<bool>,
}

#[derive(Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    viewer: ViewerConfig,
}

impl ViewerConfig {
    /// Defaults, or the persisted file when `GLVIEW_CONFIG` is set.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`ViewerConfig::load`] with an injectable environment.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if env(CONFIG_TOGGLE_ENV).is_none() {
            return Ok(Self::default());
        }
        let path = env(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_or_init(&path)
    }

    /// Read `path`, or write the defaults there if it does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = fs::read_to_string(path)?;
            let config = Self::from_toml_str(&text)?;
            log::info!("loaded viewer config from {}", path.display());
            return Ok(config);
        }
        let config = Self::default();
        fs::write(path, config.to_toml_string()?)?;
        log::info!("wrote default viewer config to {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.viewer)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(&ConfigFile { viewer: self.clone() })?)
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        self.apply(overrides);
        self
    }

    pub fn apply(&mut self, o: &ConfigOverrides) {
        if let Some(name) = &o.window_name {
            self.window_name = name.clone();
        }
        if let Some(v) = o.window_x {
            self.x = v;
        }
        if let Some(v) = o.window_y {
            self.y = v;
        }
        if let Some(v) = o.window_width {
            self.width = v;
        }
        if let Some(v) = o.window_height {
            self.height = v;
        }
        if let Some(v) = o.fullscreen {
            self.fullscreen = v;
        }
        if let Some(v) = o.vsync {
            self.vsync = v;
        }
        if let Some(v) = o.double_buffer {
            self.double_buffer = v;
        }
        if let Some(v) = o.rgba_buffer {
            self.rgba_buffer = v;
        }
        if let Some(v) = o.cpu {
            self.cpu = v;
        }
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.frame_interval_ms)
    }
}

/// Loose boolean parsing for environment toggles ("1", "true", "yes", "y", "t").
pub fn truthy(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "t"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ViewerConfig::default();
        assert_eq!(c.window_name, "Screen");
        assert_eq!((c.x, c.y, c.width, c.height), (100, 100, 1280, 720));
        assert!(c.vsync && c.double_buffer);
        assert!(!c.fullscreen && !c.rgba_buffer && !c.cpu);
        assert_eq!(c.frame_interval_ms, 8);
    }

    #[test]
    fn overrides_only_touch_given_fields() {
        let o = ConfigOverrides {
            window_width: Some(512),
            window_height: Some(512),
            fullscreen: Some(false),
            ..Default::default()
        };
        let c = ViewerConfig::default().with_overrides(&o);
        assert_eq!((c.width, c.height), (512, 512));
        assert_eq!(c.window_name, "Screen");
        assert_eq!(c.x, 100);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let c = ViewerConfig::from_toml_str("[viewer]\nwidth = 640\nterminal = \"kitty\"\n")
            .unwrap();
        assert_eq!(c.width, 640);
        assert_eq!(c.height, 720);
        assert_eq!(c.terminal, TerminalProtocol::Kitty);
    }

    #[test]
    fn bad_type_is_a_parse_error() {
        let err = ViewerConfig::from_toml_str("[viewer]\nwidth = \"wide\"\n").unwrap_err();
        assert!(matches!(err, crate::error::Error::ConfigParse(_)));
    }

    #[test]
    fn toggle_off_ignores_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glview.toml");
        let p = path.to_string_lossy().into_owned();
        let c = ViewerConfig::load_with(|k| (k == CONFIG_PATH_ENV).then(|| p.clone())).unwrap();
        assert_eq!(c, ViewerConfig::default());
        assert!(!path.exists());
    }

    #[test]
    fn toggle_on_writes_defaults_then_reads_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glview.toml");
        let p = path.to_string_lossy().into_owned();
        let env = |k: &str| match k {
            CONFIG_TOGGLE_ENV => Some("1".to_string()),
            CONFIG_PATH_ENV => Some(p.clone()),
            _ => None,
        };

        let first = ViewerConfig::load_with(env).unwrap();
        assert_eq!(first, ViewerConfig::default());
        assert!(path.exists());

        fs::write(&path, "[viewer]\nwindow_name = \"Cam\"\nfullscreen = true\n").unwrap();
        let second = ViewerConfig::load_with(env).unwrap();
        assert_eq!(second.window_name, "Cam");
        assert!(second.fullscreen);
    }

    #[test]
    fn truthy_values() {
        for s in ["1", "true", "TRUE", "Yes", "y", "t"] {
            assert!(truthy(s), "{s}");
        }
        for s in ["0", "false", "", "no"] {
            assert!(!truthy(s), "{s}");
        }
    }
}
