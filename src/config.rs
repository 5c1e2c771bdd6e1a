use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logger;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_ENDPOINT: &str = "https://fanyi-api.baidu.com/api/trans/vip/translate";

/// Which mouse-up starts a copy-and-translate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerButton {
    Left,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub appid: String,
    pub secret: String,
    pub endpoint: String,
    pub from: String,
    pub to: String,
    /// Pause between the synthesised Ctrl+C and the clipboard read.
    pub settle_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub trigger_button: TriggerButton,
    pub send_copy: bool,
    pub skip_unchanged: bool,
    pub debug_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            appid: String::new(),
            secret: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            from: "en".to_string(),
            to: "zh".to_string(),
            settle_delay_ms: 100,
            request_timeout_secs: 30,
            trigger_button: TriggerButton::Left,
            send_copy: true,
            skip_unchanged: true,
            debug_log: false,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        logger::exe_dir().join(CONFIG_FILE_NAME)
    }

    /// Reads a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg = serde_json::from_str::<Config>(&s)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Writes `config.json` next to the executable.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Applies `TRANSLATE_*` overrides. Empty values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut String); 5] = [
            ("TRANSLATE_APPID", &mut self.appid),
            ("TRANSLATE_SECRET", &mut self.secret),
            ("TRANSLATE_FROM", &mut self.from),
            ("TRANSLATE_TO", &mut self.to),
            ("TRANSLATE_ENDPOINT", &mut self.endpoint),
        ];
        for (key, slot) in fields {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = v;
            }
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.appid.is_empty() && !self.secret.is_empty()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
