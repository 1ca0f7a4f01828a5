//! Binding configuration
//!
//! Read from a TOML file next to the generated module:
//!
//! ```toml
//! [strings]
//! encoding = "gb18030"
//! overflow = "truncate"
//!
//! [callbacks]
//! mode = "direct"
//! autostart_dispatcher = true
//! ```
//!
//! Every section and key is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::dispatch::{self, CallbackMode};
use crate::errors::{BindError, BindResult};
use crate::logging::info;
use crate::transforms::strings::{set_active_codec, OverflowPolicy, StringCodec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    #[serde(default)]
    pub strings: StringsConfig,

    #[serde(default)]
    pub callbacks: CallbacksConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringsConfig {
    /// WHATWG label of the native character encoding
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbacksConfig {
    /// Mode for callbacks bound as bare function pointers
    #[serde(default)]
    pub mode: CallbackMode,

    #[serde(default = "default_true")]
    pub autostart_dispatcher: bool,
}

impl Default for StringsConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            overflow: OverflowPolicy::Reject,
        }
    }
}

impl Default for CallbacksConfig {
    fn default() -> Self {
        Self {
            mode: CallbackMode::Async,
            autostart_dispatcher: true,
        }
    }
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

impl BindConfig {
    pub fn from_file(path: &Path) -> BindResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| BindError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> BindResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| BindError::Config {
            message: e.to_string(),
        })?;
        config.codec()?;
        Ok(config)
    }

    /// Codec described by the `[strings]` section
    pub fn codec(&self) -> BindResult<StringCodec> {
        StringCodec::new(&self.strings.encoding, self.strings.overflow)
    }

    /// Install the codec and the default callback mode process-wide
    pub fn apply(&self) -> BindResult<()> {
        let codec = self.codec()?;
        set_active_codec(codec);
        dispatch::set_default_mode(self.callbacks.mode);
        info!(
            event = "config_applied",
            encoding = codec.encoding_name(),
            overflow = ?self.strings.overflow,
            mode = ?self.callbacks.mode,
            "Binding configuration applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(BindConfig::from_toml_str("").unwrap(), BindConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = BindConfig::from_toml_str(
            r#"
            [strings]
            overflow = "truncate"

            [callbacks]
            mode = "direct"
            "#,
        )
        .unwrap();
        assert_eq!(config.strings.encoding, "utf-8");
        assert_eq!(config.strings.overflow, OverflowPolicy::Truncate);
        assert_eq!(config.callbacks.mode, CallbackMode::Direct);
        assert!(config.callbacks.autostart_dispatcher);
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let err = BindConfig::from_toml_str("[strings]\nencoding = \"klingon\"\n").unwrap_err();
        assert!(matches!(err, BindError::UnknownEncoding { .. }));
    }

    #[test]
    fn test_bad_mode_rejected() {
        let err = BindConfig::from_toml_str("[callbacks]\nmode = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, BindError::Config { .. }));
    }
}
