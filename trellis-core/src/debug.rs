//! Debug Channels
//!
//! Named logging channels that forward to `tracing`. Which channels and
//! levels actually emit is decided by a [`DebugConfig`] owned by a
//! [`DebugHub`]; the hub travels through the application context, so every
//! app (and every test) has its own filter.
//!
//! # Filter syntax
//!
//! The filter is a list of channel patterns separated by commas or
//! whitespace. `*` matches any run of characters. A pattern prefixed with `-`
//! excludes matching channels, and excludes win over includes.
//!
//! ```text
//! "*"                   every channel
//! "trellis, counter*"   the framework channel and anything starting with "counter"
//! "*, -noisy"           everything except "noisy"
//! ```

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the channel the framework itself logs on.
pub const FRAMEWORK_CHANNEL: &str = "trellis";

/// Log levels a channel can emit at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Log,
    Warn,
    Error,
}

/// Which channels and levels are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Channel patterns.
    pub filter: String,

    /// Emit `log` messages.
    pub log: bool,

    /// Emit `warn` messages.
    pub warn: bool,

    /// Emit `error` messages.
    pub error: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            filter: "*".to_string(),
            log: false,
            warn: true,
            error: true,
        }
    }
}

impl DebugConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::UnexpectedShape {
            expected: "a debug config object",
            actual: e.to_string(),
        })
    }

    /// Whether messages at `level` are emitted at all.
    pub fn level_enabled(&self, level: Level) -> bool {
        match level {
            Level::Log => self.log,
            Level::Warn => self.warn,
            Level::Error => self.error,
        }
    }

    /// Whether the filter lets `channel` through.
    pub fn channel_enabled(&self, channel: &str) -> bool {
        let mut included = false;
        for pattern in self
            .filter
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
        {
            if let Some(excluded) = pattern.strip_prefix('-') {
                if wildcard_match(excluded, channel) {
                    return false;
                }
            } else if wildcard_match(pattern, channel) {
                included = true;
            }
        }
        included
    }
}

/// Match `text` against a pattern where `*` stands for any run of characters.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No `*` in the pattern.
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Owner of the debug configuration; hands out channels.
///
/// Cloning clones the handle, so config changes are seen by every channel.
#[derive(Debug, Clone, Default)]
pub struct DebugHub {
    config: Rc<RefCell<DebugConfig>>,
}

impl DebugHub {
    pub fn new(config: DebugConfig) -> Self {
        Self {
            config: Rc::new(RefCell::new(config)),
        }
    }

    pub fn config(&self) -> DebugConfig {
        self.config.borrow().clone()
    }

    /// Replace the configuration for every channel of this hub.
    pub fn set_config(&self, config: DebugConfig) {
        *self.config.borrow_mut() = config;
    }

    /// A channel with the given name.
    pub fn channel(&self, name: impl Into<String>) -> DebugChannel {
        DebugChannel {
            name: name.into(),
            hub: self.clone(),
        }
    }

    fn enabled(&self, channel: &str, level: Level) -> bool {
        let config = self.config.borrow();
        config.level_enabled(level) && config.channel_enabled(channel)
    }
}

/// A named logging channel.
#[derive(Debug, Clone)]
pub struct DebugChannel {
    name: String,
    hub: DebugHub,
}

impl DebugChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a message at `level` would be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        self.hub.enabled(&self.name, level)
    }

    pub fn log(&self, message: impl Display) {
        if self.enabled(Level::Log) {
            tracing::debug!(channel = %self.name, "{message}");
        }
    }

    pub fn warn(&self, message: impl Display) {
        if self.enabled(Level::Warn) {
            tracing::warn!(channel = %self.name, "{message}");
        }
    }

    pub fn error(&self, message: impl Display) {
        if self.enabled(Level::Error) {
            tracing::error!(channel = %self.name, "{message}");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(filter: &str) -> DebugConfig {
        DebugConfig {
            filter: filter.to_string(),
            log: true,
            ..DebugConfig::default()
        }
    }

    #[test]
    fn wildcard_patterns() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("counter*", "counter:list"));
        assert!(wildcard_match("*list", "counter:list"));
        assert!(wildcard_match("c*:*t", "counter:list"));
        assert!(!wildcard_match("counter", "counter:list"));
        assert!(!wildcard_match("list*", "counter:list"));
    }

    #[test]
    fn excludes_win_over_includes() {
        let config = config("*, -noisy*");
        assert!(config.channel_enabled("app"));
        assert!(!config.channel_enabled("noisy"));
        assert!(!config.channel_enabled("noisy:child"));
    }

    #[test]
    fn empty_filter_disables_everything() {
        assert!(!config("").channel_enabled("app"));
    }

    #[test]
    fn default_config_hides_log_level() {
        let hub = DebugHub::default();
        let channel = hub.channel("app");
        assert!(!channel.enabled(Level::Log));
        assert!(channel.enabled(Level::Warn));
        assert!(channel.enabled(Level::Error));
    }

    #[test]
    fn channels_see_config_changes() {
        let hub = DebugHub::new(config("app"));
        let app = hub.channel("app");
        let other = hub.channel("other");
        assert!(app.enabled(Level::Log));
        assert!(!other.enabled(Level::Log));

        hub.set_config(config("other"));
        assert!(!app.enabled(Level::Log));
        assert!(other.enabled(Level::Log));
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config = DebugConfig::from_json(r#"{"filter": "app", "log": true}"#).unwrap();
        assert_eq!(config.filter, "app");
        assert!(config.log);
        assert!(config.warn);

        assert!(DebugConfig::from_json("[1, 2]").is_err());
    }
}
