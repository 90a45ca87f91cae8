//! TOML-based configuration system.
//!
//! The content script has no filesystem and no settings UI: its only
//! configuration is the `rules.toml` embedded at build time. Every struct
//! implements `Default` with the canonical rule values, so a missing key or a
//! broken embedded file produces the same behavior as the built-in table.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RuleError;

/// Rules shipped inside the binary.
const EMBEDDED_RULES: &str = include_str!("../rules.toml");

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: RulesConfig,
    pub containers: ContainersConfig,
    pub redirect: RedirectConfig,
    pub schedule: ScheduleConfig,
    pub log: LogConfig,
}

/// Leaf patterns: what counts as video-related.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Compared against trimmed, lowercased text.
    pub keywords: Vec<String>,
    pub video_links: Vec<String>,
    pub text_leaves: Vec<String>,
    pub media: Vec<String>,
    pub navigation_landmarks: Vec<String>,
    pub navigation_links: Vec<String>,
    pub sidebar_landmarks: Vec<String>,
    pub sidebar_links: Vec<String>,
    pub sidebar_text_leaves: Vec<String>,
    pub tabs: Vec<String>,
}

/// Ancestor ladders, tried in order, one per pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainersConfig {
    pub text: Vec<String>,
    /// Last-resort wrapper for the text pass, narrowed inside navigation.
    pub text_wrapper: String,
    pub text_wrapper_landmarks: String,
    pub text_wrapper_narrow_to: String,
    pub href: Vec<String>,
    pub media: Vec<String>,
    pub navigation: Vec<String>,
    pub sidebar: Vec<String>,
    pub sidebar_text: Vec<String>,
    pub tab: Vec<String>,
}

/// Blocked routes and where to send the user instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Matched by substring containment against the location path.
    pub blocked_paths: Vec<String>,
    pub target: String,
}

/// Timer periods, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub location_poll_ms: u64,
    pub settle_delay_ms: u64,
    pub debounce_ms: u64,
    pub backup_sweep_ms: u64,
}

/// Logging filter (`tracing_subscriber::EnvFilter` syntax).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls: the canonical rule table
// ─────────────────────────────────────────────────────────────────────────────

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            keywords: strings(&["videos", "reels", "watch", "video", "reel"]),
            video_links: strings(&[
                r#"a[href*="/videos"]"#,
                r#"a[href*="/reel"]"#,
                r#"a[href*="/watch"]"#,
                r#"a[aria-label*="Video"]"#,
                r#"a[aria-label*="Videos"]"#,
                r#"a[aria-label*="Reels"]"#,
                r#"a[aria-label*="Watch"]"#,
            ]),
            text_leaves: strings(&["span", "a", r#"div[role="button"]"#]),
            media: strings(&[
                "video",
                r#"iframe[src*="facebook.com/plugins/video"]"#,
                "div[data-video-id]",
                r#"div[class*="video"]"#,
                r#"div[data-pagelet*="Video"]"#,
            ]),
            navigation_landmarks: strings(&[
                r#"div[role="navigation"]"#,
                "header",
                "nav",
                r#"[data-pagelet*="Navigation"]"#,
            ]),
            navigation_links: strings(&[
                r#"a[href*="/videos"]"#,
                r#"a[href*="/watch"]"#,
                r#"a[aria-label*="Video"]"#,
                r#"a[aria-label*="Watch"]"#,
            ]),
            sidebar_landmarks: strings(&[
                r#"div[role="complementary"]"#,
                r#"div[data-pagelet="RightRail"]"#,
                "aside",
            ]),
            sidebar_links: strings(&[
                r#"a[href*="/videos"]"#,
                r#"a[href*="/watch"]"#,
                r#"a[href*="/reel"]"#,
            ]),
            sidebar_text_leaves: strings(&["span", "a"]),
            tabs: strings(&[
                r#"div[role="tab"][aria-label*="Video"]"#,
                r#"div[role="tab"][aria-label*="Watch"]"#,
                r#"div[role="tab"] a[href*="/videos"]"#,
                r#"div[role="tab"] a[href*="/watch"]"#,
            ]),
        }
    }
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            text: strings(&[
                r#"a[role="link"]"#,
                r#"div[role="menuitem"]"#,
                r#"div[role="listitem"]"#,
                "li",
                r#"div[role="article"]"#,
            ]),
            text_wrapper: r#"div[style*="flex"]"#.to_string(),
            text_wrapper_landmarks: r#"nav, header, [role="navigation"]"#.to_string(),
            text_wrapper_narrow_to: r#"a, div[role="button"]"#.to_string(),
            href: strings(&[
                r#"div[role="article"]"#,
                r#"div[role="menuitem"]"#,
                r#"div[role="listitem"]"#,
                "li",
                r#"div[role="button"]"#,
                "div",
            ]),
            media: strings(&[r#"div[role="article"]"#]),
            navigation: strings(&[r#"div[role="button"]"#, r#"div[role="tab"]"#, "div[tabindex]"]),
            sidebar: strings(&[r#"div[role="listitem"]"#, "li", r#"div[role="article"]"#]),
            sidebar_text: strings(&[r#"div[role="listitem"]"#, "li", "a"]),
            tab: strings(&[r#"div[role="tab"]"#]),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            blocked_paths: strings(&["/videos/", "/reel/", "/watch/"]),
            target: "https://www.facebook.com/".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            location_poll_ms: 500,
            settle_delay_ms: 100,
            debounce_ms: 100,
            backup_sweep_ms: 2000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Parses a TOML document; missing keys take their default value.
    pub fn from_toml(content: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the embedded `rules.toml`. Never panics: returns defaults if
    /// the embedded document does not parse.
    pub fn embedded() -> Self {
        match Self::from_toml(EMBEDDED_RULES) {
            Ok(config) => {
                info!(
                    keywords = config.rules.keywords.len(),
                    video_links = config.rules.video_links.len(),
                    blocked_paths = config.redirect.blocked_paths.len(),
                    "Embedded rules loaded"
                );
                config
            }
            Err(e) => {
                warn!(error = %e, "Invalid embedded rules, using defaults");
                Config::default()
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
