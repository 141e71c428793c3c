//! # presence-settings
//!
//! Layered configuration for the presence relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PresenceSettings::default()`]
//! 2. **Settings file**: `~/.presence/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT` and `PRESENCE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{LoggingSettings, PresenceSettings, ServerSettings};
