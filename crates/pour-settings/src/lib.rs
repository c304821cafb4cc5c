//! # pour-settings
//!
//! Configuration management with layered sources for the Pour gateway.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** - [`PourSettings::default()`]
//! 2. **Settings file** - `~/.pour/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables** - `POUR_*` overrides (highest priority)
//!
//! There is no global singleton: the binary loads settings once and passes
//! them down explicitly.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
