//! phrasesync core library.
//!
//! This crate provides the foundational components for keeping nested locale
//! files in sync with a remote translation service: the three-way tree merge,
//! locale file codecs, configuration, the PhraseApp client, and the updater
//! workflows built on top of them.

pub mod config;
pub mod errors;
pub mod locale;
pub mod merge;
pub mod phraseapp;
pub mod updater;

// Re-exports for convenience.
pub use config::AppConfig;
pub use errors::CoreError;
pub use locale::{FileFormat, LocaleFile};
pub use merge::{merge, MergeEngine, Tree};
pub use phraseapp::{PhraseAppClient, TranslationRemote};
pub use updater::LocaleUpdater;
