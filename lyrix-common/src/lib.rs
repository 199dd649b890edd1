//! # Lyrix Common Library
//!
//! Shared code for the Lyrix lyric bridge including:
//! - Lyric model (songs, rich lines, words) and normalization
//! - Timed-entry lookup (`TimingNavigator`)
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod lyric;
pub mod timing;

pub use error::{Error, Result};
pub use lyric::{LinkedLine, LyricMetadata, LyricWord, RichLyricLine, Song};
pub use timing::{TimedEntry, TimingNavigator};
