//! Lyric model types
//!
//! Songs carry an optional list of rich lyric lines; each line and word is a
//! [`TimedEntry`](crate::timing::TimedEntry) so it can be looked up with a
//! [`TimingNavigator`](crate::timing::TimingNavigator).

mod linked;
mod song;

pub use linked::{link_lines, LinkedLine};
pub use song::{LyricMetadata, LyricWord, RichLyricLine, Song};
