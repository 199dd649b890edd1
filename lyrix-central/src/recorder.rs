//! Per-source cache of the last reported state
//!
//! The dispatcher consults the recorder to decide whether a source may take
//! over the display, and replays it to listeners after a switch.

use crate::identity::SourceIdentity;
use lyrix_common::Song;
use std::sync::Arc;

/// Last known state of one player source
///
/// A source is either in *song* mode or in *text* mode: storing a song clears
/// the cached text and storing text clears the cached song.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecorder {
    identity: SourceIdentity,
    last_song: Option<Arc<Song>>,
    last_text: Option<String>,
    last_playing: bool,
    /// Milliseconds; -1 until the source reports a position
    last_position: i64,
    last_display_translation: bool,
}

impl SourceRecorder {
    pub fn new(identity: SourceIdentity) -> Self {
        Self {
            identity,
            last_song: None,
            last_text: None,
            last_playing: false,
            last_position: -1,
            last_display_translation: false,
        }
    }

    pub fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    pub fn last_song(&self) -> Option<&Arc<Song>> {
        self.last_song.as_ref()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    pub fn last_playing(&self) -> bool {
        self.last_playing
    }

    pub fn last_position(&self) -> i64 {
        self.last_position
    }

    pub fn last_display_translation(&self) -> bool {
        self.last_display_translation
    }

    /// Enter song mode (clears any cached text)
    pub fn set_song(&mut self, song: Option<Arc<Song>>) {
        self.last_song = song;
        self.last_text = None;
    }

    /// Enter text mode (clears any cached song)
    pub fn set_text(&mut self, text: Option<String>) {
        self.last_text = text;
        self.last_song = None;
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.last_playing = playing;
    }

    pub fn set_position(&mut self, position: i64) {
        self.last_position = position;
    }

    pub fn set_display_translation(&mut self, display: bool) {
        self.last_display_translation = display;
    }
}
