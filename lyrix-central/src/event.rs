//! Player event kinds
//!
//! Every inbound source event is resolved into one [`PlayerEvent`] variant at
//! the session boundary; the dispatcher works only with this enum.

use crate::listener::ActiveSourceListener;
use lyrix_common::Song;
use std::sync::Arc;

/// One event reported by a player source
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// New song (already normalized), or None when the player has no song
    SongChanged(Option<Arc<Song>>),

    /// Play/pause
    PlaybackStateChanged(bool),

    /// Periodic position report from the fast path (milliseconds)
    PositionChanged(i64),

    /// Explicit seek (milliseconds, >= 0)
    SeekTo(i64),

    /// Free text replacing lyrics
    PostText(Option<String>),

    /// Translation line visibility toggled
    DisplayTranslationChanged(bool),
}

impl PlayerEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::SongChanged(_) => "SongChanged",
            PlayerEvent::PlaybackStateChanged(_) => "PlaybackStateChanged",
            PlayerEvent::PositionChanged(_) => "PositionChanged",
            PlayerEvent::SeekTo(_) => "SeekTo",
            PlayerEvent::PostText(_) => "PostText",
            PlayerEvent::DisplayTranslationChanged(_) => "DisplayTranslationChanged",
        }
    }

    /// Whether the post-switch resync already conveys this event
    ///
    /// Re-delivering a song right after the resync broadcast it would make the
    /// display load the same song twice.
    pub fn is_covered_by_resync(&self) -> bool {
        matches!(self, PlayerEvent::SongChanged(_))
    }

    /// Invoke the listener method matching this event
    pub fn deliver_to(&self, listener: &dyn ActiveSourceListener) {
        match self {
            PlayerEvent::SongChanged(song) => listener.on_song_changed(song.as_ref()),
            PlayerEvent::PlaybackStateChanged(playing) => {
                listener.on_playback_state_changed(*playing)
            }
            PlayerEvent::PositionChanged(position) => listener.on_position_changed(*position),
            PlayerEvent::SeekTo(position) => listener.on_seek_to(*position),
            PlayerEvent::PostText(text) => listener.on_post_text(text.as_deref()),
            PlayerEvent::DisplayTranslationChanged(display) => {
                listener.on_display_translation_changed(*display)
            }
        }
    }
}
