//! Listener interface for consumers of the active source

use crate::identity::SourceIdentity;
use lyrix_common::Song;
use std::sync::Arc;

/// Receives events from whichever source currently owns the display
///
/// Callbacks run on the thread that produced the event, outside the
/// dispatcher's lock, so implementations may call back into the dispatcher
/// (e.g. to unregister themselves). A panicking callback is caught and logged;
/// other listeners still receive the event.
///
/// All methods default to no-ops.
pub trait ActiveSourceListener: Send + Sync {
    /// The active source changed; `None` when the active source went away
    fn on_active_source_changed(&self, _source: Option<&SourceIdentity>) {}

    fn on_song_changed(&self, _song: Option<&Arc<Song>>) {}

    fn on_playback_state_changed(&self, _is_playing: bool) {}

    /// Periodic position report (milliseconds)
    fn on_position_changed(&self, _position: i64) {}

    /// Explicit seek (milliseconds)
    fn on_seek_to(&self, _position: i64) {}

    /// Free text replacing lyrics (e.g. a status line)
    fn on_post_text(&self, _text: Option<&str>) {}

    fn on_display_translation_changed(&self, _display_translation: bool) {}
}
