//! Lyric display listener
//!
//! Tracks what should be on screen for the active source: the lines active at
//! the current position (or the last sung line during a gap), optionally with
//! their translations, or free text when the source is in text mode.

use crate::identity::SourceIdentity;
use crate::listener::ActiveSourceListener;
use lyrix_common::lyric::link_lines;
use lyrix_common::{LinkedLine, RichLyricLine, Song, TimingNavigator};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// What the display currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFrame {
    /// Rendered active lines, in sequence order
    pub lines: Vec<String>,
    /// Line after the last active one, if any
    pub upcoming: Option<String>,
}

struct DisplayState {
    source: Option<SourceIdentity>,
    navigator: TimingNavigator<LinkedLine>,
    text: Option<String>,
    show_translation: bool,
    is_playing: bool,
    position: i64,
    frame: DisplayFrame,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            source: None,
            navigator: TimingNavigator::new(Vec::new()),
            text: None,
            show_translation: false,
            is_playing: false,
            position: -1,
            frame: DisplayFrame::default(),
        }
    }
}

/// Listener that renders the active source's lyrics at its reported position
#[derive(Default)]
pub struct LyricDisplay {
    state: Mutex<DisplayState>,
}

impl LyricDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what is on screen
    pub fn frame(&self) -> DisplayFrame {
        self.lock().frame.clone()
    }

    pub fn current_lines(&self) -> Vec<String> {
        self.lock().frame.lines.clone()
    }

    pub fn active_source(&self) -> Option<SourceIdentity> {
        self.lock().source.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing
    }

    fn lock(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn show(state: &mut DisplayState, frame: DisplayFrame) {
        if state.frame != frame {
            if frame.lines.is_empty() {
                debug!("Display cleared");
            } else {
                info!("Display: {}", frame.lines.join(" | "));
            }
            state.frame = frame;
        }
    }

    fn refresh(state: &mut DisplayState) {
        if let Some(text) = &state.text {
            let frame = DisplayFrame {
                lines: vec![text.clone()],
                upcoming: None,
            };
            Self::show(state, frame);
            return;
        }
        if state.position < 0 {
            Self::show(state, DisplayFrame::default());
            return;
        }

        let show_translation = state.show_translation;
        let mut lines = Vec::new();
        let mut next = None;
        state
            .navigator
            .for_each_at_or_previous(state.position, |linked| {
                lines.push(render(&linked.line, show_translation));
                next = linked.next;
            });

        let upcoming = next
            .and_then(|i| state.navigator.entries().get(i))
            .and_then(|linked| linked.line.text.clone());
        Self::show(state, DisplayFrame { lines, upcoming });
    }
}

fn render(line: &RichLyricLine, show_translation: bool) -> String {
    let mut rendered = line.text.clone().unwrap_or_default();
    if let Some(secondary) = &line.secondary {
        rendered.push_str(" (");
        rendered.push_str(secondary);
        rendered.push(')');
    }
    if show_translation {
        if let Some(translation) = &line.translation {
            rendered.push_str(" / ");
            rendered.push_str(translation);
        }
    }
    rendered
}

impl ActiveSourceListener for LyricDisplay {
    fn on_active_source_changed(&self, source: Option<&SourceIdentity>) {
        let mut state = self.lock();
        state.source = source.cloned();
        if source.is_none() {
            state.navigator.set_entries(Vec::new());
            state.text = None;
            state.is_playing = false;
            state.position = -1;
            Self::show(&mut state, DisplayFrame::default());
        }
    }

    fn on_song_changed(&self, song: Option<&Arc<Song>>) {
        let mut state = self.lock();
        let lines = song.map(|s| s.lines().to_vec()).unwrap_or_default();
        debug!("Display loading {} lines", lines.len());
        state.navigator.set_entries(link_lines(lines));
        state.text = None;
        Self::refresh(&mut state);
    }

    fn on_playback_state_changed(&self, is_playing: bool) {
        self.lock().is_playing = is_playing;
    }

    fn on_position_changed(&self, position: i64) {
        let mut state = self.lock();
        state.position = position;
        Self::refresh(&mut state);
    }

    fn on_seek_to(&self, position: i64) {
        let mut state = self.lock();
        state.position = position;
        state.navigator.reset_cache();
        Self::refresh(&mut state);
    }

    fn on_post_text(&self, text: Option<&str>) {
        let mut state = self.lock();
        state.text = text.map(str::to_string);
        state.navigator.set_entries(Vec::new());
        Self::refresh(&mut state);
    }

    fn on_display_translation_changed(&self, display_translation: bool) {
        let mut state = self.lock();
        state.show_translation = display_translation;
        Self::refresh(&mut state);
    }
}
