//! Active-source arbitration
//!
//! Several player sources report events concurrently, but only one of them
//! drives the display at a time. [`ActiveSourceDispatcher`] decides, per
//! event, whether the reporting source is (or may become) the active one and
//! fans accepted events out to every registered [`ActiveSourceListener`].
//!
//! # Preemption Rules
//!
//! With `current` the active identity and `recorder` the reporting source's
//! state (already updated with the event payload):
//!
//! | situation                                  | outcome                       |
//! |--------------------------------------------|-------------------------------|
//! | `recorder` is `current`                    | deliver; track its playing    |
//! | no active source                           | switch, resync, deliver       |
//! | active paused, `recorder` playing          | switch, resync, deliver       |
//! | anything else                              | drop                          |
//!
//! A switch broadcasts `on_active_source_changed(Some(identity))` followed by
//! a replay of the new source's cached state, so listeners never observe the
//! new source's events against the old source's song. A `SongChanged` that
//! caused the switch is not re-delivered; the replay already carried it.
//!
//! # Locking
//!
//! The decision and every `ActiveState` mutation happen under one write
//! lock, producing a broadcast plan. Listener callbacks run after the lock is
//! released, against a snapshot of the listener set, so a callback may call
//! back into the dispatcher.

use crate::event::PlayerEvent;
use crate::identity::SourceIdentity;
use crate::listener::ActiveSourceListener;
use crate::recorder::SourceRecorder;
use lyrix_common::Song;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, trace};

/// Which source owns the display
///
/// Invariant: `active_is_playing` implies `active_identity.is_some()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ActiveState {
    active_identity: Option<SourceIdentity>,
    active_is_playing: bool,
}

impl ActiveState {
    fn clear(&mut self) {
        self.active_identity = None;
        self.active_is_playing = false;
    }
}

/// Broadcasts decided under the state lock, performed after it is released
#[derive(Debug, Default)]
struct DispatchPlan {
    /// Identity that just became active
    switched_to: Option<SourceIdentity>,
    /// Cached state replayed after a switch, in delivery order
    resync: Vec<PlayerEvent>,
    deliver_original: bool,
}

type ListenerSet = Arc<Vec<Arc<dyn ActiveSourceListener>>>;

/// Preemptive focus arbiter over N player sources
///
/// Constructed once by the composition root and shared as
/// `Arc<ActiveSourceDispatcher>` with every session.
///
/// # Examples
///
/// ```
/// use lyrix_central::{ActiveSourceDispatcher, SourceIdentity, SourceRecorder};
///
/// let dispatcher = ActiveSourceDispatcher::new();
/// let mut recorder = SourceRecorder::new(SourceIdentity::new("org.provider", "com.player"));
///
/// recorder.set_playing(true);
/// dispatcher.on_playback_state_changed(&recorder, true);
///
/// assert_eq!(dispatcher.active_source().as_ref(), Some(recorder.identity()));
/// assert!(dispatcher.active_is_playing());
/// ```
#[derive(Default)]
pub struct ActiveSourceDispatcher {
    state: RwLock<ActiveState>,
    listeners: RwLock<ListenerSet>,
}

impl ActiveSourceDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Listener management
    // ========================================================================

    /// Add a listener; registering the same `Arc` twice is a no-op
    pub fn register_listener(&self, listener: Arc<dyn ActiveSourceListener>) {
        let mut guard = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if guard.iter().any(|l| same_listener(l, &listener)) {
            return;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
        debug!("Listener registered ({} total)", guard.len());
    }

    /// Remove a listener; unknown listeners are ignored
    pub fn unregister_listener(&self, listener: &Arc<dyn ActiveSourceListener>) {
        let mut guard = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|l| same_listener(l, listener)) {
            return;
        }
        let next: Vec<_> = guard
            .iter()
            .filter(|l| !same_listener(l, listener))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        debug!("Listener unregistered ({} remaining)", guard.len());
    }

    pub fn listener_count(&self) -> usize {
        self.snapshot_listeners().len()
    }

    // ========================================================================
    // State accessors
    // ========================================================================

    /// Identity currently owning the display, if any
    pub fn active_source(&self) -> Option<SourceIdentity> {
        self.read_state().active_identity.clone()
    }

    /// Whether the active source last reported playing
    pub fn active_is_playing(&self) -> bool {
        self.read_state().active_is_playing
    }

    // ========================================================================
    // Source lifecycle
    // ========================================================================

    /// A source went away (unregistered or its connection died)
    ///
    /// Clears the active state and broadcasts `on_active_source_changed(None)`
    /// only when `identity` was active, so repeated calls broadcast at most once.
    ///
    /// # Returns
    /// `true` if `identity` was the active source
    pub fn notify_source_invalid(&self, identity: &SourceIdentity) -> bool {
        let was_active = {
            let mut state = self.write_state();
            if state.active_identity.as_ref() == Some(identity) {
                state.clear();
                true
            } else {
                false
            }
        };

        if was_active {
            info!("Active source {} invalidated", identity);
            self.broadcast(|l| l.on_active_source_changed(None));
        } else {
            debug!("Ignoring invalidation of inactive source {}", identity);
        }
        was_active
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    pub fn on_song_changed(&self, recorder: &SourceRecorder, song: Option<Arc<Song>>) {
        self.dispatch(recorder, PlayerEvent::SongChanged(song));
    }

    pub fn on_playback_state_changed(&self, recorder: &SourceRecorder, is_playing: bool) {
        self.dispatch(recorder, PlayerEvent::PlaybackStateChanged(is_playing));
    }

    pub fn on_position_changed(&self, recorder: &SourceRecorder, position: i64) {
        self.dispatch(recorder, PlayerEvent::PositionChanged(position));
    }

    pub fn on_seek_to(&self, recorder: &SourceRecorder, position: i64) {
        self.dispatch(recorder, PlayerEvent::SeekTo(position));
    }

    pub fn on_post_text(&self, recorder: &SourceRecorder, text: Option<String>) {
        self.dispatch(recorder, PlayerEvent::PostText(text));
    }

    pub fn on_display_translation_changed(&self, recorder: &SourceRecorder, display: bool) {
        self.dispatch(recorder, PlayerEvent::DisplayTranslationChanged(display));
    }

    /// Route one event from `recorder`'s source through the preemption rules
    ///
    /// # Arguments
    /// * `recorder` - Reporting source's state, already reflecting `event`
    /// * `event` - The event to deliver if the source is or becomes active
    pub fn dispatch(&self, recorder: &SourceRecorder, event: PlayerEvent) {
        self.dispatch_unless(recorder, event, None);
    }

    /// Like [`dispatch`](Self::dispatch), but drops the event if `released`
    /// is set when the decision is taken
    ///
    /// The flag is read under the state lock, so a source released before
    /// [`notify_source_invalid`](Self::notify_source_invalid) can never
    /// become active again through an event already in flight.
    pub(crate) fn dispatch_unless_released(
        &self,
        recorder: &SourceRecorder,
        event: PlayerEvent,
        released: &AtomicBool,
    ) {
        self.dispatch_unless(recorder, event, Some(released));
    }

    fn dispatch_unless(
        &self,
        recorder: &SourceRecorder,
        event: PlayerEvent,
        released: Option<&AtomicBool>,
    ) {
        let plan = self.plan(recorder, &event, released);

        if let Some(identity) = &plan.switched_to {
            info!("Active source switched to {}", identity);
            self.broadcast(|l| l.on_active_source_changed(Some(identity)));
            for resync_event in &plan.resync {
                self.broadcast(|l| resync_event.deliver_to(l));
            }
        }

        if plan.deliver_original {
            trace!("Delivering {} from {}", event.event_type(), recorder.identity());
            self.broadcast(|l| event.deliver_to(l));
        } else {
            trace!(
                "Dropping {} from inactive source {}",
                event.event_type(),
                recorder.identity()
            );
        }
    }

    fn plan(
        &self,
        recorder: &SourceRecorder,
        event: &PlayerEvent,
        released: Option<&AtomicBool>,
    ) -> DispatchPlan {
        let mut state = self.write_state();
        if released.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            return DispatchPlan::default();
        }
        let identity = recorder.identity();

        if state.active_identity.as_ref() == Some(identity) {
            state.active_is_playing = recorder.last_playing();
            return DispatchPlan {
                deliver_original: true,
                ..Default::default()
            };
        }

        let can_switch = state.active_identity.is_none()
            || (!state.active_is_playing && recorder.last_playing());
        if !can_switch {
            return DispatchPlan::default();
        }

        state.active_identity = Some(identity.clone());
        state.active_is_playing = recorder.last_playing();

        DispatchPlan {
            switched_to: Some(identity.clone()),
            resync: resync_events(recorder, state.active_is_playing),
            deliver_original: !event.is_covered_by_resync(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Invoke `call` on every listener, isolating panics per listener
    fn broadcast<F>(&self, call: F)
    where
        F: Fn(&dyn ActiveSourceListener),
    {
        let listeners = self.snapshot_listeners();
        for listener in listeners.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| call(listener.as_ref())));
            if let Err(payload) = result {
                error!(
                    "Listener panicked during broadcast: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn snapshot_listeners(&self) -> ListenerSet {
        Arc::clone(&self.listeners.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ActiveState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ActiveState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Replay of a newly active source's cached state
fn resync_events(recorder: &SourceRecorder, active_is_playing: bool) -> Vec<PlayerEvent> {
    if let Some(text) = recorder.last_text() {
        return vec![PlayerEvent::PostText(Some(text.to_string()))];
    }
    vec![
        PlayerEvent::PlaybackStateChanged(active_is_playing),
        PlayerEvent::SongChanged(recorder.last_song().cloned()),
        PlayerEvent::PositionChanged(recorder.last_position()),
        PlayerEvent::DisplayTranslationChanged(recorder.last_display_translation()),
    ]
}

fn same_listener(a: &Arc<dyn ActiveSourceListener>, b: &Arc<dyn ActiveSourceListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
