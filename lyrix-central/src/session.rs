//! Per-source session
//!
//! A [`PlayerSession`] is what a registered source talks to. It owns the
//! source's [`SourceRecorder`], turns each inbound call into a
//! [`PlayerEvent`], and hands the dispatcher a snapshot of the recorder taken
//! after the update. The recorder mutex is never held across a dispatch.
//!
//! While the source reports playing, a [`PositionPump`] samples the session's
//! [`PositionCell`] and feeds positions into the same dispatch path.

use crate::dispatcher::ActiveSourceDispatcher;
use crate::event::PlayerEvent;
use crate::identity::SourceIdentity;
use crate::position::{PositionCell, PositionPump};
use crate::recorder::SourceRecorder;
use crate::Result;
use lyrix_common::config::CentralConfig;
use lyrix_common::Song;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Position pump settings and the running pump, if any
struct PumpSlot {
    interval: Duration,
    pump: Option<PositionPump>,
}

/// Inbound surface for one registered player source
pub struct PlayerSession {
    session_id: Uuid,
    identity: SourceIdentity,
    recorder: Arc<Mutex<SourceRecorder>>,
    dispatcher: Arc<ActiveSourceDispatcher>,
    position: Arc<PositionCell>,
    runtime: Handle,
    pump: Mutex<PumpSlot>,
    min_interval_ms: u64,
    /// Shared with the pump tasks so in-flight samples are dropped on release
    released: Arc<AtomicBool>,
}

impl PlayerSession {
    /// Create a session for `identity`
    ///
    /// # Arguments
    /// * `identity` - Source this session reports for
    /// * `dispatcher` - Shared arbitrator
    /// * `config` - Supplies the initial and minimum position intervals
    /// * `runtime` - Runtime the position pump is spawned on
    pub fn new(
        identity: SourceIdentity,
        dispatcher: Arc<ActiveSourceDispatcher>,
        config: &CentralConfig,
        runtime: Handle,
    ) -> Self {
        let session_id = Uuid::new_v4();
        debug!("Session {} created for {}", session_id, identity);
        Self {
            session_id,
            recorder: Arc::new(Mutex::new(SourceRecorder::new(identity.clone()))),
            identity,
            dispatcher,
            position: Arc::new(PositionCell::new()),
            runtime,
            pump: Mutex::new(PumpSlot {
                interval: config.position_update_interval(),
                pump: None,
            }),
            min_interval_ms: config.min_position_update_interval_ms,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn identity(&self) -> &SourceIdentity {
        &self.identity
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Copy of the recorder's current state
    pub fn recorder_snapshot(&self) -> SourceRecorder {
        lock(&self.recorder).clone()
    }

    /// Cell the source writes its playback position into
    pub fn position_cell(&self) -> Arc<PositionCell> {
        Arc::clone(&self.position)
    }

    pub fn position_update_interval(&self) -> Duration {
        lock(&self.pump).interval
    }

    /// Whether the position pump is currently running
    pub fn is_position_pump_running(&self) -> bool {
        lock(&self.pump).pump.is_some()
    }

    // ========================================================================
    // Source events
    // ========================================================================

    /// Replace the current song; lines are normalized before caching
    pub fn set_song(&self, song: Option<Song>) {
        if self.ignore_released("set_song") {
            return;
        }
        let song = song.map(|s| Arc::new(s.normalize()));
        if let Some(s) = &song {
            info!(
                "{}: song changed ({} lines)",
                self.identity,
                s.lines().len()
            );
        } else {
            info!("{}: song cleared", self.identity);
        }
        self.apply(
            |rec| rec.set_song(song.clone()),
            PlayerEvent::SongChanged(song.clone()),
        );
    }

    /// Decode a JSON song payload and apply it
    ///
    /// A payload that fails to decode is dropped: the cached song is kept and
    /// nothing is dispatched.
    pub fn set_song_json(&self, bytes: &[u8]) -> Result<()> {
        if self.ignore_released("set_song_json") {
            return Ok(());
        }
        match Song::from_json_slice(bytes) {
            Ok(song) => {
                self.set_song(Some(song));
                Ok(())
            }
            Err(e) => {
                warn!("{}: dropping undecodable song payload: {}", self.identity, e);
                Err(e.into())
            }
        }
    }

    /// Report play/pause; starts or stops the position pump
    pub fn set_playback_state(&self, is_playing: bool) {
        if !self.apply(
            |rec| rec.set_playing(is_playing),
            PlayerEvent::PlaybackStateChanged(is_playing),
        ) {
            return;
        }

        // release() sets the flag before taking this lock
        let mut slot = lock(&self.pump);
        if self.is_released() {
            return;
        }
        if is_playing {
            if slot.pump.is_none() {
                slot.pump = Some(self.spawn_pump(slot.interval));
            }
        } else if let Some(pump) = slot.pump.take() {
            pump.stop();
        }
    }

    /// Report an explicit seek; negative positions are treated as 0
    pub fn seek_to(&self, position: i64) {
        let position = position.max(0);
        self.apply(
            |rec| rec.set_position(position),
            PlayerEvent::SeekTo(position),
        );
    }

    /// Show free text instead of lyrics (clears the cached song)
    pub fn send_text(&self, text: Option<String>) {
        self.apply(
            |rec| rec.set_text(text.clone()),
            PlayerEvent::PostText(text.clone()),
        );
    }

    pub fn set_display_translation(&self, display: bool) {
        self.apply(
            |rec| rec.set_display_translation(display),
            PlayerEvent::DisplayTranslationChanged(display),
        );
    }

    /// Change the position sampling interval
    ///
    /// Values below the configured minimum are raised to it. A running pump is
    /// replaced, so exactly one pump exists afterwards.
    pub fn set_position_update_interval(&self, interval_ms: u64) {
        if self.ignore_released("set_position_update_interval") {
            return;
        }
        let interval = Duration::from_millis(interval_ms.max(self.min_interval_ms));

        let mut slot = lock(&self.pump);
        slot.interval = interval;
        if self.is_released() {
            return;
        }
        if let Some(old) = slot.pump.take() {
            old.stop();
            slot.pump = Some(self.spawn_pump(interval));
        }
        debug!(
            "{}: position interval set to {}ms",
            self.identity,
            interval.as_millis()
        );
    }

    /// Stop the pump and refuse further events
    ///
    /// The flag is raised before the pump is aborted, so a sample already
    /// read by the pump is neither recorded nor dispatched.
    ///
    /// # Returns
    /// `false` if the session was already released
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(pump) = lock(&self.pump).pump.take() {
            pump.stop();
        }
        info!("Session {} for {} released", self.session_id, self.identity);
        true
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Update the recorder, then dispatch `event` with a snapshot
    ///
    /// Returns `false` (and does nothing) once released.
    fn apply<F>(&self, update: F, event: PlayerEvent) -> bool
    where
        F: FnOnce(&mut SourceRecorder),
    {
        if self.ignore_released(event.event_type()) {
            return false;
        }
        let snapshot = {
            let mut recorder = lock(&self.recorder);
            update(&mut recorder);
            recorder.clone()
        };
        self.dispatcher
            .dispatch_unless_released(&snapshot, event, &self.released);
        true
    }

    fn ignore_released(&self, operation: &str) -> bool {
        let released = self.is_released();
        if released {
            debug!("{}: ignoring {} on released session", self.identity, operation);
        }
        released
    }

    fn spawn_pump(&self, interval: Duration) -> PositionPump {
        let sample_recorder = Arc::clone(&self.recorder);
        let deliver_recorder = Arc::clone(&self.recorder);
        let dispatcher = Arc::clone(&self.dispatcher);
        let sample_released = Arc::clone(&self.released);
        let deliver_released = Arc::clone(&self.released);

        PositionPump::spawn(
            &self.runtime,
            Arc::clone(&self.position),
            interval,
            move |position| {
                if !sample_released.load(Ordering::Acquire) {
                    lock(&sample_recorder).set_position(position);
                }
            },
            move |position| {
                if deliver_released.load(Ordering::Acquire) {
                    return;
                }
                let snapshot = lock(&deliver_recorder).clone();
                dispatcher.dispatch_unless_released(
                    &snapshot,
                    PlayerEvent::PositionChanged(position),
                    &deliver_released,
                );
            },
        )
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
