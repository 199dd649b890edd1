//! # Lyrix Central Library (lyrix-central)
//!
//! Decides which of several concurrently reporting player sources drives the
//! lyric display, and fans the winning source's events out to listeners.
//!
//! **Architecture:** sources register with a [`SourceRegistry`] and receive a
//! [`PlayerSession`]. Sessions keep a per-source [`SourceRecorder`] and forward
//! every event to the single [`ActiveSourceDispatcher`], which applies the
//! preemption rules and notifies [`ActiveSourceListener`]s.

pub mod dispatcher;
pub mod display;
pub mod error;
pub mod event;
pub mod identity;
pub mod listener;
pub mod position;
pub mod recorder;
pub mod registry;
pub mod script;
pub mod session;

pub use dispatcher::ActiveSourceDispatcher;
pub use display::{DisplayFrame, LyricDisplay};
pub use error::{Error, Result};
pub use event::PlayerEvent;
pub use identity::{SourceDescriptor, SourceIdentity, SourceLogo};
pub use listener::ActiveSourceListener;
pub use position::{PositionCell, PositionPump, PositionSource};
pub use recorder::SourceRecorder;
pub use registry::{LivenessMonitor, SourceHandle, SourceRegistry};
pub use script::{parse_script, ScriptRunner, ScriptStep};
pub use session::PlayerSession;
