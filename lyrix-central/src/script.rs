//! Event script replay
//!
//! The binary drives the registry from a JSON-lines script, one step per line.
//! Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! {"op":"register","source":{"provider_package":"org.p","player_package":"com.a"}}
//! {"op":"song","source":{...},"song":{"name":"Intro","lyrics":[{"begin":0,"end":900,"text":"hi"}]}}
//! {"op":"playback","source":{...},"playing":true}
//! {"op":"position","source":{...},"position":450}
//! {"op":"sleep","ms":100}
//! ```

use crate::identity::{SourceDescriptor, SourceIdentity, SourceLogo};
use crate::registry::{SourceHandle, SourceRegistry};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One script instruction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Connect a source
    Register {
        source: SourceIdentity,
        #[serde(default)]
        metadata: BTreeMap<String, Option<String>>,
        #[serde(default)]
        logo: Option<SourceLogo>,
    },
    /// Orderly removal
    Unregister { source: SourceIdentity },
    /// Connection loss, reported through the liveness monitor
    Disconnect { source: SourceIdentity },
    /// Song payload; absent or null clears the song
    Song {
        source: SourceIdentity,
        #[serde(default)]
        song: Option<serde_json::Value>,
    },
    Playback { source: SourceIdentity, playing: bool },
    Seek { source: SourceIdentity, position: i64 },
    /// Write the source's position cell (sampled by the pump while playing)
    Position { source: SourceIdentity, position: i64 },
    Text {
        source: SourceIdentity,
        #[serde(default)]
        text: Option<String>,
    },
    Translation { source: SourceIdentity, display: bool },
    Interval { source: SourceIdentity, interval_ms: u64 },
    Sleep { ms: u64 },
}

/// A step with its 1-based line number in the script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: ScriptStep,
}

/// Parse script text
///
/// # Errors
/// [`Error::Script`] naming the first line that is not a valid step
pub fn parse_script(content: &str) -> Result<Vec<ScriptLine>> {
    let mut steps = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(trimmed).map_err(|e| Error::Script {
            line,
            message: e.to_string(),
        })?;
        steps.push(ScriptLine { line, step });
    }
    Ok(steps)
}

/// Read and parse a script file
pub fn load_script(path: &Path) -> Result<Vec<ScriptLine>> {
    let content = std::fs::read_to_string(path)?;
    parse_script(&content)
}

/// Replays script steps against a registry
pub struct ScriptRunner {
    registry: SourceRegistry,
    handles: HashMap<SourceIdentity, SourceHandle>,
}

impl ScriptRunner {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            handles: HashMap::new(),
        }
    }

    /// Execute every step in order
    ///
    /// A song payload that fails to decode is logged and skipped, as a live
    /// source's would be. Referencing a source that never registered stops
    /// the run.
    ///
    /// # Returns
    /// Number of steps executed
    pub async fn run(&mut self, steps: &[ScriptLine]) -> Result<usize> {
        for entry in steps {
            debug!("Script line {}: {:?}", entry.line, entry.step);
            self.execute(entry).await?;
        }
        info!("Script finished ({} steps)", steps.len());
        Ok(steps.len())
    }

    async fn execute(&mut self, entry: &ScriptLine) -> Result<()> {
        match &entry.step {
            ScriptStep::Register {
                source,
                metadata,
                logo,
            } => {
                let mut descriptor = SourceDescriptor::new(source.clone());
                descriptor.metadata = metadata.clone();
                descriptor.logo = logo.clone();
                let handle = self.registry.register(descriptor).map_err(|e| Error::Script {
                    line: entry.line,
                    message: e.to_string(),
                })?;
                self.handles.insert(source.clone(), handle);
            }
            ScriptStep::Unregister { source } => {
                self.handle(entry.line, source)?;
                self.registry.unregister(source);
            }
            ScriptStep::Disconnect { source } => {
                self.handle(entry.line, source)?.disconnect();
            }
            ScriptStep::Song { source, song } => {
                let session = &self.handle(entry.line, source)?.session;
                match song {
                    Some(value) => {
                        let bytes = serde_json::to_vec(value).map_err(|e| Error::Script {
                            line: entry.line,
                            message: e.to_string(),
                        })?;
                        if let Err(e) = session.set_song_json(&bytes) {
                            warn!("Script line {}: song rejected: {}", entry.line, e);
                        }
                    }
                    None => session.set_song(None),
                }
            }
            ScriptStep::Playback { source, playing } => {
                self.handle(entry.line, source)?
                    .session
                    .set_playback_state(*playing);
            }
            ScriptStep::Seek { source, position } => {
                self.handle(entry.line, source)?.session.seek_to(*position);
            }
            ScriptStep::Position { source, position } => {
                self.handle(entry.line, source)?
                    .session
                    .position_cell()
                    .write(*position);
            }
            ScriptStep::Text { source, text } => {
                self.handle(entry.line, source)?
                    .session
                    .send_text(text.clone());
            }
            ScriptStep::Translation { source, display } => {
                self.handle(entry.line, source)?
                    .session
                    .set_display_translation(*display);
            }
            ScriptStep::Interval {
                source,
                interval_ms,
            } => {
                self.handle(entry.line, source)?
                    .session
                    .set_position_update_interval(*interval_ms);
            }
            ScriptStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
        Ok(())
    }

    fn handle(&self, line: usize, source: &SourceIdentity) -> Result<&SourceHandle> {
        self.handles.get(source).ok_or_else(|| Error::Script {
            line,
            message: format!("source {} was never registered", source),
        })
    }
}
