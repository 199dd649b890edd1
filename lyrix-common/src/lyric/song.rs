//! Song and lyric line definitions
//!
//! Supporting types for the lyric payload a player source reports.

use crate::timing::TimedEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form string metadata attached to songs, lines and words
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LyricMetadata(BTreeMap<String, Option<String>>);

impl LyricMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for LyricMetadata {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        )
    }
}

/// A single timed word (syllable) within a lyric line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LyricWord {
    /// Start time (milliseconds)
    pub begin: i64,
    /// End time (milliseconds)
    pub end: i64,
    /// Duration (milliseconds); `end - begin` once normalized
    pub duration: i64,
    pub text: Option<String>,
    pub metadata: Option<LyricMetadata>,
}

impl LyricWord {
    pub fn new(begin: i64, end: i64, text: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            duration: end - begin,
            text: Some(text.into()),
            metadata: None,
        }
    }
}

/// A lyric line with optional word timing, secondary line and translation
///
/// The secondary line is an overlay (e.g. a backing vocal) that shares the
/// primary line's interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RichLyricLine {
    /// Start time (milliseconds)
    pub begin: i64,
    /// End time (milliseconds)
    pub end: i64,
    /// Duration (milliseconds); `end - begin` once normalized
    pub duration: i64,
    pub is_aligned_right: bool,
    pub metadata: Option<LyricMetadata>,
    pub text: Option<String>,
    pub words: Option<Vec<LyricWord>>,
    pub secondary: Option<String>,
    pub secondary_words: Option<Vec<LyricWord>>,
    pub translation: Option<String>,
    pub translation_words: Option<Vec<LyricWord>>,
}

impl RichLyricLine {
    /// Create a plain line covering `[begin, end]`
    pub fn new(begin: i64, end: i64, text: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            duration: end - begin,
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Whether the line satisfies the timing invariants after duration repair
    fn is_well_formed(&self) -> bool {
        self.begin >= 0 && self.begin < self.end && self.duration > 0
    }
}

/// Song metadata plus its (optional) lyric lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Song {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    /// Total duration (milliseconds)
    pub duration: i64,
    pub metadata: Option<LyricMetadata>,
    pub lyrics: Option<Vec<RichLyricLine>>,
}

impl Song {
    /// Decode a song from its JSON representation
    pub fn from_json_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Produce a copy whose lyric lines satisfy the timing invariants
    ///
    /// - Lines with a non-positive `duration` get `end - begin`
    /// - Lines with `begin < 0`, `begin >= end` or `duration <= 0` are dropped
    /// - Remaining lines are stable-sorted by `begin`
    ///
    /// The receiver is left untouched.
    pub fn normalize(&self) -> Song {
        let mut song = self.clone();
        if let Some(lines) = song.lyrics.take() {
            let mut lines: Vec<RichLyricLine> = lines
                .into_iter()
                .map(|mut line| {
                    if line.duration <= 0 {
                        line.duration = line.end - line.begin;
                    }
                    line
                })
                .filter(RichLyricLine::is_well_formed)
                .collect();
            lines.sort_by_key(|line| line.begin);
            song.lyrics = Some(lines);
        }
        song
    }

    /// Lyric lines, or an empty slice when the song has none
    pub fn lines(&self) -> &[RichLyricLine] {
        self.lyrics.as_deref().unwrap_or(&[])
    }
}

impl TimedEntry for LyricWord {
    fn begin(&self) -> i64 {
        self.begin
    }

    fn end(&self) -> i64 {
        self.end
    }

    fn duration(&self) -> i64 {
        self.duration
    }
}

impl TimedEntry for RichLyricLine {
    fn begin(&self) -> i64 {
        self.begin
    }

    fn end(&self) -> i64 {
        self.end
    }

    fn duration(&self) -> i64 {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(begin: i64, end: i64, duration: i64) -> RichLyricLine {
        RichLyricLine {
            begin,
            end,
            duration,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_fills_missing_duration() {
        let song = Song {
            lyrics: Some(vec![line(0, 1000, 0), line(1000, 1500, -3)]),
            ..Default::default()
        };

        let normalized = song.normalize();
        let durations: Vec<i64> = normalized.lines().iter().map(|l| l.duration).collect();
        assert_eq!(durations, vec![1000, 500]);

        // Source song untouched
        assert_eq!(song.lines()[0].duration, 0);
    }

    #[test]
    fn test_normalize_drops_malformed_lines() {
        let song = Song {
            lyrics: Some(vec![
                line(-10, 100, 110), // negative begin
                line(500, 500, 0),   // empty interval
                line(900, 800, 0),   // reversed
                line(0, 100, 100),
            ]),
            ..Default::default()
        };

        let normalized = song.normalize();
        assert_eq!(normalized.lines().len(), 1);
        assert_eq!(normalized.lines()[0].begin, 0);
    }

    #[test]
    fn test_normalize_sorts_by_begin_stably() {
        let mut a = RichLyricLine::new(2000, 3000, "a");
        a.secondary = Some("overlay".to_string());
        let b = RichLyricLine::new(2000, 2500, "b");
        let c = RichLyricLine::new(0, 1000, "c");

        let song = Song {
            lyrics: Some(vec![a, b, c]),
            ..Default::default()
        };

        let texts: Vec<_> = song
            .normalize()
            .lines()
            .iter()
            .map(|l| l.text.clone().unwrap())
            .collect();
        assert_eq!(texts, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_normalize_without_lyrics() {
        let song = Song {
            name: Some("Instrumental".to_string()),
            ..Default::default()
        };
        let normalized = song.normalize();
        assert!(normalized.lyrics.is_none());
        assert!(normalized.lines().is_empty());
    }

    #[test]
    fn test_decode_camel_case_json() {
        let json = br#"{
            "id": "42",
            "name": "Song",
            "duration": 180000,
            "metadata": {"source": "lrc", "empty": null},
            "lyrics": [
                {"begin": 0, "end": 1200, "text": "hello", "isAlignedRight": true,
                 "translation": "bonjour",
                 "words": [{"begin": 0, "end": 600, "text": "hel"}]}
            ]
        }"#;

        let song = Song::from_json_slice(json).unwrap();
        assert_eq!(song.id.as_deref(), Some("42"));
        let meta = song.metadata.as_ref().unwrap();
        assert_eq!(meta.get("source"), Some("lrc"));
        assert_eq!(meta.get("empty"), None);
        assert_eq!(meta.len(), 2);

        let line = &song.lines()[0];
        assert!(line.is_aligned_right);
        assert_eq!(line.translation.as_deref(), Some("bonjour"));
        assert_eq!(line.duration, 0); // filled by normalize()
        assert_eq!(song.normalize().lines()[0].duration, 1200);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Song::from_json_slice(b"\x78\x9c not json").is_err());
    }
}
