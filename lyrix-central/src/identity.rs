//! Source identity and registration descriptor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one event producer: the providing plugin plus the media player it reports for
///
/// Equality and hashing cover both package names; this is the key used to
/// decide whether an event comes from the active source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceIdentity {
    pub provider_package: String,
    pub player_package: String,
}

impl SourceIdentity {
    pub fn new(provider_package: impl Into<String>, player_package: impl Into<String>) -> Self {
        Self {
            provider_package: provider_package.into(),
            player_package: player_package.into(),
        }
    }

    /// Both package names present and free of surrounding whitespace
    pub fn is_valid(&self) -> bool {
        let ok = |s: &str| !s.is_empty() && s.trim() == s;
        ok(&self.provider_package) && ok(&self.player_package)
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_package, self.player_package)
    }
}

/// Logo image a source may present to the display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SourceLogo {
    /// Encoded raster image (PNG bytes)
    Bitmap(Vec<u8>),
    /// SVG document text
    Svg(String),
}

impl SourceLogo {
    pub fn as_svg(&self) -> Option<&str> {
        match self {
            SourceLogo::Svg(svg) => Some(svg),
            SourceLogo::Bitmap(_) => None,
        }
    }

    pub fn bitmap_bytes(&self) -> Option<&[u8]> {
        match self {
            SourceLogo::Bitmap(bytes) => Some(bytes),
            SourceLogo::Svg(_) => None,
        }
    }
}

/// What a source presents when it registers
///
/// Two descriptors are equal when their identities are equal; metadata and
/// logo are informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub identity: SourceIdentity,
    #[serde(default)]
    pub metadata: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub logo: Option<SourceLogo>,
}

impl SourceDescriptor {
    pub fn new(identity: SourceIdentity) -> Self {
        Self {
            identity,
            metadata: BTreeMap::new(),
            logo: None,
        }
    }

    pub fn with_logo(mut self, logo: SourceLogo) -> Self {
        self.logo = Some(logo);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl PartialEq for SourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for SourceDescriptor {}
