use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const MAX_TRACK_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackParseError {
    #[error("Missing track id")]
    EmptyId,
    #[error("Track id is longer than {MAX_TRACK_ID_LEN} characters")]
    IdTooLong,
    #[error("Track id contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("Unknown quality: {0}")]
    UnknownTier(String),
}

/// An external track identifier, as used by the video site.
///
/// Only ASCII alphanumerics, `-` and `_` are accepted so the id can be used
/// verbatim as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    pub fn parse(raw: &str) -> Result<Self, TrackParseError> {
        if raw.is_empty() {
            return Err(TrackParseError::EmptyId);
        }
        if raw.len() > MAX_TRACK_ID_LEN {
            return Err(TrackParseError::IdTooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TrackParseError::InvalidCharacter(c));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audio container requested from the extraction tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Compressed,
    Lossless,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Compressed, Tier::Lossless];

    pub fn format(self) -> AudioFormat {
        match self {
            Tier::Compressed => AudioFormat::Mp3,
            Tier::Lossless => AudioFormat::Flac,
        }
    }

    /// Name of the cache subdirectory holding this tier's files.
    pub fn directory(self) -> &'static str {
        match self {
            Tier::Compressed => "compressed",
            Tier::Lossless => "lossless",
        }
    }
}

impl FromStr for Tier {
    type Err = TrackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compressed" => Ok(Tier::Compressed),
            "lossless" => Ok(Tier::Lossless),
            other => Err(TrackParseError::UnknownTier(other.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory())
    }
}

/// Names one audio cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub id: TrackId,
    pub tier: Tier,
}

impl TrackKey {
    pub fn new(id: TrackId, tier: Tier) -> Self {
        Self { id, tier }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tier, self.id)
    }
}
