use serde::Deserialize;

use crate::http_server::error::ApiError;
use crate::track::{Tier, TrackId, TrackKey};

pub mod download;
pub mod instances;
pub mod search;
pub mod stream;
pub mod thumbnail;

/// `?id=..&quality=compressed|lossless`, shared by the audio routes.
#[derive(Debug, Default, Deserialize)]
pub struct TrackQuery {
    id: Option<String>,
    quality: Option<String>,
}

impl TrackQuery {
    pub fn track_key(&self) -> Result<TrackKey, ApiError> {
        let id = TrackId::parse(self.id.as_deref().unwrap_or_default())?;
        let tier = self.quality.as_deref().unwrap_or_default().parse::<Tier>()?;
        Ok(TrackKey::new(id, tier))
    }
}
