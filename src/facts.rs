use crate::error::SkipReason;
use crate::models::Media;

/// Measurable facts of one leaf entity, read from its first media/part pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafFacts {
    pub size_bytes: u64,
    pub duration_ms: u64,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub resolution: Option<String>,
    pub container: Option<String>,
}

/// Reads `media[0].parts[0]`. Further media or part entries on the same leaf
/// are ignored.
pub fn extract_leaf_facts(media: Option<&[Media]>) -> Result<LeafFacts, SkipReason> {
    let first = media
        .and_then(|m| m.first())
        .ok_or(SkipReason::MissingMedia)?;
    let part = first
        .parts
        .as_deref()
        .and_then(|p| p.first())
        .ok_or(SkipReason::MissingMedia)?;

    Ok(LeafFacts {
        size_bytes: part.size.unwrap_or(0),
        duration_ms: first.duration.unwrap_or(0),
        audio_codec: first.audio_codec.clone(),
        video_codec: first.video_codec.clone(),
        resolution: first.video_resolution.clone(),
        container: part.container.clone().or_else(|| first.container.clone()),
    })
}
