use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::RatingKey;

const COLLABORATOR_DELIMITER: char = ';';

/// Splits a composite artist title ("A; B") into trimmed collaborator names.
/// Returns `None` for a plain title.
pub fn split_collaborators(title: &str) -> Option<Vec<String>> {
    if !title.contains(COLLABORATOR_DELIMITER) {
        return None;
    }
    Some(
        title
            .split(COLLABORATOR_DELIMITER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Where one album's statistics go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Plain artist: its own title is the bucket.
    Direct(String),
    /// Composite artist: every collaborator that resolved to a standalone
    /// record. May be empty, in which case nothing is attributed.
    Collaborators(Vec<String>),
}

/// Title → rating key of the first artist record carrying that exact title.
/// Built over the complete artist list before any album is attributed.
#[derive(Debug, Default)]
pub struct CollaboratorIndex {
    first_by_title: HashMap<String, Option<RatingKey>>,
}

impl CollaboratorIndex {
    /// Indexes raw artist records, so a record that fails typed decoding
    /// elsewhere can still be credited through its title and rating key.
    pub fn from_records(records: &[Value]) -> Self {
        let mut first_by_title = HashMap::new();
        for record in records {
            if let Some(title) = record.get("title").and_then(Value::as_str) {
                first_by_title.entry(title.to_string()).or_insert_with(|| {
                    record
                        .get("ratingKey")
                        .and_then(|k| RatingKey::deserialize(k).ok())
                });
            }
        }
        Self { first_by_title }
    }

    /// Rating key of the first record titled `name`, if that record has one.
    pub fn rating_key(&self, name: &str) -> Option<&RatingKey> {
        self.first_by_title.get(name).and_then(|k| k.as_ref())
    }

    /// A collaborator resolves when the first record with its exact title
    /// carries a rating key.
    pub fn resolves(&self, name: &str) -> bool {
        self.rating_key(name).is_some()
    }

    pub fn attribute(&self, artist_title: &str) -> Attribution {
        match split_collaborators(artist_title) {
            None => Attribution::Direct(artist_title.to_string()),
            Some(names) => {
                let resolved = names
                    .into_iter()
                    .filter(|name| {
                        let ok = self.resolves(name);
                        if !ok {
                            tracing::debug!(
                                "Collaborator '{}' of '{}' has no standalone artist record",
                                name,
                                artist_title
                            );
                        }
                        ok
                    })
                    .collect();
                Attribution::Collaborators(resolved)
            }
        }
    }
}
