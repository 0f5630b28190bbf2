//! Display-safe projection of `RecQuerySpec` carried on the `opening` SSE
//! frame so the client can render filter chips (§6). Grounded in
//! `craft_active_spec`, whose own shipped behavior turned out to surface far
//! less than its data model supports — providers, year range, excluded
//! genres, and the spec's descriptive fields, nothing richer.

use reelix_core::{Genre, MediaType, RecQuerySpec};
use reelix_retrieval::provider_table::provider_ids_from_names;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ActiveSpec {
    pub media_type: MediaType,
    pub providers: Vec<u32>,
    pub year_range: Option<(i32, i32)>,
    pub core_genres: Vec<Genre>,
    pub exclude_genres: Vec<Genre>,
    pub core_tone: Vec<String>,
    pub key_themes: Vec<String>,
    pub narrative_shape: Vec<String>,
    pub sub_genres: Vec<String>,
}

impl From<&RecQuerySpec> for ActiveSpec {
    fn from(spec: &RecQuerySpec) -> Self {
        Self {
            media_type: spec.media_type,
            providers: provider_ids_from_names(spec.providers.iter().map(|s| s.as_str())),
            year_range: spec.year_range,
            core_genres: spec.core_genres.clone(),
            exclude_genres: spec.exclude_genres.clone(),
            core_tone: spec.core_tone.clone(),
            key_themes: spec.key_themes.clone(),
            narrative_shape: spec.narrative_shape.clone(),
            sub_genres: spec.sub_genres.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RecQuerySpec {
        RecQuerySpec {
            query_text: "moody sci-fi".to_string(),
            media_type: MediaType::Movie,
            core_genres: vec![Genre::ScienceFiction],
            sub_genres: Vec::new(),
            core_tone: Vec::new(),
            narrative_shape: Vec::new(),
            key_themes: Vec::new(),
            exclude_genres: vec![Genre::Horror],
            providers: vec!["Netflix".to_string(), "Not A Service".to_string()],
            year_range: Some((1990, 1999)),
            seed_titles: Vec::new(),
            num_recs: 8,
        }
    }

    #[test]
    fn resolves_provider_names_to_ids_and_drops_unknown() {
        let active: ActiveSpec = (&spec()).into();
        assert_eq!(active.providers, vec![8]);
        assert_eq!(active.year_range, Some((1990, 1999)));
        assert_eq!(active.exclude_genres, vec![Genre::Horror]);
    }
}
