//! Closed streaming-provider name→id table (§6) and alias resolution.

/// `(name, tmdb_watch_provider_id)`, shipped verbatim per §6.
pub const WATCH_PROVIDERS: &[(&str, u32)] = &[
    ("Netflix", 8),
    ("Hulu", 15),
    ("HBO Max", 1899),
    ("Disney+", 337),
    ("Apple TV+", 350),
    ("Amazon Prime Video", 9),
    ("Paramount+", 531),
    ("Peacock Premium", 386),
    ("MGM+", 34),
    ("Starz", 43),
    ("AMC+", 526),
    ("Crunchyroll", 283),
    ("BritBox", 151),
    ("Acorn TV", 87),
    ("Criterion Channel", 258),
    ("Tubi TV", 73),
    ("Pluto TV", 300),
    ("The Roku Channel", 207),
];

/// Common name variants mapped onto the canonical (normalized) key.
const ALIASES: &[(&str, &str)] = &[
    ("max", "hbo max"),
    ("hbo", "hbo max"),
    ("disney plus", "disney+"),
    ("prime", "amazon prime video"),
    ("prime video", "amazon prime video"),
    ("amazon prime", "amazon prime video"),
    ("paramount plus", "paramount+"),
    ("peacock", "peacock premium"),
    ("mgm plus", "mgm+"),
];

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a list of user-facing provider names to their numeric ids.
/// Unknown names are dropped (with a warning logged by the caller);
/// duplicates are collapsed while preserving first-seen order.
pub fn provider_ids_from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<u32> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for raw in names {
        let mut key = normalize(raw);
        if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == key) {
            key = canonical.to_string();
        }

        let Some(&(_, id)) = WATCH_PROVIDERS.iter().find(|(name, _)| normalize(name) == key)
        else {
            tracing::warn!(provider = raw, "unknown provider name dropped");
            continue;
        };

        if seen.insert(id) {
            out.push(id);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_names() {
        assert_eq!(provider_ids_from_names(["Netflix"]), vec![8]);
    }

    #[test]
    fn resolves_aliases() {
        assert_eq!(provider_ids_from_names(["Max"]), vec![1899]);
        assert_eq!(provider_ids_from_names(["Prime Video"]), vec![9]);
    }

    #[test]
    fn drops_unknown_and_dedupes() {
        let ids = provider_ids_from_names(["Netflix", "Netflix", "Not A Service"]);
        assert_eq!(ids, vec![8]);
    }
}
