//! Merge semantics for per-session durable memory (§4.G).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use reelix_core::{MemoryDelta, SessionState, SessionSummary, TurnKind, UserId};
use serde_json::{Map, Value};

/// Recursive merge: objects merge key-by-key, arrays union with duplicates
/// dropped (compared by their JSON text), everything else is replaced by
/// `incoming`.
pub fn merge_value(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(b), Value::Object(i)) => {
            let mut out = b.clone();
            for (k, v) in i {
                let merged = match out.get(k) {
                    Some(existing) => merge_value(existing, v),
                    None => v.clone(),
                };
                out.insert(k.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(b), Value::Array(i)) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for v in b.iter().chain(i.iter()) {
                if seen.insert(v.to_string()) {
                    out.push(v.clone());
                }
            }
            Value::Array(out)
        }
        (_, incoming) => incoming.clone(),
    }
}

pub fn merge_maps(base: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    let merged = merge_value(&Value::Object(base.clone()), &Value::Object(incoming.clone()));
    match merged {
        Value::Object(map) => map,
        _ => base.clone(),
    }
}

/// Append then dedupe, preserving first-seen order, capped to the most
/// recent `cap` entries (i.e. the tail of the first-seen-ordered list).
pub fn merge_int_list_dedupe(existing: &[i64], incoming: &[i64], cap: usize) -> Vec<i64> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut order: Vec<i64> = Vec::new();
    for &v in existing.iter().chain(incoming.iter()) {
        if seen.insert(v) {
            order.push(v);
        }
    }
    if order.len() > cap {
        order.split_off(order.len() - cap)
    } else {
        order
    }
}

/// Apply a turn's summary fields onto the session's rolling summary.
/// `turn_kind`/`recent_feedback`/`last_user_message`/`last_admin_message`/
/// `last_reflection_strategy` overwrite when present; `constraints`/`prefs` merge recursively, except
/// `year_range`, which always replaces as a unit even after the merge.
pub fn apply_summary_delta(summary: &mut SessionSummary, delta: &MemoryDelta) {
    if let Some(turn_kind) = delta.turn_kind {
        summary.turn_kind = Some(turn_kind);
    }
    if delta.recent_feedback.is_some() {
        summary.recent_feedback = delta.recent_feedback.clone();
    }
    if delta.last_user_message.is_some() {
        summary.last_user_message = delta.last_user_message.clone();
    }
    if delta.last_admin_message.is_some() {
        summary.last_admin_message = delta.last_admin_message.clone();
    }
    if delta.last_reflection_strategy.is_some() {
        summary.last_reflection_strategy = delta.last_reflection_strategy.clone();
    }

    summary.constraints = merge_maps(&summary.constraints, &delta.constraints);
    summary.prefs = merge_maps(&summary.prefs, &delta.prefs);

    if let Some(year_range) = delta.constraints.get("year_range") {
        summary
            .constraints
            .insert("year_range".to_string(), year_range.clone());
    }
}

/// Fold a turn's `MemoryDelta` into the caller's session state, creating a
/// fresh one if absent or if the caller does not own the stored session.
pub fn apply_delta_to_payload(
    existing: Option<SessionState>,
    user_id: &UserId,
    delta: &MemoryDelta,
    now: DateTime<Utc>,
    seen_ids_cap: usize,
) -> SessionState {
    let mut state = match existing {
        Some(state) if &state.user_id == user_id => state,
        _ => SessionState::empty(user_id.clone(), now),
    };

    if delta.turn_kind == Some(TurnKind::New) {
        state.last_spec = None;
        state.slot_map.clear();
        state.seen_media_ids.clear();
    }

    apply_summary_delta(&mut state.summary, delta);

    if delta.last_spec.is_some() {
        state.last_spec = delta.last_spec.clone();
    }
    if let Some(slot_map) = &delta.slot_map {
        state.slot_map = slot_map.clone();
    }

    state.seen_media_ids =
        merge_int_list_dedupe(&state.seen_media_ids, &delta.seen_media_ids, seen_ids_cap);
    state.updated_at = now;

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(turn_kind: Option<TurnKind>) -> MemoryDelta {
        MemoryDelta {
            turn_kind,
            ..Default::default()
        }
    }

    #[test]
    fn ownership_mismatch_resets_session() {
        let now = Utc::now();
        let mut existing = SessionState::empty(UserId::from("alice"), now);
        existing.seen_media_ids = vec![1, 2, 3];

        let merged = apply_delta_to_payload(
            Some(existing),
            &UserId::from("bob"),
            &delta(None),
            now,
            200,
        );

        assert_eq!(merged.user_id, UserId::from("bob"));
        assert!(merged.seen_media_ids.is_empty());
    }

    #[test]
    fn new_turn_kind_clears_memory() {
        let now = Utc::now();
        let mut existing = SessionState::empty(UserId::from("alice"), now);
        existing.seen_media_ids = vec![1, 2, 3];
        existing.slot_map.insert(
            "1".to_string(),
            reelix_core::SlotEntry {
                media_id: 1,
                title: "Foo".to_string(),
                release_year: None,
            },
        );

        let merged = apply_delta_to_payload(
            Some(existing),
            &UserId::from("alice"),
            &delta(Some(TurnKind::New)),
            now,
            200,
        );

        assert!(merged.seen_media_ids.is_empty());
        assert!(merged.slot_map.is_empty());
        assert!(merged.last_spec.is_none());
    }

    #[test]
    fn year_range_replaces_not_merges() {
        let mut summary = SessionSummary::default();
        summary
            .constraints
            .insert("year_range".to_string(), json!([1990, 2000]));
        summary
            .constraints
            .insert("mood".to_string(), json!(["cozy"]));

        let mut d = MemoryDelta::default();
        d.constraints
            .insert("year_range".to_string(), json!([2010, 2020]));
        d.constraints.insert("mood".to_string(), json!(["tense"]));

        apply_summary_delta(&mut summary, &d);

        assert_eq!(summary.constraints["year_range"], json!([2010, 2020]));
        // mood is a list field — it unions, it does not replace.
        let mood = summary.constraints["mood"].as_array().unwrap();
        assert!(mood.contains(&json!("cozy")));
        assert!(mood.contains(&json!("tense")));
    }

    #[test]
    fn seen_ids_dedupe_preserves_first_seen_order() {
        let merged = merge_int_list_dedupe(&[1, 2, 3], &[2, 4], 10);
        assert_eq!(merged, vec![1, 2, 3, 4]);
    }

    #[test]
    fn seen_ids_cap_keeps_most_recent() {
        let existing: Vec<i64> = (1..=200).collect();
        let merged = merge_int_list_dedupe(&existing, &[201, 202], 200);
        assert_eq!(merged.len(), 200);
        assert_eq!(merged.last(), Some(&202));
        assert_eq!(merged.first(), Some(&3));
    }
}
