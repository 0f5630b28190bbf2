//! Per-turn working memory for the orchestrator (§3 `AgentState`).

use reelix_core::{
    Candidate, MemoryDelta, QueryId, ScoreTrace, SessionId, SessionState, TurnKind, TurnMode, UserId,
};

/// Lives for exactly one HTTP request. Never persisted directly — its
/// `turn_memory` is what gets merged into the durable `SessionState` by G.
pub struct AgentState {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub query_id: QueryId,
    pub messages: Vec<reelix_llm::Message>,
    pub session_memory: Option<SessionState>,
    pub candidates: Vec<Candidate>,
    pub final_recs: Vec<Candidate>,
    pub traces: Vec<ScoreTrace>,
    pub turn_mode: TurnMode,
    pub turn_kind: TurnKind,
    pub turn_memory: MemoryDelta,
    pub step_count: u32,
}

impl AgentState {
    pub fn new(
        user_id: UserId,
        session_id: SessionId,
        query_id: QueryId,
        session_memory: Option<SessionState>,
    ) -> Self {
        Self {
            user_id,
            session_id,
            query_id,
            messages: Vec::new(),
            session_memory,
            candidates: Vec::new(),
            final_recs: Vec::new(),
            traces: Vec::new(),
            turn_mode: TurnMode::Chat,
            turn_kind: TurnKind::New,
            turn_memory: MemoryDelta::default(),
            step_count: 0,
        }
    }
}
