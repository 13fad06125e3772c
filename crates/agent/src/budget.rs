//! Budget Governor — per-run ceilings on tool use.
//!
//! Three counters (tool calls, reads, searches) that only ever grow and
//! never pass their ceilings. A request is charged against the overall
//! counter plus its category counter, atomically: either both increments
//! happen or neither does.
//!
//! Once the tool-call ceiling is hit and the model has been told to write
//! its changes, the run is wrapping up: writes are dispatched without a
//! charge, everything else stays refused.

use serde::Serialize;
use ticketforge_config::AgentSettings;
use ticketforge_tools::ToolCategory;

/// Fixed ceilings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetLimits {
    pub max_tool_calls: u32,
    pub max_reads: u32,
    pub max_searches: u32,
}

impl From<&AgentSettings> for BudgetLimits {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_tool_calls: settings.max_tool_calls,
            max_reads: settings.max_reads,
            max_searches: settings.max_searches,
        }
    }
}

/// Which ceiling stopped a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    ToolCalls,
    Reads,
    Searches,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Budget exhausted: {kind:?} limit of {limit} reached")]
pub struct BudgetExhausted {
    pub kind: BudgetKind,
    pub limit: u32,
}

/// Counters for one run. Owned by the orchestrator; never shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetState {
    limits: BudgetLimits,
    tool_calls: u32,
    reads: u32,
    searches: u32,
    wrapping_up: bool,
}

impl BudgetState {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            tool_calls: 0,
            reads: 0,
            searches: 0,
            wrapping_up: false,
        }
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    pub fn tool_calls(&self) -> u32 {
        self.tool_calls
    }

    pub fn reads(&self) -> u32 {
        self.reads
    }

    pub fn searches(&self) -> u32 {
        self.searches
    }

    /// Whether the overall tool-call ceiling has been hit.
    pub fn tool_calls_exhausted(&self) -> bool {
        self.tool_calls >= self.limits.max_tool_calls
    }

    /// Let writes through past the tool-call ceiling. Called once the
    /// wrap-up directive has been sent.
    pub fn begin_wrap_up(&mut self) {
        self.wrapping_up = true;
    }

    pub fn is_wrapping_up(&self) -> bool {
        self.wrapping_up
    }

    /// Check and charge one request. On error nothing is charged.
    pub fn try_consume(&mut self, category: ToolCategory) -> Result<(), BudgetExhausted> {
        if self.tool_calls_exhausted() {
            if self.wrapping_up && category == ToolCategory::Write {
                return Ok(());
            }
            return Err(BudgetExhausted {
                kind: BudgetKind::ToolCalls,
                limit: self.limits.max_tool_calls,
            });
        }

        match category {
            ToolCategory::Read if self.reads >= self.limits.max_reads => {
                return Err(BudgetExhausted {
                    kind: BudgetKind::Reads,
                    limit: self.limits.max_reads,
                });
            }
            ToolCategory::Search if self.searches >= self.limits.max_searches => {
                return Err(BudgetExhausted {
                    kind: BudgetKind::Searches,
                    limit: self.limits.max_searches,
                });
            }
            ToolCategory::Read => self.reads += 1,
            ToolCategory::Search => self.searches += 1,
            ToolCategory::Write | ToolCategory::Other => {}
        }
        self.tool_calls += 1;
        Ok(())
    }

    /// Counters against ceilings on one line, for logs.
    pub fn summary(&self) -> String {
        format!(
            "tool_calls={}/{} reads={}/{} searches={}/{}",
            self.tool_calls,
            self.limits.max_tool_calls,
            self.reads,
            self.limits.max_reads,
            self.searches,
            self.limits.max_searches
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(calls: u32, reads: u32, searches: u32) -> BudgetLimits {
        BudgetLimits {
            max_tool_calls: calls,
            max_reads: reads,
            max_searches: searches,
        }
    }

    fn assert_within(state: &BudgetState) {
        let l = state.limits();
        assert!(state.tool_calls() <= l.max_tool_calls);
        assert!(state.reads() <= l.max_reads);
        assert!(state.searches() <= l.max_searches);
    }

    #[test]
    fn reads_stop_at_ceiling() {
        let mut state = BudgetState::new(limits(10, 2, 2));
        assert!(state.try_consume(ToolCategory::Read).is_ok());
        assert!(state.try_consume(ToolCategory::Read).is_ok());

        let err = state.try_consume(ToolCategory::Read).unwrap_err();
        assert_eq!(err.kind, BudgetKind::Reads);
        assert_eq!(err.limit, 2);
        assert_eq!(state.reads(), 2);
        assert_eq!(state.tool_calls(), 2);
    }

    #[test]
    fn rejected_request_charges_nothing() {
        let mut state = BudgetState::new(limits(10, 0, 1));
        let before = state.clone();
        assert!(state.try_consume(ToolCategory::Read).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn categories_are_independent() {
        let mut state = BudgetState::new(limits(10, 1, 1));
        state.try_consume(ToolCategory::Read).unwrap();
        assert!(state.try_consume(ToolCategory::Read).is_err());
        state.try_consume(ToolCategory::Search).unwrap();
        state.try_consume(ToolCategory::Other).unwrap();
        assert_eq!(state.tool_calls(), 3);
    }

    #[test]
    fn tool_call_ceiling_applies_to_every_category() {
        let mut state = BudgetState::new(limits(2, 5, 5));
        state.try_consume(ToolCategory::Other).unwrap();
        state.try_consume(ToolCategory::Search).unwrap();
        assert!(state.tool_calls_exhausted());

        for category in [
            ToolCategory::Read,
            ToolCategory::Search,
            ToolCategory::Write,
            ToolCategory::Other,
        ] {
            let err = state.try_consume(category).unwrap_err();
            assert_eq!(err.kind, BudgetKind::ToolCalls);
        }
        assert_eq!(state.tool_calls(), 2);
    }

    #[test]
    fn wrap_up_admits_only_writes_without_charge() {
        let mut state = BudgetState::new(limits(1, 5, 5));
        state.try_consume(ToolCategory::Read).unwrap();
        assert!(state.try_consume(ToolCategory::Write).is_err());

        state.begin_wrap_up();
        assert!(state.is_wrapping_up());
        state.try_consume(ToolCategory::Write).unwrap();
        state.try_consume(ToolCategory::Write).unwrap();
        for category in [ToolCategory::Read, ToolCategory::Search, ToolCategory::Other] {
            assert_eq!(state.try_consume(category).unwrap_err().kind, BudgetKind::ToolCalls);
        }
        assert_eq!(state.tool_calls(), 1);
        assert_within(&state);
    }

    #[test]
    fn wrap_up_before_ceiling_charges_normally() {
        let mut state = BudgetState::new(limits(3, 5, 5));
        state.begin_wrap_up();
        state.try_consume(ToolCategory::Write).unwrap();
        assert_eq!(state.tool_calls(), 1);
    }

    #[test]
    fn counters_never_exceed_ceilings_under_any_sequence() {
        let categories = [
            ToolCategory::Read,
            ToolCategory::Search,
            ToolCategory::Write,
            ToolCategory::Other,
        ];
        let mut state = BudgetState::new(limits(7, 3, 2));
        let mut previous = (0, 0, 0);
        for i in 0..100usize {
            if i == 50 {
                state.begin_wrap_up();
            }
            let _ = state.try_consume(categories[(i * 7 + i / 3) % 4]);
            assert_within(&state);
            let now = (state.tool_calls(), state.reads(), state.searches());
            assert!(now.0 >= previous.0 && now.1 >= previous.1 && now.2 >= previous.2);
            previous = now;
        }
        assert_eq!(state.tool_calls(), 7);
    }

    #[test]
    fn limits_from_settings() {
        let settings = AgentSettings::default();
        let l = BudgetLimits::from(&settings);
        assert_eq!(l.max_tool_calls, 25);
        assert_eq!(l.max_reads, 12);
        assert_eq!(l.max_searches, 6);
    }

    #[test]
    fn summary_format() {
        let mut state = BudgetState::new(limits(25, 12, 6));
        state.try_consume(ToolCategory::Read).unwrap();
        assert_eq!(state.summary(), "tool_calls=1/25 reads=1/12 searches=0/6");
    }
}
