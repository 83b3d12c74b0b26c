//! Agent states, action tags and the transition graph.

use std::fmt;

use serde::{Deserialize, Serialize};

/// States of the research agent.
///
/// `Completed` and `Error` are terminal; every other state has exactly
/// one handler in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    /// Waiting for the research question.
    Initializing,
    /// Turning the question into keywords.
    AnalyzingQuery,
    /// Turning keywords into database queries.
    PlanningSearch,
    /// Running the planned queries.
    ExecutingSearch,
    /// Analyzing the papers that were found.
    ProcessingResults,
    /// Deciding whether to search again.
    EvaluatingResults,
    /// Producing revised keywords.
    RefiningStrategy,
    /// Merging analyses into the final report.
    Synthesizing,
    /// Finished successfully.
    Completed,
    /// Finished with a fatal error.
    Error,
}

impl AgentState {
    /// All states, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Initializing,
        Self::AnalyzingQuery,
        Self::PlanningSearch,
        Self::ExecutingSearch,
        Self::ProcessingResults,
        Self::EvaluatingResults,
        Self::RefiningStrategy,
        Self::Synthesizing,
        Self::Completed,
        Self::Error,
    ];

    /// Returns `true` for `Completed` and `Error`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns `true` if `self -> next` is an edge of the transition graph.
    ///
    /// Any non-terminal state may fall through to `Error`. Nothing may
    /// transition back into `Initializing`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if matches!(next, Self::Error) {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::Initializing, Self::AnalyzingQuery)
                | (Self::AnalyzingQuery, Self::PlanningSearch)
                | (Self::PlanningSearch, Self::ExecutingSearch)
                | (
                    Self::ExecutingSearch,
                    Self::ProcessingResults | Self::EvaluatingResults
                )
                | (Self::ProcessingResults, Self::EvaluatingResults)
                | (
                    Self::EvaluatingResults,
                    Self::RefiningStrategy | Self::Synthesizing
                )
                | (Self::RefiningStrategy, Self::PlanningSearch)
                | (Self::Synthesizing, Self::Completed)
        )
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::AnalyzingQuery => "ANALYZING_QUERY",
            Self::PlanningSearch => "PLANNING_SEARCH",
            Self::ExecutingSearch => "EXECUTING_SEARCH",
            Self::ProcessingResults => "PROCESSING_RESULTS",
            Self::EvaluatingResults => "EVALUATING_RESULTS",
            Self::RefiningStrategy => "REFINING_STRATEGY",
            Self::Synthesizing => "SYNTHESIZING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag attached to every execution-history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// The agent moved between states.
    StateTransition,
    /// The research question was analyzed.
    QueryAnalysis,
    /// Keywords were generated or extended.
    KeywordGeneration,
    /// A search plan was executed.
    SearchExecution,
    /// Found papers were processed.
    ResultProcessing,
    /// Search quality was evaluated.
    Evaluation,
    /// Keywords were revised.
    StrategyRefinement,
    /// Analyses were merged into the report.
    Synthesis,
}

impl ActionType {
    /// Snake-case name used in logs and history summaries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateTransition => "state_transition",
            Self::QueryAnalysis => "query_analysis",
            Self::KeywordGeneration => "keyword_generation",
            Self::SearchExecution => "search_execution",
            Self::ResultProcessing => "result_processing",
            Self::Evaluation => "evaluation",
            Self::StrategyRefinement => "strategy_refinement",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(AgentState::Initializing, AgentState::AnalyzingQuery ; "init to analyze")]
    #[test_case(AgentState::ExecutingSearch, AgentState::ProcessingResults ; "search to process")]
    #[test_case(AgentState::ExecutingSearch, AgentState::EvaluatingResults ; "search to evaluate")]
    #[test_case(AgentState::EvaluatingResults, AgentState::RefiningStrategy ; "evaluate to refine")]
    #[test_case(AgentState::RefiningStrategy, AgentState::PlanningSearch ; "refine to plan")]
    #[test_case(AgentState::Synthesizing, AgentState::Completed ; "synthesize to complete")]
    #[test_case(AgentState::ProcessingResults, AgentState::Error ; "fallback to error")]
    fn test_allowed_transitions(from: AgentState, to: AgentState) {
        assert!(from.can_transition_to(to));
    }

    #[test_case(AgentState::PlanningSearch, AgentState::Synthesizing ; "plan skips ahead")]
    #[test_case(
        AgentState::RefiningStrategy, AgentState::ExecutingSearch ; "refine skips planning"
    )]
    #[test_case(AgentState::Completed, AgentState::Error ; "terminal is final")]
    #[test_case(AgentState::Error, AgentState::Initializing ; "no restart")]
    fn test_rejected_transitions(from: AgentState, to: AgentState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn test_nothing_returns_to_initializing() {
        for from in AgentState::ALL {
            assert!(!from.can_transition_to(AgentState::Initializing), "{from}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for to in AgentState::ALL {
            assert!(!AgentState::Completed.can_transition_to(to));
            assert!(!AgentState::Error.can_transition_to(to));
        }
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&AgentState::EvaluatingResults).unwrap_or_default();
        assert_eq!(json, "\"EVALUATING_RESULTS\"");
        assert_eq!(AgentState::EvaluatingResults.to_string(), "EVALUATING_RESULTS");
    }
}
