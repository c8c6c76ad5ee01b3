//! テーブロー推論設定

use crate::TableauError;
use fukurow_kb::UnsupportedPolicy;
use serde::{Deserialize, Serialize};

/// How restore finds the facts to roll back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// Walk every node of the graph
    Global,

    /// Walk only the nodes touched since the restored branch
    #[default]
    Local,
}

/// Completion strategy selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Single-root for ABox-free satisfiability checks, SROIQ otherwise
    #[default]
    Auto,
    Sroiq,
    SingleRoot,
}

/// Tableau reasoner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableauConfig {
    pub restore_mode: RestoreMode,

    /// Fail on, or disable, axioms outside the supported fragment
    pub unsupported_policy: UnsupportedPolicy,

    /// Abort a completion after this many milliseconds
    pub timeout_ms: Option<u64>,

    /// Record originating axioms in dependency sets
    pub explanations: bool,

    /// Reuse satisfiability results in the single-root strategy
    pub use_sat_cache: bool,

    /// Add the negation of failed alternatives when trying the next one
    pub semantic_branching: bool,

    /// Treat distinct individual names as different individuals
    pub unique_name_assumption: bool,

    pub strategy: StrategyKind,
}

impl Default for TableauConfig {
    fn default() -> Self {
        Self {
            restore_mode: RestoreMode::Local,
            unsupported_policy: UnsupportedPolicy::Fail,
            timeout_ms: None,
            explanations: false,
            use_sat_cache: true,
            semantic_branching: true,
            unique_name_assumption: false,
            strategy: StrategyKind::Auto,
        }
    }
}

impl TableauConfig {
    pub fn from_json(json: &str) -> Result<Self, TableauError> {
        serde_json::from_str(json).map_err(|e| TableauError::Config(e.to_string()))
    }

    pub fn with_restore_mode(mut self, mode: RestoreMode) -> Self {
        self.restore_mode = mode;
        self
    }

    pub fn with_explanations(mut self, enabled: bool) -> Self {
        self.explanations = enabled;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_unsupported_policy(mut self, policy: UnsupportedPolicy) -> Self {
        self.unsupported_policy = policy;
        self
    }
}
