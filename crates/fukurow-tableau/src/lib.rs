//! SROIQ(D) テーブロー完全化エンジン
//!
//! このクレートは完全グラフに基づくテーブロー推論を提供します:
//! - 依存集合による依存関係指向バックトラック
//! - ノードの併合・刈り込み・分岐点への復元 (大域/局所)
//! - 部分集合・等価・対ブロッキング
//! - 優先度付き完全化規則と 2 つの完全化戦略
//! - 一貫性・充足可能性・包摂・インスタンス判定・分類

pub mod dependency;
pub mod graph;
pub mod clash;
pub mod blocking;
pub mod branch;
pub mod config;
pub mod timers;
pub mod cache;
pub mod session;
pub mod rules;
pub mod strategy;
pub mod reasoner;

pub use dependency::DependencySet;
pub use graph::{CompletionGraph, GraphSnapshot, Node, NodeId, NodeKind};
pub use clash::{Clash, ClashKind};
pub use blocking::Blocking;
pub use branch::{Branch, BranchKind};
pub use config::{RestoreMode, StrategyKind, TableauConfig};
pub use cache::{CacheSafety, CachedSat, SatCache};
pub use session::{CompletionStats, PreparedKb, Session};
pub use rules::RuleKind;
pub use strategy::{CompletionStrategy, SingleRootStrategy, SroiqStrategy};
pub use reasoner::{CompletionResult, CompletionSummary, Reasoner};

// Error types
use fukurow_kb::KbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableauError {
    #[error("Timer '{timer}' exceeded its limit after {elapsed_ms} ms")]
    Timeout { timer: String, elapsed_ms: u64 },

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Internal reasoner error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Kb(#[from] KbError),
}

pub type Result<T> = std::result::Result<T, TableauError>;
