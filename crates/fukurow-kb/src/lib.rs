//! SROIQ(D) 知識ベース
//!
//! このクレートはテーブロー推論エンジンが消費する知識ベースを提供します:
//! - 概念・ロール・データ範囲 (否定標準形)
//! - 公理と知識ベース
//! - RBox (ロール階層とロール特性)
//! - TBox (遅延展開と一般包含公理の内部化)
//! - 表現力解析と未対応公理の検証

pub mod model;
pub mod ontology;
pub mod rbox;
pub mod tbox;
pub mod expressivity;
pub mod validate;
pub mod loader;

pub use model::{Concept, DataRange, Literal, Role};
pub use ontology::{Axiom, AxiomId, KnowledgeBase};
pub use rbox::RBox;
pub use tbox::TBox;
pub use expressivity::Expressivity;
pub use validate::{validate, UnsupportedPolicy};
pub use loader::{JsonOntologyLoader, OntologyDocument, OntologyLoader};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("Loader error: {0}")]
    LoaderError(String),

    #[error("Invalid axiom: {0}")]
    InvalidAxiom(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl From<serde_json::Error> for KbError {
    fn from(error: serde_json::Error) -> Self {
        KbError::LoaderError(error.to_string())
    }
}
