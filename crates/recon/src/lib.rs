//! `sheetmerge-recon`: schema and value reconciliation for heterogeneous
//! spreadsheets, plus heuristic field extraction for KFTA personnel sheets.
//!
//! Pure engine crate: receives pre-loaded tables, returns one canonical table
//! and a run report. No file or network IO; the semantic oracle is injected
//! through [`SimilarityOracle`].

pub mod driver;
pub mod error;
pub mod extract;
pub mod lookup;
pub mod model;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod similarity;

pub use driver::{unify, InputLayout, OutputFormat, UnifyOptions, UnifyResult};
pub use error::UnifyError;
pub use extract::{FieldExtractor, RowLayout};
pub use lookup::LookupTables;
pub use model::{
    CanonicalRecord, CanonicalTable, ColumnGroup, ColumnGroups, KftaField, KftaRecord, RawTable,
    SchoolResolution,
};
pub use report::RunReport;
pub use schema::{KeywordRule, SchemaReconciler};
pub use similarity::{
    EditDistanceScorer, OracleChain, Similarity, SimilarityOracle, Verification,
};
