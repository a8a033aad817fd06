//! # kpack-pack — Knowledge Pack Definition Validator
//!
//! Parses a pack's configuration tree and guardrail policy and checks every
//! cross-reference and constraint, producing a deterministic [`Report`].
//!
//! ## Pipeline
//!
//! - **Parser** (`parser.rs`): reads text through a [`PackLoader`], resolves
//!   `structure` pointers to fragments, and folds everything into one
//!   immutable [`PackDocument`].
//!
//! - **Structural** (`structural/`): presence, type, closed-set membership
//!   and uniqueness, driven by the resolved [`kpack_schema::RuleSet`].
//!
//! - **Semantic** (`semantic/`): independent consistency rules
//!   (placeholders, `${VAR}` references, transforms, versions, tool targets).
//!
//! - **Guardrail** (`guardrail/`): pattern syntax, severities, overlap and
//!   override references of `guardrails.yaml`.
//!
//! - **Report** (`report.rs`): stage-ordered issues, summary and verdict.
//!
//! [`PackValidator`] runs the four passes; [`validate_collection`] runs it
//! over many packs in parallel.
//!
//! Alongside the pipeline, `scaffold.rs` renders new packs from a
//! [`PackBlueprint`] and `stats.rs` inventories existing ones.
//!
//! ## Crate Policy
//!
//! - No filesystem or network access. Text arrives through [`PackLoader`].
//! - Problems in a pack are issues, never `Err`. [`PackError`] is reserved
//!   for loader and registry failures.

pub mod collection;
pub mod document;
pub mod error;
pub mod guardrail;
pub mod loader;
pub mod parser;
pub mod report;
pub mod scaffold;
pub mod semantic;
pub mod stats;
pub mod structural;
pub mod template;
pub mod validator;

pub use collection::{validate_collection, CollectionReport, CollectionSummary, PackOutcome};
pub use document::{NamedEntry, Origin, PackDocument};
pub use error::{PackError, PackResult};
pub use guardrail::{check_guardrails, GuardrailRule, GuardrailValidator};
pub use loader::{MemoryLoader, PackLoader, RawFragment, PRIMARY_DOCUMENT};
pub use parser::{parse_pack, ParseOutcome};
pub use report::{Report, ReportBuilder, Summary, Verdict};
pub use scaffold::{PackBlueprint, SCAFFOLD_CONNECTIONS};
pub use semantic::{check_semantics, SemanticRule, SemanticValidator};
pub use stats::{index_packs, IndexEntry, IndexTotals, PackIndex, PackStatistics};
pub use structural::check_structure;
pub use validator::{validate_pack, validate_str, PackValidator, ValidationOptions};
