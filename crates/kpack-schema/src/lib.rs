//! # kpack-schema — Schema Registry for Knowledge Packs
//!
//! Holds the recognized field names and the legal values of every closed
//! set, per pack schema version, and resolves which version governs a pack
//! from its `compatibility` declaration.
//!
//! ## Closed Sets
//!
//! Tool types, connection types, auth methods, parameter types, transform
//! engines, guardrail severities and auto-modification conditions are enums
//! in [`vocab`]. Validators never compare raw strings against literals;
//! they ask the resolved [`RuleSet`] whether a variant is legal, so a new
//! schema version only touches this crate.
//!
//! ## Sharing
//!
//! A [`SchemaRegistry`] is immutable after construction and is `Send + Sync`.
//! [`SchemaRegistry::shared`] returns a process-wide instance.

pub mod registry;
pub mod vocab;

pub use registry::{Entity, RegistryError, RuleSet, SchemaRegistry};
pub use vocab::{
    AuthMethod, ComplianceFramework, ConnectionType, GuardrailSeverity, HttpMethod,
    ModificationCondition, ParamLocation, ParamType, PricingTier, RetryBackoff, ToolType,
    TransformEngine, UnknownVariant, Vocabulary,
};
