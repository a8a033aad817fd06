//! # kpack-cli — Command-Line Interface for Knowledge Packs
//!
//! Provides the `kpack` binary: a filesystem-backed loader over the
//! validation core, configuration file handling, report rendering and the
//! exit-code contract automation relies on.
//!
//! ## Subcommands
//!
//! - `kpack validate <PATH>` — Validate one pack directory (or its
//!   `pack.yaml`). With `--all`, validate every pack found under `PATH`.
//! - `kpack create <NAME>` — Scaffold a modular pack and validate it.
//! - `kpack list [DIR]` — Inventory packs: metadata, counts, digests.
//! - `kpack schema` — List registered schema versions and the vocabularies
//!   of one rule set.
//!
//! ```bash
//! kpack validate packs/blog-api
//! kpack validate packs/ --all --format json --jobs 4
//! kpack create orders --connection database --output packs/
//! kpack list packs/ --format json
//! kpack schema --version 1.0.0
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Every pack is valid |
//! | 1 | At least one pack is invalid |
//! | 2 | A system error prevented a report (unreadable file, bad config) |

pub mod config;
pub mod create;
pub mod list;
pub mod loader;
pub mod output;
pub mod schema;
pub mod validate;

/// Every pack validated and passed.
pub const EXIT_VALID: u8 = 0;

/// At least one report has an `INVALID` verdict.
pub const EXIT_INVALID: u8 = 1;

/// A system error; no trustworthy report exists.
pub const EXIT_SYSTEM: u8 = 2;
