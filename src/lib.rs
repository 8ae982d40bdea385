// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # netbox-do-sync
//!
//! Branch-staged, reviewable reconciliation between a NetBox inventory and
//! DigitalOcean droplets.
//!
//! ## Overview
//!
//! One system holds desired state, the other is made to match it:
//!
//! - Both sides are read live and normalized into canonical resources
//! - A deterministic change set is computed and shown before anything mutates
//! - Changes are written to a named branch (a NetBox branching branch or a
//!   DigitalOcean project), never to the trunk by accident
//! - Missing branches are only created when explicitly forced
//!
//! ## Architecture
//!
//! 1. **Desired State**: read from the source system
//! 2. **Observed State**: read from the target, scoped to the branch
//! 3. **Reconciler**: diffs, renders, and applies operations one by one
//!
//! ## Modules
//!
//! - [`resource`]: Canonical resource model and normalization
//! - [`planner`]: Diff engine, change sets, branches, and execution
//! - [`reconciler`]: One run as an explicit state machine
//! - [`netbox`]: NetBox REST client and adapter
//! - [`digitalocean`]: DigitalOcean API client and adapter
//! - [`config`]: Configuration file, validation, and settings resolution
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! netbox:
//!   url: https://netbox.example.com
//!   filters:
//!     tag: cloud
//!
//! digitalocean:
//!   tag: netbox-managed
//!   image: ubuntu-24-04-x64
//!
//! sync:
//!   direction: netbox-to-digitalocean
//!   default_branch: main
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod adapter;
pub mod cli;
pub mod config;
pub mod digitalocean;
pub mod error;
mod http;
pub mod netbox;
pub mod planner;
pub mod reconciler;
pub mod resource;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::{BranchStore, InventorySource, SyncTarget};
pub use cli::{Cli, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, Direction, Settings, SyncConfig};
pub use error::{Result, SyncError};
pub use planner::{BranchManager, ChangeSet, DiffEngine, SyncExecutor};
pub use reconciler::{Reconciler, SyncOutcome, SyncRequest};
pub use resource::{Normalizer, Resource, ResourceKind};
