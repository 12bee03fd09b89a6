//! sharetree: a live tree of expect/actual declarations kept in sync by
//! structural diffs.
//!
//! Layers, innermost first: [`domain`] (tree model, diff, replay; no I/O),
//! [`application`] (refresh service and scheduler), [`infrastructure`]
//! (source scanner, wiring) and [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
