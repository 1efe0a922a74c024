//! CLI command implementations for triocall.
//!
//! Each submodule implements one subcommand; all of them implement the
//! [`command::Command`] trait and are dispatched from `main`.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]

pub mod call;
pub mod command;
