//! Shared utilities for the `treed` workspace
//!
//! This crate is the low-level collaborator that the core engine (`treed`) and
//! the stress harness (`treed-stress`) both depend on. It owns path parsing and
//! validation (`path`) — kept separate from the Monitor/Node/TreeOps core the
//! same way the original design keeps its hash-map and path-string helpers as
//! external collaborators, touched only through a narrow contract.

pub mod path;
