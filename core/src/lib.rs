//! # bedrock-core
//!
//! The discovery-and-orchestration engine behind the bedrock installer:
//! concurrent network probing, SSH-banner OS classification, hardware and
//! IOMMU introspection, and the phase state machine that drives an external
//! automation runner while streaming progress to subscribers.
//!
//! The transport layer (HTTP, WebSocket, CLI) lives elsewhere; this crate
//! exposes plain async operations and typed results.

pub mod discovery;
pub mod exec;
pub mod hardware;
pub mod install;
pub mod net;
pub mod verify;
