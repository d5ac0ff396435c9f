//! # bedrock-common
//!
//! Shared domain models and configuration for the bedrock bootstrap engine.
//!
//! This crate holds everything the engine and the CLI agree on: candidate
//! host records produced by discovery, hardware profiles, the installation
//! status object pushed to observers, and the engine configuration knobs.
//! It performs no I/O of its own.

pub mod config;
pub mod hardware;
pub mod install;
pub mod network;

/// Logs an informational message through `tracing`.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

/// Logs a success message. The dedicated target lets the CLI formatter
/// give these a distinct symbol.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        tracing::info!(target: "bedrock::success", $($arg)*)
    };
}

/// Logs a warning through `tracing`.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

/// Logs an error through `tracing`.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}
