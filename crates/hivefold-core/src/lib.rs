//! hivefold core - pure data for registry virtualization
//!
//! This crate holds the HAL-free vocabulary shared by every other hivefold
//! crate. Nothing here touches the host registry or emits log output.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      hivefold-core                          │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │    KeyPath    │    │     Hive      │                   │
//! │   │  normalized,  │───▶│  reserved     │                   │
//! │   │  caseless     │    │  root handles │                   │
//! │   └───────────────┘    └───────────────┘                   │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │HandleGenerator│    │RuleCollection │                   │
//! │   │  atomic,      │    │  prefix rules │                   │
//! │   │  process-wide │    │  -> policy    │                   │
//! │   └───────────────┘    └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │         hivefold-host  /  hivefold-engine                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - Handles, value types, result codes, store errors
//! - `path` - Case-insensitive registry key paths
//! - `hive` - Well-known registry roots and their reserved handles
//! - `index` - Process-wide handle generator
//! - `rules` - Path-prefix virtualization rules

#![no_std]
extern crate alloc;

pub mod hive;
pub mod index;
pub mod path;
pub mod rules;
pub mod types;

pub use hive::{Hive, HIVE_HANDLE_FIRST, HIVE_HANDLE_LAST};
pub use index::{HandleGenerator, DEFAULT_HANDLE_BASE};
pub use path::KeyPath;
pub use rules::{Rule, RuleCollection};
pub use types::{
    CreationDisposition, Handle, RegistryValue, ResultCode, StoreError, ValueType,
    VirtualizationType,
};
