//! hivefold engine - registry virtualization runtime
//!
//! Intercepted registry calls land in [`GuestRegistry`], which asks the
//! [`RegistrySwitch`] which backing store must service each handle:
//!
//! - [`VirtualRegistry`]: keys live entirely in memory, isolated from the host
//! - [`TransparentRegistry`]: operations pass through to the host registry,
//!   with handles issued and tracked locally
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  interception layer (HookManager + HookProviders)            │
//! └────────────────────────────┬─────────────────────────────────┘
//!                              │ guest calls
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  GuestRegistry  (runs under a thread ExclusionGuard)         │
//! └────────────────────────────┬─────────────────────────────────┘
//!                              │ RegistryRequest
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RegistrySwitch                                              │
//! │  • known handle  → owning store                              │
//! │  • hive root     → default store for the hive                │
//! │  • unknown       → recover through the host bridge           │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 ▼                              ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │  VirtualRegistry         │   │  TransparentRegistry         │
//! │  KeyTable + memory keys  │   │  KeyTable + HostRegistry     │
//! └──────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! Both stores draw handles from one shared [`HandleIndex`], which also
//! reserves the raw host handles adopted during recovery.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod guest;
pub mod hooking;
pub mod invariants;
pub mod request;
pub mod store;
pub mod switch;

pub use bootstrap::{bootstrap, Engine};
pub use config::EngineConfig;
pub use error::{ConfigError, SwitchError};
pub use guest::GuestRegistry;
pub use hooking::{
    ExclusionGuard, ExclusionList, ExclusionListener, HookError, HookInstaller, HookManager,
    HookProvider, HookSpec, RegistryHookProvider,
};
pub use invariants::{check_all_invariants, InvariantViolation};
pub use request::RegistryRequest;
pub use store::{
    HandleIndex, KeyTable, RegistryStore, StoreKind, TableSnapshot, TransparentRegistry, VirtualKeyRecord,
    VirtualRegistry,
};
pub use switch::RegistrySwitch;
