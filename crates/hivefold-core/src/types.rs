//! Core registry types
//!
//! Plain data shared by the stores, the switch and the host bridge.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Opaque key handle presented to the guest.
///
/// Values issued by hivefold come from [`crate::HandleGenerator`]; values in
/// the hive range are reserved by the OS for the registry roots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(pub u32);

impl Handle {
    /// Raw numeric value
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// How accesses to a key are serviced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirtualizationType {
    /// Fully isolated, never touches the host registry
    Virtual,
    /// Isolated, seeded with host data on first access
    VirtualWithFallback,
    /// Reads pass through to the host, writes land in the virtual overlay
    TransparentRead,
    /// Every operation passes through to the host registry
    Transparent,
}

/// Outcome of a create operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreationDisposition {
    /// The key did not exist and was created
    CreatedNewKey,
    /// The key already existed and was opened
    OpenedExistingKey,
}

/// Registry value kinds, numbered as the host registry numbers them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    None,
    String,
    ExpandString,
    Binary,
    DWord,
    DWordBigEndian,
    Link,
    MultiString,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    QWord,
}

impl ValueType {
    /// Host numbering of this value type
    pub fn to_raw(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::DWord => 4,
            ValueType::DWordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::QWord => 11,
        }
    }

    /// Parse the host numbering; unknown kinds yield `None`
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::DWord,
            5 => ValueType::DWordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::QWord,
            _ => return None,
        })
    }
}

/// A named value stored under a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryValue {
    /// Value name (empty string is the key's default value)
    pub name: String,
    /// Raw value bytes
    pub data: Vec<u8>,
    /// Declared value kind
    pub value_type: ValueType,
}

impl RegistryValue {
    /// Create a value from raw parts.
    pub fn new(name: impl Into<String>, data: Vec<u8>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            data,
            value_type,
        }
    }

    /// Create a little-endian DWORD value.
    pub fn dword(name: impl Into<String>, value: u32) -> Self {
        Self::new(name, value.to_le_bytes().to_vec(), ValueType::DWord)
    }

    /// Check whether this value answers to `name` (case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Failure taxonomy for store operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Handle unknown to the addressed store
    #[error("invalid handle")]
    InvalidHandle,
    /// Underlying medium refused the operation
    #[error("access denied")]
    AccessDenied,
    /// Key or value does not exist
    #[error("not found")]
    NotFound,
}

/// Guest-facing result code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    InvalidHandle,
    AccessDenied,
    NotFound,
}

impl ResultCode {
    /// Collapse a store result into the code handed back to the guest.
    pub fn from_result<T>(result: &Result<T, StoreError>) -> Self {
        match result {
            Ok(_) => ResultCode::Success,
            Err(err) => (*err).into(),
        }
    }

    /// Check for success
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

impl From<StoreError> for ResultCode {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidHandle => ResultCode::InvalidHandle,
            StoreError::AccessDenied => ResultCode::AccessDenied,
            StoreError::NotFound => ResultCode::NotFound,
        }
    }
}
