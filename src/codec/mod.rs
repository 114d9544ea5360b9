//! Document codec boundary
//!
//! The engine never touches the PDF object model directly. Protection checks,
//! password verification, page enumeration and writing new containers all go
//! through `DocumentCodec`. `LopdfCodec` is the implementation shipped with
//! the crate.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

pub mod lopdf_codec;
pub mod standard_security;

pub use lopdf_codec::{LopdfCodec, LopdfContainer, LopdfHandle};

/// Reference to one page of an opened document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    /// 1-based page number
    pub number: u32,
    pub object: u32,
    pub generation: u16,
}

/// Cipher used when protecting a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CipherStrength {
    #[serde(rename = "rc4-40")]
    Rc4_40,
    #[serde(rename = "rc4-128")]
    #[default]
    Rc4_128,
}

impl CipherStrength {
    pub fn key_bits(&self) -> u32 {
        match self {
            CipherStrength::Rc4_40 => 40,
            CipherStrength::Rc4_128 => 128,
        }
    }
}

impl fmt::Display for CipherStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherStrength::Rc4_40 => write!(f, "rc4-40"),
            CipherStrength::Rc4_128 => write!(f, "rc4-128"),
        }
    }
}

impl FromStr for CipherStrength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rc4-40" => Ok(CipherStrength::Rc4_40),
            "rc4-128" => Ok(CipherStrength::Rc4_128),
            other => Err(format!("unknown cipher strength: {}", other)),
        }
    }
}

/// Capabilities the engine consumes from a document implementation.
///
/// Handles are opened per file and never shared between files. A container
/// is filled from a single source handle and consumed by `write`.
pub trait DocumentCodec: Send + Sync + 'static {
    type Handle: Send;
    type Container: Send;

    fn open(&self, path: &Path) -> Result<Self::Handle, CodecError>;

    fn is_protected(&self, handle: &Self::Handle) -> bool;

    /// Checks `password` against the document and unlocks the handle on
    /// success. Unprotected documents accept any password.
    fn verify_password(&self, handle: &mut Self::Handle, password: &[u8]) -> Result<bool, CodecError>;

    fn pages(&self, handle: &Self::Handle) -> Vec<PageRef>;

    fn new_container(&self) -> Self::Container;

    fn add_page(
        &self,
        container: &mut Self::Container,
        source: &Self::Handle,
        page: PageRef,
    ) -> Result<(), CodecError>;

    fn encrypt(
        &self,
        container: &mut Self::Container,
        user_password: &[u8],
        owner_password: &[u8],
        permission_bits: u32,
        strength: CipherStrength,
    ) -> Result<(), CodecError>;

    /// Serializes the container completely before touching `path`, then
    /// replaces `path` atomically.
    fn write(&self, container: Self::Container, path: &Path) -> Result<(), CodecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_strength_parses_and_displays() {
        assert_eq!("RC4-40".parse::<CipherStrength>().unwrap(), CipherStrength::Rc4_40);
        assert_eq!(CipherStrength::Rc4_128.to_string(), "rc4-128");
        assert_eq!(CipherStrength::default().key_bits(), 128);
        assert!("aes-256".parse::<CipherStrength>().is_err());
    }
}
