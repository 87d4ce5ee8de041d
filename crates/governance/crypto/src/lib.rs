//! # governance-crypto
//!
//! Tamper evidence for governance records.
//!
//! - [`hashing`]: canonical (key-sorted) JSON and SHA-256 content hashes
//! - [`merkle`]: order-independent merkle roots over a record's fields
//! - [`KeyStore`]: Ed25519 key lifecycle, file-backed or ephemeral
//! - [`CryptographicVerifier`]: signs and verifies scorecards and lineage records
//!
//! Scorecard verification recomputes the merkle root before touching the
//! signature: a root mismatch is reported as tampering without any
//! signature check.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod hashing;
mod keys;
pub mod merkle;
mod verifier;

pub use error::{CryptoError, CryptoResult};
pub use hashing::{canonical_json, hash_content, sha256_hex};
pub use keys::{key_id_for, KeyStore};
pub use merkle::{merkle_root, object_merkle_root};
pub use verifier::{CryptoConfig, CryptographicVerifier, SignatureAlgorithm};
