//! Client for the upload-coordination service.
//!
//! The coordination service issues multipart sessions, signs one URL per
//! part and assembles the final object. [`CoordinatorClient`] wraps its
//! JSON endpoints; [`StorageClient`] performs the signed part PUTs and
//! reports the storage integrity token (ETag) for each.

pub mod client;
pub mod credential;
pub mod storage;

pub use client::{CoordinatorClient, CoordinatorError, DEFAULT_BASE_URL};
pub use credential::{CredentialSource, EnvCredential, NoCredential, StaticCredential};
pub use storage::{PartReceipt, StorageClient};

#[cfg(test)]
mod test_server;
