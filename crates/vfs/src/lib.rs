//! Capability-aware virtual filesystem.
//!
//! A [`Backend`](backend::Backend) only needs to list and read. Anything more
//! (stat, write, remove, rename, mkdir, truncate) is an optional contract the
//! backend opts into. [`wrap()`] turns any backend into a uniform [`Volume`]
//! whose missing operations fail with
//! [`Unsupported`](error::ErrorKind::Unsupported), and whose
//! [`Capability`] set says up front what will work.

pub mod backend;
pub mod capability;
pub mod error;
mod models;
mod path;
mod ro;
mod storage;
pub mod volume;

pub use crate::capability::Capability;
pub use crate::models::FileInfo;
pub use crate::path::validate as validate_path;
pub use crate::ro::{ReadOnlyVolume, readonly};
pub use crate::storage::Storage;
pub use crate::volume::{Volume, VolumeAdapter, VolumeHandle, wrap};
