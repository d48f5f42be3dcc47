//! # Fulpack Archive Engine
//!
//! This crate implements a security-hardened archive operations engine for
//! tar, tar.gz, zip and single-file gzip containers.
//!
//! It is designed to be used by the `fulpack` command-line application, but
//! its public API can also be used programmatically. Five operations cover
//! the surface: [`create`], [`extract`], [`scan`], [`verify`] and [`info`].
//!
//! ## Key Modules
//!
//! - [`formats`]: One codec adapter per container format behind a closed
//!   [`formats::Format`] dispatch.
//! - [`safety`]: Pure entry-path validation (traversal / absolute-path
//!   rejection).
//! - [`guard`]: Streaming resource accounting against byte and entry
//!   ceilings.
//! - [`create`], [`extract`], [`inspect`]: The operation facades.
//!
//! ## Security defaults
//!
//! Extraction rejects traversal-shaped and absolute entry paths, never
//! materializes symlinks, and aborts mid-stream once cumulative output
//! exceeds the configured ceiling (1 GiB / 100,000 entries by default).
//!
//! ## Examples
//!
//! ```no_run
//! use fulpack::{create, formats::Format, options::CreateOptions};
//! use std::path::{Path, PathBuf};
//!
//! # async fn demo() -> Result<(), fulpack::FulpackError> {
//! let info = create(
//!     &[PathBuf::from("docs/")],
//!     Path::new("docs.tar.gz"),
//!     Format::TarGz,
//!     CreateOptions::default(),
//! )
//! .await?;
//! assert!(info.entry_count > 0);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod checksum;
pub mod cli;
pub mod common;
pub mod create;
pub mod error;
pub mod extract;
pub mod formats;
pub mod guard;
pub mod inspect;
pub mod options;
pub mod safety;

// Cross-platform filesystem wrapper
pub mod fsx;

pub use cancel::CancelToken;
pub use common::{ArchiveEntry, ArchiveInfo, EntryType, ExtractResult, ValidationResult};
pub use create::create;
pub use error::{ErrorCode, FulpackError, Operation};
pub use extract::extract;
pub use formats::Format;
pub use inspect::{info, scan, verify};
