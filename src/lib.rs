//! # CCASFS
//!
//! *CCASFS* splits files into fixed-size chunks, names each chunk by the
//! SHA-256 digest of its content, and stores chunks across a set of backing
//! "disks" (independent filesystem roots) under a fan-out directory layout.
//! A per-file manifest records the ordered digests that reconstitute a file;
//! a torrent-style catalog record carries per-file length and piece
//! structure. A filesystem façade exposes open/read/write/seek/truncate/
//! close over a buffered handle, plus a shadow directory tree for listing
//! and stat.
//!
//! This crate is split into a [Library](#library) part and an
//! [Application](#application) part.
//!
//! ## Library
//!
//! The library is organized bottom-up:
//!
//! - [`digest`] — content addressing: hex SHA-256 and fan-out path
//!   derivation.
//! - [`chunkserver`] — a single backing disk.
//! - [`catalog`] — the per-file info record codec (bencode-based).
//! - [`config`] — [`CcasConfig`], loadable from TOML.
//! - [`master`] — placement, manifest/catalog persistence, exists/rename/
//!   delete.
//! - [`client`] — chunking plus the write and read protocols.
//! - [`fs`] — the filesystem façade: buffered handles and the shadow tree.
//! - [`error`] — the crate-wide [`CcasError`] type.
//!
//! A minimal setup, using two backing disks in mirror mode:
//!
//! ```no_run
//! use std::sync::Arc;
//! use ccasfs::config::CcasConfig;
//! use ccasfs::master::Master;
//! use ccasfs::client::Client;
//! use ccasfs::fs::{Facade, OpenMode};
//!
//! # fn main() -> ccasfs::error::Result<()> {
//! let config = CcasConfig::from_toml_file("ccasfs.toml")?;
//! let master = Arc::new(Master::new(&config));
//! let client = Client::new(master);
//! let facade = Facade::new(client, config.index_path.clone());
//!
//! let handle = facade.open("/hello.txt", OpenMode::Write)?;
//! handle.write(b"hello, ccasfs")?;
//! handle.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Application
//!
//! ### Installation
//!
//! ```shell
//! cargo install --locked ccasfs
//! ```
//!
//! ### Usage
//!
//! ```text
//! Usage: ccasfs --config <CONFIG> <COMMAND>
//!
//! Commands:
//!   write    Write a file's contents from stdin or a source path
//!   read     Print a file's contents to stdout
//!   delete   Tombstone a file
//!   rename   Rename a file
//!   ls       List a directory
//!   stat     Show size and shadow-tree timestamps for a path
//!
//! Options:
//!       --config <CONFIG>
//!           Path to a CCASFS TOML configuration file
//!
//!   -h, --help
//!           Print help
//! ```

pub mod catalog;
pub mod chunkserver;
pub mod client;
pub mod config;
pub mod digest;
pub mod error;
pub mod fs;
pub mod master;

pub use client::Client;
pub use config::CcasConfig;
pub use error::{CcasError, Result};
pub use fs::{Facade, FileHandle, FileInfo, OpenMode};
pub use master::{Master, WriteAlgorithm};
