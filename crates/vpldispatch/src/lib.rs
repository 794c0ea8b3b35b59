// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! VPL Dispatcher for Rust
//!
//! Runtime dispatcher for oneVPL-style media runtimes. The dispatcher finds
//! every installed runtime module, asks each for a description of the
//! implementations it offers, filters those descriptions against caller
//! requirements and opens sessions on the best remaining match.
//!
//! Runtimes that predate self-description are wrapped by a compatibility
//! shim that probes them with throwaway sessions, so both generations are
//! enumerated and filtered the same way.
//!
//! # Quick Start
//!
//! ## Selecting a Hardware Decoder
//!
//! ```no_run
//! use vpldispatch::{FourCC, ImplType, Loader};
//!
//! let mut loader = Loader::new();
//! loader.add_filter("mfxImplDescription.Impl", ImplType::Hardware.raw())?;
//! loader.add_filter(
//!     "mfxImplDescription.mfxDecoderDescription.decoder.CodecID",
//!     FourCC::HEVC,
//! )?;
//!
//! let session = loader.create_session(0)?;
//! println!("decoding on {}", session.record().name);
//! # Ok::<(), vpldispatch::Error>(())
//! ```
//!
//! ## Listing Implementations
//!
//! ```no_run
//! use vpldispatch::{DeliveryFormat, Loader};
//!
//! let mut loader = Loader::new();
//! for index in 0.. {
//!     let Ok(caps) = loader.enumerate(index, DeliveryFormat::ImplPath) else {
//!         break;
//!     };
//!     println!("{}: {}", index, caps.path().unwrap().display());
//!     loader.release_capability(&caps)?;
//! }
//! # Ok::<(), vpldispatch::Error>(())
//! ```
//!
//! # Search Order
//!
//! Modules are searched, highest priority first, in caller-supplied paths
//! and `ONEVPL_SEARCH_PATH`, then `VPL_BIN`, then the OS library path, then
//! the platform default locations and finally legacy package directories.
//! See [`discovery`] for details.
//!
//! # Support
//!
//! For questions and support:
//! - Professional support: support@au-zone.com

/// The caps module provides the owned capability model of an implementation.
pub mod caps;

/// The discovery module finds candidate runtime modules.
pub mod discovery;

/// The error module provides the error types of each dispatcher stage.
pub mod error;

/// The filter module stores and evaluates config object filters.
pub mod filter;

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// The loader module provides the dispatcher entry point.
pub mod loader;

/// The module module loads runtime modules and validates their exports.
pub mod module;

/// The property module resolves property names against the capability schema.
pub mod property;

/// The registry module ranks loaded implementations and issues capability handles.
pub mod registry;

/// The session module provides sessions on a selected implementation.
pub mod session;

pub use caps::{AccelerationMode, ApiVersion, CapabilityRecord, ImplType, Range32U, ResourceType};
pub use discovery::{Candidate, Priority, SearchConfig};
pub use error::{CreateError, EnumError, Error, FilterError, LoadError, ReleaseError, Status};
pub use fourcc::FourCC;
pub use loader::{CandidateState, ConfigHandle, Loader};
pub use module::{ModuleApi, ModuleOpener, NativeOpener, SurfaceDomain};
pub use property::{TypedValue, ValueKind};
pub use registry::{Capability, CapabilityHandle, DeliveryFormat};
pub use session::{Session, SessionParams, SpecialConfig};
