// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Error types for each stage of the dispatcher.
//!
//! Every stage has its own error enum so callers can match on exactly the
//! failures that stage can produce. [`Error`] wraps all of them for code
//! that only needs to propagate with `?`.

use std::{error, fmt, path::PathBuf, sync::Arc};

use crate::caps::ApiVersion;
use crate::property::ValueKind;
use vpldispatch_sys as ffi;

/// Status code returned by a runtime entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const NONE: Status = Status(ffi::mfxStatus_MFX_ERR_NONE);
    pub const UNKNOWN: Status = Status(ffi::mfxStatus_MFX_ERR_UNKNOWN);
    pub const NULL_PTR: Status = Status(ffi::mfxStatus_MFX_ERR_NULL_PTR);
    pub const UNSUPPORTED: Status = Status(ffi::mfxStatus_MFX_ERR_UNSUPPORTED);
    pub const MEMORY_ALLOC: Status = Status(ffi::mfxStatus_MFX_ERR_MEMORY_ALLOC);
    pub const INVALID_HANDLE: Status = Status(ffi::mfxStatus_MFX_ERR_INVALID_HANDLE);
    pub const NOT_INITIALIZED: Status = Status(ffi::mfxStatus_MFX_ERR_NOT_INITIALIZED);
    pub const NOT_FOUND: Status = Status(ffi::mfxStatus_MFX_ERR_NOT_FOUND);
    pub const INVALID_VIDEO_PARAM: Status = Status(ffi::mfxStatus_MFX_ERR_INVALID_VIDEO_PARAM);
    pub const PARTIAL_ACCELERATION: Status = Status(ffi::mfxStatus_MFX_WRN_PARTIAL_ACCELERATION);

    /// Map a raw status to `Ok(())` for success and warnings (non-negative
    /// values), `Err` otherwise.
    pub fn check(raw: i32) -> Result<(), Status> {
        if raw >= 0 {
            Ok(())
        } else {
            Err(Status(raw))
        }
    }

    /// Map a raw status to `Ok(())` only for `MFX_ERR_NONE`. Session
    /// creation and device handle calls treat warnings as failures.
    pub fn require(raw: i32) -> Result<(), Status> {
        if raw == ffi::mfxStatus_MFX_ERR_NONE {
            Ok(())
        } else {
            Err(Status(raw))
        }
    }

    fn name(&self) -> Option<&'static str> {
        Some(match *self {
            Status::NONE => "MFX_ERR_NONE",
            Status::UNKNOWN => "MFX_ERR_UNKNOWN",
            Status::NULL_PTR => "MFX_ERR_NULL_PTR",
            Status::UNSUPPORTED => "MFX_ERR_UNSUPPORTED",
            Status::MEMORY_ALLOC => "MFX_ERR_MEMORY_ALLOC",
            Status::INVALID_HANDLE => "MFX_ERR_INVALID_HANDLE",
            Status::NOT_INITIALIZED => "MFX_ERR_NOT_INITIALIZED",
            Status::NOT_FOUND => "MFX_ERR_NOT_FOUND",
            Status::INVALID_VIDEO_PARAM => "MFX_ERR_INVALID_VIDEO_PARAM",
            Status::PARTIAL_ACCELERATION => "MFX_WRN_PARTIAL_ACCELERATION",
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// Failure to turn a candidate module into implementation entries.
///
/// Kept on the candidate after a failed load, hence `Clone`.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// The OS loader could not open the module
    OpenFailed {
        path: PathBuf,
        source: Arc<ffi::libloading::Error>,
    },
    /// The module lacks entry points required for its reported API version
    MissingSymbols(Vec<&'static str>),
    /// The module reports an API version below the supported minimum
    VersionTooLow {
        found: ApiVersion,
        required: ApiVersion,
    },
    /// The capability query entry point returned an error or no data
    QueryFailed(Status),
    /// A capability description violated a structural invariant
    InvalidDescription { index: u32, reason: String },
    /// The legacy compatibility probe could not open any session
    ProbeFailed(Status),
    /// The module loaded but produced no usable implementation
    NoImplementations,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::OpenFailed { path, source } => {
                write!(f, "could not open {}: {}", path.display(), source)
            }
            LoadError::MissingSymbols(names) => {
                write!(f, "missing required entry points: {}", names.join(", "))
            }
            LoadError::VersionTooLow { found, required } => {
                write!(f, "API version {} is below required {}", found, required)
            }
            LoadError::QueryFailed(status) => write!(f, "capability query failed: {}", status),
            LoadError::InvalidDescription { index, reason } => {
                write!(f, "implementation {} has an invalid description: {}", index, reason)
            }
            LoadError::ProbeFailed(status) => {
                write!(f, "legacy runtime probe failed: {}", status)
            }
            LoadError::NoImplementations => write!(f, "module exposes no usable implementation"),
        }
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LoadError::OpenFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Rejection of a `set_filter` call. The filter set is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The property path does not name a known field
    UnknownPath(String),
    /// The value's type does not match the schema for the path
    TypeMismatch {
        path: String,
        expected: &'static [ValueKind],
        found: ValueKind,
    },
    /// The value is structurally unusable, such as a null device handle
    InvalidValue(String),
    /// The config handle does not belong to this loader
    InvalidConfig,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FilterError::UnknownPath(path) => write!(f, "unknown property path '{}'", path),
            FilterError::TypeMismatch {
                path,
                expected,
                found,
            } => {
                let expected: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
                write!(
                    f,
                    "property '{}' expects {} but got {}",
                    path,
                    expected.join(" or "),
                    found
                )
            }
            FilterError::InvalidValue(path) => write!(f, "invalid value for property '{}'", path),
            FilterError::InvalidConfig => write!(f, "config handle does not belong to this loader"),
        }
    }
}

impl error::Error for FilterError {}

/// Failure of `enumerate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumError {
    /// Index past the last valid implementation; ends enumeration
    NotFound,
    /// The implementation cannot deliver the requested format
    Unsupported,
}

impl fmt::Display for EnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EnumError::NotFound => write!(f, "no implementation at this index"),
            EnumError::Unsupported => write!(f, "delivery format not supported by implementation"),
        }
    }
}

impl error::Error for EnumError {}

/// Failure of `release_capability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    /// The handle was not issued by this loader
    InvalidHandle,
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReleaseError::InvalidHandle => write!(f, "capability handle not issued by this loader"),
        }
    }
}

impl error::Error for ReleaseError {}

/// Failure of `create_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// Index past the last valid implementation
    NotFound,
    /// The runtime refused to create or configure the session
    Native(Status),
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CreateError::NotFound => write!(f, "no implementation at this index"),
            CreateError::Native(status) => write!(f, "session creation failed: {}", status),
        }
    }
}

impl error::Error for CreateError {}

/// Any dispatcher error.
#[derive(Debug)]
pub enum Error {
    Load(LoadError),
    Filter(FilterError),
    Enum(EnumError),
    Release(ReleaseError),
    Create(CreateError),
    /// A runtime call on an open session failed
    Native(Status),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Load(err) => write!(f, "load error: {}", err),
            Error::Filter(err) => write!(f, "filter error: {}", err),
            Error::Enum(err) => write!(f, "enumeration error: {}", err),
            Error::Release(err) => write!(f, "release error: {}", err),
            Error::Create(err) => write!(f, "create error: {}", err),
            Error::Native(status) => write!(f, "runtime error: {}", status),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Load(err) => Some(err),
            Error::Filter(err) => Some(err),
            Error::Enum(err) => Some(err),
            Error::Release(err) => Some(err),
            Error::Create(err) => Some(err),
            Error::Native(_) => None,
        }
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        Error::Load(err)
    }
}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Error::Filter(err)
    }
}

impl From<EnumError> for Error {
    fn from(err: EnumError) -> Self {
        Error::Enum(err)
    }
}

impl From<ReleaseError> for Error {
    fn from(err: ReleaseError) -> Self {
        Error::Release(err)
    }
}

impl From<CreateError> for Error {
    fn from(err: CreateError) -> Self {
        Error::Create(err)
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Native(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_check() {
        assert_eq!(Status::check(0), Ok(()));
        // Positive values are warnings and do not fail
        assert_eq!(Status::check(5), Ok(()));
        assert_eq!(Status::check(-9), Err(Status::NOT_FOUND));
    }

    #[test]
    fn test_status_require() {
        assert_eq!(Status::require(0), Ok(()));
        assert_eq!(Status::require(4), Err(Status::PARTIAL_ACCELERATION));
        assert_eq!(Status::require(-3), Err(Status::UNSUPPORTED));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::UNSUPPORTED.to_string(), "MFX_ERR_UNSUPPORTED (-3)");
        assert_eq!(Status(-42).to_string(), "status -42");
    }

    #[test]
    fn test_error_source_chain() {
        let err = Error::from(EnumError::NotFound);
        assert!(error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "enumeration error: no implementation at this index");
    }
}
