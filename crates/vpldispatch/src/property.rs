// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Property paths and typed values.
//!
//! A property path is a dotted name such as
//! `mfxImplDescription.mfxDecoderDescription.decoder.CodecID`. It is
//! resolved once, against a static schema of the capability model, into a
//! [`PropertyPath`]: the walked segments (repeated collections marked as
//! "any element") and the [`Property`] it designates.
//!
//! A few reserved top-level names are not part of the capability tree and
//! resolve to a [`Special`] session parameter instead.

use std::fmt;

use crate::caps::Range32U;
use crate::error::FilterError;

/// Type tag of a [`TypedValue`], used in schema checks and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    U16,
    U32,
    I32,
    Str,
    Ptr,
    Range,
    Query,
    Present,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::I32 => "i32",
            ValueKind::Str => "string",
            ValueKind::Ptr => "pointer",
            ValueKind::Range => "range",
            ValueKind::Query => "query",
            ValueKind::Present => "present",
        };
        f.write_str(name)
    }
}

/// The value of a filter or special parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    U16(u16),
    U32(u32),
    I32(i32),
    /// Substring match on string fields
    Str(String),
    /// Whole-string match on string fields
    ExactStr(String),
    /// Opaque native handle, such as a device pointer
    Ptr(usize),
    Range(Range32U),
    /// Matches trivially; requests that a sub-tree be reported
    Query,
    /// Requires the named sub-tree to be non-empty
    Present,
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::U16(_) => ValueKind::U16,
            TypedValue::U32(_) => ValueKind::U32,
            TypedValue::I32(_) => ValueKind::I32,
            TypedValue::Str(_) | TypedValue::ExactStr(_) => ValueKind::Str,
            TypedValue::Ptr(_) => ValueKind::Ptr,
            TypedValue::Range(_) => ValueKind::Range,
            TypedValue::Query => ValueKind::Query,
            TypedValue::Present => ValueKind::Present,
        }
    }
}

impl From<u16> for TypedValue {
    fn from(v: u16) -> Self {
        TypedValue::U16(v)
    }
}

impl From<u32> for TypedValue {
    fn from(v: u32) -> Self {
        TypedValue::U32(v)
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        TypedValue::I32(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::Str(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::Str(v)
    }
}

impl From<Range32U> for TypedValue {
    fn from(v: Range32U) -> Self {
        TypedValue::Range(v)
    }
}

impl From<crate::fourcc::FourCC> for TypedValue {
    fn from(v: crate::fourcc::FourCC) -> Self {
        TypedValue::U32(v.to_u32())
    }
}

/// Group of properties that must be satisfied by one shared element when
/// they appear in the same config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    /// Scalars of the implementation itself, each matched on its own
    Implementation,
    SubDevice,
    Decoder,
    Encoder,
    Vpp,
    Functions,
}

/// A sub-tree named by a path that stops above a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subtree {
    Description,
    Device,
    SubDevices,
    Decoders,
    Encoders,
    Vpp,
    Functions,
}

/// A leaf or sub-tree of the capability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Impl,
    AccelerationMode,
    ApiVersion,
    ApiVersionMajor,
    ApiVersionMinor,
    VendorId,
    VendorImplId,
    ImplName,
    License,
    Keywords,
    DeviceId,
    MediaAdapterType,
    SubDeviceIndex,
    SubDeviceId,
    DecCodecId,
    DecMaxLevel,
    DecProfile,
    DecMemHandleType,
    DecWidth,
    DecHeight,
    DecColorFormat,
    EncCodecId,
    EncMaxLevel,
    EncBiDirectional,
    EncProfile,
    EncMemHandleType,
    EncWidth,
    EncHeight,
    EncColorFormat,
    VppFilterId,
    VppMaxDelay,
    VppMemHandleType,
    VppWidth,
    VppHeight,
    VppInFormat,
    VppOutFormat,
    FunctionName,
    Presence(Subtree),
}

const U16: &[ValueKind] = &[ValueKind::U16];
const U32: &[ValueKind] = &[ValueKind::U32];
const I32: &[ValueKind] = &[ValueKind::I32];
const STR: &[ValueKind] = &[ValueKind::Str];
const DIMENSION: &[ValueKind] = &[ValueKind::U32, ValueKind::Range];
const DEVICE_ID: &[ValueKind] = &[ValueKind::Str, ValueKind::U16];
const PRESENCE: &[ValueKind] = &[ValueKind::Query, ValueKind::Present];
const PTR: &[ValueKind] = &[ValueKind::Ptr];

impl Property {
    /// Value kinds this property accepts.
    pub fn accepts(&self) -> &'static [ValueKind] {
        use Property::*;
        match self {
            Impl | ApiVersion | VendorId | VendorImplId | SubDeviceIndex => U32,
            AccelerationMode | ApiVersionMajor | ApiVersionMinor | MediaAdapterType => U16,
            ImplName | License | Keywords | SubDeviceId | FunctionName => STR,
            DeviceId => DEVICE_ID,
            DecCodecId | DecProfile | DecColorFormat => U32,
            EncCodecId | EncProfile | EncColorFormat => U32,
            VppFilterId | VppInFormat | VppOutFormat => U32,
            DecMaxLevel | EncMaxLevel | EncBiDirectional | VppMaxDelay => U16,
            DecMemHandleType | EncMemHandleType | VppMemHandleType => I32,
            DecWidth | DecHeight | EncWidth | EncHeight | VppWidth | VppHeight => DIMENSION,
            Presence(_) => PRESENCE,
        }
    }

    pub fn domain(&self) -> Domain {
        use Property::*;
        match self {
            SubDeviceIndex | SubDeviceId => Domain::SubDevice,
            DecCodecId | DecMaxLevel | DecProfile | DecMemHandleType | DecWidth | DecHeight
            | DecColorFormat => Domain::Decoder,
            EncCodecId | EncMaxLevel | EncBiDirectional | EncProfile | EncMemHandleType
            | EncWidth | EncHeight | EncColorFormat => Domain::Encoder,
            VppFilterId | VppMaxDelay | VppMemHandleType | VppWidth | VppHeight | VppInFormat
            | VppOutFormat => Domain::Vpp,
            FunctionName => Domain::Functions,
            _ => Domain::Implementation,
        }
    }
}

/// Session parameters set through reserved property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    /// `mfxHandleType`: type of the device handle passed to the session
    HandleType,
    /// `mfxHDL`: the device handle
    Handle,
    /// `NumThread`: worker threads requested for software sessions
    NumThread,
    /// `DeviceCopy`: GPU copy preference
    DeviceCopy,
}

impl Special {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "mfxHandleType" => Some(Special::HandleType),
            "mfxHDL" => Some(Special::Handle),
            "NumThread" => Some(Special::NumThread),
            "DeviceCopy" => Some(Special::DeviceCopy),
            _ => None,
        }
    }

    pub fn accepts(&self) -> &'static [ValueKind] {
        match self {
            Special::HandleType | Special::NumThread => U32,
            Special::Handle => PTR,
            Special::DeviceCopy => U16,
        }
    }
}

/// One step of a resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Field(&'static str),
    /// A repeated collection; matches when any element matches the rest
    AnyOf(&'static str),
}

/// A resolved property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    segments: Vec<Segment>,
    property: Property,
}

impl PropertyPath {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn property(&self) -> Property {
        self.property
    }

    /// Canonical dotted name, with aliases normalized.
    pub fn name(&self) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Field(n) | Segment::AnyOf(n) => *n,
            })
            .collect();
        parts.join(".")
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Result of resolving a property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Filter(PropertyPath),
    Special(Special),
}

struct Node {
    name: &'static str,
    alias: Option<&'static str>,
    repeated: bool,
    kind: NodeKind,
}

enum NodeKind {
    Leaf(Property),
    Group(Subtree, &'static [Node]),
}

const fn leaf(name: &'static str, property: Property) -> Node {
    Node {
        name,
        alias: None,
        repeated: false,
        kind: NodeKind::Leaf(property),
    }
}

const fn list_leaf(name: &'static str, alias: &'static str, property: Property) -> Node {
    Node {
        name,
        alias: Some(alias),
        repeated: true,
        kind: NodeKind::Leaf(property),
    }
}

const fn group(name: &'static str, subtree: Subtree, children: &'static [Node]) -> Node {
    Node {
        name,
        alias: None,
        repeated: false,
        kind: NodeKind::Group(subtree, children),
    }
}

const fn list(name: &'static str, subtree: Subtree, children: &'static [Node]) -> Node {
    Node {
        name,
        alias: None,
        repeated: true,
        kind: NodeKind::Group(subtree, children),
    }
}

static DECODER_MEMORY: [Node; 4] = [
    leaf("MemHandleType", Property::DecMemHandleType),
    leaf("Width", Property::DecWidth),
    leaf("Height", Property::DecHeight),
    list_leaf("ColorFormats", "ColorFormat", Property::DecColorFormat),
];

static DECODER_PROFILE: [Node; 2] = [
    leaf("Profile", Property::DecProfile),
    list("decmemdesc", Subtree::Decoders, &DECODER_MEMORY),
];

static DECODER: [Node; 3] = [
    leaf("CodecID", Property::DecCodecId),
    leaf("MaxcodecLevel", Property::DecMaxLevel),
    list("decprofile", Subtree::Decoders, &DECODER_PROFILE),
];

static DECODER_DESCRIPTION: [Node; 1] = [list("decoder", Subtree::Decoders, &DECODER)];

static ENCODER_MEMORY: [Node; 4] = [
    leaf("MemHandleType", Property::EncMemHandleType),
    leaf("Width", Property::EncWidth),
    leaf("Height", Property::EncHeight),
    list_leaf("ColorFormats", "ColorFormat", Property::EncColorFormat),
];

static ENCODER_PROFILE: [Node; 2] = [
    leaf("Profile", Property::EncProfile),
    list("encmemdesc", Subtree::Encoders, &ENCODER_MEMORY),
];

static ENCODER: [Node; 4] = [
    leaf("CodecID", Property::EncCodecId),
    leaf("MaxcodecLevel", Property::EncMaxLevel),
    leaf("BiDirectionalPrediction", Property::EncBiDirectional),
    list("encprofile", Subtree::Encoders, &ENCODER_PROFILE),
];

static ENCODER_DESCRIPTION: [Node; 1] = [list("encoder", Subtree::Encoders, &ENCODER)];

static VPP_FORMAT: [Node; 2] = [
    leaf("InFormat", Property::VppInFormat),
    list_leaf("OutFormats", "OutFormat", Property::VppOutFormat),
];

static VPP_MEMORY: [Node; 4] = [
    leaf("MemHandleType", Property::VppMemHandleType),
    leaf("Width", Property::VppWidth),
    leaf("Height", Property::VppHeight),
    list("format", Subtree::Vpp, &VPP_FORMAT),
];

static VPP_FILTER: [Node; 3] = [
    leaf("FilterFourCC", Property::VppFilterId),
    leaf("MaxDelayInFrames", Property::VppMaxDelay),
    list("memdesc", Subtree::Vpp, &VPP_MEMORY),
];

static VPP_DESCRIPTION: [Node; 1] = [list("filter", Subtree::Vpp, &VPP_FILTER)];

static SUB_DEVICE: [Node; 2] = [
    leaf("Index", Property::SubDeviceIndex),
    leaf("SubDeviceID", Property::SubDeviceId),
];

static DEVICE: [Node; 3] = [
    leaf("DeviceID", Property::DeviceId),
    leaf("MediaAdapterType", Property::MediaAdapterType),
    list("subdevices", Subtree::SubDevices, &SUB_DEVICE),
];

static DEVICE_DESCRIPTION: [Node; 1] = [group("device", Subtree::Device, &DEVICE)];

static API_VERSION: [Node; 3] = [
    leaf("Version", Property::ApiVersion),
    leaf("Major", Property::ApiVersionMajor),
    leaf("Minor", Property::ApiVersionMinor),
];

static IMPL_DESCRIPTION: [Node; 12] = [
    leaf("Impl", Property::Impl),
    leaf("AccelerationMode", Property::AccelerationMode),
    group("ApiVersion", Subtree::Description, &API_VERSION),
    leaf("VendorID", Property::VendorId),
    leaf("VendorImplID", Property::VendorImplId),
    leaf("ImplName", Property::ImplName),
    leaf("License", Property::License),
    leaf("Keywords", Property::Keywords),
    group("mfxDeviceDescription", Subtree::Device, &DEVICE_DESCRIPTION),
    group("mfxDecoderDescription", Subtree::Decoders, &DECODER_DESCRIPTION),
    group("mfxEncoderDescription", Subtree::Encoders, &ENCODER_DESCRIPTION),
    group("mfxVPPDescription", Subtree::Vpp, &VPP_DESCRIPTION),
];

static IMPLEMENTED_FUNCTIONS: [Node; 1] = [list_leaf(
    "FunctionsName",
    "FunctionName",
    Property::FunctionName,
)];

static ROOTS: [Node; 2] = [
    group("mfxImplDescription", Subtree::Description, &IMPL_DESCRIPTION),
    group(
        "mfxImplementedFunctions",
        Subtree::Functions,
        &IMPLEMENTED_FUNCTIONS,
    ),
];

fn find<'a>(nodes: &'a [Node], name: &str) -> Option<&'a Node> {
    nodes
        .iter()
        .find(|n| n.name == name || n.alias == Some(name))
}

/// Resolve a dotted property name against the schema.
///
/// Fails with [`FilterError::UnknownPath`] when any segment is unknown,
/// when the path continues past a leaf, or when it contains an empty
/// segment.
pub fn resolve(name: &str) -> Result<Resolved, FilterError> {
    let unknown = || FilterError::UnknownPath(name.to_string());

    if let Some(special) = Special::from_name(name) {
        return Ok(Resolved::Special(special));
    }

    let mut parts = name.split('.');
    let first = parts.next().ok_or_else(unknown)?;
    let mut node = find(&ROOTS, first).ok_or_else(unknown)?;
    let mut segments = vec![segment(node)];

    for part in parts {
        let children = match &node.kind {
            NodeKind::Group(_, children) => children,
            NodeKind::Leaf(_) => return Err(unknown()),
        };
        node = find(children, part).ok_or_else(unknown)?;
        segments.push(segment(node));
    }

    let property = match &node.kind {
        NodeKind::Leaf(p) => *p,
        NodeKind::Group(subtree, _) => Property::Presence(*subtree),
    };
    Ok(Resolved::Filter(PropertyPath { segments, property }))
}

fn segment(node: &Node) -> Segment {
    if node.repeated {
        Segment::AnyOf(node.name)
    } else {
        Segment::Field(node.name)
    }
}

/// Check `value` against the kinds a property accepts.
pub(crate) fn check_kind(
    path: &str,
    accepts: &'static [ValueKind],
    value: &TypedValue,
) -> Result<(), FilterError> {
    let found = value.kind();
    if accepts.contains(&found) {
        Ok(())
    } else {
        Err(FilterError::TypeMismatch {
            path: path.to_string(),
            expected: accepts,
            found,
        })
    }
}
