// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Config filters and capability matching.
//!
//! A [`FilterSet`] holds the filters of one config object, keyed by the
//! property they resolve to, so setting the same property again replaces
//! the earlier value. Matching is never done while filters are being set;
//! the registry evaluates every set lazily, which makes the result
//! independent of the order the caller set them in.
//!
//! # Matching rules
//!
//! - Filters of different config objects are evaluated independently and
//!   combined with AND.
//! - Within one set, scalar implementation properties are matched one by
//!   one.
//! - Within one set, all properties under the same repeated group (decoder,
//!   encoder, processing filter, sub-device) must be satisfied by a single
//!   element of that group. The codec, profile, memory descriptor and
//!   format arrays are walked as one flattened list, so
//!   `decoder.CodecID = HEVC` with `decoder.decprofile.Profile = MAIN10`
//!   asks for an HEVC decoder that has a MAIN10 profile.

use std::collections::BTreeMap;

use log::trace;

use crate::caps::{
    AccelerationMode, CapabilityRecord, MemoryDescriptor, Profile, Range32U, VppMemoryDescriptor,
};
use crate::error::FilterError;
use crate::fourcc::FourCC;
use crate::property::{check_kind, Domain, Property, PropertyPath, Subtree, TypedValue};

/// One typed constraint on a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFilter {
    pub path: PropertyPath,
    pub value: TypedValue,
}

/// The filters of one config object.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: BTreeMap<Property, ConfigFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a filter, replacing any earlier filter on the same property.
    ///
    /// Returns the replaced value. On a type mismatch the set is unchanged.
    pub fn set(
        &mut self,
        path: PropertyPath,
        value: TypedValue,
    ) -> Result<Option<TypedValue>, FilterError> {
        let property = path.property();
        check_kind(&path.name(), property.accepts(), &value)?;
        let previous = self
            .filters
            .insert(property, ConfigFilter { path, value })
            .map(|f| f.value);
        Ok(previous)
    }

    pub fn get(&self, property: Property) -> Option<&TypedValue> {
        self.filters.get(&property).map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigFilter> {
        self.filters.values()
    }

    /// Evaluate every filter of this set against one implementation.
    ///
    /// `functions` is the implementation's implemented-function list, when
    /// it reports one.
    pub fn matches(&self, record: &CapabilityRecord, functions: Option<&[String]>) -> bool {
        let mut domains: BTreeMap<Domain, Vec<&ConfigFilter>> = BTreeMap::new();
        for filter in self.filters.values() {
            domains
                .entry(filter.path.property().domain())
                .or_default()
                .push(filter);
        }

        for (domain, filters) in domains {
            let ok = match domain {
                Domain::Implementation => filters
                    .iter()
                    .all(|f| match_implementation(record, functions, f)),
                Domain::SubDevice => record.device.sub_devices.iter().any(|sub| {
                    filters.iter().all(|f| match f.path.property() {
                        Property::SubDeviceIndex => eq_u32(&f.value, sub.index),
                        Property::SubDeviceId => match_str(&f.value, &sub.id, false),
                        _ => false,
                    })
                }),
                Domain::Decoder => decoder_views(record)
                    .any(|view| filters.iter().all(|f| match_codec(&view, f))),
                Domain::Encoder => encoder_views(record)
                    .any(|view| filters.iter().all(|f| match_codec(&view, f))),
                Domain::Vpp => {
                    vpp_views(record).any(|view| filters.iter().all(|f| match_vpp(&view, f)))
                }
                Domain::Functions => functions
                    .map(|names| filters.iter().all(|f| match_function(names, &f.value)))
                    .unwrap_or(false),
            };
            if !ok {
                trace!("{} rejected by {:?} filters", record.name, domain);
                return false;
            }
        }
        true
    }
}

/// Whether `record` satisfies every config object's filters.
pub fn matches_all(
    sets: &[FilterSet],
    record: &CapabilityRecord,
    functions: Option<&[String]>,
) -> bool {
    sets.iter().all(|set| set.matches(record, functions))
}

fn eq_u16(value: &TypedValue, actual: u16) -> bool {
    matches!(value, TypedValue::U16(v) if *v == actual)
}

fn eq_u32(value: &TypedValue, actual: u32) -> bool {
    matches!(value, TypedValue::U32(v) if *v == actual)
}

fn eq_i32(value: &TypedValue, actual: i32) -> bool {
    matches!(value, TypedValue::I32(v) if *v == actual)
}

fn in_range(value: &TypedValue, range: &Range32U) -> bool {
    match value {
        TypedValue::U32(v) => range.contains(*v),
        TypedValue::Range(r) => range.overlaps(r),
        _ => false,
    }
}

/// Substring match; with `tokens`, every comma-separated token of the
/// filter must be contained.
fn match_str(value: &TypedValue, actual: &str, tokens: bool) -> bool {
    match value {
        TypedValue::ExactStr(s) => actual == s.as_str(),
        TypedValue::Str(s) if tokens => s.split(',').all(|t| actual.contains(t.trim())),
        TypedValue::Str(s) => actual.contains(s.as_str()),
        _ => false,
    }
}

fn match_function(names: &[String], value: &TypedValue) -> bool {
    match value {
        TypedValue::Str(s) | TypedValue::ExactStr(s) => names.iter().any(|n| n == s),
        _ => false,
    }
}

fn match_implementation(
    record: &CapabilityRecord,
    functions: Option<&[String]>,
    filter: &ConfigFilter,
) -> bool {
    let value = &filter.value;
    match filter.path.property() {
        Property::Impl => eq_u32(value, record.impl_type.raw()),
        Property::AccelerationMode => match value {
            TypedValue::U16(mode) => {
                record.supports_acceleration_mode(AccelerationMode(*mode as u32))
            }
            _ => false,
        },
        // The requested version is a minimum
        Property::ApiVersion => {
            matches!(value, TypedValue::U32(v) if record.api_version.as_u32() >= *v)
        }
        Property::ApiVersionMajor => eq_u16(value, record.api_version.major),
        Property::ApiVersionMinor => eq_u16(value, record.api_version.minor),
        Property::VendorId => eq_u32(value, record.vendor_id),
        Property::VendorImplId => eq_u32(value, record.vendor_impl_id),
        Property::ImplName => match_str(value, &record.name, false),
        Property::License => match_str(value, &record.license, true),
        Property::Keywords => match_str(value, &record.keywords, true),
        Property::DeviceId => match value {
            TypedValue::U16(id) => record.device.pci_id() == Some(*id),
            _ => match_str(value, &record.device.device_id, false),
        },
        Property::MediaAdapterType => eq_u16(value, record.device.media_adapter_type),
        Property::Presence(subtree) => match value {
            TypedValue::Query => true,
            TypedValue::Present => is_present(record, functions, subtree),
            _ => false,
        },
        _ => false,
    }
}

fn is_present(record: &CapabilityRecord, functions: Option<&[String]>, subtree: Subtree) -> bool {
    match subtree {
        Subtree::Description => true,
        Subtree::Device => {
            !record.device.device_id.is_empty() || !record.device.sub_devices.is_empty()
        }
        Subtree::SubDevices => !record.device.sub_devices.is_empty(),
        Subtree::Decoders => !record.decoders.is_empty(),
        Subtree::Encoders => !record.encoders.is_empty(),
        Subtree::Vpp => !record.vpp_filters.is_empty(),
        Subtree::Functions => functions.is_some_and(|f| !f.is_empty()),
    }
}

/// One flattened (codec, profile, memory descriptor, color format) tuple.
struct CodecView<'a> {
    codec_id: FourCC,
    max_level: u16,
    bidirectional: u16,
    profile: u32,
    memory: &'a MemoryDescriptor,
    color: Option<FourCC>,
}

fn codec_views<'a>(
    codec_id: FourCC,
    max_level: u16,
    bidirectional: u16,
    profiles: &'a [Profile],
) -> impl Iterator<Item = CodecView<'a>> + 'a {
    profiles.iter().flat_map(move |p| {
        p.memory.iter().flat_map(move |m| {
            // A descriptor without color formats still takes part in
            // matches that do not ask for a color format
            let empty = m.color_formats.is_empty().then_some(None);
            m.color_formats
                .iter()
                .copied()
                .map(Some)
                .chain(empty)
                .map(move |color| CodecView {
                    codec_id,
                    max_level,
                    bidirectional,
                    profile: p.profile,
                    memory: m,
                    color,
                })
        })
    })
}

fn decoder_views(record: &CapabilityRecord) -> impl Iterator<Item = CodecView<'_>> {
    record
        .decoders
        .iter()
        .flat_map(|c| codec_views(c.codec_id, c.max_level, 0, &c.profiles))
}

fn encoder_views(record: &CapabilityRecord) -> impl Iterator<Item = CodecView<'_>> {
    record.encoders.iter().flat_map(|c| {
        codec_views(
            c.codec_id,
            c.max_level,
            c.bidirectional_prediction,
            &c.profiles,
        )
    })
}

fn match_codec(view: &CodecView<'_>, filter: &ConfigFilter) -> bool {
    let value = &filter.value;
    match filter.path.property() {
        Property::DecCodecId | Property::EncCodecId => eq_u32(value, view.codec_id.to_u32()),
        Property::DecMaxLevel | Property::EncMaxLevel => eq_u16(value, view.max_level),
        Property::EncBiDirectional => eq_u16(value, view.bidirectional),
        Property::DecProfile | Property::EncProfile => eq_u32(value, view.profile),
        Property::DecMemHandleType | Property::EncMemHandleType => {
            eq_i32(value, view.memory.handle_type.0)
        }
        Property::DecWidth | Property::EncWidth => in_range(value, &view.memory.width),
        Property::DecHeight | Property::EncHeight => in_range(value, &view.memory.height),
        Property::DecColorFormat | Property::EncColorFormat => view
            .color
            .is_some_and(|c| eq_u32(value, c.to_u32())),
        _ => false,
    }
}

/// One flattened (filter, memory descriptor, input format, output format)
/// tuple.
struct VppView<'a> {
    filter_id: FourCC,
    max_delay: u16,
    memory: &'a VppMemoryDescriptor,
    input: Option<FourCC>,
    output: Option<FourCC>,
}

fn vpp_views(record: &CapabilityRecord) -> impl Iterator<Item = VppView<'_>> {
    record.vpp_filters.iter().flat_map(|f| {
        f.memory.iter().flat_map(move |m| {
            let no_formats = m.formats.is_empty().then_some((None, None));
            m.formats
                .iter()
                .flat_map(|pair| {
                    let no_outputs = pair.outputs.is_empty().then_some((Some(pair.input), None));
                    pair.outputs
                        .iter()
                        .map(move |out| (Some(pair.input), Some(*out)))
                        .chain(no_outputs)
                })
                .chain(no_formats)
                .map(move |(input, output)| VppView {
                    filter_id: f.filter_id,
                    max_delay: f.max_delay_in_frames,
                    memory: m,
                    input,
                    output,
                })
        })
    })
}

fn match_vpp(view: &VppView<'_>, filter: &ConfigFilter) -> bool {
    let value = &filter.value;
    match filter.path.property() {
        Property::VppFilterId => eq_u32(value, view.filter_id.to_u32()),
        Property::VppMaxDelay => eq_u16(value, view.max_delay),
        Property::VppMemHandleType => eq_i32(value, view.memory.handle_type.0),
        Property::VppWidth => in_range(value, &view.memory.width),
        Property::VppHeight => in_range(value, &view.memory.height),
        Property::VppInFormat => view.input.is_some_and(|f| eq_u32(value, f.to_u32())),
        Property::VppOutFormat => view.output.is_some_and(|f| eq_u32(value, f.to_u32())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::{
        profile, ApiVersion, DecoderCodec, DeviceDescription, FormatPair, ImplType, ResourceType,
        SubDevice, VppFilter,
    };
    use crate::property::{resolve, Resolved};

    const DEC: &str = "mfxImplDescription.mfxDecoderDescription.decoder";
    const VPP: &str = "mfxImplDescription.mfxVPPDescription.filter";

    fn path(name: &str) -> PropertyPath {
        match resolve(name).unwrap() {
            Resolved::Filter(p) => p,
            Resolved::Special(_) => unreachable!(),
        }
    }

    fn set_of(filters: &[(&str, TypedValue)]) -> FilterSet {
        let mut set = FilterSet::new();
        for (name, value) in filters {
            set.set(path(name), value.clone()).unwrap();
        }
        set
    }

    fn mem(colors: &[FourCC]) -> MemoryDescriptor {
        MemoryDescriptor {
            handle_type: ResourceType::SYSTEM_SURFACE,
            width: Range32U::new(64, 4096, 8),
            height: Range32U::new(64, 4096, 8),
            color_formats: colors.to_vec(),
        }
    }

    fn hevc_record() -> CapabilityRecord {
        let mut record = CapabilityRecord::new(ImplType::Hardware, "mfx-gen", ApiVersion::new(2, 9));
        record.vendor_id = 0x8086;
        record.license = "MIT".to_string();
        record.keywords = "GPU,VPL,oneAPI".to_string();
        record.device = DeviceDescription {
            device_id: "56a0/0".to_string(),
            media_adapter_type: 1,
            sub_devices: vec![
                SubDevice {
                    index: 0,
                    id: "tile0".to_string(),
                },
                SubDevice {
                    index: 1,
                    id: "tile1".to_string(),
                },
            ],
        };
        record.decoders = vec![
            DecoderCodec {
                codec_id: FourCC::AVC,
                max_level: 51,
                profiles: vec![Profile {
                    profile: profile::AVC_HIGH,
                    memory: vec![mem(&[FourCC::NV12])],
                }],
            },
            DecoderCodec {
                codec_id: FourCC::HEVC,
                max_level: 62,
                profiles: vec![
                    Profile {
                        profile: profile::HEVC_MAIN,
                        memory: vec![mem(&[FourCC::NV12])],
                    },
                    Profile {
                        profile: profile::HEVC_MAIN10,
                        memory: vec![mem(&[FourCC::P010])],
                    },
                ],
            },
        ];
        record.vpp_filters = vec![VppFilter {
            filter_id: FourCC::VPP_SCALING,
            max_delay_in_frames: 1,
            memory: vec![VppMemoryDescriptor {
                handle_type: ResourceType::VA_SURFACE,
                width: Range32U::new(16, 16384, 1),
                height: Range32U::new(16, 16384, 1),
                formats: vec![FormatPair {
                    input: FourCC::NV12,
                    outputs: vec![FourCC::NV12, FourCC::RGB4],
                }],
            }],
        }];
        record
    }

    #[test]
    fn test_existential_codec_and_profile() {
        let record = hevc_record();
        let set = set_of(&[
            (&format!("{}.CodecID", DEC), FourCC::HEVC.into()),
            (
                &format!("{}.decprofile.Profile", DEC),
                profile::HEVC_MAIN10.into(),
            ),
        ]);
        assert!(set.matches(&record, None));

        let set = set_of(&[(&format!("{}.decprofile.Profile", DEC), profile::AVC_HIGH.into())]);
        assert!(set.matches(&record, None));

        // AVC exists and MAIN10 exists, but not on the same codec
        let set = set_of(&[
            (&format!("{}.CodecID", DEC), FourCC::AVC.into()),
            (
                &format!("{}.decprofile.Profile", DEC),
                profile::HEVC_MAIN10.into(),
            ),
        ]);
        assert!(!set.matches(&record, None));
    }

    #[test]
    fn test_separate_sets_are_independent() {
        let record = hevc_record();
        let codec = set_of(&[(&format!("{}.CodecID", DEC), FourCC::AVC.into())]);
        let main10 = set_of(&[(
            &format!("{}.decprofile.Profile", DEC),
            profile::HEVC_MAIN10.into(),
        )]);
        assert!(matches_all(&[codec, main10], &record, None));
    }

    #[test]
    fn test_color_format_shares_element() {
        let record = hevc_record();
        let set = set_of(&[
            (
                &format!("{}.decprofile.Profile", DEC),
                profile::HEVC_MAIN10.into(),
            ),
            (
                &format!("{}.decprofile.decmemdesc.ColorFormats", DEC),
                FourCC::P010.into(),
            ),
        ]);
        assert!(set.matches(&record, None));

        let set = set_of(&[
            (&format!("{}.decprofile.Profile", DEC), profile::HEVC_MAIN.into()),
            (
                &format!("{}.decprofile.decmemdesc.ColorFormats", DEC),
                FourCC::P010.into(),
            ),
        ]);
        assert!(!set.matches(&record, None));
    }

    #[test]
    fn test_dimension_ranges() {
        let record = hevc_record();
        let width = format!("{}.decprofile.decmemdesc.Width", DEC);
        for (value, expected) in [(1920u32, true), (64, true), (4096, true), (4097, false), (65, false), (56, false)] {
            let set = set_of(&[(&width, value.into())]);
            assert_eq!(set.matches(&record, None), expected, "width {}", value);
        }
        let set = set_of(&[(&width, Range32U::new(4000, 8000, 1).into())]);
        assert!(set.matches(&record, None));
        let set = set_of(&[(&width, Range32U::new(4097, 8000, 1).into())]);
        assert!(!set.matches(&record, None));
    }

    #[test]
    fn test_scalar_equality() {
        let record = hevc_record();
        assert!(set_of(&[("mfxImplDescription.Impl", 2u32.into())]).matches(&record, None));
        assert!(!set_of(&[("mfxImplDescription.Impl", 1u32.into())]).matches(&record, None));
        assert!(set_of(&[("mfxImplDescription.VendorID", 0x8086u32.into())]).matches(&record, None));
        assert!(!set_of(&[("mfxImplDescription.VendorID", 0x1002u32.into())]).matches(&record, None));
    }

    #[test]
    fn test_api_version_is_minimum() {
        let record = hevc_record();
        let name = "mfxImplDescription.ApiVersion.Version";
        let lower = ApiVersion::new(2, 0).as_u32();
        let same = ApiVersion::new(2, 9).as_u32();
        let higher = ApiVersion::new(2, 10).as_u32();
        assert!(set_of(&[(name, lower.into())]).matches(&record, None));
        assert!(set_of(&[(name, same.into())]).matches(&record, None));
        assert!(!set_of(&[(name, higher.into())]).matches(&record, None));

        assert!(set_of(&[("mfxImplDescription.ApiVersion.Major", 2u16.into())]).matches(&record, None));
        assert!(!set_of(&[("mfxImplDescription.ApiVersion.Minor", 8u16.into())]).matches(&record, None));
    }

    #[test]
    fn test_string_tokens_and_exact() {
        let record = hevc_record();
        let keywords = "mfxImplDescription.Keywords";
        assert!(set_of(&[(keywords, "GPU,VPL".into())]).matches(&record, None));
        assert!(!set_of(&[(keywords, "GPU,CPU".into())]).matches(&record, None));
        assert!(set_of(&[("mfxImplDescription.ImplName", "gen".into())]).matches(&record, None));
        assert!(!set_of(&[(
            "mfxImplDescription.ImplName",
            TypedValue::ExactStr("gen".to_string())
        )])
        .matches(&record, None));
        assert!(set_of(&[(
            "mfxImplDescription.ImplName",
            TypedValue::ExactStr("mfx-gen".to_string())
        )])
        .matches(&record, None));
        // Case sensitive
        assert!(!set_of(&[("mfxImplDescription.License", "mit".into())]).matches(&record, None));
    }

    #[test]
    fn test_device_id_forms() {
        let record = hevc_record();
        let name = "mfxImplDescription.mfxDeviceDescription.device.DeviceID";
        assert!(set_of(&[(name, 0x56a0u16.into())]).matches(&record, None));
        assert!(!set_of(&[(name, 0x56a1u16.into())]).matches(&record, None));
        assert!(set_of(&[(name, "56a0".into())]).matches(&record, None));
    }

    #[test]
    fn test_sub_device_shares_element() {
        let record = hevc_record();
        let base = "mfxImplDescription.mfxDeviceDescription.device.subdevices";
        let ok = set_of(&[
            (&format!("{}.Index", base), 1u32.into()),
            (&format!("{}.SubDeviceID", base), "tile1".into()),
        ]);
        assert!(ok.matches(&record, None));
        let mixed = set_of(&[
            (&format!("{}.Index", base), 0u32.into()),
            (&format!("{}.SubDeviceID", base), "tile1".into()),
        ]);
        assert!(!mixed.matches(&record, None));
    }

    #[test]
    fn test_vpp_format_pairs() {
        let record = hevc_record();
        let set = set_of(&[
            (&format!("{}.FilterFourCC", VPP), FourCC::VPP_SCALING.into()),
            (&format!("{}.memdesc.format.InFormat", VPP), FourCC::NV12.into()),
            (&format!("{}.memdesc.format.OutFormats", VPP), FourCC::RGB4.into()),
        ]);
        assert!(set.matches(&record, None));
        let set = set_of(&[(&format!("{}.memdesc.format.InFormat", VPP), FourCC::RGB4.into())]);
        assert!(!set.matches(&record, None));
    }

    #[test]
    fn test_presence_filters() {
        let record = hevc_record();
        let enc = "mfxImplDescription.mfxEncoderDescription";
        assert!(set_of(&[(enc, TypedValue::Query)]).matches(&record, None));
        assert!(!set_of(&[(enc, TypedValue::Present)]).matches(&record, None));
        assert!(set_of(&[(
            "mfxImplDescription.mfxDecoderDescription",
            TypedValue::Present
        )])
        .matches(&record, None));
    }

    #[test]
    fn test_function_names() {
        let record = hevc_record();
        let funcs = vec!["MFXInitialize".to_string(), "MFXClose".to_string()];
        let name = "mfxImplementedFunctions.FunctionsName";
        assert!(set_of(&[(name, "MFXClose".into())]).matches(&record, Some(&funcs)));
        // Function names compare whole
        assert!(!set_of(&[(name, "MFXInit".into())]).matches(&record, Some(&funcs)));
        assert!(!set_of(&[(name, "MFXClose".into())]).matches(&record, None));
    }

    #[test]
    fn test_overwrite_replaces() {
        let mut set = FilterSet::new();
        let p = path("mfxImplDescription.Impl");
        assert_eq!(set.set(p.clone(), 1u32.into()).unwrap(), None);
        assert_eq!(set.set(p, 2u32.into()).unwrap(), Some(TypedValue::U32(1)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(Property::Impl), Some(&TypedValue::U32(2)));
    }

    #[test]
    fn test_type_mismatch_leaves_set_unchanged() {
        let mut set = FilterSet::new();
        let p = path("mfxImplDescription.Impl");
        set.set(p.clone(), 1u32.into()).unwrap();
        assert!(set.set(p, 1u16.into()).is_err());
        assert_eq!(set.get(Property::Impl), Some(&TypedValue::U32(1)));
    }
}
