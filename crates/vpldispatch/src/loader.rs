// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! The dispatcher entry point.
//!
//! A [`Loader`] owns the candidate list, the config objects and the
//! implementation registry. Discovery and module loading are deferred
//! until the first query that needs them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};

use crate::caps::{AccelerationMode, ApiVersion};
use crate::discovery::{discover, Candidate, SearchConfig};
use crate::error::{CreateError, EnumError, FilterError, LoadError, ReleaseError};
use crate::filter::FilterSet;
use crate::module::{self, ModuleOpener, NativeOpener};
use crate::property::{check_kind, resolve, Property, Resolved, TypedValue};
use crate::registry::{CapabilityHandle, DeliveryFormat, Registry};
use crate::session::{Session, SpecialConfig};

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// A config object created by [`Loader::create_config`].
///
/// Only valid with the loader that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigHandle {
    loader: u64,
    index: usize,
}

/// Load state of a discovered candidate.
#[derive(Debug, Clone)]
pub enum CandidateState {
    Pending,
    /// Loaded; holds the registry serials of its implementations
    Loaded(Vec<u64>),
    Failed(LoadError),
}

struct Slot {
    candidate: Candidate,
    state: CandidateState,
}

/// Discovers runtime implementations, filters them and opens sessions.
///
/// # Example
///
/// ```no_run
/// use vpldispatch::{DeliveryFormat, FourCC, Loader};
///
/// let mut loader = Loader::new();
/// loader.add_filter("mfxImplDescription.Impl", 2u32)?;
/// loader.add_filter("mfxImplDescription.mfxDecoderDescription.decoder.CodecID", FourCC::HEVC)?;
///
/// let mut index = 0;
/// while let Ok(caps) = loader.enumerate(index, DeliveryFormat::Description) {
///     if let Some(record) = caps.description() {
///         println!("{}: {} API {}", index, record.name, record.api_version);
///     }
///     loader.release_capability(&caps)?;
///     index += 1;
/// }
///
/// let session = loader.create_session(0)?;
/// println!("session on {}", session.module_path().display());
/// # Ok::<(), vpldispatch::Error>(())
/// ```
pub struct Loader {
    id: u64,
    search: SearchConfig,
    opener: Box<dyn ModuleOpener>,
    discovered: bool,
    slots: Vec<Slot>,
    configs: Vec<FilterSet>,
    special: SpecialConfig,
    registry: Registry,
}

impl Loader {
    /// A loader searching the standard locations.
    pub fn new() -> Self {
        Self::with_search(SearchConfig::from_env())
    }

    pub fn with_search(search: SearchConfig) -> Self {
        Self::with_opener(search, NativeOpener)
    }

    /// A loader that opens modules through `opener`.
    pub fn with_opener(search: SearchConfig, opener: impl ModuleOpener + 'static) -> Self {
        Loader {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            search,
            opener: Box::new(opener),
            discovered: false,
            slots: Vec::new(),
            configs: Vec::new(),
            special: SpecialConfig::default(),
            registry: Registry::new(),
        }
    }

    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    fn discover(&mut self) {
        if self.discovered {
            return;
        }
        self.discovered = true;
        self.slots = discover(&self.search)
            .into_iter()
            .map(|candidate| Slot {
                candidate,
                state: CandidateState::Pending,
            })
            .collect();
        info!("discovered {} candidate modules", self.slots.len());
    }

    /// Discovered candidates in discovery order, with their load state.
    pub fn candidates(&mut self) -> Vec<(&Candidate, &CandidateState)> {
        self.discover();
        self.slots
            .iter()
            .map(|slot| (&slot.candidate, &slot.state))
            .collect()
    }

    /// Load one candidate if it is still pending and report its outcome:
    /// the number of implementations it contributed, or why it failed.
    /// `None` when `index` is past the last candidate.
    pub fn load_candidate(&mut self, index: usize) -> Option<Result<usize, LoadError>> {
        self.discover();
        let slot = self.slots.get_mut(index)?;

        if let CandidateState::Pending = slot.state {
            let candidate = &slot.candidate;
            slot.state = match module::load(&candidate.path, self.opener.as_ref()) {
                Ok(implementations) => {
                    let serials = self.registry.insert(
                        index,
                        candidate.priority,
                        candidate.order,
                        implementations,
                    );
                    CandidateState::Loaded(serials)
                }
                Err(err) => {
                    warn!("skipping {}: {}", candidate.path.display(), err);
                    CandidateState::Failed(err)
                }
            };
        }

        Some(match &slot.state {
            CandidateState::Loaded(serials) => Ok(serials.len()),
            CandidateState::Failed(err) => Err(err.clone()),
            CandidateState::Pending => Ok(0),
        })
    }

    fn load_all(&mut self) {
        self.discover();
        for index in 0..self.slots.len() {
            if let CandidateState::Pending = self.slots[index].state {
                let _ = self.load_candidate(index);
            }
        }
    }

    /// Load pending candidates and bring the ranking up to date.
    fn prepare(&mut self) {
        self.load_all();
        if self.registry.is_stale() {
            self.registry.refresh(&self.configs);
        }
    }

    /// Create an empty config object.
    pub fn create_config(&mut self) -> ConfigHandle {
        self.configs.push(FilterSet::new());
        ConfigHandle {
            loader: self.id,
            index: self.configs.len() - 1,
        }
    }

    /// Set a property on a config object.
    ///
    /// Setting a property already present on the same config object
    /// replaces its value. Reserved names (`mfxHandleType`, `mfxHDL`,
    /// `NumThread`, `DeviceCopy`) configure session creation instead of
    /// filtering. On error nothing changes.
    pub fn set_filter(
        &mut self,
        config: ConfigHandle,
        name: &str,
        value: impl Into<TypedValue>,
    ) -> Result<(), FilterError> {
        if config.loader != self.id || config.index >= self.configs.len() {
            return Err(FilterError::InvalidConfig);
        }
        let value = value.into();

        match resolve(name)? {
            Resolved::Special(special) => {
                check_kind(name, special.accepts(), &value)?;
                let mut updated = self.special;
                updated.apply(special, &value)?;
                self.special = updated;
                debug!("session parameter {} = {:?}", name, value);
            }
            Resolved::Filter(path) => {
                let property = path.property();
                let set = &mut self.configs[config.index];
                let replaced = set.set(path, value.clone())?;
                match (property, &value) {
                    (Property::AccelerationMode, TypedValue::U16(mode)) => {
                        self.special.acceleration_mode = Some(AccelerationMode(u32::from(*mode)))
                    }
                    (Property::ApiVersion, TypedValue::U32(packed)) => {
                        self.special.api_version = Some(ApiVersion::from_u32(*packed))
                    }
                    _ => {}
                }
                debug!(
                    "config {} filter {} = {:?}{}",
                    config.index,
                    name,
                    value,
                    if replaced.is_some() { " (replaced)" } else { "" }
                );
                self.registry.invalidate();
            }
        }
        Ok(())
    }

    /// Create a config object holding a single property.
    pub fn add_filter(
        &mut self,
        name: &str,
        value: impl Into<TypedValue>,
    ) -> Result<ConfigHandle, FilterError> {
        let config = self.create_config();
        match self.set_filter(config, name, value) {
            Ok(()) => Ok(config),
            Err(err) => {
                self.configs.pop();
                Err(err)
            }
        }
    }

    /// Total number of filters across all config objects.
    pub fn filter_count(&self) -> usize {
        self.configs.iter().map(FilterSet::len).sum()
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    /// The filters of a config object.
    pub fn config(&self, config: ConfigHandle) -> Option<&FilterSet> {
        if config.loader != self.id {
            return None;
        }
        self.configs.get(config.index)
    }

    pub fn special(&self) -> &SpecialConfig {
        &self.special
    }

    /// Number of implementations matching every config object.
    pub fn implementation_count(&mut self) -> usize {
        self.prepare();
        self.registry.valid_count()
    }

    /// Capability data of the `index`-th matching implementation.
    ///
    /// Indices run from 0 in rank order. [`EnumError::NotFound`] marks the
    /// end of the list.
    pub fn enumerate(
        &mut self,
        index: u32,
        format: DeliveryFormat,
    ) -> Result<CapabilityHandle, EnumError> {
        self.prepare();
        self.registry.enumerate(index, format)
    }

    /// Return a handle issued by [`Loader::enumerate`]. Releasing twice is
    /// harmless; a handle from another loader is rejected.
    pub fn release_capability(&mut self, handle: &CapabilityHandle) -> Result<(), ReleaseError> {
        self.registry.release(handle)
    }

    /// Handles issued for the same implementation and format as `handle`
    /// and not yet released.
    pub fn outstanding(&self, handle: &CapabilityHandle) -> u32 {
        self.registry.outstanding_for(handle)
    }

    /// The candidate that produced the `index`-th matching implementation.
    pub fn candidate_of(&mut self, index: u32) -> Option<&Candidate> {
        self.prepare();
        let slot = self.registry.ranked(index)?.candidate;
        self.slots.get(slot).map(|s| &s.candidate)
    }

    /// Open a session on the `index`-th matching implementation.
    ///
    /// The session uses the implementation's own acceleration mode and API
    /// version unless a filter asked for others. A device handle set
    /// through `mfxHandleType`/`mfxHDL` is installed before returning.
    pub fn create_session(&mut self, index: u32) -> Result<Session, CreateError> {
        self.prepare();
        let entry = self.registry.ranked(index).ok_or(CreateError::NotFound)?;
        let implementation = &entry.implementation;
        let module = implementation.module.clone();
        let record = implementation.record.clone();
        let params = self.special.session_params(&record);

        let raw = module.api().create_session(&params).map_err(|status| {
            warn!("{}: session creation failed: {}", record.name, status);
            CreateError::Native(status)
        })?;

        if let Some((handle_type, handle)) = self.special.device_handle() {
            if let Err(status) = module.api().set_handle(raw, handle_type, handle) {
                warn!("{}: setting device handle failed: {}", record.name, status);
                if let Err(status) = module.api().close_session(raw) {
                    warn!("{}: closing session failed: {}", record.name, status);
                }
                return Err(CreateError::Native(status));
            }
        }

        info!(
            "created session on {} ({}) from {}",
            record.name,
            record.impl_type,
            module.path().display()
        );
        Ok(Session::new(module, raw, record, params.api_version))
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("id", &self.id)
            .field("candidates", &self.slots.len())
            .field("configs", &self.configs.len())
            .field("implementations", &self.registry.len())
            .finish()
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        debug!("dropping loader {}", self.id);
    }
}
