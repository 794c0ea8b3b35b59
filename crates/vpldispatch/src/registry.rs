// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! The ranked list of loaded implementations.
//!
//! Entries are appended as candidates load and are never removed while the
//! loader lives. Filtering and ranking are recomputed lazily: any filter
//! change or new entry marks the registry stale, and the next query
//! re-evaluates every entry against every config object before sorting the
//! survivors by candidate priority, discovery order and position within
//! their module.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, trace};

use crate::caps::CapabilityRecord;
use crate::discovery::Priority;
use crate::error::{EnumError, ReleaseError};
use crate::filter::{matches_all, FilterSet};
use crate::module::{CapabilityBatch, Generation, LoadedImplementation};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Shape of the capability data returned by `enumerate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeliveryFormat {
    /// The full implementation description
    Description,
    /// Names of the functions the implementation exports
    ImplementedFunctions,
    /// Path of the module file
    ImplPath,
}

/// Capability data delivered for one implementation.
#[derive(Debug, Clone)]
pub enum Capability {
    Description(Arc<CapabilityRecord>),
    ImplementedFunctions(Arc<[String]>),
    ImplPath(PathBuf),
}

/// Capability data handed out by `enumerate`.
///
/// The data stays valid for as long as the handle is held, including after
/// the loader is dropped. Returning it through `release_capability` only
/// updates the loader's bookkeeping.
#[derive(Debug, Clone)]
pub struct CapabilityHandle {
    registry: u64,
    id: u64,
    serial: u64,
    format: DeliveryFormat,
    capability: Capability,
    batch: Weak<CapabilityBatch>,
}

impl CapabilityHandle {
    pub fn format(&self) -> DeliveryFormat {
        self.format
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn description(&self) -> Option<&CapabilityRecord> {
        match &self.capability {
            Capability::Description(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    pub fn functions(&self) -> Option<&[String]> {
        match &self.capability {
            Capability::ImplementedFunctions(names) => Some(&names[..]),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.capability {
            Capability::ImplPath(path) => Some(path.as_path()),
            _ => None,
        }
    }

    /// Whether the runtime still holds the native data this handle was
    /// copied from.
    pub fn is_live(&self) -> bool {
        self.batch.strong_count() > 0
    }
}

/// One implementation in the registry.
#[derive(Debug)]
pub(crate) struct Entry {
    pub serial: u64,
    pub candidate: usize,
    pub priority: Priority,
    pub order: usize,
    pub implementation: LoadedImplementation,
    pub valid: bool,
}

#[derive(Debug)]
pub(crate) struct Registry {
    id: u64,
    entries: Vec<Entry>,
    ranked: Vec<usize>,
    stale: bool,
    /// Handles issued and not yet released, by handle id
    live: HashMap<u64, (u64, DeliveryFormat)>,
    next_serial: u64,
    next_handle: u64,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            ranked: Vec::new(),
            stale: true,
            live: HashMap::new(),
            next_serial: 1,
            next_handle: 1,
        }
    }

    /// Append the implementations of one loaded candidate and return their
    /// serials.
    pub fn insert(
        &mut self,
        candidate: usize,
        priority: Priority,
        order: usize,
        implementations: Vec<LoadedImplementation>,
    ) -> Vec<u64> {
        let mut serials = Vec::with_capacity(implementations.len());
        for implementation in implementations {
            let serial = self.next_serial;
            self.next_serial += 1;
            serials.push(serial);
            self.entries.push(Entry {
                serial,
                candidate,
                priority,
                order,
                implementation,
                valid: false,
            });
        }
        self.stale = true;
        serials
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Re-evaluate every entry against `sets` and rank the survivors.
    ///
    /// Legacy implementations are hidden whenever a modern hardware
    /// implementation is loaded.
    pub fn refresh(&mut self, sets: &[FilterSet]) {
        let modern_hardware = self
            .entries
            .iter()
            .any(|e| e.implementation.is_modern_hardware());

        for entry in &mut self.entries {
            let hidden = modern_hardware && entry.implementation.generation() == Generation::Legacy;
            entry.valid = !hidden
                && matches_all(
                    sets,
                    &entry.implementation.record,
                    entry.implementation.functions.as_deref(),
                );
            trace!(
                "entry {} ({}) valid={} hidden={}",
                entry.serial,
                entry.implementation.record.name,
                entry.valid,
                hidden
            );
        }

        let mut ranked: Vec<usize> = (0..self.entries.len())
            .filter(|&i| self.entries[i].valid)
            .collect();
        ranked.sort_by_key(|&i| {
            let e = &self.entries[i];
            (e.priority, e.order, e.implementation.local_index)
        });
        debug!(
            "{} of {} implementations match {} config objects",
            ranked.len(),
            self.entries.len(),
            sets.len()
        );
        self.ranked = ranked;
        self.stale = false;
    }

    /// Number of valid entries as of the last refresh.
    pub fn valid_count(&self) -> usize {
        self.ranked.len()
    }

    /// The entry at `index` in ranked order as of the last refresh.
    pub fn ranked(&self, index: u32) -> Option<&Entry> {
        self.ranked
            .get(index as usize)
            .map(|&i| &self.entries[i])
    }

    /// Issue a capability handle for the ranked entry at `index`.
    pub fn enumerate(
        &mut self,
        index: u32,
        format: DeliveryFormat,
    ) -> Result<CapabilityHandle, EnumError> {
        let entry = self.ranked(index).ok_or(EnumError::NotFound)?;
        let implementation = &entry.implementation;
        let (capability, batch) = match format {
            DeliveryFormat::Description => (
                Capability::Description(implementation.record.clone()),
                Arc::downgrade(&implementation.batch),
            ),
            DeliveryFormat::ImplementedFunctions => {
                let names = implementation
                    .functions
                    .clone()
                    .ok_or(EnumError::Unsupported)?;
                let batch = implementation
                    .functions_batch
                    .as_ref()
                    .map(Arc::downgrade)
                    .unwrap_or_else(|| Arc::downgrade(&implementation.batch));
                (Capability::ImplementedFunctions(names), batch)
            }
            DeliveryFormat::ImplPath => (
                Capability::ImplPath(implementation.module.path().to_path_buf()),
                Arc::downgrade(&implementation.batch),
            ),
        };

        let serial = entry.serial;
        let id = self.next_handle;
        self.next_handle += 1;
        self.live.insert(id, (serial, format));
        Ok(CapabilityHandle {
            registry: self.id,
            id,
            serial,
            format,
            capability,
            batch,
        })
    }

    /// Return a handle issued by this registry. Releasing the same handle
    /// again is accepted and has no further effect.
    pub fn release(&mut self, handle: &CapabilityHandle) -> Result<(), ReleaseError> {
        if handle.registry != self.id || !self.entries.iter().any(|e| e.serial == handle.serial) {
            return Err(ReleaseError::InvalidHandle);
        }
        if self.live.remove(&handle.id).is_none() {
            trace!("handle {} already released", handle.id);
        }
        Ok(())
    }

    /// Handles for the same entry and format as `handle` that were issued
    /// and not yet released.
    pub fn outstanding_for(&self, handle: &CapabilityHandle) -> u32 {
        if handle.registry != self.id {
            return 0;
        }
        let key = (handle.serial, handle.format);
        self.live.values().filter(|&&issued| issued == key).count() as u32
    }
}
