// Copyright 2025 LLM Workbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Profile registry: hardware profile → backend instances.
//!
//! Built once from [`WorkbenchConfig`] and read-only afterwards. Lookups
//! never hand out owned instances; callers borrow from the registry for the
//! lifetime of a run.

use std::collections::BTreeMap;

use crate::config::{ProfileConfig, WorkbenchConfig, DEFAULT_SAMPLE_SIZE};
use crate::error::ValidationError;
use crate::types::{HardwareProfile, Instance};

/// Static mapping from hardware profile to instance descriptors.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<HardwareProfile, ProfileConfig>,
}

impl ProfileRegistry {
    /// Build a registry from a validated configuration.
    pub fn from_config(config: &WorkbenchConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            profiles: config.profiles.clone(),
        })
    }

    /// The instances of a profile.
    ///
    /// Fails with [`ValidationError::UnknownProfile`] when the profile is
    /// not configured, and with [`ValidationError::EmptyProfile`] when it is
    /// configured without instances.
    pub fn get_instances(&self, profile: HardwareProfile) -> crate::Result<&[Instance]> {
        let pc = self
            .profiles
            .get(&profile)
            .ok_or_else(|| ValidationError::UnknownProfile(profile.to_string()))?;
        if pc.instances.is_empty() {
            return Err(ValidationError::EmptyProfile(profile.to_string()));
        }
        Ok(&pc.instances)
    }

    /// The sample size of a profile, falling back to
    /// [`DEFAULT_SAMPLE_SIZE`] when the profile is unknown.
    pub fn get_sample_size(&self, profile: HardwareProfile) -> usize {
        self.profiles
            .get(&profile)
            .map(|pc| pc.sample_size)
            .unwrap_or(DEFAULT_SAMPLE_SIZE)
    }

    /// Profiles known to this registry, in ascending capacity order.
    pub fn profiles(&self) -> Vec<HardwareProfile> {
        self.profiles.keys().copied().collect()
    }
}
