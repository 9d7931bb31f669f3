//! Host capability availability, decided once at startup.
//!
//! The registry is built from tool discovery plus `tools.disabled` and then
//! shared read-only. There is no global availability flag; everything that
//! needs to know goes through the registry it was handed.

use std::collections::BTreeMap;

use nb_core::config::ToolsConfig;
use serde::Serialize;

use crate::capability::Capability;
use crate::tools::ToolRegistry;

/// Whether a capability can run on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

/// Serializable view of one capability's availability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityInfo {
    pub capability: Capability,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    entries: BTreeMap<Capability, Availability>,
}

impl CapabilityRegistry {
    /// Build from discovered tools and configuration.
    pub fn build(tools: &ToolRegistry, config: &ToolsConfig) -> Self {
        let mut registry = Self::all_available();

        for cap in Capability::ALL {
            if let Some(tool) = cap.required_tool() {
                if tools.get(tool).is_none() {
                    registry = registry.with_disabled(cap, format!("{tool} not found"));
                }
            }
        }

        for name in &config.disabled {
            match name.parse::<Capability>() {
                Ok(cap) => registry = registry.with_disabled(cap, "disabled by configuration"),
                Err(_) => tracing::warn!("Ignoring unknown capability in tools.disabled: {name}"),
            }
        }

        registry
    }

    /// Every capability enabled.
    pub fn all_available() -> Self {
        Self {
            entries: Capability::ALL
                .into_iter()
                .map(|c| (c, Availability::Available))
                .collect(),
        }
    }

    /// Mark `capability` unavailable with `reason`.
    #[must_use]
    pub fn with_disabled(mut self, capability: Capability, reason: impl Into<String>) -> Self {
        self.entries.insert(
            capability,
            Availability::Unavailable {
                reason: reason.into(),
            },
        );
        self
    }

    pub fn availability(&self, capability: Capability) -> &Availability {
        self.entries
            .get(&capability)
            .unwrap_or(&Availability::Available)
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        matches!(self.availability(capability), Availability::Available)
    }

    pub fn report(&self) -> Vec<CapabilityInfo> {
        Capability::ALL
            .into_iter()
            .map(|capability| match self.availability(capability) {
                Availability::Available => CapabilityInfo {
                    capability,
                    available: true,
                    reason: None,
                },
                Availability::Unavailable { reason } => CapabilityInfo {
                    capability,
                    available: false,
                    reason: Some(reason.clone()),
                },
            })
            .collect()
    }
}
