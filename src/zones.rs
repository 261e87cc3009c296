// src/zones.rs
//! Watched zones and the matcher that checks certificate names against them

use crate::error::ConfigError;
use crate::types::DecodedIdentity;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// How a name is compared against a zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Zone occurs anywhere inside the name
    #[default]
    Substring,
    /// Name equals the zone or is a subdomain of it
    Suffix,
}

/// Immutable set of watched zones, lowercased and deduplicated
#[derive(Debug, Clone)]
pub struct ZoneSet {
    zones: Arc<[String]>,
}

impl ZoneSet {
    pub fn new<I, S>(zones: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();

        for (position, zone) in zones.into_iter().enumerate() {
            let zone = zone.as_ref().trim().to_ascii_lowercase();
            if zone.is_empty() {
                return Err(ConfigError::BlankZone(position));
            }
            if !normalized.contains(&zone) {
                normalized.push(zone);
            }
        }

        if normalized.is_empty() {
            return Err(ConfigError::EmptyZoneSet);
        }

        Ok(Self {
            zones: normalized.into(),
        })
    }

    /// Load zones from a JSON array of strings
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read zones file {}", path.display()))?;
        let zones: Vec<String> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse zones file {}", path.display()))?;
        Ok(Self::new(zones)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Checks decoded identities against a zone set. Pure, shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct ZoneMatcher {
    zones: ZoneSet,
    strategy: MatchStrategy,
}

impl ZoneMatcher {
    pub fn new(zones: ZoneSet, strategy: MatchStrategy) -> Self {
        Self { zones, strategy }
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Names from `identity` that match at least one zone.
    ///
    /// Common name is checked before alternative names, and each distinct
    /// name appears once however many zones it matches.
    pub fn matches(&self, identity: &DecodedIdentity) -> Vec<String> {
        let mut matched: Vec<String> = Vec::new();

        for name in identity.names() {
            if matched.iter().any(|m| m == name) {
                continue;
            }
            if self.name_matches(name) {
                matched.push(name.to_string());
            }
        }

        matched
    }

    /// Check a single name against every zone
    pub fn name_matches(&self, name: &str) -> bool {
        let host = name.to_ascii_lowercase();
        self.zones
            .iter()
            .any(|zone| Self::matches_zone(&host, zone, self.strategy))
    }

    fn matches_zone(host: &str, zone: &str, strategy: MatchStrategy) -> bool {
        match strategy {
            MatchStrategy::Substring => host.contains(zone),
            MatchStrategy::Suffix => {
                let zone = zone.trim_start_matches("*.").trim_start_matches('.');
                host == zone || host.ends_with(&format!(".{}", zone))
            }
        }
    }
}
