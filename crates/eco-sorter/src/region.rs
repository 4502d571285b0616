//! Supported collection regions
//!
//! Every ingested chunk is tagged with one of these regions and retrieval is
//! always restricted to the region the user selected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A municipality or province with its own sorting guide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    #[default]
    Bruxelles,
    Hainaut,
    Anvers,
    Liege,
    Namur,
    BrabantWallon,
    Charleroi,
    Luxembourg,
    Mons,
}

impl Region {
    /// All regions in display order
    pub const ALL: [Region; 9] = [
        Region::Bruxelles,
        Region::Hainaut,
        Region::Anvers,
        Region::Liege,
        Region::Namur,
        Region::BrabantWallon,
        Region::Charleroi,
        Region::Luxembourg,
        Region::Mons,
    ];

    /// Human-readable label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bruxelles => "Bruxelles",
            Self::Hainaut => "Hainaut",
            Self::Anvers => "Anvers",
            Self::Liege => "Liège",
            Self::Namur => "Namur",
            Self::BrabantWallon => "Brabant Wallon",
            Self::Charleroi => "Charleroi",
            Self::Luxembourg => "Luxembourg",
            Self::Mons => "Mons",
        }
    }

    /// Metadata tag stored on every chunk
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Bruxelles => "bruxelles",
            Self::Hainaut => "hainaut",
            Self::Anvers => "antwerp",
            Self::Liege => "liege",
            Self::Namur => "namur",
            Self::BrabantWallon => "brabant_wallon",
            Self::Charleroi => "charleroi",
            Self::Luxembourg => "luxembourg",
            Self::Mons => "mons",
        }
    }

    /// Where users are sent when the guide has no answer
    pub fn fallback_authority(&self) -> &'static str {
        match self {
            Self::Bruxelles => "le site de Bruxelles-Propreté",
            _ => "le site de votre commune",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Accepts either the tag (`brabant_wallon`) or the label (`Brabant Wallon`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Region::ALL
            .iter()
            .find(|r| r.tag() == needle || r.label().to_lowercase() == needle)
            .copied()
            .ok_or_else(|| Error::UnknownRegion(s.to_string()))
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Label/tag pair for listing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionInfo {
    pub label: String,
    pub tag: String,
    /// Number of indexed chunks for this region
    pub chunk_count: usize,
}

impl RegionInfo {
    pub fn new(region: Region, chunk_count: usize) -> Self {
        Self {
            label: region.label().to_string(),
            tag: region.tag().to_string(),
            chunk_count,
        }
    }
}
