//! Taxonomic rank names and their numeric levels.

use crate::constants::rank::MAJOR_RANK_STEP;
use serde::{Deserialize, Serialize};

/// Symbolic taxonomic rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Rank {
    StateOfMatter,
    Kingdom,
    Subkingdom,
    Phylum,
    Subphylum,
    Superclass,
    Class,
    Subclass,
    Infraclass,
    Superorder,
    Order,
    Suborder,
    Infraorder,
    Parvorder,
    Zoosection,
    Zoosubsection,
    Superfamily,
    Epifamily,
    Family,
    Subfamily,
    Supertribe,
    Tribe,
    Subtribe,
    Genus,
    Subgenus,
    Section,
    Subsection,
    Species,
    Subspecies,
}

/// Rank level to rank, most general first.
const RANK_LEVELS: [(f64, Rank); 29] = [
    (100.0, Rank::StateOfMatter),
    (70.0, Rank::Kingdom),
    (67.0, Rank::Subkingdom),
    (60.0, Rank::Phylum),
    (57.0, Rank::Subphylum),
    (53.0, Rank::Superclass),
    (50.0, Rank::Class),
    (47.0, Rank::Subclass),
    (45.0, Rank::Infraclass),
    (43.0, Rank::Superorder),
    (40.0, Rank::Order),
    (37.0, Rank::Suborder),
    (35.0, Rank::Infraorder),
    (34.5, Rank::Parvorder),
    (34.0, Rank::Zoosection),
    (33.5, Rank::Zoosubsection),
    (33.0, Rank::Superfamily),
    (32.0, Rank::Epifamily),
    (30.0, Rank::Family),
    (27.0, Rank::Subfamily),
    (26.0, Rank::Supertribe),
    (25.0, Rank::Tribe),
    (24.0, Rank::Subtribe),
    (20.0, Rank::Genus),
    (15.0, Rank::Subgenus),
    (13.0, Rank::Section),
    (12.0, Rank::Subsection),
    (10.0, Rank::Species),
    (5.0, Rank::Subspecies),
];

impl Rank {
    /// Look up the rank for a numeric rank level.
    ///
    /// Returns `None` for levels that are not in the rank table.
    pub fn from_level(level: f64) -> Option<Self> {
        RANK_LEVELS
            .iter()
            .find(|(l, _)| (*l - level).abs() < f64::EPSILON)
            .map(|&(_, rank)| rank)
    }

    /// Numeric rank level of this rank.
    pub fn level(self) -> f64 {
        RANK_LEVELS
            .iter()
            .find(|(_, r)| *r == self)
            .map_or(0.0, |&(l, _)| l)
    }

    /// Canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StateOfMatter => "stateofmatter",
            Self::Kingdom => "kingdom",
            Self::Subkingdom => "subkingdom",
            Self::Phylum => "phylum",
            Self::Subphylum => "subphylum",
            Self::Superclass => "superclass",
            Self::Class => "class",
            Self::Subclass => "subclass",
            Self::Infraclass => "infraclass",
            Self::Superorder => "superorder",
            Self::Order => "order",
            Self::Suborder => "suborder",
            Self::Infraorder => "infraorder",
            Self::Parvorder => "parvorder",
            Self::Zoosection => "zoosection",
            Self::Zoosubsection => "zoosubsection",
            Self::Superfamily => "superfamily",
            Self::Epifamily => "epifamily",
            Self::Family => "family",
            Self::Subfamily => "subfamily",
            Self::Supertribe => "supertribe",
            Self::Tribe => "tribe",
            Self::Subtribe => "subtribe",
            Self::Genus => "genus",
            Self::Subgenus => "subgenus",
            Self::Section => "section",
            Self::Subsection => "subsection",
            Self::Species => "species",
            Self::Subspecies => "subspecies",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        RANK_LEVELS
            .iter()
            .map(|&(_, rank)| rank)
            .find(|rank| rank.as_str() == lower)
            .ok_or_else(|| format!("unknown rank: {s}"))
    }
}

/// Whether a rank level is a major rank (kingdom, phylum, ..., species).
pub fn is_major_rank_level(level: f64) -> bool {
    level % MAJOR_RANK_STEP == 0.0
}
