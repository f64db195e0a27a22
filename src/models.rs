use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl FromStr for Grade {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            _ => bail!("unrecognized letter grade: {s}"),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{letter}")
    }
}

/// Socioeconomic tier used to select an applicant's SE cutoff row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl Tier {
    pub fn from_number(number: i16) -> Option<Self> {
        match number {
            1 => Some(Tier::Tier1),
            2 => Some(Tier::Tier2),
            3 => Some(Tier::Tier3),
            4 => Some(Tier::Tier4),
            _ => None,
        }
    }

    pub fn number(self) -> i16 {
        match self {
            Tier::Tier1 => 1,
            Tier::Tier2 => 2,
            Tier::Tier3 => 3,
            Tier::Tier4 => 4,
        }
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number: i16 = s
            .trim()
            .parse()
            .map_err(|_| anyhow!("unrecognized tier: {s}"))?;
        Tier::from_number(number)
            .with_context(|| format!("tier {number} out of range, expected 1-4"))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Se,
    Ib,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Se => "se",
            Scheme::Ib => "ib",
        }
    }
}

impl FromStr for Scheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "se" => Ok(Scheme::Se),
            "ib" => Ok(Scheme::Ib),
            _ => bail!("unrecognized scheme: {s} (expected se or ib)"),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Academic inputs for one applicant. Absent fields mean the data has not
/// been collected yet, not that the value is zero.
#[derive(Debug, Clone)]
pub struct StudentData {
    pub hsat_percentile_math: Option<f64>,
    pub hsat_percentile_read: Option<f64>,
    pub grade_math: Option<Grade>,
    pub grade_read: Option<Grade>,
    pub grade_sci: Option<Grade>,
    pub grade_soc_studies: Option<Grade>,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub id: String,
    pub program_name: String,
    pub school_name: String,
    pub school_id: String,
}

/// Lowest, average, and highest score observed among admitted students.
#[derive(Debug, Clone, Copy)]
pub struct CutoffScores {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TieredCutoffs {
    pub tier1: CutoffScores,
    pub tier2: CutoffScores,
    pub tier3: CutoffScores,
    pub tier4: CutoffScores,
}

impl TieredCutoffs {
    pub fn for_tier(&self, tier: Tier) -> CutoffScores {
        match tier {
            Tier::Tier1 => self.tier1,
            Tier::Tier2 => self.tier2,
            Tier::Tier3 => self.tier3,
            Tier::Tier4 => self.tier4,
        }
    }
}

pub type SeCutoffDictionary = HashMap<String, TieredCutoffs>;
pub type IbCutoffDictionary = HashMap<String, CutoffScores>;

/// Chance classification. `None` through `Certain` are ordered weakest to
/// strongest; `NotImplemented` means no estimate could be produced and never
/// compares against the ordered outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessChance {
    NotImplemented,
    None,
    Uncertain,
    Likely,
    Certain,
}

impl SuccessChance {
    /// Ordinal position among the comparable outcomes, weakest first.
    /// `NotImplemented` has none.
    pub fn rank(self) -> Option<u8> {
        match self {
            SuccessChance::NotImplemented => None,
            SuccessChance::None => Some(0),
            SuccessChance::Uncertain => Some(1),
            SuccessChance::Likely => Some(2),
            SuccessChance::Certain => Some(3),
        }
    }
}

impl PartialOrd for SuccessChance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for SuccessChance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SuccessChance::NotImplemented => "undetermined",
            SuccessChance::None => "none",
            SuccessChance::Uncertain => "uncertain",
            SuccessChance::Likely => "likely",
            SuccessChance::Certain => "certain",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub full_name: String,
    pub email: String,
    pub updated_at: NaiveDate,
    pub data: StudentData,
    /// Ids of schools whose attendance boundary contains the student's
    /// address, resolved by the data-loading layer.
    pub boundary_schools: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct ProgramRecord {
    pub scheme: Scheme,
    pub program: Program,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChanceResult {
    pub program_id: String,
    pub program_name: String,
    pub school_name: String,
    pub scheme: Scheme,
    pub points: Option<f64>,
    pub chance: SuccessChance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChanceSummary {
    pub chance: SuccessChance,
    pub count: usize,
}
