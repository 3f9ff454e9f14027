use crate::error::{HuntOddsError, Result};
use crate::normalizer::ReportLayout;
use crate::query::HuntQuery;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Canonical column names, in snapshot order.
pub const HUNT_CODE: &str = "huntCode";
pub const UNIT_DESCRIPTION: &str = "unitDescription";
pub const BAG: &str = "bag";
pub const N_LICENSES: &str = "nLicenses";
pub const R_1ST: &str = "r1st";
pub const R_2ND: &str = "r2nd";
pub const R_3RD: &str = "r3rd";
pub const R_TOT: &str = "rTot";
pub const HUNT_ODDS: &str = "huntOdds";

pub const SNAPSHOT_COLUMNS: [&str; 9] = [
    HUNT_CODE,
    UNIT_DESCRIPTION,
    BAG,
    N_LICENSES,
    R_1ST,
    R_2ND,
    R_3RD,
    R_TOT,
    HUNT_ODDS,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HuntRecord {
    pub hunt_code: String,
    pub unit_description: String,
    pub bag: String,
    pub n_licenses: u32,
    pub r1st: u32,
    pub r2nd: u32,
    pub r3rd: u32,
    pub r_tot: u32,
    /// Draw odds in percent, computed once at normalization time.
    pub hunt_odds: f64,
}

impl HuntRecord {
    /// The three-letter species prefix, if the code is long enough.
    pub fn species_prefix(&self) -> Option<&str> {
        self.hunt_code.get(..3)
    }

    /// Character at the weapon position (index 4) of the hunt code.
    pub fn weapon_digit(&self) -> Option<char> {
        self.hunt_code.chars().nth(4)
    }

    pub fn has_tag(&self, tag: EligibilityTag) -> bool {
        tag.matches(&self.unit_description)
    }

    pub fn summary(&self) -> HuntSummary {
        HuntSummary {
            hunt_code: self.hunt_code.clone(),
            unit_description: self.unit_description.clone(),
            hunt_odds: self.hunt_odds,
        }
    }
}

/// The columns a query response needs for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HuntSummary {
    pub hunt_code: String,
    pub unit_description: String,
    pub hunt_odds: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponCode {
    #[default]
    #[serde(rename = "any-legal")]
    AnyLegal,
    #[serde(rename = "bow")]
    Bow,
    #[serde(rename = "muzzle-loader")]
    MuzzleLoader,
}

impl WeaponCode {
    pub const ALL: [WeaponCode; 3] = [Self::AnyLegal, Self::Bow, Self::MuzzleLoader];

    /// The digit this weapon class occupies at index 4 of a hunt code.
    pub fn digit(self) -> char {
        match self {
            Self::AnyLegal => '1',
            Self::Bow => '2',
            Self::MuzzleLoader => '3',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AnyLegal => "Any Legal",
            Self::Bow => "Bow",
            Self::MuzzleLoader => "Muzzle Loader",
        }
    }
}

impl fmt::Display for WeaponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.digit(), self.label())
    }
}

impl TryFrom<u8> for WeaponCode {
    type Error = HuntOddsError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::AnyLegal),
            2 => Ok(Self::Bow),
            3 => Ok(Self::MuzzleLoader),
            other => Err(HuntOddsError::Config(format!(
                "unknown weapon code {other}, expected 1, 2 or 3"
            ))),
        }
    }
}

impl FromStr for WeaponCode {
    type Err = HuntOddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "any-legal" | "any" => Ok(Self::AnyLegal),
            "2" | "bow" => Ok(Self::Bow),
            "3" | "muzzle-loader" | "muzzleloader" | "muzzle" => Ok(Self::MuzzleLoader),
            other => Err(HuntOddsError::Config(format!(
                "unknown weapon '{other}', expected any-legal, bow or muzzle-loader"
            ))),
        }
    }
}

/// Eligibility restrictions written into a unit description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EligibilityTag {
    PrivateLand,
    YouthOnly,
    MobilityImpaired,
    MilitaryOnly,
}

impl EligibilityTag {
    pub const ALL: [EligibilityTag; 4] = [
        Self::PrivateLand,
        Self::YouthOnly,
        Self::MobilityImpaired,
        Self::MilitaryOnly,
    ];

    pub fn phrase(self) -> &'static str {
        match self {
            Self::PrivateLand => "private land only",
            Self::YouthOnly => "youth only",
            Self::MobilityImpaired => "mobility impaired only",
            Self::MilitaryOnly => "military only",
        }
    }

    /// Case-insensitive substring match against a unit description.
    pub fn matches(self, description: &str) -> bool {
        description.to_lowercase().contains(self.phrase())
    }
}

impl FromStr for EligibilityTag {
    type Err = HuntOddsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "private-land" | "private" => Ok(Self::PrivateLand),
            "youth" | "youth-only" => Ok(Self::YouthOnly),
            "mobility-impaired" | "mobility" => Ok(Self::MobilityImpaired),
            "military" | "military-only" => Ok(Self::MilitaryOnly),
            other => Err(HuntOddsError::Config(format!(
                "unknown tag '{other}', expected private-land, youth, mobility-impaired or military"
            ))),
        }
    }
}

impl fmt::Display for EligibilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub prefix: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub raw_report: String,
    pub snapshot: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            raw_report: "data/odds_summary.csv".to_string(),
            snapshot: "huntData.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub species_catalog: Vec<Species>,
    pub files: FilesConfig,
    pub report: ReportLayout,
    pub query: HuntQuery,
}

impl Default for Config {
    fn default() -> Self {
        let catalog = [
            ("ANT", "Pronghorn"),
            ("DER", "Deer"),
            ("ELK", "Elk"),
            ("IBX", "Persian Ibex"),
            ("BBY", "Barbary Sheep"),
            ("ORX", "Oryx"),
            ("JAV", "Javelina"),
            ("BHS", "Bighorn Sheep"),
        ];
        Self {
            species_catalog: catalog
                .iter()
                .map(|(prefix, name)| Species {
                    prefix: prefix.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            files: FilesConfig::default(),
            report: ReportLayout::default(),
            query: HuntQuery::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let path = file_path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| HuntOddsError::from_io(e, path))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| HuntOddsError::Config(e.to_string()))?;
        config.report.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| HuntOddsError::Config(e.to_string()))?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn species_name(&self, prefix: &str) -> Option<&str> {
        self.species_catalog
            .iter()
            .find(|s| s.prefix == prefix)
            .map(|s| s.name.as_str())
    }
}
