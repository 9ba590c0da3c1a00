// 🐄 Domain Model - Persons, accounts, weighing sheets and cattle entries
// Field names serialize in camelCase because that is what the REST clients send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

pub type PersonId = i64;
pub type AccountId = i64;
pub type SheetId = i64;
pub type EntryId = i64;

// ============================================================================
// PERSON
// ============================================================================

/// A counterparty: seller, buyer, or the identity linked to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    pub legal_id: Option<String>,
    pub name: String,
    /// Derived dedup key, see [`make_name_key`]
    #[serde(skip_serializing, default)]
    pub name_key: String,
    pub phone: Option<String>,
}

/// Row shape returned by the suggestion feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: String,
    pub phone: Option<String>,
}

/// Values for a person row that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub legal_id: Option<String>,
    pub name: String,
    pub name_key: String,
    pub phone: Option<String>,
}

/// Trim and collapse every run of whitespace into one space. Case is kept.
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dedup key for a person name: cleaned, then case-folded.
///
/// `" Ana   GÓMEZ "` and `"ana gómez"` produce the same key.
pub fn make_name_key(raw: &str) -> String {
    clean_name(raw).to_lowercase()
}

// ============================================================================
// ACCOUNT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Client,
    /// Anything a credential carries that we do not recognize
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Client => "CLIENT",
            Role::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Role {
        match value {
            "ADMIN" => Role::Admin,
            "CLIENT" => Role::Client,
            _ => Role::Unknown,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication principal. Only the boundary layer reads `password_hash`.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub person_id: Option<PersonId>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub person_id: Option<PersonId>,
}

// ============================================================================
// WEIGHING SHEET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeighingSheet {
    pub id: SheetId,
    pub created_at: DateTime<Utc>,
    pub seller_id: PersonId,
    pub buyer_id: PersonId,
    pub created_by: AccountId,
    /// None until the first entry lands
    pub total_weight: Option<f64>,
    pub average_weight: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewSheet {
    pub seller_id: PersonId,
    pub buyer_id: PersonId,
    pub created_by: AccountId,
    pub created_at: DateTime<Utc>,
}

/// Derived totals of a sheet's entry set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetTotals {
    pub total_weight: Option<f64>,
    pub average_weight: Option<i64>,
}

impl SheetTotals {
    /// Re-derive totals from the complete set of weights.
    ///
    /// The average is the floor of total / count; both are None when empty.
    pub fn from_weights(weights: &[f64]) -> Self {
        if weights.is_empty() {
            return SheetTotals {
                total_weight: None,
                average_weight: None,
            };
        }

        let total: f64 = weights.iter().sum();
        let average = (total / weights.len() as f64).floor() as i64;

        SheetTotals {
            total_weight: Some(total),
            average_weight: Some(average),
        }
    }

    /// False when the sum overflowed; such totals must not be stored.
    pub fn is_finite(&self) -> bool {
        self.total_weight.map_or(true, f64::is_finite)
    }
}

/// A sheet together with its counterparties and entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDetail {
    #[serde(flatten)]
    pub sheet: WeighingSheet,
    pub seller: Person,
    pub buyer: Person,
    pub entries: Vec<CattleEntry>,
}

/// One row of a sheet listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub id: SheetId,
    pub created_at: DateTime<Utc>,
    pub seller: PersonSummary,
    pub buyer: PersonSummary,
    pub total_weight: Option<f64>,
    pub average_weight: Option<i64>,
    pub entry_count: i64,
}

// ============================================================================
// CATTLE ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CattleType {
    Cow,
    Bull,
    Buffalo,
}

impl CattleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CattleType::Cow => "cow",
            CattleType::Bull => "bull",
            CattleType::Buffalo => "buffalo",
        }
    }
}

impl FromStr for CattleType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cow" | "vaca" => Ok(CattleType::Cow),
            "bull" | "toro" => Ok(CattleType::Bull),
            "buffalo" | "búfalo" | "bufalo" => Ok(CattleType::Buffalo),
            other => Err(DomainError::Validation(format!(
                "Unknown cattle type: '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
        }
    }
}

impl FromStr for Sex {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "female" | "hembra" => Ok(Sex::Female),
            "male" | "macho" => Ok(Sex::Male),
            other => Err(DomainError::Validation(format!("Unknown sex: '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CattleEntry {
    pub id: EntryId,
    pub sheet_id: SheetId,
    pub tag_number: String,
    #[serde(rename = "type")]
    pub cattle_type: CattleType,
    pub sex: Sex,
    pub weight: f64,
    pub mark: Option<String>,
}

/// A validated entry ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub tag_number: String,
    pub cattle_type: CattleType,
    pub sex: Sex,
    pub weight: f64,
    pub mark: Option<String>,
}

/// Weight as it arrives from a client: either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWeight {
    Number(f64),
    Text(String),
}

impl From<f64> for RawWeight {
    fn from(value: f64) -> Self {
        RawWeight::Number(value)
    }
}

impl From<&str> for RawWeight {
    fn from(value: &str) -> Self {
        RawWeight::Text(value.to_string())
    }
}

impl RawWeight {
    /// Accept only finite values strictly greater than zero.
    pub fn parse(&self) -> Result<f64, DomainError> {
        let value = match self {
            RawWeight::Number(n) => *n,
            RawWeight::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                DomainError::Validation(format!("Weight must be a number, got '{}'", s))
            })?,
        };

        if !value.is_finite() || value <= 0.0 {
            return Err(DomainError::Validation(format!(
                "Weight must be a positive number, got {}",
                value
            )));
        }

        Ok(value)
    }
}

/// Entry fields before validation.
#[derive(Debug, Clone)]
pub struct EntryInput {
    pub tag_number: String,
    pub cattle_type: CattleType,
    pub sex: Sex,
    pub weight: RawWeight,
    pub mark: Option<String>,
}
