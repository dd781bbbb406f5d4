//! Domain identifier types with validation
//!
//! Newtype wrappers for backend document handles, the shared target location,
//! the invoice period and invoice identifiers. Each type rejects empty input
//! so a blank spreadsheet cell or config value never reaches a backend call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Template document identifier
///
/// # Examples
///
/// ```
/// use invoicer::domain::ids::TemplateId;
/// use std::str::FromStr;
///
/// let id = TemplateId::from_str("1W7uhfDQFTNnV5DtMEBqtJFmZeWZgZ1Tda87vCQjMvHI").unwrap();
/// assert_eq!(id.as_str(), "1W7uhfDQFTNnV5DtMEBqtJFmZeWZgZ1Tda87vCQjMvHI");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates a new TemplateId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Template ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the template ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Views the template as a plain document handle (for reads)
    pub fn as_document(&self) -> DocumentId {
        DocumentId(self.0.clone())
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Handle of a document created by the template engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a new DocumentId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Document ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the document ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Destination folder shared by every job of a run
///
/// Resolved once per run; it is never created on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetLocation(String);

impl TargetLocation {
    /// Creates a new TargetLocation from a folder identifier
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Target location cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the folder ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for TargetLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Invoice period label (e.g. `2025-01`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period(String);

impl Period {
    /// Creates a new Period from a label
    ///
    /// Whitespace is rejected because the period ends up in invoice IDs.
    pub fn new(label: impl Into<String>) -> Result<Self, String> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err("Period cannot be empty".to_string());
        }
        if label.chars().any(char::is_whitespace) {
            return Err(format!("Period '{label}' cannot contain whitespace"));
        }
        Ok(Self(label))
    }

    /// The period of the given instant, formatted as `YYYY-MM`
    pub fn month_of(instant: DateTime<Utc>) -> Self {
        Self(instant.format("%Y-%m").to_string())
    }

    /// Returns the period label as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Human-readable invoice identifier, unique within a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(String);

impl InvoiceId {
    /// Returns the invoice ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// How invoice identifiers are derived
///
/// Both schemes are functions of the recipient's ordinal in the current list,
/// never of recipient data, so duplicate names cannot collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceIdScheme {
    /// `{prefix}-{period}-{ordinal}`
    #[default]
    Ordinal,
    /// `{prefix}-{run start + ordinal microseconds, as %Y%m%d%H%M%S%6f}`
    Timestamp,
}

impl InvoiceIdScheme {
    /// Derive the invoice ID for the recipient at `ordinal`
    pub fn derive(
        &self,
        prefix: &str,
        period: &Period,
        ordinal: usize,
        run_started: DateTime<Utc>,
    ) -> InvoiceId {
        match self {
            InvoiceIdScheme::Ordinal => InvoiceId(format!("{prefix}-{period}-{ordinal}")),
            InvoiceIdScheme::Timestamp => {
                let stamp = run_started + Duration::microseconds(ordinal as i64);
                InvoiceId(format!("{prefix}-{}", stamp.format("%Y%m%d%H%M%S%6f")))
            }
        }
    }
}

impl FromStr for InvoiceIdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ordinal" => Ok(InvoiceIdScheme::Ordinal),
            "timestamp" => Ok(InvoiceIdScheme::Timestamp),
            other => Err(format!(
                "Invalid invoice ID scheme '{other}'. Must be one of: ordinal, timestamp"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_template_id_rejects_empty() {
        assert!(TemplateId::new("").is_err());
        assert!(TemplateId::new("   ").is_err());
        assert!(TemplateId::new("abc").is_ok());
    }

    #[test]
    fn test_template_as_document() {
        let template = TemplateId::new("tmpl-1").unwrap();
        assert_eq!(template.as_document().as_str(), "tmpl-1");
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new("2025-01").is_ok());
        assert!(Period::new("").is_err());
        assert!(Period::new("2025 01").is_err());
    }

    #[test]
    fn test_period_month_of() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        assert_eq!(Period::month_of(instant).as_str(), "2025-03");
    }

    #[test]
    fn test_ordinal_scheme_format() {
        let period = Period::new("2025-01").unwrap();
        let id = InvoiceIdScheme::Ordinal.derive("AMBUFFER", &period, 7, Utc::now());
        assert_eq!(id.as_str(), "AMBUFFER-2025-01-7");
    }

    #[test]
    fn test_timestamp_scheme_format() {
        let period = Period::new("2025-01").unwrap();
        let started = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let id = InvoiceIdScheme::Timestamp.derive("INV", &period, 3, started);
        assert_eq!(id.as_str(), "INV-20250102030405000003");
    }

    #[test]
    fn test_schemes_yield_distinct_ids() {
        let period = Period::new("2025-01").unwrap();
        let started = Utc::now();
        for scheme in [InvoiceIdScheme::Ordinal, InvoiceIdScheme::Timestamp] {
            let ids: HashSet<InvoiceId> = (0..500)
                .map(|ordinal| scheme.derive("INV", &period, ordinal, started))
                .collect();
            assert_eq!(ids.len(), 500, "scheme {scheme:?} produced a collision");
        }
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!(
            InvoiceIdScheme::from_str("Ordinal").unwrap(),
            InvoiceIdScheme::Ordinal
        );
        assert_eq!(
            InvoiceIdScheme::from_str("timestamp").unwrap(),
            InvoiceIdScheme::Timestamp
        );
        assert!(InvoiceIdScheme::from_str("uuid").is_err());
    }
}
