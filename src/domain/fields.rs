//! Placeholder substitution maps
//!
//! A [`FieldSubstitutionMap`] maps literal placeholder tokens (`{{city}}`) to
//! replacement text. Maps are built per recipient from the configured
//! [`FieldMapping`]s, the recipient's row and the run-scoped values.

use super::errors::InvoicerError;
use super::ids::{InvoiceId, Period};
use super::recipient::RecipientRecord;
use super::result::Result;
use serde::{Deserialize, Serialize};

/// Ordered mapping from placeholder token to replacement text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSubstitutionMap {
    entries: Vec<(String, String)>,
}

impl FieldSubstitutionMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the replacement for `token`, overwriting an earlier entry
    pub fn insert(&mut self, token: impl Into<String>, replacement: impl Into<String>) {
        let token = token.into();
        let replacement = replacement.into();
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = replacement,
            None => self.entries.push((token, replacement)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, token: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.insert(token, replacement);
        self
    }

    /// Replacement for `token`, if any
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, r)| r.as_str())
    }

    /// (token, replacement) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, r)| (t.as_str(), r.as_str()))
    }

    /// Tokens in insertion order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies every entry to `text`
    ///
    /// Literal, case-sensitive, every occurrence, entries in insertion order.
    /// Tokens that do not occur leave the text untouched.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (token, replacement) in &self.entries {
            if token.is_empty() {
                continue;
            }
            out = out.replace(token.as_str(), replacement);
        }
        out
    }
}

/// Run-scoped value a placeholder can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunValue {
    /// Today's date, formatted with `invoice.date_format`
    Date,
    /// The run's period label
    Period,
    /// The recipient's invoice ID
    InvoiceId,
}

/// Binding of one placeholder to its source
///
/// Exactly one of `column`, `value` or `literal` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Literal token in the template, e.g. `{{recipient_name}}`
    pub placeholder: String,

    /// Recipient column supplying the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// Run-scoped value supplying the replacement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RunValue>,

    /// Fixed replacement text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl FieldMapping {
    /// Placeholder filled from a recipient column
    pub fn column(placeholder: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            column: Some(column.into()),
            value: None,
            literal: None,
        }
    }

    /// Placeholder filled from a run-scoped value
    pub fn run_value(placeholder: impl Into<String>, value: RunValue) -> Self {
        Self {
            placeholder: placeholder.into(),
            column: None,
            value: Some(value),
            literal: None,
        }
    }

    /// Validates the mapping
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.placeholder.is_empty() {
            return Err("invoice.fields[].placeholder cannot be empty".to_string());
        }
        let sources = [
            self.column.is_some(),
            self.value.is_some(),
            self.literal.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if sources != 1 {
            return Err(format!(
                "Field '{}' must set exactly one of column, value or literal",
                self.placeholder
            ));
        }
        Ok(())
    }
}

/// Run-scoped values available to every recipient's map
#[derive(Debug, Clone)]
pub struct RunValues<'a> {
    pub date: &'a str,
    pub period: &'a Period,
    pub invoice_id: &'a InvoiceId,
}

/// Builds the substitution map for one recipient
///
/// # Errors
///
/// Returns a configuration error if a mapping names a column the record does
/// not have, or if a mapping has no source.
pub fn build_substitution_map(
    mappings: &[FieldMapping],
    record: &RecipientRecord,
    run: &RunValues<'_>,
) -> Result<FieldSubstitutionMap> {
    let mut map = FieldSubstitutionMap::new();
    for mapping in mappings {
        let replacement = match (&mapping.column, mapping.value, &mapping.literal) {
            (Some(column), _, _) => record.require(column)?.to_string(),
            (None, Some(RunValue::Date), _) => run.date.to_string(),
            (None, Some(RunValue::Period), _) => run.period.to_string(),
            (None, Some(RunValue::InvoiceId), _) => run.invoice_id.to_string(),
            (None, None, Some(literal)) => literal.clone(),
            (None, None, None) => {
                return Err(InvoicerError::Configuration(format!(
                    "Field '{}' has no source",
                    mapping.placeholder
                )))
            }
        };
        map.insert(mapping.placeholder.clone(), replacement);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_apply_replaces_every_occurrence() {
        let map = FieldSubstitutionMap::new().with("{{name}}", "Ada");
        assert_eq!(
            map.apply("Dear {{name}}, signed {{name}}"),
            "Dear Ada, signed Ada"
        );
    }

    #[test]
    fn test_apply_is_case_sensitive() {
        let map = FieldSubstitutionMap::new().with("{{Name}}", "Ada");
        assert_eq!(map.apply("{{name}}"), "{{name}}");
    }

    #[test]
    fn test_apply_without_matches_is_identity() {
        let body = "Factuur {{city}} boilerplate";
        let map = FieldSubstitutionMap::new()
            .with("{{unused}}", "x")
            .with("[[other]]", "y");
        assert_eq!(map.apply(body), body);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut map = FieldSubstitutionMap::new();
        map.insert("{{a}}", "1");
        map.insert("{{a}}", "2");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("{{a}}"), Some("2"));
    }

    #[test]
    fn test_mapping_validation() {
        assert!(FieldMapping::column("{{a}}", "A").validate().is_ok());
        assert!(FieldMapping::run_value("{{d}}", RunValue::Date)
            .validate()
            .is_ok());

        let mut both = FieldMapping::column("{{a}}", "A");
        both.literal = Some("x".to_string());
        assert!(both.validate().is_err());

        let none = FieldMapping {
            placeholder: "{{a}}".to_string(),
            column: None,
            value: None,
            literal: None,
        };
        assert!(none.validate().is_err());
    }

    #[test]
    fn test_build_substitution_map() {
        let record = RecipientRecord::from_pairs([("Naam", "A"), ("Woonplaats", "Delft")]);
        let period = Period::new("2025-01").unwrap();
        let invoice_id = crate::domain::InvoiceIdScheme::Ordinal.derive("INV", &period, 0, Utc::now());
        let run = RunValues {
            date: "1-1-2025",
            period: &period,
            invoice_id: &invoice_id,
        };
        let mappings = vec![
            FieldMapping::column("{{recipient_name}}", "Naam"),
            FieldMapping::column("{{city}}", "Woonplaats"),
            FieldMapping::run_value("{{date}}", RunValue::Date),
            FieldMapping::run_value("{{invoice_id}}", RunValue::InvoiceId),
            FieldMapping {
                placeholder: "{{org}}".to_string(),
                column: None,
                value: None,
                literal: Some("Atelier".to_string()),
            },
        ];

        let map = build_substitution_map(&mappings, &record, &run).unwrap();
        assert_eq!(map.get("{{recipient_name}}"), Some("A"));
        assert_eq!(map.get("{{city}}"), Some("Delft"));
        assert_eq!(map.get("{{date}}"), Some("1-1-2025"));
        assert_eq!(map.get("{{invoice_id}}"), Some("INV-2025-01-0"));
        assert_eq!(map.get("{{org}}"), Some("Atelier"));
    }

    #[test]
    fn test_build_substitution_map_missing_column() {
        let record = RecipientRecord::from_pairs([("Naam", "A")]);
        let period = Period::new("2025-01").unwrap();
        let invoice_id = crate::domain::InvoiceIdScheme::Ordinal.derive("INV", &period, 0, Utc::now());
        let run = RunValues {
            date: "1-1-2025",
            period: &period,
            invoice_id: &invoice_id,
        };
        let result = build_substitution_map(
            &[FieldMapping::column("{{city}}", "Woonplaats")],
            &record,
            &run,
        );
        assert!(matches!(result, Err(InvoicerError::Configuration(_))));
    }

    #[test]
    fn test_field_mapping_yaml() {
        let yaml = r#"
- placeholder: "{{recipient_name}}"
  column: Naam
- placeholder: "{{date}}"
  value: date
"#;
        let mappings: Vec<FieldMapping> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(mappings[0], FieldMapping::column("{{recipient_name}}", "Naam"));
        assert_eq!(mappings[1].value, Some(RunValue::Date));
    }
}
