//! Sample registration and search forms
//!
//! Client-side validation runs before anything is sent; a form that fails
//! it never reaches the backend.

use crate::error::GridResult;
use crate::mutation::MutationCoordinator;
use labgrid_client::endpoints;
use labgrid_types::{Features, FilterOp, FilterSet, GridConfig, OptionItem};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Client-side validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// Quantity below one
    #[error("quantity must be at least 1")]
    QuantityTooSmall,

    /// A pasted list does not match the quantity
    #[error("{field} has {actual} entries but quantity is {expected}")]
    LengthMismatch {
        /// List field
        field: &'static str,
        /// Quantity
        expected: u32,
        /// Entries supplied
        actual: usize,
    },

    /// GUIDs are mandatory for this order
    #[error("a GUID is required for every sample")]
    GuidRequired,

    /// Pasted block spans several spreadsheet columns
    #[error("more than a single excel column was pasted")]
    MultipleColumns,

    /// Session has no order to attach samples to
    #[error("no order configured")]
    MissingOrder,

    /// No marker chosen
    #[error("choose at least one marker")]
    MarkersRequired,
}

/// Split a pasted spreadsheet column into one entry per line
///
/// # Errors
/// `FormError::MultipleColumns` if the block contains a tab
pub fn parse_pasted_column(text: &str) -> Result<Vec<String>, FormError> {
    if text.contains('\t') {
        return Err(FormError::MultipleColumns);
    }
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(text
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect())
}

/// Bulk sample registration form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleForm {
    /// Species
    pub species: Option<OptionItem>,
    /// Sample type
    #[serde(rename = "type")]
    pub sample_type: Option<OptionItem>,
    /// Location
    pub location: Option<OptionItem>,
    /// Collection year
    pub year: Option<i32>,
    /// Number of samples to create
    pub quantity: u32,
    /// One GUID per sample, or empty
    pub guid: Vec<String>,
    /// One name per sample, or empty
    pub name: Vec<String>,
    /// One population id per sample, or empty
    pub pop_id: Vec<String>,
}

impl Default for SampleForm {
    fn default() -> Self {
        Self {
            species: None,
            sample_type: None,
            location: None,
            year: None,
            quantity: 1,
            guid: Vec::new(),
            name: Vec::new(),
            pop_id: Vec::new(),
        }
    }
}

impl SampleForm {
    /// Empty form
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the form against the session's feature flags
    ///
    /// # Errors
    /// The first [`FormError`] found
    pub fn validate(&self, features: Features) -> Result<(), FormError> {
        if self.quantity < 1 {
            return Err(FormError::QuantityTooSmall);
        }
        if features.needs_guid && self.guid.iter().all(|g| g.trim().is_empty()) {
            return Err(FormError::GuidRequired);
        }
        for (field, values) in [("guid", &self.guid), ("name", &self.name), ("pop_id", &self.pop_id)] {
            if !values.is_empty() && values.len() != self.quantity as usize {
                return Err(FormError::LengthMismatch {
                    field,
                    expected: self.quantity,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Request body for `POST /api/samples/bulk/`
    ///
    /// # Errors
    /// [`FormError`] if validation fails or no order is configured
    pub fn to_body(&self, config: &GridConfig) -> Result<Value, FormError> {
        self.validate(config.features)?;
        let order = config.order.ok_or(FormError::MissingOrder)?;
        Ok(json!({
            "order": order,
            "species": self.species.as_ref().map(OptionItem::value_key),
            "type": self.sample_type.as_ref().map(OptionItem::value_key),
            "location": self.location.as_ref().map(OptionItem::value_key),
            "year": self.year,
            "quantity": self.quantity,
            "guid": self.guid,
            "name": self.name,
            "pop_id": self.pop_id,
        }))
    }

    /// Validate and submit; the form resets on success and keeps its
    /// values on failure
    ///
    /// # Errors
    /// - `GridError::FormInvalid` before any request is sent
    /// - coordinator errors otherwise
    pub async fn submit(
        &mut self,
        coordinator: &MutationCoordinator,
        config: &GridConfig,
    ) -> GridResult<Value> {
        let body = self.to_body(config)?;
        let created = coordinator.create(endpoints::SAMPLES, body).await?;
        self.reset();
        Ok(created)
    }

    /// Back to defaults
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Search form of the analysis sample table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterForm {
    /// Order id
    pub order: Option<u64>,
    /// Species
    pub species: Option<OptionItem>,
    /// Sample type
    pub sample_type: Option<OptionItem>,
    /// Location
    pub location: Option<OptionItem>,
    /// Collection year
    pub year: Option<i32>,
    /// Name prefix
    pub name_prefix: String,
    /// Genlab id prefix
    pub genlab_id_prefix: String,
    /// GUIDs, usually pasted
    pub guids: Vec<String>,
}

impl FilterForm {
    /// Set `guids` from a pasted column
    ///
    /// # Errors
    /// `FormError::MultipleColumns` if the block contains a tab
    pub fn paste_guids(&mut self, text: &str) -> Result<(), FormError> {
        self.guids = parse_pasted_column(text)?;
        Ok(())
    }

    /// Filters for the query identity; empty fields are omitted
    #[must_use]
    pub fn to_filter_set(&self) -> FilterSet {
        let mut filters = FilterSet::new();
        if let Some(order) = self.order {
            filters.insert("order", FilterOp::Exact, order.to_string());
        }
        for (field, option) in [
            ("species", &self.species),
            ("type", &self.sample_type),
            ("location", &self.location),
        ] {
            if let Some(option) = option {
                filters.insert(field, FilterOp::Exact, option_param(option));
            }
        }
        if let Some(year) = self.year {
            filters.insert("year", FilterOp::Exact, year.to_string());
        }
        filters.insert("name", FilterOp::IStartsWith, self.name_prefix.as_str());
        filters.insert("genlab_id", FilterOp::IStartsWith, self.genlab_id_prefix.as_str());
        filters.insert("guid", FilterOp::In, self.guids.clone());
        filters
    }
}

fn option_param(option: &OptionItem) -> String {
    match option.value_key() {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filled(quantity: u32) -> SampleForm {
        SampleForm {
            species: Some(OptionItem::new(1, "Ursus arctos")),
            sample_type: Some(OptionItem::new(2, "Blood")),
            year: Some(2024),
            quantity,
            ..SampleForm::default()
        }
    }

    #[test]
    fn pasted_column_splits_lines() {
        assert_eq!(
            parse_pasted_column("a\r\nb\nc\n").unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(parse_pasted_column("  ").unwrap().is_empty());
        assert_eq!(
            parse_pasted_column("a\tb\nc\td").unwrap_err(),
            FormError::MultipleColumns
        );
    }

    #[test]
    fn parallel_lists_must_match_quantity() {
        let mut form = filled(3);
        form.name = vec!["a".into(), "b".into()];
        assert_eq!(
            form.validate(Features::default()).unwrap_err(),
            FormError::LengthMismatch {
                field: "name",
                expected: 3,
                actual: 2
            }
        );

        form.name.push("c".into());
        assert!(form.validate(Features::default()).is_ok());
    }

    #[test]
    fn quantity_and_guid_rules() {
        assert_eq!(
            filled(0).validate(Features::default()).unwrap_err(),
            FormError::QuantityTooSmall
        );
        let needs_guid = Features { needs_guid: true };
        assert_eq!(filled(1).validate(needs_guid).unwrap_err(), FormError::GuidRequired);

        let mut form = filled(1);
        form.guid = vec!["g-1".into()];
        assert!(form.validate(needs_guid).is_ok());
    }

    #[test]
    fn body_injects_order() {
        let config = GridConfig::default().with_order(12);
        let mut form = filled(2);
        form.pop_id = vec!["p1".into(), "p2".into()];

        assert_eq!(
            form.to_body(&config).unwrap(),
            json!({
                "order": 12,
                "species": 1,
                "type": 2,
                "location": null,
                "year": 2024,
                "quantity": 2,
                "guid": [],
                "name": [],
                "pop_id": ["p1", "p2"],
            })
        );
        assert_eq!(
            form.to_body(&GridConfig::default()).unwrap_err(),
            FormError::MissingOrder
        );
    }

    #[test]
    fn filter_form_omits_empty_fields() {
        let mut form = FilterForm {
            species: Some(OptionItem::new(3, "Alces alces")),
            name_prefix: "bear".into(),
            ..FilterForm::default()
        };
        form.paste_guids("g1\ng2").unwrap();

        let pairs: Vec<(String, String)> = form
            .to_filter_set()
            .pairs()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("guid__in".to_string(), "g1,g2".to_string()),
                ("name__istartswith".to_string(), "bear".to_string()),
                ("species".to_string(), "3".to_string()),
            ]
        );
    }
}
