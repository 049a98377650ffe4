//! Typed model of the describe document and its mutators.
//!
//! The describe call returns a self-describing document with three parts:
//! `reportMetadata` (what the report runs: columns, groupings, filters,
//! sort), `reportExtendedMetadata` (labels and data types for the selected
//! columns) and `reportTypeMetadata` (the full field catalog and the named
//! date durations). The same document, once mutated, is posted back as the
//! body of every run request, so every struct keeps unknown keys in an
//! `extra` map and serializes them back untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::Date;

use crate::error::ReportError;
use crate::filter::{increment_logic, FieldUpdate, FilterOperator, FilterSpec, FilterValue};
use crate::value::DataType;

type Extra = serde_json::Map<String, serde_json::Value>;

/// Deserialize `null` as the type's default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ──────────────────────────────────────────────
// Document structs
// ──────────────────────────────────────────────

/// Report layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFormat {
    #[default]
    Tabular,
    Summary,
    Matrix,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Tabular => f.write_str("TABULAR"),
            ReportFormat::Summary => f.write_str("SUMMARY"),
            ReportFormat::Matrix => f.write_str("MATRIX"),
        }
    }
}

/// Label and data type of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub label: String,
    pub data_type: DataType,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A grouping dimension declared in `groupingsDown` / `groupingsAcross`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingSpec {
    pub name: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One entry of `reportFilters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub column: String,
    pub operator: String,
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ReportFilter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        ReportFilter {
            column: column.into(),
            operator: operator.keyword().to_string(),
            value: value.into(),
            extra: Extra::new(),
        }
    }
}

/// The standard date filter. Absent bounds serialize as explicit nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDateFilter {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub duration_value: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub sort_column: String,
    pub sort_order: String,
}

/// `reportMetadata`: what the report runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    #[serde(default)]
    pub report_format: ReportFormat,
    #[serde(default, deserialize_with = "nullable")]
    pub detail_columns: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub aggregates: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub groupings_down: Vec<GroupingSpec>,
    #[serde(default, deserialize_with = "nullable")]
    pub groupings_across: Vec<GroupingSpec>,
    #[serde(default, deserialize_with = "nullable")]
    pub report_filters: Vec<ReportFilter>,
    #[serde(default)]
    pub report_boolean_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_date_filter: Option<StandardDateFilter>,
    #[serde(default)]
    pub sort_by: Option<Vec<SortSpec>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `reportExtendedMetadata`: labels and types of selected fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedMetadata {
    #[serde(default, deserialize_with = "nullable")]
    pub detail_column_info: BTreeMap<String, ColumnInfo>,
    #[serde(default, deserialize_with = "nullable")]
    pub aggregate_column_info: BTreeMap<String, ColumnInfo>,
    #[serde(default, deserialize_with = "nullable")]
    pub grouping_column_info: BTreeMap<String, ColumnInfo>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A section of the report type's field catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCategory {
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "nullable")]
    pub columns: BTreeMap<String, ColumnInfo>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A named date duration such as "Current FY".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedDuration {
    pub label: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub value: String,
}

/// A group of named durations ("Fiscal Year", "Calendar Month", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationGroup {
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "nullable")]
    pub standard_date_filter_durations: Vec<NamedDuration>,
}

/// `reportTypeMetadata`: every field the report type exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTypeCatalog {
    #[serde(default, deserialize_with = "nullable")]
    pub categories: Vec<FieldCategory>,
    #[serde(default, deserialize_with = "nullable")]
    pub standard_date_filter_duration_groups: Vec<DurationGroup>,
    #[serde(flatten)]
    pub extra: Extra,
}

// ──────────────────────────────────────────────
// ReportMetadata
// ──────────────────────────────────────────────

/// The whole describe document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    #[serde(default)]
    pub report_metadata: ReportDefinition,
    #[serde(default)]
    pub report_extended_metadata: ExtendedMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type_metadata: Option<ReportTypeCatalog>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ReportMetadata {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ReportError> {
        Ok(serde_json::from_value(value)?)
    }

    /// The request body for a run call.
    pub fn to_json(&self) -> Result<serde_json::Value, ReportError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn format(&self) -> ReportFormat {
        self.report_metadata.report_format
    }

    // ── Column resolution ────────────────────────────────────────────

    /// Selected columns in display order: `aggregates` for matrix reports,
    /// `detailColumns` otherwise.
    pub fn columns(&self) -> Vec<(&str, &ColumnInfo)> {
        let (order, infos) = match self.format() {
            ReportFormat::Matrix => (
                &self.report_metadata.aggregates,
                &self.report_extended_metadata.aggregate_column_info,
            ),
            _ => (
                &self.report_metadata.detail_columns,
                &self.report_extended_metadata.detail_column_info,
            ),
        };
        if order.is_empty() {
            return infos.iter().map(|(k, v)| (k.as_str(), v)).collect();
        }
        order
            .iter()
            .filter_map(|id| infos.get_key_value(id).map(|(k, v)| (k.as_str(), v)))
            .collect()
    }

    pub fn column_labels(&self) -> Vec<String> {
        self.columns().into_iter().map(|(_, i)| i.label.clone()).collect()
    }

    pub fn column_dtypes(&self) -> Vec<DataType> {
        self.columns()
            .into_iter()
            .map(|(_, i)| i.data_type.clone())
            .collect()
    }

    /// Fields reachable through the report's own selection, detail columns
    /// first, then aggregates, then groupings.
    fn selected_scope(&self) -> impl Iterator<Item = (&String, &ColumnInfo)> {
        let ext = &self.report_extended_metadata;
        ext.detail_column_info
            .iter()
            .chain(ext.aggregate_column_info.iter())
            .chain(ext.grouping_column_info.iter())
    }

    /// Every field of the report type's catalog.
    fn catalog_scope(&self) -> impl Iterator<Item = (&String, &ColumnInfo)> {
        self.report_type_metadata
            .iter()
            .flat_map(|t| t.categories.iter())
            .flat_map(|c| c.columns.iter())
    }

    /// Resolve a display label to its field id, preferring the selected
    /// columns over the full catalog.
    pub fn resolve_field_id(&self, label: &str) -> Result<String, ReportError> {
        self.selected_scope()
            .find(|(_, info)| info.label == label)
            .or_else(|| self.catalog_scope().find(|(_, info)| info.label == label))
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ReportError::UnknownColumn(label.to_string()))
    }

    /// Reverse of [`resolve_field_id`](Self::resolve_field_id).
    pub fn column_label(&self, field_id: &str) -> Result<String, ReportError> {
        self.lookup_field(field_id)
            .map(|info| info.label.clone())
            .ok_or_else(|| ReportError::UnknownColumn(field_id.to_string()))
    }

    fn lookup_field(&self, field_id: &str) -> Option<&ColumnInfo> {
        self.selected_scope()
            .find(|(id, _)| id.as_str() == field_id)
            .or_else(|| self.catalog_scope().find(|(id, _)| id.as_str() == field_id))
            .map(|(_, info)| info)
    }

    /// Data type of a field given either its id or its display label.
    pub fn resolve_dtype(&self, field: &str) -> Result<DataType, ReportError> {
        if let Some(info) = self.lookup_field(field) {
            return Ok(info.data_type.clone());
        }
        let id = self.resolve_field_id(field)?;
        self.lookup_field(&id)
            .map(|info| info.data_type.clone())
            .ok_or_else(|| ReportError::UnknownColumn(field.to_string()))
    }

    fn grouping_labels(&self, groupings: &[GroupingSpec]) -> Vec<String> {
        let info = &self.report_extended_metadata.grouping_column_info;
        groupings
            .iter()
            .map(|g| {
                info.get(&g.name)
                    .map(|i| i.label.clone())
                    .unwrap_or_else(|| g.name.clone())
            })
            .collect()
    }

    /// Display labels of the row grouping levels.
    pub fn grouping_labels_down(&self) -> Vec<String> {
        self.grouping_labels(&self.report_metadata.groupings_down)
    }

    /// Display labels of the column grouping levels.
    pub fn grouping_labels_across(&self) -> Vec<String> {
        self.grouping_labels(&self.report_metadata.groupings_across)
    }

    // ── Filters ──────────────────────────────────────────────────────

    pub fn filters(&self) -> &[ReportFilter] {
        &self.report_metadata.report_filters
    }

    /// Format a filter value for a field (id or label).
    pub fn format_value(&self, value: &FilterValue, field: &str) -> Result<String, ReportError> {
        let dtype = self.resolve_dtype(field)?;
        value.format(dtype.is_temporal())
    }

    /// Resolve, format and append each filter. Returns the position of the
    /// last appended filter.
    pub fn append_filters(&mut self, filters: &[FilterSpec]) -> Result<Option<usize>, ReportError> {
        let mut last = None;
        for spec in filters {
            let field_id = self.resolve_field_id(&spec.column)?;
            let operator: FilterOperator = spec.operator.parse()?;
            let value = self.format_value(&spec.value, &field_id)?;
            last = Some(self.push_filter(ReportFilter::new(field_id, operator, value))?);
        }
        Ok(last)
    }

    /// Append an already formatted filter and extend the boolean filter, if
    /// there is one, to cover it. Returns the filter's position.
    pub fn push_filter(&mut self, filter: ReportFilter) -> Result<usize, ReportError> {
        self.increment_boolean_filter()?;
        self.report_metadata.report_filters.push(filter);
        Ok(self.report_metadata.report_filters.len() - 1)
    }

    /// Replace the value of the filter at `position`.
    pub fn set_filter_value(&mut self, position: usize, value: String) -> Result<(), ReportError> {
        let filter = self
            .report_metadata
            .report_filters
            .get_mut(position)
            .ok_or_else(|| {
                ReportError::MalformedPayload(format!("no report filter at position {}", position))
            })?;
        filter.value = value;
        Ok(())
    }

    pub fn boolean_filter(&self) -> Option<&str> {
        self.report_metadata.report_boolean_filter.as_deref()
    }

    pub fn set_boolean_filter(&mut self, logic: impl Into<String>) {
        self.report_metadata.report_boolean_filter = Some(logic.into());
    }

    /// AND one more clause onto a non-empty boolean filter.
    pub fn increment_boolean_filter(&mut self) -> Result<(), ReportError> {
        if let Some(logic) = self.report_metadata.report_boolean_filter.as_mut() {
            if !logic.trim().is_empty() {
                *logic = increment_logic(logic)?;
            }
        }
        Ok(())
    }

    // ── Date filter ──────────────────────────────────────────────────

    pub fn date_filter(&self) -> Option<&StandardDateFilter> {
        self.report_metadata.standard_date_filter.as_ref()
    }

    /// Switch the standard date filter to a custom range. Each part is
    /// updated independently; `Clear` writes an explicit null.
    pub fn set_date_range(
        &mut self,
        start: FieldUpdate<Date>,
        end: FieldUpdate<Date>,
        column: FieldUpdate<&str>,
    ) -> Result<(), ReportError> {
        let column = match column {
            FieldUpdate::Set(label) => FieldUpdate::Set(self.resolve_field_id(label)?),
            FieldUpdate::Clear => FieldUpdate::Clear,
            FieldUpdate::Keep => FieldUpdate::Keep,
        };
        let filter = self
            .report_metadata
            .standard_date_filter
            .get_or_insert_with(StandardDateFilter::default);
        filter.duration_value = "CUSTOM".to_string();
        apply(&mut filter.column, column);
        apply(&mut filter.start_date, map_update(start, iso_date));
        apply(&mut filter.end_date, map_update(end, iso_date));
        Ok(())
    }

    /// Named durations from the report type, keyed by label.
    pub fn duration_catalog(&self) -> BTreeMap<String, NamedDuration> {
        self.report_type_metadata
            .iter()
            .flat_map(|t| t.standard_date_filter_duration_groups.iter())
            .flat_map(|g| g.standard_date_filter_durations.iter())
            .map(|d| (d.label.clone(), d.clone()))
            .collect()
    }

    /// Apply a named duration such as "Current FY".
    pub fn set_named_duration(&mut self, label: &str) -> Result<(), ReportError> {
        let duration = self
            .duration_catalog()
            .remove(label)
            .ok_or_else(|| ReportError::UnknownDuration(label.to_string()))?;
        let filter = self
            .report_metadata
            .standard_date_filter
            .get_or_insert_with(StandardDateFilter::default);
        filter.duration_value = duration.value;
        filter.start_date = duration.start_date;
        filter.end_date = duration.end_date;
        Ok(())
    }

    // ── Sort ─────────────────────────────────────────────────────────

    pub fn sort_by(&self) -> Option<&[SortSpec]> {
        self.report_metadata.sort_by.as_deref()
    }

    /// Sort by one column, `asc` or `desc` in any case.
    pub fn set_sort(&mut self, column: &str, direction: &str) -> Result<(), ReportError> {
        let sort_order = match direction.to_ascii_lowercase().as_str() {
            "asc" => "Asc",
            "desc" => "Desc",
            _ => return Err(ReportError::InvalidOrientation(direction.to_string())),
        };
        let sort_column = self.resolve_field_id(column)?;
        self.report_metadata.sort_by = Some(vec![SortSpec {
            sort_column,
            sort_order: sort_order.to_string(),
        }]);
        Ok(())
    }
}

fn apply<T>(slot: &mut Option<T>, update: FieldUpdate<T>) {
    match update {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => *slot = None,
        FieldUpdate::Set(v) => *slot = Some(v),
    }
}

fn map_update<T, U>(update: FieldUpdate<T>, f: impl FnOnce(T) -> U) -> FieldUpdate<U> {
    match update {
        FieldUpdate::Keep => FieldUpdate::Keep,
        FieldUpdate::Clear => FieldUpdate::Clear,
        FieldUpdate::Set(v) => FieldUpdate::Set(f(v)),
    }
}

fn iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
