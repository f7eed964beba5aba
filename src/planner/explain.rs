//! Diagnostics rendering of classified restrictions
//!
//! Produces a deterministic, human-readable summary plus a JSON form for
//! structured logs.

use std::fmt;

use serde::Serialize;

use super::restrictions::QueryRestrictions;

/// A rendering-friendly snapshot of one classified statement
#[derive(Debug, Clone, Serialize)]
pub struct RestrictionsSummary {
    /// Table name
    pub table: String,
    /// Partition restrictions, token included, rendered per atom
    pub partition: Vec<String>,
    /// Clustering prefix elements, in order
    pub clustering_prefix: Vec<String>,
    /// Clustering atoms outside the prefix
    pub clustering_residual: Vec<String>,
    /// Regular-column restrictions, rendered per column conjunction
    pub regular: Vec<String>,
    /// Columns carrying IS NOT NULL
    pub not_null: Vec<String>,
    /// Whether a partition range (vs enumerated keys) is scanned
    pub is_key_range: bool,
    /// The chosen index, if any
    pub chosen_index: Option<String>,
    /// The restriction justifying the chosen index
    pub index_restriction: Option<String>,
    /// Whether row filtering is required
    pub needs_filtering: bool,
    /// Columns the filtering phase re-checks
    pub filtered_columns: Vec<String>,
}

impl RestrictionsSummary {
    /// Builds the summary from a classified statement
    pub fn new(restrictions: &QueryRestrictions) -> Self {
        Self {
            table: restrictions.schema().name().to_string(),
            partition: restrictions
                .partition_key_restrictions()
                .atoms()
                .iter()
                .map(|a| a.to_string())
                .collect(),
            clustering_prefix: restrictions
                .clustering_key_restrictions()
                .prefix()
                .iter()
                .map(|e| e.to_string())
                .collect(),
            clustering_residual: restrictions
                .clustering_key_restrictions()
                .residual()
                .iter()
                .map(|a| a.to_string())
                .collect(),
            regular: restrictions
                .non_primary_key_restrictions()
                .values()
                .map(|r| r.to_string())
                .collect(),
            not_null: restrictions.not_null_columns().iter().cloned().collect(),
            is_key_range: restrictions.is_key_range(),
            chosen_index: restrictions
                .chosen_index()
                .map(|c| c.index.name().to_string()),
            index_restriction: restrictions
                .chosen_index()
                .map(|c| c.restriction.to_string()),
            needs_filtering: restrictions.need_filtering(),
            filtered_columns: restrictions
                .get_column_defs_for_filtering()
                .iter()
                .map(|d| d.name.clone())
                .collect(),
        }
    }

    /// The JSON form used by structured logs
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for RestrictionsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== RESTRICTIONS [{}] ===", self.table)?;
        let list = |f: &mut fmt::Formatter<'_>, label: &str, items: &[String]| -> fmt::Result {
            if items.is_empty() {
                return Ok(());
            }
            writeln!(f, "{}:", label)?;
            for item in items {
                writeln!(f, "  - {}", item)?;
            }
            Ok(())
        };
        list(f, "Partition", &self.partition)?;
        list(f, "Clustering prefix", &self.clustering_prefix)?;
        list(f, "Clustering (filtered)", &self.clustering_residual)?;
        list(f, "Regular", &self.regular)?;
        list(f, "Not null", &self.not_null)?;
        writeln!(
            f,
            "Scan: {}",
            if self.is_key_range {
                "key range"
            } else {
                "enumerated partitions"
            }
        )?;
        if let Some(index) = &self.chosen_index {
            match &self.index_restriction {
                Some(restriction) => writeln!(f, "Index: {} via {}", index, restriction)?,
                None => writeln!(f, "Index: {}", index)?,
            }
        }
        writeln!(
            f,
            "Filtering: {}",
            if self.needs_filtering {
                "required"
            } else {
                "not required"
            }
        )?;
        if !self.filtered_columns.is_empty() {
            writeln!(f, "Filtered columns: {}", self.filtered_columns.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for QueryRestrictions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", RestrictionsSummary::new(self))
    }
}
