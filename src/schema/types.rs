//! Schema type definitions
//!
//! Supported native types:
//! - text: UTF-8 string
//! - int: 64-bit signed integer
//! - double: 64-bit floating point
//! - boolean: Boolean
//! - blob: raw bytes
//! - list / set / map: collections with typed elements

use serde::{Deserialize, Serialize};

/// Supported column types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NativeType {
    /// UTF-8 string
    Text,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Double,
    /// Boolean
    Boolean,
    /// Raw bytes
    Blob,
    /// Ordered collection with a single element type
    List {
        /// Element type (boxed to allow nesting)
        element: Box<NativeType>,
    },
    /// Unordered unique collection with a single element type
    Set {
        /// Element type
        element: Box<NativeType>,
    },
    /// Key/value collection
    Map {
        /// Key type
        key: Box<NativeType>,
        /// Value type
        value: Box<NativeType>,
    },
}

impl NativeType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeType::Text => "text",
            NativeType::Int => "int",
            NativeType::Double => "double",
            NativeType::Boolean => "boolean",
            NativeType::Blob => "blob",
            NativeType::List { .. } => "list",
            NativeType::Set { .. } => "set",
            NativeType::Map { .. } => "map",
        }
    }

    /// Returns true for list, set, and map types
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            NativeType::List { .. } | NativeType::Set { .. } | NativeType::Map { .. }
        )
    }

    /// Returns true for map types
    pub fn is_map(&self) -> bool {
        matches!(self, NativeType::Map { .. })
    }

    /// Returns true for the text type
    pub fn is_text(&self) -> bool {
        matches!(self, NativeType::Text)
    }

    /// Convenience constructor for a list type
    pub fn list(element: NativeType) -> Self {
        NativeType::List {
            element: Box::new(element),
        }
    }

    /// Convenience constructor for a set type
    pub fn set(element: NativeType) -> Self {
        NativeType::Set {
            element: Box::new(element),
        }
    }

    /// Convenience constructor for a map type
    pub fn map(key: NativeType, value: NativeType) -> Self {
        NativeType::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }
}

/// Where a column sits in the table's key structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Determines which node/shard owns the row
    PartitionKey,
    /// Determines row order within a partition
    ClusteringKey,
    /// Any other column
    Regular,
}

impl ColumnKind {
    /// Returns the kind name for error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::PartitionKey => "partition key",
            ColumnKind::ClusteringKey => "clustering key",
            ColumnKind::Regular => "regular",
        }
    }
}

/// A single column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Column data type
    pub column_type: NativeType,
    /// Whether the column is static (shared by all rows of a partition).
    /// Only meaningful for regular columns.
    pub is_static: bool,
}

impl ColumnDef {
    /// Creates a non-static column definition
    pub fn new(name: impl Into<String>, column_type: NativeType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_static: false,
        }
    }

    /// Creates a static column definition
    pub fn new_static(name: impl Into<String>, column_type: NativeType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_static: true,
        }
    }
}

/// Table schema: ordered key columns plus regular columns.
///
/// Built once and treated as immutable by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    name: String,
    /// Partition-key columns, in key order
    partition_key: Vec<ColumnDef>,
    /// Clustering-key columns, in key order
    clustering_key: Vec<ColumnDef>,
    /// Regular (and static) columns
    regular: Vec<ColumnDef>,
}

impl TableSchema {
    /// Creates an empty schema for the given table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: Vec::new(),
            clustering_key: Vec::new(),
            regular: Vec::new(),
        }
    }

    /// Appends a partition-key column
    pub fn with_partition_key(mut self, name: impl Into<String>, column_type: NativeType) -> Self {
        self.partition_key.push(ColumnDef::new(name, column_type));
        self
    }

    /// Appends a clustering-key column
    pub fn with_clustering_key(mut self, name: impl Into<String>, column_type: NativeType) -> Self {
        self.clustering_key.push(ColumnDef::new(name, column_type));
        self
    }

    /// Adds a regular column
    pub fn with_column(mut self, name: impl Into<String>, column_type: NativeType) -> Self {
        self.regular.push(ColumnDef::new(name, column_type));
        self
    }

    /// Adds a static column
    pub fn with_static_column(mut self, name: impl Into<String>, column_type: NativeType) -> Self {
        self.regular.push(ColumnDef::new_static(name, column_type));
        self
    }

    /// Returns the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the partition-key columns in key order
    pub fn partition_key(&self) -> &[ColumnDef] {
        &self.partition_key
    }

    /// Returns the clustering-key columns in key order
    pub fn clustering_key(&self) -> &[ColumnDef] {
        &self.clustering_key
    }

    /// Returns the regular (and static) columns
    pub fn regular_columns(&self) -> &[ColumnDef] {
        &self.regular
    }

    /// Looks up a column definition by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .chain(self.regular.iter())
            .find(|c| c.name == name)
    }

    /// Returns the kind of the named column, if it exists
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        if self.partition_key.iter().any(|c| c.name == name) {
            Some(ColumnKind::PartitionKey)
        } else if self.clustering_key.iter().any(|c| c.name == name) {
            Some(ColumnKind::ClusteringKey)
        } else if self.regular.iter().any(|c| c.name == name) {
            Some(ColumnKind::Regular)
        } else {
            None
        }
    }

    /// Returns the position of a column within the partition key
    pub fn partition_position(&self, name: &str) -> Option<usize> {
        self.partition_key.iter().position(|c| c.name == name)
    }

    /// Returns the position of a column within the clustering key
    pub fn clustering_position(&self, name: &str) -> Option<usize> {
        self.clustering_key.iter().position(|c| c.name == name)
    }

    /// Returns true if the named column is static
    pub fn is_static(&self, name: &str) -> bool {
        self.regular
            .iter()
            .any(|c| c.name == name && c.is_static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> TableSchema {
        TableSchema::new("events")
            .with_partition_key("tenant", NativeType::Text)
            .with_partition_key("day", NativeType::Int)
            .with_clustering_key("bucket", NativeType::Int)
            .with_clustering_key("seq", NativeType::Int)
            .with_column("payload", NativeType::Blob)
            .with_static_column("owner", NativeType::Text)
    }

    #[test]
    fn test_column_kind_lookup() {
        let schema = sample_schema();
        assert_eq!(schema.column_kind("tenant"), Some(ColumnKind::PartitionKey));
        assert_eq!(schema.column_kind("seq"), Some(ColumnKind::ClusteringKey));
        assert_eq!(schema.column_kind("payload"), Some(ColumnKind::Regular));
        assert_eq!(schema.column_kind("missing"), None);
    }

    #[test]
    fn test_key_positions() {
        let schema = sample_schema();
        assert_eq!(schema.partition_position("day"), Some(1));
        assert_eq!(schema.clustering_position("bucket"), Some(0));
        assert_eq!(schema.clustering_position("tenant"), None);
    }

    #[test]
    fn test_static_flag() {
        let schema = sample_schema();
        assert!(schema.is_static("owner"));
        assert!(!schema.is_static("payload"));
        assert!(!schema.is_static("tenant"));
    }

    #[test]
    fn test_collection_types() {
        let tags = NativeType::set(NativeType::Text);
        assert!(tags.is_collection());
        assert!(!tags.is_map());

        let attrs = NativeType::map(NativeType::Text, NativeType::Int);
        assert!(attrs.is_map());
        assert_eq!(attrs.type_name(), "map");
    }
}
