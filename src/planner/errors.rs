//! Planner error types
//!
//! Every failure here is an invalid request: rejected at preparation time,
//! never retried, surfaced verbatim to the caller. Each variant carries a
//! stable machine-readable code.
//!
//! Empty scan results are not errors; see `range_or_slice_eq_null`.

use thiserror::Error;

/// Result type for planner operations
pub type RestrictionResult<T> = Result<T, RestrictionError>;

/// Invalid-request rejections raised during classification or range
/// computation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RestrictionError {
    /// The predicate references a column the schema does not define
    #[error("Undefined column '{column}' in restriction")]
    UnknownColumn {
        /// Offending column name
        column: String,
    },

    /// The operator cannot apply to the column's type
    #[error("Operator {op} is not supported on column '{column}' of type {type_name}")]
    UnsupportedOperator {
        /// Offending column name
        column: String,
        /// Operator symbol
        op: String,
        /// Column type name
        type_name: String,
    },

    /// A token restriction must name the full partition key in order
    #[error("Token restriction must apply to the full partition key in schema order")]
    TokenColumnsMismatch,

    /// Token and per-column partition restrictions cannot be combined
    #[error("Columns of the partition key cannot be restricted by both a token comparison and a column comparison")]
    TokenWithColumnRestrictions,

    /// Malformed token restriction (duplicate bounds, unsupported operator)
    #[error("Invalid token restriction: {reason}")]
    InvalidTokenRestriction {
        /// What made the restriction invalid
        reason: String,
    },

    /// A token bound resolved to null
    #[error("Invalid null token value")]
    NullTokenValue,

    /// A token bound resolved to a non-integer value
    #[error("Token values must be integers")]
    InvalidTokenValue,

    /// A tuple references columns of different kinds
    #[error("Tuple restriction mixes column kinds: ({columns})")]
    MixedTuple {
        /// Offending tuple rendering
        columns: String,
    },

    /// Tuple columns are not consecutive in clustering order
    #[error("Tuple restriction columns must be consecutive clustering columns in key order: ({columns})")]
    TupleOrder {
        /// Offending tuple rendering
        columns: String,
    },

    /// A partition-key tuple supports equality only
    #[error("Tuple restrictions on partition-key columns support only equality")]
    PartitionTupleUnsupported,

    /// IS NOT NULL outside a view statement
    #[error("IS NOT NULL on column '{column}' is only supported for view statements")]
    NotNullUnsupported {
        /// Offending column name
        column: String,
    },

    /// IS NOT NULL on a column already guaranteed non-null
    #[error("IS NOT NULL on column '{column}' is redundant: the column can never be null here")]
    NotNullRedundant {
        /// Offending column name
        column: String,
    },

    /// IS NOT NULL combined with another restriction on the same column
    #[error("Column '{column}' cannot combine IS NOT NULL with another restriction")]
    NotNullConflict {
        /// Offending column name
        column: String,
    },

    /// Partition column restricted by something other than a single eq/in
    #[error("Only equality and IN restrictions are supported on partition-key column '{column}' (unless using token comparisons, a supporting index, or filtering)")]
    PartitionNonExact {
        /// Offending column name
        column: String,
    },

    /// Partition key restricted only partially
    #[error("Partition-key column '{column}' is unrestricted while other partition columns are restricted; this requires a supporting index or filtering")]
    PartitionPartial {
        /// First unrestricted column
        column: String,
    },

    /// Clustering restrictions violate the prefix shape
    #[error("Invalid clustering-key restrictions: {reason}")]
    ClusteringShape {
        /// What broke the prefix shape
        reason: String,
    },

    /// The query needs filtering but filtering was not allowed
    #[error("This query requires filtering of unindexed data; retry with filtering allowed if degraded performance is acceptable")]
    FilteringRequired,

    /// Regular-column restrictions on a non-select statement
    #[error("Restrictions on regular columns are only supported for select statements")]
    NonSelectRegularRestriction,

    /// Index use conflicts with a static-only projection
    #[error("Queries that select only static columns cannot use an index that requires clustering-row context")]
    StaticProjectionWithIndex,

    /// A bound-variable marker had no value at range computation
    #[error("No value bound for marker ?{marker}")]
    UnresolvedMarker {
        /// Marker position
        marker: usize,
    },

    /// Index-table preparation failed or was used with the wrong variant
    #[error("Index-table preparation error: {reason}")]
    IndexPreparation {
        /// What went wrong
        reason: String,
    },
}

impl RestrictionError {
    /// Returns the stable machine-readable code for this rejection
    pub fn code(&self) -> &'static str {
        match self {
            RestrictionError::UnknownColumn { .. } => "KP_UNKNOWN_COLUMN",
            RestrictionError::UnsupportedOperator { .. } => "KP_UNSUPPORTED_OPERATOR",
            RestrictionError::TokenColumnsMismatch => "KP_TOKEN_COLUMNS",
            RestrictionError::TokenWithColumnRestrictions => "KP_TOKEN_MIXED",
            RestrictionError::InvalidTokenRestriction { .. } => "KP_TOKEN_INVALID",
            RestrictionError::NullTokenValue => "KP_TOKEN_NULL",
            RestrictionError::InvalidTokenValue => "KP_TOKEN_TYPE",
            RestrictionError::MixedTuple { .. } => "KP_TUPLE_MIXED",
            RestrictionError::TupleOrder { .. } => "KP_TUPLE_ORDER",
            RestrictionError::PartitionTupleUnsupported => "KP_TUPLE_PARTITION",
            RestrictionError::NotNullUnsupported { .. } => "KP_NOT_NULL_UNSUPPORTED",
            RestrictionError::NotNullRedundant { .. } => "KP_NOT_NULL_REDUNDANT",
            RestrictionError::NotNullConflict { .. } => "KP_NOT_NULL_CONFLICT",
            RestrictionError::PartitionNonExact { .. } => "KP_PK_SHAPE",
            RestrictionError::PartitionPartial { .. } => "KP_PK_PARTIAL",
            RestrictionError::ClusteringShape { .. } => "KP_CK_SHAPE",
            RestrictionError::FilteringRequired => "KP_FILTERING_REQUIRED",
            RestrictionError::NonSelectRegularRestriction => "KP_STMT_KIND",
            RestrictionError::StaticProjectionWithIndex => "KP_STATIC_INDEX",
            RestrictionError::UnresolvedMarker { .. } => "KP_UNBOUND_MARKER",
            RestrictionError::IndexPreparation { .. } => "KP_INDEX_PREP",
        }
    }
}
