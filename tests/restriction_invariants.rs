//! Classification invariants
//!
//! A classified statement never under-restricts and never over-claims: every
//! degradation to indexing or filtering is explicit, and every invalid shape
//! is rejected at preparation time.

use std::sync::Arc;

use keyplan::expr::{Atom, Bindings, Operator, Value};
use keyplan::index::{EqualityIndex, IndexCatalog, IndexDef, IndexKind, OrderedIndex};
use keyplan::planner::{
    ClassifyOptions, QueryRestrictions, RestrictionError, StatementKind,
};
use keyplan::schema::{NativeType, TableSchema};

fn schema() -> Arc<TableSchema> {
    Arc::new(
        TableSchema::new("events")
            .with_partition_key("a", NativeType::Int)
            .with_clustering_key("b", NativeType::Int)
            .with_clustering_key("c", NativeType::Int)
            .with_column("d", NativeType::Text)
            .with_static_column("owner", NativeType::Text),
    )
}

fn classify(atoms: Vec<Atom>) -> Result<QueryRestrictions, RestrictionError> {
    QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        atoms,
        &IndexCatalog::new(),
        ClassifyOptions::default(),
    )
}

fn classify_filtering(atoms: Vec<Atom>) -> Result<QueryRestrictions, RestrictionError> {
    QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        atoms,
        &IndexCatalog::new(),
        ClassifyOptions {
            allow_filtering: true,
            ..ClassifyOptions::default()
        },
    )
}

#[test]
fn clean_prefix_scans_without_filtering() {
    let restrictions = classify(vec![
        Atom::eq("a", Value::Int(1)),
        Atom::eq("b", Value::Int(2)),
        Atom::gt("c", Value::Int(5)),
    ])
    .unwrap();
    assert!(!restrictions.is_key_range());
    assert!(!restrictions.uses_secondary_indexing());
    assert!(!restrictions.ck_restrictions_need_filtering());
    assert!(!restrictions.need_filtering());

    let ranges = restrictions.get_clustering_bounds(&Bindings::none()).unwrap();
    assert_eq!(ranges.len(), 1);
    let start = ranges[0].start.as_ref().unwrap();
    assert_eq!(start.prefix, vec![Value::Int(2), Value::Int(5)]);
    assert!(!start.inclusive);
    let end = ranges[0].end.as_ref().unwrap();
    assert_eq!(end.prefix, vec![Value::Int(2)]);
    assert!(end.inclusive);
}

#[test]
fn skipping_a_clustering_column_is_rejected() {
    let err = classify(vec![Atom::eq("a", Value::Int(1)), Atom::gt("c", Value::Int(5))])
        .unwrap_err();
    assert!(matches!(err, RestrictionError::ClusteringShape { .. }));

    // filtering permission turns the rejection into a degradation
    let restrictions =
        classify_filtering(vec![Atom::eq("a", Value::Int(1)), Atom::gt("c", Value::Int(5))])
            .unwrap();
    assert!(restrictions.ck_restrictions_need_filtering());
    assert!(restrictions.need_filtering());
}

#[test]
fn bounded_range_before_last_restricted_column_is_rejected() {
    let err = classify(vec![
        Atom::eq("a", Value::Int(1)),
        Atom::gt("b", Value::Int(2)),
        Atom::eq("c", Value::Int(5)),
    ])
    .unwrap_err();
    assert!(matches!(err, RestrictionError::ClusteringShape { .. }));
}

#[test]
fn two_bounds_same_direction_are_rejected() {
    let err = classify(vec![
        Atom::eq("a", Value::Int(1)),
        Atom::gt("b", Value::Int(2)),
        Atom::gte("b", Value::Int(3)),
    ])
    .unwrap_err();
    assert!(matches!(err, RestrictionError::ClusteringShape { .. }));
}

#[test]
fn membership_prefix_enumerates_ranges() {
    let restrictions = classify(vec![
        Atom::eq("a", Value::Int(1)),
        Atom::in_list("b", vec![Value::Int(2), Value::Int(3)]),
        Atom::eq("c", Value::Int(5)),
    ])
    .unwrap();
    assert!(!restrictions.need_filtering());
    let ranges = restrictions.get_clustering_bounds(&Bindings::none()).unwrap();
    assert_eq!(ranges.len(), 2);
    assert_eq!(
        ranges[0].start.as_ref().unwrap().prefix,
        vec![Value::Int(2), Value::Int(5)]
    );
    assert_eq!(
        ranges[1].start.as_ref().unwrap().prefix,
        vec![Value::Int(3), Value::Int(5)]
    );
}

#[test]
fn indexed_regular_column_avoids_filtering() {
    let catalog = IndexCatalog::new().with_index(IndexDef::new(
        "d_idx",
        "d",
        IndexKind::Global,
        EqualityIndex,
    ));
    let restrictions = QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        vec![Atom::eq("a", Value::Int(1)), Atom::eq("d", Value::text("x"))],
        &catalog,
        ClassifyOptions::default(),
    )
    .unwrap();
    assert!(restrictions.uses_secondary_indexing());
    assert!(!restrictions.need_filtering());
    assert_eq!(restrictions.chosen_index().unwrap().index.name(), "d_idx");
}

#[test]
fn unindexed_regular_column_requires_permission() {
    let err = classify(vec![Atom::eq("a", Value::Int(1)), Atom::eq("d", Value::text("x"))])
        .unwrap_err();
    assert_eq!(err, RestrictionError::FilteringRequired);

    let restrictions =
        classify_filtering(vec![Atom::eq("a", Value::Int(1)), Atom::eq("d", Value::text("x"))])
            .unwrap();
    assert!(!restrictions.uses_secondary_indexing());
    assert!(restrictions.need_filtering());
}

#[test]
fn partial_partition_key_requires_index_or_permission() {
    let two_part = Arc::new(
        TableSchema::new("pairs")
            .with_partition_key("p1", NativeType::Int)
            .with_partition_key("p2", NativeType::Int)
            .with_column("v", NativeType::Int),
    );
    let err = QueryRestrictions::classify(
        two_part.clone(),
        StatementKind::Select,
        vec![Atom::eq("p1", Value::Int(1))],
        &IndexCatalog::new(),
        ClassifyOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RestrictionError::PartitionPartial { .. }));

    let catalog = IndexCatalog::new().with_index(IndexDef::new(
        "p1_idx",
        "p1",
        IndexKind::Global,
        EqualityIndex,
    ));
    let restrictions = QueryRestrictions::classify(
        two_part,
        StatementKind::Select,
        vec![Atom::eq("p1", Value::Int(1))],
        &catalog,
        ClassifyOptions::default(),
    )
    .unwrap();
    assert!(restrictions.uses_secondary_indexing());
    assert!(restrictions.is_key_range());
}

#[test]
fn partition_range_requires_exact_restrictions() {
    let err = classify(vec![Atom::gt("a", Value::Int(1))]).unwrap_err();
    assert!(matches!(err, RestrictionError::PartitionNonExact { .. }));

    let restrictions = classify_filtering(vec![Atom::gt("a", Value::Int(1))]).unwrap();
    assert!(restrictions.is_key_range());
    assert!(restrictions.pk_restrictions_need_filtering());
}

#[test]
fn token_and_column_restrictions_cannot_mix() {
    let err = classify(vec![
        Atom::token(vec!["a".into()], Operator::Gt, Value::Int(5).into()),
        Atom::eq("a", Value::Int(1)),
    ])
    .unwrap_err();
    assert_eq!(err, RestrictionError::TokenWithColumnRestrictions);
}

#[test]
fn token_restriction_is_a_key_range() {
    let restrictions = classify(vec![Atom::token(
        vec!["a".into()],
        Operator::Gt,
        Value::Int(5).into(),
    )])
    .unwrap();
    assert!(restrictions.is_key_range());
    assert!(restrictions.has_token_restrictions());
    assert!(!restrictions.pk_restrictions_need_filtering());
}

#[test]
fn unknown_column_is_rejected() {
    let err = classify(vec![Atom::eq("nope", Value::Int(1))]).unwrap_err();
    assert!(matches!(err, RestrictionError::UnknownColumn { .. }));
}

#[test]
fn operator_type_mismatches_are_rejected() {
    // containment on a scalar
    let err = classify(vec![Atom::contains("d", Value::text("x"))]).unwrap_err();
    assert!(matches!(err, RestrictionError::UnsupportedOperator { .. }));
    // pattern match on a non-text column
    let err = classify(vec![Atom::like("a", "x%")]).unwrap_err();
    assert!(matches!(err, RestrictionError::UnsupportedOperator { .. }));
}

#[test]
fn is_not_null_rules() {
    // only view statements may use IS NOT NULL
    let err = classify(vec![Atom::is_not_null("d")]).unwrap_err();
    assert!(matches!(err, RestrictionError::NotNullUnsupported { .. }));

    let view = ClassifyOptions {
        for_view: true,
        ..ClassifyOptions::default()
    };
    let restrictions = QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        vec![Atom::is_not_null("d")],
        &IndexCatalog::new(),
        view,
    )
    .unwrap();
    assert!(restrictions.is_restricted("d"));

    // combined with another restriction on the same column
    let err = QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        vec![Atom::is_not_null("d"), Atom::eq("d", Value::text("x"))],
        &IndexCatalog::new(),
        view,
    )
    .unwrap_err();
    assert!(matches!(err, RestrictionError::NotNullConflict { .. }));

    // the partition key can never be null
    let err = QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        vec![Atom::is_not_null("a")],
        &IndexCatalog::new(),
        view,
    )
    .unwrap_err();
    assert!(matches!(err, RestrictionError::NotNullRedundant { .. }));
}

#[test]
fn non_select_statements_reject_regular_restrictions() {
    let err = QueryRestrictions::classify(
        schema(),
        StatementKind::Update,
        vec![
            Atom::eq("a", Value::Int(1)),
            Atom::eq("b", Value::Int(2)),
            Atom::eq("c", Value::Int(3)),
            Atom::eq("d", Value::text("x")),
        ],
        &IndexCatalog::new(),
        ClassifyOptions {
            allow_filtering: true,
            ..ClassifyOptions::default()
        },
    )
    .unwrap_err();
    assert_eq!(err, RestrictionError::NonSelectRegularRestriction);
}

#[test]
fn update_with_full_key_classifies() {
    let restrictions = QueryRestrictions::classify(
        schema(),
        StatementKind::Update,
        vec![
            Atom::eq("a", Value::Int(1)),
            Atom::eq("b", Value::Int(2)),
            Atom::eq("c", Value::Int(3)),
        ],
        &IndexCatalog::new(),
        ClassifyOptions::default(),
    )
    .unwrap();
    assert!(!restrictions.is_key_range());
    assert!(!restrictions.need_filtering());
}

#[test]
fn mixed_tuple_kinds_are_rejected() {
    let err = classify(vec![Atom::tuple_eq(
        vec!["a".into(), "b".into()],
        vec![Value::Int(1), Value::Int(2)],
    )])
    .unwrap_err();
    assert!(matches!(err, RestrictionError::MixedTuple { .. }));
}

#[test]
fn mixed_single_and_multi_clustering_restrictions_degrade() {
    let atoms = vec![
        Atom::eq("a", Value::Int(1)),
        Atom::eq("b", Value::Int(2)),
        Atom::tuple_slice(
            vec!["b".into(), "c".into()],
            Operator::Gt,
            vec![Value::Int(2), Value::Int(3)],
        ),
    ];
    let err = classify(atoms.clone()).unwrap_err();
    assert!(matches!(err, RestrictionError::ClusteringShape { .. }));

    let restrictions = classify_filtering(atoms).unwrap();
    assert!(restrictions.ck_restrictions_need_filtering());
}

#[test]
fn accessor_helpers_reflect_buckets() {
    let restrictions = classify_filtering(vec![
        Atom::in_list("a", vec![Value::Int(1), Value::Int(2)]),
        Atom::eq("b", Value::Int(2)),
        Atom::eq("d", Value::text("x")),
    ])
    .unwrap();
    assert!(restrictions.key_is_in_relation());
    assert!(!restrictions.partition_key_restrictions_is_all_eq());
    assert_eq!(restrictions.partition_key_restrictions_size(), 1);
    assert!(restrictions.has_clustering_columns_restriction());
    assert!(restrictions.has_non_primary_key_restriction());
    assert!(restrictions.has_unrestricted_clustering_columns());
    assert!(!restrictions.has_partition_key_unrestricted_components());
    assert!(restrictions.is_restricted("d"));
    assert!(!restrictions.is_restricted("owner"));
    assert!(restrictions.has_eq_restriction_on_column("b"));
    assert!(!restrictions.has_eq_restriction_on_column("a"));
    assert!(restrictions.clustering_key_restrictions_has_only_eq());
    assert!(!restrictions.clustering_key_restrictions_has_in());
    assert!(!restrictions.partition_range_is_simple());
}

#[test]
fn classification_is_deterministic() {
    let catalog = IndexCatalog::new()
        .with_index(IndexDef::new("d_idx", "d", IndexKind::Global, EqualityIndex))
        .with_index(IndexDef::new("d_ord", "d", IndexKind::Global, OrderedIndex));
    let atoms = vec![Atom::eq("a", Value::Int(1)), Atom::eq("d", Value::text("x"))];
    let first = QueryRestrictions::classify(
        schema(),
        StatementKind::Select,
        atoms.clone(),
        &catalog,
        ClassifyOptions::default(),
    )
    .unwrap();
    for _ in 0..10 {
        let again = QueryRestrictions::classify(
            schema(),
            StatementKind::Select,
            atoms.clone(),
            &catalog,
            ClassifyOptions::default(),
        )
        .unwrap();
        assert_eq!(
            first.chosen_index().unwrap().index.name(),
            again.chosen_index().unwrap().index.name()
        );
        assert_eq!(first.need_filtering(), again.need_filtering());
    }
}
