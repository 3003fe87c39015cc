//! Planning pipeline coverage: classification, query synthesis, and the
//! attribute mapping, driven through the public adapter surface.

use std::sync::Arc;

use stratus::catalog::{InMemoryCatalog, ServerOptions};
use stratus::expr::{Expr, Restriction};
use stratus::host::{AttrDesc, RelationDesc};
use stratus::remote::memory::MemoryEngine;
use stratus::remote::ColumnDesc;
use stratus::types::{AttrNum, TableId};
use stratus::value::{LocalType, RemoteType};
use stratus::HiveFdw;

fn people() -> RelationDesc {
    RelationDesc::new(
        42,
        "people",
        vec![
            AttrDesc::new(1, "name", LocalType::Text),
            AttrDesc::new(2, "age", LocalType::Int4),
            AttrDesc::new(3, "city", LocalType::Text),
            AttrDesc::new(4, "score", LocalType::Float8),
        ],
    )
}

fn fixture() -> (MemoryEngine, HiveFdw) {
    let engine = MemoryEngine::new().with_table(
        "people",
        vec![
            ColumnDesc::new("name", RemoteType::String),
            ColumnDesc::new("age", RemoteType::Int),
            ColumnDesc::new("city", RemoteType::String),
            ColumnDesc::new("score", RemoteType::Double),
        ],
        &[
            &[Some("ada"), Some("36"), Some("london"), Some("9.5")],
            &[Some("grace"), Some("31"), Some("arlington"), Some("8.0")],
        ],
    );
    let catalog = InMemoryCatalog::new()
        .with_server("warehouse", ServerOptions::new("hive.internal"))
        .with_table(TableId(42), "warehouse", "people");
    let fdw = HiveFdw::new(Arc::new(catalog), Arc::new(engine.clone()));
    (engine, fdw)
}

#[test]
fn synthesized_query_matches_the_expected_shape() {
    let (_engine, fdw) = fixture();
    let rel = people();
    let targets = vec![Expr::col(1), Expr::col(2)];
    let restrictions = vec![Restriction::new(Expr::op(
        ">",
        Expr::col(2),
        Expr::lit(30_i64),
    ))];
    let info = fdw
        .estimate_rel_size(&rel, &targets, &restrictions)
        .expect("sizing succeeds");
    let plan = fdw
        .plan_scan(&rel, &info, &restrictions)
        .expect("plan succeeds");
    assert_eq!(
        plan.sql,
        "SELECT `name`, `age` FROM `people` WHERE (`age` > 30)"
    );
    assert_eq!(plan.retrieved_attrs, vec![AttrNum(1), AttrNum(2)]);
    assert!(plan.local_exprs.is_empty());
}

#[test]
fn mapping_follows_attribute_number_order() {
    let (_engine, fdw) = fixture();
    let rel = people();
    // Requested out of order: {3, 1, 4}.
    let targets = vec![Expr::col(3), Expr::col(1), Expr::col(4)];
    let info = fdw
        .estimate_rel_size(&rel, &targets, &[])
        .expect("sizing succeeds");
    let plan = fdw.plan_scan(&rel, &info, &[]).expect("plan succeeds");
    assert_eq!(plan.sql, "SELECT `name`, `city`, `score` FROM `people`");
    assert_eq!(
        plan.retrieved_attrs,
        vec![AttrNum(1), AttrNum(3), AttrNum(4)]
    );
}

#[test]
fn unsupported_operators_are_kept_for_local_evaluation() {
    let (_engine, fdw) = fixture();
    let rel = people();
    let targets = vec![Expr::col(1)];
    let regex = Restriction::new(Expr::op("~", Expr::col(1), Expr::lit("^a.*")));
    let supported = Restriction::new(Expr::op(">", Expr::col(2), Expr::lit(30_i64)));
    let restrictions = vec![regex.clone(), supported.clone()];
    let info = fdw
        .estimate_rel_size(&rel, &targets, &restrictions)
        .expect("sizing succeeds");
    assert_eq!(info.remote_conds, vec![supported]);
    assert_eq!(info.local_conds, vec![regex.clone()]);
    // The column the local filter needs is still fetched remotely.
    assert!(info.attrs_used.contains(&AttrNum(2)));

    let plan = fdw
        .plan_scan(&rel, &info, &restrictions)
        .expect("plan succeeds");
    assert!(!plan.sql.contains('~'), "{}", plan.sql);
    assert_eq!(plan.local_exprs, vec![regex.expr]);
}

#[test]
fn pseudoconstant_clauses_land_in_neither_set() {
    let (_engine, fdw) = fixture();
    let rel = people();
    let pseudo = Restriction::pseudoconstant(Expr::lit(false));
    let supported = Restriction::new(Expr::op("=", Expr::col(1), Expr::lit("ada")));
    let info = fdw
        .estimate_rel_size(&rel, &[Expr::col(1)], &[pseudo.clone(), supported.clone()])
        .expect("sizing succeeds");
    assert_eq!(info.remote_conds, vec![supported]);
    assert!(info.local_conds.is_empty());

    let plan = fdw
        .plan_scan(&rel, &info, &[pseudo])
        .expect("plan succeeds");
    assert!(!plan.sql.contains("WHERE"), "{}", plan.sql);
    assert!(plan.local_exprs.is_empty());
}

#[test]
fn join_clauses_seen_only_at_plan_time_are_classified_fresh() {
    let (_engine, fdw) = fixture();
    let rel = people();
    let base = Restriction::new(Expr::op(">", Expr::col(2), Expr::lit(30_i64)));
    let info = fdw
        .estimate_rel_size(&rel, &[Expr::col(2)], &[base.clone()])
        .expect("sizing succeeds");

    // The executor hands over one clause the sizing pass never saw: a
    // safe one is pushed down, an unsafe one stays local.
    let join_safe = Restriction::new(Expr::op("=", Expr::col(3), Expr::lit("london")));
    let join_unsafe = Restriction::new(Expr::op("~", Expr::col(3), Expr::lit("^l")));
    let plan = fdw
        .plan_scan(
            &rel,
            &info,
            &[base, join_safe.clone(), join_unsafe.clone()],
        )
        .expect("plan succeeds");
    assert_eq!(
        plan.sql,
        "SELECT `age` FROM `people` WHERE (`age` > 30) AND (`city` = 'london')"
    );
    assert_eq!(plan.local_exprs, vec![join_unsafe.expr]);
}

#[test]
fn parameters_render_as_placeholders_in_emission_order() {
    let (_engine, fdw) = fixture();
    let rel = people();
    let first = Restriction::new(Expr::op(">", Expr::col(2), Expr::Param { index: 5 }));
    let second = Restriction::new(Expr::op("=", Expr::col(1), Expr::Param { index: 2 }));
    let restrictions = vec![first, second];
    let info = fdw
        .estimate_rel_size(&rel, &[Expr::col(1)], &restrictions)
        .expect("sizing succeeds");
    let plan = fdw
        .plan_scan(&rel, &info, &restrictions)
        .expect("plan succeeds");
    assert_eq!(
        plan.sql,
        "SELECT `name` FROM `people` WHERE (`age` > ?) AND (`name` = ?)"
    );
    assert_eq!(
        plan.params,
        vec![Expr::Param { index: 5 }, Expr::Param { index: 2 }]
    );
}
