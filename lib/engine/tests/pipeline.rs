//! End-to-end pipeline behavior over on-disk entity roots.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use sqlet_engine::{Dialect, EntityEngine, EntityError, MemoryMetadata, ResolveOptions};
use sqlet_model::{Field, FieldType};
use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn column(name: &str, data_type: FieldType) -> Field {
    let mut field = Field::named(name);
    field.data_type = data_type;
    field
}

fn key_column(name: &str) -> Field {
    let mut field = column(name, FieldType::Long);
    field.nullable = false;
    field.primary_key = true;
    field
}

/// orders(id, customer_id, total, note), customers(id, name),
/// table1(colA, colX, colY), table2(colB, colY).
fn metadata() -> Arc<MemoryMetadata> {
    let mut metadata = MemoryMetadata::new();
    metadata.insert_table(
        "orders",
        [
            key_column("id"),
            column("customer_id", FieldType::Long),
            column("total", FieldType::Double),
            column("note", FieldType::String),
        ],
    );
    metadata.insert_table(
        "customers",
        [key_column("id"), column("name", FieldType::String)],
    );
    metadata.insert_table(
        "table1",
        [
            column("colA", FieldType::String),
            column("colX", FieldType::String),
            column("colY", FieldType::Long),
        ],
    );
    metadata.insert_table(
        "table2",
        [
            column("colB", FieldType::Double),
            column("colY", FieldType::Date),
        ],
    );
    Arc::new(metadata)
}

fn engine(root: &TempDir) -> EntityEngine {
    EntityEngine::new(root.path(), metadata())
}

#[test]
fn loading_twice_is_idempotent() {
    let root = TempDir::new().unwrap();
    root.child("orders/list.sql")
        .write_str("select id, total from orders where total > :min")
        .unwrap();

    let engine = engine(&root);
    let first = engine.load("orders/list").unwrap();
    let second = engine.load("orders/list").unwrap();

    assert_eq!(first.sql, second.sql);
    assert_eq!(
        first.parameters.keys().collect::<Vec<_>>(),
        second.parameters.keys().collect::<Vec<_>>()
    );
    assert_eq!(first.fields, second.fields);
}

#[test]
fn two_node_cycles_are_detected() {
    let root = TempDir::new().unwrap();
    root.child("a.sql").write_str("select * from #b").unwrap();
    root.child("b.sql").write_str("select * from #a").unwrap();

    let error = engine(&root).load("a").unwrap_err();
    assert!(matches!(error, EntityError::CyclicReference(_)), "{error}");
}

#[test]
fn three_node_cycles_are_detected() {
    let root = TempDir::new().unwrap();
    root.child("a.sql").write_str("select * from #b").unwrap();
    root.child("b.sql").write_str("select * from #c").unwrap();
    root.child("c.sql").write_str("select * from #a").unwrap();

    let error = engine(&root).load("a").unwrap_err();
    assert!(matches!(error, EntityError::CyclicReference(_)), "{error}");
}

#[test]
fn self_reference_is_a_cycle_not_a_not_found() {
    let root = TempDir::new().unwrap();
    root.child("a.sql").write_str("select * from #a").unwrap();

    let error = engine(&root).load("a").unwrap_err();
    assert!(matches!(error, EntityError::CyclicReference(name) if name == "a"));
}

#[test]
fn parameters_round_trip_from_extraction_to_compilation() {
    let root = TempDir::new().unwrap();
    root.child("q.sql")
        .write_str("select * from orders t where t.total > :p1 and t.note = :p2 or t.total < :p1")
        .unwrap();

    let entity = engine(&root).load("q").unwrap();
    assert_eq!(entity.parameters.keys().collect::<Vec<_>>(), vec!["p1", "p2"]);

    let query = entity.to_query(Dialect::Generic);
    assert_eq!(query.sql.matches('?').count(), 3);
    let bound: Vec<_> = query.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(bound, vec!["p1", "p2", "p1"]);
}

#[test]
fn inlining_splices_an_aliased_subquery() {
    let root = TempDir::new().unwrap();
    root.child("sub.sql")
        .write_str("select id, total from orders where total > :min")
        .unwrap();
    root.child("outer.sql")
        .write_str("select o.total from #sub o where o.id = :id")
        .unwrap();

    let entity = engine(&root).load("outer").unwrap();

    // The reference is gone; an aliased, parenthesized sub-query took its
    // place and the sub-entity's parameter surfaced (renamed) on the outer
    // entity.
    assert!(!entity.sql.contains('#'), "{}", entity.sql);
    assert!(entity.sql.contains("(SELECT"), "{}", entity.sql);
    assert!(entity.sql.contains(") o"), "{}", entity.sql);
    assert_eq!(
        entity.parameters.keys().collect::<Vec<_>>(),
        vec!["o_min", "id"]
    );

    // o.total resolved through the sub-query down to orders.total.
    let total = entity.fields.get("total").unwrap();
    assert_eq!(total.data_type, FieldType::Double);
    assert_eq!(total.table_name.as_deref(), Some("orders"));
}

#[test]
fn binds_rename_sub_parameters_to_outer_names() {
    let root = TempDir::new().unwrap();
    root.child("sub.sql")
        .write_str("select id, total from orders where total > :min")
        .unwrap();
    root.child("outer.sql")
        .write_str("select o.total from #sub o")
        .unwrap();
    root.child("outer.sql.json")
        .write_str(r#"{"parameters": {"floor": {"binds": {"o": ["min"]}}}}"#)
        .unwrap();

    let entity = engine(&root).load("outer").unwrap();
    assert_eq!(entity.parameters.keys().collect::<Vec<_>>(), vec!["floor"]);
    assert!(entity.sql.contains(":floor"), "{}", entity.sql);
}

#[test]
fn relative_references_resolve_against_the_entity_directory() {
    let root = TempDir::new().unwrap();
    root.child("shared/lookup.sql")
        .write_str("select id, name from customers")
        .unwrap();
    root.child("orders/report.sql")
        .write_str("select l.name from #../shared/lookup l")
        .unwrap();

    let entity = engine(&root).load("orders/report").unwrap();
    assert_eq!(
        entity.fields.get("name").unwrap().data_type,
        FieldType::String
    );
}

#[test]
fn star_expansion_unions_all_sources_with_last_source_winning() {
    let root = TempDir::new().unwrap();
    root.child("wide.sql")
        .write_str("select * from table1, table2")
        .unwrap();

    let entity = engine(&root).load("wide").unwrap();
    assert_eq!(
        entity.fields.keys().collect::<Vec<_>>(),
        vec!["colA", "colX", "colY", "colB"]
    );
    // colY exists in both; the later source's descriptor wins.
    let col_y = entity.fields.get("colY").unwrap();
    assert_eq!(col_y.data_type, FieldType::Date);
    assert_eq!(col_y.table_name.as_deref(), Some("table2"));
}

#[test]
fn qualified_star_restricts_to_one_source() {
    let root = TempDir::new().unwrap();
    root.child("narrow.sql")
        .write_str("select table1.*, table2.colB from table1, table2")
        .unwrap();

    let entity = engine(&root).load("narrow").unwrap();
    assert_eq!(entity.fields.len(), 3 + 1);
    assert_eq!(
        entity.fields.get("colB").unwrap().table_name.as_deref(),
        Some("table2")
    );
}

#[test]
fn unqualified_columns_resolve_to_the_first_containing_source() {
    let root = TempDir::new().unwrap();
    root.child("first.sql")
        .write_str("select colY from table1, table2")
        .unwrap();

    let entity = engine(&root).load("first").unwrap();
    // Asymmetric to `*` expansion on purpose: first source wins here.
    assert_eq!(entity.fields.get("colY").unwrap().data_type, FieldType::Long);
}

#[test]
fn unresolvable_columns_degrade_to_bare_fields() {
    let root = TempDir::new().unwrap();
    root.child("loose.sql")
        .write_str("select ghost.phantom, mystery from orders")
        .unwrap();

    let entity = engine(&root).load("loose").unwrap();
    let phantom = entity.fields.get("phantom").unwrap();
    assert_eq!(phantom.data_type, FieldType::Unknown);
    assert!(phantom.table_name.is_none());
    let mystery = entity.fields.get("mystery").unwrap();
    assert_eq!(mystery.data_type, FieldType::Unknown);
}

#[test]
fn json_overrides_take_precedence_over_structural_facts() {
    let root = TempDir::new().unwrap();
    root.child("o.sql")
        .write_str("select id, note from orders")
        .unwrap();
    root.child("o.sql.json")
        .write_str(
            r#"{
                "title": "Orders",
                "readonly": true,
                "pageSize": 50,
                "fields": {
                    "note": {"nullable": false, "key": true},
                    "id": {"reference": {"entity": "customers", "key": "id"}}
                },
                "writable": ["orders"],
                "roles": {"read": ["clerk"], "write": ["admin"]}
            }"#,
        )
        .unwrap();

    let entity = engine(&root).load("o").unwrap();
    assert_eq!(entity.title.as_deref(), Some("Orders"));
    assert!(entity.readonly);
    assert_eq!(entity.page_size, Some(50));

    // note was structurally nullable and non-key; JSON wins on both.
    let note = entity.fields.get("note").unwrap();
    assert!(!note.nullable);
    assert!(note.primary_key);

    // id keeps its structural PK fact and gains the declared reference.
    let id = entity.fields.get("id").unwrap();
    assert!(id.primary_key);
    assert_eq!(id.foreign_key.as_ref().unwrap().entity, "customers");

    assert!(entity.writable.contains("orders"));
    assert!(entity.read_roles.contains("clerk"));
    assert!(entity.write_roles.contains("admin"));
}

#[test]
fn empty_sql_is_rejected_distinct_from_not_found() {
    let root = TempDir::new().unwrap();
    root.child("empty.sql").write_str("  \n\t").unwrap();

    let engine = engine(&root);
    assert!(matches!(
        engine.load("empty").unwrap_err(),
        EntityError::EmptyEntity(_)
    ));
    assert!(matches!(
        engine.load("missing").unwrap_err(),
        EntityError::NotFound(_)
    ));
}

#[test]
fn referencing_an_empty_entity_fails_loudly() {
    let root = TempDir::new().unwrap();
    root.child("void.sql").write_str("").unwrap();
    root.child("outer.sql")
        .write_str("select * from #void v")
        .unwrap();

    assert!(matches!(
        engine(&root).load("outer").unwrap_err(),
        EntityError::EmptyEntity(_)
    ));
}

#[test]
fn commands_cannot_be_inlined() {
    let root = TempDir::new().unwrap();
    root.child("purge.sql")
        .write_str("delete from orders where id = :id")
        .unwrap();
    root.child("outer.sql")
        .write_str("select * from #purge p")
        .unwrap();

    assert!(matches!(
        engine(&root).load("outer").unwrap_err(),
        EntityError::NotInlinable(_)
    ));
}

#[test]
fn references_escaping_the_root_are_invalid() {
    let root = TempDir::new().unwrap();
    root.child("top.sql")
        .write_str("select * from #../outside o")
        .unwrap();

    assert!(matches!(
        engine(&root).load("top").unwrap_err(),
        EntityError::InvalidReference { .. }
    ));
}

#[test]
fn unparsable_selects_fail_without_a_command_fallback() {
    let root = TempDir::new().unwrap();
    root.child("broken.sql")
        .write_str("select from where")
        .unwrap();

    assert!(matches!(
        engine(&root).load("broken").unwrap_err(),
        EntityError::Parse { .. }
    ));
}

#[test]
fn declared_commands_bypass_the_parser() {
    let root = TempDir::new().unwrap();
    root.child("proc.sql")
        .write_str("begin run_nightly(:day); end;")
        .unwrap();
    root.child("proc.sql.json")
        .write_str(r#"{"command": true, "procedure": true}"#)
        .unwrap();

    let entity = engine(&root).load("proc").unwrap();
    assert!(entity.command);
    assert!(entity.procedure);
    assert_eq!(entity.parameters.keys().collect::<Vec<_>>(), vec!["day"]);
    assert_eq!(entity.to_query(Dialect::Generic).sql, "begin run_nightly(?); end;");
}

#[test]
fn dml_statements_become_commands_with_scanned_parameters() {
    let root = TempDir::new().unwrap();
    root.child("bump.sql")
        .write_str("update orders set total = :total where id = :id")
        .unwrap();

    let entity = engine(&root).load("bump").unwrap();
    assert!(entity.command);
    assert_eq!(
        entity.parameters.keys().collect::<Vec<_>>(),
        vec!["total", "id"]
    );
}

#[test]
fn custom_sql_overrides_compilation_but_keeps_metadata() {
    let root = TempDir::new().unwrap();
    root.child("tuned.sql")
        .write_str("select id, total from orders where id = :id")
        .unwrap();
    root.child("tuned.sql.json")
        .write_str(
            r#"{
                "sql": "select /*+ hint */ id, total from orders where id = :id and tenant = :tenant",
                "parameters": {"tenant": {"type": "long"}}
            }"#,
        )
        .unwrap();

    let entity = engine(&root).load("tuned").unwrap();
    let query = entity.to_query(Dialect::Postgres);
    assert_eq!(
        query.sql,
        "select /*+ hint */ id, total from orders where id = $1 and tenant = $2"
    );
    assert_eq!(query.parameters[1].name, "tenant");
    assert_eq!(query.parameters[1].data_type, FieldType::Long);
    // The structural schema still describes the result.
    assert_eq!(entity.fields.get("total").unwrap().data_type, FieldType::Double);
}

#[test]
fn stale_cache_entries_refresh_when_sources_change() {
    let root = TempDir::new().unwrap();
    let file = root.child("live.sql");
    file.write_str("select id from orders").unwrap();

    let engine = engine(&root);
    let before = engine.load("live").unwrap();
    assert_eq!(before.fields.len(), 1);

    // Rewrite the statement and push the mtime firmly past the cached
    // timestamp (filesystem clocks can be coarse).
    file.write_str("select id, total from orders").unwrap();
    let handle = File::options().write(true).open(file.path()).unwrap();
    handle
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let after = engine.load("live").unwrap();
    assert_eq!(after.fields.len(), 2);
}

#[test]
fn fresh_entries_are_served_from_cache() {
    let root = TempDir::new().unwrap();
    root.child("hot.sql").write_str("select id from orders").unwrap();

    let engine = engine(&root);
    let first = engine.load("hot").unwrap();
    let second = engine.load("hot").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    engine.invalidate("hot");
    let third = engine.load("hot").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(first.sql, third.sql);
}

#[test]
fn aliases_can_replace_physical_table_names() {
    let root = TempDir::new().unwrap();
    root.child("aliased.sql")
        .write_str("select a.id, b.id twin from orders a join orders b on b.id = a.id")
        .unwrap();

    let engine = EntityEngine::with_options(
        root.path(),
        metadata(),
        ResolveOptions {
            aliases_to_table_names: true,
        },
    );
    let entity = engine.load("aliased").unwrap();
    assert_eq!(entity.fields.get("id").unwrap().table_name.as_deref(), Some("a"));
    assert_eq!(
        entity.fields.get("twin").unwrap().table_name.as_deref(),
        Some("b")
    );
}
