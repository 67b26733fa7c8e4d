//! Deparse fidelity: rendered SQL must re-parse to a structurally equal
//! tree, because the engine re-parses and ships the rendered text.

use sqlet_sql::{parse, Statement};

fn assert_roundtrip(sql: &str) {
    let first = parse(sql).unwrap();
    let rendered = first.to_string();
    let second = parse(&rendered)
        .unwrap_or_else(|e| panic!("rendered SQL failed to re-parse: {e}\n  {rendered}"));
    assert_eq!(first, second, "tree changed through deparsing:\n  {rendered}");
}

#[test]
fn plain_selects() {
    assert_roundtrip("select a, b total, t.c from s.orders t");
    assert_roundtrip("select distinct a from t where a > 1 and b < 2 or not c = 3");
    assert_roundtrip("select * from t order by a desc nulls first, b limit 10 offset 20");
    assert_roundtrip("select t1.*, t2.colB from t1, t2");
}

#[test]
fn joins() {
    assert_roundtrip("select a from t join u on u.id = t.id");
    assert_roundtrip("select a from t left outer join u on u.id = t.id and u.live = true");
    assert_roundtrip("select a from t cross join u");
    assert_roundtrip("select a from t natural join u");
    assert_roundtrip("select a from t join u using (id, tenant)");
}

#[test]
fn subselects_and_unions() {
    assert_roundtrip("select x from (select a x from t) s");
    assert_roundtrip("select x from t union select y from u union all select z from v");
    assert_roundtrip("select a from t where a in (select b from u where u.c = :c)");
    assert_roundtrip("select (select max(b) from u) m from t");
    assert_roundtrip("select a from t where exists (select 1 c from u)");
}

#[test]
fn expressions() {
    assert_roundtrip("select a + b * -c, a || '-' || b from t");
    assert_roundtrip("select case when a > 0 then 'pos' else 'neg' end sign from t");
    assert_roundtrip("select case a when 1 then 'one' when 2 then 'two' end from t");
    assert_roundtrip("select a from t where b between :low and :high");
    assert_roundtrip("select a from t where b not like 'x%' and c is not null");
    assert_roundtrip("select a::long, b::text from t where (a + 1) * 2 > 4");
    assert_roundtrip("select count(*), count(distinct a), coalesce(b, 'n''a') from t");
}

#[test]
fn parameters_and_entity_references() {
    assert_roundtrip("select a from t where a = :p1 and b <> :P2");
    assert_roundtrip("select o.total from #orders/summary o join #../shared/lookup l on l.k = o.k");
}

#[test]
fn quoted_identifiers_survive() {
    let parsed = parse("select \"odd name\" from \"weird table\" w").unwrap();
    let rendered = parsed.to_string();
    assert!(rendered.contains("\"odd name\""));
    assert!(rendered.contains("\"weird table\""));
    assert_eq!(parse(&rendered).unwrap(), parsed);
}

#[test]
fn commands_render_verbatim() {
    let sql = "update orders\nset total = :t -- keep comment\nwhere id = :id";
    let parsed = parse(sql).unwrap();
    assert!(matches!(parsed, Statement::Command(_)));
    assert_eq!(parsed.to_string(), sql);
}
