use std::path::PathBuf;

use sheetmerge_recon::{
    unify, EditDistanceScorer, InputLayout, KftaField, LookupTables, OracleChain, OutputFormat,
    RawTable, Similarity, SimilarityOracle, UnifyOptions,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Fixtures are plain comma-separated text without quoting.
fn load_fixture(name: &str) -> RawTable {
    let path = fixtures_dir().join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    let mut lines = text.lines().map(|line| {
        line.split(',')
            .map(|cell| cell.to_string())
            .collect::<Vec<_>>()
    });
    let columns = lines.next().unwrap_or_default();
    RawTable::new(name, columns, lines.collect())
}

const CHUNCHEON: &str = "강원특별자치도춘천교육지원청";
const WONJU: &str = "강원특별자치도원주교육지원청";
const GANGNEUNG: &str = "강원특별자치도강릉교육지원청";
const DONGHAE: &str = "강원특별자치도동해교육지원청";
const INJE: &str = "강원특별자치도인제교육지원청";
const SOKCHO: &str = "강원특별자치도속초양양교육지원청";

// -------------------------------------------------------------------------
// Named tables, generic output
// -------------------------------------------------------------------------

#[test]
fn two_rosters_collapse_to_three_people() {
    let tables = LookupTables::builtin();
    let scorer = EditDistanceScorer::default();
    let inputs = [load_fixture("roster_a.csv"), load_fixture("roster_b.csv")];
    let options = UnifyOptions {
        format: OutputFormat::Generic,
        key_columns: vec!["이름".into(), "학교".into()],
        ..UnifyOptions::default()
    };

    let result = unify(&tables, &options, &scorer, &inputs);

    assert_eq!(result.table.columns, vec!["이름", "학교", "전공"]);
    assert_eq!(result.table.len(), 3);
    assert_eq!(
        result.table.column_values("이름"),
        vec!["김철수", "이영희", "박민수"]
    );
    // First occurrence wins.
    assert_eq!(result.table.records[0].get("학교"), "서울대학교");
    assert_eq!(result.groups.canonical_for("성명"), Some("이름"));
    assert_eq!(result.groups.canonical_for("대학교"), Some("학교"));
    assert!(result.groups.get("성명").is_none());

    let report = &result.report;
    assert_eq!(report.rows_in, 5);
    assert_eq!(report.rows_emitted, 5);
    assert_eq!(report.rows_after_dedup, 3);
    assert_eq!(report.merged_groups.len(), 3);
    assert!(report.tables.iter().all(|t| t.layout == InputLayout::Named));
}

#[test]
fn dedup_keys_by_raw_name_are_mapped() {
    let tables = LookupTables::builtin();
    let scorer = EditDistanceScorer::default();
    let inputs = [load_fixture("roster_a.csv"), load_fixture("roster_b.csv")];
    let options = UnifyOptions {
        format: OutputFormat::Generic,
        key_columns: vec!["성명".into()],
        ..UnifyOptions::default()
    };
    let result = unify(&tables, &options, &scorer, &inputs);
    assert_eq!(result.report.key_columns, vec!["이름"]);
    assert_eq!(result.table.len(), 3);
}

// -------------------------------------------------------------------------
// Positional personnel orders, KFTA output
// -------------------------------------------------------------------------

#[test]
fn personnel_orders_extract_kfta_records() {
    let tables = LookupTables::builtin();
    let scorer = EditDistanceScorer::default();
    let inputs = [load_fixture("orders_2026_03.csv")];

    let result = unify(&tables, &UnifyOptions::default(), &scorer, &inputs);

    let labels: Vec<&str> = KftaField::ALL.iter().map(|f| f.label()).collect();
    assert_eq!(result.table.columns, labels);
    assert_eq!(result.report.tables[0].layout, InputLayout::Positional);
    assert_eq!(result.report.rows_in, 9);
    assert_eq!(result.report.rows_rejected, 4);
    assert_eq!(result.table.len(), 5);

    let rows: Vec<Vec<&str>> = result.table.rows().collect();
    assert_eq!(
        rows[0],
        vec![
            WONJU, "원주중앙초등학교", "김하나", CHUNCHEON, "춘천남산초등학교", "", "교사",
            "", "", "", "", ""
        ]
    );

    let second = &result.table.records[1];
    assert_eq!(second.get("발령분회"), "강릉제일고등학교");
    assert_eq!(second.get("발령교육청"), GANGNEUNG);
    assert_eq!(second.get("현재분회"), "강릉여자고등학교");
    assert_eq!(second.get("현재교육청"), GANGNEUNG);
    assert_eq!(second.get("과목"), "");

    let kindergarten = &result.table.records[3];
    assert_eq!(kindergarten.get("직위"), "유치원감");
    assert_eq!(kindergarten.get("발령교육청"), INJE);
    assert_eq!(kindergarten.get("발령분회"), "기린유치원");
    assert_eq!(kindergarten.get("현재교육청"), INJE);
    assert_eq!(kindergarten.get("현재분회"), "월학초등학교");

    let out_of_province = &result.table.records[4];
    assert_eq!(out_of_province.get("발령분회"), "성원초등학교");
    assert_eq!(out_of_province.get("발령교육청"), "");
    assert_eq!(out_of_province.get("현재교육청"), SOKCHO);
    assert_eq!(out_of_province.get("현재분회"), "속초중앙초등학교");
    assert_eq!(result.report.unresolved_authorities, 1);
}

#[test]
fn padded_title_line_is_not_a_record() {
    let tables = LookupTables::builtin();
    let scorer = EditDistanceScorer::default();
    let inputs = sheetmerge_io::load_all(&[fixtures_dir().join("orders_padded_title.csv")]);
    assert_eq!(inputs.len(), 1);
    assert!(inputs[0].columns.contains(&"Unnamed: 2".to_string()));

    let result = unify(&tables, &UnifyOptions::default(), &scorer, &inputs);

    assert_eq!(result.report.tables[0].layout, InputLayout::Positional);
    assert_eq!(result.report.rows_in, 3);
    assert_eq!(result.report.rows_rejected, 1);
    assert_eq!(result.table.column_values("이름"), vec!["김하나", "박둘"]);
    assert!(result
        .table
        .records
        .iter()
        .all(|r| !r.get("현재분회").starts_with("Unnamed")));
}

#[test]
fn school_in_subject_moves_to_empty_new_unit() {
    let tables = LookupTables::builtin();
    let scorer = EditDistanceScorer::default();
    let inputs = [load_fixture("orders_2026_03.csv")];

    let result = unify(&tables, &UnifyOptions::default(), &scorer, &inputs);

    let record = &result.table.records[2];
    assert_eq!(record.get("이름"), "이셋");
    assert_eq!(record.get("발령분회"), "강릉여자고등학교");
    assert_eq!(record.get("발령교육청"), GANGNEUNG);
    assert_eq!(record.get("과목"), "");
    assert_eq!(record.get("현재분회"), "북평고등학교");
    assert_eq!(record.get("현재교육청"), DONGHAE);
}

#[test]
fn forced_named_layout_skips_extraction() {
    let tables = LookupTables::builtin();
    let scorer = EditDistanceScorer::default();
    let inputs = [load_fixture("roster_a.csv")];
    let options = UnifyOptions {
        layout: InputLayout::Named,
        ..UnifyOptions::default()
    };
    let result = unify(&tables, &options, &scorer, &inputs);
    assert_eq!(result.table.len(), 2);
    assert_eq!(result.table.records[0].get("이름"), "김철수");
    assert_eq!(result.table.records[0].get("현재분회"), "서울대학교");
    assert_eq!(result.table.records[0].get("과목"), "물리학");
    assert_eq!(result.report.rows_rejected, 0);
}

// -------------------------------------------------------------------------
// Oracle degradation
// -------------------------------------------------------------------------

struct Unreachable;

impl SimilarityOracle for Unreachable {
    fn similar(&self, a: &str, _b: &str, _context: &str) -> Similarity {
        Similarity::failed(a)
    }
}

#[test]
fn failing_semantic_oracle_degrades_to_edit_distance() {
    let tables = LookupTables::builtin();
    let chain = OracleChain::with_semantic(60, Box::new(Unreachable));
    let inputs = [
        RawTable::new("a.csv", vec!["비고란".into()], vec![vec!["x".into()]]),
        RawTable::new("b.csv", vec!["비고".into()], vec![vec!["y".into()]]),
    ];
    let options = UnifyOptions {
        format: OutputFormat::Generic,
        ..UnifyOptions::default()
    };

    let result = unify(&tables, &options, &chain, &inputs);

    assert_eq!(result.table.columns, vec!["비고란"]);
    assert_eq!(result.table.column_values("비고란"), vec!["x", "y"]);
    assert!(result.report.oracle_fallbacks >= 1);
    assert!(result.report.render().contains("fell back to edit distance"));
}
