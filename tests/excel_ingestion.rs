#![cfg(feature = "excel_test_writer")]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlite_ingest::convert::{FileConverter, RunContext};
use sqlite_ingest::ingestion::excel::load_workbook_path;
use sqlite_ingest::sqlite::Destination;
use sqlite_ingest::types::Value;

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sqlite-ingest-{name}-{nanos}.xlsx"))
}

fn write_workbook(path: &PathBuf) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();

    let ws1 = wb.add_worksheet();
    ws1.set_name("People").unwrap();
    ws1.write_string(0, 0, "id").unwrap();
    ws1.write_string(0, 1, "name").unwrap();
    ws1.write_string(0, 2, "active").unwrap();
    ws1.write_number(1, 0, 1).unwrap();
    ws1.write_string(1, 1, "Ada").unwrap();
    ws1.write_boolean(1, 2, true).unwrap();
    ws1.write_number(2, 0, 2).unwrap();
    ws1.write_string(2, 1, "Grace").unwrap();
    ws1.write_boolean(2, 2, false).unwrap();

    // Left empty on purpose.
    let ws2 = wb.add_worksheet();
    ws2.set_name("Notes").unwrap();

    // Header row starts below a blank row.
    let ws3 = wb.add_worksheet();
    ws3.set_name("Scores 2024").unwrap();
    ws3.write_string(1, 0, "score").unwrap();
    ws3.write_number(2, 0, 98.5).unwrap();

    wb.save(path).unwrap();
}

#[test]
fn one_table_per_non_empty_sheet() {
    let path = tmp_file("sheets");
    write_workbook(&path);

    let tables: Vec<_> = load_workbook_path(&path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["People", "Scores 2024"]);
    assert_eq!(tables[0].headers, vec!["id", "name", "active"]);
    assert_eq!(tables[0].rows[1][1], Value::Utf8("Grace".to_string()));
    assert_eq!(tables[1].rows[0][0], Value::Float64(98.5));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn workbook_converts_to_sqlite() {
    let path = tmp_file("convert");
    write_workbook(&path);

    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);
    FileConverter::default().convert(&mut ctx, &path);

    assert_eq!(ctx.counter().success_count(), 2);
    let tables: Vec<_> = ctx.source_infos().iter().map(|r| r.dst_table.clone()).collect();
    assert_eq!(tables, vec!["People", "Scores_2024"]);
    assert!(ctx.source_infos().iter().all(|r| r.format_name == "excel"));

    let _ = std::fs::remove_file(&path);
}
