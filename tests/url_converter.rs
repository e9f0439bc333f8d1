use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use sqlite_ingest::convert::{ConvertOptions, ExitCode, RunContext, UrlConverter};
use sqlite_ingest::ingestion::{FetchedDocument, Fetcher, TableFormat};
use sqlite_ingest::sqlite::Destination;
use sqlite_ingest::{IngestionError, IngestionResult};

enum Response {
    Document {
        content_type: Option<&'static str>,
        bytes: Vec<u8>,
    },
    HttpStatus(u16),
    ProxyAborted,
}

/// Serves canned responses instead of going to the network.
#[derive(Default)]
struct StaticFetcher {
    responses: HashMap<String, Response>,
}

impl StaticFetcher {
    fn serve(mut self, url: &str, content_type: Option<&'static str>, bytes: Vec<u8>) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Document {
                content_type,
                bytes,
            },
        );
        self
    }

    fn fail(mut self, url: &str, response: Response) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> IngestionResult<FetchedDocument> {
        match self.responses.get(url) {
            Some(Response::Document {
                content_type,
                bytes,
            }) => Ok(FetchedDocument {
                url: url.to_string(),
                content_type: content_type.map(str::to_string),
                bytes: bytes.clone(),
            }),
            Some(Response::HttpStatus(code)) => Err(IngestionError::Http {
                message: format!("{url} returned HTTP {code}"),
            }),
            Some(Response::ProxyAborted) => Err(IngestionError::Proxy {
                message: "connection aborted".to_string(),
            }),
            None => Err(IngestionError::Http {
                message: format!("{url} returned HTTP 404"),
            }),
        }
    }
}

fn fixture_bytes(name: &str) -> Vec<u8> {
    fs::read(format!("tests/fixtures/{name}")).unwrap()
}

fn converter(format: Option<TableFormat>, fetcher: StaticFetcher) -> UrlConverter<StaticFetcher> {
    UrlConverter::with_fetcher(
        ConvertOptions {
            format,
            ..ConvertOptions::default()
        },
        fetcher,
    )
}

#[test]
fn html_page_with_csv_hint_falls_back_to_html() {
    let url = "https://example.com/reports/page";
    let fetcher =
        StaticFetcher::default().serve(url, Some("text/html"), fixture_bytes("tables.html"));
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let created = converter(Some(TableFormat::Csv), fetcher)
        .convert(&mut ctx, url)
        .unwrap();

    assert_eq!(created, 2);
    assert_eq!(ctx.counter().success_count(), 2);
    let records = ctx.source_infos();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].dst_table, "Prices");
    assert_eq!(records[1].dst_table, "page_html2");
    assert!(records.iter().all(|r| r.format_name == "html"));
    assert_eq!(records[0].dir_name, "example.com/reports");
    assert_eq!(records[0].base_name, "page");
    assert_eq!(records[0].size, None);
    assert_eq!(records[0].mtime, None);

    let code: String = dst
        .connection()
        .query_row("SELECT code FROM page_html2", [], |r| r.get(0))
        .unwrap();
    assert_eq!(code, "A&B");
}

#[test]
fn failing_table_does_not_stop_the_others() {
    let url = "https://example.com/api/multi.json";
    let fetcher = StaticFetcher::default().serve(
        url,
        Some("application/json"),
        fixture_bytes("multi.json"),
    );
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let created = converter(None, fetcher).convert(&mut ctx, url).unwrap();

    assert_eq!(created, 2);
    assert_eq!(ctx.counter().success_count(), 2);
    assert_eq!(ctx.counter().fail_count(), 1);
    let tables: Vec<_> = ctx.source_infos().iter().map(|r| r.dst_table.as_str()).collect();
    assert_eq!(tables, vec!["first", "third"]);
}

#[test]
fn content_type_picks_the_loader() {
    let url = "https://example.com/export";
    let fetcher = StaticFetcher::default().serve(
        url,
        Some("text/csv; charset=utf-8"),
        b"id,v\n1,x\n".to_vec(),
    );
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    converter(None, fetcher).convert(&mut ctx, url).unwrap();

    let records = ctx.source_infos();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].format_name, "csv");
    assert_eq!(records[0].dst_table, "export");
    assert_eq!(records[0].dir_name, "example.com/");
}

#[test]
fn malformed_notebook_is_a_skip() {
    let url = "https://example.com/nb/broken.ipynb";
    let fetcher = StaticFetcher::default().serve(url, None, fixture_bytes("broken.ipynb"));
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let created = converter(None, fetcher).convert(&mut ctx, url).unwrap();

    assert_eq!(created, 0);
    assert_eq!(ctx.counter().skip_count(), 1);
    assert_eq!(ctx.counter().fail_count(), 0);
}

#[test]
fn notebook_records_carry_document_size() {
    let url = "https://example.com/nb/analysis.ipynb";
    let bytes = fixture_bytes("notebook.ipynb");
    let size = bytes.len() as u64;
    let fetcher = StaticFetcher::default().serve(url, Some("application/json"), bytes);
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let created = converter(None, fetcher).convert(&mut ctx, url).unwrap();

    assert_eq!(created, 2);
    for record in ctx.source_infos() {
        assert_eq!(record.format_name, "ipynb");
        assert_eq!(record.size, Some(size));
        assert_eq!(record.base_name, "analysis.ipynb");
    }
}

#[test]
fn http_errors_are_fatal() {
    let url = "https://example.com/missing.csv";
    let fetcher = StaticFetcher::default().fail(url, Response::HttpStatus(404));
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let fatal = converter(None, fetcher).convert(&mut ctx, url).unwrap_err();

    assert_eq!(fatal.exit_code, ExitCode::FailedHttp);
    assert_eq!(fatal.exit_code.code(), 3);
}

#[test]
fn invalid_urls_are_fatal() {
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let fatal = converter(None, StaticFetcher::default())
        .convert(&mut ctx, "not a url")
        .unwrap_err();

    assert_eq!(fatal.exit_code, ExitCode::FailedHttp);
}

#[test]
fn proxy_abort_is_fatal() {
    let url = "https://example.com/data.csv";
    let fetcher = StaticFetcher::default().fail(url, Response::ProxyAborted);
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let fatal = converter(None, fetcher).convert(&mut ctx, url).unwrap_err();

    assert_eq!(fatal.exit_code, ExitCode::FailedProxy);
    assert_eq!(fatal.exit_code.code(), 103);
}

#[test]
fn unrecognised_content_is_fatal_after_html_retry() {
    let url = "https://example.com/readme";
    let fetcher =
        StaticFetcher::default().serve(url, Some("text/plain"), b"hello world\n".to_vec());
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let fatal = converter(None, fetcher).convert(&mut ctx, url).unwrap_err();

    assert_eq!(fatal.exit_code, ExitCode::FailedLoaderNotFound);
    assert_eq!(ctx.counter().total_count(), 0);
}

#[test]
fn tables_committed_before_a_fatal_error_remain() {
    let good = "https://example.com/a.csv";
    let bad = "https://example.com/b.csv";
    let fetcher = StaticFetcher::default()
        .serve(good, Some("text/csv"), b"x\n1\n".to_vec())
        .fail(bad, Response::HttpStatus(500));
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::with_source_info_table(&dst).unwrap();
    let converter = converter(None, fetcher);

    converter.convert(&mut ctx, good).unwrap();
    assert!(converter.convert(&mut ctx, bad).is_err());

    assert!(dst.has_table("a").unwrap());
    let recorded: i64 = dst
        .connection()
        .query_row("SELECT COUNT(*) FROM _source_info_", [], |r| r.get(0))
        .unwrap();
    assert_eq!(recorded, 1);
}

fn parquet_bytes(values: &[i64]) -> Vec<u8> {
    let schema =
        Arc::new(parse_message_type("message schema { REQUIRED INT64 reading; }").unwrap());
    let props = Arc::new(WriterProperties::builder().build());
    let mut buf = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, schema, props).unwrap();
    let mut rg = writer.next_row_group().unwrap();
    while let Some(mut col) = rg.next_column().unwrap() {
        match col.untyped() {
            ColumnWriter::Int64ColumnWriter(w) => {
                w.write_batch(values, None, None).unwrap();
            }
            _ => panic!("unexpected column writer in test"),
        }
        col.close().unwrap();
    }
    rg.close().unwrap();
    writer.close().unwrap();
    buf
}

#[test]
fn parquet_documents_are_loaded_from_memory() {
    let url = "https://example.com/exports/sensor.parquet";
    let fetcher = StaticFetcher::default().serve(url, None, parquet_bytes(&[10, 20, 30]));
    let dst = Destination::open_in_memory().unwrap();
    let mut ctx = RunContext::new(&dst);

    let created = converter(None, fetcher).convert(&mut ctx, url).unwrap();

    assert_eq!(created, 1);
    let records = ctx.source_infos();
    assert_eq!(records[0].format_name, "parquet");
    assert_eq!(records[0].dst_table, "sensor");
    assert_eq!(dst.row_count("sensor").unwrap(), 3);
    let total: i64 = dst
        .connection()
        .query_row("SELECT SUM(reading) FROM sensor", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total, 60);
}
