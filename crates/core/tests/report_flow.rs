//! End-to-end report fetches against a scripted transport.
//!
//! The transport replays a queue of run payloads and records every request
//! body, so tests can check the filters injected between pages.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use factmap_core::{
    ColumnIndex, DataType, FetchOptions, ReportClient, ReportError, ReportRequest, RowIndex,
    Scalar, Transport,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

// ──────────────────────────────────────────────
// Scripted transport
// ──────────────────────────────────────────────

struct Scripted {
    describe: Value,
    pages: RefCell<VecDeque<Result<Value, ReportError>>>,
    bodies: RefCell<Vec<Value>>,
    describe_calls: Cell<usize>,
    summary: Option<Value>,
}

impl Scripted {
    fn new(describe: Value, pages: Vec<Value>) -> Self {
        Scripted {
            describe,
            pages: RefCell::new(pages.into_iter().map(Ok).collect()),
            bodies: RefCell::new(Vec::new()),
            describe_calls: Cell::new(0),
            summary: None,
        }
    }

    fn runs(&self) -> usize {
        self.bodies.borrow().len()
    }

    fn body(&self, n: usize) -> Value {
        self.bodies.borrow()[n].clone()
    }
}

impl Transport for Scripted {
    fn describe(&self, _report_id: &str) -> Result<Value, ReportError> {
        self.describe_calls.set(self.describe_calls.get() + 1);
        Ok(self.describe.clone())
    }

    fn run(&self, _report_id: &str, metadata: &Value) -> Result<Value, ReportError> {
        self.bodies.borrow_mut().push(metadata.clone());
        self.pages
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ReportError::Transport("no more scripted pages".into())))
    }

    fn summary(&self, _report_id: &str) -> Result<Value, ReportError> {
        self.summary
            .clone()
            .ok_or_else(|| ReportError::Transport("no summary scripted".into()))
    }
}

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn num(n: i64) -> Scalar {
    Scalar::Number(Decimal::from(n))
}

fn text(s: &str) -> Scalar {
    Scalar::Text(s.to_string())
}

fn tabular_describe(name_type: &str) -> Value {
    json!({
        "reportMetadata": {
            "reportFormat": "TABULAR",
            "detailColumns": ["ACCOUNT.NAME", "AMOUNT"],
            "reportFilters": [{"column": "TYPE", "operator": "equals", "value": "\"Customer\""}],
            "reportBooleanFilter": "1",
            "sortBy": null
        },
        "reportExtendedMetadata": {
            "detailColumnInfo": {
                "ACCOUNT.NAME": {"label": "Name", "dataType": name_type},
                "AMOUNT": {"label": "Amount", "dataType": "currency"}
            }
        }
    })
}

fn tabular_page(rows: &[(&str, i64)], all_data: bool) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|(name, amount)| {
            json!({"dataCells": [
                {"label": name, "value": name},
                {"label": format!("${}", amount), "value": {"amount": amount, "currency": "USD"}}
            ]})
        })
        .collect();
    json!({
        "allData": all_data,
        "factMap": {"T!T": {"rows": rows, "aggregates": [{"label": "n", "value": 0}]}}
    })
}

fn last_filter(body: &Value) -> Value {
    body["reportMetadata"]["reportFilters"]
        .as_array()
        .and_then(|f| f.last())
        .cloned()
        .unwrap_or(Value::Null)
}

// ──────────────────────────────────────────────
// Tabular
// ──────────────────────────────────────────────

#[test]
fn tabular_currency_decodes_to_numbers() {
    let transport = Scripted::new(
        tabular_describe("string"),
        vec![tabular_page(&[("Acme", 10), ("Globex", 25)], true)],
    );
    let client = ReportClient::new(&transport);
    let table = client.get_report(&ReportRequest::new("00O1")).unwrap();

    assert_eq!(table.columns, ColumnIndex::Flat(vec!["Name".into(), "Amount".into()]));
    assert_eq!(table.dtypes, vec![DataType::Text, DataType::Currency]);
    assert_eq!(table.index, RowIndex::Flat(vec![0, 1]));
    assert_eq!(
        table.rows,
        vec![vec![text("Acme"), num(10)], vec![text("Globex"), num(25)]]
    );
    assert_eq!(transport.runs(), 1);
}

#[test]
fn exclusion_paging_runs_until_all_data() {
    let transport = Scripted::new(
        tabular_describe("string"),
        vec![
            tabular_page(&[("A", 1), ("B", 2)], false),
            tabular_page(&[("C", 3)], false),
            tabular_page(&[("D", 4)], true),
        ],
    );
    let client = ReportClient::new(&transport);
    let request = ReportRequest::new("00O1").id_column("Name");
    let table = client.get_report(&request).unwrap();

    assert_eq!(transport.runs(), 3);
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.index, RowIndex::Flat(vec![0, 1, 2, 3]));

    // Page one goes out untouched.
    assert_eq!(
        transport.body(0)["reportMetadata"]["reportFilters"]
            .as_array()
            .map(Vec::len),
        Some(1)
    );
    assert_eq!(
        last_filter(&transport.body(1)),
        json!({"column": "ACCOUNT.NAME", "operator": "notEqual", "value": "A,B"})
    );
    assert_eq!(last_filter(&transport.body(2))["value"], "A,B,C");
    assert_eq!(
        transport.body(2)["reportMetadata"]["reportFilters"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
    // Logic grows once, when the synthetic filter is added.
    assert_eq!(transport.body(1)["reportMetadata"]["reportBooleanFilter"], "1 AND 2");
    assert_eq!(transport.body(2)["reportMetadata"]["reportBooleanFilter"], "1 AND 2");
}

#[test]
fn cursor_paging_filters_on_last_identifier() {
    let transport = Scripted::new(
        tabular_describe("id"),
        vec![
            tabular_page(&[("001", 1), ("002", 2)], false),
            tabular_page(&[("003", 3), ("004", 4)], false),
            tabular_page(&[("005", 5)], true),
        ],
    );
    let options = FetchOptions {
        page_row_limit: 2,
        ..FetchOptions::default()
    };
    let client = ReportClient::with_options(&transport, options);
    let table = client
        .get_report(&ReportRequest::new("00O1").id_column("Name"))
        .unwrap();

    assert_eq!(table.row_count(), 5);
    assert_eq!(
        transport.body(0)["reportMetadata"]["sortBy"],
        json!([{"sortColumn": "ACCOUNT.NAME", "sortOrder": "Asc"}])
    );
    assert_eq!(
        last_filter(&transport.body(1)),
        json!({"column": "ACCOUNT.NAME", "operator": "greaterThan", "value": "\"002\""})
    );
    assert_eq!(last_filter(&transport.body(2))["value"], "\"004\"");
    assert_eq!(transport.body(2)["reportMetadata"]["reportBooleanFilter"], "1 AND 2");
}

#[test]
fn cursor_paging_on_time_identifier() {
    let transport = Scripted::new(
        tabular_describe("time"),
        vec![
            tabular_page(&[("10:00:00.000Z", 1), ("11:00:00.000Z", 2)], false),
            tabular_page(&[("12:00:00.000Z", 3)], true),
        ],
    );
    let options = FetchOptions {
        page_row_limit: 2,
        ..FetchOptions::default()
    };
    let client = ReportClient::with_options(&transport, options);
    let table = client
        .get_report(&ReportRequest::new("00O1").id_column("Name"))
        .unwrap();

    assert_eq!(table.row_count(), 3);
    assert_eq!(
        last_filter(&transport.body(1)),
        json!({"column": "ACCOUNT.NAME", "operator": "greaterThan", "value": "11:00:00"})
    );
}

#[test]
fn explicit_sort_survives_identifier_paging() {
    let transport = Scripted::new(
        tabular_describe("id"),
        vec![
            tabular_page(&[("002", 20), ("001", 10)], false),
            tabular_page(&[("003", 5)], true),
        ],
    );
    let options = FetchOptions {
        page_row_limit: 2,
        ..FetchOptions::default()
    };
    let client = ReportClient::with_options(&transport, options);
    let request = ReportRequest::new("00O1")
        .id_column("Name")
        .sort("Amount", "desc");
    let table = client.get_report(&request).unwrap();

    assert_eq!(table.row_count(), 3);
    let requested = json!([{"sortColumn": "AMOUNT", "sortOrder": "Desc"}]);
    assert_eq!(transport.body(0)["reportMetadata"]["sortBy"], requested);
    assert_eq!(transport.body(1)["reportMetadata"]["sortBy"], requested);
    // A greater-than cursor is wrong under a foreign sort; exclusion is used.
    assert_eq!(
        last_filter(&transport.body(1)),
        json!({"column": "ACCOUNT.NAME", "operator": "notEqual", "value": "002,001"})
    );
}

#[test]
fn incomplete_report_without_identifier_returns_first_page() {
    let transport = Scripted::new(
        tabular_describe("string"),
        vec![
            tabular_page(&[("A", 1)], false),
            tabular_page(&[("B", 2)], true),
        ],
    );
    let client = ReportClient::new(&transport);
    let table = client.get_report(&ReportRequest::new("00O1")).unwrap();
    assert_eq!(transport.runs(), 1);
    assert_eq!(table.rows, vec![vec![text("A"), num(1)]]);
}

#[test]
fn page_bound_stops_a_runaway_report() {
    let pages = (0..5)
        .map(|i| {
            let name = format!("R{}", i);
            tabular_page(&[(name.as_str(), i)], false)
        })
        .collect();
    let transport = Scripted::new(tabular_describe("string"), pages);
    let options = FetchOptions {
        max_pages: 3,
        ..FetchOptions::default()
    };
    let client = ReportClient::with_options(&transport, options);
    let err = client
        .get_report(&ReportRequest::new("00O1").id_column("Name"))
        .unwrap_err();
    assert!(matches!(err, ReportError::PageLimitExceeded { pages: 3, .. }));
    assert_eq!(transport.runs(), 3);
}

#[test]
fn service_errors_discard_partial_results() {
    let transport = Scripted::new(
        tabular_describe("string"),
        vec![tabular_page(&[("A", 1)], false)],
    );
    transport.pages.borrow_mut().push_back(Err(ReportError::ServiceError {
        code: "INVALID_FILTER_VALUE".into(),
        message: "bad filter".into(),
    }));
    let client = ReportClient::new(&transport);
    let err = client
        .get_report(&ReportRequest::new("00O1").id_column("Name"))
        .unwrap_err();
    assert!(matches!(err, ReportError::ServiceError { code, .. } if code == "INVALID_FILTER_VALUE"));
}

#[test]
fn page_stream_is_lazy() {
    let transport = Scripted::new(
        tabular_describe("string"),
        vec![
            tabular_page(&[("A", 1)], false),
            tabular_page(&[("B", 2)], true),
        ],
    );
    let client = ReportClient::new(&transport);
    let mut stream = client
        .pages(&ReportRequest::new("00O1").id_column("Name"))
        .unwrap();
    assert_eq!(transport.runs(), 0);
    assert!(stream.next().unwrap().is_ok());
    assert_eq!(transport.runs(), 1);
    assert_eq!(stream.metadata().filters().len(), 2);
    assert!(stream.next().unwrap().is_ok());
    assert!(stream.next().is_none());
    assert_eq!(stream.pages_fetched(), 2);
}

#[test]
fn unknown_filter_column_fails_before_any_run() {
    let transport = Scripted::new(tabular_describe("string"), vec![]);
    let client = ReportClient::new(&transport);
    let err = client
        .get_report(&ReportRequest::new("00O1").filter("Colour", "==", "red"))
        .unwrap_err();
    assert!(matches!(err, ReportError::UnknownColumn(c) if c == "Colour"));
    assert_eq!(transport.runs(), 0);
}

// ──────────────────────────────────────────────
// Metadata cache
// ──────────────────────────────────────────────

#[test]
fn metadata_is_described_once_and_copied() {
    let transport = Scripted::new(tabular_describe("string"), vec![]);
    let client = ReportClient::new(&transport);

    let first = client
        .configure(&ReportRequest::new("00O1").filter("Name", "==", "Acme").sort("Amount", "desc"))
        .unwrap();
    assert_eq!(first.filters().len(), 2);

    let second = client.configure(&ReportRequest::new("00O1")).unwrap();
    assert_eq!(second.filters().len(), 1);
    assert!(second.sort_by().is_none());
    assert_eq!(second.boolean_filter(), Some("1"));
    assert_eq!(transport.describe_calls.get(), 1);
}

#[test]
fn request_configuration_order() {
    let transport = Scripted::new(tabular_describe("string"), vec![]);
    let client = ReportClient::new(&transport);
    let md = client
        .configure(
            &ReportRequest::new("00O1")
                .filter("Name", "startswith", "Ac")
                .filter("Amount", ">=", 100i64)
                .logic("1 AND (2 OR 3)"),
        )
        .unwrap();
    // Explicit logic replaces what filter appends produced.
    assert_eq!(md.boolean_filter(), Some("1 AND (2 OR 3)"));
    assert_eq!(md.filters()[1].operator, "startsWith");
    assert_eq!(md.filters()[1].value, "\"Ac\"");
    assert_eq!(md.filters()[2].value, "\"100\"");
}

// ──────────────────────────────────────────────
// Summary
// ──────────────────────────────────────────────

fn summary_describe() -> Value {
    json!({
        "reportMetadata": {
            "reportFormat": "SUMMARY",
            "detailColumns": ["OPPORTUNITY_NAME", "AMOUNT"],
            "groupingsDown": [{"name": "STAGE_NAME", "sortOrder": "Asc"}],
            "reportFilters": []
        },
        "reportExtendedMetadata": {
            "detailColumnInfo": {
                "OPPORTUNITY_NAME": {"label": "Opportunity Name", "dataType": "string"},
                "AMOUNT": {"label": "Amount", "dataType": "currency"}
            },
            "groupingColumnInfo": {"STAGE_NAME": {"label": "Stage", "dataType": "picklist"}}
        }
    })
}

fn detail(name: &str, amount: i64) -> Value {
    json!({"dataCells": [
        {"label": name, "value": name},
        {"label": "", "value": {"amount": amount}}
    ]})
}

#[test]
fn summary_rows_carry_group_labels() {
    let payload = json!({
        "allData": true,
        "groupingsDown": {"groupings": [
            {"key": "0", "label": "Prospecting", "value": "Prospecting", "groupings": []},
            {"key": "1", "label": "Closed Won", "value": "Closed Won", "groupings": []}
        ]},
        "factMap": {
            "0!T": {"rows": [detail("Deal A", 1), detail("Deal B", 2)], "aggregates": []},
            "1!T": {"rows": [detail("Deal C", 3)], "aggregates": []},
            "T!T": {"rows": [], "aggregates": [{"label": "3", "value": 3}]}
        }
    });
    let transport = Scripted::new(summary_describe(), vec![payload]);
    let client = ReportClient::new(&transport);
    let table = client.get_report(&ReportRequest::new("00O2")).unwrap();

    assert_eq!(
        table.index,
        RowIndex::Grouped {
            names: vec!["Stage".into()],
            tuples: vec![
                vec!["Prospecting".into()],
                vec!["Prospecting".into()],
                vec!["Closed Won".into()],
            ],
        }
    );
    assert_eq!(table.rows[2], vec![text("Deal C"), num(3)]);
}

#[test]
fn summary_groups_sort_numerically() {
    let groups: Vec<Value> = (0..11)
        .map(|i| json!({"key": i.to_string(), "label": format!("G{}", i), "groupings": []}))
        .collect();
    let mut fact_map = serde_json::Map::new();
    for i in 0..11 {
        fact_map.insert(
            format!("{}!T", i),
            json!({"rows": [detail(&format!("G{}", i), i)], "aggregates": []}),
        );
    }
    fact_map.insert("T!T".into(), json!({"rows": [], "aggregates": []}));
    let payload = json!({
        "allData": true,
        "groupingsDown": {"groupings": groups},
        "factMap": fact_map
    });
    let transport = Scripted::new(summary_describe(), vec![payload]);
    let table = ReportClient::new(&transport)
        .get_report(&ReportRequest::new("00O2"))
        .unwrap();

    let names: Vec<Scalar> = table.rows.iter().map(|r| r[0].clone()).collect();
    let expected: Vec<Scalar> = (0..11).map(|i| text(&format!("G{}", i))).collect();
    assert_eq!(names, expected);
}

#[test]
fn empty_summary_keeps_columns() {
    let payload = json!({
        "allData": true,
        "groupingsDown": {"groupings": []},
        "factMap": {"T!T": {"rows": [], "aggregates": [{"label": "0", "value": 0}]}}
    });
    let transport = Scripted::new(summary_describe(), vec![payload]);
    let table = ReportClient::new(&transport)
        .get_report(&ReportRequest::new("00O2"))
        .unwrap();
    assert_eq!(table.row_count(), 0);
    assert_eq!(
        table.columns,
        ColumnIndex::Flat(vec!["Opportunity Name".into(), "Amount".into()])
    );
    assert_eq!(table.dtypes, vec![DataType::Text, DataType::Currency]);
}

#[test]
fn empty_tabular_keeps_columns() {
    let transport = Scripted::new(tabular_describe("string"), vec![tabular_page(&[], true)]);
    let table = ReportClient::new(&transport)
        .get_report(&ReportRequest::new("00O1"))
        .unwrap();
    assert_eq!(table.row_count(), 0);
    assert_eq!(table.column_count(), 2);
}

#[test]
fn summary_group_mismatch_is_malformed() {
    let payload = json!({
        "allData": true,
        "groupingsDown": {"groupings": [{"key": "0", "label": "Only", "groupings": []}]},
        "factMap": {
            "0!T": {"rows": [detail("a", 1)]},
            "1!T": {"rows": [detail("b", 2)]}
        }
    });
    let transport = Scripted::new(summary_describe(), vec![payload]);
    let err = ReportClient::new(&transport)
        .get_report(&ReportRequest::new("00O2"))
        .unwrap_err();
    assert!(matches!(err, ReportError::MalformedPayload(_)));
}

// ──────────────────────────────────────────────
// Matrix
// ──────────────────────────────────────────────

fn matrix_describe() -> Value {
    json!({
        "reportMetadata": {
            "reportFormat": "MATRIX",
            "detailColumns": [],
            "aggregates": ["RowCount", "s!AMOUNT"],
            "groupingsDown": [{"name": "OWNER"}],
            "groupingsAcross": [{"name": "CLOSE_DATE"}],
            "reportFilters": []
        },
        "reportExtendedMetadata": {
            "aggregateColumnInfo": {
                "RowCount": {"label": "Record Count", "dataType": "int"},
                "s!AMOUNT": {"label": "Sum of Amount", "dataType": "currency"}
            },
            "groupingColumnInfo": {
                "OWNER": {"label": "Owner", "dataType": "string"},
                "CLOSE_DATE": {"label": "Close Date", "dataType": "date"}
            }
        }
    })
}

fn aggs(count: i64, amount: i64) -> Value {
    json!({"rows": [], "aggregates": [
        {"label": count.to_string(), "value": count},
        {"label": format!("${}", amount), "value": {"amount": amount, "currency": "USD"}}
    ]})
}

#[test]
fn matrix_lays_out_aggregate_blocks() {
    let payload = json!({
        "allData": true,
        "groupingsDown": {"groupings": [
            {"key": "0", "label": "Ann", "groupings": []},
            {"key": "1", "label": "Bob", "groupings": []}
        ]},
        "groupingsAcross": {"groupings": [
            {"key": "0", "label": "Q1", "groupings": []},
            {"key": "1", "label": "Q2", "groupings": []}
        ]},
        "factMap": {
            "0!0": aggs(1, 5),
            "0!1": aggs(2, 6),
            "1!0": aggs(3, 7),
            "1!1": aggs(4, 8),
            "0!T": aggs(3, 11),
            "1!T": aggs(7, 15),
            "T!0": aggs(4, 12),
            "T!1": aggs(6, 14),
            "T!T": aggs(10, 26)
        }
    });
    let transport = Scripted::new(matrix_describe(), vec![payload]);
    let table = ReportClient::new(&transport)
        .get_report(&ReportRequest::new("00O3").id_column("Owner"))
        .unwrap();

    assert_eq!(
        table.rows,
        vec![
            vec![num(1), num(2), num(5), num(6)],
            vec![num(3), num(4), num(7), num(8)],
        ]
    );
    assert_eq!(
        table.index,
        RowIndex::Grouped {
            names: vec!["Owner".into()],
            tuples: vec![vec!["Ann".into()], vec!["Bob".into()]],
        }
    );
    let pair = |a: &str, b: &str| vec![a.to_string(), b.to_string()];
    assert_eq!(
        table.columns,
        ColumnIndex::Grouped {
            names: vec!["".into(), "Close Date".into()],
            tuples: vec![
                pair("Record Count", "Q1"),
                pair("Record Count", "Q2"),
                pair("Sum of Amount", "Q1"),
                pair("Sum of Amount", "Q2"),
            ],
        }
    );
    assert_eq!(
        table.dtypes,
        vec![DataType::Int, DataType::Int, DataType::Currency, DataType::Currency]
    );
    // The identifier column is ignored for matrix reports.
    assert!(transport.body(0)["reportMetadata"]["sortBy"].is_null());
}

#[test]
fn matrix_missing_cells_are_null() {
    let payload = json!({
        "allData": true,
        "groupingsDown": {"groupings": [
            {"key": "0", "label": "Ann", "groupings": []},
            {"key": "1", "label": "Bob", "groupings": []}
        ]},
        "groupingsAcross": {"groupings": [
            {"key": "0", "label": "Q1", "groupings": []},
            {"key": "1", "label": "Q2", "groupings": []}
        ]},
        "factMap": {
            "0!0": aggs(1, 5),
            "1!1": aggs(4, 8),
            "T!T": aggs(5, 13)
        }
    });
    let transport = Scripted::new(matrix_describe(), vec![payload]);
    let table = ReportClient::new(&transport)
        .get_report(&ReportRequest::new("00O3"))
        .unwrap();
    assert_eq!(
        table.rows,
        vec![
            vec![num(1), Scalar::Null, num(5), Scalar::Null],
            vec![Scalar::Null, num(4), Scalar::Null, num(8)],
        ]
    );
}

// ──────────────────────────────────────────────
// Grand total
// ──────────────────────────────────────────────

#[test]
fn total_reads_first_grand_total_aggregate() {
    let mut transport = Scripted::new(tabular_describe("string"), vec![]);
    transport.summary = Some(json!({
        "factMap": {"T!T": {"aggregates": [{"label": "42", "value": 42}]}},
        "reportMetadata": {"aggregates": ["RowCount"]},
        "reportExtendedMetadata": {
            "aggregateColumnInfo": {"RowCount": {"label": "Record Count", "dataType": "int"}}
        }
    }));
    let total = ReportClient::new(&transport).get_total("00O1").unwrap();
    assert_eq!(total, num(42));
    assert_eq!(transport.runs(), 0);
}
