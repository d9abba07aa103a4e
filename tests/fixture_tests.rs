use sql_refs_core::{extract_references, extract_references_tagged, scan_references, Keyword};

const CDR_ORDER_VIEW: &str = include_str!("../demos/cdr_order_view.sql");
const ORDERS_MIXED: &str = include_str!("../demos/orders_mixed.sql");

fn pairs(sql: &str) -> Vec<(String, String)> {
    extract_references(sql)
        .into_iter()
        .map(|r| (r.schema_name, r.table_name))
        .collect()
}

fn owned(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected.iter().map(|(s, t)| (s.to_string(), t.to_string())).collect()
}

#[test]
fn mixed_script_lists_every_table_once_in_order() {
    assert_eq!(
        pairs(ORDERS_MIXED),
        owned(&[
            ("sales", "orders"),
            ("public", "customers"),
            ("temp", "transactions"),
            ("hr", "employees"),
            ("finance", "payroll"),
        ])
    );

    let keywords: Vec<Keyword> = scan_references(ORDERS_MIXED).map(|r| r.keyword).collect();
    assert_eq!(
        keywords,
        vec![Keyword::From, Keyword::Join, Keyword::From, Keyword::Into, Keyword::Update]
    );
}

#[test]
fn view_with_spaced_bracket_names() {
    // three-part names keep their first two parts; names with spaces or
    // colons inside brackets never match
    assert_eq!(
        pairs(CDR_ORDER_VIEW),
        owned(&[("LIB_EDW_RTP", "bv"), ("", "StartEndDate"), ("", "Document")])
    );
}

#[test]
fn records_carry_the_source_tag() {
    let records = extract_references_tagged(ORDERS_MIXED, Some("orders_mixed.sql"));
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.source_tag == "orders_mixed.sql"));
    assert!(extract_references(ORDERS_MIXED).iter().all(|r| r.source_tag == "N/A"));
}

#[test]
fn ddl_keywords_match_generically() {
    let sql = "CREATE TABLE dbo.audit (id INT);\nALTER TABLE [dbo].[audit] ADD note NVARCHAR(10);\nTRUNCATE TABLE staging.audit;";
    assert_eq!(pairs(sql), owned(&[("dbo", "audit"), ("staging", "audit")]));
}
