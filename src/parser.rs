use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range of one match: `lo` is the start of the keyword, `hi` the end of
/// the table identifier (closing bracket included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub lo: usize,
    pub hi: usize,
}

/// Clause keywords that introduce a table reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Keyword {
    From,
    Join,
    Into,
    Update,
    Table,
}

impl Keyword {
    pub const ALL: [Keyword; 5] = [
        Keyword::From,
        Keyword::Join,
        Keyword::Into,
        Keyword::Update,
        Keyword::Table,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::From => "FROM",
            Keyword::Join => "JOIN",
            Keyword::Into => "INTO",
            Keyword::Update => "UPDATE",
            Keyword::Table => "TABLE",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema or table name as written in the source, without brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identifier<'a> {
    pub name: &'a str,
    pub bracketed: bool,
}

/// A single keyword + name occurrence, before any deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawReference<'a> {
    pub keyword: Keyword,
    pub schema: Option<Identifier<'a>>,
    pub table: Identifier<'a>,
    pub span: Span,
}

impl<'a> RawReference<'a> {
    /// Schema name, or `""` when the reference is unqualified.
    pub fn schema_name(&self) -> &'a str {
        self.schema.map(|s| s.name).unwrap_or("")
    }

    pub fn table_name(&self) -> &'a str {
        self.table.name
    }
}

/// Iterator over every non-overlapping reference in a SQL text, left to right.
#[derive(Debug, Clone)]
pub struct ReferenceMatches<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Iterator for ReferenceMatches<'a> {
    type Item = RawReference<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.sql.len() {
            if let Some(found) = match_at(self.sql, self.pos) {
                // hi is always past the keyword, so the scan makes progress
                self.pos = found.span.hi;
                return Some(found);
            }
            self.pos += 1;
        }
        None
    }
}

/// Scan `sql` for `KEYWORD <whitespace> [schema.]table` occurrences.
///
/// Purely lexical: comments and string literals are scanned like any other
/// text, and text that does not fit the pattern is skipped silently.
pub fn scan_references(sql: &str) -> ReferenceMatches<'_> {
    ReferenceMatches { sql, pos: 0 }
}

pub trait Visitor {
    fn visit(&mut self, reference: &RawReference<'_>);
}

pub fn traverse_references(sql: &str, visitor: &mut dyn Visitor) {
    for reference in scan_references(sql) {
        visitor.visit(&reference);
    }
}

fn match_at(sql: &str, start: usize) -> Option<RawReference<'_>> {
    let (keyword, after_keyword) = keyword_at(sql.as_bytes(), start)?;
    let name_start = skip_whitespace(sql, after_keyword)?;
    let (schema, table, hi) = qualified_name_at(sql, name_start)?;
    Some(RawReference {
        keyword,
        schema,
        table,
        span: Span { lo: start, hi },
    })
}

fn keyword_at(bytes: &[u8], pos: usize) -> Option<(Keyword, usize)> {
    Keyword::ALL.iter().find_map(|&keyword| {
        let text = keyword.as_str().as_bytes();
        let end = pos + text.len();
        (end <= bytes.len() && bytes[pos..end].eq_ignore_ascii_case(text)).then_some((keyword, end))
    })
}

/// Requires at least one whitespace character. `pos` always follows an ASCII
/// keyword, so it sits on a char boundary.
fn skip_whitespace(sql: &str, pos: usize) -> Option<usize> {
    let rest = &sql[pos..];
    let skipped = rest.len() - rest.trim_start().len();
    (skipped > 0).then_some(pos + skipped)
}

/// `[schema.]table`. When a schema and dot parse but no table follows, the
/// first identifier is taken as the table instead.
fn qualified_name_at(sql: &str, pos: usize) -> Option<(Option<Identifier<'_>>, Identifier<'_>, usize)> {
    let (first, after_first) = identifier_at(sql, pos)?;
    if sql.as_bytes().get(after_first) == Some(&b'.') {
        if let Some((table, end)) = identifier_at(sql, after_first + 1) {
            return Some((Some(first), table, end));
        }
    }
    Some((None, first, after_first))
}

fn identifier_at(sql: &str, pos: usize) -> Option<(Identifier<'_>, usize)> {
    let bytes = sql.as_bytes();
    if *bytes.get(pos)? == b'[' {
        let name_end = bare_name_end(bytes, pos + 1)?;
        if bytes.get(name_end) != Some(&b']') {
            return None;
        }
        let ident = Identifier { name: &sql[pos + 1..name_end], bracketed: true };
        Some((ident, name_end + 1))
    } else {
        let name_end = bare_name_end(bytes, pos)?;
        Some((Identifier { name: &sql[pos..name_end], bracketed: false }, name_end))
    }
}

/// End of the longest `[A-Za-z_][A-Za-z0-9_]*` run starting at `pos`.
fn bare_name_end(bytes: &[u8], pos: usize) -> Option<usize> {
    let first = *bytes.get(pos)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let tail = bytes[pos + 1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    Some(pos + 1 + tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(sql: &str) -> Vec<(&str, &str)> {
        scan_references(sql).map(|r| (r.schema_name(), r.table_name())).collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let sql = "select * from a; Join b; insert INTO c; uPdAtE d; create table e";
        let found: Vec<Keyword> = scan_references(sql).map(|r| r.keyword).collect();
        assert_eq!(found, Keyword::ALL.to_vec());
        assert_eq!(pairs(sql), vec![("", "a"), ("", "b"), ("", "c"), ("", "d"), ("", "e")]);
    }

    #[test]
    fn test_keyword_needs_whitespace() {
        assert!(pairs("SELECT FROMx, [FROM]t FROM").is_empty());
        assert_eq!(pairs("FROM\n\t  orders"), vec![("", "orders")]);
        // non-breaking space counts as whitespace
        assert_eq!(pairs("FROM\u{00A0}orders"), vec![("", "orders")]);
    }

    #[test]
    fn test_bracket_and_bare_combinations() {
        assert_eq!(pairs("FROM [s].[t]"), vec![("s", "t")]);
        assert_eq!(pairs("FROM s.[t]"), vec![("s", "t")]);
        assert_eq!(pairs("FROM [s].t"), vec![("s", "t")]);
        assert_eq!(pairs("FROM s.t"), vec![("s", "t")]);
        assert_eq!(pairs("FROM [t]"), vec![("", "t")]);

        let r = scan_references("JOIN public.[customers] c").next().unwrap();
        assert_eq!(r.schema, Some(Identifier { name: "public", bracketed: false }));
        assert_eq!(r.table, Identifier { name: "customers", bracketed: true });
    }

    #[test]
    fn test_schema_falls_back_to_table() {
        assert_eq!(pairs("FROM a.[b c]"), vec![("", "a")]);
        assert_eq!(pairs("FROM [a]."), vec![("", "a")]);
        assert_eq!(pairs("FROM db.dbo.orders"), vec![("db", "dbo")]);
    }

    #[test]
    fn test_malformed_names_do_not_match() {
        assert!(pairs("DELETE FROM [x y]").is_empty());
        assert!(pairs("INSERT INTO #tmp").is_empty());
        assert!(pairs("FROM [unclosed").is_empty());
        assert!(pairs("FROM 1abc").is_empty());
        assert_eq!(pairs("FROM _t1"), vec![("", "_t1")]);
        assert_eq!(pairs("FROM a-b"), vec![("", "a")]);
    }

    #[test]
    fn test_no_word_boundary_and_non_overlap() {
        assert_eq!(pairs("xFROM a"), vec![("", "a")]);
        // the second FROM is consumed as the table name
        assert_eq!(pairs("FROM FROM a"), vec![("", "FROM")]);
    }

    #[test]
    fn test_spans() {
        let sql = "SELECT * FROM [sales].[orders] o";
        let r = scan_references(sql).next().unwrap();
        assert_eq!(r.span, Span { lo: 9, hi: 30 });
        assert_eq!(&sql[r.span.lo..r.span.hi], "FROM [sales].[orders]");
    }

    #[test]
    fn test_non_ascii_text_is_skipped_safely() {
        let sql = "SELECT 'café' FROM ñandú; SELECT 1 FROM t_é JOIN ü.x";
        assert_eq!(pairs(sql), vec![("", "t_")]);
    }

    #[test]
    fn test_visitor_sees_every_occurrence() {
        struct Collect(Vec<String>);
        impl Visitor for Collect {
            fn visit(&mut self, reference: &RawReference<'_>) {
                self.0.push(format!("{} {}", reference.keyword, reference.table_name()));
            }
        }

        let mut visitor = Collect(Vec::new());
        traverse_references("SELECT * FROM t JOIN t ON 1 = 1", &mut visitor);
        assert_eq!(visitor.0, vec!["FROM t", "JOIN t"]);
    }
}
