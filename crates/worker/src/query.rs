//! Paged query construction.

use multiscan_common::{DataSource, Error, FilterParams, ReaderSettings, Result};
use sqlparser::ast::{Expr, Ident};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::time::Duration;

/// One bounded slice of a source's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    pub offset: u64,
    pub page_size: u64,
    /// Key range of a key-split source.
    pub filter: Option<FilterParams>,
}

/// SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<i64>,
}

/// Everything a row producer needs to run one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedQuery {
    pub sql: String,
    pub params: Vec<i64>,
    pub window: QueryWindow,
    /// Advisory, zero leaves it to the driver.
    pub fetch_size: u32,
    pub query_timeout: Option<Duration>,
}

/// Turns a source and a window into a query the row producer understands.
pub trait QueryBuilder: Send + Sync {
    fn build(&self, source: &DataSource, window: &QueryWindow) -> Result<BoundQuery>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSyntax {
    /// `LIMIT n OFFSET m`
    #[default]
    LimitOffset,
    /// `ORDER BY (SELECT NULL) OFFSET m ROWS FETCH NEXT n ROWS ONLY`, the SQL
    /// Server form. Oracle needs `FROM DUAL` in the subquery and is not
    /// covered.
    OffsetFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `?`
    #[default]
    QuestionMark,
    /// `$1`, `$2`, ...
    Dollar,
}

/// Builds plain `SELECT` statements. Key-split sources are narrowed with
/// `mod(split_key, p1) = p2` where `[p1, p2]` are the source's filter params.
#[derive(Debug, Clone)]
pub struct GenericQueryBuilder {
    split_key: Option<String>,
    where_clause: Option<String>,
    page_syntax: PageSyntax,
    param_style: ParamStyle,
    quote: Option<char>,
}

impl GenericQueryBuilder {
    pub fn try_new(split_key: Option<&str>, where_clause: Option<&str>) -> Result<Self> {
        let split_key = match split_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => match parse_complete_expr(key)? {
                Expr::Identifier(_) | Expr::CompoundIdentifier(_) => Some(key.to_string()),
                other => {
                    return Err(Error::configuration(format!(
                        "split key must be a column name, got '{}'",
                        other
                    )))
                }
            },
            None => None,
        };

        let where_clause = match where_clause.map(str::trim).filter(|w| !w.is_empty()) {
            Some(filter) => {
                parse_complete_expr(filter)?;
                Some(filter.to_string())
            }
            None => None,
        };

        Ok(Self {
            split_key,
            where_clause,
            page_syntax: PageSyntax::default(),
            param_style: ParamStyle::default(),
            quote: Some('"'),
        })
    }

    /// Uses the split key and where clause from the reader settings, so the
    /// builder filters on the same key the planner split by.
    pub fn from_settings(settings: &ReaderSettings) -> Result<Self> {
        Self::try_new(settings.split_key(), settings.where_clause.as_deref())
    }

    pub fn with_page_syntax(mut self, page_syntax: PageSyntax) -> Self {
        self.page_syntax = page_syntax;
        self
    }

    pub fn with_param_style(mut self, param_style: ParamStyle) -> Self {
        self.param_style = param_style;
        self
    }

    /// Quote character for table and column names, `None` to leave them
    /// unquoted.
    pub fn with_quote(mut self, quote: Option<char>) -> Self {
        self.quote = quote;
        self
    }

    fn ident(&self, name: &str) -> String {
        match self.quote {
            Some(q) => name
                .split('.')
                .map(|part| Ident::with_quote(q, part).to_string())
                .collect::<Vec<_>>()
                .join("."),
            None => name.to_string(),
        }
    }

    fn placeholder(&self, position: usize) -> String {
        match self.param_style {
            ParamStyle::QuestionMark => "?".to_string(),
            ParamStyle::Dollar => format!("${}", position),
        }
    }
}

impl QueryBuilder for GenericQueryBuilder {
    fn build(&self, source: &DataSource, window: &QueryWindow) -> Result<BoundQuery> {
        let columns = if source.columns.is_empty() {
            "*".to_string()
        } else {
            source
                .columns
                .iter()
                .map(|c| self.ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, self.ident(&source.table));
        let mut predicates = Vec::new();
        if let Some(filter) = &self.where_clause {
            predicates.push(format!("({})", filter));
        }

        let mut params = Vec::new();
        if source.split_by_key {
            let key = self.split_key.as_deref().ok_or_else(|| {
                Error::query(format!(
                    "source '{}' is key split but no split key is configured",
                    source.table
                ))
            })?;
            let range = window.filter.as_ref().ok_or_else(|| {
                Error::query(format!(
                    "source '{}' is key split but has no filter params",
                    source.table
                ))
            })?;
            let [modulus, remainder] = range.values() else {
                return Err(Error::query(format!(
                    "expected 2 filter params for '{}', got {}",
                    source.table,
                    range.values().len()
                )));
            };
            predicates.push(format!(
                "mod({}, {}) = {}",
                key,
                self.placeholder(1),
                self.placeholder(2)
            ));
            params.extend([*modulus, *remainder]);
        }

        if !predicates.is_empty() {
            sql.push_str(&format!(" WHERE {}", predicates.join(" AND ")));
        }

        sql.push_str(&match self.page_syntax {
            PageSyntax::LimitOffset => {
                format!(" LIMIT {} OFFSET {}", window.page_size, window.offset)
            }
            PageSyntax::OffsetFetch => format!(
                " ORDER BY (SELECT NULL) OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                window.offset, window.page_size
            ),
        });

        Ok(BoundQuery { sql, params })
    }
}

/// Parses `sql` as a single expression, rejecting trailing tokens.
fn parse_complete_expr(sql: &str) -> Result<Expr> {
    let dialect = GenericDialect {};
    let mut parser = Parser::new(&dialect).try_with_sql(sql)?;
    let expr = parser.parse_expr()?;
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(Error::configuration(format!(
            "unexpected '{}' after expression '{}'",
            next.token, expr
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(offset: u64, filter: Option<FilterParams>) -> QueryWindow {
        QueryWindow {
            offset,
            page_size: 100,
            filter,
        }
    }

    #[test]
    fn test_plain_select_all_columns() {
        let builder = GenericQueryBuilder::try_new(None, None).unwrap();
        let source = DataSource::new("mem://db", "u", "p", "orders");
        let query = builder.build(&source, &window(200, None)).unwrap();
        assert_eq!(query.sql, r#"SELECT * FROM "orders" LIMIT 100 OFFSET 200"#);
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_key_split_with_filter() {
        let builder = GenericQueryBuilder::try_new(Some("id"), Some("status = 'open'"))
            .unwrap()
            .with_param_style(ParamStyle::Dollar);
        let source = DataSource::new("mem://db", "u", "p", "public.orders")
            .with_columns(vec!["id".to_string(), "total".to_string()])
            .key_range_clone(FilterParams::new(vec![4, 3]));
        let query = builder
            .build(&source, &window(0, source.key_range().cloned()))
            .unwrap();
        assert_eq!(
            query.sql,
            r#"SELECT "id", "total" FROM "public"."orders" WHERE (status = 'open') AND mod(id, $1) = $2 LIMIT 100 OFFSET 0"#
        );
        assert_eq!(query.params, vec![4, 3]);
    }

    #[test]
    fn test_offset_fetch_unquoted() {
        let builder = GenericQueryBuilder::try_new(None, None)
            .unwrap()
            .with_page_syntax(PageSyntax::OffsetFetch)
            .with_quote(None);
        let source = DataSource::new("mem://db", "u", "p", "orders");
        let query = builder.build(&source, &window(10, None)).unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM orders ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 100 ROWS ONLY"
        );
    }

    #[test]
    fn test_invalid_split_key_rejected() {
        let err = GenericQueryBuilder::try_new(Some("id + 1"), None).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {err}");
    }

    #[test]
    fn test_invalid_where_clause_rejected() {
        let err = GenericQueryBuilder::try_new(None, Some("a = 1 b")).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {err}");

        let err = GenericQueryBuilder::try_new(None, Some("a = ")).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {err}");
    }

    #[test]
    fn test_key_split_without_params_is_query_error() {
        let builder = GenericQueryBuilder::try_new(Some("id"), None).unwrap();
        let mut source = DataSource::new("mem://db", "u", "p", "orders");
        source.split_by_key = true;
        let err = builder.build(&source, &window(0, None)).unwrap_err();
        assert!(matches!(err, Error::Query(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_builder_from_settings() {
        let settings = ReaderSettings::from_toml_str(
            r#"
            num_partitions = 2
            split_key = "id"
            where_clause = "status = 'open'"

            [[sources]]
            url = "mem://db"
            table = "orders"
            "#,
        )
        .unwrap();
        let builder = GenericQueryBuilder::from_settings(&settings).unwrap();
        let source = settings.data_sources()[0].key_range_clone(FilterParams::new(vec![2, 1]));
        let query = builder
            .build(&source, &window(0, source.key_range().cloned()))
            .unwrap();
        assert_eq!(
            query.sql,
            r#"SELECT * FROM "orders" WHERE (status = 'open') AND mod(id, ?) = ? LIMIT 100 OFFSET 0"#
        );
        assert_eq!(query.params, vec![2, 1]);
    }
}
