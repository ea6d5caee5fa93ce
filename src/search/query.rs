//! SELECT compiler
//!
//! [`SearchQuery`] is the query-set analog: a table, a filter tree, optional
//! annotations, ordering and paging, compiled to one parameterized statement.
//!
//! ```text
//! SELECT id, description, pdb.score(id) AS score
//! FROM mock_items
//! WHERE description ||| 'shoes'
//! ORDER BY score DESC
//! LIMIT 5
//! ```

use super::filter::Filter;
use super::functions::Annotation;
use crate::db::{self, JsonRow, SearchBackend};
use crate::error::Result;
use crate::sql::{quote_ident, quote_qualified, SqlParam, SqlQuery};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    table: String,
    key_field: String,
    columns: Vec<String>,
    filters: Vec<Filter>,
    annotations: Vec<(String, Annotation)>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SearchQuery {
    /// Query over `table` keyed by `id`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_field: "id".to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            annotations: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Key field of the BM25 index; used by `pdb.score` and MoreLikeThis.
    pub fn key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a filter; multiple filters are AND-ed.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn annotate(mut self, alias: impl Into<String>, annotation: impl Into<Annotation>) -> Self {
        self.annotations.push((alias.into(), annotation.into()));
        self
    }

    /// Order by a column or alias; a leading `-` sorts descending.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> &str {
        &self.key_field
    }

    pub fn has_search_filter(&self) -> bool {
        self.filters.iter().any(Filter::contains_search)
    }

    pub fn is_ordered(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn is_limited(&self) -> bool {
        self.limit.is_some()
    }

    pub fn to_sql(&self) -> Result<SqlQuery> {
        self.compile(&[], true)
    }

    /// Compile with extra select-list entries; `paged` keeps ORDER BY/LIMIT/OFFSET.
    pub(crate) fn compile(&self, extra: &[(String, Annotation)], paged: bool) -> Result<SqlQuery> {
        let mut params: Vec<SqlParam> = Vec::new();

        let mut select: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.iter().map(|c| quote_ident(c)).collect()
        };
        for (alias, annotation) in self.annotations.iter().chain(extra) {
            select.push(format!(
                "{} AS {}",
                annotation.to_sql(&self.key_field),
                quote_ident(alias)
            ));
        }

        let mut sql = format!("SELECT {} FROM {}", select.join(", "), quote_qualified(&self.table));
        let where_sql = self.where_clause(&mut params)?;
        if let Some(clause) = where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if paged {
            self.push_paging(&mut sql);
        }

        tracing::debug!(sql = %sql, params = params.len(), "Compiled search query");
        Ok(SqlQuery::new(sql, params))
    }

    /// Aggregate-only statement: `SELECT <exprs> FROM <table> WHERE ...`.
    pub(crate) fn compile_aggregate(&self, exprs: &[(String, Annotation)]) -> Result<SqlQuery> {
        let mut params: Vec<SqlParam> = Vec::new();
        let select: Vec<String> = exprs
            .iter()
            .map(|(alias, a)| format!("{} AS {}", a.to_sql(&self.key_field), quote_ident(alias)))
            .collect();
        let mut sql = format!("SELECT {} FROM {}", select.join(", "), quote_qualified(&self.table));
        if let Some(clause) = self.where_clause(&mut params)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        Ok(SqlQuery::new(sql, params))
    }

    fn where_clause(&self, params: &mut Vec<SqlParam>) -> Result<Option<String>> {
        if self.filters.is_empty() {
            return Ok(None);
        }
        let parts = self
            .filters
            .iter()
            .map(|f| f.to_sql(&self.key_field, params))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(parts.join(" AND ")))
    }

    fn push_paging(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|field| match field.strip_prefix('-') {
                    Some(name) => format!("{} DESC", quote_ident(name)),
                    None => quote_ident(field),
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    /// Execute and return rows as JSON objects.
    pub async fn fetch<B: SearchBackend + ?Sized>(&self, backend: &B) -> Result<Vec<JsonRow>> {
        let query = self.to_sql()?;
        db::execute(backend, "search", &query).await
    }
}
