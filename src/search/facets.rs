//! Facets
//!
//! Terms aggregations computed by `pdb.agg()` next to a ParadeDB search.
//!
//! Without rows, one aggregate-only statement is issued and each alias is
//! unwrapped. With rows, every spec rides along as a window aggregate
//! (`pdb.agg(...) OVER ()`), the statement runs once, and the internal alias
//! columns are stripped from the rows before they are returned.

use std::collections::HashSet;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use super::functions::{canonical_json, Agg, Annotation};
use super::query::SearchQuery;
use crate::db::{self, JsonRow, SearchBackend};
use crate::error::{Result, SearchError};
use crate::metrics;

/// Alias used for a single facet spec or a raw `agg`.
pub const FACETS_ALIAS: &str = "_paradedb_facets";

/// Bucket ordering for a terms facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetOrder {
    CountAsc,
    CountDesc,
    KeyAsc,
    KeyDesc,
}

impl FacetOrder {
    fn to_json(self) -> Value {
        match self {
            FacetOrder::CountAsc => json!({"_count": "asc"}),
            FacetOrder::CountDesc => json!({"_count": "desc"}),
            FacetOrder::KeyAsc => json!({"_key": "asc"}),
            FacetOrder::KeyDesc => json!({"_key": "desc"}),
        }
    }
}

impl FromStr for FacetOrder {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "count" => Ok(FacetOrder::CountAsc),
            "-count" => Ok(FacetOrder::CountDesc),
            "key" => Ok(FacetOrder::KeyAsc),
            "-key" => Ok(FacetOrder::KeyDesc),
            _ => Err(SearchError::value("Facet order must be count, -count, key, or -key.")),
        }
    }
}

/// What to aggregate and whether to return rows alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetRequest {
    fields: Vec<String>,
    size: Option<u64>,
    order: Option<FacetOrder>,
    missing: Option<Value>,
    agg: Option<String>,
    exact: Option<bool>,
    include_rows: bool,
}

impl Default for FacetRequest {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            size: Some(10),
            order: Some(FacetOrder::CountDesc),
            missing: None,
            agg: None,
            exact: None,
            include_rows: true,
        }
    }
}

impl FacetRequest {
    /// Terms facets over `fields` (size 10, most frequent first, with rows).
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Caller-supplied aggregation JSON, passed through unchanged.
    pub fn raw(agg: impl Into<String>) -> Self {
        Self {
            agg: Some(agg.into()),
            ..Default::default()
        }
    }

    /// Caller-supplied aggregation object, serialized with sorted keys.
    pub fn raw_value(agg: &Value) -> Self {
        Self::raw(canonical_json(agg))
    }

    pub fn size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn order(mut self, order: Option<FacetOrder>) -> Self {
        self.order = order;
        self
    }

    /// Bucket for rows where the field is missing.
    pub fn missing(mut self, missing: impl Into<Value>) -> Self {
        self.missing = Some(missing.into());
        self
    }

    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = Some(exact);
        self
    }

    pub fn include_rows(mut self, include_rows: bool) -> Self {
        self.include_rows = include_rows;
        self
    }

    /// `(alias, field, agg)` per spec; `field` is `None` for a raw `agg`.
    pub fn specs(&self) -> Result<Vec<(String, Option<String>, Agg)>> {
        if let Some(raw) = &self.agg {
            return Ok(vec![(FACETS_ALIAS.to_string(), None, self.make_agg(raw.clone()))]);
        }
        if self.fields.is_empty() {
            return Err(SearchError::value("facets() requires fields or agg."));
        }
        let mut seen = HashSet::new();
        if !self.fields.iter().all(|f| seen.insert(f.as_str())) {
            return Err(SearchError::value("Facet fields must be unique."));
        }

        let single = self.fields.len() == 1;
        Ok(self
            .fields
            .iter()
            .map(|field| {
                let mut terms = Map::new();
                terms.insert("field".into(), Value::String(field.clone()));
                if let Some(size) = self.size {
                    terms.insert("size".into(), json!(size));
                }
                if let Some(order) = self.order {
                    terms.insert("order".into(), order.to_json());
                }
                if let Some(missing) = &self.missing {
                    terms.insert("missing".into(), missing.clone());
                }
                let spec = canonical_json(&json!({"terms": terms}));
                let alias = if single {
                    FACETS_ALIAS.to_string()
                } else {
                    format!("{field}_terms")
                };
                (alias, Some(field.clone()), self.make_agg(spec))
            })
            .collect())
    }

    fn make_agg(&self, spec: String) -> Agg {
        match self.exact {
            Some(exact) => Agg::new(spec).exact(exact),
            None => Agg::new(spec),
        }
    }
}

/// Facet payload, plus the rows when they were requested
#[derive(Debug, Clone, PartialEq)]
pub struct FacetResult {
    pub rows: Option<Vec<JsonRow>>,
    /// Field name to aggregate result, or the raw `agg` result as returned
    pub facets: Value,
}

impl SearchQuery {
    /// Statement that computes only the aggregates.
    pub fn facets_sql(&self, request: &FacetRequest) -> Result<crate::sql::SqlQuery> {
        self.check_facet_preconditions(request, false)?;
        let exprs: Vec<(String, Annotation)> = request
            .specs()?
            .into_iter()
            .map(|(alias, _, agg)| (alias, Annotation::Agg(agg)))
            .collect();
        self.compile_aggregate(&exprs)
    }

    /// Statement returning the rows with every aggregate as a window column.
    pub fn facets_with_rows_sql(&self, request: &FacetRequest) -> Result<crate::sql::SqlQuery> {
        self.check_facet_preconditions(request, true)?;
        let exprs: Vec<(String, Annotation)> = request
            .specs()?
            .into_iter()
            .map(|(alias, _, agg)| (alias, Annotation::Agg(agg.over_all())))
            .collect();
        self.compile(&exprs, true)
    }

    fn check_facet_preconditions(&self, request: &FacetRequest, with_rows: bool) -> Result<()> {
        if !self.has_search_filter() {
            return Err(SearchError::precondition(
                "facets() requires a ParadeDB operator in the query filter.",
            ));
        }
        if with_rows && !(self.is_ordered() && self.is_limited()) {
            return Err(SearchError::precondition(
                "facets(include_rows=true) requires order_by() and a LIMIT.",
            ));
        }
        request.specs().map(|_| ())
    }

    /// Run the facet request.
    #[tracing::instrument(skip(self, backend, request), fields(table = %self.table()))]
    pub async fn facets<B: SearchBackend + ?Sized>(
        &self,
        backend: &B,
        request: &FacetRequest,
    ) -> Result<FacetResult> {
        let specs = request.specs()?;

        if !request.include_rows {
            let query = self.facets_sql(request)?;
            let rows = db::execute(backend, "facets", &query).await?;
            let facets = collect_facets(rows.first(), &specs);
            return Ok(FacetResult { rows: None, facets });
        }

        let query = self.facets_with_rows_sql(request)?;
        let mut rows = db::execute(backend, "facets", &query).await?;
        metrics::record_facet_rows(rows.len());

        let facets = if rows.is_empty() {
            tracing::debug!("No rows matched; computing facets without rows");
            let query = self.facets_sql(request)?;
            let agg_rows = db::execute(backend, "facets", &query).await?;
            collect_facets(agg_rows.first(), &specs)
        } else {
            collect_facets(rows.first(), &specs)
        };

        for row in &mut rows {
            for (alias, _, _) in &specs {
                row.remove(alias);
            }
        }

        Ok(FacetResult {
            rows: Some(rows),
            facets,
        })
    }
}

fn collect_facets(row: Option<&JsonRow>, specs: &[(String, Option<String>, Agg)]) -> Value {
    let lookup = |alias: &str| {
        row.and_then(|r| r.get(alias))
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    };

    match specs {
        [(alias, None, _)] => lookup(alias.as_str()),
        _ => Value::Object(
            specs
                .iter()
                .filter_map(|(alias, field, _)| {
                    field.as_ref().map(|f| (f.clone(), lookup(alias.as_str())))
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{row, MockBackend};
    use crate::search::{Filter, ParadeDb};

    fn searched() -> SearchQuery {
        SearchQuery::new("mock_items")
            .filter(Filter::search("description", ParadeDb::term("shoes")))
    }

    #[test]
    fn test_single_field_spec() {
        let specs = FacetRequest::fields(["category"]).specs().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].0, FACETS_ALIAS);
        assert_eq!(
            specs[0].2.spec(),
            r#"{"terms":{"field":"category","order":{"_count":"desc"},"size":10}}"#
        );
    }

    #[test]
    fn test_multiple_field_aliases() {
        let specs = FacetRequest::fields(["category", "rating"]).specs().unwrap();
        let aliases: Vec<&str> = specs.iter().map(|s| s.0.as_str()).collect();
        assert_eq!(aliases, ["category_terms", "rating_terms"]);
    }

    #[test]
    fn test_spec_options() {
        let specs = FacetRequest::fields(["category"])
            .size(None)
            .order(Some(FacetOrder::KeyAsc))
            .missing("n/a")
            .specs()
            .unwrap();
        assert_eq!(
            specs[0].2.spec(),
            r#"{"terms":{"field":"category","missing":"n/a","order":{"_key":"asc"}}}"#
        );
    }

    #[test]
    fn test_spec_errors() {
        assert!(FacetRequest::fields(Vec::<String>::new()).specs().is_err());
        let err = FacetRequest::fields(["a", "a"]).specs().unwrap_err();
        assert!(err.to_string().contains("unique"));
        let err = "popularity".parse::<FacetOrder>().unwrap_err();
        assert!(err.to_string().contains("count, -count, key, or -key"));
    }

    #[test]
    fn test_raw_agg_sorted() {
        let request = FacetRequest::raw_value(&json!({
            "b": {"terms": {"field": "x"}},
            "a": {"avg": {"field": "y"}}
        }));
        let specs = request.specs().unwrap();
        assert_eq!(specs[0].2.spec(), r#"{"a":{"avg":{"field":"y"}},"b":{"terms":{"field":"x"}}}"#);
    }

    #[test]
    fn test_preconditions() {
        let plain = SearchQuery::new("mock_items").filter(Filter::eq("id", 1));
        let err = plain.facets_sql(&FacetRequest::fields(["category"])).unwrap_err();
        assert!(matches!(err, SearchError::Precondition(_)));
        assert!(err.to_string().contains("ParadeDB operator"));

        let err = searched()
            .facets_with_rows_sql(&FacetRequest::fields(["category"]))
            .unwrap_err();
        assert!(err.to_string().contains("order_by() and a LIMIT"));
    }

    #[test]
    fn test_aggregate_only_sql() {
        let sql = searched()
            .order_by("id")
            .limit(5)
            .facets_sql(&FacetRequest::fields(["category"]).exact(false))
            .unwrap()
            .sql;
        assert_eq!(
            sql,
            "SELECT pdb.agg('{\"terms\":{\"field\":\"category\",\
             \"order\":{\"_count\":\"desc\"},\"size\":10}}', false) \
             AS _paradedb_facets FROM mock_items WHERE description &&& 'shoes'"
        );
    }

    #[test]
    fn test_with_rows_sql_uses_window() {
        let sql = searched()
            .order_by("id")
            .limit(5)
            .facets_with_rows_sql(&FacetRequest::fields(["category"]))
            .unwrap()
            .sql;
        assert!(sql.starts_with("SELECT *, pdb.agg("));
        assert!(sql.contains(" OVER () AS _paradedb_facets FROM mock_items"));
        assert!(sql.ends_with("ORDER BY id LIMIT 5"));
    }

    #[tokio::test]
    async fn test_facets_strip_alias_from_rows() {
        let buckets = json!({"buckets": [{"key": "Footwear", "doc_count": 2}]});
        let backend = MockBackend::with_replies(vec![vec![
            row(json!({"id": 1, "_paradedb_facets": buckets.clone()})),
            row(json!({"id": 2, "_paradedb_facets": buckets.clone()})),
        ]]);
        let query = searched().order_by("id").limit(10);

        let result = query
            .facets(&backend, &FacetRequest::fields(["category"]))
            .await
            .unwrap();

        let rows = result.rows.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.contains_key(FACETS_ALIAS)));
        assert_eq!(result.facets, json!({"category": buckets}));
        assert_eq!(backend.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_facets_fall_back_when_no_rows() {
        let payload = json!({"buckets": []});
        let backend = MockBackend::with_replies(vec![
            vec![],
            vec![row(json!({"category_terms": payload.clone(), "rating_terms": null}))],
        ]);
        let query = searched().order_by("id").limit(10);

        let result = query
            .facets(&backend, &FacetRequest::fields(["category", "rating"]))
            .await
            .unwrap();

        assert_eq!(result.rows, Some(vec![]));
        assert_eq!(result.facets, json!({"category": payload, "rating": {}}));
        let statements = backend.statements();
        assert_eq!(statements.len(), 2);
        assert!(!statements[1].contains("OVER ()"));
    }

    #[tokio::test]
    async fn test_facets_without_rows() {
        let backend =
            MockBackend::with_replies(vec![vec![row(json!({"_paradedb_facets": {"value": 3}}))]]);
        let request = FacetRequest::raw(r#"{"value_count":{"field":"id"}}"#).include_rows(false);

        let result = searched().facets(&backend, &request).await.unwrap();

        assert!(result.rows.is_none());
        assert_eq!(result.facets, json!({"value": 3}));
    }
}
