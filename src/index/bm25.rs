// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! BM25 index DDL
//!
//! Turns a declarative field mapping into `CREATE INDEX ... USING bm25`.
//!
//! ```text
//! CREATE INDEX products_idx ON products
//! USING bm25 (
//!     id,
//!     (description::pdb.simple('lowercase=true,stemmer=english')),
//!     ((metadata->>'title')::pdb.simple('alias=metadata_title'))
//! )
//! WITH (key_field='id', text_fields='{"description":{"fast":true}}')
//! ```
//!
//! Per field, exactly one shape applies: a bare column, a single tokenizer
//! cast, a list of tokenizer casts (`tokenizers`), or JSON sub-keys
//! (`json_keys`), each needing its own tokenizer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SearchError};
use crate::sql::{is_identifier, quote_ident, quote_literal, quote_qualified, Literal};

/// Storage category used to group fast-field hints in the WITH clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Numeric,
    Boolean,
    Datetime,
    Json,
}

impl FieldKind {
    const ALL: [FieldKind; 5] = [
        FieldKind::Text,
        FieldKind::Numeric,
        FieldKind::Boolean,
        FieldKind::Datetime,
        FieldKind::Json,
    ];

    fn option_name(self) -> &'static str {
        match self {
            FieldKind::Text => "text_fields",
            FieldKind::Numeric => "numeric_fields",
            FieldKind::Boolean => "boolean_fields",
            FieldKind::Datetime => "datetime_fields",
            FieldKind::Json => "json_fields",
        }
    }
}

/// One tokenizer cast: `pdb.<tokenizer>(<args>, '<config>')`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    pub tokenizer: Option<String>,
    /// Positional arguments, rendered as SQL literals
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// `key=value` entries of the trailing config string, in order
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub named_args: Map<String, Value>,
    /// Token filters switched on (`lowercase=true`); `stemmer` takes the stemmer language
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    pub stemmer: Option<String>,
    pub alias: Option<String>,
}

impl TokenizerConfig {
    pub fn new(tokenizer: impl Into<String>) -> Self {
        Self {
            tokenizer: Some(tokenizer.into()),
            ..Default::default()
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn named_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named_args.insert(key.into(), value.into());
        self
    }

    pub fn filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn stemmer(mut self, stemmer: impl Into<String>) -> Self {
        self.stemmer = Some(stemmer.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn has_settings(&self) -> bool {
        !self.args.is_empty()
            || !self.named_args.is_empty()
            || !self.filters.is_empty()
            || self.stemmer.is_some()
            || self.alias.is_some()
    }

    fn is_empty(&self) -> bool {
        self.tokenizer.is_none() && !self.has_settings()
    }

    /// `pdb.simple('alias=x,lowercase=true')`, using `default_alias` when none is set.
    fn render(&self, field: &str, default_alias: Option<&str>) -> Result<String> {
        let tokenizer = self.tokenizer.as_deref().ok_or_else(|| {
            SearchError::value(format!(
                "Field '{field}' specifies filters, stemmer, args, named_args or alias \
                 but no tokenizer. Please set an explicit tokenizer \
                 (e.g. 'unicode_words', 'simple', 'literal')."
            ))
        })?;

        if !is_identifier(tokenizer) {
            if !tokenizer.contains('(') {
                return Err(SearchError::value(format!(
                    "Field '{field}' tokenizer must be a valid identifier, got {tokenizer:?}."
                )));
            }
            if self.has_settings() || default_alias.is_some() {
                return Err(SearchError::value(format!(
                    "Field '{field}' uses a pre-rendered tokenizer {tokenizer:?}; \
                     args, named_args, filters, stemmer and alias cannot be added to it."
                )));
            }
            return Ok(format!("pdb.{tokenizer}"));
        }

        let mut args = self
            .args
            .iter()
            .map(|v| Literal::from_json(v).map(|l| l.to_sql()))
            .collect::<Result<Vec<_>>>()?;

        let config = self.config_entries(default_alias)?;
        if !config.is_empty() {
            args.push(quote_literal(&config.join(",")));
        }

        if args.is_empty() {
            Ok(format!("pdb.{tokenizer}"))
        } else {
            Ok(format!("pdb.{tokenizer}({})", args.join(",")))
        }
    }

    fn config_entries(&self, default_alias: Option<&str>) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        if let Some(alias) = self.alias.as_deref().or(default_alias) {
            parts.push(format!("alias={alias}"));
        }

        let mut stemmer_done = false;
        for name in &self.filters {
            match (name.as_str(), &self.stemmer) {
                ("stemmer", Some(stemmer)) => {
                    parts.push(format!("stemmer={stemmer}"));
                    stemmer_done = true;
                }
                _ => parts.push(format!("{name}=true")),
            }
        }

        for (key, value) in &self.named_args {
            parts.push(format!("{key}={}", config_value(key, value)?));
        }

        if let (Some(stemmer), false) = (&self.stemmer, stemmer_done) {
            parts.push(format!("stemmer={stemmer}"));
        }
        Ok(parts)
    }
}

fn config_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(items) => items
            .iter()
            .map(|item| config_value(key, item))
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(",")),
        _ => Err(SearchError::value(format!(
            "named_args value for '{key}' must be a string, number, boolean or list."
        ))),
    }
}

/// Index configuration for one model field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldConfig {
    pub tokenizer: TokenizerConfig,
    /// Column name when it differs from the field name
    pub column: Option<String>,
    /// Fast-field hint; only booleans are honored
    pub fast: Option<Value>,
    pub kind: Option<FieldKind>,
    /// JSON sub-keys indexed as `(column->>'key')`
    pub json_keys: Vec<(String, TokenizerConfig)>,
    /// Several tokenizer casts of the same column
    pub tokenizers: Vec<TokenizerConfig>,
}

impl FieldConfig {
    /// Bare column, indexed with the default tokenizer.
    pub fn column() -> Self {
        Self::default()
    }

    pub fn with_tokenizer(config: TokenizerConfig) -> Self {
        Self {
            tokenizer: config,
            ..Default::default()
        }
    }

    pub fn tokenizers(configs: Vec<TokenizerConfig>) -> Self {
        Self {
            tokenizers: configs,
            ..Default::default()
        }
    }

    pub fn json_key(mut self, key: impl Into<String>, config: TokenizerConfig) -> Self {
        self.json_keys.push((key.into(), config));
        self
    }

    pub fn column_name(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn fast(mut self, fast: bool, kind: FieldKind) -> Self {
        self.fast = Some(Value::Bool(fast));
        self.kind = Some(kind);
        self
    }

    /// Parse one field entry of a JSON index declaration.
    pub fn from_json(field: &str, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            SearchError::value(format!("Field '{field}' configuration must be an object."))
        })?;
        if object.contains_key("options") {
            return Err(SearchError::value(format!(
                "Field '{field}' uses the deprecated 'options' key; use 'named_args' instead."
            )));
        }

        let mut rest = object.clone();
        let column = match rest.remove("column") {
            Some(Value::String(s)) => Some(s),
            Some(_) => {
                return Err(SearchError::value(format!("Field '{field}' column must be a string.")))
            }
            None => None,
        };
        let fast = rest.remove("fast");
        let kind: Option<FieldKind> = rest.remove("kind").map(serde_json::from_value).transpose()?;

        let json_keys = match rest.remove("json_keys") {
            Some(Value::Object(keys)) => keys
                .into_iter()
                .map(|(k, v)| Ok((k, serde_json::from_value::<TokenizerConfig>(v)?)))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(SearchError::value(format!(
                    "Field '{field}' json_keys must be an object."
                )))
            }
            None => Vec::new(),
        };

        let tokenizers = match rest.remove("tokenizers") {
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    return Err(SearchError::value(format!(
                        "Field '{field}' tokenizers list cannot be empty."
                    )));
                }
                items
                    .into_iter()
                    .map(|item| {
                        if !item.is_object() {
                            return Err(SearchError::value(format!(
                                "Field '{field}' tokenizers entries must be objects \
                                 with a 'tokenizer' key."
                            )));
                        }
                        Ok(serde_json::from_value::<TokenizerConfig>(item)?)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            Some(_) => {
                return Err(SearchError::value(format!(
                    "Field '{field}' tokenizers must be a list."
                )))
            }
            None => Vec::new(),
        };

        let tokenizer: TokenizerConfig = serde_json::from_value(Value::Object(rest))?;

        Ok(Self {
            tokenizer,
            column,
            fast,
            kind,
            json_keys,
            tokenizers,
        })
    }

    /// Index expressions contributed by this field.
    fn expressions(&self, field: &str) -> Result<Vec<String>> {
        let column = quote_ident(self.column.as_deref().unwrap_or(field));

        if !self.json_keys.is_empty() {
            if !self.tokenizer.is_empty() || !self.tokenizers.is_empty() {
                return Err(SearchError::value(format!(
                    "Field '{field}' cannot mix 'json_keys' with other tokenizer settings."
                )));
            }
            return self
                .json_keys
                .iter()
                .map(|(key, config)| {
                    if config.tokenizer.is_none() {
                        return Err(SearchError::value(format!(
                            "JSON key '{key}' in field '{field}' requires an explicit tokenizer \
                             (e.g. 'unicode_words', 'simple', 'literal')."
                        )));
                    }
                    let alias = format!("{field}_{key}");
                    let cast = config.render(field, Some(&alias))?;
                    Ok(format!("(({column}->>{})::{cast})", quote_literal(key)))
                })
                .collect();
        }

        if !self.tokenizers.is_empty() {
            if !self.tokenizer.is_empty() {
                return Err(SearchError::value(format!(
                    "Field '{field}' cannot mix 'tokenizers' with 'tokenizer', 'filters', \
                     'stemmer', 'args', 'named_args' or 'alias'."
                )));
            }
            return self
                .tokenizers
                .iter()
                .map(|config| Ok(format!("({column}::{})", config.render(field, None)?)))
                .collect();
        }

        if self.tokenizer.is_empty() {
            return Ok(vec![column]);
        }
        Ok(vec![format!("({column}::{})", self.tokenizer.render(field, None)?)])
    }

    /// Fast-field hint if this field contributes one.
    fn fast_hint(&self, field: &str) -> Result<Option<(FieldKind, String, bool)>> {
        let fast = match &self.fast {
            None => return Ok(None),
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                tracing::warn!(field, value = %other, "Ignoring non-boolean 'fast' setting");
                return Ok(None);
            }
        };
        if !self.json_keys.is_empty() {
            tracing::debug!(field, "Ignoring 'fast' on a json_keys field");
            return Ok(None);
        }
        let kind = self.kind.ok_or_else(|| {
            SearchError::value(format!(
                "Field '{field}' sets 'fast' but has no 'kind' \
                 (text, numeric, boolean, datetime or json)."
            ))
        })?;
        let column = self.column.clone().unwrap_or_else(|| field.to_string());
        Ok(Some((kind, column, fast)))
    }
}

/// BM25 index declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Index {
    pub name: String,
    pub key_field: String,
    pub fields: Vec<(String, FieldConfig)>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndex {
    name: String,
    key_field: String,
    fields: Map<String, Value>,
}

impl Bm25Index {
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, config: FieldConfig) -> Self {
        self.fields.push((name.into(), config));
        self
    }

    /// Load `{"name": .., "key_field": .., "fields": {..}}`; field order is kept.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawIndex = serde_json::from_str(json)?;
        let fields = raw
            .fields
            .iter()
            .map(|(name, config)| Ok((name.clone(), FieldConfig::from_json(name, config)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: raw.name,
            key_field: raw.key_field,
            fields,
        })
    }

    pub fn create_statement(&self, table: &str) -> Result<CreateIndex> {
        if self.fields.is_empty() {
            return Err(SearchError::value(format!(
                "BM25 index '{}' requires at least one field.",
                self.name
            )));
        }

        let mut expressions = Vec::new();
        for (field, config) in &self.fields {
            expressions.extend(config.expressions(field)?);
        }

        let mut options = vec![format!("key_field={}", quote_literal(&self.key_field))];
        options.extend(self.fast_field_options()?);

        Ok(CreateIndex {
            name: quote_ident(&self.name),
            table: quote_qualified(table),
            expressions,
            options,
        })
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP INDEX IF EXISTS {}", quote_ident(&self.name))
    }

    fn fast_field_options(&self) -> Result<Vec<String>> {
        let mut hints = Vec::new();
        for (field, config) in &self.fields {
            if let Some(hint) = config.fast_hint(field)? {
                hints.push(hint);
            }
        }

        Ok(FieldKind::ALL
            .iter()
            .filter_map(|kind| {
                let group: Map<String, Value> = hints
                    .iter()
                    .filter(|(k, _, _)| k == kind)
                    .map(|(_, column, fast)| (column.clone(), serde_json::json!({"fast": fast})))
                    .collect();
                if group.is_empty() {
                    None
                } else {
                    let blob = Value::Object(group).to_string();
                    Some(format!("{}={}", kind.option_name(), quote_literal(&blob)))
                }
            })
            .collect())
    }
}

/// Rendered `CREATE INDEX`; `Display` gives the one-line form.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    name: String,
    table: String,
    expressions: Vec<String>,
    options: Vec<String>,
}

impl CreateIndex {
    /// Multi-line form, one expression per line.
    pub fn pretty(&self) -> String {
        format!(
            "CREATE INDEX {} ON {}\nUSING bm25 (\n    {}\n)\nWITH ({})",
            self.name,
            self.table,
            self.expressions.join(",\n    "),
            self.options.join(", ")
        )
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }
}

impl fmt::Display for CreateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CREATE INDEX {} ON {} USING bm25 ({}) WITH ({})",
            self.name,
            self.table,
            self.expressions.join(", "),
            self.options.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_sql(config: Value) -> Result<Vec<String>> {
        FieldConfig::from_json("description", &config)?.expressions("description")
    }

    #[test]
    fn test_minimal_index() {
        let index = Bm25Index::new("idx1", "id")
            .field("id", FieldConfig::column())
            .field("title", FieldConfig::with_tokenizer(TokenizerConfig::new("simple")));
        assert_eq!(
            index.create_statement("t").unwrap().to_string(),
            "CREATE INDEX idx1 ON t USING bm25 (id, (title::pdb.simple)) WITH (key_field='id')"
        );
    }

    #[test]
    fn test_pretty_form() {
        let index = Bm25Index::new("products_idx", "id")
            .field("id", FieldConfig::column())
            .field(
                "description",
                FieldConfig::with_tokenizer(
                    TokenizerConfig::new("simple")
                        .filters(["lowercase", "stemmer"])
                        .stemmer("english"),
                ),
            );
        assert_eq!(
            index.create_statement("products").unwrap().pretty(),
            "CREATE INDEX products_idx ON products\nUSING bm25 (\n    id,\n    \
             (description::pdb.simple('lowercase=true,stemmer=english'))\n)\nWITH (key_field='id')"
        );
    }

    #[test]
    fn test_named_args_order() {
        let sql = field_sql(json!({
            "tokenizer": "simple",
            "filters": ["lowercase"],
            "named_args": {"lowercase": false, "stopwords_language": ["English", "French"],
                           "remove_long": 20, "remove_short": 2},
            "stemmer": "english"
        }))
        .unwrap();
        assert_eq!(
            sql,
            vec![concat!(
                "(description::pdb.simple('lowercase=true,lowercase=false,",
                "stopwords_language=English,French,remove_long=20,remove_short=2,",
                "stemmer=english'))"
            )]
        );
    }

    #[test]
    fn test_positional_args_and_alias() {
        let sql = field_sql(json!({
            "tokenizer": "ngram", "args": [3, 3],
            "alias": "description_ngram",
            "named_args": {"prefix_only": true, "positions": true}
        }))
        .unwrap();
        assert_eq!(
            sql,
            vec![concat!(
                "(description::pdb.ngram(3,3,",
                "'alias=description_ngram,prefix_only=true,positions=true'))"
            )]
        );

        let sql = field_sql(json!({
            "tokenizer": "lindera", "args": ["japanese"], "alias": "description_jp"
        }))
        .unwrap();
        assert_eq!(sql, vec!["(description::pdb.lindera('japanese','alias=description_jp'))"]);
    }

    #[test]
    fn test_prerendered_tokenizer() {
        let sql = field_sql(json!({"tokenizer": "ngram(2,3)"})).unwrap();
        assert_eq!(sql, vec!["(description::pdb.ngram(2,3))"]);
        let err = field_sql(json!({"tokenizer": "ngram(2,3)", "alias": "x"})).unwrap_err();
        assert!(err.to_string().contains("pre-rendered"));
        let err = field_sql(json!({"tokenizer": "bad name"})).unwrap_err();
        assert!(err.to_string().contains("valid identifier"));
    }

    #[test]
    fn test_missing_tokenizer() {
        for config in [
            json!({"filters": ["lowercase"]}),
            json!({"stemmer": "english"}),
            json!({"args": [1]}),
            json!({"named_args": {"x": 1}}),
            json!({"alias": "a"}),
        ] {
            let err = field_sql(config).unwrap_err();
            assert!(err.to_string().contains("no tokenizer"), "{err}");
        }
    }

    #[test]
    fn test_json_keys() {
        let config = FieldConfig::column()
            .json_key("title", TokenizerConfig::new("simple").filters(["lowercase"]));
        assert_eq!(
            config.expressions("metadata").unwrap(),
            vec!["((metadata->>'title')::pdb.simple('alias=metadata_title,lowercase=true'))"]
        );

        let declaration = json!({"json_keys": {"title": {"filters": ["lowercase"]}}});
        let err = FieldConfig::from_json("metadata", &declaration)
            .unwrap()
            .expressions("metadata")
            .unwrap_err();
        assert!(err.to_string().contains("requires an explicit tokenizer"));
    }

    #[test]
    fn test_tokenizers_list() {
        let sql = field_sql(json!({"tokenizers": [
            {"tokenizer": "literal"},
            {"tokenizer": "regex_pattern", "args": ["(?i)\\bh\\w*"], "alias": "description_regex"}
        ]}))
        .unwrap();
        assert_eq!(
            sql,
            vec![
                "(description::pdb.literal)".to_string(),
                "(description::pdb.regex_pattern('(?i)\\bh\\w*','alias=description_regex'))"
                    .to_string(),
            ]
        );

        let err = field_sql(json!({
            "tokenizer": "simple",
            "tokenizers": [{"tokenizer": "literal"}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("cannot mix 'tokenizers'"));
        assert!(field_sql(json!({"tokenizers": []})).is_err());
        assert!(field_sql(json!({"tokenizers": ["literal"]})).is_err());
    }

    #[test]
    fn test_deprecated_options_rejected() {
        let err = field_sql(json!({"tokenizer": "simple", "options": {"x": 1}})).unwrap_err();
        assert!(err.to_string().contains("deprecated 'options'"));
    }

    #[test]
    fn test_fast_fields() {
        let index = Bm25Index::from_json(
            r#"{"name": "idx", "key_field": "id", "fields": {
                "id": {},
                "description": {"tokenizer": "simple", "fast": true, "kind": "text"},
                "category": {"fast": false, "kind": "text"},
                "rating": {"fast": true, "kind": "numeric"},
                "in_stock": {"fast": "yes", "kind": "boolean"},
                "metadata": {
                    "fast": true, "kind": "json",
                    "json_keys": {"color": {"tokenizer": "literal"}}
                }
            }}"#,
        )
        .unwrap();
        let sql = index.create_statement("mock_items").unwrap().to_string();
        let expected = concat!(
            r#"WITH (key_field='id', "#,
            r#"text_fields='{"description":{"fast":true},"category":{"fast":false}}', "#,
            r#"numeric_fields='{"rating":{"fast":true}}')"#
        );
        assert!(sql.ends_with(expected), "{sql}");
    }

    #[test]
    fn test_fast_requires_kind() {
        let index = Bm25Index::new("idx", "id").field(
            "rating",
            FieldConfig { fast: Some(Value::Bool(true)), ..Default::default() },
        );
        assert!(index.create_statement("t").unwrap_err().to_string().contains("no 'kind'"));
    }

    #[test]
    fn test_quoting_and_drop() {
        let index =
            Bm25Index::new("Idx", "id").field("id", FieldConfig::column().column_name("ID"));
        let sql = index.create_statement("public.Items").unwrap().to_string();
        assert_eq!(
            sql,
            "CREATE INDEX \"Idx\" ON public.\"Items\" USING bm25 (\"ID\") WITH (key_field='id')"
        );
        assert_eq!(index.drop_sql(), "DROP INDEX IF EXISTS \"Idx\"");
    }

    #[test]
    fn test_empty_index_rejected() {
        assert!(Bm25Index::new("idx", "id").create_statement("t").is_err());
    }
}
