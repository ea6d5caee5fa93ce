//! More Like This
//!
//! Similarity filter rendered as `<key> @@@ pdb.more_like_this(...)`. Document
//! payloads, field lists and stopwords travel as bound parameters; numeric
//! tuning options are inlined.
//!
//! ```text
//! id @@@ pdb.more_like_this(5, min_term_frequency => 2)
//! (id @@@ pdb.more_like_this(1) OR id @@@ pdb.more_like_this(2))
//! id @@@ pdb.more_like_this($1::jsonb, stopwords => $2::text[])
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, SearchError};
use crate::sql::{quote_ident, SqlParam};

/// What the similarity is measured against
#[derive(Debug, Clone, PartialEq)]
pub enum MltSource {
    ById(i64),
    ByIds(Vec<i64>),
    /// Field name to text
    ByDocument(Map<String, Value>),
    /// Same text applied to every listed field
    ByText { text: String, fields: Vec<String> },
}

/// Loose keyword-style inputs, validated by [`MoreLikeThis::from_inputs`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MltInputs {
    pub product_id: Option<i64>,
    pub product_ids: Option<Vec<i64>>,
    pub document: Option<Map<String, Value>>,
    pub text: Option<String>,
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct MltOptions {
    min_term_freq: Option<u32>,
    max_query_terms: Option<u32>,
    min_doc_freq: Option<u32>,
    max_term_freq: Option<u32>,
    max_doc_freq: Option<u32>,
    min_word_length: Option<u32>,
    max_word_length: Option<u32>,
    stopwords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThis {
    source: MltSource,
    fields: Vec<String>,
    key_field: Option<String>,
    options: MltOptions,
}

macro_rules! positive_option {
    ($($name:ident),*) => {
        $(
            pub fn $name(mut self, value: i64) -> Result<Self> {
                self.options.$name = Some(positive(stringify!($name), value)?);
                Ok(self)
            }
        )*
    };
}

fn positive(name: &str, value: i64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(SearchError::value(format!("{name} must be >= 1, got {value}."))),
    }
}

impl MoreLikeThis {
    fn with_source(source: MltSource) -> Self {
        Self {
            source,
            fields: Vec::new(),
            key_field: None,
            options: MltOptions::default(),
        }
    }

    pub fn by_id(id: i64) -> Self {
        Self::with_source(MltSource::ById(id))
    }

    pub fn by_ids(ids: impl IntoIterator<Item = i64>) -> Result<Self> {
        let ids: Vec<i64> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(SearchError::value("MoreLikeThis product_ids cannot be empty."));
        }
        Ok(Self::with_source(MltSource::ByIds(ids)))
    }

    pub fn by_document(document: Map<String, Value>) -> Result<Self> {
        if document.is_empty() {
            return Err(SearchError::value("MoreLikeThis document cannot be empty."));
        }
        Ok(Self::with_source(MltSource::ByDocument(document)))
    }

    pub fn by_text<I, S>(text: impl Into<String>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(SearchError::value(
                "MoreLikeThis with text requires fields parameter.",
            ));
        }
        Ok(Self::with_source(MltSource::ByText {
            text: text.into(),
            fields,
        }))
    }

    /// Build from keyword-style inputs; exactly one source must be set.
    pub fn from_inputs(inputs: MltInputs) -> Result<Self> {
        let set = [
            inputs.product_id.is_some(),
            inputs.product_ids.is_some(),
            inputs.document.is_some(),
            inputs.text.is_some(),
        ]
        .iter()
        .filter(|s| **s)
        .count();
        if set != 1 {
            return Err(SearchError::value(
                "MoreLikeThis requires exactly one input: \
                 product_id, product_ids, document, or text.",
            ));
        }

        let mlt = if let Some(id) = inputs.product_id {
            Self::by_id(id)
        } else if let Some(ids) = inputs.product_ids {
            Self::by_ids(ids)?
        } else if let Some(doc) = inputs.document {
            Self::by_document(doc)?
        } else {
            let text = inputs.text.unwrap_or_default();
            return Self::by_text(text, inputs.fields.unwrap_or_default());
        };
        match inputs.fields {
            Some(fields) => mlt.fields(fields),
            None => Ok(mlt),
        }
    }

    /// Restrict which indexed fields are compared. Id sources only.
    pub fn fields<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !matches!(self.source, MltSource::ById(_) | MltSource::ByIds(_)) {
            return Err(SearchError::value(
                "MoreLikeThis fields are only valid with product_id or product_ids.",
            ));
        }
        self.fields = fields.into_iter().map(Into::into).collect();
        Ok(self)
    }

    /// Column on the left of `@@@`, overriding the query's key field.
    pub fn key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = Some(key_field.into());
        self
    }

    positive_option!(
        min_term_freq,
        max_query_terms,
        min_doc_freq,
        max_term_freq,
        max_doc_freq,
        min_word_length,
        max_word_length
    );

    /// Words ignored when building the similarity query. Empty means none.
    pub fn stopwords<I, S>(mut self, stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.stopwords = stopwords.into_iter().map(Into::into).collect();
        self
    }

    pub fn source(&self) -> &MltSource {
        &self.source
    }

    /// Render against `default_key`, appending bound values to `params`.
    pub fn to_sql(&self, default_key: &str, params: &mut Vec<SqlParam>) -> String {
        let lhs = quote_ident(self.key_field.as_deref().unwrap_or(default_key));

        let call = |first: String, params: &mut Vec<SqlParam>, fields: &[String]| {
            let mut args = vec![first];
            if !fields.is_empty() {
                params.push(SqlParam::TextArray(fields.to_vec()));
                args.push(format!("${}::text[]", params.len()));
            }
            args.extend(self.render_options(params));
            format!("{lhs} @@@ pdb.more_like_this({})", args.join(", "))
        };

        match &self.source {
            MltSource::ById(id) => call(id.to_string(), params, &self.fields),
            MltSource::ByIds(ids) => {
                let parts: Vec<String> = ids
                    .iter()
                    .map(|id| call(id.to_string(), params, &self.fields))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            MltSource::ByDocument(doc) => {
                params.push(SqlParam::Json(Value::Object(doc.clone())));
                call(format!("${}::jsonb", params.len()), params, &[])
            }
            MltSource::ByText { text, fields } => {
                let doc: Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.clone(), Value::String(text.clone())))
                    .collect();
                params.push(SqlParam::Json(Value::Object(doc)));
                call(format!("${}::jsonb", params.len()), params, &[])
            }
        }
    }

    fn render_options(&self, params: &mut Vec<SqlParam>) -> Vec<String> {
        let o = &self.options;
        let numeric = [
            ("min_term_frequency", o.min_term_freq),
            ("max_query_terms", o.max_query_terms),
            ("min_doc_frequency", o.min_doc_freq),
            ("max_term_frequency", o.max_term_freq),
            ("max_doc_frequency", o.max_doc_freq),
            ("min_word_length", o.min_word_length),
            ("max_word_length", o.max_word_length),
        ];
        let mut rendered: Vec<String> = numeric
            .iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key} => {v}")))
            .collect();
        if !o.stopwords.is_empty() {
            params.push(SqlParam::TextArray(o.stopwords.clone()));
            rendered.push(format!("stopwords => ${}::text[]", params.len()));
        }
        rendered
    }
}
