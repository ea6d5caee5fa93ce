//! End-to-end SQL generation tests.
//!
//! Everything here compiles statements without a database.
//!
//! Run with: `cargo test --test sql_generation`

use serde_json::json;

use paradedb_query::diagnostics::{self, VerifyIndexOptions};
use paradedb_query::search::{
    Agg, All, Comparison, FacetOrder, FacetRequest, Filter, Fuzzy, MatchOperator, MltInputs,
    MoreLikeThis, ParadeDb, Parse, Phrase, PhrasePrefix, Pq, Proximity, RangeRelation, RangeTerm,
    Regex, RegexPhrase, Score, SearchQuery, SearchTerm, Snippet, SnippetSort, Snippets, Term,
};
use paradedb_query::{Bm25Index, FieldConfig, SearchError, SqlParam, TokenizerConfig};

fn compile(expr: ParadeDb) -> String {
    expr.to_sql("description").unwrap()
}

fn compile_err(expr: ParadeDb) -> SearchError {
    expr.to_sql("description").unwrap_err()
}

// =============================================================================
// Core scenarios
// =============================================================================

#[test]
fn scenario_plain_terms_match_all() {
    let expr = ParadeDb::new(["running", "shoes"]).unwrap();
    assert_eq!(compile(expr), "description &&& ARRAY['running', 'shoes']");
}

#[test]
fn scenario_phrase_with_slop() {
    let expr = ParadeDb::term(Phrase::new("running shoes").slop(1).unwrap());
    assert_eq!(compile(expr), "description ### 'running shoes'::pdb.slop(1)");
}

#[test]
fn scenario_pq_or() {
    let pq = (Pq::new("a") | Pq::new("b")).unwrap();
    assert_eq!(compile(ParadeDb::term(pq)), "description ||| ARRAY['a', 'b']");
}

#[test]
fn scenario_minimal_index() {
    let index = Bm25Index::from_json(
        r#"{"name": "idx1", "key_field": "id",
            "fields": {"id": {}, "title": {"tokenizer": "simple"}}}"#,
    )
    .unwrap();
    assert_eq!(
        index.create_statement("t").unwrap().to_string(),
        "CREATE INDEX idx1 ON t USING bm25 (id, (title::pdb.simple)) WITH (key_field='id')"
    );
}

// =============================================================================
// Operator resolution
// =============================================================================

#[test]
fn plain_operators() {
    let or = ParadeDb::term("shoes").with_operator(MatchOperator::Or).unwrap();
    assert_eq!(compile(or), "description ||| 'shoes'");

    let term = ParadeDb::term("shoes").with_operator(MatchOperator::Term).unwrap();
    assert_eq!(compile(term), "description === 'shoes'");

    let and = ParadeDb::term("shoes").with_operator(MatchOperator::And).unwrap();
    assert_eq!(compile(and), "description &&& 'shoes'");
}

#[test]
fn operator_strings_parse() {
    assert_eq!("OR".parse::<MatchOperator>().unwrap(), MatchOperator::Or);
    let err = "XOR".parse::<MatchOperator>().unwrap_err();
    assert_eq!(err.to_string(), "ParadeDB operator must be 'AND', 'OR', or 'TERM'.");
}

#[test]
fn tokenizer_and_scoring_on_plain_terms() {
    let single = ParadeDb::term("shoes")
        .with_tokenizer("whitespace")
        .unwrap()
        .with_boost(2.0)
        .unwrap();
    assert_eq!(compile(single), "description &&& 'shoes'::pdb.whitespace::pdb.boost(2.0)");

    let array = ParadeDb::new(["running", "shoes"]).unwrap().with_const(1.0).unwrap();
    assert_eq!(
        compile(array),
        "description &&& ARRAY['running', 'shoes']::pdb.const(1.0)"
    );
}

#[test]
fn expression_modifiers_need_plain_terms() {
    let err = ParadeDb::term(Phrase::new("a b")).with_operator(MatchOperator::Or).unwrap_err();
    assert_eq!(err.to_string(), "ParadeDB operator is only supported with plain string terms.");

    let err = ParadeDb::term("a").with_tokenizer("not valid").unwrap_err();
    assert!(err.to_string().contains("tokenizer must be a valid identifier"));
}

#[test]
fn boost_and_const_exclusive() {
    let err = Phrase::new("x").boost(2.0).unwrap().constant(1.0).unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"));

    let err = ParadeDb::term("x").with_boost(2.0).unwrap().with_const(1.0).unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"));
}

#[test]
fn boost_range() {
    assert!(Phrase::new("x").boost(2048.0).is_ok());
    assert!(Phrase::new("x").boost(-2048.0).is_ok());
    assert!(Phrase::new("x").boost(2048.5).is_err());
}

#[test]
fn phrase_tokenizer_and_escaping() {
    let phrase = Phrase::new("it's new").tokenizer("whitespace").unwrap();
    assert_eq!(
        compile(ParadeDb::term(phrase)),
        "description ### 'it''s new'::pdb.whitespace"
    );
}

#[test]
fn phrase_array() {
    let expr = ParadeDb::new([Phrase::new("running shoes"), Phrase::new("trail shoes")]).unwrap();
    assert_eq!(
        compile(expr),
        "description ### ARRAY['running shoes', 'trail shoes']"
    );
}

#[test]
fn phrase_mixed_with_text_is_type_error() {
    let terms: Vec<SearchTerm> = vec!["shoes".into(), Phrase::new("running shoes").into()];
    let err = compile_err(ParadeDb::new(terms).unwrap());
    assert!(matches!(err, SearchError::InvalidTerm(_)));
}

#[test]
fn fuzzy_variants() {
    let expr = ParadeDb::term(Fuzzy::new("shose").distance(2).unwrap().prefix(true));
    assert_eq!(compile(expr), "description ||| 'shose'::pdb.fuzzy(2, t)");

    let expr = ParadeDb::term(Fuzzy::new("shose").transposition_cost_one(true));
    assert_eq!(compile(expr), "description ||| 'shose'::pdb.fuzzy(1, f, t)");

    let expr = ParadeDb::term(Fuzzy::new("shose").operator(MatchOperator::Term));
    assert_eq!(compile(expr), "description === 'shose'::pdb.fuzzy(1)");

    let expr = ParadeDb::term(Fuzzy::new("shose").boost(3.0).unwrap());
    assert_eq!(compile(expr), "description ||| 'shose'::pdb.fuzzy(1)::pdb.boost(3.0)");
}

#[test]
fn fuzzy_operator_mismatch() {
    let expr = ParadeDb::new([
        Fuzzy::new("a").operator(MatchOperator::And),
        Fuzzy::new("b"),
    ])
    .unwrap();
    assert_eq!(
        compile_err(expr).to_string(),
        "All Fuzzy terms must use the same operator."
    );
}

#[test]
fn proximity_rendering() {
    let expr = ParadeDb::term(Proximity::new("running shoes", 2).unwrap());
    assert_eq!(
        compile(expr),
        "description @@@ pdb.proximity('running' ## 2 ## 'shoes')"
    );

    let expr = ParadeDb::term(Proximity::new("trail running shoes", 1).unwrap().ordered(true));
    assert_eq!(
        compile(expr),
        "description @@@ pdb.proximity('trail' ##> 1 ##> 'running' ##> 1 ##> 'shoes')"
    );
}

#[test]
fn proximity_validation() {
    assert!(Proximity::new("shoes", 1).is_err());
    assert!(Proximity::new("running shoes", -1).is_err());

    let expr = ParadeDb::new([
        Proximity::new("running shoes", 2).unwrap().ordered(true),
        Proximity::new("trail boots", 1).unwrap().ordered(true),
    ])
    .unwrap();
    assert_eq!(
        compile(expr),
        "description @@@ ARRAY[pdb.proximity('running' ##> 2 ##> 'shoes'), \
         pdb.proximity('trail' ##> 1 ##> 'boots')]"
    );

    let expr = ParadeDb::new([
        Proximity::new("a b", 1).unwrap(),
        Proximity::new("c d", 1).unwrap().ordered(true),
    ])
    .unwrap();
    assert_eq!(
        compile_err(expr).to_string(),
        "All Proximity terms must use the same ordered setting."
    );
}

#[test]
fn query_functions() {
    assert_eq!(
        compile(ParadeDb::term(Parse::new("running AND shoes").lenient(true))),
        "description @@@ pdb.parse('running AND shoes', lenient => true)"
    );
    assert_eq!(
        compile(ParadeDb::term(Term::new("shoes"))),
        "description @@@ pdb.term('shoes')"
    );
    assert_eq!(
        compile(ParadeDb::term(Regex::new("sho.*"))),
        "description @@@ pdb.regex('sho.*')"
    );
    assert_eq!(compile(ParadeDb::term(All)), "description @@@ pdb.all()");
}

#[test]
fn supplemental_query_functions() {
    let prefix = PhrasePrefix::new(["running", "sh"]).unwrap().max_expansion(10);
    assert_eq!(
        compile(ParadeDb::term(prefix)),
        "description @@@ pdb.phrase_prefix(ARRAY['running', 'sh'], max_expansion => 10)"
    );

    let regex_phrase = RegexPhrase::new(["run.*", "sho.*"]).unwrap().slop(1);
    assert!(compile(ParadeDb::term(regex_phrase)).starts_with("description @@@ pdb.regex_phrase("));

    assert_eq!(
        compile(ParadeDb::term(RangeTerm::value(10))),
        "description @@@ pdb.range_term(10)"
    );
    let range = RangeTerm::range("(10, 12]", "int4range", RangeRelation::Intersects).unwrap();
    assert_eq!(
        compile(ParadeDb::term(range)),
        "description @@@ pdb.range_term('(10, 12]'::int4range, 'Intersects')"
    );
}

#[test]
fn query_functions_must_be_single() {
    let terms: Vec<SearchTerm> = vec![Term::new("a").into(), Term::new("b").into()];
    let err = compile_err(ParadeDb::new(terms).unwrap());
    assert_eq!(err.to_string(), "Parse/Term/Regex/All queries must be a single term.");
}

#[test]
fn pq_must_be_sole_input() {
    let terms: Vec<SearchTerm> = vec![Pq::new("a").into(), "b".into()];
    let err = compile_err(ParadeDb::new(terms).unwrap());
    assert_eq!(err.to_string(), "PQ objects must be provided as the sole ParadeDB input.");

    let mixed = (Pq::new("a") | Pq::new("b")).unwrap() & Pq::new("c");
    assert_eq!(
        mixed.unwrap_err().to_string(),
        "Mixed PQ operators are not supported yet."
    );
}

// =============================================================================
// Queries, annotations, MoreLikeThis
// =============================================================================

#[test]
fn full_select_with_annotations() {
    let query = SearchQuery::new("mock_items")
        .columns(["id", "description"])
        .filter(Filter::search(
            "description",
            ParadeDb::new(["running", "shoes"]).unwrap(),
        ))
        .filter(Filter::compare("rating", Comparison::Gt, 3))
        .annotate("score", Score::new())
        .annotate(
            "snippets",
            Snippets::new("description").limit(1).sort_by(SnippetSort::Score),
        )
        .order_by("-score")
        .limit(10);

    let compiled = query.to_sql().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT id, description, pdb.score(id) AS score, \
         pdb.snippets(description, \"limit\" => 1, sort_by => 'score') AS snippets \
         FROM mock_items WHERE description &&& ARRAY['running', 'shoes'] AND rating > $1 \
         ORDER BY score DESC LIMIT 10"
    );
    assert_eq!(compiled.params, vec![SqlParam::Int(3)]);
}

#[test]
fn snippet_defaults_are_positional() {
    let query = SearchQuery::new("mock_items")
        .columns(["id"])
        .annotate("s", Snippet::new("description").max_num_chars(50));
    assert_eq!(
        query.to_sql().unwrap().sql,
        "SELECT id, pdb.snippet(description, '<b>', '</b>', 50) AS s FROM mock_items"
    );
}

#[test]
fn more_like_this_by_id_and_ids() {
    let query = SearchQuery::new("mock_items")
        .columns(["id"])
        .filter(Filter::more_like_this(MoreLikeThis::by_id(3).min_term_freq(2).unwrap()));
    assert_eq!(
        query.to_sql().unwrap().sql,
        "SELECT id FROM mock_items WHERE id @@@ pdb.more_like_this(3, min_term_frequency => 2)"
    );

    let mlt = MoreLikeThis::by_ids([1, 2]).unwrap();
    let sql = SearchQuery::new("mock_items")
        .filter(Filter::more_like_this(mlt))
        .to_sql()
        .unwrap()
        .sql;
    assert_eq!(
        sql,
        "SELECT * FROM mock_items \
         WHERE (id @@@ pdb.more_like_this(1) OR id @@@ pdb.more_like_this(2))"
    );
}

#[test]
fn more_like_this_document_is_bound() {
    let mut document = serde_json::Map::new();
    document.insert("description".into(), json!("running shoes"));
    let mlt = MoreLikeThis::by_document(document).unwrap();
    let compiled = SearchQuery::new("mock_items")
        .filter(Filter::more_like_this(mlt))
        .to_sql()
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT * FROM mock_items WHERE id @@@ pdb.more_like_this($1::jsonb)"
    );
    assert_eq!(compiled.params, vec![SqlParam::Json(json!({"description": "running shoes"}))]);
}

#[test]
fn more_like_this_input_cardinality() {
    assert!(MoreLikeThis::from_inputs(MltInputs::default()).is_err());

    let both = MltInputs {
        product_id: Some(1),
        product_ids: Some(vec![2]),
        ..Default::default()
    };
    assert!(MoreLikeThis::from_inputs(both).is_err());

    let stopwords: [&str; 0] = [];
    let mlt = MoreLikeThis::by_id(1).stopwords(stopwords);
    let mut params = Vec::new();
    assert!(!mlt.to_sql("id", &mut params).contains("stopwords"));
    assert!(params.is_empty());
}

// =============================================================================
// Facets
// =============================================================================

#[test]
fn facets_aggregate_only() {
    let query = SearchQuery::new("mock_items")
        .filter(Filter::search("description", ParadeDb::term("shoes")));
    let request = FacetRequest::fields(["category"])
        .order(Some(FacetOrder::KeyAsc))
        .include_rows(false);
    let sql = query.facets_sql(&request).unwrap().sql;
    assert!(sql.starts_with("SELECT pdb.agg('"), "{sql}");
    assert!(sql.ends_with("') AS _paradedb_facets FROM mock_items WHERE description &&& 'shoes'"));
}

#[test]
fn facets_with_rows_uses_window() {
    let query = SearchQuery::new("mock_items")
        .filter(Filter::search("description", ParadeDb::term("shoes")))
        .order_by("id")
        .limit(5);
    let request = FacetRequest::raw_value(&json!({"value_count": {"field": "id"}}));
    let sql = query.facets_with_rows_sql(&request).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT *, pdb.agg('{\"value_count\":{\"field\":\"id\"}}') OVER () AS _paradedb_facets \
         FROM mock_items WHERE description &&& 'shoes' ORDER BY id LIMIT 5"
    );
}

#[test]
fn facets_preconditions() {
    let unsearched = SearchQuery::new("mock_items").order_by("id").limit(5);
    let err = unsearched.facets_sql(&FacetRequest::fields(["category"])).unwrap_err();
    assert!(matches!(err, SearchError::Precondition(_)));

    let unpaged = SearchQuery::new("mock_items")
        .filter(Filter::search("description", ParadeDb::term("shoes")));
    let err = unpaged
        .facets_with_rows_sql(&FacetRequest::fields(["category"]))
        .unwrap_err();
    assert!(err.to_string().contains("requires order_by() and a LIMIT"));
}

#[test]
fn agg_annotation_exact_flag() {
    let agg = Agg::from_value(&json!({"terms": {"field": "category"}})).exact(false);
    let sql = SearchQuery::new("mock_items")
        .columns(["id"])
        .annotate("a", agg)
        .to_sql()
        .unwrap()
        .sql;
    assert_eq!(
        sql,
        "SELECT id, pdb.agg('{\"terms\":{\"field\":\"category\"}}', false) AS a FROM mock_items"
    );
}

// =============================================================================
// DDL and diagnostics
// =============================================================================

#[test]
fn index_ddl_missing_tokenizer_messages() {
    let err = Bm25Index::from_json(
        r#"{"name": "i", "key_field": "id", "fields": {"d": {"stemmer": "english"}}}"#,
    )
    .unwrap()
    .create_statement("t")
    .unwrap_err();
    assert!(err.to_string().contains("no tokenizer"));

    let err = Bm25Index::from_json(
        r#"{"name": "i", "key_field": "id", "fields": {"m": {"json_keys": {"k": {}}}}}"#,
    )
    .unwrap()
    .create_statement("t")
    .unwrap_err();
    assert!(err.to_string().contains("requires an explicit tokenizer"));
}

#[test]
fn index_ddl_builder_api() {
    let index = Bm25Index::new("products_idx", "id")
        .field("id", FieldConfig::column())
        .field(
            "description",
            FieldConfig::with_tokenizer(
                TokenizerConfig::new("unicode_words").filters(["lowercase"]),
            ),
        );
    assert_eq!(
        index.create_statement("products").unwrap().to_string(),
        "CREATE INDEX products_idx ON products USING bm25 \
         (id, (description::pdb.unicode_words('lowercase=true'))) WITH (key_field='id')"
    );
}

#[test]
fn verify_index_statement() {
    let options = VerifyIndexOptions {
        heapallindexed: true,
        ..Default::default()
    };
    let query = diagnostics::verify_index_sql("products_idx", &options).unwrap();
    assert_eq!(
        query.sql,
        "SELECT * FROM pdb.verify_index($1::regclass, heapallindexed => $2::boolean)"
    );
}
