// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search expressions and query compilation
//!
//! # Architecture
//!
//! ```text
//! SearchTerm (Phrase, Fuzzy, Pq, ...)
//!     ↓
//! ParadeDb ──resolve()──→ &&& / ||| / ### / === / @@@
//!     ↓
//! Filter tree ──→ SearchQuery ──→ SqlQuery ($n params)
//!                     ↓
//!                 facets() ──→ pdb.agg(...) OVER ()
//! ```
//!
//! # Example
//!
//! ```rust
//! use paradedb_query::search::{Filter, Fuzzy, ParadeDb, Score, SearchQuery};
//!
//! let query = SearchQuery::new("mock_items")
//!     .columns(["id", "description"])
//!     .filter(Filter::search("description", ParadeDb::term(Fuzzy::new("shose"))))
//!     .annotate("score", Score::new())
//!     .order_by("-score")
//!     .limit(5);
//!
//! let sql = query.to_sql().unwrap().sql;
//! assert_eq!(
//!     sql,
//!     "SELECT id, description, pdb.score(id) AS score FROM mock_items \
//!      WHERE description ||| 'shose'::pdb.fuzzy(1) ORDER BY score DESC LIMIT 5"
//! );
//! ```

mod expression;
mod facets;
mod filter;
mod functions;
mod more_like_this;
mod query;
mod terms;

pub use expression::{ParadeDb, Resolved, SearchOperator};
pub use facets::{FacetOrder, FacetRequest, FacetResult, FACETS_ALIAS};
pub use filter::{Comparison, Filter, Lookup};
pub use functions::{Agg, Annotation, Score, Snippet, SnippetPositions, SnippetSort, Snippets};
pub use more_like_this::{MltInputs, MltSource, MoreLikeThis};
pub use query::SearchQuery;
pub use terms::{
    All, Fuzzy, MatchOperator, Parse, Phrase, PhrasePrefix, Pq, PqOperator, Proximity,
    RangeRelation, RangeTerm, Regex, RegexPhrase, Scoring, SearchTerm, Term, MAX_BOOST,
    MAX_FUZZY_DISTANCE,
};
