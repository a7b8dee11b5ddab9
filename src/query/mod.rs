//! Query side: request model, graph query compiler, federated engine
//!
//! # Components
//!
//! - `model`: `ArticleQuery` and its filters, sort and return types, `SearchResponse`
//! - `compiler`: immutable stage builder compiled to one Cypher program
//! - `engine`: text lookup, compiled graph query and content backfill

mod compiler;
mod engine;
mod model;

pub use compiler::{CompiledQuery, Parameters, QueryBuilder, QueryShapeError, Stage};
pub use engine::QueryEngine;
pub use model::{
    ArticleLink, ArticleNode, ArticleQuery, BoolOp, CategoriesFilter, DistanceFilter,
    DistanceStrategy, GeneralFilter, GraphFilter, IdsFilter, LinksCountFilter, ReturnType,
    SearchResponse, Sort, SortBy, SortDirection, TextField, TextSearchFilter, TitlesFilter,
};
