pub mod entity;
pub mod normalize;
pub mod query;
pub mod similarity;

pub use entity::{ExtractedEntity, dedupe_entities};
pub use normalize::{normalize_domain, normalize_name};
pub use query::StructuredQuery;
pub use similarity::{cosine_similarity, term_overlap, tokenize};
