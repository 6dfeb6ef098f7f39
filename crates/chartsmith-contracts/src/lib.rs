pub mod cache;
pub mod dataset;
pub mod error;
pub mod recs;

pub use cache::{CacheKey, ResultCache};
pub use dataset::signature::{fingerprint, DatasetSignature};
pub use dataset::{ColumnType, Dataset};
pub use error::RecommendError;
pub use recs::{ChartKind, ChartSpec, RawRecommendation};
