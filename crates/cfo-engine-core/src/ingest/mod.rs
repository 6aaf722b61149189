pub mod cache;
pub mod dates;
pub mod keywords;
pub mod normalizer;

pub use cache::DatasetCache;
pub use keywords::StatementKind;
pub use normalizer::{normalize, normalize_table, NormalizeInput, NormalizedDataset, RawTable};
