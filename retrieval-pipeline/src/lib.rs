pub mod gateway;
pub mod indexer;
pub mod lifecycle;
pub mod vector;

pub use gateway::{KnowledgeBase, QueryGateway, QueryResult, ReloadResult};
pub use indexer::{Indexer, QueryAnswer};
pub use lifecycle::{IndexHandle, IndexLifecycle, IndexStatus};
pub use vector::{VectorIndex, VectorIndexer};
