pub mod model;
pub mod normalize;
pub mod service;
pub mod store;

pub use model::{ResultSet, SearchKind, SearchMode};
pub use service::{SearchError, SearchService};
