//! Document store boundary
//!
//! `Container` is the only seam to the remote store. `CosmosContainer` talks
//! to the service over HTTPS; `MemoryContainer` keeps the same observable
//! behavior in process.

mod auth;
mod container;
mod cosmos;
mod errors;
mod memory;
mod query;

pub use auth::{InvalidMasterKey, MasterKey, API_VERSION};
pub use container::{
    BatchOperation, Container, FeedOptions, FeedPage, ItemResponse, OperationResponse, PatchOp,
    PatchOperation, QueryPages, RequestOptions, MAX_BATCH_OPERATIONS,
};
pub use cosmos::CosmosContainer;
pub use errors::{status, ResponseError, StoreError, StoreErrorKind, StoreResult};
pub use memory::MemoryContainer;
pub use query::{FilterExpr, FilterOperator, OrderBy, Query, SqlParameter, SqlQuerySpec};
