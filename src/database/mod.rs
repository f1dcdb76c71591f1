pub mod manager;
pub mod models;
pub mod pagination;
pub mod params;
pub mod predicate;
pub mod query_builder;
pub mod repository;
pub mod schema;

pub use manager::DatabaseError;
pub use pagination::{PageQuery, PageRequest, Paginated, PaginationError};
pub use params::{ParamBinder, SqlValue, Statement};
pub use predicate::Predicate;
pub use query_builder::{QueryBuilder, SortDirection};
