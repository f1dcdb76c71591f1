pub mod auth;
pub mod extract;
pub mod metrics;
pub mod rate_limit;
pub mod response;

pub use auth::{authenticated, permitted, require_auth, require_permission};
pub use extract::{ApiJson, ApiPath, ApiQuery, OptionalJson};
pub use metrics::{track_metrics, RequestMetrics};
pub use rate_limit::{rate_limit, RateLimiter};
pub use response::{ApiResponse, ApiResult};
