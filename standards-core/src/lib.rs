//! Standards core: domain errors, response envelope, DI container, request context,
//! pipeline middleware and endpoint filters. No dispatching here; see `standards-rs`.

pub mod container;
pub mod context;
pub mod error;
pub mod filters;
pub mod into_domain_error;
pub mod middleware;
pub mod options;
pub mod pagination;
pub mod response;
pub mod telemetry;

pub use container::{Container, ContainerError, Lifetime, Scope};
pub use context::{CancellationSignal, Canceller, RequestContext};
pub use error::{BoxError, DomainError, ErrorCode};
pub use filters::{error_outcome, validate_image_extension, validate_request, validate_upload, UploadedFile, Validate};
pub use into_domain_error::IntoDomainError;
pub use middleware::{Claims, Exchange, Middleware, Outcome, Pipeline, RequestHead};
pub use options::{FileUploadOptions, JwtClaimOptions, OptionsError, StandardsOptions};
pub use pagination::PagedResult;
pub use response::ApiResponse;
pub use telemetry::LogFormat;
