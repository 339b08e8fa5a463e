//! Map infrastructure errors to DomainError in handlers without spelling out `DomainError::internal_from(..)`.

use crate::DomainError;

/// Convert any error to an internal DomainError. Use in handlers: `.map_err(IntoDomainError::into_domain_error)`.
pub trait IntoDomainError {
    fn into_domain_error(self) -> DomainError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoDomainError for E {
    fn into_domain_error(self) -> DomainError {
        DomainError::internal_from(self.to_string(), self)
    }
}
