//! Runtime lifetime, security profiles and status translation.

mod category;
mod context;
pub mod security;

pub use category::ErrorCategory;
pub use context::ProcessContext;
pub use security::{
    AuthenticationLevel, AuthenticationService, AuthorizationService, CallAuthorization,
    ImpersonationLevel, SecurityProfile,
};
