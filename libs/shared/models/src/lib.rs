pub mod auth;
pub mod context;
pub mod error;

pub use context::RequestContext;
pub use error::AppError;
