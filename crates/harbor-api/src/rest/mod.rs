//! REST surface: router, handlers, middleware and error mapping

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
