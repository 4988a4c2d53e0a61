// src/lambda/mod.rs

//! AWS Lambda handlers.
//!
//! One deployment runs one handler, selected by `SPACEWATCH_HANDLER`. Every
//! handler takes an API Gateway proxy event (or a direct invocation payload)
//! and always answers with a proxy response; failures become `{error}` bodies
//! with a 400 or 500 status.

mod envelope;
mod handlers;

pub use envelope::{ApiResponse, request_body};
pub use handlers::{AppContext, HandlerKind, dispatch, dispatch_at};
