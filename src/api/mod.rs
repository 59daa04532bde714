//! HTTP surface for submittal review.
//!
//! `GET /` serves the upload form. `POST /review` renders the report as HTML,
//! `POST /api/review` returns it as JSON. Both take multipart `spec` and
//! `submittal` files.

pub mod error;
pub mod render;
pub mod router;
pub mod server;
pub mod types;

pub use router::review_router;
pub use server::{start_server, ReviewServer};
pub use types::AppState;
