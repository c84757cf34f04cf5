mod handler;

pub use handler::{InvalidateRequest, InvalidateResponse, invalidate, stats};
