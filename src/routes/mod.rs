pub mod auth;
pub mod cache;
pub mod post;
pub mod product;
