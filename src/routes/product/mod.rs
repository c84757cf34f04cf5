mod handler;
mod model;

pub use handler::{create_product, find_by_id, list_products};
pub use model::Product;
