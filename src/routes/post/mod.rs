mod handler;
mod model;

pub use handler::{archive, archive_index, create_post, find_by_id, list_posts, update_post};
pub use model::{ArchiveMonth, Post};
