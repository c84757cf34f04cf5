mod handler;
mod model;

pub use handler::{
    check_reset_token, forgot_password, reset_password, send_verification_code, spawn_reset_link,
    verify_email,
};
pub use model::{normalize_email, validate_new_password};
