use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use serde::Serialize;

use crate::result::ApiResponse;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const NOT_FOUND: i32 = 1004;
    pub const TOKEN_INVALID: i32 = 1006;
    pub const TOKEN_EXPIRED: i32 = 1007;
    pub const TOKEN_USED: i32 = 1008;
    pub const TOO_MANY_ATTEMPTS: i32 = 1009;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hashed).unwrap());
        assert!(!verify_password("hunter23", &hashed).unwrap());
    }

    #[test]
    fn error_response_has_no_data() {
        let Json(body) = error_to_api_response::<()>(error_codes::NOT_FOUND, "missing".into());
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"code": 1004, "msg": "missing"})
        );
    }
}
