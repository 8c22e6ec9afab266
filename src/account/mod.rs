/// Account management system
///
/// Handles signup, email verification, authentication, sessions, and
/// linked platform accounts.

mod manager;

pub use manager::AccountManager;

use serde::{Deserialize, Serialize};

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

/// Signup response: account is pending until the emailed code is verified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub email: String,
    pub status: String,
}

/// Email verification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub verification_code: String,
}

/// Resend verification code request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendCodeRequest {
    pub email: String,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Session response returned by signin / verify-code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub account_id: i64,
    pub email: String,
    pub display_name: String,
    pub access_token: String,
    pub token_type: String,
}

/// Password reset request (step 1: mail the link)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Password reset submission (step 2: token + new password)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetSubmit {
    pub token: String,
    pub new_password: String,
}
