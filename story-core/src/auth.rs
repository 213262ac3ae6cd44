//! Placeholder account endpoints.
//!
//! There is no account backend yet. These handlers check for the required
//! fields and hand back a fixed user and token.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOGIN_TOKEN: &str = "dummy-jwt-token-67890";
const SIGNUP_TOKEN: &str = "dummy-jwt-token-12345";
const PLACEHOLDER_USER_ID: &str = "user123";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Missing required fields")]
    MissingFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub ok: bool,
    pub user: AuthUser,
    pub token: String,
}

pub fn login(request: &LoginRequest) -> Result<AuthResponse, AuthError> {
    if request.email.is_empty() || request.password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let created_at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();

    Ok(AuthResponse {
        ok: true,
        user: AuthUser {
            id: PLACEHOLDER_USER_ID.to_string(),
            email: request.email.clone(),
            name: "John Doe".to_string(),
            country: Some("United States".to_string()),
            created_at,
        },
        token: LOGIN_TOKEN.to_string(),
    })
}

/// The country is required but not echoed back.
pub fn signup(request: &SignupRequest) -> Result<AuthResponse, AuthError> {
    let missing = [&request.email, &request.password, &request.name, &request.country]
        .iter()
        .any(|field| field.is_empty());
    if missing {
        return Err(AuthError::MissingFields);
    }

    Ok(AuthResponse {
        ok: true,
        user: AuthUser {
            id: PLACEHOLDER_USER_ID.to_string(),
            email: request.email.clone(),
            name: request.name.clone(),
            country: None,
            created_at: Utc::now(),
        },
        token: SIGNUP_TOKEN.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_requires_credentials() {
        let request = LoginRequest {
            email: "parent@example.com".to_string(),
            password: String::new(),
        };
        let err = login(&request).unwrap_err();
        assert_eq!(err.to_string(), "Email and password are required");
    }

    #[test]
    fn test_login_returns_placeholder_user() {
        let request = LoginRequest {
            email: "parent@example.com".to_string(),
            password: "secret".to_string(),
        };
        let response = login(&request).unwrap();

        assert!(response.ok);
        assert_eq!(response.token, "dummy-jwt-token-67890");
        assert_eq!(response.user.name, "John Doe");
        assert_eq!(response.user.email, "parent@example.com");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"]["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(json["user"]["country"], "United States");
    }

    #[test]
    fn test_signup_requires_every_field() {
        let mut request = SignupRequest {
            email: "parent@example.com".to_string(),
            password: "secret".to_string(),
            name: "Amina".to_string(),
            country: String::new(),
        };
        assert_eq!(signup(&request).unwrap_err(), AuthError::MissingFields);

        request.country = "Canada".to_string();
        let response = signup(&request).unwrap();
        assert_eq!(response.token, "dummy-jwt-token-12345");
        assert_eq!(response.user.name, "Amina");
        assert!(response.user.country.is_none());
    }
}
