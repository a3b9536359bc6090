use std::time::Duration;
use actix_web::http::header;
use actix_web::HttpRequest;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use crate::errors::ServerErr;

pub const ADMIN_ROLE: &str = "admin";
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub role: String,
    pub exp: u64,
}

/// Caller identity established from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub role: String,
}

/// Issues admin credentials and decides whether a request may perform a write.
pub trait Authorizer: Send + Sync {
    fn issue(&self, role: &str) -> Result<String, ServerErr>;

    fn authorize(&self, request: &HttpRequest) -> Result<Principal, ServerErr>;
}

/// HS256 bearer tokens signed with a shared secret.
pub struct JwtAuthorizer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthorizer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, ServerErr> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("rejected token: {}", e);
            ServerErr::Unauthorized("invalid token".to_string())
        })?;
        Ok(Principal { role: data.claims.role })
    }
}

impl Authorizer for JwtAuthorizer {
    fn issue(&self, role: &str) -> Result<String, ServerErr> {
        let claims = Claims {
            role: role.to_string(),
            exp: Utc::now().timestamp() as u64 + TOKEN_LIFETIME.as_secs(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    fn authorize(&self, request: &HttpRequest) -> Result<Principal, ServerErr> {
        let value = request
            .headers()
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ServerErr::Unauthorized("missing auth".to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| ServerErr::Unauthorized("invalid auth format".to_string()))?;
        match value.split_once(' ') {
            Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => self.verify(token),
            _ => Err(ServerErr::Unauthorized("invalid auth format".to_string())),
        }
    }
}
