use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use crate::auth::ADMIN_ROLE;
use crate::errors::ServerErr;
use crate::services::{AppState, APP_TYPE_JSON};

#[derive(Deserialize)]
struct LoginRequest {
    password: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    token: String,
}

#[post("/auth/login")]
async fn login(
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    let req: LoginRequest = serde_json::from_slice(&request_json_bytes)?;
    let password = req
        .password
        .filter(|password| !password.is_empty())
        .ok_or_else(|| ServerErr::BadRequest("password required".to_string()))?;
    if password != shared_state.admin_password {
        tracing::warn!("rejected admin login");
        return Err(ServerErr::Unauthorized("invalid password".to_string()));
    }
    let token = shared_state.authorizer.issue(ADMIN_ROLE)?;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(LoginResponse { token }))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(APP_TYPE_JSON)
        .json(json!({ "ok": true, "time": Utc::now().timestamp_millis() }))
}
