use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use serde_json::json;
use crate::catalog::{Lecture, LectureRequest};
use crate::errors::ServerErr;
use crate::services::{AppState, APP_TYPE_JSON};

fn parse_request(body: &web::Bytes) -> Result<LectureRequest, ServerErr> {
    Ok(serde_json::from_slice(body)?)
}

/// A lecture may only point at a stored blob that exists.
async fn check_media(shared_state: &AppState, lecture: &Lecture) -> Result<(), ServerErr> {
    if !lecture.media_url.is_empty() {
        shared_state.blobs.binder.ensure_resolvable(&lecture.media_url).await?;
    }
    Ok(())
}

async fn find(shared_state: &AppState, id: &str) -> Result<Lecture, ServerErr> {
    shared_state
        .catalog
        .get(id)
        .await?
        .ok_or_else(|| ServerErr::NotFound(format!("lecture {}", id)))
}

#[get("/lectures")]
async fn list_lectures(shared_state: web::Data<AppState>) -> Result<HttpResponse, ServerErr> {
    let lectures = shared_state.catalog.list().await?;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(lectures))
}

#[get("/lectures/{id}")]
async fn get_lecture(id: web::Path<String>, shared_state: web::Data<AppState>) -> Result<HttpResponse, ServerErr> {
    let lecture = find(&shared_state, &id).await?;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(lecture))
}

#[post("/lectures")]
async fn create_lecture(
    req: HttpRequest,
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    shared_state.authorizer.authorize(&req)?;
    let lecture = parse_request(&request_json_bytes)?.into_lecture()?;
    check_media(&shared_state, &lecture).await?;
    shared_state.catalog.put(&lecture).await?;
    tracing::info!("created lecture {} ({})", lecture.id, lecture.title);
    Ok(HttpResponse::Created().content_type(APP_TYPE_JSON).json(lecture))
}

#[put("/lectures/{id}")]
async fn update_lecture(
    id: web::Path<String>,
    req: HttpRequest,
    request_json_bytes: web::Bytes,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    shared_state.authorizer.authorize(&req)?;
    let update = parse_request(&request_json_bytes)?;
    let mut lecture = find(&shared_state, &id).await?;
    update.apply_to(&mut lecture)?;
    check_media(&shared_state, &lecture).await?;
    shared_state.catalog.put(&lecture).await?;
    tracing::debug!("updated lecture {}", lecture.id);
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(lecture))
}

#[delete("/lectures/{id}")]
async fn delete_lecture(
    id: web::Path<String>,
    req: HttpRequest,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    shared_state.authorizer.authorize(&req)?;
    let removed = shared_state
        .catalog
        .remove(&id)
        .await?
        .ok_or_else(|| ServerErr::NotFound(format!("lecture {}", id.as_str())))?;
    tracing::info!("deleted lecture {}", removed.id);
    shared_state.blobs.binder.delete_blob_for(&removed).await;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(json!({ "ok": true })))
}
