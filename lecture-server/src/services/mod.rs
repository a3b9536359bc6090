use std::sync::Arc;
use actix_web::web;
use blob_store::BlobServices;
use crate::auth::Authorizer;
use crate::catalog::SharedCatalog;
use crate::params::DeliveryMode;

pub mod auth_service;
pub mod files_service;
pub mod lecture_service;

pub const APP_TYPE_JSON: &str = "application/json";

pub struct AppState {
    pub(crate) blobs: BlobServices,
    pub(crate) catalog: SharedCatalog,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) admin_password: String,
    pub(crate) delivery_mode: DeliveryMode,
}

/// Registers every route. Blob routes answer both at the root and under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(files_service::get_file)
        .service(files_service::upload_file)
        .service(
            web::scope("/api")
                .service(files_service::get_file)
                .service(files_service::upload_file)
                .service(files_service::upload_form)
                .service(auth_service::login)
                .service(auth_service::health)
                .service(lecture_service::list_lectures)
                .service(lecture_service::get_lecture)
                .service(lecture_service::create_lecture)
                .service(lecture_service::update_lecture)
                .service(lecture_service::delete_lecture),
        );
}
