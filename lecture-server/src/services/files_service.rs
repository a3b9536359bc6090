use std::collections::BTreeMap;
use std::convert::Infallible;
use actix_web::body::SizedStream;
use actix_web::http::header;
use actix_web::web::{Bytes, BytesMut};
use actix_web::{get, post, web, HttpRequest, HttpResponse, HttpResponseBuilder};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use blob_store::{BlobError, BlobId, BlobMetadata, MediaKind, ServeStatus, UploadRequest};
use crate::errors::ServerErr;
use crate::params::DeliveryMode;
use crate::services::{AppState, APP_TYPE_JSON};

pub const FILE_NAME_HEADER: &str = "x-file-name";
pub const ATTRIBUTE_HEADER_PREFIX: &str = "x-blob-attr-";
pub const FORM_FILE_FIELD: &str = "file";
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000";
const MULTIPART_FRAMING_ALLOWANCE: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    blob_id: String,
    url: String,
    media_kind: MediaKind,
    stored_filename: String,
    length: u64,
}

impl From<BlobMetadata> for UploadResponse {
    fn from(metadata: BlobMetadata) -> Self {
        Self {
            blob_id: metadata.blob_id.to_string(),
            url: metadata.blob_id.url(),
            media_kind: metadata.media_kind,
            stored_filename: metadata.stored_filename,
            length: metadata.length,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormUploadResponse {
    ok: bool,
    media_type: MediaKind,
    #[serde(flatten)]
    upload: UploadResponse,
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

/// Reads the out-of-band file description from request headers.
fn upload_request(req: &HttpRequest) -> UploadRequest {
    let attributes: BTreeMap<String, String> = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(ATTRIBUTE_HEADER_PREFIX)?;
            Some((key.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();
    UploadRequest {
        original_name: header_str(req, FILE_NAME_HEADER).unwrap_or_default().to_string(),
        content_type: header_str(req, header::CONTENT_TYPE.as_str()).map(str::to_string),
        attributes,
    }
}

#[get("/files/{blob_id}")]
async fn get_file(
    path: web::Path<String>,
    req: HttpRequest,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    let blob_id: BlobId = path
        .parse()
        .map_err(|_| ServerErr::NotFound(format!("file {}", path.as_str())))?;
    // A Range header that is not valid text is as unsatisfiable as a malformed one.
    let range = req
        .headers()
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default());

    let served = shared_state.blobs.reader.serve(blob_id, range).await?;
    let mut response = match served.status {
        ServeStatus::Full => HttpResponse::Ok(),
        ServeStatus::Partial => HttpResponse::PartialContent(),
    };
    for (name, value) in served.headers() {
        // The body sets Content-Length itself.
        if name != "Content-Length" {
            response.insert_header((name, value));
        }
    }
    response.insert_header((header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL));

    match shared_state.delivery_mode {
        DeliveryMode::Streaming => Ok(stream_body(response, served.content_length(), served.body, blob_id)),
        DeliveryMode::Buffered => Ok(response.body(served.into_buffered().await?)),
    }
}

fn stream_body(mut response: HttpResponseBuilder, length: u64, body: blob_store::ByteStream, blob_id: BlobId) -> HttpResponse {
    let body = body.inspect_err(move |e| {
        tracing::warn!("aborting response for blob {} mid-stream: {}", blob_id, e);
    });
    response.body(SizedStream::new(length, body))
}

#[post("/files")]
async fn upload_file(
    req: HttpRequest,
    payload: web::Payload,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    shared_state.authorizer.authorize(&req)?;
    let request = upload_request(&req);
    let declared_length = match header_str(&req, header::CONTENT_LENGTH.as_str()) {
        Some(value) => Some(
            value
                .parse::<u64>()
                .map_err(|_| ServerErr::BadRequest("invalid Content-Length".to_string()))?,
        ),
        None => None,
    };
    let uploader = &shared_state.blobs.uploader;

    let metadata = match shared_state.delivery_mode {
        DeliveryMode::Streaming => uploader.upload_stream(payload, declared_length, request).await?,
        DeliveryMode::Buffered => {
            let body = read_limited(payload, declared_length, uploader.max_upload_size()).await?;
            uploader.upload_bytes(body, request).await?
        }
    };
    Ok(HttpResponse::Created().content_type(APP_TYPE_JSON).json(UploadResponse::from(metadata)))
}

/// Collects a request body, failing as soon as it grows past `limit`.
async fn read_limited(mut payload: web::Payload, declared_length: Option<u64>, limit: u64) -> Result<Bytes, ServerErr> {
    if let Some(attempted) = declared_length.filter(|declared| *declared > limit) {
        return Err(BlobError::SizeLimitExceeded { limit, attempted }.into());
    }
    let mut body = BytesMut::new();
    while let Some(piece) = payload.next().await {
        let piece = piece.map_err(|e| ServerErr::BadRequest(e.to_string()))?;
        let attempted = (body.len() + piece.len()) as u64;
        if attempted > limit {
            return Err(BlobError::SizeLimitExceeded { limit, attempted }.into());
        }
        body.extend_from_slice(&piece);
    }
    Ok(body.freeze())
}

/// `multipart/form-data` upload with the file in a `file` field, as posted
/// by the admin page.
#[post("/upload")]
async fn upload_form(
    req: HttpRequest,
    payload: web::Payload,
    shared_state: web::Data<AppState>,
) -> Result<HttpResponse, ServerErr> {
    shared_state.authorizer.authorize(&req)?;
    let boundary = header_str(&req, header::CONTENT_TYPE.as_str())
        .and_then(|content_type| multer::parse_boundary(content_type).ok())
        .ok_or_else(|| ServerErr::BadRequest("expected multipart/form-data".to_string()))?;
    let uploader = &shared_state.blobs.uploader;
    // The form body is held in memory, so it is bounded by the file limit plus framing.
    let body = read_limited(payload, None, uploader.max_upload_size() + MULTIPART_FRAMING_ALLOWANCE).await?;

    let mut form = multer::Multipart::new(stream::once(async move { Ok::<_, Infallible>(body) }), boundary);
    while let Some(field) = form.next_field().await.map_err(|e| ServerErr::BadRequest(e.to_string()))? {
        if field.name() != Some(FORM_FILE_FIELD) {
            continue;
        }
        let request = UploadRequest {
            original_name: field.file_name().unwrap_or_default().to_string(),
            content_type: field.content_type().map(|mime| mime.to_string()),
            attributes: BTreeMap::new(),
        };
        let metadata = uploader.upload_stream(field, None, request).await?;
        let resp = FormUploadResponse {
            ok: true,
            media_type: metadata.media_kind,
            upload: UploadResponse::from(metadata),
        };
        return Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(resp));
    }
    Err(ServerErr::BadRequest("no file uploaded".to_string()))
}
