use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "upload-notifier",
    }))
}

pub async fn live() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// The notifier holds no connections of its own; publishing failures surface
/// per request as 503 instead.
pub async fn ready() -> HttpResponse {
    HttpResponse::Ok().finish()
}
