use actix_web::{
    Error, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::{
        Method,
        header::{self, HeaderMap, HeaderValue},
    },
    middleware::Next,
    web::Data,
};

use crate::config::Config;

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Origin of the request when it is on the allow-list.
fn allowed_origin(req: &ServiceRequest) -> Option<HeaderValue> {
    let origin = req.headers().get(header::ORIGIN)?;
    let config = req.app_data::<Data<Config>>()?;
    let text = origin.to_str().ok()?.trim_end_matches('/');

    config
        .cors_allowed_origins
        .iter()
        .any(|allowed| allowed == text)
        .then(|| origin.clone())
}

fn decorate(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}

/// Answers preflight requests and adds `Access-Control-Allow-*` headers for
/// allow-listed origins. Other origins get no CORS headers at all.
pub async fn cors_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let origin = allowed_origin(&req);

    if req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    {
        let mut resp = HttpResponse::NoContent().finish();
        if let Some(origin) = origin {
            decorate(resp.headers_mut(), origin);
        }
        return Ok(req.into_response(resp));
    }

    let mut res = next.call(req).await?;
    if let Some(origin) = origin {
        decorate(res.headers_mut(), origin);
    }
    Ok(res)
}
