use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

/// Same-origin policy; course images may come from any https host.
const CSP: &str = "default-src 'self'; img-src 'self' https: data:; object-src 'none'; base-uri 'self'; form-action 'self'; frame-ancestors 'none'";

pub async fn csp_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    set_if_missing(&mut res, "content-security-policy", CSP);
    set_if_missing(&mut res, "referrer-policy", "same-origin");
    set_if_missing(&mut res, "x-content-type-options", "nosniff");
    set_if_missing(&mut res, "x-frame-options", "DENY");

    res
}

fn set_if_missing(res: &mut Response<Body>, name: &'static str, value: &'static str) {
    if res.headers().get(name).is_none() {
        res.headers_mut()
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
}
