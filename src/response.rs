//! Response helpers shared by the endpoint wrapper and the router.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use serde_json::Value;

/// Build a JSON response with the given status and extra headers.
pub fn json_response(status: StatusCode, headers: &HeaderMap, body: &Value) -> Response {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"null".to_vec());
    let mut res = Response::new(Body::from(bytes));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    append_headers(res.headers_mut(), headers);
    res
}

pub fn empty_response(status: StatusCode) -> Response {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;
    res
}

/// Copy `from` into `into`. `Set-Cookie` values are appended, everything else overwrites.
pub fn append_headers(into: &mut HeaderMap, from: &HeaderMap) {
    let mut last_name = None;
    for (name, value) in from.iter() {
        if name == header::SET_COOKIE {
            into.append(name.clone(), value.clone());
            continue;
        }
        // First value of a repeated header replaces, the rest append.
        if last_name.as_ref() != Some(name) {
            into.insert(name.clone(), value.clone());
        } else {
            into.append(name.clone(), value.clone());
        }
        last_name = Some(name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_is_appended_not_overwritten() {
        let mut into = HeaderMap::new();
        into.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        into.insert("x-trace", HeaderValue::from_static("old"));
        let mut from = HeaderMap::new();
        from.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        from.insert("x-trace", HeaderValue::from_static("new"));
        append_headers(&mut into, &from);
        let cookies: Vec<_> = into.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(into.get("x-trace").unwrap(), "new");
    }
}
