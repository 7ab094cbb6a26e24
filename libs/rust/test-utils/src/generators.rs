//! Shared proptest generators.

use proptest::prelude::*;
use reqwest::Method;

/// Generate valid trace IDs (32 hex characters).
pub fn trace_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{32}"
}

/// Generate caller ids, including the empty caller.
pub fn caller_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z][a-z0-9._]{2,20}"]
}

/// Generate URL paths of one to four segments.
pub fn url_path_strategy() -> impl Strategy<Value = String> {
    "(/[a-z][a-z0-9-]{0,12}){1,4}"
}

/// Generate optional `key=value` query strings.
pub fn query_strategy() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-z]{1,8}=[a-z0-9]{1,8}(&[a-z]{1,8}=[a-z0-9]{1,8}){0,3}")
}

/// Generate request methods.
pub fn method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::GET),
        Just(Method::POST),
        Just(Method::PUT),
        Just(Method::PATCH),
        Just(Method::DELETE),
    ]
}

/// Generate HTTP status codes a remote API commonly returns.
pub fn http_status_code_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        Just(200u16),
        Just(201u16),
        Just(204u16),
        Just(301u16),
        Just(400u16),
        Just(401u16),
        Just(403u16),
        Just(404u16),
        Just(409u16),
        Just(429u16),
        Just(500u16),
        Just(502u16),
        Just(503u16),
    ]
}

/// Generate text bodies, including multi-line and non-ASCII ones.
pub fn body_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-zA-Z0-9 {}:\",]{0,64}",
        "[\\PC\n]{0,64}",
    ]
}
