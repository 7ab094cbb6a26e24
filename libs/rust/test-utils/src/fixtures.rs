//! Test fixtures with sample data.

use reqwest::Method;
use rest_common::{BufferedRequest, CorrelationContext};
use url::Url;
use uuid::Uuid;

/// Context of an authenticated member with a fresh trace id.
#[must_use]
pub fn member_context(member_id: &str) -> CorrelationContext {
    CorrelationContext::new(Uuid::new_v4().simple().to_string(), member_id)
}

/// JSON order creation request against `base`.
///
/// # Panics
///
/// Panics if `base` is not an absolute URL.
#[must_use]
pub fn sample_order_request(base: &str) -> BufferedRequest {
    let url = Url::parse(base)
        .and_then(|base| base.join("/v1/orders?dryRun=true"))
        .expect("fixture base URL is absolute");

    BufferedRequest::new(Method::POST, url).with_body(r#"{"sku":"A-100","quantity":2}"#)
}

/// Sample JSON payload returned by a remote order API.
pub const SAMPLE_ORDER_RESPONSE: &str = r#"{"orderId":"ord-1","status":"ACCEPTED"}"#;
