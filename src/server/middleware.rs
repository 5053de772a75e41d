// HTTP middleware
// Author: kelexine (https://github.com/kelexine)

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use uuid::Uuid;

/// Generates `req_<uuid>` identifiers for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = format!("req_{}", Uuid::new_v4().simple());
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Create request ID layers for the application
pub fn request_id_layers() -> (SetRequestIdLayer<MakeReqId>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::x_request_id(MakeReqId),
        PropagateRequestIdLayer::x_request_id(),
    )
}
