//! Request gatekeeping
//!
//! Extracts the credential from the inbound request, asks the authorization
//! service about it and either forwards the request enriched with claim
//! headers or terminates it.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokengate_grpc::{ClaimSet, TokenValidator};
use tracing::{debug, error};

/// Scheme prefix the Authorization header must carry
pub const AUTH_SCHEME_PREFIX: &str = "JWT ";

/// Headers claims may never overwrite
pub const PROTECTED_HEADERS: [HeaderName; 8] = [
    header::AUTHORIZATION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
    header::TE,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

/// Reasons a request is terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No Authorization header, or an empty one
    MissingHeader,
    /// Authorization header without the expected scheme
    MalformedHeader,
    /// The authorization service rejected the token
    InvalidToken,
    /// The token could not be verified
    ValidationFailed,
}

impl Rejection {
    /// HTTP status written for this rejection
    pub fn status(self) -> StatusCode {
        match self {
            Rejection::MissingHeader | Rejection::MalformedHeader | Rejection::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Rejection::ValidationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body written for this rejection
    pub fn body(self) -> &'static str {
        match self {
            Rejection::MissingHeader => "Authorization header missing",
            Rejection::MalformedHeader => "Invalid Authorization header format",
            Rejection::InvalidToken => "Invalid token",
            Rejection::ValidationFailed => "Error validating token",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}

/// Outcome of gatekeeping for one request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDecision {
    /// Let the request through after setting these headers
    Forward(Vec<(HeaderName, HeaderValue)>),
    /// Answer the request directly
    Terminate(Rejection),
}

/// Claim that cannot be turned into a request header
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimHeaderError {
    /// Claim name is not a valid header name
    #[error("claim {0:?} is not a valid header name")]
    InvalidName(String),

    /// Rendered value contains characters not allowed in a header
    #[error("claim {0:?} renders to an invalid header value")]
    InvalidValue(String),

    /// Claim would overwrite a protected header
    #[error("claim {claim:?} maps to protected header {header}")]
    Protected {
        /// Claim name
        claim: String,
        /// Header it would have written
        header: HeaderName,
    },

    /// Two claims normalize to the same header name
    #[error("claim {claim:?} collides with another claim on header {header}")]
    Duplicate {
        /// Claim name
        claim: String,
        /// Header both claims map to
        header: HeaderName,
    },
}

/// How claim names become header names
#[derive(Debug, Clone, Default)]
pub struct ClaimHeaderPolicy {
    prefix: String,
}

impl ClaimHeaderPolicy {
    /// Policy prepending `prefix` to every claim name. An empty prefix keeps
    /// claim names verbatim.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Header name for `claim`
    pub fn header_name(&self, claim: &str) -> Result<HeaderName, ClaimHeaderError> {
        let name = format!("{}{}", self.prefix, claim);
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClaimHeaderError::InvalidName(claim.to_string()))?;

        if PROTECTED_HEADERS.contains(&header) {
            return Err(ClaimHeaderError::Protected {
                claim: claim.to_string(),
                header,
            });
        }

        Ok(header)
    }

    /// Render every claim as a header. Fails on the first unusable claim.
    /// Header names are case-insensitive, so claims differing only in case
    /// collide and fail the whole set.
    pub fn render(
        &self,
        claims: &ClaimSet,
    ) -> Result<Vec<(HeaderName, HeaderValue)>, ClaimHeaderError> {
        let mut seen = HashSet::with_capacity(claims.len());
        let mut rendered = Vec::with_capacity(claims.len());

        for (claim, value) in claims {
            let name = self.header_name(claim)?;
            if !seen.insert(name.clone()) {
                return Err(ClaimHeaderError::Duplicate {
                    claim: claim.clone(),
                    header: name,
                });
            }
            let value = HeaderValue::from_bytes(value.to_string().as_bytes())
                .map_err(|_| ClaimHeaderError::InvalidValue(claim.clone()))?;
            rendered.push((name, value));
        }

        Ok(rendered)
    }
}

/// Pull the token out of the Authorization header
pub fn extract_token(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::MissingHeader)?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(AUTH_SCHEME_PREFIX))
        .ok_or(Rejection::MalformedHeader)
}

/// Decides forward vs. terminate for each request
#[derive(Clone)]
pub struct Gatekeeper {
    validator: Arc<dyn TokenValidator>,
    headers: ClaimHeaderPolicy,
}

impl Gatekeeper {
    /// Create a gatekeeper around a validator
    pub fn new(validator: Arc<dyn TokenValidator>, headers: ClaimHeaderPolicy) -> Self {
        Self { validator, headers }
    }

    /// Run the extraction, validation and enrichment steps. Stops at the
    /// first failure.
    pub async fn evaluate(&self, headers: &HeaderMap) -> RequestDecision {
        let token = match extract_token(headers) {
            Ok(token) => token,
            Err(rejection) => return reject(rejection),
        };

        let outcome = match self.validator.check_token(token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Token validation failed");
                return reject(Rejection::ValidationFailed);
            }
        };

        if !outcome.is_valid() {
            return reject(Rejection::InvalidToken);
        }

        match self.headers.render(&outcome.claims) {
            Ok(headers) => {
                debug!(claims = headers.len(), "Token accepted");
                RequestDecision::Forward(headers)
            }
            Err(e) => {
                error!(error = %e, "Claims cannot be forwarded");
                reject(Rejection::ValidationFailed)
            }
        }
    }
}

fn reject(rejection: Rejection) -> RequestDecision {
    // Server-side failures are logged where they happen
    if rejection.status().is_client_error() {
        debug!(reason = rejection.body(), "Request rejected");
    }
    RequestDecision::Terminate(rejection)
}

/// Middleware applying the gatekeeper decision to each request
pub async fn gate(
    State(gatekeeper): State<Gatekeeper>,
    mut req: Request,
    next: Next,
) -> Response {
    match gatekeeper.evaluate(req.headers()).await {
        RequestDecision::Forward(headers) => {
            for (name, value) in headers {
                req.headers_mut().insert(name, value);
            }
            next.run(req).await
        }
        RequestDecision::Terminate(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tokengate_grpc::{ClaimValue, PayloadError, ValidationError, ValidationOutcome};
    use tower::ServiceExt; // for oneshot

    /// Validator answering from a fixed script
    enum FakeValidator {
        Valid(ClaimSet),
        Invalid,
        CallFails,
        MappingFails,
    }

    #[tonic::async_trait]
    impl TokenValidator for FakeValidator {
        async fn check_token(&self, token: &str) -> Result<ValidationOutcome, ValidationError> {
            assert_eq!(token, "abc123");
            match self {
                FakeValidator::Valid(claims) => Ok(ValidationOutcome::valid(claims.clone())),
                FakeValidator::Invalid => Ok(ValidationOutcome::invalid()),
                FakeValidator::CallFails => Err(ValidationError::Call(
                    tonic::Status::unavailable("connection refused"),
                )),
                FakeValidator::MappingFails => {
                    Err(ValidationError::Payload(PayloadError::UnsupportedType {
                        claim: "roles".into(),
                        type_url: "type.googleapis.com/google.protobuf.ListValue".into(),
                    }))
                }
            }
        }
    }

    fn claims(entries: Vec<(&str, ClaimValue)>) -> ClaimSet {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn gatekeeper(validator: FakeValidator) -> Gatekeeper {
        Gatekeeper::new(Arc::new(validator), ClaimHeaderPolicy::default())
    }

    fn auth_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    /// Echo the claim headers the upstream would see
    async fn echo(req: Request) -> String {
        let sub = req.headers().get("sub").map(|v| v.to_str().unwrap().to_string());
        let exp = req.headers().get("exp").map(|v| v.to_str().unwrap().to_string());
        format!("{}|{}", sub.unwrap_or_default(), exp.unwrap_or_default())
    }

    fn app(gatekeeper: Gatekeeper) -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(middleware::from_fn_with_state(gatekeeper, gate))
    }

    async fn send(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut request = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }

        let response = app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token(&auth_headers("JWT abc123")), Ok("abc123"));
        // Remainder is passed verbatim
        assert_eq!(extract_token(&auth_headers("JWT  abc ")), Ok(" abc "));
        assert_eq!(extract_token(&auth_headers("JWT ")), Ok(""));
    }

    #[test]
    fn test_extract_token_rejections() {
        assert_eq!(extract_token(&HeaderMap::new()), Err(Rejection::MissingHeader));
        assert_eq!(extract_token(&auth_headers("")), Err(Rejection::MissingHeader));
        assert_eq!(
            extract_token(&auth_headers("Bearer xyz")),
            Err(Rejection::MalformedHeader)
        );
        assert_eq!(extract_token(&auth_headers("JWT")), Err(Rejection::MalformedHeader));
        assert_eq!(
            extract_token(&auth_headers("jwt abc123")),
            Err(Rejection::MalformedHeader)
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"JWT \xff\xfe").unwrap(),
        );
        assert_eq!(extract_token(&headers), Err(Rejection::MalformedHeader));
    }

    #[test]
    fn test_rejection_responses() {
        assert_eq!(Rejection::MissingHeader.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::MalformedHeader.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Rejection::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Rejection::ValidationFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Rejection::ValidationFailed.body(), "Error validating token");
    }

    #[test]
    fn test_header_policy_verbatim() {
        let policy = ClaimHeaderPolicy::default();
        assert_eq!(policy.header_name("sub").unwrap(), HeaderName::from_static("sub"));
        // Header names are case-insensitive and stored lowercase
        assert_eq!(
            policy.header_name("X-User-Id").unwrap(),
            HeaderName::from_static("x-user-id")
        );
    }

    #[test]
    fn test_header_policy_prefix() {
        let policy = ClaimHeaderPolicy::new("x-claim-");
        assert_eq!(
            policy.header_name("sub").unwrap(),
            HeaderName::from_static("x-claim-sub")
        );
        // Prefixed names no longer collide with protected headers
        assert_eq!(
            policy.header_name("host").unwrap(),
            HeaderName::from_static("x-claim-host")
        );
    }

    #[test]
    fn test_header_policy_rejects_unusable_claims() {
        let policy = ClaimHeaderPolicy::default();
        assert_eq!(
            policy.header_name("has space"),
            Err(ClaimHeaderError::InvalidName("has space".into()))
        );
        assert!(matches!(
            policy.header_name("Authorization"),
            Err(ClaimHeaderError::Protected { .. })
        ));

        let bad_value = claims(vec![("note", ClaimValue::Text("line\nbreak".into()))]);
        assert_eq!(
            policy.render(&bad_value),
            Err(ClaimHeaderError::InvalidValue("note".into()))
        );
    }

    #[test]
    fn test_render_rejects_case_colliding_claims() {
        let policy = ClaimHeaderPolicy::default();
        let colliding = claims(vec![
            ("Role", ClaimValue::Text("admin".into())),
            ("role", ClaimValue::Text("guest".into())),
        ]);

        // Same outcome whichever claim the map yields first
        for _ in 0..50 {
            // Fresh map, fresh iteration order
            let fresh: ClaimSet = colliding.clone().into_iter().collect();
            match policy.render(&fresh) {
                Err(ClaimHeaderError::Duplicate { header, .. }) => {
                    assert_eq!(header, HeaderName::from_static("role"));
                }
                other => panic!("Unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn test_render_all_kinds() {
        let policy = ClaimHeaderPolicy::default();
        let rendered = policy
            .render(&claims(vec![
                ("name", ClaimValue::Text("José".into())),
                ("n", ClaimValue::UInt32(3)),
                ("ratio", ClaimValue::Double(0.5)),
                ("raw", ClaimValue::Bytes(vec![1, 2, 3])),
            ]))
            .unwrap();

        let lookup = |name: &str| {
            rendered
                .iter()
                .find(|(n, _)| n.as_str() == name)
                .map(|(_, v)| v.as_bytes().to_vec())
                .unwrap()
        };
        assert_eq!(lookup("name"), "José".as_bytes());
        assert_eq!(lookup("n"), b"3");
        assert_eq!(lookup("ratio"), b"0.5");
        assert_eq!(lookup("raw"), b"AQID");
    }

    #[tokio::test]
    async fn test_evaluate_forward() {
        let gatekeeper = gatekeeper(FakeValidator::Valid(claims(vec![(
            "sub",
            ClaimValue::Text("u1".into()),
        )])));

        let decision = gatekeeper.evaluate(&auth_headers("JWT abc123")).await;
        assert_eq!(
            decision,
            RequestDecision::Forward(vec![(
                HeaderName::from_static("sub"),
                HeaderValue::from_static("u1")
            )])
        );
    }

    #[tokio::test]
    async fn test_missing_header() {
        let app = app(gatekeeper(FakeValidator::Invalid));
        let (status, body) = send(app, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Authorization header missing");
    }

    #[tokio::test]
    async fn test_wrong_scheme() {
        let app = app(gatekeeper(FakeValidator::Invalid));
        let (status, body) = send(app, Some("Bearer xyz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid Authorization header format");
    }

    #[tokio::test]
    async fn test_valid_token_forwards_claims() {
        let app = app(gatekeeper(FakeValidator::Valid(claims(vec![
            ("sub", ClaimValue::Text("u1".into())),
            ("exp", ClaimValue::Int64(1_700_000_000)),
        ]))));

        let (status, body) = send(app, Some("JWT abc123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "u1|1700000000");
    }

    #[tokio::test]
    async fn test_claims_overwrite_inbound_headers() {
        let app = app(gatekeeper(FakeValidator::Valid(claims(vec![(
            "sub",
            ClaimValue::Text("u1".into()),
        )]))));

        let request = axum::http::Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "JWT abc123")
            .header("sub", "spoofed")
            .header("sub", "spoofed-again")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"u1|");
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let app = app(gatekeeper(FakeValidator::Invalid));
        let (status, body) = send(app, Some("JWT abc123")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid token");
    }

    #[tokio::test]
    async fn test_call_failure_is_server_error() {
        let app = app(gatekeeper(FakeValidator::CallFails));
        let (status, body) = send(app, Some("JWT abc123")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error validating token");
    }

    #[tokio::test]
    async fn test_mapping_failure_is_server_error() {
        let app = app(gatekeeper(FakeValidator::MappingFails));
        let (status, body) = send(app, Some("JWT abc123")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error validating token");
    }

    #[tokio::test]
    async fn test_case_colliding_claims_terminate() {
        let app = app(gatekeeper(FakeValidator::Valid(claims(vec![
            ("Sub", ClaimValue::Text("admin".into())),
            ("sub", ClaimValue::Text("guest".into())),
        ]))));

        let (status, body) = send(app, Some("JWT abc123")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error validating token");
    }

    #[tokio::test]
    async fn test_unusable_claim_terminates_without_forwarding() {
        let app = app(gatekeeper(FakeValidator::Valid(claims(vec![
            ("sub", ClaimValue::Text("u1".into())),
            ("host", ClaimValue::Text("evil.example".into())),
        ]))));

        let (status, body) = send(app, Some("JWT abc123")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error validating token");
    }
}
