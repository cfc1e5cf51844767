//! apiwire platform-native transport adapter.
//!
//! Embedding hosts (mini-program runtimes, app shells) expose their own
//! request primitive plus loading indicators. [`PlatformSdk`] is the seam a
//! host implements; [`PlatformAdapter`] turns it into a
//! [`pipeline::PlatformTransport`].
//!
//! ## Pass-through fields
//!
//! | Key | Effect |
//! |-----|--------|
//! | `isShowLoading` | `false` suppresses the indicator (default `true`) |
//! | `navLoading` | `true` uses the navigation-bar indicator instead of a toast |
//! | `loadingTitle` | toast text (default `"loading"`) |
//! | `header` | request headers |
//!
//! Every other pass-through field is forwarded to the SDK in
//! [`SdkRequest::extra`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`pipeline`] crate sees only
//! [`pipeline::PlatformTransport`].

use async_trait::async_trait;
use pipeline::{HttpMethod, JsonMap, PlatformRequest, PlatformTransport, TransportError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_LOADING_TITLE: &str = "loading";

// ---------------------------------------------------------------------------
// SDK seam
// ---------------------------------------------------------------------------

/// A request as handed to the host SDK.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkRequest {
    pub url: String,
    pub method: HttpMethod,
    pub data: JsonMap,
    pub header: JsonMap,
    /// Remaining pass-through fields.
    pub extra: JsonMap,
}

/// The host SDK's success callback payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkResponse {
    pub status_code: u16,
    pub data: Value,
}

/// The host SDK's failure callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{err_msg}")]
pub struct SdkFailure {
    pub err_msg: String,
}

impl SdkFailure {
    pub fn new(err_msg: impl Into<String>) -> Self {
        Self {
            err_msg: err_msg.into(),
        }
    }
}

/// The host's request primitive and loading indicators.
///
/// Indicator methods default to no-ops for hosts without UI.
#[async_trait]
pub trait PlatformSdk: Send + Sync {
    async fn request(&self, request: SdkRequest) -> Result<SdkResponse, SdkFailure>;

    fn show_loading(&self, _title: &str) {}

    fn hide_loading(&self) {}

    fn show_nav_loading(&self) {}

    fn hide_nav_loading(&self) {}
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Indicator {
    None,
    Toast,
    NavBar,
}

/// [`PlatformTransport`] over a host [`PlatformSdk`].
#[derive(Debug, Clone)]
pub struct PlatformAdapter<S> {
    sdk: S,
}

impl<S: PlatformSdk> PlatformAdapter<S> {
    pub fn new(sdk: S) -> Self {
        Self { sdk }
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    fn show(&self, indicator: Indicator, title: &str) {
        match indicator {
            Indicator::None => {}
            Indicator::Toast => self.sdk.show_loading(title),
            Indicator::NavBar => self.sdk.show_nav_loading(),
        }
    }

    fn hide(&self, indicator: Indicator) {
        match indicator {
            Indicator::None => {}
            Indicator::Toast => self.sdk.hide_loading(),
            Indicator::NavBar => self.sdk.hide_nav_loading(),
        }
    }
}

#[async_trait]
impl<S: PlatformSdk> PlatformTransport for PlatformAdapter<S> {
    async fn request(&self, request: PlatformRequest) -> Result<Value, TransportError> {
        let method = parse_platform_method(&request.method)?;

        let mut extra = request.passthrough;
        let indicator = indicator_for(&extra);
        let title = match extra.remove("loadingTitle") {
            Some(Value::String(title)) => title,
            _ => DEFAULT_LOADING_TITLE.to_string(),
        };
        let header = match extra.remove("header") {
            Some(Value::Object(header)) => header,
            _ => JsonMap::new(),
        };
        extra.remove("isShowLoading");
        extra.remove("navLoading");

        let sdk_request = SdkRequest {
            url: request.url,
            method,
            data: request.data,
            header,
            extra,
        };

        debug!(url = %sdk_request.url, %method, ?indicator, "platform request");
        self.show(indicator, &title);
        let outcome = self.sdk.request(sdk_request).await;
        self.hide(indicator);

        match outcome {
            Ok(response) => {
                if response.status_code >= 400 {
                    warn!(status = response.status_code, "platform request returned an error status");
                }
                Ok(response.data)
            }
            Err(failure) => Err(TransportError::failed(failure.err_msg)),
        }
    }
}

/// The platform primitive supports every verb the pipeline knows except PATCH.
fn parse_platform_method(method: &str) -> Result<HttpMethod, TransportError> {
    match HttpMethod::parse(method)? {
        HttpMethod::Patch => Err(TransportError::UnknownMethod("PATCH".to_string())),
        other => Ok(other),
    }
}

fn indicator_for(passthrough: &JsonMap) -> Indicator {
    let show = passthrough
        .get("isShowLoading")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let nav = passthrough
        .get("navLoading")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    match (show, nav) {
        (false, _) => Indicator::None,
        (true, true) => Indicator::NavBar,
        (true, false) => Indicator::Toast,
    }
}
