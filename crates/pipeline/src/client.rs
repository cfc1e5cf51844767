//! The client: configuration, transport registration, global middleware, and
//! turning an [`ApiGroup`] tree into callable [`ApiFunction`]s.
//!
//! ```ignore
//! let client = Client::builder(ClientConfig::default())
//!     .http(ReqwestHttp::new())
//!     .build()?;
//! client.use_middleware(logging).use_middleware(auth);
//! let apis = client.get_api(&ApiGroup::new("users").endpoint(EndpointConfig::new("list")));
//! let users = apis["list"].call(json!({ "page": 1 })).await?;
//! ```
//!
//! Middleware registered with [`Client::use_middleware`] applies to every call
//! made after registration, including calls through functions obtained
//! earlier. The chain is compiled per call from a snapshot of the list, so a
//! registration racing an in-flight call never affects that call.

use std::sync::{Arc, RwLock};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::api::{ApiFunction, ApiMap};
use crate::descriptor::{flatten, ApiGroup, ClientDefaults, RequestDescriptor};
use crate::dispatch::Dispatch;
use crate::errors::ConfigError;
use crate::framing::FramingSet;
use crate::middleware::{MiddlewareRef, Pipeline};
use crate::transport::{HttpTransport, JsonpTransport, PlatformTransport, Transports};
use crate::types::{JsonMap, TransportKind, TransportRoute, VALID_REQ_TYPES};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Client-wide configuration. Deserializes from camelCase keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Prepended to every endpoint's full path.
    pub host: String,
    /// Transport kind; see [`VALID_REQ_TYPES`]. `None` means `auto`.
    #[serde(alias = "transport")]
    pub req_type: Option<String>,
    /// Defaults for the HTTP transport's options.
    pub http_options: JsonMap,
    /// Defaults for the JSONP transport's options.
    pub jsonp_options: JsonMap,
    /// Response data substituted when a transport fails.
    pub default_error_data: Value,
}

impl ClientConfig {
    /// `{"code": 999, "msg": "request failed"}`.
    pub fn default_error_data() -> Value {
        json!({ "code": 999, "msg": "request failed" })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            req_type: None,
            http_options: JsonMap::new(),
            jsonp_options: JsonMap::new(),
            default_error_data: Self::default_error_data(),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Registers transports and initial middleware, then validates the config.
pub struct ClientBuilder {
    config: ClientConfig,
    transports: Transports,
    middleware: Vec<MiddlewareRef>,
    framing: FramingSet,
}

impl ClientBuilder {
    /// Registers the platform-native transport. With `auto`, its presence
    /// makes platform the default route.
    pub fn platform(mut self, transport: impl PlatformTransport + 'static) -> Self {
        self.transports.platform = Some(Arc::new(transport));
        self
    }

    /// Registers the generic HTTP transport.
    pub fn http(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transports.http = Some(Arc::new(transport));
        self
    }

    /// Registers the JSONP transport.
    pub fn jsonp(mut self, transport: impl JsonpTransport + 'static) -> Self {
        self.transports.jsonp = Some(Arc::new(transport));
        self
    }

    /// Appends a global middleware.
    pub fn middleware(mut self, middleware: MiddlewareRef) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replaces the framing middleware.
    pub fn framing(mut self, framing: FramingSet) -> Self {
        self.framing = framing;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidReqType`] when `reqType` is outside
    /// [`VALID_REQ_TYPES`].
    pub fn build(self) -> Result<Client, ConfigError> {
        let kind = match self.config.req_type.as_deref() {
            None => TransportKind::Auto,
            Some(raw) => raw.parse::<TransportKind>().map_err(|e| {
                error!(req_type = raw, valid = ?VALID_REQ_TYPES, "invalid client reqType");
                e
            })?,
        };

        let platform_available = self.transports.platform.is_some();
        let defaults = ClientDefaults {
            host: self.config.host.clone(),
            kind: Some(kind),
            platform_available,
            http_options: self.config.http_options.clone(),
            jsonp_options: self.config.jsonp_options.clone(),
        };
        let route = kind.resolve(platform_available);
        info!(%route, host = %defaults.host, "client built");

        let dispatch: MiddlewareRef = Arc::new(Dispatch::new(
            self.transports,
            self.config.default_error_data.clone(),
        ));

        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                defaults,
                route,
                middleware: RwLock::new(self.middleware),
                framing: self.framing,
                dispatch,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Entry point for building API functions. Cheap to clone; clones share the
/// global middleware list.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    defaults: ClientDefaults,
    route: TransportRoute,
    middleware: RwLock<Vec<MiddlewareRef>>,
    framing: FramingSet,
    dispatch: MiddlewareRef,
}

impl Client {
    /// Starts a builder with no transports and the default framing.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            transports: Transports::default(),
            middleware: Vec::new(),
            framing: FramingSet::default(),
        }
    }

    /// A client with no transports registered. Useful when every endpoint is
    /// served by short-circuiting middleware.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Appends a global middleware. Returns `self` for chaining.
    pub fn use_middleware(&self, middleware: MiddlewareRef) -> &Self {
        debug!(middleware = middleware.name(), "registering global middleware");
        self.inner.write_middleware().push(middleware);
        self
    }

    /// Flattens `group` into callable functions keyed by API name.
    ///
    /// When two leaves share a name the later definition wins.
    pub fn get_api(&self, group: &ApiGroup) -> ApiMap {
        let mut apis = ApiMap::default();
        for descriptor in flatten(group, &self.inner.defaults) {
            let name = descriptor.api_name.clone();
            let api = ApiFunction::new(descriptor, Arc::clone(&self.inner));
            if let Some(previous) = apis.insert(api) {
                warn!(
                    api = %name,
                    replaced = previous.key(),
                    "duplicate API name, later definition wins"
                );
            }
        }
        debug!(count = apis.len(), "api map built");
        apis
    }

    /// The transport the client resolved to at build time.
    pub fn route(&self) -> TransportRoute {
        self.inner.route
    }

    /// The configured host prefix.
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Data substituted when a transport fails.
    pub fn default_error_data(&self) -> &Value {
        &self.inner.config.default_error_data
    }

    /// Number of registered global middleware.
    pub fn global_middleware_len(&self) -> usize {
        self.inner.snapshot().len()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("route", &self.inner.route)
            .field("framing", &self.inner.framing)
            .field("global_middleware", &self.global_middleware_len())
            .finish()
    }
}

impl ClientInner {
    /// Compiles the chain for one call against the current global list.
    pub(crate) fn compile(&self, descriptor: &RequestDescriptor) -> Pipeline {
        let global = self.snapshot();
        Pipeline::compile(
            &self.framing,
            &global,
            &descriptor.middleware,
            descriptor.use_global_middleware,
            Arc::clone(&self.dispatch),
        )
    }

    fn snapshot(&self) -> Vec<MiddlewareRef> {
        self.middleware
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn write_middleware(&self) -> std::sync::RwLockWriteGuard<'_, Vec<MiddlewareRef>> {
        self.middleware
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
