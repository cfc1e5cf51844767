//! API configuration tree and descriptor flattening.
//!
//! An [`ApiGroup`] is a sub-tree: a set of endpoint option defaults, a list of
//! leaf endpoints (`pathList`) and nested groups. [`flatten`] walks the tree
//! depth first and produces one [`RequestDescriptor`] per leaf.
//!
//! ## Precedence
//!
//! - A leaf's own options win over its group's, which win over the parent
//!   group's. `httpOptions`, `jsonpOptions` and pass-through fields are merged
//!   key by key rather than replaced.
//! - A nested group's `prefix` is appended to its parent's with `/`. A leaf
//!   that sets `prefix` uses it verbatim.
//! - Client-wide `host`, `reqType`, `httpOptions` and `jsonpOptions` fill in
//!   whatever the leaf leaves unset, again merging option maps key by key.
//!
//! Flattening never fails. An unknown `reqType` on a leaf is recorded as
//! [`RouteSelection::Invalid`] and reported when the endpoint is called.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::api::{PostHook, PreHook};
use crate::middleware::MiddlewareRef;
use crate::types::{JsonMap, Params, TransportKind, TransportRoute};

/// Verb used when neither the leaf nor its groups set one.
pub const DEFAULT_METHOD: &str = "get";

// ---------------------------------------------------------------------------
// Configuration tree
// ---------------------------------------------------------------------------

/// Options shared by groups and leaves. Every field is optional so that
/// inheritance can tell "unset" from "set".
///
/// Hooks and middleware are code: they are skipped by serde and attached
/// through the builder methods on [`EndpointConfig`] and [`ApiGroup`].
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointOptions {
    #[serde(alias = "type")]
    pub method: Option<String>,
    pub prefix: Option<String>,
    pub params: Option<Params>,
    #[serde(skip)]
    pub pre_hook: Option<Arc<dyn PreHook>>,
    #[serde(skip)]
    pub post_hook: Option<Arc<dyn PostHook>>,
    #[serde(skip)]
    pub middleware: Option<Vec<MiddlewareRef>>,
    pub use_global_middleware: Option<bool>,
    pub host: Option<String>,
    #[serde(alias = "transport")]
    pub req_type: Option<String>,
    pub http_options: Option<JsonMap>,
    pub jsonp_options: Option<JsonMap>,
    /// Unrecognised fields, forwarded to the transport untouched.
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl EndpointOptions {
    /// Fills every unset field from `parent`. Prefixes are handled by the
    /// tree walk, not here.
    pub fn inherit(self, parent: &EndpointOptions) -> EndpointOptions {
        let mut extra = parent.extra.clone();
        extra.extend(self.extra);

        EndpointOptions {
            method: self.method.or_else(|| parent.method.clone()),
            prefix: self.prefix,
            params: self.params.or_else(|| parent.params.clone()),
            pre_hook: self.pre_hook.or_else(|| parent.pre_hook.clone()),
            post_hook: self.post_hook.or_else(|| parent.post_hook.clone()),
            middleware: self.middleware.or_else(|| parent.middleware.clone()),
            use_global_middleware: self.use_global_middleware.or(parent.use_global_middleware),
            host: self.host.or_else(|| parent.host.clone()),
            req_type: self.req_type.or_else(|| parent.req_type.clone()),
            http_options: merge_optional(parent.http_options.as_ref(), self.http_options),
            jsonp_options: merge_optional(parent.jsonp_options.as_ref(), self.jsonp_options),
            extra,
        }
    }
}

impl std::fmt::Debug for EndpointOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointOptions")
            .field("method", &self.method)
            .field("prefix", &self.prefix)
            .field("params", &self.params)
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .field("middleware", &self.middleware.as_ref().map(Vec::len))
            .field("use_global_middleware", &self.use_global_middleware)
            .field("host", &self.host)
            .field("req_type", &self.req_type)
            .field("http_options", &self.http_options)
            .field("jsonp_options", &self.jsonp_options)
            .field("extra", &self.extra)
            .finish()
    }
}

/// A leaf endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub path: String,
    /// API name; defaults to `path`.
    pub name: Option<String>,
    #[serde(flatten)]
    pub options: EndpointOptions,
}

impl EndpointConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            options: EndpointOptions::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A sub-tree of endpoints sharing a prefix and option defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroup {
    #[serde(flatten)]
    pub options: EndpointOptions,
    #[serde(default)]
    pub path_list: Vec<EndpointConfig>,
    #[serde(default)]
    pub groups: Vec<ApiGroup>,
}

impl ApiGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut group = Self::default();
        group.options.prefix = Some(prefix.into());
        group
    }

    pub fn endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.path_list.push(endpoint);
        self
    }

    pub fn group(mut self, group: ApiGroup) -> Self {
        self.groups.push(group);
        self
    }
}

// ---------------------------------------------------------------------------
// Builder methods shared by leaves and groups.
// Generates one setter per option, writing through `self.options`.
// ---------------------------------------------------------------------------
macro_rules! option_setters {
    ($ty:ty) => {
        impl $ty {
            pub fn method(mut self, method: impl Into<String>) -> Self {
                self.options.method = Some(method.into());
                self
            }

            pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
                self.options.prefix = Some(prefix.into());
                self
            }

            pub fn params(mut self, params: Params) -> Self {
                self.options.params = Some(params);
                self
            }

            pub fn pre_hook(mut self, hook: impl PreHook + 'static) -> Self {
                self.options.pre_hook = Some(Arc::new(hook));
                self
            }

            pub fn post_hook(mut self, hook: impl PostHook + 'static) -> Self {
                self.options.post_hook = Some(Arc::new(hook));
                self
            }

            /// Appends an endpoint-local middleware.
            pub fn middleware(mut self, middleware: MiddlewareRef) -> Self {
                self.options
                    .middleware
                    .get_or_insert_with(Vec::new)
                    .push(middleware);
                self
            }

            pub fn use_global_middleware(mut self, enabled: bool) -> Self {
                self.options.use_global_middleware = Some(enabled);
                self
            }

            pub fn host(mut self, host: impl Into<String>) -> Self {
                self.options.host = Some(host.into());
                self
            }

            pub fn req_type(mut self, req_type: impl Into<String>) -> Self {
                self.options.req_type = Some(req_type.into());
                self
            }

            pub fn http_options(mut self, options: JsonMap) -> Self {
                self.options.http_options = Some(options);
                self
            }

            pub fn jsonp_options(mut self, options: JsonMap) -> Self {
                self.options.jsonp_options = Some(options);
                self
            }

            /// Sets a pass-through field forwarded to the transport.
            pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
                self.options.extra.insert(key.into(), value);
                self
            }
        }
    };
}

option_setters!(EndpointConfig);
option_setters!(ApiGroup);

// ---------------------------------------------------------------------------
// Finalized descriptors
// ---------------------------------------------------------------------------

/// The transport a descriptor is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSelection {
    Valid(TransportRoute),
    /// The configured `reqType` is not a supported transport.
    Invalid(String),
}

/// Client-wide values merged into every leaf.
#[derive(Debug, Clone, Default)]
pub struct ClientDefaults {
    pub host: String,
    pub kind: Option<TransportKind>,
    pub platform_available: bool,
    pub http_options: JsonMap,
    pub jsonp_options: JsonMap,
}

impl ClientDefaults {
    fn route_for(&self, req_type: Option<&str>) -> RouteSelection {
        let kind = match req_type {
            None => self.kind.unwrap_or(TransportKind::Auto),
            Some(raw) => match raw.parse::<TransportKind>() {
                Ok(kind) => kind,
                Err(_) => return RouteSelection::Invalid(raw.to_string()),
            },
        };
        RouteSelection::Valid(kind.resolve(self.platform_available))
    }
}

/// Static configuration of one endpoint, resolved at flatten time.
#[derive(Clone)]
pub struct RequestDescriptor {
    /// `name`, or `path` when no name is set.
    pub api_name: String,
    pub method: String,
    pub path: String,
    pub prefix: String,
    /// `prefix + "/" + path`; also the prefetch key.
    pub full_path: String,
    pub params: Params,
    pub pre_hook: Option<Arc<dyn PreHook>>,
    pub post_hook: Option<Arc<dyn PostHook>>,
    pub middleware: Vec<MiddlewareRef>,
    pub use_global_middleware: bool,
    pub host: String,
    pub route: RouteSelection,
    pub http_options: JsonMap,
    pub jsonp_options: JsonMap,
    pub extra: JsonMap,
}

impl RequestDescriptor {
    fn finalize(leaf: EndpointConfig, prefix: String, defaults: &ClientDefaults) -> Self {
        let EndpointConfig {
            path,
            name,
            options,
        } = leaf;

        let route = defaults.route_for(options.req_type.as_deref());
        let full_path = format!("{prefix}/{path}");

        Self {
            api_name: name.unwrap_or_else(|| path.clone()),
            method: options.method.unwrap_or_else(|| DEFAULT_METHOD.to_string()),
            full_path,
            prefix,
            path,
            params: options.params.unwrap_or_default(),
            pre_hook: options.pre_hook,
            post_hook: options.post_hook,
            middleware: options.middleware.unwrap_or_default(),
            use_global_middleware: options.use_global_middleware.unwrap_or(true),
            host: options.host.unwrap_or_else(|| defaults.host.clone()),
            route,
            http_options: merge_options(&defaults.http_options, options.http_options),
            jsonp_options: merge_options(&defaults.jsonp_options, options.jsonp_options),
            extra: options.extra,
        }
    }

    /// A bare descriptor for unit tests: `prefix/path`, GET, http route.
    #[cfg(test)]
    pub(crate) fn for_test(prefix: &str, path: &str) -> Self {
        let leaf = EndpointConfig::new(path);
        let defaults = ClientDefaults {
            kind: Some(TransportKind::Http),
            ..ClientDefaults::default()
        };
        Self::finalize(leaf, prefix.to_string(), &defaults)
    }
}

impl std::fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("api_name", &self.api_name)
            .field("method", &self.method)
            .field("full_path", &self.full_path)
            .field("params", &self.params)
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .field("middleware", &self.middleware.len())
            .field("use_global_middleware", &self.use_global_middleware)
            .field("host", &self.host)
            .field("route", &self.route)
            .field("http_options", &self.http_options)
            .field("jsonp_options", &self.jsonp_options)
            .field("extra", &self.extra)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Flattens `root` into descriptors, in depth-first order (a group's own
/// leaves before its nested groups).
///
/// Descriptors are returned in definition order; callers that key them by
/// name get last-write-wins on collisions.
pub fn flatten(root: &ApiGroup, defaults: &ClientDefaults) -> Vec<RequestDescriptor> {
    let mut out = Vec::new();
    walk(root, &EndpointOptions::default(), "", defaults, &mut out);
    out
}

fn walk(
    group: &ApiGroup,
    inherited: &EndpointOptions,
    parent_prefix: &str,
    defaults: &ClientDefaults,
    out: &mut Vec<RequestDescriptor>,
) {
    let prefix = join_prefix(parent_prefix, group.options.prefix.as_deref());
    let options = group.options.clone().inherit(inherited);

    for leaf in &group.path_list {
        let mut leaf = leaf.clone();
        let leaf_prefix = leaf.options.prefix.take().unwrap_or_else(|| prefix.clone());
        leaf.options = leaf.options.inherit(&options);
        out.push(RequestDescriptor::finalize(leaf, leaf_prefix, defaults));
    }

    for child in &group.groups {
        walk(child, &options, &prefix, defaults, out);
    }
}

fn join_prefix(parent: &str, child: Option<&str>) -> String {
    match child {
        None => parent.to_string(),
        Some(child) if parent.is_empty() => child.to_string(),
        Some(child) => format!(
            "{}/{}",
            parent.trim_end_matches('/'),
            child.trim_start_matches('/')
        ),
    }
}

/// `base` overlaid key by key with `overrides`.
pub fn merge_options(base: &JsonMap, overrides: Option<JsonMap>) -> JsonMap {
    let mut merged = base.clone();
    if let Some(overrides) = overrides {
        merged.extend(overrides);
    }
    merged
}

fn merge_optional(base: Option<&JsonMap>, overrides: Option<JsonMap>) -> Option<JsonMap> {
    match (base, overrides) {
        (None, overrides) => overrides,
        (Some(base), overrides) => Some(merge_options(base, overrides)),
    }
}
