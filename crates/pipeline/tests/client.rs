//! End-to-end call scenarios against in-memory transports.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline::{
    from_fn, post_hook_fn, pre_hook_fn, ApiError, ApiGroup, CallOptions, Client, ClientConfig,
    EndpointConfig, HookOutput, HttpMethod, HttpRequestConfig, HttpResponse, HttpTransport,
    JsonpRequest, JsonpResponse, JsonpTransport, MiddlewareRef, Params, PlatformRequest,
    PlatformTransport, TransportError,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Platform transport that validates the verb and echoes a canned reply.
struct FakePlatform {
    reply: Result<Value, TransportError>,
    seen: Arc<Mutex<Vec<PlatformRequest>>>,
}

impl FakePlatform {
    fn replying(reply: Result<Value, TransportError>) -> (Self, Arc<Mutex<Vec<PlatformRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                reply,
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

#[async_trait]
impl PlatformTransport for FakePlatform {
    async fn request(&self, request: PlatformRequest) -> Result<Value, TransportError> {
        HttpMethod::parse(&request.method)?;
        self.seen.lock().unwrap().push(request);
        self.reply.clone()
    }
}

struct EchoHttp;

#[async_trait]
impl HttpTransport for EchoHttp {
    async fn send(&self, request: HttpRequestConfig) -> Result<HttpResponse, TransportError> {
        HttpMethod::parse(&request.method)?;
        Ok(HttpResponse {
            status: 200,
            data: json!({ "url": request.url, "data": request.data }),
        })
    }
}

struct ArrayJsonp;

#[async_trait]
impl JsonpTransport for ArrayJsonp {
    async fn fetch(&self, _request: JsonpRequest) -> Result<JsonpResponse, TransportError> {
        Ok(JsonpResponse::new(json!([0, "array data"])))
    }
}

fn platform_client(reply: Result<Value, TransportError>) -> Client {
    let (platform, _) = FakePlatform::replying(reply);
    Client::builder(ClientConfig::default())
        .platform(platform)
        .build()
        .unwrap()
}

/// Global middleware that asserts timing is visible on unwind.
fn timing_check(hits: Arc<Mutex<u32>>) -> MiddlewareRef {
    from_fn(move |ctx, next| {
        let hits = Arc::clone(&hits);
        Box::pin(async move {
            next.run(ctx).await?;
            assert!(ctx.start_time.is_some());
            assert!(ctx.end_time.is_some());
            assert!(ctx.req_time.is_some());
            *hits.lock().unwrap() += 1;
            Ok::<(), ApiError>(())
        })
    })
}

// ---------------------------------------------------------------------------
// Resolution and rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn object_data_resolves_unchanged() {
    let data = json!({ "code": 0, "data": "object data" });
    let client = platform_client(Ok(data.clone()));
    let apis = client.get_api(&ApiGroup::new("fake-wx").endpoint(EndpointConfig::new("object-data")));

    assert_eq!(apis["object-data"].call(Value::Null).await.unwrap(), data);
}

#[tokio::test]
async fn transport_failure_rejects_with_the_same_error() {
    let client = platform_client(Err(TransportError::failed("test")));
    let apis = client.get_api(&ApiGroup::new("fake-wx").endpoint(EndpointConfig::new("fail")));

    let err = apis["fail"].call(json!({})).await.unwrap_err();

    assert!(matches!(
        err,
        ApiError::Transport(TransportError::Failed(ref msg)) if msg == "test"
    ));
}

#[tokio::test]
async fn unwind_runs_on_failure_with_and_without_global_middleware() {
    let global_hits = Arc::new(Mutex::new(0));
    let local_hits = Arc::new(Mutex::new(0));
    let client = platform_client(Err(TransportError::failed("test")));
    client.use_middleware(timing_check(Arc::clone(&global_hits)));
    let apis = client.get_api(
        &ApiGroup::new("fake-wx")
            .endpoint(EndpointConfig::new("with-global"))
            .endpoint(
                EndpointConfig::new("no-global")
                    .use_global_middleware(false)
                    .middleware(timing_check(Arc::clone(&local_hits))),
            ),
    );

    assert!(apis["with-global"].call(Value::Null).await.is_err());
    assert_eq!(*global_hits.lock().unwrap(), 1);

    assert!(apis["no-global"].call(Value::Null).await.is_err());
    assert_eq!(*local_hits.lock().unwrap(), 1);
    assert_eq!(*global_hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn invalid_endpoint_req_type_rejects() {
    let client = platform_client(Ok(json!({})));
    let apis = client.get_api(
        &ApiGroup::new("fake-wx").endpoint(EndpointConfig::new("bad").req_type("foo")),
    );

    let err = apis["bad"].call(Value::Null).await.unwrap_err();

    assert_eq!(err.to_string(), "invalid reqType");
}

#[tokio::test]
async fn unknown_method_rejects() {
    let client = platform_client(Ok(json!({})));
    let apis = client.get_api(
        &ApiGroup::new("fake-wx").endpoint(EndpointConfig::new("odd").method("foo")),
    );

    let err = apis["odd"].call(Value::Null).await.unwrap_err();

    assert_eq!(err.to_string(), "Unknown Method: FOO!!!");
}

#[tokio::test]
async fn jsonp_array_data_is_normalized() {
    let client = Client::builder(ClientConfig {
        req_type: Some("jsonp".to_string()),
        ..ClientConfig::default()
    })
    .jsonp(ArrayJsonp)
    .build()
    .unwrap();
    let apis = client.get_api(&ApiGroup::new("fake-get").endpoint(EndpointConfig::new("array-data")));

    let data = apis["array-data"]
        .call_with(Value::Null, CallOptions::callback_name("cb"))
        .await
        .unwrap();

    assert_eq!(data, json!({ "code": 0, "data": "array data" }));
}

#[test]
fn invalid_client_req_type_fails_synchronously() {
    let err = Client::new(ClientConfig {
        req_type: Some("foo".to_string()),
        ..ClientConfig::default()
    })
    .unwrap_err();

    assert_eq!(err.to_string(), "invalid reqType");
}

#[tokio::test]
async fn non_object_args_are_rejected() {
    let client = platform_client(Ok(json!({})));
    let apis = client.get_api(&ApiGroup::new("p").endpoint(EndpointConfig::new("x")));

    let err = apis["x"].call(json!([1, 2])).await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidArgs { ref api } if api == "x"));
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[test]
fn keys_and_params_are_exposed_for_prefetch() {
    let client = Client::new(ClientConfig::default()).unwrap();
    let group = ApiGroup::new("fake-get")
        .params(Params::List(vec!["a".into()]))
        .endpoint(EndpointConfig::new("object-params"))
        .endpoint(
            EndpointConfig::new("custom")
                .prefix("other")
                .params(Params::List(vec!["b".into()])),
        );

    let apis = client.get_api(&group);
    let again = client.get_api(&group);

    assert_eq!(apis["object-params"].key(), "fake-get/object-params");
    assert_eq!(apis["object-params"].params(), &Params::List(vec!["a".into()]));
    assert_eq!(apis["custom"].key(), "other/custom");
    assert_eq!(apis["custom"].params(), &Params::List(vec!["b".into()]));
    assert_eq!(
        apis.names().collect::<Vec<_>>(),
        again.names().collect::<Vec<_>>()
    );
    assert_eq!(again["custom"].key(), "other/custom");
}

#[test]
fn group_tree_deserializes_from_json() {
    let group: ApiGroup = serde_json::from_value(json!({
        "prefix": "users",
        "reqType": "axios",
        "pathList": [
            { "path": "list", "params": { "page": 1 } },
            { "path": "create", "type": "post", "name": "createUser" }
        ],
        "groups": [{ "prefix": "admin", "pathList": [{ "path": "ban" }] }]
    }))
    .unwrap();
    let client = Client::new(ClientConfig::default()).unwrap();

    let apis = client.get_api(&group);

    assert_eq!(apis.len(), 3);
    assert_eq!(apis["createUser"].descriptor().method, "post");
    assert_eq!(apis["ban"].key(), "users/admin/ban");
}

// ---------------------------------------------------------------------------
// Hooks and middleware
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pre_hook_params_shape_the_request() {
    let client = Client::builder(ClientConfig {
        host: "https://api.test/".to_string(),
        ..ClientConfig::default()
    })
    .http(EchoHttp)
    .build()
    .unwrap();
    let apis = client.get_api(
        &ApiGroup::new("search").endpoint(
            EndpointConfig::new("q")
                .params(Params::Map(serde_json::Map::from_iter([(
                    "page".to_string(),
                    json!(1),
                )])))
                .pre_hook(pre_hook_fn(|| async {
                    Ok::<_, ApiError>(HookOutput {
                        params: Some(Params::List(vec!["lang".into()])),
                        header: None,
                    })
                })),
        ),
    );

    let data = apis["q"].call(json!({ "term": "rust" })).await.unwrap();

    assert_eq!(
        data["url"],
        json!("https://api.test/search/q?lang=&page=1&term=rust")
    );
}

#[tokio::test]
async fn post_hook_sees_data_but_does_not_replace_it() {
    let data = json!({ "code": 0, "data": "object data" });
    let seen = Arc::new(Mutex::new(Value::Null));
    let client = platform_client(Ok(data.clone()));
    let recorded = Arc::clone(&seen);
    let apis = client.get_api(&ApiGroup::new("fake-wx").endpoint(
        EndpointConfig::new("after").post_hook(post_hook_fn(move |data, ctx| {
            *recorded.lock().unwrap() = json!({ "api": ctx.api_name(), "data": data });
            Ok(json!("ignored"))
        })),
    ));

    let resolved = apis["after"].call(Value::Null).await.unwrap();

    assert_eq!(resolved, data);
    assert_eq!(*seen.lock().unwrap(), json!({ "api": "after", "data": data }));
}

#[tokio::test]
async fn failing_pre_hook_rejects_before_transport() {
    let (platform, seen) = FakePlatform::replying(Ok(json!({})));
    let client = Client::builder(ClientConfig::default())
        .platform(platform)
        .build()
        .unwrap();
    let apis = client.get_api(&ApiGroup::new("fake-wx").endpoint(
        EndpointConfig::new("no-before").pre_hook(pre_hook_fn(|| async {
            Err::<HookOutput, _>(ApiError::custom("no data"))
        })),
    ));

    let err = apis["no-before"].call(Value::Null).await.unwrap_err();

    assert_eq!(err.to_string(), "no data");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_post_hook_rejects_the_call() {
    let client = platform_client(Ok(json!({ "code": 0 })));
    let apis = client.get_api(&ApiGroup::new("fake-wx").endpoint(
        EndpointConfig::new("bad-after")
            .post_hook(post_hook_fn(|_data, _ctx| Err(ApiError::custom("rejected after")))),
    ));

    let err = apis["bad-after"].call(Value::Null).await.unwrap_err();

    assert_eq!(err.to_string(), "rejected after");
}

#[tokio::test]
async fn middleware_registered_later_applies_to_existing_functions() {
    let hits = Arc::new(Mutex::new(0));
    let client = platform_client(Ok(json!({ "code": 0 })));
    let apis = client.get_api(&ApiGroup::new("p").endpoint(EndpointConfig::new("x")));

    apis["x"].call(Value::Null).await.unwrap();
    client
        .use_middleware(timing_check(Arc::clone(&hits)))
        .use_middleware(timing_check(Arc::clone(&hits)));
    apis["x"].call(Value::Null).await.unwrap();

    assert_eq!(*hits.lock().unwrap(), 2);
}

#[tokio::test]
async fn short_circuiting_middleware_skips_transport() {
    let (platform, seen) = FakePlatform::replying(Ok(json!({ "from": "transport" })));
    let client = Client::builder(ClientConfig::default())
        .platform(platform)
        .build()
        .unwrap();
    client.use_middleware(from_fn(|ctx, _next| {
        Box::pin(async move {
            ctx.response = Some(pipeline::Response::ok(json!({ "from": "cache" })));
            Ok::<(), ApiError>(())
        })
    }));
    let apis = client.get_api(&ApiGroup::new("p").endpoint(EndpointConfig::new("x")));

    let data = apis["x"].call(Value::Null).await.unwrap();

    assert_eq!(data, json!({ "from": "cache" }));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn passthrough_fields_reach_the_platform() {
    let (platform, seen) = FakePlatform::replying(Ok(json!({})));
    let client = Client::builder(ClientConfig::default())
        .platform(platform)
        .build()
        .unwrap();
    let apis = client.get_api(
        &ApiGroup::new("p")
            .extra("isShowLoading", json!(false))
            .endpoint(EndpointConfig::new("x").method("post")),
    );

    apis["x"].call(json!({ "a": 1 })).await.unwrap();

    let sent = seen.lock().unwrap()[0].clone();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.url, "p/x");
    assert_eq!(sent.passthrough.get("isShowLoading"), Some(&json!(false)));
    assert_eq!(sent.data.get("a"), Some(&json!(1)));
}
