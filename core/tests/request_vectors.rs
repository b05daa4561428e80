//! Check request building and status classification against inline JSON vectors.
//!
//! Each case lists inputs and the expected outcome. Bodies are compared as
//! parsed JSON so field ordering does not matter.

use bytes::Bytes;
use httpctx::classify::{classify_status, status_error};
use httpctx::{build_request, Error, HttpMethod, HttpResponse, Params};
use serde_json::{json, Value};

const USER_AGENT: &str = "httpctx-rs:0.1";

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "HEAD" => HttpMethod::Head,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn params_from(value: &Value) -> Option<Params> {
    let object = value.as_object()?;
    let mut params = Params::new();
    for (key, values) in object {
        for v in values.as_array().unwrap() {
            params.add(key.clone(), v.as_str().unwrap());
        }
    }
    Some(params)
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

#[test]
fn build_request_vectors() {
    let vectors = json!([
        {
            "name": "plain get",
            "method": "GET",
            "target": "http://api.example.com/weather",
            "params": null,
            "payload": null,
            "expected_url": "http://api.example.com/weather",
            "expected_content_type": null,
            "expected_body": null
        },
        {
            "name": "params replace existing query",
            "method": "GET",
            "target": "http://api.example.com/weather?stale=1",
            "params": { "q": ["London,uk"], "units": ["metric"] },
            "payload": null,
            "expected_url": "http://api.example.com/weather?q=London%2Cuk&units=metric",
            "expected_content_type": null,
            "expected_body": null
        },
        {
            "name": "repeated param values keep insertion order",
            "method": "GET",
            "target": "http://api.example.com/search",
            "params": { "tag": ["b", "a"] },
            "payload": null,
            "expected_url": "http://api.example.com/search?tag=b&tag=a",
            "expected_content_type": null,
            "expected_body": null
        },
        {
            "name": "empty params clear the query",
            "method": "DELETE",
            "target": "http://api.example.com/items/7?force=true",
            "params": {},
            "payload": null,
            "expected_url": "http://api.example.com/items/7",
            "expected_content_type": null,
            "expected_body": null
        },
        {
            "name": "post with json payload",
            "method": "POST",
            "target": "http://api.example.com/items",
            "params": null,
            "payload": { "title": "Buy milk", "done": false },
            "expected_url": "http://api.example.com/items",
            "expected_content_type": "application/json",
            "expected_body": { "title": "Buy milk", "done": false }
        },
        {
            "name": "put with scalar payload",
            "method": "PUT",
            "target": "http://api.example.com/items/7/title",
            "params": null,
            "payload": "renamed",
            "expected_url": "http://api.example.com/items/7/title",
            "expected_content_type": "application/json",
            "expected_body": "renamed"
        }
    ]);

    for case in vectors.as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let params = params_from(&case["params"]);
        let payload = (!case["payload"].is_null()).then(|| case["payload"].clone());

        let req = build_request(
            USER_AGENT,
            parse_method(case["method"].as_str().unwrap()),
            case["target"].as_str().unwrap(),
            params.as_ref(),
            payload.as_ref(),
        )
        .unwrap();

        assert_eq!(req.method.as_str(), case["method"], "{name}: method");
        assert_eq!(req.url.as_str(), case["expected_url"], "{name}: url");
        assert_eq!(req.header("user-agent"), Some(USER_AGENT), "{name}: user agent");
        assert_eq!(req.header("accept"), Some("application/json"), "{name}: accept");
        assert_eq!(
            req.header("content-type"),
            case["expected_content_type"].as_str(),
            "{name}: content type"
        );

        match &req.body {
            None => assert!(case["expected_body"].is_null(), "{name}: body missing"),
            Some(body) => {
                let body: Value = serde_json::from_slice(body).unwrap();
                assert_eq!(body, case["expected_body"], "{name}: body");
            }
        }
    }
}

#[test]
fn build_request_rejects_bad_targets() {
    let vectors = json!([
        { "name": "empty", "target": "", "kind": "empty" },
        { "name": "relative path", "target": "/weather", "kind": "invalid" },
        { "name": "no scheme", "target": "api.example.com/weather", "kind": "invalid" }
    ]);

    for case in vectors.as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let err = build_request::<Value>(
            USER_AGENT,
            HttpMethod::Get,
            case["target"].as_str().unwrap(),
            None,
            None,
        )
        .unwrap_err();

        match case["kind"].as_str().unwrap() {
            "empty" => assert!(matches!(err, Error::EmptyTarget), "{name}: {err:?}"),
            "invalid" => assert!(matches!(err, Error::InvalidTarget(_)), "{name}: {err:?}"),
            other => panic!("unknown kind: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Classify
// ---------------------------------------------------------------------------

#[test]
fn status_classification_vectors() {
    let vectors = json!([
        { "status": 100, "success": false, "redirect": false },
        { "status": 199, "success": false, "redirect": false },
        { "status": 200, "success": true,  "redirect": false },
        { "status": 201, "success": true,  "redirect": false },
        { "status": 204, "success": true,  "redirect": false },
        { "status": 299, "success": true,  "redirect": false },
        { "status": 300, "success": false, "redirect": false },
        { "status": 301, "success": false, "redirect": false },
        { "status": 302, "success": false, "redirect": true  },
        { "status": 303, "success": false, "redirect": false },
        { "status": 307, "success": false, "redirect": false },
        { "status": 404, "success": false, "redirect": false },
        { "status": 500, "success": false, "redirect": false },
        { "status": 503, "success": false, "redirect": false }
    ]);

    for case in vectors.as_array().unwrap() {
        let status = case["status"].as_u64().unwrap() as u16;
        let classification = classify_status(status);
        assert_eq!(classification.is_success, case["success"], "{status}: success");
        assert_eq!(classification.is_redirect, case["redirect"], "{status}: redirect");
    }
}

#[tokio::test]
async fn status_error_vectors() {
    let vectors = json!([
        { "status": 400, "body": "{\"error\":\"bad city\"}", "message": "returned status code => 400" },
        { "status": 404, "body": "", "message": "returned status code => 404" },
        { "status": 502, "body": "Bad Gateway", "message": "returned status code => 502" }
    ]);

    for case in vectors.as_array().unwrap() {
        let status = case["status"].as_u64().unwrap() as u16;
        let body = case["body"].as_str().unwrap().to_string();
        let response = HttpResponse::new(status, Bytes::from(body.clone()));

        let err = status_error(response).await;
        assert_eq!(err.status(), Some(status));
        assert_eq!(err.to_string(), case["message"]);
        let Error::Status(status_err) = err else {
            unreachable!()
        };
        assert_eq!(status_err.body_text(), body);
    }
}
