use anyhow::Result;
use console::style;
use reqopt::{ConditionalRule, OptimizeRequest, PackageRegistry, PlatformFilter, RequirementOptimizer, Stability};
use serde::Serialize;
use serde_json::json;
use std::io::Read;
use tiny_http::{Header, Response, Server, StatusCode};

pub const OPTIMIZE_PATH: &str = "/v1/optimize-composer-requirements";
pub const PLATFORM_VERSION_HEADER: &str = "X-Platform-Version";

/// Everything a request needs besides its own payload
pub struct ApiContext<'a, R: PackageRegistry + ?Sized> {
    pub registry: &'a R,
    pub rules: Vec<ConditionalRule>,
    pub default_platform_version: Option<String>,
    pub minimum_stability: Stability,
}

/// Status code and JSON body of one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::message(500, &format!("Failed to encode response: {}", e)),
        }
    }

    fn message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "message": message }).to_string(),
        }
    }
}

/// Route and answer one request
pub fn handle<R: PackageRegistry + ?Sized>(
    ctx: &ApiContext<'_, R>,
    method: &str,
    url: &str,
    platform_version: Option<&str>,
    body: &str,
) -> ApiResponse {
    let path = url.split('?').next().unwrap_or(url);
    if path != OPTIMIZE_PATH {
        return ApiResponse::message(404, "Not Found");
    }
    if !method.eq_ignore_ascii_case("POST") {
        return ApiResponse::message(405, "Method Not Allowed");
    }

    let platform_version = platform_version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(ctx.default_platform_version.as_deref());
    let Some(platform_version) = platform_version else {
        return ApiResponse::message(400, &format!("Missing {} header", PLATFORM_VERSION_HEADER));
    };

    let request = match OptimizeRequest::from_json(body) {
        Ok(request) => request,
        Err(e) => return ApiResponse::message(400, &e.to_string()),
    };

    let filter = PlatformFilter::with_rules(platform_version, &ctx.rules);
    let optimizer = RequirementOptimizer::new(ctx.registry, filter).with_minimum_stability(ctx.minimum_stability);

    match optimizer.optimize(&request) {
        Ok(optimized) => ApiResponse::json(200, &optimized),
        Err(e) if e.is_client_error() => ApiResponse::message(400, &e.to_string()),
        Err(e) => {
            log::error!("Optimization failed: {}", e);
            ApiResponse::message(500, &e.to_string())
        }
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Serve the API until the process is stopped. Requests are handled one at a time.
pub fn run<R: PackageRegistry + ?Sized>(host: &str, port: u16, ctx: &ApiContext<'_, R>) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let server = Server::http(&addr).map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    println!(
        "{} Listening on http://{}{}",
        style("Info:").cyan(),
        addr,
        OPTIMIZE_PATH
    );
    log::info!("Server started on {}", addr);

    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();
        let platform_version = request
            .headers()
            .iter()
            .find(|h| h.field.equiv(PLATFORM_VERSION_HEADER))
            .map(|h| h.value.as_str().to_string());

        let mut body = String::new();
        let response = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => handle(ctx, &method, &url, platform_version.as_deref(), &body),
            Err(e) => ApiResponse::message(400, &format!("Unreadable request body: {}", e)),
        };

        log::info!("{} {} - {}", method, url, response.status);

        let mut http_response = Response::from_string(response.body).with_status_code(StatusCode(response.status));
        if let Some(content_type) = header("Content-Type", "application/json") {
            http_response = http_response.with_header(content_type);
        }
        if response.status == 405 {
            if let Some(allow) = header("Allow", "POST") {
                http_response = http_response.with_header(allow);
            }
        }

        if let Err(e) = request.respond(http_response) {
            log::warn!("Failed to send response for {} {}: {}", method, url, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqopt::{Link, MemoryRegistry, OptimizeError, WritableRegistry};
    use serde_json::Value;
    use std::collections::BTreeSet;

    fn registry() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.publish("x/a", "1.3.2", &[Link::new("x/b", "^2.0")]).unwrap();
        registry.publish("x/b", "2.1.0", &[Link::new("composer/ca-bundle", "^1.0")]).unwrap();
        registry.publish("x/c", "3.0.0", &[]).unwrap();
        registry.publish("composer/ca-bundle", "1.3.0", &[]).unwrap();
        registry
    }

    fn context(registry: &MemoryRegistry) -> ApiContext<'_, MemoryRegistry> {
        ApiContext {
            registry,
            rules: vec![ConditionalRule::new("composer/ca-bundle", "3.0.22").unwrap()],
            default_platform_version: None,
            minimum_stability: Stability::Dev,
        }
    }

    fn post(ctx: &ApiContext<'_, MemoryRegistry>, platform: Option<&str>, body: &str) -> ApiResponse {
        handle(ctx, "POST", OPTIMIZE_PATH, platform, body)
    }

    fn message(response: &ApiResponse) -> String {
        let value: Value = serde_json::from_str(&response.body).unwrap();
        value["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_optimize_success_preserves_order() {
        let registry = registry();
        let ctx = context(&registry);

        let response = post(
            &ctx,
            Some("3.0.25"),
            r#"{"install": {"x/c": "*", "x/a": "^1.0"}, "installed": {"x/z": "1.0.0", "x/b": "2.1.0", "composer/ca-bundle": "1.3.0"}}"#,
        );

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"x/c":"3.0.0","x/a":"1.3.2","x/z":"1.0.0"}"#);
    }

    #[test]
    fn test_old_platform_never_lists_ca_bundle() {
        let registry = registry();
        let ctx = context(&registry);

        let response = post(
            &ctx,
            Some("3.0.21"),
            r#"{"install": {"x/c": "*"}, "installed": {"composer/ca-bundle": "1.3.0"}}"#,
        );

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"x/c":"3.0.0"}"#);
    }

    #[test]
    fn test_unknown_package_is_client_error() {
        let registry = registry();
        let ctx = context(&registry);

        let response = post(&ctx, Some("3.0.25"), r#"{"install": {"x/a": "^1.0", "x/bad": "^9.9"}}"#);

        assert_eq!(response.status, 400);
        assert_eq!(message(&response), "Unknown package/constraint: x/bad@^9.9");
    }

    #[test]
    fn test_malformed_payload() {
        let registry = registry();
        let ctx = context(&registry);

        for body in ["", "not json", r#"{"installed": {}}"#, r#"{"install": {"x/a": ["^1.0"]}}"#] {
            let response = post(&ctx, Some("3.0.25"), body);
            assert_eq!(response.status, 400, "{}", body);
            assert!(message(&response).starts_with("Invalid payload"), "{}", body);
        }
    }

    #[test]
    fn test_empty_php_arrays_are_empty_maps() {
        let registry = registry();
        let ctx = context(&registry);

        let response = post(&ctx, Some("3.0.25"), r#"{"install": {"x/c": "*"}, "installed": []}"#);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"x/c":"3.0.0"}"#);

        let response = post(&ctx, Some("3.0.25"), r#"{"install": [], "installed": {"x/z": "1.0.0"}}"#);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"x/z":"1.0.0"}"#);

        let response = post(&ctx, Some("3.0.25"), r#"{"install": []}"#);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{}");
    }

    #[test]
    fn test_platform_version_header() {
        let registry = registry();
        let mut ctx = context(&registry);
        let body = r#"{"install": {"x/c": "*"}}"#;

        let response = post(&ctx, None, body);
        assert_eq!(response.status, 400);
        assert_eq!(message(&response), "Missing X-Platform-Version header");

        assert_eq!(post(&ctx, Some("  "), body).status, 400);

        ctx.default_platform_version = Some("3.0.25".to_string());
        assert_eq!(post(&ctx, None, body).status, 200);
    }

    #[test]
    fn test_routing() {
        let registry = registry();
        let ctx = context(&registry);
        let body = r#"{"install": {"x/c": "*"}}"#;

        assert_eq!(handle(&ctx, "POST", "/v1/other", Some("3.0.25"), body).status, 404);
        assert_eq!(handle(&ctx, "GET", OPTIMIZE_PATH, Some("3.0.25"), body).status, 405);

        let with_query = format!("{}?debug=1", OPTIMIZE_PATH);
        assert_eq!(handle(&ctx, "POST", &with_query, Some("3.0.25"), body).status, 200);
    }

    struct BrokenRegistry;

    impl PackageRegistry for BrokenRegistry {
        fn latest_release(&self, _: &str, _: Stability, _: &str) -> reqopt::Result<Option<reqopt::Release>> {
            Err(OptimizeError::Registry("store offline".to_string()))
        }

        fn dependency_names(&self, _: &[reqopt::ReleaseId]) -> reqopt::Result<BTreeSet<String>> {
            Err(OptimizeError::Registry("store offline".to_string()))
        }

        fn package_dependency_names(&self, _: &[reqopt::PackageId]) -> reqopt::Result<BTreeSet<String>> {
            Err(OptimizeError::Registry("store offline".to_string()))
        }

        fn package_ids(&self, _: &[String]) -> reqopt::Result<Vec<reqopt::PackageId>> {
            Err(OptimizeError::Registry("store offline".to_string()))
        }
    }

    #[test]
    fn test_registry_failure_is_internal_error() {
        let ctx = ApiContext {
            registry: &BrokenRegistry,
            rules: Vec::new(),
            default_platform_version: None,
            minimum_stability: Stability::Dev,
        };

        let response = handle(&ctx, "POST", OPTIMIZE_PATH, Some("3.0.25"), r#"{"install": {"x/a": "*"}}"#);
        assert_eq!(response.status, 500);
        assert_eq!(message(&response), "Registry error: store offline");
    }
}
