// crates.io
use serde_json::json;
use time::macros;
// self
use paylocity_broker::{
	_preludet::*,
	clock::ManualClock,
	error::{ApiError, TransportError},
	executor::{ApiRequest, AuthorizedRequestExecutor},
	retry::RetryPolicy,
	store::MemoryStore,
};

const NOW: OffsetDateTime = macros::datetime!(2025-10-01 14:00 UTC);

fn executor(
	http: ScriptedHttpClient,
) -> (AuthorizedRequestExecutor<ScriptedHttpClient, ScriptedErrorMapper>, Arc<RecordingSleeper>) {
	let (manager, sleeper) =
		build_scripted_manager(Arc::new(MemoryStore::default()), http, ManualClock::new(NOW));

	(AuthorizedRequestExecutor::new(Arc::new(manager)), sleeper)
}

#[tokio::test]
async fn success_returns_parsed_body_after_one_attempt() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer-1", 3_600)])
		.with_api([Scripted::json(200, "{\"employees\":[{\"id\":\"7\"}]}")]);
	let (executor, sleeper) = executor(http.clone());
	let body = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees").with_query("pagesize", 100))
		.await
		.expect("Call should succeed.");

	assert_eq!(body, json!({ "employees": [{ "id": "7" }] }));
	assert_eq!(http.api_calls(), 1);
	assert!(sleeper.delays().is_empty());

	let call = http.requests().pop().expect("API call should be recorded.");

	assert_eq!(call.method, "GET");
	assert_eq!(call.url, "https://api.example.test/api/v2/companies/1/employees?pagesize=100");
	assert_eq!(call.authorization.as_deref(), Some("Bearer bearer-1"));
	assert_eq!(call.timeout, std::time::Duration::from_secs(30));
	assert!(call.headers.iter().any(|(k, v)| k == "content-type" && v == "application/json"));
}

#[tokio::test]
async fn unauthorized_invalidates_once_then_heals() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("stale", 3_600), Scripted::token("fresh", 3_600)])
		.with_api([Scripted::json(401, "{\"error\":\"expired\"}"), Scripted::json(200, "{\"ok\":1}")]);
	let (executor, sleeper) = executor(http.clone());
	let body = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees/7"))
		.await
		.expect("A single 401 must heal.");

	assert_eq!(body, json!({ "ok": 1 }));
	assert_eq!(executor.manager().metrics.invalidations(), 1);
	assert_eq!(http.identity_calls(), 2);
	assert_eq!(sleeper.delays(), [Duration::seconds(1)]);

	let bearers = http
		.requests()
		.into_iter()
		.filter(|r| !r.url.ends_with("/connect/token"))
		.filter_map(|r| r.authorization)
		.collect::<Vec<_>>();

	assert_eq!(bearers, ["Bearer stale", "Bearer fresh"]);
}

#[tokio::test]
async fn client_errors_are_terminal_without_backoff() {
	for status in [400, 403, 404, 422] {
		let http = ScriptedHttpClient::default()
			.with_identity([Scripted::token("bearer", 3_600)])
			.with_api([Scripted::json(status, "{\"error\":\"nope\"}")]);
		let (executor, sleeper) = executor(http.clone());
		let err = executor
			.execute(&ApiRequest::get("/api/v2/companies/1/employees/missing"))
			.await
			.expect_err("Client errors must fail.");

		assert!(matches!(
			err,
			Error::Api(ApiError::Client { status: s, ref body }) if s == status && body.contains("nope")
		));
		assert_eq!(http.api_calls(), 1);
		assert!(sleeper.delays().is_empty());
		assert_eq!(executor.manager().metrics.invalidations(), 0);
	}
}

#[tokio::test]
async fn timeouts_exhaust_with_doubling_delays() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api((0..4).map(|_| Scripted::timeout()));
	let (executor, sleeper) = executor(http.clone());
	let err = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/openapi"))
		.await
		.expect_err("Persistent timeouts must fail.");

	assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));
	assert_eq!(http.api_calls(), 4);
	assert_eq!(http.identity_calls(), 1);
	assert_eq!(sleeper.delays(), [Duration::seconds(1), Duration::seconds(2), Duration::seconds(4)]);
}

#[tokio::test]
async fn server_errors_retry_and_the_last_failure_wins() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api([
			Scripted::json(503, "busy"),
			Scripted::Fail(ScriptedFailure::Refused),
			Scripted::json(500, "boom"),
			Scripted::json(502, "gateway"),
		]);
	let (executor, _) = executor(http.clone());
	let err = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees"))
		.await
		.expect_err("Four failures must exhaust the policy.");

	assert!(matches!(err, Error::Api(ApiError::Server { status: 502, .. })));
	assert_eq!(http.api_calls(), 4);
}

#[tokio::test]
async fn server_error_then_success_recovers() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api([Scripted::json(500, "oops"), Scripted::json(200, "[1,2,3]")]);
	let (executor, sleeper) = executor(http.clone());
	let body = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/codes/costcenter1"))
		.await
		.expect("Second attempt should succeed.");

	assert_eq!(body, json!([1, 2, 3]));
	assert_eq!(sleeper.delays(), [Duration::seconds(1)]);
	assert_eq!(executor.manager().metrics.invalidations(), 0);
}

#[tokio::test]
async fn sustained_unauthorized_surfaces_after_exhaustion() {
	let http = ScriptedHttpClient::default()
		.with_identity((0..4).map(|i| Scripted::token(&format!("token-{i}"), 3_600)))
		.with_api((0..4).map(|_| Scripted::json(401, "denied")));
	let (executor, _) = executor(http.clone());
	let err = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees"))
		.await
		.expect_err("Sustained 401s must fail.");

	assert!(matches!(err, Error::Api(ApiError::Unauthorized { .. })));
	assert_eq!(http.api_calls(), 4);
	assert_eq!(http.identity_calls(), 4);
	assert_eq!(executor.manager().metrics.invalidations(), 4);
}

#[tokio::test]
async fn token_failure_inside_an_attempt_is_terminal() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::json(401, "{\"error\":\"invalid_client\"}")]);
	let (executor, _) = executor(http.clone());
	let err = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees"))
		.await
		.expect_err("No token means no call.");

	assert!(matches!(err, Error::IdentityAuth { status: 401, .. }));
	assert_eq!(http.api_calls(), 0);
}

#[tokio::test]
async fn rate_limits_are_terminal_by_default() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api([Scripted::json(429, "slow down")]);
	let (executor, sleeper) = executor(http.clone());
	let err = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees"))
		.await
		.expect_err("429 is terminal by default.");

	assert!(matches!(err, Error::Api(ApiError::RateLimited { .. })));
	assert_eq!(http.api_calls(), 1);
	assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn rate_limits_retry_when_enabled() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api([Scripted::json(429, "slow down"), Scripted::json(200, "{}")]);
	let (executor, sleeper) = executor(http.clone());
	let executor = executor.with_policy(RetryPolicy::default().with_retry_rate_limited(true));

	executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees"))
		.await
		.expect("Opted-in 429 should be retried.");

	assert_eq!(http.api_calls(), 2);
	assert_eq!(sleeper.delays(), [Duration::seconds(1)]);
}

#[tokio::test]
async fn request_parts_reach_the_transport() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api([Scripted::json(204, "")]);
	let (executor, _) = executor(http.clone());
	let request = ApiRequest::post("/api/v2/companies/1/employees")
		.with_json(json!({ "firstName": "Ada" }))
		.with_header("X-Correlation-Id", "abc-123")
		.with_header("Authorization", "Bearer forged");
	let body = executor.execute(&request).await.expect("Empty 2xx should succeed.");

	assert_eq!(body, serde_json::Value::Null);

	let call = http.requests().pop().expect("API call should be recorded.");

	assert_eq!(call.method, "POST");
	assert_eq!(call.body, br#"{"firstName":"Ada"}"#);
	assert_eq!(call.authorization.as_deref(), Some("Bearer bearer"));
	assert!(call.headers.iter().any(|(k, v)| k == "x-correlation-id" && v == "abc-123"));
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
	let http = ScriptedHttpClient::default()
		.with_identity([Scripted::token("bearer", 3_600)])
		.with_api([Scripted::json(200, "<html>maintenance</html>")]);
	let (executor, _) = executor(http.clone());
	let err = executor
		.execute(&ApiRequest::get("/api/v2/companies/1/employees"))
		.await
		.expect_err("Non-JSON success must fail.");

	assert!(matches!(err, Error::Decode { ref body, .. } if body.contains("maintenance")));
	assert_eq!(http.api_calls(), 1);
}
