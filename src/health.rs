//! Periodic HTTP health probe of the supervised target, grounded on the
//! `HttpClient` trait / `HttpHealthChecker` split in
//! `health/on_host/http.rs`: the transport is behind a trait so the poll
//! loop can be tested without a real socket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::context::Context;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    fn get_status(&self, url: &str) -> Result<u16, String>;
}

pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .expect("failed to build health probe http client");
        Self { client }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get_status(&self, url: &str) -> Result<u16, String> {
        self.client
            .get(url)
            .send()
            .map(|response| response.status().as_u16())
            .map_err(|err| err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSnapshot {
    pub last_check_ms: Option<i64>,
    pub ok: bool,
}

/// Shared, lock-protected view of the last probe result; `Supervisor`
/// reads this when assembling `StatusInfo`.
#[derive(Clone, Default)]
pub struct HealthState(Arc<Mutex<HealthSnapshot>>);

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        *self.0.lock().expect("health state mutex poisoned")
    }

    fn record(&self, now_ms: i64, ok: bool) {
        let mut snapshot = self.0.lock().expect("health state mutex poisoned");
        snapshot.last_check_ms = Some(now_ms);
        snapshot.ok = ok;
    }
}

/// Runs the probe loop until `ctx` is cancelled. One GET per
/// `interval`, never fatal on failure: network errors and non-200
/// responses are both recorded as unhealthy.
pub fn run(
    port: u16,
    interval: Duration,
    client: Arc<dyn HttpClient>,
    state: HealthState,
    ctx: Context<bool>,
    clock: impl Fn() -> i64,
) {
    let url = format!("http://localhost:{port}/status");
    loop {
        let ok = match client.get_status(&url) {
            Ok(status) => status == 200,
            Err(err) => {
                debug!(error = %err, %url, "health probe failed");
                false
            }
        };
        state.record(clock(), ok);

        let (lock, cvar) = ctx.get_lock_cvar();
        let guard = lock.lock().expect("health context mutex poisoned");
        if *guard {
            return;
        }
        let (guard, _) = cvar
            .wait_timeout(guard, interval)
            .expect("health context condvar poisoned");
        if *guard {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn records_ok_on_200() {
        let mut mock = MockHttpClient::new();
        mock.expect_get_status().returning(|_| Ok(200));
        let state = HealthState::new();
        state.record(1000, true);
        assert!(state.snapshot().ok);
        assert_eq!(state.snapshot().last_check_ms, Some(1000));
        let _ = mock;
    }

    #[test]
    fn non_200_is_not_ok() {
        let client: Arc<dyn HttpClient> = {
            let mut mock = MockHttpClient::new();
            mock.expect_get_status().returning(|_| Ok(503));
            Arc::new(mock)
        };
        let state = HealthState::new();
        let ok = client.get_status("http://localhost:3001/status").unwrap() == 200;
        state.record(5, ok);
        assert!(!state.snapshot().ok);
    }

    #[test]
    fn network_error_is_not_ok() {
        let client: Arc<dyn HttpClient> = {
            let mut mock = MockHttpClient::new();
            mock.expect_get_status()
                .returning(|_| Err("connection refused".to_string()));
            Arc::new(mock)
        };
        let result = client.get_status("http://localhost:3001/status");
        assert!(result.is_err());
    }

    #[test]
    fn stops_promptly_when_cancelled() {
        let ctx: Context<bool> = Context::new();
        let client: Arc<dyn HttpClient> = {
            let mut mock = MockHttpClient::new();
            mock.expect_get_status().returning(|_| Ok(200));
            Arc::new(mock)
        };
        let state = HealthState::new();
        let ctx_clone = ctx.clone();
        let state_clone = state.clone();
        let handle = std::thread::spawn(move || {
            run(3001, Duration::from_secs(60), client, state_clone, ctx_clone, || 0);
        });
        std::thread::sleep(Duration::from_millis(50));
        ctx.cancel_all(true).unwrap();
        handle.join().unwrap();
        assert!(state.snapshot().ok);
    }

    /// Exercises [`ReqwestHttpClient`] against a real HTTP server instead of
    /// the `HttpClient` mock, confirming the transport implementation itself
    /// (URL construction, status-code extraction) matches the wire format
    /// spec.md §4.3/§6 describes.
    #[test]
    fn reqwest_client_reports_real_response_status() {
        let server = httpmock::MockServer::start();
        let probe = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/status");
            then.status(200);
        });

        let client = ReqwestHttpClient::default();
        let status = client.get_status(&server.url("/status")).unwrap();

        probe.assert();
        assert_eq!(status, 200);
    }

    #[test]
    fn reqwest_client_reports_non_200_status() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/status");
            then.status(503);
        });

        let client = ReqwestHttpClient::default();
        let status = client.get_status(&server.url("/status")).unwrap();
        assert_eq!(status, 503);
    }

    #[test]
    #[traced_test]
    fn records_failure_reasons_at_debug_level() {
        let ctx: Context<bool> = Context::new();
        let client: Arc<dyn HttpClient> = {
            let mut mock = MockHttpClient::new();
            mock.expect_get_status()
                .returning(|_| Err("connection refused".to_string()));
            Arc::new(mock)
        };
        let state = HealthState::new();
        let ctx_clone = ctx.clone();
        let state_clone = state.clone();
        let handle = std::thread::spawn(move || {
            run(3001, Duration::from_millis(10), client, state_clone, ctx_clone, || 0);
        });
        std::thread::sleep(Duration::from_millis(50));
        ctx.cancel_all(true).unwrap();
        handle.join().unwrap();

        assert!(!state.snapshot().ok);
        assert!(logs_contain("health probe failed"));
    }
}
