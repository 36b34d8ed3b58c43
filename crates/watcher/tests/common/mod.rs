#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use verifyflow_api::config::ServerConfig;
use verifyflow_api::router::build_app_router;
use verifyflow_api::services::RelayServices;
use verifyflow_api::state::AppState;
use verifyflow_core::JobId;
use verifyflow_watcher::ConnectionHost;

pub const JOB: &str = "6dd2a1b4-54f8-4c9d-a53b-2c7e1f3b9e10";

/// A relay server running on an ephemeral port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub state: AppState,
    _services: RelayServices,
}

impl TestRelay {
    pub async fn spawn() -> Self {
        let state = AppState::new(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".to_string()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 5,
            max_webhook_bytes: 4096,
            relay_capacity: 16,
        });
        let services = RelayServices::start(&state);
        let app = build_app_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            _services: services,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Deliver a callback the way the aggregator would.
    pub async fn post(&self, body: serde_json::Value) {
        let status = reqwest::Client::new()
            .post(format!("{}/api/webhook", self.base_url()))
            .json(&body)
            .send()
            .await
            .expect("receiver should respond")
            .status();
        assert_eq!(status, 200);
    }

    pub async fn sessions(&self) -> usize {
        self.state.ws_manager.connection_count().await
    }

    pub async fn wait_for_sessions(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.sessions().await != expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {expected} push sessions, have {}",
                self.sessions().await
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Host that records every notification.
#[derive(Default)]
pub struct RecordingHost {
    pub completed: Mutex<Vec<JobId>>,
    pub missing_warnings: AtomicUsize,
}

impl RecordingHost {
    pub fn completions(&self) -> Vec<JobId> {
        self.completed.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> usize {
        self.missing_warnings.load(Ordering::SeqCst)
    }
}

impl ConnectionHost for RecordingHost {
    fn set_job_id(&self, job_id: &JobId) {
        self.completed.lock().unwrap().push(job_id.clone());
    }

    fn on_missing_job_id(&self) {
        self.missing_warnings.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should hold within 5s");
}
