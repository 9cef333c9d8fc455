//! Stub HTTP destination recording every `/write` request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;

type Recorded = Arc<Mutex<Vec<(HashMap<String, String>, Bytes)>>>;

pub struct StubDestination {
    url: String,
    requests: Recorded,
}

impl StubDestination {
    /// Bind to an ephemeral port and answer every write with `status`
    pub async fn spawn(status: StatusCode) -> Self {
        let requests: Recorded = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/write", post(record_write))
            .with_state((Arc::clone(&requests), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn requests(&self) -> Vec<(HashMap<String, String>, Bytes)> {
        self.requests.lock().clone()
    }

    /// Wait until at least `count` requests arrived
    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.requests.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} did not receive {count} requests", self.url));
    }
}

async fn record_write(
    State((requests, status)): State<(Recorded, StatusCode)>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    requests.lock().push((params, body));
    (status, "")
}
