use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{error::ApiError, state::AppState};

/// Fixed-window request counter. The whole window resets at expiry; there is
/// no smoothing and no queueing, over-limit callers are rejected outright.
pub struct FixedWindow {
    max: u32,
    window: Duration,
    hits: Mutex<HashMap<String, (Instant, u32)>>,
}

impl FixedWindow {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a hit for `key` and reports whether it is still within the
    /// ceiling for the current window.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limit lock");

        // opportunistic cleanup so the map does not grow without bound
        if hits.len() > 10_000 {
            let window = self.window;
            hits.retain(|_, (start, _)| now.duration_since(*start) < window);
        }

        let entry = hits.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= self.max
    }
}

/// The three ceilings the API applies, all keyed by client address.
pub struct RateLimits {
    pub general: FixedWindow,
    pub auth: FixedWindow,
    pub upload: FixedWindow,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            general: FixedWindow::new(100, Duration::from_secs(15 * 60)),
            auth: FixedWindow::new(5, Duration::from_secs(15 * 60)),
            upload: FixedWindow::new(20, Duration::from_secs(60 * 60)),
        }
    }
}

/// First hop of x-forwarded-for when present, else the socket peer.
fn client_key(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|c| c.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".into())
}

fn reject(kind: &str, key: &str, message: &str) -> Response {
    warn!(client = %key, limiter = kind, "rate limit exceeded");
    ApiError::TooManyRequests(message.to_string()).into_response()
}

pub async fn general_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    if !state.limits.general.check(&key) {
        return reject("general", &key, "Too many requests, please try again later");
    }
    next.run(req).await
}

pub async fn auth_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    if !state.limits.auth.check(&key) {
        return reject(
            "auth",
            &key,
            "Too many authentication attempts, please try again later",
        );
    }
    next.run(req).await
}

pub async fn upload_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    if !state.limits.upload.check(&key) {
        return reject("upload", &key, "Too many uploads, please try again later");
    }
    next.run(req).await
}
