use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc, Mutex, OnceLock,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EndpointMetricKey {
    endpoint: String,
    method: String,
}

/// Lifecycle events of a real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelEvent {
    HandshakeRejected,
    HandshakeExhausted,
    Authenticated,
    CommandDispatched,
    MalformedCommand,
    SlowConsumerEvicted,
    IdleTimeout,
}

impl ChannelEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HandshakeRejected => "handshake_rejected",
            Self::HandshakeExhausted => "handshake_exhausted",
            Self::Authenticated => "authenticated",
            Self::CommandDispatched => "command_dispatched",
            Self::MalformedCommand => "malformed_command",
            Self::SlowConsumerEvicted => "slow_consumer_evicted",
            Self::IdleTimeout => "idle_timeout",
        }
    }
}

#[derive(Default)]
pub struct ServerMetrics {
    request_rate_total: Mutex<HashMap<EndpointMetricKey, u64>>,
    request_errors_total: Mutex<HashMap<EndpointMetricKey, u64>>,
    request_duration_sum_ms: Mutex<HashMap<EndpointMetricKey, u64>>,
    channel_events_total: Mutex<HashMap<ChannelEvent, u64>>,
    game_sessions_total: AtomicU64,
    active_connections: AtomicI64,
}

static GLOBAL_METRICS: OnceLock<Arc<ServerMetrics>> = OnceLock::new();

pub fn set_global_metrics(metrics: Arc<ServerMetrics>) {
    let _ = GLOBAL_METRICS.set(metrics);
}

fn global_metrics() -> Option<&'static Arc<ServerMetrics>> {
    GLOBAL_METRICS.get()
}

pub fn record_http_request(method: &str, path: &str, status_code: u16, latency_ms: u64) {
    if let Some(metrics) = global_metrics() {
        metrics.record_http_request(method, path, status_code, latency_ms);
    }
}

pub fn record_channel_event(event: ChannelEvent) {
    if let Some(metrics) = global_metrics() {
        metrics.record_channel_event(event);
    }
}

pub fn increment_game_sessions() {
    if let Some(metrics) = global_metrics() {
        metrics.game_sessions_total.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn adjust_active_connections(delta: i64) {
    if let Some(metrics) = global_metrics() {
        metrics.active_connections.fetch_add(delta, Ordering::SeqCst);
    }
}

pub fn render_global() -> String {
    global_metrics().map(|metrics| metrics.render_prometheus()).unwrap_or_default()
}

impl ServerMetrics {
    pub fn record_http_request(&self, method: &str, path: &str, status_code: u16, latency_ms: u64) {
        let key = EndpointMetricKey {
            endpoint: normalize_endpoint(path),
            method: method.to_ascii_uppercase(),
        };

        increment_counter(&self.request_rate_total, &key, 1);
        increment_counter(&self.request_duration_sum_ms, &key, latency_ms);
        if status_code >= 400 {
            increment_counter(&self.request_errors_total, &key, 1);
        }
    }

    pub fn record_channel_event(&self, event: ChannelEvent) {
        let mut guard = self.channel_events_total.lock().expect("metrics map lock poisoned");
        let value = guard.entry(event).or_insert(0);
        *value = value.saturating_add(1);
    }

    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP gamehub_request_rate_total Total HTTP requests by endpoint.\n");
        output.push_str("# TYPE gamehub_request_rate_total counter\n");
        append_counter_lines(&mut output, "gamehub_request_rate_total", &self.request_rate_total);

        output.push_str(
            "# HELP gamehub_request_errors_total Total HTTP error responses by endpoint.\n",
        );
        output.push_str("# TYPE gamehub_request_errors_total counter\n");
        append_counter_lines(
            &mut output,
            "gamehub_request_errors_total",
            &self.request_errors_total,
        );

        output.push_str("# HELP gamehub_request_duration_ms_sum Sum of HTTP request latency in milliseconds by endpoint.\n");
        output.push_str("# TYPE gamehub_request_duration_ms_sum counter\n");
        append_counter_lines(
            &mut output,
            "gamehub_request_duration_ms_sum",
            &self.request_duration_sum_ms,
        );

        output.push_str("# HELP gamehub_channel_events_total Real-time channel lifecycle events.\n");
        output.push_str("# TYPE gamehub_channel_events_total counter\n");
        {
            let guard = self.channel_events_total.lock().expect("metrics map lock poisoned");
            let mut entries: Vec<_> = guard.iter().collect();
            entries.sort_by_key(|(event, _)| **event);
            for (event, value) in entries {
                output.push_str(&format!(
                    "gamehub_channel_events_total{{event=\"{}\"}} {value}\n",
                    event.as_str()
                ));
            }
        }

        output.push_str("# HELP gamehub_game_sessions_total Game sessions created since start.\n");
        output.push_str("# TYPE gamehub_game_sessions_total counter\n");
        output.push_str(&format!(
            "gamehub_game_sessions_total {}\n",
            self.game_sessions_total.load(Ordering::SeqCst)
        ));

        output.push_str(
            "# HELP gamehub_active_connections Authenticated connections attached to a game.\n",
        );
        output.push_str("# TYPE gamehub_active_connections gauge\n");
        output.push_str(&format!(
            "gamehub_active_connections {}\n",
            self.active_connections.load(Ordering::SeqCst).max(0)
        ));

        output
    }
}

fn normalize_endpoint(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.chars().all(|character| character.is_ascii_digit()) {
                "{number}".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn increment_counter(
    map: &Mutex<HashMap<EndpointMetricKey, u64>>,
    key: &EndpointMetricKey,
    delta: u64,
) {
    let mut guard = map.lock().expect("metrics map lock poisoned");
    let value = guard.entry(key.clone()).or_insert(0);
    *value = value.saturating_add(delta);
}

fn append_counter_lines(
    output: &mut String,
    metric_name: &str,
    map: &Mutex<HashMap<EndpointMetricKey, u64>>,
) {
    let guard = map.lock().expect("metrics map lock poisoned");
    let mut entries: Vec<_> = guard.iter().collect();
    entries.sort_by(|(left_key, _), (right_key, _)| {
        left_key
            .method
            .cmp(&right_key.method)
            .then_with(|| left_key.endpoint.cmp(&right_key.endpoint))
    });

    for (key, value) in entries {
        output.push_str(&format!(
            "{metric_name}{{method=\"{}\",endpoint=\"{}\"}} {value}\n",
            escape_label_value(&key.method),
            escape_label_value(&key.endpoint),
        ));
    }
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::{ChannelEvent, ServerMetrics};

    #[test]
    fn render_prometheus_includes_http_and_channel_metrics() {
        let metrics = ServerMetrics::default();
        metrics.record_http_request("get", "/api/game/17", 101, 3);
        metrics.record_http_request("GET", "/api/game", 404, 5);
        metrics.record_channel_event(ChannelEvent::HandshakeRejected);
        metrics.record_channel_event(ChannelEvent::HandshakeRejected);
        metrics.record_channel_event(ChannelEvent::Authenticated);
        metrics.game_sessions_total.fetch_add(1, Ordering::SeqCst);
        metrics.active_connections.fetch_add(2, Ordering::SeqCst);

        let rendered = metrics.render_prometheus();

        assert!(rendered
            .contains("gamehub_request_rate_total{method=\"GET\",endpoint=\"/api/game/{number}\"} 1"));
        assert!(rendered
            .contains("gamehub_request_errors_total{method=\"GET\",endpoint=\"/api/game\"} 1"));
        assert!(!rendered.contains(
            "gamehub_request_errors_total{method=\"GET\",endpoint=\"/api/game/{number}\"}"
        ));
        assert!(rendered.contains("gamehub_channel_events_total{event=\"handshake_rejected\"} 2"));
        assert!(rendered.contains("gamehub_channel_events_total{event=\"authenticated\"} 1"));
        assert!(rendered.contains("gamehub_game_sessions_total 1"));
        assert!(rendered.contains("gamehub_active_connections 2"));
    }
}
