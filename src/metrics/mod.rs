use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref REGISTRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_registrations_total", "Register calls by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref UNREGISTRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_unregistrations_total", "Unregister calls by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref FIND_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_find_total", "Find calls by mode"),
        &["mode"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge = IntGauge::new(
        "registry_active_subscriptions",
        "Live watch subscriptions on the change pipeline"
    )
    .expect("metric can not be created");

    pub static ref EVENTS_FANNED_OUT_TOTAL: IntCounter = IntCounter::new(
        "registry_events_fanned_out_total",
        "Change events delivered to subscriptions, counted per subscription"
    )
    .expect("metric can not be created");

    pub static ref WATCH_RESTARTS_TOTAL: IntCounter = IntCounter::new(
        "registry_watch_restarts_total",
        "Times the store watch was re-established and live subscriptions re-snapshotted"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

fn register_custom_metrics() {
    REGISTRY
        .register(Box::new(REGISTRATIONS_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(UNREGISTRATIONS_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(FIND_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(EVENTS_FANNED_OUT_TOTAL.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(WATCH_RESTARTS_TOTAL.clone()))
        .expect("collector can be registered");
}

pub async fn start_server(port: u16, mut shutdown_signal: watch::Receiver<()>) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        eprintln!("could not encode custom metrics: {}", e);
    };
    let mut res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        eprintln!("could not encode prometheus metrics: {}", e);
    };
    let res_default = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("prometheus metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };

    res.push_str(&res_default);
    Ok(res)
}
