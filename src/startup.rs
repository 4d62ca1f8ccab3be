//! Application startup and lifecycle management.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::pricing::PricingEngine;
use crate::services::{
    init_metrics, BookingService, BookingStore, MongoStore, PaymentReconciler, RazorpayClient,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn BookingStore>,
    pub razorpay: RazorpayClient,
    pub bookings: BookingService,
    pub reconciler: PaymentReconciler,
}

impl AppState {
    /// Wire the services over any store implementation. Production uses
    /// MongoDB; tests drive the same wiring with an in-memory store.
    pub fn new(config: Config, store: Arc<dyn BookingStore>) -> Self {
        let razorpay = RazorpayClient::new(config.razorpay.clone());
        let pricing = PricingEngine::new(&config.pricing);
        let bookings = BookingService::new(
            store.clone(),
            pricing,
            config.pricing.currency.clone(),
        );
        let reconciler = PaymentReconciler::new(store.clone(), razorpay.clone());

        Self {
            config,
            store,
            razorpay,
            bookings,
            reconciler,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        // Booking endpoints
        .route(
            "/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route("/bookings/:id/cancel", post(handlers::bookings::cancel_booking))
        .route("/bookings/:id/pickup", post(handlers::bookings::confirm_pickup))
        .route("/bookings/:id/dropoff", post(handlers::bookings::confirm_dropoff))
        .route("/bookings/:id/payments", get(handlers::bookings::booking_payments))
        // Payment endpoints
        .route("/bookings/:id/payments/order", post(handlers::payments::open_order))
        .route("/payments/verify", post(handlers::payments::verify_payment))
        .route("/payments/failure", post(handlers::payments::payment_failure))
        .route("/webhooks/razorpay", post(handlers::payments::webhook))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

pub struct Application {
    listener: tokio::net::TcpListener,
    router: Router,
    port: u16,
}

impl Application {
    /// Build the production application: MongoDB-backed store, indexes
    /// initialized, metrics recorder installed.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some(config.service_name.clone());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let store = MongoStore::new(&db);
        store.init_indexes().await?;

        init_metrics();

        let state = AppState::new(config, Arc::new(store));

        if state.razorpay.is_configured() {
            tracing::info!("Razorpay client initialized");
        } else {
            tracing::warn!("Razorpay credentials not configured - payment features will be limited");
        }

        Self::with_state(state).await
    }

    /// Bind a listener and assemble the router for the given state.
    pub async fn with_state(state: AppState) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        let router = router(state);

        Ok(Self {
            listener,
            router,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
