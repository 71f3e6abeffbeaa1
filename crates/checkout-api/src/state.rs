//! # Application State
//!
//! Shared state for the Axum application: the checkout engine, server
//! configuration and the background session sweeper.

use checkout_core::{
    Catalog, CheckoutEngine, LoggingFulfillmentHook, OrderFactory, ProductCatalog, SessionStore,
    SweeperHandle, TotalsCalculator,
};
use checkout_stripe::StripeGateway;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Checkout session time-to-live, in minutes
    pub session_ttl_minutes: i64,
    /// Interval between expiry sweeps, in seconds
    pub sweep_interval_secs: u64,
    /// Upper bound on a single gateway round trip, in seconds
    pub gateway_timeout_secs: u64,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            session_ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            gateway_timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The checkout engine
    pub engine: Arc<CheckoutEngine>,
    /// Application config
    pub config: AppConfig,
    /// Background expiry sweep; aborts when the state is dropped
    pub sweeper: Arc<SweeperHandle>,
}

impl AppState {
    /// Create application state with the Stripe gateway from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let catalog = load_product_catalog()?;
        let gateway = StripeGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        Self::with_gateway(config, Arc::new(catalog), Arc::new(gateway))
    }

    /// Create application state with an explicit catalog and gateway
    /// (primary constructor for tests)
    pub fn with_gateway(
        config: AppConfig,
        catalog: Arc<dyn Catalog>,
        gateway: checkout_core::BoxedPaymentGateway,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(SessionStore::new(chrono::Duration::minutes(
            config.session_ttl_minutes,
        )));
        let sweeper =
            store.start_sweeper(std::time::Duration::from_secs(config.sweep_interval_secs));

        let engine = CheckoutEngine::new(
            store,
            catalog,
            gateway,
            TotalsCalculator::new(),
            OrderFactory::new(Arc::new(LoggingFulfillmentHook)),
            std::time::Duration::from_secs(config.gateway_timeout_secs),
        );

        Ok(Self {
            engine: Arc::new(engine),
            config,
            sweeper: Arc::new(sweeper),
        })
    }
}

/// Load product catalog from config file
fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    // Try to load from config/products.toml
    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog: ProductCatalog = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    // Return empty catalog if no config found
    tracing::warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::new())
}
