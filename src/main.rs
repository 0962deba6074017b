use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use edu_loan_engine::config::Config;
use edu_loan_engine::core::{Clock, SystemClock};
use edu_loan_engine::modules::gateways::{PaymentGateway, RazorpayGateway};
use edu_loan_engine::modules::health;
use edu_loan_engine::modules::installments::{ChargeService, RetryScheduler};
use edu_loan_engine::modules::notifications::services::notifier_from_config;
use edu_loan_engine::modules::webhooks::{self, SignatureVerifier, WebhookEventProcessor};
use edu_loan_engine::store::{LoanStore, MySqlStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting education loan repayment engine");
    tracing::info!(env = %config.app.env, bind = %config.server.bind_address(), "Configuration loaded");

    let pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        pool_size = config.database.pool_size,
        "Database pool initialized"
    );

    let timeout = Duration::from_secs(config.scheduler.gateway_timeout_secs);
    let store: Arc<dyn LoanStore> = Arc::new(MySqlStore::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        RazorpayGateway::new(&config.razorpay, timeout).context("Failed to build gateway client")?,
    );
    let notifier = notifier_from_config(config.notifications.url.as_deref(), timeout)
        .context("Failed to build notifier")?;

    let charges = Arc::new(ChargeService::new(
        store.clone(),
        gateway.clone(),
        clock.clone(),
        config.scheduler.max_retries,
        timeout,
    ));

    if config.scheduler.enabled {
        let scheduler = Arc::new(RetryScheduler::new(
            store.clone(),
            charges.clone(),
            clock.clone(),
            config.scheduler.clone(),
        ));
        tokio::spawn(scheduler.start());
    } else {
        tracing::warn!("Installment charge scheduler disabled");
    }

    let processor = web::Data::new(WebhookEventProcessor::new(
        store.clone(),
        notifier,
        clock,
        SignatureVerifier::new(config.razorpay.webhook_secret.clone()),
        config.scheduler.max_retries,
    ));
    let store_data = web::Data::from(store);

    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let processor = processor.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(store_data.clone())
            .configure(health::configure)
            .configure(move |cfg| webhooks::configure(cfg, processor))
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("edu_loan_engine={},actix_web=info", config.app.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_json_logging() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
