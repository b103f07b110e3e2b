use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use guild_checkout::adapters::bot_api::{ChannelAnnouncer, HttpBotApi};
use guild_checkout::adapters::http::{router, AppState};
use guild_checkout::adapters::payments::HttpProviderFactory;
use guild_checkout::adapters::postgres::{
    PostgresAuditLog, PostgresOrderRepository, PostgresPaymentRepository,
    PostgresProviderConfigStore, PostgresShopRepository, PostgresSubscriptionRepository,
    PostgresWebhookEventRepository,
};
use guild_checkout::application::{
    CheckoutInitiator, FulfillmentEngine, InitiateCheckoutHandler, PostCommitHooks,
    WebhookProcessor,
};
use guild_checkout::config::AppConfig;
use guild_checkout::ports::{
    AuditLog, BotApi, NotificationSink, PaymentRepository, ProviderFactory, ShopRepository,
    SubscriptionRepository, WebhookEventRepository,
};

const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = AppConfig::load()?;
    init_tracing(&cfg.server.log_level, cfg.is_production());
    cfg.validate()?;

    let pool = cfg.database.pool_options().connect(&cfg.database.url).await?;
    if cfg.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let events: Arc<dyn WebhookEventRepository> =
        Arc::new(PostgresWebhookEventRepository::new(pool.clone()));
    spawn_retention_purge(events.clone(), cfg.payment.webhook_retention());

    let state = build_state(&cfg, pool, events)?;
    let app = router(
        state,
        SecretString::new(cfg.server.internal_api_secret.clone()),
        cfg.server.request_timeout(),
    );

    let addr = cfg.server.socket_addr()?;
    info!(%addr, environment = ?cfg.server.environment, "guild-checkout listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn build_state(
    cfg: &AppConfig,
    pool: PgPool,
    events: Arc<dyn WebhookEventRepository>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let orders = Arc::new(PostgresOrderRepository::new(pool.clone()));
    let payments: Arc<dyn PaymentRepository> = Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let configs = Arc::new(PostgresProviderConfigStore::new(pool.clone()));
    let shop: Arc<dyn ShopRepository> = Arc::new(PostgresShopRepository::new(pool.clone()));
    let subscriptions: Arc<dyn SubscriptionRepository> =
        Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let audit: Arc<dyn AuditLog> = Arc::new(PostgresAuditLog::new(pool));

    let providers: Arc<dyn ProviderFactory> = Arc::new(HttpProviderFactory::new(&cfg.payment)?);
    let bot: Arc<dyn BotApi> = Arc::new(HttpBotApi::new(&cfg.bot_api)?);
    let announcer: Arc<dyn NotificationSink> =
        Arc::new(ChannelAnnouncer::new(shop.clone(), bot.clone()));
    let hooks = Arc::new(PostCommitHooks::standard(audit, announcer));

    let fulfillment = Arc::new(FulfillmentEngine::new(
        shop.clone(),
        subscriptions.clone(),
        bot,
        providers.clone(),
        hooks.clone(),
    ));
    let webhooks = Arc::new(WebhookProcessor::new(
        configs.clone(),
        providers.clone(),
        events,
        orders.clone(),
        payments.clone(),
        shop,
        subscriptions,
        fulfillment,
        hooks.clone(),
    ));
    let initiator = Arc::new(CheckoutInitiator::new(
        providers,
        payments.clone(),
        hooks,
        cfg.payment.public_base_url.clone(),
    ));
    let checkout = Arc::new(InitiateCheckoutHandler::new(orders, payments, configs, initiator));

    Ok(AppState { webhooks, checkout })
}

/// Deletes processed-webhook records older than `retention` once an hour.
fn spawn_retention_purge(events: Arc<dyn WebhookEventRepository>, retention: chrono::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - retention;
            match events.delete_before(cutoff).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, %cutoff, "purged processed webhook records"),
                Err(e) => error!(error = %e, "webhook retention purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
