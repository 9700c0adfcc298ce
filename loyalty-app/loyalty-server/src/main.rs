use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use loyalty_api::{build_router, middleware::ClaimRateLimiter, AppState};
use loyalty_core::domain::{Business, BusinessKey, Channel, CustomerKey};
use loyalty_core::ports::{EmailSender, PhoneMessenger};
use loyalty_core::repositories::{
    BusinessRepository, CampaignRepository, CustomerRepository, RewardClaimRepository, StorageHealth,
    VisitRepository,
};
use loyalty_core::services::{
    CampaignDispatcher, CustomerService, DispatchSettings, IdentityResolver, RewardCycleEngine, TokenIssuer,
    TokenIssuerSettings, VisitLedger,
};
use loyalty_infrastructure::{
    create_pool, run_migrations, DisabledEmailSender, DisabledPhoneMessenger, MemoryStore, PgBusinessRepository,
    PgCampaignRepository, PgCustomerRepository, PgRewardClaimRepository, PgStorageHealth, PgVisitRepository,
    QrServerRenderer, SmtpEmailSender, WhatsAppMessenger,
};
use loyalty_shared::config::{AppConfig, SeedBusiness, StorageBackend};
use loyalty_shared::retry::{retry_with_backoff, RetryPolicy};
use loyalty_shared::telemetry::init_telemetry;

/// Repository handles for the selected backend.
struct Storage {
    businesses: Arc<dyn BusinessRepository>,
    customers: Arc<dyn CustomerRepository>,
    visits: Arc<dyn VisitRepository>,
    claims: Arc<dyn RewardClaimRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    health: Arc<dyn StorageHealth>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Held until shutdown so buffered log lines are flushed
    let _log_guard = init_telemetry();

    info!("Loyalty server starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;
    let storage = connect_storage(&config).await?;
    let (phone, email) = build_transports(&config)?;
    let qr = QrServerRenderer::new(&config.qr.base_url, config.qr.size)
        .with_context(|| format!("Invalid qr.base_url {}", config.qr.base_url))?;

    let storage_timeout = Duration::from_millis(config.loyalty.storage_timeout_ms);
    let resolver = IdentityResolver::new(&config.loyalty.identity_query_param, &config.loyalty.identifier_pattern)?;
    // Fail at startup rather than on the first registration.
    resolver.scan_link(&config.app.public_base_url, &CustomerKey::generate())?;

    let issuer = Arc::new(TokenIssuer::new(
        storage.claims.clone(),
        TokenIssuerSettings {
            digits: config.loyalty.claim_token_digits,
            max_attempts: config.loyalty.claim_token_max_attempts,
            storage_timeout,
        },
    ));
    let ledger = Arc::new(VisitLedger::new(
        storage.businesses.clone(),
        storage.visits.clone(),
        issuer.clone(),
        storage_timeout,
    ));
    let engine = Arc::new(RewardCycleEngine::new(ledger.clone(), issuer.clone()));
    let customers = Arc::new(CustomerService::new(
        storage.businesses.clone(),
        storage.customers.clone(),
        storage.claims.clone(),
        ledger,
        storage_timeout,
    ));
    let dispatcher = Arc::new(CampaignDispatcher::new(
        storage.businesses.clone(),
        storage.customers.clone(),
        storage.campaigns.clone(),
        phone,
        email,
        DispatchSettings {
            pacing: Duration::from_millis(config.campaign.pacing_ms),
            send_timeout: Duration::from_millis(config.campaign.send_timeout_ms),
            storage_timeout,
        },
    ));

    let state = AppState {
        resolver: Arc::new(resolver),
        engine,
        issuer,
        customers,
        dispatcher,
        qr: Arc::new(qr),
        storage: storage.health,
        claim_limiter: Arc::new(ClaimRateLimiter::new(config.api.claim_requests_per_minute)),
        scan_base_url: config.app.public_base_url.clone(),
    };
    let app = build_router(state);

    // Bind address
    let host: std::net::IpAddr = config.app.host.parse().context("Invalid app.host")?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("{} ({}) listening on {}", config.app.name, config.app.env, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Loyalty server stopped");
    Ok(())
}

async fn connect_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            info!("Connecting to database...");
            let policy = RetryPolicy::from(&config.retry);
            let pool = retry_with_backoff(&policy, "connect_database", |_| true, || {
                create_pool(&config.database)
            })
            .await
            .context("Failed to connect to database")?;
            run_migrations(&pool).await.context("Failed to apply migrations")?;
            info!("Database connection established.");

            if !config.seed_businesses.is_empty() {
                warn!("seed_businesses is ignored for the postgres backend");
            }

            Ok(Storage {
                businesses: Arc::new(PgBusinessRepository::new(pool.clone())),
                customers: Arc::new(PgCustomerRepository::new(pool.clone())),
                visits: Arc::new(PgVisitRepository::new(pool.clone())),
                claims: Arc::new(PgRewardClaimRepository::new(pool.clone())),
                campaigns: Arc::new(PgCampaignRepository::new(pool.clone())),
                health: Arc::new(PgStorageHealth::new(pool)),
            })
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            let store = Arc::new(MemoryStore::new());
            for seed in &config.seed_businesses {
                store.seed_business(seed_business(seed)?);
            }
            info!("Seeded {} businesses", config.seed_businesses.len());

            Ok(Storage {
                businesses: store.clone(),
                customers: store.clone(),
                visits: store.clone(),
                claims: store.clone(),
                campaigns: store.clone(),
                health: store,
            })
        }
    }
}

fn seed_business(seed: &SeedBusiness) -> anyhow::Result<Business> {
    let channels = seed
        .channel_order
        .iter()
        .map(|raw| {
            Channel::from_str(raw).with_context(|| format!("Unknown channel {} for business {}", raw, seed.key))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let business = Business::new(
        BusinessKey::new(seed.key.as_str()),
        seed.name.clone(),
        seed.visit_goal,
        seed.reward_title.clone(),
        channels,
    );
    business.goal()?;
    Ok(business)
}

fn build_transports(config: &AppConfig) -> anyhow::Result<(Arc<dyn PhoneMessenger>, Arc<dyn EmailSender>)> {
    let phone: Arc<dyn PhoneMessenger> = match &config.whatsapp {
        Some(settings) => {
            let timeout = Duration::from_millis(config.campaign.send_timeout_ms);
            Arc::new(WhatsAppMessenger::new(settings, timeout).context("Failed to build WhatsApp client")?)
        }
        None => {
            warn!("WhatsApp is not configured; phone messages will fail over to email");
            Arc::new(DisabledPhoneMessenger)
        }
    };
    let email: Arc<dyn EmailSender> = match &config.email {
        Some(settings) => Arc::new(SmtpEmailSender::new(settings).context("Failed to build SMTP transport")?),
        None => {
            warn!("SMTP is not configured; email messages are disabled");
            Arc::new(DisabledEmailSender)
        }
    };
    Ok((phone, email))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
