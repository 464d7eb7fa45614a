use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

use auth_fusion::auth::guard::{MemoryGuard, SharedGuard};
use auth_fusion::auth::signer::{JwtSigner, SharedSigner};
use auth_fusion::auth::Principal;
use auth_fusion::config::AuthConfig;
use auth_fusion::facade::AuthFusion;
use auth_fusion::handlers::{auth_routes, handle_rejection};
use auth_fusion::manager::{AuthDriverManager, DriverServices};
use auth_fusion::storage::{MemoryTokenRevocationStore, MemoryTokenStore};

/// How often expired tokens and revocations are swept
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    // Load config from .env
    let config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, default driver={}",
        config.host, config.port, config.default_driver
    );

    let guard = match build_guard() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Failed to initialize credential guard: {}", e);
            std::process::exit(1);
        }
    };

    let token_store = Arc::new(MemoryTokenStore::new());
    Arc::clone(&token_store).start_cleanup_task(CLEANUP_INTERVAL);

    let mut services = DriverServices::new()
        .with_guard(config.session_guard.clone(), Arc::clone(&guard))
        .with_guard(config.signed_guard.clone(), Arc::clone(&guard))
        .with_guard(config.oauth_guard.clone(), guard)
        .with_token_store(token_store);

    match config.signer_config() {
        Some(signer_config) => {
            let revocations = Arc::new(MemoryTokenRevocationStore::new());
            Arc::clone(&revocations).start_cleanup_task(CLEANUP_INTERVAL);
            let signer: SharedSigner = Arc::new(JwtSigner::new(signer_config, revocations));
            services = services.with_signer(signer);
        }
        None => warn!("AUTH_FUSION_JWT_SECRET not set, signed driver is unavailable"),
    }

    match config.oauth_client() {
        Some(client) => services = services.with_oauth_client(client),
        None => warn!("AUTH_FUSION_OAUTH_CLIENT_ID not set, oauth driver is unavailable"),
    }

    let fusion = AuthFusion::new(AuthDriverManager::from_config(&config, services));
    match fusion.available_drivers() {
        Ok(names) => info!("Available auth drivers: {}", names.join(", ")),
        Err(e) => warn!("Could not list auth drivers: {}", e),
    }

    let routes = auth_routes(fusion)
        .recover(handle_rejection)
        .with(warp::log("auth_fusion"));

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Auth Fusion server on {}", addr);
    warp::serve(routes).run(addr).await;
}

/// In-memory guard seeded with the demo account, if one is configured
fn build_guard() -> auth_fusion::Result<SharedGuard> {
    let guard = MemoryGuard::new()?;

    match (
        std::env::var("AUTH_FUSION_DEMO_USER"),
        std::env::var("AUTH_FUSION_DEMO_PASSWORD"),
    ) {
        (Ok(user), Ok(password)) if !user.is_empty() && !password.is_empty() => {
            guard.add_account(Principal::new(user.clone()), &password)?;
            info!("Seeded demo account {}", user);
        }
        _ => warn!("No demo account configured, every login will fail"),
    }

    Ok(Arc::new(guard))
}
