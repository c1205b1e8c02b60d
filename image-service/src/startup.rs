//! Application startup and lifecycle management.
//!
//! Wires the configured backends into the orchestrator and reconciliation
//! job. All collaborators are constructed here and injected; nothing holds
//! global state.

use crate::config::{ImageServiceConfig, MetadataBackend, ProviderBackend, StorageBackend};
use crate::handlers;
use crate::services::providers::mock::MockImageProvider;
use crate::services::providers::openai::{OpenAiConfig, OpenAiImageProvider};
use crate::services::providers::ImageProvider;
use crate::services::{
    ArtifactStorage, GenerationOrchestrator, LocalStorage, MemoryMetadataStore, MetadataStore,
    MongoMetadataStore, S3Storage,
};
use crate::workers::{spawn_scheduler, ReconciliationJob, RetentionPolicy};
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ImageServiceConfig,
    pub metadata: Arc<dyn MetadataStore>,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ImageServiceConfig) -> Result<Self, AppError> {
        let metadata = build_metadata_store(&config).await?;
        let storage = build_storage(&config).await?;
        let provider = build_provider(&config)?;

        let orchestrator = Arc::new(GenerationOrchestrator::new(
            Arc::clone(&provider),
            Arc::clone(&storage),
            Arc::clone(&metadata),
            config.storage.public_domain.clone(),
        ));

        if config.reconcile.enabled {
            let job = Arc::new(ReconciliationJob::new(
                Arc::clone(&storage),
                Arc::clone(&metadata),
                RetentionPolicy::from_config(&config.reconcile),
                config.reconcile.concurrency,
                Duration::from_secs(config.reconcile.orphan_grace_secs),
            ));
            let _ = spawn_scheduler(
                job,
                Duration::from_secs(config.reconcile.interval_secs.max(1)),
            );
            tracing::info!(
                interval_secs = config.reconcile.interval_secs,
                "Reconciliation scheduler started"
            );
        } else {
            tracing::info!("Reconciliation disabled by configuration");
        }

        let state = AppState {
            config: config.clone(),
            metadata,
            orchestrator,
        };

        let api = Router::new().route(
            "/generations",
            post(handlers::create_generation).get(handlers::list_generations),
        );

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .nest("/api/v1", api)
            .layer(build_cors(&config))
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());

        // Port 0 = random port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.state.metadata
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}

async fn build_metadata_store(
    config: &ImageServiceConfig,
) -> Result<Arc<dyn MetadataStore>, AppError> {
    match config.metadata.backend {
        MetadataBackend::Mongo => {
            let store =
                MongoMetadataStore::connect(&config.mongodb.uri, &config.mongodb.database)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to MongoDB: {}", e);
                        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
                    })?;
            store.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
            Ok(Arc::new(store))
        }
        MetadataBackend::Memory => {
            tracing::info!("Using in-memory metadata store");
            Ok(Arc::new(MemoryMetadataStore::new()))
        }
    }
}

async fn build_storage(config: &ImageServiceConfig) -> Result<Arc<dyn ArtifactStorage>, AppError> {
    match config.storage.backend {
        StorageBackend::Local => {
            let storage = LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    e
                })?;
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 => {
            let bucket = config.storage.s3_bucket.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "S3_BUCKET is required for the s3 storage backend"
                ))
            })?;
            let client = crate::services::storage::build_s3_client(&config.storage)?;
            tracing::info!(bucket = %bucket, "Using S3 artifact storage");
            Ok(Arc::new(S3Storage::new(client, bucket)))
        }
    }
}

fn build_provider(config: &ImageServiceConfig) -> Result<Arc<dyn ImageProvider>, AppError> {
    match config.provider.backend {
        ProviderBackend::OpenAi => {
            let api_key = config.provider.openai_api_key.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "OPENAI_API_KEY is required for the openai provider backend"
                ))
            })?;
            let provider = OpenAiImageProvider::new(OpenAiConfig {
                api_key,
                api_base: config.provider.openai_api_base.clone(),
                image_size: config.provider.image_size.clone(),
            });
            tracing::info!(size = %config.provider.image_size, "Initialized OpenAI image provider");
            Ok(Arc::new(provider))
        }
        ProviderBackend::Mock => {
            tracing::info!("Using mock image provider");
            Ok(Arc::new(MockImageProvider::new(true)))
        }
    }
}

fn build_cors(config: &ImageServiceConfig) -> CorsLayer {
    match &config.http.cors_allowed_origins {
        Some(origins) if !origins.trim().is_empty() => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::permissive(),
    }
}
