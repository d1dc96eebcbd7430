// ABOUTME: Gateway bootstrap - singleton construction, tool generation, route assembly
// ABOUTME: Wires discovery, registries, middleware, endpoints, and the OAuth server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Gateway Assembly
//!
//! Construction order (leaves first): config and logging, audit, auth,
//! API keys, plugin registry, site discovery, rate limiter, health monitor,
//! OAuth stack, tool generation and registration, endpoint fleet, HTTP
//! router. Every singleton is owned here and shared as `Arc`.

use crate::api_keys::ApiKeyStore;
use crate::audit::AuditLogger;
use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::constants::env_names;
use crate::endpoints::factory::EndpointFactory;
use crate::endpoints::middleware::MiddlewareDeps;
use crate::endpoints::registry::EndpointRegistry;
use crate::errors::AppResult;
use crate::health::HealthMonitor;
use crate::oauth2::client_registry::ClientRegistry;
use crate::oauth2::csrf::CsrfTokenStore;
use crate::oauth2::routes::OAuthRoutesState;
use crate::oauth2::storage::{JsonStorage, OAuthStorage};
use crate::oauth2::{OAuthServer, TokenManager};
use crate::plugins::PluginRegistry;
use crate::rate_limiting::RateLimiter;
use crate::site_registry::SiteRegistry;
use crate::tool_generator::ToolGenerator;
use crate::tool_registry::ToolRegistry;
use crate::tools::system::{system_tools, EndpointInfoSlot, SystemToolsDeps};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Plugin namespaces the gateway knows about, whether or not a plugin
/// family is compiled in. Endpoint filtering attributes tool names against
/// these prefixes (longest match first).
const KNOWN_PLUGIN_NAMESPACES: &[&str] = &[
    "wordpress",
    "wordpress_advanced",
    "woocommerce",
    "gitea",
    "n8n",
    "supabase",
    "openpanel",
    "appwrite",
    "directus",
    "system",
];

/// Every process-global singleton, bundled
pub struct ServerResources {
    /// Server configuration
    pub config: ServerConfig,
    /// Discovered tenants
    pub sites: Arc<SiteRegistry>,
    /// Known plugin families
    pub plugins: Arc<PluginRegistry>,
    /// The global tool table
    pub tools: Arc<ToolRegistry>,
    /// API key store
    pub api_keys: Arc<ApiKeyStore>,
    /// Master key validation
    pub auth_manager: Arc<AuthManager>,
    /// Request admission
    pub rate_limiter: Arc<RateLimiter>,
    /// Audit trail
    pub audit: Arc<AuditLogger>,
    /// Health monitor
    pub health: Arc<HealthMonitor>,
    /// OAuth client registry
    pub oauth_clients: Arc<ClientRegistry>,
    /// OAuth persistence
    pub oauth_storage: Arc<dyn OAuthStorage>,
    /// Access/refresh token management
    pub token_manager: Arc<TokenManager>,
    /// The OAuth authorization server
    pub oauth_server: Arc<OAuthServer>,
    /// CSRF tokens for the consent flow
    pub csrf: Arc<CsrfTokenStore>,
    /// Endpoint summaries published to the system tools
    pub endpoint_infos: EndpointInfoSlot,
}

impl ServerResources {
    /// Construct every singleton from the environment
    ///
    /// # Errors
    ///
    /// Returns an error when configuration is invalid.
    pub fn from_env() -> AppResult<Self> {
        let config = ServerConfig::from_env()?;

        let audit = Arc::new(AuditLogger::with_defaults(&config.log_dir));
        let auth_manager = Arc::new(AuthManager::from_env());

        let api_keys_path = std::env::var(env_names::API_KEYS_STORAGE).map_or_else(
            |_| config.data_dir.join(crate::constants::paths::API_KEYS_FILE),
            std::path::PathBuf::from,
        );
        let api_keys = Arc::new(ApiKeyStore::new(api_keys_path));

        let plugins = Arc::new(PluginRegistry::builtin());
        let plugin_types = plugins.plugin_types();

        let mut sites = SiteRegistry::new();
        let discovered = sites.discover_sites(&plugin_types);
        info!("Discovered {discovered} sites across {} plugin types", plugin_types.len());
        let sites = Arc::new(sites);

        let rate_limiter = Arc::new(RateLimiter::from_env(&plugin_types));
        let health = Arc::new(HealthMonitor::with_defaults(Some(Arc::clone(&audit))));

        let oauth_storage: Arc<dyn OAuthStorage> =
            Arc::new(JsonStorage::new(&config.oauth.storage_path));
        let oauth_clients = Arc::new(ClientRegistry::new(&config.data_dir));
        let token_manager = Arc::new(TokenManager::new(
            &config.oauth,
            Arc::clone(&oauth_storage),
            Some(Arc::clone(&audit)),
        ));
        let oauth_server = Arc::new(OAuthServer::new(
            Arc::clone(&oauth_clients),
            Arc::clone(&token_manager),
            Arc::clone(&oauth_storage),
            Some(Arc::clone(&audit)),
        ));
        let csrf = Arc::new(CsrfTokenStore::with_defaults());

        let endpoint_infos: EndpointInfoSlot = Arc::new(std::sync::RwLock::new(Vec::new()));

        // Generate the tool table: plugin tools from specs, then the
        // system management tools
        let mut tools = ToolRegistry::new();
        for namespace in KNOWN_PLUGIN_NAMESPACES {
            tools.declare_namespace(namespace);
        }

        let generator = ToolGenerator::new(Arc::clone(&sites));
        let generated = generator.generate_all_tools(&plugins);
        tools.register_many(generated);

        let system_deps = SystemToolsDeps {
            api_keys: Arc::clone(&api_keys),
            rate_limiter: Arc::clone(&rate_limiter),
            audit: Arc::clone(&audit),
            sites: Arc::clone(&sites),
            oauth_clients: Arc::clone(&oauth_clients),
            health: Arc::clone(&health),
            endpoint_infos: Arc::clone(&endpoint_infos),
        };
        tools.register_many(system_tools(&system_deps));

        info!("Tool table ready: {} tools", tools.count());

        Ok(Self {
            config,
            sites,
            plugins,
            tools: Arc::new(tools),
            api_keys,
            auth_manager,
            rate_limiter,
            audit,
            health,
            oauth_clients,
            oauth_storage,
            token_manager,
            oauth_server,
            csrf,
            endpoint_infos,
        })
    }

    /// Middleware collaborators for the endpoint factory
    #[must_use]
    pub fn middleware_deps(&self) -> MiddlewareDeps {
        MiddlewareDeps {
            auth_manager: Arc::clone(&self.auth_manager),
            api_keys: Arc::clone(&self.api_keys),
            token_manager: Arc::clone(&self.token_manager),
            rate_limiter: Arc::clone(&self.rate_limiter),
            audit: Arc::clone(&self.audit),
        }
    }
}

/// Build the endpoint fleet and the full HTTP router
///
/// # Errors
///
/// Returns an error when a project endpoint configuration is invalid.
pub fn build_router(resources: &Arc<ServerResources>) -> AppResult<Router> {
    let factory = EndpointFactory::new(resources.middleware_deps());
    let mut endpoint_registry = EndpointRegistry::new(factory);

    endpoint_registry.initialize_default_endpoints(&resources.tools);

    // One hard-pinned endpoint per discovered tenant at /project/{suffix}
    for site in resources.sites.all_sites() {
        let full_id = site.full_id();
        let suffix = resources.sites.get_effective_path_suffix(&full_id);
        let alias = (suffix != full_id).then_some(suffix);
        endpoint_registry.create_project_endpoint(
            &resources.tools,
            &full_id,
            &site.plugin_type,
            alias.as_deref(),
        )?;
    }

    // Publish endpoint summaries to the system tools
    if let Ok(mut slot) = resources.endpoint_infos.write() {
        *slot = endpoint_registry.list_endpoints();
    }

    let oauth_router = crate::oauth2::routes::router(OAuthRoutesState {
        server: Arc::clone(&resources.oauth_server),
        clients: Arc::clone(&resources.oauth_clients),
        csrf: Arc::clone(&resources.csrf),
        auth_manager: Arc::clone(&resources.auth_manager),
        api_keys: Arc::clone(&resources.api_keys),
    });

    let health = Arc::clone(&resources.health);
    let health_route = get(move || {
        let health = Arc::clone(&health);
        async move {
            Json(json!({
                "status": "ok",
                "metrics": health.system_metrics(),
            }))
        }
    });

    let deep_resources = Arc::clone(resources);
    let project_health_route = get(move || {
        let resources = Arc::clone(&deep_resources);
        async move {
            let fleet = check_all_sites_health(&resources).await;
            Json(serde_json::to_value(fleet).unwrap_or_default())
        }
    });

    Ok(endpoint_registry
        .router()
        .merge(oauth_router)
        .route("/health", health_route)
        .route("/health/projects", project_health_route)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive()))
}

/// Run a health check across every discovered tenant, instantiating each
/// site's plugin on demand and aggregating into a fleet status.
pub async fn check_all_sites_health(resources: &ServerResources) -> crate::health::FleetHealth {
    let mut projects: Vec<(String, Box<dyn crate::plugins::SitePlugin>)> = Vec::new();
    for site in resources.sites.all_sites() {
        let Some(descriptor) = resources.plugins.get(&site.plugin_type) else {
            continue;
        };
        match (descriptor.build)(site) {
            Ok(plugin) => projects.push((site.full_id(), plugin)),
            Err(e) => tracing::warn!("Cannot build plugin for {}: {e}", site.full_id()),
        }
    }
    resources.health.check_all_projects_health(projects).await
}

/// Serve the gateway until shutdown. Also spawns the hourly sweep of
/// expired OAuth codes and access tokens.
///
/// # Errors
///
/// Returns an error when binding or serving fails.
pub async fn serve(resources: Arc<ServerResources>) -> anyhow::Result<()> {
    let router = build_router(&resources)?;

    let storage = Arc::clone(&resources.oauth_storage);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3_600));
        loop {
            interval.tick().await;
            if let Err(e) = storage.sweep_expired().await {
                tracing::error!("OAuth storage sweep failed: {}", e.message);
            }
        }
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], resources.config.http_port));
    info!("MCPHub gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
