// ABOUTME: Tenant (site) discovery from environment variables with alias resolution
// ABOUTME: Tracks alias conflicts first-writer-wins and exposes lookup by id or alias
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MCPHub Contributors

//! # Site Registry
//!
//! Materializes configured tenants from environment variables of the form
//! `{PLUGIN_TYPE}_{SITE_ID}_{CONFIG_KEY}`, with an optional
//! `{PLUGIN_TYPE}_{SITE_ID}_ALIAS` friendly name:
//!
//! ```text
//! WORDPRESS_SITE1_URL=https://example.com
//! WORDPRESS_SITE1_USERNAME=admin
//! WORDPRESS_SITE1_APP_PASSWORD=xxxx
//! WORDPRESS_SITE2_URL=https://myblog.com
//! WORDPRESS_SITE2_ALIAS=myblog
//! ```
//!
//! Aliases are claimed first-writer-wins; later claimants are recorded in
//! the conflicts table and must use their `full_id` as endpoint path suffix.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info};

use crate::errors::{AppError, AppResult};

/// Words that are configuration namespaces, never site IDs
/// (e.g. `WORDPRESS_RATE_LIMIT_PER_MINUTE` must not create a site "rate").
pub const RESERVED_SITE_WORDS: &[&str] = &[
    "limit", "rate", "config", "debug", "log", "level", "mode", "timeout", "retry", "max", "min",
    "default", "global", "enabled", "disabled", "host", "port", "path", "key", "secret", "token",
    "advanced", "basic", "simple", "pro", "premium", "standard",
];

/// Configuration for a single tenant
#[derive(Debug, Clone, Serialize)]
pub struct SiteConfig {
    /// Site identifier (lowercased short token, e.g. "site1")
    pub site_id: String,
    /// Plugin type (e.g. "wordpress")
    pub plugin_type: String,
    /// Optional friendly alias
    pub alias: Option<String>,
    /// Free-form configuration collected from the environment
    /// (url, username, app_password, ... keys lowercased)
    pub settings: HashMap<String, String>,
}

impl SiteConfig {
    /// Full site identifier: `plugin_type_site_id`
    #[must_use]
    pub fn full_id(&self) -> String {
        format!("{}_{}", self.plugin_type, self.site_id)
    }

    /// Display name (alias when set, otherwise the site id)
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.site_id)
    }
}

/// Registry of configured tenants across plugin types
#[derive(Debug, Default)]
pub struct SiteRegistry {
    /// full_id -> config
    sites: HashMap<String, SiteConfig>,
    /// alias (or site_id, or full_id) -> full_id; first writer wins
    aliases: HashMap<String, String>,
    /// conflicted alias -> every full_id that wanted it (winner first)
    alias_conflicts: HashMap<String, Vec<String>>,
}

impl SiteRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover sites for the given plugin types from the process environment.
    /// Returns the number of sites discovered.
    pub fn discover_sites(&mut self, plugin_types: &[&str]) -> usize {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        self.discover_sites_from(&vars, plugin_types)
    }

    /// Discover sites from an explicit variable set (testable entry point)
    pub fn discover_sites_from(
        &mut self,
        vars: &[(String, String)],
        plugin_types: &[&str],
    ) -> usize {
        info!("Starting site discovery for: {}", plugin_types.join(", "));

        let mut total = 0;
        for plugin_type in plugin_types {
            total += self.discover_plugin_sites(vars, plugin_type);
        }

        info!(
            "Discovery complete. Found {total} sites with {} aliases.",
            self.aliases.len()
        );

        if !self.alias_conflicts.is_empty() {
            info!("Duplicate alias conflicts detected:");
            for (alias, full_ids) in &self.alias_conflicts {
                let winner = self.aliases.get(alias);
                info!("  Alias '{alias}': {winner:?} (winner), losers use full_id: {full_ids:?}");
            }
        }

        total
    }

    fn discover_plugin_sites(&mut self, vars: &[(String, String)], plugin_type: &str) -> usize {
        let prefix = plugin_type.to_uppercase();
        let Ok(pattern) = Regex::new(&format!("^{}_([A-Z0-9_]+?)_(.+)$", regex::escape(&prefix)))
        else {
            error!("Failed to compile discovery pattern for {plugin_type}");
            return 0;
        };

        let mut site_ids = BTreeSet::new();
        for (env_key, _) in vars {
            if let Some(caps) = pattern.captures(env_key) {
                let site_id = caps[1].to_lowercase();
                if !RESERVED_SITE_WORDS.contains(&site_id.as_str()) {
                    site_ids.insert(site_id);
                }
            }
        }

        let mut count = 0;
        for site_id in site_ids {
            let Some(mut settings) = load_site_settings(vars, plugin_type, &site_id) else {
                continue;
            };
            let alias = settings.remove("alias");

            let config = SiteConfig {
                site_id,
                plugin_type: plugin_type.to_owned(),
                alias,
                settings,
            };
            let full_id = config.full_id();
            self.register_site(config);
            count += 1;

            let suffix = self.get_effective_path_suffix(&full_id);
            info!("Discovered site: {full_id} (path: {suffix})");
        }
        count
    }

    /// Register a site configuration, claiming its alias (first writer wins)
    pub fn register_site(&mut self, config: SiteConfig) {
        let full_id = config.full_id();

        if let Some(alias) = config.alias.clone() {
            if alias != config.site_id {
                self.register_alias_safe(&alias, &full_id);
                // Prefixed form so `wordpress_myblog` also resolves
                let prefixed = format!("{}_{alias}", config.plugin_type);
                self.register_alias_safe(&prefixed, &full_id);
            }
        }

        // The site id and full id are always addressable
        self.register_alias_safe(&config.site_id, &full_id);
        self.aliases.insert(full_id.clone(), full_id.clone());

        debug!(
            "Registered site: {full_id} (alias: {})",
            config.display_name()
        );
        self.sites.insert(full_id, config);
    }

    /// Claim an alias for `full_id`. Returns false (recording the conflict)
    /// when another site already holds it.
    fn register_alias_safe(&mut self, alias: &str, full_id: &str) -> bool {
        match self.aliases.get(alias) {
            Some(existing) if existing != full_id => {
                let existing = existing.clone();
                self.alias_conflicts
                    .entry(alias.to_owned())
                    .or_insert_with(|| vec![existing.clone()])
                    .push(full_id.to_owned());
                info!(
                    "Duplicate alias '{alias}': {full_id} conflicts with {existing}. \
                     {full_id} will use full_id for endpoint path."
                );
                false
            }
            Some(_) => true,
            None => {
                self.aliases.insert(alias.to_owned(), full_id.to_owned());
                true
            }
        }
    }

    /// Look up a site by id, alias, or full id within a plugin type.
    ///
    /// # Errors
    ///
    /// Returns a non-leaking error when the site cannot be resolved; tenant
    /// names are never enumerated in error messages.
    pub fn get_site_config(&self, plugin_type: &str, site: &str) -> AppResult<&SiteConfig> {
        // Exact (plugin_type, site) lookup
        let full_id = format!("{plugin_type}_{site}");
        if let Some(config) = self.sites.get(&full_id) {
            return Ok(config);
        }

        // Alias table resolution, constrained to the requested plugin type
        for candidate in [site.to_owned(), full_id] {
            if let Some(resolved) = self.aliases.get(&candidate) {
                if let Some(config) = self.sites.get(resolved) {
                    if config.plugin_type == plugin_type {
                        return Ok(config);
                    }
                }
            }
        }

        debug!(
            "Site '{site}' not found for {plugin_type}. Total configured sites: {}",
            self.count_for_type(plugin_type)
        );
        Err(AppError::not_found(format!(
            "Site '{site}' is not configured for {plugin_type}. \
             Please verify the site alias/ID and check environment variables"
        )))
    }

    /// All addressable identifiers (ids and owned aliases) for a plugin
    /// type, deduplicated and sorted.
    #[must_use]
    pub fn list_sites(&self, plugin_type: &str) -> Vec<String> {
        let mut identifiers = BTreeSet::new();
        for config in self.sites_of_type(plugin_type) {
            identifiers.insert(config.site_id.clone());
            if let Some(ref alias) = config.alias {
                // Only aliases this site actually owns are addressable
                if self.aliases.get(alias) == Some(&config.full_id()) {
                    identifiers.insert(alias.clone());
                }
            }
        }
        identifiers.into_iter().collect()
    }

    /// All site configurations for a plugin type
    pub fn sites_of_type<'a>(
        &'a self,
        plugin_type: &'a str,
    ) -> impl Iterator<Item = &'a SiteConfig> + 'a {
        self.sites
            .values()
            .filter(move |c| c.plugin_type == plugin_type)
    }

    /// Whether any site is configured for the plugin type
    #[must_use]
    pub fn has_sites(&self, plugin_type: &str) -> bool {
        self.sites_of_type(plugin_type).next().is_some()
    }

    fn count_for_type(&self, plugin_type: &str) -> usize {
        self.sites_of_type(plugin_type).count()
    }

    /// Distinct-site counts per plugin type (aliases never double-count)
    #[must_use]
    pub fn get_count_by_type(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for config in self.sites.values() {
            *counts.entry(config.plugin_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// All sites across plugin types
    #[must_use]
    pub fn all_sites(&self) -> Vec<&SiteConfig> {
        let mut sites: Vec<&SiteConfig> = self.sites.values().collect();
        sites.sort_by(|a, b| a.full_id().cmp(&b.full_id()));
        sites
    }

    /// Total number of sites
    #[must_use]
    pub fn count(&self) -> usize {
        self.sites.len()
    }

    /// Effective endpoint path suffix for a site: its alias when this site
    /// owns the alias, otherwise its `full_id`.
    #[must_use]
    pub fn get_effective_path_suffix(&self, full_id: &str) -> String {
        let Some(config) = self.sites.get(full_id) else {
            return full_id.to_owned();
        };
        match config.alias {
            Some(ref alias) if self.aliases.get(alias).map(String::as_str) == Some(full_id) => {
                alias.clone()
            }
            _ => full_id.to_owned(),
        }
    }

    /// The alias conflict table: alias -> full_ids that wanted it
    #[must_use]
    pub fn get_alias_conflicts(&self) -> &HashMap<String, Vec<String>> {
        &self.alias_conflicts
    }

    /// Resolve an alias (or id) to a full id, if claimed
    #[must_use]
    pub fn resolve_alias(&self, alias: &str) -> Option<&String> {
        self.aliases.get(alias)
    }
}

fn load_site_settings(
    vars: &[(String, String)],
    plugin_type: &str,
    site_id: &str,
) -> Option<HashMap<String, String>> {
    let prefix = format!(
        "{}_{}_",
        plugin_type.to_uppercase(),
        site_id.to_uppercase()
    );

    let mut settings = HashMap::new();
    for (env_key, env_value) in vars {
        if let Some(config_key) = env_key.strip_prefix(&prefix) {
            settings.insert(config_key.to_lowercase(), env_value.clone());
        }
    }

    if settings.is_empty() {
        return None;
    }

    debug!(
        "Loaded config for {plugin_type}/{site_id}: {:?}",
        settings.keys().collect::<Vec<_>>()
    );
    Some(settings)
}
