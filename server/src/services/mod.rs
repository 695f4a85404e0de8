/// Business logic services
///
/// Handlers stay thin; these modules own OAuth flows, publishing with
/// retries, and AI content generation.
pub mod generation;
pub mod oauth;
pub mod providers;
pub mod publisher;

use std::collections::HashMap;
use std::sync::Arc;

use connectors::{
    Connector, FacebookClient, InstagramClient, LinkedInClient, PinterestClient, ThreadsClient,
    TikTokClient, TwitterClient,
};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Platform;

/// Platform -> API client, built once at startup from configured
/// credentials. Platforms without credentials are simply absent.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<Platform, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        let oauth = &config.oauth;

        if oauth.facebook.is_configured() {
            registry.insert(
                Platform::Facebook,
                Arc::new(FacebookClient::new(
                    &oauth.facebook.client_id,
                    &oauth.facebook.client_secret,
                )),
            );
        }
        if oauth.instagram.is_configured() {
            registry.insert(
                Platform::Instagram,
                Arc::new(InstagramClient::new(
                    &oauth.instagram.client_id,
                    &oauth.instagram.client_secret,
                )),
            );
        }
        if oauth.linkedin.is_configured() {
            registry.insert(
                Platform::Linkedin,
                Arc::new(LinkedInClient::new(
                    &oauth.linkedin.client_id,
                    &oauth.linkedin.client_secret,
                )),
            );
        }
        if oauth.twitter.is_configured() {
            registry.insert(
                Platform::Twitter,
                Arc::new(TwitterClient::new(
                    &oauth.twitter.client_id,
                    &oauth.twitter.client_secret,
                )),
            );
        }
        if oauth.tiktok.is_configured() {
            registry.insert(
                Platform::Tiktok,
                Arc::new(TikTokClient::new(
                    &oauth.tiktok.client_id,
                    &oauth.tiktok.client_secret,
                )),
            );
        }
        if oauth.threads.is_configured() {
            registry.insert(
                Platform::Threads,
                Arc::new(ThreadsClient::new(
                    &oauth.threads.client_id,
                    &oauth.threads.client_secret,
                )),
            );
        }
        if oauth.pinterest.is_configured() {
            registry.insert(
                Platform::Pinterest,
                Arc::new(PinterestClient::new(
                    &oauth.pinterest.client_id,
                    &oauth.pinterest.client_secret,
                )),
            );
        }

        registry
    }

    pub fn insert(&mut self, platform: Platform, connector: Arc<dyn Connector>) {
        self.connectors.insert(platform, connector);
    }

    pub fn get(&self, platform: Platform) -> Result<&Arc<dyn Connector>> {
        self.connectors.get(&platform).ok_or_else(|| {
            AppError::BadRequest(format!("{} is not configured", platform.as_str()))
        })
    }

    pub fn configured_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.connectors.contains_key(p))
            .collect()
    }
}
