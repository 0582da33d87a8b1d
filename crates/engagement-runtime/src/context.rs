//! # Application Context
//!
//! Every service handle, built once at startup and passed to the gateway and
//! the delivery task. Nothing is held in global state.
//!
//! ## Initialization Order
//!
//! 1. Message bus and notification dispatcher
//! 2. Topic catalogue (topics and push subscriptions)
//! 3. Store, repository and lifecycle engine
//! 4. Default nudge manager and feed aggregator
//! 5. Outbound adapters and topic router

use crate::config::EngagementConfig;
use anyhow::{Context, Result};
use en_01_lifecycle::{
    FeedRepository, InMemoryElementStore, LifecycleApi, LifecycleService, SystemTimeSource,
    TimeSource,
};
use en_02_default_nudges::DefaultNudgeManager;
use en_03_feed_aggregator::FeedAggregator;
use en_04_topic_router::{
    FcmNotifier, HandlerDeps, HandlerRegistry, InsecurePushVerifier, JwtPushVerifier,
    LoggingMailService, LoggingPushService, PushVerifier, StaticDeviceTokens, TopicRouter,
};
use en_05_api_gateway::{ApiGatewayService, AppState};
use shared_bus::{InMemoryMessageBus, NotificationDispatcher, TopicNamespace};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppContext {
    pub config: EngagementConfig,
    pub bus: Arc<InMemoryMessageBus>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub repo: FeedRepository,
    pub lifecycle: Arc<LifecycleService>,
    pub default_nudges: Arc<DefaultNudgeManager>,
    pub feeds: Arc<FeedAggregator>,
    pub topic_router: Arc<TopicRouter>,
    pub push: Arc<LoggingPushService>,
    pub mail: Arc<LoggingMailService>,
    pub device_tokens: Arc<StaticDeviceTokens>,
}

fn push_verifier(config: &EngagementConfig) -> Arc<dyn PushVerifier> {
    match &config.push_auth {
        Some(auth) => Arc::new(JwtPushVerifier::hs256(
            auth.secret.as_bytes(),
            &auth.audience,
            &auth.issuers,
            &auth.allowed_emails,
        )),
        None => {
            warn!("Push authentication disabled: every webhook caller is accepted");
            Arc::new(InsecurePushVerifier::new())
        }
    }
}

impl AppContext {
    /// Builds every component and ensures the topic catalogue.
    pub async fn build(config: EngagementConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let bus = Arc::new(InMemoryMessageBus::new());
        let namespace = TopicNamespace::new(config.environment.clone());
        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                bus.clone(),
                namespace.clone(),
                config.callback_url.clone(),
                config.publish_timeout,
            )
            .context("Failed to create notification dispatcher")?,
        );
        dispatcher
            .ensure_catalogue()
            .await
            .context("Failed to ensure topic catalogue")?;

        let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let repo = FeedRepository::new(Arc::new(InMemoryElementStore::new()));
        let lifecycle = Arc::new(LifecycleService::new(
            repo.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        let default_nudges = Arc::new(DefaultNudgeManager::new(
            lifecycle.clone(),
            repo.clone(),
            clock.clone(),
        ));
        let feeds = Arc::new(FeedAggregator::new(
            repo.clone(),
            lifecycle.clone(),
            default_nudges.clone(),
            clock,
        ));

        let push = Arc::new(LoggingPushService::new());
        let mail = Arc::new(LoggingMailService::new());
        let device_tokens = Arc::new(StaticDeviceTokens::new());
        let deps = HandlerDeps {
            repo: repo.clone(),
            feeds: feeds.clone(),
            fcm: FcmNotifier::new(push.clone(), device_tokens.clone()),
            mail: mail.clone(),
        };
        let registry = HandlerRegistry::standard(deps);
        let topic_router = Arc::new(
            TopicRouter::new(namespace, push_verifier(&config), registry)
                .with_delivery_timeout(config.delivery_timeout),
        );

        info!(
            environment = %config.environment,
            push_auth = config.push_auth_enabled(),
            local_delivery = config.local_delivery,
            "Application context ready"
        );

        Ok(Self {
            config,
            bus,
            dispatcher,
            repo,
            lifecycle,
            default_nudges,
            feeds,
            topic_router,
            push,
            mail,
            device_tokens,
        })
    }

    pub fn app_state(&self) -> AppState {
        let lifecycle: Arc<dyn LifecycleApi> = self.lifecycle.clone();
        AppState {
            lifecycle,
            feeds: self.feeds.clone(),
            default_nudges: self.default_nudges.clone(),
            topic_router: self.topic_router.clone(),
        }
    }

    pub fn gateway(&self) -> Result<ApiGatewayService> {
        ApiGatewayService::new(self.config.gateway.clone(), self.app_state())
            .context("Failed to create API gateway")
    }
}
