//! Client facade
//!
//! [`HearthClient`] is the single entry point front-ends use. It owns the
//! shared resources (configuration, API, notifier) and hands out stores,
//! publishers and live channels wired to them.
//!
//! # Example
//!
//! ```no_run
//! use libhearth::{Action, HearthClient, StreamDescriptor};
//!
//! # async fn example() -> libhearth::Result<()> {
//! let client = HearthClient::new()?;
//! let mut notifications = client.subscribe();
//!
//! let mut store = client.store(StreamDescriptor::tag("rust"));
//! store.dispatch(Action::FetchStream).await?;
//!
//! let (live, mut events) = client.live_channel(&StreamDescriptor::tag("rust"))?.spawn();
//! # live.shutdown().await;
//! # Ok(())
//! # }
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::api::http::HttpApi;
use crate::api::Api;
use crate::config::Config;
use crate::error::{HearthError, Result};
use crate::live::{LiveChannel, LiveSettings};
use crate::notify::{NotificationReceiver, Notifier};
use crate::publisher::Publisher;
use crate::store::Store;
use crate::streams::{StreamDescriptor, StreamName};

/// Main entry point sharing one API and one notifier between every store,
/// publisher and live channel it creates
pub struct HearthClient {
    config: Arc<Config>,
    api: Arc<dyn Api>,
    notifier: Notifier,
    cookie: Option<SecretString>,
}

impl HearthClient {
    /// Create a client from the configuration at the default location
    pub fn new() -> Result<Self> {
        Self::from_config(Config::load()?)
    }

    /// Create a client talking to the configured server
    ///
    /// Reads the session file once; the same cookie authenticates REST
    /// requests and the live channel.
    pub fn from_config(config: Config) -> Result<Self> {
        let cookie = config.server.read_session_cookie()?;
        let api = HttpApi::from_config(&config, cookie.as_ref());
        Ok(Self {
            config: Arc::new(config),
            api: Arc::new(api),
            notifier: Notifier::default(),
            cookie,
        })
    }

    /// Create a client on top of any [`Api`], e.g. a mock in tests
    pub fn with_api(api: Arc<dyn Api>, config: Config) -> Self {
        Self {
            config: Arc::new(config),
            api,
            notifier: Notifier::default(),
            cookie: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> Arc<dyn Api> {
        Arc::clone(&self.api)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Subscribe to user-facing notifications from every component
    pub fn subscribe(&self) -> NotificationReceiver {
        self.notifier.subscribe()
    }

    /// Stream shown when the user does not pick one
    pub fn default_stream(&self) -> Result<StreamDescriptor> {
        let name: StreamName = self
            .config
            .defaults
            .stream
            .parse()
            .map_err(HearthError::InvalidInput)?;
        StreamDescriptor::new(name, None)
    }

    pub fn store(&self, stream: StreamDescriptor) -> Store {
        Store::new(stream, self.api(), self.notifier.clone())
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.api(), self.notifier.clone(), self.config.server.base_url())
    }

    /// Live channel for a stream, not yet connected
    pub fn live_channel(&self, stream: &StreamDescriptor) -> Result<LiveChannel> {
        let settings = LiveSettings::from_config(&self.config.live)?;
        LiveChannel::for_stream(
            &self.config.server.base_url(),
            stream,
            self.cookie
                .as_ref()
                .map(|cookie| SecretString::from(cookie.expose_secret().to_string())),
            settings,
        )
    }
}
