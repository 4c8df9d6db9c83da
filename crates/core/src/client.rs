//! Public async facade over a lazily constructed session service.
//!
//! A [`Client`] and all of its clones share one [`SessionService`]. The
//! service is built on first use by awaiting the [`SessionConnector`];
//! concurrent first callers all await the same construction, and the
//! connector runs exactly once. Separate clients connected to the same
//! handle also end up on the same service.
//!
//! Facade calls never return errors. Precondition and transport failures are
//! broadcast as `SendFailed` events to every open [`EventStream`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use pairlink_protocol::single_entry;
use pairlink_runtime::{EventStream, SessionHandle, SessionService};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

static GLOBAL: OnceLock<Client> = OnceLock::new();

/// Produces the platform session handle when the service is first needed.
#[async_trait]
pub trait SessionConnector: Send + Sync {
	async fn connect(&self) -> Arc<dyn SessionHandle>;
}

#[async_trait]
impl<H> SessionConnector for Arc<H>
where
	H: SessionHandle + 'static,
{
	async fn connect(&self) -> Arc<dyn SessionHandle> {
		Arc::clone(self) as Arc<dyn SessionHandle>
	}
}

struct ClientInner {
	connector: Box<dyn SessionConnector>,
	config: ClientConfig,
	service: OnceCell<Arc<SessionService>>,
}

/// Cheaply cloneable handle to the shared session.
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

impl Client {
	pub fn new(connector: impl SessionConnector + 'static) -> Self {
		Self::with_config(connector, ClientConfig::default())
	}

	pub fn with_config(connector: impl SessionConnector + 'static, config: ClientConfig) -> Self {
		Self {
			inner: Arc::new(ClientInner {
				connector: Box::new(connector),
				config,
				service: OnceCell::new(),
			}),
		}
	}

	/// Installs `client` as the process-wide client.
	///
	/// Fails if one is already installed; the existing client stays in place.
	pub fn install_global(client: Client) -> Result<()> {
		GLOBAL.set(client).map_err(|_| Error::GlobalAlreadyInstalled)?;
		info!(target: "pairlink.client", "global client installed");
		Ok(())
	}

	pub fn global() -> Option<&'static Client> {
		GLOBAL.get()
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Whether the shared service has been constructed yet.
	pub fn is_connected(&self) -> bool {
		self.inner.service.initialized()
	}

	/// The shared service, constructing it on first call.
	pub async fn service(&self) -> Arc<SessionService> {
		let service = self.inner.service.get_or_init(|| self.connect()).await;
		Arc::clone(service)
	}

	async fn connect(&self) -> Arc<SessionService> {
		let handle = self.inner.connector.connect().await;
		let service = SessionService::new(handle, self.inner.config.session.clone());
		if service.config() != &self.inner.config.session {
			warn!(
				target: "pairlink.client",
				requested = ?self.inner.config.session,
				active = ?service.config(),
				"handle already has a live session service, keeping its config"
			);
		}
		info!(
			target: "pairlink.client",
			state = %service.activation_state(),
			reachable = service.is_reachable(),
			activate_on_connect = self.inner.config.activate_on_connect,
			"session service constructed"
		);

		if self.inner.config.activate_on_connect {
			service.activate();
		}
		service
	}

	/// Requests session activation. No-op when already activated.
	pub async fn activate(&self) {
		self.service().await.activate();
	}

	/// Sends `payload` under `key` for immediate delivery.
	pub async fn send_message(&self, key: impl Into<String>, payload: impl Into<Vec<u8>>) {
		self.service().await.send_message(single_entry(key, payload));
	}

	/// Queues `payload` under `key` for guaranteed delivery.
	pub async fn transfer_user_info(&self, key: impl Into<String>, payload: impl Into<Vec<u8>>) {
		self.service().await.transfer_user_info(single_entry(key, payload));
	}

	/// Replaces the application context with a single `key` entry.
	pub async fn update_application_context(&self, key: impl Into<String>, payload: impl Into<Vec<u8>>) {
		self.service().await.update_application_context(single_entry(key, payload));
	}

	/// Opens a new independent event stream.
	pub async fn subscribe(&self) -> EventStream {
		self.service().await.subscribe()
	}
}

impl fmt::Debug for Client {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Client")
			.field("config", &self.inner.config)
			.field("connected", &self.is_connected())
			.finish()
	}
}
