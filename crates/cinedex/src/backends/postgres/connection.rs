use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// 💓 "Are you still there?": asked before every single query.
#[async_trait]
pub(super) trait Liveness: Send {
    async fn is_alive(&mut self) -> bool;
}

/// 🔌 Knows how to open a fresh connection. Nothing more.
#[async_trait]
pub(super) trait Connector: std::fmt::Debug + Send + Sync {
    type Connection: Liveness;

    async fn connect(&self) -> Result<Self::Connection>;
}

/// 🔁 A single lazily (re)established connection.
///
/// [`ReconnectingConnection::live`] pings the current connection first. A dead or
/// missing connection is replaced through the connector under the retry policy, so a
/// database restart between two polls costs a warning in the log and nothing else.
pub(super) struct ReconnectingConnection<C: Connector> {
    connector: C,
    connection: Option<C::Connection>,
    retry: RetryPolicy,
    reconnects: u64,
}

impl<C> std::fmt::Debug for ReconnectingConnection<C>
where
    C: Connector,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingConnection")
            .field("connector", &self.connector)
            .field("connected", &self.connection.is_some())
            .field("reconnects", &self.reconnects)
            .finish()
    }
}

impl<C: Connector> ReconnectingConnection<C> {
    pub(super) fn new(connector: C, retry: RetryPolicy) -> Self {
        Self {
            connector,
            connection: None,
            retry,
            reconnects: 0,
        }
    }

    /// How many times a connection had to be (re)built. The first connect counts.
    #[cfg(test)]
    pub(super) fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// 🩺 Hand out a connection that just answered a ping.
    pub(super) async fn live(&mut self) -> Result<&mut C::Connection> {
        let alive = match self.connection.as_mut() {
            Some(connection) => connection.is_alive().await,
            None => false,
        };

        if !alive {
            if self.connection.take().is_some() {
                warn!("🐘 Database connection went quiet. Dropping it and dialing again.");
            }
            let retry = self.retry;
            let fresh = retry
                .run("connect to the content database", &mut self.connector, |connector| {
                    connector.connect()
                })
                .await?;
            self.reconnects += 1;
            info!("🐘 Connected to the content database (connection #{})", self.reconnects);
            self.connection = Some(fresh);
        }

        self.connection
            .as_mut()
            .context("💀 A connection was established and then vanished before we could use it. Spooky.")
    }
}

/// 🐘 The real thing: `PgConnection::connect_with`, bounded by a timeout.
pub(super) struct PgConnector {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl std::fmt::Debug for PgConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🔒 the options carry the password. the logs do not need the password.
        f.debug_struct("PgConnector")
            .field("host", &self.options.get_host())
            .field("port", &self.options.get_port())
            .field("database", &self.options.get_database())
            .finish()
    }
}

impl PgConnector {
    pub(super) fn new(options: PgConnectOptions, connect_timeout: Duration) -> Self {
        Self {
            options,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection> {
        debug!(
            "🔌 Dialing postgres at {}:{}",
            self.options.get_host(),
            self.options.get_port()
        );
        tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .context(format!(
                "💀 Postgres did not pick up within {:?}. We let it ring. Nobody answered.",
                self.connect_timeout
            ))?
            .context("💀 Postgres refused the connection. Check host, port, credentials, and whether the database is even awake.")
    }
}

#[async_trait]
impl Liveness for PgConnection {
    async fn is_alive(&mut self) -> bool {
        self.ping().await.is_ok()
    }
}
