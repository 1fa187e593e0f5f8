//! Broadcast Channel
//!
//! Named groups of live connections, one group per ticker, with best-effort
//! fan-out of price updates.
//!
//! # Architecture
//!
//! ```text
//! publish(ABC) --> broadcast::Sender<PriceUpdate> (group ABC)
//!                      |            |
//!                  forwarder    forwarder        one task per (connection, group)
//!                      |            |
//!                  mpsc queue   mpsc queue       one bounded queue per connection
//!                      |            |
//!                  transport    transport
//! ```
//!
//! Publishing never awaits a member. A member that falls more than the group
//! capacity behind skips the oldest updates; the loss is logged and counted.
//! Updates of one ticker reach each member in publish order. A group is
//! dropped as soon as its last forwarder exits.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::UpdatePublisher;
use crate::domain::pricing::PriceUpdate;
use crate::domain::ticker::Ticker;
use crate::infrastructure::config::BroadcastSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Types
// =============================================================================

/// Transport-assigned identifier of a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Broadcast channel error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The connection was never connected or has disconnected.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The connection already belongs to the maximum number of groups.
    #[error("connection {connection} already joined {limit} groups")]
    TooManyGroups {
        /// Rejected connection.
        connection: ConnectionId,
        /// Per-connection group limit.
        limit: usize,
    },
}

/// Queue capacities and membership limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Outbound queue capacity of each connection.
    pub connection_buffer: usize,
    /// Capacity of each group's broadcast channel.
    pub group_capacity: usize,
    /// Groups a single connection may join.
    pub max_groups_per_connection: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        BroadcastSettings::default().into()
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            connection_buffer: settings.connection_buffer.max(1),
            group_capacity: settings.group_capacity.max(1),
            max_groups_per_connection: settings.max_groups_per_connection.max(1),
        }
    }
}

/// Point-in-time channel counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BroadcastStats {
    /// Live connections.
    pub connections: usize,
    /// Groups with at least one running forwarder.
    pub groups: usize,
    /// Group memberships with a running forwarder.
    pub memberships: usize,
}

type Groups = RwLock<HashMap<Ticker, broadcast::Sender<PriceUpdate>>>;

struct Connection {
    outbound: mpsc::Sender<PriceUpdate>,
    groups: HashSet<Ticker>,
    cancel: CancellationToken,
}

// =============================================================================
// Broadcast Channel
// =============================================================================

/// Registry of connections and ticker groups.
///
/// `join` spawns a forwarding task and therefore must run inside a Tokio
/// runtime.
///
/// # Example
///
/// ```rust
/// use stock_feed::domain::pricing::PriceUpdate;
/// use stock_feed::domain::ticker::Ticker;
/// use stock_feed::infrastructure::broadcast::{BroadcastChannel, BroadcastConfig, ConnectionId};
/// use rust_decimal_macros::dec;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let channel = BroadcastChannel::new(BroadcastConfig::default());
/// let id = ConnectionId::new("c1");
/// let mut updates = channel.connect(id.clone());
///
/// let abc = Ticker::new("ABC");
/// channel.join(&id, &abc).unwrap();
/// assert_eq!(channel.publish(&abc, PriceUpdate::new(abc.clone(), dec!(1.00))), 1);
///
/// assert_eq!(updates.recv().await.unwrap().price, dec!(1.00));
/// # }
/// ```
pub struct BroadcastChannel {
    config: BroadcastConfig,
    groups: Arc<Groups>,
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl BroadcastChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            groups: Arc::new(RwLock::new(HashMap::new())),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a live connection and return its outbound queue.
    ///
    /// Connecting an id that is already live replaces the old handle; the old
    /// queue closes and its memberships are dropped.
    pub fn connect(&self, id: ConnectionId) -> mpsc::Receiver<PriceUpdate> {
        let (outbound, receiver) = mpsc::channel(self.config.connection_buffer);
        let connection = Connection {
            outbound,
            groups: HashSet::new(),
            cancel: CancellationToken::new(),
        };

        let mut connections = self.connections.write();
        if let Some(previous) = connections.insert(id.clone(), connection) {
            previous.cancel.cancel();
            debug!(connection = %id, "Replaced existing connection");
        }
        metrics::set_connections(connections.len());
        drop(connections);

        debug!(connection = %id, "Connection registered");
        receiver
    }

    /// Add a connection to the group of `ticker`. Idempotent.
    ///
    /// Fails once the connection belongs to `max_groups_per_connection`
    /// groups.
    pub fn join(&self, id: &ConnectionId, ticker: &Ticker) -> Result<(), BroadcastError> {
        let mut connections = self.connections.write();
        let connection = connections
            .get_mut(id)
            .ok_or_else(|| BroadcastError::UnknownConnection(id.clone()))?;

        if connection.groups.contains(ticker) {
            return Ok(());
        }
        if connection.groups.len() >= self.config.max_groups_per_connection {
            return Err(BroadcastError::TooManyGroups {
                connection: id.clone(),
                limit: self.config.max_groups_per_connection,
            });
        }
        connection.groups.insert(ticker.clone());

        // Subscribe before returning so a publish right after join is seen
        let group = self.subscribe(ticker);
        tokio::spawn(forward(
            group,
            Arc::clone(&self.groups),
            connection.outbound.clone(),
            connection.cancel.clone(),
            id.clone(),
            ticker.clone(),
        ));

        info!(connection = %id, ticker = %ticker, "Connection joined group");
        Ok(())
    }

    /// Deliver an update to every member of the group of `ticker`.
    ///
    /// Returns the number of members it was handed to.
    pub fn publish(&self, ticker: &Ticker, update: PriceUpdate) -> usize {
        let sender = self.groups.read().get(ticker).cloned();

        // No members is not an error
        sender.map_or(0, |sender| sender.send(update).unwrap_or(0))
    }

    /// Forget a connection. Its forwarders end and its queue closes.
    ///
    /// Returns `false` if the connection was not registered.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let mut connections = self.connections.write();
        let removed = connections.remove(id);
        metrics::set_connections(connections.len());
        drop(connections);

        removed.is_some_and(|connection| {
            connection.cancel.cancel();
            debug!(connection = %id, groups = connection.groups.len(), "Connection removed");
            true
        })
    }

    /// Groups a connection has joined.
    #[must_use]
    pub fn groups_of(&self, id: &ConnectionId) -> Vec<Ticker> {
        self.connections
            .read()
            .get(id)
            .map(|connection| connection.groups.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Current counts.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        let connections = self.connections.read().len();
        let groups = self.groups.read();

        BroadcastStats {
            connections,
            groups: groups.len(),
            memberships: groups.values().map(broadcast::Sender::receiver_count).sum(),
        }
    }

    fn subscribe(&self, ticker: &Ticker) -> broadcast::Receiver<PriceUpdate> {
        if let Some(sender) = self.groups.read().get(ticker) {
            return sender.subscribe();
        }

        self.groups
            .write()
            .entry(ticker.clone())
            .or_insert_with(|| broadcast::channel(self.config.group_capacity).0)
            .subscribe()
    }
}

impl UpdatePublisher for BroadcastChannel {
    fn publish(&self, ticker: &Ticker, update: PriceUpdate) -> usize {
        Self::publish(self, ticker, update)
    }
}

/// Move updates of one group into one connection's queue until either side
/// goes away, then drop the group if it has no members left.
async fn forward(
    mut group: broadcast::Receiver<PriceUpdate>,
    groups: Arc<Groups>,
    outbound: mpsc::Sender<PriceUpdate>,
    cancel: CancellationToken,
    connection: ConnectionId,
    ticker: Ticker,
) {
    loop {
        let update = tokio::select! {
            () = cancel.cancelled() => break,
            received = group.recv() => match received {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        connection = %connection,
                        ticker = %ticker,
                        skipped,
                        "Connection lagging, dropped price updates"
                    );
                    metrics::record_deliveries_dropped(skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            sent = outbound.send(update) => {
                if sent.is_err() {
                    // Transport dropped its receiver
                    break;
                }
            }
        }
    }

    drop(group);
    prune_group(&groups, &ticker);
    debug!(connection = %connection, ticker = %ticker, "Forwarder stopped");
}

/// Remove the group of `ticker` if nobody subscribes to it.
///
/// The count is checked under the write lock; `subscribe` increments it
/// under a lock too, so a concurrent join keeps the group alive.
fn prune_group(groups: &Groups, ticker: &Ticker) {
    let mut groups = groups.write();
    if groups
        .get(ticker)
        .is_some_and(|sender| sender.receiver_count() == 0)
    {
        groups.remove(ticker);
        debug!(ticker = %ticker, "Removed empty group");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use tokio::time::timeout;

    use super::*;

    fn update(ticker: &str, price: rust_decimal::Decimal) -> PriceUpdate {
        PriceUpdate::new(Ticker::new(ticker), price)
    }

    #[tokio::test]
    async fn join_unknown_connection_fails() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());

        let result = channel.join(&ConnectionId::new("ghost"), &Ticker::new("ABC"));

        assert_eq!(
            result,
            Err(BroadcastError::UnknownConnection(ConnectionId::new("ghost")))
        );
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let id = ConnectionId::new("c1");
        let mut rx = channel.connect(id.clone());
        let abc = Ticker::new("ABC");

        channel.join(&id, &abc).unwrap();
        channel.join(&id, &abc).unwrap();

        assert_eq!(channel.stats().memberships, 1);
        assert_eq!(channel.publish(&abc, update("ABC", dec!(1))), 1);
        assert!(rx.recv().await.is_some());
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn publish_without_group_delivers_to_nobody() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());

        assert_eq!(channel.publish(&Ticker::new("ABC"), update("ABC", dec!(1))), 0);
    }

    #[tokio::test]
    async fn updates_arrive_in_publish_order() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let id = ConnectionId::new("c1");
        let mut rx = channel.connect(id.clone());
        let abc = Ticker::new("ABC");
        channel.join(&id, &abc).unwrap();

        for cents in 1..=10 {
            channel.publish(&abc, update("ABC", rust_decimal::Decimal::new(cents, 2)));
        }

        for cents in 1..=10 {
            assert_eq!(rx.recv().await.unwrap().price, rust_decimal::Decimal::new(cents, 2));
        }
    }

    #[tokio::test]
    async fn disconnect_closes_queue_and_drops_membership() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let id = ConnectionId::new("c1");
        let mut rx = channel.connect(id.clone());
        let abc = Ticker::new("ABC");
        channel.join(&id, &abc).unwrap();

        assert!(channel.disconnect(&id));
        assert!(!channel.disconnect(&id));

        // Queue closes once the forwarder has released its sender
        assert!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().is_none());
        assert_eq!(channel.stats().connections, 0);
        assert_eq!(channel.stats().memberships, 0);
        assert_eq!(
            channel.join(&id, &abc),
            Err(BroadcastError::UnknownConnection(id))
        );
    }

    #[tokio::test]
    async fn slow_member_lags_without_blocking_others() {
        let channel = BroadcastChannel::new(BroadcastConfig {
            connection_buffer: 1,
            group_capacity: 2,
            ..BroadcastConfig::default()
        });
        let abc = Ticker::new("ABC");
        let slow = ConnectionId::new("slow");
        let fast = ConnectionId::new("fast");
        let mut slow_rx = channel.connect(slow.clone());
        let mut fast_rx = channel.connect(fast.clone());
        channel.join(&slow, &abc).unwrap();
        channel.join(&fast, &abc).unwrap();

        for cents in 1..=20 {
            channel.publish(&abc, update("ABC", rust_decimal::Decimal::new(cents, 2)));
            // The fast member keeps up
            assert_eq!(
                fast_rx.recv().await.unwrap().price,
                rust_decimal::Decimal::new(cents, 2)
            );
        }

        // The slow member skipped the middle of the run but still sees the latest
        let mut seen = Vec::new();
        while let Ok(Some(update)) = timeout(Duration::from_millis(50), slow_rx.recv()).await {
            seen.push(update.price);
        }
        assert!(seen.len() < 20);
        assert_eq!(seen.last(), Some(&dec!(0.20)));
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_handle() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let id = ConnectionId::new("c1");
        let mut first = channel.connect(id.clone());
        channel.join(&id, &Ticker::new("ABC")).unwrap();

        let _second = channel.connect(id.clone());

        assert!(timeout(Duration::from_secs(1), first.recv()).await.unwrap().is_none());
        assert!(channel.groups_of(&id).is_empty());
        assert_eq!(channel.stats().connections, 1);
    }

    async fn wait_for_groups(channel: &BroadcastChannel, expected: usize) {
        timeout(Duration::from_secs(1), async {
            while channel.stats().groups != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn disconnect_of_last_member_removes_groups() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let id = ConnectionId::new("c1");
        let _rx = channel.connect(id.clone());
        let limit = channel.config.max_groups_per_connection;
        for n in 0..limit {
            channel.join(&id, &Ticker::new(format!("T{n}"))).unwrap();
        }
        assert_eq!(channel.stats().groups, limit);

        channel.disconnect(&id);

        wait_for_groups(&channel, 0).await;
        assert_eq!(channel.stats(), BroadcastStats::default());
    }

    #[tokio::test]
    async fn group_survives_while_another_member_remains() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let abc = Ticker::new("ABC");
        let leaving = ConnectionId::new("leaving");
        let staying = ConnectionId::new("staying");
        let _leaving_rx = channel.connect(leaving.clone());
        let mut staying_rx = channel.connect(staying.clone());
        channel.join(&leaving, &abc).unwrap();
        channel.join(&staying, &abc).unwrap();

        channel.disconnect(&leaving);
        timeout(Duration::from_secs(1), async {
            while channel.stats().memberships != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(channel.stats().groups, 1);
        assert_eq!(channel.publish(&abc, update("ABC", dec!(3))), 1);
        assert_eq!(staying_rx.recv().await.unwrap().price, dec!(3));
    }

    #[tokio::test]
    async fn rejoin_after_group_removal_creates_fresh_group() {
        let channel = BroadcastChannel::new(BroadcastConfig::default());
        let abc = Ticker::new("ABC");
        let first = ConnectionId::new("first");
        let _first_rx = channel.connect(first.clone());
        channel.join(&first, &abc).unwrap();
        channel.disconnect(&first);
        wait_for_groups(&channel, 0).await;

        let second = ConnectionId::new("second");
        let mut second_rx = channel.connect(second.clone());
        channel.join(&second, &abc).unwrap();

        assert_eq!(channel.publish(&abc, update("ABC", dec!(4))), 1);
        assert_eq!(second_rx.recv().await.unwrap().price, dec!(4));
    }

    #[tokio::test]
    async fn join_beyond_group_limit_is_rejected() {
        let channel = BroadcastChannel::new(BroadcastConfig {
            max_groups_per_connection: 2,
            ..BroadcastConfig::default()
        });
        let id = ConnectionId::new("c1");
        let _rx = channel.connect(id.clone());
        channel.join(&id, &Ticker::new("AAA")).unwrap();
        channel.join(&id, &Ticker::new("BBB")).unwrap();

        assert_eq!(
            channel.join(&id, &Ticker::new("CCC")),
            Err(BroadcastError::TooManyGroups {
                connection: id.clone(),
                limit: 2,
            })
        );
        // Rejoining a member group is still fine
        assert_eq!(channel.join(&id, &Ticker::new("AAA")), Ok(()));
        assert_eq!(channel.stats().groups, 2);
    }
}
