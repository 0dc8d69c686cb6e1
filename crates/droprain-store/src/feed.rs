//! Realtime change feed.
//!
//! Every write the backend accepts is published as a [`ChangeEvent`].  A
//! [`Subscription`] is one client's filtered view of that stream: a single
//! table, a set of change kinds and, usually, a single room.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use droprain_shared::RoomId;

use crate::models::{GameSession, Participant, Room};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rooms,
    RoomParticipants,
    GameSessions,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rooms => "rooms",
            Self::RoomParticipants => "room_participants",
            Self::GameSessions => "game_sessions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// The row a change refers to: the new row for inserts and updates, the
/// old row for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum ChangeRow {
    Room(Room),
    Participant(Participant),
    Session(GameSession),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub row: ChangeRow,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, row: ChangeRow) -> Self {
        Self { kind, row }
    }

    pub fn table(&self) -> Table {
        match self.row {
            ChangeRow::Room(_) => Table::Rooms,
            ChangeRow::Participant(_) => Table::RoomParticipants,
            ChangeRow::Session(_) => Table::GameSessions,
        }
    }

    /// Room the changed row belongs to.  Standalone sessions have none.
    pub fn room_id(&self) -> Option<RoomId> {
        match &self.row {
            ChangeRow::Room(room) => Some(room.id),
            ChangeRow::Participant(p) => Some(p.room_id),
            ChangeRow::Session(s) => s.room_id,
        }
    }
}

/// Which events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    pub table: Table,
    pub kinds: Vec<ChangeKind>,
    /// `None` receives events for every room.
    pub room_id: Option<RoomId>,
}

impl FeedFilter {
    pub fn new(table: Table, kinds: &[ChangeKind]) -> Self {
        Self {
            table,
            kinds: kinds.to_vec(),
            room_id: None,
        }
    }

    pub fn for_room(mut self, room: RoomId) -> Self {
        self.room_id = Some(room);
        self
    }

    /// Per-room channel name, e.g. `rooms:<uuid>`.
    pub fn topic(&self) -> String {
        match self.room_id {
            Some(room) => room.to_topic(self.table.as_str()),
            None => self.table.as_str().to_string(),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table() == self.table
            && self.kinds.contains(&event.kind)
            && self.room_id.map_or(true, |room| event.room_id() == Some(room))
    }
}

/// A filtered receiver on the change feed.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: FeedFilter,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>, filter: FeedFilter) -> Self {
        tracing::debug!(topic = %filter.topic(), "subscribed to change feed");
        Self { rx, filter }
    }

    pub fn topic(&self) -> String {
        self.filter.topic()
    }

    /// Wait for the next matching event.  Returns `None` once the feed is
    /// closed.  Events dropped because this receiver fell behind are logged
    /// and skipped; pollers pick up whatever was missed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.filter.topic(), skipped, "change feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use droprain_shared::UserId;
    use uuid::Uuid;

    fn participant(room: RoomId) -> ChangeRow {
        ChangeRow::Participant(Participant {
            id: Uuid::new_v4(),
            room_id: room,
            user_id: UserId::new(),
            nickname: None,
            joined_at: Utc::now(),
        })
    }

    #[test]
    fn filter_checks_table_kind_and_room() {
        let room = RoomId::new();
        let filter = FeedFilter::new(
            Table::RoomParticipants,
            &[ChangeKind::Insert, ChangeKind::Delete],
        )
        .for_room(room);

        assert!(filter.matches(&ChangeEvent::new(ChangeKind::Insert, participant(room))));
        assert!(!filter.matches(&ChangeEvent::new(ChangeKind::Update, participant(room))));
        assert!(!filter.matches(&ChangeEvent::new(
            ChangeKind::Insert,
            participant(RoomId::new())
        )));
        assert_eq!(filter.topic(), room.to_topic("room_participants"));
    }

    #[tokio::test]
    async fn subscription_skips_unmatched_events() {
        let (tx, rx) = broadcast::channel(8);
        let room = RoomId::new();
        let mut sub = Subscription::new(
            rx,
            FeedFilter::new(Table::RoomParticipants, &[ChangeKind::Delete]).for_room(room),
        );

        tx.send(ChangeEvent::new(ChangeKind::Insert, participant(room)))
            .unwrap();
        tx.send(ChangeEvent::new(ChangeKind::Delete, participant(room)))
            .unwrap();
        drop(tx);

        assert_eq!(sub.next().await.map(|e| e.kind), Some(ChangeKind::Delete));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscription_keeps_going() {
        let (tx, rx) = broadcast::channel(2);
        let room = RoomId::new();
        let mut sub = Subscription::new(
            rx,
            FeedFilter::new(Table::RoomParticipants, &[ChangeKind::Insert]).for_room(room),
        );

        for _ in 0..5 {
            tx.send(ChangeEvent::new(ChangeKind::Insert, participant(room)))
                .unwrap();
        }

        assert!(sub.next().await.is_some());
    }
}
