//! Text panels the match writes its announcements and scoreboard to

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::ws::protocol::ServerMsg;

/// A plain-text display, overwritten wholesale on every update
pub trait TextSink: Send {
    fn set_text(&mut self, text: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    /// Transient round/result announcements
    Message,
    /// Persistent scoreboard
    Score,
}

/// One panel of the board. Keeps the latest text for late readers and
/// pushes every overwrite to spectators.
#[derive(Clone)]
pub struct DisplayPanel {
    kind: PanelKind,
    text: Arc<RwLock<String>>,
    feed_tx: broadcast::Sender<ServerMsg>,
}

impl DisplayPanel {
    pub fn text(&self) -> String {
        self.text.read().clone()
    }
}

impl TextSink for DisplayPanel {
    fn set_text(&mut self, text: String) {
        *self.text.write() = text.clone();

        let msg = match self.kind {
            PanelKind::Message => ServerMsg::Message { text },
            PanelKind::Score => ServerMsg::Score { text },
        };
        // No spectators is fine
        let _ = self.feed_tx.send(msg);
    }
}

/// The message and score panels plus the spectator feed they publish to
#[derive(Clone)]
pub struct DisplayBoard {
    message: DisplayPanel,
    score: DisplayPanel,
    feed_tx: broadcast::Sender<ServerMsg>,
}

impl DisplayBoard {
    pub fn new(feed_capacity: usize) -> Self {
        let (feed_tx, _) = broadcast::channel(feed_capacity);
        let panel = |kind| DisplayPanel {
            kind,
            text: Arc::new(RwLock::new(String::new())),
            feed_tx: feed_tx.clone(),
        };

        Self {
            message: panel(PanelKind::Message),
            score: panel(PanelKind::Score),
            feed_tx,
        }
    }

    pub fn message_panel(&self) -> DisplayPanel {
        self.message.clone()
    }

    pub fn score_panel(&self) -> DisplayPanel {
        self.score.clone()
    }

    pub fn message_text(&self) -> String {
        self.message.text()
    }

    pub fn score_text(&self) -> String {
        self.score.text()
    }

    pub fn feed(&self) -> broadcast::Sender<ServerMsg> {
        self.feed_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.feed_tx.subscribe()
    }
}

impl Default for DisplayBoard {
    fn default() -> Self {
        Self::new(64)
    }
}
