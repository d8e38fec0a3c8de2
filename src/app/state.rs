//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::game::DisplayBoard;
use crate::session::SessionService;
use crate::ws::protocol::MatchStatus;

/// Capacity of the spectator feed
const FEED_CAPACITY: usize = 64;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub board: DisplayBoard,
    pub status_rx: watch::Receiver<Option<MatchStatus>>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Message + score panels, pushed to spectators as they change
        let board = DisplayBoard::new(FEED_CAPACITY);

        // Latest match status, published by whichever session is running
        let (status_tx, status_rx) = watch::channel(None);

        // Session service (Arc for sharing across cloned AppState)
        let sessions = Arc::new(SessionService::new(
            config.clone(),
            board.clone(),
            Arc::new(status_tx),
        ));

        Self {
            config,
            board,
            status_rx,
            sessions,
        }
    }
}
