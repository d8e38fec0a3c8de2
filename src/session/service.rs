//! Session service - runs one match session after another

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::unit::SessionControl;
use crate::game::{DisplayBoard, MatchCollaborators, MatchController, SetupError};
use crate::sim::{SimArena, SimCamera};
use crate::ws::protocol::MatchStatus;

/// Restart hook handed to each match; the service starts the next session
/// once it fires
pub struct RestartRequest {
    session_id: Uuid,
    restart_tx: mpsc::UnboundedSender<Uuid>,
}

impl SessionControl for RestartRequest {
    fn restart_session(&mut self) {
        if self.restart_tx.send(self.session_id).is_err() {
            warn!(session_id = %self.session_id, "Session service gone, restart dropped");
        }
    }
}

/// Counters exposed on the health endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub sessions_completed: u32,
    pub current_session: Option<Uuid>,
    pub last_winner: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Match task failed: {0}")]
    Aborted(#[from] JoinError),
}

/// Session service
pub struct SessionService {
    config: Arc<Config>,
    board: DisplayBoard,
    status_tx: Arc<watch::Sender<Option<MatchStatus>>>,
    stats: RwLock<SessionStats>,
}

impl SessionService {
    pub fn new(
        config: Arc<Config>,
        board: DisplayBoard,
        status_tx: Arc<watch::Sender<Option<MatchStatus>>>,
    ) -> Self {
        Self {
            config,
            board,
            status_tx,
            stats: RwLock::new(SessionStats::default()),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Run sessions until `max_sessions` is reached (forever when 0)
    pub async fn run(&self) -> Result<(), SessionError> {
        let (restart_tx, mut restart_rx) = mpsc::unbounded_channel();

        loop {
            let completed = self.stats.read().sessions_completed;
            if self.config.max_sessions != 0 && completed >= self.config.max_sessions {
                info!(sessions = completed, "Session limit reached");
                return Ok(());
            }

            let session_id = Uuid::new_v4();
            let seed = self
                .config
                .arena_seed
                .map(|seed| seed.wrapping_add(completed as u64))
                .unwrap_or_else(rand::random);

            let mut arena = SimArena::new(self.config.unit_template, seed);
            let collaborators = MatchCollaborators {
                camera: Box::new(SimCamera::new()),
                message: Box::new(self.board.message_panel()),
                score: Box::new(self.board.score_panel()),
                session: Box::new(RestartRequest {
                    session_id,
                    restart_tx: restart_tx.clone(),
                }),
                status_tx: self.status_tx.clone(),
            };

            let mut controller = match MatchController::setup(
                session_id,
                self.config.match_settings.clone(),
                &mut arena,
                collaborators,
            ) {
                Ok(controller) => controller,
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Failed to set up match session");
                    return Err(e.into());
                }
            };

            self.stats.write().current_session = Some(session_id);
            info!(session_id = %session_id, seed, "Session started");

            let arena_task = tokio::spawn(arena.run(self.config.match_settings.tick));
            let match_task = tokio::spawn(async move { controller.run().await });

            let outcome = match_task.await;
            arena_task.abort();
            let outcome = outcome?;

            match restart_rx.try_recv() {
                Ok(id) if id == session_id => {
                    info!(session_id = %session_id, "Session restart requested")
                }
                _ => warn!(session_id = %session_id, "Match ended without requesting a restart"),
            }

            let mut stats = self.stats.write();
            stats.sessions_completed += 1;
            stats.current_session = None;
            stats.last_winner = Some(outcome.winner_label.clone());

            info!(
                session_id = %session_id,
                rounds = outcome.rounds_played,
                winner = outcome.winner,
                "Session finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MatchSettings;
    use crate::sim::UnitTemplate;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn quick_config(max_sessions: u32) -> Config {
        let mut config = assert_ok!(Config::from_lookup(|_| None));
        config.max_sessions = max_sessions;
        config.arena_seed = Some(5);
        config.match_settings = MatchSettings {
            win_threshold: 2,
            start_delay: Duration::from_millis(500),
            end_delay: Duration::from_millis(500),
            ..MatchSettings::default()
        };
        config.unit_template = UnitTemplate {
            max_health: 30.0,
            weapon_damage: 10.0,
            fire_cooldown_secs: 0.1,
            accuracy: 1.0,
        };
        config
    }

    #[tokio::test(start_paused = true)]
    async fn runs_the_configured_number_of_sessions() {
        let board = DisplayBoard::default();
        let (status_tx, status_rx) = watch::channel(None);
        let service = SessionService::new(Arc::new(quick_config(2)), board.clone(), Arc::new(status_tx));

        assert_ok!(service.run().await);

        let stats = service.stats();
        assert_eq!(stats.sessions_completed, 2);
        assert!(stats.current_session.is_none());
        assert!(stats.last_winner.is_some());

        let status = status_rx.borrow().clone().unwrap();
        assert!(status.match_winner.is_some());
        assert!(board.message_text().ends_with("WINS THE GAME!"));
    }

    #[test]
    fn restart_request_reports_its_session() {
        let (restart_tx, mut restart_rx) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        let mut request = RestartRequest {
            session_id,
            restart_tx,
        };

        request.restart_session();
        assert_eq!(assert_ok!(restart_rx.try_recv()), session_id);
    }
}
