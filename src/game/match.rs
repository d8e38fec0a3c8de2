//! Match state and the round loop

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{tick_period, SIMULATION_TPS};
use crate::ws::protocol::{MatchStatus, ParticipantStatus};

use super::display::TextSink;
use super::participant::{LabelStyle, ParticipantRecord, ParticipantSlot, SetupError};
use super::unit::{ArenaCamera, Color, SessionControl, SpawnTransform, UnitSpawner, Vec3};

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Units reset and frozen, round announced
    Starting,
    /// Players in control until at most one unit is left
    Playing,
    /// Result announced, scores updated
    Ending,
}

/// Match rules, fixed before the session starts
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Round wins needed to take the match
    pub win_threshold: u32,
    /// Pause after announcing a round
    pub start_delay: Duration,
    /// Pause after announcing a result
    pub end_delay: Duration,
    /// Interval between liveness polls while playing
    pub tick: Duration,
    /// Participants in player order
    pub roster: Vec<ParticipantSlot>,
    pub label_style: LabelStyle,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            win_threshold: 5,
            start_delay: Duration::from_secs(3),
            end_delay: Duration::from_secs(3),
            tick: tick_period(SIMULATION_TPS),
            roster: vec![
                ParticipantSlot {
                    color: Color::rgb(0x2A, 0x64, 0xB3),
                    spawn: SpawnTransform::new(Vec3::new(-30.0, 0.0, 0.0), 90.0),
                },
                ParticipantSlot {
                    color: Color::rgb(0xE5, 0x2E, 0x28),
                    spawn: SpawnTransform::new(Vec3::new(30.0, 0.0, 0.0), 270.0),
                },
            ],
            label_style: LabelStyle::Plain,
        }
    }
}

/// Host-side collaborators the match drives
pub struct MatchCollaborators {
    pub camera: Box<dyn ArenaCamera>,
    /// Round/result announcements
    pub message: Box<dyn TextSink>,
    /// Scoreboard
    pub score: Box<dyn TextSink>,
    pub session: Box<dyn SessionControl>,
    pub status_tx: Arc<watch::Sender<Option<MatchStatus>>>,
}

/// Result of a finished match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub rounds_played: u32,
    pub winner: u32,
    pub winner_label: String,
}

/// Drives one match session: Starting -> Playing -> Ending, round after
/// round, until a participant reaches the win threshold
pub struct MatchController {
    session_id: Uuid,
    settings: MatchSettings,
    participants: Vec<ParticipantRecord>,
    phase: MatchPhase,
    round_number: u32,
    round_winner: Option<usize>,
    match_winner: Option<usize>,
    camera: Box<dyn ArenaCamera>,
    message: Box<dyn TextSink>,
    score: Box<dyn TextSink>,
    session: Box<dyn SessionControl>,
    status_tx: Arc<watch::Sender<Option<MatchStatus>>>,
}

impl MatchController {
    /// Spawn one unit per roster slot, bind them to participant records
    /// numbered 1..=N in roster order, and point the camera at them
    pub fn setup(
        session_id: Uuid,
        settings: MatchSettings,
        spawner: &mut dyn UnitSpawner,
        collaborators: MatchCollaborators,
    ) -> Result<Self, SetupError> {
        if settings.roster.is_empty() {
            return Err(SetupError::EmptyRoster);
        }

        let participants = settings
            .roster
            .iter()
            .zip(1u32..)
            .map(|(slot, player_index)| {
                let unit = spawner.spawn(&slot.spawn);
                ParticipantRecord::setup(slot, unit, player_index, settings.label_style)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let MatchCollaborators {
            mut camera,
            message,
            score,
            session,
            status_tx,
        } = collaborators;

        camera.set_targets(participants.iter().map(|p| p.unit().clone()).collect());

        info!(
            session_id = %session_id,
            players = participants.len(),
            win_threshold = settings.win_threshold,
            "Match session set up"
        );

        Ok(Self {
            session_id,
            settings,
            participants,
            phase: MatchPhase::Starting,
            round_number: 0,
            round_winner: None,
            match_winner: None,
            camera,
            message,
            score,
            session,
            status_tx,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn participants(&self) -> &[ParticipantRecord] {
        &self.participants
    }

    pub fn round_winner(&self) -> Option<&ParticipantRecord> {
        self.round_winner.map(|i| &self.participants[i])
    }

    pub fn match_winner(&self) -> Option<&ParticipantRecord> {
        self.match_winner.map(|i| &self.participants[i])
    }

    /// Play rounds until somebody wins the match, then ask the host to
    /// restart the session
    pub async fn run(&mut self) -> MatchOutcome {
        let winner = loop {
            self.round_starting().await;
            self.round_playing().await;
            self.round_ending().await;

            if let Some(winner) = self.match_winner {
                break winner;
            }
        };

        let winner = &self.participants[winner];
        info!(
            session_id = %self.session_id,
            rounds = self.round_number,
            winner = winner.player_index(),
            "Match decided"
        );

        let outcome = MatchOutcome {
            rounds_played: self.round_number,
            winner: winner.player_index(),
            winner_label: winner.label().to_string(),
        };

        self.session.restart_session();
        outcome
    }

    async fn round_starting(&mut self) {
        self.phase = MatchPhase::Starting;

        for participant in &mut self.participants {
            participant.reset_for_round();
        }
        self.disable_control();
        self.camera.frame_arena();

        self.round_number += 1;
        self.message.set_text(format!("ROUND {}", self.round_number));

        // The scoreboard first appears once the opening round has a number
        if self.round_number == 1 {
            self.refresh_score_panel();
        }

        info!(session_id = %self.session_id, round = self.round_number, "Round starting");
        self.publish_status();

        sleep(self.settings.start_delay).await;
    }

    /// Returns how many ticks the round lasted
    async fn round_playing(&mut self) -> u64 {
        self.phase = MatchPhase::Playing;

        self.enable_control();
        self.message.set_text(String::new());
        self.publish_status();

        let period = self.settings.tick;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ticks = 0;
        while !self.one_unit_left() {
            ticker.tick().await;
            ticks += 1;
        }

        debug!(session_id = %self.session_id, round = self.round_number, ticks, "Round play finished");
        ticks
    }

    async fn round_ending(&mut self) {
        self.phase = MatchPhase::Ending;

        self.disable_control();

        self.round_winner = self.find_round_winner();
        if let Some(winner) = self.round_winner {
            self.participants[winner].record_round_win();
        }
        self.match_winner = self.find_match_winner();

        self.refresh_score_panel();
        let message = self.end_message();
        self.message.set_text(message);

        match self.round_winner() {
            Some(winner) => info!(
                session_id = %self.session_id,
                round = self.round_number,
                player = winner.player_index(),
                wins = winner.wins(),
                "Round won"
            ),
            None => info!(session_id = %self.session_id, round = self.round_number, "Round drawn"),
        }
        self.publish_status();

        sleep(self.settings.end_delay).await;
    }

    fn alive_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_alive()).count()
    }

    fn one_unit_left(&self) -> bool {
        self.alive_count() <= 1
    }

    /// The sole survivor, if there is exactly one
    fn find_round_winner(&self) -> Option<usize> {
        let mut alive = self
            .participants
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_alive())
            .map(|(i, _)| i);

        match (alive.next(), alive.next()) {
            (Some(winner), None) => Some(winner),
            _ => None,
        }
    }

    /// First participant in player order sitting exactly on the threshold
    fn find_match_winner(&self) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.wins() == self.settings.win_threshold)
    }

    fn enable_control(&mut self) {
        for participant in &mut self.participants {
            participant.enable_control();
        }
    }

    fn disable_control(&mut self) {
        for participant in &mut self.participants {
            participant.disable_control();
        }
    }

    fn standings(&self) -> String {
        self.participants
            .iter()
            .map(|p| format!("{}: {} WINS\n", p.label(), p.wins()))
            .collect()
    }

    /// Announcement shown while a round ends.
    ///
    /// The round result and standings are always composed; a decided match
    /// then replaces the whole text.
    pub fn end_message(&self) -> String {
        let mut message = match self.round_winner() {
            Some(winner) => format!("{} WINS THE ROUND!", winner.label()),
            None => "DRAW!".to_string(),
        };

        message.push_str("\n\n\n\n");
        message.push_str(&self.standings());

        if let Some(winner) = self.match_winner() {
            message = format!("{} WINS THE GAME!", winner.label());
        }

        message
    }

    /// Scoreboard text: round number then one line per participant
    pub fn score_panel(&self) -> String {
        format!("ROUND: {}\n{}", self.round_number, self.standings())
    }

    fn refresh_score_panel(&mut self) {
        let text = self.score_panel();
        self.score.set_text(text);
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            session_id: self.session_id(),
            phase: self.phase(),
            round_number: self.round_number(),
            win_threshold: self.settings.win_threshold,
            participants: self
                .participants()
                .iter()
                .map(|p| ParticipantStatus {
                    player_index: p.player_index(),
                    label: p.label().to_string(),
                    color: p.color().to_string(),
                    wins: p.wins(),
                    alive: p.is_alive(),
                    control_enabled: p.control_enabled(),
                })
                .collect(),
            round_winner: self.round_winner().map(|p| p.player_index()),
            match_winner: self.match_winner().map(|p| p.player_index()),
            updated_at: Utc::now(),
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(Some(self.status()));
    }
}

impl fmt::Debug for MatchController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchController")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("round_number", &self.round_number)
            .field("participants", &self.participants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::display::DisplayBoard;
    use crate::game::unit::UnitHandle;
    use crate::sim::unit::SimUnit;
    use crate::sim::{SimArena, SimCamera, UnitTemplate};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    const TICK: Duration = Duration::from_millis(100);

    struct CountRestarts(Arc<AtomicU32>);

    impl SessionControl for CountRestarts {
        fn restart_session(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        controller: MatchController,
        units: Vec<Arc<SimUnit>>,
        board: DisplayBoard,
        restarts: Arc<AtomicU32>,
        status_rx: watch::Receiver<Option<MatchStatus>>,
    }

    fn settings(players: usize, win_threshold: u32) -> MatchSettings {
        let roster = (0..players)
            .map(|i| ParticipantSlot {
                color: Color::rgb(10 * i as u8, 0, 0),
                spawn: SpawnTransform::new(Vec3::new(i as f32 * 10.0, 0.0, 0.0), 0.0),
            })
            .collect();

        MatchSettings {
            win_threshold,
            start_delay: Duration::from_secs(3),
            end_delay: Duration::from_secs(3),
            tick: TICK,
            roster,
            label_style: LabelStyle::Plain,
        }
    }

    fn harness(settings: MatchSettings) -> Harness {
        let mut arena = SimArena::new(UnitTemplate::default(), 9);
        let board = DisplayBoard::default();
        let restarts = Arc::new(AtomicU32::new(0));
        let (status_tx, status_rx) = watch::channel(None);

        let collaborators = MatchCollaborators {
            camera: Box::new(SimCamera::new()),
            message: Box::new(board.message_panel()),
            score: Box::new(board.score_panel()),
            session: Box::new(CountRestarts(restarts.clone())),
            status_tx: Arc::new(status_tx),
        };

        let controller =
            assert_ok!(MatchController::setup(Uuid::new_v4(), settings, &mut arena, collaborators));

        Harness {
            controller,
            units: arena.units(),
            board,
            restarts,
            status_rx,
        }
    }

    #[test]
    fn player_indices_are_one_through_n() {
        for n in 1..=6 {
            let h = harness(settings(n, 5));
            let indices: Vec<u32> = h
                .controller
                .participants()
                .iter()
                .map(|p| p.player_index())
                .collect();
            assert_eq!(indices, (1..=n as u32).collect::<Vec<_>>());

            let numbers: Vec<u32> = h.units.iter().map(|u| u.player_number()).collect();
            assert_eq!(numbers, indices);
        }
    }

    #[test]
    fn empty_roster_is_rejected() {
        let mut arena = SimArena::new(UnitTemplate::default(), 1);
        let (status_tx, _) = watch::channel(None);
        let board = DisplayBoard::default();
        let collaborators = MatchCollaborators {
            camera: Box::new(SimCamera::new()),
            message: Box::new(board.message_panel()),
            score: Box::new(board.score_panel()),
            session: Box::new(CountRestarts(Arc::new(AtomicU32::new(0)))),
            status_tx: Arc::new(status_tx),
        };

        let result = MatchController::setup(Uuid::new_v4(), settings(0, 5), &mut arena, collaborators);
        assert!(matches!(assert_err!(result), SetupError::EmptyRoster));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_resets_units_and_announces_round() {
        let mut h = harness(settings(2, 5));
        h.units[0].place(SpawnTransform::new(Vec3::new(99.0, 0.0, 99.0), 10.0));
        h.units[0].eliminate();

        let started = Instant::now();
        h.controller.round_starting().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(3) + TICK);
        assert_eq!(h.controller.round_number(), 1);
        assert_eq!(h.board.message_text(), "ROUND 1");
        assert_eq!(h.board.score_text(), "ROUND: 1\nPLAYER 1: 0 WINS\nPLAYER 2: 0 WINS\n");

        for (unit, participant) in h.units.iter().zip(h.controller.participants()) {
            assert!(participant.is_alive());
            assert_eq!(unit.transform(), participant.spawn());
            assert!(!participant.control_enabled());
            assert!(!unit.can_act());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn playing_ends_on_first_tick_with_one_survivor() {
        let mut h = harness(settings(3, 5));
        let units = h.units.clone();

        let started = Instant::now();
        let (ticks, _) = tokio::join!(h.controller.round_playing(), async move {
            sleep(Duration::from_millis(150)).await;
            units[0].eliminate();
            sleep(Duration::from_millis(100)).await;
            units[2].eliminate();
        });

        // Second elimination lands at 250ms; the 300ms tick notices it
        assert_eq!(ticks, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));
        assert_eq!(h.board.message_text(), "");
        assert!(h.controller.participants().iter().all(|p| p.control_enabled()));
    }

    #[tokio::test(start_paused = true)]
    async fn playing_exits_immediately_when_already_decided() {
        let mut h = harness(settings(2, 5));
        h.units[1].eliminate();

        assert_eq!(h.controller.round_playing().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sole_survivor_wins_the_round() {
        let mut h = harness(settings(2, 5));
        h.controller.round_number = 1;
        h.units[0].eliminate();

        h.controller.round_ending().await;

        let winner = h.controller.round_winner().unwrap();
        assert_eq!(winner.player_index(), 2);
        assert_eq!(winner.wins(), 1);
        assert_eq!(h.controller.participants()[0].wins(), 0);
        assert!(h.controller.match_winner().is_none());
        assert_eq!(
            h.board.message_text(),
            "PLAYER 2 WINS THE ROUND!\n\n\n\nPLAYER 1: 0 WINS\nPLAYER 2: 1 WINS\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_survivors_is_a_draw() {
        let mut h = harness(settings(2, 5));
        h.controller.round_number = 1;
        for unit in &h.units {
            unit.eliminate();
        }

        h.controller.round_ending().await;

        assert!(h.controller.round_winner().is_none());
        assert!(h.controller.participants().iter().all(|p| p.wins() == 0));
        assert_eq!(
            h.board.message_text(),
            "DRAW!\n\n\n\nPLAYER 1: 0 WINS\nPLAYER 2: 0 WINS\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn several_survivors_award_nothing() {
        let mut h = harness(settings(3, 5));
        h.units[0].eliminate();

        h.controller.round_ending().await;

        assert!(h.controller.round_winner().is_none());
        assert!(h.controller.participants().iter().all(|p| p.wins() == 0));
        assert!(h.board.message_text().starts_with("DRAW!"));
    }

    #[tokio::test(start_paused = true)]
    async fn reaching_threshold_replaces_the_end_message() {
        let mut h = harness(settings(2, 3));
        h.controller.participants[0].record_round_win();
        h.controller.participants[0].record_round_win();
        h.units[1].eliminate();

        h.controller.round_ending().await;

        assert_eq!(h.controller.match_winner().unwrap().player_index(), 1);
        assert_eq!(h.board.message_text(), "PLAYER 1 WINS THE GAME!");
    }

    #[tokio::test(start_paused = true)]
    async fn match_winner_message_wins_over_a_draw() {
        let mut h = harness(settings(2, 1));
        h.controller.participants[1].record_round_win();
        for unit in &h.units {
            unit.eliminate();
        }

        h.controller.round_ending().await;

        assert!(h.controller.round_winner().is_none());
        assert_eq!(h.board.message_text(), "PLAYER 2 WINS THE GAME!");
    }

    #[test]
    fn match_winner_is_first_in_player_order() {
        let mut h = harness(settings(3, 2));
        for i in [1, 2] {
            h.controller.participants[i].record_round_win();
            h.controller.participants[i].record_round_win();
        }

        let winner = h.controller.find_match_winner().unwrap();
        assert_eq!(h.controller.participants[winner].player_index(), 2);

        let h = harness(settings(3, 2));
        assert!(h.controller.find_match_winner().is_none());
    }

    #[test]
    fn score_panel_lists_round_and_wins() {
        let mut h = harness(settings(2, 5));
        h.controller.round_number = 3;
        h.controller.participants[0].record_round_win();
        h.controller.participants[0].record_round_win();
        h.controller.participants[1].record_round_win();

        assert_eq!(
            h.controller.score_panel(),
            "ROUND: 3\nPLAYER 1: 2 WINS\nPLAYER 2: 1 WINS\n"
        );
    }

    #[test]
    fn rich_text_labels_carry_the_color() {
        let mut s = settings(1, 5);
        s.roster[0].color = Color::rgb(0x2A, 0x64, 0xB3);
        s.label_style = LabelStyle::RichText;
        let h = harness(s);

        assert_eq!(
            h.controller.participants()[0].label(),
            "<color=#2A64B3>PLAYER 1</color>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_match_runs_until_threshold_then_restarts_once() {
        let h = harness(settings(2, 2));
        let Harness {
            mut controller,
            units,
            board,
            restarts,
            mut status_rx,
        } = h;

        let match_task = tokio::spawn(async move {
            let outcome = controller.run().await;
            (controller, outcome)
        });

        // Round 1: player 1 survives. Round 2: both fall. Round 3: player 1 again.
        let script: [&[usize]; 3] = [&[1], &[0, 1], &[1]];
        for (round, eliminated) in script.iter().enumerate() {
            let round = round as u32 + 1;
            assert_ok!(
                status_rx
                    .wait_for(|s| matches!(s, Some(s) if s.round_number == round && s.phase == MatchPhase::Playing))
                    .await
            );
            for &i in eliminated.iter() {
                units[i].eliminate();
            }
        }

        let (controller, outcome) = assert_ok!(match_task.await);

        assert_eq!(
            outcome,
            MatchOutcome {
                rounds_played: 3,
                winner: 1,
                winner_label: "PLAYER 1".to_string(),
            }
        );
        assert_eq!(restarts.load(Ordering::SeqCst), 1);
        assert_eq!(controller.participants()[0].wins(), 2);
        assert_eq!(controller.participants()[1].wins(), 0);
        assert_eq!(board.message_text(), "PLAYER 1 WINS THE GAME!");
        assert_eq!(board.score_text(), "ROUND: 3\nPLAYER 1: 2 WINS\nPLAYER 2: 0 WINS\n");

        let status = status_rx.borrow().clone().unwrap();
        assert_eq!(status.phase, MatchPhase::Ending);
        assert_eq!(status.match_winner, Some(1));
    }
}
