//! Game session state and logic
//!
//! [`Game`] is the single apply point for everything that changes a session:
//! player actions go through [`Game::process_action`] and gravity through
//! [`Game::update`]. Both borrow the session mutably, so a gravity step and a
//! keypress are ordered by call order and never interleave.

use crate::board::{Board, Grid};
use crate::gravity::{GravityClock, INITIAL_INTERVAL};
use crate::piece::Piece;
use crate::randomizer::Randomizer;
use crate::score::Score;
use crate::skill::{SkillKind, SkillStatus, SkillTimings, Skills};
use crate::tetromino::{PieceKind, Shape};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Running,
    Paused,
    /// Terminal until reset
    Over,
}

/// Commands the session accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    HardDrop,
    TogglePause,
    Reset,
    Skill(SkillKind),
    /// Handled by the shell; a no-op for the session
    Quit,
}

/// Tunables fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub initial_interval: Duration,
    pub skills: SkillTimings,
    /// Fixed seed for the piece sequence, random when None
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_interval: INITIAL_INTERVAL,
            skills: SkillTimings::default(),
            seed: None,
        }
    }
}

/// Final totals of a game that ended, handed to the leaderboard by the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedGame {
    pub score: u64,
    pub lines: u32,
}

/// Read-only view of a session for rendering
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Locked cells with the falling piece drawn in
    pub cells: Grid,
    pub score: u64,
    pub lines: u32,
    pub state: GameState,
    pub next_kind: PieceKind,
    pub next_shape: Shape,
    pub gravity_interval: Duration,
    pub slow_active: bool,
    pub skills: [SkillStatus; 3],
    pub last_event: Option<String>,
}

/// One player's session
pub struct Game {
    board: Board,
    current: Piece,
    next: Piece,
    score: Score,
    state: GameState,
    gravity: GravityClock,
    skills: Skills,
    rng: Randomizer,
    /// Set once on entering Over, drained by the shell
    finished: Option<FinishedGame>,
    /// Short description of the last notable event, for display
    last_event: Option<String>,
}

impl Game {
    pub fn new(config: GameConfig, now: Instant) -> Self {
        let mut rng = match config.seed {
            Some(seed) => Randomizer::with_seed(seed),
            None => Randomizer::new(),
        };
        let current = Piece::spawn(rng.next_kind());
        let next = Piece::spawn(rng.next_kind());

        Self {
            board: Board::new(),
            current,
            next,
            score: Score::new(),
            state: GameState::Running,
            gravity: GravityClock::new(config.initial_interval, now),
            skills: Skills::new(config.skills),
            rng,
            finished: None,
            last_event: None,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Process an action
    pub fn process_action(&mut self, action: Action, now: Instant) {
        match self.state {
            GameState::Over => {
                if action == Action::Reset {
                    self.reset(now);
                }
            }
            GameState::Paused => match action {
                Action::TogglePause => {
                    self.state = GameState::Running;
                    // No make-up falls for the time spent paused
                    self.gravity.restart(now);
                    debug!("resumed");
                }
                Action::Reset => self.reset(now),
                _ => {}
            },
            GameState::Running => match action {
                Action::MoveLeft => {
                    self.current.try_move(-1, 0, &self.board);
                }
                Action::MoveRight => {
                    self.current.try_move(1, 0, &self.board);
                }
                Action::Rotate => {
                    self.current.try_rotate(&self.board);
                }
                Action::SoftDrop => self.soft_drop(now),
                Action::HardDrop => self.hard_drop(now),
                Action::TogglePause => {
                    self.state = GameState::Paused;
                    debug!("paused");
                }
                Action::Reset => self.reset(now),
                Action::Skill(kind) => {
                    self.use_skill(kind, now);
                }
                Action::Quit => {}
            },
        }
    }

    /// Advance gravity (call every frame)
    pub fn update(&mut self, now: Instant) {
        if self.state != GameState::Running {
            return;
        }
        if self.gravity.poll(now) {
            self.fall_or_lock(now);
        }
    }

    /// Move down one row, or lock if blocked. Shared by gravity and soft drop.
    fn fall_or_lock(&mut self, now: Instant) -> bool {
        if self.current.try_move(0, 1, &self.board) {
            true
        } else {
            self.lock_piece(now);
            false
        }
    }

    fn soft_drop(&mut self, now: Instant) {
        if self.fall_or_lock(now) {
            self.gravity.restart(now);
        }
    }

    /// Find the resting row and lock there, as one step
    fn hard_drop(&mut self, now: Instant) {
        self.current.y = self.current.rest_y(&self.board);
        self.lock_piece(now);
    }

    /// Lock the current piece, clear rows, and promote the next piece
    fn lock_piece(&mut self, now: Instant) {
        if self.current.is_above_board() {
            self.game_over();
            return;
        }

        let piece = self.current;
        self.board.lock_shape(&piece.shape, piece.x, piece.y, piece.kind);
        debug!(kind = piece.kind.name(), x = piece.x, y = piece.y, "locked");

        let cleared = self.board.clear_full_rows();
        if cleared > 0 {
            let gained = self.score.add_clear(cleared);
            self.gravity.speed_up();
            info!(
                cleared,
                gained,
                interval_ms = self.gravity.interval().as_millis() as u64,
                "rows cleared"
            );
            self.last_event = Some(format!("{} +{}", clear_name(cleared), gained));
            if self.board.is_empty() {
                info!("board cleared");
            }
        }

        self.current = self.next;
        self.next = Piece::spawn(self.rng.next_kind());
        self.gravity.restart(now);
    }

    fn game_over(&mut self) {
        self.state = GameState::Over;
        self.finished = Some(FinishedGame {
            score: self.score.points,
            lines: self.score.lines,
        });
        self.last_event = None;
        info!(score = self.score.points, lines = self.score.lines, "game over");
    }

    fn reset(&mut self, now: Instant) {
        self.board = Board::new();
        self.current = Piece::spawn(self.rng.next_kind());
        self.next = Piece::spawn(self.rng.next_kind());
        self.score = Score::new();
        self.gravity.reset(now);
        self.state = GameState::Running;
        self.last_event = None;
        info!("new game");
    }

    /// Use a skill if its cooldown allows. Returns whether it fired; a fired
    /// skill has consumed its cooldown even if its effect changed nothing.
    fn use_skill(&mut self, kind: SkillKind, now: Instant) -> bool {
        let skill = self.skills.get_mut(kind);
        if !skill.trigger(now) {
            debug!(skill = kind.name(), "skill on cooldown");
            return false;
        }
        let effect = skill.effect;

        match kind {
            SkillKind::Slow => {
                let duration = effect.unwrap_or_default();
                self.gravity.slow_down(now, duration);
                info!(
                    interval_ms = self.gravity.interval().as_millis() as u64,
                    "slow skill"
                );
            }
            SkillKind::ClearRandomRow => {
                let rows = self.board.occupied_rows();
                match self.rng.choose(&rows) {
                    Some(row) => {
                        self.board.remove_row(row);
                        info!(row, "clear row skill");
                    }
                    None => debug!("clear row skill on empty board"),
                }
            }
            SkillKind::SwapNext => {
                if self.current.try_replace(self.next.kind, &self.board) {
                    self.next = Piece::spawn(self.rng.next_kind());
                    info!(kind = self.current.kind.name(), "swap next skill");
                } else {
                    debug!("swap next skill found no legal placement");
                }
            }
        }

        self.last_event = Some(format!("{}!", kind.name()));
        true
    }

    /// Take the record of a game that just ended. Yields each ended game once.
    pub fn take_finished(&mut self) -> Option<FinishedGame> {
        self.finished.take()
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let piece = &self.current;
        let cells = self
            .board
            .composite(&piece.shape, piece.x, piece.y, piece.kind);

        Snapshot {
            cells,
            score: self.score.points,
            lines: self.score.lines,
            state: self.state,
            next_kind: self.next.kind,
            next_shape: self.next.shape,
            gravity_interval: self.gravity.interval(),
            slow_active: self.gravity.slow_until().is_some_and(|until| now < until),
            skills: self.skills.status(now),
            last_event: self.last_event.clone(),
        }
    }
}

fn clear_name(cleared: usize) -> &'static str {
    match cleared {
        1 => "Single",
        2 => "Double",
        3 => "Triple",
        4 => "Quad",
        _ => "Mega",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Cell, BOARD_HEIGHT, BOARD_WIDTH};

    fn new_game(now: Instant) -> Game {
        Game::new(
            GameConfig {
                seed: Some(7),
                ..GameConfig::default()
            },
            now,
        )
    }

    fn drop_o_at(game: &mut Game, x: i32, now: Instant) {
        game.current = Piece::spawn(PieceKind::O);
        game.current.x = x;
        game.process_action(Action::HardDrop, now);
    }

    #[test]
    fn test_new_game_is_running_and_empty() {
        let now = Instant::now();
        let game = new_game(now);
        assert_eq!(game.state(), GameState::Running);
        assert!(game.board.is_empty());
        assert_eq!(game.score(), Score::new());
        assert_eq!(game.gravity.interval(), INITIAL_INTERVAL);
        assert!(game.current.is_above_board());
    }

    #[test]
    fn test_gravity_moves_piece_down() {
        let now = Instant::now();
        let mut game = new_game(now);
        let y = game.current.y;
        game.update(now + Duration::from_millis(400));
        assert_eq!(game.current.y, y);
        game.update(now + Duration::from_millis(800));
        assert_eq!(game.current.y, y + 1);
    }

    #[test]
    fn test_soft_drop_on_floor_locks() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.current = Piece::spawn(PieceKind::O);
        game.current.y = BOARD_HEIGHT as i32 - 2;
        game.process_action(Action::SoftDrop, now);
        assert_eq!(game.board.filled_count(), 4);
        assert_eq!(game.state(), GameState::Running);
    }

    #[test]
    fn test_hard_drop_locks_and_promotes_next() {
        let now = Instant::now();
        let mut game = new_game(now);
        let next = game.next;
        drop_o_at(&mut game, 0, now);
        assert_eq!(game.board.get(19, 0), Some(Cell::Filled(PieceKind::O)));
        assert_eq!(game.board.get(18, 1), Some(Cell::Filled(PieceKind::O)));
        assert_eq!(game.current, next);
        assert_eq!(game.state(), GameState::Running);
    }

    #[test]
    fn test_lock_on_board_never_ends_game() {
        let now = Instant::now();
        let mut game = new_game(now);
        for kind in PieceKind::all() {
            game.current = Piece::spawn(kind);
            game.process_action(Action::HardDrop, now);
            assert_eq!(game.state(), GameState::Running);
        }
        assert!(game.take_finished().is_none());
    }

    #[test]
    fn test_lock_above_board_ends_game_once() {
        let now = Instant::now();
        let mut game = new_game(now);
        for row in 0..BOARD_HEIGHT as i32 {
            game.board.set(row, 4, Cell::Filled(PieceKind::I));
            game.board.set(row, 5, Cell::Filled(PieceKind::I));
        }
        game.score.add_clear(2);
        let before = game.board.clone();

        drop_o_at(&mut game, 4, now);
        assert_eq!(game.state(), GameState::Over);
        assert_eq!(game.board, before);
        assert_eq!(
            game.take_finished(),
            Some(FinishedGame {
                score: 100,
                lines: 2
            })
        );
        assert_eq!(game.take_finished(), None);
    }

    #[test]
    fn test_over_ignores_everything_but_reset() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.game_over();
        let piece = game.current;

        for action in [
            Action::MoveLeft,
            Action::Rotate,
            Action::HardDrop,
            Action::TogglePause,
            Action::Skill(SkillKind::SwapNext),
        ] {
            game.process_action(action, now);
        }
        game.update(now + Duration::from_secs(5));
        assert_eq!(game.current, piece);
        assert_eq!(game.state(), GameState::Over);
        assert!(game.skills.get(SkillKind::SwapNext).can_use(now));

        game.process_action(Action::Reset, now);
        assert_eq!(game.state(), GameState::Running);
        assert!(game.board.is_empty());
        assert_eq!(game.score(), Score::new());
    }

    #[test]
    fn test_reset_restores_baseline_interval() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.gravity.speed_up();
        game.board.set(19, 0, Cell::Filled(PieceKind::T));
        game.score.add_clear(1);
        game.process_action(Action::Reset, now);
        assert_eq!(game.gravity.interval(), INITIAL_INTERVAL);
        assert!(game.board.is_empty());
        assert_eq!(game.score().points, 0);
    }

    #[test]
    fn test_o_pieces_fill_and_clear_bottom_rows() {
        let now = Instant::now();
        let mut game = new_game(now);

        for x in [0, 2, 4, 6, 8] {
            drop_o_at(&mut game, x, now);
        }
        // Both rows completed by the fifth piece and cleared together
        assert!(game.board.is_empty());
        assert_eq!(game.score().points, 100);
        assert_eq!(game.score().lines, 2);
        assert_eq!(game.gravity.interval(), Duration::from_millis(784));

        for x in [0, 2, 4, 6, 8] {
            drop_o_at(&mut game, x, now);
        }
        assert!(game.board.is_empty());
        assert_eq!(game.score().points, 200);
        assert_eq!(game.score().lines, 4);
    }

    #[test]
    fn test_single_line_clear_scores_forty() {
        let now = Instant::now();
        let mut game = new_game(now);
        for col in 0..BOARD_WIDTH as i32 - 4 {
            game.board.set(19, col, Cell::Filled(PieceKind::Z));
        }
        // Horizontal I fills the last four columns of the bottom row
        game.current = Piece::spawn(PieceKind::I);
        game.current.x = BOARD_WIDTH as i32 - 4;
        game.process_action(Action::HardDrop, now);
        assert_eq!(game.score().points, 40);
        assert_eq!(game.score().lines, 1);
        assert!(game.board.is_empty());
    }

    #[test]
    fn test_pause_stops_gravity_without_make_up() {
        let now = Instant::now();
        let mut game = new_game(now);
        let y = game.current.y;

        game.process_action(Action::TogglePause, now);
        game.update(now + Duration::from_secs(5));
        assert_eq!(game.current.y, y);
        game.process_action(Action::MoveLeft, now);
        assert_eq!(game.current.x, Piece::spawn(game.current.kind).x);

        let resumed = now + Duration::from_secs(5);
        game.process_action(Action::TogglePause, resumed);
        game.update(resumed + Duration::from_millis(100));
        assert_eq!(game.current.y, y);
        game.update(resumed + Duration::from_millis(800));
        assert_eq!(game.current.y, y + 1);
    }

    #[test]
    fn test_swap_next_twice_within_cooldown() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.current = Piece::spawn(PieceKind::T);
        game.next = Piece::spawn(PieceKind::O);

        game.process_action(Action::Skill(SkillKind::SwapNext), now);
        assert_eq!(game.current.kind, PieceKind::O);
        assert_eq!(game.current.shape, PieceKind::O.base_shape());
        let after_first = game.current;
        let next_after_first = game.next;

        game.process_action(Action::Skill(SkillKind::SwapNext), now + Duration::from_secs(1));
        assert_eq!(game.current, after_first);
        assert_eq!(game.next, next_after_first);
    }

    #[test]
    fn test_swap_next_keeps_position_when_legal() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.current = Piece::spawn(PieceKind::L);
        game.current.x = 2;
        game.current.y = 6;
        game.next = Piece::spawn(PieceKind::T);

        game.process_action(Action::Skill(SkillKind::SwapNext), now);
        assert_eq!((game.current.x, game.current.y), (2, 6));
        assert_eq!(game.current.kind, PieceKind::T);
    }

    #[test]
    fn test_clear_row_on_empty_board_still_consumes_cooldown() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.process_action(Action::Skill(SkillKind::ClearRandomRow), now);
        assert!(game.board.is_empty());
        assert_eq!(
            game.skills.get(SkillKind::ClearRandomRow).remaining(now),
            Duration::from_secs(20)
        );
    }

    #[test]
    fn test_clear_row_removes_an_occupied_row() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.board.set(19, 0, Cell::Filled(PieceKind::J));
        game.board.set(19, 1, Cell::Filled(PieceKind::J));
        game.board.set(15, 3, Cell::Filled(PieceKind::S));

        game.process_action(Action::Skill(SkillKind::ClearRandomRow), now);
        let remaining = game.board.filled_count();
        // Either the two-cell row or the one-cell row went away
        assert!(remaining == 1 || remaining == 2);
        assert_eq!(game.score(), Score::new());
    }

    #[test]
    fn test_skill_on_cooldown_changes_nothing() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.process_action(Action::Skill(SkillKind::ClearRandomRow), now);

        game.board.set(19, 0, Cell::Filled(PieceKind::J));
        let board = game.board.clone();
        let later = now + Duration::from_secs(1);
        game.process_action(Action::Skill(SkillKind::ClearRandomRow), later);
        assert_eq!(game.board, board);
        assert_eq!(
            game.skills.get(SkillKind::ClearRandomRow).remaining(now),
            Duration::from_secs(20)
        );

        game.process_action(Action::Skill(SkillKind::Slow), now);
        let slowed = game.gravity.interval();
        game.process_action(Action::Skill(SkillKind::Slow), later);
        assert_eq!(game.gravity.interval(), slowed);
    }

    #[test]
    fn test_slow_skill_restores_interval() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.process_action(Action::Skill(SkillKind::Slow), now);
        assert_eq!(game.gravity.interval(), Duration::from_millis(280));
        assert!(game.snapshot(now).slow_active);

        game.update(now + Duration::from_secs(10));
        assert_eq!(game.gravity.interval(), INITIAL_INTERVAL);
        assert!(!game.snapshot(now + Duration::from_secs(10)).slow_active);
    }

    #[test]
    fn test_snapshot_composites_current_piece() {
        let now = Instant::now();
        let mut game = new_game(now);
        game.current = Piece::spawn(PieceKind::O);
        game.current.y = 5;
        let snapshot = game.snapshot(now);
        assert_eq!(snapshot.cells[5][4], Cell::Filled(PieceKind::O));
        assert_eq!(snapshot.cells[6][5], Cell::Filled(PieceKind::O));
        assert_eq!(snapshot.next_kind, game.next.kind);
        assert_eq!(snapshot.state, GameState::Running);
        assert!(snapshot.skills.iter().all(|s| s.ready));
        // The board itself is untouched
        assert!(game.board.is_empty());
    }
}
