use crate::stats::Stats;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mines_core::{Game, GameParams, PlayerKnowledge, Point};
use std::time::Instant;

/// Result of handling a key press.
pub enum AppAction {
    Continue,
    Quit,
}

/// Current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Preset selection.
    Menu,
    /// On the board (including finished games awaiting a key).
    Playing,
}

/// How a cell should be drawn. This is where the post-game states live:
/// the engine only ever knows unknown/flagged/revealed, and the display
/// variants below are derived from the mine layout once the game is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellDisplay {
    Covered,
    Flagged,
    Number(u8),
    /// An unflagged mine, shown after a loss.
    MineRevealed,
    /// The mine that was stepped on.
    MineHit,
    /// A flag that turned out to be wrong.
    MineIncorrect,
}

pub const PRESETS: [(&str, fn() -> GameParams); 3] = [
    ("Beginner", GameParams::beginner),
    ("Intermediate", GameParams::intermediate),
    ("Expert", GameParams::expert),
];

pub fn preset_name(params: &GameParams) -> &'static str {
    for (name, make) in PRESETS {
        let p = make();
        if (p.width, p.height, p.mine_count) == (params.width, params.height, params.mine_count) {
            return name;
        }
    }
    "Custom"
}

/// The application state.
pub struct App {
    pub game: Game,
    pub cursor: Point,
    pub screen: Screen,
    pub menu_selection: usize,
    pub message: Option<String>,
    pub stats: Stats,
    /// Set when the first square is opened; the timer runs from here.
    started_at: Option<Instant>,
    /// Elapsed seconds frozen at the moment the game ended.
    final_secs: Option<u64>,
    recorded: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            game: Game::new(GameParams::beginner()),
            cursor: Point::new(0, 0),
            screen: Screen::Menu,
            menu_selection: 0,
            message: None,
            stats: Stats::load(),
            started_at: None,
            final_secs: None,
            recorded: false,
        }
    }

    pub fn board_width(&self) -> i32 {
        self.game.params().width
    }

    pub fn board_height(&self) -> i32 {
        self.game.params().height
    }

    /// Seconds on the game clock.
    pub fn elapsed_secs(&self) -> u64 {
        if let Some(frozen) = self.final_secs {
            return frozen;
        }
        self.started_at.map_or(0, |t| t.elapsed().as_secs())
    }

    /// Mines still unaccounted for by flags (can go negative on overflagging).
    pub fn mines_remaining(&self) -> i64 {
        i64::from(self.game.params().mine_count) - self.game.count_flags() as i64
    }

    fn start_game(&mut self, params: GameParams) {
        self.game = Game::new(params);
        self.cursor = Point::new(params.width / 2, params.height / 2);
        self.screen = Screen::Playing;
        self.message = None;
        self.started_at = None;
        self.final_secs = None;
        self.recorded = false;
    }

    /// What to draw at `(x, y)`.
    pub fn cell_display(&self, x: i32, y: i32) -> CellDisplay {
        if !self.game.generated() {
            return CellDisplay::Covered;
        }

        let knowledge = *self.game.grid().get(x, y);
        if self.game.dead() {
            let is_mine = *self.game.mines().get(x, y);
            if self.game.data().hit == Some(Point::new(x, y)) {
                return CellDisplay::MineHit;
            }
            return match knowledge {
                PlayerKnowledge::MarkedAsMine if !is_mine => CellDisplay::MineIncorrect,
                PlayerKnowledge::MarkedAsMine => CellDisplay::Flagged,
                PlayerKnowledge::Unknown if is_mine => CellDisplay::MineRevealed,
                PlayerKnowledge::Unknown => CellDisplay::Covered,
                PlayerKnowledge::Revealed(n) => CellDisplay::Number(n),
            };
        }

        match knowledge {
            PlayerKnowledge::Unknown => CellDisplay::Covered,
            PlayerKnowledge::MarkedAsMine => CellDisplay::Flagged,
            PlayerKnowledge::Revealed(n) => CellDisplay::Number(n),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppAction::Quit;
        }
        match self.screen {
            Screen::Menu => self.handle_menu_key(key),
            Screen::Playing => self.handle_board_key(key),
        }
    }

    fn handle_menu_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.menu_selection = self.menu_selection.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.menu_selection = (self.menu_selection + 1).min(PRESETS.len() - 1);
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let params = (PRESETS[self.menu_selection].1)();
                self.start_game(params);
            }
            KeyCode::Char(c @ '1'..='3') => {
                let idx = c as usize - '1' as usize;
                self.menu_selection = idx;
                let params = (PRESETS[idx].1)();
                self.start_game(params);
            }
            KeyCode::Char('q') | KeyCode::Esc => return AppAction::Quit,
            _ => {}
        }
        AppAction::Continue
    }

    fn handle_board_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1, 0),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1, 0),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(0, -1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(0, 1),
            KeyCode::Enter | KeyCode::Char(' ') => self.open_at_cursor(),
            KeyCode::Char('f') | KeyCode::Char('m') => self.flag_at_cursor(),
            KeyCode::Char('r') => {
                // Same preset, fresh board.
                let mut params = *self.game.params();
                params.sx = -1;
                params.sy = -1;
                params.seed = 0;
                self.start_game(params);
            }
            KeyCode::Char('n') | KeyCode::Esc => self.screen = Screen::Menu,
            KeyCode::Char('q') => return AppAction::Quit,
            _ => {}
        }
        AppAction::Continue
    }

    fn move_cursor(&mut self, dx: i32, dy: i32) {
        self.cursor.x = (self.cursor.x + dx).clamp(0, self.board_width() - 1);
        self.cursor.y = (self.cursor.y + dy).clamp(0, self.board_height() - 1);
    }

    fn open_at_cursor(&mut self) {
        if self.game.finished() {
            return;
        }

        let (x, y) = (self.cursor.x, self.cursor.y);
        let first_open = !self.game.generated();

        if !first_open && self.game.grid().get(x, y).revealed_count().is_some() {
            self.game.open_adjacent_squares(x, y);
        } else if first_open || !self.game.grid().get(x, y).is_marked() {
            self.game.open_square(x, y);
        }

        if first_open {
            self.started_at = Some(Instant::now());
        }
        self.after_move();
    }

    fn flag_at_cursor(&mut self) {
        if self.game.finished() || !self.game.generated() {
            return;
        }
        self.game.toggle_mark(self.cursor.x, self.cursor.y);
    }

    fn after_move(&mut self) {
        if !self.game.finished() || self.recorded {
            return;
        }
        self.final_secs = Some(self.elapsed_secs());
        self.recorded = true;

        let won = self.game.won();
        let secs = self.final_secs.unwrap_or(0);
        let name = preset_name(self.game.params());
        self.stats.record(name, won, secs);
        self.stats.save();

        self.message = Some(if won {
            format!("Cleared in {secs}s! [r] replay, [n] menu")
        } else {
            "Boom. [r] retry, [n] menu".to_string()
        });
    }
}
