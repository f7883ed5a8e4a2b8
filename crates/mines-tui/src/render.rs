use crate::app::{preset_name, App, CellDisplay, Screen, PRESETS};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Write};

pub fn render(stdout: &mut io::Stdout, app: &App) -> io::Result<()> {
    let (term_width, term_height) = terminal::size()?;

    execute!(stdout, Hide, Clear(ClearType::All))?;
    match app.screen {
        Screen::Menu => render_menu(stdout, app, term_width, term_height)?,
        Screen::Playing => render_board(stdout, app, term_width, term_height)?,
    }
    execute!(stdout, Show)?;
    stdout.flush()
}

fn render_menu(stdout: &mut io::Stdout, app: &App, term_width: u16, _h: u16) -> io::Result<()> {
    let title = "M I N E S";
    let x = term_width.saturating_sub(title.len() as u16) / 2;
    queue!(
        stdout,
        MoveTo(x, 2),
        SetForegroundColor(Color::Yellow),
        Print(title),
        ResetColor
    )?;
    queue!(
        stdout,
        MoveTo(x.saturating_sub(8), 4),
        Print("Every board is solvable without guessing.")
    )?;

    for (i, &(name, make)) in PRESETS.iter().enumerate() {
        let params = make();
        let stats = app.stats.get(name);
        let best = stats
            .best_time_secs
            .map_or(String::from("--"), |s| format!("{s}s"));
        let line = format!(
            "{} {:14} {:>2}x{:<2} {:>2} mines   won {}/{}  best {}",
            if i == app.menu_selection { ">" } else { " " },
            name,
            params.width,
            params.height,
            params.mine_count,
            stats.won,
            stats.played,
            best,
        );
        let y = 7 + 2 * i as u16;
        if i == app.menu_selection {
            queue!(stdout, MoveTo(6, y), SetForegroundColor(Color::Cyan))?;
        } else {
            queue!(stdout, MoveTo(6, y))?;
        }
        queue!(stdout, Print(line), ResetColor)?;
    }

    queue!(
        stdout,
        MoveTo(6, 7 + 2 * PRESETS.len() as u16 + 1),
        SetForegroundColor(Color::DarkGrey),
        Print("arrows/jk move   enter start   1-3 quick start   q quit"),
        ResetColor
    )?;
    Ok(())
}

fn number_color(n: u8) -> Color {
    match n {
        1 => Color::Blue,
        2 => Color::Green,
        3 => Color::Red,
        4 => Color::DarkBlue,
        5 => Color::DarkRed,
        6 => Color::Cyan,
        7 => Color::Magenta,
        _ => Color::Grey,
    }
}

fn render_board(stdout: &mut io::Stdout, app: &App, term_width: u16, _h: u16) -> io::Result<()> {
    // Two columns per cell keeps the board roughly square on screen.
    let board_cols = (app.board_width() * 2) as u16;
    let origin_x = term_width.saturating_sub(board_cols) / 2;
    let origin_y = 3;

    let header = format!(
        "{}   mines {:>3}   time {:>4}s",
        preset_name(app.game.params()),
        app.mines_remaining(),
        app.elapsed_secs(),
    );
    queue!(stdout, MoveTo(origin_x, 1), Print(header))?;

    for y in 0..app.board_height() {
        queue!(stdout, MoveTo(origin_x, origin_y + y as u16))?;
        for x in 0..app.board_width() {
            let under_cursor = app.cursor.x == x && app.cursor.y == y;
            if under_cursor {
                queue!(stdout, SetBackgroundColor(Color::DarkGrey))?;
            }
            match app.cell_display(x, y) {
                CellDisplay::Covered => {
                    queue!(stdout, SetForegroundColor(Color::DarkGrey), Print("[]"))?
                }
                CellDisplay::Flagged => {
                    queue!(stdout, SetForegroundColor(Color::Red), Print("F "))?
                }
                CellDisplay::Number(0) => queue!(stdout, Print("  "))?,
                CellDisplay::Number(n) => queue!(
                    stdout,
                    SetForegroundColor(number_color(n)),
                    Print(format!("{n} "))
                )?,
                CellDisplay::MineRevealed => {
                    queue!(stdout, SetForegroundColor(Color::Grey), Print("* "))?
                }
                CellDisplay::MineHit => queue!(
                    stdout,
                    SetBackgroundColor(Color::Red),
                    SetForegroundColor(Color::White),
                    Print("* ")
                )?,
                CellDisplay::MineIncorrect => {
                    queue!(stdout, SetForegroundColor(Color::Red), Print("X "))?
                }
            }
            queue!(stdout, ResetColor)?;
        }
    }

    let footer_y = origin_y + app.board_height() as u16 + 1;
    if let Some(msg) = &app.message {
        queue!(
            stdout,
            MoveTo(origin_x, footer_y),
            SetForegroundColor(Color::Yellow),
            Print(msg),
            ResetColor
        )?;
    } else {
        queue!(
            stdout,
            MoveTo(origin_x, footer_y),
            SetForegroundColor(Color::DarkGrey),
            Print("space open/chord   f flag   r new board   n menu   q quit"),
            ResetColor
        )?;
    }
    Ok(())
}
