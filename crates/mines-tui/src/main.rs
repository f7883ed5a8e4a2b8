mod app;
mod render;
mod stats;

use app::{App, AppAction};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io;
use std::time::Duration;

fn main() -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let result = run_app(&mut stdout);

    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen)?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }
    Ok(())
}

fn run_app(stdout: &mut io::Stdout) -> io::Result<()> {
    let mut app = App::new();

    loop {
        render::render(stdout, &app)?;

        // Short poll keeps the timer ticking while idle.
        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if let AppAction::Quit = app.handle_key(key) {
                    return Ok(());
                }
            }
        }
    }
}
