use std::io;
use std::io::Stdout;
use std::io::stdout;

use crossterm::cursor::Hide;
use crossterm::cursor::Show;
use crossterm::event::DisableBracketedPaste;
use crossterm::event::EnableBracketedPaste;
use crossterm::execute;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

/// Terminal state the renderer changes for the length of a run and must put
/// back afterwards.
pub trait SurfaceModes {
    fn enter(&mut self) -> io::Result<()>;
    fn leave(&mut self) -> io::Result<()>;
}

/// Alternate screen plus hidden cursor, with raw mode so keys arrive one at a
/// time.
#[derive(Debug, Default)]
pub struct CrosstermModes {
    raw_mode: bool,
    alt_screen: bool,
}

impl SurfaceModes for CrosstermModes {
    fn enter(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        self.raw_mode = true;
        execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste, Hide)?;
        self.alt_screen = true;
        Ok(())
    }

    fn leave(&mut self) -> io::Result<()> {
        // Undo as much as possible even when one step fails.
        let screen = if self.alt_screen {
            self.alt_screen = false;
            execute!(stdout(), Show, DisableBracketedPaste, LeaveAlternateScreen)
        } else {
            Ok(())
        };
        let raw = if self.raw_mode {
            self.raw_mode = false;
            disable_raw_mode()
        } else {
            Ok(())
        };
        screen.and(raw)
    }
}

pub type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

pub fn init_terminal() -> io::Result<CrosstermTerminal> {
    Terminal::new(CrosstermBackend::new(stdout()))
}
