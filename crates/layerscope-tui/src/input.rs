//! Terminal keystrokes turned into acknowledgment lines.

use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Enter was pressed; carries the line typed so far.
    Line(String),
    /// Ctrl+C.
    Interrupt,
    Pending,
}

/// Collects key presses until Enter. Raw mode swallows the terminal's own
/// line editing, so backspace is handled here.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: String,
}

impl LineAssembler {
    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind == KeyEventKind::Release {
            return KeyOutcome::Pending;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                KeyOutcome::Interrupt
            }
            KeyCode::Enter => KeyOutcome::Line(std::mem::take(&mut self.buffer)),
            KeyCode::Backspace => {
                self.buffer.pop();
                KeyOutcome::Pending
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                KeyOutcome::Pending
            }
            _ => KeyOutcome::Pending,
        }
    }

    pub fn on_paste(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Read terminal events until `cancel` fires. Completed lines go to the
/// returned channel; Ctrl+C cancels `cancel`. The channel closes when the
/// task stops.
pub fn spawn_input_task(cancel: CancellationToken) -> UnboundedReceiver<String> {
    let (tx, rx) = unbounded_channel();
    tokio::spawn(async move {
        let mut events = EventStream::new();
        let mut assembler = LineAssembler::default();
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => event,
            };
            match event {
                Some(Ok(Event::Key(key))) => match assembler.on_key(key) {
                    KeyOutcome::Line(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    KeyOutcome::Interrupt => {
                        debug!("interrupt requested from the keyboard");
                        cancel.cancel();
                        break;
                    }
                    KeyOutcome::Pending => {}
                },
                Some(Ok(Event::Paste(text))) => assembler.on_paste(&text),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("failed to read terminal input: {err}");
                    break;
                }
                None => break,
            }
        }
    });
    rx
}
