//! Blocking terminal input: plain lines and masked secrets.

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Restores cooked mode even if reading fails.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Read one line from stdin. `None` at end of input.
pub fn read_line(label: &str) -> io::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Read a secret, echoing `*` per character. `None` on Ctrl-C or end of input.
///
/// Falls back to a plain line read when stdin is not a terminal.
pub fn read_secret(label: &str) -> io::Result<Option<String>> {
    if !io::stdin().is_terminal() {
        return read_line(label);
    }

    print!("{}", label);
    io::stdout().flush()?;

    let result = {
        let _guard = RawModeGuard::enable()?;
        read_masked()
    };
    println!();
    result
}

fn read_masked() -> io::Result<Option<String>> {
    let mut secret = String::new();
    let mut out = io::stdout();

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => return Ok(Some(secret)),
            KeyCode::Char('c') if ctrl => return Ok(None),
            KeyCode::Char('d') if ctrl && secret.is_empty() => return Ok(None),
            KeyCode::Backspace => {
                if secret.pop().is_some() {
                    write!(out, "\u{8} \u{8}")?;
                    out.flush()?;
                }
            }
            KeyCode::Char(c) if !ctrl => {
                secret.push(c);
                write!(out, "*")?;
                out.flush()?;
            }
            _ => {}
        }
    }
}
