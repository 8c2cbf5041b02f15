//! Line-oriented command surface for live tuning.
//!
//! Accepted lines (case-insensitive keyword, one value):
//!
//! ```text
//! mass <g·m²>        damping <mN·m·s/rad>
//! stiffness <mN·m/rad>   max <0..=1>
//! show
//! ```
//!
//! Commands go through the guards below before touching `Params`, so the
//! integrator never sees a non-positive mass from this path.

use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::params::Params;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Mass(f32),
    Damping(f32),
    Stiffness(f32),
    MaxCommand(f32),
    Show,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (expected mass|damping|stiffness|max|show)")]
    Unknown(String),
    #[error("'{0}' needs a value")]
    MissingValue(&'static str),
    #[error("'{0}' takes a single value")]
    TrailingInput(&'static str),
    #[error("not a number: '{0}'")]
    NotANumber(String),
    #[error("{name} must be {rule} (got {value})")]
    OutOfRange {
        name: &'static str,
        rule: &'static str,
        value: f32,
    },
}

fn value(
    name: &'static str,
    mut rest: std::str::SplitWhitespace<'_>,
) -> Result<f32, CommandError> {
    let raw = rest.next().ok_or(CommandError::MissingValue(name))?;
    if rest.next().is_some() {
        return Err(CommandError::TrailingInput(name));
    }
    raw.parse::<f32>()
        .map_err(|_| CommandError::NotANumber(raw.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let keyword = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let cmd = match keyword.as_str() {
            "mass" => Command::Mass(value("mass", words)?),
            "damping" => Command::Damping(value("damping", words)?),
            "stiffness" => Command::Stiffness(value("stiffness", words)?),
            "max" => Command::MaxCommand(value("max", words)?),
            "show" => {
                if words.next().is_some() {
                    return Err(CommandError::TrailingInput("show"));
                }
                Command::Show
            }
            _ => return Err(CommandError::Unknown(keyword)),
        };
        cmd.check()?;
        Ok(cmd)
    }
}

impl Command {
    /// Range guards; NaN fails every one of them.
    pub fn check(&self) -> Result<(), CommandError> {
        let (name, rule, value, ok) = match *self {
            Command::Mass(v) => ("mass", "> 0", v, v.is_finite() && v > 0.0),
            Command::Damping(v) => ("damping", ">= 0", v, v.is_finite() && v >= 0.0),
            Command::Stiffness(v) => ("stiffness", ">= 0", v, v.is_finite() && v >= 0.0),
            Command::MaxCommand(v) => ("max", "in (0, 1]", v, v > 0.0 && v <= 1.0),
            Command::Show => return Ok(()),
        };
        if ok {
            Ok(())
        } else {
            Err(CommandError::OutOfRange { name, rule, value })
        }
    }

    /// Validate and store; returns the reply line for the operator.
    pub fn apply(&self, params: &Params) -> Result<String, CommandError> {
        self.check()?;
        match *self {
            Command::Mass(v) => params.set_mass(v),
            Command::Damping(v) => params.set_damping(v),
            Command::Stiffness(v) => params.set_stiffness(v),
            Command::MaxCommand(v) => params.set_max_command(v),
            Command::Show => {}
        }
        tracing::info!(command = ?self, "parameter command applied");
        Ok(show(params))
    }
}

/// Current parameter values as one line.
pub fn show(params: &Params) -> String {
    format!(
        "mass={} damping={} stiffness={} max={}",
        params.mass(),
        params.damping(),
        params.stiffness(),
        params.max_command()
    )
}

/// Read commands until EOF, replying on `out`. Blank lines and `#` comments
/// are skipped. Returns the number of applied commands.
pub fn serve<R: BufRead, W: Write>(input: R, mut out: W, params: &Params) -> std::io::Result<u64> {
    let mut applied = 0u64;
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match trimmed.parse::<Command>().and_then(|c| c.apply(params)) {
            Ok(reply) => {
                applied += 1;
                writeln!(out, "ok {reply}")?;
            }
            Err(e) => {
                tracing::warn!(line = trimmed, error = %e, "rejected command");
                writeln!(out, "error: {e}")?;
            }
        }
        out.flush()?;
    }
    Ok(applied)
}

/// Owns the thread that feeds an input stream into `serve`.
pub struct CommandReader {
    handle: JoinHandle<std::io::Result<u64>>,
}

impl CommandReader {
    pub fn spawn<R, W>(input: R, out: W, params: Arc<Params>) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name("paddle-commands".into())
            .spawn(move || serve(input, out, &params))?;
        Ok(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the input to close.
    pub fn join(self) -> std::io::Result<u64> {
        self.handle
            .join()
            .map_err(|_| std::io::Error::other("command thread panicked"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("mass 0.8", Command::Mass(0.8))]
    #[case("  DAMPING   12 ", Command::Damping(12.0))]
    #[case("stiffness 0", Command::Stiffness(0.0))]
    #[case("max 1", Command::MaxCommand(1.0))]
    #[case("show", Command::Show)]
    fn parses(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(line.parse::<Command>().unwrap(), expected);
    }

    #[rstest]
    #[case("", CommandError::Empty)]
    #[case("mass", CommandError::MissingValue("mass"))]
    #[case("mass 1 2", CommandError::TrailingInput("mass"))]
    #[case("mass abc", CommandError::NotANumber("abc".into()))]
    #[case("spin 3", CommandError::Unknown("spin".into()))]
    fn rejects_malformed(#[case] line: &str, #[case] expected: CommandError) {
        assert_eq!(line.parse::<Command>().unwrap_err(), expected);
    }

    #[rstest]
    #[case("mass 0")]
    #[case("mass -1")]
    #[case("mass NaN")]
    #[case("damping -0.1")]
    #[case("stiffness inf")]
    #[case("max 0")]
    #[case("max 1.01")]
    fn guards_reject_out_of_range(#[case] line: &str) {
        assert!(matches!(
            line.parse::<Command>(),
            Err(CommandError::OutOfRange { .. })
        ));
    }

    #[test]
    fn apply_refuses_unchecked_values() {
        let p = Params::default();
        assert!(Command::Mass(-2.0).apply(&p).is_err());
        assert_eq!(p.mass(), 0.5);
    }

    #[test]
    fn serve_applies_and_reports() {
        let p = Params::default();
        let input = "mass 0.8\n\n# comment\nmax 2\nshow\n";
        let mut out = Vec::new();
        let applied = serve(input.as_bytes(), &mut out, &p).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(p.mass(), 0.8);
        assert_eq!(p.max_command(), 0.5);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ok mass=0.8"));
        assert!(lines[1].starts_with("error: max must be in (0, 1]"));
        assert!(lines[2].contains("damping=30"));
    }

    #[test]
    fn reader_thread_updates_shared_params() {
        let p = Arc::new(Params::default());
        let reader = CommandReader::spawn(
            std::io::Cursor::new(b"stiffness 75\n".to_vec()),
            std::io::sink(),
            Arc::clone(&p),
        )
        .unwrap();
        assert_eq!(reader.join().unwrap(), 1);
        assert_eq!(p.stiffness(), 75.0);
    }
}
