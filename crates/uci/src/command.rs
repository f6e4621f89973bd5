//! Commands flowing from the controlling side (GUI, arena, bot pilot) to an engine.

use std::fmt;

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// The next search belongs to a different game.
    UciNewGame,
    /// Set up position.
    Position {
        base: PositionBase,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// The position a `position` command starts from before its move list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PositionBase {
    /// The standard starting position.
    #[default]
    StartPos,
    /// An arbitrary position in Forsyth-Edwards notation.
    Fen(String),
}

impl fmt::Display for PositionBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionBase::StartPos => f.write_str("startpos"),
            PositionBase::Fen(fen) => write!(f, "fen {}", fen),
        }
    }
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// White time remaining in milliseconds.
    pub wtime: Option<u64>,
    /// White increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black time remaining in milliseconds.
    pub btime: Option<u64>,
    /// Black increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves to go until next time control.
    pub movestogo: Option<u32>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    /// Options carrying both clocks and both increments, the way a game server
    /// reports them.
    pub fn clocks(wtime: u64, btime: u64, winc: u64, binc: u64) -> Self {
        Self {
            wtime: Some(wtime),
            winc: Some(winc),
            btime: Some(btime),
            binc: Some(binc),
            ..Self::default()
        }
    }

    fn write_tokens(&self, out: &mut String) {
        let numeric = [
            ("wtime", self.wtime),
            ("winc", self.winc),
            ("btime", self.btime),
            ("binc", self.binc),
            ("movestogo", self.movestogo.map(u64::from)),
            ("depth", self.depth.map(u64::from)),
            ("movetime", self.movetime),
        ];
        for (key, value) in numeric {
            if let Some(v) = value {
                out.push(' ');
                out.push_str(key);
                out.push(' ');
                out.push_str(&v.to_string());
            }
        }
        if self.infinite {
            out.push_str(" infinite");
        }
    }
}

impl GuiCommand {
    /// Render the command as a single protocol line, without the terminator.
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::Position { base, moves } => {
                if moves.is_empty() {
                    format!("position {}", base)
                } else {
                    format!("position {} moves {}", base, moves.join(" "))
                }
            }
            GuiCommand::Go(opts) => {
                let mut line = "go".to_string();
                opts.write_tokens(&mut line);
                line
            }
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(raw) => raw.clone(),
        }
    }

    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        match parts.next().unwrap_or("") {
            "uci" => Ok(GuiCommand::Uci),
            "isready" => Ok(GuiCommand::IsReady),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "position" => Self::parse_position(parts),
            "go" => Ok(GuiCommand::Go(Self::parse_go(parts))),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let base = match parts.next() {
            Some("startpos") => PositionBase::StartPos,
            Some("fen") => {
                let fen: Vec<&str> = parts.by_ref().take_while(|&p| p != "moves").collect();
                if fen.is_empty() {
                    return Err(UciError::Parse("Empty FEN in position command".to_string()));
                }
                let moves = parts.map(str::to_string).collect();
                return Ok(GuiCommand::Position {
                    base: PositionBase::Fen(fen.join(" ")),
                    moves,
                });
            }
            Some(other) => {
                return Err(UciError::Parse(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::Parse(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        };

        let moves = match parts.next() {
            Some("moves") => parts.map(str::to_string).collect(),
            Some(other) => {
                return Err(UciError::Parse(format!("Expected 'moves', got '{}'", other)));
            }
            None => Vec::new(),
        };

        Ok(GuiCommand::Position { base, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> GoOptions {
        let mut opts = GoOptions::default();
        let mut parts = parts.peekable();

        while let Some(key) = parts.next() {
            if key == "infinite" {
                opts.infinite = true;
                continue;
            }
            let Some(value) = parts.peek().copied() else {
                break;
            };
            let slot_u64 = match key {
                "wtime" => Some(&mut opts.wtime),
                "winc" => Some(&mut opts.winc),
                "btime" => Some(&mut opts.btime),
                "binc" => Some(&mut opts.binc),
                "movetime" => Some(&mut opts.movetime),
                _ => None,
            };
            if let Some(slot) = slot_u64 {
                *slot = value.parse().ok();
                parts.next();
                continue;
            }
            match key {
                "depth" => {
                    opts.depth = value.parse().ok();
                    parts.next();
                }
                "movestogo" => {
                    opts.movestogo = value.parse().ok();
                    parts.next();
                }
                _ => {}
            }
        }

        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_without_moves_omits_clause() {
        let cmd = GuiCommand::Position {
            base: PositionBase::StartPos,
            moves: vec![],
        };
        assert_eq!(cmd.to_uci(), "position startpos");
    }

    #[test]
    fn position_with_moves() {
        let cmd = GuiCommand::Position {
            base: PositionBase::StartPos,
            moves: vec!["e2e4".to_string(), "e7e6".to_string()],
        };
        assert_eq!(cmd.to_uci(), "position startpos moves e2e4 e7e6");
    }

    #[test]
    fn position_from_fen() {
        let cmd = GuiCommand::Position {
            base: PositionBase::Fen("8/8/8/8/8/8/8/K6k w - - 0 1".to_string()),
            moves: vec!["a1a2".to_string()],
        };
        assert_eq!(
            cmd.to_uci(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1 moves a1a2"
        );
    }

    #[test]
    fn go_clock_order_matches_server_convention() {
        let cmd = GuiCommand::Go(GoOptions::clocks(5, 7, 1, 2));
        assert_eq!(cmd.to_uci(), "go wtime 5 winc 1 btime 7 binc 2");
    }

    #[test]
    fn go_extra_options() {
        let opts = GoOptions {
            depth: Some(8),
            infinite: true,
            ..GoOptions::default()
        };
        assert_eq!(GuiCommand::Go(opts).to_uci(), "go depth 8 infinite");
    }

    #[test]
    fn simple_commands() {
        assert_eq!(GuiCommand::Uci.to_uci(), "uci");
        assert_eq!(GuiCommand::IsReady.to_uci(), "isready");
        assert_eq!(GuiCommand::UciNewGame.to_uci(), "ucinewgame");
        assert_eq!(GuiCommand::Stop.to_uci(), "stop");
        assert_eq!(GuiCommand::Quit.to_uci(), "quit");
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = GuiCommand::parse("position startpos moves e2e4 e7e5").unwrap();
        assert_eq!(
            cmd,
            GuiCommand::Position {
                base: PositionBase::StartPos,
                moves: vec!["e2e4".to_string(), "e7e5".to_string()]
            }
        );
    }

    #[test]
    fn parse_position_fen_with_moves() {
        let cmd = GuiCommand::parse(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1 moves e7e5",
        )
        .unwrap();
        assert_eq!(
            cmd,
            GuiCommand::Position {
                base: PositionBase::Fen(
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()
                ),
                moves: vec!["e7e5".to_string()]
            }
        );
    }

    #[test]
    fn parse_position_rejects_unknown_base() {
        assert!(GuiCommand::parse("position somewhere").is_err());
        assert!(GuiCommand::parse("position").is_err());
    }

    #[test]
    fn parse_go_reads_clocks() {
        let cmd = GuiCommand::parse("go wtime 300 winc 2 btime 400 binc 3 movestogo 20").unwrap();
        let GuiCommand::Go(opts) = cmd else {
            panic!("Expected Go command");
        };
        assert_eq!(opts.wtime, Some(300));
        assert_eq!(opts.winc, Some(2));
        assert_eq!(opts.btime, Some(400));
        assert_eq!(opts.binc, Some(3));
        assert_eq!(opts.movestogo, Some(20));
        assert!(!opts.infinite);
    }

    #[test]
    fn parse_ucinewgame() {
        assert_eq!(
            GuiCommand::parse("ucinewgame\n").unwrap(),
            GuiCommand::UciNewGame
        );
    }

    #[test]
    fn parse_unknown_keeps_text() {
        assert_eq!(
            GuiCommand::parse("setoption name Hash value 16").unwrap(),
            GuiCommand::Unknown("setoption name Hash value 16".to_string())
        );
    }
}
