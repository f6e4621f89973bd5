//! Random move bot - plays a random legal move.
//!
//! The simplest engine that speaks UCI; handy as a self-play baseline and
//! for trying out the pilot without a real engine.

use rand::seq::SliceRandom;
use rand::Rng;
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Position};
use uci::{stdio_engine, EngineInfo, GuiCommand, PositionBase, UciError};

/// Builds the position `base` followed by `moves`.
///
/// A bad FEN falls back to the start position; replay stops at the first
/// move that isn't legal.
fn setup(base: &PositionBase, moves: &[String]) -> Chess {
    let mut position = match base {
        PositionBase::StartPos => Chess::default(),
        PositionBase::Fen(fen) => fen
            .parse::<Fen>()
            .ok()
            .and_then(|fen| fen.into_position::<Chess>(CastlingMode::Standard).ok())
            .unwrap_or_default(),
    };

    for mv in moves {
        let legal = mv
            .parse::<UciMove>()
            .ok()
            .and_then(|uci| uci.to_move(&position).ok());
        match legal {
            Some(m) => position.play_unchecked(&m),
            None => break,
        }
    }
    position
}

/// A uniformly random legal move, or the null move `0000` if there is none.
fn choose_move<R: Rng>(position: &Chess, rng: &mut R) -> String {
    let legal = position.legal_moves();
    match legal.choose(rng) {
        Some(m) => m.to_uci(CastlingMode::Standard).to_string(),
        None => "0000".to_string(),
    }
}

/// The one-ply "search" behind `mv`: every legal move counts as a node.
fn report(position: &Chess, mv: &str) -> EngineInfo {
    EngineInfo {
        depth: Some(1),
        nodes: Some(position.legal_moves().len() as u64),
        pv: vec![mv.to_string()],
        ..EngineInfo::default()
    }
}

fn main() -> Result<(), UciError> {
    let mut engine = stdio_engine();
    let mut position = Chess::default();
    let mut rng = rand::thread_rng();

    loop {
        let cmd = match engine.read_command() {
            Ok(cmd) => cmd,
            Err(UciError::Eof) => break,
            Err(e) => {
                eprintln!("Error reading command: {}", e);
                continue;
            }
        };

        match cmd {
            GuiCommand::Uci => {
                engine.send_id("RandomBot", "Bot Pilot")?;
                engine.send_uciok()?;
            }
            GuiCommand::IsReady => engine.send_readyok()?,
            GuiCommand::UciNewGame => position = Chess::default(),
            GuiCommand::Position { base, moves } => position = setup(&base, &moves),
            GuiCommand::Go(_) => {
                let mv = choose_move(&position, &mut rng);
                engine.send_info(report(&position, &mv))?;
                engine.send_bestmove(&mv)?;
            }
            // Moves are instant, so there is never a search to stop.
            GuiCommand::Stop => {}
            GuiCommand::Quit => break,
            GuiCommand::Unknown(_) => {}
        }
    }
    Ok(())
}
