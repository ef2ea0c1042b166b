//! Quizroom console client
//!
//! Joins a game as admin or player (see `SessionConfig::from_env`), prints
//! the session as it changes and reads commands from stdin.
//!
//! ```text
//! QUIZROOM_ROLE=admin quizroom g1
//! QUIZROOM_ROLE=player QUIZROOM_PLAYER_ID=p1 quizroom g1
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use quizroom_client::{
    init_tracing, log_info, CommandSender, GameSession, Projection, SessionConfig,
    TungsteniteConnector,
};
use quizroom_shared::{GamePhase, Role};
use tokio::io::{AsyncBufReadExt, BufReader};

const ADMIN_HELP: &str = "commands: question <id> | answers | winners | end | status | quit";
const PLAYER_HELP: &str = "commands: answer <text> | status | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let game_id = match std::env::args().nth(1) {
        Some(id) if !id.trim().is_empty() => id,
        _ => bail!("usage: quizroom <game-id>"),
    };
    let config = SessionConfig::from_env().context("reading QUIZROOM_* configuration")?;
    log_info!("Connecting to {}", config.socket_url(&game_id));

    let connector = Arc::new(TungsteniteConnector::new(config.server_url.clone()));
    let session = GameSession::open(game_id, &config, connector);

    let mut projection = session.subscribe();
    let mut connection = session.watch_connection();
    let mut diagnostics = session.watch_diagnostics();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = projection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = projection.borrow_and_update().clone();
                    print_projection(&current);
                }
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!("[connection] {:?}", *connection.borrow_and_update());
                }
                changed = diagnostics.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(diagnostic) = diagnostics.borrow_and_update().clone() {
                        println!("[warning] {}", diagnostic.message);
                    }
                }
            }
        }
    });

    let help = match config.role {
        Role::Admin => ADMIN_HELP,
        Role::Player => PLAYER_HELP,
    };
    println!("{}", help);

    let sender = session.sender();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if line == "status" {
            println!("[connection] {:?}", session.connection_state());
            print_projection(&session.projection());
            continue;
        }
        if !dispatch(config.role, &sender, line) {
            println!("{}", help);
        }
    }

    printer.abort();
    session.shutdown().await;
    Ok(())
}

/// Turn one input line into a command. Returns `false` if it was not one.
fn dispatch(role: Role, sender: &CommandSender, line: &str) -> bool {
    let (verb, rest) = match line.split_once(' ') {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match (role, verb) {
        (Role::Admin, "question" | "q") if !rest.is_empty() => sender.change_question(rest),
        (Role::Admin, "answers") => sender.show_answers(),
        (Role::Admin, "winners") => sender.show_winners(),
        (Role::Admin, "end") => sender.end_game(),
        (Role::Player, "answer" | "a") if !rest.is_empty() => {
            if !sender.answer_active_question(rest) {
                println!("no active question yet");
            }
        }
        _ => return false,
    }
    true
}

fn print_projection(projection: &Projection) {
    println!("--- {:?} ---", projection.phase);
    if let Some(question) = projection.active_question() {
        println!("question {}: {}", question.id, question.text);
        for answer in projection.answers_for(&question.id) {
            let name = projection
                .player(&answer.player_id)
                .map(|p| p.display_name())
                .unwrap_or(&answer.player_id);
            let mark = match answer.correct {
                Some(true) => " (correct)",
                Some(false) => " (wrong)",
                None => "",
            };
            println!("  {}: {}{}", name, answer.text, mark);
        }
    }

    match projection.phase {
        GamePhase::WinnersShown | GamePhase::Ended => {
            for (rank, player) in projection.leaderboard().iter().enumerate() {
                println!("{:>3}. {} - {}", rank + 1, player.display_name(), player.score);
            }
        }
        _ => {
            let names: Vec<&str> = projection.players.values().map(|p| p.display_name()).collect();
            println!("players ({}): {}", names.len(), names.join(", "));
        }
    }
}
