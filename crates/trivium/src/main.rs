use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use trivium::content;
use trivium::logging::setup_logging;
use trivium::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "trivium-server")]
#[command(about = "Turn-based multiplayer quiz game server")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// JSON question file: [{id, category, weight, prompt, answer}]
    #[arg(short, long)]
    questions: PathBuf,

    /// JSON list with the category of each tile. Without it, tiles cycle
    /// through the categories.
    #[arg(short, long)]
    categories: Option<PathBuf>,

    /// Players needed to start a game
    #[arg(short, long, default_value = "2")]
    players: usize,

    /// Seconds to answer a question
    #[arg(long, default_value = "60")]
    question_timeout: u64,

    /// Highest dice face
    #[arg(long, default_value = "3")]
    max_dice_face: u8,

    /// Categories every player owns from the start
    #[arg(long, default_value = "0")]
    start_successes: usize,

    /// Seed for dice and question draws
    #[arg(long)]
    seed: Option<u64>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), TriviumError> {
    let args = Args::parse();
    setup_logging(&args.log_level, args.json_logs)?;

    let board = Board::reference();
    let categories = match &args.categories {
        Some(path) => content::load_categories(path, &board).await?,
        None => content::cycled_categories(&board)?,
    };
    let questions = content::load_questions(&args.questions).await?;
    let content = GameContent::new(board, categories, Arc::new(questions))?;

    let options = GameOptions {
        launch: LaunchStrategy::Auto {
            players: args.players,
        },
        question_timeout: Duration::from_secs(args.question_timeout),
        max_dice_face: args.max_dice_face,
        start_successes: args.start_successes,
        seed: args.seed,
        ..GameOptions::default()
    };

    let server = TriviumServer::builder()
        .bind(&args.bind)
        .options(options)
        .build(content)
        .await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
