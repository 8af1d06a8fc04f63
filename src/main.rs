//! QuizCast - two-screen live quiz presentation
//!
//! A manager console authors and drives a quiz while presenter views display
//! it. Views run in one process and stay in lockstep through:
//! - A named in-process broadcast channel carrying full-state snapshots
//! - A sled-backed durable slot that late joiners hydrate from
//! - An optional Gemini-backed question generator

use anyhow::Context;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

mod config;
mod generator;
mod quiz;
mod storage;
mod sync;
mod view;

use config::AppConfig;
use generator::{GeminiGenerator, QuestionGenerator};
use quiz::{QuizState, SessionStatus};
use storage::{QuizStore, StateStore};
use sync::{BroadcastChannel, SyncEngine, ViewRole, CHANNEL_NAME};
use view::console::{confirmed, HELP};
use view::presenter::option_marker;
use view::{Command, CommandError, ManagerController, ManagerError, Presenter, Redraw, Screen};

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Process-wide services shared by every view
pub struct AppState {
    store: Arc<QuizStore>,
    channel: Arc<BroadcastChannel>,
    shutdown: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppState {
    fn new(store: QuizStore) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            store: Arc::new(store),
            channel: BroadcastChannel::new(CHANNEL_NAME),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start a view: hydrate its engine, listen for remote updates and,
    /// for presenters, render frames to stdout.
    fn spawn_view(&self, role: ViewRole) -> Arc<SyncEngine> {
        let store: Arc<dyn StateStore> = self.store.clone();
        let engine = SyncEngine::initialize(role, store, self.channel.clone());

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(engine.clone().run(self.shutdown.subscribe())));

        if role == ViewRole::Presenter {
            let presenter = Presenter::new(engine.clone());
            tasks.push(tokio::spawn(
                presenter.run(self.shutdown.subscribe(), render_frame),
            ));
        }

        info!(
            "Opened {} view {} ({} views on channel)",
            role,
            engine.view_id(),
            self.channel.subscriber_count()
        );
        engine
    }

    /// Signal every view to stop and wait for them
    async fn shutdown(&self) {
        let _ = self.shutdown.send(());
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("View task ended abnormally: {}", e);
            }
        }
        if let Err(e) = self.store.flush() {
            error!("Failed to flush storage: {}", e);
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn render_frame(screen: &Screen, redraw: Redraw) {
    match (redraw, screen) {
        (Redraw::Full, _) => println!("\n==================== PRESENTER ====================\n{}\n", screen),
        (Redraw::Timer, Screen::Question(card)) if card.revealed.is_none() => {
            if card.time_left <= 5 || card.time_left % 10 == 0 {
                println!("[presenter] {}s left", card.time_left);
            }
        }
        _ => {}
    }
}

fn summary(state: &QuizState, undo: usize) -> String {
    let position = match state.current_question() {
        Some(_) => format!("{}/{}", state.current_question_index + 1, state.questions.len()),
        None => format!("-/{}", state.questions.len()),
    };
    format!(
        "{} | question {} | style {} | undo {}",
        state.status, position, state.animation_style, undo
    )
}

/// One line per question, the current one marked with `>`
fn deck_listing(state: &QuizState) -> Vec<String> {
    if state.questions.is_empty() {
        return vec!["No questions yet".to_string()];
    }
    state
        .questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let current = if idx as i32 == state.current_question_index { '>' } else { ' ' };
            format!(
                "{} {}. {} [{}: {}] {} pts, {}s",
                current,
                idx + 1,
                question.text,
                option_marker(question.correct_answer),
                question.correct_option().unwrap_or("?"),
                question.points,
                question.time_limit
            )
        })
        .collect()
}

fn report(manager: &ManagerController, result: Result<QuizState, ManagerError>) {
    match result {
        Ok(state) => println!("{}", summary(&state, manager.history_len())),
        Err(e) => println!("{}", e),
    }
}

// ============================================================================
// MANAGER CONSOLE
// ============================================================================

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> anyhow::Result<Option<String>> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

/// Read and execute console commands until `quit` or end of input
async fn run_console(app: &AppState, manager: ManagerController) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    println!("{}", summary(&manager.state(), manager.history_len()));

    while let Some(line) = prompt(&mut lines, "> ").await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Add(draft) => report(&manager, manager.add_question(draft)),
            Command::Generate { topic, count } => {
                if !manager.can_generate() {
                    println!("Question generation is disabled (set GEMINI_API_KEY)");
                    continue;
                }
                println!("Generating {} questions about {:?}...", count, topic);
                let result = manager.generate(&topic, count).await;
                report(&manager, result);
            }
            Command::Start => report(&manager, manager.start()),
            Command::Reveal => report(&manager, manager.reveal()),
            Command::Next => report(&manager, manager.next()),
            Command::End => report(&manager, manager.end()),
            Command::Clear => {
                let answer = prompt(&mut lines, "Clear all questions? [y/N] ").await?;
                match manager.clear(confirmed(&answer.unwrap_or_default())) {
                    Ok(Some(state)) => println!("{}", summary(&state, manager.history_len())),
                    Ok(None) => println!("Clear cancelled"),
                    Err(e) => println!("{}", e),
                }
            }
            Command::Style(style) => report(&manager, manager.set_animation(style)),
            Command::Undo => match manager.undo() {
                Some(state) => println!("{}", summary(&state, manager.history_len())),
                None => println!("Nothing to undo"),
            },
            Command::Status => {
                let state = manager.state();
                println!("{}", summary(&state, manager.history_len()));
                if state.status == SessionStatus::GameOver {
                    println!("Session over: clear or add questions to run again");
                }
            }
            Command::List => {
                for line in deck_listing(&manager.state()) {
                    println!("{}", line);
                }
            }
            Command::Open(fragment) => match ViewRole::from_fragment(Some(&fragment)) {
                ViewRole::Presenter => {
                    app.spawn_view(ViewRole::Presenter);
                }
                ViewRole::Manager => println!("This console is the manager view"),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    Ok(())
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr, frames and console output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizcast=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env(std::env::args().nth(1));

    info!("Initializing storage at: {}", config.storage.path);
    let store = QuizStore::open(config.storage.clone()).context("Failed to open storage")?;
    let app = AppState::new(store);

    info!("QuizCast v{} starting {} view", env!("CARGO_PKG_VERSION"), config.view);

    match config.view {
        ViewRole::Presenter => {
            // The store is locked by this process, so no manager can drive it
            warn!(
                "Presenter-only mode shows the last saved state of {}; \
                 for a live display run the manager and use `open #presenter`",
                config.storage.path
            );
            app.spawn_view(ViewRole::Presenter);
            tokio::signal::ctrl_c().await?;
        }
        ViewRole::Manager => {
            let generator: Option<Arc<dyn QuestionGenerator>> =
                match config.generator.map(GeminiGenerator::new).transpose() {
                    Ok(generator) => generator.map(|g| Arc::new(g) as Arc<dyn QuestionGenerator>),
                    Err(e) => {
                        warn!("Question generation disabled: {}", e);
                        None
                    }
                };
            if generator.is_none() {
                warn!("No generator configured - AI question generation will be disabled");
            }

            let manager = ManagerController::new(app.spawn_view(ViewRole::Manager), generator);
            tokio::select! {
                result = run_console(&app, manager) => result?,
                _ = tokio::signal::ctrl_c() => println!(),
            }
        }
    }

    info!("Shutting down");
    app.shutdown().await;
    Ok(())
}
