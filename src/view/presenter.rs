//! Presenter view: a passive display driven entirely by its sync engine.
//!
//! The screen is a pure function of the replicated state plus the local
//! countdown. The countdown never leaves this view: it is seeded from the
//! question's time limit when the status becomes SHOWING_QUESTION and is
//! restarted or stopped whenever the index or status changes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::quiz::{AnimationStyle, QuizState, SessionStatus, OPTION_COUNT};
use crate::sync::SyncEngine;

const MARKERS: [char; OPTION_COUNT] = ['A', 'B', 'C', 'D'];

/// Seconds left at which the timer is drawn as urgent
const URGENT_SECS: u32 = 5;

/// Letter shown next to an option, `?` outside the deck's four slots
pub fn option_marker(idx: usize) -> char {
    MARKERS.get(idx).copied().unwrap_or('?')
}

/// Entry effect applied to answer cards for each animation style
pub fn entry_effect(style: AnimationStyle) -> &'static str {
    match style {
        AnimationStyle::Fade => "fade-in-up",
        AnimationStyle::Slide => "slide-in-right",
        AnimationStyle::Zoom => "zoom-in",
    }
}

/// One question as drawn on the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCard {
    /// 1-based position in the deck
    pub number: usize,
    pub total: usize,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub points: u32,
    pub time_limit: u32,
    pub time_left: u32,
    pub category: Option<String>,
    /// Effect name while the question is showing, none once revealed
    pub effect: Option<&'static str>,
    /// Correct option index, only while revealing
    pub revealed: Option<usize>,
}

/// What the presenter shows for a given state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Waiting,
    Question(QuestionCard),
    GameOver,
    /// A question status with no question to show
    Blank,
}

impl Screen {
    pub fn from_state(state: &QuizState, time_left: u32) -> Self {
        match state.status {
            SessionStatus::Idle | SessionStatus::Waiting => Screen::Waiting,
            SessionStatus::GameOver => Screen::GameOver,
            SessionStatus::ShowingQuestion | SessionStatus::RevealingAnswer => {
                let Some(question) = state.current_question() else {
                    return Screen::Blank;
                };
                let revealing = state.status == SessionStatus::RevealingAnswer;
                Screen::Question(QuestionCard {
                    number: state.current_question_index as usize + 1,
                    total: state.questions.len(),
                    text: question.text.clone(),
                    options: question.options.clone(),
                    points: question.points,
                    time_limit: question.time_limit,
                    time_left,
                    category: question.category.clone(),
                    effect: (!revealing).then(|| entry_effect(state.animation_style)),
                    revealed: revealing.then_some(question.correct_answer),
                })
            }
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Waiting => {
                writeln!(f, "QUIZCAST PRO")?;
                write!(f, "Waiting for Host to start...")
            }
            Screen::GameOver => {
                writeln!(f, "Victory!")?;
                writeln!(f, "The quiz session has ended.")?;
                writeln!(f, "Thank you for playing")?;
                write!(f, "See you in the next round!")
            }
            Screen::Blank => Ok(()),
            Screen::Question(card) => {
                let urgent = if card.time_left <= URGENT_SECS { "!" } else { "" };
                write!(
                    f,
                    "Question {} / {}   {}s{}   {} pts",
                    card.number, card.total, card.time_left, urgent, card.points
                )?;
                if let Some(category) = &card.category {
                    write!(f, "   [{}]", category)?;
                }
                writeln!(f)?;
                writeln!(f, "{}", card.text)?;
                for (idx, option) in card.options.iter().enumerate() {
                    let mark = match card.revealed {
                        Some(correct) if correct == idx => "  <- correct",
                        _ => "",
                    };
                    write!(f, "  {}) {}{}", option_marker(idx), option, mark)?;
                    if idx + 1 < OPTION_COUNT {
                        writeln!(f)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Local per-question countdown
pub struct Countdown {
    remaining: Arc<watch::Sender<u32>>,
    key: Option<(i32, SessionStatus)>,
    task: Option<JoinHandle<()>>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
            key: None,
            task: None,
        }
    }

    /// Seconds left on the current question
    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    /// Receiver notified on every tick and reset
    pub fn watch(&self) -> watch::Receiver<u32> {
        self.remaining.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Follow `state`. Returns true if a new countdown was started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn sync(&mut self, state: &QuizState) -> bool {
        let key = (state.current_question_index, state.status);
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.stop();

        if state.status != SessionStatus::ShowingQuestion {
            return false;
        }
        let Some(question) = state.current_question() else {
            return false;
        };

        self.remaining.send_replace(question.time_limit);
        let remaining = self.remaining.clone();
        self.task = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let left = remaining.borrow().saturating_sub(1);
                remaining.send_replace(left);
                if left == 0 {
                    break;
                }
            }
        }));
        true
    }

    /// Freeze the countdown at its current value
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Why a frame is being drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// The replicated state changed
    Full,
    /// Only the countdown moved
    Timer,
}

/// Presenter view bound to its sync engine
pub struct Presenter {
    engine: Arc<SyncEngine>,
    countdown: Countdown,
}

impl Presenter {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            countdown: Countdown::new(),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Screen for the engine's current state
    pub fn screen(&self) -> Screen {
        Screen::from_state(&self.engine.state(), self.countdown.remaining())
    }

    /// Render every change until shutdown.
    ///
    /// The engine's listener must be running separately for remote updates
    /// to arrive.
    pub async fn run<F>(mut self, mut shutdown: broadcast::Receiver<()>, mut render: F)
    where
        F: FnMut(&Screen, Redraw),
    {
        let mut changes = self.engine.subscribe_changes();
        let mut ticks = self.countdown.watch();

        self.countdown.sync(&self.engine.state());
        ticks.borrow_and_update();
        render(&self.screen(), Redraw::Full);
        info!("Presenter {} attached", self.engine.view_id());

        loop {
            tokio::select! {
                change = changes.recv() => {
                    let state = match change {
                        Ok(change) => change.state,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Presenter skipped {} changes, resyncing", skipped);
                            self.engine.state()
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    self.countdown.sync(&state);
                    ticks.borrow_and_update();
                    render(&Screen::from_state(&state, self.countdown.remaining()), Redraw::Full);
                }
                res = ticks.changed() => {
                    if res.is_err() {
                        break;
                    }
                    let left = *ticks.borrow_and_update();
                    render(&Screen::from_state(&self.engine.state(), left), Redraw::Timer);
                }
                _ = shutdown.recv() => break,
            }
        }

        self.countdown.stop();
        debug!("Presenter {} detached", self.engine.view_id());
    }
}
