//! Dashboard state and the reducer that turns inputs into scheduler commands

use std::time::Duration;

use super::scheduler::{clamp_interval, INTERVAL_STEP};
use crate::config::Config;
use crate::integrations::processes::SortKey;

/// Graph windows offered by `w`, limited by the history retention
pub const WINDOWS: [Duration; 3] = [
    Duration::from_secs(60),
    Duration::from_secs(300),
    Duration::from_secs(600),
];

/// Which body the dashboard shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Overview,
    Processes,
    Sources,
}

impl View {
    pub const ALL: [View; 3] = [View::Overview, View::Processes, View::Sources];

    pub fn next(self) -> Self {
        match self {
            Self::Overview => Self::Processes,
            Self::Processes => Self::Sources,
            Self::Sources => Self::Overview,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Overview => Self::Sources,
            Self::Processes => Self::Overview,
            Self::Sources => Self::Processes,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Processes => "Processes",
            Self::Sources => "Sources",
        }
    }
}

/// High-level intent derived from a keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Refresh,
    TogglePause,
    FasterInterval,
    SlowerInterval,
    CycleWindow,
    NextView,
    PrevView,
    ToggleSort,
    ToggleHelp,
    CloseHelp,
}

/// Everything the reducer reacts to, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Action(Action),
    /// The scheduler's tick boundary was reached
    TickDue,
    SamplingStarted,
    TickCommitted { tick: u64 },
}

/// Side effects the turn loop carries out after reducing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tick,
    SampleNow,
    SetInterval(Duration),
    Pause,
    Resume,
    SetProcessSort(SortKey),
    Exit,
}

/// UI-facing application state. Telemetry itself lives in the `TelemetryStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub view: View,
    pub show_help: bool,
    pub paused: bool,
    pub interval: Duration,
    pub window: Duration,
    pub retention: Duration,
    pub sort: SortKey,
    pub sampling: bool,
    pub quitting: bool,
    pub last_tick: u64,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            view: View::default(),
            show_help: false,
            paused: false,
            interval: config.interval(),
            window: config.window(),
            retention: config.retention(),
            sort: config.display.process_sort,
            sampling: false,
            quitting: false,
            last_tick: 0,
        }
    }

    fn next_window(&self) -> Duration {
        let offered: Vec<Duration> = WINDOWS
            .iter()
            .copied()
            .filter(|w| *w <= self.retention)
            .collect();
        offered
            .iter()
            .copied()
            .find(|w| *w > self.window)
            .or_else(|| offered.first().copied())
            .unwrap_or(self.retention)
    }
}

/// Apply one input to the state. Pure: all effects are returned as commands.
pub fn reduce(state: &mut AppState, input: Input) -> Vec<Command> {
    if state.quitting && !matches!(input, Input::TickCommitted { .. }) {
        return Vec::new();
    }

    match input {
        Input::Action(action) => reduce_action(state, action),
        Input::TickDue => {
            if state.sampling {
                Vec::new()
            } else {
                vec![Command::Tick]
            }
        }
        Input::SamplingStarted => {
            state.sampling = true;
            Vec::new()
        }
        Input::TickCommitted { tick } => {
            state.sampling = false;
            state.last_tick = tick;
            if state.quitting {
                vec![Command::Exit]
            } else {
                Vec::new()
            }
        }
    }
}

fn reduce_action(state: &mut AppState, action: Action) -> Vec<Command> {
    match action {
        Action::Quit => {
            state.quitting = true;
            // an in-flight tick finishes before the loop exits
            if state.sampling {
                Vec::new()
            } else {
                vec![Command::Exit]
            }
        }
        Action::Refresh => {
            if state.sampling {
                Vec::new()
            } else {
                vec![Command::SampleNow]
            }
        }
        Action::TogglePause => {
            state.paused = !state.paused;
            if state.paused {
                vec![Command::Pause]
            } else {
                vec![Command::Resume]
            }
        }
        Action::FasterInterval => {
            change_interval(state, state.interval.saturating_sub(INTERVAL_STEP))
        }
        Action::SlowerInterval => change_interval(state, state.interval + INTERVAL_STEP),
        Action::CycleWindow => {
            state.window = state.next_window();
            Vec::new()
        }
        Action::NextView => {
            state.view = state.view.next();
            Vec::new()
        }
        Action::PrevView => {
            state.view = state.view.prev();
            Vec::new()
        }
        Action::ToggleSort => {
            state.sort = state.sort.toggle();
            vec![Command::SetProcessSort(state.sort)]
        }
        Action::ToggleHelp => {
            state.show_help = !state.show_help;
            Vec::new()
        }
        Action::CloseHelp => {
            state.show_help = false;
            Vec::new()
        }
    }
}

fn change_interval(state: &mut AppState, requested: Duration) -> Vec<Command> {
    let interval = clamp_interval(requested);
    if interval == state.interval {
        return Vec::new();
    }
    state.interval = interval;
    vec![Command::SetInterval(interval)]
}
