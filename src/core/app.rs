//! Main application orchestrator: terminal lifecycle and the turn loop

use anyhow::{Context, Result};
use crossterm::event::KeyEvent;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::Stdout;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::acquisition::Acquisition;
use crate::core::events::{action_for, Completed, Event, EventHandler};
use crate::core::scheduler::Scheduler;
use crate::core::state::{reduce, AppState, Command, Input};
use crate::core::store::TelemetryStore;
use crate::integrations::processes::SortKey;
use crate::telemetry::HistoryStore;
use crate::ui::renderer::{RenderContext, Renderer};
use crate::ui::theme::Theme;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventResult {
    Continue,
    Quit,
}

pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: AppState,
    scheduler: Scheduler,
    /// `None` while a sampling pass owns it
    acquisition: Option<Acquisition>,
    store: TelemetryStore,
    sort_tx: watch::Sender<SortKey>,
    theme: Theme,
    events: EventHandler,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let backend = CrosstermBackend::new(std::io::stdout());
        let terminal = Terminal::new(backend).context("failed to create terminal")?;

        let history = HistoryStore::new(
            config.metrics.enabled.iter().copied(),
            config.history_capacity(),
        );
        let store = TelemetryStore::new(history);
        let (sort_tx, sort_rx) = watch::channel(config.display.process_sort);
        let acquisition = Acquisition::from_config(&config, store.clone(), sort_rx);
        debug!(?acquisition, "sources ready");

        Ok(Self {
            terminal,
            state: AppState::new(&config),
            scheduler: Scheduler::new(config.interval(), Instant::now()),
            acquisition: Some(acquisition),
            store,
            sort_tx,
            theme: Theme::from_name(&config.display.theme),
            events: EventHandler::new(),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.setup_terminal()?;
        self.events.spawn_sources();

        let result = match self.render() {
            Ok(()) => self.event_loop().await,
            Err(e) => Err(e),
        };

        self.shutdown()?;
        result
    }

    fn setup_terminal(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide,
        )?;
        self.terminal.clear()?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show,
        )?;
        Ok(())
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let Some(event) = self.events.next(self.scheduler.deadline()).await else {
                break;
            };

            match self.handle_event(event)? {
                EventResult::Continue => {}
                EventResult::Quit => break,
            }
        }
        info!(tick = self.state.last_tick, "exiting");
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<EventResult> {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize(..) | Event::Redraw => {
                self.render()?;
                Ok(EventResult::Continue)
            }
            Event::SampleDue => Ok(self.dispatch(Input::TickDue)),
            Event::SampleComplete(done) => {
                let Completed {
                    acquisition,
                    report,
                } = *done;
                self.acquisition = Some(acquisition);
                self.scheduler.complete(Instant::now());

                let result = self.dispatch(Input::TickCommitted { tick: report.tick });
                if result == EventResult::Continue {
                    self.render()?;
                }
                Ok(result)
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<EventResult> {
        let Some(action) = action_for(&key, self.state.show_help) else {
            return Ok(EventResult::Continue);
        };
        debug!(?action, "key action");

        let result = self.dispatch(Input::Action(action));
        if result == EventResult::Continue {
            self.render()?;
        }
        Ok(result)
    }

    /// Reduce one input and carry out the resulting commands
    fn dispatch(&mut self, input: Input) -> EventResult {
        for command in reduce(&mut self.state, input) {
            match command {
                Command::Tick => {
                    if self.scheduler.on_deadline(Instant::now()) {
                        self.start_sampling();
                    }
                }
                Command::SampleNow => {
                    if self.scheduler.request_refresh() {
                        self.start_sampling();
                    }
                }
                Command::SetInterval(interval) => {
                    self.scheduler.set_interval(interval);
                    debug!(interval = ?self.scheduler.interval(), "interval changed");
                }
                Command::Pause => {
                    self.scheduler.pause();
                    info!(paused = self.scheduler.is_paused(), "sampling paused");
                }
                Command::Resume => {
                    self.scheduler.resume();
                    info!(paused = self.scheduler.is_paused(), "sampling resumed");
                }
                Command::SetProcessSort(key) => {
                    self.sort_tx.send_replace(key);
                }
                Command::Exit => return EventResult::Quit,
            }
        }
        EventResult::Continue
    }

    /// Hand the sources to a background task so input keeps flowing while
    /// adapters wait on external tools
    fn start_sampling(&mut self) {
        let Some(mut acquisition) = self.acquisition.take() else {
            warn!("sampling requested while a pass is in flight");
            return;
        };

        let tx = self.events.sender();
        tokio::spawn(async move {
            let report = acquisition.run_tick().await;
            let done = Completed {
                acquisition,
                report,
            };
            if tx.send(Event::SampleComplete(Box::new(done))).is_err() {
                debug!("event loop gone before tick completed");
            }
        });

        reduce(&mut self.state, Input::SamplingStarted);
    }

    fn render(&mut self) -> Result<()> {
        let telemetry = self.store.read();
        let context = RenderContext {
            state: &self.state,
            telemetry: &telemetry,
            theme: &self.theme,
            now: Instant::now(),
        };
        self.terminal.draw(|frame| {
            Renderer::render(frame, &context);
        })?;
        Ok(())
    }
}
