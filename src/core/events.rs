//! Unified event queue: input, redraws and acquisition results

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::acquisition::{Acquisition, TickReport};
use super::state::Action;

pub const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// A finished sampling pass, handing the sources back to the turn loop
#[derive(Debug)]
pub struct Completed {
    pub acquisition: Acquisition,
    pub report: TickReport,
}

/// All possible events in the system
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize(u16, u16),
    Redraw,
    /// The scheduler deadline passed
    SampleDue,
    SampleComplete(Box<Completed>),
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Start the terminal reader and the redraw tick
    pub fn spawn_sources(&self) {
        tokio::spawn(Self::terminal_events(self.sender()));
        tokio::spawn(Self::redraw_events(self.sender(), REDRAW_INTERVAL));
    }

    async fn terminal_events(tx: mpsc::UnboundedSender<Event>) {
        use crossterm::event::{Event as CrosstermEvent, EventStream};
        use futures::StreamExt;

        let mut reader = EventStream::new();
        while let Some(event_result) = reader.next().await {
            let event = match event_result {
                Ok(CrosstermEvent::Key(key)) => Event::Key(key),
                Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                _ => continue,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    }

    async fn redraw_events(tx: mpsc::UnboundedSender<Event>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if tx.send(Event::Redraw).is_err() {
                break;
            }
        }
    }

    /// Next queued event, or `SampleDue` once `deadline` passes
    pub async fn next(&mut self, deadline: Option<Instant>) -> Option<Event> {
        match deadline {
            Some(due) => {
                tokio::select! {
                    biased;
                    event = self.rx.recv() => event,
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(due)) => {
                        Some(Event::SampleDue)
                    }
                }
            }
            None => self.rx.recv().await,
        }
    }
}

/// Key binding helper
#[derive(Debug, Clone, Copy)]
pub struct KeyBinding {
    pub key: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub const fn new(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub const fn ctrl(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    /// Shift is ignored for characters since terminals disagree on reporting it
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.code != self.key {
            return false;
        }
        match self.key {
            KeyCode::Char(_) => event.modifiers - KeyModifiers::SHIFT == self.modifiers,
            KeyCode::BackTab => true,
            _ => event.modifiers == self.modifiers,
        }
    }

    pub fn label(&self) -> String {
        let key = match self.key {
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::BackTab => "S-Tab".to_string(),
            KeyCode::Esc => "Esc".to_string(),
            other => format!("{:?}", other),
        };
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            format!("C-{}", key)
        } else {
            key
        }
    }
}

/// Default key map. The help overlay lists keys from here.
pub const BINDINGS: &[(KeyBinding, Action)] = &[
    (KeyBinding::new(KeyCode::Char('q')), Action::Quit),
    (KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit),
    (KeyBinding::new(KeyCode::Char('r')), Action::Refresh),
    (KeyBinding::new(KeyCode::Char('p')), Action::TogglePause),
    (KeyBinding::new(KeyCode::Char(' ')), Action::TogglePause),
    (KeyBinding::new(KeyCode::Char('+')), Action::FasterInterval),
    (KeyBinding::new(KeyCode::Char('=')), Action::FasterInterval),
    (KeyBinding::new(KeyCode::Char('-')), Action::SlowerInterval),
    (KeyBinding::new(KeyCode::Char('w')), Action::CycleWindow),
    (KeyBinding::new(KeyCode::Tab), Action::NextView),
    (KeyBinding::new(KeyCode::BackTab), Action::PrevView),
    (KeyBinding::new(KeyCode::Char('s')), Action::ToggleSort),
    (KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp),
    (KeyBinding::new(KeyCode::Esc), Action::CloseHelp),
];

/// Map a key press to an action. With help open only quit and closing help apply.
pub fn action_for(event: &KeyEvent, help_open: bool) -> Option<Action> {
    if event.kind != KeyEventKind::Press {
        return None;
    }
    let action = BINDINGS
        .iter()
        .find(|(binding, _)| binding.matches(event))
        .map(|(_, action)| *action)?;

    if help_open && !matches!(action, Action::Quit | Action::ToggleHelp | Action::CloseHelp) {
        return None;
    }
    Some(action)
}

/// Every key bound to `action`, e.g. `+/=`
pub fn keys_for(action: Action) -> String {
    BINDINGS
        .iter()
        .filter(|(_, bound)| *bound == action)
        .map(|(binding, _)| binding.label())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_default_keys() {
        assert_eq!(action_for(&key(KeyCode::Char('q')), false), Some(Action::Quit));
        assert_eq!(
            action_for(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), false),
            Some(Action::Quit)
        );
        assert_eq!(action_for(&key(KeyCode::Char('r')), false), Some(Action::Refresh));
        assert_eq!(action_for(&key(KeyCode::Char(' ')), false), Some(Action::TogglePause));
        assert_eq!(action_for(&key(KeyCode::Tab), false), Some(Action::NextView));
        assert_eq!(
            action_for(&KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT), false),
            Some(Action::PrevView)
        );
        assert_eq!(action_for(&key(KeyCode::Char('x')), false), None);
    }

    #[test]
    fn plain_c_is_not_quit() {
        assert_eq!(action_for(&key(KeyCode::Char('c')), false), None);
    }

    #[test]
    fn shifted_symbols_still_match() {
        let plus = KeyEvent::new(KeyCode::Char('+'), KeyModifiers::SHIFT);
        let help = KeyEvent::new(KeyCode::Char('?'), KeyModifiers::SHIFT);
        assert_eq!(action_for(&plus, false), Some(Action::FasterInterval));
        assert_eq!(action_for(&help, false), Some(Action::ToggleHelp));
    }

    #[test]
    fn help_overlay_swallows_other_keys() {
        assert_eq!(action_for(&key(KeyCode::Char('r')), true), None);
        assert_eq!(action_for(&key(KeyCode::Esc), true), Some(Action::CloseHelp));
        assert_eq!(action_for(&key(KeyCode::Char('q')), true), Some(Action::Quit));
    }

    #[test]
    fn key_labels_follow_bindings() {
        assert_eq!(keys_for(Action::FasterInterval), "+/=");
        assert_eq!(keys_for(Action::TogglePause), "p/Space");
        assert_eq!(keys_for(Action::Quit), "q/C-c");
        assert_eq!(keys_for(Action::PrevView), "S-Tab");
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(action_for(&release, false), None);
    }

    #[tokio::test]
    async fn deadline_yields_sample_due() {
        let mut events = EventHandler::new();
        let due = Instant::now() + Duration::from_millis(10);
        assert!(matches!(events.next(Some(due)).await, Some(Event::SampleDue)));
    }

    #[tokio::test]
    async fn queued_events_come_first() {
        let mut events = EventHandler::new();
        events.sender().send(Event::Redraw).unwrap();
        let overdue = Instant::now();
        assert!(matches!(events.next(Some(overdue)).await, Some(Event::Redraw)));
    }
}
