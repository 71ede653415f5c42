use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::Backend, Terminal};
use std::io;
use std::path::PathBuf;

use crate::clock::Clock;
use crate::history::{self, HistoryRecord};
use crate::keybinds::key_code;
use crate::runtime::{EventSource, Runner, TimerEvent};
use crate::storage::Store;
use crate::timer::{Action, SplitTimer, TimerStatus};

const UNTITLED: &str = "speedsplits";

/// Terminal-facing application: forwards input to the timer and tracks
/// what the view needs besides the timer state.
pub struct App<S: Store, C: Clock> {
    pub timer: SplitTimer<S, C>,
    pub history_path: Option<PathBuf>,
    pub last_error: Option<String>,
    pub should_quit: bool,
}

impl<S: Store, C: Clock> App<S, C> {
    pub fn new(timer: SplitTimer<S, C>, history_path: Option<PathBuf>) -> Self {
        Self {
            timer,
            history_path,
            last_error: None,
            should_quit: false,
        }
    }

    /// Name of the run on screen
    pub fn title(&self) -> &str {
        match self.timer.state().run_name.as_str() {
            "" => UNTITLED,
            name => name,
        }
    }

    pub fn on_tick(&mut self) {
        if self.timer.state().status == TimerStatus::Running {
            self.dispatch(Action::Tick);
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        let Some(code) = key_code(&key) else {
            return;
        };

        // q quits unless the user bound it to something
        if code == "KeyQ" && !self.timer.key_binds().is_bound(&code) {
            self.should_quit = true;
            return;
        }

        self.dispatch(Action::KeyPress(code));
    }

    /// Draw, then handle events until the user quits
    pub fn run<B: Backend, E: EventSource>(
        &mut self,
        terminal: &mut Terminal<B>,
        runner: &mut Runner<E>,
    ) -> io::Result<()> {
        terminal.draw(|f| f.render_widget(&*self, f.area()))?;

        while !self.should_quit {
            match runner.step() {
                TimerEvent::Tick => self.on_tick(),
                TimerEvent::Key(key) => self.on_key(key),
                TimerEvent::Resize => {}
            }
            terminal.draw(|f| f.render_widget(&*self, f.area()))?;
        }

        Ok(())
    }

    fn dispatch(&mut self, action: Action) {
        let before = self.timer.state().status;
        let status = match self.timer.dispatch(action) {
            Ok(state) => state.status,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return;
            }
        };

        if status == TimerStatus::Stopped && before != TimerStatus::Stopped {
            let record = HistoryRecord::from_state(self.timer.state());
            self.save_history(&record);
        }
        if status == TimerStatus::Initial {
            self.last_error = None;
        }
    }

    fn save_history(&self, record: &HistoryRecord) {
        if let Some(path) = &self.history_path {
            match history::append(path, record) {
                Ok(()) => tracing::info!(run = %record.run, time = %record.final_time, "run finished"),
                Err(e) => tracing::warn!(error = %e, "could not write run history"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::split::Run;
    use crate::storage::{MemoryStore, StoreExt, StorageKey};
    use tempfile::tempdir;

    fn key(c: KeyCode) -> KeyEvent {
        KeyEvent::new(c, KeyModifiers::NONE)
    }

    fn build_app(history_path: Option<PathBuf>) -> (App<MemoryStore, ManualClock>, ManualClock) {
        let mut store = MemoryStore::new();
        store
            .set(StorageKey::Runs, &vec![Run::new("any%", &["A", "B"])])
            .unwrap();
        let clock = ManualClock::new(0);
        let timer = SplitTimer::initialize(store, clock.clone()).unwrap();
        (App::new(timer, history_path), clock)
    }

    #[test]
    fn test_keys_drive_timer() {
        let (mut app, clock) = build_app(None);
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.timer.state().status, TimerStatus::Running);

        clock.set(1_000);
        app.on_key(key(KeyCode::Char('s')));
        assert_eq!(app.timer.state().current_split, 1);

        app.on_key(key(KeyCode::Char('u')));
        assert_eq!(app.timer.state().current_split, 0);
    }

    #[test]
    fn test_tick_only_while_running() {
        let (mut app, clock) = build_app(None);
        clock.set(500);
        app.on_tick();
        assert_eq!(app.timer.state().current_time_ms, 0);

        app.on_key(key(KeyCode::Enter));
        clock.set(900);
        app.on_tick();
        assert_eq!(app.timer.state().current_time_ms, 400);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _) = build_app(None);
        app.on_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);

        let (mut app, _) = build_app(None);
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_unmapped_key_is_ignored() {
        let (mut app, _) = build_app(None);
        let before = app.timer.state().clone();
        app.on_key(key(KeyCode::Char('#')));
        assert_eq!(app.timer.state(), &before);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_finishing_run_appends_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let (mut app, clock) = build_app(Some(path.clone()));

        app.on_key(key(KeyCode::Enter));
        clock.set(1_000);
        app.on_key(key(KeyCode::Char('s')));
        clock.set(2_000);
        app.on_key(key(KeyCode::Char('s')));
        clock.set(2_100);
        app.on_key(key(KeyCode::Char('s')));
        assert_eq!(app.timer.state().status, TimerStatus::Stopped);

        // stopping again does not add a second row
        app.on_key(key(KeyCode::Esc));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("any%,2,2,2100,0:02.10"));
    }

    #[test]
    fn test_title_follows_active_run() {
        let (mut app, _) = build_app(None);
        assert_eq!(app.title(), "any%");

        crate::runs::add_run(app.timer.store_mut(), Run::new("100%", &["X"])).unwrap();
        assert_eq!(app.title(), "any%");
        app.on_key(key(KeyCode::Char('r')));
        assert_eq!(app.title(), "100%");

        let timer = SplitTimer::initialize(MemoryStore::new(), ManualClock::new(0)).unwrap();
        assert_eq!(App::new(timer, None).title(), "speedsplits");
    }
}
