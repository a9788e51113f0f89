use std::collections::BTreeMap;
use std::sync::mpsc;

use crossterm::event::KeyCode;
use meo_core::{AbortHandle, EngineEvent, RunOutcome};

use crate::confirm::ConfirmDialog;

/// Requests from the UI to the runner thread. Stopping a run goes through
/// the abort handle instead, since the runner is busy inside the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
    Finished(String),
}

pub struct App {
    pub entry: String,
    pub run_state: RunState,
    pub current: Option<String>,
    pub last_action: Option<String>,
    /// exec_times per node, as last committed
    pub counters: BTreeMap<String, u32>,
    pub selected: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
    log_rx: mpsc::Receiver<String>,
    event_rx: mpsc::Receiver<EngineEvent>,
    cmd_tx: mpsc::Sender<Command>,
    abort: AbortHandle,
}

impl App {
    pub fn new(
        entry: impl Into<String>,
        nodes: impl IntoIterator<Item = String>,
        log_rx: mpsc::Receiver<String>,
        event_rx: mpsc::Receiver<EngineEvent>,
        cmd_tx: mpsc::Sender<Command>,
        abort: AbortHandle,
    ) -> Self {
        Self {
            entry: entry.into(),
            run_state: RunState::Idle,
            current: None,
            last_action: None,
            counters: nodes.into_iter().map(|n| (n, 0)).collect(),
            selected: 0,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            confirm: None,
            should_quit: false,
            log_rx,
            event_rx,
            cmd_tx,
            abort,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.run_state, RunState::Running | RunState::Stopping)
    }

    /// Pull pending log lines and engine events.
    pub fn drain(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
        while let Ok(ev) = self.event_rx.try_recv() {
            self.apply(ev);
        }
    }

    pub fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::NodeEntered { node } => self.current = Some(node),
            EngineEvent::Recognized { .. } => {}
            EngineEvent::ActionDispatched { node, action } => {
                self.last_action = Some(format!("{} {}", node, action.name()));
            }
            EngineEvent::CountersCommitted { counters, .. } => {
                for (name, value) in counters {
                    self.counters.insert(name, value);
                }
            }
            EngineEvent::Finished { outcome, last_node } => {
                let summary = match outcome {
                    Ok(RunOutcome::Stopped) => "stopped".to_string(),
                    Ok(RunOutcome::Completed) => "completed".to_string(),
                    Ok(RunOutcome::DeadEnd) => "dead end".to_string(),
                    Err(e) => e,
                };
                self.current = Some(last_node);
                self.run_state = RunState::Finished(summary);
            }
        }
    }

    pub fn on_key(&mut self, code: KeyCode) {
        if let Some(yes) = self.confirm.as_ref().map(|d| d.selected) {
            match code {
                KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
                    if let Some(dialog) = &mut self.confirm {
                        dialog.toggle();
                    }
                }
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_quit(true),
                KeyCode::Enter => self.confirm_quit(yes),
                KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => self.confirm_quit(false),
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.request_quit(),
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => self.move_up(),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => self.move_down(),
            KeyCode::Char('s') | KeyCode::Char('S') => self.start_stop(),
            KeyCode::Char('l') | KeyCode::Char('L') => self.toggle_log(),
            _ => {}
        }
    }

    pub fn start_stop(&mut self) {
        match self.run_state {
            RunState::Running => {
                self.abort.abort();
                self.run_state = RunState::Stopping;
            }
            RunState::Stopping => {}
            RunState::Idle | RunState::Finished(_) => {
                self.counters.values_mut().for_each(|c| *c = 0);
                self.last_action = None;
                self.abort.clear();
                if self.cmd_tx.send(Command::Start).is_ok() {
                    self.run_state = RunState::Running;
                }
            }
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.counters.len() {
            self.selected += 1;
        }
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    fn request_quit(&mut self) {
        if self.is_running() {
            self.confirm = Some(ConfirmDialog::new("Abort the run and quit?"));
        } else {
            self.quit();
        }
    }

    fn confirm_quit(&mut self, yes: bool) {
        self.confirm = None;
        if yes {
            self.quit();
        }
    }

    fn quit(&mut self) {
        self.abort.abort();
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use meo_core::task::Action;

    use super::*;

    struct Harness {
        app: App,
        log_tx: mpsc::Sender<String>,
        event_tx: mpsc::Sender<EngineEvent>,
        cmd_rx: mpsc::Receiver<Command>,
        abort: AbortHandle,
    }

    fn harness() -> Harness {
        let (log_tx, log_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let abort = AbortHandle::new();
        let nodes = ["Start", "Battle", "End"].map(String::from);
        let app = App::new("Start", nodes, log_rx, event_rx, cmd_tx, abort.clone());
        Harness { app, log_tx, event_tx, cmd_rx, abort }
    }

    #[test]
    fn events_update_the_view() {
        let mut h = harness();
        h.app.start_stop();
        assert_eq!(h.cmd_rx.try_recv(), Ok(Command::Start));

        h.event_tx.send(EngineEvent::NodeEntered { node: "Battle".into() }).unwrap();
        h.event_tx
            .send(EngineEvent::ActionDispatched { node: "Battle".into(), action: Action::DoNothing })
            .unwrap();
        h.event_tx
            .send(EngineEvent::CountersCommitted {
                node: "Battle".into(),
                counters: vec![("Battle".into(), 1), ("Start".into(), 0)],
            })
            .unwrap();
        h.log_tx.send("INFO\x1fengine\x1f12:00:00\x1fdispatch".into()).unwrap();
        h.app.drain();

        assert_eq!(h.app.current.as_deref(), Some("Battle"));
        assert_eq!(h.app.last_action.as_deref(), Some("Battle DoNothing"));
        assert_eq!(h.app.counters["Battle"], 1);
        assert_eq!(h.app.log_messages.len(), 1);

        h.event_tx
            .send(EngineEvent::Finished { outcome: Ok(RunOutcome::Stopped), last_node: "End".into() })
            .unwrap();
        h.app.drain();
        assert_eq!(h.app.run_state, RunState::Finished("stopped".into()));
        assert!(!h.app.is_running());
    }

    #[test]
    fn s_toggles_between_start_and_abort() {
        let mut h = harness();
        h.app.on_key(KeyCode::Char('s'));
        assert_eq!(h.app.run_state, RunState::Running);
        assert!(!h.abort.is_aborted());

        h.app.on_key(KeyCode::Char('s'));
        assert_eq!(h.app.run_state, RunState::Stopping);
        assert!(h.abort.is_aborted());
    }

    #[test]
    fn quitting_a_running_app_asks_first() {
        let mut h = harness();
        h.app.on_key(KeyCode::Char('s'));
        h.app.on_key(KeyCode::Char('q'));
        assert!(h.app.confirm.is_some());
        assert!(!h.app.should_quit);

        h.app.on_key(KeyCode::Esc);
        assert!(h.app.confirm.is_none());
        assert!(!h.app.should_quit);

        h.app.on_key(KeyCode::Char('q'));
        h.app.on_key(KeyCode::Char('y'));
        assert!(h.app.should_quit);
        assert!(h.abort.is_aborted());
    }

    #[test]
    fn idle_quit_is_immediate() {
        let mut h = harness();
        h.app.on_key(KeyCode::Char('q'));
        assert!(h.app.should_quit);
        assert_eq!(h.cmd_rx.try_recv(), Ok(Command::Quit));
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut h = harness();
        h.app.move_up();
        assert_eq!(h.app.selected, 0);
        for _ in 0..10 {
            h.app.move_down();
        }
        assert_eq!(h.app.selected, 2);
    }
}
