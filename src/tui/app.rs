//! Main TUI application state machine.
//!
//! Handles:
//! - Screen navigation
//! - Input event handling
//! - Service integration
//! - Background startup via worker thread

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::adapters::sqlite::SqliteStorage;
use crate::application::{HistoryService, RecentSummary, RiskContext};
use crate::config::Config;
use crate::domain::PatientInput;

use super::ui::{
    comparison::{render_comparison, ComparisonState},
    dashboard::{render_dashboard, DashboardState},
    loading::{render_loading, LoadingState},
    patient::{render_patient_form, PatientFormState},
    render_disclaimer,
    results::{render_results, ResultsState},
};
use super::worker::{StartupProgress, StartupWorker, StartupWorkerHandle};

/// How many recent assessments the dashboard lists.
const RECENT_LIMIT: usize = 10;

/// Current screen/view in the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Dashboard,
    PatientForm,
    Results,
    Charts,
}

/// Main application state
pub struct App {
    screen: Screen,
    should_quit: bool,
    config: Config,

    /// Assessment history
    history: HistoryService<SqliteStorage>,

    /// Models and cohorts, once startup completes
    context: Option<Arc<RiskContext>>,

    /// Pending startup worker (if running)
    pending_worker: Option<StartupWorkerHandle>,

    loading_state: LoadingState,
    dashboard_state: DashboardState,
    patient_form_state: PatientFormState,
    results_state: ResultsState,
    comparison_state: ComparisonState,

    /// Form values of the last scored submission, kept so additional charts
    /// can be derived again. Dropped when leaving the results screens.
    last_input: Option<PatientInput>,
}

impl App {
    /// Create a new application instance from environment configuration.
    ///
    /// # Errors
    /// Returns error if the history database cannot be opened.
    pub fn new() -> Result<Self> {
        let config = Config::from_env_or_default();
        let storage = Arc::new(SqliteStorage::new(&config.db_path)?);
        Ok(Self::with_dependencies(config, HistoryService::new(storage)))
    }

    /// Create application with injected dependencies (Composition Root pattern).
    #[must_use]
    pub fn with_dependencies(config: Config, history: HistoryService<SqliteStorage>) -> Self {
        Self {
            screen: Screen::Loading,
            should_quit: false,
            config,
            history,
            context: None,
            pending_worker: None,
            loading_state: LoadingState::default(),
            dashboard_state: DashboardState::default(),
            patient_form_state: PatientFormState::default(),
            results_state: ResultsState::default(),
            comparison_state: ComparisonState::default(),
            last_input: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        self.pending_worker = Some(StartupWorker::spawn(self.config.clone()));

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            self.poll_worker();

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(3)])
                    .split(f.area());

                let content_area = chunks[0];
                let disclaimer_area = chunks[1];

                match self.screen {
                    Screen::Loading => render_loading(f, content_area, &self.loading_state),
                    Screen::Dashboard => render_dashboard(f, content_area, &self.dashboard_state),
                    Screen::PatientForm => {
                        render_patient_form(f, content_area, &self.patient_form_state)
                    }
                    Screen::Results => render_results(f, content_area, &self.results_state),
                    Screen::Charts => render_comparison(f, content_area, &self.comparison_state),
                }

                render_disclaimer(f, disclaimer_area);
            })?;

            // Handle input (short poll to stay responsive)
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Reload the dashboard's history summary. Called whenever the stored
    /// history changes.
    fn refresh_history(&mut self) {
        match self.history.recent_summary(RECENT_LIMIT) {
            Ok(summary) => {
                self.dashboard_state.recent = summary;
                self.dashboard_state.history_error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load assessment history");
                self.dashboard_state.recent = RecentSummary::default();
                self.dashboard_state.history_error = Some(e.to_string());
            }
        }
    }

    fn delete_latest_assessment(&mut self) {
        let Some(id) = self.dashboard_state.recent.latest().map(|a| a.id.clone()) else {
            return;
        };
        if let Err(e) = self.history.delete(&id) {
            tracing::warn!(assessment_id = %id, error = %e, "Could not delete assessment");
            self.dashboard_state.history_error = Some(e.to_string());
            return;
        }
        tracing::info!(assessment_id = %id, "Assessment deleted");
        self.refresh_history();
    }

    fn clear_history(&mut self) {
        if let Err(e) = self.history.clear() {
            self.dashboard_state.history_error = Some(e.to_string());
            return;
        }
        self.refresh_history();
    }

    /// Poll the startup worker for progress updates.
    fn poll_worker(&mut self) {
        while let Some(progress) = self.pending_worker.as_ref().and_then(StartupWorkerHandle::try_recv) {
            match progress {
                StartupProgress::Step(step) => self.loading_state.steps.push(step),
                StartupProgress::Ready(context) => {
                    self.dashboard_state = DashboardState::from_context(&context);
                    self.refresh_history();
                    self.context = Some(context);
                    self.pending_worker = None;
                    self.screen = Screen::Dashboard;
                }
                StartupProgress::Error(message) => {
                    self.loading_state.error = Some(message);
                    self.pending_worker = None;
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        // Global quit handling
        if key == KeyCode::Char('q') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::Loading => {
                if matches!(key, KeyCode::Char('q' | 'Q') | KeyCode::Esc) {
                    self.should_quit = true;
                }
            }
            Screen::Dashboard => self.handle_dashboard_key(key),
            Screen::PatientForm => self.handle_patient_form_key(key),
            Screen::Results => self.handle_results_key(key),
            Screen::Charts => self.handle_charts_key(key),
        }
    }

    fn open_new_form(&mut self) {
        self.last_input = None;
        self.patient_form_state.clear_sensitive();
        self.comparison_state = ComparisonState::default();
        self.screen = Screen::PatientForm;
    }

    fn return_to_dashboard(&mut self) {
        self.last_input = None;
        self.results_state = ResultsState::Idle;
        self.comparison_state = ComparisonState::default();
        self.screen = Screen::Dashboard;
    }

    fn handle_dashboard_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('n' | 'N') => self.open_new_form(),
            KeyCode::Char('d' | 'D') => self.delete_latest_assessment(),
            KeyCode::Char('x' | 'X') => self.clear_history(),
            KeyCode::Char('q' | 'Q') => {
                self.should_quit = true;
            }
            _ => {}
        }
    }

    fn handle_patient_form_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.patient_form_state.clear_sensitive();
                self.screen = Screen::Dashboard;
            }
            KeyCode::Up | KeyCode::BackTab => self.patient_form_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.patient_form_state.next_field(),
            KeyCode::Left => self.patient_form_state.adjust(-1),
            KeyCode::Right => self.patient_form_state.adjust(1),
            KeyCode::PageDown => self.patient_form_state.adjust(-10),
            KeyCode::PageUp => self.patient_form_state.adjust(10),
            KeyCode::Char('s' | 'S') => self.patient_form_state.load_sample_data(),
            KeyCode::Char(c) => self.patient_form_state.input_char(c),
            KeyCode::Backspace => self.patient_form_state.delete_char(),
            KeyCode::Delete => self.patient_form_state.clear_field(),
            KeyCode::Enter => self.submit_patient_form(),
            _ => {}
        }
    }

    fn handle_results_key(&mut self, key: KeyCode) {
        match (&self.results_state, key) {
            (ResultsState::Complete(_), KeyCode::Char('c' | 'C')) => {
                self.screen = Screen::Charts;
            }
            (ResultsState::Complete(_), KeyCode::Char('n' | 'N')) => self.open_new_form(),
            (ResultsState::Error { .. }, KeyCode::Enter) => {
                self.screen = Screen::PatientForm;
            }
            (_, KeyCode::Esc) => self.return_to_dashboard(),
            _ => {}
        }
    }

    fn handle_charts_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Results,
            KeyCode::Up => self.comparison_state.prev(),
            KeyCode::Down | KeyCode::Tab => self.comparison_state.next(),
            KeyCode::Char(' ') => self.comparison_state.toggle(),
            KeyCode::Char('a' | 'A') => self.comparison_state.select_all(),
            KeyCode::Enter => self.build_additional_charts(),
            _ => {}
        }
    }

    fn submit_patient_form(&mut self) {
        let Some(context) = self.context.clone() else {
            return;
        };

        let input = match self.patient_form_state.to_patient_input() {
            Ok(input) => input,
            Err(e) => {
                self.patient_form_state.error_message = Some(e);
                return;
            }
        };

        match context.assess(&input) {
            Ok(assessment) => {
                if let Err(e) = self.history.record(&assessment.record) {
                    tracing::warn!(error = %e, "Assessment not saved to history");
                }
                self.refresh_history();
                self.results_state = ResultsState::Complete(Box::new(assessment));
                self.last_input = Some(input);
                self.comparison_state = ComparisonState::default();
                self.patient_form_state.clear_sensitive();
                self.screen = Screen::Results;
            }
            Err(e) => {
                // Form stays filled so the user can correct it.
                self.results_state = ResultsState::Error {
                    message: e.to_string(),
                };
                self.screen = Screen::Results;
            }
        }
    }

    fn build_additional_charts(&mut self) {
        let (Some(context), Some(input)) = (self.context.as_ref(), self.last_input.as_ref()) else {
            return;
        };

        let kinds = self.comparison_state.selected_kinds();
        match context.additional_charts(input, &kinds) {
            Ok(charts) => {
                self.comparison_state.charts = charts;
                self.comparison_state.error = None;
            }
            Err(e) => {
                self.comparison_state.charts.clear();
                self.comparison_state.error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Condition, ConditionRisk, RiskAssessment};

    fn app() -> App {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should open"));
        let mut app = App::with_dependencies(Config::default(), HistoryService::new(storage));
        app.screen = Screen::Dashboard;
        app
    }

    fn assessment(d: f64, h: f64) -> RiskAssessment {
        RiskAssessment::new(
            ConditionRisk::new(Condition::Diabetes, d, 0.5),
            ConditionRisk::new(Condition::Hypertension, h, 0.5),
        )
    }

    #[test]
    fn test_dashboard_summary_cached_until_refresh() {
        let mut app = app();
        app.history.record(&assessment(0.8, 0.2)).expect("Should record");
        assert_eq!(app.dashboard_state.recent.total, 0);

        app.refresh_history();
        assert_eq!(app.dashboard_state.recent.total, 1);
        assert_eq!(app.dashboard_state.recent.high_diabetes, 1);

        app.history.record(&assessment(0.1, 0.1)).expect("Should record");
        assert_eq!(app.dashboard_state.recent.total, 1);
        app.refresh_history();
        assert_eq!(app.dashboard_state.recent.total, 2);
        assert!(app.dashboard_state.history_error.is_none());
    }

    #[test]
    fn test_delete_key_removes_latest_assessment() {
        let mut app = app();
        let older = assessment(0.9, 0.9);
        app.history.record(&older).expect("Should record");
        app.history.record(&assessment(0.1, 0.1)).expect("Should record");
        app.refresh_history();
        let latest = app
            .dashboard_state
            .recent
            .latest()
            .map(|a| a.id.clone())
            .expect("Should have a latest");

        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        let summary = &app.dashboard_state.recent;
        assert_eq!(summary.total, 1);
        assert!(summary.recent.iter().all(|a| a.id != latest));

        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        assert_eq!(app.dashboard_state.recent.total, 0);

        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE);
        assert_eq!(app.dashboard_state.recent, RecentSummary::default());
    }

    #[test]
    fn test_clear_key_empties_history() {
        let mut app = app();
        for _ in 0..3 {
            app.history.record(&assessment(0.6, 0.6)).expect("Should record");
        }
        app.refresh_history();
        assert_eq!(app.dashboard_state.recent.total, 3);

        app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(app.dashboard_state.recent, RecentSummary::default());
        assert_eq!(app.history.recent_summary(RECENT_LIMIT).expect("Should summarize").total, 0);
    }
}
