//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::{style, Term};
use sideload_events::{
    AppEvent, CatalogEvent, EventMessage, GeneralEvent, PipelineEvent, ProgressEvent,
};
use std::collections::HashMap;

/// Renders events on stderr and forwards every event to tracing
pub struct EventHandler {
    term: Term,
    colors: bool,
    debug: bool,
    quiet: bool,
    /// Labels of the trackers currently shown, by tracker id
    active: HashMap<String, String>,
    progress_line: bool,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, debug_enabled: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors: colors_enabled,
            debug: debug_enabled,
            quiet,
            active: HashMap::new(),
            progress_line: false,
        }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }

        match message.event {
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                let text = match context {
                    Some(context) => format!("{message}: {context}"),
                    None => message,
                };
                self.show_warning(&text);
            }
            AppEvent::General(GeneralEvent::Error { message, .. }) => self.show_error(&message),
            AppEvent::General(GeneralEvent::DebugLog { message, .. }) if self.debug => {
                self.show_status(&message);
            }

            AppEvent::Pipeline(PipelineEvent::BatchStarted { apps, endpoint, .. }) => {
                self.show_status(&format!("Sending {} app(s) to {endpoint}", apps.len()));
            }
            AppEvent::Pipeline(PipelineEvent::StageStarted {
                app: Some(app),
                stage,
                ..
            }) if self.debug => {
                self.show_status(&format!("{app}: {stage}"));
            }
            AppEvent::Pipeline(PipelineEvent::AppFinished {
                app,
                success,
                failure,
                ..
            }) => {
                if success {
                    self.show_success(&format!("{app} installed"));
                } else {
                    let reason = failure.map_or_else(|| "unknown error".to_string(), |f| f.message);
                    self.show_error(&format!("{app} failed: {reason}"));
                }
            }
            AppEvent::Pipeline(PipelineEvent::BatchFailed { failure, .. }) => {
                self.show_error(&failure.message);
                if let Some(hint) = failure.hint {
                    self.show_status(&format!("hint: {hint}"));
                }
            }

            AppEvent::Catalog(CatalogEvent::FetchFailed { source, failure }) => {
                self.show_error(&format!("could not load {source}: {}", failure.message));
            }

            AppEvent::Progress(ProgressEvent::Started { id, operation, .. }) => {
                self.active.insert(id, operation);
            }
            AppEvent::Progress(ProgressEvent::Updated { id, fraction }) => {
                if let Some(label) = self.active.get(&id).cloned() {
                    self.show_progress(&label, fraction);
                }
            }
            AppEvent::Progress(
                ProgressEvent::Completed { id } | ProgressEvent::Cancelled { id },
            ) => {
                self.active.remove(&id);
                self.clear_progress();
            }

            _ => {}
        }
    }

    fn show_progress(&mut self, label: &str, fraction: f64) {
        const WIDTH: f64 = 30.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let filled = (fraction.clamp(0.0, 1.0) * WIDTH).round() as usize;
        let bar = format!(
            "[{}{}] {:>3.0}% {label}",
            "#".repeat(filled),
            "-".repeat(30 - filled.min(30)),
            fraction * 100.0
        );
        self.clear_progress();
        let _ = self.term.write_str(&bar);
        self.progress_line = true;
    }

    fn clear_progress(&mut self) {
        if self.progress_line {
            let _ = self.term.clear_line();
            self.progress_line = false;
        }
    }

    fn print_line(&mut self, line: &str) {
        self.clear_progress();
        let _ = self.term.write_line(line);
    }

    fn show_status(&mut self, message: &str) {
        let line = if self.colors {
            format!("{} {message}", style("::").cyan())
        } else {
            format!(":: {message}")
        };
        self.print_line(&line);
    }

    fn show_success(&mut self, message: &str) {
        let line = if self.colors {
            format!("{} {message}", style("ok").green().bold())
        } else {
            format!("ok {message}")
        };
        self.print_line(&line);
    }

    fn show_warning(&mut self, message: &str) {
        let line = if self.colors {
            format!("{} {message}", style("warning:").yellow().bold())
        } else {
            format!("warning: {message}")
        };
        self.print_line(&line);
    }

    fn show_error(&mut self, message: &str) {
        let line = if self.colors {
            format!("{} {message}", style("error:").red().bold())
        } else {
            format!("error: {message}")
        };
        self.print_line(&line);
    }
}
