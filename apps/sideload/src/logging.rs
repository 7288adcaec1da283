//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields so the
//! JSON log file carries the same information the terminal shows.

use sideload_events::{
    AppEvent, CatalogEvent, EventMessage, GeneralEvent, PipelineEvent, ProgressEvent, StateEvent,
};
use tracing::{debug, error, info, trace, warn};

/// Log an event at its level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    details = ?details,
                    "{message}"
                );
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source = meta.source.as_str(), operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(
                    source = meta.source.as_str(),
                    operation = %operation,
                    success = success,
                    "Operation completed"
                );
            }
            GeneralEvent::OperationFailed { operation, failure } => {
                error!(
                    source = meta.source.as_str(),
                    operation = %operation,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Operation failed"
                );
            }
        },

        AppEvent::Pipeline(event) => log_pipeline_event(message, event),

        AppEvent::Catalog(event) => match event {
            CatalogEvent::FetchStarted { source } => {
                debug!(catalog = %source, "Catalog fetch started");
            }
            CatalogEvent::AppsFetched { source, count } => {
                info!(catalog = %source, count = count, "Apps fetched");
            }
            CatalogEvent::FetchFailed { source, failure } => {
                error!(
                    catalog = %source,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    "Catalog fetch failed"
                );
            }
        },

        AppEvent::Progress(event) => match event {
            ProgressEvent::Started {
                id,
                operation,
                total,
            } => {
                debug!(progress_id = %id, operation = %operation, total = total, "Progress started");
            }
            ProgressEvent::Updated { id, fraction } => {
                trace!(progress_id = %id, fraction = fraction, "Progress updated");
            }
            ProgressEvent::Completed { id } => {
                debug!(progress_id = %id, "Progress completed");
            }
            ProgressEvent::Cancelled { id } => {
                warn!(progress_id = %id, "Progress cancelled");
            }
        },

        AppEvent::State(event) => match event {
            StateEvent::Initialized { database } => {
                debug!(database = %database, "State database ready");
            }
            StateEvent::RecordSaved { identifier } => {
                debug!(app = %identifier, "Installed app record saved");
            }
            StateEvent::RecordRemoved { identifier } => {
                info!(app = %identifier, "Installed app record removed");
            }
            StateEvent::ReconciliationCompleted { checked, removed } => {
                info!(checked = checked, removed = removed, "Reconciliation completed");
            }
            StateEvent::AccountSaved { email } => {
                info!(account = %email, "Account saved");
            }
            StateEvent::AccountReset => {
                info!("Account removed");
            }
        },
    }
}

fn log_pipeline_event(message: &EventMessage, event: &PipelineEvent) {
    let correlation = message.meta.correlation_id.as_deref();
    match event {
        PipelineEvent::BatchStarted {
            batch_id,
            apps,
            endpoint,
        } => {
            info!(batch = %batch_id, apps = ?apps, endpoint = %endpoint, "Batch started");
        }
        PipelineEvent::BatchExtended { batch_id, apps } => {
            info!(batch = %batch_id, apps = ?apps, "Apps joined batch");
        }
        PipelineEvent::BatchFailed { batch_id, failure } => {
            error!(
                batch = %batch_id,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Batch failed"
            );
        }
        PipelineEvent::StageStarted {
            batch_id,
            app,
            stage,
        } => {
            debug!(batch = %batch_id, app = ?app, stage = %stage, correlation = ?correlation, "Stage started");
        }
        PipelineEvent::StageCompleted {
            batch_id,
            app,
            stage,
        } => {
            info!(batch = %batch_id, app = ?app, stage = %stage, "Stage completed");
        }
        PipelineEvent::StageFailed {
            batch_id,
            app,
            stage,
            failure,
        } => {
            error!(
                batch = %batch_id,
                app = ?app,
                stage = %stage,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                "Stage failed"
            );
        }
        PipelineEvent::StageSkipped {
            batch_id,
            app,
            stage,
        } => {
            debug!(batch = %batch_id, app = ?app, stage = %stage, "Stage skipped");
        }
        PipelineEvent::AppFinished {
            batch_id,
            app,
            success,
            failure,
        } => {
            if *success {
                info!(batch = %batch_id, app = %app, "App finished");
            } else {
                warn!(
                    batch = %batch_id,
                    app = %app,
                    message = ?failure.as_ref().map(|f| f.message.as_str()),
                    "App failed"
                );
            }
        }
        PipelineEvent::BatchCompleted {
            batch_id,
            succeeded,
            failed,
        } => {
            info!(batch = %batch_id, succeeded = succeeded, failed = failed, "Batch completed");
        }
    }
}
