//! Pipeline construction and per-app finalization

use crate::manager::AppManager;
use futures::future::BoxFuture;
use sideload_errors::{ConnectionError, Error};
use sideload_events::{
    AppEvent, EventEmitter, FailureContext, PipelineEvent, ProgressTracker, StageKind,
};
use sideload_install::progress::{mount_stage, skip_download};
use sideload_install::stages::{
    AuthenticateStage, DownloadStage, InstallStage, ResignStage, SendStage,
};
use sideload_install::{AppOperationContext, BatchGroup, Operation, PipelineGraph, StageId};
use sideload_platform::Presenter;
use sideload_types::{App, InstalledApp};
use std::sync::Arc;

/// An app registered in a batch whose stages are not built yet
pub(crate) struct PendingApp {
    pub(crate) app: App,
    pub(crate) progress: ProgressTracker,
}

type Handler<T> = Box<dyn FnOnce(Result<T, Error>) -> BoxFuture<'static, ()> + Send>;

impl AppManager {
    /// Build and start the stages for `apps` inside `group`.
    ///
    /// Without a reachable helper the whole batch fails with
    /// `ServerNotFound` and no stage is created.
    pub(crate) async fn build_pipeline(
        &self,
        group: &Arc<BatchGroup>,
        apps: Vec<PendingApp>,
        force_download: bool,
        presenter: Option<Arc<dyn Presenter>>,
        operation: Operation,
    ) {
        let batch_id = group.id().to_string();
        let endpoint = match group.endpoint() {
            Some(endpoint) => endpoint.clone(),
            None => {
                let discovered = self.inner.discovery.discovered_endpoints().await;
                let Some(endpoint) = discovered.into_iter().next() else {
                    self.fail_batch(group, ConnectionError::ServerNotFound.into())
                        .await;
                    return;
                };
                group.set_endpoint(endpoint).clone()
            }
        };

        let mut graph = PipelineGraph::new(batch_id.clone());
        let joined = group.auth_signal();
        let auth = match joined.clone() {
            Some(signal) => graph.add_external(signal),
            None => Self::add_authentication(
                &mut graph,
                group,
                AuthenticateStage::new(Arc::clone(&self.inner.credentials), presenter),
            ),
        };

        let identifiers: Vec<String> = apps.iter().map(|p| p.app.identifier.clone()).collect();
        for pending in apps {
            self.add_app(&mut graph, group, auth, pending, force_download, operation)
                .await;
        }

        if joined.is_some() {
            self.emit(AppEvent::Pipeline(PipelineEvent::BatchExtended {
                batch_id,
                apps: identifiers,
            }));
        } else {
            self.emit(AppEvent::Pipeline(PipelineEvent::BatchStarted {
                batch_id,
                apps: identifiers,
                endpoint: endpoint.to_string(),
            }));
        }

        graph.spawn(
            Arc::clone(&self.inner.pool),
            self.inner.settings.stage_timeout,
            self.inner.tx.clone(),
        );
    }

    fn add_authentication(
        graph: &mut PipelineGraph,
        group: &Arc<BatchGroup>,
        stage: AuthenticateStage,
    ) -> StageId {
        let handler_group = Arc::clone(group);
        let id = graph.add_stage(
            stage,
            None,
            group.auth_progress().clone(),
            &[],
            move |result| {
                handler_group.set_credential(result);
                futures::future::ready(())
            },
        );
        if let Some(signal) = graph.signal(id) {
            group.set_auth_signal(signal);
        }
        id
    }

    async fn add_app(
        &self,
        graph: &mut PipelineGraph,
        group: &Arc<BatchGroup>,
        auth: StageId,
        pending: PendingApp,
        force_download: bool,
        operation: Operation,
    ) {
        let PendingApp { app, progress } = pending;
        let identifier = app.identifier.clone();
        let previous = self.stored_record(&identifier).await;
        let artifact = self.inner.artifacts.package_path(&identifier);
        let needs_download = force_download
            || previous.is_none()
            || !self.inner.artifacts.exists(&identifier).await;

        if !needs_download {
            skip_download(&progress);
        }
        let context = Arc::new(AppOperationContext::new(
            app,
            operation,
            Arc::clone(group),
            progress.clone(),
            previous,
        ));
        if !needs_download {
            context.set_package(artifact.clone());
        }

        let resign_progress = mount_stage(&progress, StageKind::Resign);
        let mut resign_deps = vec![auth];
        if needs_download {
            let download = graph.add_stage(
                DownloadStage::new(
                    Arc::clone(&context),
                    Arc::clone(&self.inner.downloader),
                    artifact,
                ),
                Some(identifier.clone()),
                mount_stage(&progress, StageKind::Download),
                &[auth],
                self.record(&context, |ctx, path| ctx.set_package(path)),
            );
            resign_deps.push(download);
        }

        let resign = graph.add_stage(
            ResignStage::new(Arc::clone(&context), Arc::clone(&self.inner.signer)),
            Some(identifier.clone()),
            resign_progress,
            &resign_deps,
            self.record(&context, |ctx, resigned| ctx.set_resigned(resigned)),
        );

        let send = graph.add_stage(
            SendStage::new(Arc::clone(&context), Arc::clone(&self.inner.transport)),
            Some(identifier.clone()),
            mount_stage(&progress, StageKind::Send),
            &[resign],
            self.record(&context, |ctx, connection| ctx.set_connection(connection)),
        );

        graph.add_stage(
            InstallStage::new(Arc::clone(&context), self.inner.settings.profile_validity),
            Some(identifier),
            mount_stage(&progress, StageKind::Install),
            &[send],
            self.finalize(&context),
        );
    }

    async fn stored_record(&self, identifier: &str) -> Option<InstalledApp> {
        match self.inner.store.get(identifier).await {
            Ok(record) => record,
            Err(err) => {
                self.emit_warning_with_context(
                    format!("could not read the record of {identifier}, downloading again"),
                    err.to_string(),
                );
                None
            }
        }
    }

    /// Handler for intermediate stages: store the output, or record the
    /// error. Cancellation finalizes right away.
    fn record<T, F>(&self, context: &Arc<AppOperationContext>, store: F) -> Handler<T>
    where
        T: Send + 'static,
        F: FnOnce(&AppOperationContext, T) + Send + 'static,
    {
        let manager = self.clone();
        let context = Arc::clone(context);
        Box::new(move |result| {
            Box::pin(async move {
                match result {
                    Ok(value) => store(&context, value),
                    Err(err) => {
                        let cancelled = err.is_cancelled();
                        context.set_error(err);
                        if cancelled {
                            manager.finish_app_operation(&context).await;
                        }
                    }
                }
            })
        })
    }

    /// Handler for the install stage, which finalizes whatever the outcome
    fn finalize(&self, context: &Arc<AppOperationContext>) -> Handler<InstalledApp> {
        let manager = self.clone();
        let context = Arc::clone(context);
        Box::new(move |result| {
            Box::pin(async move {
                match result {
                    Ok(installed) => context.set_installed_app(installed),
                    Err(err) => {
                        context.set_error(err);
                    }
                }
                manager.finish_app_operation(&context).await;
            })
        })
    }

    /// Commit the terminal result of one app into its batch.
    ///
    /// Runs under the manager-wide finalize lock. Only the first call per
    /// context has an effect; the batch completion is delivered after the
    /// lock is released.
    pub async fn finish_app_operation(&self, context: &AppOperationContext) {
        let group = context.group();
        let completion = {
            let _guard = self.inner.finalize_lock.lock().await;
            if !context.mark_finished() {
                return;
            }
            drop(context.take_connection());

            let result = match context.error() {
                Some(err) => Err(err),
                None => match context.installed_app() {
                    Some(installed) => {
                        if let Err(err) = self.inner.store.save(&installed).await {
                            self.emit_warning_with_context(
                                format!("failed to save the record of {}", installed.identifier),
                                err.to_string(),
                            );
                        }
                        Ok(installed)
                    }
                    None => Err(Error::internal("pipeline finished without an installed app")),
                },
            };

            self.emit(AppEvent::Pipeline(PipelineEvent::AppFinished {
                batch_id: group.id().to_string(),
                app: context.identifier().to_string(),
                success: result.is_ok(),
                failure: result.as_ref().err().map(FailureContext::from_error),
            }));
            self.clear_in_flight(group, context.identifier());
            group.record_result(context.identifier(), result)
        };

        if let Some(completion) = completion {
            if let Ok(results) = completion.outcome() {
                let succeeded = results.values().filter(|r| r.is_ok()).count();
                self.emit(AppEvent::Pipeline(PipelineEvent::BatchCompleted {
                    batch_id: group.id().to_string(),
                    succeeded,
                    failed: results.len() - succeeded,
                }));
            }
            group.deliver(completion);
        }
    }

    async fn fail_batch(&self, group: &Arc<BatchGroup>, error: Error) {
        let completion = {
            let _guard = self.inner.finalize_lock.lock().await;
            for identifier in group.app_identifiers() {
                self.clear_in_flight(group, &identifier);
            }
            group.fail(error.clone())
        };
        self.emit(AppEvent::Pipeline(PipelineEvent::BatchFailed {
            batch_id: group.id().to_string(),
            failure: FailureContext::from_error(&error),
        }));
        if let Some(completion) = completion {
            group.deliver(completion);
        }
    }

    /// Drop the in-flight entries of `identifier` that belong to `group`.
    /// Must be called with the finalize lock held.
    fn clear_in_flight(&self, group: &BatchGroup, identifier: &str) {
        let Some(progress) = group.app_progress(identifier) else {
            return;
        };
        self.inner
            .installation_progress
            .remove_if(identifier, |_, handle| handle.progress().ptr_eq(&progress));
        self.inner
            .refresh_progress
            .remove_if(identifier, |_, tracker| tracker.ptr_eq(&progress));
    }
}
