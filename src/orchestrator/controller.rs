//! Submission lifecycle controller.
//!
//! Owns the pending input and the submission status, gates requests on
//! validation, and folds every outcome into a single resolution path.

use crate::engine::ClassificationService;
use crate::error::SubmitError;
use crate::model::{
    ClassificationResult, DatasetFile, SubmissionEvent, SubmissionId, SubmissionInput,
    SubmissionRequest, SubmissionStatus, VALIDATION_NOTICE,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Whether a resolution was applied or dropped as out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Applied,
    Stale,
}

pub(crate) struct SubmissionController {
    input: SubmissionInput,
    status: SubmissionStatus,
    last_id: u64,
    event_tx: Option<UnboundedSender<SubmissionEvent>>,
}

impl Default for SubmissionController {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SubmissionController {
    pub fn new(event_tx: Option<UnboundedSender<SubmissionEvent>>) -> Self {
        Self {
            input: SubmissionInput::default(),
            status: SubmissionStatus::Idle,
            last_id: 0,
            event_tx,
        }
    }

    pub fn set_file(&mut self, file: Option<DatasetFile>) {
        if let Some(f) = file.as_ref() {
            if !f.looks_like_csv() {
                warn!(file = %f.name, "selected file does not have a .csv extension");
                self.notify(SubmissionEvent::Hint(format!(
                    "{} não parece ser um arquivo .csv",
                    f.name
                )));
            }
        }
        self.input.file = file;
    }

    /// Stored verbatim; whitespace is the service's business.
    pub fn set_target_column(&mut self, text: impl Into<String>) {
        self.input.target_column = text.into();
    }

    pub fn input(&self) -> &SubmissionInput {
        &self.input
    }

    pub fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match &self.status {
            SubmissionStatus::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    /// Validate the pending input and, if it passes, enter `Submitting`.
    ///
    /// The returned request must be handed back through [`Self::resolve`].
    pub fn begin(&mut self) -> Result<SubmissionRequest, SubmitError> {
        if let SubmissionStatus::Submitting { id } = self.status {
            warn!(submission = %id, "submit ignored while a request is in flight");
            let err = SubmitError::InFlight(id);
            self.notify(SubmissionEvent::Rejected(err.to_string()));
            return Err(err);
        }
        if let Err(reason) = self.input.validate() {
            warn!(%reason, "submission rejected");
            self.notify(SubmissionEvent::Rejected(VALIDATION_NOTICE.to_string()));
            return Err(reason.into());
        }
        let Some(file) = self.input.file.clone() else {
            return Err(crate::error::ValidationError::MissingFile.into());
        };

        self.last_id += 1;
        let id = SubmissionId(self.last_id);
        let request = SubmissionRequest {
            id,
            file,
            target_column: self.input.target_column.clone(),
        };
        info!(
            submission = %id,
            file = %request.file.name,
            target_column = %request.target_column,
            "submission started"
        );
        self.status = SubmissionStatus::Submitting { id };
        self.notify(SubmissionEvent::Started {
            id,
            file_name: request.file.name.clone(),
            target_column: request.target_column.clone(),
        });
        Ok(request)
    }

    /// Apply the outcome of submission `id`. Outcomes for anything but the
    /// current in-flight submission are dropped.
    pub fn resolve(
        &mut self,
        id: SubmissionId,
        outcome: Result<ClassificationResult, SubmitError>,
    ) -> Resolution {
        match self.status {
            SubmissionStatus::Submitting { id: current } if current == id => {}
            _ => {
                debug!(submission = %id, "dropping stale resolution");
                return Resolution::Stale;
            }
        }

        match outcome {
            Ok(result) => {
                info!(
                    submission = %id,
                    best_model = %result.best_model,
                    accuracy = result.accuracy,
                    "submission succeeded"
                );
                self.notify(SubmissionEvent::Succeeded {
                    id,
                    best_model: result.best_model.clone(),
                    accuracy: result.accuracy,
                });
                self.status = SubmissionStatus::Succeeded(result);
            }
            Err(err) => {
                error!(submission = %id, error = %err, "submission failed");
                let reason = err.to_string();
                self.notify(SubmissionEvent::Failed {
                    id,
                    reason: reason.clone(),
                });
                self.status = SubmissionStatus::Failed(reason);
            }
        }
        Resolution::Applied
    }

    /// Run one full submission against `service`.
    ///
    /// `Err` is returned only when the submission was refused up front; the
    /// outcome of an issued request is reflected in [`Self::status`].
    pub async fn submit<S>(&mut self, service: &S) -> Result<&SubmissionStatus, SubmitError>
    where
        S: ClassificationService + ?Sized,
    {
        let request = self.begin()?;
        let guard = InFlightGuard {
            controller: &mut *self,
            id: request.id,
            resolved: false,
        };
        let outcome = execute(service, &request).await;
        guard.finish(outcome);
        Ok(&self.status)
    }

    fn notify(&self, event: SubmissionEvent) {
        if let Some(tx) = self.event_tx.as_ref() {
            let _ = tx.send(event);
        }
    }
}

/// Run `request` against `service`, turning a panic into a failed outcome.
pub(crate) async fn execute<S>(
    service: &S,
    request: &SubmissionRequest,
) -> Result<ClassificationResult, SubmitError>
where
    S: ClassificationService + ?Sized,
{
    AssertUnwindSafe(service.classify(request))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            Err(SubmitError::Interrupted(
                "classification task panicked".into(),
            ))
        })
}

pub(crate) const ABANDONED: &str = "request abandoned before completion";

/// Resolves the submission as abandoned if the request future is dropped
/// before it completes.
struct InFlightGuard<'a> {
    controller: &'a mut SubmissionController,
    id: SubmissionId,
    resolved: bool,
}

impl InFlightGuard<'_> {
    fn finish(mut self, outcome: Result<ClassificationResult, SubmitError>) {
        self.controller.resolve(self.id, outcome);
        self.resolved = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.controller.resolve(
                self.id,
                Err(SubmitError::Interrupted(ABANDONED.into())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    enum Behaviour {
        Succeed(ClassificationResult),
        FailStatus(StatusCode),
        Panic,
        Hang,
    }

    struct FakeService {
        behaviour: Behaviour,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl FakeService {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClassificationService for FakeService {
        async fn classify(
            &self,
            request: &SubmissionRequest,
        ) -> Result<ClassificationResult, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((request.file.name.clone(), request.target_column.clone()));
            match &self.behaviour {
                Behaviour::Succeed(result) => Ok(result.clone()),
                Behaviour::FailStatus(status) => Err(SubmitError::Status {
                    status: *status,
                    message: None,
                }),
                Behaviour::Panic => panic!("service blew up"),
                Behaviour::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn result(model: &str, accuracy: f64) -> ClassificationResult {
        ClassificationResult {
            job_id: None,
            best_model: model.into(),
            accuracy,
            problem_type: None,
            confusion_matrix_image: Bytes::from_static(b"cm"),
            feature_importance_image: Some(Bytes::from_static(b"fi")),
            shap_summary_image: None,
            report: Vec::new(),
            predictions: Vec::new(),
        }
    }

    fn ready_controller() -> (SubmissionController, mpsc::UnboundedReceiver<SubmissionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut controller = SubmissionController::new(Some(tx));
        controller.set_file(Some(DatasetFile::new("sales.csv", "a,comprou\n1,0\n")));
        controller.set_target_column("comprou");
        (controller, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SubmissionEvent>) -> Vec<SubmissionEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn missing_file_never_reaches_service() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = SubmissionController::new(Some(tx));
        controller.set_target_column("comprou");
        let service = FakeService::new(Behaviour::Succeed(result("RandomForest", 0.9)));

        let err = controller.submit(&service).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::MissingFile)
        ));
        assert_eq!(service.calls(), 0);
        assert_eq!(controller.status(), &SubmissionStatus::Idle);
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [SubmissionEvent::Rejected(msg)] if msg == VALIDATION_NOTICE
        ));
    }

    #[tokio::test]
    async fn empty_target_never_reaches_service() {
        let (mut controller, _rx) = ready_controller();
        controller.set_target_column("");
        let service = FakeService::new(Behaviour::Succeed(result("RandomForest", 0.9)));

        let err = controller.submit(&service).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::EmptyTargetColumn)
        ));
        assert_eq!(service.calls(), 0);
        assert!(!controller.is_in_flight());
    }

    #[tokio::test]
    async fn successful_submission_stores_result() {
        let (mut controller, mut rx) = ready_controller();
        let service = FakeService::new(Behaviour::Succeed(result("RandomForest", 0.923)));

        let status = controller.submit(&service).await.expect("issued");
        assert!(matches!(status, SubmissionStatus::Succeeded(r) if r.best_model == "RandomForest"));
        assert!(!controller.is_in_flight());
        assert_eq!(
            service.seen.lock().unwrap().as_slice(),
            [("sales.csv".to_string(), "comprou".to_string())]
        );

        let events = drain(&mut rx);
        assert!(matches!(events[0], SubmissionEvent::Started { id: SubmissionId(1), .. }));
        assert!(matches!(events[1], SubmissionEvent::Succeeded { id: SubmissionId(1), .. }));
    }

    #[tokio::test]
    async fn server_error_fails_and_clears_in_flight() {
        let (mut controller, mut rx) = ready_controller();
        let service = FakeService::new(Behaviour::FailStatus(StatusCode::INTERNAL_SERVER_ERROR));

        let status = controller.submit(&service).await.expect("issued");
        assert!(matches!(status, SubmissionStatus::Failed(reason) if reason.contains("500")));
        assert!(!controller.is_in_flight());
        assert!(controller.result().is_none());
        assert_eq!(service.calls(), 1);

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(SubmissionEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn panicking_service_still_resolves() {
        let (mut controller, _rx) = ready_controller();
        let service = FakeService::new(Behaviour::Panic);

        let status = controller.submit(&service).await.expect("issued");
        assert!(matches!(status, SubmissionStatus::Failed(reason) if reason.contains("panicked")));
        assert!(!controller.is_in_flight());
    }

    #[tokio::test]
    async fn dropped_request_is_marked_abandoned() {
        let (mut controller, _rx) = ready_controller();
        let service = FakeService::new(Behaviour::Hang);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), controller.submit(&service)).await;
        assert!(timed_out.is_err());
        assert!(!controller.is_in_flight());
        assert!(matches!(
            controller.status(),
            SubmissionStatus::Failed(reason) if reason.contains("abandoned")
        ));
    }

    #[tokio::test]
    async fn resubmission_discards_previous_outcome() {
        let (mut controller, _rx) = ready_controller();
        let failing = FakeService::new(Behaviour::FailStatus(StatusCode::BAD_GATEWAY));
        controller.submit(&failing).await.expect("issued");
        assert!(matches!(controller.status(), SubmissionStatus::Failed(_)));

        let request = controller.begin().expect("second submission");
        assert_eq!(request.id, SubmissionId(2));
        assert_eq!(
            controller.status(),
            &SubmissionStatus::Submitting { id: SubmissionId(2) }
        );

        controller.resolve(request.id, Ok(result("SVC", 0.8)));
        assert_eq!(controller.result().map(|r| r.best_model.as_str()), Some("SVC"));

        controller.begin().expect("third submission");
        assert!(controller.result().is_none());
    }

    #[tokio::test]
    async fn submit_is_rejected_while_in_flight() {
        let (mut controller, mut rx) = ready_controller();
        let first = controller.begin().expect("first");

        let err = controller.begin().unwrap_err();
        assert!(matches!(err, SubmitError::InFlight(id) if id == first.id));
        assert_eq!(
            controller.status(),
            &SubmissionStatus::Submitting { id: first.id }
        );
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(SubmissionEvent::Rejected(_))));
    }

    #[test]
    fn stale_resolution_is_ignored() {
        let (mut controller, _rx) = ready_controller();
        let first = controller.begin().expect("first");
        controller.resolve(
            first.id,
            Err(SubmitError::Interrupted("request abandoned before completion".into())),
        );
        let second = controller.begin().expect("second");

        let late = controller.resolve(first.id, Ok(result("Stale", 0.1)));
        assert_eq!(late, Resolution::Stale);
        assert_eq!(
            controller.status(),
            &SubmissionStatus::Submitting { id: second.id }
        );

        let applied = controller.resolve(second.id, Ok(result("Fresh", 0.7)));
        assert_eq!(applied, Resolution::Applied);
        assert_eq!(controller.result().map(|r| r.best_model.as_str()), Some("Fresh"));
    }

    #[test]
    fn non_csv_file_emits_hint() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = SubmissionController::new(Some(tx));
        controller.set_file(Some(DatasetFile::new("sales.xlsx", "x")));
        assert!(matches!(drain(&mut rx).as_slice(), [SubmissionEvent::Hint(_)]));
        assert!(controller.input().file.is_some());
    }

    #[test]
    fn target_column_is_kept_verbatim() {
        let mut controller = SubmissionController::default();
        controller.set_target_column("  comprou ");
        assert_eq!(controller.input().target_column, "  comprou ");
    }
}
