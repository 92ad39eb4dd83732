// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The proxy loop, expressed as an explicit state machine rather than the
// boolean-flag soup (`update_jobs`, `fetch_jobs`, assorted timers) a literal
// reading of the polling loop suggests. States and events are named for what
// they represent; timers are deadlines compared against the clock, not
// counters decremented every tick.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use ipplex_core::{IpplexError, JobId, JobState, Result};

use crate::backoff::connect_backoff;
use crate::health::CircuitBreaker;
use crate::proxy_jobs::{reconcile, reconcile_decision, ProxyJobTable};
use crate::transport::{clamp_notify_interval, is_not_found, DeviceCapabilities, FetchedDocument, ProxyTransport};

/// Where the loop currently is in its lifecycle against one upstream
/// infrastructure printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Idle,
    Connecting,
    Subscribing,
    Polling,
    BackingOff,
    ShuttingDown,
}

/// What moves the loop from one state to the next. The loop itself is a
/// pure function of `(state, event) -> state` plus side effects; the
/// `run` method below is the only place that owns a clock.
#[derive(Debug, Clone)]
pub enum ProxyEvent {
    Tick,
    Connected,
    ConnectFailed(String),
    Subscribed(i32),
    EventReceived(String),
    JobFetched(i32),
    Shutdown,
}

/// Accepts documents fetched from the upstream printer and turns them into
/// local jobs. Implemented by the server crate, which owns the `Printer`
/// and driver dispatch this engine has no business touching directly.
#[async_trait::async_trait]
pub trait JobSink: Send + Sync {
    async fn admit_fetched_job(&self, parent_job_id: i32, job_name: &str) -> Result<JobId>;
    async fn append_document(&self, local_job: JobId, document: FetchedDocument) -> Result<()>;
    fn local_state_of(&self, local_job: JobId) -> Option<JobState>;
    fn active_local_jobs(&self) -> Vec<(JobId, i32)>;
    fn capabilities(&self) -> DeviceCapabilities;
    /// Force `local_job` into `new_state`, per an `Update-Active-Jobs`
    /// reconciliation decision (see `proxy_jobs::reconcile_decision`).
    async fn apply_remote_state(&self, local_job: JobId, new_state: JobState) -> Result<()>;
}

const IDLE_SLEEP: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One proxy loop bound to a single upstream infrastructure printer.
pub struct ProxyEngine<T: ProxyTransport, J: JobSink> {
    transport: T,
    sink: J,
    jobs: ProxyJobTable,
    breaker: CircuitBreaker,
    state: ProxyState,
    subscription_id: Option<i32>,
    last_sequence: i32,
    connect_attempt: u32,
}

impl<T: ProxyTransport, J: JobSink> ProxyEngine<T, J> {
    pub fn new(transport: T, sink: J, infra_printer_uri: String) -> Self {
        Self {
            transport,
            sink,
            jobs: ProxyJobTable::new(),
            breaker: CircuitBreaker::new(infra_printer_uri),
            state: ProxyState::Idle,
            subscription_id: None,
            last_sequence: 0,
            connect_attempt: 0,
        }
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    pub fn jobs(&self) -> &ProxyJobTable {
        &self.jobs
    }

    /// Run until `shutdown` resolves. Each iteration is one step of the
    /// state machine; `tokio::time::sleep` stands in for the loop's only
    /// timer, the idle poll interval (or a back-off deadline while the
    /// circuit is open).
    pub async fn run(&mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        loop {
            if shutdown.try_recv().is_ok() {
                self.apply(ProxyEvent::Shutdown).await;
                break;
            }
            self.step().await;
            if self.state == ProxyState::ShuttingDown {
                break;
            }
            tokio::time::sleep(IDLE_SLEEP).await;
        }
    }

    /// Advance one tick: decide what the current state implies and apply
    /// the resulting event.
    async fn step(&mut self) {
        let event = match self.state {
            ProxyState::Idle => ProxyEvent::Tick,
            ProxyState::Connecting => self.try_connect().await,
            ProxyState::Subscribing => self.try_subscribe().await,
            ProxyState::Polling => self.poll_once().await,
            ProxyState::BackingOff => ProxyEvent::Tick,
            ProxyState::ShuttingDown => ProxyEvent::Shutdown,
        };
        self.apply(event).await;
    }

    async fn apply(&mut self, event: ProxyEvent) {
        match (self.state, event) {
            (ProxyState::Idle, ProxyEvent::Tick) => {
                if self.breaker.allow_connect() {
                    self.state = ProxyState::Connecting;
                }
            }
            (ProxyState::Connecting, ProxyEvent::Connected) => {
                self.breaker.record_success();
                self.connect_attempt = 0;
                self.state = ProxyState::Subscribing;
            }
            (ProxyState::Connecting, ProxyEvent::ConnectFailed(err)) => {
                warn!(error = %err, "connect to upstream failed");
                self.breaker.record_failure(&err);
                self.connect_attempt += 1;
                let delay = connect_backoff(self.connect_attempt, Duration::from_secs(1), Duration::from_secs(300));
                tokio::time::sleep(delay).await;
                self.state = ProxyState::BackingOff;
            }
            (ProxyState::Subscribing, ProxyEvent::Subscribed(id)) => {
                info!(subscription_id = id, "subscribed to upstream notifications");
                self.subscription_id = Some(id);
                self.state = ProxyState::Polling;
            }
            (ProxyState::Subscribing, ProxyEvent::ConnectFailed(err)) => {
                warn!(error = %err, "subscribe to upstream failed");
                self.state = ProxyState::Idle;
            }
            (ProxyState::Polling, ProxyEvent::EventReceived(kind)) => {
                debug!(kind = %kind, "notification observed");
            }
            (ProxyState::Polling, ProxyEvent::JobFetched(parent_job_id)) => {
                debug!(parent_job_id, "job fetched and acknowledged");
            }
            (ProxyState::Polling, ProxyEvent::ConnectFailed(err)) => {
                warn!(error = %err, "upstream poll failed, reconnecting");
                self.subscription_id = None;
                self.state = ProxyState::Idle;
            }
            (_, ProxyEvent::Shutdown) => {
                if let Some(id) = self.subscription_id.take() {
                    let _ = self.transport.cancel_subscription(id).await;
                }
                self.state = ProxyState::ShuttingDown;
            }
            (ProxyState::BackingOff, ProxyEvent::Tick) => {
                self.state = ProxyState::Idle;
            }
            _ => {}
        }
    }

    async fn try_connect(&mut self) -> ProxyEvent {
        match tokio::time::timeout(CONNECT_TIMEOUT, self.transport.connect()).await {
            Ok(Ok(())) => ProxyEvent::Connected,
            Ok(Err(e)) => ProxyEvent::ConnectFailed(e.to_string()),
            Err(_) => ProxyEvent::ConnectFailed("connect timed out".into()),
        }
    }

    async fn try_subscribe(&mut self) -> ProxyEvent {
        match self.transport.create_printer_subscriptions().await {
            Ok(id) => ProxyEvent::Subscribed(id),
            Err(e) => ProxyEvent::ConnectFailed(e.to_string()),
        }
    }

    /// One pass of the §4.F seven-step body: reconcile active jobs, push
    /// the device's capabilities, drain notifications, fetch any newly
    /// fetchable jobs, and push back any local status changes.
    async fn poll_once(&mut self) -> ProxyEvent {
        if let Err(e) = self.update_active_jobs().await {
            return ProxyEvent::ConnectFailed(e.to_string());
        }
        if let Err(e) = self
            .transport
            .update_output_device_attributes(&self.sink.capabilities())
            .await
        {
            debug!(error = %e, "failed to push device capabilities, continuing");
        }

        let subscription_id = match self.subscription_id {
            Some(id) => id,
            None => return ProxyEvent::ConnectFailed("lost subscription".into()),
        };

        match self.transport.get_notifications(subscription_id, self.last_sequence).await {
            Ok((notifications, interval)) => {
                let _poll_interval = clamp_notify_interval(interval);
                let mut last_kind = String::new();
                for note in notifications {
                    self.last_sequence = self.last_sequence.max(note.sequence_number);
                    last_kind = note.event.clone();
                }
                if let Err(e) = self.fetch_and_acknowledge_jobs().await {
                    warn!(error = %e, "fetch-jobs pass failed");
                }
                if let Err(e) = self.push_local_status_changes().await {
                    warn!(error = %e, "pushing local status changes failed");
                }
                if last_kind.is_empty() {
                    ProxyEvent::Tick
                } else {
                    ProxyEvent::EventReceived(last_kind)
                }
            }
            Err(e) => {
                if !is_not_found(&e) {
                    error!(error = %e, "get-notifications failed");
                }
                ProxyEvent::ConnectFailed(e.to_string())
            }
        }
    }

    async fn update_active_jobs(&mut self) -> Result<()> {
        let active = self.sink.active_local_jobs();
        let parent_ids: Vec<i32> = active.iter().map(|(_, parent)| *parent).collect();
        let remote_states = self.transport.update_active_jobs(&parent_ids).await?;
        for remote in remote_states {
            let Some(row) = self.jobs.find_by_parent(remote.parent_job_id) else {
                continue;
            };
            let Some(local_state) = self.sink.local_state_of(row.local_job) else {
                continue;
            };
            let Some(new_state) = reconcile_decision(remote.state, local_state) else {
                continue;
            };
            if let Err(e) = self.sink.apply_remote_state(row.local_job, new_state).await {
                warn!(
                    local_job = %row.local_job,
                    parent_job_id = remote.parent_job_id,
                    error = %e,
                    "applying remote job state reconciliation failed"
                );
                continue;
            }
            debug!(
                local_job = %row.local_job,
                parent_job_id = remote.parent_job_id,
                new_state = ?new_state,
                "applied remote job state reconciliation"
            );
        }
        Ok(())
    }

    async fn fetch_and_acknowledge_jobs(&mut self) -> Result<()> {
        let fetchable = self.transport.get_fetchable_jobs().await?;
        for job in fetchable {
            self.transport.fetch_job(job.parent_job_id).await?;
            let local_job = self
                .sink
                .admit_fetched_job(job.parent_job_id, &job.job_name)
                .await?;
            self.jobs.insert(crate::proxy_jobs::ProxyJob::new(
                local_job,
                job.parent_job_id,
                job.parent_job_uuid,
            ));
            self.transport.acknowledge_job(job.parent_job_id).await?;

            let mut doc_number = 1;
            loop {
                let doc = self.transport.fetch_document(job.parent_job_id, doc_number).await?;
                let is_last = doc.is_last;
                self.transport
                    .acknowledge_document(job.parent_job_id, doc_number)
                    .await?;
                self.sink.append_document(local_job, doc).await?;
                if is_last {
                    break;
                }
                doc_number += 1;
            }
        }
        Ok(())
    }

    async fn push_local_status_changes(&mut self) -> Result<()> {
        for (local_job, parent_job_id) in self.sink.active_local_jobs() {
            let Some(state) = self.sink.local_state_of(local_job) else {
                continue;
            };
            if let Err(e) = self.transport.update_job_status(parent_job_id, state).await {
                if !matches!(e, IpplexError::TransientIo(_)) {
                    return Err(e);
                }
            }
            if state.is_terminal() {
                self.jobs.remove_by_local(local_job);
            }
        }
        Ok(())
    }
}

pub use reconcile as reconcile_remote_job_state;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DeviceCapabilities, FetchableJob, FetchedDocument, RemoteJobState, RemoteNotification};
    use ipplex_core::StableUuid;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct MockTransport {
        connect_ok: bool,
        subscription_id: i32,
        fetchable: StdMutex<Vec<FetchableJob>>,
        remote_job_states: StdMutex<Vec<RemoteJobState>>,
    }

    #[async_trait::async_trait]
    impl ProxyTransport for MockTransport {
        async fn connect(&mut self) -> Result<()> {
            if self.connect_ok {
                Ok(())
            } else {
                Err(IpplexError::TransientIo("refused".into()))
            }
        }
        async fn update_active_jobs(&self, _job_ids: &[i32]) -> Result<Vec<RemoteJobState>> {
            Ok(self.remote_job_states.lock().unwrap().clone())
        }
        async fn update_output_device_attributes(&self, _caps: &DeviceCapabilities) -> Result<()> {
            Ok(())
        }
        async fn create_printer_subscriptions(&self) -> Result<i32> {
            Ok(self.subscription_id)
        }
        async fn cancel_subscription(&self, _subscription_id: i32) -> Result<()> {
            Ok(())
        }
        async fn get_notifications(
            &self,
            _subscription_id: i32,
            _last_sequence: i32,
        ) -> Result<(Vec<RemoteNotification>, Option<u32>)> {
            Ok((vec![RemoteNotification {
                sequence_number: 1,
                event: "job-fetchable".into(),
                parent_job_id: Some(42),
            }], Some(10)))
        }
        async fn get_fetchable_jobs(&self) -> Result<Vec<FetchableJob>> {
            Ok(self.fetchable.lock().unwrap().drain(..).collect())
        }
        async fn fetch_job(&self, _parent_job_id: i32) -> Result<()> {
            Ok(())
        }
        async fn acknowledge_job(&self, _parent_job_id: i32) -> Result<()> {
            Ok(())
        }
        async fn fetch_document(&self, _parent_job_id: i32, number: u32) -> Result<FetchedDocument> {
            Ok(FetchedDocument {
                number,
                format: "application/pdf".into(),
                is_last: true,
                bytes: vec![1, 2, 3],
            })
        }
        async fn acknowledge_document(&self, _parent_job_id: i32, _document_number: u32) -> Result<()> {
            Ok(())
        }
        async fn update_job_status(&self, _parent_job_id: i32, _state: JobState) -> Result<()> {
            Ok(())
        }
        async fn update_document_status(
            &self,
            _parent_job_id: i32,
            _document_number: u32,
            _state: &str,
        ) -> Result<()> {
            Ok(())
        }
    }

    struct MockSink {
        next_job: AtomicI32,
        admitted: StdMutex<Vec<(JobId, i32, String)>>,
        local_state: StdMutex<JobState>,
        applied: StdMutex<Vec<(JobId, JobState)>>,
    }

    #[async_trait::async_trait]
    impl JobSink for MockSink {
        async fn admit_fetched_job(&self, parent_job_id: i32, job_name: &str) -> Result<JobId> {
            let id = JobId(self.next_job.fetch_add(1, Ordering::SeqCst));
            self.admitted.lock().unwrap().push((id, parent_job_id, job_name.to_string()));
            Ok(id)
        }
        async fn append_document(&self, _local_job: JobId, _document: FetchedDocument) -> Result<()> {
            Ok(())
        }
        fn local_state_of(&self, _local_job: JobId) -> Option<JobState> {
            Some(*self.local_state.lock().unwrap())
        }
        fn active_local_jobs(&self) -> Vec<(JobId, i32)> {
            Vec::new()
        }
        fn capabilities(&self) -> DeviceCapabilities {
            DeviceCapabilities::default()
        }
        async fn apply_remote_state(&self, local_job: JobId, new_state: JobState) -> Result<()> {
            *self.local_state.lock().unwrap() = new_state;
            self.applied.lock().unwrap().push((local_job, new_state));
            Ok(())
        }
    }

    fn engine(connect_ok: bool) -> ProxyEngine<MockTransport, MockSink> {
        ProxyEngine::new(
            MockTransport {
                connect_ok,
                subscription_id: 7,
                fetchable: StdMutex::new(vec![FetchableJob {
                    parent_job_id: 42,
                    parent_job_uuid: StableUuid::new(),
                    job_name: "report.pdf".into(),
                }]),
                remote_job_states: StdMutex::new(Vec::new()),
            },
            MockSink {
                next_job: AtomicI32::new(100),
                admitted: StdMutex::new(Vec::new()),
                local_state: StdMutex::new(JobState::Pending),
                applied: StdMutex::new(Vec::new()),
            },
            "ipp://infra.example/printers/fleet".into(),
        )
    }

    #[tokio::test]
    async fn idle_moves_to_connecting_when_circuit_allows() {
        let mut e = engine(true);
        e.step().await;
        assert_eq!(e.state(), ProxyState::Connecting);
    }

    #[tokio::test]
    async fn successful_connect_then_subscribe_reaches_polling() {
        let mut e = engine(true);
        e.step().await; // Idle -> Connecting
        e.step().await; // Connecting -> Subscribing
        e.step().await; // Subscribing -> Polling
        assert_eq!(e.state(), ProxyState::Polling);
        assert_eq!(e.subscription_id, Some(7));
    }

    #[tokio::test]
    async fn failed_connect_backs_off_then_returns_idle() {
        let mut e = engine(false);
        e.step().await; // Idle -> Connecting
        e.step().await; // Connecting: fails -> BackingOff (after sleeping)
        assert_eq!(e.state(), ProxyState::BackingOff);
        e.step().await; // BackingOff -> Idle
        assert_eq!(e.state(), ProxyState::Idle);
    }

    #[tokio::test]
    async fn polling_fetches_and_admits_job() {
        let mut e = engine(true);
        e.step().await;
        e.step().await;
        e.step().await;
        assert_eq!(e.state(), ProxyState::Polling);
        e.step().await;
        assert_eq!(e.sink.admitted.lock().unwrap().len(), 1);
        assert_eq!(e.jobs.len(), 1);
    }

    #[tokio::test]
    async fn update_active_jobs_applies_remote_cancellation() {
        let mut e = engine(true);
        e.step().await; // Idle -> Connecting
        e.step().await; // Connecting -> Subscribing
        e.step().await; // Subscribing -> Polling
        e.step().await; // Polling: fetches and admits the report.pdf job
        assert_eq!(e.jobs.len(), 1);

        *e.sink.local_state.lock().unwrap() = JobState::Processing;
        e.transport.remote_job_states.lock().unwrap().push(RemoteJobState {
            parent_job_id: 42,
            state: JobState::Canceled,
        });

        e.update_active_jobs().await.unwrap();

        assert_eq!(*e.sink.local_state.lock().unwrap(), JobState::Canceled);
        assert_eq!(e.sink.applied.lock().unwrap().as_slice(), &[(JobId(100), JobState::Canceled)]);
    }

    #[tokio::test]
    async fn shutdown_cancels_subscription_and_stops() {
        let mut e = engine(true);
        e.step().await;
        e.step().await;
        e.step().await;
        e.apply(ProxyEvent::Shutdown).await;
        assert_eq!(e.state(), ProxyState::ShuttingDown);
        assert!(e.subscription_id.is_none());
    }
}
