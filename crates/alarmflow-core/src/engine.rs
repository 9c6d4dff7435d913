// ── Alarm workflow engine ──
//
// Owns the alarm sources (one thread each), the job manager and the
// operation store. Sources report through one channel; a single
// dispatcher thread stores each operation and fans it out to the jobs.
//
// Stopping is cooperative: the cancellation token ends every source
// loop, the channel drains, and only then are plugins disposed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{CoreError, panic_message};
use crate::job::JobManager;
use crate::model::{AlarmEvent, JobContext, JobPhase, Operation};
use crate::registry::{PluginRegistry, Services};
use crate::source::{AlarmSink, AlarmSource};
use crate::store::OperationStore;

/// How long a one-shot pass waits for asynchronous jobs before returning.
const ONE_SHOT_JOB_GRACE: Duration = Duration::from_secs(5);

// ── EngineState ─────────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    /// Running with the listed source aliases.
    Running { sources: Vec<String> },
    Failed { reason: String },
}

// ── Engine ──────────────────────────────────────────────────────────

/// The alarm-processing engine.
///
/// Cheaply cloneable via `Arc<EngineInner>`. `start` and `stop` may be
/// called repeatedly; each start builds fresh plugin instances.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: Arc<EngineConfig>,
    registry: Arc<PluginRegistry>,
    state: watch::Sender<EngineState>,
    running: Mutex<Option<Running>>,
}

/// Everything a started engine owns.
struct Running {
    handler: Arc<AlarmHandler>,
    cancel: CancellationToken,
    sink: Option<AlarmSink>,
    sources: Vec<SourceThread>,
    dispatcher: Option<JoinHandle<()>>,
}

struct SourceThread {
    alias: String,
    handle: JoinHandle<Box<dyn AlarmSource>>,
}

/// Store plus jobs plus the initialized sources, before any thread runs.
struct Components {
    handler: Arc<AlarmHandler>,
    sources: Vec<(String, Box<dyn AlarmSource>)>,
}

impl Engine {
    pub fn new(config: EngineConfig, registry: PluginRegistry) -> Self {
        let (state, _) = watch::channel(EngineState::Stopped);
        Self {
            inner: Arc::new(EngineInner {
                config: Arc::new(config),
                registry: Arc::new(registry),
                state,
                running: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Subscribe to lifecycle changes.
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// The operation store of the running engine.
    pub fn store(&self) -> Option<Arc<dyn OperationStore>> {
        self.lock_running()
            .as_ref()
            .map(|running| Arc::clone(&running.handler.store))
    }

    /// Aliases of the jobs currently active.
    pub fn active_jobs(&self) -> Vec<String> {
        self.lock_running()
            .as_ref()
            .map(|running| running.handler.jobs.active_jobs())
            .unwrap_or_default()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Build every plugin and start one thread per alarm source.
    ///
    /// Sources that fail to initialize or spawn are skipped with a
    /// warning. If none is left the engine does not start.
    pub fn start(&self) -> Result<(), CoreError> {
        let mut slot = self.lock_running();
        if slot.is_some() {
            return Err(CoreError::AlreadyStarted);
        }
        self.set_state(EngineState::Starting);

        match self.launch() {
            Ok(running) => {
                let sources = running.sources.iter().map(|s| s.alias.clone()).collect();
                *slot = Some(running);
                self.set_state(EngineState::Running { sources });
                info!("engine started");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "engine failed to start");
                self.set_state(EngineState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stop every source, drain pending alarms and dispose all plugins.
    pub fn stop(&self) -> Result<(), CoreError> {
        let running = self.lock_running().take().ok_or(CoreError::NotStarted)?;
        running.shutdown();
        self.set_state(EngineState::Stopped);
        info!("engine stopped");
        Ok(())
    }

    /// Run a single polling pass of every enabled source without
    /// starting threads. Returns the number of operations stored.
    pub fn poll_once(&self) -> Result<usize, CoreError> {
        if self.is_running() {
            return Err(CoreError::AlreadyStarted);
        }
        let Components {
            handler,
            mut sources,
        } = self.build_components()?;

        let (sink, mut rx) = AlarmSink::channel("engine");
        let cancel = CancellationToken::new();
        for (alias, source) in &mut sources {
            let sink = sink.for_source(alias.as_str());
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.poll_once(&sink, &cancel)));
            log_source_outcome(alias, outcome);
        }
        drop(sink);

        let mut stored = 0;
        while let Ok(event) = rx.try_recv() {
            if handler.dispatch(event).is_some() {
                stored += 1;
            }
        }

        for (alias, mut source) in sources {
            dispose_source(&alias, source.as_mut());
        }
        handler.jobs.dispose_graceful(ONE_SHOT_JOB_GRACE);
        Ok(stored)
    }

    /// Replace the set of enabled jobs on a running engine.
    pub fn set_enabled_jobs(&self, aliases: &[String]) -> Result<(), CoreError> {
        let slot = self.lock_running();
        let running = slot.as_ref().ok_or(CoreError::NotStarted)?;
        running.handler.jobs.reconfigure(aliases);
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: EngineState) {
        // `send_replace` updates even with zero receivers.
        self.inner.state.send_replace(state);
    }

    fn services(&self) -> Result<Services, CoreError> {
        let config = &self.inner.config;
        let store = self
            .inner
            .registry
            .operation_stores
            .create(&config.operation_store, config)?;
        Ok(Services {
            config: Arc::clone(config),
            registry: Arc::clone(&self.inner.registry),
            store: Arc::from(store),
        })
    }

    fn build_components(&self) -> Result<Components, CoreError> {
        let services = self.services()?;
        let jobs = Arc::new(JobManager::initialize(&services)?);

        let mut sources = Vec::new();
        for alias in &self.inner.config.alarm_sources {
            match create_source(&services, alias) {
                Ok(source) => sources.push((alias.clone(), source)),
                Err(e) => warn!(source = %alias, error = %e, "alarm source could not be initialized"),
            }
        }

        if sources.is_empty() {
            jobs.dispose();
            return Err(CoreError::NoAlarmSourcesStarted);
        }

        Ok(Components {
            handler: Arc::new(AlarmHandler {
                store: Arc::clone(&services.store),
                jobs,
                ignore_duplicates: self.inner.config.ignore_duplicate_operation_numbers,
            }),
            sources,
        })
    }

    fn launch(&self) -> Result<Running, CoreError> {
        let Components { handler, sources } = self.build_components()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = AlarmSink::new("engine", tx);
        let cancel = CancellationToken::new();

        let dispatcher = spawn_dispatcher(Arc::clone(&handler), rx)?;

        let mut threads = Vec::new();
        for (alias, source) in sources {
            match spawn_source(&alias, source, sink.for_source(alias.as_str()), cancel.clone()) {
                Ok(handle) => threads.push(SourceThread { alias, handle }),
                Err(e) => warn!(source = %alias, error = %e, "alarm source could not be started"),
            }
        }

        let mut running = Running {
            handler,
            cancel,
            sink: Some(sink),
            sources: threads,
            dispatcher: Some(dispatcher),
        };

        if running.sources.is_empty() {
            running.sink = None;
            running.shutdown();
            return Err(CoreError::NoAlarmSourcesStarted);
        }
        Ok(running)
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            running.shutdown();
        }
    }
}

impl Running {
    fn shutdown(mut self) {
        self.cancel.cancel();

        let mut stopped = Vec::new();
        for SourceThread { alias, handle } in self.sources.drain(..) {
            match handle.join() {
                Ok(source) => stopped.push((alias, source)),
                Err(payload) => error!(
                    source = %alias,
                    panic = %panic_message(payload.as_ref()),
                    "alarm source thread could not be joined"
                ),
            }
        }

        // Closing the last sender lets the dispatcher drain and exit.
        self.sink = None;
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                error!("alarm dispatcher thread panicked");
            }
        }

        for (alias, mut source) in stopped {
            dispose_source(&alias, source.as_mut());
        }
        self.handler.jobs.dispose();
        debug!("engine components released");
    }
}

// ── Event handling ──────────────────────────────────────────────────

/// Turns NewAlarm events into stored operations and job runs.
///
/// Only reads shared state, so it may be called from any thread.
struct AlarmHandler {
    store: Arc<dyn OperationStore>,
    jobs: Arc<JobManager>,
    ignore_duplicates: bool,
}

impl AlarmHandler {
    /// Handle one event behind a panic boundary.
    fn dispatch(&self, event: AlarmEvent) -> Option<Operation> {
        let source = event.source.clone();
        panic::catch_unwind(AssertUnwindSafe(|| self.handle(event))).unwrap_or_else(|payload| {
            error!(
                source = %source,
                panic = %panic_message(payload.as_ref()),
                "alarm handling panicked"
            );
            None
        })
    }

    /// Store the operation, then run the jobs. Returns the stored operation.
    fn handle(&self, event: AlarmEvent) -> Option<Operation> {
        let AlarmEvent {
            source,
            operation,
            parameters,
        } = event;
        let Some(mut operation) = operation else {
            warn!(source = %source, "alarm event carries no operation, ignoring");
            return None;
        };

        if self.is_duplicate(&source, &operation) {
            return None;
        }

        if operation.ensure_timestamp() {
            warn!(source = %source, "operation has no alarm time, using current time");
        }

        let surfaced = JobContext::new(&source, parameters.clone(), JobPhase::OnOperationSurfaced);
        self.jobs.execute_jobs(&surfaced, &mut operation);
        operation.ensure_timestamp();

        let stored = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.store.store_operation(operation)
        })) {
            Ok(Ok(stored)) => stored,
            Ok(Err(e)) => {
                error!(source = %source, error = %e, "could not store operation, skipping jobs");
                return None;
            }
            Err(payload) => {
                error!(
                    source = %source,
                    panic = %panic_message(payload.as_ref()),
                    "operation store panicked, skipping jobs"
                );
                return None;
            }
        };
        info!(
            source = %source,
            operation_id = ?stored.id.map(|id| id.get()),
            number = stored.operation_number.as_deref().unwrap_or(""),
            "operation stored"
        );

        let after = JobContext::new(&source, parameters, JobPhase::AfterOperationStored);
        let mut for_jobs = stored.clone();
        self.jobs.execute_jobs(&after, &mut for_jobs);
        Some(stored)
    }

    fn is_duplicate(&self, source: &str, operation: &Operation) -> bool {
        if !self.ignore_duplicates {
            return false;
        }
        let Some(number) = operation
            .operation_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        else {
            return false;
        };

        match self.store.exists_operation(number) {
            Ok(true) => {
                info!(source, number, "operation number already stored, ignoring alarm");
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(source, number, error = %e, "duplicate check failed, processing alarm");
                false
            }
        }
    }
}

// ── Threads ─────────────────────────────────────────────────────────

fn create_source(services: &Services, alias: &str) -> Result<Box<dyn AlarmSource>, CoreError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut source = services.registry.alarm_sources.create(alias, &services.config)?;
        source.initialize(services)?;
        debug!(source = alias, name = source.name(), "alarm source initialized");
        Ok::<_, CoreError>(source)
    }))
    .unwrap_or_else(|payload| {
        Err(CoreError::AlarmSource {
            source_name: alias.to_owned(),
            message: format!("panicked during initialization: {}", panic_message(payload.as_ref())),
        })
    })
}

fn spawn_dispatcher(
    handler: Arc<AlarmHandler>,
    mut rx: mpsc::UnboundedReceiver<AlarmEvent>,
) -> Result<JoinHandle<()>, CoreError> {
    thread::Builder::new()
        .name("alarmflow-dispatcher".into())
        .spawn(move || {
            while let Some(event) = rx.blocking_recv() {
                handler.dispatch(event);
            }
            debug!("alarm channel closed, dispatcher exiting");
        })
        .map_err(|e| CoreError::Internal(format!("could not start dispatcher thread: {e}")))
}

fn spawn_source(
    alias: &str,
    mut source: Box<dyn AlarmSource>,
    sink: AlarmSink,
    cancel: CancellationToken,
) -> Result<JoinHandle<Box<dyn AlarmSource>>, CoreError> {
    let name = alias.to_owned();
    thread::Builder::new()
        .name(format!("alarmflow-source-{alias}"))
        .spawn(move || {
            info!(source = %name, "alarm source running");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.run(&sink, &cancel)));
            log_source_outcome(&name, outcome);
            source
        })
        .map_err(|e| CoreError::AlarmSource {
            source_name: alias.to_owned(),
            message: format!("could not spawn thread: {e}"),
        })
}

fn log_source_outcome(alias: &str, outcome: thread::Result<Result<(), CoreError>>) {
    match outcome {
        Ok(Ok(())) => debug!(source = alias, "alarm source finished"),
        Ok(Err(e)) => error!(source = alias, error = %e, "alarm source failed"),
        Err(payload) => error!(
            source = alias,
            panic = %panic_message(payload.as_ref()),
            "alarm source crashed"
        ),
    }
}

fn dispose_source(alias: &str, source: &mut dyn AlarmSource) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| source.dispose())) {
        warn!(
            source = alias,
            panic = %panic_message(payload.as_ref()),
            "alarm source panicked while disposing"
        );
    }
}
