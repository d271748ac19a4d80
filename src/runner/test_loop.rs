//! Test loop engine - drives partition workers through ingest/read/remove cycles.
//!
//! One `TestLoop` executes one runner's run:
//! 1. Publishes initial status synchronously
//! 2. Starts the status gathering task
//! 3. Spawns one worker per partition, each owning one remote map
//! 4. Waits for every worker, then finalizes status

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{LoopType, RunnerConfig, SleepConfig};
use crate::error::{GridloadError, Result};
use crate::id::ClientIdentity;
use crate::naming::{assemble_map_key, assemble_map_name};
use crate::status::{
    STATUS_KEY_NUM_MAPS, STATUS_KEY_NUM_RUNS, STATUS_KEY_RUNNER_FINISHED, STATUS_KEY_TOTAL_RUNS,
    StatusGatherer, StatusRegistry, StatusUpdate, TestLoopKind,
};
use crate::store::{MapHandle, MapStore};

/// Runs between two progress log lines of a partition.
const UPDATE_STEP: u32 = 50;

/// A unit of test payload the engine can store and verify.
pub trait LoopElement: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier unique within the element set.
    fn element_id(&self) -> String;

    /// Verify that a value read back from the grid is a valid element.
    fn check_deserialized(value: &Value) -> Result<()> {
        serde_json::from_value::<Self>(value.clone())
            .map(|_| ())
            .map_err(|e| {
                GridloadError::Deserialization(format!(
                    "value retrieved from map is not a valid {}: {}",
                    std::any::type_name::<Self>(),
                    e
                ))
            })
    }
}

/// Execution context of one test loop run.
pub struct TestLoopConfig<T> {
    pub id: Uuid,
    pub source: String,
    pub map_store: Arc<dyn MapStore>,
    pub runner_config: Arc<RunnerConfig>,
    pub elements: Arc<Vec<T>>,
    pub cancel: CancellationToken,
    pub client: ClientIdentity,
    pub get_map_timeout: Duration,
}

impl<T> Clone for TestLoopConfig<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            source: self.source.clone(),
            map_store: self.map_store.clone(),
            runner_config: self.runner_config.clone(),
            elements: self.elements.clone(),
            cancel: self.cancel.clone(),
            client: self.client.clone(),
            get_map_timeout: self.get_map_timeout,
        }
    }
}

/// Status key of a partition's completed iterations.
pub fn completed_runs_key(partition: u16) -> String {
    format!("partition-{}.completedRuns", partition)
}

/// Status key of a partition's failed iterations.
pub fn failed_runs_key(partition: u16) -> String {
    format!("partition-{}.failedRuns", partition)
}

/// Contract of a test loop.
#[async_trait]
pub trait Looper<T: LoopElement>: Send {
    /// Bind configuration and register the run's status accessor. Call once, before `run`.
    fn init(&mut self, config: TestLoopConfig<T>, gatherer: StatusGatherer, registry: &StatusRegistry);

    /// Execute until every partition worker finished.
    async fn run(&mut self) -> Result<()>;
}

/// Batch test loop over elements of type `T`.
pub struct TestLoop<T> {
    config: Option<Arc<TestLoopConfig<T>>>,
    gatherer: Option<StatusGatherer>,
}

impl<T> Default for TestLoop<T> {
    fn default() -> Self {
        Self {
            config: None,
            gatherer: None,
        }
    }
}

impl<T: LoopElement> TestLoop<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_initial_status(config: &TestLoopConfig<T>, gatherer: &StatusGatherer) -> Result<()> {
        // Synchronous on purpose: workers and readers may rely on these keys
        let rc = &config.runner_config;
        gatherer.insert_synchronously(StatusUpdate::new(STATUS_KEY_NUM_MAPS, rc.num_maps))?;
        gatherer.insert_synchronously(StatusUpdate::new(STATUS_KEY_NUM_RUNS, rc.num_runs))?;
        gatherer.insert_synchronously(StatusUpdate::new(STATUS_KEY_TOTAL_RUNS, rc.total_runs()))?;
        gatherer.insert_synchronously(StatusUpdate::new(STATUS_KEY_RUNNER_FINISHED, false))?;
        Ok(())
    }
}

#[async_trait]
impl<T: LoopElement> Looper<T> for TestLoop<T> {
    fn init(&mut self, config: TestLoopConfig<T>, gatherer: StatusGatherer, registry: &StatusRegistry) {
        let table = gatherer.table();
        registry.register_test_loop(
            TestLoopKind::Maps,
            &config.source,
            config.id,
            Arc::new(move || Some(table.snapshot())),
        );
        self.config = Some(Arc::new(config));
        self.gatherer = Some(gatherer);
    }

    async fn run(&mut self) -> Result<()> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| GridloadError::InvalidState("test loop run before init".to_string()))?;
        let gatherer = self
            .gatherer
            .as_mut()
            .ok_or_else(|| GridloadError::InvalidState("test loop run before init".to_string()))?;

        Self::insert_initial_status(&config, gatherer)?;
        let gathering = gatherer.listen()?;

        if config.runner_config.loop_type == LoopType::Boundary {
            log::warn!(
                "{}: boundary test loop is not available yet, running batch operations instead",
                config.source
            );
        }

        let mut workers = Vec::with_capacity(usize::from(config.runner_config.num_maps));
        for partition in 0..config.runner_config.num_maps {
            let config = config.clone();
            let status = gatherer.sender();
            workers.push(tokio::spawn(run_partition(config, status, partition)));
        }

        let results = futures::future::join_all(workers).await;
        for (partition, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                log::error!("{}: worker of partition {} panicked: {}", config.source, partition, e);
            }
        }

        gatherer.stop();
        if let Err(e) = gathering.await {
            log::error!("{}: status gathering task failed: {}", config.source, e);
        }

        Ok(())
    }
}

/// Race a remote call against the cancellation token.
async fn cancellable<F, R>(token: &CancellationToken, operation: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    if token.is_cancelled() {
        return Err(GridloadError::Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(GridloadError::Cancelled),
        result = operation => result,
    }
}

async fn acquire_map<T>(config: &TestLoopConfig<T>, map_name: &str) -> Result<Arc<dyn MapHandle>> {
    let timeout = config.get_map_timeout;
    match tokio::time::timeout(timeout, cancellable(&config.cancel, config.map_store.get_map(map_name))).await {
        Ok(result) => result,
        Err(_) => Err(GridloadError::Timeout(
            timeout.as_millis() as u64,
            format!("get_map({})", map_name),
        )),
    }
}

async fn run_partition<T: LoopElement>(
    config: Arc<TestLoopConfig<T>>,
    status: mpsc::UnboundedSender<StatusUpdate>,
    partition: u16,
) {
    let map_name = assemble_map_name(&config.runner_config, partition, &config.client);
    log::info!(
        "{}: using map name '{}' in partition {}",
        config.source,
        map_name,
        partition
    );

    let start = Instant::now();
    let map = match acquire_map(&config, &map_name).await {
        Ok(map) => map,
        Err(e) => {
            tracing::error!(
                source = %config.source,
                map = %map_name,
                partition,
                error = %e,
                "unable to retrieve map, aborting partition"
            );
            return;
        }
    };
    log::info!(
        "{}: get_map() on '{}' took {} ms",
        config.source,
        map_name,
        start.elapsed().as_millis()
    );

    let worker = PartitionWorker {
        config: config.clone(),
        map: map.clone(),
        map_name,
        partition,
        status,
    };
    let outcome = AssertUnwindSafe(worker.run_for_map()).catch_unwind().await;

    // Released outside the cancellation race and after a worker panic, so cleanup always happens
    if let Err(e) = map.destroy().await {
        tracing::warn!(
            source = %config.source,
            map = %map.name(),
            partition,
            error = %e,
            "failed to release map handle"
        );
    }

    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
}

/// Operation of an iteration that failed, plus the cause.
#[derive(Debug)]
struct IterationFailure {
    action: &'static str,
    cause: GridloadError,
}

/// Works one partition's map for the configured number of runs.
struct PartitionWorker<T> {
    config: Arc<TestLoopConfig<T>>,
    map: Arc<dyn MapHandle>,
    map_name: String,
    partition: u16,
    status: mpsc::UnboundedSender<StatusUpdate>,
}

impl<T: LoopElement> PartitionWorker<T> {
    async fn run_for_map(&self) {
        let rc = &self.config.runner_config;
        let mut completed: u32 = 0;
        let mut failed: u32 = 0;

        for run in 0..rc.num_runs {
            sleep(&rc.sleep_between_runs).await;
            if run > 0 && run % UPDATE_STEP == 0 {
                log::info!(
                    "{}: finished {} of {} runs for map '{}' in partition {}",
                    self.config.source,
                    run,
                    rc.num_runs,
                    self.map_name,
                    self.partition
                );
            }
            log::trace!(
                "{}: in run {} on map '{}' in partition {}",
                self.config.source,
                run,
                self.map_name,
                self.partition
            );

            match self.run_iteration().await {
                Ok(()) => {
                    completed += 1;
                    self.publish(completed_runs_key(self.partition), completed);
                }
                Err(failure) => {
                    failed += 1;
                    tracing::warn!(
                        source = %self.config.source,
                        map = %self.map_name,
                        partition = self.partition,
                        run,
                        error = %failure.cause,
                        "failed to {} map",
                        failure.action
                    );
                    self.publish(failed_runs_key(self.partition), failed);
                }
            }
        }

        log::info!(
            "{}: map test loop done on map '{}' in partition {} ({} ok, {} failed)",
            self.config.source,
            self.map_name,
            self.partition,
            completed,
            failed
        );
    }

    async fn run_iteration(&self) -> std::result::Result<(), IterationFailure> {
        let between_batches = &self.config.runner_config.batch.sleep_between_action_batches;

        self.ingest_all().await.map_err(|cause| IterationFailure {
            action: "ingest data into",
            cause,
        })?;
        sleep(between_batches).await;
        self.read_all().await.map_err(|cause| IterationFailure {
            action: "read data from",
            cause,
        })?;
        sleep(between_batches).await;
        self.remove_some().await.map_err(|cause| IterationFailure {
            action: "delete data from",
            cause,
        })?;
        Ok(())
    }

    fn key_for(&self, element: &T) -> String {
        assemble_map_key(&self.config.client, self.partition, &element.element_id())
    }

    fn publish(&self, key: String, value: u32) {
        // Receiver only goes away after all workers joined
        let _ = self.status.send(StatusUpdate::new(key, value));
    }

    /// Write every element whose key is not present yet. Returns the number written.
    async fn ingest_all(&self) -> Result<usize> {
        let cancel = &self.config.cancel;
        let mut newly_ingested = 0;

        for element in self.config.elements.iter() {
            let key = self.key_for(element);
            if cancellable(cancel, self.map.contains_key(&key)).await? {
                continue;
            }
            let value = serde_json::to_value(element)?;
            cancellable(cancel, self.map.set(&key, value)).await?;
            newly_ingested += 1;
        }

        log::trace!("stored {} items in map '{}'", newly_ingested, self.map_name);
        Ok(newly_ingested)
    }

    /// Fetch and verify every element.
    async fn read_all(&self) -> Result<usize> {
        let cancel = &self.config.cancel;

        for element in self.config.elements.iter() {
            let key = self.key_for(element);
            let value = cancellable(cancel, self.map.get(&key))
                .await?
                .ok_or_else(|| GridloadError::MissingValue(key.clone()))?;
            T::check_deserialized(&value)?;
        }

        log::trace!(
            "retrieved {} items from map '{}'",
            self.config.elements.len(),
            self.map_name
        );
        Ok(self.config.elements.len())
    }

    /// Remove a random prefix of the element set. Returns the number removed.
    async fn remove_some(&self) -> Result<usize> {
        let cancel = &self.config.cancel;
        let elements = &self.config.elements;
        let num_to_remove = removal_count(elements.len());
        let mut removed = 0;

        for element in elements.iter().take(num_to_remove) {
            let key = self.key_for(element);
            if !cancellable(cancel, self.map.contains_key(&key)).await? {
                continue;
            }
            cancellable(cancel, self.map.remove(&key)).await?;
            removed += 1;
        }

        log::trace!("removed {} elements from map '{}'", removed, self.map_name);
        Ok(removed)
    }
}

/// Length of the prefix removed by one remove step, in `[0, len)`.
pub fn removal_count(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    rand::rng().random_range(0..len)
}

/// Milliseconds one sleep under `config` lasts.
pub fn sleep_duration_ms(config: &SleepConfig) -> u64 {
    if !config.enabled {
        return 0;
    }
    if config.enable_randomness {
        rand::rng().random_range(0..=config.duration_ms)
    } else {
        config.duration_ms
    }
}

/// Pause according to a sleep policy.
pub async fn sleep(config: &SleepConfig) {
    if !config.enabled {
        return;
    }
    let duration_ms = sleep_duration_ms(config);
    log::trace!("sleeping for {} milliseconds", duration_ms);
    tokio::time::sleep(Duration::from_millis(duration_ms)).await;
}
