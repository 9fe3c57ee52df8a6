//! Run orchestration: task creation, session fan-out and teardown.

use std::sync::Arc;

use futures_util::future::join_all;
use task_event::{CreateTaskResponse, NaiveTaskResponse};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::{ClientRef, StoreMessage};
use crate::session::{EventSink, PollingSession, SessionHandle, StreamingSession};
use crate::state::{Mode, RunState};
use crate::store::{StateStore, StoreHandle};
use crate::task::TaskSpec;
use crate::transport::{HttpResponse, TransportClient};

/// Task ids of one run: the push task and its polling twin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartedTask {
    pub task_id: String,
    pub poll_task_id: String,
}

pub struct RunController {
    config: EngineConfig,
    transport: Arc<dyn TransportClient>,
    store: StoreHandle,
    sessions: Vec<SessionHandle>,
    generation: u64,
}

impl RunController {
    /// Spawns the state store; must be called inside a tokio runtime.
    pub fn new(config: EngineConfig, transport: Arc<dyn TransportClient>) -> Self {
        let config = config.normalized();
        let store = StateStore::new(config.client_count)
            .spawn(config.redraw_interval, config.event_queue_capacity);
        Self {
            config,
            transport,
            store,
            sessions: Vec::new(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshots published on the redraw cadence.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> RunState {
        self.store.snapshot()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Starts a new run, stopping the previous one first.
    ///
    /// On a validation or task-creation failure the run is put in ERROR, no session is
    /// started, and the error is returned.
    pub async fn run(&mut self, task: TaskSpec) -> Result<StartedTask, EngineError> {
        self.stop().await;
        self.generation += 1;
        let generation = self.generation;
        self.store.send(StoreMessage::Reset { generation }).await;
        self.store.send(StoreMessage::Starting { generation }).await;
        info!(generation, kind = task.kind(), "run starting");

        let started = match self.create_tasks(&task).await {
            Ok(started) => started,
            Err(e) => {
                error!(generation, error = %e, "run failed to start");
                self.store
                    .send(StoreMessage::Failed {
                        generation,
                        error: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };
        self.store
            .send(StoreMessage::Started {
                generation,
                task_id: started.task_id.clone(),
            })
            .await;
        self.spawn_sessions(&task, &started, generation);
        info!(
            generation,
            task_id = %started.task_id,
            clients = self.config.client_count,
            "run started"
        );
        Ok(started)
    }

    async fn create_tasks(&self, task: &TaskSpec) -> Result<StartedTask, EngineError> {
        task.validate()?;
        let endpoints = task.endpoints();

        let resp = self.post(endpoints.create, &task.create_body()?, "push task").await?;
        let created: CreateTaskResponse = startup_json(&resp, "push task")?;
        if created.id.is_empty() {
            return Err(EngineError::Startup("push task: empty id".into()));
        }

        let resp = self
            .post(endpoints.naive_create, &task.naive_create_body(&created.id)?, "poll task")
            .await?;
        let naive: NaiveTaskResponse = startup_json(&resp, "poll task")?;
        let poll_task_id = if naive.task_id.is_empty() {
            created.id.clone()
        } else {
            naive.task_id
        };
        Ok(StartedTask {
            task_id: created.id,
            poll_task_id,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        what: &str,
    ) -> Result<HttpResponse, EngineError> {
        self.transport
            .post_json(path, body)
            .await
            .map_err(|e| EngineError::Startup(format!("create {}: {}", what, e)))
    }

    fn spawn_sessions(&mut self, task: &TaskSpec, started: &StartedTask, generation: u64) {
        let tx = self.store.sender();
        for index in 0..self.config.client_count {
            let client = ClientRef {
                generation,
                mode: Mode::Streaming,
                index,
            };
            let session = StreamingSession::new(
                self.transport.clone(),
                started.task_id.clone(),
                self.config.keepalive_interval,
                EventSink::new(tx.clone(), client),
            );
            self.sessions.push(session.spawn());
        }
        for index in 0..self.config.client_count {
            let client = ClientRef {
                generation,
                mode: Mode::Polling,
                index,
            };
            let session = PollingSession::new(
                self.transport.clone(),
                started.poll_task_id.clone(),
                task.endpoints(),
                task.result_shape(),
                self.config.poll_interval,
                EventSink::new(tx.clone(), client),
            );
            self.sessions.push(session.spawn());
        }
    }

    /// Stops every session and waits for them to exit. Idempotent.
    pub async fn stop(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        join_all(self.sessions.iter_mut().map(SessionHandle::stop)).await;
        self.sessions.clear();
    }

    /// Resolves with the snapshot once the current run is DONE or ERROR.
    ///
    /// Returns immediately when no run was started.
    pub async fn wait_until_settled(&self) -> RunState {
        let mut rx = self.subscribe();
        let generation = self.generation;
        if generation == 0 {
            return rx.borrow().clone();
        }
        loop {
            {
                let state = rx.borrow_and_update();
                if state.generation == generation && state.status.is_settled() {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    /// Stops the sessions, then the store.
    pub async fn shutdown(mut self) -> RunState {
        self.stop().await;
        self.store.shutdown().await;
        self.store.snapshot()
    }
}

fn startup_json<T: serde::de::DeserializeOwned>(
    resp: &HttpResponse,
    what: &str,
) -> Result<T, EngineError> {
    if !resp.is_success() {
        return Err(EngineError::Startup(format!(
            "create {}: status {}",
            what, resp.status
        )));
    }
    serde_json::from_str(&resp.body)
        .map_err(|e| EngineError::Startup(format!("create {}: {}", what, e)))
}
