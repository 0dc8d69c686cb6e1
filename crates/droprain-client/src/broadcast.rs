//! Host-side problem broadcasting.
//!
//! The host client is the only writer of a room's current problem.  A
//! [`ProblemBroadcaster`] checks the room on a fixed cadence and, when
//! [`decide_spawn`] says so, replaces the shared problem: clear it, let the
//! clear propagate, then write a freshly generated one.  Every other client
//! treats each new problem as a spawn signal (see [`crate::droplets`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use droprain_shared::problem::FactorPair;
use droprain_shared::{DifficultyConfig, Problem, ProblemKey, RoomId, RoomStatus, UserId};
use droprain_store::{BackendError, Room, RoomRepo};

use crate::config::ClientConfig;
use crate::SharedBackend;

/// Everything [`decide_spawn`] looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnInputs {
    pub in_flight: bool,
    /// Time since this host last wrote a problem; `None` before the first.
    pub since_last_spawn: Option<Duration>,
    /// Age of the problem currently in the room record, if any.
    pub problem_age: Option<Duration>,
    pub spawn_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnDecision {
    /// A generation is already running.
    InFlight,
    /// Less than one spawn interval since the last write.
    TooSoon,
    /// The current problem is younger than two spawn intervals.
    Fresh,
    /// Write a new problem, clearing the existing one first if `replace`.
    Spawn { replace: bool },
}

/// One step of the host's spawn state machine.
pub fn decide_spawn(inputs: SpawnInputs) -> SpawnDecision {
    if inputs.in_flight {
        return SpawnDecision::InFlight;
    }
    if inputs
        .since_last_spawn
        .is_some_and(|elapsed| elapsed < inputs.spawn_interval)
    {
        return SpawnDecision::TooSoon;
    }
    match inputs.problem_age {
        Some(age) if age < inputs.spawn_interval * 2 => SpawnDecision::Fresh,
        Some(_) => SpawnDecision::Spawn { replace: true },
        None => SpawnDecision::Spawn { replace: false },
    }
}

/// Holds the in-flight flag for the lifetime of one generation.
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    /// Set the flag if it is clear.  Check and set are one atomic step, so
    /// two callers can never both succeed.
    pub fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Progress {
    /// Factor pair of the last problem written; kept across clears.
    previous: Option<FactorPair>,
    last_spawn: Option<Instant>,
    last_written: Option<(ProblemKey, Instant)>,
}

struct Host {
    backend: SharedBackend,
    room_id: RoomId,
    host_id: UserId,
    config: &'static DifficultyConfig,
    tables: Vec<u32>,
    settle: Duration,
    progress: Mutex<Progress>,
    in_flight: Arc<AtomicBool>,
}

impl Host {
    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.config.spawn_interval_ms)
    }

    /// Age of the room's current problem.  Problems this host wrote are
    /// timed on the local monotonic clock; anything else by its timestamp.
    fn problem_age(&self, room: &Room) -> Option<Duration> {
        let problem = room.current_problem.as_ref()?;
        let progress = self.progress();
        match &progress.last_written {
            Some((key, written)) if *key == problem.key() => Some(written.elapsed()),
            _ => Some(
                (Utc::now() - problem.created_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            ),
        }
    }

    fn inputs(&self, room: &Room) -> SpawnInputs {
        let since_last_spawn = self.progress().last_spawn.map(|at| at.elapsed());
        let problem_age = self.problem_age(room);
        SpawnInputs {
            in_flight: self.in_flight.load(Ordering::Acquire),
            since_last_spawn,
            problem_age,
            spawn_interval: self.spawn_interval(),
        }
    }

    async fn generate(&self, replace: bool) {
        if replace {
            match self.backend.set_room_problem(self.room_id, self.host_id, None).await {
                Ok(_) => {}
                Err(BackendError::NotFound) => return,
                Err(e) => {
                    tracing::warn!(room_id = %self.room_id, error = %e, "failed to clear problem");
                    return;
                }
            }
            sleep(self.settle).await;
        }

        let previous = self.progress().previous;
        let problem = {
            let mut rng = rand::thread_rng();
            Problem::generate(&mut rng, self.config, &self.tables, previous, Utc::now())
        };

        match self
            .backend
            .set_room_problem(self.room_id, self.host_id, Some(problem.clone()))
            .await
        {
            Ok(_) => {
                let now = Instant::now();
                let mut progress = self.progress();
                progress.previous = Some(problem.factors());
                progress.last_spawn = Some(now);
                progress.last_written = Some((problem.key(), now));
                tracing::debug!(
                    room_id = %self.room_id,
                    problem = %problem.problem,
                    item = ?problem.item_type,
                    "problem broadcast"
                );
            }
            Err(e) => tracing::warn!(room_id = %self.room_id, error = %e, "failed to write problem"),
        }
    }
}

/// Handle to the host's broadcasting task.  Dropping it stops the task.
pub struct ProblemBroadcaster {
    /// `None` once detached.
    handle: Option<JoinHandle<()>>,
}

impl ProblemBroadcaster {
    /// Start broadcasting for `room`.  The task idles while the room is
    /// waiting and exits once it is finished or gone.
    pub fn spawn(backend: SharedBackend, room: &Room, config: &ClientConfig) -> Self {
        let host = Arc::new(Host {
            backend,
            room_id: room.id,
            host_id: room.host_id,
            config: room.difficulty.config(),
            tables: room.tables(),
            settle: config.problem_settle,
            progress: Mutex::new(Progress::default()),
            in_flight: Arc::new(AtomicBool::new(false)),
        });
        let period = config.host_check;
        let handle = tokio::spawn(run(host, period));
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Let the task outlive this handle.  It keeps serving problems until
    /// the room is finished or deleted.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for ProblemBroadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(host: Arc<Host>, period: Duration) {
    tracing::info!(room_id = %host.room_id, "problem broadcaster started");
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let room = match host.backend.get_room(host.room_id).await {
            Ok(room) => room,
            Err(BackendError::NotFound) => break,
            Err(e) => {
                tracing::warn!(room_id = %host.room_id, error = %e, "host check failed");
                continue;
            }
        };
        match room.status {
            RoomStatus::Waiting => continue,
            RoomStatus::Finished => break,
            RoomStatus::Playing => {}
        }

        let decision = decide_spawn(host.inputs(&room));
        let SpawnDecision::Spawn { replace } = decision else {
            tracing::trace!(room_id = %host.room_id, ?decision, "no spawn");
            continue;
        };
        let Some(guard) = InFlightGuard::acquire(&host.in_flight) else {
            continue;
        };
        let job = host.clone();
        tokio::spawn(async move {
            let _guard = guard;
            job.generate(replace).await;
        });
    }
    tracing::info!(room_id = %host.room_id, "problem broadcaster stopped");
}
