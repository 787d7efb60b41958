use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use ulid::Ulid;

use crate::{
    adaptive_controller::{AdaptiveController, Snapshot, SwitchEvent},
    algorithm::{AckSample, AlgorithmKind},
    clock::{Clock, SystemClock},
    config::EngineConfig,
    error::{Error, Result},
    performance::PerformanceReport,
    units::{DataSize, TimeDelta, Timestamp},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(Ulid);

impl SessionId {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|err| Error::InvalidArgument(format!("invalid session id {s:?}: {err}")))
    }
}

struct Session {
    controller: RwLock<AdaptiveController>,
    // Microseconds; only ever moves forward.
    last_activity_us: AtomicI64,
    // Set once the session leaves the registry, for callers still holding it.
    closed: AtomicBool,
}

impl Session {
    fn new(controller: AdaptiveController, at_time: Timestamp) -> Self {
        Self {
            controller: RwLock::new(controller),
            last_activity_us: AtomicI64::new(at_time.us()),
            closed: AtomicBool::new(false),
        }
    }

    fn touch(&self, at_time: Timestamp) {
        self.last_activity_us.fetch_max(at_time.us(), Ordering::AcqRel);
    }

    fn last_activity(&self) -> Timestamp {
        Timestamp::from_micros(self.last_activity_us.load(Ordering::Acquire))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// All live sessions, each with its own [AdaptiveController].
///
/// The map lock is only held for lookups and structural changes, never while a
/// session is locked. Operations on one session are serialized, snapshots of the
/// same session may run in parallel.
pub struct SessionRegistry<C: Clock = SystemClock> {
    config: EngineConfig,
    clock: C,
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<C: Clock> SessionRegistry<C> {
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn open_session(&self) -> SessionId {
        let at_time = self.clock.now();
        let id = SessionId::new();
        let controller = AdaptiveController::new(&self.config, at_time);
        self.sessions
            .lock()
            .insert(id, Arc::new(Session::new(controller, at_time)));

        tracing::info!(%id, algorithm = %self.config.initial_algorithm, "session opened");
        id
    }

    /// Returns false if there was no such session.
    pub fn close_session(&self, id: SessionId) -> bool {
        let Some(session) = self.sessions.lock().remove(&id) else {
            return false;
        };
        session.close();
        tracing::info!(%id, "session closed");
        true
    }

    /// Refreshes the activity of a session without doing anything else.
    pub fn touch(&self, id: SessionId) -> Result<()> {
        self.get(id).map(|_| ())
    }

    pub fn feed_ack(&self, id: SessionId, ack: &AckSample) -> Result<Option<SwitchEvent>> {
        self.write(id, |controller, at_time| controller.feed_ack(ack, at_time))
    }

    pub fn feed_loss(&self, id: SessionId) -> Result<()> {
        self.write(id, |controller, at_time| controller.feed_loss(at_time))
    }

    pub fn on_data_sent(&self, id: SessionId, size: DataSize) -> Result<()> {
        self.write(id, |controller, _| controller.on_data_sent(size))
    }

    pub fn manual_switch(
        &self,
        id: SessionId,
        target: AlgorithmKind,
    ) -> Result<Option<SwitchEvent>> {
        self.write(id, |controller, at_time| controller.manual_switch(target, at_time))
    }

    /// Like [manual_switch](Self::manual_switch), for an algorithm given by name.
    /// An unknown name fails before the session is touched.
    pub fn manual_switch_by_name(
        &self,
        id: SessionId,
        target: &str,
    ) -> Result<Option<SwitchEvent>> {
        let target = target.parse()?;
        self.manual_switch(id, target)
    }

    pub fn snapshot(&self, id: SessionId) -> Result<Snapshot> {
        self.read(id, |controller, at_time| controller.snapshot(at_time))
    }

    pub fn performance(&self, id: SessionId) -> Result<PerformanceReport> {
        self.read(id, |controller, at_time| controller.performance_report(at_time))
    }

    /// Evicts every session idle for longer than `timeout`, returning how many.
    pub fn sweep(&self, timeout: TimeDelta) -> usize {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now();
        let before = sessions.len();

        sessions.retain(|id, session| {
            let last_activity = session.last_activity();
            if last_activity > now {
                tracing::warn!(%id, ?last_activity, ?now, "session active in the future");
                return true;
            }
            let idle = now - last_activity;
            if idle <= timeout {
                return true;
            }
            session.close();
            tracing::info!(%id, ?idle, "session evicted");
            false
        });

        let removed = before - sessions.len();
        tracing::debug!(removed, remaining = sessions.len(), "session sweep done");
        removed
    }

    /// [sweep](Self::sweep) with the configured session timeout.
    pub fn sweep_expired(&self) -> usize {
        self.sweep(self.config.session_timeout)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Sessions that saw activity within the last `timeout`.
    pub fn active_sessions(&self, timeout: TimeDelta) -> Vec<SessionId> {
        let sessions = self.sessions.lock();
        let now = self.clock.now();
        let mut ids: Vec<_> = sessions
            .iter()
            .filter(|(_, session)| now - session.last_activity() <= timeout)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    // Looks the session up and refreshes its activity. The map lock is
    // released before returning.
    fn get(&self, id: SessionId) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .lock()
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))?;
        session.touch(self.clock.now());
        Ok(session)
    }

    fn write<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut AdaptiveController, Timestamp) -> T,
    ) -> Result<T> {
        let session = self.get(id)?;
        let mut controller = session.controller.write();
        if session.is_closed() {
            return Err(Error::NotFound(id));
        }
        Ok(f(&mut controller, self.clock.now()))
    }

    fn read<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&AdaptiveController, Timestamp) -> T,
    ) -> Result<T> {
        let session = self.get(id)?;
        let controller = session.controller.read();
        if session.is_closed() {
            return Err(Error::NotFound(id));
        }
        Ok(f(&controller, self.clock.now()))
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use approx::assert_relative_eq;
    use test_trace::test;

    use super::*;
    use crate::{clock::ManualClock, network_condition::NetworkCondition};

    fn new_registry() -> (SessionRegistry<ManualClock>, ManualClock) {
        let clock = ManualClock::new(Timestamp::from_seconds(1000));
        let registry = SessionRegistry::with_clock(EngineConfig::default(), clock.clone());
        (registry, clock)
    }

    fn measured_ack(ack_num: u64, rtt_ms: i64, bytes_per_sec: i64) -> AckSample {
        AckSample::new(ack_num)
            .with_rtt(TimeDelta::from_millis(rtt_ms))
            .with_delivery(DataSize::from_bytes(bytes_per_sec), TimeDelta::from_seconds(1))
    }

    #[test]
    fn idle_session_is_evicted_once() {
        let (registry, clock) = new_registry();
        let id = registry.open_session();
        clock.advance(TimeDelta::from_seconds(301));

        assert_eq!(registry.sweep(TimeDelta::from_seconds(300)), 1);
        assert_eq!(registry.sweep(TimeDelta::from_seconds(300)), 0);
        assert!(registry.is_empty());
        assert_eq!(registry.snapshot(id), Err(Error::NotFound(id)));
    }

    #[test]
    fn any_call_refreshes_activity() {
        let (registry, clock) = new_registry();
        let fed = registry.open_session();
        let watched = registry.open_session();
        let idle = registry.open_session();

        clock.advance(TimeDelta::from_seconds(200));
        registry.feed_ack(fed, &AckSample::new(1)).unwrap();
        registry.snapshot(watched).unwrap();

        clock.advance(TimeDelta::from_seconds(200));
        assert_eq!(registry.active_sessions(TimeDelta::from_seconds(300)).len(), 2);
        assert_eq!(registry.sweep_expired(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.touch(idle), Err(Error::NotFound(idle)));
        assert!(registry.touch(fed).is_ok());
    }

    #[test]
    fn future_activity_is_kept() {
        let (registry, clock) = new_registry();
        registry.open_session();
        clock.set(Timestamp::from_seconds(10));
        assert_eq!(registry.sweep(TimeDelta::zero()), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (registry, _) = new_registry();
        let id = registry.open_session();
        assert!(registry.close_session(id));
        assert!(!registry.close_session(id));
        assert_eq!(registry.feed_loss(id), Err(Error::NotFound(id)));
        assert_eq!(
            registry.on_data_sent(id, DataSize::from_bytes(1)),
            Err(Error::NotFound(id))
        );
    }

    #[test]
    fn removed_session_rejects_held_handles() {
        let (registry, _) = new_registry();
        let id = registry.open_session();
        let session = registry.get(id).unwrap();
        registry.close_session(id);
        assert!(session.is_closed());
    }

    #[test]
    fn unknown_algorithm_name_changes_nothing() {
        let (registry, clock) = new_registry();
        let id = registry.open_session();
        clock.advance(TimeDelta::from_seconds(400));
        assert!(matches!(
            registry.manual_switch_by_name(id, "vegas"),
            Err(Error::InvalidArgument(_))
        ));
        // The failed call did not count as activity.
        assert_eq!(registry.sweep_expired(), 1);
    }

    #[test]
    fn manual_switch_through_registry() {
        let (registry, clock) = new_registry();
        let id = registry.open_session();
        clock.advance(TimeDelta::from_seconds(2));
        let event = registry.manual_switch_by_name(id, "cubic").unwrap();
        assert_eq!(event.map(|e| e.to), Some(AlgorithmKind::Cubic));
        assert_eq!(registry.manual_switch(id, AlgorithmKind::Cubic), Ok(None));

        clock.advance(TimeDelta::from_millis(1500));
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.algorithm, AlgorithmKind::Cubic);
        assert_relative_eq!(snapshot.time_since_switch, 1.5);

        let report = registry.performance(id).unwrap();
        assert_eq!(
            report.algorithms[&AlgorithmKind::Reno].active_time,
            TimeDelta::from_seconds(2)
        );
    }

    #[test]
    fn classifies_through_registry() {
        let (registry, clock) = new_registry();
        let id = registry.open_session();
        for _ in 0..1000 {
            registry.on_data_sent(id, DataSize::from_bytes(1024)).unwrap();
        }
        for _ in 0..5 {
            registry.feed_loss(id).unwrap();
        }
        for ack_num in 1..=10 {
            clock.advance(TimeDelta::from_seconds(1));
            registry
                .feed_ack(id, &measured_ack(ack_num, 150, 50 * 1024 * 1024))
                .unwrap();
        }
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.condition, NetworkCondition::HighBandwidthDelay);
        assert_relative_eq!(snapshot.loss_rate, 0.005);

        let other = registry.open_session();
        for ack_num in 1..=10 {
            clock.advance(TimeDelta::from_seconds(1));
            registry.feed_ack(other, &measured_ack(ack_num, 5, 1_000_000)).unwrap();
        }
        assert_eq!(
            registry.snapshot(other).unwrap().condition,
            NetworkCondition::Excellent
        );
    }

    #[test]
    fn snapshot_follows_losses() {
        let (registry, clock) = new_registry();
        let id = registry.open_session();
        for _ in 0..100 {
            registry.on_data_sent(id, DataSize::from_bytes(1024)).unwrap();
        }
        for ack_num in 1..=10 {
            clock.advance(TimeDelta::from_millis(100));
            registry.feed_ack(id, &measured_ack(ack_num, 5, 1_000_000)).unwrap();
        }
        assert_eq!(registry.snapshot(id).unwrap().condition, NetworkCondition::Excellent);

        for _ in 0..50 {
            registry.feed_loss(id).unwrap();
        }
        let snapshot = registry.snapshot(id).unwrap();
        assert_relative_eq!(snapshot.loss_rate, 0.5);
        assert_eq!(snapshot.condition, NetworkCondition::Lossy);
        assert_eq!(registry.performance(id).unwrap().condition, NetworkCondition::Lossy);

        for _ in 0..2400 {
            registry.on_data_sent(id, DataSize::from_bytes(1024)).unwrap();
        }
        assert_eq!(registry.snapshot(id).unwrap().condition, NetworkCondition::Good);
    }

    #[test]
    fn session_ids_round_trip_through_strings() {
        let (registry, _) = new_registry();
        let id = registry.open_session();
        assert_eq!(id.to_string().parse::<SessionId>(), Ok(id));
        assert!(matches!(
            "not-a-session".parse::<SessionId>(),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(registry.session_ids(), vec![id]);
    }

    #[test]
    fn concurrent_feeders_snapshots_and_sweeps() {
        let (registry, clock) = new_registry();
        let ids: Vec<_> = (0..4).map(|_| registry.open_session()).collect();

        thread::scope(|scope| {
            for (n, id) in ids.iter().copied().enumerate() {
                let registry = &registry;
                scope.spawn(move || {
                    for ack_num in 0..500 {
                        registry.on_data_sent(id, DataSize::from_bytes(1024)).unwrap();
                        let rtt_ms = 5 + 50 * n as i64;
                        let ack = measured_ack(ack_num, rtt_ms, 100_000);
                        registry.feed_ack(id, &ack).unwrap();
                        if ack_num % 50 == 0 {
                            registry.feed_loss(id).unwrap();
                        }
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..500 {
                    // Sessions opened and closed concurrently may vanish in between.
                    for id in registry.session_ids() {
                        if let Err(err) = registry.snapshot(id) {
                            assert_eq!(err, Error::NotFound(id));
                        }
                    }
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    clock.advance(TimeDelta::from_millis(100));
                    assert_eq!(registry.sweep(TimeDelta::from_seconds(300)), 0);
                }
            });
            scope.spawn(|| {
                for _ in 0..100 {
                    let id = registry.open_session();
                    registry.feed_ack(id, &AckSample::new(1)).unwrap();
                    assert!(registry.close_session(id));
                    assert_eq!(
                        registry.feed_ack(id, &AckSample::new(2)),
                        Err(Error::NotFound(id))
                    );
                }
            });
        });

        assert_eq!(registry.len(), 4);
        for id in ids {
            let report = registry.performance(id).unwrap();
            assert_eq!(report.packets_sent, 500);
            assert_eq!(report.packets_lost, 10);
            assert_eq!(report.bytes_sent, 500 * 1024);
        }
    }
}
