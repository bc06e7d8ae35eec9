use spintrack_db::models::{parse_value, HistoryEntry, Outcome};
use spintrack_db::rusqlite::Connection;
use spintrack_db::state::{erase_state, load_state, save_state, PersistedState};

use crate::analytics::{compute_stats, DerivedStats};
use crate::clock::Clock;
use crate::config::{AnalyticsConfig, TrackerConfig};
use crate::generator::{OutcomeGenerator, Spin};
use crate::guard::{Candidate, Decision, GuardState, IngestionGuard, Rejection};
use crate::history::HistoryStore;
use crate::timer::{TaskId, TimerQueue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    Admitted(HistoryEntry),
    Rejected(Rejection),
}

impl Ingest {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Ingest::Admitted(_))
    }
}

enum Task {
    DeliverSpin(Candidate),
    Unlock,
}

/// État complet du suivi : roue, garde, historique et statistiques.
///
/// Mono-thread, piloté par l'appelant. Chaque opération commence par déclencher les
/// tâches échues (livraison d'un lancer, fin de verrou), dans l'ordre de leurs échéances,
/// puis s'exécute entièrement. Toute mutation recalcule les statistiques et sauvegarde l'état.
pub struct Tracker {
    config: TrackerConfig,
    clock: Box<dyn Clock>,
    generator: OutcomeGenerator,
    guard: IngestionGuard,
    history: HistoryStore,
    stats: DerivedStats,
    timers: TimerQueue<Task>,
    pending_spin: Option<TaskId>,
    pending_unlock: Option<TaskId>,
    last_spin: Option<Spin>,
    rotation: f64,
    input_buffer: String,
    conn: Option<Connection>,
    deliveries: Vec<Ingest>,
}

impl Tracker {
    /// Suivi sans persistance.
    pub fn new(config: TrackerConfig, clock: Box<dyn Clock>) -> Self {
        let generator = OutcomeGenerator::new(&config.spin, config.seed);
        let guard = IngestionGuard::new(config.guard.clone());
        let history = HistoryStore::new(config.history_cap);
        let stats = compute_stats(&[], &config.analytics);
        Self {
            config,
            clock,
            generator,
            guard,
            history,
            stats,
            timers: TimerQueue::new(),
            pending_spin: None,
            pending_unlock: None,
            last_spin: None,
            rotation: 0.0,
            input_buffer: String::new(),
            conn: None,
            deliveries: Vec::new(),
        }
    }

    /// Reprend l'état enregistré dans `conn`, s'il existe et qu'il est lisible.
    pub fn open(config: TrackerConfig, clock: Box<dyn Clock>, conn: Connection) -> Self {
        let mut tracker = Self::new(config, clock);
        if let Some(state) = load_state(&conn, tracker.config.history_cap) {
            log::info!("État restauré : {} entrée(s)", state.history.len());
            tracker.history = HistoryStore::from_entries(state.history, tracker.config.history_cap);
            tracker.rotation = state.rotation;
            tracker.input_buffer = state.input_buffer;
            tracker.refresh_stats();
        }
        tracker.conn = Some(conn);
        tracker
    }

    /// Lance la roue. `None` si un lancer est déjà en cours.
    /// Le résultat est livré à la garde après `duration_ms`, via `poll`.
    pub fn request_spin(&mut self) -> Option<Spin> {
        self.pump();
        if self.pending_spin.is_some() {
            log::debug!("Lancer refusé : la roue tourne encore");
            return None;
        }

        let now = self.clock.now_ms();
        let spin = self.generator.spin(self.rotation);
        self.rotation = spin.target_rotation;
        let candidate = Candidate::new(spin.pocket.value, Some(spin.token));
        let id = self
            .timers
            .schedule(now + spin.duration_ms, Task::DeliverSpin(candidate));
        self.pending_spin = Some(id);
        self.last_spin = Some(spin.clone());
        log::debug!("Lancer {:?} : {} dans {} ms", spin.token, spin.pocket.value, spin.duration_ms);

        self.persist();
        Some(spin)
    }

    /// Présente un résultat de la roue à la garde, maintenant.
    pub fn ingest(&mut self, candidate: Candidate) -> Ingest {
        self.pump();
        let now = self.clock.now_ms();
        self.ingest_at(candidate, now)
    }

    /// Saisie manuelle. `None` si le texte n'est pas un numéro 0-36 (aucun effet).
    pub fn submit_manual_value(&mut self, raw: &str) -> Option<Ingest> {
        self.pump();
        let Some(value) = parse_value(raw) else {
            log::debug!("Saisie ignorée : {:?}", raw);
            return None;
        };

        let now = self.clock.now_ms();
        if let Decision::Rejected(reason) = self.guard.admit_manual(value, now) {
            log::debug!("Saisie {} rejetée : {}", value, reason);
            return Some(Ingest::Rejected(reason));
        }

        match self.history.prepend(value, now) {
            Ok(entry) => {
                self.rotation = self.generator.nudge(self.rotation);
                self.input_buffer.clear();
                self.refresh_stats();
                self.persist();
                Some(Ingest::Admitted(entry))
            }
            Err(e) => {
                log::warn!("{e:#}");
                None
            }
        }
    }

    pub fn set_input_buffer(&mut self, text: &str) {
        self.pump();
        self.input_buffer = text.to_string();
        self.persist();
    }

    /// Retire l'entrée la plus récente. Sans effet sur un historique vide.
    pub fn undo_last(&mut self) -> Option<HistoryEntry> {
        self.pump();
        let removed = self.history.pop_newest()?;
        self.refresh_stats();
        self.persist();
        Some(removed)
    }

    pub fn tag_outcome(&mut self, ts: u64, outcome: Outcome) -> bool {
        self.pump();
        if !self.history.tag_outcome(ts, outcome) {
            log::debug!("Aucune entrée à l'horodatage {}", ts);
            return false;
        }
        self.refresh_stats();
        self.persist();
        true
    }

    /// Remet historique, garde, rotation et saisie à zéro et efface l'état enregistré.
    /// Un lancer en cours n'est pas annulé : son résultat sera livré normalement.
    pub fn clear_all(&mut self) {
        self.pump();
        if let Some(id) = self.pending_unlock.take() {
            self.timers.cancel(id);
        }
        self.guard.reset();
        self.history.clear();
        self.rotation = 0.0;
        self.input_buffer.clear();
        self.refresh_stats();
        if let Some(conn) = &self.conn {
            erase_state(conn);
        }
        log::info!("Historique effacé");
    }

    /// Déclenche les tâches échues et rend les résultats de lancers livrés depuis l'appel précédent.
    pub fn poll(&mut self) -> Vec<Ingest> {
        self.pump();
        std::mem::take(&mut self.deliveries)
    }

    /// Annule les tâches en attente, sauvegarde une dernière fois et rend la connexion.
    pub fn close(mut self) -> Option<Connection> {
        self.timers.clear();
        self.pending_spin = None;
        self.pending_unlock = None;
        self.persist();
        self.conn.take()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn stats(&self) -> &DerivedStats {
        &self.stats
    }

    /// Statistiques du même historique avec d'autres fenêtres.
    pub fn stats_with(&self, analytics: &AnalyticsConfig) -> DerivedStats {
        compute_stats(&self.history.values(), analytics)
    }

    pub fn recent(&self) -> Vec<HistoryEntry> {
        self.history
            .entries()
            .take(self.config.recent_cap)
            .cloned()
            .collect()
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    pub fn last_spin(&self) -> Option<&Spin> {
        self.last_spin.as_ref()
    }

    pub fn guard_state(&self) -> &GuardState {
        self.guard.state()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn is_spinning(&self) -> bool {
        let now = self.clock.now_ms();
        self.pending_spin
            .and_then(|id| self.timers.due_at(id))
            .is_some_and(|at| at > now)
    }

    pub fn lock_remaining_ms(&self) -> u64 {
        let now = self.clock.now_ms();
        if self.guard.is_locked(now) {
            self.guard.state().locked_until - now
        } else {
            0
        }
    }

    /// Échéance de la prochaine tâche en attente.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.next_due()
    }

    fn pump(&mut self) {
        let now = self.clock.now_ms();
        while let Some((id, at, task)) = self.timers.pop_due(now) {
            match task {
                Task::DeliverSpin(candidate) => {
                    if self.pending_spin == Some(id) {
                        self.pending_spin = None;
                    }
                    let result = self.ingest_at(candidate, at);
                    self.deliveries.push(result);
                }
                Task::Unlock => {
                    if self.pending_unlock == Some(id) {
                        self.pending_unlock = None;
                        self.guard.release();
                    }
                }
            }
        }
    }

    fn ingest_at(&mut self, candidate: Candidate, now: u64) -> Ingest {
        let newest = self.history.newest().map(|e| e.value);
        let locked_until = match self.guard.admit(candidate, newest, now) {
            Decision::Rejected(reason) => {
                log::debug!("Résultat {} rejeté : {}", candidate.value, reason);
                return Ingest::Rejected(reason);
            }
            Decision::Admitted { locked_until } => locked_until,
        };

        if let Some(id) = self.pending_unlock.take() {
            self.timers.cancel(id);
        }
        if let Some(until) = locked_until {
            self.pending_unlock = Some(self.timers.schedule(until, Task::Unlock));
        }

        match self.history.prepend(candidate.value, now) {
            Ok(entry) => {
                log::debug!("Résultat {} admis (ts {})", entry.value, entry.ts);
                self.refresh_stats();
                self.persist();
                Ingest::Admitted(entry)
            }
            Err(e) => {
                log::warn!("{e:#}");
                Ingest::Rejected(Rejection::InvalidInput)
            }
        }
    }

    fn refresh_stats(&mut self) {
        self.stats = compute_stats(&self.history.values(), &self.config.analytics);
    }

    fn persist(&self) {
        let Some(conn) = &self.conn else {
            return;
        };
        let state = PersistedState {
            input_buffer: self.input_buffer.clone(),
            history: self.history.to_vec(),
            recent: self.history.recent(self.config.recent_cap),
            rotation: self.rotation,
            ..PersistedState::default()
        };
        save_state(conn, &state);
    }
}
