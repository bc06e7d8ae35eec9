use spintrack_db::models::MAX_VALUE;

use crate::config::GuardConfig;
use crate::generator::SpinToken;

/// Résultat candidat, normalisé à la frontière d'ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub value: u8,
    pub token: Option<SpinToken>,
}

impl Candidate {
    pub fn new(value: u8, token: Option<SpinToken>) -> Self {
        Self { value, token }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidInput,
    DuplicateToken,
    Locked,
    Debounced,
    ImmediateRepeat,
    RecentDuplicate,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::InvalidInput => write!(f, "numéro invalide"),
            Rejection::DuplicateToken => write!(f, "lancer déjà reçu"),
            Rejection::Locked => write!(f, "roue verrouillée"),
            Rejection::Debounced => write!(f, "saisie trop rapide"),
            Rejection::ImmediateRepeat => write!(f, "répétition immédiate"),
            Rejection::RecentDuplicate => write!(f, "doublon récent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPhase {
    #[default]
    Idle,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `locked_until` est présent quand l'admission a posé un verrou à libérer.
    Admitted { locked_until: Option<u64> },
    Rejected(Rejection),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardState {
    pub phase: GuardPhase,
    pub last_admitted_value: Option<u8>,
    pub last_admitted_at: u64,
    pub locked_until: u64,
    pub last_spin_token: Option<SpinToken>,
    /// Dernière admission, roue ou manuelle, pour l'anti-rebond.
    pub last_admission_at: Option<u64>,
    /// Vrai entre une admission de la roue et la transition suivante vers `Idle`.
    pub repeat_armed: bool,
}

pub struct IngestionGuard {
    config: GuardConfig,
    state: GuardState,
}

impl IngestionGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            state: GuardState::default(),
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn is_locked(&self, now_ms: u64) -> bool {
        self.state.phase == GuardPhase::Locked && now_ms < self.state.locked_until
    }

    /// Résultat venant de la roue : toutes les règles s'appliquent, dans l'ordre.
    pub fn admit(&mut self, candidate: Candidate, newest: Option<u8>, now_ms: u64) -> Decision {
        self.settle(now_ms);

        if candidate.value > MAX_VALUE {
            return Decision::Rejected(Rejection::InvalidInput);
        }
        if candidate.token.is_some() && candidate.token == self.state.last_spin_token {
            return Decision::Rejected(Rejection::DuplicateToken);
        }
        if self.is_locked(now_ms) {
            return Decision::Rejected(Rejection::Locked);
        }
        if self.debounced(now_ms) {
            return Decision::Rejected(Rejection::Debounced);
        }
        if self.state.repeat_armed && newest == Some(candidate.value) {
            return Decision::Rejected(Rejection::ImmediateRepeat);
        }
        if self.state.last_admitted_value == Some(candidate.value)
            && now_ms.saturating_sub(self.state.last_admitted_at) < self.config.dup_window_ms
        {
            return Decision::Rejected(Rejection::RecentDuplicate);
        }

        self.state.last_admitted_value = Some(candidate.value);
        self.state.last_admitted_at = now_ms;
        self.state.last_admission_at = Some(now_ms);
        if candidate.token.is_some() {
            self.state.last_spin_token = candidate.token;
        }
        self.state.repeat_armed = true;

        if self.config.lock_ms == 0 {
            return Decision::Admitted { locked_until: None };
        }
        let locked_until = now_ms + self.config.lock_ms;
        self.state.phase = GuardPhase::Locked;
        self.state.locked_until = locked_until;
        Decision::Admitted {
            locked_until: Some(locked_until),
        }
    }

    /// Saisie manuelle : ni jeton ni verrou, seulement l'anti-rebond.
    pub fn admit_manual(&mut self, value: u8, now_ms: u64) -> Decision {
        self.settle(now_ms);

        if value > MAX_VALUE {
            return Decision::Rejected(Rejection::InvalidInput);
        }
        if self.debounced(now_ms) {
            return Decision::Rejected(Rejection::Debounced);
        }
        self.state.last_admission_at = Some(now_ms);
        Decision::Admitted { locked_until: None }
    }

    /// Transition `Locked` -> `Idle`, appelée à l'échéance du verrou.
    pub fn release(&mut self) {
        if self.state.phase == GuardPhase::Locked {
            log::debug!("Verrou levé");
        }
        self.state.phase = GuardPhase::Idle;
        self.state.locked_until = 0;
        self.state.repeat_armed = false;
    }

    pub fn reset(&mut self) {
        self.state = GuardState::default();
    }

    fn settle(&mut self, now_ms: u64) {
        if self.state.phase == GuardPhase::Locked && now_ms >= self.state.locked_until {
            self.release();
        }
    }

    fn debounced(&self, now_ms: u64) -> bool {
        self.state
            .last_admission_at
            .is_some_and(|at| now_ms.saturating_sub(at) < self.config.debounce_ms)
    }
}
