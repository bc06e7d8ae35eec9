use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use spintrack_db::models::{Pocket, POCKET_COUNT};

use crate::config::SpinConfig;

/// Largeur angulaire d'une case, en degrés.
pub const SLICE_DEGREES: f64 = 360.0 / POCKET_COUNT as f64;

/// Identifiant d'un lancer de la roue, transmis avec son résultat différé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpinToken(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Spin {
    pub pocket: Pocket,
    pub target_rotation: f64,
    pub duration_ms: u64,
    pub token: SpinToken,
}

pub struct OutcomeGenerator {
    rng: StdRng,
    spins_min: u32,
    spins_max: u32,
    duration_ms: u64,
    next_token: u64,
}

impl OutcomeGenerator {
    pub fn new(config: &SpinConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            rng,
            spins_min: config.spins_min.min(config.spins_max),
            spins_max: config.spins_min.max(config.spins_max),
            duration_ms: config.duration_ms,
            next_token: 1,
        }
    }

    /// Tire une case uniformément et calcule la rotation qui l'amène sous le pointeur,
    /// toujours en avançant depuis `current_rotation`.
    pub fn spin(&mut self, current_rotation: f64) -> Spin {
        let idx = self.rng.random_range(0..POCKET_COUNT);
        let spins = self.rng.random_range(self.spins_min..=self.spins_max);
        let pocket = Pocket::at_wrapped(idx);
        let token = SpinToken(self.next_token);
        self.next_token += 1;

        Spin {
            pocket,
            target_rotation: landing_rotation(current_rotation, pocket.wheel_index, spins),
            duration_ms: self.duration_ms,
            token,
        }
    }

    /// Petite rotation décorative pour une saisie manuelle (90° à 359°).
    pub fn nudge(&mut self, current_rotation: f64) -> f64 {
        current_rotation + self.rng.random_range(90u32..360) as f64
    }
}

/// Angle de la roue, modulo 360, pour lequel le milieu de la case `idx` est sous le pointeur.
pub fn rotation_base(idx: usize) -> f64 {
    -((idx as f64 + 0.5) * SLICE_DEGREES)
}

pub fn landing_rotation(current_rotation: f64, idx: usize, spins: u32) -> f64 {
    let delta = (rotation_base(idx) - current_rotation).rem_euclid(360.0);
    current_rotation + spins as f64 * 360.0 + delta
}
