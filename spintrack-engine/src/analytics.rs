//! Statistiques dérivées de l'historique : douzaines, colonnes, numéros chauds/froids,
//! couleurs et verdict de tendance.
//!
//! Tout est recalculé à partir d'une tranche de valeurs (plus récente en tête) ;
//! aucune fonction ne garde d'état.

use std::collections::BTreeMap;

use spintrack_db::models::{Color, Column, Dozen};

use crate::config::AnalyticsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupCounts {
    pub dozens: [u32; 3],
    pub columns: [u32; 3],
    pub zeros: u32,
    pub total: u32,
}

impl GroupCounts {
    pub fn of(values: &[u8]) -> Self {
        let mut counts = GroupCounts::default();
        for &v in values {
            counts.total += 1;
            if v == 0 {
                counts.zeros += 1;
            }
            if let Some(d) = Dozen::of(v) {
                counts.dozens[d.index()] += 1;
            }
            if let Some(c) = Column::of(v) {
                counts.columns[c.index()] += 1;
            }
        }
        counts
    }

    pub fn dozen(&self, dozen: Dozen) -> u32 {
        self.dozens[dozen.index()]
    }

    pub fn column(&self, column: Column) -> u32 {
        self.columns[column.index()]
    }

    /// Part d'une douzaine parmi les tirages non nuls, en pourcentage.
    pub fn dozen_share(&self, dozen: Dozen) -> f64 {
        share(self.dozen(dozen), self.total - self.zeros)
    }

    pub fn column_share(&self, column: Column) -> f64 {
        share(self.column(column), self.total - self.zeros)
    }
}

fn share(count: u32, out_of: u32) -> f64 {
    if out_of == 0 {
        0.0
    } else {
        count as f64 * 100.0 / out_of as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFrequency {
    pub number: u8,
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Dozen(Dozen),
    Column(Column),
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Group::Dozen(d) => write!(f, "{}", d),
            Group::Column(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Strong { group: Group, count: u32, window: usize },
    Possible { group: Group, count: u32, window: usize },
    NoTrend,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Strong { group, .. } => write!(f, "strong trend: {}", group),
            Verdict::Possible { group, .. } => write!(f, "possible bias toward {}", group),
            Verdict::NoTrend => write!(f, "no clear trend"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorTally {
    pub red: u32,
    pub black: u32,
    pub green: u32,
    /// Couleur strictement majoritaire, `None` sinon.
    pub call: Option<Color>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedStats {
    pub total: usize,
    /// Comptes sur la fenêtre de tendance.
    pub trend: GroupCounts,
    /// Comptes sur tout l'historique.
    pub overall: GroupCounts,
    pub suggested_dozens: Vec<Dozen>,
    pub suggested_columns: Vec<Column>,
    pub hot: Vec<NumberFrequency>,
    pub cold: Vec<NumberFrequency>,
    pub verdict: Verdict,
    pub trend_message: String,
    pub colors: ColorTally,
    pub lagging_dozen: Option<Dozen>,
}

impl Default for DerivedStats {
    fn default() -> Self {
        compute_stats(&[], &AnalyticsConfig::default())
    }
}

/// `history` : valeurs, plus récente en tête.
pub fn compute_stats(history: &[u8], config: &AnalyticsConfig) -> DerivedStats {
    let trend = GroupCounts::of(window(history, config.trend_window));
    let (hot, cold) = hot_cold(window(history, config.hot_window), config);
    let verdict = pattern_verdict(window(history, config.pattern_window), config);

    DerivedStats {
        total: history.len(),
        trend,
        overall: GroupCounts::of(history),
        suggested_dozens: suggest_dozens(&trend),
        suggested_columns: suggest_columns(&trend),
        hot,
        cold,
        trend_message: verdict.to_string(),
        verdict,
        colors: color_tally(window(history, config.color_window)),
        lagging_dozen: lagging_dozen(window(history, config.lagging_window)),
    }
}

pub fn window(history: &[u8], size: usize) -> &[u8] {
    &history[..size.min(history.len())]
}

/// Les deux meilleures douzaines, par compte décroissant. Un tri stable conserve
/// l'ordre 1-12 < 13-24 < 25-36 en cas d'égalité.
pub fn suggest_dozens(counts: &GroupCounts) -> Vec<Dozen> {
    let mut ranked = Dozen::ALL.to_vec();
    ranked.sort_by(|a, b| counts.dozen(*b).cmp(&counts.dozen(*a)));
    ranked.truncate(2);
    ranked
}

pub fn suggest_columns(counts: &GroupCounts) -> Vec<Column> {
    let mut ranked = Column::ALL.to_vec();
    ranked.sort_by(|a, b| counts.column(*b).cmp(&counts.column(*a)));
    ranked.truncate(2);
    ranked
}

fn frequencies(values: &[u8]) -> Vec<NumberFrequency> {
    let mut map: BTreeMap<u8, u32> = BTreeMap::new();
    for &v in values {
        *map.entry(v).or_insert(0) += 1;
    }
    map.into_iter()
        .map(|(number, frequency)| NumberFrequency { number, frequency })
        .collect()
}

/// Chauds : fréquence ≥ seuil (ou les `top_n` plus fréquents), par fréquence décroissante
/// puis numéro croissant. Froids : fréquence non nulle minimale parmi les autres numéros.
pub fn hot_cold(values: &[u8], config: &AnalyticsConfig) -> (Vec<NumberFrequency>, Vec<NumberFrequency>) {
    let mut freqs = frequencies(values);
    freqs.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.number.cmp(&b.number)));

    let hot_len = match config.hot_top_n {
        Some(n) => n.min(freqs.len()),
        None => freqs.iter().take_while(|f| f.frequency >= config.hot_threshold).count(),
    };
    let (hot, rest) = freqs.split_at(hot_len);

    let mut hot = hot.to_vec();
    hot.truncate(config.display_cap);

    let cold = match rest.iter().map(|f| f.frequency).min() {
        Some(lowest) => {
            let mut cold: Vec<NumberFrequency> =
                rest.iter().filter(|f| f.frequency == lowest).copied().collect();
            cold.sort_by_key(|f| f.number);
            cold.truncate(config.display_cap);
            cold
        }
        None => Vec::new(),
    };

    (hot, cold)
}

/// Douzaine ou colonne la plus représentée sur la fenêtre. À compte égal, la douzaine l'emporte.
pub fn pattern_verdict(values: &[u8], config: &AnalyticsConfig) -> Verdict {
    let counts = GroupCounts::of(values);

    let best_dozen = best_of(Dozen::ALL, |d| counts.dozen(d));
    let best_column = best_of(Column::ALL, |c| counts.column(c));

    let (group, count) = match (best_dozen, best_column) {
        (Some((_, dc)), Some((c, cc))) if cc > dc => (Group::Column(c), cc),
        (Some((d, dc)), _) => (Group::Dozen(d), dc),
        (None, Some((c, cc))) => (Group::Column(c), cc),
        (None, None) => return Verdict::NoTrend,
    };

    let window = values.len();
    if count >= config.strong_at {
        Verdict::Strong { group, count, window }
    } else if count >= config.possible_at {
        Verdict::Possible { group, count, window }
    } else {
        Verdict::NoTrend
    }
}

/// Premier élément de compte maximal, dans l'ordre d'énumération.
fn best_of<T: Copy>(items: [T; 3], count: impl Fn(T) -> u32) -> Option<(T, u32)> {
    items.into_iter().fold(None, |best, item| {
        let c = count(item);
        match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((item, c)),
        }
    })
}

pub fn color_tally(values: &[u8]) -> ColorTally {
    let mut tally = ColorTally::default();
    for &v in values {
        match Color::of(v) {
            Color::Red => tally.red += 1,
            Color::Black => tally.black += 1,
            Color::Green => tally.green += 1,
        }
    }
    tally.call = if tally.red > tally.black && tally.red > tally.green {
        Some(Color::Red)
    } else if tally.black > tally.red && tally.black > tally.green {
        Some(Color::Black)
    } else if tally.green > tally.red && tally.green > tally.black {
        Some(Color::Green)
    } else {
        None
    };
    tally
}

/// Douzaine la moins sortie ; `None` sur une fenêtre vide.
pub fn lagging_dozen(values: &[u8]) -> Option<Dozen> {
    if values.is_empty() {
        return None;
    }
    let counts = GroupCounts::of(values);
    Dozen::ALL.into_iter().fold(None, |lowest: Option<Dozen>, d| match lowest {
        Some(l) if counts.dozen(l) <= counts.dozen(d) => Some(l),
        _ => Some(d),
    })
}
