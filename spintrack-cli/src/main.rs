mod display;
mod interactive;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use spintrack_db::db::{db_path, migrate, open_db, slot_saved_at};
use spintrack_db::models::Outcome;
use spintrack_db::state::SCHEMA_VERSION;
use spintrack_engine::clock::SystemClock;
use spintrack_engine::config::{load_config, save_config, TrackerConfig};
use spintrack_engine::tracker::Tracker;

#[derive(Parser)]
#[command(name = "spintrack", about = "Suivi des résultats de roulette")]
struct Cli {
    /// Fichier de configuration JSON
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed du générateur (reproductibilité)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Fenêtre des douzaines/colonnes
    #[arg(long, global = true)]
    trend_window: Option<usize>,

    /// Fenêtre des numéros chauds/froids
    #[arg(long, global = true)]
    hot_window: Option<usize>,

    /// Fenêtre du verdict de tendance
    #[arg(long, global = true)]
    pattern_window: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lancer la roue
    Spin {
        /// Nombre de lancers
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Ajouter un numéro à la main
    Add {
        /// Numéro (0-36)
        value: String,
    },

    /// Retirer le dernier numéro
    Undo,

    /// Marquer un numéro gagné ou perdu
    Tag {
        /// Horodatage de l'entrée (colonne ts de l'historique)
        ts: u64,
        /// win ou lose
        outcome: String,
    },

    /// Effacer tout l'historique
    Clear {
        /// Ne pas demander de confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Derniers numéros enregistrés
    History {
        /// Nombre de numéros
        #[arg(short, long, default_value = "20")]
        last: usize,
    },

    /// Statistiques et tendances
    Stats,

    /// Mode interactif (REPL)
    Interactive,

    /// Chemin de la base de données
    DbPath,

    /// Afficher la configuration effective
    Config {
        /// Écrire la configuration dans ce fichier
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn build_config(cli: &Cli) -> Result<TrackerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = load_config(path)?;
            log::info!("Configuration chargée depuis {:?}", path);
            config
        }
        None => TrackerConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(w) = cli.trend_window {
        config.analytics.trend_window = w;
    }
    if let Some(w) = cli.hot_window {
        config.analytics.hot_window = w;
    }
    if let Some(w) = cli.pattern_window {
        config.analytics.pattern_window = w;
    }
    config.validate()?;
    log::debug!("Configuration effective : {:?}", config);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let path = db_path();
    match &cli.command {
        Command::DbPath => return cmd_db_path(&path),
        Command::Config { output } => return cmd_config(&config, output.as_deref()),
        _ => {}
    }

    let conn = open_db(&path)?;
    migrate(&conn)?;
    let mut tracker = Tracker::open(config, Box::new(SystemClock), conn);

    let result = match cli.command {
        Command::Spin { count } => cmd_spin(&mut tracker, count),
        Command::Add { value } => cmd_add(&mut tracker, &value),
        Command::Undo => cmd_undo(&mut tracker),
        Command::Tag { ts, outcome } => cmd_tag(&mut tracker, ts, &outcome),
        Command::Clear { yes } => cmd_clear(&mut tracker, yes),
        Command::History { last } => cmd_history(&tracker, last),
        Command::Stats => cmd_stats(&tracker),
        Command::Interactive => interactive::run_interactive(&mut tracker),
        Command::DbPath | Command::Config { .. } => Ok(()),
    };

    tracker.close();
    result
}

fn sleep_ms(ms: u64) {
    if ms > 0 {
        log::debug!("Attente de {} ms", ms);
        std::thread::sleep(Duration::from_millis(ms));
    }
}

pub(crate) fn cmd_spin(tracker: &mut Tracker, count: usize) -> Result<()> {
    for i in 0..count {
        let wait = tracker.lock_remaining_ms();
        if wait > 0 {
            println!("Roue verrouillée, attente de {:.1} s...", wait as f64 / 1000.0);
            sleep_ms(wait);
        }

        let Some(spin) = tracker.request_spin() else {
            println!("La roue tourne déjà.");
            continue;
        };
        if count > 1 {
            print!("[{}/{}] ", i + 1, count);
        }
        display::display_spin(&spin);

        sleep_ms(tracker.next_due().map_or(0, |due| due.saturating_sub(tracker.now_ms())));
        for ingest in tracker.poll() {
            display::display_ingest(&ingest);
        }
    }
    display::display_recent(&tracker.recent());
    Ok(())
}

pub(crate) fn cmd_add(tracker: &mut Tracker, raw: &str) -> Result<()> {
    match tracker.submit_manual_value(raw) {
        Some(ingest) => display::display_ingest(&ingest),
        None => println!("Saisie ignorée : '{}' n'est pas un numéro entre 0 et 36.", raw.trim()),
    }
    Ok(())
}

pub(crate) fn cmd_undo(tracker: &mut Tracker) -> Result<()> {
    match tracker.undo_last() {
        Some(entry) => println!("Numéro {} retiré.", entry.value),
        None => println!("Historique vide, rien à annuler."),
    }
    Ok(())
}

pub(crate) fn cmd_tag(tracker: &mut Tracker, ts: u64, outcome: &str) -> Result<()> {
    let outcome: Outcome = outcome.parse()?;
    if tracker.tag_outcome(ts, outcome) {
        println!("Entrée {} marquée {}.", ts, outcome);
    } else {
        println!("Aucune entrée avec l'horodatage {}.", ts);
    }
    Ok(())
}

pub(crate) fn cmd_clear(tracker: &mut Tracker, yes: bool) -> Result<()> {
    if !yes {
        let confirm = interactive::prompt("Effacer tout l'historique ? (o/n) : ")?;
        if confirm.to_lowercase() != "o" {
            println!("Effacement annulé.");
            return Ok(());
        }
    }
    tracker.clear_all();
    println!("Historique effacé.");
    Ok(())
}

pub(crate) fn cmd_history(tracker: &Tracker, last: usize) -> Result<()> {
    let entries: Vec<_> = tracker.history().entries().take(last).cloned().collect();
    display::display_history(&entries);
    Ok(())
}

pub(crate) fn cmd_stats(tracker: &Tracker) -> Result<()> {
    display::display_recent(&tracker.recent());
    display::display_stats(tracker.stats(), tracker.config().analytics.trend_window);
    Ok(())
}

fn cmd_db_path(path: &std::path::Path) -> Result<()> {
    println!("{}", path.display());
    if path.exists() {
        let conn = open_db(path)?;
        migrate(&conn)?;
        match slot_saved_at(&conn, SCHEMA_VERSION)? {
            Some(at) => println!("Dernière sauvegarde : {}", at),
            None => println!("Aucun état enregistré."),
        }
    }
    Ok(())
}

fn cmd_config(config: &TrackerConfig, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            save_config(config, path)?;
            println!("Configuration écrite dans {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(config).context("Échec de la sérialisation")?;
            println!("{json}");
        }
    }
    Ok(())
}

pub(crate) fn report(result: Result<()>) {
    if let Err(e) = result {
        println!("Erreur: {e:#}");
    }
}
