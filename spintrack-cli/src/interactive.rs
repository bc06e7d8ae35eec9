use std::io::{self, Write};

use anyhow::{Context, Result};
use spintrack_db::models::parse_value;
use spintrack_engine::tracker::Tracker;

#[derive(Debug, PartialEq)]
enum InteractiveCommand {
    Value(String),
    Add,
    Spin,
    Undo,
    Tag,
    History,
    Stats,
    Clear,
    Help,
    Quit,
}

/// Un numéro seul (0-36) est une saisie directe ; le reste est une commande par nom.
fn parse_command(input: &str) -> Option<InteractiveCommand> {
    let input = input.trim();
    if parse_value(input).is_some() {
        return Some(InteractiveCommand::Value(input.to_string()));
    }
    match input.to_lowercase().as_str() {
        "ajouter" | "add" | "a" => Some(InteractiveCommand::Add),
        "lancer" | "spin" | "s" => Some(InteractiveCommand::Spin),
        "annuler" | "undo" | "u" => Some(InteractiveCommand::Undo),
        "marquer" | "tag" | "t" => Some(InteractiveCommand::Tag),
        "historique" | "history" | "hist" | "h" => Some(InteractiveCommand::History),
        "stats" | "statistiques" => Some(InteractiveCommand::Stats),
        "effacer" | "clear" => Some(InteractiveCommand::Clear),
        "aide" | "help" | "?" => Some(InteractiveCommand::Help),
        "quitter" | "quit" | "q" | "exit" => Some(InteractiveCommand::Quit),
        _ => None,
    }
}

fn display_menu() {
    println!();
    println!("── Mode interactif ──");
    println!("  <0-36>      Ajouter ce numéro");
    println!("  ajouter     Saisir un numéro");
    println!("  lancer      Lancer la roue");
    println!("  annuler     Retirer le dernier numéro");
    println!("  marquer     Marquer un numéro gagné/perdu");
    println!("  historique  Derniers numéros");
    println!("  stats       Statistiques et tendances");
    println!("  effacer     Tout effacer");
    println!("  quitter     Quitter");
    println!();
}

pub(crate) fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    if read == 0 {
        anyhow::bail!("Fin de l'entrée");
    }
    Ok(input.trim().to_string())
}

fn prompt_with_default(msg: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}] : ", msg, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

fn cmd_value(tracker: &mut Tracker, raw: &str) -> Result<()> {
    tracker.set_input_buffer(raw);
    super::cmd_add(tracker, raw)
}

fn cmd_add_interactive(tracker: &mut Tracker) -> Result<()> {
    let pending = tracker.input_buffer().to_string();
    let raw = if pending.is_empty() {
        prompt("Numéro (0-36) : ")?
    } else {
        prompt_with_default("Numéro (0-36)", &pending)?
    };
    cmd_value(tracker, &raw)
}

fn cmd_tag_interactive(tracker: &mut Tracker) -> Result<()> {
    let Some(newest) = tracker.history().newest().cloned() else {
        println!("Historique vide.");
        return Ok(());
    };
    let ts_str = prompt_with_default(
        &format!("Horodatage (dernier : {} → {})", newest.value, newest.ts),
        &newest.ts.to_string(),
    )?;
    let ts: u64 = ts_str.parse().context("Horodatage invalide")?;
    let outcome = prompt("Résultat (win/lose) : ")?;
    super::cmd_tag(tracker, ts, &outcome)
}

fn cmd_history_interactive(tracker: &Tracker) -> Result<()> {
    let n_str = prompt_with_default("Nombre de numéros", "20")?;
    let n: usize = n_str.parse().context("Nombre invalide")?;
    super::cmd_history(tracker, n)
}

pub fn run_interactive(tracker: &mut Tracker) -> Result<()> {
    println!("Bienvenue dans le mode interactif de spintrack !");
    display_menu();
    super::display::display_recent(&tracker.recent());

    loop {
        let input = match prompt("> ") {
            Ok(s) => s,
            Err(_) => break, // EOF / Ctrl+D
        };

        if input.is_empty() {
            continue;
        }

        let result = match parse_command(&input) {
            Some(InteractiveCommand::Quit) => {
                println!("Au revoir !");
                break;
            }
            Some(InteractiveCommand::Value(raw)) => cmd_value(tracker, &raw),
            Some(InteractiveCommand::Add) => cmd_add_interactive(tracker),
            Some(InteractiveCommand::Spin) => super::cmd_spin(tracker, 1),
            Some(InteractiveCommand::Undo) => super::cmd_undo(tracker),
            Some(InteractiveCommand::Tag) => cmd_tag_interactive(tracker),
            Some(InteractiveCommand::History) => cmd_history_interactive(tracker),
            Some(InteractiveCommand::Stats) => super::cmd_stats(tracker),
            Some(InteractiveCommand::Clear) => super::cmd_clear(tracker, false),
            Some(InteractiveCommand::Help) => {
                display_menu();
                Ok(())
            }
            None => {
                println!("Commande inconnue : '{}'. Tapez un numéro (0-36) ou 'aide'.", input);
                Ok(())
            }
        };
        super::report(result);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_bare_number() {
        assert_eq!(parse_command("17"), Some(InteractiveCommand::Value("17".to_string())));
        assert_eq!(parse_command(" 0 "), Some(InteractiveCommand::Value("0".to_string())));
        assert_eq!(parse_command("36"), Some(InteractiveCommand::Value("36".to_string())));
        assert_eq!(parse_command("37"), None);
        assert_eq!(parse_command("-1"), None);
    }

    #[test]
    fn test_parse_command_by_name() {
        assert_eq!(parse_command("ajouter"), Some(InteractiveCommand::Add));
        assert_eq!(parse_command("lancer"), Some(InteractiveCommand::Spin));
        assert_eq!(parse_command("annuler"), Some(InteractiveCommand::Undo));
        assert_eq!(parse_command("marquer"), Some(InteractiveCommand::Tag));
        assert_eq!(parse_command("historique"), Some(InteractiveCommand::History));
        assert_eq!(parse_command("statistiques"), Some(InteractiveCommand::Stats));
        assert_eq!(parse_command("effacer"), Some(InteractiveCommand::Clear));
        assert_eq!(parse_command("aide"), Some(InteractiveCommand::Help));
        assert_eq!(parse_command("quitter"), Some(InteractiveCommand::Quit));
    }

    #[test]
    fn test_parse_command_by_alias() {
        assert_eq!(parse_command("add"), Some(InteractiveCommand::Add));
        assert_eq!(parse_command("s"), Some(InteractiveCommand::Spin));
        assert_eq!(parse_command("u"), Some(InteractiveCommand::Undo));
        assert_eq!(parse_command("tag"), Some(InteractiveCommand::Tag));
        assert_eq!(parse_command("hist"), Some(InteractiveCommand::History));
        assert_eq!(parse_command("stats"), Some(InteractiveCommand::Stats));
        assert_eq!(parse_command("clear"), Some(InteractiveCommand::Clear));
        assert_eq!(parse_command("?"), Some(InteractiveCommand::Help));
        assert_eq!(parse_command("q"), Some(InteractiveCommand::Quit));
        assert_eq!(parse_command("exit"), Some(InteractiveCommand::Quit));
    }

    #[test]
    fn test_parse_command_case_insensitive() {
        assert_eq!(parse_command("QUIT"), Some(InteractiveCommand::Quit));
        assert_eq!(parse_command("Lancer"), Some(InteractiveCommand::Spin));
        assert_eq!(parse_command("STATS"), Some(InteractiveCommand::Stats));
    }

    #[test]
    fn test_parse_command_unknown() {
        assert_eq!(parse_command("foo"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("4.5"), None);
        assert_eq!(parse_command("hello"), None);
    }
}
