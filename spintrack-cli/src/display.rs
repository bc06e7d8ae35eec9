use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use spintrack_db::models::{Color as PocketColor, Column, Dozen, HistoryEntry, Outcome};
use spintrack_engine::analytics::{DerivedStats, NumberFrequency, Verdict};
use spintrack_engine::generator::Spin;
use spintrack_engine::tracker::Ingest;

fn pocket_color(color: PocketColor) -> Color {
    match color {
        PocketColor::Red => Color::Red,
        PocketColor::Black => Color::White,
        PocketColor::Green => Color::Green,
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn format_ts(ts: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ts as i64)
        .map(|d| {
            d.with_timezone(&chrono::Local)
                .format("%d/%m %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "—".to_string())
}

pub fn display_spin(spin: &Spin) {
    println!(
        "La roue tourne ({:.1} s, rotation cible {:.1}°)...",
        spin.duration_ms as f64 / 1000.0,
        spin.target_rotation
    );
}

pub fn display_ingest(ingest: &Ingest) {
    match ingest {
        Ingest::Admitted(entry) => {
            println!("→ {:2} {}  (ts {})", entry.value, entry.color(), entry.ts);
        }
        Ingest::Rejected(reason) => println!("Résultat ignoré : {}", reason),
    }
}

pub fn display_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("Aucun numéro enregistré.");
        return;
    }

    let mut table = new_table();
    table.set_header(vec!["#", "Numéro", "Couleur", "Douzaine", "Colonne", "Résultat", "Heure", "ts"]);

    for (i, entry) in entries.iter().enumerate() {
        let color = pocket_color(entry.color());
        let outcome = match entry.outcome {
            Some(Outcome::Win) => Cell::new("win").fg(Color::Green),
            Some(Outcome::Lose) => Cell::new("lose").fg(Color::Red),
            None => Cell::new("—"),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{:2}", entry.value)).fg(color),
            Cell::new(entry.color()).fg(color),
            Cell::new(Dozen::of(entry.value).map(|d| d.label()).unwrap_or("—")),
            Cell::new(Column::of(entry.value).map(|c| c.label()).unwrap_or("—")),
            outcome,
            Cell::new(format_ts(entry.ts)),
            Cell::new(entry.ts),
        ]);
    }

    println!("{table}");
}

pub fn display_recent(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        return;
    }
    let mut table = new_table();
    let row: Vec<Cell> = entries
        .iter()
        .map(|e| {
            let mark = match e.outcome {
                Some(Outcome::Win) => "✓",
                Some(Outcome::Lose) => "✗",
                None => "",
            };
            Cell::new(format!("{}{}", e.value, mark)).fg(pocket_color(e.color()))
        })
        .collect();
    table.add_row(row);
    println!("Derniers numéros :");
    println!("{table}");
}

fn join_numbers(freqs: &[NumberFrequency]) -> String {
    if freqs.is_empty() {
        return "—".to_string();
    }
    freqs
        .iter()
        .map(|f| format!("{} (×{})", f.number, f.frequency))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn display_stats(stats: &DerivedStats, trend_window: usize) {
    println!("\n== Statistiques ({} numéros enregistrés) ==\n", stats.total);

    println!("── Douzaines et colonnes (derniers {}) ──", trend_window.min(stats.total));
    let mut table = new_table();
    table.set_header(vec!["Groupe", "Sorties", "Part", "Sur tout l'historique"]);
    for dozen in Dozen::ALL {
        let suggested = stats.suggested_dozens.contains(&dozen);
        let label = Cell::new(dozen.label());
        table.add_row(vec![
            if suggested { label.fg(Color::Yellow) } else { label },
            Cell::new(stats.trend.dozen(dozen)),
            Cell::new(format!("{:.0}%", stats.trend.dozen_share(dozen))),
            Cell::new(stats.overall.dozen(dozen)),
        ]);
    }
    for column in Column::ALL {
        let suggested = stats.suggested_columns.contains(&column);
        let label = Cell::new(column.label());
        table.add_row(vec![
            if suggested { label.fg(Color::Cyan) } else { label },
            Cell::new(stats.trend.column(column)),
            Cell::new(format!("{:.0}%", stats.trend.column_share(column))),
            Cell::new(stats.overall.column(column)),
        ]);
    }
    println!("{table}");

    let dozens: Vec<&str> = stats.suggested_dozens.iter().map(|d| d.label()).collect();
    let columns: Vec<&str> = stats.suggested_columns.iter().map(|c| c.label()).collect();
    println!("Douzaines suggérées : {}", if dozens.is_empty() { "—".to_string() } else { dozens.join(", ") });
    println!("Colonnes suggérées  : {}", if columns.is_empty() { "—".to_string() } else { columns.join(", ") });
    if let Some(lagging) = stats.lagging_dozen {
        println!("Douzaine en retard  : {}", lagging);
    }

    println!("\n── Numéros ──");
    let mut table = new_table();
    table.set_header(vec!["Catégorie", "Numéros"]);
    table.add_row(vec![
        Cell::new("Chauds").fg(Color::Red),
        Cell::new(join_numbers(&stats.hot)),
    ]);
    table.add_row(vec![
        Cell::new("Froids").fg(Color::Blue),
        Cell::new(join_numbers(&stats.cold)),
    ]);
    println!("{table}");

    let c = &stats.colors;
    let call = c.call.map(|col| col.to_string()).unwrap_or_else(|| "RANDOM".to_string());
    println!(
        "\nCouleurs : {} RED / {} BLACK / {} GREEN → {}",
        c.red, c.black, c.green, call
    );

    let verdict_color = match stats.verdict {
        Verdict::Strong { .. } => Color::Green,
        Verdict::Possible { .. } => Color::Yellow,
        Verdict::NoTrend => Color::Grey,
    };
    let mut table = new_table();
    table.set_header(vec!["Tendance"]);
    table.add_row(vec![Cell::new(&stats.trend_message).fg(verdict_color)]);
    println!("{table}");
}
