//! Console summaries

use std::io::Write;

use anyhow::Result;
use colored::Colorize;

use evolution_logic::{SimulationReport, StrategyRegistry};

pub fn write_summary(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    let cfg = &report.config;
    writeln!(
        out,
        "{}",
        format!(
            "seed {} · {} generations · population {} · noise {} · rate {}",
            cfg.seed, cfg.generations, cfg.population_size, cfg.noise, cfg.evolution_rate
        )
        .dimmed()
    )?;
    if report.cancelled {
        writeln!(
            out,
            "{}",
            format!("cancelled after {} generations", report.generations_completed()).yellow()
        )?;
    }

    writeln!(out, "\n{}", "Leaderboard".bold())?;
    let total = report.final_population.total().max(1) as f64;
    for (rank, entry) in report.leaderboard.iter().enumerate() {
        let share = entry.count as f64 / total * 100.0;
        let line = format!(
            "{:>3}. {:<32} {:>8} {:>6.1}%",
            rank + 1,
            entry.name,
            entry.count,
            share
        );
        if rank == 0 {
            writeln!(out, "{}", line.green().bold())?;
        } else if entry.count == 0 {
            writeln!(out, "{}", line.red())?;
        } else {
            writeln!(out, "{line}")?;
        }
    }

    if let (Some(pay), Some(coop)) = (report.payoff_series.last(), report.cooperation_series.last()) {
        writeln!(out, "\n{}", format!("Generation {}", pay.generation).bold())?;
        writeln!(out, "  {:<20} {:>8} {:>8}", "strategy", "payoff", "coop")?;
        for v in &pay.values {
            writeln!(
                out,
                "  {:<20} {:>8.3} {:>8.3}",
                v.id,
                v.value,
                coop.get(&v.id).unwrap_or(0.0)
            )?;
        }
    }

    let h2h = &report.head_to_head;
    writeln!(out, "\n{}", "Head to head (row earns vs column)".bold())?;
    write!(out, "  {:<20}", "")?;
    for id in &h2h.ids {
        write!(out, " {:>10}", truncate(id, 10))?;
    }
    writeln!(out)?;
    for (row, id) in h2h.ids.iter().enumerate() {
        write!(out, "  {:<20}", id)?;
        for value in &h2h.payoffs[row] {
            write!(out, " {:>10.3}", value)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// One line per sweep run
pub fn write_sweep_summary(out: &mut dyn Write, reports: &[SimulationReport]) -> Result<()> {
    writeln!(
        out,
        "{}",
        format!(
            "{:>4}  {:>6} {:>6} {:>7} {:>5} {:>5} {:>4}  {}",
            "run", "noise", "rounds", "pop", "gens", "rate", "reps", "winner"
        )
        .bold()
    )?;
    for (i, report) in reports.iter().enumerate() {
        let cfg = &report.config;
        let winner = report
            .winner()
            .map(|w| format!("{} ({})", w.id, w.count))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:>4}  {:>6} {:>6} {:>7} {:>5} {:>5} {:>4}  {}",
            i + 1,
            cfg.noise,
            cfg.rounds,
            cfg.population_size,
            cfg.generations,
            cfg.evolution_rate,
            cfg.replications,
            winner.green()
        )?;
    }
    Ok(())
}

pub fn write_strategy_list(out: &mut dyn Write, registry: &StrategyRegistry) -> Result<()> {
    writeln!(out, "{}", "Available strategies:".bold())?;
    for s in registry.strategies() {
        let by = s.author.as_deref().map(|a| format!(" by {a}")).unwrap_or_default();
        writeln!(out, "  {:<18} {}{}", s.id.cyan(), s.name, by.dimmed())?;
        writeln!(out, "  {:<18} {}", "", evolution_logic::describe_strategy(s).dimmed())?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
