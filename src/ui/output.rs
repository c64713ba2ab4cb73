// Console formatting for probe results, profiles and statistics
use crate::core::network::types::{ProbeReport, Verdict};
use crate::profiles::Profile;
use crate::stats::{StatsData, StatsSummary};
use ansi_term::Colour::{Cyan, Green, Red, Yellow};
use ansi_term::Style;

const RULE_WIDTH: usize = 50;

pub fn rule() -> String {
    "═".repeat(RULE_WIDTH)
}

pub fn success(message: &str) -> String {
    format!("{} {}", Green.paint("✅"), message)
}

pub fn failure(message: &str) -> String {
    format!("{} {}", Red.paint("❌"), message)
}

pub fn warning(message: &str) -> String {
    format!("{} {}", Yellow.paint("⚠️"), message)
}

pub fn hint(message: &str) -> String {
    format!("💡 {}", Style::new().dimmed().paint(message))
}

/// Short description of why a verdict came out the way it did
pub fn verdict_detail(verdict: &Verdict) -> String {
    let mut parts = Vec::new();

    if !verdict.capabilities.is_empty() {
        parts.push(format!("supports {}", verdict.capabilities.join(", ")));
    }
    if let Some(message) = &verdict.error_message {
        parts.push(message.clone());
    }
    if let Some(ms) = verdict.latency_ms {
        parts.push(format!("{}ms", ms));
    }
    if parts.is_empty() {
        parts.push("available".to_string());
    }

    parts.join(" | ")
}

/// One result line: marker, display index, name, detail and default star
pub fn report_line(report: &ProbeReport) -> String {
    let marker = if report.verdict.available {
        Green.paint("✅").to_string()
    } else {
        Red.paint("❌").to_string()
    };
    let cached = if report.from_cache { " 📋" } else { "" };
    let star = if report.profile.is_default {
        format!(" {}", Yellow.paint("⭐"))
    } else {
        String::new()
    };

    format!(
        "{} [{}] {}{} - {}{}",
        marker,
        report.display_index(),
        Style::new().bold().paint(&report.profile.name),
        star,
        verdict_detail(&report.verdict),
        cached
    )
}

pub fn print_reports(reports: &[ProbeReport], cache_hits: usize) {
    println!();
    println!("{}", Cyan.bold().paint("📡 Provider status"));
    for report in reports {
        println!("{}", report_line(report));
    }
    if cache_hits > 0 {
        let message = format!("{} result(s) from cache, use -r to refresh", cache_hits);
        println!("{}", hint(&message));
    }
}

pub fn profile_line(index: usize, profile: &Profile) -> String {
    let star = if profile.is_default {
        format!(" {}", Yellow.paint("⭐ default"))
    } else {
        String::new()
    };
    format!(
        "[{}] {}{}\n    URL: {}\n    Key: {}",
        index + 1,
        Style::new().bold().paint(&profile.name),
        star,
        profile.base_url,
        profile.masked_credential()
    )
}

pub fn print_profiles(profiles: &[Profile]) {
    println!("{}", Cyan.bold().paint("📋 Configured providers"));
    for (index, profile) in profiles.iter().enumerate() {
        println!("{}", profile_line(index, profile));
    }
}

/// Fixed-width bar for distribution charts
pub fn bar(count: u64, max: u64, width: usize) -> String {
    let filled = if max > 0 {
        ((count as f64 / max as f64) * width as f64).round() as usize
    } else {
        0
    };
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(width - filled.min(width))
    )
}

pub fn print_stats(summary: &StatsSummary, data: &StatsData, verbose: bool) {
    println!();
    println!("{}", Cyan.bold().paint("📊 ccswitch usage statistics"));
    println!("{}", rule());

    println!("\n📈 Overview:");
    println!("  • Total uses: {}", summary.total_uses);
    println!("  • Days in use: {}", summary.days_used);
    println!("  • Uses per day: {:.1}", summary.avg_uses_per_day);
    println!(
        "  • Last use: {}",
        summary.last_use.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );

    if !summary.top_providers.is_empty() {
        println!("\n🏆 Most used providers:");
        for (i, p) in summary.top_providers.iter().enumerate() {
            println!("  {}. {}", i + 1, p.name);
            println!(
                "     {} uses | {:.1}% success | avg {}ms",
                p.uses, p.success_rate, p.avg_response_time
            );
        }
    }

    if !summary.top_commands.is_empty() {
        println!("\n⚡ Most used commands:");
        for (i, (command, count)) in summary.top_commands.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, command, count);
        }
    }

    println!("\n🕐 Usage pattern:");
    match summary.peak_hour {
        Some(hour) => println!("  • Busiest hour: {}:00-{}:00", hour, hour + 1),
        None => println!("  • Busiest hour: unknown"),
    }
    println!("  • Busiest day: {}", summary.peak_day.unwrap_or("unknown"));

    println!("\n⚡ Performance:");
    println!("  • Average response time: {}ms", summary.avg_response_time);
    println!("  • Errors: {}", summary.errors);

    if verbose {
        let max = data.hourly_distribution.iter().copied().max().unwrap_or(0);
        println!("\n📊 Hourly distribution:");
        for (hour, count) in data.hourly_distribution.iter().enumerate() {
            println!("  {:02}:00 {} {}", hour, bar(*count, max, 20), count);
        }

        if !data.errors.types.is_empty() {
            println!("\n❌ Error types:");
            for (kind, stats) in &data.errors.types {
                println!("  • {}: {}", kind, stats.count);
                if let Some(at) = stats.last_occurred {
                    println!(
                        "    last seen: {}",
                        at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }

    println!("\n{}", rule());
    println!("{}", hint("use --stats -v for details"));
}
