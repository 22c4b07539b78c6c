use chrono::{DateTime, Local};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::findings::Finding;
use crate::probe::ProbeOutcome;
use crate::scheduler::ScanSummary;

/// Console presentation: one status line per outcome, a progress bar per round.
#[derive(Debug, Clone)]
pub struct Reporter {
    visible: bool,
    progress: bool,
}

impl Reporter {
    pub fn new(progress: bool) -> Self {
        Self {
            visible: true,
            progress,
        }
    }

    pub fn silent() -> Self {
        Self {
            visible: false,
            progress: false,
        }
    }

    pub fn round_bar(&self, len: usize) -> ProgressBar {
        if !self.visible || !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%)")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar
    }

    fn line(&self, bar: &ProgressBar, text: String) {
        if !self.visible {
            return;
        }
        if bar.is_hidden() {
            println!("{}", text);
        } else {
            bar.println(text);
        }
    }

    pub fn outcome(&self, bar: &ProgressBar, subdomain: &str, outcome: &ProbeOutcome) {
        let text = match outcome {
            ProbeOutcome::Vulnerable { url, status_code, .. } => format!(
                "{} {} {}",
                "[!] Potential Subdomain Takeover Detected:".bright_red().bold(),
                subdomain.bright_red().bold(),
                format!("({} -> {})", url, status_code).bright_yellow()
            ),
            ProbeOutcome::Clean => format!(
                "{} {}",
                "[-] No Takeover Detected:".green(),
                subdomain.green()
            ),
            ProbeOutcome::TransportError { reason } => format!(
                "{} {}: {}",
                "[!] Error checking subdomain".yellow(),
                subdomain.yellow(),
                reason
            ),
        };
        self.line(bar, text);
    }

    pub fn fault(&self, bar: &ProgressBar, subdomain: &str, reason: &str) {
        self.line(
            bar,
            format!(
                "{} {}: {}",
                "[!] Error processing subdomain".yellow(),
                subdomain.yellow(),
                reason
            ),
        );
    }

    pub fn recorded(&self, bar: &ProgressBar, finding: &Finding) {
        self.line(
            bar,
            format!(
                "    {} {}",
                "💾 Finding logged at".bright_blue(),
                finding.discovered_at.format("%H:%M:%S").to_string().bright_green()
            ),
        );
    }

    pub fn retrying(&self, round: u32, max_retries: u32, pending: usize) {
        if !self.visible {
            return;
        }
        println!(
            "{} {}",
            format!(
                "[+] Retrying failed requests... Attempt {} of {}",
                round, max_retries
            )
            .cyan(),
            format!("({} subdomains)", pending).bright_yellow()
        );
    }

    pub fn summary(&self, summary: &ScanSummary, started: DateTime<Local>, findings_path: &str) {
        if !self.visible {
            return;
        }
        let ended = Local::now();
        let duration = ended.signed_duration_since(started);

        println!("\n{}", "=".repeat(60).bright_yellow());
        println!("{}", "🎯 SCAN RESULTS".bright_cyan().bold());
        println!("{}", "-".repeat(60).bright_yellow());
        println!("{} {}", "🆔 Scan ID:".bright_blue(), summary.scan_id.to_string().bright_green());
        println!("{} {}", "🔢 Subdomains:".bright_blue(), summary.targets.to_string().bright_green());
        println!("{} {}", "🔁 Rounds:".bright_blue(), summary.rounds.to_string().bright_green());
        println!("{} {}", "⏱️ Start Time:".bright_blue(), started.format("%H:%M:%S").to_string().bright_green());
        println!("{} {}", "🏁 End Time:".bright_blue(), ended.format("%H:%M:%S").to_string().bright_green());
        println!(
            "{} {}",
            "⌛ Total Duration:".bright_blue(),
            format!("{} minutes {} seconds", duration.num_minutes(), duration.num_seconds() % 60).bright_green()
        );
        println!("{} {}", "✅ Clean:".bright_blue(), summary.clean.to_string().bright_green());
        println!(
            "{} {}",
            "🔥 Potential Takeovers:".bright_blue(),
            summary.vulnerable.to_string().bright_red().bold()
        );
        if summary.vulnerable > 0 {
            println!("{} {}", "💾 Findings Log:".bright_blue(), findings_path.bright_green());
        }
        println!(
            "{} {}",
            "❌ Permanently Failed:".bright_blue(),
            summary.failed.len().to_string().bright_yellow()
        );
        println!("{}", "=".repeat(60).bright_yellow());

        if !summary.failed.is_empty() {
            println!("\n{}", "UNREACHABLE SUBDOMAINS (not checked):".bright_cyan().bold());
            println!("{}", "-".repeat(60).bright_yellow());
            for (i, (subdomain, attempts)) in summary.failed.iter().enumerate() {
                println!(
                    "{} {} - {}",
                    format!("{}.", i + 1).bright_blue(),
                    subdomain.bright_yellow(),
                    format!("{} failed attempts", attempts).bright_red()
                );
            }
            println!("{}", "=".repeat(60).bright_yellow());
        }
    }
}
