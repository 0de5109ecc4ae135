//! The crawl command.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::CrawlArgs;
use crate::browser::chromium::ChromiumLauncher;
use crate::config::Settings;
use crate::credentials::ChainedCredentials;
use crate::orchestrator::{CrawlEvent, CrawlOrchestrator, CrawlState, CrawlSummary, SkipReason};

/// Apply crawl flags over the loaded settings.
fn apply_args(settings: &mut Settings, args: &CrawlArgs) {
    if let Some(ref url) = args.base_url {
        settings.base_url = url.clone();
    }
    if let Some(headless) = args.headless {
        settings.browser.headless = headless;
    }
    if args.headed {
        settings.browser.headless = false;
    }
    if let Some(limit) = args.limit {
        settings.max_profiles = (limit > 0).then_some(limit);
    }
    if args.debug {
        settings.debug = true;
    }
    if args.no_images {
        settings.download_images = false;
    }
    if let Some(ref file) = args.credentials {
        settings.credentials_file = file.clone();
    }
}

pub async fn cmd_crawl(mut settings: Settings, args: CrawlArgs) -> anyhow::Result<()> {
    apply_args(&mut settings, &args);
    settings.ensure_directories()?;

    println!(
        "{} Crawling {}",
        style("→").cyan(),
        style(&settings.base_url).bold()
    );
    println!(
        "  {} Records: {}",
        style("→").dim(),
        settings.records_dir().display()
    );

    let launcher = ChromiumLauncher::new(settings.browser.clone());
    let mut credentials = ChainedCredentials::new(settings.credentials_file.clone());
    if args.no_prompt {
        credentials = credentials.non_interactive();
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Interrupted, finishing current profile...",
                style("!").yellow()
            );
            ctrl_c.cancel();
        }
    });

    let (event_tx, event_rx) = mpsc::channel(100);
    let renderer = tokio::spawn(render_progress(event_rx));

    let mut orchestrator = CrawlOrchestrator::new(settings);
    let result = orchestrator
        .run(&launcher, &credentials, event_tx, cancel)
        .await;
    let _ = renderer.await;

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Crawl failed")),
    }
}

async fn render_progress(mut events: mpsc::Receiver<CrawlEvent>) {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::State(CrawlState::Authenticating) => spinner.set_message("Signing in..."),
            CrawlEvent::State(CrawlState::DiscoveringLinks) => {
                spinner.set_message("Loading directory listing...")
            }
            CrawlEvent::State(_) => {}
            CrawlEvent::LinksDiscovered { found, selected } => {
                spinner.finish_and_clear();
                println!(
                    "{} Found {} profiles, processing {}",
                    style("✓").green(),
                    found,
                    selected
                );
                let pb = ProgressBar::new(selected as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar = Some(pb);
            }
            CrawlEvent::ProfileStarted { name, .. } => {
                if let Some(ref pb) = bar {
                    pb.set_message(name);
                }
            }
            CrawlEvent::ProfileSaved { .. } => {
                if let Some(ref pb) = bar {
                    pb.inc(1);
                }
            }
            CrawlEvent::ProfileSkipped { name, reason } => {
                if let Some(ref pb) = bar {
                    let why = match reason {
                        SkipReason::Unreachable => "unreachable",
                        SkipReason::Invalid => "no name or email",
                    };
                    pb.println(format!("  {} {} ({})", style("✗").red(), name, why));
                    pb.inc(1);
                }
            }
            CrawlEvent::Finished(_) => {}
        }
    }

    spinner.finish_and_clear();
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
}

fn print_summary(summary: &CrawlSummary) {
    let headline = if summary.cancelled {
        format!("{} Crawl cancelled", style("!").yellow())
    } else {
        format!("{} Crawl complete", style("✓").green())
    };
    println!("{} in {:.1}s", headline, summary.elapsed.as_secs_f64());
    println!("  {} Attempted: {}", style("→").dim(), summary.attempted);
    println!("  {} Saved: {}", style("→").dim(), summary.persisted);
    println!("  {} With images: {}", style("→").dim(), summary.with_images);
    if summary.skipped + summary.invalid > 0 {
        println!(
            "  {} Skipped: {} unreachable, {} without name or email",
            style("!").yellow(),
            summary.skipped,
            summary.invalid
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_args() {
        let mut settings = Settings::default();
        let args = CrawlArgs {
            base_url: Some("https://dir.example.com/all".into()),
            headed: true,
            limit: Some(0),
            no_images: true,
            ..Default::default()
        };
        settings.max_profiles = Some(5);
        apply_args(&mut settings, &args);

        assert_eq!(settings.base_url, "https://dir.example.com/all");
        assert!(!settings.browser.headless);
        assert_eq!(settings.max_profiles, None);
        assert!(!settings.download_images);
        assert!(!settings.debug);
    }
}
