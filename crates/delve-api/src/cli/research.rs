//! Research CLI commands: start, list, show, cancel.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use delve_core::event::next_for_job;
use delve_types::research::{
    AgentVariant, CreateResearchRequest, JobStatus, ResearchEvent, ResearchJob, ResearchReport,
    ResearchStep,
};

use crate::state::AppState;

/// Create a research job.
///
/// Without `--wait` the job is stored as pending and runs when `delve serve`
/// next starts. With `--wait` it runs in this process while steps print as
/// they happen; Ctrl+C cancels it.
///
/// # Examples
///
/// ```bash
/// delve research start "Acme Corp" https://acme.example --wait
/// ```
pub async fn start_research(
    state: &AppState,
    company: String,
    website: String,
    variant: &str,
    wait: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let variant = variant.parse::<AgentVariant>().map_err(|e| anyhow::anyhow!(e))?;

    if wait {
        state.worker_pool.spawn_workers().await;
    }
    let mut rx = state.event_bus.subscribe();

    let job = state
        .research_service
        .create(CreateResearchRequest {
            company_name: Some(company),
            company_website: Some(website),
            agent_variant: Some(variant),
        })
        .await?;

    if !wait {
        if json {
            println!("{}", serde_json::to_string_pretty(&job)?);
        } else if !quiet {
            println!();
            println!(
                "  {} Research queued for {}",
                style("✓").green().bold(),
                style(&job.company_name).cyan()
            );
            println!("  {}  {}", style("ID:").bold(), style(job.id.to_string()).dim());
            println!();
            println!(
                "  It runs when {} starts. Use {} to run it now.",
                style("delve serve").yellow(),
                style("--wait").yellow()
            );
            println!();
        }
        return Ok(());
    }

    let live = !json && !quiet;
    let mut cancelled = false;
    if live {
        println!();
        println!(
            "  {} Researching {} ({})",
            style("🔍").bold(),
            style(&job.company_name).cyan().bold(),
            job.agent_variant
        );
        println!();
    }

    loop {
        tokio::select! {
            event = next_for_job(&mut rx, job.id) => match event {
                Some(ResearchEvent::Step { step, .. }) => {
                    if live {
                        print_step(&step);
                    }
                }
                Some(ResearchEvent::Finished { .. }) | None => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancelled => {
                cancelled = true;
                if live {
                    println!();
                    println!("  {} Cancelling...", style("!").yellow().bold());
                }
                state.research_service.cancel(&job.id.to_string()).await?;
            }
        }
    }

    let finished = state.research_service.get(&job.id.to_string()).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&finished)?);
    } else if !quiet {
        println!();
        print_summary(&finished);
        if let Some(report) = &finished.result {
            print_report(report);
        }
    }
    Ok(())
}

/// List jobs in a colored table, newest first.
pub async fn list_research(
    state: &AppState,
    status: Option<String>,
    variant: Option<String>,
    json: bool,
) -> Result<()> {
    let status = status
        .map(|s| s.parse::<JobStatus>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;
    let variant = variant
        .map(|v| v.parse::<AgentVariant>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;

    let jobs = state.research_service.list(status, variant).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!();
        println!(
            "  {} No research jobs found. Start one with: {}",
            style("i").blue().bold(),
            style("delve research start <company> <website>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Company").fg(Color::White),
        Cell::new("Variant").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Steps").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for job in &jobs {
        table.add_row(vec![
            Cell::new(job.id.to_string()).fg(Color::DarkGrey),
            Cell::new(&job.company_name),
            Cell::new(job.agent_variant.to_string()),
            status_cell(job.status),
            Cell::new(job.steps.len()),
            Cell::new(job.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {} job(s)", jobs.len());
    println!();
    Ok(())
}

/// Show one job with its steps and report.
pub async fn show_research(state: &AppState, id: &str, json: bool) -> Result<()> {
    let job = state.research_service.get(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!();
    print_summary(&job);

    if !job.steps.is_empty() {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Time").fg(Color::White),
            Cell::new("Step").fg(Color::White),
            Cell::new("Detail").fg(Color::White),
        ]);
        for step in &job.steps {
            table.add_row(vec![
                Cell::new(step.timestamp.format("%H:%M:%S%.3f").to_string()).fg(Color::DarkGrey),
                Cell::new(&step.label),
                Cell::new(&step.detail),
            ]);
        }
        println!("{table}");
        println!();
    }

    if let Some(report) = &job.result {
        print_report(report);
    }
    Ok(())
}

/// Cancel a pending or running job.
pub async fn cancel_research(state: &AppState, id: &str, json: bool) -> Result<()> {
    let job = state.research_service.cancel(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Research for {} cancelled ({})",
        style("✓").green().bold(),
        style(&job.company_name).cyan(),
        format_status(job.status)
    );
    println!();
    Ok(())
}

fn print_step(step: &ResearchStep) {
    println!(
        "  {} {}  {}",
        style("•").cyan(),
        style(&step.label).bold(),
        style(&step.detail).dim()
    );
}

fn print_summary(job: &ResearchJob) {
    println!(
        "  {}  {}",
        style("Company:").bold(),
        style(&job.company_name).cyan().bold()
    );
    println!("  {}  {}", style("Website:").bold(), job.company_website);
    println!("  {}  {}", style("Variant:").bold(), job.agent_variant);
    println!("  {}  {}", style("Status:").bold(), format_status(job.status));
    println!("  {}  {}", style("ID:").bold(), style(job.id.to_string()).dim());
    println!(
        "  {}  {}",
        style("Created:").bold(),
        job.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(completed_at) = job.completed_at {
        let elapsed = completed_at - job.created_at;
        println!(
            "  {}  {} ({}s)",
            style("Finished:").bold(),
            completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            elapsed.num_seconds()
        );
    }
    if let Some(error) = &job.error {
        println!("  {}  {}", style("Error:").bold(), style(error).red());
    }
    println!();
}

fn print_report(report: &ResearchReport) {
    println!("  {}", style("Current initiatives").bold().underlined());
    println!("  {}", report.current_initiatives);
    println!();

    println!("  {}", style("Five-year plan").bold().underlined());
    let plans = &report.year_plans;
    for (year, plan) in [
        ("Year 1", &plans.year1),
        ("Year 2", &plans.year2),
        ("Year 3", &plans.year3),
        ("Year 4", &plans.year4),
        ("Year 5", &plans.year5),
    ] {
        println!("  {}  {}", style(year).cyan(), plan);
    }
    println!();

    print_list("Technology stack", &report.technology_stack);
    print_list("Partnerships", &report.partnerships);

    println!("  {}", style("Market position").bold().underlined());
    println!("  {}", report.market_position);
    println!();
}

fn print_list(title: &str, items: &[String]) {
    println!("  {}", style(title).bold().underlined());
    if items.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for item in items {
        println!("    {} {}", style("•").dim(), item);
    }
    println!();
}

fn status_cell(status: JobStatus) -> Cell {
    match status {
        JobStatus::Pending => Cell::new("○ pending").fg(Color::DarkGrey),
        JobStatus::InProgress => Cell::new("◐ in-progress").fg(Color::Yellow),
        JobStatus::Completed => Cell::new("● completed").fg(Color::Green),
        JobStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
    }
}

fn format_status(status: JobStatus) -> String {
    match status {
        JobStatus::Pending => format!("{}", style("pending").dim()),
        JobStatus::InProgress => format!("{}", style("in-progress").yellow()),
        JobStatus::Completed => format!("{}", style("completed").green()),
        JobStatus::Failed => format!("{}", style("failed").red()),
    }
}
