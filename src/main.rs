use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use definitor::feedback::FeedbackBuilder;
use definitor::generation::{AnthropicGenerator, GenerationClient};
use definitor::rules::{RuleRepository, TermCategory};
use definitor::runner::{
    AgentResult, CancellationToken, DefinitionRequest, IterationObserver, IterationRecord, Orchestrator,
    OrchestratorConfig, StopReason,
};
use definitor::validation::{Severity, ValidationEngine, ValidationResult};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("definitor")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("definitor.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Prints one line per finished iteration
struct ConsoleObserver {
    term: String,
}

impl IterationObserver for ConsoleObserver {
    fn on_iteration(&self, record: &IterationRecord) {
        match &record.generation_error {
            Some(err) => println!(
                "  {} [{}] iteration {}: {}",
                "✗".red(),
                self.term,
                record.iteration_number,
                err
            ),
            None => println!(
                "  {} [{}] iteration {}: score {:.2}",
                if record.is_acceptable() { "✓".green() } else { "·".yellow() },
                self.term,
                record.iteration_number,
                record.score
            ),
        }
    }
}

/// Rule source: command flag, then global `--rules`, then the config
fn rule_source<'a>(cli: &'a Cli, config: &'a Config, dir: Option<&'a PathBuf>) -> &'a PathBuf {
    dir.or(cli.rules.as_ref()).unwrap_or(&config.rules.dir)
}

fn load_engine(cli: &Cli, config: &Config) -> Result<Arc<ValidationEngine>> {
    load_engine_from(rule_source(cli, config, None), config)
}

fn load_engine_from(dir: &Path, config: &Config) -> Result<Arc<ValidationEngine>> {
    let repository =
        RuleRepository::load(dir).context(format!("Failed to load rules from {}", dir.display()))?;
    info!("Loaded {} rule(s) from {}", repository.len(), dir.display());

    let engine = ValidationEngine::with_scoring(Arc::new(repository), config.scoring())
        .context("Invalid scoring configuration")?;
    for id in engine.unevaluable_rules() {
        log::warn!("Rule {} cannot be evaluated and will be skipped", id);
    }
    Ok(Arc::new(engine))
}

fn build_orchestrator(
    engine: Arc<ValidationEngine>,
    config: &Config,
) -> Result<Orchestrator<AnthropicGenerator>> {
    let feedback = config.feedback();
    feedback.validate().context("Invalid feedback configuration")?;

    let generator = AnthropicGenerator::new(config.anthropic()).context("Failed to create generator")?;
    info!("Using model {}", generator.model());
    Ok(Orchestrator::new(Arc::new(generator), engine).with_feedback(FeedbackBuilder::with_config(feedback)))
}

/// Cancel `token` on Ctrl-C; the run stops before its next iteration
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling after the current iteration...".yellow());
            log::info!("Ctrl-C received, cancelling");
            token.cancel();
        }
    });
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".red().bold(),
        Severity::High => "HIGH".red(),
        Severity::Medium => "MEDIUM".yellow(),
        Severity::Low => "LOW".normal(),
    }
}

fn print_validation(result: &ValidationResult) {
    let verdict = if result.is_acceptable {
        "ACCEPTABLE".green().bold()
    } else {
        "NOT ACCEPTABLE".red().bold()
    };
    println!("{} score {:.2}", verdict, result.overall_score);
    for violation in result.violations_by_severity() {
        println!(
            "  {:<8} [{}] {}",
            severity_label(violation.severity),
            violation.rule_id.cyan(),
            violation.message
        );
        println!("           {}", violation.suggestion.dimmed());
    }
    if !result.skipped_rule_ids.is_empty() {
        println!("  {} {}", "Skipped:".yellow(), result.skipped_rule_ids.join(", "));
    }
}

fn print_agent_result(request: &DefinitionRequest, result: &AgentResult) {
    let label = result.stop_reason.as_str();
    let reason = match result.stop_reason {
        StopReason::Success => label.green().bold(),
        StopReason::Cancelled => label.yellow().bold(),
        StopReason::Exhausted | StopReason::Failed => label.red().bold(),
    };
    println!(
        "{} {} after {} iteration(s) in {} ms",
        request.term.bold(),
        reason,
        result.iteration_count(),
        result.duration_ms
    );
    if let Some(best) = &result.best_iteration {
        println!("  best: iteration {} (score {:.2})", best.iteration_number, best.score);
    }
    if !result.final_text.is_empty() {
        println!("  {}", result.final_text);
    }
}

fn handle_rules_command(
    cli: &Cli,
    config: &Config,
    dir: Option<&PathBuf>,
    category: Option<TermCategory>,
) -> Result<()> {
    let engine = load_engine_from(rule_source(cli, config, dir), config)?;
    let repository = engine.repository();

    println!(
        "{} {} rule(s) from {}",
        "Loaded".green(),
        repository.len(),
        repository.source()
    );
    for (cat, count) in repository.count_by_category() {
        println!("  {:<14} {}", cat.to_string(), count);
    }
    println!();

    let rules: Vec<_> = match category {
        Some(cat) => repository.applicable(cat).collect(),
        None => repository.rules().iter().filter(|r| r.is_active()).collect(),
    };
    for rule in rules {
        println!("{} {} ({:?})", rule.id.cyan(), rule.name, rule.priority);
        if cli.is_verbose() {
            println!("    {}", rule.explanation.dimmed());
        }
    }
    if cli.is_verbose() {
        println!("\nfingerprint {}", repository.fingerprint());
    }
    Ok(())
}

fn handle_validate_command(cli: &Cli, config: &Config, text: &str, category: TermCategory, json: bool) -> Result<()> {
    let engine = load_engine(cli, config)?;
    let result = engine.validate(text, category);
    info!("Validated candidate: {}", result.summary());

    if json {
        return print_json(&result);
    }
    print_validation(&result);
    Ok(())
}

fn iteration_config(config: &Config, max_iterations: Option<u32>) -> OrchestratorConfig {
    let mut iteration = config.orchestrator();
    if let Some(max) = max_iterations {
        iteration.max_iterations = max;
    }
    iteration
}

async fn handle_generate_command(
    cli: &Cli,
    config: &Config,
    request: DefinitionRequest,
    max_iterations: Option<u32>,
    json: bool,
) -> Result<()> {
    let engine = load_engine(cli, config)?;
    let mut orchestrator = build_orchestrator(engine, config)?;
    if !json {
        orchestrator = orchestrator.with_observer(Arc::new(ConsoleObserver {
            term: request.term.clone(),
        }));
    }

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let result = orchestrator
        .run_with_cancellation(&request, &iteration_config(config, max_iterations), &token)
        .await
        .context("Definition run failed")?;

    if json {
        return print_json(&result);
    }
    print_agent_result(&request, &result);
    if cli.is_verbose() {
        for record in &result.iterations {
            for item in &record.feedback_generated {
                println!("    {} {}", format!("#{}", record.iteration_number).dimmed(), item);
            }
        }
    }
    Ok(())
}

fn load_batch(path: &Path) -> Result<Vec<DefinitionRequest>> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).context(format!("Failed to parse requests in {}", path.display()))
}

async fn handle_batch_command(cli: &Cli, config: &Config, file: &Path, json: bool) -> Result<()> {
    let requests = load_batch(file)?;
    info!("Running batch of {} request(s) from {}", requests.len(), file.display());

    let engine = load_engine(cli, config)?;
    let orchestrator = build_orchestrator(engine, config)?;
    let iteration = config.orchestrator();

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let runs = requests
        .iter()
        .map(|request| orchestrator.run_with_cancellation(request, &iteration, &token));
    let results = futures::future::join_all(runs)
        .await
        .into_iter()
        .collect::<definitor::Result<Vec<_>>>()
        .context("Batch run failed")?;

    if json {
        return print_json(&results);
    }
    for (request, result) in requests.iter().zip(&results) {
        print_agent_result(request, result);
    }
    let succeeded = results.iter().filter(|r| r.success).count();
    println!(
        "\n{} {}/{} accepted",
        "Batch:".bold(),
        succeeded,
        results.len()
    );
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Rules { dir, category } => handle_rules_command(cli, config, dir.as_ref(), *category),
        Commands::Validate { text, category, json } => handle_validate_command(cli, config, text, *category, *json),
        Commands::Generate {
            term,
            category,
            context,
            max_iterations,
            json,
        } => {
            let request = DefinitionRequest::new(term, context, *category);
            handle_generate_command(cli, config, request, *max_iterations, *json).await
        }
        Commands::Batch { file, json } => handle_batch_command(cli, config, file, *json).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    setup_logging(&level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
