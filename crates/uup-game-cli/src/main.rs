use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uup_game_api::{GameClient, GameClientConfig, TestResults, API_CONTRACT_VERSION};
use uup_game_core::{AssignmentId, Task};

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Parser)]
#[command(name = "uup")]
#[command(about = "UUP game client")]
struct Cli {
    /// YAML file with client settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Raw `Cookie` header value identifying the student session.
    #[arg(long, global = true)]
    session_cookie: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconciled student view with catalogs and challenge settings.
    Student,
    Assignments,
    PowerupTypes,
    ChallengeConfig,
    TaskCategories,
    UsedHint(TaskArgs),
    PreviousPoints(TaskArgs),
    BuyPowerup(PowerupTypeArgs),
    StartAssignment(AssignmentArgs),
    UseHint(AssignmentArgs),
    SecondChance(SecondChanceArgs),
    SwitchTask(AssignmentArgs),
    TurnIn(TurnInArgs),
    AvailableTasks(AvailableTasksArgs),
}

#[derive(Debug, Args)]
struct AssignmentArgs {
    #[arg(long)]
    assignment_id: i64,
}

#[derive(Debug, Args)]
struct TaskArgs {
    #[arg(long)]
    assignment_id: i64,
    #[arg(long)]
    task_number: i64,
}

#[derive(Debug, Args)]
struct PowerupTypeArgs {
    #[arg(long)]
    type_id: i64,
}

#[derive(Debug, Args)]
struct SecondChanceArgs {
    #[arg(long)]
    assignment_id: i64,
    #[arg(long)]
    task_number: i64,
    #[arg(long)]
    task_name: String,
}

#[derive(Debug, Args)]
struct TurnInArgs {
    #[arg(long)]
    assignment_id: i64,
    #[arg(long)]
    total_tests: u32,
    #[arg(long)]
    passed_tests: u32,
}

#[derive(Debug, Args)]
struct AvailableTasksArgs {
    #[arg(long)]
    assignment_id: i64,
    #[arg(long)]
    type_id: i64,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            object.insert(
                "api_contract_version".to_string(),
                Value::String(API_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "api_contract_version": API_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json<T>(value: &T) -> Result<()>
where
    T: Serialize,
{
    let value = serde_json::to_value(value)?;
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn resolve_config(cli: &Cli) -> Result<GameClientConfig> {
    let mut config = match &cli.config {
        Some(path) => GameClientConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GameClientConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(cookie) = &cli.session_cookie {
        config.session_cookie = Some(cookie.clone());
    }
    Ok(config)
}

async fn run(command: Command, client: &GameClient) -> Result<()> {
    match command {
        Command::Student => {
            emit_json(&client.overview().await.context("failed to load student overview")?)
        }
        Command::Assignments => {
            emit_json(&client.assignments().await.context("failed to load assignments")?)
        }
        Command::PowerupTypes => {
            emit_json(&client.powerup_types().await.context("failed to load powerup types")?)
        }
        Command::ChallengeConfig => emit_json(
            &client.challenge_config().await.context("failed to load challenge config")?,
        ),
        Command::TaskCategories => {
            emit_json(&client.task_categories().await.context("failed to load task categories")?)
        }
        Command::UsedHint(args) => emit_json(
            &client
                .get_used_hint(AssignmentId(args.assignment_id), args.task_number)
                .await
                .context("failed to fetch used hint")?,
        ),
        Command::PreviousPoints(args) => emit_json(
            &client
                .get_previous_points(AssignmentId(args.assignment_id), args.task_number)
                .await
                .context("failed to fetch previous points")?,
        ),
        Command::BuyPowerup(args) => emit_json(
            &client.buy_powerup(args.type_id).await.context("failed to buy powerup")?,
        ),
        Command::StartAssignment(args) => emit_json(
            &client
                .start_assignment(AssignmentId(args.assignment_id))
                .await
                .context("failed to start assignment")?,
        ),
        Command::UseHint(args) => emit_json(
            &client.use_hint(AssignmentId(args.assignment_id)).await.context("failed to use hint")?,
        ),
        Command::SecondChance(args) => {
            let task = Task { task_number: args.task_number, name: args.task_name };
            emit_json(
                &client
                    .use_second_chance(AssignmentId(args.assignment_id), &task)
                    .await
                    .context("failed to use second chance")?,
            )
        }
        Command::SwitchTask(args) => emit_json(
            &client
                .switch_task(AssignmentId(args.assignment_id))
                .await
                .context("failed to switch task")?,
        ),
        Command::TurnIn(args) => {
            let results =
                TestResults { total_tests: args.total_tests, passed_tests: args.passed_tests };
            emit_json(
                &client
                    .turn_in_task(AssignmentId(args.assignment_id), results)
                    .await
                    .context("failed to turn in task")?,
            )
        }
        Command::AvailableTasks(args) => emit_json(
            &client
                .second_chance_available_tasks(AssignmentId(args.assignment_id), args.type_id)
                .await
                .context("failed to list available tasks")?,
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "resolved client configuration");
    let client = GameClient::new(&config).context("failed to build HTTP client")?;
    run(cli.command, &client).await
}
