//! Gradebook - project evaluation and defense scheduling CLI
//!
//! The `gradebook` command drives every service operation against a
//! SurrealDB database and prints the result as JSON.
//!
//! ## Commands
//!
//! - `project`: create projects and manage participants
//! - `evaluate`: record an evaluation as the acting user
//! - `evaluation`: inspect recorded evaluations
//! - `results`: per-participant averages for a project
//! - `criteria`: grading criteria per project type
//! - `defense`: project types, defense days, slots and registrations

use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use gradebook_core::{
    CriteriaService, CriterionUpdate, DefenseService, EvaluationCreate, EvaluationService,
    GradebookConfig, GradebookError, NewCriterion, NewDefenseSlot, NewProject, NewProjectType,
    ProjectService, Scores, SlotQuery, SurrealHandle,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, Level};

/// Exit code for a missing entity
const EXIT_NOT_FOUND: u8 = 4;
/// Exit code for any other rejected request
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Project evaluation and defense scheduling", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Database URL (mem://, surrealkv://path, ws://host:port)
    #[arg(long, global = true, env = "SURREALDB_URL")]
    db_url: Option<String>,

    /// Id of the acting user (evaluator or registrant)
    #[arg(long, global = true, env = "GRADEBOOK_USER_ID")]
    as_user: Option<i64>,

    /// Check evaluation scores against the project type's criteria
    #[arg(long, global = true, env = "GRADEBOOK_STRICT_CRITERIA")]
    strict_criteria: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects and their participants
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Record an evaluation of a participant as the acting user
    Evaluate {
        /// Project id
        #[arg(long)]
        project: i64,

        /// Participant id
        #[arg(long)]
        participant: i64,

        /// Criterion score as key=value (repeatable)
        #[arg(long = "score", value_parser = parse_score)]
        scores: Vec<(String, i64)>,

        /// Free-text comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Inspect recorded evaluations
    Evaluation {
        #[command(subcommand)]
        action: EvaluationAction,
    },

    /// Show per-participant average scores for a project
    Results {
        /// Project id
        project: i64,
    },

    /// Manage grading criteria
    Criteria {
        #[command(subcommand)]
        action: CriteriaAction,
    },

    /// Defense scheduling
    Defense {
        #[command(subcommand)]
        action: DefenseAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project
    Create {
        #[arg(long)]
        name: String,

        /// Owning user id
        #[arg(long)]
        author: i64,

        #[arg(long)]
        description: Option<String>,

        /// Project type id
        #[arg(long)]
        project_type: Option<i64>,
    },

    /// Show a project
    Show { id: i64 },

    /// Add a participant to a project
    AddParticipant { project: i64, participant: i64 },

    /// List a project's participants
    Participants { project: i64 },
}

#[derive(Subcommand)]
enum EvaluationAction {
    /// Show one evaluation
    Show { id: i64 },

    /// List evaluations of a project, optionally for one participant
    List {
        #[arg(long)]
        project: i64,

        #[arg(long)]
        participant: Option<i64>,
    },
}

#[derive(Subcommand)]
enum CriteriaAction {
    /// Add a grading criterion to a project type
    Add {
        #[arg(long)]
        project_type: i64,

        /// Criterion name (the score key used in evaluations)
        #[arg(long)]
        name: String,

        #[arg(long)]
        max_score: i64,

        #[arg(long, default_value = "1")]
        weight: i64,

        /// Display position
        #[arg(long, default_value = "0")]
        order: i32,

        #[arg(long)]
        description: Option<String>,
    },

    /// Update fields of a criterion
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        max_score: Option<i64>,

        #[arg(long)]
        weight: Option<i64>,

        #[arg(long)]
        order: Option<i32>,

        #[arg(long)]
        description: Option<String>,
    },

    /// List the criteria of a project type
    List { project_type: i64 },

    /// Highest reachable weighted score of a project type
    MaxScore { project_type: i64 },
}

#[derive(Subcommand)]
enum DefenseAction {
    /// List project types
    Types,

    /// Create a project type
    AddType {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// List defense days
    Days {
        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size (default: GRADEBOOK_PAGE_SIZE or 10)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show a defense day
    Day { id: i64 },

    /// Create a defense day
    AddDay {
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
    },

    /// List slots that still have room
    Slots {
        #[command(flatten)]
        filter: SlotArgs,
    },

    /// List slots with at least one registration
    Scheduled {
        #[command(flatten)]
        filter: SlotArgs,
    },

    /// Show a slot
    Slot { id: i64 },

    /// Create a slot on a defense day
    AddSlot {
        /// Defense day id
        #[arg(long)]
        day: i64,

        /// Slot number within the day
        #[arg(long)]
        index: i32,

        #[arg(long)]
        project_type: i64,

        #[arg(long)]
        title: String,

        /// Start time (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End time (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long, default_value = "1")]
        capacity: u32,
    },

    /// Register the acting user for a slot
    Register { slot: i64 },

    /// Remove the acting user's registration from a slot
    Unregister { slot: i64 },

    /// List the acting user's registrations
    Mine,
}

#[derive(clap::Args)]
struct SlotArgs {
    #[arg(long, default_value = "1")]
    page: u32,

    /// Page size (default: GRADEBOOK_PAGE_SIZE or 10)
    #[arg(long)]
    limit: Option<u32>,

    /// Only slots on this date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Only slots for this project type id
    #[arg(long)]
    project_type: Option<i64>,
}

impl SlotArgs {
    fn query(&self) -> SlotQuery {
        SlotQuery {
            date: self.date,
            project_type_id: self.project_type,
        }
    }
}

fn parse_score(raw: &str) -> std::result::Result<(String, i64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing criterion key in '{raw}'"));
    }
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid score in '{raw}': {e}"))?;
    Ok((key.to_string(), value))
}

/// Database handle plus the settings every command needs
struct App {
    handle: SurrealHandle,
    config: GradebookConfig,
    user: Option<i64>,
}

impl App {
    fn evaluations(&self) -> EvaluationService<SurrealHandle, SurrealHandle, SurrealHandle> {
        EvaluationService::new(
            self.handle.clone(),
            self.handle.clone(),
            self.handle.clone(),
            self.config,
        )
    }

    fn projects(&self) -> ProjectService<SurrealHandle, SurrealHandle> {
        ProjectService::new(self.handle.clone(), self.handle.clone())
    }

    fn criteria(&self) -> CriteriaService<SurrealHandle, SurrealHandle> {
        CriteriaService::new(self.handle.clone(), self.handle.clone())
    }

    fn defense(&self) -> DefenseService<SurrealHandle> {
        DefenseService::new(self.handle.clone())
    }

    fn acting_user(&self) -> Result<i64> {
        self.user
            .ok_or_else(|| anyhow!("this command needs the acting user: pass --as-user or set GRADEBOOK_USER_ID"))
    }

    fn page_size(&self, limit: Option<u32>) -> u32 {
        limit.unwrap_or(self.config.default_page_size)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value).map_err(GradebookError::from)?)
}

/// Map a failed command to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err
        .chain()
        .find_map(|cause| cause.downcast_ref::<GradebookError>())
    {
        Some(e) if e.is_not_found() => EXIT_NOT_FOUND,
        Some(_) => EXIT_REJECTED,
        None => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    gradebook_core::init_tracing(cli.json, level);

    match run(cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let handle = match &cli.db_url {
        Some(url) => SurrealHandle::connect_url(url).await,
        None => SurrealHandle::from_env().await,
    }
    .context("Failed to connect to Gradebook database")?;

    let config = GradebookConfig::from_env();
    let config = config.with_strict_criteria(config.strict_criteria || cli.strict_criteria);
    debug!(?config, "configuration loaded");

    let app = App {
        handle,
        config,
        user: cli.as_user,
    };
    execute(&app, cli.command).await
}

async fn execute(app: &App, command: Commands) -> Result<Value> {
    match command {
        Commands::Project { action } => cmd_project(app, action).await,
        Commands::Evaluate {
            project,
            participant,
            scores,
            comment,
        } => cmd_evaluate(app, project, participant, scores, comment).await,
        Commands::Evaluation { action } => cmd_evaluation(app, action).await,
        Commands::Results { project } => cmd_results(app, project).await,
        Commands::Criteria { action } => cmd_criteria(app, action).await,
        Commands::Defense { action } => cmd_defense(app, action).await,
    }
}

async fn cmd_project(app: &App, action: ProjectAction) -> Result<Value> {
    let service = app.projects();
    match action {
        ProjectAction::Create {
            name,
            author,
            description,
            project_type,
        } => {
            let project = service
                .create_project(NewProject {
                    name,
                    description,
                    author_id: author,
                    project_type_id: project_type,
                })
                .await?;
            to_json(&project)
        }
        ProjectAction::Show { id } => to_json(&service.get_project(id).await?),
        ProjectAction::AddParticipant {
            project,
            participant,
        } => to_json(&service.add_participant(project, participant).await?),
        ProjectAction::Participants { project } => to_json(&service.participants(project).await?),
    }
}

async fn cmd_evaluate(
    app: &App,
    project: i64,
    participant: i64,
    scores: Vec<(String, i64)>,
    comment: Option<String>,
) -> Result<Value> {
    let evaluator = app.acting_user()?;

    let form = EvaluationCreate {
        project_id: project,
        participant_id: participant,
        scores: scores.into_iter().collect::<Scores>(),
        comment,
    };
    let evaluation = app.evaluations().create_evaluation(form, evaluator).await?;
    to_json(&evaluation)
}

async fn cmd_evaluation(app: &App, action: EvaluationAction) -> Result<Value> {
    let service = app.evaluations();
    match action {
        EvaluationAction::Show { id } => {
            let evaluation = service
                .get_evaluation(id)
                .await?
                .ok_or_else(|| GradebookError::not_found("Evaluation", id))?;
            to_json(&evaluation)
        }
        EvaluationAction::List {
            project,
            participant: Some(participant),
        } => to_json(&service.participant_evaluations(project, participant).await?),
        EvaluationAction::List {
            project,
            participant: None,
        } => to_json(&service.project_evaluations(project).await?),
    }
}

async fn cmd_results(app: &App, project: i64) -> Result<Value> {
    to_json(&app.evaluations().results_for_project(project).await?)
}

async fn cmd_criteria(app: &App, action: CriteriaAction) -> Result<Value> {
    let service = app.criteria();
    match action {
        CriteriaAction::Add {
            project_type,
            name,
            max_score,
            weight,
            order,
            description,
        } => {
            let criterion = service
                .create_criterion(NewCriterion {
                    project_type_id: project_type,
                    name,
                    description,
                    max_score,
                    weight,
                    order_index: order,
                })
                .await?;
            to_json(&criterion)
        }
        CriteriaAction::Update {
            id,
            name,
            max_score,
            weight,
            order,
            description,
        } => {
            let update = CriterionUpdate {
                name,
                description,
                max_score,
                weight,
                order_index: order,
            };
            to_json(&service.update_criterion(id, update).await?)
        }
        CriteriaAction::List { project_type } => {
            to_json(&service.list_criteria(project_type).await?)
        }
        CriteriaAction::MaxScore { project_type } => Ok(json!({
            "project_type_id": project_type,
            "total_max_score": service.total_max_score(project_type).await?,
        })),
    }
}

async fn cmd_defense(app: &App, action: DefenseAction) -> Result<Value> {
    let service = app.defense();
    match action {
        DefenseAction::Types => to_json(&service.list_project_types().await?),
        DefenseAction::AddType { name, description } => {
            let project_type = service
                .create_project_type(NewProjectType { name, description })
                .await?;
            to_json(&project_type)
        }
        DefenseAction::Days { page, limit } => {
            to_json(&service.days_paginated(page, app.page_size(limit)).await?)
        }
        DefenseAction::Day { id } => to_json(&service.get_day(id).await?),
        DefenseAction::AddDay { date } => to_json(&service.create_day(date).await?),
        DefenseAction::Slots { filter } => {
            let page = service
                .available_slots_paginated(filter.page, app.page_size(filter.limit), filter.query())
                .await?;
            to_json(&page)
        }
        DefenseAction::Scheduled { filter } => {
            let page = service
                .scheduled_defenses_paginated(
                    filter.page,
                    app.page_size(filter.limit),
                    filter.query(),
                )
                .await?;
            to_json(&page)
        }
        DefenseAction::Slot { id } => to_json(&service.get_slot(id).await?),
        DefenseAction::AddSlot {
            day,
            index,
            project_type,
            title,
            start,
            end,
            location,
            capacity,
        } => {
            let slot = service
                .create_slot(NewDefenseSlot {
                    defense_day_id: day,
                    slot_index: index,
                    project_type_id: project_type,
                    title,
                    start_at: start,
                    end_at: end,
                    location,
                    capacity,
                })
                .await?;
            to_json(&slot)
        }
        DefenseAction::Register { slot } => {
            let user = app.acting_user()?;
            to_json(&service.register(user, slot).await?)
        }
        DefenseAction::Unregister { slot } => {
            let user = app.acting_user()?;
            service.unregister(user, slot).await?;
            Ok(json!({ "slot_id": slot, "user_id": user, "unregistered": true }))
        }
        DefenseAction::Mine => {
            let user = app.acting_user()?;
            to_json(&service.my_registrations(user).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn app(user: Option<i64>) -> App {
        App {
            handle: SurrealHandle::in_memory().await.unwrap(),
            config: GradebookConfig::default(),
            user,
        }
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gradebook").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    async fn exec(app: &App, args: &[&str]) -> Result<Value> {
        execute(app, parse(args).command).await
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("code=8"), Ok(("code".to_string(), 8)));
        assert_eq!(parse_score(" design = -2 "), Ok(("design".to_string(), -2)));
        assert!(parse_score("code").is_err());
        assert!(parse_score("=3").is_err());
        assert!(parse_score("code=high").is_err());
    }

    #[test]
    fn test_cli_parses_evaluate() {
        let cli = parse(&[
            "--as-user",
            "7",
            "evaluate",
            "--project",
            "1",
            "--participant",
            "2",
            "--score",
            "code=8",
            "--score",
            "design=7",
        ]);
        assert_eq!(cli.as_user, Some(7));
        match cli.command {
            Commands::Evaluate { scores, .. } => assert_eq!(scores.len(), 2),
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_cli_parses_slot_filters() {
        let cli = parse(&["defense", "slots", "--date", "2026-06-01", "--limit", "5"]);
        match cli.command {
            Commands::Defense {
                action: DefenseAction::Slots { filter },
            } => {
                assert_eq!(filter.page, 1);
                assert_eq!(filter.limit, Some(5));
                assert_eq!(filter.query().date, NaiveDate::from_ymd_opt(2026, 6, 1));
            }
            _ => panic!("expected defense slots"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        let result = Cli::try_parse_from(["gradebook", "defense", "add-day", "--date", "June 1st"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exit_codes() {
        let not_found = anyhow::Error::from(GradebookError::not_found("Project", 9999));
        assert_eq!(exit_code_for(&not_found), EXIT_NOT_FOUND);

        let rejected = anyhow::Error::from(GradebookError::Validation("bad".to_string()))
            .context("while evaluating");
        assert_eq!(exit_code_for(&rejected), EXIT_REJECTED);

        assert_eq!(exit_code_for(&anyhow!("connection refused")), 1);
    }

    #[tokio::test]
    async fn test_evaluate_then_results() {
        let app = app(Some(100)).await;

        let project = execute(
            &app,
            parse(&["project", "create", "--name", "Compiler", "--author", "1"]).command,
        )
        .await
        .unwrap();
        let project_id = project["id"].as_i64().unwrap().to_string();

        for scores in [["code=8", "design=7"], ["code=6", "design=6"]] {
            let evaluation = execute(
                &app,
                parse(&[
                    "evaluate",
                    "--project",
                    &project_id,
                    "--participant",
                    "10",
                    "--score",
                    scores[0],
                    "--score",
                    scores[1],
                ])
                .command,
            )
            .await
            .unwrap();
            assert_eq!(evaluation["evaluator_id"], 100);
        }

        let results = execute(&app, parse(&["results", &project_id]).command)
            .await
            .unwrap();
        assert_eq!(results["items"][0]["evaluations_count"], 2);
        assert_eq!(results["items"][0]["average_score"], 13.5);
    }

    #[tokio::test]
    async fn test_evaluate_requires_acting_user() {
        let app = app(None).await;
        let err = execute(
            &app,
            parse(&["evaluate", "--project", "1", "--participant", "2"]).command,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("--as-user"));
    }

    #[tokio::test]
    async fn test_missing_project_maps_to_not_found_exit() {
        let app = app(Some(100)).await;
        let err = execute(
            &app,
            parse(&[
                "evaluate",
                "--project",
                "9999",
                "--participant",
                "2",
                "--score",
                "code=1",
            ])
            .command,
        )
        .await
        .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_rejected() {
        let app = app(Some(100)).await;
        let project = exec(&app, &["project", "create", "--name", "Compiler", "--author", "1"])
            .await
            .unwrap();
        let project_id = project["id"].as_i64().unwrap().to_string();

        let err = exec(
            &app,
            &[
                "evaluate",
                "--project",
                &project_id,
                "--participant",
                "10",
                "--score",
                "a=9223372036854775807",
                "--score",
                "b=1",
            ],
        )
        .await
        .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_REJECTED);

        let stored = exec(&app, &["evaluation", "list", "--project", &project_id])
            .await
            .unwrap();
        assert_eq!(stored, json!([]));
    }

    #[tokio::test]
    async fn test_defense_registration_commands() {
        let app = app(Some(42)).await;

        let thesis = exec(&app, &["defense", "add-type", "--name", "thesis"])
            .await
            .unwrap();
        let day = exec(&app, &["defense", "add-day", "--date", "2026-06-01"])
            .await
            .unwrap();
        let day_id = day["id"].to_string();
        let type_id = thesis["id"].to_string();

        let slot = exec(
            &app,
            &[
                "defense",
                "add-slot",
                "--day",
                &day_id,
                "--index",
                "1",
                "--project-type",
                &type_id,
                "--title",
                "Thesis defense",
                "--start",
                "2026-06-01T09:00:00Z",
                "--end",
                "2026-06-01T09:30:00Z",
            ],
        )
        .await
        .unwrap();
        assert_eq!(slot["capacity"], 1);

        let slot_id = slot["id"].to_string();
        let registration = exec(&app, &["defense", "register", &slot_id]).await.unwrap();
        assert_eq!(registration["user_id"], 42);

        let mine = exec(&app, &["defense", "mine"]).await.unwrap();
        assert_eq!(mine[0]["title"], "Thesis defense");
        assert_eq!(mine[0]["defense_date"], "2026-06-01");

        let available = exec(&app, &["defense", "slots"]).await.unwrap();
        assert_eq!(available["total"], 0);

        let scheduled = exec(&app, &["defense", "scheduled"]).await.unwrap();
        assert_eq!(scheduled["items"][0]["registrations_count"], 1);

        let err = exec(&app, &["defense", "register", &slot_id])
            .await
            .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_REJECTED);
    }
}
