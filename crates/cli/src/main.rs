//! CLI for planning and applying Juju model access grants.
//!
//! Drives the resource engine against a controller snapshot file, keeping the
//! resource state in a separate JSON state file between invocations.

use clap::{Parser, Subcommand};
use juju_access_core::{AccessModelConfig, GrantState};
use juju_access_provider::{ControllerClient, MemoryController, RetryPolicy, Retrying};
use juju_access_resource::reporter::{render_plan, render_state};
use juju_access_resource::sink::json_stream::JsonStreamSink;
use juju_access_resource::Engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "juju-access", version, about = "Manage model access grants on a Juju controller")]
struct Cli {
    /// Controller snapshot file.
    #[arg(long, env = "JUJU_ACCESS_CONTROLLER", default_value = "controller.json")]
    controller: PathBuf,

    /// Resource state file.
    #[arg(long, env = "JUJU_ACCESS_STATE", default_value = "access-state.json")]
    state: PathBuf,

    /// Retries for transient controller failures.
    #[arg(long, env = "JUJU_ACCESS_RETRIES", default_value_t = 3)]
    retries: u32,

    /// Resource name used in plan output.
    #[arg(long, default_value = "this")]
    name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a model on the controller.
    CreateModel { name: String },

    /// Destroy a model on the controller.
    DestroyModel { name: String },

    /// Create a user on the controller.
    CreateUser {
        name: String,

        #[arg(long, env = "JUJU_ACCESS_USER_PASSWORD")]
        password: String,
    },

    /// Destroy a user on the controller.
    DestroyUser { name: String },

    /// Show what apply would change.
    Plan {
        /// JSON file with `access`, `model`, and `users`.
        #[arg(short, long)]
        config: PathBuf,

        /// Emit NDJSON rows instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Grant access as declared in the configuration.
    Apply {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Revoke the managed grant.
    Destroy,

    /// Adopt an existing grant by `model:access:user`.
    Import { id: String },

    /// Import into a scratch state and compare with the managed state.
    VerifyImport { id: String },

    /// Refresh and print the managed grant.
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let controller = Arc::new(MemoryController::load(&cli.controller)?);
    let client = Retrying::new(
        controller.clone(),
        RetryPolicy::default().with_max_retries(cli.retries),
    );
    let mut engine = Engine::new(Arc::new(client)).with_state(load_state(&cli.state)?);

    tracing::debug!(
        controller = %cli.controller.display(),
        state = %cli.state.display(),
        retries = cli.retries,
        "starting"
    );

    let result = run(&cli, &*controller, &mut engine).await;

    // Persist whatever happened, including partial progress on failure.
    controller.save(&cli.controller)?;
    save_state(&cli.state, engine.state())?;

    result
}

async fn run(
    cli: &Cli,
    controller: &MemoryController,
    engine: &mut Engine,
) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::CreateModel { name } => {
            controller.create_model(name).await?;
            println!("Model {name:?} created.");
        }
        Commands::DestroyModel { name } => {
            controller.destroy_model(name).await?;
            println!("Model {name:?} destroyed.");
        }
        Commands::CreateUser { name, password } => {
            controller.create_user(name, password).await?;
            println!("User {name:?} created.");
        }
        Commands::DestroyUser { name } => {
            controller.destroy_user(name).await?;
            println!("User {name:?} destroyed.");
        }
        Commands::Plan { config, json } => {
            let config = load_config(config)?;
            let plan = engine.plan(&config).await?;
            if *json {
                let resource = format!("juju_access_model.{}", cli.name);
                let id = config.validate()?.id();
                let (summary, ops) = plan.to_rows(&resource, &id);
                let mut sink = JsonStreamSink::stdout();
                sink.write_plan(&summary)?;
                sink.write_operations(&ops)?;
                let n = sink.finish()?;
                tracing::debug!(rows = n, "ndjson plan written");
            } else {
                print!("{}", render_plan(&cli.name, &plan));
            }
        }
        Commands::Apply { config } => {
            let config = load_config(config)?;
            let outcome = engine.apply(&config).await?;
            print!("{}", render_plan(&cli.name, &outcome.plan));
            println!(
                "\nApply complete! Resource {}: {}.",
                outcome.state.id,
                outcome.plan.action.as_str()
            );
        }
        Commands::Destroy => {
            engine.destroy().await?;
            println!("Destroy complete!");
        }
        Commands::Import { id } => {
            let state = engine.import(id).await?;
            println!("Import successful!\n");
            print!("{}", render_state(&cli.name, &state));
        }
        Commands::VerifyImport { id } => {
            engine.import_verify(id).await?;
            println!("Imported attributes match the managed state.");
        }
        Commands::Show => match engine.refresh().await? {
            Some(state) => print!("{}", render_state(&cli.name, state)),
            None => println!("No grant is managed."),
        },
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<AccessModelConfig, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn load_state(path: &Path) -> Result<Option<GrantState>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn save_state(path: &Path, state: Option<&GrantState>) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, serde_json::to_string_pretty(&state)?)?;
    Ok(())
}
