//! CodeDrill CLI
//!
//! Serves the practice-session HTTP API or runs a practice session in the terminal.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use drill_engine::report::report_input;
use drill_engine::{
    build_state, create_router, load_state, save_state, AppState, Config, Engine,
    SessionRequest, SessionState,
};
use drill_report::{json::JsonGenerator, MarkdownGenerator, ReportGenerator};
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Line that ends a review typed at the terminal.
const END_OF_REVIEW: &str = ".";

/// CodeDrill - Java code review practice
///
/// Generates Java code with deliberate errors and coaches you through
/// reviewing it until you find them all or run out of attempts.
#[derive(Parser, Debug)]
#[command(name = "drill")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: drill.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Practice in the terminal
    Run(RunArgs),

    /// Print a saved session
    Status {
        /// State file (default: stateFile from the configuration)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Error categories to sample from (comma separated)
    #[arg(long, value_delimiter = ',', required_unless_present = "resume")]
    categories: Vec<String>,

    /// Code length: short, medium or long
    #[arg(long, default_value = "medium")]
    length: String,

    /// Difficulty: easy, medium or hard
    #[arg(long, default_value = "medium")]
    difficulty: String,

    /// Domain of the generated program (random when omitted)
    #[arg(long)]
    domain: Option<String>,

    /// Minimum number of errors
    #[arg(long, default_value_t = 2)]
    min_errors: i64,

    /// Maximum number of errors
    #[arg(long, default_value_t = 4)]
    max_errors: i64,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Resume the session in the state file instead of starting fresh
    #[arg(long)]
    resume: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match load_config(args.config.as_deref()) {
        Ok(config) => match args.command {
            Command::Serve { host, port } => serve(config, &host, port).await,
            Command::Run(run_args) => run(config, run_args).await,
            Command::Status { file } => status(&config, file).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Runs the HTTP API until Ctrl+C.
async fn serve(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let services = drill_providers::from_config(&config)?;
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address {host}:{port}: {e}"))?;

    let router = create_router(AppState::new(&services, config));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("CodeDrill API running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(%addr, "HTTP server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        })
        .await?;
    Ok(())
}

/// Runs one practice session in the terminal.
async fn run(mut config: Config, args: RunArgs) -> anyhow::Result<()> {
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }
    config.validate()?;

    let services = drill_providers::from_config(&config)?;
    let engine = Engine::new(&services, &config);
    let state_path = PathBuf::from(&config.state_file);

    let mut state = load_or_create_state(&state_path, &args, &config).await?;

    if state.phase.is_generation() {
        println!("Generating code...");
        state = engine.run_generation(state).await;
        save_state(&state, &state_path).await?;
        if let Some(ref error) = state.error {
            anyhow::bail!("{error}");
        }
    }

    if let Some(ref snippet) = state.code_snippet {
        println!();
        println!("=== Review this code ({} problems) ===", state.original_error_count);
        println!("{}", snippet.clean_code);
    }

    let mut stdin = BufReader::new(tokio::io::stdin());
    while state.phase.accepts_review() {
        println!();
        println!(
            "Attempt {} of {}. Type your review, then a line with a single '{END_OF_REVIEW}':",
            state.current_iteration, state.max_iterations
        );

        let review = tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, saving session");
                save_state(&state, &state_path).await?;
                println!("Session saved to {}; continue with --resume", state_path.display());
                return Ok(());
            }
            review = read_review(&mut stdin) => review?,
        };
        let Some(review) = review else {
            save_state(&state, &state_path).await?;
            println!("Input closed; session saved to {}", state_path.display());
            return Ok(());
        };

        let reviewed = state.current_iteration;
        state = engine.run_review(state, &review).await;
        save_state(&state, &state_path).await?;

        if let Some(ref error) = state.error {
            println!("  {error}");
            continue;
        }
        print_attempt(&state, reviewed);
    }

    if state.is_complete() {
        print_summary(&state);
        generate_reports(&state, Path::new(&config.output_dir))?;
    }
    Ok(())
}

/// Prints a saved session.
async fn status(config: &Config, file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(|| PathBuf::from(&config.state_file));
    let Some(state) = load_state(&path).await? else {
        anyhow::bail!(
            "No session found at '{}'\n\nSuggestion: Start one with `drill run`",
            path.display()
        );
    };
    print_summary(&state);
    if let Some(ref error) = state.error {
        println!("Last error: {error}");
    }
    Ok(())
}

/// Loads the saved session when resuming, otherwise builds a new one.
async fn load_or_create_state(
    state_path: &Path,
    args: &RunArgs,
    config: &Config,
) -> anyhow::Result<SessionState> {
    if args.resume {
        let Some(state) = load_state(state_path).await? else {
            anyhow::bail!(
                "No session to resume at '{}'\n\nSuggestion: Run without --resume to start fresh",
                state_path.display()
            );
        };
        println!(
            "Resuming session {} (phase {}, attempt {})",
            state.id, state.phase, state.current_iteration
        );
        return Ok(state);
    }

    let request = SessionRequest {
        code_length: args.length.clone(),
        difficulty: args.difficulty.clone(),
        domain: args.domain.clone(),
        error_count_start: args.min_errors,
        error_count_end: args.max_errors,
        categories: args.categories.clone(),
        errors: Vec::new(),
        max_iterations: None,
        max_evaluation_attempts: None,
    };
    let state = build_state(&request, config)?;
    tracing::info!(session_id = %state.id, "Starting new session");
    Ok(state)
}

/// Reads lines until the end marker. Returns `None` at end of input with nothing typed.
async fn read_review(stdin: &mut BufReader<Stdin>) -> anyhow::Result<Option<String>> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if stdin.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == END_OF_REVIEW {
            return Ok(Some(lines.join("\n")));
        }
        lines.push(line.to_string());
    }
    Ok((!lines.is_empty()).then(|| lines.join("\n")))
}

/// Prints the outcome of one analyzed attempt.
fn print_attempt(state: &SessionState, iteration: u32) {
    let Some(attempt) = state.attempt(iteration) else {
        return;
    };
    if let Some(ref analysis) = attempt.analysis {
        println!(
            "  Found {} of {} problems ({:.1}%)",
            analysis.identified_count, analysis.total_problems, analysis.identified_percentage
        );
        if let Some(ref failure) = analysis.failure {
            println!("  Analysis unavailable: {failure}");
        }
    }
    if let Some(ref guidance) = attempt.guidance {
        println!("  Hint: {guidance}");
    }
}

/// Prints a summary of the session.
fn print_summary(state: &SessionState) {
    println!();
    println!("=== CodeDrill Summary ===");
    println!("Session: {}", state.id);
    println!("Phase: {}", state.phase);
    println!("Attempts: {} of {}", state.review_history.len(), state.max_iterations);
    if let Some(analysis) = state.latest_analysis() {
        println!(
            "Problems found: {} of {} ({:.1}%)",
            analysis.identified_count, analysis.total_problems, analysis.identified_percentage
        );
    }
    println!("Review sufficient: {}", if state.review_sufficient { "yes" } else { "no" });

    let elapsed = state.elapsed();
    println!(
        "Duration: {}m {}s",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    );

    if let Some(ref report) = state.comparison_report {
        println!();
        println!("{report}");
    }
}

/// Writes the Markdown and JSON reports for a completed session.
fn generate_reports(state: &SessionState, output_dir: &Path) -> anyhow::Result<()> {
    println!();
    println!("Generating reports...");

    let report = ReportGenerator::new(report_input(state)).generate();
    std::fs::create_dir_all(output_dir)?;

    let markdown = MarkdownGenerator::new(&report).generate();
    let md_path = output_dir.join("drill-report.md");
    std::fs::write(&md_path, markdown)?;
    println!("  Markdown report: {}", md_path.display());

    let json_path = output_dir.join("drill-report.json");
    JsonGenerator::new(&report).write_to_file(&json_path, true)?;
    println!("  JSON report: {}", json_path.display());

    Ok(())
}
