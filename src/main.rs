use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use grading_queue::queue::keys::{MemberKey, SlotOwner};
use grading_queue::store::RedisStore;
use grading_queue::{Collation, GradingJob, GradingJobConfig, GradingQueue, QueueConfig};

#[derive(Parser, Debug)]
#[command(name = "grading-queue")]
#[command(version)]
#[command(about = "Operator CLI for the grading job queue")]
struct Args {
    /// Redis URL of the shared store
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum CollationKind {
    User,
    Team,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List the queue in ascending release order
    List,

    /// Enqueue a deferred job from a JSON config file
    Enqueue {
        /// Path to a GradingJobConfig JSON file
        config: PathBuf,
    },

    /// Reprioritize a queued job
    Move {
        /// The job's queue-member key (e.g. "user.7.1662660903246")
        member: String,
        /// New release timestamp, Unix epoch seconds
        release_at: i64,
    },

    /// Withdraw a queued job
    Delete {
        /// The job's queue-member key
        member: String,
    },

    /// Admit an immediate job for a collation
    Admit {
        kind: CollationKind,
        id: String,
    },

    /// Release one immediate slot for a collation
    Release {
        kind: CollationKind,
        id: String,
    },

    /// Show current immediate-slot occupancy
    Occupancy,

    /// Physically remove expired reservations
    Purge,
}

fn collation_from(kind: CollationKind, id: String) -> Collation {
    match kind {
        CollationKind::User => Collation::User(id),
        CollationKind::Team => Collation::Team(id),
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

fn print_jobs(jobs: &[GradingJob], output: &OutputFormat) -> Result<(), serde_json::Error> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(jobs)?);
        }
        OutputFormat::Table => {
            if jobs.is_empty() {
                println!("Queue is empty.");
                return Ok(());
            }
            println!(
                "{:<24} {:<12} {:<16} NONCE",
                "SUBMISSION ID", "RELEASE AT", "COLLATION"
            );
            println!("{}", "-".repeat(70));
            for job in jobs {
                let collation = job
                    .config
                    .collation
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let id_display = if job.config.submission_id.len() > 22 {
                    format!("{}...", &job.config.submission_id[..19])
                } else {
                    job.config.submission_id.clone()
                };
                println!(
                    "{:<24} {:<12} {:<16} {}",
                    id_display, job.release_at, collation, job.nonce
                );
            }
            println!();
            println!("{} job(s) queued", jobs.len());
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let store = RedisStore::connect(&args.redis_url).await?;
    let queue = GradingQueue::new(Arc::new(store), QueueConfig::default());

    match args.command {
        Commands::List => {
            let jobs = queue.list().await?;
            print_jobs(&jobs, &args.output)?;
        }
        Commands::Enqueue { config } => {
            let raw = tokio::fs::read_to_string(&config).await?;
            let job: GradingJobConfig = serde_json::from_str(&raw)?;
            let outcome = queue.enqueue(&job).await?;
            println!("{}: {}", job.submission_id, outcome);
        }
        Commands::Move { member, release_at } => {
            queue.move_job(&member, release_at).await?;
            println!("Moved {} to release at {}", member, release_at);
        }
        Commands::Delete { member } => {
            let key = MemberKey::parse(&member)?;
            let collation = match key.owner {
                SlotOwner::Collation(collation) => Some(collation),
                SlotOwner::Submission(_) => None,
            };
            queue.delete(&member, collation.as_ref()).await?;
            println!("Deleted {}", member);
        }
        Commands::Admit { kind, id } => {
            let collation = collation_from(kind, id);
            let nonce = queue.admit_immediate(&collation).await?;
            println!("Admitted {} with nonce {}", collation, nonce);
        }
        Commands::Release { kind, id } => {
            let collation = collation_from(kind, id);
            queue.release_immediate(&collation).await?;
            println!("Released one slot for {}", collation);
        }
        Commands::Occupancy => {
            let occupied = queue.immediate_occupancy().await?;
            println!(
                "{} of {} immediate slot(s) occupied",
                occupied,
                queue.config().immediate_capacity
            );
        }
        Commands::Purge => {
            let purged = queue.purge_expired_reservations().await?;
            println!("Purged {} expired reservation(s)", purged);
        }
    }

    Ok(())
}
