use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use testflow::db;
use testflow::jobs::{JobStatus, PgJobStore, QueueCoordinator, QueueOptions};

/// Administrative commands against the job queue database.
#[derive(Parser, Debug)]
#[command(name = "testflowctl")]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Apply pending migrations before running the command
    #[arg(long, default_value_t = false)]
    migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete every job, whatever its status
    Reset,
    /// Queue N jobs alternating between full-suite and login runs
    Seed {
        #[arg(default_value_t = 10)]
        n: u32,
    },
    /// Queue one job
    Enqueue {
        #[arg(long = "type")]
        job_type: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        test_filter: Option<String>,
    },
    /// Claim the next pending job, as a worker would
    Claim,
    /// Set a job's status
    SetStatus { id: Uuid, status: String },
    /// Show job totals per status
    Counts,
    /// List the most recent jobs
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Reset, seed five jobs, claim one and print the totals
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let pool = db::make_pool(&cli.database_url).await?;
    if cli.migrate {
        db::run_migrations(&pool).await?;
    }
    let queue = QueueCoordinator::new(Arc::new(PgJobStore::new(pool)), QueueOptions::default());

    match cli.command {
        Command::Reset => reset(&queue).await?,
        Command::Seed { n } => seed(&queue, n).await?,
        Command::Enqueue {
            job_type,
            project_id,
            test_filter,
        } => {
            let job = queue
                .enqueue(
                    job_type.as_deref(),
                    project_id.as_deref(),
                    test_filter.as_deref(),
                )
                .await?;
            println!("+ queued {} id={}", job.job_type, job.id);
        }
        Command::Claim => claim(&queue).await?,
        Command::SetStatus { id, status } => {
            let status: JobStatus = status.parse()?;
            queue.update_status(id, status, None).await?;
            println!("job {id} -> {status}");
        }
        Command::Counts => show_counts(&queue).await?,
        Command::List { status, limit } => {
            let status = status.map(|s| s.parse::<JobStatus>()).transpose()?;
            for job in queue.list_jobs(status, limit).await? {
                println!(
                    "{}  {:<10}  {:<12}  created={}",
                    job.id,
                    job.status.as_str(),
                    job.job_type,
                    job.created_at.to_rfc3339()
                );
            }
        }
        Command::Demo => {
            reset(&queue).await?;
            seed(&queue, 5).await?;
            claim(&queue).await?;
            show_counts(&queue).await?;
        }
    }

    Ok(())
}

async fn reset(queue: &QueueCoordinator) -> anyhow::Result<()> {
    let n = queue.clear().await?;
    println!("reset OK ({n} jobs deleted)");
    Ok(())
}

async fn seed(queue: &QueueCoordinator, n: u32) -> anyhow::Result<()> {
    for i in 0..n {
        let job_type = if i % 2 == 0 { "FullSuite" } else { "LoginTest" };
        let job = queue.enqueue(Some(job_type), None, None).await?;
        println!("+ queued {job_type} id={}", job.id);
    }
    Ok(())
}

async fn claim(queue: &QueueCoordinator) -> anyhow::Result<()> {
    match queue.claim_next().await? {
        Some(job) => println!("claimed {} type={}", job.id, job.job_type),
        None => println!("no jobs pending"),
    }
    Ok(())
}

async fn show_counts(queue: &QueueCoordinator) -> anyhow::Result<()> {
    let c = queue.counts().await?;
    println!(
        "jobs: total={} pending={} processing={} completed={} failed={}",
        c.total(),
        c.pending,
        c.processing,
        c.completed,
        c.failed
    );
    Ok(())
}
