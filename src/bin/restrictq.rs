//! restrictq CLI: run workers, enqueue jobs, inspect and clear locks.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use restrictq::config::{Config, parse_queues};
use restrictq::db::Db;
use restrictq::handler::{FnHandler, HandlerFuture, HandlerRegistry, HandlerResult};
use restrictq::keys::lock_key;
use restrictq::lock::{force_unlock, lock_holder};
use restrictq::model::{Arg, JobDescriptor};
use restrictq::reserve::LOOKAHEAD;
use restrictq::source::{BasicSource, RestrictedSource, enqueue};
use restrictq::store::Store;
use restrictq::telemetry::{TelemetryConfig, init_telemetry};
use restrictq::worker::Worker;
use secrecy::ExposeSecret;
use tracing::info;

#[derive(Parser)]
#[command(name = "restrictq", about = "Restricted performer job queues")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a worker with the built-in handlers
    Work {
        /// Comma-separated queues, highest priority first (overrides RESTRICTQ_QUEUES)
        #[arg(long)]
        queues: Option<String>,
    },
    /// Push a job onto a queue
    Enqueue {
        queue: String,
        /// Handler class
        class: String,
        /// Arguments; each is parsed as JSON if possible, else taken as a string
        args: Vec<String>,
    },
    /// Show the head of a queue and which entries are locked
    Peek {
        queue: String,
        #[arg(long, default_value_t = LOOKAHEAD)]
        count: u64,
    },
    /// List held locks
    Locks,
    /// Remove a leaked lock
    Unlock {
        /// Raw lock name, instead of deriving it from class and args
        #[arg(long, conflicts_with_all = ["class", "args"])]
        name: Option<String>,
        class: Option<String>,
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "restrictq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let db = Arc::new(db);
    let registry = Arc::new(builtin_registry());

    match cli.command {
        Command::Work { queues } => cmd_work(db, registry, config, queues).await,
        Command::Enqueue {
            queue,
            class,
            args,
        } => {
            // An unregistered class at the head of a queue stalls reservation.
            if !registry.contains(&class) {
                anyhow::bail!(
                    "no handler registered for {class} (known: {})",
                    registry.classes().join(", ")
                );
            }
            let descriptor = descriptor(class, &args);
            enqueue(&*db, &queue, &descriptor).await?;
            println!("Enqueued {} on {queue}", descriptor.to_payload()?);
            Ok(())
        }
        Command::Peek { queue, count } => cmd_peek(&db, &registry, &queue, count).await,
        Command::Locks => cmd_locks(&db).await,
        Command::Unlock { name, class, args } => {
            cmd_unlock(&db, &registry, name, class, args).await
        }
    }
}

async fn cmd_work(
    db: Arc<Db>,
    registry: Arc<HandlerRegistry>,
    config: Config,
    queues: Option<String>,
) -> anyhow::Result<()> {
    let mut worker_config = config.worker();
    if let Some(raw) = queues {
        worker_config.queues = parse_queues(&raw)?;
    }

    let classes = registry.classes().join(", ");
    let source = RestrictedSource::over(BasicSource::new(db, registry));
    let worker = Worker::new(Arc::new(source), worker_config);
    info!(worker.id = %worker.id(), %classes, "handlers registered");

    let w = worker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("ctrl-c received, finishing current job");
        w.shutdown();
    });

    worker.run().await?;
    Ok(())
}

async fn cmd_peek(
    db: &Db,
    registry: &HandlerRegistry,
    queue: &str,
    count: u64,
) -> anyhow::Result<()> {
    let entries = db.peek(queue, 0, count).await?;
    if entries.is_empty() {
        println!("Queue {queue} is empty.");
        return Ok(());
    }

    println!("{:<4}  {:<12}  PAYLOAD", "POS", "LOCKED BY");
    println!("{}", "-".repeat(80));
    for (pos, payload) in entries.iter().enumerate() {
        let holder = match JobDescriptor::from_payload(payload) {
            Ok(desc) => match lock_holder(db, registry, &desc).await {
                Ok(holder) => holder.unwrap_or_else(|| "-".to_string()),
                Err(_) => "?".to_string(),
            },
            Err(_) => "!".to_string(),
        };
        println!("{pos:<4}  {holder:<12}  {payload}");
    }
    println!("\n{} of {} entries", entries.len(), db.len(queue).await?);
    Ok(())
}

async fn cmd_locks(db: &Db) -> anyhow::Result<()> {
    let locks = db.held_locks().await?;
    if locks.is_empty() {
        println!("No locks held.");
        return Ok(());
    }
    println!("{:<50}  QUEUE", "LOCK");
    println!("{}", "-".repeat(70));
    for (key, queue) in &locks {
        println!("{key:<50}  {queue}");
    }
    println!("\n{} lock(s)", locks.len());
    Ok(())
}

async fn cmd_unlock(
    db: &Db,
    registry: &HandlerRegistry,
    name: Option<String>,
    class: Option<String>,
    args: Vec<String>,
) -> anyhow::Result<()> {
    let removed = match (name, class) {
        (Some(name), _) => db.del(&lock_key(&name)).await?,
        (None, Some(class)) => force_unlock(db, registry, &descriptor(class, &args)).await?,
        (None, None) => anyhow::bail!("give either --name or a class"),
    };
    if removed {
        println!("Lock removed.");
    } else {
        println!("No such lock.");
    }
    Ok(())
}

fn descriptor(class: String, args: &[String]) -> JobDescriptor {
    args.iter().fold(JobDescriptor::new(class), |desc, raw| {
        desc.arg(serde_json::from_str::<Arg>(raw).unwrap_or_else(|_| Arg::from(raw.as_str())))
    })
}

/// Handlers available to `restrictq work`.
///
/// `Echo` logs its arguments. `Sleep` sleeps for its first argument in
/// milliseconds and locks on the class alone, so only one sleeper runs at a
/// time across all workers.
fn builtin_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(FnHandler::new("Echo", echo))
        .register(FnHandler::new("Sleep", sleep).with_lock_name(|_| "Sleep".to_string()));
    registry
}

fn echo(args: Vec<Arg>) -> HandlerFuture {
    Box::pin(run_echo(args))
}

async fn run_echo(args: Vec<Arg>) -> HandlerResult {
    info!(?args, "echo");
    Ok(())
}

fn sleep(args: Vec<Arg>) -> HandlerFuture {
    Box::pin(run_sleep(args))
}

async fn run_sleep(args: Vec<Arg>) -> HandlerResult {
    let ms = match args.first() {
        Some(Arg::Int(ms)) if *ms >= 0 => *ms as u64,
        other => {
            return Err(format!("Sleep needs a non-negative millisecond count, got {other:?}").into());
        }
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(())
}
