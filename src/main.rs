use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use led::container::Container;
use led::executor::{CommandExecutor, ShellExecutor};
use led::fleet::DockerClient;
use led::host::host_stats;
use led::image::ImageSpec;
use led::pipeline::{ContainerCreator, CreateOptions, Phase};
use led::poller::DEFAULT_POLL_INTERVAL;
use led::spec::{ContainerSpec, ContainerSpecInput};
use led::tasks::TaskError;

#[derive(Parser)]
#[command(name = "led", about = "Disposable Elasticsearch and Kibana containers")]
struct Cli {
    /// Stream command output and log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision a container from a JSON config and wait until it's ready.
    Create {
        #[arg(short, long)]
        config: PathBuf,
        /// Empty the volume dir before creating the container.
        #[arg(long)]
        clear_volume_dir: bool,
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
        poll_interval_ms: u64,
        /// Give up on each readiness wait after this long. Waits forever if unset.
        #[arg(long)]
        ready_timeout_secs: Option<u64>,
    },
    /// Build a base image.
    Image {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        es_version: String,
        #[arg(short, long)]
        kibana: bool,
    },
    /// List managed containers.
    Ls,
    /// List managed images.
    Images,
    /// Print cluster health (and kibana status) of a managed container.
    Health { name: String },
    /// Run a command inside a managed container.
    Exec {
        name: String,
        #[arg(trailing_var_arg = true, required = true)]
        cmd: Vec<String>,
    },
    Restart { name: String },
    StartAll,
    StopAll,
    RmAll,
    RmiAll,
    RmiDangling,
    /// Host memory and cpu summary.
    Host,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Logs start and end of one phase as they happen.
fn watch_phase<T>(label: &'static str, task: &Phase<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let started = task.on_start();
    let ended = task.on_end();
    tokio::spawn(async move {
        if started.await.is_err() {
            return;
        }
        info!("{label}...");
        match ended.await {
            Ok(_) => info!("{label} done"),
            Err(TaskError::Failed(err)) => error!("{label} failed: {err}"),
            Err(TaskError::Abandoned) => warn!("{label} abandoned"),
        }
    });
}

async fn create(
    config: PathBuf,
    opts: CreateOptions,
    executor: Arc<dyn CommandExecutor>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&config)
        .await
        .with_context(|| format!("reading {}", config.display()))?;
    let input: ContainerSpecInput = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", config.display()))?;
    let spec = ContainerSpec::new(input).context("invalid container config")?;

    let cancel = opts.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let tasks = ContainerCreator::new(spec, opts, executor).create();
    watch_phase("checking image", &tasks.image_check);
    watch_phase("preparing volume", &tasks.volume_rm);
    watch_phase("removing old container", &tasks.container_rm);
    watch_phase("creating container", &tasks.container_mk);
    watch_phase("starting container", &tasks.container_start);
    watch_phase("waiting for elastic", &tasks.elastic_ready);
    watch_phase("waiting for kibana", &tasks.kibana_ready);
    watch_phase("uploading saved objects", &tasks.kso_upload);
    watch_phase("uploading scripts", &tasks.scripts_upload);
    watch_phase("uploading index settings", &tasks.sm_upload);

    let container = tasks.main.on_end().await.map_err(|err| anyhow!("{err}"))?;
    println!("{} is up on port {}", container.name(), container.port());
    Ok(())
}

async fn find(name: &str, executor: Arc<dyn CommandExecutor>) -> Result<Container> {
    let docker = DockerClient::connect()?;
    Container::fetch_all(&docker, executor)
        .await?
        .into_iter()
        .find(|container| container.name() == name)
        .ok_or_else(|| anyhow!("no managed container named {name}"))
}

fn print_names(verb: &str, names: Vec<String>) {
    if names.is_empty() {
        println!("no managed objects matched");
    }
    for name in names {
        println!("{verb}: {name}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let verbose = cli.verbose;
    let executor: Arc<dyn CommandExecutor> = Arc::new(ShellExecutor::new());

    match cli.command {
        Command::Create {
            config,
            clear_volume_dir,
            poll_interval_ms,
            ready_timeout_secs,
        } => {
            let opts = CreateOptions {
                clear_volume_dir,
                verbose,
                poll_interval: Duration::from_millis(poll_interval_ms),
                ready_deadline: ready_timeout_secs.map(Duration::from_secs),
                cancel: CancellationToken::new(),
            };
            create(config, opts, executor).await?;
        }
        Command::Image {
            name,
            es_version,
            kibana,
        } => {
            ImageSpec::new(&name, &es_version, kibana)?
                .build(executor.as_ref(), verbose)
                .await?;
        }
        Command::Ls => {
            for row in DockerClient::connect()?.containers().await? {
                println!("{}\t{}\t{}\t{}", row.name, row.status, row.created, row.image);
            }
        }
        Command::Images => {
            for row in DockerClient::connect()?.images().await? {
                println!("{}\t{}\t{}\t{}", row.repository, row.id, row.created, row.size);
            }
        }
        Command::Health { name } => {
            let container = find(&name, executor).await?;
            match container.cluster_health(verbose).await {
                Some(health) => println!("{}", serde_json::to_string_pretty(&health)?),
                None => println!("{name}: elastic unreachable"),
            }
            if container.kibana() {
                match container.kibana_status(verbose).await {
                    Some(code) => println!("{name}: kibana answered {code}"),
                    None => println!("{name}: kibana unreachable"),
                }
            }
        }
        Command::Exec { name, cmd } => {
            let container = find(&name, executor).await?;
            print!("{}", container.exec(&cmd.join(" "), verbose).await?);
        }
        Command::Restart { name } => {
            find(&name, executor).await?.restart(verbose).await?;
        }
        Command::StartAll => print_names("started", DockerClient::connect()?.start_all().await?),
        Command::StopAll => print_names("stopped", DockerClient::connect()?.stop_all().await?),
        Command::RmAll => print_names("removed", DockerClient::connect()?.remove_all().await?),
        Command::RmiAll => {
            print_names("removed", DockerClient::connect()?.remove_images().await?)
        }
        Command::RmiDangling => print_names(
            "removed",
            DockerClient::connect()?.remove_dangling_images().await?,
        ),
        Command::Host => println!("{}", serde_json::to_string_pretty(&host_stats())?),
    }

    Ok(())
}
