use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use sinkctl::{Config, Connection, Sink, SinkId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sinkctl")]
#[command(about = "Inspect and adjust PulseAudio sink volume and mute state", long_about = None)]
struct Cli {
    #[arg(short, long)]
    verbose: bool,
    #[arg(long, env = "SINKCTL_CONFIG")]
    config: Option<String>,
    /// PulseAudio server string, e.g. tcp:host:4713
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    client_name: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List sinks, marking the default one with '*'
    List,
    /// Show one sink by index or name
    Get { sink: String },
    /// Show the default sink
    Default,
    SetVolume(SetVolumeOpts),
    Raise(StepOpts),
    Lower(StepOpts),
    Mute(TargetOpts),
    Unmute(TargetOpts),
    ToggleMute(TargetOpts),
    /// Print the effective configuration
    Config,
    Completions { shell: Shell },
}

#[derive(clap::Args, Debug)]
struct TargetOpts {
    /// Sink index or name; the default sink when omitted
    #[arg(long)]
    sink: Option<String>,
}

#[derive(clap::Args, Debug)]
struct SetVolumeOpts {
    #[arg(long)]
    sink: Option<String>,
    /// Percentage of full scale; negative values mean 0
    #[arg(allow_negative_numbers = true)]
    percent: i32,
}

#[derive(clap::Args, Debug)]
struct StepOpts {
    #[arg(long)]
    sink: Option<String>,
    /// Percentage points, defaults to the configured step
    step: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(PathBuf::from(shellexpand::tilde(path).into_owned())),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(server) = cli.server {
        config.client.server = Some(server);
    }
    if let Some(name) = cli.client_name {
        config.client.name = name;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.client.timeout_ms = timeout_ms;
    }

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml().context("Failed to serialize configuration")?);
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "sinkctl", &mut std::io::stdout());
            Ok(())
        }
        command => {
            let connection = Connection::open(&config)
                .await
                .context("Failed to connect to PulseAudio")?;
            run(&connection, &config, command).await
        }
    }
}

async fn run(connection: &Connection, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            let default_name = match connection.get_default_sink().await {
                Ok(sink) => Some(sink.name),
                Err(e) => {
                    tracing::debug!("No default sink: {}", e);
                    None
                }
            };
            let sinks = connection.list_sinks().await?;
            if sinks.is_empty() {
                println!("No sinks found.");
            }
            for sink in &sinks {
                print_sink(sink, default_name.as_deref() == Some(sink.name.as_str()));
            }
        }
        Commands::Get { sink } => {
            let sink = connection.get_sink(&SinkId::parse(&sink)).await?;
            print_sink(&sink, false);
        }
        Commands::Default => {
            let sink = connection.get_default_sink().await?;
            print_sink(&sink, true);
        }
        Commands::SetVolume(opts) => {
            let mut sink = target(connection, opts.sink.as_deref()).await?;
            connection.set_sink_volume(&mut sink, opts.percent).await?;
            print_sink(&sink, false);
        }
        Commands::Raise(opts) => {
            let mut sink = target(connection, opts.sink.as_deref()).await?;
            let percent = config.volume.raised(sink.volume_percent, opts.step);
            connection.set_sink_volume(&mut sink, percent).await?;
            print_sink(&sink, false);
        }
        Commands::Lower(opts) => {
            let mut sink = target(connection, opts.sink.as_deref()).await?;
            let percent = config.volume.lowered(sink.volume_percent, opts.step);
            connection.set_sink_volume(&mut sink, percent).await?;
            print_sink(&sink, false);
        }
        Commands::Mute(opts) => set_mute(connection, opts.sink.as_deref(), Some(true)).await?,
        Commands::Unmute(opts) => set_mute(connection, opts.sink.as_deref(), Some(false)).await?,
        Commands::ToggleMute(opts) => set_mute(connection, opts.sink.as_deref(), None).await?,
        Commands::Config | Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn target(connection: &Connection, sink: Option<&str>) -> Result<Sink> {
    let sink = match sink {
        Some(id) => connection.get_sink(&SinkId::parse(id)).await,
        None => connection.get_default_sink().await,
    };
    Ok(sink?)
}

/// `None` toggles.
async fn set_mute(connection: &Connection, sink: Option<&str>, mute: Option<bool>) -> Result<()> {
    let mut sink = target(connection, sink).await?;
    let mute = mute.unwrap_or(!sink.mute);
    connection.set_sink_mute(&sink, mute).await?;
    sink.mute = mute;
    print_sink(&sink, false);
    Ok(())
}

fn print_sink(sink: &Sink, is_default: bool) {
    println!(
        "{} {:>3}  {:>3}%{}  {}  ({})",
        if is_default { '*' } else { ' ' },
        sink.index,
        sink.volume_percent,
        if sink.mute { " muted" } else { "" },
        sink.name,
        sink.description
    );
}
