use anyhow::Context;
use clap::{Parser, Subcommand};
use cpu_pulse::config::{parse_interval, Config, OutputFormat};
use cpu_pulse::monitor::{read_counters, CpuMonitor, SampleHub, Sampler, UsageResult};
use cpu_pulse::net::{Emitter, Feed, Listener};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cpu-pulse")]
#[command(about = "Sample per-core CPU utilization and stream it over UDP", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Counter source (defaults to /proc/stat)
    #[arg(long, global = true)]
    stat_path: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print utilization locally once per interval
    Watch {
        /// Sampling interval (e.g., 500ms, 1s)
        #[arg(short, long)]
        interval: Option<String>,

        /// Output format: text or json
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Send utilization datagrams to a listener
    Emit {
        /// Destination host:port
        #[arg(short, long)]
        dest: Option<SocketAddr>,

        /// Send interval (e.g., 500ms, 1s)
        #[arg(short, long)]
        interval: Option<String>,

        /// Also print locally, sharing one sampling loop with the emitter
        #[arg(long)]
        display: bool,
    },
    /// Receive and print datagrams
    Listen {
        /// Address to bind
        #[arg(short, long, default_value = "127.0.0.1:1234")]
        bind: SocketAddr,
    },
    /// Show system information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cpu_pulse::logging::init_tracing(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(stat_path) = cli.stat_path {
        config.stat_path = stat_path;
    }

    match cli.command {
        Commands::Watch { interval, format } => {
            if let Some(interval) = interval {
                config.interval = parse_interval(&interval)?;
            }
            if let Some(format) = format {
                config.format = format.parse()?;
            }
            watch(config).await?;
        }
        Commands::Emit {
            dest,
            interval,
            display,
        } => {
            if let Some(dest) = dest {
                config.destination = dest;
            }
            if let Some(interval) = interval {
                config.interval = parse_interval(&interval)?;
            }
            if display {
                emit_with_display(config).await?;
            } else {
                emit(config).await?;
            }
        }
        Commands::Listen { bind } => {
            listen(bind).await?;
        }
        Commands::Info => {
            show_system_info(&config)?;
        }
    }

    Ok(())
}

fn print_usage(result: &UsageResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            let mut line = format!("Total: {:6.2}%", result.total_usage);
            for (i, usage) in result.per_core_usage.iter().enumerate() {
                line.push_str(&format!("  CPU{}: {:6.2}%", i, usage));
            }
            println!("{}", line);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(result)?),
    }
    Ok(())
}

async fn watch(config: Config) -> anyhow::Result<()> {
    let mut monitor = CpuMonitor::new(&config.stat_path);
    match monitor.initialize() {
        Ok(cores) => info!(cores, "watching CPU usage"),
        Err(err) => warn!(error = %err, "no baseline snapshot, first sample will be empty"),
    }

    let sampler = monitor.sampler();
    let mut ticker = tokio::time::interval(config.interval);
    ticker.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let sampler = Arc::clone(&sampler);
                match tokio::task::spawn_blocking(move || sampler.sample()).await? {
                    Ok(result) => print_usage(&result, config.format)?,
                    Err(err @ cpu_pulse::MonitorError::AllocationFailure { .. }) => {
                        return Err(err.into())
                    }
                    Err(err) => warn!(error = %err, "no data this tick"),
                }
            }
        }
    }

    monitor.teardown();
    Ok(())
}

async fn emit(config: Config) -> anyhow::Result<()> {
    let mut monitor = CpuMonitor::with_emit_period(&config.stat_path, config.interval);
    match monitor.initialize() {
        Ok(cores) => info!(cores, "detected cores"),
        Err(err) => warn!(error = %err, "no baseline snapshot, first datagram will be empty"),
    }

    monitor
        .start_emitter(config.destination)
        .context("Failed to start emitter")?;
    println!("Sending CPU usage to {}", config.destination);

    tokio::signal::ctrl_c().await?;

    tokio::task::spawn_blocking(move || monitor.teardown()).await?;
    Ok(())
}

async fn emit_with_display(config: Config) -> anyhow::Result<()> {
    let sampler = Sampler::new(&config.stat_path);
    let hub = SampleHub::start(sampler, config.interval).context("Failed to start sampling")?;

    let mut emitter = Emitter::new();
    emitter
        .start(Feed::Subscription(hub.subscribe()), config.destination)
        .context("Failed to start emitter")?;
    println!("Sending CPU usage to {}", config.destination);

    let display = hub.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let rx = display.clone();
        let next = tokio::task::spawn_blocking(move || rx.recv());
        tokio::select! {
            _ = &mut shutdown => break,
            received = next => match received? {
                Ok(result) => print_usage(&result, config.format)?,
                Err(_) => {
                    warn!("sampling loop ended");
                    break;
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || {
        hub.stop();
        emitter.stop();
    })
    .await?;
    Ok(())
}

async fn listen(bind: SocketAddr) -> anyhow::Result<()> {
    let mut listener =
        Listener::bind(bind).with_context(|| format!("Failed to bind {}", bind))?;
    listener.set_read_timeout(Some(Duration::from_millis(500)))?;
    println!("Listening on {}", listener.local_addr()?);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop = Arc::clone(&stop_flag);
    let mut receiver = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        while !stop.load(Ordering::Relaxed) {
            match listener.recv() {
                Ok(Some(sample)) => {
                    let cores: Vec<String> = sample
                        .per_core_usage
                        .iter()
                        .map(|u| format!("{:.1}", u))
                        .collect();
                    println!(
                        "total {:5.1}% | cores {} | [{}]",
                        sample.total_usage,
                        sample.core_count(),
                        cores.join(", ")
                    );
                }
                Ok(None) => {}
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => stop_flag.store(true, Ordering::Relaxed),
        result = &mut receiver => return result?,
    }
    receiver.await?
}

fn show_system_info(config: &Config) -> anyhow::Result<()> {
    use procfs::Current;
    use sysinfo::System;

    let mut system = System::new();
    system.refresh_cpu();

    println!("Host: {}", System::host_name().unwrap_or_else(|| "unknown".into()));
    println!(
        "OS: {}",
        System::long_os_version().unwrap_or_else(|| "unknown".into())
    );

    match procfs::CpuInfo::current() {
        Ok(cpuinfo) => println!("CPU: {}", cpuinfo.model_name(0).unwrap_or("unknown")),
        Err(_) => println!("CPU: {}", system.global_cpu_info().brand()),
    }
    println!("Logical CPUs (scheduler): {}", num_cpus::get());

    let counters = read_counters(&config.stat_path)?;
    println!(
        "Cores in {}: {}",
        config.stat_path.display(),
        counters.core_count()
    );
    Ok(())
}
