// SPDX-License-Identifier: Apache-2.0 OR MIT
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use mcsnoop::config::AgentConfig;
use mcsnoop::logging::integration::AgentLogging;
use mcsnoop::logging::{Facility, Logger};
use mcsnoop::runtime::Runtime;
use mcsnoop::{control_socket, log_error, log_info, metrics};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug, PartialEq)]
enum Command {
    /// Run the snooping agent
    Run {
        /// JSON5 startup configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the control socket path from the config
        #[arg(long)]
        socket_path: Option<PathBuf>,
    },
    /// Validate a configuration file and print it normalized
    CheckConfig { file: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            config,
            socket_path,
        } => run(config, socket_path).await,
        Command::CheckConfig { file } => {
            let config = AgentConfig::load_from_file(&file)?;
            config.validate()?;
            println!("{}", config.to_json5());
            Ok(())
        }
    }
}

async fn run(config_path: Option<PathBuf>, socket_path: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => AgentConfig::load_from_file(path)?,
        None => AgentConfig::default(),
    };
    if let Some(path) = socket_path {
        config.control_socket = path;
    }
    if let Err(e) = config.validate() {
        // The consumer task is not running yet
        let logger = Logger::stderr_json();
        log_error!(
            logger,
            Facility::Agent,
            &format!("invalid configuration: {}", e)
        );
        return Err(e.into());
    }

    let logging = AgentLogging::from_config(&config);
    let logger = logging.logger(Facility::Agent);

    metrics::describe_counters();
    if let Some(addr) = config.prometheus_addr {
        metrics::install_prometheus_recorder(addr)
            .with_context(|| format!("failed to start Prometheus exporter on {}", addr))?;
        log_info!(
            logger,
            Facility::Agent,
            &format!("Prometheus exporter listening on {}", addr)
        );
    }

    let (mut runtime, handle) = Runtime::new(config.max_ports, logging.registry());
    runtime
        .agent_mut()
        .apply_initial_timeouts(&config.initial_timeouts());

    let listener = control_socket::bind(&config.control_socket).with_context(|| {
        format!(
            "failed to bind control socket {}",
            config.control_socket.display()
        )
    })?;
    log_info!(
        logger,
        Facility::Agent,
        &format!("Control socket listening on {:?}", &config.control_socket)
    );

    let socket_task = tokio::spawn(control_socket::serve(
        listener,
        handle.clone(),
        logging.logger(Facility::ControlChannel),
    ));
    let runtime_task = tokio::spawn(runtime.run());

    tokio::signal::ctrl_c().await?;
    log_info!(logger, Facility::Agent, "shutting down");

    handle.shutdown().await?;
    runtime_task.await?;
    socket_task.abort();
    let _ = std::fs::remove_file(&config.control_socket);
    logging.shutdown().await;
    Ok(())
}
