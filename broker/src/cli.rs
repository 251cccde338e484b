//! CLI argument parsing with clap derive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use crate::api::{self, AppState};
use crate::application::services::provisioning::{LaunchSettings, Provisioner};
use crate::infra;
use crate::infra::compute::HttpComputeClient;
use crate::infra::userdata::HandlebarsBootScript;

/// Service broker that provisions CI build agents as cloud compute instances
#[derive(Parser)]
#[command(name = "agent-broker", version)]
pub struct Cli {
    /// Location of the YAML config file
    #[arg(long, env = "AGENT_BROKER_CONFIG")]
    pub config: PathBuf,

    /// Override the configured listen address
    #[arg(long)]
    pub listen: Option<String>,
}

impl Cli {
    /// Run the broker until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the listener
    /// cannot bind, or the server fails.
    pub async fn run(self) -> Result<()> {
        let config = infra::config::load(&self.config)?;
        let listen_addr = self.listen.unwrap_or_else(|| config.listen_addr.clone());

        tracing::info!(
            %listen_addr,
            region = %config.compute.region,
            endpoint = %config.compute.endpoint,
            "agent-broker starting"
        );

        let compute = HttpComputeClient::new(&config.compute);
        let boot_script = HandlebarsBootScript::new()?;
        let provisioner = Provisioner::new(
            compute,
            boot_script,
            LaunchSettings {
                security_group_id: config.compute.security_group_id.clone(),
                image_owner: config.compute.image_owner.clone(),
                image_name: config.compute.image_name.clone(),
            },
        );
        let state = Arc::new(AppState {
            provisioner,
            catalog: config.catalog,
        });

        let listener = tokio::net::TcpListener::bind(&listen_addr)
            .await
            .with_context(|| format!("cannot listen on {listen_addr}"))?;
        tracing::info!("listening on {listen_addr}");

        axum::serve(listener, api::build_router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("broker server failed")
    }
}

async fn shutdown_signal() {
    // Binding ctrl-c can only fail when the process has no signal handler
    // slots left; treat that as an immediate shutdown request.
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("cannot listen for shutdown signal; shutting down");
    }
}
