// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Auto-PKI provisioning command-line client.
//!
//! Provisions an X.509 client certificate for this host: discovers an EST
//! enrollment server on the local network when none is configured, pins its
//! trust anchor on first contact, and submits a CSR until a certificate is
//! issued.
//!
//! # Usage
//!
//! ```text
//! auto-pki-client [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>  Path to the TOML configuration file
//!       --re-discovery   Force re-discovery of enrollment services
//!       --wait-for-cert  Keep retrying while the server defers the request
//!   -v, --verbose...     Increase verbosity (repeatable)
//!   -q, --quiet          Only log errors
//!   -h, --help           Print help
//!   -V, --version        Print version
//! ```
//!
//! # Exit codes
//!
//! `0` on success (including the already-provisioned no-op), `10` when the
//! server deferred the request and waiting was not requested, `130` when a
//! deferred wait was interrupted, and the distinct failure codes documented
//! on [`auto_pki_client::ProvisionError::exit_code`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use auto_pki_client::codec::X509Codec;
use auto_pki_client::discovery::MdnsServiceLocator;
use auto_pki_client::enrollment::EstConnector;
use auto_pki_client::{ProvisioningOrchestrator, RunOptions};

/// Auto-PKI provisioning client
#[derive(Parser)]
#[command(name = "auto-pki-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision an X.509 client certificate from a discovered enrollment server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "PATH", default_value = "config/config.toml")]
    config: PathBuf,

    /// Force re-discovery of enrollment services even if a server is
    /// configured
    #[arg(long = "re-discovery")]
    re_discovery: bool,

    /// Keep retrying while the server defers the enrollment request
    #[arg(long = "wait-for-cert")]
    wait_for_cert: bool,

    /// Increase verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Base verbosity is WARN; each -v raises it one level, -q drops the
    // base increment so only errors remain.
    let verbosity = (cli.verbose + u8::from(!cli.quiet)).min(3);
    let level = match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let host_identity = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            eprintln!("failed to resolve host identity: {e}");
            return ExitCode::FAILURE;
        }
    };

    // One strictly sequential run; a single-threaded runtime is all it needs.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let options = RunOptions {
        config_path: cli.config,
        host_identity,
        rediscover: cli.re_discovery,
        wait_for_certificate: cli.wait_for_cert,
    };
    let orchestrator =
        ProvisioningOrchestrator::new(MdnsServiceLocator, EstConnector, X509Codec, options);

    match runtime.block_on(orchestrator.run()) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(error) => {
            tracing::error!("{error}");
            ExitCode::from(error.exit_code())
        }
    }
}
