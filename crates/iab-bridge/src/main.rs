use std::process::{self, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use iab_bridge::{
    AddressType, BridgeConfig, BridgeError, FramedTransport, RequestBridge, TransportError,
    run_completion_loop,
};

/// How long the host gets to exit after its stdin closes.
const HOST_EXIT_GRACE: Duration = Duration::from_secs(5);

enum Operation {
    /// Answered from local state, no host involved.
    Account,
    Host(HostCall),
}

enum HostCall {
    MultiAddresses {
        count: u32,
        address_type: AddressType,
        index: u32,
    },
    SignMessage {
        digest: String,
        signers: Vec<String>,
    },
}

struct Invocation {
    host: Option<String>,
    host_args: Vec<String>,
    rpc_url: Option<String>,
    address: Option<String>,
    operation: Operation,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    let invocation = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            print_usage();
            process::exit(2);
        }
    };

    if let Err(e) = run(invocation).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: iab-bridge [options] <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  account                      Print the bound identity (no host round trip)");
    eprintln!("  multi-addresses <count>      Derive addresses [--type <t>] [--index <n>]");
    eprintln!("  sign-message <digest>        Sign a digest [--signer <addr>]...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --host <program>             Host program speaking framed JSON on stdio");
    eprintln!("  --host-arg <arg>             Argument passed to the host program (repeatable)");
    eprintln!("  --rpc-url <url>              RPC endpoint [env: IAB_RPC_URL]");
    eprintln!("  --address <addr>             Initial identity [env: IAB_ADDRESS]");
    eprintln!("  --type <t>                   external, internal, special or all [default: all]");
    eprintln!("  --index <n>                  Account index (multi-account wallets) [default: 0]");
    eprintln!("  --signer <addr>              Candidate signing address (repeatable)");
}

/// Initialize tracing with IAB_LOG and LOG_FORMAT support. Logs go to stderr,
/// stdout carries only the result.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("IAB_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("iab_bridge={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut host: Option<String> = None;
    let mut host_args = Vec::new();
    let mut rpc_url: Option<String> = None;
    let mut address: Option<String> = None;
    let mut address_type = AddressType::All;
    let mut index = 0u32;
    let mut signers = Vec::new();
    let mut positional = Vec::new();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                host = Some(flag_value(args, i, "--host")?);
            }
            "--host-arg" => {
                i += 1;
                host_args.push(flag_value(args, i, "--host-arg")?);
            }
            "--rpc-url" => {
                i += 1;
                rpc_url = Some(flag_value(args, i, "--rpc-url")?);
            }
            "--address" => {
                i += 1;
                address = Some(flag_value(args, i, "--address")?);
            }
            "--type" => {
                i += 1;
                address_type = flag_value(args, i, "--type")?
                    .parse::<AddressType>()
                    .map_err(|e| format!("{e}"))?;
            }
            "--index" => {
                i += 1;
                index = flag_value(args, i, "--index")?
                    .parse::<u32>()
                    .map_err(|_| "--index must be a non-negative integer")?;
            }
            "--signer" => {
                i += 1;
                signers.push(flag_value(args, i, "--signer")?);
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = positional
        .next()
        .ok_or("missing required argument: <command>")?;

    let operation = match command.as_str() {
        "account" => Operation::Account,
        "multi-addresses" => {
            let count = positional
                .next()
                .ok_or("multi-addresses requires <count>")?
                .parse::<u32>()
                .map_err(|_| "<count> must be a non-negative integer")?;
            Operation::Host(HostCall::MultiAddresses {
                count,
                address_type,
                index,
            })
        }
        "sign-message" => {
            let digest = positional.next().ok_or("sign-message requires <digest>")?;
            Operation::Host(HostCall::SignMessage { digest, signers })
        }
        other => return Err(format!("unknown command: {other}")),
    };

    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    Ok(Invocation {
        host,
        host_args,
        rpc_url,
        address,
        operation,
    })
}

fn flag_value(args: &[String], i: usize, flag: &str) -> Result<String, String> {
    args.get(i)
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

async fn run(invocation: Invocation) -> anyhow::Result<()> {
    let mut config = BridgeConfig::default();
    if let Some(rpc_url) = invocation.rpc_url {
        config = config.with_rpc_url(rpc_url);
    }
    if let Some(address) = invocation.address {
        config = config.with_address(address);
    }

    let output = match invocation.operation {
        Operation::Account => {
            // Identity is local state; nothing is ever posted.
            let closed = |_: String| -> Result<(), TransportError> { Err(TransportError::Closed) };
            let bridge = RequestBridge::new(config, closed);
            json!(bridge.get_identity().await)
        }
        Operation::Host(call) => {
            let host = invocation
                .host
                .context("--host is required for host operations")?;
            call_host(config, &host, &invocation.host_args, call).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Spawn the host, run one operation over its stdio, and shut it down.
async fn call_host(
    config: BridgeConfig,
    host: &str,
    host_args: &[String],
    call: HostCall,
) -> anyhow::Result<Value> {
    let mut child = Command::new(host)
        .args(host_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn host '{host}'"))?;

    let stdin = child.stdin.take().context("host stdin was not captured")?;
    let stdout = child.stdout.take().context("host stdout was not captured")?;
    info!(host, pid = child.id(), "Spawned host");

    let (transport, writer) = FramedTransport::spawn(stdin);
    let bridge = Arc::new(RequestBridge::new(config, transport));
    let mut completions = tokio::spawn(run_completion_loop(stdout, Arc::clone(&bridge)));

    let outcome = tokio::select! {
        biased;
        result = perform(&bridge, call) => result.map_err(anyhow::Error::from),
        finished = &mut completions => match finished {
            Ok(Ok(stats)) => Err(anyhow::anyhow!(
                "host closed its output before answering ({} completions applied)",
                stats.applied
            )),
            Ok(Err(e)) => Err(anyhow::Error::new(e).context("host sent a malformed completion")),
            Err(e) => Err(anyhow::Error::new(e).context("completion loop panicked")),
        },
    };

    completions.abort();
    drop(bridge);

    match tokio::time::timeout(HOST_EXIT_GRACE, writer).await {
        Ok(Ok(Err(e))) => debug!(error = %e, "Request writer ended with error"),
        Err(_) => warn!("Request writer did not finish"),
        _ => {}
    }

    match tokio::time::timeout(HOST_EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!(%status, "Host exited"),
        Ok(Err(e)) => warn!(error = %e, "Failed to wait for host"),
        Err(_) => {
            warn!("Host did not exit after stdin closed, killing it");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill host");
            }
        }
    }

    outcome
}

async fn perform(bridge: &RequestBridge, call: HostCall) -> Result<Value, BridgeError> {
    match call {
        HostCall::MultiAddresses {
            count,
            address_type,
            index,
        } => {
            let addresses = bridge.get_multi_addresses(count, address_type, index).await?;
            Ok(json!(addresses))
        }
        HostCall::SignMessage { digest, signers } => {
            let signers = (!signers.is_empty()).then_some(signers);
            bridge.sign_message(digest, signers).await.map(Value::String)
        }
    }
}
