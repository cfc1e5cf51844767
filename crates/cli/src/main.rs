//! apiwire CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load the client settings and endpoint tree from
//!    `--config` (TOML or JSON).
//! 2. **Wire observability**: `tracing-subscriber` with a JSON layer on stderr
//!    and, when `--otlp-endpoint` is given, an OpenTelemetry OTLP exporter. All
//!    spans and events emitted by the workspace crates flow through it.
//! 3. **Construct infrastructure**: the `reqwest` HTTP and JSONP adapters are
//!    registered on the client, plus a global middleware that logs call timing.
//! 4. **Run the command**: `list` prints every API name with its key; `call`
//!    invokes one API and prints the resolved JSON to stdout.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use http_transport::{ReqwestHttp, ReqwestJsonp};
use pipeline::{from_fn, CallOptions, Client, MiddlewareRef};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "apiwire", version, about = "Call configured HTTP/JSONP APIs")]
struct Cli {
    /// Config file (`.toml`, otherwise JSON).
    #[arg(short, long)]
    config: PathBuf,

    /// OTLP gRPC endpoint for span export, e.g. `http://localhost:4317`.
    #[arg(long)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List API names and their keys.
    List,
    /// Call one API and print the result.
    Call {
        /// API name.
        name: String,
        /// Arguments as a JSON object.
        #[arg(long)]
        args: Option<String>,
        /// JSONP callback name.
        #[arg(long)]
        callback_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let provider = telemetry::init(cli.otlp_endpoint.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "apiwire starting");

    let result = run(cli).await;

    telemetry::shutdown(provider);
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let file = config::load(&cli.config)?;
    let client = Client::builder(file.client)
        .http(ReqwestHttp::new()?)
        .jsonp(ReqwestJsonp::new()?)
        .middleware(call_timing())
        .build()?;
    let apis = client.get_api(&file.api);

    match cli.command {
        Command::List => {
            for (name, api) in apis.iter() {
                println!("{name}\t{}", api.key());
            }
        }
        Command::Call {
            name,
            args,
            callback_name,
        } => {
            let api = apis
                .get(&name)
                .with_context(|| format!("no API named `{name}`"))?;
            let args = match args {
                Some(text) => serde_json::from_str(&text).context("parsing --args")?,
                None => Value::Null,
            };
            let data = api.call_with(args, CallOptions { callback_name }).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }
    Ok(())
}

fn call_timing() -> MiddlewareRef {
    from_fn(|ctx, next| {
        Box::pin(async move {
            let outcome = next.run(ctx).await;
            let failed = ctx.response.as_ref().map_or(true, |r| r.is_error());
            info!(
                api = %ctx.api_name(),
                req_time_ms = ctx.req_time.map(saturating_millis),
                failed,
                "call finished"
            );
            outcome
        })
    })
}

fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_saturate_instead_of_wrapping() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }
}
