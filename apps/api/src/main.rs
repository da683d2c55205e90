mod agent;
mod config;
mod errors;
mod normalize;
mod pdf;
mod protocol;
mod routes;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fmt::Write;
use std::net::SocketAddr;
use std::process::ExitCode;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent::handlers::API_SENDER;
use crate::config::{Config, ConfigStatus};
use crate::protocol::MessageType;
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "jobsniper-api", version, about = "Resume analysis API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Check configuration and exit non-zero if it is invalid
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration first; malformed values abort startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Check => Ok(check(&config)),
    }
}

async fn serve(config: Config) -> Result<ExitCode> {
    info!("Starting JobSniper API v{}", env!("CARGO_PKG_VERSION"));

    let status = config.validate();
    for issue in &status.issues {
        warn!("Configuration issue: {issue}");
    }
    match status.ai_provider {
        Some(provider) => info!("AI provider: {}", provider.as_str()),
        None => warn!("No AI provider available, agents run in fallback mode"),
    }
    info!("{} features enabled", status.features_enabled);

    let state = AppState::new(config.clone());
    info!("Agents registered: {}", state.agents.keys().join(", "));

    state.bus.subscribe(API_SENDER, |message| {
        if message.message_type == MessageType::Error {
            warn!("Agent {} reported a failure: {}", message.sender, message.data["error"]);
        }
        Ok(())
    });

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the UI host is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(ExitCode::SUCCESS)
}

fn check(config: &Config) -> ExitCode {
    let status = config.validate();
    print!("{}", render_status(&status));

    if status.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render_status(status: &ConfigStatus) -> String {
    let mut out = String::new();

    if status.valid {
        let provider = status.ai_provider.map_or("none", |p| p.as_str());
        let _ = writeln!(out, "Configuration valid, using {provider} as AI provider");
    } else {
        let _ = writeln!(out, "Configuration issues found:");
        for issue in &status.issues {
            let _ = writeln!(out, "  - {issue}");
        }
    }
    let _ = writeln!(out, "{} features enabled:", status.features_enabled);
    for (feature, enabled) in &status.features {
        let mark = if *enabled { "[x]" } else { "[ ]" };
        let _ = writeln!(out, "  {mark} {feature}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit_code_of(vars: &[(&str, &str)]) -> String {
        let config = Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();
        format!("{:?}", check(&config))
    }

    #[test]
    fn test_check_fails_without_provider() {
        assert_eq!(exit_code_of(&[]), format!("{:?}", ExitCode::FAILURE));
    }

    #[test]
    fn test_check_succeeds_with_provider() {
        assert_eq!(
            exit_code_of(&[("GEMINI_API_KEY", "g-key")]),
            format!("{:?}", ExitCode::SUCCESS)
        );
    }

    #[test]
    fn test_render_status_lists_issues_and_features() {
        let status = Config::from_lookup(|_| None).unwrap().validate();
        let report = render_status(&status);
        assert!(report.starts_with("Configuration issues found:"));
        assert!(report.contains("GEMINI_API_KEY"));
        assert!(report.contains("[x] pdf_upload"));
        assert!(report.contains("[ ] ai_analysis"));
    }
}
