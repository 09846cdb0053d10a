use anyhow::{bail, Result};

use coursebell::config::Config;
use coursebell::notifications::OutboundMessage;
use coursebell::roster::Resolution;

use super::{build_name_resolver, build_parser, build_service, build_transport};

/// Parse a description and print the record as JSON
pub async fn parse(config: Config, text: String) -> Result<()> {
    let record = build_parser(&config).parse(&text)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Resolve one name against the roster
pub async fn resolve(config: Config, name: String) -> Result<()> {
    let resolver = build_name_resolver(&config)?;
    let snapshot = resolver.snapshot(true).await;
    println!("Roster entries: {}", snapshot.len());

    match resolver.resolve_in(&snapshot, &name) {
        Resolution::Exact {
            canonical_name,
            address,
        } => println!("exact: {canonical_name} -> {address}"),
        Resolution::Fuzzy {
            canonical_name,
            address,
            score,
        } => println!("fuzzy ({score:.3}): {canonical_name} -> {address}"),
        Resolution::Unresolved { best_score } => {
            println!("unresolved (best score {best_score:.3})")
        }
    }
    Ok(())
}

/// Probe calendar store, roster store and transport
pub async fn check(config: Config) -> Result<()> {
    let service = build_service(&config)?;
    let report = service.check().await;

    println!("System check");
    println!("============");
    println!("{report}");

    if !report.is_healthy() {
        bail!("system check failed");
    }
    Ok(())
}

/// Push one plain text message
pub async fn notify(config: Config, address: String, text: String) -> Result<()> {
    let transport = build_transport(&config)?;
    let status = transport.push(&address, &OutboundMessage::text(text)).await?;
    println!("{status}");
    Ok(())
}
