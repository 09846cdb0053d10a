use anyhow::Result;
use chrono::Utc;

use coursebell::config::Config;

use super::build_service;

/// Run one lookahead tick now
pub async fn scan(config: Config) -> Result<()> {
    let service = build_service(&config)?;
    let report = service.run_lookahead(Utc::now()).await?;

    println!("Lookahead scan");
    println!("==============");
    println!("  Events fetched:      {}", report.events_fetched);
    println!("  In window:           {}", report.events_in_window);
    println!("  Delivered:           {}", report.delivered);
    println!("  Failed:              {}", report.failed);
    println!("  Unparsed:            {}", report.parse_failures);
    println!("  Without recipients:  {}", report.without_recipients);
    Ok(())
}

/// Send today's digest now
pub async fn digest(config: Config) -> Result<()> {
    let service = build_service(&config)?;
    let report = service.run_digest(Utc::now()).await?;

    println!("Daily digest");
    println!("============");
    println!("  Events today: {}", report.events);
    println!("  Recipients:   {}", report.recipients);
    println!("  Delivered:    {}", report.delivered);
    println!("  Failed:       {}", report.failed);
    Ok(())
}
