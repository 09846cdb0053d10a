pub mod inspect;
pub mod run;
pub mod tick;

// Re-export command functions for convenience
pub use inspect::{check, notify, parse, resolve};
pub use run::run;
pub use tick::{digest, scan};

use anyhow::{Context, Result};
use std::sync::Arc;

use coursebell::calendar::{CalDavSource, CalendarSource};
use coursebell::config::Config;
use coursebell::notifications::{Dispatcher, LineTransport, MessageComposer, MessagingTransport};
use coursebell::parser::DescriptionParser;
use coursebell::roster::{NameResolver, RecipientResolver, SheetRosterSource};
use coursebell::scheduler::{NotifierService, ServiceSettings};

pub fn build_calendar(config: &Config) -> Result<Arc<dyn CalendarSource>> {
    let source = CalDavSource::new(config.calendar.clone()).context("Failed to set up CalDAV source")?;
    Ok(Arc::new(source))
}

pub fn build_name_resolver(config: &Config) -> Result<Arc<NameResolver>> {
    let source = SheetRosterSource::new(config.roster.sheet()).context("Failed to set up roster source")?;
    Ok(Arc::new(NameResolver::new(Arc::new(source), config.roster.resolver())))
}

pub fn build_transport(config: &Config) -> Result<Arc<dyn MessagingTransport>> {
    let transport = LineTransport::new(config.line.clone()).context("Failed to set up LINE transport")?;
    Ok(Arc::new(transport))
}

pub fn build_parser(config: &Config) -> DescriptionParser {
    DescriptionParser::new(config.parser.name_filter())
}

/// Wire every collaborator into the service object
pub fn build_service(config: &Config) -> Result<Arc<NotifierService>> {
    let settings = ServiceSettings::from_trigger(&config.scheduler)?;
    let composer = MessageComposer::new(&config.scheduler.checkin_url, settings.tz);

    Ok(Arc::new(NotifierService::new(
        build_calendar(config)?,
        build_parser(config),
        RecipientResolver::new(build_name_resolver(config)?),
        Dispatcher::new(build_transport(config)?),
        composer,
        settings,
    )))
}
