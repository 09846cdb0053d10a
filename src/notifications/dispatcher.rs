//! Per-recipient message fan-out

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use super::channels::MessagingTransport;
use super::OutboundMessage;
use crate::metrics;
use crate::roster::RecipientSet;

/// Outcome of dispatching one message to a set of recipients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Addresses the transport accepted
    pub delivered: Vec<String>,
    /// Addresses that failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends messages through a transport, isolating per-recipient failures
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn MessagingTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn MessagingTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn MessagingTransport> {
        &self.transport
    }

    /// Deliver to every member of a recipient set
    pub async fn dispatch(&self, recipients: &RecipientSet, message: &OutboundMessage) -> DispatchReport {
        let addresses: Vec<&str> = recipients.addresses().collect();
        self.dispatch_to(&addresses, message).await
    }

    /// Deliver to each address independently
    ///
    /// Pushes run concurrently; a failure for one address never affects
    /// the others. Order in the report follows the input order.
    pub async fn dispatch_to(&self, addresses: &[&str], message: &OutboundMessage) -> DispatchReport {
        let pushes = addresses.iter().map(|address| async move {
            let outcome = match self.transport.push(address, message).await {
                Ok(status) if status.success => Ok(()),
                Ok(status) => Err(status
                    .message
                    .unwrap_or_else(|| "delivery not confirmed".to_string())),
                Err(e) => Err(e.to_string()),
            };
            (*address, outcome)
        });

        let mut report = DispatchReport::default();
        for (address, outcome) in join_all(pushes).await {
            match outcome {
                Ok(()) => {
                    metrics::record_delivery(true);
                    tracing::info!(recipient = %address, channel = self.transport.name(), "Notification delivered");
                    report.delivered.push(address.to_string());
                }
                Err(reason) => {
                    metrics::record_delivery(false);
                    tracing::error!(recipient = %address, channel = self.transport.name(), error = %reason, "Notification delivery failed");
                    report.failed.push((address.to_string(), reason));
                }
            }
        }

        report
    }
}
