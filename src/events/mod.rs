use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a full or closed channel is logged, not surfaced.
    /// Writes must not fail because the event loop lags.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Failed to send event: {}", e);
        }
    }
}

// Domain events emitted after committed writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Contract events
    ContractCreated(Uuid),
    ContractUpdated(Uuid),
    ContractDeleted(Uuid),

    // Period events
    PeriodCreated {
        contract_id: Uuid,
        period_id: Uuid,
    },
    PeriodUpdated(Uuid),
    PeriodDeleted(Uuid),
    PeriodActivated {
        contract_id: Uuid,
        period_id: Uuid,
        previous_active: Option<Uuid>,
    },

    // Order events
    OrderPlaced(Uuid),
    OrderUpdated(Uuid),
    OrderDeleted(Uuid),

    // Budget injection events
    InjectionRecorded {
        period_id: Uuid,
        injection_id: Uuid,
    },
    InjectionUpdated(Uuid),
    InjectionDeleted(Uuid),
}

// Drains the event channel and dispatches per event type. Runs until every
// sender handle is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        match event {
            Event::PeriodActivated {
                contract_id,
                period_id,
                previous_active,
            } => {
                handle_period_activated(contract_id, period_id, previous_active).await;
            }
            Event::InjectionRecorded {
                period_id,
                injection_id,
            } => {
                info!(
                    period_id = %period_id,
                    injection_id = %injection_id,
                    "Budget injection recorded"
                );
            }
            Event::ContractDeleted(contract_id) => {
                info!(contract_id = %contract_id, "Contract removed with its periods and orders");
            }
            other => {
                // Remaining events carry no follow-up work beyond the audit log
                info!("Processed event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

async fn handle_period_activated(
    contract_id: Uuid,
    period_id: Uuid,
    previous_active: Option<Uuid>,
) {
    match previous_active {
        Some(closed) => info!(
            contract_id = %contract_id,
            period_id = %period_id,
            closed_period_id = %closed,
            "Period activated, previous active period closed"
        ),
        None => info!(
            contract_id = %contract_id,
            period_id = %period_id,
            "Period activated"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_events_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let id = Uuid::new_v4();
        sender.send(Event::ContractCreated(id)).await.unwrap();
        sender.send_or_log(Event::OrderPlaced(id)).await;

        assert!(matches!(rx.recv().await, Some(Event::ContractCreated(got)) if got == id));
        assert!(matches!(rx.recv().await, Some(Event::OrderPlaced(got)) if got == id));
    }

    #[tokio::test]
    async fn processing_loop_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(process_events(rx));

        let sender = EventSender::new(tx);
        sender
            .send(Event::PeriodActivated {
                contract_id: Uuid::new_v4(),
                period_id: Uuid::new_v4(),
                previous_active: Some(Uuid::new_v4()),
            })
            .await
            .unwrap();
        drop(sender);

        task.await.unwrap();
    }
}
