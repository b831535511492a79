use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// The events the pricing engine emits as it works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PriceIncreased {
        item_id: Uuid,
        old_price: Decimal,
        new_price: Decimal,
        capped: bool,
    },
    PriceReverted {
        item_id: Uuid,
        old_price: Decimal,
        new_price: Decimal,
    },
    SweepCompleted {
        store_id: Uuid,
        run_id: Uuid,
        items_processed: u32,
    },
    AutomationEnabled {
        item_id: Uuid,
    },
    AutomationDisabled {
        item_id: Uuid,
    },
    StoreAutomationToggled {
        store_id: Uuid,
        enabled: bool,
        items_affected: u32,
    },
    UndoApplied {
        store_id: Uuid,
        items_restored: u32,
    },
}

// Drains the event channel and dispatches each event to its handler.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::PriceIncreased {
                item_id,
                old_price,
                new_price,
                capped,
            } => {
                if let Err(e) = handle_price_increased(item_id, old_price, new_price, capped).await
                {
                    error!(
                        "Failed to handle price increased event: item_id={}, error={}",
                        item_id, e
                    );
                }
            }
            Event::PriceReverted {
                item_id,
                old_price,
                new_price,
            } => {
                if let Err(e) = handle_price_reverted(item_id, old_price, new_price).await {
                    error!(
                        "Failed to handle price reverted event: item_id={}, error={}",
                        item_id, e
                    );
                }
            }
            Event::SweepCompleted {
                store_id,
                run_id,
                items_processed,
            } => {
                info!(
                    "Pricing sweep completed: store_id={}, run_id={}, items_processed={}",
                    store_id, run_id, items_processed
                );
            }
            Event::AutomationEnabled { item_id } => {
                info!("Automated pricing enabled for item {}", item_id);
            }
            Event::AutomationDisabled { item_id } => {
                info!("Automated pricing disabled for item {}", item_id);
            }
            Event::StoreAutomationToggled {
                store_id,
                enabled,
                items_affected,
            } => {
                info!(
                    "Store-wide automation toggled: store_id={}, enabled={}, items_affected={}",
                    store_id, enabled, items_affected
                );
            }
            Event::UndoApplied {
                store_id,
                items_restored,
            } => {
                info!(
                    "Undo applied: store_id={}, items_restored={}",
                    store_id, items_restored
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_price_increased(
    item_id: Uuid,
    old_price: Decimal,
    new_price: Decimal,
    capped: bool,
) -> Result<(), String> {
    if capped {
        warn!(
            "Price increase hit the ceiling: item_id={}, old_price={}, new_price={}",
            item_id, old_price, new_price
        );
    } else {
        info!(
            "Price increased: item_id={}, old_price={}, new_price={}",
            item_id, old_price, new_price
        );
    }
    Ok(())
}

async fn handle_price_reverted(
    item_id: Uuid,
    old_price: Decimal,
    new_price: Decimal,
) -> Result<(), String> {
    info!(
        "Price reverted: item_id={}, old_price={}, new_price={}",
        item_id, old_price, new_price
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn send_delivers_event_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let item_id = Uuid::new_v4();
        sender
            .send(Event::PriceIncreased {
                item_id,
                old_price: dec!(10.00),
                new_price: dec!(10.50),
                capped: false,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::PriceIncreased {
                item_id: got,
                capped,
                ..
            }) => {
                assert_eq!(got, item_id);
                assert!(!capped);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender
            .send(Event::AutomationEnabled {
                item_id: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn process_events_drains_channel_until_closed() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let worker = tokio::spawn(process_events(rx));

        sender
            .send(Event::UndoApplied {
                store_id: Uuid::new_v4(),
                items_restored: 3,
            })
            .await
            .unwrap();
        drop(sender);

        // The loop exits once every sender is gone.
        worker.await.unwrap();
    }
}
