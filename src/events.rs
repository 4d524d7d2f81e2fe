use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published by the cart and catalog services.
///
/// Delivery is best-effort: a full or closed channel never fails the
/// business operation that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartCreated {
        cart_id: Uuid,
        customer_id: String,
    },
    CartItemAdded {
        cart_id: Uuid,
        product_model: String,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        product_model: String,
    },
    CartCleared(Uuid),
    CartCheckedOut {
        cart_id: Uuid,
        customer_id: String,
        total: Decimal,
    },
    StockAdjusted {
        product_model: String,
        delta: i32,
        new_quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is down.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Creates an event channel pair with the given buffer size.
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Default event consumer: drains the channel and logs each event.
/// Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!("Event: {:?}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = event_channel(8);
        sender
            .send(Event::CartCleared(Uuid::new_v4()))
            .await
            .expect("send should succeed");
        assert!(matches!(rx.recv().await, Some(Event::CartCleared(_))));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = event_channel(1);
        drop(rx);
        // Must not panic or error out.
        sender
            .send_or_log(Event::CartCheckedOut {
                cart_id: Uuid::new_v4(),
                customer_id: "alice".to_string(),
                total: dec!(10.00),
            })
            .await;
    }

    #[test]
    fn events_round_trip_through_serde() {
        let event = Event::CartItemAdded {
            cart_id: Uuid::new_v4(),
            product_model: "phone-x".to_string(),
            quantity: 2,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: Event = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(back, Event::CartItemAdded { quantity: 2, .. }));
    }
}
