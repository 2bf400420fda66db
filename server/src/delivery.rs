use std::collections::HashSet;

use tracing::{debug, info, warn};

use chat_protocol::Response;

use crate::registry::{Queued, Registry};

// What a sender is relaying to its recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Message { text: String },
    File { filename: String, content: String },
}

impl Payload {
    // prefix used in the server's log lines
    pub fn label(&self) -> &'static str {
        match self {
            Payload::Message { .. } => "msg",
            Payload::File { .. } => "file",
        }
    }

    pub fn to_response(&self, sender: &str) -> Response {
        match self {
            Payload::Message { text } => Response::ForwardMessage {
                sender: sender.to_owned(),
                text: text.clone(),
            },
            Payload::File { filename, content } => Response::ForwardFile {
                sender: sender.to_owned(),
                filename: filename.clone(),
                content: content.clone(),
            },
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub missing: Vec<String>,
    pub dropped: Vec<String>, // queue full or closing
}

// handles msg delivery to the recipients' outbound queues
pub struct Delivery {
    registry: Registry,
}

impl Delivery {
    pub fn new(registry: &Registry) -> Self {
        Delivery {
            registry: registry.clone(),
        }
    }

    /// Forwards `payload` from `sender` once to each distinct recipient.
    ///
    /// Recipients are visited in first-occurrence order. A name that is not
    /// registered is logged and skipped. The sender never waits on a
    /// recipient: if that recipient's queue is full or its session is tearing
    /// down, the frame is dropped for it alone.
    pub async fn forward(&self, sender: &str, recipients: &[String], payload: &Payload) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for recipient in unique_recipients(recipients) {
            match self.registry.lookup(recipient).await {
                Some(entry) => match entry.deliver(payload.to_response(sender)) {
                    Queued::Yes => report.delivered.push(recipient.to_owned()),
                    Queued::Full => {
                        warn!(peer = %entry.addr(), "{} is not reading, dropped {} from {}", recipient, payload.label(), sender);
                        report.dropped.push(recipient.to_owned());
                    },
                    Queued::Closed => {
                        debug!("{} left before {} from {} was queued", recipient, payload.label(), sender);
                        report.dropped.push(recipient.to_owned());
                    },
                },
                None => {
                    info!("{}: {} to non-existent user {}", payload.label(), sender, recipient);
                    report.missing.push(recipient.to_owned());
                },
            }
        }

        report
    }
}

// drop repeated names, keep first-occurrence order
pub fn unique_recipients(recipients: &[String]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(recipients.len());
    recipients
        .iter()
        .map(String::as_str)
        .filter(|r| seen.insert(*r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClientEntry;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn join(registry: &Registry, name: &str) -> mpsc::Receiver<Response> {
        let (tx, rx) = mpsc::channel(8);
        registry
            .try_join(name, ClientEntry::new("127.0.0.1:1".parse().unwrap(), tx))
            .await
            .unwrap();
        rx
    }

    #[test]
    fn repeated_recipients_collapse_in_order() {
        let list = names(&["b", "a", "b", "c", "a"]);
        assert_eq!(unique_recipients(&list), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn message_reaches_each_recipient_once() {
        let registry = Registry::new(4);
        let mut bo = join(&registry, "bo").await;
        let mut cy = join(&registry, "cy").await;

        let payload = Payload::Message { text: "hi all".into() };
        let report = Delivery::new(&registry)
            .forward("al", &names(&["bo", "cy", "bo"]), &payload)
            .await;

        assert_eq!(report.delivered, names(&["bo", "cy"]));
        assert!(report.missing.is_empty());

        let expected = Response::ForwardMessage { sender: "al".into(), text: "hi all".into() };
        assert_eq!(bo.recv().await.unwrap(), expected);
        assert_eq!(cy.recv().await.unwrap(), expected);
        assert!(bo.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_recipient_does_not_block_the_rest() {
        let registry = Registry::new(4);
        let mut bo = join(&registry, "bo").await;

        let payload = Payload::File { filename: "a.txt".into(), content: "x y".into() };
        let report = Delivery::new(&registry)
            .forward("al", &names(&["ghost", "bo"]), &payload)
            .await;

        assert_eq!(report.missing, names(&["ghost"]));
        assert_eq!(report.delivered, names(&["bo"]));
        assert_eq!(
            bo.recv().await.unwrap(),
            Response::ForwardFile { sender: "al".into(), filename: "a.txt".into(), content: "x y".into() }
        );
    }

    #[tokio::test]
    async fn closed_queue_is_not_counted_as_delivered() {
        let registry = Registry::new(4);
        drop(join(&registry, "bo").await);

        let payload = Payload::Message { text: "late".into() };
        let report = Delivery::new(&registry).forward("al", &names(&["bo"]), &payload).await;

        assert!(report.delivered.is_empty());
        assert!(report.missing.is_empty());
        assert_eq!(report.dropped, names(&["bo"]));
    }

    #[tokio::test]
    async fn stalled_recipient_does_not_hold_up_the_sender() {
        let registry = Registry::new(4);

        // never drained
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        registry
            .try_join("slow", ClientEntry::new("127.0.0.1:2".parse().unwrap(), slow_tx))
            .await
            .unwrap();
        let mut fast = join(&registry, "fast").await;

        let delivery = Delivery::new(&registry);
        let recipients = names(&["slow", "fast"]);

        for text in ["one", "two", "three"] {
            let payload = Payload::Message { text: text.into() };
            let report = tokio::time::timeout(Duration::from_secs(1), delivery.forward("al", &recipients, &payload))
                .await
                .expect("forward blocked on a stalled recipient");
            assert_eq!(report.delivered.last().map(String::as_str), Some("fast"));
        }

        for text in ["one", "two", "three"] {
            assert_eq!(
                fast.recv().await.unwrap(),
                Response::ForwardMessage { sender: "al".into(), text: text.into() }
            );
        }
    }
}
