//! In-memory [`Transport`] for tests.

use super::{Result, Subscription, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

type Handler = Box<dyn Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync>;

struct OpenSubscription {
    unsubscribe_method: String,
    signal: oneshot::Receiver<()>,
    closed: bool,
}

/// Answers requests from registered handlers and records every call in order.
/// Unregistered methods fail with JSON-RPC code -32601.
#[derive(Default)]
pub struct MockTransport {
    handlers: HashMap<String, Handler>,
    notifications: HashMap<String, Vec<JsonValue>>,
    calls: Mutex<Vec<(String, Vec<JsonValue>)>>,
    subscriptions: Mutex<Vec<OpenSubscription>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn with_handler<F>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync + 'static,
    {
        self.handlers.insert(method.to_string(), Box::new(handler));
        self
    }
    pub fn with_response(self, method: &str, response: JsonValue) -> Self {
        self.with_handler(method, move |_| Ok(response.clone()))
    }
    pub fn with_rpc_error(self, method: &str, code: i64, message: &str) -> Self {
        let message = message.to_string();
        self.with_handler(method, move |_| {
            Err(TransportError::Rpc {
                code,
                message: message.clone(),
            })
        })
    }
    /// Notifications delivered to a subscription of `method`, after which the
    /// node side closes the stream.
    pub fn with_notifications(mut self, method: &str, notifications: Vec<JsonValue>) -> Self {
        self.notifications
            .insert(method.to_string(), notifications);
        self
    }
    /// All requests and subscriptions made so far, in order.
    pub fn calls(&self) -> Vec<(String, Vec<JsonValue>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }
    /// Unsubscribe methods that were triggered so far.
    pub fn unsubscribed(&self) -> Vec<String> {
        let mut subs = match self.subscriptions.lock() {
            Ok(subs) => subs,
            Err(_) => return vec![],
        };

        for sub in subs.iter_mut().filter(|sub| !sub.closed) {
            if sub.signal.try_recv().is_ok() {
                sub.closed = true;
            }
        }

        subs.iter()
            .filter(|sub| sub.closed)
            .map(|sub| sub.unsubscribe_method.clone())
            .collect()
    }
    fn record(&self, method: &str, params: &[JsonValue]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((method.to_string(), params.to_vec()));
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue> {
        self.record(method, &params);

        match self.handlers.get(method) {
            Some(handler) => handler(&params),
            None => Err(TransportError::Rpc {
                code: -32601,
                message: "Method not found".to_string(),
            }),
        }
    }
    async fn subscribe(
        &self,
        method: &str,
        params: Vec<JsonValue>,
        unsubscribe_method: &str,
    ) -> Result<Subscription> {
        self.record(method, &params);

        let notifications = self
            .notifications
            .get(method)
            .ok_or_else(|| TransportError::Rpc {
                code: -32601,
                message: "Method not found".to_string(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        for notification in notifications {
            // The receiver is alive, it was just created.
            let _ = tx.send(Ok(notification.clone()));
        }

        let (signal_tx, signal_rx) = oneshot::channel();
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.push(OpenSubscription {
                unsubscribe_method: unsubscribe_method.to_string(),
                signal: signal_rx,
                closed: false,
            });
        }

        Ok(Subscription::new(rx, signal_tx))
    }
}
