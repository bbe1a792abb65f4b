//! Management client over a peer connection
//!
//! `ManagementChannel` is the handle the engine uses to talk to one router.
//! It does not touch the socket itself: each call is handed to the
//! connection task as a `PeerCommand`, which writes the request frame and
//! routes the matching response back through a oneshot channel.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use poligent_core::types::unit_name;
use poligent_core::{ManagementClient, ManagementError, Unit};
use poligent_protocol::{is_success, records_from_body, CorrelationId, Frame, Operation};

/// A management request waiting for a correlation id
#[derive(Debug, Clone, PartialEq)]
pub struct ManagementRequest {
    pub operation: Operation,
    pub entity_type: String,
    pub name: Option<String>,
    pub body: Option<Value>,
}

impl ManagementRequest {
    /// Wire frame for this request
    pub fn into_frame(self, correlation_id: CorrelationId) -> Frame {
        Frame::Request {
            correlation_id,
            operation: self.operation,
            entity_type: self.entity_type,
            name: self.name,
            body: self.body,
        }
    }
}

/// A peer's answer to a management request
#[derive(Debug, Clone, PartialEq)]
pub struct ManagementReply {
    pub status_code: u16,
    pub status_description: Option<String>,
    pub body: Value,
}

/// Command sent to a connection task
#[derive(Debug)]
pub struct PeerCommand {
    pub request: ManagementRequest,
    pub reply: oneshot::Sender<ManagementReply>,
}

/// `ManagementClient` backed by a connection task
pub struct ManagementChannel {
    command_tx: mpsc::Sender<PeerCommand>,
    entity_type: String,
    request_timeout: Duration,
}

impl ManagementChannel {
    /// Create a channel issuing requests for `entity_type`
    pub fn new(
        command_tx: mpsc::Sender<PeerCommand>,
        entity_type: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            command_tx,
            entity_type: entity_type.into(),
            request_timeout,
        }
    }

    async fn call(
        &self,
        operation: Operation,
        name: Option<String>,
        body: Option<Value>,
    ) -> Result<Value, ManagementError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = PeerCommand {
            request: ManagementRequest {
                operation,
                entity_type: self.entity_type.clone(),
                name: name.clone(),
                body,
            },
            reply: reply_tx,
        };

        self.command_tx
            .send(command)
            .await
            .map_err(|_| ManagementError::ConnectionClosed)?;

        let reply = match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Err(_) => {
                return Err(ManagementError::Timeout {
                    operation,
                    timeout: self.request_timeout,
                })
            }
            Ok(Err(_)) => return Err(ManagementError::ConnectionClosed),
            Ok(Ok(reply)) => reply,
        };

        if !is_success(reply.status_code) {
            return Err(ManagementError::Rejected {
                operation,
                name: name.unwrap_or_else(|| self.entity_type.clone()),
                status_code: reply.status_code,
                description: reply.status_description.unwrap_or_default(),
            });
        }

        Ok(reply.body)
    }
}

fn name_of(unit: &Unit) -> Result<String, ManagementError> {
    unit_name(unit)
        .map(str::to_string)
        .ok_or(ManagementError::UnnamedUnit)
}

#[async_trait]
impl ManagementClient for ManagementChannel {
    async fn list_units(&self) -> Result<Vec<Unit>, ManagementError> {
        let body = self.call(Operation::Query, None, None).await?;
        Ok(records_from_body(body)?)
    }

    async fn create(&self, spec: &Unit) -> Result<(), ManagementError> {
        let name = name_of(spec)?;
        self.call(Operation::Create, Some(name), Some(Value::Object(spec.clone())))
            .await
            .map(|_| ())
    }

    async fn update(&self, spec: &Unit) -> Result<(), ManagementError> {
        let name = name_of(spec)?;
        self.call(Operation::Update, Some(name), Some(Value::Object(spec.clone())))
            .await
            .map(|_| ())
    }

    async fn delete(&self, record: &Unit) -> Result<(), ManagementError> {
        let name = name_of(record)?;
        self.call(Operation::Delete, Some(name), None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel(timeout: Duration) -> (ManagementChannel, mpsc::Receiver<PeerCommand>) {
        let (tx, rx) = mpsc::channel(8);
        (ManagementChannel::new(tx, "vhost", timeout), rx)
    }

    fn unit(value: Value) -> Unit {
        serde_json::from_value(value).unwrap()
    }

    fn reply(status_code: u16, body: Value) -> ManagementReply {
        ManagementReply {
            status_code,
            status_description: None,
            body,
        }
    }

    #[tokio::test]
    async fn test_create_sends_named_request() {
        let (client, mut rx) = channel(Duration::from_secs(5));

        let responder = tokio::spawn(async move {
            let command = rx.recv().await.unwrap();
            let request = command.request.clone();
            command.reply.send(reply(201, Value::Null)).unwrap();
            request
        });

        client.create(&unit(json!({"name": "a", "x": 1}))).await.unwrap();

        let request = responder.await.unwrap();
        assert_eq!(
            request,
            ManagementRequest {
                operation: Operation::Create,
                entity_type: "vhost".to_string(),
                name: Some("a".to_string()),
                body: Some(json!({"name": "a", "x": 1})),
            }
        );
    }

    #[tokio::test]
    async fn test_delete_sends_no_body() {
        let (client, mut rx) = channel(Duration::from_secs(5));

        let responder = tokio::spawn(async move {
            let command = rx.recv().await.unwrap();
            let request = command.request.clone();
            command.reply.send(reply(204, Value::Null)).unwrap();
            request
        });

        client.delete(&unit(json!({"name": "a", "identity": "vhost/1"}))).await.unwrap();

        let request = responder.await.unwrap();
        assert_eq!(request.operation, Operation::Delete);
        assert_eq!(request.name.as_deref(), Some("a"));
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn test_list_units_converts_table() {
        let (client, mut rx) = channel(Duration::from_secs(5));

        tokio::spawn(async move {
            let command = rx.recv().await.unwrap();
            assert_eq!(command.request.operation, Operation::Query);
            let body = json!({"attributeNames": ["name", "x"], "results": [["a", 1]]});
            command.reply.send(reply(200, body)).unwrap();
        });

        let units = client.list_units().await.unwrap();
        assert_eq!(units, vec![unit(json!({"name": "a", "x": 1}))]);
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let (client, mut rx) = channel(Duration::from_secs(5));

        tokio::spawn(async move {
            let command = rx.recv().await.unwrap();
            command
                .reply
                .send(ManagementReply {
                    status_code: 400,
                    status_description: Some("bad attribute".to_string()),
                    body: Value::Null,
                })
                .unwrap();
        });

        let err = client.update(&unit(json!({"name": "a"}))).await.unwrap_err();
        match err {
            ManagementError::Rejected {
                operation,
                name,
                status_code,
                description,
            } => {
                assert_eq!(operation, Operation::Update);
                assert_eq!(name, "a");
                assert_eq!(status_code, 400);
                assert_eq!(description, "bad attribute");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out() {
        let (client, mut rx) = channel(Duration::from_secs(30));

        // Keep the command alive but never answer it
        let holder = tokio::spawn(async move {
            let command = rx.recv().await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(command);
        });

        let err = client.list_units().await.unwrap_err();
        assert!(matches!(err, ManagementError::Timeout { .. }));
        holder.abort();
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let (client, rx) = channel(Duration::from_secs(5));
        drop(rx);

        let err = client.list_units().await.unwrap_err();
        assert!(matches!(err, ManagementError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_dropped_reply_is_connection_closed() {
        let (client, mut rx) = channel(Duration::from_secs(5));

        tokio::spawn(async move {
            let command = rx.recv().await.unwrap();
            drop(command);
        });

        let err = client.list_units().await.unwrap_err();
        assert!(matches!(err, ManagementError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_unnamed_unit_is_rejected_locally() {
        let (client, _rx) = channel(Duration::from_secs(5));
        let err = client.create(&unit(json!({"x": 1}))).await.unwrap_err();
        assert!(matches!(err, ManagementError::UnnamedUnit));
    }
}
