//! Client side of the node wire protocol

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use minichat_core::{
    ConversationMessage, DeviceId, DeviceInfo, GroupId, GroupInfo, MessageId, MessengerClient,
    NodeError, NodeEvent, NodeResult, ProtocolClient, RemoteNodeConfig, EVENT_CHANNEL_CAPACITY,
};

use crate::wire::{read_frame, write_frame, Request, Response, ResponseBody};

/// Handle onto a node served by another process
///
/// Each call opens its own connection, so the handle is cheap to clone and
/// share between the messenger and protocol roles.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    config: RemoteNodeConfig,
}

impl RemoteNode {
    /// Connect to the remote node and verify that it answers
    pub async fn connect(config: RemoteNodeConfig) -> NodeResult<Self> {
        let node = Self { config };
        let info = node.device_info().await.map_err(|e| match e {
            NodeError::Unreachable { .. } => e,
            other => node.unreachable(other.to_string()),
        })?;

        info!(addr = %node.config.addr, device = %info.device_id, "Attached to remote node");
        Ok(node)
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    fn unreachable(&self, reason: impl Into<String>) -> NodeError {
        NodeError::Unreachable {
            addr: self.config.addr.clone(),
            reason: reason.into(),
        }
    }

    async fn open(&self) -> NodeResult<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let stream = match timeout(self.config.timeout, TcpStream::connect(&self.config.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.unreachable(e.to_string())),
            Err(_) => {
                return Err(self.unreachable(format!("connect timed out after {:?}", self.config.timeout)))
            }
        };

        let (read_half, write_half) = stream.into_split();
        Ok((BufReader::new(read_half), write_half))
    }

    /// Send `request` on a fresh connection and wait for its answer
    ///
    /// Returns the connection too, so a subscription can keep reading events.
    async fn exchange(
        &self,
        request: Request,
    ) -> NodeResult<(ResponseBody, BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let (mut reader, mut writer) = self.open().await?;

        let answer = timeout(self.config.timeout, send_and_receive(&mut reader, &mut writer, &request))
            .await
            .map_err(|_| self.unreachable(format!("no answer within {:?}", self.config.timeout)))??;

        let response =
            answer.ok_or_else(|| NodeError::Protocol("node closed the connection without answering".to_string()))?;
        Ok((response.into_result()?, reader, writer))
    }

    async fn call(&self, request: Request) -> NodeResult<ResponseBody> {
        self.exchange(request).await.map(|(body, _, _)| body)
    }
}

async fn send_and_receive(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    request: &Request,
) -> NodeResult<Option<Response>> {
    write_frame(writer, request).await?;
    read_frame(reader).await
}

fn unexpected(body: ResponseBody) -> NodeError {
    NodeError::Protocol(format!("unexpected response: {:?}", body))
}

#[async_trait]
impl MessengerClient for RemoteNode {
    async fn default_display_name(&self) -> NodeResult<String> {
        match self.call(Request::DefaultDisplayName).await? {
            ResponseBody::DisplayName(name) => Ok(name),
            other => Err(unexpected(other)),
        }
    }

    async fn send_message(&self, group: GroupId, author: &str, body: &str) -> NodeResult<MessageId> {
        let request = Request::SendMessage {
            group,
            author: author.to_string(),
            body: body.to_string(),
        };
        match self.call(request).await? {
            ResponseBody::MessageId(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    async fn history(&self, group: GroupId, limit: usize) -> NodeResult<Vec<ConversationMessage>> {
        match self.call(Request::History { group, limit }).await? {
            ResponseBody::History(messages) => Ok(messages),
            other => Err(unexpected(other)),
        }
    }

    async fn subscribe(&self, group: GroupId) -> NodeResult<mpsc::Receiver<NodeEvent>> {
        let (body, mut reader, writer) = self.exchange(Request::Subscribe { group }).await?;
        if body != ResponseBody::Subscribed {
            return Err(unexpected(body));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            // Keep the write half alive so the server does not see a closed peer.
            let _writer = writer;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    frame = read_frame::<_, NodeEvent>(&mut reader) => match frame {
                        Ok(Some(event)) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(group = %group, error = %e, "Remote subscription failed");
                            break;
                        }
                    },
                }
            }
            debug!(group = %group, "Remote subscription closed");
        });

        Ok(rx)
    }
}

#[async_trait]
impl ProtocolClient for RemoteNode {
    async fn device_info(&self) -> NodeResult<DeviceInfo> {
        match self.call(Request::DeviceInfo).await? {
            ResponseBody::DeviceInfo(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn create_group(&self, name: &str) -> NodeResult<GroupInfo> {
        match self.call(Request::CreateGroup { name: name.to_string() }).await? {
            ResponseBody::Group(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn join_group(&self, invitation: &str) -> NodeResult<GroupInfo> {
        let request = Request::JoinGroup {
            invitation: invitation.to_string(),
        };
        match self.call(request).await? {
            ResponseBody::Group(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    async fn group_invitation(&self, group: GroupId) -> NodeResult<String> {
        match self.call(Request::GroupInvitation { group }).await? {
            ResponseBody::Invitation(token) => Ok(token),
            other => Err(unexpected(other)),
        }
    }

    async fn members(&self, group: GroupId) -> NodeResult<Vec<DeviceId>> {
        match self.call(Request::Members { group }).await? {
            ResponseBody::Members(members) => Ok(members),
            other => Err(unexpected(other)),
        }
    }
}
