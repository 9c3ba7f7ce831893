//! Serving a local node to remote clients

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use minichat_core::{MessengerClient, NodeError, NodeResult, ProtocolClient};

use crate::local::LocalNode;
use crate::wire::{read_frame, write_frame, Request, Response, ResponseBody};

/// TCP front end for a [`LocalNode`]
pub struct NodeServer {
    node: LocalNode,
    listener: TcpListener,
}

impl NodeServer {
    /// Bind a listener for `node` on `addr`
    pub async fn bind(node: LocalNode, addr: SocketAddr) -> NodeResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| NodeError::Startup(format!("failed to listen on {}: {}", addr, e)))?;
        Ok(Self { node, listener })
    }

    pub fn local_addr(&self) -> NodeResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires
    pub async fn serve(self, cancel: CancellationToken) -> NodeResult<()> {
        let addr = self.local_addr()?;
        info!(%addr, "Node listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(%addr, error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let node = self.node.clone();
                    let cancel = cancel.child_token();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(node, stream, cancel).await {
                            debug!(%peer, error = %e, "Connection ended with error");
                        }
                    });
                }
            }
        }

        info!(%addr, "Node listener stopped");
        Ok(())
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<NodeResult<()>> {
        tokio::spawn(self.serve(cancel))
    }
}

async fn handle_connection(node: LocalNode, stream: TcpStream, cancel: CancellationToken) -> NodeResult<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(request) = read_frame::<_, Request>(&mut reader).await? else {
        return Ok(());
    };
    debug!(?request, "Handling request");

    if let Request::Subscribe { group } = request {
        let mut events = match node.subscribe(group).await {
            Ok(events) => events,
            Err(e) => return write_frame(&mut writer, &Response::from_result(Err(e))).await,
        };
        write_frame(&mut writer, &Response::Ok { body: ResponseBody::Subscribed }).await?;

        // Clients send nothing after subscribing; end of stream means the
        // client went away.
        let mut scratch = [0u8; 64];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                read = reader.read(&mut scratch) => match read {
                    Ok(0) | Err(_) => {
                        debug!(group = %group, "Subscriber disconnected");
                        break;
                    }
                    Ok(_) => {}
                },
                event = events.recv() => match event {
                    Some(event) => write_frame(&mut writer, &event).await?,
                    None => break,
                },
            }
        }
        return Ok(());
    }

    let response = Response::from_result(dispatch(&node, request).await);
    write_frame(&mut writer, &response).await
}

async fn dispatch(node: &LocalNode, request: Request) -> NodeResult<ResponseBody> {
    match request {
        Request::DeviceInfo => node.device_info().await.map(ResponseBody::DeviceInfo),
        Request::DefaultDisplayName => node.default_display_name().await.map(ResponseBody::DisplayName),
        Request::CreateGroup { name } => node.create_group(&name).await.map(ResponseBody::Group),
        Request::JoinGroup { invitation } => node.join_group(&invitation).await.map(ResponseBody::Group),
        Request::GroupInvitation { group } => node.group_invitation(group).await.map(ResponseBody::Invitation),
        Request::Members { group } => node.members(group).await.map(ResponseBody::Members),
        Request::SendMessage { group, author, body } => node
            .send_message(group, &author, &body)
            .await
            .map(ResponseBody::MessageId),
        Request::History { group, limit } => node.history(group, limit).await.map(ResponseBody::History),
        Request::Subscribe { .. } => Err(NodeError::Protocol("subscribe needs a dedicated connection".to_string())),
    }
}
