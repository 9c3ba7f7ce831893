//! Wire protocol between remote clients and a served node
//!
//! Frames are single-line JSON documents terminated by `\n`. A connection
//! carries exactly one request followed by one response, except for
//! `Subscribe`, whose response is followed by a stream of event frames until
//! either side closes the connection.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use minichat_core::{
    ConversationMessage, DeviceId, DeviceInfo, GroupId, GroupInfo, MessageId, NodeError, NodeResult,
};

/// Largest frame accepted from a peer
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

// ----------------------------------------------------------------------------
// Frames
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    DeviceInfo,
    DefaultDisplayName,
    CreateGroup { name: String },
    JoinGroup { invitation: String },
    GroupInvitation { group: GroupId },
    Members { group: GroupId },
    SendMessage { group: GroupId, author: String, body: String },
    History { group: GroupId, limit: usize },
    Subscribe { group: GroupId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    DeviceInfo(DeviceInfo),
    DisplayName(String),
    Group(GroupInfo),
    Invitation(String),
    Members(Vec<DeviceId>),
    MessageId(MessageId),
    History(Vec<ConversationMessage>),
    Subscribed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { body: ResponseBody },
    Error { message: String },
}

impl Response {
    pub fn from_result(result: NodeResult<ResponseBody>) -> Self {
        match result {
            Ok(body) => Response::Ok { body },
            Err(err) => Response::Error {
                message: err.to_string(),
            },
        }
    }

    pub fn into_result(self) -> NodeResult<ResponseBody> {
        match self {
            Response::Ok { body } => Ok(body),
            Response::Error { message } => Err(NodeError::Remote(message)),
        }
    }
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Write one frame and flush it
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> NodeResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame, returning `None` on a clean end of stream
pub async fn read_frame<R, T>(reader: &mut R) -> NodeResult<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let read = (&mut *reader)
        .take(MAX_FRAME_LEN as u64 + 1)
        .read_line(&mut line)
        .await?;

    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') {
        if read > MAX_FRAME_LEN {
            return Err(NodeError::Protocol(format!("frame exceeds {} bytes", MAX_FRAME_LEN)));
        }
        return Err(NodeError::Protocol("connection closed mid-frame".to_string()));
    }

    Ok(Some(serde_json::from_str(line.trim_end())?))
}
