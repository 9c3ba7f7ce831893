//! Line-based interactive session
//!
//! Reads one line at a time from the terminal. Lines starting with `/` are
//! commands, everything else is posted to the group. Incoming group events are
//! printed as they arrive.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use minichat_core::{DeviceId, GroupInfo, NodeEvent};

use crate::error::{CliError, Result};
use crate::launcher::SessionLoop;
use crate::session::SessionConfig;

/// Messages replayed when a session starts
pub const HISTORY_ON_START: usize = 20;

const HELP: &str = "\
commands:
  /help           show this help
  /invite         print the group invitation
  /members        list group members
  /name <name>    change your display name
  /quit           leave the session";

// ----------------------------------------------------------------------------
// Input Parsing
// ----------------------------------------------------------------------------

/// What a line typed by the user asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Empty,
    Send(String),
    Help,
    Invite,
    Members,
    Rename(String),
    Quit,
    Unknown(String),
}

pub fn parse_input(line: &str) -> InputAction {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return InputAction::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return InputAction::Send(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "help" | "?" => InputAction::Help,
        "invite" => InputAction::Invite,
        "members" => InputAction::Members,
        "name" if !arg.is_empty() => InputAction::Rename(arg.to_string()),
        "quit" | "exit" => InputAction::Quit,
        _ => InputAction::Unknown(line.to_string()),
    }
}

/// Render a node event as one terminal line
pub fn render_event(event: &NodeEvent, me: DeviceId) -> String {
    match event {
        NodeEvent::MessageReceived { message } if message.sender == me => {
            format!("<{}> {}", message.author, message.body)
        }
        NodeEvent::MessageReceived { message } => {
            format!("<{}@{}> {}", message.author, message.sender, message.body)
        }
        NodeEvent::MemberJoined { device, .. } if *device == me => "* you joined the group".to_string(),
        NodeEvent::MemberJoined { device, .. } => format!("* {} joined the group", device),
    }
}

// ----------------------------------------------------------------------------
// Terminal Session
// ----------------------------------------------------------------------------

/// Interactive loop over a line reader and a writer
pub struct TerminalSession<R, W> {
    input: R,
    output: W,
}

impl TerminalSession<BufReader<Stdin>, Stdout> {
    /// Session bound to the process terminal
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

async fn enter_group(config: &SessionConfig) -> Result<GroupInfo> {
    let protocol = config.protocol_client();
    let group = if config.creates_group() {
        protocol.create_group("").await?
    } else {
        protocol.join_group(config.group_invitation()).await?
    };
    info!(group = %group.id, name = %group.name, created = config.creates_group(), "Entered group");
    Ok(group)
}

#[async_trait]
impl<R, W> SessionLoop for TerminalSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn run(&mut self, cancel: CancellationToken, config: SessionConfig) -> Result<()> {
        let messenger = config.messenger_client().clone();
        let protocol = config.protocol_client().clone();
        let output = &mut self.output;

        let me = protocol.device_info().await?.device_id;
        let mut display_name = if config.display_name().is_empty() {
            messenger.default_display_name().await?
        } else {
            config.display_name().to_string()
        };

        let group = enter_group(&config).await?;
        let invitation = protocol.group_invitation(group.id).await?;
        let verb = if config.creates_group() { "created" } else { "joined" };
        say(output, &format!("{} group {} ({})", verb, group.name, group.id.short())).await?;
        say(output, &format!("invitation: {}", invitation)).await?;
        say(output, &format!("you are {} - type /help for commands", display_name)).await?;

        // Subscribe before replaying so nothing posted in between is lost.
        // Messages that show up in both are printed once.
        let mut events = messenger.subscribe(group.id).await?;
        let mut replayed = HashSet::new();
        for message in messenger.history(group.id, HISTORY_ON_START).await? {
            replayed.insert(message.id);
            say(output, &render_event(&NodeEvent::MessageReceived { message }, me)).await?;
        }

        let mut lines = (&mut self.input).lines();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Session cancelled");
                    say(output, "interrupted, leaving").await?;
                    break;
                }
                event = events.recv() => match event {
                    Some(NodeEvent::MessageReceived { message }) if replayed.remove(&message.id) => {}
                    Some(event) => say(output, &render_event(&event, me)).await?,
                    None => {
                        warn!(group = %group.id, "Node event stream closed");
                        return Err(CliError::Session("node event stream closed".to_string()));
                    }
                },
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Terminal input closed");
                        break;
                    };

                    match parse_input(&line) {
                        InputAction::Empty => {}
                        InputAction::Send(body) => {
                            if let Err(e) = messenger.send_message(group.id, &display_name, &body).await {
                                warn!(error = %e, "Failed to send message");
                                say(output, &format!("! message not sent: {}", e)).await?;
                            }
                        }
                        InputAction::Help => say(output, HELP).await?,
                        InputAction::Invite => say(output, &format!("invitation: {}", invitation)).await?,
                        InputAction::Members => {
                            let members = protocol.members(group.id).await?;
                            say(output, &format!("{} member(s):", members.len())).await?;
                            for member in members {
                                let marker = if member == me { " (you)" } else { "" };
                                say(output, &format!("  {}{}", member, marker)).await?;
                            }
                        }
                        InputAction::Rename(name) => {
                            say(output, &format!("* {} is now known as {}", display_name, name)).await?;
                            display_name = name;
                        }
                        InputAction::Quit => break,
                        InputAction::Unknown(input) => {
                            say(output, &format!("! unknown command {:?}, try /help", input)).await?;
                        }
                    }
                }
            }
        }

        info!(group = %group.id, "Session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LoggingPolicy, SessionLogger};
    use minichat_core::{
        ConversationMessage, GroupId, MessageId, MessengerClient, NodeResult, ProtocolClient,
    };
    use minichat_node::{LocalNode, NodeConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Messenger whose group receives posts around every history read
    struct BusyGroup {
        node: LocalNode,
    }

    #[async_trait]
    impl MessengerClient for BusyGroup {
        async fn default_display_name(&self) -> NodeResult<String> {
            self.node.default_display_name().await
        }

        async fn send_message(&self, group: GroupId, author: &str, body: &str) -> NodeResult<MessageId> {
            self.node.send_message(group, author, body).await
        }

        async fn history(&self, group: GroupId, limit: usize) -> NodeResult<Vec<ConversationMessage>> {
            self.node.send_message(group, "bob", "racing").await?;
            let history = self.node.history(group, limit).await?;
            self.node.send_message(group, "bob", "in between").await?;
            Ok(history)
        }

        async fn subscribe(&self, group: GroupId) -> NodeResult<mpsc::Receiver<NodeEvent>> {
            self.node.subscribe(group).await
        }
    }

    #[tokio::test]
    async fn test_messages_around_history_replay_are_shown_once() {
        let node = LocalNode::new(NodeConfig::default().with_display_name("zoe"));
        let group = node.create_group("busy").await.unwrap();
        node.send_message(group.id, "bob", "earlier").await.unwrap();
        let token = node.group_invitation(group.id).await.unwrap();

        let config = SessionConfig::builder(SessionLogger::init(LoggingPolicy::default()).unwrap())
            .group_invitation(token)
            .messenger_client(Arc::new(BusyGroup { node: node.clone() }))
            .protocol_client(Arc::new(node))
            .build()
            .unwrap();

        let (_keyboard, terminal) = tokio::io::duplex(64);
        let mut session = TerminalSession::new(BufReader::new(terminal), Vec::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        session.run(cancel, config).await.unwrap();

        let output = String::from_utf8(session.into_output()).unwrap();
        assert_eq!(output.matches("<bob> earlier").count(), 1);
        assert_eq!(output.matches("<bob> racing").count(), 1);
        assert_eq!(output.matches("<bob> in between").count(), 1, "{}", output);
    }

    #[test]
    fn test_plain_lines_are_messages() {
        assert_eq!(parse_input("hello world\n"), InputAction::Send("hello world".to_string()));
        assert_eq!(parse_input("  indented  "), InputAction::Send("  indented  ".to_string()));
        assert_eq!(parse_input("   \r\n"), InputAction::Empty);
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_input("/help"), InputAction::Help);
        assert_eq!(parse_input("/invite"), InputAction::Invite);
        assert_eq!(parse_input("/members"), InputAction::Members);
        assert_eq!(parse_input("/name  Zoe  "), InputAction::Rename("Zoe".to_string()));
        assert_eq!(parse_input("/quit"), InputAction::Quit);
        assert_eq!(parse_input("/exit"), InputAction::Quit);
    }

    #[test]
    fn test_bad_commands_are_unknown() {
        assert_eq!(parse_input("/name"), InputAction::Unknown("/name".to_string()));
        assert_eq!(parse_input("/dance now"), InputAction::Unknown("/dance now".to_string()));
    }

    #[test]
    fn test_render_marks_foreign_senders() {
        let me = DeviceId::new([1; 8]);
        let other = DeviceId::new([2; 8]);
        let group = GroupId::new([0; 16]);

        let mine = NodeEvent::MessageReceived {
            message: ConversationMessage::new(group, me, "ann", "hi"),
        };
        assert_eq!(render_event(&mine, me), "<ann> hi");

        let theirs = NodeEvent::MessageReceived {
            message: ConversationMessage::new(group, other, "bo", "hey"),
        };
        assert_eq!(render_event(&theirs, me), "<bo@0202020202020202> hey");

        let joined = NodeEvent::MemberJoined { group, device: other };
        assert_eq!(render_event(&joined, me), "* 0202020202020202 joined the group");
    }
}
