//! CLI channel — interactive terminal-based chat.
//!
//! Reads lines from stdin as messages of a single local conversation and
//! prints replies to stdout. Used for `parley chat`.

use async_trait::async_trait;
use parley_core::channel::{Channel, ChannelId, ChannelMessage};
use parley_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Conversation id used for the local terminal session.
pub const CLI_CHAT_ID: &str = "cli_session";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
    chat_id: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::with_chat_id(CLI_CHAT_ID)
    }

    /// A CLI channel bound to a specific conversation id.
    pub fn with_chat_id(chat_id: impl Into<String>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            chat_id: chat_id.into(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Build the message for one line of terminal input.
    pub fn message(&self, line: &str) -> ChannelMessage {
        let mut msg = ChannelMessage::text(self.id.0.clone(), self.chat_id.clone(), line);
        msg.sender_id = "local_user".into();
        msg.sender_name = Some("User".into());
        msg
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let template = self.message("");

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        if is_exit_command(&line) {
                            break;
                        }

                        let mut msg = template.clone();
                        msg.content = line;

                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        println!("{content}\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_properties() {
        let ch = CliChannel::new();
        assert_eq!(ch.name(), "cli");
        assert_eq!(ch.id().0, "cli");
        assert_eq!(ch.chat_id(), CLI_CHAT_ID);
    }

    #[test]
    fn messages_belong_to_the_session() {
        let ch = CliChannel::with_chat_id("demo");
        let msg = ch.message("hello");
        assert_eq!(msg.chat_id, "demo");
        assert_eq!(msg.sender_id, "local_user");
        assert_eq!(msg.content, "hello");
        assert!(!msg.from_self);
    }

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command(":q"));
        assert!(!is_exit_command("quit smoking tips?"));
    }

    #[tokio::test]
    async fn send_prints_ok() {
        let ch = CliChannel::new();
        assert!(ch.send(CLI_CHAT_ID, "Hello", None).await.is_ok());
    }
}
