use std::fmt;

use crate::schemas::{ContentPart, Message, MessageType};

use super::BedrockError;

/// Well known Bedrock model ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedrockModel {
    /// Claude 3.5 Sonnet
    Claude35Sonnet,
    /// Claude 3 Opus
    Claude3Opus,
    /// Claude 3 Sonnet
    Claude3Sonnet,
    /// Claude 3 Haiku
    Claude3Haiku,
    /// Llama 2 70B Chat
    Llama270BChat,
    /// Llama 3 70B Instruct
    Llama370BInstruct,
    /// Llama 3 8B Instruct
    Llama38BInstruct,
    /// Titan Text G1 Lite
    TitanTextG1Lite,
    /// Titan Text G1 Express
    TitanTextG1Express,
    /// Jurassic-2 Ultra
    Jurassic2Ultra,
    /// Jurassic-2 Mid
    Jurassic2Mid,
    /// Command
    CohereCommand,
    /// Command Light
    CohereCommandLight,
    /// Nova Micro
    NovaMicro,
    /// Nova Lite
    NovaLite,
    /// Nova Pro
    NovaPro,
}

impl BedrockModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedrockModel::Claude35Sonnet => "anthropic.claude-3-5-sonnet-20240620-v1:0",
            BedrockModel::Claude3Opus => "anthropic.claude-3-opus-20240229-v1:0",
            BedrockModel::Claude3Sonnet => "anthropic.claude-3-sonnet-20240229-v1:0",
            BedrockModel::Claude3Haiku => "anthropic.claude-3-haiku-20240307-v1:0",
            BedrockModel::Llama270BChat => "meta.llama2-70b-chat-v1",
            BedrockModel::Llama370BInstruct => "meta.llama3-70b-instruct-v1:0",
            BedrockModel::Llama38BInstruct => "meta.llama3-8b-instruct-v1:0",
            BedrockModel::TitanTextG1Lite => "amazon.titan-text-lite-v1",
            BedrockModel::TitanTextG1Express => "amazon.titan-text-express-v1",
            BedrockModel::Jurassic2Ultra => "ai21.j2-ultra-v1",
            BedrockModel::Jurassic2Mid => "ai21.j2-mid-v1",
            BedrockModel::CohereCommand => "cohere.command-text-v14",
            BedrockModel::CohereCommandLight => "cohere.command-light-text-v14",
            BedrockModel::NovaMicro => "amazon.nova-micro-v1:0",
            BedrockModel::NovaLite => "amazon.nova-lite-v1:0",
            BedrockModel::NovaPro => "amazon.nova-pro-v1:0",
        }
    }
}

impl fmt::Display for BedrockModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BedrockModel> for String {
    fn from(model: BedrockModel) -> Self {
        model.as_str().to_string()
    }
}

/// One part of a conversation turn, tagged with the role of its turn.
///
/// A message without a role is allowed for the flat text prompt, where it
/// is written without a `role: ` prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct BedrockMessage {
    pub role: Option<MessageType>,
    pub part: ContentPart,
}

impl BedrockMessage {
    pub fn new(role: Option<MessageType>, part: ContentPart) -> Self {
        Self { role, part }
    }

    pub fn text<S: Into<String>>(role: Option<MessageType>, text: S) -> Self {
        Self::new(role, ContentPart::text(text))
    }
}

/// Flatten caller messages into one provider message per part.
pub fn process_messages(messages: &[Message]) -> Vec<BedrockMessage> {
    messages
        .iter()
        .flat_map(|message| {
            message
                .parts
                .iter()
                .map(|part| BedrockMessage::new(Some(message.message_type), part.clone()))
        })
        .collect()
}

/// Render messages as a single text prompt.
///
/// Each message with a role opens a `"\n<role>: "` line, text parts are
/// appended as-is and every other part is dropped. When any role was
/// written the prompt ends with `"\nAI: "` to cue the reply.
pub(crate) fn process_input_messages_generic(messages: &[BedrockMessage]) -> String {
    let mut prompt = String::new();
    let mut has_role = false;
    for message in messages {
        if let Some(role) = message.role {
            has_role = true;
            prompt.push('\n');
            prompt.push_str(role.as_str());
            prompt.push_str(": ");
        }
        if let ContentPart::Text { text } = &message.part {
            prompt.push_str(text);
        }
    }
    if has_role {
        prompt.push_str("\nAI: ");
    }
    prompt
}

/// Turn roles of the structured-message providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnRole {
    System,
    User,
    Assistant,
}

impl TurnRole {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TurnRole::System => "system",
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// A maximal run of consecutive messages that map to the same turn role.
#[derive(Debug)]
pub(crate) struct RoleChunk<'a> {
    pub role: TurnRole,
    pub messages: Vec<&'a BedrockMessage>,
}

/// Group consecutive messages by mapped role.
pub(crate) fn chunk_by_role<'a, F>(
    messages: &'a [BedrockMessage],
    map_role: F,
) -> Result<Vec<RoleChunk<'a>>, BedrockError>
where
    F: Fn(Option<MessageType>) -> Result<TurnRole, BedrockError>,
{
    messages
        .iter()
        .try_fold(Vec::<RoleChunk<'a>>::new(), |mut chunks, message| {
            let role = map_role(message.role)?;
            match chunks.last_mut() {
                Some(chunk) if chunk.role == role => chunk.messages.push(message),
                _ => chunks.push(RoleChunk {
                    role,
                    messages: vec![message],
                }),
            }
            Ok(chunks)
        })
}
