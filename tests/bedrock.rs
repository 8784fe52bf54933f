use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use langchain_ai_bedrock::{
    language_models::{llm::LLM, options::CallOptions},
    llm::{
        Bedrock, BedrockError, BedrockModel, BedrockTransport, ConverseBlock,
        ConverseEventStream, ConverseOutput, ConverseRequest, ConverseRole, ConverseToolChoice,
        ConverseUsage, EventStream, StreamEvent,
    },
    schemas::{FunctionCallBehavior, FunctionDefinition, Message, ToolCall},
};
use serde_json::{json, Value};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Answers every call with canned bodies and records what was sent.
#[derive(Default)]
struct FakeTransport {
    response: Value,
    frames: Vec<Result<Value, String>>,
    sent: Mutex<Vec<(String, Value, bool)>>,
    reply: ConverseOutput,
    events: Vec<Result<StreamEvent, String>>,
    conversed: Mutex<Vec<(String, ConverseRequest)>>,
}

impl FakeTransport {
    fn responding(response: Value) -> Arc<Self> {
        Arc::new(Self {
            response,
            ..Default::default()
        })
    }

    fn streaming(frames: Vec<Result<Value, String>>) -> Arc<Self> {
        Arc::new(Self {
            frames,
            ..Default::default()
        })
    }

    fn conversing(reply: ConverseOutput) -> Arc<Self> {
        Arc::new(Self {
            reply,
            ..Default::default()
        })
    }

    fn conversing_stream(events: Vec<Result<StreamEvent, String>>) -> Arc<Self> {
        Arc::new(Self {
            events,
            ..Default::default()
        })
    }

    fn last_request(&self) -> ConverseRequest {
        self.conversed.lock().unwrap().last().unwrap().1.clone()
    }

    fn last_body(&self) -> Value {
        self.sent.lock().unwrap().last().unwrap().1.clone()
    }

    fn was_streamed(&self) -> bool {
        self.sent.lock().unwrap().last().unwrap().2
    }
}

#[async_trait]
impl BedrockTransport for FakeTransport {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, BedrockError> {
        self.sent
            .lock()
            .unwrap()
            .push((model_id.to_string(), serde_json::from_slice(&body)?, false));
        Ok(self.response.to_string().into_bytes())
    }

    async fn invoke_streaming(
        &self,
        model_id: &str,
        body: Vec<u8>,
    ) -> Result<EventStream, BedrockError> {
        self.sent
            .lock()
            .unwrap()
            .push((model_id.to_string(), serde_json::from_slice(&body)?, true));
        let frames: Vec<_> = self
            .frames
            .iter()
            .map(|frame| match frame {
                Ok(value) => Ok(value.to_string().into_bytes()),
                Err(message) => Err(BedrockError::Transport(message.clone())),
            })
            .collect();
        Ok(Box::pin(stream::iter(frames)))
    }

    async fn converse(
        &self,
        model_id: &str,
        request: ConverseRequest,
    ) -> Result<ConverseOutput, BedrockError> {
        self.conversed
            .lock()
            .unwrap()
            .push((model_id.to_string(), request));
        Ok(self.reply.clone())
    }

    async fn converse_stream(
        &self,
        model_id: &str,
        request: ConverseRequest,
    ) -> Result<ConverseEventStream, BedrockError> {
        self.conversed
            .lock()
            .unwrap()
            .push((model_id.to_string(), request));
        let events: Vec<_> = self
            .events
            .iter()
            .map(|event| match event {
                Ok(event) => Ok(event.clone()),
                Err(message) => Err(BedrockError::Transport(message.clone())),
            })
            .collect();
        Ok(Box::pin(stream::iter(events)))
    }
}

fn bedrock(transport: &Arc<FakeTransport>) -> Bedrock {
    Bedrock::with_transport(transport.clone())
}

fn collecting_options() -> (CallOptions, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = CallOptions::new()
        .with_max_tokens(200)
        .with_streaming_func(move |chunk: String| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(chunk);
                Ok(())
            }
        });
    (options, seen)
}

#[tokio::test]
async fn test_anthropic_stream_story() {
    init_logger();
    let transport = FakeTransport::streaming(vec![
        Ok(json!({"type": "message_start", "message": {"usage": {"input_tokens": 10}}})),
        Ok(json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Once upon a time, "}})),
        Ok(json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "there was a brave knight."}})),
        Ok(json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 15}})),
    ]);
    let (options, seen) = collecting_options();

    let response = bedrock(&transport)
        .create_completion(
            BedrockModel::Claude3Haiku.as_str(),
            &[Message::new_human_message("Tell me a story")],
            &options,
        )
        .await
        .unwrap();

    assert!(transport.was_streamed());
    let choice = &response.choices[0];
    assert_eq!(choice.content, "Once upon a time, there was a brave knight.");
    assert_eq!(choice.stop_reason, "end_turn");
    assert_eq!(choice.generation_info["input_tokens"], json!(10));
    assert_eq!(choice.generation_info["output_tokens"], json!(15));
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["Once upon a time, ", "there was a brave knight."]
    );
}

#[tokio::test]
async fn test_nova_stream() {
    init_logger();
    let transport = FakeTransport::streaming(vec![
        Ok(json!({"messageStart": {"role": "assistant"}})),
        Ok(json!({"contentBlockDelta": {"delta": {"text": "Hello"}, "contentBlockIndex": 0}})),
        Ok(json!({"contentBlockStop": {"contentBlockIndex": 0}})),
        Ok(json!({"messageStop": {"stopReason": "end_turn"}})),
        Ok(json!({"metadata": {"usage": {"inputTokens": 3, "outputTokens": 1}}})),
    ]);
    let (options, seen) = collecting_options();

    let response = bedrock(&transport)
        .create_completion(
            "us.amazon.nova-lite-v1:0",
            &[Message::new_human_message("Hi")],
            &options,
        )
        .await
        .unwrap();

    assert_eq!(transport.last_body()["inferenceConfig"]["maxTokens"], json!(200));
    let choice = &response.choices[0];
    assert_eq!(choice.content, "Hello");
    assert_eq!(choice.stop_reason, "end_turn");
    assert_eq!(choice.token_usage().unwrap().total_tokens, 4);
    assert_eq!(*seen.lock().unwrap(), vec!["Hello"]);
}

#[tokio::test]
async fn test_stream_error_returns_partial() {
    let transport = FakeTransport::streaming(vec![
        Ok(json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Once"}})),
        Err("connection reset".to_string()),
    ]);
    let (options, _) = collecting_options();

    let err = bedrock(&transport)
        .create_completion(
            "anthropic.claude-v2",
            &[Message::new_human_message("Hi")],
            &options,
        )
        .await
        .unwrap_err();

    assert_eq!(err.partial_response().unwrap().choices[0].content, "Once");
}

#[tokio::test]
async fn test_stream_tool_call_with_args_before_start() {
    let transport = FakeTransport::streaming(vec![
        Ok(json!({"type": "content_block_delta", "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}})),
        Ok(json!({"type": "content_block_start", "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather"}})),
        Ok(json!({"type": "content_block_delta", "delta": {"type": "input_json_delta", "partial_json": "\"Paris\"}"}})),
        Ok(json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}})),
    ]);
    let (options, seen) = collecting_options();

    let response = bedrock(&transport)
        .create_completion(
            "anthropic.claude-3-haiku-20240307-v1:0",
            &[Message::new_human_message("Weather in Paris?")],
            &options,
        )
        .await
        .unwrap();

    assert_eq!(
        response.choices[0].tool_calls,
        vec![ToolCall::new("toolu_1", "get_weather", "{\"city\":\"Paris\"}")]
    );
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_anthropic_tool_round_trip_request() {
    let transport = FakeTransport::responding(json!({
        "content": [{"type": "text", "text": "It is sunny in Paris."}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 40, "output_tokens": 8}
    }));
    let options = CallOptions::new()
        .with_max_tokens(100)
        .with_functions(vec![FunctionDefinition::new(
            "get_weather",
            "Current weather",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        )])
        .with_function_call_behavior(FunctionCallBehavior::Auto);
    let messages = [
        Message::new_system_message("Use tools."),
        Message::new_human_message("Weather in Paris?"),
        Message::new_ai_message("")
            .with_part(langchain_ai_bedrock::schemas::ContentPart::ToolCall(
                ToolCall::new("toolu_1", "get_weather", "{\"city\":\"Paris\"}"),
            )),
        Message::new_tool_message("toolu_1", "get_weather", "sunny"),
    ];

    let response = bedrock(&transport)
        .create_completion(BedrockModel::Claude35Sonnet.as_str(), &messages, &options)
        .await
        .unwrap();

    assert_eq!(response.choices[0].content, "It is sunny in Paris.");
    let body = transport.last_body();
    assert_eq!(body["system"], json!("Use tools."));
    assert_eq!(body["tool_choice"], json!({"type": "auto"}));
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
    assert_eq!(body["messages"][1]["content"][1]["type"], json!("tool_use"));
    assert_eq!(body["messages"][2]["content"][0]["type"], json!("tool_result"));
}

#[tokio::test]
async fn test_empty_results_per_provider() {
    let cases = [
        ("ai21.j2-ultra-v1", json!({"id": 1, "prompt": {"tokens": []}, "completions": []}), "no completions"),
        ("amazon.titan-text-lite-v1", json!({"inputTextTokenCount": 1, "results": []}), "no results"),
        ("cohere.command-text-v14", json!({"id": "x", "prompt": "p", "generations": []}), "no generations"),
        ("anthropic.claude-v2", json!({"content": [], "stop_reason": "end_turn"}), "no results"),
        ("amazon.nova-pro-v1:0", json!({"output": {"message": {"content": []}}, "stopReason": "end_turn"}), "no results"),
    ];

    for (model_id, response, expected) in cases {
        let transport = FakeTransport::responding(response);
        let err = bedrock(&transport)
            .create_completion(
                model_id,
                &[Message::new_human_message("Hi")],
                &CallOptions::new().with_max_tokens(10),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, BedrockError::EmptyResult(reason) if reason == expected),
            "{}",
            model_id
        );
    }
}

#[tokio::test]
async fn test_generate_through_llm_trait() {
    let transport = FakeTransport::responding(json!({
        "generation": "Rust is a systems language.",
        "prompt_token_count": 6,
        "generation_token_count": 5,
        "stop_reason": "stop"
    }));
    let mut llm = bedrock(&transport).with_model(BedrockModel::Llama38BInstruct);
    llm.add_options(CallOptions::new().with_max_tokens(64).with_temperature(0.5));

    let result = llm.generate(&[Message::new_human_message("What is Rust?")]).await.unwrap();

    assert_eq!(result.generation, "Rust is a systems language.");
    assert_eq!(result.tokens.unwrap().total_tokens, 11);
    assert_eq!(
        transport.last_body(),
        json!({
            "prompt": "\nhuman: What is Rust?\nAI: ",
            "temperature": 0.5,
            "max_gen_len": 64
        })
    );
}

fn weather_tool_options() -> CallOptions {
    CallOptions::new()
        .with_max_tokens(100)
        .with_functions(vec![FunctionDefinition::new(
            "get_weather",
            "Current weather",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        )])
        .with_function_call_behavior(FunctionCallBehavior::Named("get_weather".to_string()))
}

#[tokio::test]
async fn test_converse_tool_use_output() {
    init_logger();
    let transport = FakeTransport::conversing(ConverseOutput {
        content: Some(vec![
            ConverseBlock::Text("Checking.".to_string()),
            ConverseBlock::ToolUse {
                id: "tooluse_1".to_string(),
                name: "get_weather".to_string(),
                input: json!({"city": "Paris"}),
            },
        ]),
        stop_reason: "tool_use".to_string(),
        usage: ConverseUsage {
            input_tokens: 30,
            output_tokens: 12,
            total_tokens: 42,
        },
        latency_ms: 250,
    });
    let messages = [
        Message::new_system_message("Use tools."),
        Message::new_human_message("Weather in Paris?"),
    ];

    let response = bedrock(&transport)
        .converse(
            "mistral.mistral-large-2402-v1:0",
            &messages,
            &weather_tool_options(),
        )
        .await
        .unwrap();

    let choice = response.first().unwrap();
    assert_eq!(choice.content, "Checking.");
    assert_eq!(choice.stop_reason, "tool_use");
    assert_eq!(
        choice.tool_calls,
        vec![ToolCall::new("tooluse_1", "get_weather", "{\"city\":\"Paris\"}")]
    );
    assert_eq!(choice.generation_info["total_tokens"], json!(42));
    assert_eq!(choice.generation_info["latency_ms"], json!(250));

    let request = transport.last_request();
    assert_eq!(request.system, vec!["Use tools.".to_string()]);
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, ConverseRole::User);
    assert_eq!(request.inference_config.max_tokens, Some(100));
    let tool_config = request.tool_config.unwrap();
    assert_eq!(tool_config.tools[0].name, "get_weather");
    assert_eq!(
        tool_config.tool_choice,
        Some(ConverseToolChoice::Tool("get_weather".to_string()))
    );
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_converse_stream_tool_call_chunks() {
    init_logger();
    let transport = FakeTransport::conversing_stream(vec![
        Ok(StreamEvent::Ignored("messageStart".to_string())),
        Ok(StreamEvent::TextDelta("Let me check. ".to_string())),
        Ok(StreamEvent::ToolUseStart {
            id: "tooluse_1".to_string(),
            name: "get_weather".to_string(),
        }),
        Ok(StreamEvent::ToolInputDelta("{\"city\":".to_string())),
        Ok(StreamEvent::ToolInputDelta("\"Paris\"}".to_string())),
        Ok(StreamEvent::MessageDelta {
            stop_reason: Some("tool_use".to_string()),
            output_tokens: None,
        }),
        Ok(StreamEvent::Metadata {
            input_tokens: 30,
            output_tokens: 12,
            total_tokens: 42,
            latency_ms: 310,
        }),
    ]);
    let (options, seen) = collecting_options();

    let response = bedrock(&transport)
        .converse(
            BedrockModel::Claude35Sonnet.as_str(),
            &[Message::new_human_message("Weather in Paris?")],
            &options,
        )
        .await
        .unwrap();

    let choice = response.first().unwrap();
    assert_eq!(choice.content, "Let me check. ");
    assert_eq!(choice.stop_reason, "tool_use");
    assert_eq!(
        choice.tool_calls,
        vec![ToolCall::new("tooluse_1", "get_weather", "{\"city\":\"Paris\"}")]
    );
    assert_eq!(choice.generation_info["output_tokens"], json!(12));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0], "Let me check. ");
    let start: Value = serde_json::from_str(&seen[1]).unwrap();
    assert_eq!(start[0]["id"], json!("tooluse_1"));
    assert_eq!(start[0]["function"]["name"], json!("get_weather"));
    let fragment: Value = serde_json::from_str(&seen[2]).unwrap();
    assert_eq!(fragment[0]["function"]["arguments"], json!("{\"city\":"));
    assert_eq!(fragment[0]["id"], json!(""));
}

#[tokio::test]
async fn test_generate_through_converse() {
    let transport = FakeTransport::conversing(ConverseOutput {
        content: Some(vec![ConverseBlock::Text("Bonjour".to_string())]),
        stop_reason: "end_turn".to_string(),
        ..Default::default()
    });
    let llm = bedrock(&transport)
        .with_model("cohere.command-r-v1:0")
        .with_converse(true);

    let response = llm
        .generate_content(&[Message::new_human_message("Say hello in French")])
        .await
        .unwrap();

    assert_eq!(response.first().unwrap().content, "Bonjour");
    assert_eq!(
        transport.conversed.lock().unwrap()[0].0,
        "cohere.command-r-v1:0"
    );
}

#[tokio::test]
async fn test_converse_rejects_none_tool_choice() {
    let transport = FakeTransport::conversing(ConverseOutput::default());
    let options = CallOptions::new()
        .with_functions(vec![FunctionDefinition::new("f", "", json!({}))])
        .with_function_call_behavior(FunctionCallBehavior::None);

    let err = bedrock(&transport)
        .converse("amazon.nova-lite-v1:0", &[Message::new_human_message("Hi")], &options)
        .await
        .unwrap_err();

    assert!(matches!(err, BedrockError::UnsupportedToolChoice(ref choice) if choice == "none"));
    assert!(transport.conversed.lock().unwrap().is_empty());
}

