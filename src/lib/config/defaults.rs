use std::time::Duration;

pub const DEFAULT_MODEL: &str = "qwen3:14b";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434";
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a capable AI agent with access to external tools.\n\
Use the tools whenever they help answer the request.\n\
If you do not know the answer, look it up or inspect the code with a tool.";
