use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API Key for the DeepSeek chat completion API. Required.
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    pub deepseek_api_key: Option<String>,

    /// Full URL of the chat completion endpoint.
    #[arg(long, env = "DEEPSEEK_API_URL", default_value = "https://api.deepseek.com/v1/chat/completions")]
    pub deepseek_api_url: String,

    /// Model name for chat completion (e.g., deepseek-reasoner, deepseek-chat)
    #[arg(long, env = "CHAT_MODEL", default_value = "deepseek-reasoner")]
    pub chat_model: String,

    /// Upper bound on generated tokens per answer.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "4000")]
    pub max_tokens: u32,

    // --- Web Search Args ---
    /// API Key for the Tavily search API. Required while search is enabled.
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    pub tavily_api_key: Option<String>,

    /// Full URL of the search endpoint.
    #[arg(long, env = "TAVILY_API_URL", default_value = "https://api.tavily.com/search")]
    pub tavily_api_url: String,

    /// Augment chat prompts with web search results (true/false).
    #[arg(long, env = "ENABLE_SEARCH", default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_search: bool,

    /// Search depth requested from the provider (basic, advanced)
    #[arg(long, env = "SEARCH_DEPTH", default_value = "advanced")]
    pub search_depth: String,

    /// Number of search results injected into the prompt.
    #[arg(long, env = "SEARCH_MAX_RESULTS", default_value = "5")]
    pub search_max_results: usize,

    /// Seconds to wait for the search provider before answering without sources.
    #[arg(long, env = "SEARCH_TIMEOUT_SECS", default_value = "15")]
    pub search_timeout_secs: u64,

    /// Seconds to wait for a TCP/TLS connection to either provider.
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub connect_timeout_secs: u64,

    // --- General App Args ---
    /// Path to a JSON file overriding the built-in system instructions.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
