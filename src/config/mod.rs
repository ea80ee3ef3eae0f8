pub mod prompt;

use std::sync::Arc;
use std::time::Duration;
use log::info;
use url::Url;

use crate::cli::Args;
use crate::error::{ ChatError, ChatResult };
use self::prompt::{ resolve_prompts, PromptConfig };

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub api_key: String,
    pub api_url: String,
    pub search_depth: String,
    pub max_results: usize,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_path: String,
    pub key_path: String,
}

/// Startup configuration after validation. Building one is the only place
/// credentials are checked; a missing key stops the process before it binds.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_addr: String,
    pub chat: ChatSettings,
    /// `None` when retrieval is switched off.
    pub search: Option<SearchSettings>,
    pub prompts: Arc<PromptConfig>,
    pub tls: Option<TlsSettings>,
}

fn require_key(value: &Option<String>, name: &str) -> ChatResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ChatError::Configuration(format!("{} is not set", name)))
}

fn require_url(value: &str, name: &str) -> ChatResult<String> {
    Url::parse(value)
        .map_err(|e| ChatError::Configuration(format!("{} '{}' is not a valid URL: {}", name, value, e)))?;
    Ok(value.to_string())
}

impl AppConfig {
    pub fn from_args(args: &Args) -> ChatResult<Self> {
        let connect_timeout = Duration::from_secs(args.connect_timeout_secs);

        if args.max_tokens == 0 {
            return Err(ChatError::Configuration("max tokens must be greater than zero".into()));
        }

        let chat = ChatSettings {
            api_key: require_key(&args.deepseek_api_key, "DEEPSEEK_API_KEY")?,
            api_url: require_url(&args.deepseek_api_url, "DEEPSEEK_API_URL")?,
            model: args.chat_model.clone(),
            max_tokens: args.max_tokens,
            connect_timeout,
        };

        let search = if args.enable_search {
            if args.search_max_results == 0 {
                return Err(
                    ChatError::Configuration("search max results must be greater than zero".into())
                );
            }
            Some(SearchSettings {
                api_key: require_key(&args.tavily_api_key, "TAVILY_API_KEY")?,
                api_url: require_url(&args.tavily_api_url, "TAVILY_API_URL")?,
                search_depth: args.search_depth.clone(),
                max_results: args.search_max_results,
                timeout: Duration::from_secs(args.search_timeout_secs),
                connect_timeout,
            })
        } else {
            None
        };

        let tls = if args.enable_tls {
            match (&args.tls_cert_path, &args.tls_key_path) {
                (Some(cert_path), Some(key_path)) =>
                    Some(TlsSettings { cert_path: cert_path.clone(), key_path: key_path.clone() }),
                (Some(_), None) | (None, Some(_)) => {
                    return Err(
                        ChatError::Configuration(
                            "Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into()
                        )
                    );
                }
                (None, None) => {
                    return Err(
                        ChatError::Configuration(
                            "--enable-tls was set but no certificate/key paths provided.".into()
                        )
                    );
                }
            }
        } else {
            None
        };

        let prompts = resolve_prompts(args.prompts_path.as_deref())?;

        Ok(Self {
            server_addr: args.server_addr.clone(),
            chat,
            search,
            prompts,
            tls,
        })
    }

    pub fn log_summary(&self) {
        info!("--- Core Configuration ---");
        info!("Server Address: {}", self.server_addr);
        info!("Chat Endpoint: {}", self.chat.api_url);
        info!("Chat Model: {}", self.chat.model);
        info!("Chat Max Tokens: {}", self.chat.max_tokens);
        info!("Chat API Key: {}", mask_secret(&self.chat.api_key));
        info!("Web Search Enabled: {}", self.search.is_some());
        if let Some(search) = &self.search {
            info!("Search Endpoint: {}", search.api_url);
            info!("Search Depth: {}", search.search_depth);
            info!("Search Max Results: {}", search.max_results);
            info!("Search Timeout: {:?}", search.timeout);
            info!("Search API Key: {}", mask_secret(&search.api_key));
        }
        info!("TLS Enabled: {}", self.tls.is_some());
        info!("-------------------------");
    }
}

/// Keeps the last four characters of a secret for log lines.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
