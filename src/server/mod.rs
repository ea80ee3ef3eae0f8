pub mod api;

use crate::config::{ AppConfig, TlsSettings };
use crate::relay::CompletionRelay;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use log::info;

pub use api::{ build_router, AppState };

pub struct Server {
    addr: String,
    relay: Arc<CompletionRelay>,
    tls: Option<TlsSettings>,
}

impl Server {
    pub fn new(config: &AppConfig, relay: Arc<CompletionRelay>) -> Self {
        Self {
            addr: config.server_addr.clone(),
            relay,
            tls: config.tls.clone(),
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = build_router(AppState { relay: self.relay.clone() });

        match &self.tls {
            Some(tls) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    tls.cert_path,
                    tls.key_path
                );
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    &tls.cert_path,
                    &tls.key_path
                ).await?;

                info!("Chat server listening on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await?;
            }
            None => {
                let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
                    format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
                )?;
                info!("Chat server listening on: http://{}", addr);
                axum::serve(listener, app.into_make_service()).await?;
            }
        }

        Ok(())
    }
}
