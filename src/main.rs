use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use housing_desk::{create_app, db, docs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Listener settings read from `APP_PORT`, `TLS_CERT_PATH` and `TLS_KEY_PATH`.
struct ServerConfig {
    port: u16,
    tls: Option<(PathBuf, PathBuf)>,
}

impl ServerConfig {
    fn from_env() -> Self {
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(8000);

        // both halves or plain http
        let tls = std::env::var_os("TLS_CERT_PATH")
            .zip(std::env::var_os("TLS_KEY_PATH"))
            .map(|(cert, key)| (PathBuf::from(cert), PathBuf::from(key)));

        Self { port, tls }
    }

    fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    async fn serve(self, app: Router) -> anyhow::Result<()> {
        let addr = self.addr();

        let Some((cert, key)) = self.tls else {
            tracing::info!(%addr, "serving http");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("cannot bind {addr}"))?;
            axum::serve(listener, app.into_make_service()).await?;
            return Ok(());
        };

        let rustls = RustlsConfig::from_pem_file(&cert, &key).await.with_context(|| {
            format!("cannot load tls pair {} / {}", cert.display(), key.display())
        })?;
        tracing::info!(%addr, "serving https");
        axum_server::bind_rustls(addr, rustls)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let config = ServerConfig::from_env();
    let pool = db::init().await?;
    let app = create_app(pool)
        .await?
        .merge(docs::swagger_routes(docs::build_openapi(config.port)?)?);

    config.serve(app).await
}

/// `.env` in the working directory wins over the one next to Cargo.toml.
fn load_env() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
