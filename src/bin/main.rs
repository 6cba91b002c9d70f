#[cfg(not(target_arch = "wasm32"))]
mod native {
    extern crate circle;

    use actix_web::web;
    use anyhow::Context;
    use circle::config::{bind_addr, seed_demo_enabled, Config};
    use circle::core::db::seed_demo_data;
    use circle::server::{run as serve, ServerState};
    use tracing_subscriber::EnvFilter;

    fn init_logging() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();
    }

    pub async fn run() -> anyhow::Result<()> {
        dotenvy::dotenv().ok();
        init_logging();

        let config = Config::from_env().context("failed to load configuration")?;
        let state = web::Data::new(ServerState::new(config));

        if seed_demo_enabled() {
            seed_demo_data(&state.context()).context("failed to seed demo data")?;
        }

        let addr = bind_addr();
        serve(state, &addr).await.context("server stopped with an error")
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
