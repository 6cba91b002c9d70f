pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod handlers;
pub mod models;
pub mod posts;
pub mod store;
pub mod users;
pub mod visibility;

#[cfg(not(target_arch = "wasm32"))]
pub mod server;

use crate::config::Config;
use crate::store::Repository;

/// What every operation needs: the data-access handle and the runtime
/// settings. Built per request by whichever surface received it.
#[derive(Clone, Copy)]
pub struct AppContext<'a> {
    pub repo: &'a dyn Repository,
    pub config: &'a Config,
}

impl<'a> AppContext<'a> {
    pub fn new(repo: &'a dyn Repository, config: &'a Config) -> Self {
        Self { repo, config }
    }
}

// === Spin component entrypoint ===
#[cfg(target_arch = "wasm32")]
mod component {
    use spin_sdk::http::{IntoResponse, Request};
    use spin_sdk::http_component;

    use crate::config::Config;
    use crate::handlers::route;
    use crate::store::KvRepository;
    use crate::AppContext;

    #[http_component]
    fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
        let config = Config::from_env()?;
        let repo = KvRepository::open_default()?;
        Ok(route(&AppContext::new(&repo, &config), &req))
    }
}
