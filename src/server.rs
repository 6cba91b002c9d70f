//! Native HTTP server: actix-web in front of the same router the Spin
//! component uses, backed by the in-memory repository.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use spin_sdk::http::{Method, Request, Response};
use tracing_actix_web::TracingLogger;

use crate::config::Config;
use crate::handlers::route;
use crate::store::MemoryRepository;
use crate::AppContext;

pub struct ServerState {
    pub repo: MemoryRepository,
    pub config: Config,
}

impl ServerState {
    pub fn new(config: Config) -> Self {
        Self {
            repo: MemoryRepository::new(),
            config,
        }
    }

    pub fn context(&self) -> AppContext<'_> {
        AppContext::new(&self.repo, &self.config)
    }
}

mod adapter {
    use super::*;

    pub fn actix_to_spin_request(req: &HttpRequest, body: web::Bytes) -> Request {
        let method = match req.method().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => Method::Get,
        };

        let uri = req.uri().to_string();

        let mut builder = Request::builder();
        builder.method(method).uri(&uri);
        for (name, value) in req.headers() {
            if let Ok(val_str) = value.to_str() {
                builder.header(name.as_str(), val_str);
            }
        }
        builder.body(body.to_vec()).build()
    }

    pub fn spin_to_actix_response(spin_resp: Response) -> HttpResponse {
        let status = actix_web::http::StatusCode::from_u16(*spin_resp.status())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

        HttpResponse::build(status)
            .content_type("application/json")
            .body(spin_resp.body().to_vec())
    }
}

pub async fn handle_all(state: web::Data<ServerState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let spin_req = adapter::actix_to_spin_request(&req, body);
    let response = route(&state.context(), &spin_req);
    adapter::spin_to_actix_response(response)
}

pub async fn run(state: web::Data<ServerState>, addr: &str) -> std::io::Result<()> {
    tracing::info!(addr, "server listening");

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .default_service(web::route().to(handle_all))
    })
    .bind(addr)?
    .run()
    .await
}
