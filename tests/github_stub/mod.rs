use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GithubStubConfig {
    pub status: u16,
    pub body: String,
}

/// Serves a fixed response for `GET /repos/{owner}/{name}/commits`.
pub struct GithubStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GithubStub {
    pub fn spawn(config: GithubStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start github stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or(&url);
                if request.method() != &tiny_http::Method::Get
                    || !path.starts_with("/repos/")
                    || !path.ends_with("/commits")
                {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let accepts_github_json = request.headers().iter().any(|h| {
                    h.field.equiv("Accept") && h.value.as_str() == "application/vnd.github+json"
                });
                if !accepts_github_json {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing accept header")
                            .with_status_code(400),
                    );
                    continue;
                }

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(config.body.clone())
                    .with_status_code(config.status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for GithubStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
