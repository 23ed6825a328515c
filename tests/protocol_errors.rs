//! `spec.md` §8, concrete scenarios 1, 3, 5: malformed and unsupported requests are answered with
//! the right status and the connection is closed rather than left open to desync on the next read.

use std::{cell::RefCell, rc::Rc, time::Duration};

use bytes::Bytes;
use tokio::task::LocalSet;

use http1_core::{
    clock::{Clock, SystemClock},
    h1::date::DateState,
    net::{mock::MockEndpoint, Connection},
    reactor::executor::{LocalExecutor, SpawnLocalExecutor},
    HandlerError, HttpRequest, HttpResponse, ServerConfig, Transport,
};

struct EchoPath;

#[async_trait::async_trait(?Send)]
impl http1_core::HttpHandler for EchoPath {
    async fn invoke(&self, request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
        request.mark_handled();
        response.set_status(200);
        let body = Bytes::copy_from_slice(format!("{}\n", request.uri()).as_bytes());
        response.set_fixed_length(body.len() as u64);
        response.write(body).await.ok();
        response.complete();
        Ok(())
    }
}

fn transport() -> Transport<EchoPath> {
    let date = Rc::new(RefCell::new(DateState::new()));
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
    Transport::new(Rc::new(EchoPath), executor, &ServerConfig::default(), date, clock, None)
}

#[tokio::test]
async fn explicit_connection_close_is_honored_and_ends_the_connection() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            ep.push_inbound(b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n");

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 200 OK"));
            assert!(text.contains("connection: close"));
            assert!(!ep.is_open(), "connection must be closed after an explicit close request");
        })
        .await;
}

#[tokio::test]
async fn malformed_request_line_gets_400_and_connection_closes() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            // a bare CR inside the URI shifts the parser onto the HTTP/0.9 path, which then
            // rejects the trailing CRLF as malformed trailing data — still a 400, just via a
            // different internal path than an ordinary garbled request line.
            ep.push_inbound(b"GET /\r\n\r\n");

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 400 Bad Request"), "got: {text}");
            assert!(text.contains("connection: close"));
            assert!(!ep.is_open());
        })
        .await;
}

#[tokio::test]
async fn unsupported_http_version_gets_505_and_connection_closes() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            ep.push_inbound(b"GET / HTTP/2.0\r\n\r\n");

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 505 HTTP Version Not Supported"), "got: {text}");
            assert!(text.contains("connection: close"));
            assert!(!ep.is_open());
        })
        .await;
}

#[tokio::test]
async fn unhandled_request_falls_back_to_404() {
    struct NeverHandles;

    #[async_trait::async_trait(?Send)]
    impl http1_core::HttpHandler for NeverHandles {
        async fn invoke(&self, _request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
            // never calls `request.mark_handled()`.
            response.complete();
            Ok(())
        }
    }

    LocalSet::new()
        .run_until(async {
            let date = Rc::new(RefCell::new(DateState::new()));
            let clock: Rc<dyn Clock> = Rc::new(SystemClock);
            let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
            let mut t = Transport::new(Rc::new(NeverHandles), executor, &ServerConfig::default(), date, clock, None);
            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            ep.push_inbound(b"GET /missing HTTP/1.1\r\n\r\n");

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 404"), "got: {text}");
            assert!(ep.is_open(), "an unhandled request is not a protocol error; keep-alive applies");
        })
        .await;
}
