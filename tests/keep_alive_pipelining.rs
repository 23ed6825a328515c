//! `spec.md` §8, concrete scenario 2: three pipelined requests on one HTTP/1.1 connection answered
//! in arrival order, each `Keep-Alive: max` one less than the last.

use std::{cell::RefCell, rc::Rc};

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
async fn three_pipelined_requests_answered_in_order_with_decreasing_max() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(std::time::Duration::from_secs(60));
            ep.push_inbound(
                b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\nGET /three HTTP/1.1\r\n\r\n",
            );

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            let one = text.find("/one\n").expect("first response body present");
            let two = text.find("/two\n").expect("second response body present");
            let three = text.find("/three\n").expect("third response body present");
            assert!(one < two && two < three, "responses must appear in request-arrival order");

            assert!(text.contains("keep-alive: timeout=60, max=99"));
            assert!(text.contains("keep-alive: timeout=60, max=98"));
            assert!(text.contains("keep-alive: timeout=60, max=97"));
            assert!(ep.is_open());
        })
        .await;
}

#[tokio::test]
async fn persistence_closes_exactly_at_max_requests_per_connection() {
    LocalSet::new()
        .run_until(async {
            let mut config = ServerConfig::default();
            config.max_requests_per_connection = 2;
            let date = Rc::new(RefCell::new(DateState::new()));
            let clock: Rc<dyn Clock> = Rc::new(SystemClock);
            let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
            let mut t = Transport::new(Rc::new(EchoPath), executor, &config, date, clock, None);

            let mut ep = MockEndpoint::new(std::time::Duration::from_secs(60));
            ep.push_inbound(b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n");

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            // the second (and final permitted) response must advertise non-persistence.
            let second_head_start = text.find("/one\n").unwrap() + "/one\n".len();
            assert!(text[second_head_start..].contains("connection: close"));
            assert!(!ep.is_open());
        })
        .await;
}
