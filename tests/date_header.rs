//! `spec.md` §8: the `Date` header value is byte-identical for every response flushed within the
//! same wall-clock second, because it is read from a shared cache rather than formatted fresh per
//! response.

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

/// pulls the `date: ...` header's value out of a full HTTP/1.1 response head.
fn date_value_in(text: &str) -> &str {
    let rest = text.split("date: ").nth(1).expect("date header present");
    rest.split("\r\n").next().unwrap()
}

#[tokio::test]
async fn date_header_is_identical_across_two_transports_sharing_one_date_cache() {
    LocalSet::new()
        .run_until(async {
            let date = Rc::new(RefCell::new(DateState::new()));
            let clock: Rc<dyn Clock> = Rc::new(SystemClock);

            let executor_a: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
            let mut ta = Transport::new(Rc::new(EchoPath), executor_a, &ServerConfig::default(), date.clone(), clock.clone(), None);

            let executor_b: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
            let mut tb = Transport::new(Rc::new(EchoPath), executor_b, &ServerConfig::default(), date, clock, None);

            let mut ep_a = MockEndpoint::new(Duration::from_secs(60));
            ep_a.push_inbound(b"GET /a HTTP/1.1\r\n\r\n");
            ta.on_fillable(&mut ep_a).await;

            let mut ep_b = MockEndpoint::new(Duration::from_secs(60));
            ep_b.push_inbound(b"GET /b HTTP/1.1\r\n\r\n");
            tb.on_fillable(&mut ep_b).await;

            let text_a = String::from_utf8(ep_a.written().to_vec()).unwrap();
            let text_b = String::from_utf8(ep_b.written().to_vec()).unwrap();

            assert_eq!(date_value_in(&text_a), date_value_in(&text_b));
        })
        .await;
}

#[tokio::test]
async fn date_header_is_identical_across_pipelined_responses_on_one_connection() {
    LocalSet::new()
        .run_until(async {
            let date = Rc::new(RefCell::new(DateState::new()));
            let clock: Rc<dyn Clock> = Rc::new(SystemClock);
            let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
            let mut t = Transport::new(Rc::new(EchoPath), executor, &ServerConfig::default(), date, clock, None);

            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            ep.push_inbound(b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n");
            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            let mut dates = text.split("date: ").skip(1).map(|rest| rest.split("\r\n").next().unwrap());
            let first = dates.next().expect("first date header present");
            let second = dates.next().expect("second date header present");
            assert_eq!(first, second);
        })
        .await;
}
