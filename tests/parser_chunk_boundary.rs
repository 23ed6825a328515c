//! `spec.md` §8: parsing must be insensitive to how inbound bytes are chunked by the network —
//! the same request produces the same parsed result whether it arrives as one `fill()` or is
//! fragmented byte-by-byte across many. Also covers the concrete chunked-transfer-encoding
//! scenario from §8.

use std::{cell::RefCell, rc::Rc, time::Duration};

use bytes::{Bytes, BytesMut};
use tokio::task::LocalSet;

use http1_core::{
    clock::{Clock, SystemClock},
    h1::date::DateState,
    net::{mock::MockEndpoint, Connection},
    reactor::executor::{LocalExecutor, SpawnLocalExecutor},
    HandlerError, HttpRequest, HttpResponse, ServerConfig, Transport,
};

/// reads the whole request body and echoes it back verbatim.
struct EchoBody;

#[async_trait::async_trait(?Send)]
impl http1_core::HttpHandler for EchoBody {
    async fn invoke(&self, mut request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
        request.mark_handled();
        let mut body = BytesMut::new();
        while let Some(chunk) = request.input().next_chunk().await {
            body.extend_from_slice(&chunk.map_err(|e| HandlerError::Fault(Box::new(e)))?);
        }
        response.set_status(200);
        response.set_fixed_length(body.len() as u64);
        response.write(body.freeze()).await.ok();
        response.complete();
        Ok(())
    }
}

fn transport() -> Transport<EchoBody> {
    let date = Rc::new(RefCell::new(DateState::new()));
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
    Transport::new(Rc::new(EchoBody), executor, &ServerConfig::default(), date, clock, None)
}

const CHUNKED_REQUEST: &[u8] =
    b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";

#[tokio::test]
async fn chunked_body_delivered_whole_is_decoded_and_echoed() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            ep.push_inbound(CHUNKED_REQUEST);

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 200 OK"), "got: {text}");
            assert!(text.ends_with("hello world"), "got: {text}");
        })
        .await;
}

#[tokio::test]
async fn same_chunked_body_fragmented_byte_by_byte_is_parsed_identically() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(Duration::from_secs(60));

            for byte in CHUNKED_REQUEST {
                ep.push_inbound(&[*byte]);
                t.on_fillable(&mut ep).await;
            }

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 200 OK"), "got: {text}");
            assert!(text.ends_with("hello world"), "got: {text}");
        })
        .await;
}

#[tokio::test]
async fn fixed_length_request_body_round_trips() {
    LocalSet::new()
        .run_until(async {
            let mut t = transport();
            let mut ep = MockEndpoint::new(Duration::from_secs(60));
            let body = Bytes::from_static(b"hi there");
            let request = format!(
                "POST /upload HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                std::str::from_utf8(&body).unwrap()
            );
            ep.push_inbound(request.as_bytes());

            t.on_fillable(&mut ep).await;

            let text = String::from_utf8(ep.written().to_vec()).unwrap();
            assert!(text.starts_with("HTTP/1.1 200 OK"), "got: {text}");
            assert!(text.ends_with("hi there"), "got: {text}");
        })
        .await;
}
