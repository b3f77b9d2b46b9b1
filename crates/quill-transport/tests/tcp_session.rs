//! ScribeClient against a local listener speaking the framed Thrift protocol.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use quill_core::{LogEntry, ResultCode, RpcConfig};
use quill_transport::codec::{
    decode_log_call, encode_exception, encode_log_reply, read_frame, write_frame,
};
use quill_transport::{Connector, ScribeClient, ScribeConnector, TransportError, log_or_warn};
use tokio::net::TcpListener;

#[derive(Clone, Copy)]
enum Behaviour {
    Reply(ResultCode),
    Exception,
    Silent,
}

/// Accepts sessions and records every decoded entry.
async fn spawn_server(behaviour: Behaviour) -> (u16, Arc<Mutex<Vec<LogEntry>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let record = Arc::clone(&record);
            tokio::spawn(async move {
                let mut scratch = BytesMut::new();
                while let Ok(Some(frame)) = read_frame(&mut stream, 1 << 20, &mut scratch).await {
                    let call = decode_log_call(frame).expect("valid call");
                    record.lock().extend(call.entries);
                    let reply = match behaviour {
                        Behaviour::Reply(code) => encode_log_reply(call.seqid, code),
                        Behaviour::Exception => {
                            encode_exception(call.seqid, "Log", 6, "store unavailable")
                        }
                        Behaviour::Silent => continue,
                    };
                    if write_frame(&mut stream, &reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (port, seen)
}

fn rpc() -> RpcConfig {
    RpcConfig {
        send_timeout: Duration::from_secs(1),
        recv_timeout: Duration::from_millis(300),
        ..RpcConfig::default()
    }
}

#[tokio::test]
async fn batches_arrive_in_order() {
    let (port, seen) = spawn_server(Behaviour::Reply(ResultCode::Ok)).await;
    let mut client = ScribeClient::connect("127.0.0.1", port, &rpc())
        .await
        .expect("connect");

    for batch in 0..3u64 {
        let entries: Vec<_> = (0..20u64)
            .map(|i| LogEntry::new("test", format!("client1-{}\n", batch * 20 + i)))
            .collect();
        assert_eq!(client.log(&entries).await.expect("log"), ResultCode::Ok);
    }
    client.close().await.expect("close");
    assert!(!client.is_open());

    let seen = seen.lock();
    assert_eq!(seen.len(), 60);
    assert_eq!(seen[0].message(), b"client1-0\n");
    assert_eq!(seen[59].message(), b"client1-59\n");
}

#[tokio::test]
async fn binary_message_survives_the_wire() {
    let (port, seen) = spawn_server(Behaviour::Reply(ResultCode::Ok)).await;
    let connector = ScribeConnector::new("127.0.0.1", port, rpc());
    let mut sink = connector.connect().await.expect("connect");

    let entry = LogEntry::new("scribe_test", b"and a binary\x00\x01 message\n".to_vec());
    assert!(log_or_warn(sink.as_mut(), std::slice::from_ref(&entry)).await);
    sink.close().await.expect("close");

    assert_eq!(seen.lock().as_slice(), &[entry]);
}

#[tokio::test]
async fn try_later_is_reported_not_raised() {
    let (port, _) = spawn_server(Behaviour::Reply(ResultCode::TryLater)).await;
    let mut client = ScribeClient::connect("127.0.0.1", port, &rpc())
        .await
        .expect("connect");
    let code = client
        .log(&[LogEntry::new("test", b"x".to_vec())])
        .await
        .expect("log");
    assert_eq!(code, ResultCode::TryLater);
    assert!(client.is_open());
}

#[tokio::test]
async fn application_exception_surfaces() {
    let (port, _) = spawn_server(Behaviour::Exception).await;
    let mut client = ScribeClient::connect("127.0.0.1", port, &rpc())
        .await
        .expect("connect");
    let err = client
        .log(&[LogEntry::new("test", b"x".to_vec())])
        .await
        .expect_err("exception");
    assert!(matches!(err, TransportError::Application { kind: 6, .. }));
    // a well-formed exception leaves the session usable
    assert!(client.is_open());
}

#[tokio::test]
async fn silent_server_times_out_and_closes_session() {
    let (port, _) = spawn_server(Behaviour::Silent).await;
    let mut client = ScribeClient::connect("127.0.0.1", port, &rpc())
        .await
        .expect("connect");
    let err = client
        .log(&[LogEntry::new("test", b"x".to_vec())])
        .await
        .expect_err("timeout");
    assert!(matches!(err, TransportError::Timeout { .. }));
    assert!(!client.is_open());
    assert!(matches!(
        client.log(&[]).await,
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    // bind then drop to find a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let err = ScribeClient::connect("127.0.0.1", port, &rpc())
        .await
        .expect_err("nothing listening");
    assert!(matches!(err, TransportError::Connect { .. }));
}
