use color_eyre::eyre::{Context, Result, eyre};
use futures_util::{SinkExt, StreamExt};
use mocksrv::common::spawn_test_server;
use mocksrv::{HttpConfig, HttpProtocol, WsConfig, WsProtocol};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sends one request with `Connection: close` and returns the whole response
async fn http_request(addr: SocketAddr, method: &str, path: &str) -> Result<String> {
    let mut client = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    let request = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    client.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), client.read_to_end(&mut response))
        .await
        .context("Timed out waiting for response")??;
    Ok(String::from_utf8(response)?)
}

async fn ws_connect(addr: SocketAddr) -> Result<WsClient> {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    let welcome = ws.next().await.ok_or_else(|| eyre!("No welcome frame"))??;
    assert_eq!(welcome.to_text()?, "Welcome to the WebSocket server!");
    Ok(ws)
}

async fn ws_echo(ws: &mut WsClient, message: &str) -> Result<String> {
    ws.send(Message::text(message.to_string())).await?;
    let reply = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .context("Timed out waiting for echo")?
        .ok_or_else(|| eyre!("Connection closed before echo"))??;
    Ok(reply.to_text()?.to_string())
}

#[tokio::test]
async fn test_http_any_method_and_path() -> Result<()> {
    let config = HttpConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<HttpProtocol>(config).await?;

    for (method, path) in [
        ("GET", "/"),
        ("POST", "/api/v1/things"),
        ("PUT", "/a/b/c?d=e"),
        ("DELETE", "/nothing-here"),
        ("PATCH", "/x"),
        ("OPTIONS", "*"),
        ("BREW", "/coffee"),
    ] {
        let response = http_request(addr, method, path).await?;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{method} {path}: {response}");
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.ends_with("\r\n\r\nHello, World!\n"));
    }

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_http_thousand_requests_up_to_256_in_flight() -> Result<()> {
    let config = HttpConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<HttpProtocol>(config).await?;

    // 1,000 spawned clients, at most 256 connected at once. Client and server
    // sockets share this process, so both have to fit the default fd limit.
    let in_flight = Arc::new(Semaphore::new(256));

    let mut handles = Vec::with_capacity(1000);
    for i in 0..1000 {
        let in_flight = in_flight.clone();
        handles.push(tokio::spawn(async move {
            let _permit = in_flight.acquire_owned().await?;
            http_request(addr, "GET", &format!("/request/{i}")).await
        }));
    }

    for handle in handles {
        let response = handle.await??;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nHello, World!\n"));
    }

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_ws_welcome_and_echo() -> Result<()> {
    let config = WsConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<WsProtocol>(config).await?;

    let mut ws = ws_connect(addr).await?;
    assert_eq!(ws_echo(&mut ws, "hi").await?, "You said: hi");
    assert_eq!(ws_echo(&mut ws, "").await?, "You said: ");
    assert_eq!(ws_echo(&mut ws, "héllo wörld ✓").await?, "You said: héllo wörld ✓");

    ws.close(None).await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_ws_echoes_keep_order() -> Result<()> {
    let config = WsConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<WsProtocol>(config).await?;

    let mut ws = ws_connect(addr).await?;
    for i in 0..50 {
        ws.feed(Message::text(format!("message {i}"))).await?;
    }
    ws.flush().await?;

    for i in 0..50 {
        let reply = ws.next().await.ok_or_else(|| eyre!("Connection closed"))??;
        assert_eq!(reply.to_text()?, format!("You said: message {i}"));
    }

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_ws_connections_are_isolated() -> Result<()> {
    let config = WsConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<WsProtocol>(config).await?;

    let mut alice = ws_connect(addr).await?;
    let mut bob = ws_connect(addr).await?;

    alice.send(Message::text("from alice".to_string())).await?;
    bob.send(Message::text("from bob".to_string())).await?;

    let alice_reply = alice.next().await.ok_or_else(|| eyre!("alice closed"))??;
    let bob_reply = bob.next().await.ok_or_else(|| eyre!("bob closed"))??;
    assert_eq!(alice_reply.to_text()?, "You said: from alice");
    assert_eq!(bob_reply.to_text()?, "You said: from bob");

    // Nothing else is pending on either connection
    assert!(tokio::time::timeout(Duration::from_millis(200), alice.next()).await.is_err());
    assert!(tokio::time::timeout(Duration::from_millis(200), bob.next()).await.is_err());

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_ws_close_does_not_affect_others() -> Result<()> {
    let config = WsConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<WsProtocol>(config).await?;

    let mut staying = ws_connect(addr).await?;
    let mut leaving = ws_connect(addr).await?;

    leaving.close(None).await?;
    // Drain until the close handshake completes
    while let Some(Ok(_)) = leaving.next().await {}

    // Abrupt disconnect without a close frame
    let abrupt = ws_connect(addr).await?;
    drop(abrupt);

    assert_eq!(ws_echo(&mut staying, "still here").await?, "You said: still here");

    let mut newcomer = ws_connect(addr).await?;
    assert_eq!(ws_echo(&mut newcomer, "new").await?, "You said: new");

    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_bind_failure_is_reported() -> Result<()> {
    let config = WsConfig::new("127.0.0.1:0".parse()?);
    let (server_handle, addr, _shutdown) = spawn_test_server::<WsProtocol>(config).await?;

    let err = mocksrv::WsServer::bind(WsConfig::new(addr))
        .await
        .err()
        .ok_or_else(|| eyre!("Second bind on {} unexpectedly succeeded", addr))?;
    assert!(matches!(err, mocksrv::MockError::Bind { .. }));
    assert!(err.to_string().contains(&addr.to_string()));

    server_handle.abort();
    Ok(())
}
