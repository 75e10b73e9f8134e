//! ZooKeeper Protocol Client
//!
//! Speaks enough of the ZooKeeper client protocol for the automaton:
//! session handshake, create/delete/getChildren, keep-alive pings and
//! session close. The automaton issues requests strictly sequentially,
//! so a single background task owns the socket and performs one
//! request-reply exchange at a time, interleaved with pings at a third
//! of the negotiated session timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use super::wire;
use super::{Connector, CreateMode, Session};
use crate::error::{Error, Result};

// Request opcodes
const OP_CREATE: i32 = 1;
const OP_DELETE: i32 = 2;
const OP_GET_CHILDREN: i32 = 8;
const OP_PING: i32 = 11;
const OP_CLOSE: i32 = -11;

// Reserved xids
const XID_WATCH_EVENT: i32 = -1;
const XID_PING: i32 = -2;

// Server error codes
const ZERR_CONNECTION_LOSS: i32 = -4;
const ZERR_NO_NODE: i32 = -101;
const ZERR_BAD_VERSION: i32 = -103;
const ZERR_NODE_EXISTS: i32 = -110;
const ZERR_SESSION_EXPIRED: i32 = -112;

const EPHEMERAL_FLAG: i32 = 1;
const PERM_ALL: i32 = 0x1f;

fn error_from_code(code: i32, path: &str) -> Error {
    match code {
        ZERR_NO_NODE => Error::NoNode(path.to_string()),
        ZERR_BAD_VERSION => Error::BadVersion(path.to_string()),
        ZERR_NODE_EXISTS => Error::NodeExists(path.to_string()),
        ZERR_SESSION_EXPIRED => Error::SessionExpired,
        ZERR_CONNECTION_LOSS => Error::ConnectionClosed,
        other => Error::Protocol(format!("server error {other} for {path}")),
    }
}

enum Op {
    Create {
        path: String,
        data: Vec<u8>,
        mode: CreateMode,
    },
    Delete {
        path: String,
        version: i32,
    },
    Children {
        path: String,
    },
    Close,
}

impl Op {
    fn code(&self) -> i32 {
        match self {
            Op::Create { .. } => OP_CREATE,
            Op::Delete { .. } => OP_DELETE,
            Op::Children { .. } => OP_GET_CHILDREN,
            Op::Close => OP_CLOSE,
        }
    }

    fn path(&self) -> &str {
        match self {
            Op::Create { path, .. } | Op::Delete { path, .. } | Op::Children { path } => path,
            Op::Close => "",
        }
    }
}

enum Reply {
    Done,
    Children(Vec<String>),
}

struct Request {
    op: Op,
    reply: oneshot::Sender<Result<Reply>>,
}

/// Connector that opens real ZooKeeper sessions over TCP
pub struct ZkConnector {
    connect_timeout: Duration,
}

impl ZkConnector {
    /// Create a connector with the given per-endpoint TCP connect timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn try_endpoint(
        &self,
        endpoint: &str,
        session_timeout: Duration,
    ) -> Result<ZkSession> {
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::ConnectionFailed {
                    address: endpoint.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(Error::ConnectionFailed {
                    address: endpoint.to_string(),
                    reason: "connect timeout".to_string(),
                })
            }
        };
        stream.set_nodelay(true)?;

        let (stream, session_id, negotiated) = handshake(stream, session_timeout).await?;
        tracing::debug!(
            endpoint,
            session_id,
            timeout_ms = negotiated.as_millis() as u64,
            "coordination session established"
        );

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(io_loop(stream, rx, negotiated));
        Ok(ZkSession { requests: tx, closed: false })
    }
}

#[async_trait]
impl Connector for ZkConnector {
    async fn connect(
        &self,
        endpoints: &[String],
        session_timeout: Duration,
    ) -> Result<Box<dyn Session>> {
        for endpoint in endpoints {
            match self.try_endpoint(endpoint, session_timeout).await {
                Ok(session) => return Ok(Box::new(session)),
                Err(e) => {
                    tracing::debug!(endpoint, error = %e, "endpoint unreachable");
                }
            }
        }
        Err(Error::NoServer)
    }
}

/// Perform the session handshake on a fresh socket.
async fn handshake(
    mut stream: TcpStream,
    session_timeout: Duration,
) -> Result<(TcpStream, i64, Duration)> {
    let mut payload = BytesMut::new();
    payload.put_i32(0); // protocol version
    payload.put_i64(0); // last zxid seen
    payload.put_i32(session_timeout.as_millis() as i32);
    payload.put_i64(0); // session id (new session)
    wire::put_buffer(&mut payload, &[0u8; 16]); // password

    wire::write_frame(&mut stream, &payload).await?;
    let mut response = wire::read_frame(&mut stream).await?;

    let _protocol_version = wire::get_i32(&mut response)?;
    let negotiated_ms = wire::get_i32(&mut response)?;
    let session_id = wire::get_i64(&mut response)?;
    let _password = wire::get_buffer(&mut response)?;

    if negotiated_ms <= 0 {
        return Err(Error::Protocol("session rejected by server".into()));
    }

    Ok((stream, session_id, Duration::from_millis(negotiated_ms as u64)))
}

/// Own the socket: one request-reply exchange at a time, pings between.
async fn io_loop(mut stream: TcpStream, mut requests: mpsc::Receiver<Request>, timeout: Duration) {
    let ping_period = (timeout / 3).max(Duration::from_millis(10));
    let start = tokio::time::Instant::now() + ping_period;
    let mut ping = tokio::time::interval_at(start, ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut xid: i32 = 0;
    loop {
        tokio::select! {
            req = requests.recv() => {
                let Some(req) = req else {
                    // Session handle dropped without close; the server
                    // reaps the session once the timeout elapses.
                    break;
                };
                let closing = matches!(req.op, Op::Close);
                xid += 1;
                let result = exchange(&mut stream, xid, &req.op).await;
                let failed = result.is_err();
                let _ = req.reply.send(result);
                if closing || failed {
                    break;
                }
            }
            _ = ping.tick() => {
                if ping_once(&mut stream).await.is_err() {
                    tracing::debug!("coordination keep-alive failed, dropping socket");
                    break;
                }
            }
        }
    }

    requests.close();
    while let Ok(req) = requests.try_recv() {
        let _ = req.reply.send(Err(Error::ConnectionClosed));
    }
}

fn encode_request(xid: i32, op: &Op) -> BytesMut {
    let mut payload = BytesMut::new();
    payload.put_i32(xid);
    payload.put_i32(op.code());
    match op {
        Op::Create { path, data, mode } => {
            wire::put_string(&mut payload, path);
            wire::put_buffer(&mut payload, data);
            // single world:anyone ACL with full permissions
            payload.put_i32(1);
            payload.put_i32(PERM_ALL);
            wire::put_string(&mut payload, "world");
            wire::put_string(&mut payload, "anyone");
            payload.put_i32(match mode {
                CreateMode::Persistent => 0,
                CreateMode::Ephemeral => EPHEMERAL_FLAG,
            });
        }
        Op::Delete { path, version } => {
            wire::put_string(&mut payload, path);
            payload.put_i32(*version);
        }
        Op::Children { path } => {
            wire::put_string(&mut payload, path);
            payload.put_u8(0); // no watch
        }
        Op::Close => {}
    }
    payload
}

/// Write one request and read its reply, skipping watch-event and stale
/// ping frames.
async fn exchange(stream: &mut TcpStream, xid: i32, op: &Op) -> Result<Reply> {
    let payload = encode_request(xid, op);
    wire::write_frame(stream, &payload)
        .await
        .map_err(|_| Error::ConnectionClosed)?;

    let mut body = read_reply(stream, xid, op.path()).await?;
    match op {
        Op::Children { .. } => Ok(Reply::Children(wire::get_string_vec(&mut body)?)),
        _ => Ok(Reply::Done),
    }
}

async fn read_reply(stream: &mut TcpStream, expected_xid: i32, path: &str) -> Result<Bytes> {
    loop {
        let mut frame = wire::read_frame(stream)
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        let reply_xid = wire::get_i32(&mut frame)?;
        let _zxid = wire::get_i64(&mut frame)?;
        let err = wire::get_i32(&mut frame)?;

        if reply_xid == XID_WATCH_EVENT || (reply_xid == XID_PING && expected_xid != XID_PING) {
            continue;
        }
        if reply_xid != expected_xid {
            return Err(Error::Protocol(format!(
                "reply xid {reply_xid}, expected {expected_xid}"
            )));
        }
        if err != 0 {
            return Err(error_from_code(err, path));
        }
        return Ok(frame);
    }
}

async fn ping_once(stream: &mut TcpStream) -> Result<()> {
    let mut payload = BytesMut::new();
    payload.put_i32(XID_PING);
    payload.put_i32(OP_PING);
    wire::write_frame(stream, &payload)
        .await
        .map_err(|_| Error::ConnectionClosed)?;
    read_reply(stream, XID_PING, "").await?;
    Ok(())
}

/// An open ZooKeeper session
pub struct ZkSession {
    requests: mpsc::Sender<Request>,
    closed: bool,
}

impl ZkSession {
    async fn request(&self, op: Op) -> Result<Reply> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request { op, reply: tx })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }
}

#[async_trait]
impl Session for ZkSession {
    async fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<()> {
        self.request(Op::Create {
            path: path.to_string(),
            data: data.to_vec(),
            mode,
        })
        .await
        .map(|_| ())
    }

    async fn delete(&self, path: &str, version: i32) -> Result<()> {
        self.request(Op::Delete {
            path: path.to_string(),
            version,
        })
        .await
        .map(|_| ())
    }

    async fn children(&self, path: &str) -> Result<Vec<String>> {
        match self
            .request(Op::Children {
                path: path.to_string(),
            })
            .await?
        {
            Reply::Children(mut names) => {
                names.sort_unstable();
                Ok(names)
            }
            Reply::Done => Err(Error::Protocol("unexpected reply shape".into())),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Best effort; the server also reaps the session on timeout.
        let (tx, rx) = oneshot::channel();
        if self
            .requests
            .send(Request { op: Op::Close, reply: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert!(matches!(
            error_from_code(ZERR_NODE_EXISTS, "/election"),
            Error::NodeExists(p) if p == "/election"
        ));
        assert!(matches!(
            error_from_code(ZERR_SESSION_EXPIRED, ""),
            Error::SessionExpired
        ));
        assert!(matches!(
            error_from_code(ZERR_CONNECTION_LOSS, ""),
            Error::ConnectionClosed
        ));
        assert!(matches!(error_from_code(-999, "/x"), Error::Protocol(_)));
    }

    #[test]
    fn test_create_request_encoding() {
        let op = Op::Create {
            path: "/election".to_string(),
            data: Vec::new(),
            mode: CreateMode::Ephemeral,
        };
        let payload = encode_request(1, &op);
        let mut bytes = payload.freeze();

        assert_eq!(wire::get_i32(&mut bytes).unwrap(), 1); // xid
        assert_eq!(wire::get_i32(&mut bytes).unwrap(), OP_CREATE);
        assert_eq!(wire::get_string(&mut bytes).unwrap(), "/election");
        assert!(wire::get_buffer(&mut bytes).unwrap().is_empty());
        assert_eq!(wire::get_i32(&mut bytes).unwrap(), 1); // acl count
        assert_eq!(wire::get_i32(&mut bytes).unwrap(), PERM_ALL);
        assert_eq!(wire::get_string(&mut bytes).unwrap(), "world");
        assert_eq!(wire::get_string(&mut bytes).unwrap(), "anyone");
        assert_eq!(wire::get_i32(&mut bytes).unwrap(), EPHEMERAL_FLAG);
    }

    #[tokio::test]
    async fn test_connector_reports_no_server() {
        let connector = ZkConnector::new(Duration::from_millis(50));
        // Reserved TEST-NET address; nothing listens there.
        let endpoints = vec!["192.0.2.1:2181".to_string()];
        let result = connector
            .connect(&endpoints, Duration::from_millis(300))
            .await;
        assert!(matches!(result, Err(Error::NoServer)));
    }
}
