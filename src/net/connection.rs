use std::{
    collections::HashSet,
    io,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufStream},
    net::TcpStream,
    sync::Mutex,
    time::timeout,
};
use tracing::{debug, info, trace, warn};

use crate::{
    config::ConnectOpts,
    error::{Error, Result},
    reql::{
        proto::{QueryType, Response, ResponseType, PROTOCOL_VERSION, V1_0},
        Term,
    },
};

use super::{
    frame::{read_handshake_message, split_frame, write_frame, write_handshake_message},
    scram::ScramClient,
};

/// One authenticated session with the server. Queries are serialized over
/// the single socket.
///
/// A `run` future may be dropped at any await point. Replies to queries
/// abandoned that way are discarded by the next `run`, and their open
/// cursors are stopped. A write cut short leaves the stream unframed, after
/// which every query fails with `Error::ConnectionBroken`.
pub struct Connection {
    session: Mutex<Session>,
    next_token: AtomicU64,
    server_version: String,
}

struct Session {
    stream: BufStream<TcpStream>,
    /// Bytes read from the socket that do not yet make up a whole frame.
    inbox: Vec<u8>,
    /// Queries started and not yet answered with a final response.
    outstanding: HashSet<u64>,
    broken: Option<String>,
}

impl Session {
    fn new(stream: BufStream<TcpStream>) -> Self {
        Session {
            stream,
            inbox: Vec::new(),
            outstanding: HashSet::new(),
            broken: None,
        }
    }

    fn usable(&self) -> Result<()> {
        match &self.broken {
            Some(reason) => Err(Error::ConnectionBroken(reason.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        self.broken = Some(err.to_string());
        err
    }

    async fn send(&mut self, token: u64, body: &[u8]) -> Result<()> {
        self.broken = Some(format!("write of query {token} was interrupted"));
        if let Err(err) = write_frame(&mut self.stream, token, body).await {
            return Err(self.fail(err));
        }
        self.broken = None;
        Ok(())
    }

    /// Only `read_buf` awaits here, so a dropped call loses no bytes.
    async fn next_frame(&mut self) -> Result<(u64, Vec<u8>)> {
        loop {
            match split_frame(&mut self.inbox) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(err) => return Err(self.fail(err)),
            }
            match self.stream.read_buf(&mut self.inbox).await {
                Ok(0) => {
                    let eof = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "server closed the connection",
                    );
                    return Err(self.fail(eof.into()));
                }
                Ok(_) => {}
                Err(err) => return Err(self.fail(err.into())),
            }
        }
    }

    /// Handles a reply to a query whose caller has gone away.
    async fn discard(&mut self, token: u64, body: &[u8]) -> Result<()> {
        if !self.outstanding.contains(&token) {
            return Err(Error::protocol(format!("reply to unknown query {token}")));
        }
        let kind = serde_json::from_slice::<Response>(body)
            .ok()
            .and_then(|response| response.kind().ok());
        if kind == Some(ResponseType::SuccessPartial) {
            debug!(token, "stopping abandoned cursor");
            let stop = serde_json::to_vec(&json!([QueryType::Stop as u8]))?;
            self.send(token, &stop).await
        } else {
            debug!(token, "dropping reply to abandoned query");
            self.outstanding.remove(&token);
            Ok(())
        }
    }
}

#[derive(Debug, Deserialize)]
struct HandshakeReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    authentication: Option<String>,
    #[serde(default)]
    server_version: Option<String>,
    #[serde(default)]
    min_protocol_version: Option<u32>,
    #[serde(default)]
    max_protocol_version: Option<u32>,
}

impl HandshakeReply {
    fn parse(raw: &[u8]) -> Result<Self> {
        let reply: HandshakeReply = serde_json::from_slice(raw).map_err(|_| {
            // Servers that predate V1_0 answer with a plain-text error.
            Error::Handshake(String::from_utf8_lossy(raw).into_owned())
        })?;
        if !reply.success {
            let message = reply
                .error
                .clone()
                .unwrap_or_else(|| "server refused the handshake".to_string());
            return Err(Error::Auth(message));
        }
        Ok(reply)
    }

    fn authentication(self) -> Result<String> {
        self.authentication
            .ok_or_else(|| Error::Handshake("reply without authentication field".into()))
    }
}

impl Connection {
    pub async fn connect(opts: &ConnectOpts) -> Result<Self> {
        Connection::open(opts, ScramClient::new(&opts.user, &opts.password)).await
    }

    pub(crate) async fn open(opts: &ConnectOpts, scram: ScramClient) -> Result<Self> {
        let address = opts.address();
        let socket = timeout(opts.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| Error::ConnectTimeout {
                address: address.clone(),
            })??;
        socket.set_nodelay(true)?;

        let mut stream = BufStream::new(socket);
        let server_version = timeout(opts.connect_timeout, handshake(&mut stream, &scram))
            .await
            .map_err(|_| Error::ConnectTimeout {
                address: address.clone(),
            })??;
        info!(%address, %server_version, "connected");

        Ok(Connection {
            session: Mutex::new(Session::new(stream)),
            next_token: AtomicU64::new(1),
            server_version,
        })
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Runs a term to completion. Atoms come back as-is, sequences (even
    /// ones the server streams in batches) as one JSON array.
    pub async fn run(&self, term: &Term) -> Result<Value> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let start = serde_json::to_vec(&json!([QueryType::Start as u8, term.as_json(), {}]))?;
        let resume = serde_json::to_vec(&json!([QueryType::Continue as u8]))?;

        let mut session = self.session.lock().await;
        session.usable()?;
        trace!(token, query = %term.as_json(), "sending query");
        session.outstanding.insert(token);
        session.send(token, &start).await?;

        let mut rows = Vec::new();
        loop {
            let (reply_token, body) = session.next_frame().await?;
            if reply_token != token {
                session.discard(reply_token, &body).await?;
                continue;
            }
            let decoded = serde_json::from_slice::<Response>(&body)
                .map_err(Error::from)
                .and_then(Response::into_result);
            let (kind, mut values) = match decoded {
                Ok(decoded) => decoded,
                Err(err) => {
                    session.outstanding.remove(&token);
                    return Err(err);
                }
            };
            match kind {
                ResponseType::SuccessAtom | ResponseType::ServerInfo => {
                    session.outstanding.remove(&token);
                    return Ok(values.pop().unwrap_or(Value::Null));
                }
                ResponseType::SuccessSequence => {
                    session.outstanding.remove(&token);
                    rows.extend(values);
                    return Ok(Value::Array(rows));
                }
                ResponseType::SuccessPartial => {
                    debug!(token, batch = values.len(), "fetching next batch");
                    rows.extend(values);
                    session.send(token, &resume).await?;
                }
                ResponseType::WaitComplete => {
                    session.outstanding.remove(&token);
                    return Ok(Value::Null);
                }
                ResponseType::ClientError
                | ResponseType::CompileError
                | ResponseType::RuntimeError => {
                    return Err(Error::protocol("error response escaped decoding"));
                }
            }
        }
    }

    pub async fn close(self) -> Result<()> {
        let mut session = self.session.into_inner();
        if !session.outstanding.is_empty() {
            warn!(queries = session.outstanding.len(), "closing with unanswered queries");
        }
        session.stream.shutdown().await?;
        Ok(())
    }
}

/// Performs the V1_0 handshake and returns the server's version string.
async fn handshake(stream: &mut BufStream<TcpStream>, scram: &ScramClient) -> Result<String> {
    stream.write_all(&V1_0.to_le_bytes()).await?;
    let hello = json!({
        "protocol_version": PROTOCOL_VERSION,
        "authentication_method": "SCRAM-SHA-256",
        "authentication": scram.client_first(),
    });
    write_handshake_message(stream, &serde_json::to_vec(&hello)?).await?;

    let info = HandshakeReply::parse(&read_handshake_message(stream).await?)?;
    let min = info.min_protocol_version.unwrap_or(PROTOCOL_VERSION);
    let max = info.max_protocol_version.unwrap_or(PROTOCOL_VERSION);
    if !(min..=max).contains(&PROTOCOL_VERSION) {
        return Err(Error::Handshake(format!(
            "server speaks protocol versions {min} to {max}"
        )));
    }
    let server_version = info.server_version.unwrap_or_default();

    let challenge = HandshakeReply::parse(&read_handshake_message(stream).await?)?.authentication()?;
    let (client_final, proof) = scram.client_final(&challenge)?;
    write_handshake_message(
        stream,
        &serde_json::to_vec(&json!({ "authentication": client_final }))?,
    )
    .await?;

    let outcome = HandshakeReply::parse(&read_handshake_message(stream).await?)?.authentication()?;
    proof.verify(&outcome)?;
    Ok(server_version)
}
