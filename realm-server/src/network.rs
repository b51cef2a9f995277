//! TCP front end: newline-delimited JSON over plain sockets.
//!
//! Every connection runs the same lifecycle on its own task:
//!
//! ```text
//! accept ─▶ handshake (AUTH / REGISTER, repeat until success)
//!        ─▶ load record ─▶ GameCommand::Connect
//!        ─▶ read loop: decode ─▶ GameCommand::Packet
//!        ─▶ EOF / error ─▶ GameCommand::Disconnect
//! ```
//!
//! Outbound lines go through a writer task fed by an unbounded channel, so
//! the world never waits on a slow socket.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use realm_core::components::ConnectionId;
use realm_core::persistence::PlayerRecord;
use realm_core::protocol::{decode_client_line, encode_server_line, ClientPacket, ServerPacket};

use crate::auth;
use crate::ecs_bridge::{ClientSender, CommandSender, GameCommand};
use crate::metrics::ServerMetrics;
use crate::storage::repository::{AccountRepo, PlayerRepo};
use crate::storage::Storage;

const INVALID_HANDSHAKE: &str = "Invalid authentication packet";
const BAD_CREDENTIALS: &str = "Invalid username or password.";
const ALREADY_ONLINE: &str = "User is already logged in.";
const NAME_TAKEN: &str = "Username already taken.";
const STORAGE_DOWN: &str = "Server error, please try again later.";

/// Names with a live session. One session per account.
#[derive(Clone, Default)]
pub struct OnlineUsers {
    names: Arc<Mutex<HashSet<String>>>,
}

impl OnlineUsers {
    /// Returns `false` if the name already has a session.
    pub fn try_claim(&self, name: &str) -> bool {
        self.names.lock().insert(name.to_string())
    }

    pub fn release(&self, name: &str) {
        self.names.lock().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}

/// Everything a connection task needs, cheap to clone per connection.
#[derive(Clone)]
pub struct NetworkContext {
    pub commands: CommandSender,
    pub storage: Storage,
    pub online: OnlineUsers,
    pub metrics: Arc<ServerMetrics>,
    next_connection: Arc<AtomicU64>,
}

impl NetworkContext {
    pub fn new(commands: CommandSender, storage: Storage, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            commands,
            storage,
            online: OnlineUsers::default(),
            metrics,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }
}

/// Accepts connections forever. Only a broken listener ends the loop.
pub async fn serve(listener: TcpListener, ctx: NetworkContext) -> std::io::Result<()> {
    info!("Game server listening on {}", listener.local_addr()?);
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed for {}: {}", addr, e);
        }
        let ctx = ctx.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr.to_string(), ctx).await;
        });
    }
}

/// Runs one client from handshake to disconnect.
pub async fn handle_connection<S>(stream: S, peer: String, ctx: NetworkContext)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let connection = ctx.next_connection_id();
    ctx.metrics.connection_opened();
    info!("New connection {} from {}. Starting authentication.", connection, peer);

    let (read_half, write_half) = tokio::io::split(stream);
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(write_half, rx, connection));
    let mut lines = BufReader::new(read_half).lines();

    if let Some(name) = authenticate(&mut lines, &tx, &ctx, &peer).await {
        let record = load_record(&ctx, &name).await;
        let joined = ctx.commands.send(GameCommand::Connect {
            connection,
            name: name.clone(),
            record,
            sender: tx.clone(),
        });
        match joined {
            Ok(()) => {
                info!("User {} connected from {} as {}", name, peer, connection);
                read_loop(&mut lines, connection, &ctx, &name).await;
                let _ = ctx.commands.send(GameCommand::Disconnect { connection });
                info!("User {} disconnected from {}", name, peer);
            }
            Err(_) => warn!("World is not running, dropping {}", connection),
        }
        ctx.online.release(&name);
    }

    ctx.metrics.connection_closed();
    info!("Connection closed from {}", peer);
}

async fn write_loop<W>(mut writer: W, mut lines: mpsc::UnboundedReceiver<String>, connection: ConnectionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Write to {} failed: {}", connection, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

fn send(tx: &ClientSender, packet: &ServerPacket) {
    match encode_server_line(packet) {
        Ok(line) => {
            let _ = tx.send(line);
        }
        Err(e) => error!("Failed to encode {}: {}", packet.kind(), e),
    }
}

/// Handshake loop. Returns the account name once a login or registration
/// succeeds, `None` if the client leaves first.
async fn authenticate<R>(
    lines: &mut Lines<BufReader<R>>,
    tx: &ClientSender,
    ctx: &NetworkContext,
    peer: &str,
) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(e) => {
                warn!("Error during authentication from {}: {}", peer, e);
                return None;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let outcome = match decode_client_line(&line) {
            Ok(ClientPacket::Auth { username, password }) => {
                info!("Authentication attempt from {} with username: {}", peer, username);
                login(ctx, username, &password).await
            }
            Ok(ClientPacket::Register { username, password }) => {
                info!("Registration attempt from {} with username: {}", peer, username);
                register(ctx, username, &password).await
            }
            Ok(other) => {
                warn!("Invalid authentication packet from {}: {}", peer, other.kind());
                Err(ServerPacket::auth_fail(INVALID_HANDSHAKE))
            }
            Err(e) => {
                warn!("Malformed packet from {}: {}", peer, e);
                ServerMetrics::incr(&ctx.metrics.protocol_errors);
                Err(ServerPacket::auth_fail(INVALID_HANDSHAKE))
            }
        };

        match outcome {
            Ok((name, reply)) => {
                send(tx, &reply);
                ServerMetrics::incr(&ctx.metrics.logins_total);
                return Some(name);
            }
            Err(reply) => {
                send(tx, &reply);
                ServerMetrics::incr(&ctx.metrics.login_failures);
            }
        }
    }
}

async fn login(
    ctx: &NetworkContext,
    username: String,
    password: &str,
) -> Result<(String, ServerPacket), ServerPacket> {
    match ctx.storage.accounts.verify(&username, password).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("User '{}' failed to authenticate", username);
            return Err(ServerPacket::auth_fail(BAD_CREDENTIALS));
        }
        Err(e) => {
            error!("Account lookup for {} failed: {}", username, e);
            return Err(ServerPacket::auth_fail(STORAGE_DOWN));
        }
    }
    if !ctx.online.try_claim(&username) {
        warn!("User '{}' is already online", username);
        return Err(ServerPacket::auth_fail(ALREADY_ONLINE));
    }
    info!("User '{}' authenticated successfully", username);
    Ok((username, ServerPacket::auth_success()))
}

/// A successful registration also logs the new account in.
async fn register(
    ctx: &NetworkContext,
    username: String,
    password: &str,
) -> Result<(String, ServerPacket), ServerPacket> {
    if let Err(e) = auth::validate_credentials(&username, password) {
        return Err(ServerPacket::register_fail(e.to_string()));
    }
    match ctx.storage.accounts.create(&username, password).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("User '{}' failed to register: name taken", username);
            return Err(ServerPacket::register_fail(NAME_TAKEN));
        }
        Err(e) => {
            error!("Registering {} failed: {}", username, e);
            return Err(ServerPacket::register_fail(STORAGE_DOWN));
        }
    }
    if !ctx.online.try_claim(&username) {
        return Err(ServerPacket::register_fail(ALREADY_ONLINE));
    }
    info!("User '{}' registered successfully", username);
    Ok((username, ServerPacket::register_success()))
}

/// Stored record for `name`, or a fresh one. A storage failure is logged and
/// the player starts fresh rather than being locked out.
async fn load_record(ctx: &NetworkContext, name: &str) -> PlayerRecord {
    match ctx.storage.players.load(name).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            info!("No saved state for {}, starting fresh", name);
            PlayerRecord::default()
        }
        Err(e) => {
            error!("Loading player {} failed: {}", name, e);
            PlayerRecord::default()
        }
    }
}

async fn read_loop<R>(
    lines: &mut Lines<BufReader<R>>,
    connection: ConnectionId,
    ctx: &NetworkContext,
    name: &str,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                debug!("Read from {} failed: {}", connection, e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match decode_client_line(&line) {
            Ok(packet) if packet.is_handshake() => {
                warn!("Received unexpected {} from authenticated user {}", packet.kind(), name);
            }
            Ok(packet) => {
                ServerMetrics::incr(&ctx.metrics.packets_in);
                if ctx
                    .commands
                    .send(GameCommand::Packet { connection, packet })
                    .is_err()
                {
                    warn!("World stopped, closing {}", connection);
                    return;
                }
            }
            Err(e) => {
                warn!("Unknown or malformed packet from {}: {}", name, e);
                ServerMetrics::incr(&ctx.metrics.protocol_errors);
            }
        }
    }
}
