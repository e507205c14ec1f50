//! TCP fabric: a minimal topic relay speaking length-prefixed bincode
//! frames.
//!
//! One [`FabricHost`] accepts any number of [`TcpFabric`] peers. Peers
//! subscribe to topics by name; the host fans every published payload out
//! to the topic's current subscribers. Delivery is fire-and-forget: a slow
//! or dead peer is dropped from the routing table, never waited on.

use super::{Fabric, FabricError};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Upper bound on a single frame; a full world snapshot is far below this.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, payload: Vec<u8> },
    Deliver { topic: String, payload: Vec<u8> },
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> io::Result<()> {
    let body =
        bincode::serialize(frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Frame> {
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", len),
        ));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    bincode::deserialize(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn spawn_writer(mut writer: OwnedWriteHalf) -> UnboundedSender<Frame> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                debug!("fabric writer stopped: {}", e);
                break;
            }
        }
    });
    tx
}

type HostTopics = Arc<Mutex<HashMap<String, Vec<(u64, UnboundedSender<Frame>)>>>>;

/// Relay side of the TCP fabric. Bind once, then [`FabricHost::run`] the
/// accept loop for the lifetime of the process.
pub struct FabricHost {
    listener: TcpListener,
    topics: HostTopics,
}

impl FabricHost {
    pub async fn bind(addr: &str) -> Result<Self, FabricError> {
        let listener = TcpListener::bind(addr).await.map_err(FabricError::Connect)?;
        Ok(FabricHost {
            listener,
            topics: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts peers until the process ends.
    pub async fn run(self) {
        let mut next_peer_id: u64 = 0;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    next_peer_id += 1;
                    let peer_id = next_peer_id;
                    let topics = Arc::clone(&self.topics);
                    debug!("fabric peer {} joined from {}", peer_id, peer);
                    tokio::spawn(async move {
                        serve_peer(stream, peer_id, topics).await;
                    });
                }
                Err(e) => {
                    error!("fabric accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }
    }
}

async fn serve_peer(stream: TcpStream, peer_id: u64, topics: HostTopics) {
    let (mut reader, writer) = stream.into_split();
    let outbound = spawn_writer(writer);

    loop {
        match read_frame(&mut reader).await {
            Ok(Frame::Subscribe { topic }) => {
                let mut topics = topics.lock().expect("fabric lock poisoned");
                topics
                    .entry(topic)
                    .or_default()
                    .push((peer_id, outbound.clone()));
            }
            Ok(Frame::Unsubscribe { topic }) => {
                let mut topics = topics.lock().expect("fabric lock poisoned");
                if let Some(subscribers) = topics.get_mut(&topic) {
                    subscribers.retain(|(id, _)| *id != peer_id);
                    if subscribers.is_empty() {
                        topics.remove(&topic);
                    }
                }
            }
            Ok(Frame::Publish { topic, payload }) => {
                let mut topics = topics.lock().expect("fabric lock poisoned");
                if let Some(subscribers) = topics.get_mut(&topic) {
                    subscribers.retain(|(_, tx)| {
                        tx.send(Frame::Deliver {
                            topic: topic.clone(),
                            payload: payload.clone(),
                        })
                        .is_ok()
                    });
                }
            }
            Ok(Frame::Deliver { .. }) => {
                warn!("fabric peer {} sent a deliver frame; dropped", peer_id);
            }
            Err(e) => {
                debug!("fabric peer {} left: {}", peer_id, e);
                break;
            }
        }
    }

    let mut topics = topics.lock().expect("fabric lock poisoned");
    for subscribers in topics.values_mut() {
        subscribers.retain(|(id, _)| *id != peer_id);
    }
    topics.retain(|_, subscribers| !subscribers.is_empty());
}

type PeerSubscriptions = Arc<Mutex<HashMap<String, Vec<UnboundedSender<Vec<u8>>>>>>;

/// Peer side of the TCP fabric. Cloning yields a handle to the same
/// connection.
#[derive(Clone)]
pub struct TcpFabric {
    outbound: UnboundedSender<Frame>,
    subscriptions: PeerSubscriptions,
}

impl TcpFabric {
    pub async fn connect(addr: &str) -> Result<Self, FabricError> {
        let stream = TcpStream::connect(addr).await.map_err(FabricError::Connect)?;
        let (mut reader, writer) = stream.into_split();
        let outbound = spawn_writer(writer);

        let subscriptions: PeerSubscriptions = Arc::new(Mutex::new(HashMap::new()));
        let inbound = Arc::clone(&subscriptions);
        tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Frame::Deliver { topic, payload }) => {
                        let mut subscriptions =
                            inbound.lock().expect("fabric lock poisoned");
                        if let Some(receivers) = subscriptions.get_mut(&topic) {
                            receivers.retain(|tx| tx.send(payload.clone()).is_ok());
                        }
                    }
                    Ok(_) => warn!("unexpected frame from fabric host; dropped"),
                    Err(e) => {
                        warn!("fabric connection lost: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(TcpFabric {
            outbound,
            subscriptions,
        })
    }

    fn send(&self, frame: Frame) -> Result<(), FabricError> {
        self.outbound.send(frame).map_err(|_| FabricError::Closed)
    }
}

impl Fabric for TcpFabric {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), FabricError> {
        self.send(Frame::Publish {
            topic: topic.to_string(),
            payload,
        })
    }

    fn subscribe(&self, topic: &str) -> Result<UnboundedReceiver<Vec<u8>>, FabricError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut subscriptions = self.subscriptions.lock().expect("fabric lock poisoned");
            subscriptions.entry(topic.to_string()).or_default().push(tx);
        }
        self.send(Frame::Subscribe {
            topic: topic.to_string(),
        })?;
        Ok(rx)
    }

    fn create_inbox(&self) -> Result<String, FabricError> {
        Ok(format!("client.inbox.{:08x}", rand::random::<u32>()))
    }

    fn delete_topic(&self, topic: &str) -> Result<(), FabricError> {
        {
            let mut subscriptions = self.subscriptions.lock().expect("fabric lock poisoned");
            subscriptions.remove(topic);
        }
        self.send(Frame::Unsubscribe {
            topic: topic.to_string(),
        })
    }
}
