//! In-process fabric: topic fanout over unbounded channels.

use super::{Fabric, FabricError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Fabric implementation that routes payloads between subscribers living
/// in the same process. Cloning yields a handle to the same topic space.
#[derive(Clone, Default)]
pub struct LocalFabric {
    topics: Arc<Mutex<HashMap<String, Vec<UnboundedSender<Vec<u8>>>>>>,
}

impl LocalFabric {
    pub fn new() -> Self {
        LocalFabric::default()
    }
}

impl Fabric for LocalFabric {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), FabricError> {
        let mut topics = self.topics.lock().expect("fabric lock poisoned");
        if let Some(subscribers) = topics.get_mut(topic) {
            // Dead receivers are pruned as they are discovered.
            subscribers.retain(|tx| tx.send(payload.clone()).is_ok());
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<UnboundedReceiver<Vec<u8>>, FabricError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.lock().expect("fabric lock poisoned");
        topics.entry(topic.to_string()).or_default().push(tx);
        Ok(rx)
    }

    fn create_inbox(&self) -> Result<String, FabricError> {
        let mut topics = self.topics.lock().expect("fabric lock poisoned");
        loop {
            let name = format!("client.inbox.{:08x}", rand::random::<u32>());
            if !topics.contains_key(&name) {
                topics.insert(name.clone(), Vec::new());
                return Ok(name);
            }
        }
    }

    fn delete_topic(&self, topic: &str) -> Result<(), FabricError> {
        let mut topics = self.topics.lock().expect("fabric lock poisoned");
        topics.remove(topic);
        Ok(())
    }
}
