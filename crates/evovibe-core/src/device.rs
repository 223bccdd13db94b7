//! Master-side device references and the registry that hands them to arenas.
//!
//! A [`DeviceHandle`] owns the single channel to one worker. The mutex
//! around it keeps requests strictly alternating even when clones of the
//! handle live in several tasks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use evovibe_link::{Channel, Command, LinkResult, Reply, TcpChannel};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::WorkersConfig;
use crate::error::{EvovibeError, EvovibeResult};

/// Shared, exclusive access to one device worker.
#[derive(Clone)]
pub struct DeviceHandle {
    id: u32,
    endpoint: String,
    channel: Arc<Mutex<Box<dyn Channel>>>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl DeviceHandle {
    pub fn new(id: u32, channel: Box<dyn Channel>) -> Self {
        Self {
            id,
            endpoint: channel.endpoint().to_string(),
            channel: Arc::new(Mutex::new(channel)),
        }
    }

    /// CASU number.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn request(&self, command: &Command) -> LinkResult<Reply> {
        let mut channel = self.channel.lock().await;
        debug!(casu = self.id, command = command.name(), "request");
        channel.request(command).await
    }

    /// Send `command` and require a positive acknowledgement.
    pub async fn acknowledge(&self, command: &Command) -> LinkResult<Option<DateTime<Utc>>> {
        self.request(command).await?.into_ack(command)
    }

    pub async fn temperature(&self) -> LinkResult<f64> {
        self.request(&Command::Status).await?.into_temperature()
    }
}

/// One known device and whether an arena currently holds it.
#[derive(Debug, Clone)]
pub struct DeviceRef {
    handle: DeviceHandle,
    in_use: bool,
}

impl DeviceRef {
    pub fn id(&self) -> u32 {
        self.handle.id()
    }

    pub fn endpoint(&self) -> &str {
        self.handle.endpoint()
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

/// Every device of the run, ordered by CASU number.
///
/// Only arena formation mutates the `in_use` flags, through `&mut self`.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceRef>,
}

impl DeviceRegistry {
    pub fn new(handles: impl IntoIterator<Item = DeviceHandle>) -> Self {
        let mut devices: Vec<DeviceRef> = handles
            .into_iter()
            .map(|handle| DeviceRef {
                handle,
                in_use: false,
            })
            .collect();
        devices.sort_by_key(DeviceRef::id);
        Self { devices }
    }

    /// Open a TCP channel to every configured worker.
    pub async fn connect(workers: &WorkersConfig) -> EvovibeResult<Self> {
        let mut handles = Vec::with_capacity(workers.workers.len());
        for entry in &workers.workers {
            let channel = TcpChannel::connect(&entry.address).await?;
            info!(casu = entry.casu_number, address = %entry.address, "connected to worker");
            handles.push(DeviceHandle::new(entry.casu_number, Box::new(channel)));
        }
        Ok(Self::new(handles))
    }

    pub fn devices(&self) -> &[DeviceRef] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// CASU numbers not held by any arena.
    pub fn available(&self) -> Vec<u32> {
        self.devices
            .iter()
            .filter(|d| !d.in_use)
            .map(DeviceRef::id)
            .collect()
    }

    /// Mark device `id` as belonging to an arena.
    pub fn claim(&mut self, id: u32) -> EvovibeResult<DeviceHandle> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.id() == id)
            .ok_or(EvovibeError::UnknownDevice(id))?;
        if device.in_use {
            return Err(EvovibeError::DeviceInUse(id));
        }
        device.in_use = true;
        Ok(device.handle.clone())
    }

    pub fn release(&mut self, id: u32) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.id() == id) {
            device.in_use = false;
        }
    }

    pub fn release_all(&mut self) {
        for device in &mut self.devices {
            device.in_use = false;
        }
    }

    /// Send `command` to every device in parallel and wait for all of them.
    ///
    /// All requests run to completion; the first failure is returned afterwards.
    pub async fn broadcast(&self, command: &Command) -> EvovibeResult<()> {
        let results = join_all(
            self.devices
                .iter()
                .map(|d| async move { d.handle.acknowledge(command).await }),
        )
        .await;
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Temperature of every device, by CASU number.
    pub async fn temperatures(&self) -> EvovibeResult<Vec<(u32, f64)>> {
        let results = join_all(self.devices.iter().map(|d| async move {
            d.handle.temperature().await.map(|t| (d.id(), t))
        }))
        .await;
        Ok(results.into_iter().collect::<LinkResult<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evovibe_link::fakes::ScriptedChannel;

    fn registry() -> (DeviceRegistry, Vec<ScriptedChannel>) {
        let channels: Vec<ScriptedChannel> = [3, 1, 2]
            .iter()
            .map(|id| ScriptedChannel::new(&format!("sim://{id}"), []))
            .collect();
        let handles = [3, 1, 2]
            .iter()
            .zip(&channels)
            .map(|(id, ch)| DeviceHandle::new(*id, Box::new(ch.clone())));
        (DeviceRegistry::new(handles), channels)
    }

    #[test]
    fn registry_is_ordered_by_casu_number() {
        let (reg, _) = registry();
        let ids: Vec<u32> = reg.devices().iter().map(DeviceRef::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(reg.devices()[0].endpoint(), "sim://1");
    }

    #[test]
    fn claim_is_exclusive_until_release() {
        let (mut reg, _) = registry();
        reg.claim(2).unwrap();
        assert!(matches!(reg.claim(2), Err(EvovibeError::DeviceInUse(2))));
        assert_eq!(reg.available(), vec![1, 3]);
        reg.release(2);
        assert!(reg.claim(2).is_ok());
        assert!(matches!(reg.claim(9), Err(EvovibeError::UnknownDevice(9))));
        reg.release_all();
        assert_eq!(reg.available().len(), 3);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_device() {
        let (reg, channels) = registry();
        for ch in &channels {
            ch.push_reply(Reply::Ok);
        }
        reg.broadcast(&Command::Standby).await.unwrap();
        for ch in &channels {
            assert_eq!(*ch.sent_log().lock().unwrap(), vec![Command::Standby]);
        }
    }

    #[tokio::test]
    async fn broadcast_reports_a_rejection() {
        let (reg, channels) = registry();
        channels[0].push_reply(Reply::Ok);
        channels[1].push_reply(Reply::Rejected {
            reason: "not initialised".into(),
        });
        channels[2].push_reply(Reply::Ok);
        assert!(reg.broadcast(&Command::Standby).await.is_err());
        // the others still received the command
        assert_eq!(channels[2].sent_log().lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn temperatures_are_collected() {
        let (reg, channels) = registry();
        for (ch, t) in channels.iter().zip([28.0, 27.5, 29.0]) {
            ch.push_reply(Reply::Temperature { celsius: t });
        }
        let temps = reg.temperatures().await.unwrap();
        // channels were created for ids 3, 1, 2
        assert_eq!(temps, vec![(1, 27.5), (2, 29.0), (3, 28.0)]);
    }
}
