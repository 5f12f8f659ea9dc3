//! BLE connection management.
//!
//! Opens a subscribed session to the thermometer and turns btleplug's
//! streams into the frame channel and disconnect signal of a [`BleSession`].

use btleplug::api::{Central, CentralEvent, Peripheral as _, ValueNotification};
use btleplug::platform::{Adapter, Peripheral, PeripheralId};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::transport::BleSession;
use crate::error::{Error, Result};

/// Number of frames buffered between the BLE stack and the bridge.
const FRAME_BUFFER: usize = 64;

type EventStream = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;
type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// Connect to a peripheral and subscribe to `characteristic`.
///
/// Adapter events are captured before connecting so the disconnect signal
/// cannot miss an early drop. On any failure after the link is up, the
/// peripheral is disconnected before the error is returned. Dropping the
/// returned session disconnects it as well.
pub async fn open_session(
    adapter: &Adapter,
    id: &PeripheralId,
    characteristic: Uuid,
) -> Result<BleSession> {
    let peripheral = adapter.peripheral(id).await.map_err(Error::Bluetooth)?;
    let events = adapter.events().await.map_err(Error::Bluetooth)?;

    peripheral
        .connect()
        .await
        .map_err(|e| Error::ConnectionFailed {
            reason: e.to_string(),
        })?;

    info!("Connected to {}", id);

    let notifications = match subscribe(&peripheral, characteristic).await {
        Ok(notifications) => notifications,
        Err(e) => {
            if let Err(disconnect_err) = peripheral.disconnect().await {
                debug!("Failed to disconnect after setup error: {}", disconnect_err);
            }
            return Err(e);
        }
    };

    let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);
    let (disconnected_tx, disconnected_rx) = oneshot::channel();

    let watcher = tokio::spawn(watch_disconnect(events, id.clone(), disconnected_tx));
    let forwarder = tokio::spawn(forward_notifications(
        notifications,
        characteristic,
        frame_tx,
    ));

    let teardown = async move {
        // Fails harmlessly when the device already dropped the link
        if let Err(e) = peripheral.disconnect().await {
            debug!("Disconnect on teardown failed: {}", e);
        }
    };

    Ok(BleSession::new(frame_rx, disconnected_rx)
        .with_tasks(vec![watcher, forwarder])
        .with_teardown(Box::pin(teardown)))
}

/// Discover services and subscribe to the notify characteristic.
async fn subscribe(peripheral: &Peripheral, uuid: Uuid) -> Result<NotificationStream> {
    peripheral
        .discover_services()
        .await
        .map_err(Error::Bluetooth)?;

    let characteristic = peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| Error::CharacteristicNotFound {
            uuid: uuid.to_string(),
        })?;

    debug!(
        "Found characteristic {}, properties: {:?}",
        uuid, characteristic.properties
    );

    // Take the stream first so no notification slips in unobserved
    let notifications = peripheral.notifications().await.map_err(Error::Bluetooth)?;

    peripheral
        .subscribe(&characteristic)
        .await
        .map_err(Error::Bluetooth)?;

    debug!("Successfully subscribed to notifications from {}", uuid);

    Ok(notifications)
}

/// Fire `disconnected` when the adapter reports the peripheral gone.
async fn watch_disconnect(
    mut events: EventStream,
    id: PeripheralId,
    disconnected: oneshot::Sender<()>,
) {
    while let Some(event) = events.next().await {
        if let CentralEvent::DeviceDisconnected(gone) = event {
            if gone == id {
                debug!("Adapter reported {} disconnected", id);
                break;
            }
        }
    }

    // An ended event stream means the adapter itself went away
    let _ = disconnected.send(());
}

/// Forward notifications for `uuid` into the session's frame channel.
async fn forward_notifications(
    mut notifications: NotificationStream,
    uuid: Uuid,
    frames: mpsc::Sender<Bytes>,
) {
    while let Some(notification) = notifications.next().await {
        if notification.uuid != uuid {
            continue;
        }

        trace!(
            "Notification received: {} bytes, data: {:02X?}",
            notification.value.len(),
            &notification.value[..std::cmp::min(notification.value.len(), 20)]
        );

        if frames.send(Bytes::from(notification.value)).await.is_err() {
            break;
        }
    }

    debug!("Notification forwarding for {} stopped", uuid);
}
