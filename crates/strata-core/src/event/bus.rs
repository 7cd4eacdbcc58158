// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// A generic, thread-safe event channel.
///
/// Producers publish from any thread; the owner drains the bus once per frame
/// with [`EventBus::drain`], so subscribers observe events in publication
/// order and at a deterministic point of the frame.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a new EventBus backed by an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!(
            "EventBus<{}> initialized.",
            std::any::type_name::<T>()
        );
        Self { sender, receiver }
    }

    /// Sends an event, logging an error if the receiver is disconnected.
    ///
    /// ## Arguments
    /// * `event` - The event to be sent over the channel.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");
        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to send event: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sender end of the channel.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a reference to the receiver end of the channel.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Takes every event currently queued, without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if no event is queued.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Uploaded(u64),
        Resized { width: u32, height: u32 },
    }

    #[test]
    fn drain_returns_events_in_order() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Uploaded(1));
        bus.publish(TestEvent::Resized {
            width: 2,
            height: 3,
        });
        bus.publish(TestEvent::Uploaded(2));

        assert_eq!(bus.len(), 3);
        let events = bus.drain();
        assert_eq!(
            events,
            vec![
                TestEvent::Uploaded(1),
                TestEvent::Resized {
                    width: 2,
                    height: 3
                },
                TestEvent::Uploaded(2)
            ]
        );
        assert!(bus.is_empty());
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn publish_from_other_threads() {
        let bus = EventBus::<TestEvent>::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sender = bus.sender();
                thread::spawn(move || sender.send(TestEvent::Uploaded(i)).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut ids: Vec<u64> = bus
            .drain()
            .into_iter()
            .map(|e| match e {
                TestEvent::Uploaded(id) => id,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn send_fails_once_bus_is_dropped() {
        let bus = EventBus::<TestEvent>::new();
        let sender = bus.sender();
        drop(bus);
        assert!(sender.send(TestEvent::Uploaded(9)).is_err());
    }
}
