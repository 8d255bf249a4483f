//! Table of rooms
//!
//! Holds one [`TurnManager`] per room and routes scheduler alarms to the room
//! that scheduled them. Completion handlers are registered per room, so a
//! deadline in one room can never reach another room's handler.

use std::collections::{HashMap, hash_map::Entry};

use log::{debug, warn};

use crate::{
    room_id::RoomId,
    timer::{Alarm, Clock, Scheduler},
    turn::{Completion, TurnManager},
};

/// Turn managers of every open room, sharing one clock and scheduler
#[derive(Debug)]
pub struct Rooms<T> {
    timer: T,
    managers: HashMap<RoomId, TurnManager<T>>,
}

impl<T: Clock + Scheduler + Clone> Rooms<T> {
    /// Creates an empty table whose rooms all use `timer`
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            managers: HashMap::new(),
        }
    }

    /// Opens a room under a fresh random ID
    pub fn open_room(&mut self) -> RoomId {
        loop {
            let room = RoomId::new();
            if let Entry::Vacant(entry) = self.managers.entry(room) {
                entry.insert(TurnManager::new(room, self.timer.clone()));
                debug!("room {room}: opened");
                return room;
            }
        }
    }

    /// Removes a room, cancelling its pending deadline
    ///
    /// # Returns
    ///
    /// The room's manager, or `None` if the room was not open
    pub fn close_room(&mut self, room: RoomId) -> Option<TurnManager<T>> {
        let mut manager = self.managers.remove(&room)?;
        if manager.shutdown() {
            debug!("room {room}: closed with a window still open");
        } else {
            debug!("room {room}: closed");
        }
        Some(manager)
    }

    /// The manager of `room`
    pub fn get(&self, room: RoomId) -> Option<&TurnManager<T>> {
        self.managers.get(&room)
    }

    /// The manager of `room`, mutably
    pub fn get_mut(&mut self, room: RoomId) -> Option<&mut TurnManager<T>> {
        self.managers.get_mut(&room)
    }

    /// Registers the completion handler of `room`
    ///
    /// # Returns
    ///
    /// `false` if the room is not open
    pub fn set_completion_handler(
        &mut self,
        room: RoomId,
        handler: impl FnMut(Completion) + Send + 'static,
    ) -> bool {
        match self.managers.get_mut(&room) {
            Some(manager) => {
                manager.set_completion_handler(handler);
                true
            }
            None => false,
        }
    }

    /// Hands an alarm to the room it was scheduled for
    ///
    /// # Returns
    ///
    /// `true` if that room's completion handler was notified
    pub fn dispatch_alarm(&mut self, alarm: Alarm) -> bool {
        match self.managers.get_mut(&alarm.room) {
            Some(manager) => manager.receive_alarm(alarm),
            None => {
                warn!("dropping alarm for closed room {}", alarm.room);
                false
            }
        }
    }

    /// Number of open rooms
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether no room is open
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
