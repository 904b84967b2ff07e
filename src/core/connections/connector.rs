use super::data_type::{DataType, Direction};
use crate::core::components::module::Module;
use crate::core::conditions::Condition;
use crate::core::error::ConnectionError;
use crate::core::shared::SharedMap;
use crate::core::signal::Signal;
use crate::core::types::ConnectorId;
use log::{debug, error, warn};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::{Arc, Weak};

/// Type-erased data published by an output
pub type Payload = Arc<dyn Any + Send + Sync>;

/// `(this side, other side)` of a connection that was established or closed
pub type ConnectionEvent = (Arc<Connector>, Arc<Connector>);

/// Named, typed endpoint of a module.
///
/// Connections are symmetric: whenever `a` lists `b` as a peer, `b` lists `a`.
/// Both peer sets are changed under their write tickets, taken in ascending
/// [`ConnectorId`] order, before any signal fires.
pub struct Connector {
    id: ConnectorId,
    name: String,
    description: String,
    direction: Direction,
    data_type: DataType,
    module: Weak<Module>,
    module_name: String,
    peers: SharedMap<ConnectorId, Weak<Connector>>,
    data: RwLock<Option<Payload>>,
    data_changed: Arc<Condition>,
    established: Signal<ConnectionEvent>,
    closed: Signal<ConnectionEvent>,
    data_signal: Signal<Arc<Connector>>,
}

impl Connector {
    pub(crate) fn new(
        module: Weak<Module>,
        module_name: &str,
        name: &str,
        description: &str,
        direction: Direction,
        data_type: DataType,
    ) -> Arc<Connector> {
        Arc::new(Connector {
            id: ConnectorId::next(),
            name: name.to_string(),
            description: description.to_string(),
            direction,
            data_type,
            module,
            module_name: module_name.to_string(),
            peers: SharedMap::default(),
            data: RwLock::new(None),
            data_changed: Arc::new(Condition::new()),
            established: Signal::new(),
            closed: Signal::new(),
            data_signal: Signal::new(),
        })
    }

    pub fn id(&self) -> ConnectorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// `"<module>:<connector>"`
    pub fn canonical_name(&self) -> String {
        format!("{}:{}", self.module_name, self.name)
    }

    /// Owning module, if it still exists
    pub fn module(&self) -> Option<Arc<Module>> {
        self.module.upgrade()
    }

    /// Opposite directions and different owning modules; payload types are ignored
    pub fn lazy_connectable(&self, other: &Connector) -> bool {
        self.direction != other.direction && !Weak::ptr_eq(&self.module, &other.module)
    }

    /// Like [`Connector::lazy_connectable`], and the input accepts the output's payload type
    pub fn connectable(&self, other: &Connector) -> bool {
        if !self.lazy_connectable(other) {
            return false;
        }
        let (output, input) = match self.direction {
            Direction::Output => (self, other),
            Direction::Input => (other, self),
        };
        input.data_type.accepts(&output.data_type)
    }

    /// Connect to `other`.
    ///
    /// Incompatible payload types are tolerated only with `force`. Connecting an
    /// existing edge again is a no-op.
    pub fn connect(self: &Arc<Self>, other: &Arc<Connector>, force: bool) -> Result<(), ConnectionError> {
        if Arc::ptr_eq(self, other) || Weak::ptr_eq(&self.module, &other.module) {
            return Err(ConnectionError::SelfConnection {
                connector: self.canonical_name(),
            });
        }
        for side in [self, other] {
            if side.module.strong_count() == 0 {
                return Err(ConnectionError::ModuleGone {
                    connector: side.canonical_name(),
                });
            }
        }

        let compatible = self.connectable(other);
        if !compatible && !(force && self.lazy_connectable(other)) {
            return Err(ConnectionError::Incompatible {
                from: self.canonical_name(),
                to: other.canonical_name(),
            });
        }

        let input = match self.direction {
            Direction::Input => self,
            Direction::Output => other,
        };

        {
            let (first, second) = if self.id < other.id {
                (self, other)
            } else {
                (other, self)
            };
            let mut first_peers = first.peers.write_ticket();
            let mut second_peers = second.peers.write_ticket();

            if first_peers.contains_key(&second.id) {
                first_peers.suppress_unlock_condition();
                second_peers.suppress_unlock_condition();
                return Ok(());
            }

            let input_taken = if Arc::ptr_eq(first, input) {
                !first_peers.is_empty()
            } else {
                !second_peers.is_empty()
            };
            if input_taken {
                first_peers.suppress_unlock_condition();
                second_peers.suppress_unlock_condition();
                return Err(ConnectionError::InputAlreadyConnected {
                    connector: input.canonical_name(),
                });
            }

            first_peers.insert(second.id, Arc::downgrade(second));
            second_peers.insert(first.id, Arc::downgrade(first));
        }

        if compatible {
            debug!("[Connector:{}] Connected to {}", self.canonical_name(), other.canonical_name());
        } else {
            warn!(
                "[Connector:{}] Force-connected to {} despite payload type mismatch",
                self.canonical_name(),
                other.canonical_name()
            );
        }

        self.established.emit(&(Arc::clone(self), Arc::clone(other)));
        other.established.emit(&(Arc::clone(other), Arc::clone(self)));
        input.data_changed.notify();
        Ok(())
    }

    /// Remove the edge to `other`. Returns false if there was none.
    pub fn disconnect(self: &Arc<Self>, other: &Arc<Connector>) -> bool {
        if Arc::ptr_eq(self, other) {
            return false;
        }

        let (removed_first, removed_second) = {
            let (first, second) = if self.id < other.id {
                (self, other)
            } else {
                (other, self)
            };
            let mut first_peers = first.peers.write_ticket();
            let mut second_peers = second.peers.write_ticket();
            let removed_first = first_peers.remove(&second.id).is_some();
            let removed_second = second_peers.remove(&first.id).is_some();
            if !removed_first {
                first_peers.suppress_unlock_condition();
            }
            if !removed_second {
                second_peers.suppress_unlock_condition();
            }
            (removed_first, removed_second)
        };

        if removed_first != removed_second {
            error!(
                "[Connector:{}] Peer sets with {} were asymmetric; removed the dangling half",
                self.canonical_name(),
                other.canonical_name()
            );
        }
        if !removed_first && !removed_second {
            return false;
        }

        debug!("[Connector:{}] Disconnected from {}", self.canonical_name(), other.canonical_name());
        self.closed.emit(&(Arc::clone(self), Arc::clone(other)));
        other.closed.emit(&(Arc::clone(other), Arc::clone(self)));
        let input = match self.direction {
            Direction::Input => self,
            Direction::Output => other,
        };
        input.data_changed.notify();
        true
    }

    /// Remove every edge of this connector
    pub fn disconnect_all(self: &Arc<Self>) {
        let peers: Vec<(ConnectorId, Weak<Connector>)> = self
            .peers
            .read_ticket()
            .iter()
            .map(|(id, peer)| (*id, peer.clone()))
            .collect();

        for (id, peer) in peers {
            match peer.upgrade() {
                Some(peer) => {
                    self.disconnect(&peer);
                }
                None => {
                    self.peers.erase(&id);
                }
            }
        }
    }

    /// Whether an edge to `other` exists.
    ///
    /// Both peer sets are read under one consistent lock; disagreement is reported
    /// as [`ConnectionError::Invalid`].
    pub fn is_connected_to(&self, other: &Connector) -> Result<bool, ConnectionError> {
        if std::ptr::eq(self, other) {
            return Ok(false);
        }
        let (first, second) = if self.id < other.id {
            (self, other)
        } else {
            (other, self)
        };
        let first_peers = first.peers.read_ticket();
        let second_peers = second.peers.read_ticket();
        let forward = first_peers.contains_key(&second.id);
        let backward = second_peers.contains_key(&first.id);
        if forward != backward {
            return Err(ConnectionError::Invalid {
                from: self.canonical_name(),
                to: other.canonical_name(),
            });
        }
        Ok(forward)
    }

    pub fn is_connected(&self) -> bool {
        !self.peers.read_ticket().is_empty()
    }

    /// Live peers, in connector-id order
    pub fn connected(&self) -> Vec<Arc<Connector>> {
        self.peers
            .read_ticket()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Publish `value` on an output and wake every connected input.
    ///
    /// Returns false for inputs and for values of the wrong type.
    pub fn update_data<T: Any + Send + Sync>(self: &Arc<Self>, value: T) -> bool {
        if self.direction != Direction::Output {
            warn!("[Connector:{}] Inputs can't publish data", self.canonical_name());
            return false;
        }
        let offered = DataType::of::<T>();
        if !self.data_type.is_any() && self.data_type != offered {
            warn!(
                "[Connector:{}] Refusing {:?}; connector carries {:?}",
                self.canonical_name(),
                offered,
                self.data_type
            );
            return false;
        }

        *self.data.write() = Some(Arc::new(value));
        self.data_changed.notify();
        for peer in self.connected() {
            peer.data_changed.notify();
            peer.data_signal.emit(&Arc::clone(self));
        }
        true
    }

    /// Drop the published payload
    pub fn clear_data(&self) {
        *self.data.write() = None;
    }

    /// Payload visible through this connector: the own one for outputs, the
    /// connected output's for inputs
    pub fn payload(&self) -> Option<Payload> {
        match self.direction {
            Direction::Output => self.data.read().clone(),
            Direction::Input => self
                .connected()
                .first()
                .and_then(|output| output.data.read().clone()),
        }
    }

    /// Typed view of [`Connector::payload`]
    pub fn data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.payload()?.downcast::<T>().ok()
    }

    /// Fired when data becomes available or goes away on this connector
    pub fn data_changed_condition(&self) -> Arc<Condition> {
        Arc::clone(&self.data_changed)
    }

    pub fn established_signal(&self) -> &Signal<ConnectionEvent> {
        &self.established
    }

    pub fn closed_signal(&self) -> &Signal<ConnectionEvent> {
        &self.closed
    }

    /// Emits the updating output on inputs
    pub fn data_signal(&self) -> &Signal<Arc<Connector>> {
        &self.data_signal
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("id", &self.id)
            .field("name", &self.canonical_name())
            .field("direction", &self.direction)
            .field("data_type", &self.data_type)
            .finish()
    }
}

impl std::fmt::Display for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_name())
    }
}
