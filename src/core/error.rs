//! Error types used by the module graph.
//!
//! - [`PropertyError`]: malformed or unknown property names.
//! - [`ConnectionError`]: connector wiring failures and broken symmetry.
//! - [`ModuleError`]: lifecycle violations and faults escaping a module thread.
//! - [`FactoryError`]: prototype registration and instantiation failures.
//!
//! Every enum offers `as_label` (stable snake_case label for logs).

use thiserror::Error;

/// Errors raised by properties and property groups.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// Name is empty or contains the path separator.
    #[error("property name \"{name}\" is malformed; names must be non-empty and must not contain '/'")]
    NameMalformed { name: String },

    /// A sibling with the same name already exists.
    #[error("property name \"{name}\" is not unique in group \"{group}\"")]
    NameNotUnique { name: String, group: String },

    /// Nothing found under that name or path.
    #[error("property \"{path}\" can't be found")]
    Unknown { path: String },

    /// The path resolved to a group where a value property was expected.
    #[error("\"{path}\" is a property group, not a property")]
    NotAProperty { path: String },
}

impl PropertyError {
    pub fn as_label(&self) -> &'static str {
        match self {
            PropertyError::NameMalformed { .. } => "property_name_malformed",
            PropertyError::NameNotUnique { .. } => "property_name_not_unique",
            PropertyError::Unknown { .. } => "property_unknown",
            PropertyError::NotAProperty { .. } => "property_not_a_property",
        }
    }
}

/// Errors raised while connecting or inspecting connectors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Direction or payload type does not match.
    #[error("connection between {from} and {to} failed: connectors are incompatible")]
    Incompatible { from: String, to: String },

    /// Inputs accept a single peer.
    #[error("input connector {connector} is already connected; disconnect it first")]
    InputAlreadyConnected { connector: String },

    /// Both connectors belong to the same module.
    #[error("connector {connector} can't be connected to its own module")]
    SelfConnection { connector: String },

    /// Peer sets disagree; this is a programming error.
    #[error("connection between {from} and {to} is invalid: peer sets are asymmetric")]
    Invalid { from: String, to: String },

    /// The owning module has already been dropped.
    #[error("the module owning connector {connector} no longer exists")]
    ModuleGone { connector: String },
}

impl ConnectionError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionError::Incompatible { .. } => "connection_incompatible",
            ConnectionError::InputAlreadyConnected { .. } => "connection_input_taken",
            ConnectionError::SelfConnection { .. } => "connection_self",
            ConnectionError::Invalid { .. } => "connection_invalid",
            ConnectionError::ModuleGone { .. } => "connection_module_gone",
        }
    }
}

/// Errors raised by module lifecycle handling and module threads.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("module \"{module}\" is already initialized")]
    AlreadyInitialized { module: String },

    #[error("module \"{module}\" is not initialized")]
    Uninitialized { module: String },

    #[error("module \"{module}\" is associated with another container")]
    AlreadyAssociated { module: String },

    #[error("the connector \"{connector}\" does not exist in the module \"{module}\"")]
    ConnectorNotFound { module: String, connector: String },

    #[error("connector name \"{name}\" is not unique in module \"{module}\"")]
    NameNotUnique { module: String, name: String },

    #[error("module \"{module}\" requirement not met: {requirement}")]
    RequirementNotMet { module: String, requirement: String },

    /// The module's main loop returned an error.
    #[error("module \"{module}\" failed: {message}")]
    Failed { module: String, message: String },

    /// The module's main loop panicked.
    #[error("module \"{module}\" panicked: {message}")]
    Panicked { module: String, message: String },

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ModuleError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::AlreadyInitialized { .. } => "module_already_initialized",
            ModuleError::Uninitialized { .. } => "module_uninitialized",
            ModuleError::AlreadyAssociated { .. } => "module_already_associated",
            ModuleError::ConnectorNotFound { .. } => "module_connector_not_found",
            ModuleError::NameNotUnique { .. } => "module_name_not_unique",
            ModuleError::RequirementNotMet { .. } => "module_requirement_not_met",
            ModuleError::Failed { .. } => "module_failed",
            ModuleError::Panicked { .. } => "module_panicked",
            ModuleError::Property(e) => e.as_label(),
            ModuleError::Connection(e) => e.as_label(),
        }
    }

    /// Convenience constructor for errors raised inside a module's main loop
    pub fn failed(module: &str, message: impl Into<String>) -> Self {
        ModuleError::Failed {
            module: module.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised by the prototype registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("prototype \"{name}\" is unknown")]
    PrototypeUnknown { name: String },

    #[error("prototype \"{name}\" is not unique; keeping the first one loaded")]
    PrototypeNotUnique { name: String },

    #[error("can't open library \"{path}\": {message}")]
    LibraryOpen { path: String, message: String },

    #[error("library \"{path}\" has no entry symbol \"{symbol}\"")]
    EntryMissing { path: String, symbol: String },

    #[error(transparent)]
    Module(#[from] ModuleError),
}

impl FactoryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            FactoryError::PrototypeUnknown { .. } => "factory_prototype_unknown",
            FactoryError::PrototypeNotUnique { .. } => "factory_prototype_not_unique",
            FactoryError::LibraryOpen { .. } => "factory_library_open",
            FactoryError::EntryMissing { .. } => "factory_entry_missing",
            FactoryError::Module(e) => e.as_label(),
        }
    }
}
