//! Messaging channels between the engine and the inspector.
//!
//! The engine publishes finished element trees to the inspector over one
//! direction of a paired channel; the reverse direction carries opaque
//! [`PatchRequest`] payloads reserved for future inspector edits. The engine
//! side never consumes patches in this version.

use cn_core::BrowserError;
use cn_core::BrowserResult;
use cn_dom::Element;
use std::sync::mpsc;
use std::time::Duration;

const DEFAULT_MAX_TREE_NODES: usize = 64 * 1024;
const HARD_MAX_TREE_NODES: usize = 1024 * 1024;

/// Endpoint roles of the inspector channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Engine,
    Inspector,
}

impl EndpointRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Inspector => "inspector",
        }
    }

    pub fn from_role_name(value: &str) -> Option<Self> {
        match value {
            "engine" => Some(Self::Engine),
            "inspector" => Some(Self::Inspector),
            _ => None,
        }
    }
}

/// Opaque inspector-to-engine edit request.
///
/// The payload format is deliberately unspecified; the channel reserves the
/// lane without dictating semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub payload: Vec<u8>,
}

impl PatchRequest {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }
}

/// Defines how one side of the inspector channel behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub role: EndpointRole,
    pub max_tree_nodes: usize,
}

impl ChannelConfig {
    pub fn hardened(role: EndpointRole) -> BrowserResult<Self> {
        let config = Self {
            role,
            max_tree_nodes: DEFAULT_MAX_TREE_NODES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BrowserResult<()> {
        if self.max_tree_nodes == 0 {
            return Err(BrowserError::new(
                "ipc.max_tree_nodes_invalid",
                "channel max_tree_nodes must be greater than zero",
            ));
        }

        if self.max_tree_nodes > HARD_MAX_TREE_NODES {
            return Err(BrowserError::new(
                "ipc.max_tree_nodes_too_large",
                "channel max_tree_nodes exceeds hard limit (1 Mi nodes)",
            ));
        }

        Ok(())
    }
}

/// Engine side: publishes trees, never reads patches.
pub struct EngineEndpoint {
    tree_tx: mpsc::Sender<Element>,
    config: ChannelConfig,
}

impl EngineEndpoint {
    pub fn role(&self) -> EndpointRole {
        self.config.role
    }

    /// Publishes a finished element tree to the inspector.
    ///
    /// The tree is counted before sending; oversized trees are rejected so a
    /// runaway parse cannot flood the inspector.
    pub fn publish_tree(&self, tree: Element) -> BrowserResult<()> {
        let nodes = tree.node_count();
        if nodes > self.config.max_tree_nodes {
            return Err(BrowserError::new(
                "ipc.tree_too_large",
                format!(
                    "tree exceeds max_tree_nodes ({nodes} > {})",
                    self.config.max_tree_nodes
                ),
            ));
        }

        self.tree_tx.send(tree).map_err(|error| {
            BrowserError::new(
                "ipc.send_failed",
                format!(
                    "failed to publish tree from {} endpoint: {error}",
                    self.config.role.as_str()
                ),
            )
        })
    }
}

/// Inspector side: receives trees and may queue patch requests.
pub struct InspectorEndpoint {
    tree_rx: mpsc::Receiver<Element>,
    patch_tx: mpsc::Sender<PatchRequest>,
    config: ChannelConfig,
}

impl InspectorEndpoint {
    pub fn role(&self) -> EndpointRole {
        self.config.role
    }

    /// Non-blocking receive of one published tree, if any is queued.
    pub fn try_recv_tree(&self) -> Option<Element> {
        self.tree_rx.try_recv().ok()
    }

    pub fn recv_tree_timeout(&self, timeout: Duration) -> BrowserResult<Element> {
        self.tree_rx.recv_timeout(timeout).map_err(|error| {
            BrowserError::new(
                "ipc.recv_failed",
                format!(
                    "failed to receive tree for {} endpoint: {error}",
                    self.config.role.as_str()
                ),
            )
        })
    }

    pub fn send_patch(&self, patch: PatchRequest) -> BrowserResult<()> {
        self.patch_tx.send(patch).map_err(|error| {
            BrowserError::new(
                "ipc.send_failed",
                format!(
                    "failed to send patch from {} endpoint: {error}",
                    self.config.role.as_str()
                ),
            )
        })
    }
}

/// Creates the paired engine/inspector endpoints.
///
/// The patch receiver is handed back to the caller: the engine does not read
/// patches in this version, but dropping the receiver would close the
/// reserved lane, so the caller keeps it alive.
pub fn inspector_channel_pair(
    engine: ChannelConfig,
    inspector: ChannelConfig,
) -> BrowserResult<(EngineEndpoint, InspectorEndpoint, mpsc::Receiver<PatchRequest>)> {
    engine.validate()?;
    inspector.validate()?;

    let (tree_tx, tree_rx) = mpsc::channel();
    let (patch_tx, patch_rx) = mpsc::channel();

    Ok((
        EngineEndpoint {
            tree_tx,
            config: engine,
        },
        InspectorEndpoint {
            tree_rx,
            patch_tx,
            config: inspector,
        },
        patch_rx,
    ))
}
