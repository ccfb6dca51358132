//! Versioned single-writer holder of the current deployment state and
//! the sole channel to outside observers. Writers are the deployment
//! executor (record, address, stage) and the verification task
//! (verification status); everything else subscribes to the event
//! stream or reads snapshots.

use crate::types::{DeploymentRecord, DeploymentStage, VerificationStatus};
use ethers::types::{Address, H256};
use parking_lot::RwLock;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentEvent {
    StageChanged(DeploymentStage),
    ConfirmationReceived {
        transaction_hash: H256,
        address: Option<Address>,
    },
    VerificationSucceeded {
        transaction_hash: H256,
    },
    TokenScriptPublished {
        viewer_url: String,
    },
}

#[derive(Debug)]
struct State {
    version: u64,
    stage: DeploymentStage,
    record: Option<DeploymentRecord>,
    tokenscript_viewer_url: Option<String>,
}

pub struct DeploymentStore {
    state: RwLock<State>,
    events: broadcast::Sender<DeploymentEvent>,
}

impl Default for DeploymentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(State {
                version: 0,
                stage: DeploymentStage::Idle,
                record: None,
                tokenscript_viewer_url: None,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEvent> {
        self.events.subscribe()
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn stage(&self) -> DeploymentStage {
        self.state.read().stage
    }

    pub fn record(&self) -> Option<DeploymentRecord> {
        self.state.read().record.clone()
    }

    pub fn tokenscript_viewer_url(&self) -> Option<String> {
        self.state.read().tokenscript_viewer_url.clone()
    }

    pub fn set_stage(&self, stage: DeploymentStage) {
        {
            let mut state = self.state.write();
            state.version += 1;
            state.stage = stage;
        }
        tracing::debug!(?stage, "deployment stage changed");
        self.emit(DeploymentEvent::StageChanged(stage));
    }

    /// Publishes the record of the current attempt, superseding any
    /// previous one.
    pub fn publish_record(&self, record: DeploymentRecord) {
        let event = DeploymentEvent::ConfirmationReceived {
            transaction_hash: record.transaction_hash,
            address: record.address,
        };
        {
            let mut state = self.state.write();
            state.version += 1;
            state.record = Some(record);
        }
        self.emit(event);
    }

    pub fn verification_status_of(&self, deploy_hash: H256) -> Option<VerificationStatus> {
        self.state
            .read()
            .record
            .as_ref()
            .filter(|record| record.transaction_hash == deploy_hash)
            .map(|record| record.verification_status)
    }

    /// Writes the verification status of the record identified by
    /// `deploy_hash`. Returns `false` without touching anything when the
    /// record is gone or superseded, so a stale verification loop cannot
    /// corrupt a newer attempt.
    pub fn set_verification_status(&self, deploy_hash: H256, status: VerificationStatus) -> bool {
        {
            let mut state = self.state.write();
            let Some(record) = state
                .record
                .as_mut()
                .filter(|record| record.transaction_hash == deploy_hash)
            else {
                return false;
            };
            record.verification_status = status;
            state.version += 1;
        }
        if status == VerificationStatus::Success {
            self.emit(DeploymentEvent::VerificationSucceeded {
                transaction_hash: deploy_hash,
            });
        }
        true
    }

    pub fn set_tokenscript_viewer_url(&self, viewer_url: String) {
        {
            let mut state = self.state.write();
            state.version += 1;
            state.tokenscript_viewer_url = Some(viewer_url.clone());
        }
        self.emit(DeploymentEvent::TokenScriptPublished { viewer_url });
    }

    fn emit(&self, event: DeploymentEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}
