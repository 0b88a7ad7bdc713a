//! Server dependencies for actions and effects (using traits for testability)
//!
//! This module provides the central dependency container used by every chat
//! operation. All external services sit behind trait objects so tests can
//! swap them for the in-memory versions in `test_dependencies`.

use std::sync::Arc;

use crate::config::ChatSettings;
use crate::domains::auth::{JwtService, SocketSigner};
use crate::domains::chat::effects::PushJob;
use crate::domains::chat::store::ChatStore;
use crate::kernel::job_queue::JobQueue;
use crate::kernel::stream_hub::StreamHub;
use crate::kernel::{
    BasePartnerDirectory, BasePushNotificationService, BaseRealtimeTransport, BaseUserDirectory,
};

/// Server dependencies accessible to actions and effects
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn ChatStore>,
    pub users: Arc<dyn BaseUserDirectory>,
    pub partners: Arc<dyn BasePartnerDirectory>,
    /// Where broadcasts go (NATS or the in-process hub)
    pub transport: Arc<dyn BaseRealtimeTransport>,
    pub push_service: Arc<dyn BasePushNotificationService>,
    pub push_jobs: JobQueue<PushJob>,
    pub socket_signer: Arc<SocketSigner>,
    pub jwt_service: Arc<JwtService>,
    /// In-process pub/sub hub backing the SSE stream endpoint
    pub stream_hub: StreamHub,
    pub settings: ChatSettings,
}

impl ServerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ChatStore>,
        users: Arc<dyn BaseUserDirectory>,
        partners: Arc<dyn BasePartnerDirectory>,
        transport: Arc<dyn BaseRealtimeTransport>,
        push_service: Arc<dyn BasePushNotificationService>,
        push_jobs: JobQueue<PushJob>,
        socket_signer: Arc<SocketSigner>,
        jwt_service: Arc<JwtService>,
        stream_hub: StreamHub,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            users,
            partners,
            transport,
            push_service,
            push_jobs,
            socket_signer,
            jwt_service,
            stream_hub,
            settings,
        }
    }
}
