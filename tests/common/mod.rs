#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use nayouchi::{
    error::DeliveryError,
    identity::{HashAlgorithm, IdentityHasher},
    mail::{Invitation, Mailer},
    Dispatcher, GroupStore, InvitationSettings, Notifier,
};
use storage::{Backend, MemoryBackend};

/// Records every invitation; can be switched to fail delivery.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<Invitation>>>,
    pub fail: Arc<AtomicBool>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Invitation> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Mailer for RecordingMailer {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(invitation.clone());
        Ok(())
    }
}

pub fn hasher() -> IdentityHasher {
    IdentityHasher::new(HashAlgorithm::Sha256, "pepper")
}

/// Dispatcher over a fresh memory backend, returned alongside it.
pub fn dispatcher<M: Mailer>(mailer: M) -> (Dispatcher<M>, MemoryBackend) {
    let backend = MemoryBackend::new();
    let store = kameo::spawn(GroupStore::new(Backend::Memory(backend.clone())));
    let dispatcher = Dispatcher::new(
        store,
        Arc::new(Notifier::new()),
        mailer,
        hasher(),
        InvitationSettings {
            app_url: "https://names.example.org".to_string(),
            from_address: "names@example.org".to_string(),
        },
    );
    (dispatcher, backend)
}
