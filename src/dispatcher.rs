use std::sync::Arc;

use kameo::{actor::ActorRef, error::SendError};
use log::{debug, info, warn};
use serde_json::{json, Value};

use crate::{
    error::{DeliveryError, DispatchError, StoreError},
    group::Retention,
    identity::IdentityHasher,
    mail::{Invitation, Mailer},
    message::Action,
    notifier::Notifier,
    store::GroupStore,
    store_actor::{
        AuthorizeInviteRequest, CreateGroupRequest, EnterGroupRequest, ListGroupsRequest,
        MutateGroupRequest, Mutation,
    },
};

/// Where invitation links point and who they come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationSettings {
    pub app_url: String,
    pub from_address: String,
}

impl InvitationSettings {
    /// Deep link the invited person opens to become `member_id`.
    pub fn confirmation_link(&self, member_id: &str) -> String {
        format!("{}/usr/{}", self.app_url.trim_end_matches('/'), member_id)
    }
}

/// Maps named actions onto the group store and notifies subscribers after
/// each mutation. Holds no group state itself.
pub struct Dispatcher<M: Mailer> {
    store: ActorRef<GroupStore>,
    notifier: Arc<Notifier>,
    mailer: M,
    hasher: IdentityHasher,
    invitations: InvitationSettings,
}

impl<M: Mailer> Dispatcher<M> {
    pub fn new(
        store: ActorRef<GroupStore>,
        notifier: Arc<Notifier>,
        mailer: M,
        hasher: IdentityHasher,
        invitations: InvitationSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            mailer,
            hasher,
            invitations,
        }
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Parse and run one action. `Ok(None)` means the action has no reply.
    pub async fn dispatch(&self, name: &str, body: Value) -> Result<Option<Value>, DispatchError> {
        let action = Action::parse(name, body)?;
        self.handle(action).await
    }

    pub async fn handle(&self, action: Action) -> Result<Option<Value>, DispatchError> {
        debug!("Handling action: {action:?}");
        match action {
            Action::Create { usr, name } => {
                let group = store_reply(
                    self.store
                        .ask(CreateGroupRequest {
                            creator_id: usr,
                            name,
                        })
                        .await,
                )?;
                info!("Created {group}");
                self.notifier
                    .group_changed(group.id(), Retention::Persist)
                    .await;
                Ok(Some(json!({ "update": "now", "grp": group.id() })))
            }
            Action::Propose { usr, grp, name } => {
                self.mutate(
                    grp,
                    Mutation::AddNomination {
                        member_id: usr,
                        text: name,
                    },
                )
                .await?;
                Ok(None)
            }
            Action::RemoveName { usr, grp, name } => {
                self.mutate(
                    grp,
                    Mutation::RemoveNomination {
                        member_id: usr,
                        text: name,
                    },
                )
                .await?;
                Ok(None)
            }
            Action::SetUserName { usr, grp, name } => {
                self.mutate(
                    grp,
                    Mutation::SetMemberName {
                        member_id: usr,
                        name,
                    },
                )
                .await?;
                Ok(None)
            }
            Action::Resign { usr, grp } => {
                let retention = self.mutate(grp, Mutation::Resign { member_id: usr }).await?;
                let status = match retention {
                    Retention::Persist => "updated",
                    Retention::Remove => "removed",
                };
                Ok(Some(json!({ "group": status })))
            }
            Action::Upgrade { grp, member, usr } => {
                self.mutate(
                    grp,
                    Mutation::Promote {
                        acting_id: usr,
                        member_name: member,
                    },
                )
                .await?;
                Ok(None)
            }
            Action::AddMember { usr, grp, email } => {
                self.add_member(usr, grp, email).await.map(Some)
            }
            Action::Signup { email } => self.signup(email).await.map(Some),
            Action::List { usr } => {
                let views = store_reply(self.store.ask(ListGroupsRequest { member_id: usr }).await)?;
                Ok(Some(serde_json::to_value(views).map_err(StoreError::from)?))
            }
            Action::Enter { usr, grp } => {
                let view = store_reply(
                    self.store
                        .ask(EnterGroupRequest {
                            group_id: grp,
                            member_id: usr,
                        })
                        .await,
                )?;
                Ok(Some(serde_json::to_value(view).map_err(StoreError::from)?))
            }
        }
    }

    async fn mutate(&self, group_id: String, mutation: Mutation) -> Result<Retention, DispatchError> {
        let retention = store_reply(
            self.store
                .ask(MutateGroupRequest {
                    group_id: group_id.clone(),
                    mutation,
                })
                .await,
        )?;
        self.notifier.group_changed(&group_id, retention).await;
        Ok(retention)
    }

    /// Invite `email` into the group. The member only joins once the mail
    /// went out.
    async fn add_member(
        &self,
        usr: String,
        grp: String,
        email: String,
    ) -> Result<Value, DispatchError> {
        let group_name = store_reply(
            self.store
                .ask(AuthorizeInviteRequest {
                    group_id: grp.clone(),
                    acting_id: usr.clone(),
                })
                .await,
        )?;

        let new_member_id = self.hasher.member_id(&email);
        let invitation = Invitation::to_group(
            &self.invitations.from_address,
            &email,
            &group_name,
            &self.invitations.confirmation_link(&new_member_id),
        );
        if let Err(err) = self.mailer.send_invitation(&invitation).await {
            warn!("Invitation to {email} for group {grp} failed: {err}");
            return Ok(delivery_failed(&err));
        }

        self.mutate(
            grp,
            Mutation::AddMember {
                acting_id: usr,
                new_member_id,
            },
        )
        .await?;
        Ok(delivery_succeeded())
    }

    async fn signup(&self, email: String) -> Result<Value, DispatchError> {
        let member_id = self.hasher.member_id(&email);
        let invitation = Invitation::signup(
            &self.invitations.from_address,
            &email,
            &self.invitations.confirmation_link(&member_id),
        );
        match self.mailer.send_invitation(&invitation).await {
            Ok(()) => Ok(delivery_succeeded()),
            Err(err) => {
                warn!("Signup mail to {email} failed: {err}");
                Ok(delivery_failed(&err))
            }
        }
    }
}

fn delivery_succeeded() -> Value {
    json!({ "result": "success" })
}

fn delivery_failed(err: &DeliveryError) -> Value {
    json!({ "result": "error", "error": err.to_string() })
}

/// Unwrap an `ask` result: handler errors keep their meaning, anything else
/// means the store actor is gone.
fn store_reply<T, M>(reply: Result<T, SendError<M, StoreError>>) -> Result<T, DispatchError> {
    reply.map_err(|err| match err {
        SendError::HandlerError(err) => DispatchError::StoreError(err),
        _ => DispatchError::StoreUnavailable,
    })
}
