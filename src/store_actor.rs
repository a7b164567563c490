use kameo::message::{Context, Message};

use crate::{
    error::{GroupError, StoreError},
    group::{CurrentView, Group, PublicView, Retention, Role},
    store::GroupStore,
};

/// A single change to one group, applied inside the store actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddNomination {
        member_id: String,
        text: String,
    },
    RemoveNomination {
        member_id: String,
        text: String,
    },
    SetMemberName {
        member_id: String,
        name: String,
    },
    Resign {
        member_id: String,
    },
    Promote {
        acting_id: Option<String>,
        member_name: String,
    },
    AddMember {
        acting_id: String,
        new_member_id: String,
    },
}

impl Mutation {
    pub fn apply(self, group: &mut Group) -> Result<(), GroupError> {
        match self {
            Mutation::AddNomination { member_id, text } => {
                group.member_mut(&member_id)?.add_nomination(&text);
            }
            Mutation::RemoveNomination { member_id, text } => {
                group.member_mut(&member_id)?.remove_nomination(&text);
            }
            Mutation::SetMemberName { member_id, name } => {
                group.member_mut(&member_id)?.set_name(name);
            }
            Mutation::Resign { member_id } => {
                group.remove_member(&member_id)?;
            }
            Mutation::Promote {
                acting_id,
                member_name,
            } => {
                if let Some(acting_id) = acting_id {
                    if group.member(&acting_id)?.role != Role::Initiator {
                        return Err(GroupError::Forbidden(format!(
                            "member {acting_id} is a proposer and can't promote"
                        )));
                    }
                }
                group.promote(&member_name)?;
            }
            Mutation::AddMember {
                acting_id,
                new_member_id,
            } => {
                group.add_member(&acting_id, &new_member_id)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CreateGroupRequest {
    pub creator_id: String,
    pub name: String,
}

impl Message<CreateGroupRequest> for GroupStore {
    type Reply = Result<Group, StoreError>;

    async fn handle(
        &mut self,
        msg: CreateGroupRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        let group = Group::create(msg.name, msg.creator_id);
        self.backup_or_remove(group.clone()).await?;
        Ok(group)
    }
}

#[derive(Debug)]
pub struct MutateGroupRequest {
    pub group_id: String,
    pub mutation: Mutation,
}

impl Message<MutateGroupRequest> for GroupStore {
    type Reply = Result<Retention, StoreError>;

    async fn handle(
        &mut self,
        msg: MutateGroupRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        let mutation = msg.mutation;
        let ((), retention) = self
            .mutate(&msg.group_id, move |group| mutation.apply(group))
            .await?;
        Ok(retention)
    }
}

/// Checks that `acting_id` may invite into the group; replies with the group name.
#[derive(Debug)]
pub struct AuthorizeInviteRequest {
    pub group_id: String,
    pub acting_id: String,
}

impl Message<AuthorizeInviteRequest> for GroupStore {
    type Reply = Result<String, StoreError>;

    async fn handle(
        &mut self,
        msg: AuthorizeInviteRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        let group = self.find_by_id(&msg.group_id)?;
        group.authorize_invite(&msg.acting_id)?;
        Ok(group.name().to_string())
    }
}

#[derive(Debug)]
pub struct ListGroupsRequest {
    pub member_id: String,
}

impl Message<ListGroupsRequest> for GroupStore {
    type Reply = Result<Vec<PublicView>, StoreError>;

    async fn handle(
        &mut self,
        msg: ListGroupsRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        let views = self
            .groups_containing_member(&msg.member_id)
            .into_iter()
            .map(|group| group.public_view(&msg.member_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }
}

#[derive(Debug)]
pub struct EnterGroupRequest {
    pub group_id: String,
    pub member_id: String,
}

impl Message<EnterGroupRequest> for GroupStore {
    type Reply = Result<CurrentView, StoreError>;

    async fn handle(
        &mut self,
        msg: EnterGroupRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        let view = self
            .find_by_id(&msg.group_id)?
            .current_view(&msg.member_id)?;
        Ok(view)
    }
}

/// Copy of a live group, if it is still in the store.
#[derive(Debug)]
pub struct GroupSnapshotRequest {
    pub group_id: String,
}

impl Message<GroupSnapshotRequest> for GroupStore {
    type Reply = Result<Option<Group>, StoreError>;

    async fn handle(
        &mut self,
        msg: GroupSnapshotRequest,
        _ctx: Context<'_, Self, Self::Reply>,
    ) -> Self::Reply {
        Ok(self.find_optional_by_id(&msg.group_id).cloned())
    }
}
