use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::GroupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Sees every proposal, may invite and promote, and keeps the group alive.
    Initiator,
    /// May only submit nominations.
    #[default]
    Proposer,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub name: String,
    pub id: String,
    pub nominations: Vec<String>,
    pub role: Role,
}

impl Member {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Member {
            id: id.into(),
            role,
            ..Default::default()
        }
    }

    /// Append the trimmed text unless it is empty or already nominated.
    /// Returns whether the list changed.
    pub fn add_nomination(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.nominations.iter().any(|n| n == text) {
            return false;
        }
        self.nominations.push(text.to_string());
        true
    }

    /// Remove the first exact match. Returns whether the list changed.
    pub fn remove_nomination(&mut self, text: &str) -> bool {
        match self.nominations.iter().position(|n| n == text) {
            Some(index) => {
                self.nominations.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_initiator(&self) -> bool {
        matches!(self.role, Role::Initiator)
    }

    pub fn record(&self) -> MemberRecord {
        MemberRecord {
            name: self.name.clone(),
            nominations: self.nominations.clone(),
            role: self.role,
        }
    }

    fn public(&self) -> PublicMember {
        PublicMember {
            name: self.name.clone(),
            role: self.role,
        }
    }

    fn dedup_nominations(&mut self) {
        let mut seen = HashSet::new();
        self.nominations.retain(|n| seen.insert(n.clone()));
    }
}

/// What the backup-or-remove policy decided for a group after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Persist,
    Remove,
}

/// A named collection of members collaborating on one nomination list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    name: String,
    id: String,
    #[serde(default)]
    members: Vec<Member>,
}

impl Group {
    /// New group with a fresh id and the creator as its only INITIATOR.
    pub fn create(name: impl Into<String>, creator_id: impl Into<String>) -> Self {
        Group {
            name: name.into(),
            id: uuid::Uuid::new_v4().to_string(),
            members: vec![Member::new(creator_id, Role::Initiator)],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn contains_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|m| m.id == member_id)
    }

    pub fn member(&self, member_id: &str) -> Result<&Member, GroupError> {
        self.members
            .iter()
            .find(|m| m.id == member_id)
            .ok_or_else(|| GroupError::MemberNotFound(member_id.to_string()))
    }

    pub fn member_mut(&mut self, member_id: &str) -> Result<&mut Member, GroupError> {
        self.members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| GroupError::MemberNotFound(member_id.to_string()))
    }

    /// Promote the first member whose name matches exactly.
    /// There is no way back from INITIATOR.
    pub fn promote(&mut self, member_name: &str) -> Result<(), GroupError> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.name == member_name)
            .ok_or_else(|| GroupError::NoMemberNamed(member_name.to_string()))?;
        member.role = Role::Initiator;
        Ok(())
    }

    pub fn remove_member(&mut self, member_id: &str) -> Result<Member, GroupError> {
        let index = self
            .members
            .iter()
            .position(|m| m.id == member_id)
            .ok_or_else(|| GroupError::MemberNotFound(member_id.to_string()))?;
        Ok(self.members.remove(index))
    }

    /// Only INITIATORs may bring new people into the group.
    pub fn authorize_invite(&self, acting_id: &str) -> Result<(), GroupError> {
        match self.member(acting_id)?.role {
            Role::Initiator => Ok(()),
            Role::Proposer => Err(GroupError::Forbidden(format!(
                "member {acting_id} is a proposer and can't invite"
            ))),
        }
    }

    /// Add `new_member_id` as a PROPOSER on behalf of `acting_id`.
    /// Returns false when the id is already a member.
    pub fn add_member(&mut self, acting_id: &str, new_member_id: &str) -> Result<bool, GroupError> {
        self.authorize_invite(acting_id)?;
        if self.contains_member(new_member_id) {
            return Ok(false);
        }
        self.members.push(Member::new(new_member_id, Role::Proposer));
        Ok(true)
    }

    pub fn has_initiator(&self) -> bool {
        self.members.iter().any(Member::is_initiator)
    }

    pub fn retention(&self) -> Retention {
        if self.has_initiator() {
            Retention::Persist
        } else {
            Retention::Remove
        }
    }

    pub fn public_view(&self, viewer_id: &str) -> Result<PublicView, GroupError> {
        let me = self.member(viewer_id)?.record();
        let others = self
            .members
            .iter()
            .filter(|m| m.id != viewer_id)
            .map(Member::public)
            .collect();
        Ok(PublicView {
            name: self.name.clone(),
            id: self.id.clone(),
            me,
            others,
        })
    }

    pub fn current_view(&self, viewer_id: &str) -> Result<CurrentView, GroupError> {
        let me = self.member(viewer_id)?.record();

        let proposers = distinct(
            self.members_with(Role::Proposer)
                .map(|m| m.name.clone()),
        );
        let proposers_nominations = distinct(
            self.members_with(Role::Proposer)
                .filter(|m| m.id != viewer_id)
                .flat_map(|m| m.nominations.iter().cloned()),
        );
        let initiators = self
            .members_with(Role::Initiator)
            .map(|m| m.name.clone())
            .collect();
        let stats = self
            .members
            .iter()
            .map(|m| (m.name.clone(), m.nominations.len()))
            .collect();

        Ok(CurrentView {
            name: self.name.clone(),
            id: self.id.clone(),
            me,
            proposers,
            proposers_nominations,
            initiators,
            stats,
            duplicates: self.initiator_duplicates(),
        })
    }

    /// Nominations shared by at least two INITIATORs, in first-seen order.
    fn initiator_duplicates(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for member in self.members_with(Role::Initiator) {
            let mut seen = HashSet::new();
            for nomination in &member.nominations {
                if !seen.insert(nomination.as_str()) {
                    continue;
                }
                let count = counts.entry(nomination.as_str()).or_insert(0);
                if *count == 0 {
                    order.push(nomination.as_str());
                }
                *count += 1;
            }
        }
        order
            .into_iter()
            .filter(|n| counts.get(n).copied().unwrap_or(0) > 1)
            .map(str::to_string)
            .collect()
    }

    fn members_with(&self, role: Role) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(move |m| m.role == role)
    }

    /// Restore the uniqueness invariants on a document read from a backend.
    pub(crate) fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.members.retain(|m| seen.insert(m.id.clone()));
        for member in &mut self.members {
            member.dedup_nominations();
        }
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Group {:?} ({})", self.name, self.id)
    }
}

fn distinct(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

/// A member as shown to themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub name: String,
    pub nominations: Vec<String>,
    pub role: Role,
}

/// A member as shown to the others in a group listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMember {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicView {
    pub name: String,
    pub id: String,
    pub me: MemberRecord,
    pub others: Vec<PublicMember>,
}

/// Role-aware dashboard returned by `enter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentView {
    pub name: String,
    pub id: String,
    pub me: MemberRecord,
    pub proposers: Vec<String>,
    pub proposers_nominations: Vec<String>,
    pub initiators: Vec<String>,
    pub stats: BTreeMap<String, usize>,
    pub duplicates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(group: &mut Group, id: &str, name: &str) {
        group.member_mut(id).expect("member").set_name(name);
    }

    #[test]
    fn test_create_group() {
        let group = Group::create("Pets", "u1");
        assert_eq!(group.name(), "Pets");
        assert_eq!(group.members().len(), 1);
        assert_eq!(group.members()[0].id, "u1");
        assert_eq!(group.members()[0].role, Role::Initiator);
        assert!(group.members()[0].name.is_empty());
        assert!(group.members()[0].nominations.is_empty());
        assert_ne!(Group::create("Pets", "u1").id(), group.id());
    }

    #[test]
    fn test_nominations_are_set_like() {
        let mut member = Member::new("u1", Role::Initiator);
        assert!(member.add_nomination("  Rex "));
        assert!(!member.add_nomination("Rex"));
        assert!(member.add_nomination("rex"));
        assert!(!member.add_nomination("   "));
        assert_eq!(member.nominations, vec!["Rex", "rex"]);

        assert!(member.remove_nomination("Rex"));
        assert!(!member.remove_nomination("Rex"));
        assert!(member.add_nomination("Rex"));
        assert_eq!(member.nominations, vec!["rex", "Rex"]);
    }

    #[test]
    fn test_promote_is_one_way_and_by_name() {
        let mut group = Group::create("Pets", "u1");
        group.add_member("u1", "u2").expect("add member");
        named(&mut group, "u2", "Bob");

        assert!(matches!(
            group.promote("Nobody"),
            Err(GroupError::NoMemberNamed(_))
        ));
        group.promote("Bob").expect("promote");
        assert_eq!(group.member("u2").expect("member").role, Role::Initiator);

        group.promote("Bob").expect("promote twice");
        assert_eq!(group.member("u2").expect("member").role, Role::Initiator);
    }

    #[test]
    fn test_proposer_cannot_invite() {
        let mut group = Group::create("Pets", "u1");
        assert!(group.add_member("u1", "u2").expect("add member"));
        assert!(!group.add_member("u1", "u2").expect("re-add member"));

        let result = group.add_member("u2", "u3");
        assert!(matches!(result, Err(GroupError::Forbidden(_))));
        assert_eq!(group.members().len(), 2);

        let result = group.add_member("ghost", "u3");
        assert!(matches!(result, Err(GroupError::MemberNotFound(_))));
    }

    #[test]
    fn test_retention_follows_initiators() {
        let mut group = Group::create("Pets", "u1");
        group.add_member("u1", "u2").expect("add member");
        assert_eq!(group.retention(), Retention::Persist);

        group.remove_member("u1").expect("remove member");
        assert_eq!(group.members().len(), 1);
        assert_eq!(group.retention(), Retention::Remove);
    }

    #[test]
    fn test_public_view() {
        let mut group = Group::create("Pets", "u1");
        group.add_member("u1", "u2").expect("add member");
        named(&mut group, "u1", "Alice");
        named(&mut group, "u2", "Bob");
        group.member_mut("u1").expect("member").add_nomination("Rex");

        let view = group.public_view("u1").expect("view");
        assert_eq!(view.id, group.id());
        assert_eq!(view.me.nominations, vec!["Rex"]);
        assert_eq!(
            view.others,
            vec![PublicMember {
                name: "Bob".to_string(),
                role: Role::Proposer
            }]
        );
        assert!(matches!(
            group.public_view("ghost"),
            Err(GroupError::MemberNotFound(_))
        ));
    }

    #[test]
    fn test_current_view_filters_by_role() {
        let mut group = Group::create("Names", "i1");
        group.add_member("i1", "i2").expect("add member");
        group.add_member("i1", "p1").expect("add member");
        group.add_member("i1", "p2").expect("add member");
        named(&mut group, "i1", "Ann");
        named(&mut group, "i2", "Ann");
        named(&mut group, "p1", "Pia");
        named(&mut group, "p2", "Pia");
        group.promote("Ann").expect("promote");
        group.member_mut("i2").expect("member").role = Role::Initiator;

        for (id, names) in [
            ("i1", vec!["Max", "Leo"]),
            ("i2", vec!["Max", "Ida"]),
            ("p1", vec!["Max", "Leo", "Ida"]),
            ("p2", vec!["Tom"]),
        ] {
            let member = group.member_mut(id).expect("member");
            for name in names {
                member.add_nomination(name);
            }
        }

        let view = group.current_view("p1").expect("view");
        assert_eq!(view.me.nominations, vec!["Max", "Leo", "Ida"]);
        assert_eq!(view.proposers, vec!["Pia"]);
        assert_eq!(view.proposers_nominations, vec!["Tom"]);
        assert_eq!(view.initiators, vec!["Ann", "Ann"]);
        assert_eq!(view.duplicates, vec!["Max"]);
        assert_eq!(view.stats.len(), 2);
        assert_eq!(view.stats["Pia"], 1);
        assert_eq!(view.stats["Ann"], 2);

        let view = group.current_view("i1").expect("view");
        assert_eq!(view.proposers_nominations, vec!["Max", "Leo", "Ida", "Tom"]);
    }

    #[test]
    fn test_duplicates_ignore_proposers() {
        let mut group = Group::create("Names", "i1");
        group.add_member("i1", "i2").expect("add member");
        group.add_member("i1", "p1").expect("add member");
        named(&mut group, "i2", "Second");
        group.promote("Second").expect("promote");

        group.member_mut("i1").expect("member").add_nomination("Max");
        group.member_mut("p1").expect("member").add_nomination("Max");
        assert!(group.current_view("i1").expect("view").duplicates.is_empty());

        group.member_mut("i2").expect("member").add_nomination("Max");
        assert_eq!(group.current_view("p1").expect("view").duplicates, vec!["Max"]);
    }

    #[test]
    fn test_document_round_trip() {
        let mut group = Group::create("Pets", "u1");
        group.add_member("u1", "u2").expect("add member");
        named(&mut group, "u2", "Bob");
        group.member_mut("u2").expect("member").add_nomination("Rex");
        group.member_mut("u1").expect("member").add_nomination("Max");

        let document = serde_json::to_string(&group).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&document).expect("json");
        assert_eq!(value["members"][0]["role"], "INITIATOR");
        assert_eq!(value["members"][1]["nominations"][0], "Rex");

        let restored: Group = serde_json::from_str(&document).expect("deserialize");
        assert_eq!(restored, group);
    }

    #[test]
    fn test_normalize_legacy_document() {
        let document = r#"{"name":"Old","id":"g1","members":[
            {"id":"u1","role":"INITIATOR","nominations":["A","A","B"]},
            {"id":"u1","role":"PROPOSER"},
            {"id":"u2"}
        ]}"#;
        let mut group: Group = serde_json::from_str(document).expect("deserialize");
        group.normalize();
        assert_eq!(group.members().len(), 2);
        assert_eq!(group.members()[0].nominations, vec!["A", "B"]);
        assert_eq!(group.members()[1].role, Role::Proposer);
        assert!(group.members()[1].name.is_empty());
    }
}
