//! Relationship resolution between actors.

use crate::ActorId;
use policy::RelationshipSources;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Friend-list service.
pub trait FriendsProvider: Send + Sync {
    fn are_friends(&self, a: ActorId, b: ActorId) -> bool;
}

/// Clan membership service.
pub trait ClanProvider: Send + Sync {
    /// The actor's clan tag, if they belong to one.
    fn clan_of(&self, actor: ActorId) -> Option<String>;
}

/// Team membership service.
pub trait TeamProvider: Send + Sync {
    /// Members of the actor's team, if they are on one.
    fn team_members(&self, actor: ActorId) -> Option<HashSet<ActorId>>;
}

/// Why two actors count as related.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    SameActor,
    Friends,
    Clan,
    Team,
}

/// Decides whether an actor may act on another actor's claimed object.
///
/// Nothing is cached; every query goes to the providers.
#[derive(Clone, Default)]
pub struct RelationshipResolver {
    sources: RelationshipSources,
    friends: Option<Arc<dyn FriendsProvider>>,
    clans: Option<Arc<dyn ClanProvider>>,
    teams: Option<Arc<dyn TeamProvider>>,
}

impl RelationshipResolver {
    pub fn new(sources: RelationshipSources) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    pub fn with_friends(mut self, provider: Arc<dyn FriendsProvider>) -> Self {
        self.friends = Some(provider);
        self
    }

    pub fn with_clans(mut self, provider: Arc<dyn ClanProvider>) -> Self {
        self.clans = Some(provider);
        self
    }

    pub fn with_teams(mut self, provider: Arc<dyn TeamProvider>) -> Self {
        self.teams = Some(provider);
        self
    }

    pub fn are_related(&self, actor: ActorId, owner: ActorId) -> bool {
        self.relation(actor, owner).is_some()
    }

    /// The first source that relates `actor` to `owner`.
    ///
    /// Sources are tried in order friends, clan, team. A disabled source or
    /// one without a provider is skipped.
    pub fn relation(&self, actor: ActorId, owner: ActorId) -> Option<Relation> {
        if actor == owner {
            return Some(Relation::SameActor);
        }

        if self.sources.friends {
            if let Some(friends) = &self.friends {
                if friends.are_friends(actor, owner) {
                    return Some(Relation::Friends);
                }
            } else {
                debug!("friends source enabled but no provider installed");
            }
        }

        if self.sources.clans {
            if let Some(clans) = &self.clans {
                let same_clan = match (clans.clan_of(actor), clans.clan_of(owner)) {
                    (Some(a), Some(b)) => !a.is_empty() && a == b,
                    _ => false,
                };
                if same_clan {
                    return Some(Relation::Clan);
                }
            } else {
                debug!("clan source enabled but no provider installed");
            }
        }

        if self.sources.teams {
            if let Some(teams) = &self.teams {
                let same_team = teams
                    .team_members(actor)
                    .is_some_and(|members| members.contains(&owner));
                if same_team {
                    return Some(Relation::Team);
                }
            } else {
                debug!("team source enabled but no provider installed");
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Friends(Vec<(u64, u64)>);

    impl FriendsProvider for Friends {
        fn are_friends(&self, a: ActorId, b: ActorId) -> bool {
            self.0.contains(&(a.0, b.0))
        }
    }

    struct Clans(HashMap<u64, String>);

    impl ClanProvider for Clans {
        fn clan_of(&self, actor: ActorId) -> Option<String> {
            self.0.get(&actor.0).cloned()
        }
    }

    struct Teams(Vec<HashSet<ActorId>>);

    impl TeamProvider for Teams {
        fn team_members(&self, actor: ActorId) -> Option<HashSet<ActorId>> {
            self.0.iter().find(|t| t.contains(&actor)).cloned()
        }
    }

    fn all_sources() -> RelationshipSources {
        RelationshipSources {
            friends: true,
            clans: true,
            teams: true,
        }
    }

    #[test]
    fn test_self_always_related() {
        let resolver = RelationshipResolver::new(RelationshipSources::default());
        assert!(resolver.are_related(ActorId(5), ActorId(5)));

        // enabled sources without providers change nothing
        let resolver = RelationshipResolver::new(all_sources());
        assert_eq!(
            resolver.relation(ActorId(5), ActorId(5)),
            Some(Relation::SameActor)
        );
        assert!(!resolver.are_related(ActorId(5), ActorId(6)));
    }

    #[test]
    fn test_friends_only_when_enabled() {
        let friends = Arc::new(Friends(vec![(1, 2)]));

        let disabled = RelationshipResolver::new(RelationshipSources::default())
            .with_friends(friends.clone());
        assert!(!disabled.are_related(ActorId(1), ActorId(2)));

        let enabled = RelationshipResolver::new(RelationshipSources {
            friends: true,
            ..Default::default()
        })
        .with_friends(friends);
        assert_eq!(
            enabled.relation(ActorId(1), ActorId(2)),
            Some(Relation::Friends)
        );
        assert!(!enabled.are_related(ActorId(2), ActorId(1)));
    }

    #[test]
    fn test_clan_requires_non_empty_equal_tags() {
        let clans = Arc::new(Clans(HashMap::from([
            (1, "RUST".to_string()),
            (2, "RUST".to_string()),
            (3, "".to_string()),
            (4, "".to_string()),
            (5, "OTHER".to_string()),
        ])));
        let resolver = RelationshipResolver::new(all_sources()).with_clans(clans);

        assert_eq!(resolver.relation(ActorId(1), ActorId(2)), Some(Relation::Clan));
        assert!(!resolver.are_related(ActorId(3), ActorId(4)));
        assert!(!resolver.are_related(ActorId(1), ActorId(5)));
        // actor 9 has no clan
        assert!(!resolver.are_related(ActorId(9), ActorId(1)));
    }

    #[test]
    fn test_team_membership() {
        let teams = Arc::new(Teams(vec![HashSet::from([ActorId(1), ActorId(2)])]));
        let resolver = RelationshipResolver::new(all_sources()).with_teams(teams);

        assert_eq!(resolver.relation(ActorId(2), ActorId(1)), Some(Relation::Team));
        assert!(!resolver.are_related(ActorId(3), ActorId(1)));
    }

    #[test]
    fn test_first_matching_source_wins() {
        let resolver = RelationshipResolver::new(all_sources())
            .with_friends(Arc::new(Friends(vec![(1, 2)])))
            .with_teams(Arc::new(Teams(vec![HashSet::from([ActorId(1), ActorId(2)])])));

        assert_eq!(
            resolver.relation(ActorId(1), ActorId(2)),
            Some(Relation::Friends)
        );
        assert_eq!(resolver.relation(ActorId(2), ActorId(1)), Some(Relation::Team));
    }
}
