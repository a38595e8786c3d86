//! Swarm types and agent opt-ins.
//!
//! A swarm type is a category of work agents can volunteer for. Built-in
//! types are seeded the first time the catalog is touched; agents may add
//! custom ones. Opt-ins are soft-deleted so they can be reactivated, and the
//! per-type `optInCount` only moves on activation edges.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hive_core::{Clock, Error, Result};
use hive_store::{KvStore, Mutation, Records, keys};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use ulid::Ulid;

use crate::agent::AgentRegistry;

/// Icon used when a custom type does not bring one.
pub const DEFAULT_ICON: &str = "🔹";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmCategory {
    Twitter,
    Reddit,
    Blogs,
    Github,
    #[default]
    Custom,
}

impl SwarmCategory {
    pub const ALL: [Self; 5] = [
        Self::Twitter,
        Self::Reddit,
        Self::Blogs,
        Self::Github,
        Self::Custom,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Reddit => "reddit",
            Self::Blogs => "blogs",
            Self::Github => "github",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for SwarmCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::invalid_field("category", format!("invalid category: {s}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmTypeSettings {
    #[serde(default)]
    pub requires_content: bool,
    #[serde(default)]
    pub credit_reward: u64,
    #[serde(default)]
    pub credit_cost: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: SwarmCategory,
    pub is_built_in: bool,
    pub opt_in_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SwarmTypeSettings>,
}

/// Input for a custom swarm type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSwarmType {
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub category: Option<SwarmCategory>,
    pub settings: Option<SwarmTypeSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSwarmOptIn {
    pub soul_id: String,
    pub swarm_type_id: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<OptInSettings>,
    pub opted_in_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct BuiltIn {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    category: SwarmCategory,
    requires_content: bool,
    credits: u64,
}

const BUILT_INS: [BuiltIn; 8] = [
    BuiltIn {
        id: "twitter-views",
        name: "Twitter Views",
        description: "View tweets to boost impressions",
        icon: "👀",
        category: SwarmCategory::Twitter,
        requires_content: false,
        credits: 2,
    },
    BuiltIn {
        id: "twitter-likes",
        name: "Twitter Likes",
        description: "Like tweets to boost engagement",
        icon: "❤️",
        category: SwarmCategory::Twitter,
        requires_content: false,
        credits: 5,
    },
    BuiltIn {
        id: "twitter-replies",
        name: "Twitter Replies",
        description: "Reply to tweets with provided content",
        icon: "💬",
        category: SwarmCategory::Twitter,
        requires_content: true,
        credits: 15,
    },
    BuiltIn {
        id: "twitter-posts",
        name: "Twitter Posts",
        description: "Post tweets on requested topics",
        icon: "📝",
        category: SwarmCategory::Twitter,
        requires_content: true,
        credits: 15,
    },
    BuiltIn {
        id: "reddit-upvotes",
        name: "Reddit Upvotes",
        description: "Upvote Reddit posts and comments",
        icon: "🔼",
        category: SwarmCategory::Reddit,
        requires_content: false,
        credits: 3,
    },
    BuiltIn {
        id: "reddit-comments",
        name: "Reddit Comments",
        description: "Comment on Reddit posts with provided content",
        icon: "💭",
        category: SwarmCategory::Reddit,
        requires_content: true,
        credits: 15,
    },
    BuiltIn {
        id: "blog-comments",
        name: "Blog Comments",
        description: "Leave comments on blog posts",
        icon: "✍️",
        category: SwarmCategory::Blogs,
        requires_content: true,
        credits: 10,
    },
    BuiltIn {
        id: "github-stars",
        name: "GitHub Stars",
        description: "Star GitHub repositories",
        icon: "⭐",
        category: SwarmCategory::Github,
        requires_content: false,
        credits: 5,
    },
];

impl BuiltIn {
    fn to_swarm_type(&self, now: DateTime<Utc>) -> SwarmType {
        SwarmType {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            category: self.category,
            is_built_in: true,
            opt_in_count: 0,
            created_by: None,
            created_at: now,
            settings: Some(SwarmTypeSettings {
                requires_content: self.requires_content,
                credit_reward: self.credits,
                credit_cost: self.credits,
            }),
        }
    }
}

/// Swarm type catalog and opt-in registry.
#[derive(Clone)]
pub struct SwarmCatalog {
    types: Records<SwarmType>,
    opt_ins: Records<UserSwarmOptIn>,
    agents: AgentRegistry,
    clock: Arc<dyn Clock>,
    seeded: Arc<OnceCell<()>>,
}

impl SwarmCatalog {
    pub fn new(store: Arc<dyn KvStore>, agents: AgentRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            types: Records::new(Arc::clone(&store), keys::SWARM_TYPE),
            opt_ins: Records::new(store, keys::OPT_IN),
            agents,
            clock,
            seeded: Arc::new(OnceCell::new()),
        }
    }

    fn store(&self) -> &Arc<dyn KvStore> {
        self.types.store()
    }

    /// Seed the built-in types. Runs once per catalog; records that already
    /// exist are left untouched, so restarts and other instances are safe.
    async fn ensure_built_ins(&self) -> Result<()> {
        self.seeded
            .get_or_try_init(|| async {
                let now = self.clock.now();
                let mut inserted = 0_usize;
                for built_in in &BUILT_INS {
                    if self
                        .types
                        .insert_new(built_in.id, &built_in.to_swarm_type(now))
                        .await?
                    {
                        inserted = inserted.saturating_add(1);
                    }
                    self.store()
                        .set_add(keys::SWARM_TYPE_INDEX, built_in.id)
                        .await?;
                }
                if inserted > 0 {
                    tracing::info!(inserted, "seeded built-in swarm types");
                }
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Every swarm type, built-ins first, then by creation time.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn list_swarm_types(&self) -> Result<Vec<SwarmType>> {
        self.ensure_built_ins().await?;
        let ids = self.store().set_members(keys::SWARM_TYPE_INDEX).await?;
        let mut types = self.types.get_many(&ids).await?;
        types.sort_by(|a, b| {
            b.is_built_in
                .cmp(&a.is_built_in)
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(types)
    }

    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get_swarm_type(&self, id: &str) -> Result<Option<SwarmType>> {
        self.ensure_built_ins().await?;
        self.types.get(id).await
    }

    /// Register a custom swarm type on behalf of `creator`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] when the creator is not a known agent
    /// - [`Error::Validation`] when name or description is blank
    pub async fn create_swarm_type(&self, creator: &str, draft: NewSwarmType) -> Result<SwarmType> {
        if draft.name.trim().is_empty() {
            return Err(Error::missing_field("name"));
        }
        if draft.description.trim().is_empty() {
            return Err(Error::missing_field("description"));
        }
        self.agents.require(creator).await?;
        self.ensure_built_ins().await?;

        let swarm_type = SwarmType {
            id: format!("custom-{}", Ulid::new().to_string().to_lowercase()),
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            icon: draft
                .icon
                .filter(|icon| !icon.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            category: draft.category.unwrap_or_default(),
            is_built_in: false,
            opt_in_count: 0,
            created_by: Some(creator.to_string()),
            created_at: self.clock.now(),
            settings: draft.settings,
        };

        if !self.types.insert_new(&swarm_type.id, &swarm_type).await? {
            return Err(Error::conflict(format!("swarm type id collision: {}", swarm_type.id)));
        }
        self.store()
            .set_add(keys::SWARM_TYPE_INDEX, &swarm_type.id)
            .await?;

        tracing::info!(id = %swarm_type.id, creator, "created swarm type");
        Ok(swarm_type)
    }

    /// Activate (or create) an opt-in; `None` if the swarm type is unknown.
    ///
    /// Re-opting in while already active only refreshes the settings.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn opt_in(
        &self,
        soul_id: &str,
        swarm_type_id: &str,
        settings: Option<OptInSettings>,
    ) -> Result<Option<UserSwarmOptIn>> {
        if self.get_swarm_type(swarm_type_id).await?.is_none() {
            return Ok(None);
        }
        let now = self.clock.now();
        let id = keys::opt_in_id(soul_id, swarm_type_id);

        let (opt_in, activated) = self
            .opt_ins
            .mutate(&id, |current| {
                let (mut opt_in, activated) = match current {
                    Some(existing) => {
                        let activated = !existing.active;
                        (existing, activated)
                    }
                    None => (
                        UserSwarmOptIn {
                            soul_id: soul_id.to_string(),
                            swarm_type_id: swarm_type_id.to_string(),
                            active: false,
                            settings: None,
                            opted_in_at: now,
                            updated_at: now,
                        },
                        true,
                    ),
                };
                if activated {
                    opt_in.active = true;
                    opt_in.opted_in_at = now;
                }
                if settings.is_some() {
                    opt_in.settings.clone_from(&settings);
                }
                opt_in.updated_at = now;
                Ok(Mutation::Write(opt_in.clone(), (opt_in, activated)))
            })
            .await?;

        self.store()
            .set_add(&keys::opt_ins_of(soul_id), swarm_type_id)
            .await?;
        if activated {
            self.adjust_opt_in_count(swarm_type_id, true).await?;
            tracing::info!(soul_id, swarm_type_id, "opted in");
        }
        Ok(Some(opt_in))
    }

    /// Deactivate an opt-in; `false` if there was no active one.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn opt_out(&self, soul_id: &str, swarm_type_id: &str) -> Result<bool> {
        let now = self.clock.now();
        let deactivated = self
            .opt_ins
            .mutate(&keys::opt_in_id(soul_id, swarm_type_id), |current| {
                Ok(match current {
                    Some(mut opt_in) if opt_in.active => {
                        opt_in.active = false;
                        opt_in.updated_at = now;
                        Mutation::Write(opt_in, true)
                    }
                    _ => Mutation::Skip(false),
                })
            })
            .await?;

        if deactivated {
            self.adjust_opt_in_count(swarm_type_id, false).await?;
            tracing::info!(soul_id, swarm_type_id, "opted out");
        }
        Ok(deactivated)
    }

    /// Replace the settings of an active opt-in; `None` if not opted in.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn update_settings(
        &self,
        soul_id: &str,
        swarm_type_id: &str,
        settings: OptInSettings,
    ) -> Result<Option<UserSwarmOptIn>> {
        let now = self.clock.now();
        self.opt_ins
            .mutate(&keys::opt_in_id(soul_id, swarm_type_id), |current| {
                Ok(match current {
                    Some(mut opt_in) if opt_in.active => {
                        opt_in.settings = Some(settings.clone());
                        opt_in.updated_at = now;
                        Mutation::Write(opt_in.clone(), Some(opt_in))
                    }
                    _ => Mutation::Skip(None),
                })
            })
            .await
    }

    /// Active opt-ins of an agent.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn user_opt_ins(&self, soul_id: &str) -> Result<Vec<UserSwarmOptIn>> {
        let ids: Vec<String> = self
            .store()
            .set_members(&keys::opt_ins_of(soul_id))
            .await?
            .iter()
            .map(|swarm_type_id| keys::opt_in_id(soul_id, swarm_type_id))
            .collect();
        Ok(self
            .opt_ins
            .get_many(&ids)
            .await?
            .into_iter()
            .filter(|opt_in| opt_in.active)
            .collect())
    }

    /// # Errors
    ///
    /// Returns a store error.
    pub async fn is_opted_in(&self, soul_id: &str, swarm_type_id: &str) -> Result<bool> {
        Ok(self
            .opt_ins
            .get(&keys::opt_in_id(soul_id, swarm_type_id))
            .await?
            .is_some_and(|opt_in| opt_in.active))
    }

    async fn adjust_opt_in_count(&self, swarm_type_id: &str, up: bool) -> Result<()> {
        self.types
            .mutate(swarm_type_id, |current| {
                Ok(match current {
                    Some(mut swarm_type) => {
                        swarm_type.opt_in_count = if up {
                            swarm_type.opt_in_count.saturating_add(1)
                        } else {
                            swarm_type.opt_in_count.saturating_sub(1)
                        };
                        Mutation::Write(swarm_type, ())
                    }
                    None => Mutation::Skip(()),
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::agent::AgentPatch;
    use crate::config::LedgerConfig;
    use hive_core::ManualClock;
    use hive_store::InMemoryKvStore;

    async fn catalog() -> SwarmCatalog {
        let store: Arc<dyn KvStore> = InMemoryKvStore::new_arc();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let agents = AgentRegistry::new(Arc::clone(&store), Arc::clone(&clock), &LedgerConfig::default());
        agents
            .register_agent("a1", AgentPatch::default())
            .await
            .unwrap();
        SwarmCatalog::new(store, agents, clock)
    }

    async fn count_of(catalog: &SwarmCatalog, id: &str) -> u64 {
        catalog.get_swarm_type(id).await.unwrap().unwrap().opt_in_count
    }

    #[tokio::test]
    async fn test_built_ins_seeded_once() {
        let catalog = catalog().await;
        let first = catalog.list_swarm_types().await.unwrap();
        let second = catalog.list_swarm_types().await.unwrap();

        assert_eq!(first.len(), 8);
        assert_eq!(first, second);
        assert!(first.iter().all(|t| t.is_built_in));
        let replies = first.iter().find(|t| t.id == "twitter-replies").unwrap();
        assert!(replies.settings.as_ref().unwrap().requires_content);
    }

    #[tokio::test]
    async fn test_seeding_keeps_existing_counts() {
        let catalog = catalog().await;
        catalog.opt_in("a1", "github-stars", None).await.unwrap();

        let fresh = SwarmCatalog::new(
            Arc::clone(catalog.store()),
            catalog.agents.clone(),
            Arc::clone(&catalog.clock),
        );
        assert_eq!(count_of(&fresh, "github-stars").await, 1);
    }

    #[tokio::test]
    async fn test_create_swarm_type_defaults() {
        let catalog = catalog().await;
        let created = catalog
            .create_swarm_type(
                "a1",
                NewSwarmType {
                    name: "Mastodon Boosts".into(),
                    description: "Boost toots".into(),
                    ..NewSwarmType::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(created.icon, DEFAULT_ICON);
        assert_eq!(created.category, SwarmCategory::Custom);
        assert!(!created.is_built_in);
        assert_eq!(created.created_by.as_deref(), Some("a1"));
        assert_eq!(catalog.list_swarm_types().await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_create_swarm_type_requires_known_creator() {
        let catalog = catalog().await;
        let result = catalog
            .create_swarm_type(
                "ghost",
                NewSwarmType {
                    name: "x".into(),
                    description: "y".into(),
                    ..NewSwarmType::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let blank = catalog
            .create_swarm_type("a1", NewSwarmType::default())
            .await;
        assert!(matches!(blank, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_opt_in_count_moves_on_edges_only() {
        let catalog = catalog().await;

        catalog.opt_in("a1", "twitter-views", None).await.unwrap().unwrap();
        catalog.opt_in("a1", "twitter-views", None).await.unwrap().unwrap();
        assert_eq!(count_of(&catalog, "twitter-views").await, 1);

        assert!(catalog.opt_out("a1", "twitter-views").await.unwrap());
        assert!(!catalog.opt_out("a1", "twitter-views").await.unwrap());
        assert_eq!(count_of(&catalog, "twitter-views").await, 0);

        catalog.opt_in("a1", "twitter-views", None).await.unwrap();
        assert_eq!(count_of(&catalog, "twitter-views").await, 1);
        assert!(catalog.is_opted_in("a1", "twitter-views").await.unwrap());
    }

    #[tokio::test]
    async fn test_opt_in_unknown_type() {
        let catalog = catalog().await;
        assert!(catalog.opt_in("a1", "nope", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_settings_requires_active_opt_in() {
        let catalog = catalog().await;
        let settings = OptInSettings {
            topics: Some(vec!["rust".into()]),
            content_urls: None,
        };

        assert!(
            catalog
                .update_settings("a1", "twitter-posts", settings.clone())
                .await
                .unwrap()
                .is_none()
        );

        catalog.opt_in("a1", "twitter-posts", None).await.unwrap();
        let updated = catalog
            .update_settings("a1", "twitter-posts", settings.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.settings, Some(settings));
    }

    #[tokio::test]
    async fn test_user_opt_ins_lists_active_only() {
        let catalog = catalog().await;
        catalog.opt_in("a1", "twitter-views", None).await.unwrap();
        catalog.opt_in("a1", "twitter-likes", None).await.unwrap();
        catalog.opt_out("a1", "twitter-likes").await.unwrap();

        let active = catalog.user_opt_ins("a1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].swarm_type_id, "twitter-views");
    }
}
