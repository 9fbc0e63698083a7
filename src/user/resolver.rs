//! Sender display names for one chat view.
//!
//! Every sender id is looked up at most once over the lifetime of a
//! [`NameResolver`]: ids are claimed before the lookup starts, and an id the
//! store does not know is remembered as unknown rather than retried.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, error};
use tokio::time::timeout;

use super::{Repository, Sub};

/// A single pending lookup. Resolves to the id and its name, if any.
pub type Lookup = BoxFuture<'static, (Sub, Option<String>)>;

enum Resolution {
    Pending,
    Named(String),
    Unknown,
}

pub struct NameResolver {
    repo: Repository,
    timeout: Duration,
    cache: HashMap<Sub, Resolution>,
}

impl NameResolver {
    pub fn new(repo: Repository, timeout: Duration) -> Self {
        Self {
            repo,
            timeout,
            cache: HashMap::new(),
        }
    }

    pub fn name(&self, id: &Sub) -> Option<&str> {
        match self.cache.get(id) {
            Some(Resolution::Named(name)) => Some(name),
            _ => None,
        }
    }

    pub fn display_name(&self, id: &Sub) -> String {
        self.name(id)
            .map(String::from)
            .unwrap_or_else(|| id.fallback_name())
    }

    pub fn names(&self) -> BTreeMap<Sub, String> {
        self.cache
            .iter()
            .filter_map(|(id, r)| match r {
                Resolution::Named(name) => Some((id.clone(), name.clone())),
                _ => None,
            })
            .collect()
    }

    /// Resolves all ids not seen before in a single round trip. Ids the store
    /// does not know are absent from the result.
    pub async fn resolve_names(
        &mut self,
        ids: impl IntoIterator<Item = Sub>,
    ) -> HashMap<Sub, String> {
        let unseen = ids
            .into_iter()
            .filter(|id| !self.cache.contains_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        if unseen.is_empty() {
            return HashMap::new();
        }

        for id in &unseen {
            self.cache.insert(id.clone(), Resolution::Pending);
        }

        debug!("resolving {} sender names", unseen.len());
        let resolved = match timeout(self.timeout, self.repo.find_profiles(&unseen)).await {
            Ok(Ok(profiles)) => profiles
                .into_iter()
                .filter_map(|p| p.display_name().map(|name| (p.id().clone(), name)))
                .collect::<HashMap<_, _>>(),
            Ok(Err(e)) => {
                error!("failed to resolve sender names: {e}");
                HashMap::new()
            }
            Err(_) => {
                error!("resolving sender names timed out after {:?}", self.timeout);
                HashMap::new()
            }
        };

        for id in unseen {
            let name = resolved.get(&id).cloned();
            self.complete(id, name);
        }

        resolved
    }

    /// Claims `id` and returns the lookup to run, or `None` when the id is
    /// already resolved or being resolved.
    pub fn resolve_one(&mut self, id: &Sub) -> Option<Lookup> {
        if self.cache.contains_key(id) {
            return None;
        }
        self.cache.insert(id.clone(), Resolution::Pending);

        let repo = self.repo.clone();
        let limit = self.timeout;
        let id = id.clone();

        Some(Box::pin(async move {
            let name = match timeout(limit, repo.find_profile(&id)).await {
                Ok(Ok(profile)) => profile.and_then(|p| p.display_name()),
                Ok(Err(e)) => {
                    error!("failed to resolve name of {id}: {e}");
                    None
                }
                Err(_) => {
                    error!("resolving name of {id} timed out after {limit:?}");
                    None
                }
            };
            (id, name)
        }))
    }

    /// Records the outcome of a lookup started by [`NameResolver::resolve_one`].
    pub fn complete(&mut self, id: Sub, name: Option<String>) {
        let resolution = match name {
            Some(name) => Resolution::Named(name),
            None => Resolution::Unknown,
        };
        self.cache.insert(id, resolution);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::user::model::Profile;
    use crate::user::repository::fake::InMemoryUserRepository;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn jora() -> Profile {
        Profile::new(Sub("jora".into()), Some("Jora"), Some("Cardan"))
    }

    #[tokio::test]
    async fn should_resolve_names_in_batch() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        let mut resolver = NameResolver::new(repo.clone(), TIMEOUT);

        let actual = resolver
            .resolve_names([Sub("jora".into()), Sub("valera".into())])
            .await;

        assert_eq!(actual.len(), 1);
        assert_eq!(actual.get(&Sub("jora".into())).unwrap(), "Jora Cardan");
        assert_eq!(resolver.display_name(&Sub("valera".into())), "valera");
    }

    #[tokio::test]
    async fn should_show_fallback_for_unknown_sender() {
        let repo = Arc::new(InMemoryUserRepository::default());
        let mut resolver = NameResolver::new(repo, TIMEOUT);

        let actual = resolver.resolve_names([Sub("u1".into())]).await;

        assert!(actual.is_empty());
        assert_eq!(resolver.display_name(&Sub("u1".into())), "u1");
    }

    #[tokio::test]
    async fn should_resolve_each_id_at_most_once() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        let mut resolver = NameResolver::new(repo.clone(), TIMEOUT);
        let jora = Sub("jora".into());
        let ghost = Sub("ghost".into());

        resolver.resolve_names([jora.clone(), ghost.clone()]).await;
        resolver.resolve_names([jora.clone(), ghost.clone()]).await;

        assert!(resolver.resolve_one(&jora).is_none());
        assert!(resolver.resolve_one(&ghost).is_none());
        assert_eq!(repo.lookups(&jora), 1);
        assert_eq!(repo.lookups(&ghost), 1);
    }

    #[tokio::test]
    async fn should_not_start_second_lookup_while_pending() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        let mut resolver = NameResolver::new(repo.clone(), TIMEOUT);
        let jora = Sub("jora".into());

        let lookup = resolver.resolve_one(&jora).expect("first lookup");
        assert!(resolver.resolve_one(&jora).is_none());

        let (id, name) = lookup.await;
        resolver.complete(id, name);

        assert_eq!(resolver.name(&jora), Some("Jora Cardan"));
        assert_eq!(repo.lookups(&jora), 1);
    }

    #[tokio::test]
    async fn should_remember_failed_lookup_as_unknown() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        repo.set_unavailable(true);
        let mut resolver = NameResolver::new(repo.clone(), TIMEOUT);
        let jora = Sub("jora".into());

        let actual = resolver.resolve_names([jora.clone()]).await;
        repo.set_unavailable(false);

        assert!(actual.is_empty());
        assert!(resolver.resolve_one(&jora).is_none());
        assert_eq!(resolver.display_name(&jora), "jora");
        assert_eq!(repo.lookups(&jora), 1);
    }

    #[tokio::test]
    async fn should_list_only_named_senders() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        let mut resolver = NameResolver::new(repo, TIMEOUT);

        resolver
            .resolve_names([Sub("jora".into()), Sub("ghost".into())])
            .await;

        let names = resolver.names();
        assert_eq!(names.len(), 1);
        assert_eq!(names.get(&Sub("jora".into())).unwrap(), "Jora Cardan");
    }

    #[tokio::test(start_paused = true)]
    async fn should_fall_back_when_batch_lookup_times_out() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        repo.set_delay(TIMEOUT * 2);
        let mut resolver = NameResolver::new(repo.clone(), TIMEOUT);
        let jora = Sub("jora".into());

        let actual = resolver.resolve_names([jora.clone()]).await;

        assert!(actual.is_empty());
        assert_eq!(resolver.display_name(&jora), "jora");
        assert!(resolver.resolve_one(&jora).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_fall_back_when_single_lookup_times_out() {
        let repo = Arc::new(InMemoryUserRepository::with_profiles([jora()]));
        repo.set_delay(TIMEOUT * 2);
        let mut resolver = NameResolver::new(repo.clone(), TIMEOUT);
        let jora = Sub("jora".into());

        let (id, name) = resolver.resolve_one(&jora).expect("lookup").await;
        resolver.complete(id, name.clone());

        assert!(name.is_none());
        assert_eq!(resolver.display_name(&jora), "jora");
        assert_eq!(repo.lookups(&jora), 1);
    }
}
