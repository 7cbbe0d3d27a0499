use std::collections::HashMap;
use std::collections::HashSet;

use super::AzureBackend;
use super::ConnectionDescriptor;
use crate::arm::ClusterResource;
use crate::arm::ResourceGroup;
use crate::arm::ResourceId;
use crate::arm::Subscription;
use crate::error::Error;

/// Which screen the connection dialog shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Login,
    Loading,
    Resources,
}

/// What a [`TreeRow`] stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Subscription {
        subscription_id: String,
    },
    ResourceGroup {
        subscription_id: String,
        resource_group: String,
    },
    Cluster(ClusterResource),
    /// Text shown under an expanded node with no children.
    Empty,
}

/// One visible line of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub label: String,
    pub expanded: bool,
    pub kind: RowKind,
}

/// State of the subscription -> resource group -> cluster tree.
///
/// Resource groups and cluster listings are fetched on first expansion and
/// kept for the lifetime of the tree. Every action takes `&mut self`, so one
/// runs at a time.
pub struct ConnectionTree<B> {
    backend: B,
    step: Step,
    loading: bool,
    error: Option<String>,
    subscriptions: Vec<Subscription>,
    expanded_subscriptions: HashSet<String>,
    expanded_resource_groups: HashSet<String>,
    resource_groups: HashMap<String, Vec<ResourceGroup>>,
    clusters: HashMap<String, Vec<ClusterResource>>,
}

fn group_key(subscription_id: &str, resource_group: &str) -> String {
    format!("{}/{}", subscription_id, resource_group)
}

impl<B: AzureBackend> ConnectionTree<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            step: Step::Login,
            loading: false,
            error: None,
            subscriptions: Vec::new(),
            expanded_subscriptions: HashSet::new(),
            expanded_resource_groups: HashSet::new(),
            resource_groups: HashMap::new(),
            clusters: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Returns true while a login or connect is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The last failure, as shown to the user.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Cached resource groups of a subscription, if they were fetched.
    pub fn resource_groups(&self, subscription_id: &str) -> Option<&[ResourceGroup]> {
        self.resource_groups.get(subscription_id).map(Vec::as_slice)
    }

    /// Cached clusters of a resource group, if they were fetched.
    pub fn clusters(&self, subscription_id: &str, resource_group: &str) -> Option<&[ClusterResource]> {
        self.clusters
            .get(&group_key(subscription_id, resource_group))
            .map(Vec::as_slice)
    }

    pub fn is_subscription_expanded(&self, subscription_id: &str) -> bool {
        self.expanded_subscriptions.contains(subscription_id)
    }

    pub fn is_resource_group_expanded(&self, subscription_id: &str, resource_group: &str) -> bool {
        self.expanded_resource_groups
            .contains(&group_key(subscription_id, resource_group))
    }

    /// Skips the login screen when a management token is already present.
    pub async fn open(&mut self) {
        if self.backend.has_management_token().await {
            self.load_subscriptions().await;
        }
    }

    /// Signs in, then loads subscriptions.
    pub async fn login(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.error = None;

        match self.backend.login().await {
            Ok(result) => {
                log::info!(
                    "Connection tree signed in as {}",
                    result.account.username.as_deref().unwrap_or("<unknown>")
                );
                self.load_subscriptions().await;
            }
            Err(e) => {
                log::warn!("Azure login failed: {}", e);
                self.error = Some(e.to_string());
                self.step = Step::Login;
            }
        }

        self.loading = false;
    }

    async fn load_subscriptions(&mut self) {
        self.step = Step::Loading;
        match self.backend.list_subscriptions().await {
            Ok(subscriptions) => {
                log::debug!("Loaded {} subscriptions", subscriptions.len());
                self.subscriptions = subscriptions;
                self.step = Step::Resources;
            }
            Err(e) => {
                log::warn!("Failed to load subscriptions: {}", e);
                self.error = Some(e.to_string());
                self.step = Step::Login;
            }
        }
    }

    /// Expands or collapses a subscription, fetching its resource groups on
    /// first expansion.
    pub async fn toggle_subscription(&mut self, subscription_id: &str) {
        if self.expanded_subscriptions.remove(subscription_id) {
            return;
        }
        self.expanded_subscriptions.insert(subscription_id.to_string());

        if self.resource_groups.contains_key(subscription_id) {
            return;
        }

        match self.backend.list_resource_groups(subscription_id).await {
            Ok(groups) => {
                self.resource_groups
                    .insert(subscription_id.to_string(), groups);
            }
            Err(e) => {
                log::warn!(
                    "Failed to load resource groups of {}: {}",
                    subscription_id,
                    e
                );
                self.error = Some(e.to_string());
            }
        }
    }

    /// Expands or collapses a resource group, listing its clusters on first
    /// expansion. A failed listing counts as no clusters.
    pub async fn toggle_resource_group(&mut self, subscription_id: &str, resource_group: &str) {
        let key = group_key(subscription_id, resource_group);
        if self.expanded_resource_groups.remove(&key) {
            return;
        }
        self.expanded_resource_groups.insert(key.clone());

        if self.clusters.contains_key(&key) {
            return;
        }

        let clusters = match self
            .backend
            .list_garnet_clusters(subscription_id, resource_group)
            .await
        {
            Ok(clusters) => clusters,
            Err(e) => {
                log::warn!("Failed to list clusters in {}: {}", key, e);
                Vec::new()
            }
        };
        self.clusters.insert(key, clusters);
    }

    /// Resolves a cluster into a connection descriptor.
    ///
    /// Failures are also recorded in [`error`](Self::error); the tree itself
    /// is left as it was.
    pub async fn connect(
        &mut self,
        resource: &ClusterResource,
    ) -> Result<ConnectionDescriptor, Error> {
        self.loading = true;
        let result = self.resolve(resource).await;
        self.loading = false;

        match &result {
            Ok(descriptor) => {
                log::info!(
                    "Resolved {} to {}:{}",
                    descriptor.name,
                    descriptor.host,
                    descriptor.port
                );
            }
            Err(e) => {
                log::warn!("Failed to connect to {}: {}", resource.name, e);
                self.error = Some(e.to_string());
            }
        }
        result
    }

    async fn resolve(&self, resource: &ClusterResource) -> Result<ConnectionDescriptor, Error> {
        let password = self.backend.cosmos_access_token().await?;
        let profile = self.backend.user_profile().await;

        let id = ResourceId::parse(&resource.id)?;
        let cluster = self
            .backend
            .get_garnet_cluster(&id.subscription_id, &id.resource_group, &resource.name)
            .await?;

        let node = cluster.primary_node().ok_or(Error::NoClusterNodes)?;
        let (Some(host), Some(port)) = (node.ip_address.clone(), node.port) else {
            return Err(Error::IncompleteClusterNode(resource.name.clone()));
        };

        Ok(ConnectionDescriptor {
            name: resource.name.clone(),
            host,
            port,
            password,
            username: profile.oid,
            tls: true,
        })
    }

    /// The visible tree, depth first.
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();

        for sub in &self.subscriptions {
            let sub_id = &sub.subscription_id;
            let sub_expanded = self.is_subscription_expanded(sub_id);
            rows.push(TreeRow {
                depth: 0,
                label: sub.label().to_string(),
                expanded: sub_expanded,
                kind: RowKind::Subscription {
                    subscription_id: sub_id.clone(),
                },
            });
            if !sub_expanded {
                continue;
            }

            let groups = self.resource_groups(sub_id).unwrap_or_default();
            if groups.is_empty() {
                rows.push(empty_row(1, "No resource groups found"));
            }

            for group in groups {
                let group_expanded = self.is_resource_group_expanded(sub_id, &group.name);
                rows.push(TreeRow {
                    depth: 1,
                    label: group.name.clone(),
                    expanded: group_expanded,
                    kind: RowKind::ResourceGroup {
                        subscription_id: sub_id.clone(),
                        resource_group: group.name.clone(),
                    },
                });
                if !group_expanded {
                    continue;
                }

                let clusters = self.clusters(sub_id, &group.name).unwrap_or_default();
                if clusters.is_empty() {
                    rows.push(empty_row(2, "No clusters found"));
                }
                for cluster in clusters {
                    rows.push(TreeRow {
                        depth: 2,
                        label: cluster.name.clone(),
                        expanded: false,
                        kind: RowKind::Cluster(cluster.clone()),
                    });
                }
            }
        }

        rows
    }
}

fn empty_row(depth: usize, label: &str) -> TreeRow {
    TreeRow {
        depth,
        label: label.to_string(),
        expanded: false,
        kind: RowKind::Empty,
    }
}

impl<B> std::fmt::Debug for ConnectionTree<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTree")
            .field("step", &self.step)
            .field("loading", &self.loading)
            .field("error", &self.error)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}
