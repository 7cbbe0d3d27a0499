//! Projections of Azure Resource Manager responses
//!
//! Only the fields the browser shows or needs are typed; everything else in
//! the ARM payloads is ignored.

use serde::Deserialize;
use serde::Serialize;

/// One page of an ARM collection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Link to the next page. Never followed by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl<T> ArmList<T> {
    /// Returns `true` if the service reported more pages.
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }
}

impl<T> Default for ArmList<T> {
    fn default() -> Self {
        Self {
            value: Vec::new(),
            next_link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl Subscription {
    /// Display name, or the id when the name is blank.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.subscription_id
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// A generic ARM resource, as returned by the resource listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// `Microsoft.DocumentDB/garnetClusters/{name}`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GarnetCluster {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Option<GarnetClusterProperties>,
}

impl GarnetCluster {
    /// The node clients connect to: the first one listed.
    pub fn primary_node(&self) -> Option<&GarnetNode> {
        self.properties.as_ref()?.nodes.first()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GarnetClusterProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub nodes: Vec<GarnetNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GarnetNode {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_without_value_is_empty() {
        let list: ArmList<ResourceGroup> = serde_json::from_str("{}").unwrap();
        assert!(list.value.is_empty());
        assert!(!list.has_more());
    }

    #[test]
    fn cluster_primary_node() {
        let cluster: GarnetCluster = serde_json::from_str(
            r#"{
                "name": "C1",
                "properties": {
                    "provisioningState": "Succeeded",
                    "nodes": [
                        {"ipAddress": "10.0.0.1", "port": 6380, "zone": "1"},
                        {"ipAddress": "10.0.0.2", "port": 6380}
                    ]
                }
            }"#,
        )
        .unwrap();

        let node = cluster.primary_node().unwrap();
        assert_eq!(node.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(node.port, Some(6380));
    }

    #[test]
    fn cluster_without_properties_has_no_node() {
        let cluster: GarnetCluster = serde_json::from_str(r#"{"name":"C1"}"#).unwrap();
        assert!(cluster.primary_node().is_none());
    }

    #[test]
    fn subscription_label_falls_back_to_id() {
        let sub: Subscription = serde_json::from_str(r#"{"subscriptionId":"S1"}"#).unwrap();
        assert_eq!(sub.label(), "S1");
    }
}
