//! ARM resource id parsing

use crate::error::ArmError;

/// The scope parts of an ARM resource id.
///
/// `/subscriptions/{subscription}/resourceGroups/{group}/providers/...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
}

impl ResourceId {
    /// Parses the subscription and resource group out of a resource id.
    pub fn parse(id: &str) -> Result<Self, ArmError> {
        let parts: Vec<&str> = id.split('/').collect();
        let invalid = || ArmError::InvalidResourceId(id.to_string());

        // ["", "subscriptions", sub, "resourceGroups", rg, ...]
        if parts.len() < 5
            || !parts[0].is_empty()
            || !parts[1].eq_ignore_ascii_case("subscriptions")
            || !parts[3].eq_ignore_ascii_case("resourceGroups")
        {
            return Err(invalid());
        }
        if parts[2].is_empty() || parts[4].is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            subscription_id: parts[2].to_string(),
            resource_group: parts[4].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cluster_id() {
        let id = ResourceId::parse(
            "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.DocumentDB/garnetClusters/C1",
        )
        .unwrap();
        assert_eq!(id.subscription_id, "S1");
        assert_eq!(id.resource_group, "RG1");
    }

    #[test]
    fn segment_names_are_case_insensitive() {
        let id = ResourceId::parse("/SUBSCRIPTIONS/S1/resourcegroups/RG1").unwrap();
        assert_eq!(id.resource_group, "RG1");
    }

    #[test]
    fn rejects_other_shapes() {
        for id in [
            "",
            "/subscriptions/S1",
            "subscriptions/S1/resourceGroups/RG1",
            "/tenants/T/resourceGroups/RG1",
            "/subscriptions//resourceGroups/RG1",
        ] {
            assert!(
                matches!(ResourceId::parse(id), Err(ArmError::InvalidResourceId(_))),
                "{id:?} should be rejected"
            );
        }
    }
}
