use serde::Serialize;

/// Everything a Redis-protocol client needs to reach a Garnet cluster.
///
/// The password is a short-lived Cosmos access token and the username the
/// signed-in user's object id.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub username: Option<String>,
    pub tls: bool,
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .field("username", &self.username)
            .field("tls", &self.tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let descriptor = ConnectionDescriptor {
            name: "cache".to_string(),
            host: "10.0.0.4".to_string(),
            port: 6379,
            password: "secret-token".to_string(),
            username: Some("oid".to_string()),
            tls: true,
        };

        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("10.0.0.4"));
    }

    #[test]
    fn serializes_password_for_the_client() {
        let descriptor = ConnectionDescriptor {
            name: "cache".to_string(),
            host: "10.0.0.4".to_string(),
            port: 6379,
            password: "secret-token".to_string(),
            username: None,
            tls: true,
        };

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["password"], "secret-token");
        assert_eq!(json["tls"], true);
        assert!(json["username"].is_null());
    }
}
