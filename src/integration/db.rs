use std::env;
use std::time::Duration;

use mongodb::options::{ClientOptions, ServerAddress};

use crate::integration::Result;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 27017,
            db: String::from("neighbornom"),
        }
    }
}

impl Config {
    /// Unset variables keep their defaults; a malformed port is an error.
    pub fn env() -> Result<Self> {
        let default = Self::default();
        let host = env::var("MONGO_HOST").unwrap_or(default.host);
        let port = match env::var("MONGO_PORT") {
            Ok(port) => port.parse()?,
            Err(_) => default.port,
        };
        let db = env::var("MONGO_DB").unwrap_or(default.db);
        Ok(Self { host, port, db })
    }

    pub fn db_name(&self) -> &str {
        &self.db
    }

    /// Single-node options; change streams still need the node to run as a
    /// replica set.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: self.host.clone(),
                port: Some(self.port),
            }])
            .direct_connection(Some(true))
            .server_selection_timeout(Some(Duration::from_secs(2)))
            .connect_timeout(Some(Duration::from_secs(5)))
            .build()
    }
}

#[cfg(test)]
impl Config {
    pub async fn test(
        node: &testcontainers_modules::testcontainers::ContainerAsync<
            testcontainers_modules::mongo::Mongo,
        >,
    ) -> Self {
        Self {
            host: node.get_host().await.unwrap().to_string(),
            port: node.get_host_port_ipv4(27017).await.unwrap(),
            db: String::from("test_neighbornom"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_build_direct_options() {
        let config = Config::default();

        let options = config.client_options();

        assert_eq!(options.direct_connection, Some(true));
        assert_eq!(
            options.hosts,
            vec![ServerAddress::Tcp {
                host: String::from("127.0.0.1"),
                port: Some(27017),
            }]
        );
        assert_eq!(config.db_name(), "neighbornom");
    }
}
