//! Service configuration

use anyhow::Result;

/// Runtime configuration for the API service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Public base URL used when building absolute links.
    pub base_url: String,
    /// S3 bucket holding uploaded profile pictures.
    pub avatar_bucket: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl ServiceConfig {
    /// Create a new ServiceConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BASE_URL`: public base URL (default: "http://localhost:3000")
    /// - `AVATAR_BUCKET_NAME`: avatar bucket (default: "ankisocial-avatars")
    /// - `BIND_ADDR`: listen address (default: "0.0.0.0:3000")
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let avatar_bucket = std::env::var("AVATAR_BUCKET_NAME")
            .unwrap_or_else(|_| "ankisocial-avatars".to_string());
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(ServiceConfig {
            base_url,
            avatar_bucket,
            bind_addr,
        })
    }

    /// Absolute URL for a path under the public base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_service_config_defaults() {
        unsafe {
            std::env::remove_var("BASE_URL");
            std::env::remove_var("AVATAR_BUCKET_NAME");
            std::env::remove_var("BIND_ADDR");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.avatar_bucket, "ankisocial-avatars");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    #[serial]
    fn test_service_config_from_env_with_custom_values() {
        unsafe {
            std::env::set_var("BASE_URL", "https://ankisocial.example/");
            std::env::set_var("AVATAR_BUCKET_NAME", "my-avatars");
            std::env::set_var("BIND_ADDR", "127.0.0.1:8080");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://ankisocial.example/");
        assert_eq!(config.avatar_bucket, "my-avatars");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");

        unsafe {
            std::env::remove_var("BASE_URL");
            std::env::remove_var("AVATAR_BUCKET_NAME");
            std::env::remove_var("BIND_ADDR");
        }
    }

    #[test]
    #[serial]
    fn test_absolute_url_joins_cleanly() {
        let config = ServiceConfig {
            base_url: "https://ankisocial.example/".to_string(),
            avatar_bucket: "avatars".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        };
        assert_eq!(
            config.absolute_url("/auth/recover/abc"),
            "https://ankisocial.example/auth/recover/abc"
        );
        assert_eq!(
            config.absolute_url("health"),
            "https://ankisocial.example/health"
        );
    }
}
